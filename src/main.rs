//! notedeck - headless entry point
//!
//! Opens a folder and optionally a file through the filesystem backend,
//! prints the resulting tree, tabs and status line, then saves the session.
//!
//! ```text
//! notedeck [--watch] [FOLDER] [FILE]
//! ```

use log::{info, warn};
use notedeck::config::load_config;
use notedeck::editor::MemoryEditor;
use notedeck::{AppState, Backend, BackendEvent, FsBackend};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Application name constant.
const APP_NAME: &str = "notedeck";

/// How often watch mode polls for outside changes.
const WATCH_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Default)]
struct Args {
    watch: bool,
    folder: Option<PathBuf>,
    file: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    for arg in std::env::args().skip(1) {
        if arg == "--watch" {
            args.watch = true;
        } else if args.folder.is_none() {
            args.folder = Some(PathBuf::from(arg));
        } else if args.file.is_none() {
            args.file = Some(arg);
        } else {
            warn!("Ignoring extra argument '{}'", arg);
        }
    }
    args
}

fn print_state(state: &AppState) {
    if state.tree().root().is_some() {
        println!("Folder:");
        for row in state.tree().visible_rows() {
            let marker = match (row.node.is_dir, row.expanded) {
                (true, true) => "v ",
                (true, false) => "> ",
                _ => "  ",
            };
            println!("{}{}{}", "  ".repeat(row.depth), marker, row.node.name);
        }
    }

    let active = state.pointers().active_file.clone();
    println!("Tabs:");
    for doc in state.documents().iter() {
        let current = if active.as_ref() == Some(&doc.path) { "*" } else { " " };
        println!(" {} {}", current, doc.title());
    }
    println!("Status: {}", state.status_text());
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("Starting {}", APP_NAME);

    let args = parse_args();
    let settings = load_config();

    let fs = Rc::new(FsBackend::new());
    let backend: Rc<dyn Backend> = fs.clone();
    let mut state = AppState::with_editor(backend, Box::new(MemoryEditor::new()), settings);
    state.set_watching(args.watch);

    if let Some(folder) = &args.folder {
        match fs.folder_snapshot(folder) {
            Ok(snapshot) => {
                state
                    .handle_event(BackendEvent::FolderOpened {
                        path: folder.to_string_lossy().into_owned(),
                        snapshot,
                    })
                    .await;
                state.restore_session().await;
            }
            Err(e) => warn!("Could not open folder {}: {}", folder.display(), e),
        }
    }

    if let Some(file) = args.file {
        state
            .handle_event(BackendEvent::OpenFileRequested(file))
            .await;
    }

    print_state(&state);

    if args.watch {
        info!("Watching for changes; press Ctrl-C to stop");
        let started = Instant::now();
        loop {
            tokio::time::sleep(WATCH_INTERVAL).await;
            state.tick(started.elapsed().as_secs_f64());
            if state.poll_watcher().await {
                print_state(&state);
                state.persist_session();
            }
        }
    }

    state.shutdown();
}
