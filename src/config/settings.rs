//! User settings and preferences for notedeck
//!
//! This module defines the `Settings` struct that holds all user-configurable
//! options, with serde support for JSON persistence.

use crate::path_key::PathKey;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Theme Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Color scheme for the toolbar and the preview pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Default,
    Dark,
}

/// Editor color schemes the editing widget ships with.
pub const EDITOR_THEMES: &[&str] = &[
    "default",
    "3024-day",
    "3024-night",
    "ambiance",
    "base16-dark",
    "base16-light",
    "blackboard",
    "cobalt",
    "eclipse",
    "elegant",
    "lesser-dark",
    "material",
    "mdn-like",
    "midnight",
    "monokai",
    "neat",
    "night",
    "paraiso-dark",
    "paraiso-light",
    "solarized",
    "the-matrix",
    "tomorrow-night-eighties",
    "twilight",
    "xq-dark",
    "xq-light",
];

/// Map a theme name onto a known editor theme, falling back to `default`.
pub fn normalize_editor_theme(name: &str) -> String {
    let value = name.trim().to_lowercase();
    EDITOR_THEMES
        .iter()
        .find(|option| **option == value)
        .unwrap_or(&EDITOR_THEMES[0])
        .to_string()
}

/// Text shown in the editor when no document is open.
pub const DEFAULT_WELCOME_MARKDOWN: &str =
    "# Welcome to notedeck\n\nStart iterating on your notes.";

// ─────────────────────────────────────────────────────────────────────────────
// Main Settings Struct
// ─────────────────────────────────────────────────────────────────────────────

/// Application settings.
///
/// This struct is serialized to JSON and persisted to the user's config directory.
/// All fields have defaults via `#[serde(default)]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // ─────────────────────────────────────────────────────────────────────────
    // Appearance
    // ─────────────────────────────────────────────────────────────────────────
    /// Toolbar color scheme
    pub theme: Theme,

    /// Editor color scheme, one of `EDITOR_THEMES`
    pub editor_theme: String,

    /// Preview pane color scheme
    pub preview_theme: Theme,

    /// Font size for the editor (in points)
    pub font_size: f32,

    // ─────────────────────────────────────────────────────────────────────────
    // Editor Behavior
    // ─────────────────────────────────────────────────────────────────────────
    /// Whether to enable word wrap
    pub word_wrap: bool,

    /// Whether to auto-save files
    pub auto_save: bool,

    /// Text loaded into the editor when nothing is open
    pub welcome_markdown: String,

    /// How long transient status messages stay visible
    pub status_flash_secs: f64,

    // ─────────────────────────────────────────────────────────────────────────
    // Session & History
    // ─────────────────────────────────────────────────────────────────────────
    /// File that was active when the app last closed
    pub last_file: Option<PathKey>,

    /// Recently opened files (most recent first)
    pub recent_files: Vec<PathKey>,

    /// Maximum number of recent files to remember
    pub max_recent_files: usize,

    /// Recently opened folders, most recent first
    pub recent_folders: Vec<PathKey>,

    /// Maximum number of recent folders to remember
    pub max_recent_folders: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Appearance
            theme: Theme::default(),
            editor_theme: EDITOR_THEMES[0].to_string(),
            preview_theme: Theme::default(),
            font_size: 16.0,

            // Editor Behavior
            word_wrap: true,
            auto_save: true,
            welcome_markdown: DEFAULT_WELCOME_MARKDOWN.to_string(),
            status_flash_secs: 2.2,

            // Session & History
            last_file: None,
            recent_files: Vec::new(),
            max_recent_files: 10,
            recent_folders: Vec::new(),
            max_recent_folders: 10,
        }
    }
}

impl Settings {
    /// Add a file to the recent files list.
    ///
    /// If the file already exists in the list, it's moved to the front.
    /// The list is trimmed to `max_recent_files`.
    pub fn add_recent_file(&mut self, path: PathKey) {
        self.recent_files.retain(|p| p != &path);
        self.recent_files.insert(0, path);
        self.recent_files.truncate(self.max_recent_files);
    }

    /// Add a folder to the recent folders list, moving it to the front.
    pub fn add_recent_folder(&mut self, path: PathKey) {
        self.recent_folders.retain(|p| p != &path);
        self.recent_folders.insert(0, path);
        self.recent_folders.truncate(self.max_recent_folders);
    }

    /// Rewrite remembered paths after a file or folder was renamed.
    pub fn rename_paths(&mut self, old: &PathKey, new: &PathKey) {
        let rebase = |path: &mut PathKey| {
            if let Some(moved) = path.rebase(old, new) {
                *path = moved;
            }
        };
        self.recent_files.iter_mut().for_each(rebase);
        self.recent_folders.iter_mut().for_each(rebase);
        if let Some(last) = self.last_file.as_mut() {
            rebase(last);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Validation Constants and Sanitization
    // ─────────────────────────────────────────────────────────────────────────

    /// Minimum allowed font size.
    pub const MIN_FONT_SIZE: f32 = 8.0;
    /// Maximum allowed font size.
    pub const MAX_FONT_SIZE: f32 = 72.0;
    /// Shortest status flash.
    pub const MIN_FLASH_SECS: f64 = 0.5;
    /// Longest status flash.
    pub const MAX_FLASH_SECS: f64 = 30.0;

    /// Sanitize settings by clamping values to valid ranges.
    ///
    /// This is useful after loading settings from a file that might have
    /// been manually edited with invalid values.
    pub fn sanitize(&mut self) {
        self.font_size = self
            .font_size
            .clamp(Self::MIN_FONT_SIZE, Self::MAX_FONT_SIZE);

        self.editor_theme = normalize_editor_theme(&self.editor_theme);

        if !self.status_flash_secs.is_finite() {
            self.status_flash_secs = Settings::default().status_flash_secs;
        }
        self.status_flash_secs = self
            .status_flash_secs
            .clamp(Self::MIN_FLASH_SECS, Self::MAX_FLASH_SECS);

        if self.welcome_markdown.trim().is_empty() {
            self.welcome_markdown = DEFAULT_WELCOME_MARKDOWN.to_string();
        }

        // Ensure the recent-list caps are reasonable
        self.max_recent_files = match self.max_recent_files {
            0 => 10,
            n => n.min(100),
        };
        self.max_recent_folders = match self.max_recent_folders {
            0 => 10,
            n => n.min(100),
        };
        self.recent_files.truncate(self.max_recent_files);
        self.recent_folders.truncate(self.max_recent_folders);

        // Untitled placeholders never survive a restart
        if self.last_file.as_ref().is_some_and(PathKey::is_untitled) {
            self.last_file = None;
        }
    }

    /// Load settings and sanitize them to ensure validity.
    pub fn from_json_sanitized(json: &str) -> Result<Self, serde_json::Error> {
        let mut settings: Self = serde_json::from_str(json)?;
        settings.sanitize();
        Ok(settings)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(path: &str) -> PathKey {
        PathKey::parse(path).unwrap()
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();

        assert_eq!(settings.theme, Theme::Default);
        assert_eq!(settings.editor_theme, "default");
        assert_eq!(settings.font_size, 16.0);
        assert!(settings.auto_save);
        assert!(settings.word_wrap);
        assert!(settings.last_file.is_none());
        assert_eq!(settings.status_flash_secs, 2.2);
        assert!(settings.welcome_markdown.starts_with("# Welcome"));
    }

    #[test]
    fn test_add_recent_file() {
        let mut settings = Settings::default();
        settings.max_recent_files = 3;

        settings.add_recent_file(key("/file1.md"));
        settings.add_recent_file(key("/file2.md"));
        settings.add_recent_file(key("/file3.md"));
        assert_eq!(settings.recent_files.len(), 3);
        assert_eq!(settings.recent_files[0], key("/file3.md"));

        // Re-adding moves to the front without duplicating
        settings.add_recent_file(key("/FILE1.md"));
        assert_eq!(settings.recent_files.len(), 3);
        assert_eq!(settings.recent_files[0], key("/file1.md"));

        settings.add_recent_file(key("/file4.md"));
        assert_eq!(settings.recent_files.len(), 3);
        assert!(!settings.recent_files.contains(&key("/file2.md")));
    }

    #[test]
    fn test_rename_paths() {
        let mut settings = Settings {
            last_file: Some(key("/notes/a/x.md")),
            recent_files: vec![key("/notes/a/x.md"), key("/notes/b.md")],
            recent_folders: vec![key("/notes/a")],
            ..Settings::default()
        };

        settings.rename_paths(&key("/notes/a"), &key("/notes/z"));
        assert_eq!(settings.last_file, Some(key("/notes/z/x.md")));
        assert_eq!(settings.recent_files, vec![key("/notes/z/x.md"), key("/notes/b.md")]);
        assert_eq!(settings.recent_folders, vec![key("/notes/z")]);
    }

    #[test]
    fn test_sanitize_clamps_values() {
        let mut settings = Settings {
            font_size: 2.0,
            editor_theme: " Monokai ".to_string(),
            status_flash_secs: f64::NAN,
            welcome_markdown: "  ".to_string(),
            max_recent_files: 0,
            last_file: Some(PathKey::untitled(1, 0)),
            ..Settings::default()
        };
        settings.sanitize();

        assert_eq!(settings.font_size, Settings::MIN_FONT_SIZE);
        assert_eq!(settings.editor_theme, "monokai");
        assert_eq!(settings.status_flash_secs, 2.2);
        assert_eq!(settings.welcome_markdown, DEFAULT_WELCOME_MARKDOWN);
        assert_eq!(settings.max_recent_files, 10);
        assert!(settings.last_file.is_none());

        settings.font_size = 500.0;
        settings.editor_theme = "no-such-theme".to_string();
        settings.sanitize();
        assert_eq!(settings.font_size, Settings::MAX_FONT_SIZE);
        assert_eq!(settings.editor_theme, "default");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let settings =
            Settings::from_json_sanitized(r#"{"theme": "dark", "last_file": "/notes/a.md"}"#)
                .unwrap();
        assert_eq!(settings.theme, Theme::Dark);
        assert_eq!(settings.last_file, Some(key("/notes/a.md")));
        assert_eq!(settings.font_size, 16.0);
    }

    #[test]
    fn test_unknown_theme_is_rejected() {
        let result = Settings::from_json_sanitized(r#"{"theme": "neon"}"#);
        assert!(result.is_err());
    }
}
