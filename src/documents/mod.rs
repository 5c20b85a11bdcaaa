//! Open documents and tab ordering.
//!
//! The registry exclusively owns every open document; everything else refers
//! to documents by `PathKey`.

mod registry;

pub use registry::{ClosedDocument, DocumentRegistry, OpenDocument};
