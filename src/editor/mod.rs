//! Editor module for notedeck
//!
//! The text-editing widget is an external capability. This module defines
//! the seam the state manager talks through (`EditorWidget`), the change
//! gate used to keep programmatic content loads from marking documents
//! dirty, and an in-memory widget for headless use and tests.

mod memory;
mod widget;

pub use memory::MemoryEditor;
pub use widget::{ChangeHandler, ChangeSignal, EditorWidget, SuppressGuard};
