//! In-memory editing widget.

use super::widget::{ChangeHandler, EditorWidget};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Default)]
struct Inner {
    text: String,
    handlers: Vec<ChangeHandler>,
    loads: usize,
}

/// A text buffer implementing `EditorWidget`.
///
/// Clones share the same buffer, so a host (or a test) can keep a handle to
/// simulate typing while the controller owns the boxed widget. Like real
/// widgets it reports programmatic `set_text` calls as changes.
#[derive(Clone, Default)]
pub struct MemoryEditor {
    inner: Rc<RefCell<Inner>>,
}

impl MemoryEditor {
    /// Create an empty editor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a user edit: replace the text and fire change handlers.
    pub fn type_text(&self, text: &str) {
        self.inner.borrow_mut().text = text.to_string();
        self.fire();
    }

    /// Simulate a user appending text at the end of the buffer.
    pub fn append(&self, suffix: &str) {
        self.inner.borrow_mut().text.push_str(suffix);
        self.fire();
    }

    /// Current text without going through the trait.
    pub fn contents(&self) -> String {
        self.inner.borrow().text.clone()
    }

    /// How many times content was loaded programmatically.
    pub fn load_count(&self) -> usize {
        self.inner.borrow().loads
    }

    fn fire(&self) {
        let mut handlers = std::mem::take(&mut self.inner.borrow_mut().handlers);
        for handler in handlers.iter_mut() {
            handler();
        }
        let mut inner = self.inner.borrow_mut();
        handlers.append(&mut inner.handlers);
        inner.handlers = handlers;
    }
}

impl EditorWidget for MemoryEditor {
    fn text(&self) -> String {
        self.contents()
    }

    fn set_text(&mut self, text: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            inner.text = text.to_string();
            inner.loads += 1;
        }
        self.fire();
    }

    fn on_change(&mut self, handler: ChangeHandler) {
        self.inner.borrow_mut().handlers.push(handler);
    }
}
