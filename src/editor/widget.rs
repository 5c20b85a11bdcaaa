//! Editing widget capability.
//!
//! The state manager never reaches for a global editor instance. The widget
//! is passed in as a boxed `EditorWidget` and its change notifications are
//! funnelled into a `ChangeSignal` that the active-document controller
//! drains once per event-loop turn.

use std::cell::Cell;

/// Callback invoked by a widget whenever its text changes.
pub type ChangeHandler = Box<dyn FnMut()>;

/// The operations the state manager needs from an editing widget.
pub trait EditorWidget {
    /// Current text in the widget.
    fn text(&self) -> String;

    /// Replace the widget's text.
    ///
    /// Widgets may report this as a change; callers that load content
    /// programmatically suppress the notification through `ChangeSignal`.
    fn set_text(&mut self, text: &str);

    /// Register a handler fired on every change.
    fn on_change(&mut self, handler: ChangeHandler);
}

// ─────────────────────────────────────────────────────────────────────────────
// Change Signal
// ─────────────────────────────────────────────────────────────────────────────

/// Latch between widget change callbacks and the controller.
///
/// `notify` is what the widget's handler calls. While a suppression guard is
/// alive, notifications are dropped.
#[derive(Debug, Default)]
pub struct ChangeSignal {
    suppressed: Cell<bool>,
    pending: Cell<bool>,
}

impl ChangeSignal {
    /// Create a signal with no pending change.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change unless notifications are suppressed.
    pub fn notify(&self) {
        if !self.suppressed.get() {
            self.pending.set(true);
        }
    }

    /// Consume the pending change flag.
    pub fn take(&self) -> bool {
        self.pending.replace(false)
    }

    /// Whether notifications are currently dropped.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed.get()
    }

    /// Drop notifications until the returned guard goes out of scope.
    pub fn suppress(&self) -> SuppressGuard<'_> {
        let previous = self.suppressed.replace(true);
        SuppressGuard {
            signal: self,
            previous,
        }
    }
}

/// Restores the previous suppression state on drop.
pub struct SuppressGuard<'a> {
    signal: &'a ChangeSignal,
    previous: bool,
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.signal.suppressed.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_sets_pending_once() {
        let signal = ChangeSignal::new();
        signal.notify();
        signal.notify();
        assert!(signal.take());
        assert!(!signal.take());
    }

    #[test]
    fn test_suppressed_notifications_are_dropped() {
        let signal = ChangeSignal::new();
        {
            let _guard = signal.suppress();
            assert!(signal.is_suppressed());
            signal.notify();
        }
        assert!(!signal.is_suppressed());
        assert!(!signal.take());
    }

    #[test]
    fn test_nested_guards_restore_outer_state() {
        let signal = ChangeSignal::new();
        let outer = signal.suppress();
        {
            let _inner = signal.suppress();
        }
        assert!(signal.is_suppressed());
        drop(outer);
        assert!(!signal.is_suppressed());
    }
}
