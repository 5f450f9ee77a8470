//! Thread-safe accumulator for messages reported by build collaborators.

use crate::message::Message;
use crate::diagnostic::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Errors and warnings drained from a [`MessageSink`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectedMessages {
    /// Error messages, in emission order.
    pub errors: Vec<Message>,
    /// Warning messages, in emission order.
    pub warnings: Vec<Message>,
}

impl CollectedMessages {
    /// Returns `true` if there are neither errors nor warnings.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }
}

/// A thread-safe accumulator for messages emitted outside the compiler proper.
///
/// Collaborators such as style processors report through a sink instead of
/// failing, so that one bad resource does not abort a whole compilation.
pub struct MessageSink {
    messages: Mutex<CollectedMessages>,
    error_count: AtomicUsize,
}

impl MessageSink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self {
            messages: Mutex::new(CollectedMessages::default()),
            error_count: AtomicUsize::new(0),
        }
    }

    /// Emits a message with the given severity.
    ///
    pub fn emit(&self, severity: Severity, message: Message) {
        let mut messages = self.messages.lock().unwrap();
        if severity.is_error() {
            self.error_count.fetch_add(1, Ordering::Relaxed);
            messages.errors.push(message);
        } else {
            messages.warnings.push(message);
        }
    }

    /// Returns `true` if any error has been emitted since creation.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Takes all accumulated messages, leaving the sink empty.
    pub fn take_all(&self) -> CollectedMessages {
        let mut messages = self.messages.lock().unwrap();
        std::mem::take(&mut *messages)
    }
}

impl Default for MessageSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sink() {
        let sink = MessageSink::new();
        assert!(!sink.has_errors());
        assert!(sink.take_all().is_empty());
    }

    #[test]
    fn buckets_by_severity() {
        let sink = MessageSink::new();
        sink.emit(Severity::Error, Message::text("bad"));
        sink.emit(Severity::Warning, Message::text("meh"));
        let all = sink.take_all();
        assert_eq!(all.errors.len(), 1);
        assert_eq!(all.warnings.len(), 1);
        assert!(sink.has_errors());
    }

    #[test]
    fn take_all_drains() {
        let sink = MessageSink::new();
        sink.emit(Severity::Error, Message::text("bad"));
        assert_eq!(sink.take_all().errors.len(), 1);
        assert!(sink.take_all().is_empty());
    }

    #[test]
    fn thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let sink = Arc::new(MessageSink::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for _ in 0..50 {
                        sink.emit(Severity::Warning, Message::text("w"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(sink.take_all().warnings.len(), 400);
    }
}
