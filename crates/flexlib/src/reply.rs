//! Correlation of command sequence numbers with their replies.
//!
//! Every command the session sends is registered here before it reaches the
//! transport. When the matching `R` line arrives the entry is removed and
//! either its callback or the session's default reply handler runs.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::codec::SUCCESS_CODE;

/// A resolved reply, handed to callbacks and the default handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// The command text exactly as it was sent.
    pub command: String,
    pub sequence: u32,
    /// Hex response code. `"0"` means success.
    pub code: String,
    pub message: String,
    pub debug: Option<String>,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Callback run once with the reply to a single command.
pub type ReplyCallback = Box<dyn FnOnce(Reply) + Send + 'static>;

/// One pending command.
pub struct ReplyEntry {
    pub sequence: u32,
    pub command: String,
    pub callback: Option<ReplyCallback>,
}

impl std::fmt::Debug for ReplyEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyEntry")
            .field("sequence", &self.sequence)
            .field("command", &self.command)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Pending commands keyed by sequence number.
///
/// Safe to share between the caller issuing commands and the reader task
/// resolving replies. Callbacks always run with the internal lock released,
/// so a callback may send further commands.
#[derive(Debug, Default)]
pub struct ReplyTable {
    entries: Mutex<HashMap<u32, ReplyEntry>>,
}

impl ReplyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command awaiting its reply.
    ///
    /// An entry already pending under the same sequence number is replaced
    /// and its callback dropped.
    pub fn register(&self, sequence: u32, command: impl Into<String>, callback: Option<ReplyCallback>) {
        let command = command.into();
        let previous = self.entries.lock().insert(
            sequence,
            ReplyEntry {
                sequence,
                command,
                callback,
            },
        );
        if let Some(previous) = previous {
            tracing::warn!(
                sequence,
                command = %previous.command,
                "replaced pending reply entry with duplicate sequence number"
            );
        }
    }

    /// Remove an entry without running anything. Returns the entry if one
    /// was pending.
    pub fn remove(&self, sequence: u32) -> Option<ReplyEntry> {
        self.entries.lock().remove(&sequence)
    }

    /// Match a reply to its pending command.
    ///
    /// The entry's callback runs if it has one, otherwise `default` runs.
    /// Returns `true` when a pending entry was found. An unmatched reply with
    /// a non-zero code is logged; an unmatched success is ignored quietly.
    pub fn resolve(
        &self,
        sequence: u32,
        code: &str,
        message: &str,
        debug: Option<&str>,
        default: impl FnOnce(Reply),
    ) -> bool {
        let entry = self.entries.lock().remove(&sequence);
        let Some(entry) = entry else {
            if code != SUCCESS_CODE {
                tracing::warn!(
                    sequence,
                    code,
                    message,
                    "reply for unknown sequence number"
                );
            }
            return false;
        };

        let reply = Reply {
            command: entry.command,
            sequence,
            code: code.to_string(),
            message: message.to_string(),
            debug: debug.map(str::to_string),
        };
        match entry.callback {
            Some(callback) => callback(reply),
            None => default(reply),
        }
        true
    }

    /// Drop every pending entry without invoking any callback.
    pub fn clear(&self) {
        let dropped = std::mem::take(&mut *self.entries.lock());
        if !dropped.is_empty() {
            tracing::debug!(count = dropped.len(), "dropped pending reply entries");
        }
    }

    pub fn contains(&self, sequence: u32) -> bool {
        self.entries.lock().contains_key(&sequence)
    }

    /// Number of pending entries.
    pub fn pending(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn callback_runs_exactly_once() {
        let table = ReplyTable::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = calls.clone();
        table.register(
            42,
            "info",
            Some(Box::new(move |reply: Reply| sink.lock().push(reply))),
        );

        let mut defaulted = false;
        assert!(table.resolve(42, "0", "ok", None, |_| defaulted = true));
        assert!(!defaulted);
        assert!(!table.resolve(42, "0", "ok", None, |_| defaulted = true));
        assert!(!defaulted);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].sequence, 42);
        assert_eq!(calls[0].code, "0");
        assert_eq!(calls[0].message, "ok");
        assert_eq!(calls[0].command, "info");
        assert!(calls[0].is_success());
    }

    #[test]
    fn entry_without_callback_goes_to_default() {
        let table = ReplyTable::new();
        table.register(7, "radio uptime", None);
        let mut seen = None;
        assert!(table.resolve(7, "0", "uptime=3600", Some("dbg"), |r| seen = Some(r)));
        let seen = seen.unwrap();
        assert_eq!(seen.command, "radio uptime");
        assert_eq!(seen.debug.as_deref(), Some("dbg"));
        assert!(table.is_empty());
    }

    #[test]
    fn unregistered_failure_is_not_dispatched() {
        let table = ReplyTable::new();
        let mut called = false;
        assert!(!table.resolve(99, "50000015", "bad", None, |_| called = true));
        assert!(!called);
    }

    #[test]
    fn clear_drops_without_invoking() {
        let table = ReplyTable::new();
        let fired = Arc::new(AtomicUsize::new(0));
        for seq in 1..=3 {
            let fired = fired.clone();
            table.register(
                seq,
                "info",
                Some(Box::new(move |_: Reply| {
                    fired.fetch_add(1, Ordering::SeqCst);
                })),
            );
        }
        assert_eq!(table.pending(), 3);
        table.clear();
        assert_eq!(table.pending(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_may_register_again() {
        let table = Arc::new(ReplyTable::new());
        let inner = table.clone();
        table.register(
            1,
            "first",
            Some(Box::new(move |_: Reply| inner.register(2, "second", None))),
        );
        table.resolve(1, "0", "", None, |_| {});
        assert!(table.contains(2));
    }
}
