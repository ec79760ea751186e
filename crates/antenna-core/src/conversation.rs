//! Append-only conversation log shared with the UI

use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use tokio::sync::watch;

use crate::types::{ConversationEntry, Origin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Progress {
    len: usize,
    closed: bool,
}

#[derive(Debug)]
struct Inner {
    entries: RwLock<Vec<ConversationEntry>>,
    progress: watch::Sender<Progress>,
}

/// Ordered record of system, incoming and outgoing entries.
///
/// Cloning yields another handle onto the same log. Only the session appends;
/// entries are never edited or removed.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    inner: Arc<Inner>,
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationLog {
    pub fn new() -> Self {
        let (progress, _) = watch::channel(Progress {
            len: 0,
            closed: false,
        });
        Self {
            inner: Arc::new(Inner {
                entries: RwLock::new(Vec::new()),
                progress,
            }),
        }
    }

    pub(crate) fn append(&self, origin: Origin, text: impl Into<String>, is_emergency: bool) -> u64 {
        let text = text.into();
        match origin {
            Origin::System => tracing::info!(target: "antenna::conversation", "[SYSTEM] {}", text),
            Origin::Local => tracing::info!(target: "antenna::conversation", "[SELF] {}", text),
            Origin::Peer => tracing::info!(target: "antenna::conversation", "[PEER] {}", text),
        }

        let mut entries = self
            .inner
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = entries.len() as u64 + 1;
        entries.push(ConversationEntry {
            id,
            origin,
            text,
            is_emergency,
            recorded_at: SystemTime::now(),
        });
        let len = entries.len();
        drop(entries);

        self.inner.progress.send_modify(|progress| progress.len = len);
        id
    }

    pub(crate) fn system(&self, text: impl Into<String>) -> u64 {
        self.append(Origin::System, text, false)
    }

    /// Mark the log as finished; cursors drain what is left and then end
    pub(crate) fn close(&self) {
        self.inner.progress.send_modify(|progress| progress.closed = true);
    }

    pub fn len(&self) -> usize {
        self.read(|entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every entry appended so far
    pub fn snapshot(&self) -> Vec<ConversationEntry> {
        self.read(|entries| entries.to_vec())
    }

    /// Copy of the entries from `position` onwards
    pub fn entries_from(&self, position: usize) -> Vec<ConversationEntry> {
        self.read(|entries| entries.get(position..).map(<[_]>::to_vec).unwrap_or_default())
    }

    /// Lazy reader starting at the first entry; create a new cursor to restart
    pub fn cursor(&self) -> LogCursor {
        LogCursor {
            log: self.clone(),
            position: 0,
            progress: self.inner.progress.subscribe(),
        }
    }

    fn read<T>(&self, f: impl FnOnce(&[ConversationEntry]) -> T) -> T {
        let entries = self
            .inner
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&entries)
    }
}

/// Sequential reader over a [`ConversationLog`]
#[derive(Debug)]
pub struct LogCursor {
    log: ConversationLog,
    position: usize,
    progress: watch::Receiver<Progress>,
}

impl LogCursor {
    /// Next entry if one is already available
    pub fn try_next(&mut self) -> Option<ConversationEntry> {
        let entry = self
            .log
            .read(|entries| entries.get(self.position).cloned())?;
        self.position += 1;
        Some(entry)
    }

    /// Wait for the next entry; `None` once the log is closed and drained
    pub async fn next(&mut self) -> Option<ConversationEntry> {
        loop {
            if let Some(entry) = self.try_next() {
                return Some(entry);
            }
            let progress = *self.progress.borrow_and_update();
            if progress.len > self.position {
                continue;
            }
            if progress.closed {
                return None;
            }
            if self.progress.changed().await.is_err() {
                return self.try_next();
            }
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }
}
