//! Self-echo suppression
//!
//! Some antennas loop every written value back on the notify characteristic.
//! The suppressor remembers the last transmitted text and classifies inbound
//! text against it so the client's own message is not shown twice.
//!
//! Timing policy:
//! - an armed echo that never comes back expires after the expiry window;
//! - the first match is an [`Classification::Echo`] and starts the grace window;
//! - further matches inside the grace window are [`Classification::Duplicate`];
//!   they do not extend the window;
//! - once the grace window elapses the pending echo is cleared and identical
//!   text is an ordinary [`Classification::Peer`] message again.

use std::time::Duration;

use tokio::time::Instant;

/// How inbound text relates to the last transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Echo,
    Duplicate,
    Peer,
}

/// The one transmission currently awaiting its echo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEcho {
    pub id: u64,
    pub text: String,
    pub created_at: Instant,
    /// Set when the echo was observed
    consumed_at: Option<Instant>,
}

impl PendingEcho {
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

#[derive(Debug)]
pub struct EchoSuppressor {
    pending: Option<PendingEcho>,
    next_id: u64,
    grace: Duration,
    expiry: Duration,
}

impl EchoSuppressor {
    pub fn new(grace: Duration, expiry: Duration) -> Self {
        Self {
            pending: None,
            next_id: 1,
            grace,
            expiry,
        }
    }

    /// Remember `text` as the latest transmission, superseding any earlier one
    pub fn arm(&mut self, text: &str, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if let Some(previous) = self.pending.take() {
            tracing::debug!("Echo {} superseded by echo {}", previous.id, id);
        }
        self.pending = Some(PendingEcho {
            id,
            text: text.to_string(),
            created_at: now,
            consumed_at: None,
        });
        id
    }

    /// Forget the pending echo, e.g. because the transmission failed
    pub fn clear(&mut self) {
        self.pending = None;
    }

    pub fn pending(&self) -> Option<&PendingEcho> {
        self.pending.as_ref()
    }

    /// Classify trimmed inbound text
    pub fn classify(&mut self, text: &str, now: Instant) -> Classification {
        self.expire(now);

        let Some(pending) = self.pending.as_mut() else {
            return Classification::Peer;
        };
        if pending.text != text {
            return Classification::Peer;
        }

        if pending.is_consumed() {
            tracing::debug!("Blocked duplicate echo {} of {:?}", pending.id, text);
            Classification::Duplicate
        } else {
            pending.consumed_at = Some(now);
            tracing::debug!("Suppressed echo {} of {:?}", pending.id, text);
            Classification::Echo
        }
    }

    /// When the pending echo must be cleared, if one is armed
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|pending| match pending.consumed_at {
            Some(consumed_at) => consumed_at + self.grace,
            None => pending.created_at + self.expiry,
        })
    }

    /// Clear the pending echo if its deadline has passed
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                if let Some(pending) = self.pending.take() {
                    tracing::debug!("Cleared pending echo {}", pending.id);
                }
                true
            }
            _ => false,
        }
    }
}
