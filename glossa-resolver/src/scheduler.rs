//! Pending-request bookkeeping for the coalescer.
//!
//! [`SchedulerState`] is owned by a single mutex inside the resolver. Every
//! mutation, including the snapshot-and-clear step that forms a
//! [`Generation`], happens under that lock, so a URI can never be claimed by
//! two flushes. Callbacks are never invoked while the lock is held.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use glossa_core::Label;
use tokio::task::JoinHandle;

pub(crate) type Callback = Box<dyn FnOnce(Label) + Send + 'static>;

/// Cooperative cancellation flag shared between a requester and the
/// scheduler. Checked immediately before a callback would run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One registered callback waiting for a URI.
pub(crate) struct Subscriber {
    id: u64,
    token: CancelToken,
    callback: Callback,
}

impl Subscriber {
    /// Run the callback unless the requester cancelled. A panicking
    /// callback is logged and does not reach the other subscribers.
    pub(crate) fn deliver(self, label: Label) {
        if self.token.is_cancelled() {
            tracing::trace!(subscriber = self.id, "skipping cancelled subscriber");
            return;
        }
        let callback = self.callback;
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| callback(label))).is_err() {
            tracing::error!(subscriber = self.id, "label callback panicked");
        }
    }
}

/// A flushed snapshot of pending URIs and their subscribers.
pub(crate) struct Generation {
    pub id: u64,
    /// Distinct URIs in first-request order.
    pub uris: Vec<String>,
    pub subscribers: HashMap<String, Vec<Subscriber>>,
}

impl Generation {
    /// Hand `label` to every subscriber of `uri`.
    pub fn deliver(&mut self, uri: &str, label: &Label) {
        if let Some(subscribers) = self.subscribers.remove(uri) {
            for subscriber in subscribers {
                subscriber.deliver(label.clone());
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct SchedulerState {
    pending: HashMap<String, Vec<Subscriber>>,
    order: Vec<String>,
    timer: Option<JoinHandle<()>>,
    timer_epoch: u64,
    next_subscriber_id: u64,
    next_generation_id: u64,
    in_flight: usize,
}

impl SchedulerState {
    /// Add a subscriber for `uri`, creating its pending list if needed.
    /// Returns the subscriber id used for later removal.
    pub fn register(&mut self, uri: &str, token: CancelToken, callback: Callback) -> u64 {
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        if !self.pending.contains_key(uri) {
            self.order.push(uri.to_string());
        }
        self.pending.entry(uri.to_string()).or_default().push(Subscriber {
            id,
            token,
            callback,
        });
        id
    }

    /// Remove one subscriber from a still-pending URI. The URI itself stays
    /// pending so the fetch still populates the cache.
    pub fn remove_subscriber(&mut self, uri: &str, id: u64) -> bool {
        match self.pending.get_mut(uri) {
            Some(subscribers) => {
                let before = subscribers.len();
                subscribers.retain(|s| s.id != id);
                subscribers.len() != before
            }
            None => false,
        }
    }

    /// Number of distinct pending URIs.
    pub fn pending_len(&self) -> usize {
        self.order.len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    /// Invalidate any armed timer and install `handle` as the new one.
    /// Returns the epoch the new timer must present when it fires.
    pub fn next_timer_epoch(&mut self) -> u64 {
        self.cancel_timer();
        self.timer_epoch
    }

    pub fn set_timer(&mut self, handle: JoinHandle<()>) {
        self.timer = Some(handle);
    }

    pub fn is_current_timer(&self, epoch: u64) -> bool {
        self.timer_epoch == epoch
    }

    /// Forget the running timer without aborting it (used by the timer task
    /// itself when it fires).
    pub fn release_timer(&mut self) {
        self.timer = None;
    }

    fn cancel_timer(&mut self) {
        self.timer_epoch += 1;
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    /// Snapshot and clear the pending map. Cancels the timer. Returns `None`
    /// when nothing is pending.
    pub fn take_generation(&mut self) -> Option<Generation> {
        self.cancel_timer();
        if self.order.is_empty() {
            return None;
        }
        let id = self.next_generation_id;
        self.next_generation_id += 1;
        self.in_flight += 1;
        Some(Generation {
            id,
            uris: std::mem::take(&mut self.order),
            subscribers: std::mem::take(&mut self.pending),
        })
    }

    pub fn finish_generation(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    /// Drop all pending subscribers and the timer. Returns how many URIs
    /// were discarded.
    pub fn clear(&mut self) -> usize {
        self.cancel_timer();
        let discarded = self.order.len();
        self.order.clear();
        self.pending.clear();
        discarded
    }
}
