//! Cross-context sync channel
//!
//! Propagates set/delete events to sibling contexts of the same
//! application instance and applies incoming events locally. The
//! transport is a seam: the in-process `LocalBus` stands in for a
//! browser broadcast channel, and embedders may plug an OS-level
//! transport behind the same trait.
//!
//! Channels have an explicit open/closed lifecycle driven by the host's
//! suspend/resume notifications: a page about to be frozen detaches its
//! handler, a resumed page re-attaches the same one. Send failures are
//! an optimization loss, never an error for the originating call.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::entry::CacheEntry;

/// Kind of mutation carried by a sync event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncAction {
    Set,
    Delete,
}

/// A cache mutation broadcast to sibling contexts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncEvent {
    /// Originating context, used to skip self-delivery
    pub origin: Uuid,
    pub key: String,
    /// Present for `Set`, absent for `Delete`
    pub entry: Option<CacheEntry>,
    pub action: SyncAction,
}

/// Inbound event handler installed by a channel
pub type SyncHandler = Arc<dyn Fn(SyncEvent) + Send + Sync>;

/// Transport seam between sibling contexts
///
/// Implementations deliver fire-and-forget: no acknowledgement, no
/// ordering guarantee relative to the sender's later operations, and
/// delivery failures stay inside the transport.
pub trait SyncTransport: Send + Sync {
    /// Deliver an event to every attached context except the origin
    fn publish(&self, event: SyncEvent);

    /// Attach a context's inbound handler
    fn attach(&self, id: Uuid, handler: SyncHandler);

    /// Detach a context
    fn detach(&self, id: Uuid);
}

/// In-process broadcast bus
///
/// Connects facades living in the same process; the test double for the
/// browser's same-origin broadcast channel.
#[derive(Default)]
pub struct LocalBus {
    handlers: DashMap<Uuid, SyncHandler>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently attached contexts
    pub fn attached_count(&self) -> usize {
        self.handlers.len()
    }
}

impl SyncTransport for LocalBus {
    fn publish(&self, event: SyncEvent) {
        // Snapshot so a handler may detach/attach mid-delivery
        let targets: Vec<(Uuid, SyncHandler)> = self
            .handlers
            .iter()
            .filter(|h| *h.key() != event.origin)
            .map(|h| (*h.key(), h.value().clone()))
            .collect();

        for (id, handler) in targets {
            debug!(target_context = %id, key = %event.key, "Delivering sync event");
            handler(event.clone());
        }
    }

    fn attach(&self, id: Uuid, handler: SyncHandler) {
        self.handlers.insert(id, handler);
        debug!(context = %id, count = self.handlers.len(), "Sync context attached");
    }

    fn detach(&self, id: Uuid) {
        if self.handlers.remove(&id).is_some() {
            debug!(context = %id, count = self.handlers.len(), "Sync context detached");
        }
    }
}

/// One context's endpoint on the sync transport
///
/// Constructed open; `suspend` detaches ahead of a host-level freeze,
/// `resume` re-attaches the same inbound handler, `close` detaches for
/// good at logout.
pub struct SyncChannel {
    id: Uuid,
    transport: Arc<dyn SyncTransport>,
    handler: SyncHandler,
    open: AtomicBool,
    closed: AtomicBool,
}

impl SyncChannel {
    /// Create a channel and attach it to the transport
    pub fn new(transport: Arc<dyn SyncTransport>, handler: SyncHandler) -> Self {
        let id = Uuid::new_v4();
        transport.attach(id, handler.clone());
        Self {
            id,
            transport,
            handler,
            open: AtomicBool::new(true),
            closed: AtomicBool::new(false),
        }
    }

    /// This context's identity on the transport
    pub fn context_id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }

    /// Broadcast an event; a no-op while the channel is closed
    pub fn send(&self, key: &str, entry: Option<CacheEntry>, action: SyncAction) {
        if !self.is_open() {
            debug!(key = key, "Sync channel closed, not broadcasting");
            return;
        }
        self.transport.publish(SyncEvent {
            origin: self.id,
            key: key.to_string(),
            entry,
            action,
        });
    }

    /// Detach ahead of a host suspend the channel cannot observe the end of
    pub fn suspend(&self) {
        if self.open.swap(false, Ordering::Relaxed) {
            self.transport.detach(self.id);
            debug!(context = %self.id, "Sync channel suspended");
        }
    }

    /// Re-attach the same inbound handler after the host resumes
    ///
    /// A no-op once the channel has been closed for good.
    pub fn resume(&self) {
        if self.closed.load(Ordering::Relaxed) {
            debug!(context = %self.id, "Sync channel closed, ignoring resume");
            return;
        }
        if !self.open.swap(true, Ordering::Relaxed) {
            self.transport.attach(self.id, self.handler.clone());
            debug!(context = %self.id, "Sync channel resumed");
        }
    }

    /// Permanent detach at logout
    pub fn close(&self) {
        self.closed.store(true, Ordering::Relaxed);
        self.suspend();
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        self.close();
    }
}
