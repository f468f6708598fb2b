// SPDX-License-Identifier: GPL-3.0-only

//! Broadcast hub
//!
//! Fans encoded frames out to every connected viewer. Each viewer gets a
//! small bounded queue; `publish` only ever uses `try_send`, so a viewer
//! whose queue is full (or whose connection is gone) simply misses that
//! frame. Nothing is retried and nothing waits on a slow viewer.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, trace};
use uuid::Uuid;

/// Identifies one registered viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewerId(Uuid);

impl ViewerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for ViewerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of one [`BroadcastHub::publish`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub delivered: usize,
    /// Viewers that were full or disconnected and missed this frame
    pub dropped: usize,
}

pub struct BroadcastHub {
    viewers: RwLock<HashMap<ViewerId, mpsc::Sender<Bytes>>>,
    capacity: usize,
}

impl BroadcastHub {
    /// Create an empty hub
    ///
    /// # Arguments
    /// * `capacity` - Frames buffered per viewer before frames are dropped
    pub fn new(capacity: usize) -> Self {
        Self {
            viewers: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Register a viewer
    ///
    /// The returned handle leaves the hub when dropped.
    pub fn join(self: &Arc<Self>) -> ViewerHandle {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = ViewerId::new();

        let count = {
            let mut viewers = self.viewers.write();
            viewers.insert(id, sender);
            viewers.len()
        };
        debug!(viewer = %id, viewers = count, "Viewer joined");

        ViewerHandle {
            id,
            receiver,
            hub: Arc::clone(self),
        }
    }

    /// Remove a viewer
    ///
    /// # Returns
    /// `true` if the viewer was registered, `false` if it had already left
    pub fn leave(&self, id: ViewerId) -> bool {
        let (removed, count) = {
            let mut viewers = self.viewers.write();
            (viewers.remove(&id).is_some(), viewers.len())
        };
        if removed {
            debug!(viewer = %id, viewers = count, "Viewer left");
        }
        removed
    }

    /// Offer `frame` to every registered viewer without waiting
    pub fn publish(&self, frame: Bytes) -> PublishReport {
        let mut report = PublishReport::default();
        let viewers = self.viewers.read();

        for (id, sender) in viewers.iter() {
            // Bytes clones share the buffer
            match sender.try_send(frame.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    trace!(viewer = %id, "Viewer queue full, frame dropped");
                    report.dropped += 1;
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(viewer = %id, "Viewer closed, frame dropped");
                    report.dropped += 1;
                }
            }
        }

        report
    }

    pub fn viewer_count(&self) -> usize {
        self.viewers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewers.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A registered viewer's end of the hub
pub struct ViewerHandle {
    id: ViewerId,
    receiver: mpsc::Receiver<Bytes>,
    hub: Arc<BroadcastHub>,
}

impl ViewerHandle {
    pub fn id(&self) -> ViewerId {
        self.id
    }

    /// Wait for the next frame
    ///
    /// Returns `None` only once the viewer has been removed from the hub
    /// and its queue is drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Bytes, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Leave the hub now instead of on drop
    pub fn leave(self) {
        // Drop does the work
    }
}

impl Drop for ViewerHandle {
    fn drop(&mut self) {
        self.hub.leave(self.id);
    }
}
