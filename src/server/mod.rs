// SPDX-License-Identifier: GPL-3.0-only

//! WebSocket relay server
//!
//! Every accepted connection is both a viewer (it receives binary JPEG
//! frames) and a potential controller (it may send JSON commands).
//!
//! - [`hub`]: non-blocking fan-out of encoded frames
//! - [`protocol`]: control message parsing and reply events
//! - [`session`]: per-connection lifecycle

pub mod hub;
pub mod protocol;
pub mod session;

pub use hub::{BroadcastHub, PublishReport, ViewerHandle, ViewerId};
pub use protocol::{ServerEvent, parse_command};
pub use session::ConnectionSession;

use crate::constants::timing;
use crate::pipelines::video::RecordingController;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub struct RelayServer {
    listener: TcpListener,
    hub: Arc<BroadcastHub>,
    controller: Arc<RecordingController>,
}

impl RelayServer {
    /// Bind the listening socket
    pub async fn bind(
        addr: SocketAddr,
        hub: Arc<BroadcastHub>,
        controller: Arc<RecordingController>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "Relay listening");
        Ok(Self {
            listener,
            hub,
            controller,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` turns true
    ///
    /// Open sessions are told to close and given a short grace period
    /// before they are aborted.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut sessions = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Accepted connection");
                        let session = ConnectionSession::new(
                            peer,
                            Arc::clone(&self.hub),
                            Arc::clone(&self.controller),
                            shutdown.clone(),
                        );
                        sessions.spawn(session.run(stream));
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        tokio::time::sleep(timing::ACCEPT_RETRY_DELAY).await;
                    }
                },
                // Reap finished sessions so the set does not grow
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(sessions = sessions.len(), "Relay shutting down");
        let drained = tokio::time::timeout(timing::SESSION_SHUTDOWN_GRACE, async {
            while sessions.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(remaining = sessions.len(), "Sessions did not close in time, aborting");
            sessions.abort_all();
        }
    }
}
