// SPDX-License-Identifier: GPL-3.0-only

//! Connection session
//!
//! One per accepted WebSocket. The session joins the broadcast hub and then
//! runs two halves:
//!
//! - a spawned command loop reading control messages and applying them to
//!   the recording controller
//! - the outbound loop writing frames from the hub and replies from the
//!   command loop to the socket
//!
//! Whichever way the connection ends, the command loop is aborted and the
//! viewer handle is dropped, which removes the viewer from the hub. An
//! active recording is never touched by a disconnect.

use super::hub::BroadcastHub;
use super::protocol::{ServerEvent, parse_command};
use crate::constants::feed;
use crate::pipelines::video::RecordingController;
use futures::stream::SplitStream;
use futures::{Sink, SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{WebSocketStream, accept_async};
use tracing::{debug, info, warn};

type WsReader = SplitStream<WebSocketStream<TcpStream>>;

pub struct ConnectionSession {
    peer: SocketAddr,
    hub: Arc<BroadcastHub>,
    controller: Arc<RecordingController>,
    shutdown: watch::Receiver<bool>,
}

impl ConnectionSession {
    pub fn new(
        peer: SocketAddr,
        hub: Arc<BroadcastHub>,
        controller: Arc<RecordingController>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            peer,
            hub,
            controller,
            shutdown,
        }
    }

    /// Run the session until the peer disconnects or the server shuts down
    pub async fn run(self, stream: TcpStream) {
        let peer = self.peer;
        match self.serve(stream).await {
            Ok(()) => info!(%peer, "Connection closed"),
            Err(e) => debug!(%peer, error = %e, "Connection ended with error"),
        }
    }

    async fn serve(mut self, stream: TcpStream) -> Result<(), tungstenite::Error> {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %self.peer, error = %e, "Could not set TCP_NODELAY");
        }

        let socket = accept_async(stream).await?;
        let (mut writer, reader) = socket.split();

        let mut viewer = self.hub.join();
        info!(peer = %self.peer, viewer = %viewer.id(), viewers = self.hub.viewer_count(), "Viewer connected");

        let (reply_tx, mut reply_rx) = mpsc::channel(feed::REPLY_BUFFER);
        let command_task = tokio::spawn(command_loop(
            reader,
            Arc::clone(&self.controller),
            reply_tx,
            self.peer,
        ));

        let result = loop {
            if *self.shutdown.borrow() {
                let close = CloseFrame {
                    code: CloseCode::Away,
                    reason: "server shutting down".into(),
                };
                // Best effort, the peer may already be gone
                let _ = writer.send(Message::Close(Some(close))).await;
                break Ok(());
            }

            tokio::select! {
                frame = viewer.recv() => match frame {
                    Some(bytes) => {
                        if let Err(e) = writer.send(Message::binary(bytes)).await {
                            break Err(e);
                        }
                    }
                    None => break Ok(()),
                },
                reply = reply_rx.recv() => match reply {
                    Some(event) => {
                        if let Err(e) = send_event(&mut writer, &event).await {
                            break Err(e);
                        }
                    }
                    // Command loop finished: the peer closed its side
                    None => break Ok(()),
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        // Sender gone means the server is gone too
                        break Ok(());
                    }
                }
            }
        };

        command_task.abort();
        drop(viewer);
        result
    }
}

async fn send_event<S>(writer: &mut S, event: &ServerEvent) -> Result<(), tungstenite::Error>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    match event.to_json() {
        Ok(json) => writer.send(Message::text(json)).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize reply");
            Ok(())
        }
    }
}

/// Read control messages until the peer closes
async fn command_loop(
    mut reader: WsReader,
    controller: Arc<RecordingController>,
    replies: mpsc::Sender<ServerEvent>,
    peer: SocketAddr,
) {
    while let Some(message) = reader.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(data)) => {
                debug!(%peer, bytes = data.len(), "Ignoring binary message from client");
                continue;
            }
            Ok(_) => continue,
            Err(e) => {
                debug!(%peer, error = %e, "Read failed");
                break;
            }
        };

        let command = match parse_command(text.as_str()) {
            Ok(Some(command)) => command,
            Ok(None) => {
                debug!(%peer, message = %text.as_str(), "Ignoring unknown action");
                continue;
            }
            Err(e) => {
                warn!(%peer, error = %e, "Discarding malformed control message");
                continue;
            }
        };

        debug!(%peer, ?command, "Control command");

        // Opening and finalising files is blocking I/O
        let worker = Arc::clone(&controller);
        let reply = match tokio::task::spawn_blocking(move || worker.apply(command)).await {
            Ok(Ok(outcome)) => ServerEvent::from_outcome(&outcome, controller.upload_root()),
            Ok(Err(e)) => {
                warn!(%peer, error = %e, "Recording command failed");
                Some(ServerEvent::error(&e))
            }
            Err(e) => {
                warn!(%peer, error = %e, "Recording command task failed");
                Some(ServerEvent::Error {
                    message: "internal error".into(),
                })
            }
        };

        if let Some(event) = reply {
            if replies.send(event).await.is_err() {
                break;
            }
        }
    }
}
