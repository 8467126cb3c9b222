use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{StatusCode, header::ORIGIN};
use tokio_tungstenite::tungstenite::{Bytes, Message};
use tracing::{debug, error, info, warn};

use super::actor::RoomManagerHandle;
use super::messages::{ClientMessage, ServerMessage};
use super::types::{ConnectionId, OutboundMessage, RelayError};
use crate::config::{ConnectionSettings, OriginPolicy};

pub struct SignalingServer {
    listener: TcpListener,
    handle: RoomManagerHandle,
    settings: ConnectionSettings,
}

impl SignalingServer {
    /// Bind the listener and start a room manager owned by this server
    pub async fn bind(addr: &str, settings: ConnectionSettings) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Signaling server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            handle: RoomManagerHandle::spawn(),
            settings,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> RoomManagerHandle {
        self.handle.clone()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();
            let settings = self.settings.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle, settings).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RoomManagerHandle,
    settings: ConnectionSettings,
) -> Result<(), RelayError> {
    let handshake = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        check_origin(&settings.origins, req, resp)
    });
    let ws_stream = tokio::time::timeout(settings.pong_timeout, handshake)
        .await
        .map_err(|_| RelayError::HandshakeTimeout)??;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    let id = handle.register(tx.clone()).await?;
    let guard = handle.membership_guard(id);
    info!("WebSocket connection {} from {}", id, addr);

    let hello = ServerMessage::Connected { id };
    let _ = tx.send(OutboundMessage::from(serde_json::to_string(&hello)?));
    // the actor holds the other sender; once it drops the outbox the writer drains and stops
    drop(tx);

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
        // flushes the reply to a client close, or starts the close handshake ourselves
        let _ = ws_tx.close().await;
    });

    let mut ping_interval = tokio::time::interval(settings.ping_interval);
    // first tick completes immediately
    ping_interval.tick().await;
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    loop {
        let pong_timeout = async {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if pong_deadline.is_some() {
                    continue;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                pong_deadline = Some(tokio::time::Instant::now() + settings.pong_timeout);
                debug!("Ping sent to {}", id);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", id);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        if let Err(e) = handle_text_message(&text, id, &handle).await {
                            warn!("Message handling error from {}: {}", id, e);
                            if matches!(e, RelayError::ActorClosed) {
                                break;
                            }
                        }
                    }
                    Message::Pong(_) => {
                        pong_deadline = None;
                        debug!("Pong received from {}", id);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", id);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // disconnecting drops the actor's outbox sender, which lets the writer drain and close
    drop(guard);
    drop(ctrl_tx);
    let abort = send_task.abort_handle();
    if tokio::time::timeout(settings.pong_timeout, send_task).await.is_err() {
        debug!("Writer for {} did not finish, aborting", id);
        abort.abort();
    }
    info!("WebSocket disconnected: {}", id);

    Ok(())
}

/// Dispatch one inbound text frame. Malformed frames are dropped.
async fn handle_text_message(
    text: &str,
    id: ConnectionId,
    handle: &RoomManagerHandle,
) -> Result<(), RelayError> {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("Dropping invalid message from {}: {}", id, e);
            return Ok(());
        }
    };

    let Some(room) = client_msg.room() else {
        debug!("Dropping message without room from {}", id);
        return Ok(());
    };

    match client_msg.into_forward(id) {
        None => handle.join(id, room).await,
        Some(event) => {
            let message = OutboundMessage::from(serde_json::to_string(&event)?);
            handle.relay(id, room, message).await.map(|_| ())
        }
    }
}

fn check_origin(
    policy: &OriginPolicy,
    req: &Request,
    resp: Response,
) -> Result<Response, ErrorResponse> {
    let origin = req.headers().get(ORIGIN).and_then(|v| v.to_str().ok());
    if policy.allows(origin) {
        return Ok(resp);
    }

    warn!("Rejected handshake from origin {:?}", origin);
    let mut err = ErrorResponse::new(Some("origin not allowed".to_string()));
    *err.status_mut() = StatusCode::FORBIDDEN;
    Err(err)
}
