//! Connection lifecycle
//!
//! One task per accepted socket: perform the WebSocket upgrade, register
//! with the hub, then run the ingress loop and the writer loop until either
//! half fails. The ingress half reads frames and feeds the broadcast queue;
//! the writer half drains the outbound buffer the hub delivers into.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::Result;
use crate::hub::conn::Outbound;
use crate::hub::{ChatMessage, ConnectionHandle, ConnectionId, HubHandle};
use crate::server::config::ServerConfig;
use crate::session::SessionState;

/// Why an ingress loop terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IngressEnd {
    /// Peer sent a close frame or the stream ended
    PeerClosed,
    /// Transport-level read failure
    ReadFailed,
    /// Payload was not a valid chat message
    Malformed,
    /// Peer sent a frame type the protocol does not allow
    ProtocolViolation,
    /// The hub shut down while the connection was live
    HubClosed,
}

impl IngressEnd {
    fn as_str(self) -> &'static str {
        match self {
            IngressEnd::PeerClosed => "peer closed",
            IngressEnd::ReadFailed => "read failed",
            IngressEnd::Malformed => "malformed message",
            IngressEnd::ProtocolViolation => "protocol violation",
            IngressEnd::HubClosed => "hub closed",
        }
    }
}

/// Run one connection to completion
///
/// Every exit path deregisters the connection; deregistration is
/// idempotent with the pruning the dispatch loop may already have done.
pub(crate) async fn run(
    id: ConnectionId,
    socket: TcpStream,
    peer_addr: SocketAddr,
    config: ServerConfig,
    hub: HubHandle,
) {
    let mut session = SessionState::new(id, peer_addr);
    session.start_handshake();

    let ws = match upgrade(socket, &config).await {
        Ok(ws) => ws,
        Err(e) => {
            // Nothing was registered; the socket is simply dropped
            tracing::debug!(
                session_id = %id,
                peer = %peer_addr,
                error = %e,
                "WebSocket upgrade rejected"
            );
            return;
        }
    };
    session.complete_handshake();

    let (handle, outbound_rx) = ConnectionHandle::new(id, hub.config().outbound_capacity);
    hub.register(handle).await;
    tracing::info!(session_id = %id, peer = %peer_addr, "Client connected");

    let send_timeout = hub.config().send_timeout;
    let (sink, stream) = ws.split();

    // Either half terminating tears the whole connection down
    tokio::select! {
        end = ingress_loop(stream, &hub, &mut session) => {
            tracing::debug!(session_id = %id, reason = end.as_str(), "Ingress loop ended");
        }
        () = writer_loop(sink, outbound_rx, send_timeout) => {
            tracing::debug!(session_id = %id, "Writer loop ended");
        }
    }

    hub.deregister(id).await;
    session.close();
    tracing::info!(
        session_id = %id,
        peer = %peer_addr,
        messages = session.messages_received,
        duration_ms = session.duration().as_millis() as u64,
        "Client disconnected"
    );
}

/// Perform the WebSocket upgrade under the handshake deadline
///
/// Rejects requests for any path other than the configured one with a 404
/// before the upgrade completes.
async fn upgrade<S>(socket: S, config: &ServerConfig) -> Result<WebSocketStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let path = config.ws_path.clone();
    let check_path = move |req: &Request, response: Response| {
        if req.uri().path() == path {
            Ok(response)
        } else {
            let mut reject = ErrorResponse::new(None);
            *reject.status_mut() = StatusCode::NOT_FOUND;
            Err(reject)
        }
    };

    match timeout(
        config.handshake_timeout,
        tokio_tungstenite::accept_hdr_async(socket, check_path),
    )
    .await
    {
        Ok(Ok(ws)) => Ok(ws),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "handshake deadline exceeded",
        )
        .into()),
    }
}

/// Read frames from the peer and push decoded messages onto the queue
///
/// Any failure is terminal; there is no retry and no reconnection. A new
/// physical connection starts a fresh loop.
async fn ingress_loop<S>(
    mut stream: SplitStream<WebSocketStream<S>>,
    hub: &HubHandle,
    session: &mut SessionState,
) -> IngressEnd
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(txt)) => match serde_json::from_str::<ChatMessage>(txt.as_str()) {
                Ok(message) => {
                    // Blocks while the broadcast queue is full
                    if hub.submit(session.id, message).await.is_err() {
                        return IngressEnd::HubClosed;
                    }
                    session.on_message();
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.id,
                        error = %e,
                        "Malformed message from peer"
                    );
                    return IngressEnd::Malformed;
                }
            },
            Ok(Message::Binary(_)) => {
                tracing::warn!(session_id = %session.id, "Unexpected binary frame");
                return IngressEnd::ProtocolViolation;
            }
            Ok(Message::Close(_)) => return IngressEnd::PeerClosed,
            // Ping/pong is answered by the protocol layer
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(session_id = %session.id, error = %e, "Read failed");
                return IngressEnd::ReadFailed;
            }
        }
    }

    IngressEnd::PeerClosed
}

/// Drain the outbound buffer into the socket
///
/// Each write runs under the per-send deadline so one unresponsive peer
/// cannot hold its buffer (and the hub's drop accounting) hostage.
async fn writer_loop<S>(
    mut sink: SplitSink<WebSocketStream<S>, Message>,
    mut outbound: mpsc::Receiver<Outbound>,
    send_timeout: Duration,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(cmd) = outbound.recv().await {
        match cmd {
            Outbound::Frame(frame) => match timeout(send_timeout, sink.send(frame)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "Write failed");
                    break;
                }
                Err(_) => {
                    tracing::debug!("Write deadline exceeded");
                    break;
                }
            },
            Outbound::Close => {
                let _ = timeout(send_timeout, sink.send(Message::Close(None))).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upgrade_accepts_configured_path() {
        let (client, server) = tokio::io::duplex(1024);
        let config = ServerConfig::default();

        let server_task = tokio::spawn(async move { upgrade(server, &config).await });
        let client_result = tokio_tungstenite::client_async("ws://localhost/ws", client).await;

        assert!(client_result.is_ok());
        assert!(server_task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_upgrade_rejects_other_path() {
        let (client, server) = tokio::io::duplex(1024);
        let config = ServerConfig::default();

        let server_task = tokio::spawn(async move { upgrade(server, &config).await });
        let client_result = tokio_tungstenite::client_async("ws://localhost/other", client).await;

        assert!(client_result.is_err());
        assert!(server_task.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_upgrade_times_out_on_silent_socket() {
        let (_client, server) = tokio::io::duplex(1024);
        let config = ServerConfig::default().handshake_timeout(Duration::from_millis(50));

        let result = upgrade(server, &config).await;

        assert!(result.is_err());
    }
}
