//! Per-connection worker — one task per accepted socket.
//!
//! Lifecycle: Connecting → Authenticated → Relaying → Closing → Closed.
//! The worker exclusively owns its socket. While relaying it multiplexes two
//! blocking sources: the socket (inbound messages, handed to the router) and
//! its outbound queue (messages the router decided this client should get),
//! so a slow client never blocks delivery to other clients.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::mpsc;

use palaver_core::transport::{self, Inbound};
use palaver_core::wire::PROTOCOL_VERSION;
use palaver_core::{Message, MessageKind};

use crate::registry::{ConnectionRegistry, Peer, RegistryError};
use crate::router::Router;

/// Drive one connection from accept to teardown.
pub async fn run(
    mut stream: TcpStream,
    addr: SocketAddr,
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
) {
    // ── Connecting ───────────────────────────────────────────────────────
    let login = match transport::recv_message(&mut stream).await {
        Ok(Inbound::Msg(m)) => m,
        Ok(Inbound::Closed) => {
            tracing::debug!(%addr, "connection closed before login");
            return;
        }
        Err(e) => {
            tracing::warn!(%addr, error = %e, "transport error before login");
            return;
        }
    };

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let peer = match authenticate(&login, &registry, outbound_tx) {
        Ok(peer) => peer,
        Err(refused) => {
            tracing::info!(%addr, reason = %refused, "login refused");
            let _ = transport::send_message(&mut stream, &refused.into_reply()).await;
            return;
        }
    };

    // ── Authenticated ────────────────────────────────────────────────────
    let welcome = Message::response("").addressed_to(&peer.username);
    if let Err(e) = transport::send_message(&mut stream, &welcome).await {
        tracing::warn!(peer = %peer.username, error = %e, "failed to confirm login");
        registry.unregister(&peer);
        return;
    }

    tracing::info!(peer = %peer.username, %addr, "user logged in");

    // Everyone hears about the newcomer — the newcomer included, whose copy
    // doubles as feedback that the login went through.
    router.dispatch(
        Message::announce(&format!("{} has joined!", peer.username)),
        None,
    );

    // ── Relaying ─────────────────────────────────────────────────────────
    relay(&mut stream, &peer, &router, outbound_rx).await;

    // ── Closing ──────────────────────────────────────────────────────────
    registry.unregister(&peer);
    tracing::info!(peer = %peer.username, "user disconnecting");
    router.dispatch(
        Message::announce(&format!("User \"{}\" has disconnected.", peer.username)),
        None,
    );
}

/// Reasons a connection is refused at login. Each maps onto exactly one
/// typed reply, sent before the socket is closed.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("first message was not a login")]
    NotLoggedInYet,

    #[error("declared protocol version {0}, server runs {}", PROTOCOL_VERSION)]
    VersionMismatch(u16),

    #[error("empty username")]
    EmptyUsername,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl LoginError {
    /// The reply the refused client sees. A full server is the server's
    /// problem; everything else is the client's.
    fn into_reply(self) -> Message {
        match self {
            LoginError::NotLoggedInYet => {
                Message::user_error("Need to login before anything else")
            }
            LoginError::VersionMismatch(_) => {
                Message::user_error("Incorrect application version")
            }
            LoginError::EmptyUsername => Message::user_error("A username is required"),
            LoginError::Registry(RegistryError::ServerFull(_)) => {
                Message::server_error("Server is full")
            }
            LoginError::Registry(RegistryError::UsernameTaken(_)) => {
                Message::user_error("That username is already taken")
            }
        }
    }
}

/// Validate the first message of a connection and claim a registry slot.
fn authenticate(
    login: &Message,
    registry: &ConnectionRegistry,
    outbound: mpsc::UnboundedSender<Message>,
) -> Result<Peer, LoginError> {
    if login.kind != MessageKind::Login {
        return Err(LoginError::NotLoggedInYet);
    }
    if login.version != PROTOCOL_VERSION {
        return Err(LoginError::VersionMismatch(login.version));
    }
    let username = login.sender.as_str();
    if username.is_empty() {
        return Err(LoginError::EmptyUsername);
    }

    Ok(registry.register(username, outbound)?)
}

/// The relaying loop. Returns when the connection is done for any reason;
/// the caller owns teardown.
async fn relay(
    stream: &mut TcpStream,
    peer: &Peer,
    router: &Router,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        tokio::select! {
            // Socket readiness first, then the full lock-step receive: the
            // receive itself is not cancellation-safe, readiness is.
            ready = stream.readable() => {
                if let Err(e) = ready {
                    tracing::warn!(peer = %peer.username, error = %e, "socket failed");
                    return;
                }
                match transport::recv_message(stream).await {
                    Ok(Inbound::Msg(m)) if m.kind == MessageKind::TransferEnd => {
                        // The client aborted a transfer on its side. It
                        // already knows; nothing to route and nothing to say.
                        tracing::debug!(peer = %peer.username, "client transfer error");
                    }
                    Ok(Inbound::Msg(m)) => router.dispatch(m, Some(peer)),
                    Ok(Inbound::Closed) => return,
                    Err(e) => {
                        tracing::warn!(peer = %peer.username, error = %e, "transport error, dropping connection");
                        return;
                    }
                }
            }

            queued = outbound.recv() => {
                let Some(message) = queued else { return };
                if let Err(e) = transport::send_message(stream, &message).await {
                    tracing::warn!(peer = %peer.username, error = %e, "delivery failed, dropping connection");
                    return;
                }
            }
        }
    }
}
