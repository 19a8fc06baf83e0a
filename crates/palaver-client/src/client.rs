//! The connected client: login handshake, sends, and the receive loop.

use tokio::net::{TcpStream, ToSocketAddrs};

use palaver_core::transport::{self, Inbound, TransportError};
use palaver_core::wire::USERNAME_MAX;
use palaver_core::{Message, MessageKind};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("login rejected: {reason}")]
    LoginRejected {
        kind: MessageKind,
        reason: String,
    },

    #[error("username must be 1 to {} bytes", USERNAME_MAX - 1)]
    InvalidUsername,

    #[error("server closed the connection")]
    ConnectionClosed,

    #[error("unexpected reply to login: {0:?}")]
    UnexpectedReply(MessageKind),
}

/// A logged-in chat session. Owns the socket for its whole lifetime.
pub struct ChatClient {
    stream: TcpStream,
    username: String,
}

impl ChatClient {
    /// Connect and perform the login handshake.
    ///
    /// The server answers a Login with Response on success, or with a
    /// UserError/ServerError explaining the refusal — surfaced here as
    /// [`ClientError::LoginRejected`].
    pub async fn login(addr: impl ToSocketAddrs, username: &str) -> Result<Self, ClientError> {
        if username.is_empty() || username.len() > USERNAME_MAX - 1 {
            return Err(ClientError::InvalidUsername);
        }

        let mut stream = TcpStream::connect(addr).await?;
        transport::send_message(&mut stream, &Message::login(username)).await?;

        match transport::recv_message(&mut stream).await? {
            Inbound::Msg(reply) => match reply.kind {
                MessageKind::Response => {
                    tracing::debug!(username, "logged in");
                    Ok(Self {
                        stream,
                        username: username.to_owned(),
                    })
                }
                kind @ (MessageKind::UserError | MessageKind::ServerError) => {
                    Err(ClientError::LoginRejected {
                        kind,
                        reason: reply.body_text().into_owned(),
                    })
                }
                other => Err(ClientError::UnexpectedReply(other)),
            },
            Inbound::Closed => Err(ClientError::ConnectionClosed),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Send any message as-is.
    pub async fn send(&mut self, message: &Message) -> Result<(), ClientError> {
        transport::send_message(&mut self.stream, message)
            .await
            .map_err(Into::into)
    }

    pub async fn broadcast(&mut self, text: &str) -> Result<(), ClientError> {
        let message = Message::broadcast(&self.username, text);
        self.send(&message).await
    }

    pub async fn whisper(&mut self, to: &str, text: &str) -> Result<(), ClientError> {
        let message = Message::whisper(&self.username, to, text);
        self.send(&message).await
    }

    /// Ask the server to run a command, e.g. `"who"`.
    pub async fn command(&mut self, line: &str) -> Result<(), ClientError> {
        let message = Message::command(&self.username, line);
        self.send(&message).await
    }

    /// Receive the next message from the server. `None` means the server
    /// closed the connection. Aborted transfers are skipped internally —
    /// the peer already gave up on that message.
    pub async fn next_message(&mut self) -> Result<Option<Message>, ClientError> {
        loop {
            match transport::recv_message(&mut self.stream).await? {
                Inbound::Msg(m) if m.kind == MessageKind::TransferEnd => continue,
                Inbound::Msg(m) => return Ok(Some(m)),
                Inbound::Closed => return Ok(None),
            }
        }
    }
}
