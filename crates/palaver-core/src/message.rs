//! Application-level message model.
//!
//! A [`Message`] is the logical unit the chat layer deals in — one login,
//! one broadcast, one whisper, one server reply — independent of how the
//! transport chunks it into packets.

use bytes::Bytes;

use crate::wire::{WireError, PROTOCOL_VERSION};

/// Message type discriminator. The values are the u16 wire codes.
///
/// The control kinds (AckOk, AckChecksumError, TransferEnd) are internal to
/// the transport; they never reach the router as ordinary traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageKind {
    /// Chunk accepted, peer may send the next one.
    AckOk = 0x0001,
    /// Chunk checksum mismatch, peer must resend the same chunk.
    AckChecksumError = 0x000e,
    /// Transfer cancelled partway through; partial state is discarded.
    TransferEnd = 0x000f,

    /// Client presents its username and protocol version.
    Login = 0x1001,
    /// Client-to-client private message.
    Whisper = 0x1002,
    /// Client message to all other connected users.
    Broadcast = 0x1003,
    /// Client asks the server to run a named command.
    Command = 0x100f,

    /// Server notice to all connected users.
    Announce = 0x2001,
    /// Server success reply to one user.
    Response = 0x2002,
    /// Something went wrong on the server's side.
    ServerError = 0x200e,
    /// The user asked for something invalid.
    UserError = 0x200f,

    /// Sentinel for a field that has not been set. Never valid on the wire.
    Unset = 0xffff,
}

impl MessageKind {
    /// The u16 code carried in the packet header.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Transport-internal control kinds, invisible to the chat layer.
    pub fn is_control(self) -> bool {
        matches!(
            self,
            MessageKind::AckOk | MessageKind::AckChecksumError | MessageKind::TransferEnd
        )
    }
}

impl TryFrom<u16> for MessageKind {
    type Error = WireError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        match code {
            0x0001 => Ok(MessageKind::AckOk),
            0x000e => Ok(MessageKind::AckChecksumError),
            0x000f => Ok(MessageKind::TransferEnd),
            0x1001 => Ok(MessageKind::Login),
            0x1002 => Ok(MessageKind::Whisper),
            0x1003 => Ok(MessageKind::Broadcast),
            0x100f => Ok(MessageKind::Command),
            0x2001 => Ok(MessageKind::Announce),
            0x2002 => Ok(MessageKind::Response),
            0x200e => Ok(MessageKind::ServerError),
            0x200f => Ok(MessageKind::UserError),
            0xffff => Ok(MessageKind::Unset),
            other => Err(WireError::UnknownMessageType(other)),
        }
    }
}

impl From<MessageKind> for u16 {
    fn from(kind: MessageKind) -> u16 {
        kind as u16
    }
}

/// One application-level message.
///
/// `body` is [`Bytes`] so the router's per-recipient fan-out clones share
/// one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    /// Sending username. Empty when the sender is the server.
    pub sender: String,
    /// Receiving username. Set only for whispers and server replies
    /// targeted at one user.
    pub receiver: String,
    pub body: Bytes,
    /// Protocol version the producing peer declared. Stamped with
    /// [`PROTOCOL_VERSION`] by the constructors; carries the peer's declared
    /// value on received messages and is compared at login.
    pub version: u16,
}

impl Message {
    fn new(kind: MessageKind, sender: &str, receiver: &str, body: Bytes) -> Self {
        Message {
            kind,
            sender: sender.to_owned(),
            receiver: receiver.to_owned(),
            body,
            version: PROTOCOL_VERSION,
        }
    }

    /// Login request: metadata only, zero-length body.
    pub fn login(username: &str) -> Self {
        Message::new(MessageKind::Login, username, "", Bytes::new())
    }

    pub fn broadcast(sender: &str, text: &str) -> Self {
        Message::new(
            MessageKind::Broadcast,
            sender,
            "",
            Bytes::copy_from_slice(text.as_bytes()),
        )
    }

    pub fn whisper(sender: &str, receiver: &str, text: &str) -> Self {
        Message::new(
            MessageKind::Whisper,
            sender,
            receiver,
            Bytes::copy_from_slice(text.as_bytes()),
        )
    }

    /// Command request; `line` is the command name and its arguments.
    pub fn command(sender: &str, line: &str) -> Self {
        Message::new(
            MessageKind::Command,
            sender,
            "",
            Bytes::copy_from_slice(line.as_bytes()),
        )
    }

    /// Server notice to everyone.
    pub fn announce(text: &str) -> Self {
        Message::new(
            MessageKind::Announce,
            "",
            "",
            Bytes::copy_from_slice(text.as_bytes()),
        )
    }

    /// Server success reply.
    pub fn response(text: &str) -> Self {
        Message::new(
            MessageKind::Response,
            "",
            "",
            Bytes::copy_from_slice(text.as_bytes()),
        )
    }

    pub fn server_error(text: &str) -> Self {
        Message::new(
            MessageKind::ServerError,
            "",
            "",
            Bytes::copy_from_slice(text.as_bytes()),
        )
    }

    pub fn user_error(text: &str) -> Self {
        Message::new(
            MessageKind::UserError,
            "",
            "",
            Bytes::copy_from_slice(text.as_bytes()),
        )
    }

    /// An aborted transfer, surfaced as data so callers can retry.
    pub fn transfer_end() -> Self {
        Message::new(MessageKind::TransferEnd, "", "", Bytes::new())
    }

    /// Target this message at one user (server replies).
    pub fn addressed_to(mut self, receiver: &str) -> Self {
        self.receiver = receiver.to_owned();
        self
    }

    /// The body interpreted as text, for display and command parsing.
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
