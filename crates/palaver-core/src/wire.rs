//! Palaver wire format — the on-wire packet shared by client and server.
//!
//! These types ARE the protocol. Every field, every size, every reserved byte
//! is part of the wire format; the header size and payload size are constant
//! across all packets ever exchanged, and changing either is a breaking
//! change.
//!
//! All types are #[repr(C, packed)] for deterministic layout and use
//! zerocopy derives for safe, allocation-free serialization. There is no
//! unsafe code in this module.

use sha1::{Digest, Sha1};
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Constants ─────────────────────────────────────────────────────────────────

/// Protocol version carried in every packet header. Peers must agree at
/// login; the transport otherwise does not branch on it.
pub const PROTOCOL_VERSION: u16 = 2;

/// Well-known TCP port for this deployment.
pub const DEFAULT_PORT: u16 = 58289;

/// Bytes of message body carried per packet. The final chunk of a message is
/// zero-padded up to this size.
pub const PACKET_DATASIZE: usize = 256;

/// Fixed header size, reserved bytes included.
pub const HEADER_SIZE: usize = 128;

/// Total wire size of one packet: header plus payload.
pub const PACKET_SIZE: usize = HEADER_SIZE + PACKET_DATASIZE;

/// Username field width, NUL terminator included. Usernames are at most
/// `USERNAME_MAX - 1` bytes on the wire.
pub const USERNAME_MAX: usize = 16;

/// SHA-1 digest width.
pub const CHECKSUM_LEN: usize = 20;

/// Largest message body expressible on the wire: `packet_count` is a u16.
pub const MAX_BODY: usize = PACKET_DATASIZE * u16::MAX as usize;

// ── Packet ────────────────────────────────────────────────────────────────────

/// The fixed 128-byte header preceding every payload.
///
/// The receiver can fully describe, verify, and place a chunk before looking
/// at a single byte of payload.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct PacketHeader {
    /// Protocol version of the sending peer. Compared for equality at login.
    pub version: u16,

    /// Message type code. See [`crate::message::MessageKind`].
    pub message_type: u16,

    /// Total number of packets in this message. Never zero — a zero-length
    /// body still transits as one packet carrying only metadata.
    pub packet_count: u16,

    /// 0-based index of this packet within the message.
    pub packet_index: u16,

    /// Length of the whole message body in bytes, across all packets.
    pub total_length: u64,

    /// NUL-padded sender username. All zeroes when the sender is the server.
    pub sender_name: [u8; USERNAME_MAX],

    /// NUL-padded receiver username. Set only for whispers and server
    /// replies targeted at one user.
    pub receiver_name: [u8; USERNAME_MAX],

    /// SHA-1 digest of the full 256-byte payload region, padding included.
    /// All zeroes on acknowledgement packets, which carry no payload data.
    pub checksum: [u8; CHECKSUM_LEN],

    /// Reserved. Must be zero. Pads the header to 128 bytes so future fields
    /// do not move the payload offset.
    pub reserved: [u8; 60],
}

assert_eq_size!(PacketHeader, [u8; HEADER_SIZE]);

/// One wire transmission unit: fixed header plus fixed payload.
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Packet {
    pub header: PacketHeader,
    /// Exactly [`PACKET_DATASIZE`] bytes; zero-padded on the final short
    /// chunk. Padding is transmitted and checksummed but never interpreted.
    pub payload: [u8; PACKET_DATASIZE],
}

assert_eq_size!(Packet, [u8; PACKET_SIZE]);

impl Packet {
    /// Decode a packet from exactly [`PACKET_SIZE`] bytes.
    pub fn parse(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() != PACKET_SIZE {
            return Err(WireError::MalformedPacket(buf.len()));
        }
        Packet::read_from(buf).ok_or(WireError::MalformedPacket(buf.len()))
    }

    /// Build a bodiless acknowledgement packet carrying only a type code.
    ///
    /// Used for AckOk / AckChecksumError / TransferEnd during a transfer.
    pub fn ack(message_type: u16) -> Self {
        Packet {
            header: PacketHeader {
                version: PROTOCOL_VERSION,
                message_type,
                packet_count: 1,
                packet_index: 0,
                total_length: 0,
                sender_name: [0u8; USERNAME_MAX],
                receiver_name: [0u8; USERNAME_MAX],
                checksum: [0u8; CHECKSUM_LEN],
                reserved: [0u8; 60],
            },
            payload: [0u8; PACKET_DATASIZE],
        }
    }
}

// ── Checksum ──────────────────────────────────────────────────────────────────

/// SHA-1 over a payload region.
///
/// Always computed over the full padded [`PACKET_DATASIZE`] buffer, never
/// just the valid prefix — both sides must hash identical bytes.
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha1::new();
    hasher.update(payload);
    hasher.finalize().into()
}

// ── Username fields ───────────────────────────────────────────────────────────

/// Encode a username into its fixed NUL-padded wire field.
/// Truncated to `USERNAME_MAX - 1` bytes so the terminator always fits.
pub fn encode_name(name: &str) -> [u8; USERNAME_MAX] {
    let mut field = [0u8; USERNAME_MAX];
    let bytes = name.as_bytes();
    let len = bytes.len().min(USERNAME_MAX - 1);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// Decode a NUL-padded wire field back into a username.
pub fn decode_name(field: &[u8; USERNAME_MAX]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(USERNAME_MAX);
    String::from_utf8_lossy(&field[..end]).into_owned()
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("packet buffer is {0} bytes, expected exactly {}", PACKET_SIZE)]
    MalformedPacket(usize),

    #[error("unknown message type code: 0x{0:04x}")]
    UnknownMessageType(u16),

    #[error("body length {0} exceeds maximum {}", MAX_BODY)]
    BodyTooLarge(usize),
}

// ── Tests ─────────────────────────────────────────────────────────────────────
