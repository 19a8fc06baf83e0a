//! Chunked reliable transport — splits a [`Message`] into fixed-size
//! checksummed packets and reassembles it on the far side.
//!
//! The exchange is synchronous lock-step: the sender transmits one packet and
//! waits for the receiver's acknowledgement before advancing. A checksum
//! mismatch is healed locally by resending the same chunk; it never surfaces
//! to the application layer. Everything here is generic over the stream type
//! so tests drive it over an in-memory duplex pipe.

use std::io;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zerocopy::AsBytes;

use crate::message::{Message, MessageKind};
use crate::wire::{
    checksum, decode_name, encode_name, Packet, PacketHeader, WireError, MAX_BODY,
    PACKET_DATASIZE, PACKET_SIZE, PROTOCOL_VERSION,
};

/// Resend budget per chunk. A persistently corrupt channel has to abort
/// eventually rather than resend the same chunk forever.
pub const MAX_CHUNK_RETRIES: u32 = 8;

/// Outcome of one receive call.
#[derive(Debug)]
pub enum Inbound {
    /// A fully reassembled message. May be [`MessageKind::TransferEnd`] if
    /// the peer cancelled partway — callers treat that as "no message".
    Msg(Message),
    /// The peer closed the stream at a packet boundary.
    Closed,
}

/// Errors that terminate a transfer. Checksum mismatches are handled
/// internally and have no variant here.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket error during transfer: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("chunk {index} still rejected after {retries} resends")]
    RetriesExhausted { index: u16, retries: u32 },

    #[error("expected an acknowledgement, peer sent type 0x{0:04x}")]
    UnexpectedAck(u16),
}

/// How many packets a body of `len` bytes occupies. Minimum one, so that
/// metadata-only messages still transit as a single packet.
pub fn packet_count(len: usize) -> usize {
    if len == 0 {
        1
    } else {
        len.div_ceil(PACKET_DATASIZE)
    }
}

/// Valid bytes in the final chunk of a `total`-byte body. An exact multiple
/// of the chunk size must yield a full chunk, never zero.
fn final_chunk_len(total: usize) -> usize {
    match total % PACKET_DATASIZE {
        0 if total > 0 => PACKET_DATASIZE,
        rem => rem,
    }
}

// ── Send ──────────────────────────────────────────────────────────────────────

/// Send one message as a lock-step sequence of checksummed packets.
///
/// Aborts the whole transfer (after a best-effort TransferEnd to the peer)
/// on any I/O error, on an unexpected response type, or once a chunk has
/// exhausted its resend budget.
pub async fn send_message<S>(stream: &mut S, message: &Message) -> Result<(), TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if message.body.len() > MAX_BODY {
        return Err(WireError::BodyTooLarge(message.body.len()).into());
    }

    let count = packet_count(message.body.len());
    let sender_name = encode_name(&message.sender);
    let receiver_name = encode_name(&message.receiver);

    for index in 0..count {
        let start = index * PACKET_DATASIZE;
        let end = (start + PACKET_DATASIZE).min(message.body.len());

        let mut payload = [0u8; PACKET_DATASIZE];
        payload[..end - start].copy_from_slice(&message.body[start..end]);

        let packet = Packet {
            header: PacketHeader {
                version: PROTOCOL_VERSION,
                message_type: message.kind.code(),
                packet_count: count as u16,
                packet_index: index as u16,
                total_length: message.body.len() as u64,
                sender_name,
                receiver_name,
                checksum: checksum(&payload),
                reserved: [0u8; 60],
            },
            payload,
        };

        let mut retries = 0u32;
        loop {
            if let Err(e) = write_packet(stream, &packet).await {
                abort_transfer(stream).await;
                return Err(e.into());
            }

            let response = match read_packet(stream).await {
                Ok(Some(p)) => p,
                Ok(None) => {
                    abort_transfer(stream).await;
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "peer closed while an acknowledgement was due",
                    )
                    .into());
                }
                Err(e) => {
                    abort_transfer(stream).await;
                    return Err(e);
                }
            };

            let response_type = response.header.message_type;
            match MessageKind::try_from(response_type) {
                Ok(MessageKind::AckOk) => break,
                Ok(MessageKind::AckChecksumError) => {
                    retries += 1;
                    if retries > MAX_CHUNK_RETRIES {
                        abort_transfer(stream).await;
                        return Err(TransportError::RetriesExhausted {
                            index: index as u16,
                            retries: MAX_CHUNK_RETRIES,
                        });
                    }
                    tracing::debug!(index, retries, "chunk rejected by peer, resending");
                }
                _ => {
                    abort_transfer(stream).await;
                    return Err(TransportError::UnexpectedAck(response_type));
                }
            }
        }
    }

    Ok(())
}

// ── Receive ───────────────────────────────────────────────────────────────────

/// Partially reassembled message. Metadata comes from the first chunk seen.
struct Assembly {
    kind: MessageKind,
    sender: String,
    receiver: String,
    version: u16,
    count: u16,
    total_length: usize,
    body: BytesMut,
}

impl Assembly {
    fn into_message(self) -> Message {
        Message {
            kind: self.kind,
            sender: self.sender,
            receiver: self.receiver,
            body: self.body.freeze(),
            version: self.version,
        }
    }
}

/// Receive one complete message, acknowledging each chunk.
///
/// Loops until the final chunk is acknowledged, the peer cancels with
/// TransferEnd, or the stream closes. Corrupt chunks are answered with
/// AckChecksumError and awaited again; the peer resends without advancing.
pub async fn recv_message<S>(stream: &mut S) -> Result<Inbound, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut assembly: Option<Assembly> = None;

    loop {
        let packet = match read_packet(stream).await? {
            Some(p) => p,
            None => return Ok(Inbound::Closed),
        };

        // Copy packed fields to locals to avoid unaligned reference UB.
        let message_type = packet.header.message_type;
        let count = packet.header.packet_count;
        let index = packet.header.packet_index;
        let total_length = packet.header.total_length as usize;

        // TransferEnd is honored before any verification: the peer is
        // telling us the rest of the message will never arrive.
        if message_type == MessageKind::TransferEnd.code() {
            tracing::debug!("peer cancelled transfer, discarding partial message");
            return Ok(Inbound::Msg(Message::transfer_end()));
        }

        let computed = checksum(&packet.payload);
        if computed != packet.header.checksum {
            tracing::debug!(
                index,
                declared = hex::encode(packet.header.checksum),
                computed = hex::encode(computed),
                "chunk checksum mismatch, requesting resend"
            );
            write_packet(stream, &Packet::ack(MessageKind::AckChecksumError.code())).await?;
            continue;
        }

        // The checksum covers only the payload; header fields that fail to
        // decode or describe impossible geometry are treated as corruption.
        let kind = match MessageKind::try_from(message_type) {
            Ok(k) => k,
            Err(_) => {
                tracing::debug!(message_type, "unknown message type, requesting resend");
                write_packet(stream, &Packet::ack(MessageKind::AckChecksumError.code())).await?;
                continue;
            }
        };
        if count == 0 || index >= count || count as usize != packet_count(total_length) {
            tracing::debug!(count, index, total_length, "inconsistent chunk geometry");
            write_packet(stream, &Packet::ack(MessageKind::AckChecksumError.code())).await?;
            continue;
        }
        if let Some(started) = &assembly {
            if count != started.count || total_length != started.total_length {
                tracing::debug!(count, total_length, "chunk disagrees with message in progress");
                write_packet(stream, &Packet::ack(MessageKind::AckChecksumError.code())).await?;
                continue;
            }
        }

        let assembly = assembly.get_or_insert_with(|| Assembly {
            kind,
            sender: decode_name(&packet.header.sender_name),
            receiver: decode_name(&packet.header.receiver_name),
            version: packet.header.version,
            count,
            total_length,
            body: BytesMut::zeroed(total_length),
        });

        let valid = if index + 1 == assembly.count {
            final_chunk_len(assembly.total_length)
        } else {
            PACKET_DATASIZE
        };
        // In bounds: index < count and the geometry checks above tie count
        // and total_length together, so the final chunk ends exactly at
        // total_length and every earlier one ends at or before it.
        let offset = index as usize * PACKET_DATASIZE;
        assembly.body[offset..offset + valid].copy_from_slice(&packet.payload[..valid]);

        let complete = index + 1 == assembly.count;

        write_packet(stream, &Packet::ack(MessageKind::AckOk.code())).await?;

        if complete {
            break;
        }
    }

    // The loop only breaks after storing an assembly.
    match assembly {
        Some(done) => Ok(Inbound::Msg(done.into_message())),
        None => Err(io::Error::new(io::ErrorKind::InvalidData, "no assembled message").into()),
    }
}

// ── Framing ───────────────────────────────────────────────────────────────────

async fn write_packet<S>(stream: &mut S, packet: &Packet) -> Result<(), io::Error>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(packet.as_bytes()).await?;
    stream.flush().await
}

/// Read exactly one packet. `Ok(None)` is a clean close: the peer went away
/// at a packet boundary. EOF partway through a packet is an error.
async fn read_packet<S>(stream: &mut S) -> Result<Option<Packet>, TransportError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; PACKET_SIZE];
    let mut filled = 0;

    while filled < PACKET_SIZE {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream closed mid-packet",
            )
            .into());
        }
        filled += n;
    }

    Ok(Some(Packet::parse(&buf)?))
}

/// Best-effort TransferEnd so the peer can discard its partial state.
/// The transfer is already failing; a second error here adds nothing.
async fn abort_transfer<S>(stream: &mut S)
where
    S: AsyncWrite + Unpin,
{
    let _ = write_packet(stream, &Packet::ack(MessageKind::TransferEnd.code())).await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
