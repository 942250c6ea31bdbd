// src/protocol/codec.rs
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use super::QueryError;

pub const HANDSHAKE_PACKET_ID: i32 = 0x00;
pub const STATUS_PACKET_ID: i32 = 0x00;
pub const PING_PACKET_ID: i32 = 0x01;

/// Protocol version sent in the handshake. Servers answer status requests for any value.
pub const PROTOCOL_VERSION: i32 = 47;
/// Handshake "next state" requesting status.
const NEXT_STATE_STATUS: i32 = 1;

pub const MAX_PACKET_LEN: usize = 2 * 1024 * 1024;

pub fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

pub fn write_string(buf: &mut Vec<u8>, value: &str) {
    write_varint(buf, value.len() as i32);
    buf.extend_from_slice(value.as_bytes());
}

/// Decodes a varint from the front of `bytes`, returning the value and bytes consumed.
pub fn decode_varint(bytes: &[u8]) -> Result<(i32, usize), QueryError> {
    let mut result: u32 = 0;
    for (i, byte) in bytes.iter().enumerate().take(5) {
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((result as i32, i + 1));
        }
    }
    Err(QueryError::InvalidVarInt)
}

pub async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> Result<i32, QueryError> {
    let mut result: u32 = 0;
    for i in 0..5 {
        let byte = reader.read_u8().await?;
        result |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(result as i32);
        }
    }
    Err(QueryError::InvalidVarInt)
}

/// Prefixes `id + payload` with its varint length.
pub fn frame(packet_id: i32, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 5);
    write_varint(&mut body, packet_id);
    body.extend_from_slice(payload);

    let mut packet = Vec::with_capacity(body.len() + 5);
    write_varint(&mut packet, body.len() as i32);
    packet.extend_from_slice(&body);
    packet
}

pub fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut payload = Vec::new();
    write_varint(&mut payload, PROTOCOL_VERSION);
    write_string(&mut payload, host);
    // Writing into a Vec cannot fail
    let _ = payload.write_u16::<BigEndian>(port);
    write_varint(&mut payload, NEXT_STATE_STATUS);
    frame(HANDSHAKE_PACKET_ID, &payload)
}

pub fn status_request_packet() -> Vec<u8> {
    frame(STATUS_PACKET_ID, &[])
}

pub fn ping_packet(payload: i64) -> Vec<u8> {
    let mut body = Vec::with_capacity(8);
    let _ = body.write_i64::<BigEndian>(payload);
    frame(PING_PACKET_ID, &body)
}

/// Reads one length-prefixed packet and returns `(packet_id, body)`.
pub async fn read_packet<R: AsyncRead + Unpin>(reader: &mut R) -> Result<(i32, Vec<u8>), QueryError> {
    let length = read_varint(reader).await?;
    if length <= 0 {
        return Err(QueryError::InvalidVarInt);
    }
    let length = length as usize;
    if length > MAX_PACKET_LEN {
        return Err(QueryError::PacketTooLarge(length));
    }

    let mut packet = vec![0u8; length];
    reader.read_exact(&mut packet).await?;

    let (packet_id, consumed) = decode_varint(&packet)?;
    Ok((packet_id, packet.split_off(consumed)))
}

/// Body of a status response: one varint-prefixed UTF-8 string.
pub fn decode_status_body(body: &[u8]) -> Result<String, QueryError> {
    let (len, consumed) = decode_varint(body)?;
    let end = consumed
        .checked_add(usize::try_from(len).map_err(|_| QueryError::InvalidVarInt)?)
        .filter(|end| *end <= body.len())
        .ok_or(QueryError::Truncated)?;
    String::from_utf8(body[consumed..end].to_vec()).map_err(|_| QueryError::InvalidUtf8)
}

pub fn decode_pong_body(mut body: &[u8]) -> Result<i64, QueryError> {
    ReadBytesExt::read_i64::<BigEndian>(&mut body).map_err(|_| QueryError::Truncated)
}
