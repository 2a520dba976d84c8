//! Java edition server list ping.
//!
//! Speaks the status half of the Java protocol over TCP: a handshake
//! with next-state `1`, an empty status request, and a single framed
//! response carrying a JSON status document.

use std::time::Duration;

use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::{PingError, PingFuture, PingResult, Pinger, ProbeResult};

/// Protocol version advertised in the handshake.
const HANDSHAKE_PROTOCOL: i32 = 47;
/// Handshake next-state requesting status.
const NEXT_STATE_STATUS: i32 = 1;
/// Packet id shared by handshake, status request and status response.
const STATUS_PACKET_ID: i32 = 0x00;
/// Largest status frame accepted from a server.
const MAX_FRAME_LEN: usize = 1 << 20;

/// Pinger for Java edition servers.
#[derive(Debug, Clone)]
pub struct JavaPinger {
    host: String,
    port: u16,
    timeout: Duration,
}

impl JavaPinger {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    async fn query(&self) -> PingResult<ProbeResult> {
        let mut stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        debug!(host = %self.host, port = self.port, "java status connection opened");

        let mut out = handshake_packet(&self.host, self.port);
        out.extend_from_slice(&frame(&status_request()));
        stream.write_all(&out).await?;

        let body = read_frame(&mut stream).await?;
        let mut cursor = body.as_slice();

        let packet_id = decode_varint(&mut cursor)?;
        if packet_id != STATUS_PACKET_ID {
            return Err(PingError::Malformed(format!(
                "unexpected packet id {packet_id:#04x}"
            )));
        }

        let json = decode_string(&mut cursor)?;
        parse_status(json)
    }
}

impl Pinger for JavaPinger {
    fn ping(&self) -> PingFuture<'_> {
        Box::pin(self.query())
    }

    fn ping_with_timeout(&self) -> PingFuture<'_> {
        Box::pin(async move {
            tokio::time::timeout(self.timeout, self.query())
                .await
                .unwrap_or_else(|_| Err(PingError::Timeout(self.timeout)))
        })
    }

    fn is_timeout_zero(&self) -> bool {
        self.timeout.is_zero()
    }
}

// ── Status document ────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusResponse {
    version: StatusVersion,
    players: StatusPlayers,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusVersion {
    name: String,
    protocol: i32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusPlayers {
    max: u32,
    online: u32,
}

/// Parse the JSON status document. Missing sections default to zero.
fn parse_status(json: &str) -> PingResult<ProbeResult> {
    let status: StatusResponse =
        serde_json::from_str(json).map_err(|e| PingError::Malformed(e.to_string()))?;

    Ok(ProbeResult {
        protocol_version: status.version.protocol,
        version_label: status.version.name,
        max_capacity: status.players.max,
        current_occupancy: status.players.online,
    })
}

// ── Framing ────────────────────────────────────────────────────────

fn handshake_packet(host: &str, port: u16) -> Vec<u8> {
    let mut body = Vec::with_capacity(host.len() + 16);
    write_varint(&mut body, STATUS_PACKET_ID);
    write_varint(&mut body, HANDSHAKE_PROTOCOL);
    write_string(&mut body, host);
    body.extend_from_slice(&port.to_be_bytes());
    write_varint(&mut body, NEXT_STATE_STATUS);
    frame(&body)
}

fn status_request() -> Vec<u8> {
    let mut body = Vec::with_capacity(1);
    write_varint(&mut body, STATUS_PACKET_ID);
    body
}

/// Prefix `body` with its VarInt length.
fn frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 5);
    write_varint(&mut out, body.len() as i32);
    out.extend_from_slice(body);
    out
}

fn write_varint(buf: &mut Vec<u8>, value: i32) {
    let mut v = value as u32;
    loop {
        if v & !0x7f == 0 {
            buf.push(v as u8);
            return;
        }
        buf.push((v & 0x7f) as u8 | 0x80);
        v >>= 7;
    }
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    write_varint(buf, s.len() as i32);
    buf.extend_from_slice(s.as_bytes());
}

fn decode_varint(buf: &mut &[u8]) -> PingResult<i32> {
    let mut value: u32 = 0;
    for shift in 0..5 {
        let remaining = *buf;
        let (&byte, rest) = remaining
            .split_first()
            .ok_or_else(|| PingError::Malformed("truncated varint".to_string()))?;
        *buf = rest;
        value |= u32::from(byte & 0x7f) << (7 * shift);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(PingError::Malformed("varint longer than 5 bytes".to_string()))
}

fn decode_string<'a>(buf: &mut &'a [u8]) -> PingResult<&'a str> {
    let len = decode_varint(buf)?;
    let len = usize::try_from(len)
        .map_err(|_| PingError::Malformed(format!("negative string length {len}")))?;
    if len > buf.len() {
        return Err(PingError::Malformed(format!(
            "string length {len} exceeds remaining {} bytes",
            buf.len()
        )));
    }
    let remaining: &'a [u8] = *buf;
    let (bytes, rest) = remaining.split_at(len);
    *buf = rest;
    std::str::from_utf8(bytes).map_err(|e| PingError::Malformed(e.to_string()))
}

async fn read_varint<R: AsyncRead + Unpin>(reader: &mut R) -> PingResult<i32> {
    let mut value: u32 = 0;
    for shift in 0..5 {
        let byte = reader.read_u8().await?;
        value |= u32::from(byte & 0x7f) << (7 * shift);
        if byte & 0x80 == 0 {
            return Ok(value as i32);
        }
    }
    Err(PingError::Malformed("varint longer than 5 bytes".to_string()))
}

/// Read one length-prefixed frame.
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> PingResult<Vec<u8>> {
    let len = read_varint(reader).await?;
    let len = match usize::try_from(len) {
        Ok(n) if n > 0 && n <= MAX_FRAME_LEN => n,
        _ => return Err(PingError::Malformed(format!("invalid frame length {len}"))),
    };
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Ok(body)
}
