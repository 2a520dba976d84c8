//! Bedrock edition unconnected ping.
//!
//! Sends a RakNet `UNCONNECTED_PING` over UDP and parses the
//! semicolon-separated server id string from the `UNCONNECTED_PONG`.
//! UDP gives no delivery guarantee, so the ping is resent on a fixed
//! cadence until a pong arrives or the deadline passes.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::{PingError, PingFuture, PingResult, Pinger, ProbeResult};

/// Deadline applied by the untimed [`Pinger::ping`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the ping is resent while waiting for a pong.
const RESEND_INTERVAL: Duration = Duration::from_secs(1);

const UNCONNECTED_PING: u8 = 0x01;
const UNCONNECTED_PONG: u8 = 0x1c;

/// RakNet offline message magic.
const MAGIC: [u8; 16] = [
    0x00, 0xff, 0xff, 0x00, 0xfe, 0xfe, 0xfe, 0xfe, 0xfd, 0xfd, 0xfd, 0xfd, 0x12, 0x34, 0x56, 0x78,
];

/// Pong header: id, timestamp, server guid, magic, string length.
const PONG_HEADER_LEN: usize = 1 + 8 + 8 + 16 + 2;

/// Pinger for Bedrock edition servers.
#[derive(Debug, Clone)]
pub struct BedrockPinger {
    host: String,
    port: u16,
    timeout: Duration,
}

impl BedrockPinger {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Run the whole query, resolution included, under `deadline`.
    async fn query_within(&self, deadline: Duration) -> PingResult<ProbeResult> {
        within(deadline, self.query()).await
    }

    async fn query(&self) -> PingResult<ProbeResult> {
        let addr = self.resolve().await?;
        let bind = if addr.is_ipv4() {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        };

        let socket = UdpSocket::bind(bind).await?;
        socket.connect(addr).await?;
        let ping = ping_packet(epoch_millis(), client_guid());

        exchange(&socket, &ping).await
    }

    async fn resolve(&self) -> PingResult<SocketAddr> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| PingError::Resolve(format!("{}:{}", self.host, self.port)))
    }
}

impl Pinger for BedrockPinger {
    fn ping(&self) -> PingFuture<'_> {
        Box::pin(self.query_within(DEFAULT_TIMEOUT))
    }

    fn ping_with_timeout(&self) -> PingFuture<'_> {
        Box::pin(self.query_within(self.timeout))
    }

    fn is_timeout_zero(&self) -> bool {
        self.timeout.is_zero()
    }
}

async fn within<F>(deadline: Duration, query: F) -> PingResult<ProbeResult>
where
    F: std::future::Future<Output = PingResult<ProbeResult>>,
{
    tokio::time::timeout(deadline, query)
        .await
        .unwrap_or_else(|_| Err(PingError::Timeout(deadline)))
}

/// Send `ping` on a fixed cadence until a datagram comes back.
async fn exchange(socket: &UdpSocket, ping: &[u8]) -> PingResult<ProbeResult> {
    let mut buf = [0u8; 1500];
    let mut resend = tokio::time::interval(RESEND_INTERVAL);
    loop {
        tokio::select! {
            _ = resend.tick() => {
                socket.send(ping).await?;
                debug!(peer = ?socket.peer_addr().ok(), "bedrock ping sent");
            }
            received = socket.recv(&mut buf) => {
                let n = received?;
                return parse_pong(&buf[..n]);
            }
        }
    }
}

fn ping_packet(timestamp: i64, guid: i64) -> Vec<u8> {
    let mut packet = Vec::with_capacity(1 + 8 + 16 + 8);
    packet.push(UNCONNECTED_PING);
    packet.extend_from_slice(&timestamp.to_be_bytes());
    packet.extend_from_slice(&MAGIC);
    packet.extend_from_slice(&guid.to_be_bytes());
    packet
}

/// Parse an `UNCONNECTED_PONG` into a probe result.
///
/// The id string is `edition;motd;protocol;version;online;max;...`.
fn parse_pong(packet: &[u8]) -> PingResult<ProbeResult> {
    if packet.len() < PONG_HEADER_LEN {
        return Err(PingError::Malformed(format!(
            "pong too short: {} bytes",
            packet.len()
        )));
    }
    if packet[0] != UNCONNECTED_PONG {
        return Err(PingError::Malformed(format!(
            "unexpected packet id {:#04x}",
            packet[0]
        )));
    }
    if packet[17..33] != MAGIC {
        return Err(PingError::Malformed("bad offline magic".to_string()));
    }

    let len = usize::from(u16::from_be_bytes([packet[33], packet[34]]));
    let payload = packet
        .get(PONG_HEADER_LEN..PONG_HEADER_LEN + len)
        .ok_or_else(|| PingError::Malformed("truncated server id".to_string()))?;
    let id = std::str::from_utf8(payload).map_err(|e| PingError::Malformed(e.to_string()))?;

    let fields: Vec<&str> = id.split(';').collect();
    if fields.len() < 6 {
        return Err(PingError::Malformed(format!(
            "server id has {} fields, expected at least 6",
            fields.len()
        )));
    }

    Ok(ProbeResult {
        protocol_version: parse_field(fields[2], "protocol")?,
        version_label: fields[3].to_string(),
        current_occupancy: parse_field(fields[4], "online players")?,
        max_capacity: parse_field(fields[5], "max players")?,
    })
}

fn parse_field<T: std::str::FromStr>(raw: &str, name: &str) -> PingResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| PingError::Malformed(format!("invalid {name}: {raw:?}")))
}

fn epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

fn client_guid() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    (i64::from(std::process::id()) << 32) | i64::from(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pong(id: &str) -> Vec<u8> {
        let mut packet = vec![UNCONNECTED_PONG];
        packet.extend_from_slice(&42i64.to_be_bytes());
        packet.extend_from_slice(&7i64.to_be_bytes());
        packet.extend_from_slice(&MAGIC);
        packet.extend_from_slice(&(id.len() as u16).to_be_bytes());
        packet.extend_from_slice(id.as_bytes());
        packet
    }

    #[test]
    fn ping_packet_layout() {
        let packet = ping_packet(1, 2);
        assert_eq!(packet.len(), 33);
        assert_eq!(packet[0], UNCONNECTED_PING);
        assert_eq!(&packet[1..9], &1i64.to_be_bytes());
        assert_eq!(&packet[9..25], &MAGIC);
        assert_eq!(&packet[25..33], &2i64.to_be_bytes());
    }

    #[test]
    fn parse_typical_pong() {
        let packet = pong("MCPE;Dedicated Server;589;1.20.0;2;10;13253860892328930865;Bedrock level;Survival;1;19132;19133;");
        let result = parse_pong(&packet).unwrap();
        assert_eq!(result.protocol_version, 589);
        assert_eq!(result.version_label, "1.20.0");
        assert_eq!(result.current_occupancy, 2);
        assert_eq!(result.max_capacity, 10);
    }

    #[test]
    fn parse_pong_rejects_bad_packets() {
        assert!(matches!(parse_pong(&[0x1c; 4]), Err(PingError::Malformed(_))));

        let mut wrong_id = pong("MCPE;m;589;1.20.0;0;10");
        wrong_id[0] = 0x1d;
        assert!(matches!(parse_pong(&wrong_id), Err(PingError::Malformed(_))));

        let mut bad_magic = pong("MCPE;m;589;1.20.0;0;10");
        bad_magic[18] ^= 0xff;
        assert!(matches!(parse_pong(&bad_magic), Err(PingError::Malformed(_))));

        let mut truncated = pong("MCPE;m;589;1.20.0;0;10");
        truncated.truncate(truncated.len() - 3);
        assert!(matches!(parse_pong(&truncated), Err(PingError::Malformed(_))));

        assert!(matches!(parse_pong(&pong("MCPE;m;589")), Err(PingError::Malformed(_))));
        assert!(matches!(
            parse_pong(&pong("MCPE;m;589;1.20.0;zero;10")),
            Err(PingError::Malformed(_))
        ));
    }

    #[test]
    fn parse_pong_checks_every_magic_byte() {
        let valid = pong("MCPE;m;589;1.20.0;0;10");
        assert!(parse_pong(&valid).is_ok());

        for offset in 17..33 {
            let mut corrupted = valid.clone();
            corrupted[offset] ^= 0x01;
            assert!(
                matches!(parse_pong(&corrupted), Err(PingError::Malformed(ref m)) if m == "bad offline magic"),
                "flipped magic byte at {offset} was accepted"
            );
        }
    }

    #[tokio::test]
    async fn ping_against_loopback_server() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (n, peer) = server.recv_from(&mut buf).await.unwrap();
            assert_eq!(n, 33);
            assert_eq!(buf[0], UNCONNECTED_PING);
            server
                .send_to(&pong("MCPE;motd;622;1.20.40;1;30;1;level;Survival"), peer)
                .await
                .unwrap();
        });

        let pinger = BedrockPinger::new("127.0.0.1", port, Duration::from_secs(5));
        let result = pinger.ping_with_timeout().await.unwrap();
        assert_eq!(result.max_capacity, 30);
        assert_eq!(result.current_occupancy, 1);

        responder.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_covers_steps_before_the_exchange() {
        let deadline = Duration::from_secs(3);
        let start = tokio::time::Instant::now();

        // A resolver that never answers.
        let stalled = async {
            std::future::pending::<()>().await;
            Err(PingError::Resolve("stalled".to_string()))
        };

        let err = within(deadline, stalled).await.unwrap_err();
        assert!(matches!(err, PingError::Timeout(d) if d == deadline));
        let elapsed = start.elapsed();
        assert!(elapsed >= deadline && elapsed < deadline + Duration::from_millis(1));
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = server.local_addr().unwrap().port();

        let pinger = BedrockPinger::new("127.0.0.1", port, Duration::from_millis(150));
        let err = pinger.ping_with_timeout().await.unwrap_err();
        assert!(matches!(err, PingError::Timeout(_)));

        drop(server);
    }
}
