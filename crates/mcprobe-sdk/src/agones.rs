//! Agones SDK client over the sidecar's REST gateway.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request};
use http_body_util::Full;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::debug;

use crate::{Orchestrator, SdkError, SdkResult, SignalFuture};

/// Port of the sidecar's REST gateway when the environment does not say.
pub const DEFAULT_HTTP_PORT: u16 = 9358;

/// Environment variable the sidecar uses to advertise its REST port.
pub const HTTP_PORT_ENV: &str = "AGONES_SDK_HTTP_PORT";

/// Upper bound on a single signal round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const READY_PATH: &str = "/ready";
const HEALTH_PATH: &str = "/health";

/// REST client for the Agones SDK sidecar.
#[derive(Debug, Clone)]
pub struct AgonesSdk {
    /// `host:port` of the sidecar.
    address: String,
    timeout: Duration,
}

impl AgonesSdk {
    /// Client for the sidecar at `address` (`host:port`).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Client for the sidecar on localhost at `port`.
    pub fn localhost(port: u16) -> Self {
        Self::new(format!("localhost:{port}"))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    async fn post(&self, path: &'static str) -> SdkResult<()> {
        tokio::time::timeout(self.timeout, self.send(path))
            .await
            .unwrap_or_else(|_| Err(SdkError::Timeout(self.timeout)))
    }

    async fn send(&self, path: &'static str) -> SdkResult<()> {
        let stream = TcpStream::connect(self.address.as_str())
            .await
            .map_err(SdkError::Connect)?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "sdk connection closed with error");
            }
        });

        let req = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(HOST, self.address.as_str())
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "mcprobe/0.1")
            .body(Full::new(Bytes::from_static(b"{}")))?;

        let resp = sender.send_request(req).await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SdkError::Status { path, status });
        }

        debug!(address = %self.address, %path, %status, "sdk signal acknowledged");
        Ok(())
    }
}

impl Orchestrator for AgonesSdk {
    fn ready(&self) -> SignalFuture<'_> {
        Box::pin(self.post(READY_PATH))
    }

    fn health(&self) -> SignalFuture<'_> {
        Box::pin(self.post(HEALTH_PATH))
    }
}
