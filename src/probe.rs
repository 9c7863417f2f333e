//! Liveness checks and certificate retrieval for registration servers.

use crate::discovery::{HttpRequest, HttpTransport};
use crate::error::{Error, Result};
use crate::server::{verify_fingerprint, ServerRecord};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const CERT_PATH: &str = "smt.crt";

/// Liveness checks run against every cached candidate during failover.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(3);

/// Network checks against a single registration server.
#[async_trait]
pub trait ServerProbe: Send + Sync {
    /// True when the server answers right now.
    async fn is_responsive(&self, server: &ServerRecord) -> bool;

    /// Return the server with its certificate attached, after checking the
    /// certificate against the announced fingerprint.
    async fn fetch_cert(&self, server: &ServerRecord) -> Result<ServerRecord>;
}

/// Probe that talks to `http://<ip>/smt.crt`.
pub struct HttpProbe {
    transport: Arc<dyn HttpTransport>,
}

impl HttpProbe {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    fn cert_url(server: &ServerRecord) -> String {
        if server.ip().contains(':') {
            format!("http://[{}]/{}", server.ip(), CERT_PATH)
        } else {
            format!("http://{}/{}", server.ip(), CERT_PATH)
        }
    }
}

#[async_trait]
impl ServerProbe for HttpProbe {
    async fn is_responsive(&self, server: &ServerRecord) -> bool {
        let request = HttpRequest::get(Self::cert_url(server)).timeout(LIVENESS_TIMEOUT);
        match self.transport.get(&request).await {
            Ok(response) if response.is_success() => {
                debug!("Server {} is responsive", server);
                true
            }
            Ok(response) => {
                warn!("Server {} answered {}", server, response.status);
                false
            }
            Err(e) => {
                warn!("Server {} is not responsive: {}", server, e);
                false
            }
        }
    }

    async fn fetch_cert(&self, server: &ServerRecord) -> Result<ServerRecord> {
        if let Some(pem) = server.cert() {
            verify_fingerprint(&server.to_string(), pem, server.fingerprint())?;
            return Ok(server.clone());
        }

        let url = Self::cert_url(server);
        let response = self.transport.get(&HttpRequest::get(&url)).await?;
        if !response.is_success() {
            return Err(Error::Certificate {
                server: server.to_string(),
                reason: format!("{} returned {}", url, response.status),
            });
        }

        verify_fingerprint(&server.to_string(), &response.body, server.fingerprint())?;
        info!("Obtained certificate for {}", server);
        Ok(server.clone().with_cert(response.body))
    }
}
