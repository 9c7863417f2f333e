use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Certificate, Client};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A single GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    /// Only this certificate is trusted for the TLS handshake when set.
    pub pinned_cert: Option<PathBuf>,
    pub headers: Vec<(String, String)>,
    /// Overrides the transport's default timeout for this request.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pinned_cert: None,
            headers: Vec::new(),
            timeout: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn pinned(mut self, cert: impl Into<PathBuf>) -> Self {
        self.pinned_cert = Some(cert.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Everything that talks HTTP goes through this trait so the network can be
/// replaced in tests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Transport failures (timeout, refused, TLS) are `Err`; any HTTP status
    /// is `Ok`.
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// reqwest-backed transport with a per-request timeout and explicit proxies.
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
    proxy: ProxyConfig,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, proxy: ProxyConfig) -> Result<Self> {
        let client = Self::builder(timeout, &proxy)?
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            timeout,
            proxy,
        })
    }

    fn builder(timeout: Duration, proxy: &ProxyConfig) -> Result<reqwest::ClientBuilder> {
        proxy.apply(Client::builder().timeout(timeout))
    }

    /// A client that trusts exactly the PEM certificate at `cert`.
    fn pinned_client(&self, cert: &Path) -> Result<Client> {
        let pem = fs::read(cert)
            .map_err(|e| Error::Filesystem(format!("Failed to read {}: {}", cert.display(), e)))?;
        let certificate = Certificate::from_pem(&pem).map_err(|e| Error::Certificate {
            server: cert.display().to_string(),
            reason: e.to_string(),
        })?;

        Self::builder(self.timeout, &self.proxy)?
            .tls_built_in_root_certs(false)
            .add_root_certificate(certificate)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let client = match &request.pinned_cert {
            Some(cert) => self.pinned_client(cert)?,
            None => self.client.clone(),
        };

        let mut builder = client
            .get(&request.url)
            .timeout(request.timeout.unwrap_or(self.timeout));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(HttpResponse { status, body })
    }
}
