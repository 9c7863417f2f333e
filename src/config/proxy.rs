//! Outbound proxy settings.
//!
//! Proxy settings are resolved once at the entry point and handed to the HTTP
//! transport explicitly; the process environment is never modified.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::info;

pub const DEFAULT_PROXY_CONFIG: &str = "/etc/sysconfig/proxy";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
}

impl ProxyConfig {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_none() && self.https.is_none()
    }

    /// Read `/etc/sysconfig/proxy`-style settings.
    ///
    /// When both `http_proxy` and `https_proxy` are already exported, the HTTP
    /// client picks them up on its own and no explicit proxy is returned.
    pub fn from_sysconfig(path: &Path) -> Self {
        let http_env = std::env::var("http_proxy").ok();
        let https_env = std::env::var("https_proxy").ok();
        if let (Some(http), Some(https)) = (&http_env, &https_env) {
            info!("Using proxy settings from execution environment");
            info!("\thttp_proxy: {}", http);
            info!("\thttps_proxy: {}", https);
            return Self::none();
        }

        match fs::read_to_string(path) {
            Ok(content) => Self::parse_sysconfig(&content),
            Err(_) => Self::none(),
        }
    }

    /// Parse `KEY="value"` lines. `PROXY_ENABLED="no"` disables everything.
    pub fn parse_sysconfig(content: &str) -> Self {
        let mut config = Self::none();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim();

            match key.trim() {
                "PROXY_ENABLED" if value.eq_ignore_ascii_case("no") => return Self::none(),
                "HTTP_PROXY" if !value.is_empty() => config.http = Some(value.to_string()),
                "HTTPS_PROXY" if !value.is_empty() => config.https = Some(value.to_string()),
                _ => {}
            }
        }

        config
    }

    /// Attach the proxies to a client under construction.
    pub fn apply(&self, mut builder: reqwest::ClientBuilder) -> Result<reqwest::ClientBuilder> {
        if let Some(http) = &self.http {
            let proxy = reqwest::Proxy::http(http)
                .map_err(|e| Error::Config(format!("Invalid HTTP_PROXY '{}': {}", http, e)))?;
            builder = builder.proxy(proxy);
        }
        if let Some(https) = &self.https {
            let proxy = reqwest::Proxy::https(https)
                .map_err(|e| Error::Config(format!("Invalid HTTPS_PROXY '{}': {}", https, e)))?;
            builder = builder.proxy(proxy);
        }
        Ok(builder)
    }
}
