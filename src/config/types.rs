use crate::discovery::DiscoveryMode;
use crate::error::{Error, Result};
use crate::hosts::DEFAULT_HOSTS_FILE;
use crate::registry::DEFAULT_REGISTRATION_DIR;
use crate::stores::{DEFAULT_CREDENTIALS_DIR, DEFAULT_REPOS_DIR, DEFAULT_SERVICES_DIR};
use crate::trust::{TrustStore, DEFAULT_RELEASE_FILE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::DEFAULT_PROXY_CONFIG;

pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_CONNECT_CONFIG: &str = "/etc/SUSEConnect";

/// Top-level client configuration (`/etc/regionserverclnt.yaml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub instance: InstanceSection,

    #[serde(default)]
    pub paths: PathsSection,
}

/// Where to obtain registration server data from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Metadata endpoint; when set, region servers are not consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_server: Option<String>,

    /// Region server API path, e.g. `regionInfo`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,

    /// Directory holding one pinned `<server>.pem` per region server.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "certLocation")]
    pub cert_location: Option<PathBuf>,

    /// Comma separated region server names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regionsrv: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            metadata_server: None,
            api: None,
            cert_location: None,
            regionsrv: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ServerSection {
    pub fn region_servers(&self) -> Vec<String> {
        self.regionsrv
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceSection {
    /// Name of the strategy producing extra region server query arguments.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "instanceArgs")]
    pub instance_args: Option<String>,
}

/// Host file locations. Defaults match a SUSE guest image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    pub hosts_file: PathBuf,
    pub registration_dir: PathBuf,
    pub repos_dir: PathBuf,
    pub services_dir: PathBuf,
    pub credentials_dir: PathBuf,
    pub release_file: PathBuf,
    pub connect_config: PathBuf,
    pub proxy_config: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_anchors_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_refresh_command: Option<Vec<String>>,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            hosts_file: PathBuf::from(DEFAULT_HOSTS_FILE),
            registration_dir: PathBuf::from(DEFAULT_REGISTRATION_DIR),
            repos_dir: PathBuf::from(DEFAULT_REPOS_DIR),
            services_dir: PathBuf::from(DEFAULT_SERVICES_DIR),
            credentials_dir: PathBuf::from(DEFAULT_CREDENTIALS_DIR),
            release_file: PathBuf::from(DEFAULT_RELEASE_FILE),
            connect_config: PathBuf::from(DEFAULT_CONNECT_CONFIG),
            proxy_config: PathBuf::from(DEFAULT_PROXY_CONFIG),
            trust_anchors_dir: None,
            trust_refresh_command: None,
        }
    }
}

impl PathsSection {
    /// Detected trust store layout with any configured overrides applied.
    pub fn trust_store(&self) -> TrustStore {
        let detected = TrustStore::detect(&self.release_file);
        match (&self.trust_anchors_dir, &self.trust_refresh_command) {
            (None, None) => detected,
            (dir, command) => TrustStore::new(
                dir.clone()
                    .unwrap_or_else(|| detected.anchors_dir().to_path_buf()),
                command
                    .clone()
                    .unwrap_or_else(|| detected.refresh_command().to_vec()),
            ),
        }
    }

    /// Re-root every default path under `root`. Used for chroot-style
    /// operation and by tests.
    pub fn rooted_at(root: &Path) -> Self {
        let defaults = Self::default();
        let reroot = |p: &Path| root.join(p.strip_prefix("/").unwrap_or(p));
        Self {
            hosts_file: reroot(&defaults.hosts_file),
            registration_dir: reroot(&defaults.registration_dir),
            repos_dir: reroot(&defaults.repos_dir),
            services_dir: reroot(&defaults.services_dir),
            credentials_dir: reroot(&defaults.credentials_dir),
            release_file: reroot(&defaults.release_file),
            connect_config: reroot(&defaults.connect_config),
            proxy_config: reroot(&defaults.proxy_config),
            trust_anchors_dir: None,
            trust_refresh_command: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ClientConfig {
    /// Derive the discovery mode. Metadata mode wins when configured.
    pub fn discovery_mode(&self) -> Result<DiscoveryMode> {
        if let Some(url) = self.server.metadata_server.as_deref() {
            let url = url.trim();
            if url.is_empty() {
                return Err(Error::Config("server.metadata_server is empty".to_string()));
            }
            url::Url::parse(url).map_err(|e| {
                Error::Config(format!("Invalid metadata_server URL '{}': {}", url, e))
            })?;
            return Ok(DiscoveryMode::Metadata {
                url: url.to_string(),
            });
        }

        let servers = self.server.region_servers();
        if servers.is_empty() {
            return Err(Error::Config(
                "Neither server.metadata_server nor server.regionsrv is configured".to_string(),
            ));
        }
        let api = self
            .server
            .api
            .clone()
            .filter(|a| !a.trim().is_empty())
            .ok_or_else(|| Error::Config("server.api is required with regionsrv".to_string()))?;
        let cert_dir = self.server.cert_location.clone().ok_or_else(|| {
            Error::Config("server.cert_location is required with regionsrv".to_string())
        })?;

        Ok(DiscoveryMode::RegionServers {
            api,
            cert_dir,
            servers,
        })
    }

    /// Reject configurations that cannot possibly discover a server.
    pub fn validate(&self) -> Result<()> {
        if self.server.timeout_secs == 0 {
            return Err(Error::Config(
                "server.timeout_secs must be greater than zero".to_string(),
            ));
        }
        self.discovery_mode()?;
        Ok(())
    }
}
