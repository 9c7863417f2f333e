//! System trust store integration for the registration server certificate.

use crate::error::{Error, Result};
use crate::exec::{run_command, DEFAULT_COMMAND_TIMEOUT};
use crate::server::ServerRecord;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const DEFAULT_RELEASE_FILE: &str = "/etc/SuSE-release";

const LEGACY_RELEASE_MARKER: &str = "SUSE Linux Enterprise Server 11";
const LEGACY_ANCHORS_DIR: &str = "/etc/ssl/certs";
const ANCHORS_DIR: &str = "/usr/share/pki/trust/anchors";

/// Where certificates are dropped and which command makes them effective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustStore {
    anchors_dir: PathBuf,
    refresh_command: Vec<String>,
}

impl TrustStore {
    pub fn new(anchors_dir: impl Into<PathBuf>, refresh_command: Vec<String>) -> Self {
        Self {
            anchors_dir: anchors_dir.into(),
            refresh_command,
        }
    }

    /// Pick the layout matching the installed OS generation: SLES 11 uses
    /// `c_rehash` on `/etc/ssl/certs`, everything newer uses p11-kit anchors.
    pub fn detect(release_file: &Path) -> Self {
        let legacy = fs::read_to_string(release_file)
            .map(|content| content.lines().any(|l| l.contains(LEGACY_RELEASE_MARKER)))
            .unwrap_or(false);

        if legacy {
            Self::new(
                LEGACY_ANCHORS_DIR,
                vec!["c_rehash".to_string(), LEGACY_ANCHORS_DIR.to_string()],
            )
        } else {
            Self::new(ANCHORS_DIR, vec!["update-ca-certificates".to_string()])
        }
    }

    pub fn anchors_dir(&self) -> &Path {
        &self.anchors_dir
    }

    pub fn refresh_command(&self) -> &[String] {
        &self.refresh_command
    }

    /// Write the server's certificate as a trust anchor and refresh the store.
    pub async fn import(&self, server: &ServerRecord) -> Result<PathBuf> {
        let pem = server.cert().ok_or_else(|| Error::Certificate {
            server: server.to_string(),
            reason: "no certificate attached".to_string(),
        })?;

        fs::create_dir_all(&self.anchors_dir).map_err(|e| {
            Error::Filesystem(format!(
                "Failed to create {}: {}",
                self.anchors_dir.display(),
                e
            ))
        })?;
        let path = self.anchors_dir.join(server.cert_file_name());
        fs::write(&path, pem)
            .map_err(|e| Error::Filesystem(format!("Failed to write {}: {}", path.display(), e)))?;

        info!(
            "Updating CA certificates: {}",
            self.refresh_command.first().map(String::as_str).unwrap_or("")
        );
        let outcome = run_command(&self.refresh_command, DEFAULT_COMMAND_TIMEOUT).await;
        if !outcome.success() {
            error!("Certificate update failed: {}", outcome.describe());
            return Err(Error::TrustImport(outcome.describe()));
        }

        Ok(path)
    }
}
