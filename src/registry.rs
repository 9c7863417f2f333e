//! Durable storage for the current registration server and the candidate cache.
//!
//! Every record lives in its own JSON file under the registration data
//! directory. Files are written owner-only (0600) through a temp file that is
//! created with those permissions and then renamed into place, so no other
//! process can observe a readable copy.
//!
//! Reads fail soft: a missing, unreadable, corrupt or foreign-version file is
//! reported as "absent" and logged, never as an error.

use crate::error::{Error, Result};
use crate::server::ServerRecord;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_REGISTRATION_DIR: &str = "/var/lib/cloudregister";
pub const CURRENT_FILE_NAME: &str = "currentSMTInfo.json";
const CANDIDATE_PREFIX: &str = "availableSMTInfo_";
const RECORD_SUFFIX: &str = ".json";
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    version: u32,
    server: ServerRecord,
}

/// File-backed registry of server records.
#[derive(Debug, Clone)]
pub struct Registry {
    dir: PathBuf,
}

impl Registry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn current_path(&self) -> PathBuf {
        self.dir.join(CURRENT_FILE_NAME)
    }

    /// Cache file for the candidate with the given id (its address).
    pub fn candidate_path(&self, id: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", CANDIDATE_PREFIX, candidate_key(id), RECORD_SUFFIX))
    }

    pub fn load_current(&self) -> Option<ServerRecord> {
        load_record(&self.current_path())
    }

    pub fn store_current(&self, server: &ServerRecord) -> Result<()> {
        write_record(&self.current_path(), server)?;
        info!("Stored {} as current registration server", server);
        Ok(())
    }

    /// Remove the current record. Absent is not an error.
    pub fn clear_current(&self) -> Result<()> {
        remove_if_exists(&self.current_path())
    }

    pub fn load_candidate(&self, id: &str) -> Option<ServerRecord> {
        load_record(&self.candidate_path(id))
    }

    /// Add (or overwrite) a candidate, keyed by address.
    pub fn store_candidate(&self, server: &ServerRecord) -> Result<()> {
        write_record(&self.candidate_path(server.ip()), server)
    }

    /// All cached candidates, ordered by cache file name.
    pub fn list_candidates(&self) -> Vec<ServerRecord> {
        self.candidate_files()
            .iter()
            .filter_map(|path| load_record(path))
            .collect()
    }

    /// Drop every cached candidate. The current record is left alone.
    pub fn clear_candidates(&self) -> Result<()> {
        for path in self.candidate_files() {
            debug!("Removing cached server data {}", path.display());
            remove_if_exists(&path)?;
        }
        Ok(())
    }

    fn candidate_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(CANDIDATE_PREFIX) && n.ends_with(RECORD_SUFFIX))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files
    }
}

fn candidate_key(id: &str) -> String {
    id.chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' => c,
            _ => '_',
        })
        .collect()
}

fn load_record(path: &Path) -> Option<ServerRecord> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Could not read server data {}: {}", path.display(), e);
            return None;
        }
    };

    match serde_json::from_str::<StoredRecord>(&contents) {
        Ok(stored) if stored.version == FORMAT_VERSION => Some(stored.server),
        Ok(stored) => {
            warn!(
                "Ignoring server data {} with unsupported version {}",
                path.display(),
                stored.version
            );
            None
        }
        Err(e) => {
            warn!("Ignoring corrupt server data {}: {}", path.display(), e);
            None
        }
    }
}

fn write_record(path: &Path, server: &ServerRecord) -> Result<()> {
    let stored = StoredRecord {
        version: FORMAT_VERSION,
        server: server.clone(),
    };
    let contents = serde_json::to_string_pretty(&stored)?;
    write_private(path, contents.as_bytes())
}

/// Write-then-rename where the temp file is born with mode 0600.
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Filesystem(format!("Failed to create {}: {}", parent.display(), e))
        })?;
    }

    let temp_path = path.with_extension("tmp");
    remove_if_exists(&temp_path)?;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(&temp_path)
        .map_err(|e| Error::Filesystem(format!("Failed to create temp file: {}", e)))?;

    file.write_all(contents)
        .map_err(|e| Error::Filesystem(format!("Failed to write temp file: {}", e)))?;
    file.sync_all()
        .map_err(|e| Error::Filesystem(format!("Failed to sync temp file: {}", e)))?;
    drop(file);

    fs::rename(&temp_path, path)
        .map_err(|e| Error::Filesystem(format!("Failed to rename temp file: {}", e)))?;

    Ok(())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Filesystem(format!(
            "Failed to remove {}: {}",
            path.display(),
            e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn smt(ip: &str) -> ServerRecord {
        ServerRecord::new(ip, "smt-ec2.susecloud.net", "AB:CD").with_cert("PEM")
    }

    #[test]
    fn test_store_then_load_current() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("data"));
        let server = smt("10.0.0.1");

        registry.store_current(&server).unwrap();

        assert_eq!(registry.load_current(), Some(server));
    }

    #[test]
    fn test_current_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        registry.store_current(&smt("10.0.0.1")).unwrap();

        let mode = fs::metadata(registry.current_path())
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600);
        assert!(!registry.current_path().with_extension("tmp").exists());
    }

    #[test]
    fn test_corrupt_current_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        fs::write(registry.current_path(), "\u{0}\u{1}not json").unwrap();

        assert!(registry.load_current().is_none());
    }

    #[test]
    fn test_unknown_version_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        fs::write(
            registry.current_path(),
            r#"{"version": 7, "server": {"ip": "1.2.3.4", "fqdn": "a.b", "name": "a", "fingerprint": "AA"}}"#,
        )
        .unwrap();

        assert!(registry.load_current().is_none());
    }

    #[test]
    fn test_clear_current_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());

        registry.clear_current().unwrap();
        registry.store_current(&smt("10.0.0.1")).unwrap();
        registry.clear_current().unwrap();
        registry.clear_current().unwrap();

        assert!(registry.load_current().is_none());
    }

    #[test]
    fn test_candidate_cache() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        registry.store_current(&smt("10.0.0.1")).unwrap();
        registry.store_candidate(&smt("10.0.0.2")).unwrap();
        registry.store_candidate(&smt("10.0.0.3")).unwrap();

        assert_eq!(registry.load_candidate("10.0.0.3"), Some(smt("10.0.0.3")));
        assert!(registry.load_candidate("10.0.0.9").is_none());

        let ips: Vec<String> = registry
            .list_candidates()
            .iter()
            .map(|s| s.ip().to_string())
            .collect();
        assert_eq!(ips, vec!["10.0.0.2", "10.0.0.3"]);

        registry.clear_candidates().unwrap();
        assert!(registry.list_candidates().is_empty());
        assert!(registry.load_current().is_some());
    }

    #[test]
    fn test_list_candidates_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path().join("nope"));
        assert!(registry.list_candidates().is_empty());
        registry.clear_candidates().unwrap();
    }

    #[test]
    fn test_candidate_key_sanitizes_ipv6() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::new(dir.path());
        let path = registry.candidate_path("fc00::1");
        assert!(path.ends_with("availableSMTInfo_fc00__1.json"));
    }
}
