//! Name resolution entries for the registration server.
//!
//! Entries owned by this tool are always written as a marker comment line
//! immediately followed by `<address>\t<fqdn>\t<short name>`. Only such pairs
//! are ever removed; every other line is preserved byte for byte.

use crate::error::{Error, Result};
use crate::server::ServerRecord;
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_HOSTS_FILE: &str = "/etc/hosts";
pub const HOSTS_MARKER: &str =
    "# Added by SMT registration do not remove, retain comment as well";
const MARKER_PREFIX: &str = "# Added by SMT";

#[derive(Debug, Clone)]
pub struct HostsFile {
    path: PathBuf,
}

impl HostsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(Error::Filesystem(format!(
                "Failed to read {}: {}",
                self.path.display(),
                e
            ))),
        }
    }

    fn write(&self, content: &str) -> Result<()> {
        fs::write(&self.path, content).map_err(|e| {
            Error::Filesystem(format!("Failed to write {}: {}", self.path.display(), e))
        })
    }

    /// True when both the server's address and its FQDN appear as standalone
    /// tokens. An unreadable file counts as not referencing the server.
    pub fn references(&self, server: &ServerRecord) -> bool {
        match self.read() {
            Ok(content) => has_token(&content, server.ip()) && has_token(&content, server.fqdn()),
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    /// Append a marker-tagged entry for `server`.
    pub fn append_entry(&self, server: &ServerRecord) -> Result<()> {
        let existing = self.read()?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                Error::Filesystem(format!("Failed to open {}: {}", self.path.display(), e))
            })?;

        let mut block = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            block.push('\n');
        }
        block.push_str(HOSTS_MARKER);
        block.push('\n');
        block.push_str(&server.hosts_entry());
        block.push('\n');

        file.write_all(block.as_bytes()).map_err(|e| {
            Error::Filesystem(format!("Failed to write {}: {}", self.path.display(), e))
        })?;

        info!("Modified {}, added: {}", self.path.display(), server.hosts_entry());
        Ok(())
    }

    /// Remove every marker line that is directly followed by an entry naming
    /// `fqdn`, together with that entry. Returns `false` (file untouched) if
    /// no such pair exists; a lone marker or lone entry is never removed.
    pub fn remove_block(&self, fqdn: &str) -> Result<bool> {
        let content = self.read()?;
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let mut kept = String::with_capacity(content.len());
        let mut removed = false;
        let mut i = 0;

        while i < lines.len() {
            let is_marker = lines[i].trim_start().starts_with(MARKER_PREFIX);
            let next_matches = lines
                .get(i + 1)
                .map(|next| has_token(next, fqdn))
                .unwrap_or(false);

            if is_marker && next_matches {
                removed = true;
                i += 2;
                continue;
            }

            kept.push_str(lines[i]);
            i += 1;
        }

        if removed {
            self.write(&kept)?;
            info!("Removed hosts entry for {} from {}", fqdn, self.path.display());
        } else {
            warn!(
                "No marked hosts entry for {} in {}, leaving file unchanged",
                fqdn,
                self.path.display()
            );
        }

        Ok(removed)
    }

    /// Rewrite the marked entry whose address is `current`'s address so it
    /// names `new` instead. Only an entry directly below a marker line is
    /// touched; the marker stays in place and unmarked lines are left alone.
    pub fn replace_entry(&self, current: &ServerRecord, new: &ServerRecord) -> Result<bool> {
        let content = self.read()?;
        let lines: Vec<&str> = content.split_inclusive('\n').collect();
        let mut replaced = false;
        let mut updated = String::with_capacity(content.len());
        let mut i = 0;

        while i < lines.len() {
            let is_marker = lines[i].trim_start().starts_with(MARKER_PREFIX);
            let next_matches = lines
                .get(i + 1)
                .map(|next| next.split_whitespace().next() == Some(current.ip()))
                .unwrap_or(false);

            if is_marker && next_matches {
                updated.push_str(lines[i]);
                updated.push_str(&new.hosts_entry());
                updated.push('\n');
                replaced = true;
                i += 2;
                continue;
            }

            updated.push_str(lines[i]);
            i += 1;
        }

        if replaced {
            self.write(&updated)?;
            info!(
                "Modified {}, replaced {} with {}",
                self.path.display(),
                current,
                new
            );
        }

        Ok(replaced)
    }
}

/// `token` delimited by whitespace or line boundaries.
fn has_token(content: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    let pattern = format!(r"(?m)(^|\s){}(\s|$)", regex::escape(token));
    Regex::new(&pattern)
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "127.0.0.1\tlocalhost\n::1\tlocalhost ipv6-localhost\n";

    fn smt(ip: &str, fqdn: &str) -> ServerRecord {
        ServerRecord::new(ip, fqdn, "AA:BB")
    }

    fn hosts_with(content: &str) -> (tempfile::TempDir, HostsFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        fs::write(&path, content).unwrap();
        (dir, HostsFile::new(path))
    }

    #[test]
    fn test_append_then_references() {
        let (_dir, hosts) = hosts_with(BASE);
        let server = smt("10.0.0.1", "smt.example.com");

        assert!(!hosts.references(&server));
        hosts.append_entry(&server).unwrap();
        assert!(hosts.references(&server));

        let content = fs::read_to_string(hosts.path()).unwrap();
        assert!(content.starts_with(BASE));
        assert!(content.ends_with(&format!("{}\n10.0.0.1\tsmt.example.com\tsmt\n", HOSTS_MARKER)));
    }

    #[test]
    fn test_append_adds_newline_when_missing() {
        let (_dir, hosts) = hosts_with("127.0.0.1 localhost");
        hosts.append_entry(&smt("10.0.0.1", "smt.example.com")).unwrap();
        let content = fs::read_to_string(hosts.path()).unwrap();
        assert!(content.starts_with("127.0.0.1 localhost\n# Added by SMT"));
    }

    #[test]
    fn test_references_requires_both_tokens() {
        let (_dir, hosts) = hosts_with("10.0.0.1\tother.example.com\tother\n");
        assert!(!hosts.references(&smt("10.0.0.1", "smt.example.com")));
    }

    #[test]
    fn test_references_ignores_substrings() {
        let (_dir, hosts) = hosts_with("10.0.0.11\tsmt.example.com.au\tsmt\n");
        assert!(!hosts.references(&smt("10.0.0.1", "smt.example.com")));
    }

    #[test]
    fn test_remove_block_removes_marker_and_entry() {
        let (_dir, hosts) = hosts_with(BASE);
        hosts.append_entry(&smt("10.0.0.1", "smt.example.com")).unwrap();

        assert!(hosts.remove_block("smt.example.com").unwrap());
        assert_eq!(fs::read_to_string(hosts.path()).unwrap(), BASE);
    }

    #[test]
    fn test_remove_block_keeps_other_servers() {
        let (_dir, hosts) = hosts_with(BASE);
        hosts.append_entry(&smt("10.0.0.1", "smt.example.com")).unwrap();
        hosts.append_entry(&smt("10.0.0.2", "smt.other.com")).unwrap();

        hosts.remove_block("smt.example.com").unwrap();

        let content = fs::read_to_string(hosts.path()).unwrap();
        assert!(!content.contains("smt.example.com"));
        assert!(content.contains(&format!("{}\n10.0.0.2\tsmt.other.com\tsmt\n", HOSTS_MARKER)));
    }

    #[test]
    fn test_remove_block_marker_without_entry_is_noop() {
        let content = format!("{}{}\n10.0.0.9\tunrelated.example.com\tx\n", BASE, HOSTS_MARKER);
        let (_dir, hosts) = hosts_with(&content);

        assert!(!hosts.remove_block("smt.example.com").unwrap());
        assert_eq!(fs::read_to_string(hosts.path()).unwrap(), content);
    }

    #[test]
    fn test_remove_block_entry_without_marker_is_noop() {
        let content = format!("{}10.0.0.1\tsmt.example.com\tsmt\n", BASE);
        let (_dir, hosts) = hosts_with(&content);

        assert!(!hosts.remove_block("smt.example.com").unwrap());
        assert_eq!(fs::read_to_string(hosts.path()).unwrap(), content);
    }

    #[test]
    fn test_replace_entry() {
        let (_dir, hosts) = hosts_with(BASE);
        let old = smt("10.0.0.1", "smt.example.com");
        let new = smt("10.0.0.2", "smt.example.com");
        hosts.append_entry(&old).unwrap();

        assert!(hosts.replace_entry(&old, &new).unwrap());

        let content = fs::read_to_string(hosts.path()).unwrap();
        assert!(!content.contains("10.0.0.1"));
        assert!(content.contains(&format!("{}\n10.0.0.2\tsmt.example.com\tsmt\n", HOSTS_MARKER)));
        assert!(hosts.references(&new));
    }

    #[test]
    fn test_replace_entry_leaves_unmarked_lines() {
        let base = format!("{}10.0.0.1\tmy-alias\n", BASE);
        let (_dir, hosts) = hosts_with(&base);
        let old = smt("10.0.0.1", "smt.example.com");
        let new = smt("10.0.0.2", "smt.example.com");
        hosts.append_entry(&old).unwrap();

        assert!(hosts.replace_entry(&old, &new).unwrap());

        let content = fs::read_to_string(hosts.path()).unwrap();
        assert_eq!(
            content,
            format!("{}{}\n10.0.0.2\tsmt.example.com\tsmt\n", base, HOSTS_MARKER)
        );

        assert!(hosts.remove_block("smt.example.com").unwrap());
        assert_eq!(fs::read_to_string(hosts.path()).unwrap(), base);
    }

    #[test]
    fn test_replace_entry_unmarked_only_is_noop() {
        let base = format!("{}10.0.0.1\tmy-alias\n", BASE);
        let (_dir, hosts) = hosts_with(&base);
        let old = smt("10.0.0.1", "smt.example.com");
        let new = smt("10.0.0.2", "smt.example.com");

        assert!(!hosts.replace_entry(&old, &new).unwrap());
        assert_eq!(fs::read_to_string(hosts.path()).unwrap(), base);
    }

    #[test]
    fn test_replace_entry_missing_is_noop() {
        let (_dir, hosts) = hosts_with(BASE);
        let old = smt("10.0.0.1", "smt.example.com");
        let new = smt("10.0.0.2", "smt.example.com");
        assert!(!hosts.replace_entry(&old, &new).unwrap());
        assert_eq!(fs::read_to_string(hosts.path()).unwrap(), BASE);
    }

    #[test]
    fn test_missing_file_references_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = HostsFile::new(dir.path().join("hosts"));
        assert!(!hosts.references(&smt("10.0.0.1", "smt.example.com")));
    }
}
