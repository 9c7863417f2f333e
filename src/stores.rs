//! Package manager configuration that depends on the current server.
//!
//! Repository files, service files and credential files are owned by zypper;
//! this module only locates the ones that reference a given server, rewrites
//! the server name in place, or deletes them.

use crate::error::{Error, Result};
use crate::exec::{run_command, DEFAULT_COMMAND_TIMEOUT};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_REPOS_DIR: &str = "/etc/zypp/repos.d";
pub const DEFAULT_SERVICES_DIR: &str = "/etc/zypp/services.d";
pub const DEFAULT_CREDENTIALS_DIR: &str = "/etc/zypp/credentials.d";

/// Credentials created by registration even when no repository names them.
pub const BASE_CREDENTIALS: [&str; 2] = ["NCCcredentials", "SCCcredentials"];

const CREDENTIALS_QUERY: &str = "?credentials=";

#[derive(Debug, Clone)]
pub struct DependentStores {
    repos_dir: PathBuf,
    services_dir: PathBuf,
    credentials_dir: PathBuf,
}

impl DependentStores {
    pub fn new(
        repos_dir: impl Into<PathBuf>,
        services_dir: impl Into<PathBuf>,
        credentials_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            repos_dir: repos_dir.into(),
            services_dir: services_dir.into(),
            credentials_dir: credentials_dir.into(),
        }
    }

    pub fn credentials_dir(&self) -> &Path {
        &self.credentials_dir
    }

    /// Whether any repository has a `baseurl` pointing at `fqdn`.
    pub fn has_repos(&self, fqdn: &str) -> bool {
        list_files(&self.repos_dir)
            .iter()
            .any(|path| file_references(path, "baseurl", fqdn))
    }

    /// Credential names referenced as `?credentials=<name>` by repositories
    /// that point at `fqdn`, in first-seen order.
    pub fn referenced_credentials(&self, fqdn: &str) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for path in list_files(&self.repos_dir) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            for line in content.lines() {
                if !(line.contains("baseurl") && line.contains(fqdn)) {
                    continue;
                }
                if let Some(name) = credential_name(line) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }

    /// Whether a credential file referenced by the server's repositories exists.
    pub fn has_credentials(&self, fqdn: &str) -> bool {
        self.referenced_credentials(fqdn)
            .iter()
            .any(|name| self.credentials_dir.join(name).is_file())
    }

    /// Registered means: repositories still point at the server and the
    /// credentials they use are present.
    pub fn is_registered(&self, fqdn: &str) -> bool {
        self.has_repos(fqdn) && self.has_credentials(fqdn)
    }

    /// Delete the referenced credentials plus the base credentials.
    pub fn remove_credentials(&self, fqdn: &str) -> Result<Vec<String>> {
        let mut names = self.referenced_credentials(fqdn);
        for base in BASE_CREDENTIALS {
            if !names.iter().any(|n| n == base) {
                names.push(base.to_string());
            }
        }

        let mut removed = Vec::new();
        for name in names {
            let path = self.credentials_dir.join(&name);
            if path.is_file() {
                info!("Removing credentials: {}", name);
                remove_file(&path)?;
                removed.push(name);
            }
        }
        Ok(removed)
    }

    /// Delete repository files with a `baseurl` pointing at `fqdn`.
    pub fn remove_repos(&self, fqdn: &str) -> Result<Vec<PathBuf>> {
        remove_referencing(&self.repos_dir, "baseurl", fqdn, "repo")
    }

    /// Delete service files with a `url` pointing at `fqdn`.
    pub fn remove_services(&self, fqdn: &str) -> Result<Vec<PathBuf>> {
        remove_referencing(&self.services_dir, "url", fqdn, "service")
    }

    /// Replace `old_fqdn` by `new_fqdn` in every `*.repo` and `*.service*`
    /// file that contains it. Returns the rewritten files.
    pub fn switch_target(&self, old_fqdn: &str, new_fqdn: &str) -> Result<Vec<PathBuf>> {
        if old_fqdn.is_empty() || old_fqdn == new_fqdn {
            return Ok(Vec::new());
        }

        let repos = list_files(&self.repos_dir)
            .into_iter()
            .filter(|p| p.extension().map(|e| e == "repo").unwrap_or(false));
        let services = list_files(&self.services_dir).into_iter().filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.contains(".service"))
                .unwrap_or(false)
        });

        let mut rewritten = Vec::new();
        for path in repos.chain(services) {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::Filesystem(format!("Failed to read {}: {}", path.display(), e))
            })?;
            if !content.contains(old_fqdn) {
                continue;
            }
            fs::write(&path, content.replace(old_fqdn, new_fqdn)).map_err(|e| {
                Error::Filesystem(format!("Failed to write {}: {}", path.display(), e))
            })?;
            info!("Switched {} from {} to {}", path.display(), old_fqdn, new_fqdn);
            rewritten.push(path);
        }
        Ok(rewritten)
    }
}

/// PID of a running zypper process, if any.
pub async fn package_manager_pid() -> Option<String> {
    let argv: Vec<String> = ["ps", "-C", "zypper", "-o", "pid="]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let outcome = run_command(&argv, DEFAULT_COMMAND_TIMEOUT).await;
    let pid = outcome.stdout().trim();
    if pid.is_empty() {
        None
    } else {
        Some(pid.lines().next().unwrap_or(pid).trim().to_string())
    }
}

fn credential_name(line: &str) -> Option<String> {
    let (_, tail) = line.rsplit_once(CREDENTIALS_QUERY)?;
    let name = tail
        .split(|c: char| c == '&' || c.is_whitespace())
        .next()
        .unwrap_or_default();

    if name.is_empty() || name.contains('/') || name.starts_with('.') {
        if !name.is_empty() {
            warn!("Ignoring suspicious credentials name '{}'", name);
        }
        return None;
    }
    Some(name.to_string())
}

fn list_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

fn file_references(path: &Path, key: &str, fqdn: &str) -> bool {
    fs::read_to_string(path)
        .map(|content| {
            content
                .lines()
                .any(|line| line.contains(key) && line.contains(fqdn))
        })
        .unwrap_or(false)
}

fn remove_referencing(dir: &Path, key: &str, fqdn: &str, kind: &str) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for path in list_files(dir) {
        if file_references(&path, key, fqdn) {
            info!(
                "Removing {}: {}",
                kind,
                path.file_name().unwrap_or_default().to_string_lossy()
            );
            remove_file(&path)?;
            removed.push(path);
        }
    }
    Ok(removed)
}

fn remove_file(path: &Path) -> Result<()> {
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
