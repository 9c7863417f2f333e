//! Moving the host from one registration server to another.
//!
//! Every step is a plain read-modify-write of a host file. Nothing is rolled
//! back when a later step fails; an interrupted migration is detected by the
//! consistency check on the next run and answered with re-discovery.

use crate::error::{Error, Result};
use crate::hosts::HostsFile;
use crate::registry::Registry;
use crate::server::ServerRecord;
use crate::stores::DependentStores;
use crate::trust::TrustStore;
use std::fs;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// Outcome of a promotion or failover.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Dependent store files now pointing at the new server.
    pub rewritten: Vec<PathBuf>,
    /// Trust anchor written for the new server.
    pub trust_anchor: Option<PathBuf>,
    /// Set when the certificate could not be imported.
    pub trust_error: Option<String>,
}

impl MigrationReport {
    pub fn trust_imported(&self) -> bool {
        self.trust_anchor.is_some() && self.trust_error.is_none()
    }
}

/// Outcome of a de-registration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RetireReport {
    pub credentials: Vec<String>,
    pub repos: Vec<PathBuf>,
    pub services: Vec<PathBuf>,
    pub hosts_block_removed: bool,
    pub connect_config_removed: bool,
}

pub struct Coordinator<'a> {
    registry: &'a Registry,
    hosts: &'a HostsFile,
    stores: &'a DependentStores,
    trust: &'a TrustStore,
    connect_config: Option<PathBuf>,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        registry: &'a Registry,
        hosts: &'a HostsFile,
        stores: &'a DependentStores,
        trust: &'a TrustStore,
    ) -> Self {
        Self {
            registry,
            hosts,
            stores,
            trust,
            connect_config: None,
        }
    }

    /// SUSEConnect configuration removed on retire.
    pub fn with_connect_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.connect_config = Some(path.into());
        self
    }

    /// Make `new` the current server.
    ///
    /// `previous` is the server the dependent stores point at before this
    /// call; it is captured by the caller and never re-read here. Its hosts
    /// entry is left in place.
    pub async fn promote(
        &self,
        previous: Option<&ServerRecord>,
        new: &ServerRecord,
    ) -> Result<MigrationReport> {
        info!("Promoting {} to current registration server", new);
        self.hosts.append_entry(new)?;
        self.finish(previous, new).await
    }

    /// Replace an unreachable `current` with the equivalent `new`, rewriting
    /// its hosts entry in place.
    pub async fn failover(
        &self,
        current: &ServerRecord,
        new: &ServerRecord,
    ) -> Result<MigrationReport> {
        info!("Switching registration server from {} to {}", current, new);
        if !self.hosts.replace_entry(current, new)? {
            warn!("No hosts entry for {}, adding a new one", current);
            self.hosts.append_entry(new)?;
        }
        self.finish(Some(current), new).await
    }

    async fn finish(
        &self,
        previous: Option<&ServerRecord>,
        new: &ServerRecord,
    ) -> Result<MigrationReport> {
        self.registry.store_current(new)?;

        let mut report = MigrationReport::default();
        if let Some(previous) = previous {
            report.rewritten = self.stores.switch_target(previous.fqdn(), new.fqdn())?;
        }

        match self.trust.import(new).await {
            Ok(anchor) => report.trust_anchor = Some(anchor),
            Err(e) => {
                error!("Failed to import certificate for {}: {}", new, e);
                report.trust_error = Some(e.to_string());
            }
        }

        Ok(report)
    }

    /// Drop a stale current record and its hosts block without touching the
    /// dependent stores.
    pub fn forget(&self, stale: &ServerRecord) -> Result<()> {
        self.hosts.remove_block(stale.fqdn())?;
        self.registry.clear_current()
    }

    /// Fully de-register from `old`.
    pub fn retire(&self, old: &ServerRecord) -> Result<RetireReport> {
        info!("Removing registration with {}", old);
        let mut report = RetireReport {
            credentials: self.stores.remove_credentials(old.fqdn())?,
            repos: self.stores.remove_repos(old.fqdn())?,
            services: self.stores.remove_services(old.fqdn())?,
            ..Default::default()
        };
        report.hosts_block_removed = self.hosts.remove_block(old.fqdn())?;
        self.registry.clear_current()?;

        if let Some(path) = &self.connect_config {
            if path.is_file() {
                fs::remove_file(path).map_err(|e| {
                    Error::Filesystem(format!("Failed to remove {}: {}", path.display(), e))
                })?;
                info!("Removed {}", path.display());
                report.connect_config_removed = true;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    struct Host {
        dir: tempfile::TempDir,
        registry: Registry,
        hosts: HostsFile,
        stores: DependentStores,
        trust: TrustStore,
    }

    impl Host {
        fn root(&self) -> &Path {
            self.dir.path()
        }

        fn coordinator(&self) -> Coordinator<'_> {
            Coordinator::new(&self.registry, &self.hosts, &self.stores, &self.trust)
                .with_connect_config(self.root().join("SUSEConnect"))
        }
    }

    fn host(refresh: &str) -> Host {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["repos", "services", "credentials"] {
            fs::create_dir_all(root.join(sub)).unwrap();
        }
        fs::write(root.join("hosts"), "127.0.0.1\tlocalhost\n").unwrap();
        Host {
            registry: Registry::new(root.join("data")),
            hosts: HostsFile::new(root.join("hosts")),
            stores: DependentStores::new(root.join("repos"), root.join("services"), root.join("credentials")),
            trust: TrustStore::new(root.join("anchors"), vec![refresh.to_string()]),
            dir,
        }
    }

    fn s1() -> ServerRecord {
        ServerRecord::new("10.0.0.1", "smt1.example.com", "AA").with_cert("PEM1")
    }

    fn s2() -> ServerRecord {
        ServerRecord::new("10.0.0.2", "smt2.example.com", "BB").with_cert("PEM2")
    }

    #[tokio::test]
    async fn test_promote_rewrites_dependents() {
        let host = host("true");
        let repo = host.root().join("repos/SLES.repo");
        fs::write(&repo, "baseurl=https://smt1.example.com/repo?credentials=SCCcredentials\n").unwrap();
        fs::write(host.root().join("repos/other.repo"), "baseurl=https://mirror.example.org/\n").unwrap();
        host.coordinator().promote(None, &s1()).await.unwrap();

        let report = host.coordinator().promote(Some(&s1()), &s2()).await.unwrap();

        let content = fs::read_to_string(&repo).unwrap();
        assert!(content.contains("smt2.example.com"));
        assert!(!content.contains("smt1.example.com"));
        assert_eq!(report.rewritten, vec![repo]);
        assert!(report.trust_imported());

        let hosts = fs::read_to_string(host.hosts.path()).unwrap();
        assert!(hosts.contains("10.0.0.2\tsmt2.example.com\tsmt2"));
        assert!(hosts.contains("10.0.0.1\tsmt1.example.com\tsmt1"));
        assert_eq!(host.registry.load_current(), Some(s2()));
        assert!(host.root().join("anchors/registration_server_10_0_0_2.pem").is_file());
    }

    #[tokio::test]
    async fn test_trust_failure_does_not_roll_back() {
        let host = host("false");

        let report = host.coordinator().promote(None, &s1()).await.unwrap();

        assert!(!report.trust_imported());
        assert!(report.trust_error.is_some());
        assert_eq!(host.registry.load_current(), Some(s1()));
        assert!(host.hosts.references(&s1()));
    }

    #[tokio::test]
    async fn test_failover_replaces_hosts_entry() {
        let host = host("true");
        let current = ServerRecord::new("10.0.0.1", "smt.example.com", "AA").with_cert("PEM");
        let new = ServerRecord::new("10.0.0.2", "smt.example.com", "AA").with_cert("PEM");
        host.coordinator().promote(None, &current).await.unwrap();

        host.coordinator().failover(&current, &new).await.unwrap();

        let hosts = fs::read_to_string(host.hosts.path()).unwrap();
        assert!(hosts.contains("10.0.0.2\tsmt.example.com\tsmt"));
        assert!(!hosts.contains("10.0.0.1\t"));
        assert_eq!(host.registry.load_current(), Some(new));
    }

    #[tokio::test]
    async fn test_failover_keeps_operator_alias_for_same_address() {
        let host = host("true");
        fs::write(host.hosts.path(), "127.0.0.1\tlocalhost\n10.0.0.1\tmy-alias\n").unwrap();
        let current = ServerRecord::new("10.0.0.1", "smt.example.com", "AA").with_cert("PEM");
        let new = ServerRecord::new("10.0.0.2", "smt.example.com", "AA").with_cert("PEM");
        host.coordinator().promote(None, &current).await.unwrap();

        host.coordinator().failover(&current, &new).await.unwrap();

        let hosts = fs::read_to_string(host.hosts.path()).unwrap();
        assert!(hosts.starts_with("127.0.0.1\tlocalhost\n10.0.0.1\tmy-alias\n"));
        assert_eq!(hosts.matches("smt.example.com").count(), 1);

        host.coordinator().retire(&new).unwrap();
        assert_eq!(
            fs::read_to_string(host.hosts.path()).unwrap(),
            "127.0.0.1\tlocalhost\n10.0.0.1\tmy-alias\n"
        );
    }

    #[tokio::test]
    async fn test_retire_removes_everything() {
        let host = host("true");
        fs::write(
            host.root().join("repos/SLES.repo"),
            "baseurl=https://smt1.example.com/repo?credentials=SLES_cred\n",
        )
        .unwrap();
        fs::write(
            host.root().join("services/SMT.service"),
            "url=https://smt1.example.com/services\n",
        )
        .unwrap();
        fs::write(host.root().join("credentials/SLES_cred"), "x").unwrap();
        fs::write(host.root().join("credentials/NCCcredentials"), "x").unwrap();
        fs::write(host.root().join("SUSEConnect"), "url: https://smt1.example.com\n").unwrap();
        host.coordinator().promote(None, &s1()).await.unwrap();

        let report = host.coordinator().retire(&s1()).unwrap();

        assert_eq!(report.credentials, vec!["SLES_cred", "NCCcredentials"]);
        assert_eq!(report.repos.len(), 1);
        assert_eq!(report.services.len(), 1);
        assert!(report.hosts_block_removed);
        assert!(report.connect_config_removed);
        assert!(host.registry.load_current().is_none());
        assert_eq!(
            fs::read_to_string(host.hosts.path()).unwrap(),
            "127.0.0.1\tlocalhost\n"
        );
    }

    #[tokio::test]
    async fn test_forget_keeps_dependents() {
        let host = host("true");
        let repo = host.root().join("repos/SLES.repo");
        fs::write(&repo, "baseurl=https://smt1.example.com/repo\n").unwrap();
        host.coordinator().promote(None, &s1()).await.unwrap();

        host.coordinator().forget(&s1()).unwrap();

        assert!(repo.is_file());
        assert!(host.registry.load_current().is_none());
        assert!(!host.hosts.references(&s1()));
    }
}
