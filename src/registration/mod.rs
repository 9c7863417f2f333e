//! Host-level registration workflows.
//!
//! [`Registration`] owns one instance of every component, configured from a
//! [`ClientConfig`](crate::config::ClientConfig), and sequences them into the
//! operations the CLI exposes. Callers are expected to hold a
//! [`RegistrationLock`](crate::lock::RegistrationLock) around any mutating
//! operation.

mod builder;

pub use builder::RegistrationBuilder;

use crate::config::ClientConfig;
use crate::consistency::ConsistencyChecker;
use crate::discovery::{DiscoveryClient, DiscoveryMode};
use crate::error::{Error, Result};
use crate::failover::find_replacement;
use crate::hosts::HostsFile;
use crate::migration::{Coordinator, MigrationReport, RetireReport};
use crate::probe::ServerProbe;
use crate::registry::Registry;
use crate::server::ServerRecord;
use crate::stores::DependentStores;
use crate::trust::TrustStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    AlreadyRegistered(ServerRecord),
    Registered {
        server: ServerRecord,
        report: MigrationReport,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailoverOutcome {
    /// The current server answers; nothing was changed.
    CurrentHealthy(ServerRecord),
    Switched {
        from: ServerRecord,
        to: ServerRecord,
        report: MigrationReport,
    },
}

pub struct Registration {
    config: ClientConfig,
    registry: Registry,
    hosts: HostsFile,
    stores: DependentStores,
    trust: TrustStore,
    connect_config: PathBuf,
    discovery: DiscoveryClient,
    probe: Arc<dyn ServerProbe>,
}

impl Registration {
    pub fn builder() -> RegistrationBuilder {
        RegistrationBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn hosts(&self) -> &HostsFile {
        &self.hosts
    }

    pub fn stores(&self) -> &DependentStores {
        &self.stores
    }

    pub fn discovery_mode(&self) -> &DiscoveryMode {
        self.discovery.mode()
    }

    fn coordinator(&self) -> Coordinator<'_> {
        Coordinator::new(&self.registry, &self.hosts, &self.stores, &self.trust)
            .with_connect_config(&self.connect_config)
    }

    /// Consistency-checked current server.
    pub fn get_current(&self) -> Option<ServerRecord> {
        ConsistencyChecker::new(&self.registry, &self.hosts, &self.stores).get_current()
    }

    /// Consistency-checked current server without self-healing, for
    /// lock-free readers.
    pub fn inspect_current(&self) -> Option<ServerRecord> {
        ConsistencyChecker::new(&self.registry, &self.hosts, &self.stores).inspect_current()
    }

    /// Cached candidates from the last discovery.
    pub fn candidates(&self) -> Vec<ServerRecord> {
        self.registry.list_candidates()
    }

    /// Fetch fresh server data and cache every record as a candidate.
    pub async fn discover(&self) -> Result<Vec<ServerRecord>> {
        let servers = self.discovery.discover().await?;
        for server in &servers {
            if let Err(e) = self.registry.store_candidate(server) {
                warn!("Could not cache {}: {}", server, e);
            }
        }
        info!("Discovered {} registration server(s)", servers.len());
        Ok(servers)
    }

    /// Equivalent, responsive replacement for `current` among the cached
    /// candidates.
    pub async fn find_replacement(&self, current: &ServerRecord) -> Option<ServerRecord> {
        find_replacement(current, &self.candidates(), self.probe.as_ref()).await
    }

    /// Make `new` the current server, migrating from whatever is current now.
    pub async fn promote(&self, new: &ServerRecord) -> Result<MigrationReport> {
        let previous = self.get_current();
        let new = self.probe.fetch_cert(new).await?;
        self.coordinator().promote(previous.as_ref(), &new).await
    }

    /// Fully de-register from `old`.
    pub fn retire(&self, old: &ServerRecord) -> Result<RetireReport> {
        self.coordinator().retire(old)
    }

    /// Register with the first responsive discovered server whose certificate
    /// matches its fingerprint.
    ///
    /// With `force_new` an existing registration is retired first. Otherwise a
    /// consistent registration is left alone, and a stale record is dropped
    /// with its dependent stores migrated to the new server.
    pub async fn register(&self, force_new: bool) -> Result<RegisterOutcome> {
        let mut previous = None;

        // Read before the consistency check, which may delete it
        let stored = self.registry.load_current();

        if let Some(current) = self.get_current() {
            if !force_new {
                info!("Instance is registered with {}", current);
                return Ok(RegisterOutcome::AlreadyRegistered(current));
            }
            self.retire(&current)?;
        } else if let Some(stale) = stored {
            if force_new {
                self.retire(&stale)?;
            } else {
                info!("Dropping stale registration with {}", stale);
                self.coordinator().forget(&stale)?;
                previous = Some(stale);
            }
        }

        for server in self.discover().await? {
            if !self.probe.is_responsive(&server).await {
                continue;
            }
            let server = match self.probe.fetch_cert(&server).await {
                Ok(server) => server,
                Err(e) => {
                    warn!("Skipping {}: {}", server, e);
                    continue;
                }
            };

            let report = self.coordinator().promote(previous.as_ref(), &server).await?;
            return Ok(RegisterOutcome::Registered { server, report });
        }

        Err(Error::Discovery(
            "no responsive registration server with a valid certificate".to_string(),
        ))
    }

    /// Move to an equivalent server if the current one stopped answering.
    /// The candidate cache is searched first, then fresh discovery.
    pub async fn failover(&self) -> Result<FailoverOutcome> {
        let current = self.get_current().ok_or(Error::NotRegistered)?;

        if self.probe.is_responsive(&current).await {
            return Ok(FailoverOutcome::CurrentHealthy(current));
        }
        warn!("Current registration server {} is not responsive", current);

        let replacement = match self.find_replacement(&current).await {
            Some(server) => server,
            None => {
                let discovered = self.discover().await?;
                find_replacement(&current, &discovered, self.probe.as_ref())
                    .await
                    .ok_or_else(|| Error::NoReplacement(current.to_string()))?
            }
        };

        let replacement = self.probe.fetch_cert(&replacement).await?;
        let report = self.coordinator().failover(&current, &replacement).await?;

        Ok(FailoverOutcome::Switched {
            from: current,
            to: replacement,
            report,
        })
    }

    /// Retire whatever server is stored, consistent or not, and optionally
    /// drop the candidate cache.
    pub fn clean(&self, keep_cache: bool) -> Result<Option<RetireReport>> {
        let report = match self.registry.load_current() {
            Some(stored) => Some(self.retire(&stored)?),
            None => {
                info!("No stored registration server to remove");
                None
            }
        };

        if !keep_cache {
            self.registry.clear_candidates()?;
        }

        Ok(report)
    }
}
