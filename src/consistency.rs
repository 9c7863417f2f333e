//! The only sanctioned way to read the current registration server.

use crate::hosts::HostsFile;
use crate::registry::Registry;
use crate::server::ServerRecord;
use crate::stores::DependentStores;
use tracing::{debug, info, warn};

pub struct ConsistencyChecker<'a> {
    registry: &'a Registry,
    hosts: &'a HostsFile,
    stores: &'a DependentStores,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(registry: &'a Registry, hosts: &'a HostsFile, stores: &'a DependentStores) -> Self {
        Self {
            registry,
            hosts,
            stores,
        }
    }

    /// The persisted current server, if host state still agrees with it.
    ///
    /// A record whose address or FQDN is missing from the hosts file is
    /// deleted. A record the dependent stores no longer reference is kept on
    /// disk but not returned, since credentials may simply not be in place yet.
    /// Deleting the record is a write, so callers must hold the
    /// [`RegistrationLock`](crate::RegistrationLock).
    pub fn get_current(&self) -> Option<ServerRecord> {
        self.check(true)
    }

    /// Same answer as [`get_current`](Self::get_current), but a stale record
    /// is only reported, never deleted. Safe without the lock.
    pub fn inspect_current(&self) -> Option<ServerRecord> {
        self.check(false)
    }

    fn check(&self, heal: bool) -> Option<ServerRecord> {
        let server = self.registry.load_current()?;

        if !self.hosts.references(&server) {
            if heal {
                warn!(
                    "{} has no matching entry in {}, discarding stored registration",
                    server,
                    self.hosts.path().display()
                );
                if let Err(e) = self.registry.clear_current() {
                    warn!("Failed to discard stale registration: {}", e);
                }
            } else {
                debug!(
                    "{} has no matching entry in {}",
                    server,
                    self.hosts.path().display()
                );
            }
            return None;
        }

        if !self.stores.is_registered(server.fqdn()) {
            info!(
                "No repositories with credentials reference {}, instance is not registered",
                server.fqdn()
            );
            return None;
        }

        Some(server)
    }
}
