use super::Registration;
use crate::config::{ClientConfig, ProxyConfig};
use crate::discovery::{strategy_by_name, DiscoveryClient, HttpTransport, ReqwestTransport};
use crate::error::{Error, Result};
use crate::hosts::HostsFile;
use crate::probe::{HttpProbe, ServerProbe};
use crate::registry::Registry;
use crate::stores::DependentStores;
use crate::trust::TrustStore;
use std::sync::Arc;

/// Builder for a [`Registration`].
///
/// Only the configuration is required. The network seams default to a
/// reqwest transport configured from the host's proxy settings and an HTTP
/// probe on top of it; the trust store defaults to the layout detected from
/// the OS release file.
///
/// # Example
///
/// ```no_run
/// use cloudregister::{Parser, Registration};
///
/// # async fn example() -> Result<(), cloudregister::Error> {
/// let config = Parser::new().load_config("/etc/regionserverclnt.yaml")?;
/// let registration = Registration::builder().config(config).build()?;
/// let current = registration.get_current();
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct RegistrationBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
    probe: Option<Arc<dyn ServerProbe>>,
    trust_store: Option<TrustStore>,
}

impl RegistrationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration. Required.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the HTTP transport used for discovery (and by the default probe).
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn ServerProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn trust_store(mut self, trust: TrustStore) -> Self {
        self.trust_store = Some(trust);
        self
    }

    /// Validate the configuration and wire up every component.
    pub fn build(self) -> Result<Registration> {
        let config = self
            .config
            .ok_or_else(|| Error::Config("Configuration is required".to_string()))?;
        config.validate()?;

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(
                config.server.timeout(),
                ProxyConfig::from_sysconfig(&config.paths.proxy_config),
            )?),
        };
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(HttpProbe::new(transport.clone())));

        let strategy = config
            .instance
            .instance_args
            .as_deref()
            .and_then(strategy_by_name);
        let discovery =
            DiscoveryClient::new(config.discovery_mode()?, transport).with_instance_args(strategy);

        let paths = &config.paths;
        let trust = self.trust_store.unwrap_or_else(|| paths.trust_store());

        Ok(Registration {
            registry: Registry::new(&paths.registration_dir),
            hosts: HostsFile::new(&paths.hosts_file),
            stores: DependentStores::new(&paths.repos_dir, &paths.services_dir, &paths.credentials_dir),
            connect_config: paths.connect_config.clone(),
            trust,
            discovery,
            probe,
            config,
        })
    }
}
