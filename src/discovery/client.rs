use super::{parse_metadata_json, parse_region_xml, HttpRequest, HttpTransport, InstanceArgs};
use crate::error::{Error, Result};
use crate::server::ServerRecord;
use rand::seq::SliceRandom;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where server data comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// One JSON document from a metadata endpoint.
    Metadata { url: String },
    /// XML from the first answering region server; each server is contacted
    /// over HTTPS trusting only `<cert_dir>/<server>.pem`.
    RegionServers {
        api: String,
        cert_dir: PathBuf,
        servers: Vec<String>,
    },
}

pub struct DiscoveryClient {
    mode: DiscoveryMode,
    transport: Arc<dyn HttpTransport>,
    instance_args: Option<Box<dyn InstanceArgs>>,
}

impl DiscoveryClient {
    pub fn new(mode: DiscoveryMode, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            mode,
            transport,
            instance_args: None,
        }
    }

    pub fn with_instance_args(mut self, strategy: Option<Box<dyn InstanceArgs>>) -> Self {
        self.instance_args = strategy;
        self
    }

    pub fn mode(&self) -> &DiscoveryMode {
        &self.mode
    }

    /// Fetch fresh server data. Every error returned here is fatal.
    pub async fn discover(&self) -> Result<Vec<ServerRecord>> {
        match &self.mode {
            DiscoveryMode::Metadata { url } => self.from_metadata(url).await.map(|s| vec![s]),
            DiscoveryMode::RegionServers {
                api,
                cert_dir,
                servers,
            } => {
                let mut order = servers.clone();
                order.shuffle(&mut rand::thread_rng());
                self.from_region_servers(api, cert_dir, &order).await
            }
        }
    }

    async fn from_metadata(&self, url: &str) -> Result<ServerRecord> {
        info!("Using metadata server \"{}\" to obtain SMT information", url);

        let response = self
            .transport
            .get(&HttpRequest::get(url))
            .await
            .map_err(|e| Error::Discovery(format!("metadata server {}: {}", url, e)))?;
        if response.status != 200 {
            return Err(Error::Discovery(format!(
                "Metadata server returned {}",
                response.status
            )));
        }

        parse_metadata_json(&response.body)
    }

    /// Try `servers` in the given order; first well-formed 200 wins.
    pub async fn from_region_servers(
        &self,
        api: &str,
        cert_dir: &std::path::Path,
        servers: &[String],
    ) -> Result<Vec<ServerRecord>> {
        let api = self.api_with_args(api).await;
        info!("Using API: {}", api);

        for server in servers {
            let server = server.trim();
            info!("Using region server: {}", server);

            let cert = cert_dir.join(format!("{}.pem", server));
            if !cert.is_file() {
                info!("No cert found: {} skip this server", cert.display());
                continue;
            }

            let url = format!("https://{}/{}", server, api.trim_start_matches('/'));
            match self.transport.get(&HttpRequest::get(url).pinned(cert)).await {
                Ok(response) if response.status == 200 => match parse_region_xml(&response.body) {
                    Ok(records) => return Ok(records),
                    Err(e) => error!("Invalid response from {}: {}", server, e),
                },
                Ok(response) => {
                    error!("Server {} returned: {}", server, response.status);
                    error!("{}", response.body);
                }
                Err(e) => error!("No response from: {} ({})", server, e),
            }
        }

        error!("None of the servers responded");
        error!("\tAttempted: {:?}", servers);
        Err(Error::DiscoveryExhausted(servers.to_vec()))
    }

    async fn api_with_args(&self, api: &str) -> String {
        let Some(strategy) = &self.instance_args else {
            return api.to_string();
        };

        match strategy
            .produce_extra_query_args(self.transport.as_ref())
            .await
        {
            Ok(args) if !args.is_empty() => {
                info!("Region server arguments: ?{}", args);
                format!("{}?{}", api, args)
            }
            Ok(_) => api.to_string(),
            Err(e) => {
                warn!(
                    "instanceArgs strategy '{}' failed ({}). Continuing without additional arguments.",
                    strategy.name(),
                    e
                );
                api.to_string()
            }
        }
    }
}
