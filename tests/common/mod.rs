//! Shared fixtures: a throwaway host tree plus fake network seams.

#![allow(dead_code)]

use async_trait::async_trait;
use cloudregister::config::{ClientConfig, PathsSection};
use cloudregister::{
    Error, HttpRequest, HttpResponse, HttpTransport, Registration, Result, ServerProbe,
    ServerRecord, TrustStore,
};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const METADATA_URL: &str = "https://metadata.example/smt";

/// Answers by URL prefix; anything else is a transport error.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<String, HttpResponse>>,
    pub seen: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn respond(&self, url: &str, status: u16, body: &str) {
        self.responses.lock().unwrap().insert(
            url.to_string(),
            HttpResponse {
                status,
                body: body.to_string(),
            },
        );
    }

    pub fn urls(&self) -> Vec<String> {
        self.seen.lock().unwrap().iter().map(|r| r.url.clone()).collect()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.seen.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .iter()
            .find(|(url, _)| request.url.starts_with(url.as_str()))
            .map(|(_, r)| r.clone())
            .ok_or_else(|| Error::Discovery(format!("connection refused: {}", request.url)))
    }
}

/// Responsive for a mutable set of addresses; certificates are attached
/// without verification.
#[derive(Default)]
pub struct FakeProbe {
    up: Mutex<HashSet<String>>,
}

impl FakeProbe {
    pub fn up(&self, ip: &str) {
        self.up.lock().unwrap().insert(ip.to_string());
    }

    pub fn down(&self, ip: &str) {
        self.up.lock().unwrap().remove(ip);
    }
}

#[async_trait]
impl ServerProbe for FakeProbe {
    async fn is_responsive(&self, server: &ServerRecord) -> bool {
        self.up.lock().unwrap().contains(server.ip())
    }

    async fn fetch_cert(&self, server: &ServerRecord) -> Result<ServerRecord> {
        Ok(server.clone().with_cert(format!("PEM for {}", server.ip())))
    }
}

/// A temp directory laid out like a guest's root file system.
pub struct Host {
    pub dir: TempDir,
    pub paths: PathsSection,
    pub transport: Arc<FakeTransport>,
    pub probe: Arc<FakeProbe>,
}

impl Host {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let paths = PathsSection::rooted_at(dir.path());
        for sub in [&paths.repos_dir, &paths.services_dir, &paths.credentials_dir] {
            fs::create_dir_all(sub).unwrap();
        }
        fs::write(&paths.hosts_file, "127.0.0.1\tlocalhost\n").unwrap();
        Self {
            dir,
            paths,
            transport: Arc::new(FakeTransport::default()),
            probe: Arc::new(FakeProbe::default()),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn metadata_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.server.metadata_server = Some(METADATA_URL.to_string());
        config.paths = self.paths.clone();
        config
    }

    pub fn region_config(&self, servers: &[&str]) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.server.api = Some("regionInfo".to_string());
        config.server.cert_location = Some(self.cert_dir());
        config.server.regionsrv = Some(servers.join(","));
        config.paths = self.paths.clone();
        config
    }

    pub fn cert_dir(&self) -> PathBuf {
        self.root().join("var/lib/regionService/certs")
    }

    pub fn registration(&self, config: ClientConfig) -> Registration {
        Registration::builder()
            .config(config)
            .transport(self.transport.clone())
            .probe(self.probe.clone())
            .trust_store(TrustStore::new(
                self.root().join("anchors"),
                vec!["true".to_string()],
            ))
            .build()
            .unwrap()
    }

    pub fn hosts(&self) -> String {
        fs::read_to_string(&self.paths.hosts_file).unwrap()
    }

    pub fn repo_path(&self, name: &str) -> PathBuf {
        self.paths.repos_dir.join(name)
    }

    /// A repository plus its credentials pointing at `fqdn`.
    pub fn add_repo(&self, name: &str, fqdn: &str) -> PathBuf {
        let path = self.repo_path(name);
        fs::write(
            &path,
            format!(
                "[{name}]\nenabled=1\nbaseurl=https://{fqdn}/repo/{name}?credentials=SCCcredentials\n"
            ),
        )
        .unwrap();
        fs::write(self.paths.credentials_dir.join("SCCcredentials"), "username=x\n").unwrap();
        path
    }
}

pub fn metadata_json(ip: &str, fqdn: &str, fingerprint: &str) -> String {
    format!(r#"{{"fingerprint": "{fingerprint}", "SMTserverIP": "{ip}", "SMTserverName": "{fqdn}"}}"#)
}

pub fn region_xml(servers: &[(&str, &str)]) -> String {
    let mut xml = String::from("<regionSMTdata>\n");
    for (ip, fqdn) in servers {
        xml.push_str(&format!(
            "  <smtInfo fingerprint=\"AA:BB\" SMTserverIP=\"{ip}\" SMTserverName=\"{fqdn}\"/>\n"
        ));
    }
    xml.push_str("</regionSMTdata>\n");
    xml
}
