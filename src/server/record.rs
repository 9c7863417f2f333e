use super::cert::normalize_fingerprint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One registration (SMT) server as announced by the region infrastructure.
///
/// Records are never edited after discovery. Switching servers means
/// replacing the whole record; [`ServerRecord::with_cert`] consumes the
/// record and hands back a new one carrying the certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    ip: String,
    fqdn: String,
    name: String,
    fingerprint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cert: Option<String>,
}

impl ServerRecord {
    /// Build a record from the announced address, FQDN and certificate
    /// fingerprint. The short name is the first label of the FQDN.
    pub fn new(
        ip: impl Into<String>,
        fqdn: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        let fqdn = fqdn.into().trim().to_string();
        let name = fqdn.split('.').next().unwrap_or_default().to_string();
        Self {
            ip: ip.into().trim().to_string(),
            fqdn,
            name,
            fingerprint: fingerprint.into().trim().to_string(),
            cert: None,
        }
    }

    /// Returns a copy of this record that carries the given PEM certificate.
    pub fn with_cert(self, pem: impl Into<String>) -> Self {
        Self {
            cert: Some(pem.into()),
            ..self
        }
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn cert(&self) -> Option<&str> {
        self.cert.as_deref()
    }

    /// The FQDN without its host label (`smt-ec2.susecloud.net` -> `susecloud.net`).
    pub fn domain_name(&self) -> &str {
        self.fqdn
            .split_once('.')
            .map(|(_, domain)| domain)
            .unwrap_or(&self.fqdn)
    }

    /// The `/etc/hosts` line for this server, without trailing newline.
    pub fn hosts_entry(&self) -> String {
        format!("{}\t{}\t{}", self.ip, self.fqdn, self.name)
    }

    /// File name used when the certificate is placed in a trust anchor directory.
    pub fn cert_file_name(&self) -> String {
        let ip: String = self
            .ip
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        format!("registration_server_{}.pem", ip)
    }

    /// Equivalent servers front the same logical region endpoint (same FQDN
    /// and certificate) from a different address. A record is never
    /// equivalent to itself.
    pub fn is_equivalent(&self, other: &ServerRecord) -> bool {
        self.ip != other.ip
            && self.fqdn.eq_ignore_ascii_case(&other.fqdn)
            && normalize_fingerprint(&self.fingerprint) == normalize_fingerprint(&other.fingerprint)
    }

    /// Compares address, FQDN, short name and fingerprint, ignoring whether
    /// a certificate has been attached.
    pub fn same_identity(&self, other: &ServerRecord) -> bool {
        self.ip == other.ip
            && self.fqdn == other.fqdn
            && self.name == other.name
            && self.fingerprint == other.fingerprint
    }
}

impl fmt::Display for ServerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fqdn, self.ip)
    }
}
