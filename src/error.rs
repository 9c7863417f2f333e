// Allow unused_assignments at module level because thiserror's generated code
// for struct variants triggers false positive warnings - the fields ARE used
// in the Display impl but rustc's lint pass doesn't see this.
#![allow(unused_assignments)]

use miette::Diagnostic;
use std::io;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(
        code(cloudregister::config::error),
        help("Check /etc/regionserverclnt.yaml or the file passed with --config")
    )]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Filesystem error: {0}")]
    #[diagnostic(code(cloudregister::filesystem::error))]
    Filesystem(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metadata server did not supply a value for \"{0}\"")]
    #[diagnostic(
        code(cloudregister::discovery::metadata_field),
        help("The metadata endpoint must return fingerprint, SMTserverIP and SMTserverName")
    )]
    MissingMetadataField(String),

    #[error("Unable to obtain SMT server information: {0}")]
    #[diagnostic(
        code(cloudregister::discovery::failed),
        help("Verify network access to the region servers and that their certificates exist in certLocation")
    )]
    Discovery(String),

    #[error("None of the region servers responded (attempted: {})", .0.join(", "))]
    #[diagnostic(
        code(cloudregister::discovery::exhausted),
        help("Check the regionsrv list and the pinned <server>.pem files")
    )]
    DiscoveryExhausted(Vec<String>),

    #[error("Certificate error for {server}: {reason}")]
    Certificate { server: String, reason: String },

    #[error("Trust store update failed: {0}")]
    TrustImport(String),

    #[error("Instance is not registered")]
    #[diagnostic(
        code(cloudregister::registration::missing),
        help("Register the instance with `cloudregister register`")
    )]
    NotRegistered,

    #[error("No equivalent server available to replace {0}")]
    NoReplacement(String),

    #[error("Another cloudregister process holds the lock{}",
        .pid.as_ref().map(|p| format!(" (PID {})", p)).unwrap_or_default()
    )]
    LockHeld { pid: Option<u32> },

    #[error("Package manager is running (PID {0})")]
    PackageManagerBusy(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Errors after which the process must stop instead of retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config(_)
                | Error::Parse(_)
                | Error::Yaml(_)
                | Error::MissingMetadataField(_)
                | Error::Discovery(_)
                | Error::DiscoveryExhausted(_)
        )
    }

    /// Returns a helpful suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Error::Config(_) | Error::Parse(_) | Error::Yaml(_) => Some(
                "Validate the client configuration file; see the `server` and `paths` sections"
                    .to_string(),
            ),
            Error::MissingMetadataField(field) => Some(format!(
                "The metadata response lacks '{}'. Check the metadata_server URL.",
                field
            )),
            Error::DiscoveryExhausted(servers) => Some(format!(
                "Make sure a pinned certificate exists for at least one of: {}",
                servers.join(", ")
            )),
            Error::NotRegistered => {
                Some("Run `cloudregister register` to set up a registration server".to_string())
            }
            Error::NoReplacement(_) => Some(
                "Run `cloudregister clean` followed by `cloudregister register` to start over"
                    .to_string(),
            ),
            Error::LockHeld { pid: Some(pid) } => Some(format!(
                "Wait for process {} to finish before running cloudregister again",
                pid
            )),
            Error::PackageManagerBusy(_) => {
                Some("Wait for zypper to finish and try again".to_string())
            }
            _ => None,
        }
    }

    /// Formats the error with its suggestion (if any) for user-friendly display.
    pub fn with_suggestion(&self) -> String {
        match self.suggestion() {
            Some(suggestion) => format!("{}\n\nHint: {}", self, suggestion),
            None => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovery_errors_are_fatal() {
        assert!(Error::MissingMetadataField("fingerprint".into()).is_fatal());
        assert!(Error::DiscoveryExhausted(vec!["a".into()]).is_fatal());
        assert!(Error::Config("bad".into()).is_fatal());
    }

    #[test]
    fn soft_errors_are_not_fatal() {
        assert!(!Error::NotRegistered.is_fatal());
        assert!(!Error::TrustImport("rehash".into()).is_fatal());
        assert!(!Error::NoReplacement("10.0.0.1".into()).is_fatal());
    }

    #[test]
    fn exhausted_message_lists_servers() {
        let err = Error::DiscoveryExhausted(vec!["a.example".into(), "b.example".into()]);
        assert!(err.to_string().contains("a.example, b.example"));
        assert!(err.with_suggestion().contains("Hint:"));
    }

    #[test]
    fn lock_held_mentions_pid() {
        let err = Error::LockHeld { pid: Some(42) };
        assert!(err.to_string().contains("PID 42"));
        let err = Error::LockHeld { pid: None };
        assert!(!err.to_string().contains("PID"));
    }
}
