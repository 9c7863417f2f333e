use super::ClientConfig;
use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "/etc/regionserverclnt.yaml";

pub struct Parser;

impl Parser {
    pub fn new() -> Self {
        Self
    }

    /// Load and validate config from file path
    pub fn load_config<P: AsRef<Path>>(&self, path: P) -> Result<ClientConfig> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config = self.parse_config(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse config from YAML string
    pub fn parse_config(&self, content: &str) -> Result<ClientConfig> {
        serde_yaml::from_str(content)
            .map_err(|e| Error::Parse(format!("Failed to parse YAML config: {}", e)))
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
