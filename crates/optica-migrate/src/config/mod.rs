//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;
use tracing::debug;

impl Config {
    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Override connection settings from `MYSQL_*` / `MONGODB_*` variables.
    ///
    /// `lookup` resolves a variable name; unset variables leave the file
    /// value untouched.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("MYSQL_HOST") {
            self.source.host = host;
        }
        if let Some(port) = lookup("MYSQL_PORT") {
            self.source.port = port
                .parse()
                .map_err(|_| MigrateError::Config(format!("MYSQL_PORT is not a port: {}", port)))?;
        }
        if let Some(user) = lookup("MYSQL_USER") {
            self.source.user = user;
        }
        if let Some(password) = lookup("MYSQL_PASSWORD") {
            self.source.password = password;
        }
        if let Some(database) = lookup("MYSQL_DATABASE") {
            self.source.database = database;
        }
        if let Some(uri) = lookup("MONGODB_URI") {
            self.target.uri = uri;
        }
        if let Some(database) = lookup("MONGODB_DATABASE") {
            self.target.database = database;
        }
        debug!("Effective config: {:?}", self);
        Ok(())
    }
}
