//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::env;

impl Config {
    /// Build configuration from environment variables.
    ///
    /// Required: `SOURCE_ORG`, `SOURCE_TOKEN`, `TARGET_ORG`, `TARGET_TOKEN`.
    /// Optional: `SOURCE_API_URL`, `SOURCE_GRAPHQL_URL`, `TARGET_API_URL`,
    /// `TARGET_GRAPHQL_URL`, `SOURCE_PROXY`, `TARGET_PROXY`.
    ///
    /// A missing required variable is a fatal startup error, never silently
    /// defaulted.
    pub fn from_env() -> Result<Self> {
        let mut source = InstanceConfig::new(
            required_env("SOURCE_ORG")?,
            required_env("SOURCE_TOKEN")?,
        );
        let mut target = InstanceConfig::new(
            required_env("TARGET_ORG")?,
            required_env("TARGET_TOKEN")?,
        );

        if let Ok(url) = env::var("SOURCE_API_URL") {
            source.api_url = url;
        }
        if let Ok(url) = env::var("SOURCE_GRAPHQL_URL") {
            source.graphql_url = url;
        }
        if let Ok(url) = env::var("TARGET_API_URL") {
            target.api_url = url;
        }
        if let Ok(url) = env::var("TARGET_GRAPHQL_URL") {
            target.graphql_url = url;
        }
        source.proxy = env::var("SOURCE_PROXY").ok();
        target.proxy = env::var("TARGET_PROXY").ok();

        let config = Config {
            source,
            target,
            migration: MigrationOptions::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

fn required_env(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            MigrateError::Config(format!("required environment variable {} is not set", name))
        })
}
