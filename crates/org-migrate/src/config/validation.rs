//! Configuration validation.

use super::types::Config;
use crate::error::{MigrateError, Result};

/// Validate a configuration before any API call is made.
///
/// A failure here is a fatal startup error; the CLI maps it to a non-zero
/// exit before touching either platform instance.
pub fn validate(config: &Config) -> Result<()> {
    require(&config.source.org, "source organization")?;
    require(&config.source.token, "source token")?;
    require(&config.target.org, "target organization")?;
    require(&config.target.token, "target token")?;
    require(&config.source.api_url, "source API URL")?;
    require(&config.target.api_url, "target API URL")?;

    if config.migration.concurrency == 0 {
        return Err(MigrateError::Config(
            "concurrency must be at least 1".to_string(),
        ));
    }

    if let Some(ref pt) = config.migration.package_type {
        const KNOWN: [&str; 5] = ["npm", "container", "maven", "nuget", "rubygems"];
        if !KNOWN.contains(&pt.as_str()) {
            return Err(MigrateError::Config(format!(
                "Unknown package type: '{}'. Supported types: {}",
                pt,
                KNOWN.join(", ")
            )));
        }
    }

    Ok(())
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MigrateError::Config(format!("missing {}", what)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstanceConfig, MigrationOptions};

    fn valid_config() -> Config {
        Config {
            source: InstanceConfig::new("acme", "src-token"),
            target: InstanceConfig::new("acme-new", "dst-token"),
            migration: MigrationOptions::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let mut config = valid_config();
        config.target.token = String::new();
        let err = validate(&config).unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
        assert!(err.to_string().contains("target token"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut config = valid_config();
        config.migration.concurrency = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_package_type_rejected() {
        let mut config = valid_config();
        config.migration.package_type = Some("cargo".to_string());
        assert!(validate(&config).is_err());

        config.migration.package_type = Some("maven".to_string());
        assert!(validate(&config).is_ok());
    }
}
