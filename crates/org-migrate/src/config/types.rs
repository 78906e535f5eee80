//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
///
/// Constructed once at startup and passed by reference to every component.
/// There is no ambient configuration lookup anywhere else in the crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source platform instance.
    pub source: InstanceConfig,

    /// Target platform instance.
    pub target: InstanceConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationOptions,
}

/// One platform instance: an organization plus the credentials and endpoints
/// used to reach it. The source and target credentials are never interchanged;
/// each `RestClient` is constructed from exactly one `InstanceConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Organization name on this instance.
    pub org: String,

    /// Bearer token scoped to this organization.
    #[serde(skip_serializing)]
    pub token: String,

    /// REST API base URL (default: <https://api.github.com>).
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// GraphQL endpoint URL (default: <https://api.github.com/graphql>).
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,

    /// Package registry hosts for this instance.
    #[serde(default)]
    pub registries: RegistryEndpoints,

    /// Optional HTTP(S) proxy to route calls through.
    #[serde(default)]
    pub proxy: Option<String>,
}

/// Package registry hosts, one per ecosystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEndpoints {
    /// Maven/Gradle registry base URL.
    pub maven: String,

    /// npm registry base URL.
    pub npm: String,

    /// Container (OCI) registry host.
    pub container: String,
}

impl Default for RegistryEndpoints {
    fn default() -> Self {
        Self {
            maven: "https://maven.pkg.github.com".to_string(),
            npm: "https://npm.pkg.github.com".to_string(),
            container: "ghcr.io".to_string(),
        }
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationOptions {
    /// Dry-run mode: discovery only, zero mutating calls (default: true).
    pub dry_run: bool,

    /// Download/upload batch concurrency (default: 5).
    pub concurrency: usize,

    /// Package ecosystem to migrate (packages component only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_type: Option<String>,

    /// Local staging directory for package binaries and cloned repositories.
    pub staging_dir: PathBuf,

    /// Optional username-mapping CSV path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_file: Option<PathBuf>,

    /// Optional secrets CSV path (required for a live secrets migration).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<PathBuf>,
}

impl Default for MigrationOptions {
    fn default() -> Self {
        Self {
            dry_run: true,
            concurrency: default_concurrency(),
            package_type: None,
            staging_dir: PathBuf::from("packages"),
            mapping_file: None,
            secrets_file: None,
        }
    }
}

pub(crate) fn default_concurrency() -> usize {
    5
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_graphql_url() -> String {
    "https://api.github.com/graphql".to_string()
}

impl InstanceConfig {
    /// Build an instance config with default endpoints.
    pub fn new(org: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            token: token.into(),
            api_url: default_api_url(),
            graphql_url: default_graphql_url(),
            registries: RegistryEndpoints::default(),
            proxy: None,
        }
    }
}
