//! Migration orchestrator - per-resource dispatch and report aggregation.

use tracing::{error, info};

use crate::api::RestClient;
use crate::config::Config;
use crate::core::report::MigrationReport;
use crate::error::{MigrateError, Result};
use crate::lfs::LfsMigrator;
use crate::mapping::UserMapping;
use crate::packages::PackagesMigrator;
use crate::secrets::SecretsMigrator;
use crate::teams::TeamMigrator;
use crate::tools::ProcessRunner;
use crate::variables::VariablesMigrator;

/// Resource types the driver can migrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Variables,
    Teams,
    Secrets,
    Packages,
    Lfs,
}

impl ResourceKind {
    /// Parse a CLI component name.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "variables" => Ok(ResourceKind::Variables),
            "teams" => Ok(ResourceKind::Teams),
            "secrets" => Ok(ResourceKind::Secrets),
            "packages" => Ok(ResourceKind::Packages),
            "lfs" => Ok(ResourceKind::Lfs),
            other => Err(MigrateError::Config(format!(
                "Unknown component: '{}'. Supported components: variables, teams, secrets, packages, lfs",
                other
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Variables => "variables",
            ResourceKind::Teams => "teams",
            ResourceKind::Secrets => "secrets",
            ResourceKind::Packages => "packages",
            ResourceKind::Lfs => "lfs",
        }
    }
}

/// Migration orchestrator. Owns the two instance clients and dispatches to
/// the per-resource migrators.
pub struct Orchestrator {
    config: Config,
    source: RestClient,
    target: RestClient,
    tools: ProcessRunner,
}

impl Orchestrator {
    /// Create an orchestrator from a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        let source = RestClient::new(&config.source)?;
        let target = RestClient::new(&config.target)?;
        Ok(Self {
            config,
            source,
            target,
            tools: ProcessRunner::new(),
        })
    }

    /// Run the migration for one resource type.
    ///
    /// Configuration problems surface as errors (fatal for the process).
    /// A resource-level failure (e.g. the source listing cannot be fetched)
    /// is caught here: it aborts this resource type only and is returned as
    /// a report whose error list carries the failure, so an external driver
    /// can continue with other resource types.
    pub async fn run(&self, kind: ResourceKind) -> Result<MigrationReport> {
        info!(
            "migrating {} from {} to {} (dry_run: {})",
            kind.as_str(),
            self.config.source.org,
            self.config.target.org,
            self.config.migration.dry_run
        );

        let result = match kind {
            ResourceKind::Variables => {
                VariablesMigrator::new(&self.source, &self.target, &self.config)
                    .migrate()
                    .await
            }
            ResourceKind::Teams => {
                let mapping = match &self.config.migration.mapping_file {
                    Some(path) => UserMapping::load(path)?,
                    None => UserMapping::default(),
                };
                TeamMigrator::new(&self.source, &self.target, &self.config, mapping)
                    .migrate()
                    .await
            }
            ResourceKind::Secrets => {
                SecretsMigrator::new(&self.source, &self.target, &self.config)
                    .migrate()
                    .await
            }
            ResourceKind::Packages => {
                PackagesMigrator::new(&self.source, &self.target, &self.config, &self.tools)
                    .migrate()
                    .await
            }
            ResourceKind::Lfs => {
                LfsMigrator::new(&self.source, &self.target, &self.config, &self.tools)
                    .migrate()
                    .await
            }
        };

        match result {
            Ok(report) => Ok(report),
            // Misconfiguration is fatal; everything else is a resource-level
            // abort that still yields a report.
            Err(e @ MigrateError::Config(_)) => Err(e),
            Err(e) => {
                error!("{} migration aborted: {}", kind.as_str(), e);
                let mut report =
                    MigrationReport::start(kind.as_str(), self.config.migration.dry_run);
                report.record_error(kind.as_str(), e.to_string());
                Ok(report.finish())
            }
        }
    }
}
