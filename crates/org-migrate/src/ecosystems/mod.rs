//! Package ecosystem implementations.
//!
//! One module per ecosystem (Maven/Gradle, npm, Container), each implementing
//! the [`Ecosystem`] capability: resolve a version's assets, then publish the
//! staged copies to the destination. The migration driver depends only on the
//! trait; ecosystem selection happens once, here.
//!
//! Dispatch is enum-based: the compiler generates a match statement instead of
//! vtable dispatch, and adding an ecosystem means adding a variant.

pub mod container;
pub mod maven;
pub mod npm;

pub use container::ContainerEcosystem;
pub use maven::MavenEcosystem;
pub use npm::NpmEcosystem;

use async_trait::async_trait;
use std::path::PathBuf;

use crate::core::model::{AssetRef, Package, PackageType, PackageVersion};
use crate::core::traits::{Ecosystem, EcosystemContext};
use crate::error::{MigrateError, Result};
use crate::transfer::AssetOutcome;

/// Enum-based static dispatch over ecosystems.
#[derive(Debug, Clone)]
pub enum EcosystemImpl {
    Maven(MavenEcosystem),
    Npm(NpmEcosystem),
    Container(ContainerEcosystem),
}

impl EcosystemImpl {
    /// Select the ecosystem for a package type.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for package types the asset pipeline
    /// does not cover (nuget, rubygems).
    pub fn from_package_type(package_type: PackageType) -> Result<Self> {
        match package_type {
            PackageType::Maven => Ok(EcosystemImpl::Maven(MavenEcosystem::new())),
            PackageType::Npm => Ok(EcosystemImpl::Npm(NpmEcosystem::new())),
            PackageType::Container => Ok(EcosystemImpl::Container(ContainerEcosystem::new())),
            other => Err(MigrateError::Config(format!(
                "Package type '{}' is not supported for asset migration. Supported types: maven, npm, container",
                other.as_str()
            ))),
        }
    }
}

#[async_trait]
impl Ecosystem for EcosystemImpl {
    fn name(&self) -> &str {
        match self {
            EcosystemImpl::Maven(e) => e.name(),
            EcosystemImpl::Npm(e) => e.name(),
            EcosystemImpl::Container(e) => e.name(),
        }
    }

    async fn resolve_assets(
        &self,
        ctx: &EcosystemContext<'_>,
        package: &Package,
        version: &PackageVersion,
    ) -> Result<Vec<AssetRef>> {
        match self {
            EcosystemImpl::Maven(e) => e.resolve_assets(ctx, package, version).await,
            EcosystemImpl::Npm(e) => e.resolve_assets(ctx, package, version).await,
            EcosystemImpl::Container(e) => e.resolve_assets(ctx, package, version).await,
        }
    }

    async fn publish(
        &self,
        ctx: &EcosystemContext<'_>,
        package: &Package,
        version: &PackageVersion,
        assets: &[AssetRef],
        staged: &[PathBuf],
    ) -> Result<Vec<AssetOutcome>> {
        match self {
            EcosystemImpl::Maven(e) => e.publish(ctx, package, version, assets, staged).await,
            EcosystemImpl::Npm(e) => e.publish(ctx, package, version, assets, staged).await,
            EcosystemImpl::Container(e) => e.publish(ctx, package, version, assets, staged).await,
        }
    }
}
