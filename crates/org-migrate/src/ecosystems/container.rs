//! Container (OCI) ecosystem: tag enumeration and registry CLI publish.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::core::model::{AssetRef, Package, PackageVersion};
use crate::core::traits::{Ecosystem, EcosystemContext};
use crate::error::Result;
use crate::tools::run_checked;
use crate::transfer::AssetOutcome;

/// Container image migration strategy. Assets are tags, moved with the
/// registry CLI (`docker pull` / `tag` / `push`) rather than HTTP staging.
#[derive(Debug, Clone, Default)]
pub struct ContainerEcosystem;

impl ContainerEcosystem {
    pub fn new() -> Self {
        Self
    }
}

fn image_ref(registry: &str, org: &str, name: &str, tag: &str) -> String {
    format!("{}/{}/{}:{}", registry, org, name, tag)
}

#[async_trait]
impl Ecosystem for ContainerEcosystem {
    fn name(&self) -> &str {
        "container"
    }

    /// All tags recorded against the version, in the order the platform
    /// listed them (newest first).
    async fn resolve_assets(
        &self,
        _ctx: &EcosystemContext<'_>,
        package: &Package,
        version: &PackageVersion,
    ) -> Result<Vec<AssetRef>> {
        debug!(
            "{}@{}: {} container tags",
            package.name,
            version.version,
            version.tags.len()
        );
        Ok(version.tags.iter().map(AssetRef::tag).collect())
    }

    /// Pull each tag from the source registry, retag for the destination,
    /// and push. Each tag is an atomic step; one failed tag does not stop
    /// the rest.
    async fn publish(
        &self,
        ctx: &EcosystemContext<'_>,
        package: &Package,
        _version: &PackageVersion,
        assets: &[AssetRef],
        _staged: &[PathBuf],
    ) -> Result<Vec<AssetOutcome>> {
        let mut outcomes = Vec::with_capacity(assets.len());

        for asset in assets {
            let tag = &asset.name;
            let source_ref = image_ref(
                &ctx.config.source.registries.container,
                &ctx.source.org,
                &package.name,
                tag,
            );
            let target_ref = image_ref(
                &ctx.config.target.registries.container,
                &ctx.target.org,
                &package.name,
                tag,
            );

            let result = async {
                run_checked(ctx.tools, "docker", &["pull", &source_ref], None).await?;
                run_checked(ctx.tools, "docker", &["tag", &source_ref, &target_ref], None).await?;
                run_checked(ctx.tools, "docker", &["push", &target_ref], None).await?;
                Ok::<(), crate::error::MigrateError>(())
            }
            .await;

            outcomes.push(match result {
                Ok(()) => AssetOutcome {
                    name: tag.clone(),
                    path: None,
                    error: None,
                },
                Err(e) => AssetOutcome {
                    name: tag.clone(),
                    path: None,
                    error: Some(e.to_string()),
                },
            });
        }

        Ok(outcomes)
    }
}
