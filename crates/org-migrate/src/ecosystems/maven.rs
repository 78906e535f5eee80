//! Maven/Gradle ecosystem: GraphQL asset listing and registry PUT uploads.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;

use crate::core::model::{AssetRef, Package, PackageVersion};
use crate::core::traits::{Ecosystem, EcosystemContext};
use crate::error::{MigrateError, Result};
use crate::transfer::{content_type_for, AssetOutcome, TransferEngine, UploadJob};

const FILES_PAGE_SIZE: usize = 100;

const VERSION_FILES_QUERY: &str = r#"
query($org: String!, $packageName: String!, $version: String!, $first: Int!, $after: String) {
  organization(login: $org) {
    packages(first: 1, names: [$packageName]) {
      nodes {
        version(version: $version) {
          files(first: $first, after: $after) {
            nodes { name }
            pageInfo { hasNextPage endCursor }
          }
        }
      }
    }
  }
}
"#;

/// Maven/Gradle package migration strategy.
#[derive(Debug, Clone, Default)]
pub struct MavenEcosystem;

impl MavenEcosystem {
    pub fn new() -> Self {
        Self
    }
}

/// Split a dotted package name into (group, artifact): group is every segment
/// but the last, artifact is the last segment.
pub fn split_coordinates(package_name: &str) -> (String, String) {
    match package_name.rsplit_once('.') {
        Some((group, artifact)) => (group.to_string(), artifact.to_string()),
        None => (String::new(), package_name.to_string()),
    }
}

/// Registry URL for one version file, maven repository layout.
pub fn file_url(
    registry: &str,
    org: &str,
    repo: &str,
    package_name: &str,
    version: &str,
    file: &str,
) -> String {
    let (group, artifact) = split_coordinates(package_name);
    let group_path = group.replace('.', "/");
    format!(
        "{}/{}/{}/{}/{}/{}/{}",
        registry.trim_end_matches('/'),
        org,
        repo,
        group_path,
        artifact,
        version,
        file
    )
}

fn repo_for(package: &Package) -> &str {
    // Registry paths need a repository segment; packages the API reports
    // without one fall back to the package name.
    package.repository.as_deref().unwrap_or(&package.name)
}

#[async_trait]
impl Ecosystem for MavenEcosystem {
    fn name(&self) -> &str {
        "maven"
    }

    /// Page through the version's file list with the cursor API. The
    /// `hasNextPage` flag is authoritative; a short page does not imply
    /// completion.
    async fn resolve_assets(
        &self,
        ctx: &EcosystemContext<'_>,
        package: &Package,
        version: &PackageVersion,
    ) -> Result<Vec<AssetRef>> {
        let mut assets = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let data = ctx
                .source
                .graphql(
                    VERSION_FILES_QUERY,
                    json!({
                        "org": ctx.source.org,
                        "packageName": package.name,
                        "version": version.version,
                        "first": FILES_PAGE_SIZE,
                        "after": cursor,
                    }),
                )
                .await?;

            let files = data
                .pointer("/organization/packages/nodes/0/version/files")
                .cloned()
                .ok_or_else(|| {
                    MigrateError::GraphQl(format!(
                        "no file listing for {}@{}",
                        package.name, version.version
                    ))
                })?;

            for node in files
                .get("nodes")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
            {
                if let Some(name) = node.get("name").and_then(Value::as_str) {
                    let url = file_url(
                        &ctx.config.source.registries.maven,
                        &ctx.source.org,
                        repo_for(package),
                        &package.name,
                        &version.version,
                        name,
                    );
                    assets.push(AssetRef::file(name, url));
                }
            }

            let has_next = files
                .pointer("/pageInfo/hasNextPage")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if !has_next {
                break;
            }
            cursor = files
                .pointer("/pageInfo/endCursor")
                .and_then(Value::as_str)
                .map(String::from);
        }

        debug!(
            "{}@{}: resolved {} maven assets",
            package.name,
            version.version,
            assets.len()
        );
        Ok(assets)
    }

    /// PUT each staged file to the destination registry with a content type
    /// derived from its extension.
    async fn publish(
        &self,
        ctx: &EcosystemContext<'_>,
        package: &Package,
        version: &PackageVersion,
        _assets: &[AssetRef],
        staged: &[PathBuf],
    ) -> Result<Vec<AssetOutcome>> {
        let engine = TransferEngine::new(ctx.config.migration.concurrency)?;

        let uploads: Vec<UploadJob> = staged
            .iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_string_lossy().into_owned();
                let url = file_url(
                    &ctx.config.target.registries.maven,
                    &ctx.target.org,
                    repo_for(package),
                    &package.name,
                    &version.version,
                    &name,
                );
                Some(UploadJob {
                    content_type: content_type_for(&name),
                    name,
                    url,
                    path: path.clone(),
                })
            })
            .collect();

        Ok(engine.upload_all(&uploads, &ctx.config.target.token).await)
    }
}
