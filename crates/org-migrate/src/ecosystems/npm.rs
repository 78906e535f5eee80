//! npm ecosystem: registry manifest resolution and `npm publish`.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::debug;

use crate::core::model::{AssetRef, Package, PackageVersion};
use crate::core::traits::{Ecosystem, EcosystemContext};
use crate::error::{MigrateError, Result};
use crate::tools::run_checked;
use crate::transfer::AssetOutcome;

/// npm package migration strategy.
#[derive(Debug, Clone, Default)]
pub struct NpmEcosystem;

impl NpmEcosystem {
    pub fn new() -> Self {
        Self
    }
}

fn manifest_url(registry: &str, org: &str, name: &str) -> String {
    // Scoped package name, slash encoded the way the registry expects.
    format!("{}/@{}%2F{}", registry.trim_end_matches('/'), org, name)
}

#[async_trait]
impl Ecosystem for NpmEcosystem {
    fn name(&self) -> &str {
        "npm"
    }

    /// Fetch the registry manifest and extract the tarball for the requested
    /// version from the version's `dist` metadata.
    async fn resolve_assets(
        &self,
        ctx: &EcosystemContext<'_>,
        package: &Package,
        version: &PackageVersion,
    ) -> Result<Vec<AssetRef>> {
        let url = manifest_url(
            &ctx.config.source.registries.npm,
            &ctx.source.org,
            &package.name,
        );
        let response = ctx.source.get(&url).await?;

        let tarball = response
            .body
            .pointer(&format!("/versions/{}/dist/tarball", version.version))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                MigrateError::api(
                    response.status,
                    format!(
                        "no tarball in manifest for {}@{}",
                        package.name, version.version
                    ),
                )
            })?;

        let filename = tarball
            .rsplit('/')
            .next()
            .unwrap_or(tarball)
            .to_string();
        debug!("{}@{}: tarball {}", package.name, version.version, filename);

        Ok(vec![AssetRef::file(filename, tarball)])
    }

    /// Publish the staged tarball with the native tool: a scoped `.npmrc`
    /// pointing at the destination registry, then `npm publish`.
    async fn publish(
        &self,
        ctx: &EcosystemContext<'_>,
        _package: &Package,
        _version: &PackageVersion,
        _assets: &[AssetRef],
        staged: &[PathBuf],
    ) -> Result<Vec<AssetOutcome>> {
        let registry = ctx.config.target.registries.npm.trim_end_matches('/');
        let registry_host = registry
            .strip_prefix("https://")
            .or_else(|| registry.strip_prefix("http://"))
            .unwrap_or(registry);

        let mut outcomes = Vec::with_capacity(staged.len());

        for tarball in staged {
            let name = tarball
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| tarball.display().to_string());
            let dir = tarball.parent().ok_or_else(|| {
                MigrateError::Config(format!("staged tarball {} has no parent dir", name))
            })?;

            let npmrc = format!(
                "//{host}/:_authToken={token}\n@{org}:registry={registry}\n",
                host = registry_host,
                token = ctx.config.target.token,
                org = ctx.target.org,
                registry = registry,
            );
            tokio::fs::write(dir.join(".npmrc"), npmrc).await?;

            let result = run_checked(
                ctx.tools,
                "npm",
                &["publish", &name],
                Some(dir),
            )
            .await;

            outcomes.push(match result {
                Ok(_) => AssetOutcome {
                    name,
                    path: Some(tarball.clone()),
                    error: None,
                },
                Err(e) => AssetOutcome {
                    name,
                    path: None,
                    error: Some(e.to_string()),
                },
            });
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RestClient;
    use crate::config::{Config, InstanceConfig, MigrationOptions};
    use crate::core::model::PackageType;
    use crate::tools::ProcessRunner;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_manifest_url_is_scope_encoded() {
        assert_eq!(
            manifest_url("https://npm.pkg.example.com/", "acme", "widget"),
            "https://npm.pkg.example.com/@acme%2Fwidget"
        );
    }

    #[tokio::test]
    async fn test_tarball_extracted_from_manifest() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/@acme%2Fwidget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "@acme/widget",
                "versions": {
                    "2.0.1": {
                        "dist": {"tarball": format!("{}/dl/widget-2.0.1.tgz", "https://npm.pkg.example.com")}
                    }
                }
            })))
            .mount(&server)
            .await;

        let mut source = InstanceConfig::new("acme", "t-src");
        source.registries.npm = server.uri();
        let config = Config {
            source: source.clone(),
            target: InstanceConfig::new("acme-new", "t-dst"),
            migration: MigrationOptions::default(),
        };
        let source_client = RestClient::new(&source).unwrap();
        let target_client = RestClient::new(&config.target).unwrap();
        let tools = ProcessRunner::new();
        let ctx = EcosystemContext {
            source: &source_client,
            target: &target_client,
            config: &config,
            tools: &tools,
        };

        let package = Package {
            name: "widget".into(),
            package_type: PackageType::Npm,
            repository: None,
        };
        let version = PackageVersion {
            version: "2.0.1".into(),
            tags: vec![],
        };

        let assets = NpmEcosystem::new()
            .resolve_assets(&ctx, &package, &version)
            .await
            .unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].name, "widget-2.0.1.tgz");
    }

    #[tokio::test]
    async fn test_missing_version_is_an_error_not_a_panic() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/@acme%2Fwidget"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "name": "@acme/widget",
                "versions": {}
            })))
            .mount(&server)
            .await;

        let mut source = InstanceConfig::new("acme", "t-src");
        source.registries.npm = server.uri();
        let config = Config {
            source: source.clone(),
            target: InstanceConfig::new("acme-new", "t-dst"),
            migration: MigrationOptions::default(),
        };
        let source_client = RestClient::new(&source).unwrap();
        let target_client = RestClient::new(&config.target).unwrap();
        let tools = ProcessRunner::new();
        let ctx = EcosystemContext {
            source: &source_client,
            target: &target_client,
            config: &config,
            tools: &tools,
        };

        let package = Package {
            name: "widget".into(),
            package_type: PackageType::Npm,
            repository: None,
        };
        let version = PackageVersion {
            version: "9.9.9".into(),
            tags: vec![],
        };

        assert!(NpmEcosystem::new()
            .resolve_assets(&ctx, &package, &version)
            .await
            .is_err());
    }
}
