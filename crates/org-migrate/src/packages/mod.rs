//! Package migration driver: enumeration, idempotent version transfer.

use serde_json::Value;
use tracing::{info, warn};

use crate::api::{paginate, RestClient};
use crate::config::Config;
use crate::core::model::{Package, PackageType, PackageVersion};
use crate::core::report::MigrationReport;
use crate::core::traits::{Ecosystem, EcosystemContext, ExternalTool};
use crate::ecosystems::EcosystemImpl;
use crate::error::{MigrateError, Result};
use crate::transfer::{reset_staging, TransferEngine};

pub struct PackagesMigrator<'a> {
    source: &'a RestClient,
    target: &'a RestClient,
    config: &'a Config,
    tools: &'a dyn ExternalTool,
}

impl<'a> PackagesMigrator<'a> {
    pub fn new(
        source: &'a RestClient,
        target: &'a RestClient,
        config: &'a Config,
        tools: &'a dyn ExternalTool,
    ) -> Self {
        Self {
            source,
            target,
            config,
            tools,
        }
    }

    /// Migrate every package of the configured type.
    ///
    /// Enumeration is fully drained before any per-item processing; versions
    /// the destination already has are skipped without any transfer (the
    /// at-most-once create invariant lives here, not in the engine).
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let dry_run = self.config.migration.dry_run;
        let mut report = MigrationReport::start("packages", dry_run);

        let package_type = self
            .config
            .migration
            .package_type
            .as_deref()
            .and_then(PackageType::parse)
            .ok_or_else(|| {
                MigrateError::Config(
                    "a --package-type (npm|container|maven|nuget|rubygems) is required".to_string(),
                )
            })?;
        let ecosystem = EcosystemImpl::from_package_type(package_type)?;

        let packages = self.fetch_packages(package_type).await?;
        info!(
            "found {} {} packages to migrate",
            packages.len(),
            package_type.as_str()
        );

        // The staging tree is exclusively ours for the duration of a live run.
        if !dry_run {
            reset_staging(&self.config.migration.staging_dir).await?;
        }

        let engine = TransferEngine::new(self.config.migration.concurrency)?;
        let ctx = EcosystemContext {
            source: self.source,
            target: self.target,
            config: self.config,
            tools: self.tools,
        };

        for package in &packages {
            if let Some(ref repo) = package.repository {
                let repo_path = format!("/repos/{}/{}", self.target.org, repo);
                match self.target.exists(&repo_path).await {
                    Ok(true) => {}
                    Ok(false) => {
                        report.record_error(
                            package.name.clone(),
                            format!("repository {} does not exist at the destination", repo),
                        );
                        continue;
                    }
                    Err(e) => {
                        report.record_error(package.name.clone(), e.to_string());
                        continue;
                    }
                }
            }

            if let Err(e) = self
                .migrate_package(&ctx, &ecosystem, &engine, package, &mut report)
                .await
            {
                report.record_error(package.name.clone(), e.to_string());
            }
        }

        Ok(report.finish())
    }

    async fn fetch_packages(&self, package_type: PackageType) -> Result<Vec<Package>> {
        let path = format!(
            "/orgs/{}/packages?package_type={}",
            self.source.org,
            package_type.as_str()
        );
        let raw = paginate(self.source, &path, None)
            .await
            .map_err(|e| MigrateError::enumeration("packages", e.to_string()))?;

        Ok(raw
            .iter()
            .filter_map(|entry| {
                let name = entry.get("name").and_then(Value::as_str)?;
                Some(Package {
                    name: name.to_string(),
                    package_type,
                    repository: entry
                        .pointer("/repository/name")
                        .and_then(Value::as_str)
                        .map(String::from),
                })
            })
            .collect())
    }

    async fn fetch_versions(
        &self,
        client: &RestClient,
        org: &str,
        package: &Package,
    ) -> Result<Vec<PackageVersion>> {
        let path = format!(
            "/orgs/{}/packages/{}/{}/versions",
            org,
            package.package_type.as_str(),
            package.name
        );
        let raw = paginate(client, &path, None).await?;

        Ok(raw
            .iter()
            .filter_map(|entry| {
                let version = entry.get("name").and_then(Value::as_str)?;
                let tags = entry
                    .pointer("/metadata/container/tags")
                    .and_then(Value::as_array)
                    .map(|tags| {
                        tags.iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();
                Some(PackageVersion {
                    version: version.to_string(),
                    tags,
                })
            })
            .collect())
    }

    /// Versions the destination already has; a 404 means the package itself
    /// is absent, so nothing is skipped.
    async fn destination_versions(&self, package: &Package) -> Vec<String> {
        match self
            .fetch_versions(self.target, &self.target.org, package)
            .await
        {
            Ok(versions) => versions.into_iter().map(|v| v.version).collect(),
            Err(MigrateError::Api { status: 404, .. }) => Vec::new(),
            Err(e) => {
                warn!(
                    "could not list destination versions for {}: {}",
                    package.name, e
                );
                Vec::new()
            }
        }
    }

    async fn migrate_package(
        &self,
        ctx: &EcosystemContext<'_>,
        ecosystem: &EcosystemImpl,
        engine: &TransferEngine,
        package: &Package,
        report: &mut MigrationReport,
    ) -> Result<()> {
        let versions = self
            .fetch_versions(self.source, &self.source.org, package)
            .await?;
        let existing = self.destination_versions(package).await;

        for version in &versions {
            let label = format!("{}@{}", package.name, version.version);

            if existing.contains(&version.version) {
                info!("{}: already at destination, skipping", label);
                report.record(label, "skipped");
                continue;
            }

            if self.config.migration.dry_run {
                info!("[dry-run] would migrate {}", label);
                report.record(label, "dry-run");
                continue;
            }

            // Resolution failures yield an empty asset list, never a fatal
            // error; migration continues with the next version.
            let assets = match ecosystem.resolve_assets(ctx, package, version).await {
                Ok(assets) => assets,
                Err(e) => {
                    warn!("could not resolve assets for {}: {}", label, e);
                    Vec::new()
                }
            };
            if assets.is_empty() {
                report.record_detail(label, "skipped", "no assets resolved");
                continue;
            }

            let staged_dir = self.config.migration.staging_dir.join(&package.name);
            tokio::fs::create_dir_all(&staged_dir).await?;

            let downloadable: Vec<_> = assets
                .iter()
                .filter(|a| a.download_url.is_some())
                .cloned()
                .collect();
            let outcomes = engine
                .download_all(&downloadable, &self.config.source.token, &staged_dir)
                .await;

            let mut staged = Vec::new();
            for outcome in &outcomes {
                match (&outcome.path, &outcome.error) {
                    (Some(path), None) => staged.push(path.clone()),
                    _ => report.record_error(
                        format!("{}/{}", label, outcome.name),
                        outcome
                            .error
                            .clone()
                            .unwrap_or_else(|| "download failed".to_string()),
                    ),
                }
            }

            let published = ecosystem
                .publish(ctx, package, version, &assets, &staged)
                .await?;
            let mut ok = 0usize;
            for outcome in &published {
                match &outcome.error {
                    None => ok += 1,
                    Some(error) => {
                        report.record_error(format!("{}/{}", label, outcome.name), error.clone())
                    }
                }
            }

            report.record_detail(label, "migrated", format!("{} assets published", ok));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstanceConfig, MigrationOptions};
    use crate::tools::ProcessRunner;
    use serde_json::json;
    use wiremock::matchers::{header, method, path as url_path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn fixtures(
        server: &MockServer,
        dry_run: bool,
        staging: std::path::PathBuf,
    ) -> (Config, RestClient, RestClient) {
        let mut source = InstanceConfig::new("acme", "t-src");
        source.api_url = server.uri();
        source.graphql_url = format!("{}/graphql", server.uri());
        source.registries.maven = format!("{}/dl", server.uri());
        let mut target = InstanceConfig::new("acme-new", "t-dst");
        target.api_url = server.uri();
        target.registries.maven = format!("{}/up", server.uri());
        let config = Config {
            source,
            target,
            migration: MigrationOptions {
                dry_run,
                package_type: Some("maven".to_string()),
                staging_dir: staging,
                ..Default::default()
            },
        };
        (
            config.clone(),
            RestClient::new(&config.source).unwrap(),
            RestClient::new(&config.target).unwrap(),
        )
    }

    async fn mount_widget_listing(server: &MockServer, dest_versions: serde_json::Value) {
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/packages"))
            .and(query_param("package_type", "maven"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "com.acme.widget", "repository": {"name": "widget-repo"}}
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/repos/acme-new/widget-repo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/packages/maven/com.acme.widget/versions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "1.2.0"}])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme-new/packages/maven/com.acme.widget/versions"))
            .respond_with(dest_versions_response(dest_versions))
            .mount(server)
            .await;
    }

    fn dest_versions_response(body: serde_json::Value) -> ResponseTemplate {
        if body.is_null() {
            ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"}))
        } else {
            ResponseTemplate::new(200).set_body_json(body)
        }
    }

    #[tokio::test]
    async fn test_maven_version_migrates_with_correct_content_types() {
        let server = MockServer::start().await;
        mount_widget_listing(&server, Value::Null).await;

        Mock::given(method("POST"))
            .and(url_path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"organization": {"packages": {"nodes": [{
                    "version": {"files": {
                        "nodes": [{"name": "widget-1.2.0.jar"}, {"name": "widget-1.2.0.pom"}],
                        "pageInfo": {"hasNextPage": false, "endCursor": null}
                    }}
                }]}}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path(
                "/dl/acme/widget-repo/com/acme/widget/1.2.0/widget-1.2.0.jar",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path(
                "/dl/acme/widget-repo/com/acme/widget/1.2.0/widget-1.2.0.pom",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"<project/>".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(url_path(
                "/up/acme-new/widget-repo/com/acme/widget/1.2.0/widget-1.2.0.jar",
            ))
            .and(header("content-type", "application/java-archive"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(url_path(
                "/up/acme-new/widget-repo/com/acme/widget/1.2.0/widget-1.2.0.pom",
            ))
            .and(header("content-type", "application/xml"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        let (config, source, target) =
            fixtures(&server, false, staging.path().join("packages")).await;
        let tools = ProcessRunner::new();
        let report = PackagesMigrator::new(&source, &target, &config, &tools)
            .migrate()
            .await
            .unwrap();

        assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].action, "migrated");
    }

    #[tokio::test]
    async fn test_existing_version_causes_zero_transfer_calls() {
        let server = MockServer::start().await;
        mount_widget_listing(&server, json!([{"name": "1.2.0"}])).await;

        // Any asset resolution or upload would hit an unmocked route and fail.
        let staging = tempfile::tempdir().unwrap();
        let (config, source, target) =
            fixtures(&server, false, staging.path().join("packages")).await;
        let tools = ProcessRunner::new();
        let report = PackagesMigrator::new(&source, &target, &config, &tools)
            .migrate()
            .await
            .unwrap();

        assert_eq!(report.items[0].action, "skipped");
        assert!(report.errors.is_empty());
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
    }

    #[tokio::test]
    async fn test_dry_run_reads_only() {
        let server = MockServer::start().await;
        mount_widget_listing(&server, Value::Null).await;

        let staging = tempfile::tempdir().unwrap();
        let staging_path = staging.path().join("packages");
        let (config, source, target) = fixtures(&server, true, staging_path.clone()).await;
        let tools = ProcessRunner::new();
        let report = PackagesMigrator::new(&source, &target, &config, &tools)
            .migrate()
            .await
            .unwrap();

        assert_eq!(report.items[0].action, "dry-run");
        let requests = server.received_requests().await.unwrap();
        assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
        // Dry run never touches the staging tree.
        assert!(!staging_path.exists());
    }

    #[tokio::test]
    async fn test_missing_destination_repo_blocks_package() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/packages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "com.acme.widget", "repository": {"name": "widget-repo"}}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/repos/acme-new/widget-repo"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;

        let staging = tempfile::tempdir().unwrap();
        let (config, source, target) =
            fixtures(&server, false, staging.path().join("packages")).await;
        let tools = ProcessRunner::new();
        let report = PackagesMigrator::new(&source, &target, &config, &tools)
            .migrate()
            .await
            .unwrap();

        assert!(report.items.is_empty());
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("widget-repo"));
    }
}
