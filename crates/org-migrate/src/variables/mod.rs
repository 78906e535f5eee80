//! Configuration variable migration. Values are plaintext on both sides; the
//! platform does not treat variables as secrets, so no sealing is involved.

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::{paginate, RestClient};
use crate::config::Config;
use crate::core::model::Variable;
use crate::core::report::MigrationReport;
use crate::error::{MigrateError, Result};

pub struct VariablesMigrator<'a> {
    source: &'a RestClient,
    target: &'a RestClient,
    config: &'a Config,
}

impl<'a> VariablesMigrator<'a> {
    pub fn new(source: &'a RestClient, target: &'a RestClient, config: &'a Config) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Migrate org-scope variables, then repo-scope variables for every
    /// source repository whose counterpart exists at the destination.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let dry_run = self.config.migration.dry_run;
        let mut report = MigrationReport::start("variables", dry_run);

        let org_vars = paginate(
            self.source,
            &format!("/orgs/{}/actions/variables", self.source.org),
            Some("variables"),
        )
        .await
        .map_err(|e| MigrateError::enumeration("variables", e.to_string()))?;

        for raw in &org_vars {
            let variable: Variable = match serde_json::from_value(raw.clone()) {
                Ok(variable) => variable,
                Err(e) => {
                    report.record_error("org-variable", e.to_string());
                    continue;
                }
            };
            let label = format!("org:{}", variable.name);
            match self.migrate_org_variable(&variable).await {
                Ok(action) => report.record(label, action),
                Err(e) => report.record_error(label, e.to_string()),
            }
        }

        let repos = paginate(
            self.source,
            &format!("/orgs/{}/repos", self.source.org),
            None,
        )
        .await
        .map_err(|e| MigrateError::enumeration("variables", e.to_string()))?;

        for repo in repos {
            let Some(repo_name) = repo.get("name").and_then(Value::as_str) else {
                continue;
            };
            if let Err(e) = self.migrate_repo_variables(repo_name, &mut report).await {
                report.record_error(format!("repo:{}", repo_name), e.to_string());
            }
        }

        Ok(report.finish())
    }

    async fn migrate_org_variable(&self, variable: &Variable) -> Result<&'static str> {
        let dest_path = format!(
            "/orgs/{}/actions/variables/{}",
            self.target.org, variable.name
        );
        if self.target.exists(&dest_path).await? {
            return Ok("skipped");
        }

        let visibility = variable.visibility.as_deref().unwrap_or("all");

        if self.config.migration.dry_run {
            info!("[dry-run] would create org variable {}", variable.name);
            return Ok("dry-run");
        }

        let mut body = json!({
            "name": variable.name,
            "value": variable.value,
            "visibility": visibility,
        });
        if visibility == "selected" {
            body["selected_repository_ids"] = json!(self.selected_repo_ids(&variable.name).await);
        }

        self.target
            .post(
                &format!("/orgs/{}/actions/variables", self.target.org),
                &body,
            )
            .await?;
        Ok("created")
    }

    async fn migrate_repo_variables(
        &self,
        repo: &str,
        report: &mut MigrationReport,
    ) -> Result<()> {
        let source_vars = paginate(
            self.source,
            &format!("/repos/{}/{}/actions/variables", self.source.org, repo),
            Some("variables"),
        )
        .await?;
        if source_vars.is_empty() {
            return Ok(());
        }

        // Repo-scoped resources require the destination repository to exist.
        if !self
            .target
            .exists(&format!("/repos/{}/{}", self.target.org, repo))
            .await?
        {
            warn!("repo {} missing at destination, skipping its variables", repo);
            for variable in &source_vars {
                if let Some(name) = variable.get("name").and_then(Value::as_str) {
                    report.record_error(
                        format!("{}:{}", repo, name),
                        "repository does not exist at the destination",
                    );
                }
            }
            return Ok(());
        }

        for variable in &source_vars {
            let Some(name) = variable.get("name").and_then(Value::as_str) else {
                continue;
            };
            let label = format!("{}:{}", repo, name);
            let value = variable.get("value").and_then(Value::as_str).unwrap_or("");

            let dest_path = format!(
                "/repos/{}/{}/actions/variables/{}",
                self.target.org, repo, name
            );
            let result = async {
                if self.target.exists(&dest_path).await? {
                    return Ok("skipped");
                }
                if self.config.migration.dry_run {
                    info!("[dry-run] would create variable {}", label);
                    return Ok("dry-run");
                }
                self.target
                    .post(
                        &format!("/repos/{}/{}/actions/variables", self.target.org, repo),
                        &json!({ "name": name, "value": value }),
                    )
                    .await?;
                Ok::<_, MigrateError>("created")
            }
            .await;

            match result {
                Ok(action) => report.record(label, action),
                Err(e) => report.record_error(label, e.to_string()),
            }
        }

        Ok(())
    }

    /// Destination repo ids for a `selected`-visibility variable.
    async fn selected_repo_ids(&self, name: &str) -> Vec<i64> {
        let path = format!(
            "/orgs/{}/actions/variables/{}/repositories",
            self.source.org, name
        );
        let mut ids = Vec::new();
        match paginate(self.source, &path, Some("repositories")).await {
            Ok(repos) => {
                for repo in repos {
                    let Some(repo_name) = repo.get("name").and_then(Value::as_str) else {
                        continue;
                    };
                    match self
                        .target
                        .get(&format!("/repos/{}/{}", self.target.org, repo_name))
                        .await
                    {
                        Ok(response) => {
                            if let Some(id) = response.body.get("id").and_then(Value::as_i64) {
                                ids.push(id);
                            }
                        }
                        Err(e) => warn!(
                            "selected repo {} not resolvable at destination: {}",
                            repo_name, e
                        ),
                    }
                }
            }
            Err(e) => warn!("could not list selected repositories for {}: {}", name, e),
        }
        ids
    }
}
