//! Secret migration: CSV intake, sealed-box encryption, destination replay.
//!
//! The plaintext value is held only transiently; the destination only ever
//! receives the base64 sealed-box ciphertext plus the id of the public key it
//! was sealed under. The key is fetched immediately before each create call
//! (org key vs per-repo key), never cached across secrets, since keys rotate.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use crypto_box::aead::OsRng;
use crypto_box::PublicKey;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::api::{paginate, RestClient};
use crate::config::Config;
use crate::core::model::{Scope, Secret};
use crate::core::report::MigrationReport;
use crate::error::{MigrateError, Result};

/// One row of the secrets input CSV.
#[derive(Debug, Deserialize)]
struct SecretRow {
    #[serde(rename = "type")]
    scope: String,
    name: String,
    #[serde(default)]
    repo: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

/// Read the secrets CSV: `type` (`org`|`repo`), `name`, `repo` (required when
/// type=repo), `value` (plaintext, consumed then discarded).
pub fn read_secrets_csv(path: &Path) -> Result<Vec<Secret>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut secrets = Vec::new();

    for row in reader.deserialize() {
        let row: SecretRow = row?;
        let scope = match row.scope.to_lowercase().as_str() {
            "org" => Scope::Org,
            "repo" => {
                let repo = row.repo.filter(|r| !r.trim().is_empty()).ok_or_else(|| {
                    MigrateError::Config(format!(
                        "secret {} has type=repo but no repo column",
                        row.name
                    ))
                })?;
                Scope::Repo(repo)
            }
            other => {
                return Err(MigrateError::Config(format!(
                    "secret {} has unknown type '{}' (expected org or repo)",
                    row.name, other
                )))
            }
        };

        secrets.push(Secret {
            scope,
            name: row.name,
            value: row.value.unwrap_or_default(),
        });
    }

    Ok(secrets)
}

/// A destination public key for sealing, as the API returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct SealingKey {
    pub key_id: String,
    /// Base64-encoded 32-byte public key.
    pub key: String,
}

/// Seal a plaintext value under a base64-encoded public key; returns the
/// base64 ciphertext. Only the key owner can decrypt.
pub fn seal_secret(value: &str, key_b64: &str) -> Result<String> {
    let key_bytes: [u8; 32] = BASE64
        .decode(key_b64)
        .map_err(|e| MigrateError::Seal(format!("invalid public key encoding: {}", e)))?
        .try_into()
        .map_err(|_| MigrateError::Seal("public key is not 32 bytes".to_string()))?;

    let public_key = PublicKey::from(key_bytes);
    let sealed = public_key
        .seal(&mut OsRng, value.as_bytes())
        .map_err(|e| MigrateError::Seal(e.to_string()))?;

    Ok(BASE64.encode(sealed))
}

/// Secrets migrator for one run.
pub struct SecretsMigrator<'a> {
    source: &'a RestClient,
    target: &'a RestClient,
    config: &'a Config,
}

impl<'a> SecretsMigrator<'a> {
    pub fn new(source: &'a RestClient, target: &'a RestClient, config: &'a Config) -> Self {
        Self {
            source,
            target,
            config,
        }
    }

    /// Run the secrets migration.
    ///
    /// With a secrets CSV: replay each row at the destination (or record it,
    /// in dry-run mode). Without one, a dry run discovers the source's
    /// secrets and writes the discovery CSV; a live run without a CSV is a
    /// configuration error.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let dry_run = self.config.migration.dry_run;
        let mut report = MigrationReport::start("secrets", dry_run);

        match &self.config.migration.secrets_file {
            Some(path) => {
                let secrets = read_secrets_csv(path)?;
                info!("loaded {} secrets from {}", secrets.len(), path.display());

                for secret in &secrets {
                    let label = format!("{}:{}", secret.scope.kind(), secret.name);
                    if dry_run {
                        info!("[dry-run] would create secret {}", label);
                        report.record(label, "dry-run");
                        continue;
                    }
                    match self.migrate_one(secret).await {
                        Ok(action) => report.record(label, action),
                        Err(e) => report.record_error(label, e.to_string()),
                    }
                }
            }
            None if dry_run => {
                let discovered = self.discover().await?;
                let out = Path::new("secrets-discovery.csv");
                write_discovery_csv(out, &self.source.org, &discovered)?;
                info!("wrote {} discovered secrets to {}", discovered.len(), out.display());
                for (scope, name) in &discovered {
                    report.record(format!("{}:{}", scope.kind(), name), "discovered");
                }
            }
            None => {
                return Err(MigrateError::Config(
                    "a secrets CSV (--secrets-file) is required for a live secrets migration"
                        .to_string(),
                ));
            }
        }

        Ok(report.finish())
    }

    async fn migrate_one(&self, secret: &Secret) -> Result<&'static str> {
        match &secret.scope {
            Scope::Repo(repo) => {
                let repo_path = format!("/repos/{}/{}", self.target.org, repo);
                if !self.target.exists(&repo_path).await? {
                    return Err(MigrateError::Config(format!(
                        "repository {} does not exist at the destination",
                        repo
                    )));
                }

                let key = self.fetch_key(Some(repo)).await?;
                let sealed = seal_secret(&secret.value, &key.key)?;
                self.target
                    .put(
                        &format!(
                            "/repos/{}/{}/actions/secrets/{}",
                            self.target.org, repo, secret.name
                        ),
                        &json!({ "encrypted_value": sealed, "key_id": key.key_id }),
                    )
                    .await?;
            }
            Scope::Org => {
                let (visibility, selected_ids) = self.org_visibility(&secret.name).await;

                let key = self.fetch_key(None).await?;
                let sealed = seal_secret(&secret.value, &key.key)?;

                let mut body = json!({
                    "encrypted_value": sealed,
                    "key_id": key.key_id,
                    "visibility": visibility,
                });
                if visibility == "selected" {
                    body["selected_repository_ids"] = json!(selected_ids);
                }

                self.target
                    .put(
                        &format!("/orgs/{}/actions/secrets/{}", self.target.org, secret.name),
                        &body,
                    )
                    .await?;
            }
        }
        Ok("created")
    }

    /// Most recently fetched public key for the destination scope.
    async fn fetch_key(&self, repo: Option<&str>) -> Result<SealingKey> {
        let path = match repo {
            Some(repo) => format!(
                "/repos/{}/{}/actions/secrets/public-key",
                self.target.org, repo
            ),
            None => format!("/orgs/{}/actions/secrets/public-key", self.target.org),
        };
        let response = self.target.get(&path).await?;
        Ok(serde_json::from_value(response.body)?)
    }

    /// Source-side visibility for an org secret, with destination repo ids
    /// substituted for `selected` visibility. Falls back to `all` when the
    /// source no longer has the secret.
    async fn org_visibility(&self, name: &str) -> (String, Vec<i64>) {
        let path = format!("/orgs/{}/actions/secrets/{}", self.source.org, name);
        let visibility = match self.source.get(&path).await {
            Ok(response) => response
                .body
                .get("visibility")
                .and_then(Value::as_str)
                .unwrap_or("all")
                .to_string(),
            Err(e) => {
                warn!("could not read source visibility for {}: {}", name, e);
                return ("all".to_string(), Vec::new());
            }
        };

        if visibility != "selected" {
            return (visibility, Vec::new());
        }

        let mut ids = Vec::new();
        let repos_path = format!(
            "/orgs/{}/actions/secrets/{}/repositories",
            self.source.org, name
        );
        match paginate(self.source, &repos_path, Some("repositories")).await {
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

        (visibility, ids)
    }

    /// List the source's org and repo secrets (names only; values are not
    /// readable through the API).
    async fn discover(&self) -> Result<Vec<(Scope, String)>> {
        let mut found = Vec::new();

        let org_path = format!("/orgs/{}/actions/secrets", self.source.org);
        let org_secrets = paginate(self.source, &org_path, Some("secrets"))
            .await
            .map_err(|e| MigrateError::enumeration("secrets", e.to_string()))?;
        for secret in org_secrets {
            if let Some(name) = secret.get("name").and_then(Value::as_str) {
                found.push((Scope::Org, name.to_string()));
            }
        }

        let repos = paginate(
            self.source,
            &format!("/orgs/{}/repos", self.source.org),
            None,
        )
        .await
        .map_err(|e| MigrateError::enumeration("secrets", e.to_string()))?;

        for repo in repos {
            let Some(repo_name) = repo.get("name").and_then(Value::as_str) else {
                continue;
            };
            let path = format!("/repos/{}/{}/actions/secrets", self.source.org, repo_name);
            match paginate(self.source, &path, Some("secrets")).await {
                Ok(secrets) => {
                    for secret in secrets {
                        if let Some(name) = secret.get("name").and_then(Value::as_str) {
                            found.push((Scope::Repo(repo_name.to_string()), name.to_string()));
                        }
                    }
                }
                Err(e) => warn!("could not list secrets for repo {}: {}", repo_name, e),
            }
        }

        Ok(found)
    }
}

/// Write the dry-run discovery CSV: `Type, Repository/Organization, Secret Name`.
fn write_discovery_csv(path: &Path, org: &str, secrets: &[(Scope, String)]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["Type", "Repository/Organization", "Secret Name"])?;
    for (scope, name) in secrets {
        let location = scope.location(org);
        writer.write_record([scope.kind(), location.as_str(), name.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}
