//! Asset transfer engine: wave-bounded downloads and uploads.
//!
//! Work is partitioned into fixed-size waves bounded by the configured
//! concurrency limit; every transfer in a wave completes (success or failure)
//! before the next wave starts. This bounds peak resource usage while still
//! parallelizing I/O-bound transfers. A single failed file is reported in its
//! outcome and excluded from the destination upload set; it never aborts the
//! rest of the wave or the surrounding package-version migration.
//!
//! Idempotence (skipping a version the destination already has) is enforced
//! upstream by the migration driver's existence check, not here.

use futures::future::join_all;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::model::AssetRef;
use crate::error::{MigrateError, Result};

const AGENT: &str = concat!("org-migrate/", env!("CARGO_PKG_VERSION"));

/// Outcome of transferring one asset.
#[derive(Debug, Clone)]
pub struct AssetOutcome {
    pub name: String,
    /// Local staged path on success (downloads only).
    pub path: Option<PathBuf>,
    pub error: Option<String>,
}

impl AssetOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// One file to upload to the destination registry.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub name: String,
    pub url: String,
    pub path: PathBuf,
    pub content_type: &'static str,
}

/// Wave-bounded HTTP transfer engine.
pub struct TransferEngine {
    http: reqwest::Client,
    concurrency: usize,
}

impl TransferEngine {
    pub fn new(concurrency: usize) -> Result<Self> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(600))
                .build()?,
            concurrency: concurrency.max(1),
        })
    }

    /// Download all assets into `dest_dir`, in ⌈N/C⌉ sequential waves.
    ///
    /// Assets without a download URL are skipped with an error outcome; each
    /// failure is per-file and the remaining files still transfer.
    pub async fn download_all(
        &self,
        assets: &[AssetRef],
        token: &str,
        dest_dir: &Path,
    ) -> Vec<AssetOutcome> {
        let mut outcomes = Vec::with_capacity(assets.len());

        for wave in assets.chunks(self.concurrency) {
            let results = join_all(wave.iter().map(|asset| async {
                match self.download_one(asset, token, dest_dir).await {
                    Ok(path) => AssetOutcome {
                        name: asset.name.clone(),
                        path: Some(path),
                        error: None,
                    },
                    Err(e) => {
                        warn!("download failed for {}: {}", asset.name, e);
                        AssetOutcome {
                            name: asset.name.clone(),
                            path: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }))
            .await;
            outcomes.extend(results);
        }

        outcomes
    }

    async fn download_one(&self, asset: &AssetRef, token: &str, dest_dir: &Path) -> Result<PathBuf> {
        let url = asset.download_url.as_deref().ok_or_else(|| {
            MigrateError::Config(format!("asset {} has no download URL", asset.name))
        })?;

        debug!("downloading {}", url);
        let response = self
            .http
            .get(url)
            .bearer_auth(token)
            .header(USER_AGENT, AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MigrateError::api(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        let path = dest_dir.join(&asset.name);
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }

    /// Upload staged files, in ⌈N/C⌉ sequential waves.
    pub async fn upload_all(&self, uploads: &[UploadJob], token: &str) -> Vec<AssetOutcome> {
        let mut outcomes = Vec::with_capacity(uploads.len());

        for wave in uploads.chunks(self.concurrency) {
            let results = join_all(wave.iter().map(|job| async {
                match self.upload_one(job, token).await {
                    Ok(()) => AssetOutcome {
                        name: job.name.clone(),
                        path: Some(job.path.clone()),
                        error: None,
                    },
                    Err(e) => {
                        warn!("upload failed for {}: {}", job.name, e);
                        AssetOutcome {
                            name: job.name.clone(),
                            path: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            }))
            .await;
            outcomes.extend(results);
        }

        outcomes
    }

    async fn upload_one(&self, job: &UploadJob, token: &str) -> Result<()> {
        let bytes = tokio::fs::read(&job.path).await?;

        debug!("uploading {} ({} bytes)", job.url, bytes.len());
        let response = self
            .http
            .put(&job.url)
            .bearer_auth(token)
            .header(USER_AGENT, AGENT)
            .header(CONTENT_TYPE, job.content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MigrateError::api(status.as_u16(), body));
        }

        Ok(())
    }
}

/// Number of sequential waves for `n` transfers at concurrency `c`.
pub fn wave_count(n: usize, c: usize) -> usize {
    n.div_ceil(c.max(1))
}

/// Upload content type derived from the file extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".pom") || lower.ends_with(".xml") {
        "application/xml"
    } else if lower.ends_with(".jar") {
        "application/java-archive"
    } else {
        "application/octet-stream"
    }
}

/// Delete and recreate the staging root. The directory is exclusively owned
/// by the running migration process; concurrent runs against the same working
/// directory must be serialized by the operator.
pub async fn reset_staging(dir: &Path) -> Result<()> {
    if dir.exists() {
        tokio::fs::remove_dir_all(dir).await?;
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}
