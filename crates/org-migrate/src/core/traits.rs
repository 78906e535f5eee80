//! Core traits for platform-agnostic asset migration.
//!
//! This module defines the primary abstractions used by the migration engine:
//!
//! - [`Ecosystem`]: per-package-ecosystem asset resolution and publishing
//! - [`ExternalTool`]: external process invocation (git, git-lfs, docker, npm)
//!
//! Ecosystem implementations are selected by enum dispatch in
//! [`crate::ecosystems::EcosystemImpl`]; the migration driver depends only on
//! these interfaces.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::api::RestClient;
use crate::config::Config;
use crate::error::Result;
use crate::transfer::AssetOutcome;

use super::model::{AssetRef, Package, PackageVersion};

/// Everything an ecosystem needs to talk to both instances and the local host.
pub struct EcosystemContext<'a> {
    pub source: &'a RestClient,
    pub target: &'a RestClient,
    pub config: &'a Config,
    pub tools: &'a dyn ExternalTool,
}

/// Per-ecosystem migration capability.
///
/// One implementation per package ecosystem (Maven/Gradle, npm, Container).
/// `resolve_assets` answers "which remote identifiers make up this version";
/// `publish` pushes the staged local copies to the destination registry.
#[async_trait]
pub trait Ecosystem: Send + Sync {
    /// Ecosystem name as the platform API spells it.
    fn name(&self) -> &str;

    /// Resolve the ordered set of asset identifiers for one package version.
    ///
    /// Any failure yields an empty list and a warning upstream, never a fatal
    /// error; migration continues with the next version.
    async fn resolve_assets(
        &self,
        ctx: &EcosystemContext<'_>,
        package: &Package,
        version: &PackageVersion,
    ) -> Result<Vec<AssetRef>>;

    /// Publish staged assets for one version to the destination.
    ///
    /// `staged` holds the local paths produced by the transfer engine for
    /// HTTP-fetched assets; tool-driven ecosystems (container) ignore it and
    /// work from the asset refs directly. Returns one outcome per asset;
    /// per-asset failures are recorded, never escalated.
    async fn publish(
        &self,
        ctx: &EcosystemContext<'_>,
        package: &Package,
        version: &PackageVersion,
        assets: &[AssetRef],
        staged: &[PathBuf],
    ) -> Result<Vec<AssetOutcome>>;
}

/// Output of one external tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// External process invocation with a declared non-zero-exit failure mode.
///
/// Each invocation is an atomic, retryable-by-caller step. Implementations
/// must capture stdout/stderr and must not inherit the parent's stdio.
#[async_trait]
pub trait ExternalTool: Send + Sync {
    /// Run `program` with `args`, optionally in `cwd`. Returns the captured
    /// output; a non-zero exit status is reported in `exit_code`, not as an
    /// `Err` (callers decide whether non-zero is fatal for their step).
    async fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<ToolOutput>;
}
