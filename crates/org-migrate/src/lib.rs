//! # org-migrate
//!
//! Library for migrating organizational assets (teams, variables, secrets,
//! packages, Git-LFS objects) between two instances of a hosted
//! source-control platform.
//!
//! The pipeline per resource type: enumerate the source, check destination
//! pre-conditions, then perform idempotent-checked creates, accumulating a
//! structured `{items, errors}` report. Supports:
//!
//! - **Dry-run mode** (the default) performing zero mutating calls
//! - **Bounded-concurrency transfers** for package assets
//! - **Topologically ordered team creation** so parents precede children
//! - **Sealed-box secret encryption** so the destination never sees plaintext
//!
//! ## Example
//!
//! ```rust,no_run
//! use org_migrate::{Config, Orchestrator, ResourceKind};
//!
//! #[tokio::main]
//! async fn main() -> org_migrate::Result<()> {
//!     let config = Config::from_env()?;
//!     let orchestrator = Orchestrator::new(config)?;
//!     let report = orchestrator.run(ResourceKind::Teams).await?;
//!     println!("{}", report.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod core;
pub mod ecosystems;
pub mod error;
pub mod lfs;
pub mod mapping;
pub mod orchestrator;
pub mod packages;
pub mod secrets;
pub mod teams;
pub mod tools;
pub mod transfer;
pub mod variables;

// Re-exports for convenient access
pub use crate::core::report::MigrationReport;
pub use config::{Config, InstanceConfig, MigrationOptions};
pub use error::{MigrateError, Result};
pub use orchestrator::{Orchestrator, ResourceKind};
