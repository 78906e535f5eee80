//! Core domain types, capability traits, and the run report.

pub mod model;
pub mod report;
pub mod traits;

pub use model::{
    AssetRef, IdpGroup, Package, PackageType, PackageVersion, RepoPermission, Scope, Secret, Team,
    TeamMember, TeamRepoAccess, TeamRole, Variable,
};
pub use report::{MigrationReport, ReportError, ReportItem};
pub use traits::{Ecosystem, EcosystemContext, ExternalTool, ToolOutput};
