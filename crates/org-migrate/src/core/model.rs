//! Domain types shared across migrators.

use serde::{Deserialize, Serialize};

/// Package ecosystems known to the platform's packages API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    Maven,
    Npm,
    Container,
    Nuget,
    Rubygems,
}

impl PackageType {
    /// Parse a CLI/config package type string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "maven" | "gradle" => Some(PackageType::Maven),
            "npm" => Some(PackageType::Npm),
            "container" | "docker" => Some(PackageType::Container),
            "nuget" => Some(PackageType::Nuget),
            "rubygems" => Some(PackageType::Rubygems),
            _ => None,
        }
    }

    /// The package type string the platform API expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Maven => "maven",
            PackageType::Npm => "npm",
            PackageType::Container => "container",
            PackageType::Nuget => "nuget",
            PackageType::Rubygems => "rubygems",
        }
    }
}

/// A package discovered on the source instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub package_type: PackageType,
    /// Repository the package is attached to, when the API reports one.
    pub repository: Option<String>,
}

/// One version of a package.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageVersion {
    /// Version string, e.g. `1.2.0`.
    pub version: String,
    /// Container tags recorded against this version (container packages only),
    /// in the order the API listed them (newest first).
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A remote file or tag identifier constituting part of a package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    /// Filename (`widget-1.2.0.jar`) or container tag (`1.2.0`).
    pub name: String,
    /// Download URL, when the asset is fetched over HTTP rather than by tool.
    pub download_url: Option<String>,
}

impl AssetRef {
    pub fn file(name: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            download_url: Some(download_url.into()),
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            download_url: None,
        }
    }
}

/// Role of a user within a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Member,
    Maintainer,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Member => "member",
            TeamRole::Maintainer => "maintainer",
        }
    }
}

/// A team member with their role, role fetched per-member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamMember {
    pub login: String,
    pub role: TeamRole,
}

/// Repository permission level, by highest-privilege flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepoPermission {
    Pull,
    Push,
    Admin,
}

impl RepoPermission {
    /// Derive the effective permission from the API's permission flags.
    /// Precedence: admin > push > pull.
    pub fn from_flags(admin: bool, push: bool, pull: bool) -> Option<Self> {
        if admin {
            Some(RepoPermission::Admin)
        } else if push {
            Some(RepoPermission::Push)
        } else if pull {
            Some(RepoPermission::Pull)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepoPermission::Pull => "pull",
            RepoPermission::Push => "push",
            RepoPermission::Admin => "admin",
        }
    }
}

/// A (repository, permission) grant held by a team.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamRepoAccess {
    pub repo: String,
    pub permission: RepoPermission,
}

/// A team discovered on the source instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// `closed` or `secret`.
    #[serde(default)]
    pub privacy: Option<String>,
    /// Parent team slug; the hierarchy is an acyclic forest with in-degree <= 1.
    #[serde(default)]
    pub parent_slug: Option<String>,
    /// Identity-provider group linked to this team, if any.
    #[serde(default)]
    pub idp_group: Option<IdpGroup>,
}

/// An identity-provider-managed group syncable to a team's membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdpGroup {
    pub group_id: String,
    pub group_name: String,
    #[serde(default)]
    pub group_description: Option<String>,
}

/// Scope of a secret or variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "scope", content = "repo")]
pub enum Scope {
    Org,
    Repo(String),
}

impl Scope {
    /// The `Repository/Organization` column value for the discovery CSV.
    pub fn location(&self, org: &str) -> String {
        match self {
            Scope::Org => org.to_string(),
            Scope::Repo(repo) => repo.clone(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Scope::Org => "org",
            Scope::Repo(_) => "repo",
        }
    }
}

/// A secret to migrate. The plaintext value exists only transiently; the
/// destination only ever receives the sealed-box ciphertext. Org-scope
/// visibility is looked up from the source at replay time, not carried here.
#[derive(Debug, Clone)]
pub struct Secret {
    pub scope: Scope,
    pub name: String,
    pub value: String,
}

/// A configuration variable; plaintext transfers directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub visibility: Option<String>,
    #[serde(default)]
    pub selected_repository_ids: Vec<i64>,
}
