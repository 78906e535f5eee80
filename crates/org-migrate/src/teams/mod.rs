//! Team hierarchy reconstruction.
//!
//! Teams advance through the states Discovered -> MembersFetched ->
//! (DryRunRecorded | Created) -> MembersReplayed -> PermissionsReplayed.
//! Creation order is an explicit topological sort by parent-chain depth, so a
//! parent is always created before any of its children regardless of the
//! order the listing API returned them in.

pub mod hierarchy;

use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::api::{paginate, RestClient};
use crate::config::Config;
use crate::core::model::{
    IdpGroup, RepoPermission, Team, TeamMember, TeamRepoAccess, TeamRole,
};
use crate::core::report::MigrationReport;
use crate::error::{MigrateError, Result};
use crate::mapping::UserMapping;

/// Sort teams so that every parent precedes all of its children.
///
/// Depth is the length of the parent chain; the sort is stable, so teams at
/// the same depth keep their listing order. A parent missing from the listing
/// ends the chain. A looping chain (malformed listing; the platform itself
/// forbids cycles) is cut off at the team count bound.
pub fn sort_by_depth(mut teams: Vec<Team>) -> Vec<Team> {
    let parents: HashMap<String, Option<String>> = teams
        .iter()
        .map(|t| (t.slug.clone(), t.parent_slug.clone()))
        .collect();
    let bound = teams.len();

    teams.sort_by_cached_key(|team| {
        let mut depth = 0usize;
        let mut current = parents.get(&team.slug).and_then(Clone::clone);
        while let Some(parent) = current {
            if depth >= bound {
                break;
            }
            depth += 1;
            current = parents.get(&parent).and_then(Clone::clone);
        }
        depth
    });
    teams
}

/// Team migrator for one run.
pub struct TeamMigrator<'a> {
    source: &'a RestClient,
    target: &'a RestClient,
    config: &'a Config,
    mapping: UserMapping,
}

impl<'a> TeamMigrator<'a> {
    pub fn new(
        source: &'a RestClient,
        target: &'a RestClient,
        config: &'a Config,
        mapping: UserMapping,
    ) -> Self {
        Self {
            source,
            target,
            config,
            mapping,
        }
    }

    /// Run the team migration: discover, order, then create/replay per team.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        let dry_run = self.config.migration.dry_run;
        let mut report = MigrationReport::start("teams", dry_run);

        let teams = self.fetch_teams().await?;
        info!("found {} teams to migrate", teams.len());
        let ordered = sort_by_depth(teams);

        // Destination ids of teams created in this run, by source slug.
        let mut created: HashMap<String, i64> = HashMap::new();

        for team in &ordered {
            let members = self.fetch_members(&team.slug).await;
            let repo_access = self.fetch_repo_access(&team.slug).await;

            if dry_run {
                info!(
                    "[dry-run] would create team {} ({} members, {} repos)",
                    team.slug,
                    members.len(),
                    repo_access.len()
                );
                report.record_detail(
                    team.slug.clone(),
                    "dry-run",
                    format!("{} members, {} repos", members.len(), repo_access.len()),
                );
                continue;
            }

            // Parent id only if the parent was created in this run; a missing
            // mapping omits the link rather than failing.
            let parent_id = team
                .parent_slug
                .as_ref()
                .and_then(|slug| created.get(slug))
                .copied();

            let team_id = match self.create_team(team, parent_id).await {
                Ok(id) => id,
                Err(e) => {
                    report.record_error(team.slug.clone(), e.to_string());
                    continue;
                }
            };
            created.insert(team.slug.clone(), team_id);
            report.record(team.slug.clone(), "created");

            self.replay_members(team, &members, &mut report).await;
            self.replay_permissions(team, &repo_access, &mut report).await;

            if let Some(ref group) = team.idp_group {
                if let Err(e) = self.link_idp_group(&team.slug, group).await {
                    warn!("could not link IdP group for {}: {}", team.slug, e);
                }
            }
        }

        report.detail = Some(hierarchy::render(&ordered));
        Ok(report.finish())
    }

    /// Full source-side team listing. An enumeration failure here aborts the
    /// whole resource type.
    async fn fetch_teams(&self) -> Result<Vec<Team>> {
        let raw = paginate(
            self.source,
            &format!("/orgs/{}/teams", self.source.org),
            None,
        )
        .await
        .map_err(|e| MigrateError::enumeration("teams", e.to_string()))?;

        let mut teams = Vec::with_capacity(raw.len());
        for entry in raw {
            let Some(slug) = entry.get("slug").and_then(Value::as_str) else {
                continue;
            };
            teams.push(Team {
                slug: slug.to_string(),
                name: entry
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(slug)
                    .to_string(),
                description: entry
                    .get("description")
                    .and_then(Value::as_str)
                    .map(String::from),
                privacy: entry
                    .get("privacy")
                    .and_then(Value::as_str)
                    .map(String::from),
                parent_slug: entry
                    .pointer("/parent/slug")
                    .and_then(Value::as_str)
                    .map(String::from),
                idp_group: self.fetch_idp_group(slug).await,
            });
        }
        Ok(teams)
    }

    /// First IdP group connected to the team, when team sync is in use.
    async fn fetch_idp_group(&self, slug: &str) -> Option<IdpGroup> {
        let path = format!(
            "/orgs/{}/teams/{}/team-sync/group-mappings",
            self.source.org, slug
        );
        match self.source.request_unchecked(reqwest::Method::GET, &path, None).await {
            Ok(response) if response.status == 200 => response
                .body
                .pointer("/groups/0")
                .and_then(|g| serde_json::from_value(g.clone()).ok()),
            _ => None,
        }
    }

    /// Members with their roles. The role is fetched per-member; a member
    /// whose lookup fails is dropped with a warning, never failing the team.
    async fn fetch_members(&self, slug: &str) -> Vec<TeamMember> {
        let listing = match paginate(
            self.source,
            &format!("/orgs/{}/teams/{}/members", self.source.org, slug),
            None,
        )
        .await
        {
            Ok(listing) => listing,
            Err(e) => {
                warn!("could not list members for team {}: {}", slug, e);
                return Vec::new();
            }
        };

        let mut members = Vec::with_capacity(listing.len());
        for entry in listing {
            let Some(login) = entry.get("login").and_then(Value::as_str) else {
                continue;
            };
            let membership_path = format!(
                "/orgs/{}/teams/{}/memberships/{}",
                self.source.org, slug, login
            );
            match self.source.get(&membership_path).await {
                Ok(response) => {
                    let role = match response.body.get("role").and_then(Value::as_str) {
                        Some("maintainer") => TeamRole::Maintainer,
                        _ => TeamRole::Member,
                    };
                    members.push(TeamMember {
                        login: login.to_string(),
                        role,
                    });
                }
                Err(e) => {
                    warn!("dropping member {} of {}: {}", login, slug, e);
                }
            }
        }
        members
    }

    /// Repository grants with the effective permission (admin > push > pull).
    async fn fetch_repo_access(&self, slug: &str) -> Vec<TeamRepoAccess> {
        let listing = match paginate(
            self.source,
            &format!("/orgs/{}/teams/{}/repos", self.source.org, slug),
            None,
        )
        .await
        {
            Ok(listing) => listing,
            Err(e) => {
                warn!("could not list repos for team {}: {}", slug, e);
                return Vec::new();
            }
        };

        listing
            .iter()
            .filter_map(|repo| {
                let name = repo.get("name").and_then(Value::as_str)?;
                let flags = repo.get("permissions")?;
                let permission = RepoPermission::from_flags(
                    flags.get("admin").and_then(Value::as_bool).unwrap_or(false),
                    flags.get("push").and_then(Value::as_bool).unwrap_or(false),
                    flags.get("pull").and_then(Value::as_bool).unwrap_or(false),
                )?;
                Some(TeamRepoAccess {
                    repo: name.to_string(),
                    permission,
                })
            })
            .collect()
    }

    async fn create_team(&self, team: &Team, parent_id: Option<i64>) -> Result<i64> {
        let mut body = json!({
            "name": team.name,
            "privacy": team.privacy.as_deref().unwrap_or("closed"),
        });
        if let Some(ref description) = team.description {
            body["description"] = json!(description);
        }
        if let Some(parent_id) = parent_id {
            body["parent_team_id"] = json!(parent_id);
        }

        let response = self
            .target
            .post(&format!("/orgs/{}/teams", self.target.org), &body)
            .await?;
        response
            .body
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| {
                MigrateError::api(response.status, "team creation response carried no id")
            })
    }

    /// Replay memberships with username mapping applied. A login unknown at
    /// the destination fails only that single call.
    async fn replay_members(
        &self,
        team: &Team,
        members: &[TeamMember],
        report: &mut MigrationReport,
    ) {
        for member in members {
            let login = self.mapping.map(&member.login);
            let path = format!(
                "/orgs/{}/teams/{}/memberships/{}",
                self.target.org, team.slug, login
            );
            match self
                .target
                .put(&path, &json!({ "role": member.role.as_str() }))
                .await
            {
                Ok(_) => debug!("added {} to {} as {}", login, team.slug, member.role.as_str()),
                Err(e) => {
                    report.record_error(
                        format!("{}/member/{}", team.slug, login),
                        e.to_string(),
                    );
                }
            }
        }
    }

    /// Replay repository permissions. The destination repository must exist
    /// before a grant can be applied.
    async fn replay_permissions(
        &self,
        team: &Team,
        repo_access: &[TeamRepoAccess],
        report: &mut MigrationReport,
    ) {
        for access in repo_access {
            let label = format!("{}/repo/{}", team.slug, access.repo);
            let repo_path = format!("/repos/{}/{}", self.target.org, access.repo);
            match self.target.exists(&repo_path).await {
                Ok(true) => {}
                Ok(false) => {
                    report.record_error(label, "repository does not exist at the destination");
                    continue;
                }
                Err(e) => {
                    report.record_error(label, e.to_string());
                    continue;
                }
            }

            let path = format!(
                "/orgs/{}/teams/{}/repos/{}/{}",
                self.target.org, team.slug, self.target.org, access.repo
            );
            if let Err(e) = self
                .target
                .put(&path, &json!({ "permission": access.permission.as_str() }))
                .await
            {
                report.record_error(label, e.to_string());
            }
        }
    }

    async fn link_idp_group(&self, slug: &str, group: &IdpGroup) -> Result<()> {
        let path = format!(
            "/orgs/{}/teams/{}/team-sync/group-mappings",
            self.target.org, slug
        );
        self.target
            .patch(
                &path,
                &json!({
                    "groups": [{
                        "group_id": group.group_id,
                        "group_name": group.group_name,
                        "group_description": group.group_description.as_deref().unwrap_or(""),
                    }]
                }),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InstanceConfig, MigrationOptions};
    use wiremock::matchers::{body_partial_json, method, path as url_path, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn team(slug: &str, parent: Option<&str>) -> Team {
        Team {
            slug: slug.to_string(),
            name: slug.to_string(),
            description: None,
            privacy: None,
            parent_slug: parent.map(String::from),
            idp_group: None,
        }
    }

    #[test]
    fn test_sort_parents_before_children() {
        let sorted = sort_by_depth(vec![
            team("eng-frontend", Some("eng")),
            team("eng", None),
            team("eng-backend", Some("eng")),
        ]);
        let slugs: Vec<&str> = sorted.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, ["eng", "eng-frontend", "eng-backend"]);
    }

    #[test]
    fn test_sort_handles_three_level_chains_in_any_listing_order() {
        // A single-pass adjacent-swap would leave this order wrong; the
        // depth sort must not.
        let sorted = sort_by_depth(vec![
            team("eng-web-ui", Some("eng-web")),
            team("eng-web", Some("eng")),
            team("eng", None),
        ]);
        let slugs: Vec<&str> = sorted.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, ["eng", "eng-web", "eng-web-ui"]);
    }

    #[test]
    fn test_sort_is_stable_within_a_depth() {
        let sorted = sort_by_depth(vec![
            team("alpha", None),
            team("beta", None),
            team("alpha-kids", Some("alpha")),
            team("beta-kids", Some("beta")),
        ]);
        let slugs: Vec<&str> = sorted.iter().map(|t| t.slug.as_str()).collect();
        assert_eq!(slugs, ["alpha", "beta", "alpha-kids", "beta-kids"]);
    }

    #[test]
    fn test_sort_survives_malformed_cycle() {
        // The platform forbids cycles; a malformed listing must not hang us.
        let sorted = sort_by_depth(vec![team("a", Some("b")), team("b", Some("a"))]);
        assert_eq!(sorted.len(), 2);
    }

    async fn fixtures(server: &MockServer, dry_run: bool) -> (Config, RestClient, RestClient) {
        let mut source = InstanceConfig::new("acme", "t-src");
        source.api_url = server.uri();
        let mut target = InstanceConfig::new("acme-new", "t-dst");
        target.api_url = server.uri();
        let config = Config {
            source,
            target,
            migration: MigrationOptions {
                dry_run,
                ..Default::default()
            },
        };
        (
            config.clone(),
            RestClient::new(&config.source).unwrap(),
            RestClient::new(&config.target).unwrap(),
        )
    }

    async fn mount_source_org(server: &MockServer) {
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/teams"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"slug": "eng-frontend", "name": "eng-frontend", "parent": {"slug": "eng"}},
                {"slug": "eng", "name": "eng", "privacy": "closed"},
                {"slug": "eng-backend", "name": "eng-backend", "parent": {"slug": "eng"}},
            ])))
            .mount(server)
            .await;
        // No members, no repos, no team sync anywhere.
        Mock::given(method("GET"))
            .and(path_regex(r"^/orgs/acme/teams/[^/]+/members$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/orgs/acme/teams/[^/]+/repos$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/orgs/acme/teams/[^/]+/team-sync/group-mappings$"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "Not Found"})))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_parent_created_first_and_children_linked() {
        let server = MockServer::start().await;
        mount_source_org(&server).await;

        Mock::given(method("POST"))
            .and(url_path("/orgs/acme-new/teams"))
            .and(body_partial_json(serde_json::json!({"name": "eng"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 100})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(url_path("/orgs/acme-new/teams"))
            .and(body_partial_json(
                serde_json::json!({"name": "eng-frontend", "parent_team_id": 100}),
            ))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 101})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(url_path("/orgs/acme-new/teams"))
            .and(body_partial_json(
                serde_json::json!({"name": "eng-backend", "parent_team_id": 100}),
            ))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 102})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (config, source, target) = fixtures(&server, false).await;
        let report = TeamMigrator::new(&source, &target, &config, UserMapping::default())
            .migrate()
            .await
            .unwrap();

        assert_eq!(report.items.len(), 3);
        assert!(report.errors.is_empty());

        // eng's create call happened before either child's.
        let creates: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.method.as_str() == "POST")
            .map(|r| {
                serde_json::from_slice::<Value>(&r.body).unwrap()["name"]
                    .as_str()
                    .unwrap()
                    .to_string()
            })
            .collect();
        assert_eq!(creates[0], "eng");

        // The hierarchy report nests both children under eng.
        let hierarchy = report.detail.unwrap();
        assert_eq!(hierarchy[0]["slug"], "eng");
        assert_eq!(hierarchy[0]["children"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_username_mapping_applied_to_membership() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/teams"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"slug": "eng", "name": "eng"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/teams/eng/members"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"login": "alice"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/teams/eng/memberships/alice"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "role": "maintainer", "state": "active"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/teams/eng/repos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/orgs/acme/teams/eng/team-sync/group-mappings"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({"message": "Not Found"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(url_path("/orgs/acme-new/teams"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 7})),
            )
            .mount(&server)
            .await;
        // The mapped login, not the source one.
        Mock::given(method("PUT"))
            .and(url_path("/orgs/acme-new/teams/eng/memberships/alice-new"))
            .and(body_partial_json(serde_json::json!({"role": "maintainer"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut mapping_file = tempfile::NamedTempFile::new().unwrap();
        use std::io::Write;
        writeln!(mapping_file, "sourceUsername,targetUsername").unwrap();
        writeln!(mapping_file, "alice,alice-new").unwrap();
        let mapping = UserMapping::load(mapping_file.path()).unwrap();

        let (config, source, target) = fixtures(&server, false).await;
        let report = TeamMigrator::new(&source, &target, &config, mapping)
            .migrate()
            .await
            .unwrap();
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_dry_run_makes_zero_mutating_calls() {
        let server = MockServer::start().await;
        mount_source_org(&server).await;

        let (config, source, target) = fixtures(&server, true).await;
        let report = TeamMigrator::new(&source, &target, &config, UserMapping::default())
            .migrate()
            .await
            .unwrap();

        assert_eq!(report.items.len(), 3);
        assert!(server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .all(|r| r.method.as_str() == "GET"));
    }

    #[tokio::test]
    async fn test_failed_parent_creation_omits_child_link() {
        let server = MockServer::start().await;
        mount_source_org(&server).await;

        // Parent creation fails; children are still created, without a link.
        Mock::given(method("POST"))
            .and(url_path("/orgs/acme-new/teams"))
            .and(body_partial_json(serde_json::json!({"name": "eng"})))
            .respond_with(ResponseTemplate::new(422).set_body_json(
                serde_json::json!({"message": "Validation Failed"}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(url_path("/orgs/acme-new/teams"))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 200})),
            )
            .mount(&server)
            .await;

        let (config, source, target) = fixtures(&server, false).await;
        let report = TeamMigrator::new(&source, &target, &config, UserMapping::default())
            .migrate()
            .await
            .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].item, "eng");
        assert_eq!(report.items.len(), 2);

        // Neither child body carried a parent_team_id.
        for request in server.received_requests().await.unwrap() {
            if request.method.as_str() == "POST" {
                let body: Value = serde_json::from_slice(&request.body).unwrap();
                if body["name"] != "eng" {
                    assert!(body.get("parent_team_id").is_none());
                }
            }
        }
    }
}
