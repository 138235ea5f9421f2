//! Collaborator traits for the two directories slackduty talks to.
//!
//! The resolver and the orchestrator only see these traits. The REST
//! implementations live in [`crate::pagerduty`] and [`crate::slack`]; tests
//! plug in in-memory fakes.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PagerDuty
// ---------------------------------------------------------------------------

/// A bare `{ "id": ... }` reference as embedded in PagerDuty objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdReference {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdSchedule {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub users: Vec<PdReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdService {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub teams: Vec<PdReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdTeam {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Roster lookups against PagerDuty. `list_*` methods are free-text queries
/// and may return any number of matches.
#[async_trait]
pub trait PagerDutyApi: Send + Sync {
    async fn get_schedule(&self, id: &str) -> Result<PdSchedule>;
    async fn list_schedules(&self, query: &str) -> Result<Vec<PdSchedule>>;
    async fn get_service(&self, id: &str) -> Result<PdService>;
    async fn list_services(&self, query: &str) -> Result<Vec<PdService>>;
    async fn list_teams(&self, query: &str) -> Result<Vec<PdTeam>>;
    /// All user references on a team, across every page.
    async fn list_team_members(&self, team_id: &str) -> Result<Vec<PdReference>>;
    async fn get_user(&self, id: &str) -> Result<PdUser>;
    async fn list_users(&self, query: &str) -> Result<Vec<PdUser>>;
}

// ---------------------------------------------------------------------------
// Slack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usergroup {
    pub id: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default)]
    pub name: String,
}

#[async_trait]
pub trait SlackApi: Send + Sync {
    async fn lookup_user_by_email(&self, email: &str) -> Result<SlackUser>;
    async fn list_usergroups(&self) -> Result<Vec<Usergroup>>;
    /// Replace the usergroup's members with the comma-joined `users` list.
    async fn update_usergroup_members(&self, usergroup_id: &str, users: &str) -> Result<()>;
}
