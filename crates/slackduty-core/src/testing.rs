//! In-memory PagerDuty and Slack fakes. Canned data, call logs for
//! assertions, and per-entity failure injection.

use crate::api::{
    PagerDutyApi, PdReference, PdSchedule, PdService, PdTeam, PdUser, SlackApi, SlackUser,
    Usergroup,
};
use crate::error::{Result, SlackdutyError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

fn refs(ids: &[&str]) -> Vec<PdReference> {
    ids.iter()
        .map(|id| PdReference { id: id.to_string() })
        .collect()
}

fn matches_query(field: &str, query: &str) -> bool {
    field.to_lowercase().contains(&query.to_lowercase())
}

// ---------------------------------------------------------------------------
// FakePagerDuty
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct FakePagerDuty {
    users: Vec<PdUser>,
    schedules: Vec<PdSchedule>,
    services: Vec<PdService>,
    teams: Vec<(PdTeam, Vec<PdReference>)>,
    failing_users: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakePagerDuty {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: &str, name: &str, email: &str) -> Self {
        self.users.push(PdUser {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        });
        self
    }

    pub fn with_schedule(mut self, id: &str, name: &str, users: &[&str]) -> Self {
        self.schedules.push(PdSchedule {
            id: id.into(),
            name: name.into(),
            users: refs(users),
        });
        self
    }

    pub fn with_service(mut self, id: &str, name: &str, teams: &[&str]) -> Self {
        self.services.push(PdService {
            id: id.into(),
            name: name.into(),
            teams: refs(teams),
        });
        self
    }

    pub fn with_team(mut self, id: &str, name: &str, members: &[&str]) -> Self {
        self.teams.push((
            PdTeam {
                id: id.into(),
                name: name.into(),
            },
            refs(members),
        ));
        self
    }

    /// `get_user` for this id fails with an API error.
    pub fn with_failing_user(mut self, id: &str) -> Self {
        self.failing_users.insert(id.into());
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }

    fn log(&self, call: String) {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(call);
    }

    fn not_found(what: &str, id: &str) -> SlackdutyError {
        SlackdutyError::external("PagerDuty", format!("{what} {id}: 404 Not Found"))
    }
}

#[async_trait]
impl PagerDutyApi for FakePagerDuty {
    async fn get_schedule(&self, id: &str) -> Result<PdSchedule> {
        self.log(format!("get_schedule:{id}"));
        self.schedules
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found("schedule", id))
    }

    async fn list_schedules(&self, query: &str) -> Result<Vec<PdSchedule>> {
        self.log(format!("list_schedules:{query}"));
        Ok(self
            .schedules
            .iter()
            .filter(|s| matches_query(&s.name, query))
            .cloned()
            .collect())
    }

    async fn get_service(&self, id: &str) -> Result<PdService> {
        self.log(format!("get_service:{id}"));
        self.services
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found("service", id))
    }

    async fn list_services(&self, query: &str) -> Result<Vec<PdService>> {
        self.log(format!("list_services:{query}"));
        Ok(self
            .services
            .iter()
            .filter(|s| matches_query(&s.name, query))
            .cloned()
            .collect())
    }

    async fn list_teams(&self, query: &str) -> Result<Vec<PdTeam>> {
        self.log(format!("list_teams:{query}"));
        Ok(self
            .teams
            .iter()
            .filter(|(t, _)| matches_query(&t.name, query))
            .map(|(t, _)| t.clone())
            .collect())
    }

    async fn list_team_members(&self, team_id: &str) -> Result<Vec<PdReference>> {
        self.log(format!("list_team_members:{team_id}"));
        self.teams
            .iter()
            .find(|(t, _)| t.id == team_id)
            .map(|(_, members)| members.clone())
            .ok_or_else(|| Self::not_found("team", team_id))
    }

    async fn get_user(&self, id: &str) -> Result<PdUser> {
        self.log(format!("get_user:{id}"));
        if self.failing_users.contains(id) {
            return Err(SlackdutyError::external("PagerDuty", format!("user {id}: 500")));
        }
        self.users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| Self::not_found("user", id))
    }

    async fn list_users(&self, query: &str) -> Result<Vec<PdUser>> {
        self.log(format!("list_users:{query}"));
        Ok(self
            .users
            .iter()
            .filter(|u| matches_query(&u.name, query) || matches_query(&u.email, query))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FakeSlack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlackCall {
    LookupUserByEmail(String),
    ListUsergroups,
    UpdateUsergroupMembers { usergroup_id: String, users: String },
}

#[derive(Debug, Clone, Default)]
pub struct FakeSlack {
    users: Vec<(SlackUser, String)>,
    usergroups: Vec<Usergroup>,
    failing_updates: HashSet<String>,
    calls: Arc<Mutex<Vec<SlackCall>>>,
}

impl FakeSlack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: &str, email: &str) -> Self {
        self.users.push((
            SlackUser {
                id: id.into(),
                name: String::new(),
            },
            email.into(),
        ));
        self
    }

    pub fn with_usergroup(mut self, id: &str, handle: &str) -> Self {
        self.usergroups.push(Usergroup {
            id: id.into(),
            handle: handle.into(),
            name: handle.into(),
        });
        self
    }

    /// `update_usergroup_members` for this usergroup id fails.
    pub fn with_failing_update(mut self, usergroup_id: &str) -> Self {
        self.failing_updates.insert(usergroup_id.into());
        self
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<SlackCall>>> {
        self.calls.clone()
    }

    /// `(usergroup_id, users)` for every update call so far.
    pub fn updates(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter_map(|c| match c {
                SlackCall::UpdateUsergroupMembers {
                    usergroup_id,
                    users,
                } => Some((usergroup_id.clone(), users.clone())),
                _ => None,
            })
            .collect()
    }

    fn log(&self, call: SlackCall) {
        self.calls
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(call);
    }
}

#[async_trait]
impl SlackApi for FakeSlack {
    async fn lookup_user_by_email(&self, email: &str) -> Result<SlackUser> {
        self.log(SlackCall::LookupUserByEmail(email.into()));
        self.users
            .iter()
            .find(|(_, e)| e == email)
            .map(|(u, _)| u.clone())
            .ok_or_else(|| SlackdutyError::external("Slack", "users_not_found"))
    }

    async fn list_usergroups(&self) -> Result<Vec<Usergroup>> {
        self.log(SlackCall::ListUsergroups);
        Ok(self.usergroups.clone())
    }

    async fn update_usergroup_members(&self, usergroup_id: &str, users: &str) -> Result<()> {
        self.log(SlackCall::UpdateUsergroupMembers {
            usergroup_id: usergroup_id.into(),
            users: users.into(),
        });
        if self.failing_updates.contains(usergroup_id) {
            return Err(SlackdutyError::external("Slack", "permission_denied"));
        }
        Ok(())
    }
}
