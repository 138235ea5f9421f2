//! PagerDuty REST API v2 client.

use crate::api::{PagerDutyApi, PdReference, PdSchedule, PdService, PdTeam, PdUser};
use crate::error::{Result, SlackdutyError};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.pagerduty.com";

const SERVICE: &str = "PagerDuty";
const ACCEPT_V2: &str = "application/vnd.pagerduty+json;version=2";
const PAGE_LIMIT: usize = 100;

fn external(message: impl Into<String>) -> SlackdutyError {
    SlackdutyError::external(SERVICE, message)
}

#[derive(Clone)]
pub struct PagerDutyClient {
    http: Client,
    base_url: String,
    token: String,
}

/// One page of a classic offset-paginated list response. The items live
/// under a resource-specific key (`users`, `teams`, `members`, ...).
#[derive(Deserialize)]
struct ListPage {
    #[serde(default)]
    more: bool,
    #[serde(flatten)]
    rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct TeamMember {
    user: PdReference,
}

impl PagerDutyClient {
    pub fn new(api_key: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| external(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: api_key.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, "PagerDuty request");
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, format!("Token token={}", self.token))
            .header(ACCEPT, ACCEPT_V2)
            .query(query)
            .send()
            .await
            .map_err(|e| external(format!("GET {path}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(external(format!("GET {path} ({status}): {body}")));
        }
        response
            .json()
            .await
            .map_err(|e| external(format!("GET {path}: invalid response: {e}")))
    }

    /// Fetch `path` until `more` is false, collecting the array under `key`.
    async fn list_all<T: DeserializeOwned>(
        &self,
        path: &str,
        key: &str,
        query: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut offset = 0;
        loop {
            let mut params = vec![
                ("limit", PAGE_LIMIT.to_string()),
                ("offset", offset.to_string()),
            ];
            if let Some(q) = query {
                params.push(("query", q.to_string()));
            }
            let mut page: ListPage = self.get(path, &params).await?;
            let batch: Vec<T> = match page.rest.remove(key) {
                Some(value) => serde_json::from_value(value)
                    .map_err(|e| external(format!("GET {path}: invalid '{key}': {e}")))?,
                None => Vec::new(),
            };
            let fetched = batch.len();
            items.extend(batch);
            if !page.more || fetched == 0 {
                return Ok(items);
            }
            offset += fetched;
        }
    }
}

#[derive(Deserialize)]
struct ScheduleEnvelope {
    schedule: PdSchedule,
}

#[derive(Deserialize)]
struct ServiceEnvelope {
    service: PdService,
}

#[derive(Deserialize)]
struct UserEnvelope {
    user: PdUser,
}

#[async_trait]
impl PagerDutyApi for PagerDutyClient {
    async fn get_schedule(&self, id: &str) -> Result<PdSchedule> {
        let env: ScheduleEnvelope = self.get(&format!("/schedules/{id}"), &[]).await?;
        Ok(env.schedule)
    }

    async fn list_schedules(&self, query: &str) -> Result<Vec<PdSchedule>> {
        self.list_all("/schedules", "schedules", Some(query)).await
    }

    async fn get_service(&self, id: &str) -> Result<PdService> {
        let env: ServiceEnvelope = self.get(&format!("/services/{id}"), &[]).await?;
        Ok(env.service)
    }

    async fn list_services(&self, query: &str) -> Result<Vec<PdService>> {
        self.list_all("/services", "services", Some(query)).await
    }

    async fn list_teams(&self, query: &str) -> Result<Vec<PdTeam>> {
        self.list_all("/teams", "teams", Some(query)).await
    }

    async fn list_team_members(&self, team_id: &str) -> Result<Vec<PdReference>> {
        let members: Vec<TeamMember> = self
            .list_all(&format!("/teams/{team_id}/members"), "members", None)
            .await?;
        Ok(members.into_iter().map(|m| m.user).collect())
    }

    async fn get_user(&self, id: &str) -> Result<PdUser> {
        let env: UserEnvelope = self.get(&format!("/users/{id}"), &[]).await?;
        Ok(env.user)
    }

    async fn list_users(&self, query: &str) -> Result<Vec<PdUser>> {
        self.list_all("/users", "users", Some(query)).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
