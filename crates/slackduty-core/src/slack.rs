//! Slack Web API client (users and usergroups methods only).

use crate::api::{SlackApi, SlackUser, Usergroup};
use crate::error::{Result, SlackdutyError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://slack.com/api";

const SERVICE: &str = "Slack";

fn external(message: impl Into<String>) -> SlackdutyError {
    SlackdutyError::external(SERVICE, message)
}

#[derive(Clone)]
pub struct SlackClient {
    http: Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    user: SlackUser,
}

#[derive(Deserialize)]
struct UsergroupsResponse {
    #[serde(default)]
    usergroups: Vec<Usergroup>,
}

impl SlackClient {
    pub fn new(token: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| external(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Send a Web API call. Slack reports most failures as HTTP 200 with
    /// `"ok": false`; those carry the API error code.
    async fn call<T: DeserializeOwned>(&self, method: &str, request: RequestBuilder) -> Result<T> {
        debug!(method, "Slack request");
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| external(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(external(format!("{method} ({status}): {body}")));
        }
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| external(format!("{method}: invalid response: {e}")))?;

        if body.get("ok").and_then(|ok| ok.as_bool()) != Some(true) {
            let code = body
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown_error");
            return Err(external(format!("{method}: {code}")));
        }
        serde_json::from_value(body).map_err(|e| external(format!("{method}: invalid response: {e}")))
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn lookup_user_by_email(&self, email: &str) -> Result<SlackUser> {
        let method = "users.lookupByEmail";
        let request = self.http.get(self.url(method)).query(&[("email", email)]);
        let response: LookupResponse = self.call(method, request).await?;
        Ok(response.user)
    }

    async fn list_usergroups(&self) -> Result<Vec<Usergroup>> {
        let method = "usergroups.list";
        let request = self.http.get(self.url(method));
        let response: UsergroupsResponse = self.call(method, request).await?;
        Ok(response.usergroups)
    }

    async fn update_usergroup_members(&self, usergroup_id: &str, users: &str) -> Result<()> {
        let method = "usergroups.users.update";
        let request = self
            .http
            .post(self.url(method))
            .form(&[("usergroup", usergroup_id), ("users", users)]);
        let _: IgnoredAny = self.call(method, request).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(server: &Server) -> SlackClient {
        SlackClient::new("xoxb-test").unwrap().with_base_url(&server.url())
    }

    #[tokio::test]
    async fn lookup_by_email_uses_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/users.lookupByEmail")
            .match_query(Matcher::UrlEncoded("email".into(), "alice@x.com".into()))
            .match_header("authorization", "Bearer xoxb-test")
            .with_status(200)
            .with_body(r#"{"ok":true,"user":{"id":"U1","name":"alice","real_name":"Alice"}}"#)
            .create_async()
            .await;

        let user = client(&server).lookup_user_by_email("alice@x.com").await.unwrap();
        assert_eq!(user.id, "U1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn ok_false_carries_the_error_code() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/users.lookupByEmail")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"ok":false,"error":"users_not_found"}"#)
            .create_async()
            .await;

        let err = client(&server)
            .lookup_user_by_email("ghost@x.com")
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Slack API call failed: users.lookupByEmail: users_not_found"
        );
    }

    #[tokio::test]
    async fn list_usergroups_decodes_handles() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/usergroups.list")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"ok":true,"usergroups":[
                    {"id":"S1","handle":"oncall","name":"On-call","user_count":3},
                    {"id":"S2","handle":"backend","name":"Backend"}]}"#,
            )
            .create_async()
            .await;

        let groups = client(&server).list_usergroups().await.unwrap();
        let handles: Vec<&str> = groups.iter().map(|g| g.handle.as_str()).collect();
        assert_eq!(handles, vec!["oncall", "backend"]);
    }

    #[tokio::test]
    async fn update_posts_the_full_member_list() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/usergroups.users.update")
            .match_query(Matcher::Any)
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("usergroup=S1".into()),
                Matcher::Regex("users=U1%2CU2".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"ok":true,"usergroup":{"id":"S1"}}"#)
            .create_async()
            .await;

        client(&server)
            .update_usergroup_members("S1", "U1,U2")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rate_limits_are_external_errors() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/usergroups.users.update")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("retry-after", "30")
            .create_async()
            .await;

        let err = client(&server)
            .update_usergroup_members("S1", "U1")
            .await
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::ExternalCall { service: "Slack", .. }));
    }
}
