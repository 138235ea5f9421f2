//! Selector → member resolution against PagerDuty and Slack.
//!
//! Every PagerDuty person is bridged to Slack through their email address; a
//! person that cannot be found in Slack fails the whole resolution.

use crate::api::{PagerDutyApi, PdReference, PdUser, SlackApi};
use crate::error::{Result, SlackdutyError};
use crate::fanout::{join_all, CallGate};
use crate::member::Member;
use crate::selector::{Selector, SelectorContext, SelectorKind};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::debug;

// ---------------------------------------------------------------------------
// RosterSource
// ---------------------------------------------------------------------------

/// One configured category of membership and its selectors.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterSource {
    Schedule(Vec<Selector>),
    Service(Vec<Selector>),
    Team(Vec<Selector>),
    User(Vec<Selector>),
    SlackUser(Vec<Selector>),
}

impl RosterSource {
    pub fn context(&self) -> SelectorContext {
        match self {
            Self::Schedule(_) => SelectorContext::Schedule,
            Self::Service(_) => SelectorContext::Service,
            Self::Team(_) => SelectorContext::Team,
            Self::User(_) => SelectorContext::User,
            Self::SlackUser(_) => SelectorContext::SlackUser,
        }
    }

    pub fn selectors(&self) -> &[Selector] {
        match self {
            Self::Schedule(s)
            | Self::Service(s)
            | Self::Team(s)
            | Self::User(s)
            | Self::SlackUser(s) => s,
        }
    }
}

// ---------------------------------------------------------------------------
// RosterResolver
// ---------------------------------------------------------------------------

/// Cheap to clone; clones share the API clients and the call gate.
#[derive(Clone)]
pub struct RosterResolver {
    pagerduty: Arc<dyn PagerDutyApi>,
    slack: Arc<dyn SlackApi>,
    gate: CallGate,
}

impl RosterResolver {
    pub fn new(pagerduty: Arc<dyn PagerDutyApi>, slack: Arc<dyn SlackApi>, gate: CallGate) -> Self {
        Self {
            pagerduty,
            slack,
            gate,
        }
    }

    /// Resolve one selector of the given context.
    pub async fn resolve(&self, context: SelectorContext, selector: &Selector) -> Result<Vec<Member>> {
        match context {
            SelectorContext::Schedule => self.resolve_schedule(selector).await,
            SelectorContext::Service => self.resolve_service(selector).await,
            SelectorContext::Team => self.resolve_team(selector).await,
            SelectorContext::User => Ok(vec![self.resolve_user(selector).await?]),
            SelectorContext::SlackUser => Ok(vec![self.resolve_slack_user(selector).await?]),
            SelectorContext::Usergroup | SelectorContext::Exclude => {
                Err(selector.unsupported(context))
            }
        }
    }

    /// Everyone currently listed on the schedule.
    pub async fn resolve_schedule(&self, selector: &Selector) -> Result<Vec<Member>> {
        let ctx = SelectorContext::Schedule;
        let schedule = match selector.kind() {
            SelectorKind::Id => self.gate.call(self.pagerduty.get_schedule(selector.value())).await?,
            SelectorKind::Name => {
                let found = self
                    .gate
                    .call(self.pagerduty.list_schedules(selector.value()))
                    .await?;
                expect_one(found, ctx, selector)?
            }
            _ => return Err(selector.unsupported(ctx)),
        };
        debug!(schedule = %schedule.name, users = schedule.users.len(), "resolved schedule");
        self.bridge_references(schedule.users).await
    }

    /// Every member of every team attached to the service.
    pub async fn resolve_service(&self, selector: &Selector) -> Result<Vec<Member>> {
        let ctx = SelectorContext::Service;
        let service = match selector.kind() {
            SelectorKind::Id => self.gate.call(self.pagerduty.get_service(selector.value())).await?,
            SelectorKind::Name => {
                let found = self
                    .gate
                    .call(self.pagerduty.list_services(selector.value()))
                    .await?;
                expect_one(found, ctx, selector)?
            }
            _ => return Err(selector.unsupported(ctx)),
        };
        debug!(service = %service.name, teams = service.teams.len(), "resolved service");

        let mut tasks = JoinSet::new();
        for team in service.teams {
            let this = self.clone();
            tasks.spawn(async move { this.resolve_team_id(&team.id).await });
        }
        Ok(join_all(tasks).await?.into_iter().flatten().collect())
    }

    pub async fn resolve_team(&self, selector: &Selector) -> Result<Vec<Member>> {
        let ctx = SelectorContext::Team;
        match selector.kind() {
            SelectorKind::Id => self.resolve_team_id(selector.value()).await,
            SelectorKind::Name => {
                let found = self
                    .gate
                    .call(self.pagerduty.list_teams(selector.value()))
                    .await?;
                let team = expect_one(found, ctx, selector)?;
                self.resolve_team_id(&team.id).await
            }
            _ => Err(selector.unsupported(ctx)),
        }
    }

    pub async fn resolve_user(&self, selector: &Selector) -> Result<Member> {
        let ctx = SelectorContext::User;
        let user = match selector.kind() {
            SelectorKind::Id => self.gate.call(self.pagerduty.get_user(selector.value())).await?,
            SelectorKind::Name | SelectorKind::Email => {
                let found = self
                    .gate
                    .call(self.pagerduty.list_users(selector.value()))
                    .await?;
                expect_one(found, ctx, selector)?
            }
            SelectorKind::Handle => return Err(selector.unsupported(ctx)),
        };
        self.bridge(user).await
    }

    /// A Slack user configured directly. `id:` selectors need no lookup.
    pub async fn resolve_slack_user(&self, selector: &Selector) -> Result<Member> {
        match selector.kind() {
            SelectorKind::Id => Ok(Member::new(selector.value(), "")),
            SelectorKind::Email => {
                let user = self
                    .gate
                    .call(self.slack.lookup_user_by_email(selector.value()))
                    .await?;
                Ok(Member::new(user.id, selector.value()))
            }
            _ => Err(selector.unsupported(SelectorContext::SlackUser)),
        }
    }

    async fn resolve_team_id(&self, team_id: &str) -> Result<Vec<Member>> {
        let refs = self
            .gate
            .call(self.pagerduty.list_team_members(team_id))
            .await?;
        debug!(team = %team_id, members = refs.len(), "resolved team");
        self.bridge_references(refs).await
    }

    /// Fetch every referenced user concurrently and bridge each to Slack.
    async fn bridge_references(&self, refs: Vec<PdReference>) -> Result<Vec<Member>> {
        let mut tasks = JoinSet::new();
        for user_ref in refs {
            let this = self.clone();
            tasks.spawn(async move {
                let user = this.gate.call(this.pagerduty.get_user(&user_ref.id)).await?;
                this.bridge(user).await
            });
        }
        join_all(tasks).await
    }

    async fn bridge(&self, user: PdUser) -> Result<Member> {
        let slack_user = self
            .gate
            .call(self.slack.lookup_user_by_email(&user.email))
            .await?;
        Ok(Member::new(slack_user.id, user.email))
    }
}

/// Name lookups must match exactly one entity.
fn expect_one<T>(mut found: Vec<T>, context: SelectorContext, selector: &Selector) -> Result<T> {
    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(SlackdutyError::NotFound {
            context: context.as_str(),
            kind: selector.kind(),
            value: selector.value().to_string(),
        }),
        count => Err(SlackdutyError::AmbiguousLookup {
            context: context.as_str(),
            kind: selector.kind(),
            value: selector.value().to_string(),
            count,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePagerDuty, FakeSlack};

    fn resolver(pd: FakePagerDuty, slack: FakeSlack) -> RosterResolver {
        RosterResolver::new(Arc::new(pd), Arc::new(slack), CallGate::unbounded())
    }

    fn sel(raw: &str) -> Selector {
        Selector::parse(raw).unwrap()
    }

    fn directory() -> (FakePagerDuty, FakeSlack) {
        let pd = FakePagerDuty::new()
            .with_user("P1", "alice", "alice@x.com")
            .with_user("P2", "bob", "bob@x.com")
            .with_user("P3", "carol", "carol@x.com")
            .with_schedule("S1", "primary", &["P1", "P2"])
            .with_schedule("S2", "primary-backup", &["P3"])
            .with_team("T1", "backend", &["P2", "P3"])
            .with_team("T2", "frontend", &["P1"])
            .with_service("SV1", "api", &["T1", "T2"]);
        let slack = FakeSlack::new()
            .with_user("U1", "alice@x.com")
            .with_user("U2", "bob@x.com")
            .with_user("U3", "carol@x.com");
        (pd, slack)
    }

    fn sorted_ids(members: Vec<Member>) -> Vec<String> {
        let mut ids: Vec<String> = members.into_iter().map(|m| m.id).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn schedule_by_id_bridges_every_user() {
        let (pd, slack) = directory();
        let members = resolver(pd, slack)
            .resolve_schedule(&sel("id:S1"))
            .await
            .unwrap();
        assert_eq!(sorted_ids(members.clone()), vec!["U1", "U2"]);
        assert!(members.iter().any(|m| m.email == "alice@x.com"));
    }

    #[tokio::test]
    async fn id_lookup_passes_the_api_error_through() {
        let (pd, slack) = directory();
        let err = resolver(pd, slack)
            .resolve_schedule(&sel("id:missing"))
            .await
            .unwrap_err();
        match err {
            SlackdutyError::ExternalCall { service, message } => {
                assert_eq!(service, "PagerDuty");
                assert_eq!(message, "schedule missing: 404 Not Found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn name_lookup_with_one_match_succeeds() {
        let (pd, slack) = directory();
        let members = resolver(pd, slack)
            .resolve_team(&sel("name:backend"))
            .await
            .unwrap();
        assert_eq!(sorted_ids(members), vec!["U2", "U3"]);
    }

    #[tokio::test]
    async fn name_lookup_with_no_match_is_not_found() {
        let (pd, slack) = directory();
        let err = resolver(pd, slack)
            .resolve_team(&sel("name:platform"))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::NotFound { .. }), "{err}");
    }

    #[tokio::test]
    async fn name_lookup_with_several_matches_is_ambiguous() {
        let (pd, slack) = directory();
        // "primary" is a substring of both schedule names.
        let err = resolver(pd, slack)
            .resolve_schedule(&sel("name:primary"))
            .await
            .unwrap_err();
        match err {
            SlackdutyError::AmbiguousLookup { count, .. } => assert_eq!(count, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn service_merges_all_attached_teams() {
        let (pd, slack) = directory();
        let members = resolver(pd, slack)
            .resolve_service(&sel("id:SV1"))
            .await
            .unwrap();
        assert_eq!(sorted_ids(members), vec!["U1", "U2", "U3"]);
    }

    #[tokio::test]
    async fn user_by_email_uses_query_lookup() {
        let (pd, slack) = directory();
        let member = resolver(pd, slack)
            .resolve_user(&sel("email:carol@x.com"))
            .await
            .unwrap();
        assert_eq!(member, Member::new("U3", "carol@x.com"));
    }

    #[tokio::test]
    async fn slack_id_needs_no_lookup() {
        let (pd, slack) = directory();
        let calls = slack.calls();
        let member = resolver(pd, slack)
            .resolve_slack_user(&sel("id:U9"))
            .await
            .unwrap();
        assert_eq!(member, Member::new("U9", ""));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_slack_account_fails_the_team() {
        let (pd, _) = directory();
        let slack = FakeSlack::new()
            .with_user("U2", "bob@x.com")
            .with_user("U3", "carol@x.com");
        let pd = pd.with_user("P4", "dave", "dave@x.com").with_team("T3", "ops", &["P2", "P4"]);
        let err = resolver(pd, slack)
            .resolve_team(&sel("id:T3"))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::ExternalCall { .. }), "{err}");
    }

    #[tokio::test]
    async fn rejects_kinds_outside_the_context() {
        let (pd, slack) = directory();
        let r = resolver(pd, slack);
        for (ctx, raw) in [
            (SelectorContext::Schedule, "email:a@x.com"),
            (SelectorContext::Team, "handle:ops"),
            (SelectorContext::SlackUser, "name:alice"),
            (SelectorContext::User, "handle:alice"),
        ] {
            let err = r.resolve(ctx, &sel(raw)).await.unwrap_err();
            assert!(matches!(err, SlackdutyError::UnsupportedKind { .. }), "{raw}: {err}");
        }
    }
}
