//! Per-group reconcile pipeline and the top-level driver.
//!
//! Each firing of a group runs precheck → aggregate → filter → update. The
//! driver runs one job per group concurrently; a group's failure is logged
//! and never reaches the caller or the other groups.

pub mod usergroups;

use crate::aggregator::Aggregator;
use crate::api::{PagerDutyApi, SlackApi};
use crate::config::{Config, Group};
use crate::error::{Result, SlackdutyError};
use crate::fanout::CallGate;
use crate::job::{Job, Work};
use crate::member::{flatten_members, Member, MembershipSet};
use crate::pagerduty::PagerDutyClient;
use crate::resolver::RosterResolver;
use crate::settings::Settings;
use crate::slack::SlackClient;
use futures::FutureExt;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    slack: Arc<dyn SlackApi>,
    gate: CallGate,
    aggregator: Aggregator,
    external_trigger: bool,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        pagerduty: Arc<dyn PagerDutyApi>,
        slack: Arc<dyn SlackApi>,
        gate: CallGate,
        external_trigger: bool,
    ) -> Self {
        let resolver = RosterResolver::new(pagerduty, slack.clone(), gate.clone());
        Self {
            config: Arc::new(config),
            slack,
            gate,
            aggregator: Aggregator::new(resolver),
            external_trigger,
        }
    }

    /// Wire up the REST clients described by `settings`.
    pub fn from_settings(config: Config, settings: &Settings) -> Result<Self> {
        let mut pagerduty = PagerDutyClient::new(&settings.pagerduty_api_key)?;
        if let Some(url) = &settings.pagerduty_base_url {
            pagerduty = pagerduty.with_base_url(url);
        }
        let mut slack = SlackClient::new(&settings.slack_api_key)?;
        if let Some(url) = &settings.slack_base_url {
            slack = slack.with_base_url(url);
        }
        Ok(Self::new(
            config,
            Arc::new(pagerduty),
            Arc::new(slack),
            settings.gate(),
            settings.external_trigger,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn precheck(&self, group: &Group) -> Result<()> {
        usergroups::precheck(self.slack.as_ref(), &self.gate, group).await
    }

    /// Aggregate every source of `group` and drop excluded members. Slack is
    /// not modified.
    pub async fn members(&self, group: &Group) -> Result<MembershipSet> {
        let sources = group.members.sources()?;
        let exclude = group.exclude_selectors()?;
        let aggregated = self.aggregator.aggregate(&sources).await?;
        aggregated.filter(&exclude)
    }

    /// One firing of the group pipeline.
    pub async fn reconcile_group(&self, group: &Group) -> Result<()> {
        let name = group.name.as_str();
        let schedule = group.schedule.as_deref().unwrap_or_default();
        info!(group = name, schedule, "reconciling group");

        self.precheck(group).await.inspect_err(|e| {
            error!(group = name, schedule, error = %e, "precheck failed");
        })?;

        let members = self.members(group).await.inspect_err(|e| {
            error!(group = name, schedule, error = %e, "failed to collect members");
        })?;
        if members.is_empty() {
            warn!(group = name, schedule, "no members resolved; usergroups left untouched");
            return Ok(());
        }

        let mut members: Vec<Member> = members.into_members();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        let users = flatten_members(&members);

        let targets = group.usergroup_selectors()?;
        for selector in &targets {
            let update = async {
                let id = usergroups::resolve_id(self.slack.as_ref(), &self.gate, selector).await?;
                self.gate
                    .call(self.slack.update_usergroup_members(&id, &users))
                    .await
            };
            update.await.inspect_err(|e| {
                error!(group = name, usergroup = %selector, error = %e, "failed to update usergroup");
            })?;
            info!(group = name, usergroup = %selector, members = members.len(), "updated usergroup");
        }
        Ok(())
    }

    /// The job for the group at `index`: one-shot under an external trigger,
    /// otherwise recurring on the group's cron schedule.
    pub fn job(&self, index: usize) -> Result<Job> {
        let group = self
            .config
            .groups
            .get(index)
            .ok_or_else(|| SlackdutyError::GroupNotFound(format!("#{index}")))?;

        let this = self.clone();
        let work: Work = Arc::new(move || {
            let this = this.clone();
            async move { this.reconcile_group(&this.config.groups[index]).await }.boxed()
        });

        if self.external_trigger {
            return Ok(Job::one_shot(group.name.clone(), work));
        }
        let pattern = group
            .schedule
            .as_deref()
            .ok_or_else(|| SlackdutyError::InvalidSchedule {
                pattern: String::new(),
                reason: "no schedule configured".into(),
            })?;
        Job::recurring(group.name.clone(), work, pattern)
    }

    /// Run every group. Under an external trigger this returns once each
    /// group ran once; otherwise it returns after `cancel` fires and every
    /// in-flight firing has finished.
    pub async fn run(&self, cancel: CancellationToken) {
        let external_trigger = self.external_trigger;
        let mut tasks = JoinSet::new();

        for (index, group) in self.config.groups.iter().enumerate() {
            let job = match self.job(index) {
                Ok(job) => job,
                Err(e) => {
                    error!(group = %group.name, error = %e, "group skipped");
                    continue;
                }
            };
            let cancel = cancel.child_token();
            tasks.spawn(async move {
                let outcome = job.run(cancel).await;
                match outcome {
                    Ok(()) => info!(group = job.name(), external_trigger, "job finished"),
                    Err(e) => error!(
                        group = job.name(),
                        external_trigger,
                        error = %e,
                        "failed to update Slack usergroup"
                    ),
                }
            });
        }

        info!(groups = tasks.len(), external_trigger, "started jobs");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "group job panicked");
            }
        }
        info!(external_trigger, "all jobs stopped");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePagerDuty, FakeSlack};

    fn config(yaml: &str) -> Config {
        Config::from_yaml(yaml).unwrap()
    }

    fn fakes() -> (FakePagerDuty, FakeSlack) {
        let pd = FakePagerDuty::new()
            .with_user("P1", "alice", "alice@x.com")
            .with_user("P2", "bob", "bob@x.com")
            .with_schedule("S1", "primary", &["P1", "P2"]);
        let slack = FakeSlack::new()
            .with_user("U1", "alice@x.com")
            .with_user("U2", "bob@x.com")
            .with_usergroup("G1", "oncall")
            .with_usergroup("G2", "backup");
        (pd, slack)
    }

    fn orchestrator(cfg: Config, pd: FakePagerDuty, slack: FakeSlack, external: bool) -> Orchestrator {
        Orchestrator::new(cfg, Arc::new(pd), Arc::new(slack), CallGate::new(Some(2)), external)
    }

    const TWO_GROUPS: &str = r#"
groups:
  - name: ok
    schedule: "*/5 * * * *"
    usergroups: ["handle:oncall"]
    members:
      pagerduty:
        schedules: ["id:S1"]
  - name: broken
    schedule: "*/5 * * * *"
    usergroups: ["handle:ghost"]
    members:
      slack: ["id:U7"]
"#;

    #[tokio::test]
    async fn members_applies_excludes() {
        let (pd, slack) = fakes();
        let cfg = config(
            r#"
groups:
  - name: g
    usergroups: ["id:G1"]
    members:
      pagerduty:
        schedules: ["name:primary"]
      slack: ["id:U3"]
    exclude: ["email:bob@x.com", "id:U3"]
"#,
        );
        let orch = orchestrator(cfg, pd, slack, true);
        let group = orch.config().group("g").unwrap();
        let members = orch.members(group).await.unwrap().into_members();
        assert_eq!(members, vec![Member::new("U1", "alice@x.com")]);
    }

    #[tokio::test]
    async fn reconcile_pushes_sorted_ids_to_every_usergroup() {
        let (pd, slack) = fakes();
        let cfg = config(
            r#"
groups:
  - name: g
    usergroups: ["handle:oncall", "id:G2"]
    members:
      pagerduty:
        schedules: ["id:S1"]
"#,
        );
        let orch = orchestrator(cfg, pd, slack.clone(), true);
        orch.reconcile_group(&orch.config().groups[0]).await.unwrap();
        assert_eq!(
            slack.updates(),
            vec![
                ("G1".to_string(), "U1,U2".to_string()),
                ("G2".to_string(), "U1,U2".to_string()),
            ]
        );
    }

    #[test]
    fn jobs_follow_the_trigger_mode() {
        let (pd, slack) = fakes();
        let cfg = config(TWO_GROUPS);
        let recurring = orchestrator(cfg.clone(), pd.clone(), slack.clone(), false);
        assert!(matches!(recurring.job(0).unwrap(), Job::Recurring { .. }));

        let one_shot = orchestrator(cfg, pd, slack, true);
        assert!(matches!(one_shot.job(1).unwrap(), Job::OneShot { .. }));
        assert!(matches!(
            one_shot.job(5).unwrap_err(),
            SlackdutyError::GroupNotFound(_)
        ));
    }

    #[test]
    fn recurring_job_needs_a_schedule() {
        let (pd, slack) = fakes();
        let cfg = config("groups:\n  - name: g\n    usergroups: [\"id:G1\"]\n");
        let err = orchestrator(cfg, pd, slack, false).job(0).unwrap_err();
        assert!(matches!(err, SlackdutyError::InvalidSchedule { .. }));
    }

    #[tokio::test]
    async fn run_isolates_group_failures() {
        let (pd, slack) = fakes();
        let orch = orchestrator(config(TWO_GROUPS), pd, slack.clone(), true);
        orch.run(CancellationToken::new()).await;
        assert_eq!(slack.updates(), vec![("G1".to_string(), "U1,U2".to_string())]);
    }

    #[tokio::test]
    async fn run_returns_after_cancel_in_recurring_mode() {
        let (pd, slack) = fakes();
        let orch = orchestrator(config(TWO_GROUPS), pd, slack.clone(), false);
        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(2), orch.run(cancel))
            .await
            .expect("run did not stop");
        assert!(slack.updates().is_empty());
    }

    #[tokio::test]
    async fn malformed_selector_fails_only_its_group() {
        let (pd, slack) = fakes();
        let cfg = config(
            r#"
groups:
  - name: healthy
    usergroups: ["id:G1"]
    members:
      slack: ["id:U1"]
  - name: typo
    usergroups: ["id:G2"]
    members:
      slack: ["id:U2"]
    exclude: ["emial:x@y.com"]
"#,
        );
        let orch = orchestrator(cfg, pd, slack.clone(), true);
        let err = orch.reconcile_group(&orch.config().groups[1]).await.unwrap_err();
        assert!(matches!(err, SlackdutyError::Format(_)), "{err}");

        orch.run(CancellationToken::new()).await;
        assert_eq!(slack.updates(), vec![("G1".to_string(), "U1".to_string())]);
    }

    #[tokio::test]
    async fn recurring_run_reconciles_on_every_firing() {
        let (pd, slack) = fakes();
        let cfg = config(&TWO_GROUPS.replace("*/5 * * * *", "* * * * * *"));
        let orch = orchestrator(cfg, pd, slack.clone(), false);
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(2500)).await;
            stopper.cancel();
        });
        tokio::time::timeout(std::time::Duration::from_secs(10), orch.run(cancel))
            .await
            .expect("run did not stop");

        let updates = slack.updates();
        assert!(!updates.is_empty());
        assert!(updates
            .iter()
            .all(|(ug, users)| ug == "G1" && users == "U1,U2"));
    }
}
