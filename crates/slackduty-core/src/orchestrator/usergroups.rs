//! Usergroup target handling: the handle precheck and handle → id lookup.

use crate::api::{SlackApi, Usergroup};
use crate::config::Group;
use crate::error::{Result, SlackdutyError};
use crate::fanout::CallGate;
use crate::selector::{Selector, SelectorContext, SelectorKind};
use tracing::info;

/// Passes when at least one `handle:` selector names an existing usergroup.
/// Groups that target usergroups by id only are not checked against Slack.
/// A group with no usergroups at all never passes.
pub async fn precheck(slack: &dyn SlackApi, gate: &CallGate, group: &Group) -> Result<()> {
    let selectors = group.usergroup_selectors()?;
    if selectors.is_empty() {
        return Err(SlackdutyError::UsergroupNotFound(format!(
            "group '{}' has no usergroups configured",
            group.name
        )));
    }
    for selector in &selectors {
        selector.validate_kind(SelectorContext::Usergroup)?;
    }
    let handles: Vec<&Selector> = selectors
        .iter()
        .filter(|s| s.kind() == SelectorKind::Handle)
        .collect();
    if handles.is_empty() {
        return Ok(());
    }

    let existing = gate.call(slack.list_usergroups()).await?;
    let found = handles
        .iter()
        .any(|h| existing.iter().any(|ug| ug.handle == h.value()));
    if !found {
        let wanted: Vec<String> = handles.iter().map(|h| h.to_string()).collect();
        return Err(SlackdutyError::UsergroupNotFound(wanted.join(", ")));
    }
    info!(group = %group.name, "precheck passed");
    Ok(())
}

/// The Slack id a usergroup selector points at.
pub async fn resolve_id(slack: &dyn SlackApi, gate: &CallGate, selector: &Selector) -> Result<String> {
    match selector.kind() {
        SelectorKind::Id => Ok(selector.value().to_string()),
        SelectorKind::Handle => {
            let existing = gate.call(slack.list_usergroups()).await?;
            find_by_handle(existing, selector.value())
                .map(|ug| ug.id)
                .ok_or_else(|| SlackdutyError::UsergroupNotFound(selector.to_string()))
        }
        _ => Err(selector.unsupported(SelectorContext::Usergroup)),
    }
}

fn find_by_handle(usergroups: Vec<Usergroup>, handle: &str) -> Option<Usergroup> {
    usergroups.into_iter().find(|ug| ug.handle == handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Members;
    use crate::testing::{FakeSlack, SlackCall};

    fn group(usergroups: &[&str]) -> Group {
        Group {
            name: "g".into(),
            schedule: None,
            usergroups: usergroups.iter().map(|u| u.to_string()).collect(),
            members: Members::default(),
            exclude: Vec::new(),
        }
    }

    fn slack() -> FakeSlack {
        FakeSlack::new()
            .with_usergroup("S1", "oncall")
            .with_usergroup("S2", "backend-oncall")
    }

    #[tokio::test]
    async fn precheck_passes_when_any_handle_exists() {
        let gate = CallGate::unbounded();
        precheck(&slack(), &gate, &group(&["handle:missing", "handle:oncall"]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn precheck_fails_when_no_handle_exists() {
        let gate = CallGate::unbounded();
        let err = precheck(&slack(), &gate, &group(&["handle:ghost"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::UsergroupNotFound(h) if h == "handle:ghost"));
    }

    #[tokio::test]
    async fn id_only_groups_skip_the_lookup() {
        let fake = slack();
        let calls = fake.calls();
        precheck(&fake, &CallGate::unbounded(), &group(&["id:S9"]))
            .await
            .unwrap();
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn precheck_rejects_unsupported_kinds() {
        let err = precheck(&slack(), &CallGate::unbounded(), &group(&["name:oncall"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::UnsupportedKind { .. }));
    }

    #[tokio::test]
    async fn precheck_fails_without_usergroups() {
        let fake = slack();
        let calls = fake.calls();
        let err = precheck(&fake, &CallGate::unbounded(), &group(&[]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::UsergroupNotFound(_)), "{err}");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn precheck_rejects_malformed_selectors() {
        let err = precheck(&slack(), &CallGate::unbounded(), &group(&["handle"]))
            .await
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::Format(_)), "{err}");
    }

    #[tokio::test]
    async fn resolve_id_by_handle_and_by_id() {
        let fake = slack();
        let gate = CallGate::unbounded();
        let by_handle = resolve_id(&fake, &gate, &Selector::parse("handle:backend-oncall").unwrap())
            .await
            .unwrap();
        assert_eq!(by_handle, "S2");

        let by_id = resolve_id(&fake, &gate, &Selector::id("S7")).await.unwrap();
        assert_eq!(by_id, "S7");
        assert_eq!(*fake.calls().lock().unwrap(), vec![SlackCall::ListUsergroups]);
    }

    #[tokio::test]
    async fn resolve_id_reports_unknown_handles() {
        let err = resolve_id(&slack(), &CallGate::unbounded(), &Selector::parse("handle:nope").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::UsergroupNotFound(_)));
    }
}
