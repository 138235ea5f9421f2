use crate::error::Result;
use crate::selector::{Selector, SelectorContext, SelectorKind};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard};

/// One resolved person, identified by their Slack user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    /// Email the member was bridged through. Empty when configured by Slack id.
    #[serde(default)]
    pub email: String,
}

impl Member {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
        }
    }

    fn matches(&self, selector: &Selector) -> bool {
        match selector.kind() {
            SelectorKind::Id => self.id == selector.value(),
            SelectorKind::Email => self.email == selector.value(),
            SelectorKind::Name | SelectorKind::Handle => false,
        }
    }
}

// ---------------------------------------------------------------------------
// MembershipSet
// ---------------------------------------------------------------------------

/// Insertion-ordered set of members, unique on [`Member::id`].
///
/// Shared between the resolution tasks of one aggregation. `add` performs the
/// duplicate check and the append under a single lock.
#[derive(Debug, Default)]
pub struct MembershipSet {
    members: Mutex<Vec<Member>>,
}

impl MembershipSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `member` unless a member with the same id is already present.
    /// Returns whether the member was inserted.
    pub fn add(&self, member: Member) -> bool {
        let mut members = self.lock();
        if members.iter().any(|m| m.id == member.id) {
            return false;
        }
        members.push(member);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Member> {
        self.lock().clone()
    }

    pub fn into_members(self) -> Vec<Member> {
        self.members
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop members matching any exclude selector. Only `id` and `email`
    /// selectors are accepted; any other kind rejects the whole filter.
    pub fn filter(&self, exclude: &[Selector]) -> Result<MembershipSet> {
        for selector in exclude {
            selector.validate_kind(SelectorContext::Exclude)?;
        }
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|m| !exclude.iter().any(|s| m.matches(s)))
            .collect())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Member>> {
        // A panic while holding the lock cannot leave the Vec half-written.
        self.members
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FromIterator<Member> for MembershipSet {
    fn from_iter<I: IntoIterator<Item = Member>>(iter: I) -> Self {
        let set = MembershipSet::new();
        for member in iter {
            set.add(member);
        }
        set
    }
}

/// Comma-joined member ids, the format `usergroups.users.update` expects.
pub fn flatten_members(members: &[Member]) -> String {
    members
        .iter()
        .map(|m| m.id.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlackdutyError;
    use std::sync::Arc;

    fn set_of(members: &[(&str, &str)]) -> MembershipSet {
        members.iter().map(|(id, email)| Member::new(*id, *email)).collect()
    }

    fn ids(set: MembershipSet) -> Vec<String> {
        set.into_members().into_iter().map(|m| m.id).collect()
    }

    #[test]
    fn add_ignores_duplicate_ids() {
        let set = MembershipSet::new();
        assert!(set.add(Member::new("U1", "a@x.com")));
        assert!(set.add(Member::new("U2", "b@x.com")));
        assert!(!set.add(Member::new("U1", "other@x.com")));
        assert_eq!(set.len(), 2);
        assert_eq!(set.snapshot()[0].email, "a@x.com");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_keep_one_entry_per_id() {
        let set = Arc::new(MembershipSet::new());
        let mut tasks = tokio::task::JoinSet::new();
        for n in 0..200 {
            let set = set.clone();
            tasks.spawn(async move {
                let id = format!("U{}", n % 7);
                set.add(Member::new(id.clone(), format!("{id}@x.com")));
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.expect("task panicked");
        }
        assert_eq!(set.len(), 7);
    }

    #[test]
    fn filter_without_excludes_is_identity() {
        let set = set_of(&[("C", "c@x"), ("A", "a@x"), ("B", "b@x")]);
        assert_eq!(ids(set.filter(&[]).unwrap()), vec!["C", "A", "B"]);
    }

    #[test]
    fn filter_by_id() {
        let set = set_of(&[("A", "a@x"), ("B", "b@x"), ("C", "c@x")]);
        let filtered = set.filter(&[Selector::id("B")]).unwrap();
        assert_eq!(ids(filtered), vec!["A", "C"]);
    }

    #[test]
    fn filter_by_email() {
        let set = set_of(&[("A", "a@x"), ("B", "b@x")]);
        let filtered = set.filter(&[Selector::email("b@x")]).unwrap();
        assert_eq!(ids(filtered), vec!["A"]);
    }

    #[test]
    fn filter_with_several_excludes_keeps_each_member_once() {
        let set = set_of(&[("A", "a@x"), ("B", "b@x"), ("C", "c@x")]);
        let filtered = set
            .filter(&[Selector::id("A"), Selector::email("nobody@x")])
            .unwrap();
        assert_eq!(ids(filtered), vec!["B", "C"]);
    }

    #[test]
    fn filter_rejects_unsupported_kind() {
        let set = set_of(&[("A", "a@x")]);
        let err = set
            .filter(&[Selector::id("A"), Selector::parse("name:foo").unwrap()])
            .unwrap_err();
        assert!(matches!(err, SlackdutyError::UnsupportedKind { .. }));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn flatten_joins_ids_in_order() {
        let members = vec![
            Member::new("1", ""),
            Member::new("2", ""),
            Member::new("3", ""),
        ];
        assert_eq!(flatten_members(&members), "1,2,3");
        assert_eq!(flatten_members(&members[..1]), "1");
        assert_eq!(flatten_members(&[]), "");
    }
}
