use crate::error::Result;
use crate::fanout::join_all;
use crate::member::MembershipSet;
use crate::resolver::{RosterResolver, RosterSource};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// Resolves every roster source of a group into one deduplicated set.
///
/// One task per non-empty source and, inside it, one task per selector. All
/// tasks run to completion; the first error observed fails the aggregation
/// and whatever was collected is dropped.
#[derive(Clone)]
pub struct Aggregator {
    resolver: RosterResolver,
}

impl Aggregator {
    pub fn new(resolver: RosterResolver) -> Self {
        Self { resolver }
    }

    pub async fn aggregate(&self, sources: &[RosterSource]) -> Result<MembershipSet> {
        let set = Arc::new(MembershipSet::new());
        let mut tasks = JoinSet::new();
        for source in sources.iter().filter(|s| !s.selectors().is_empty()) {
            let resolver = self.resolver.clone();
            let source = source.clone();
            let set = set.clone();
            tasks.spawn(async move { aggregate_source(resolver, source, set).await });
        }
        join_all(tasks).await?;

        // Every task has been joined, so this is normally the last handle.
        Ok(Arc::try_unwrap(set).unwrap_or_else(|shared| shared.snapshot().into_iter().collect()))
    }
}

async fn aggregate_source(
    resolver: RosterResolver,
    source: RosterSource,
    set: Arc<MembershipSet>,
) -> Result<()> {
    let context = source.context();
    let mut tasks = JoinSet::new();
    for selector in source.selectors().iter().cloned() {
        let resolver = resolver.clone();
        let set = set.clone();
        tasks.spawn(async move {
            let members = resolver.resolve(context, &selector).await?;
            let added = members.into_iter().filter(|m| set.add(m.clone())).count();
            debug!(source = context.as_str(), %selector, added, "merged members");
            Ok(())
        });
    }
    join_all(tasks).await.map(|_| ()).inspect_err(|e| {
        error!(source = context.as_str(), error = %e, "failed to resolve members");
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
