//! Rehydrating the placeholders of a resumed execution.

use crate::config::{ResumeOptions, ResumePolicy};
use crate::error::RuntimeError;
use futures::future::{join_all, try_join_all};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use workflow_core::error::RehydrationError;
use workflow_core::pending::{LiveResource, PendingResource};
use workflow_core::placeholder::Placeholder;

/// Outcome of rehydrating a set of placeholders, by placeholder name.
#[derive(Debug, Default)]
pub struct RehydratedResources {
    pub resources: BTreeMap<String, LiveResource>,
    /// Only ever non-empty under [`ResumePolicy::TolerateFailures`].
    pub failures: BTreeMap<String, RehydrationError>,
}

impl RehydratedResources {
    pub fn get(&self, name: &str) -> Option<&LiveResource> {
        self.resources.get(name)
    }

    /// The resource named `name` as its concrete type.
    pub fn downcast<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.resources.get(name).and_then(LiveResource::downcast)
    }

    /// Whether every placeholder was rebuilt.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Begin rehydrating every placeholder and wait for all of them.
///
/// Every `begin_rehydrate` call is issued before anything is awaited, so slow
/// resources are rebuilt concurrently. Whenever this returns an error, the
/// pending resources that had not settled yet are cancelled.
pub async fn rehydrate_all(
    placeholders: &BTreeMap<String, Arc<dyn Placeholder>>,
    options: &ResumeOptions,
) -> Result<RehydratedResources, RuntimeError> {
    let pending: Vec<(String, PendingResource)> = placeholders
        .iter()
        .map(|(name, placeholder)| (name.clone(), placeholder.begin_rehydrate()))
        .collect();
    tracing::debug!(
        placeholders = pending.len(),
        policy = ?options.policy,
        "Rehydrating placeholders"
    );

    let outcome = match options.timeout {
        Some(timeout) => tokio::time::timeout(timeout, settle(&pending, options.policy))
            .await
            .unwrap_or_else(|_| Err(RuntimeError::TimedOut(timeout))),
        None => settle(&pending, options.policy).await,
    };

    if let Err(e) = &outcome {
        let cancelled = pending.iter().filter(|(_, p)| p.cancel()).count();
        tracing::warn!(error = %e, cancelled, "Rehydration aborted");
    }
    outcome
}

async fn settle(
    pending: &[(String, PendingResource)],
    policy: ResumePolicy,
) -> Result<RehydratedResources, RuntimeError> {
    let mut rehydrated = RehydratedResources::default();
    match policy {
        ResumePolicy::AbortOnFailure => {
            let resources = try_join_all(pending.iter().map(|(name, p)| async move {
                p.wait()
                    .await
                    .map(|resource| (name.clone(), resource))
                    .map_err(|source| RuntimeError::Rehydration {
                        name: name.clone(),
                        source,
                    })
            }))
            .await?;
            rehydrated.resources.extend(resources);
        }
        ResumePolicy::TolerateFailures => {
            let outcomes =
                join_all(pending.iter().map(|(name, p)| async move { (name, p.wait().await) }))
                    .await;
            for (name, outcome) in outcomes {
                match outcome {
                    Ok(resource) => {
                        rehydrated.resources.insert(name.clone(), resource);
                    }
                    Err(error) => {
                        tracing::warn!(placeholder = %name, error = %error, "Placeholder failed to rehydrate");
                        rehydrated.failures.insert(name.clone(), error);
                    }
                }
            }
        }
    }
    Ok(rehydrated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use workflow_core::placeholder::{PlaceholderRecord, PlaceholderState, RehydrationCell};

    /// Rebuilds to its own name after `delay`, or fails when `fail` is set.
    #[derive(Debug)]
    struct Delayed {
        delay: Duration,
        fail: bool,
        cell: RehydrationCell,
    }

    impl Delayed {
        fn ok(millis: u64) -> Arc<dyn Placeholder> {
            Arc::new(Self {
                delay: Duration::from_millis(millis),
                fail: false,
                cell: RehydrationCell::new(),
            })
        }

        fn failing(millis: u64) -> Arc<dyn Placeholder> {
            Arc::new(Self {
                delay: Duration::from_millis(millis),
                fail: true,
                cell: RehydrationCell::new(),
            })
        }
    }

    impl Placeholder for Delayed {
        fn kind(&self) -> &'static str {
            "delayed"
        }

        fn to_record(&self) -> Result<PlaceholderRecord, serde_json::Error> {
            PlaceholderRecord::encode(self.kind(), &self.delay.as_millis())
        }

        fn begin_rehydrate(&self) -> PendingResource {
            let delay = self.delay;
            let fail = self.fail;
            self.cell.begin(|| async move {
                tokio::time::sleep(delay).await;
                if fail {
                    Err(RehydrationError::Missing("gone".to_string()))
                } else {
                    Ok(LiveResource::new(delay))
                }
            })
        }

        fn state(&self) -> PlaceholderState {
            self.cell.state()
        }
    }

    fn named(entries: Vec<(&str, Arc<dyn Placeholder>)>) -> BTreeMap<String, Arc<dyn Placeholder>> {
        entries
            .into_iter()
            .map(|(name, p)| (name.to_string(), p))
            .collect()
    }

    #[tokio::test]
    async fn test_all_resolved() {
        let placeholders = named(vec![("a", Delayed::ok(10)), ("b", Delayed::ok(20))]);
        let rehydrated = rehydrate_all(&placeholders, &ResumeOptions::default())
            .await
            .unwrap();
        assert!(rehydrated.is_complete());
        assert_eq!(
            *rehydrated.downcast::<Duration>("b").unwrap(),
            Duration::from_millis(20)
        );
    }

    #[tokio::test]
    async fn test_abort_cancels_the_rest() {
        let placeholders = named(vec![
            ("broken", Delayed::failing(5)),
            ("slow", Delayed::ok(10_000)),
        ]);
        let result = rehydrate_all(&placeholders, &ResumeOptions::default()).await;
        assert!(matches!(
            result,
            Err(RuntimeError::Rehydration { ref name, .. }) if name == "broken"
        ));
        assert_eq!(placeholders["broken"].state(), PlaceholderState::Failed);
        assert_eq!(placeholders["slow"].state(), PlaceholderState::Cancelled);
    }

    #[tokio::test]
    async fn test_tolerate_collects_failures() {
        let placeholders = named(vec![("broken", Delayed::failing(5)), ("ok", Delayed::ok(5))]);
        let options = ResumeOptions::default().with_policy(ResumePolicy::TolerateFailures);
        let rehydrated = rehydrate_all(&placeholders, &options).await.unwrap();

        assert!(!rehydrated.is_complete());
        assert!(rehydrated.get("ok").is_some());
        assert_eq!(
            rehydrated.failures["broken"],
            RehydrationError::Missing("gone".to_string())
        );
    }

    #[tokio::test]
    async fn test_timeout_cancels_outstanding() {
        let placeholders = named(vec![("fast", Delayed::ok(1)), ("stalled", Delayed::ok(60_000))]);
        let options = ResumeOptions::default().with_timeout(Some(Duration::from_millis(50)));
        let result = rehydrate_all(&placeholders, &options).await;

        assert!(matches!(result, Err(RuntimeError::TimedOut(_))));
        assert_eq!(placeholders["fast"].state(), PlaceholderState::Resolved);
        assert_eq!(placeholders["stalled"].state(), PlaceholderState::Cancelled);
    }

    #[tokio::test]
    async fn test_no_placeholders() {
        let rehydrated = rehydrate_all(&BTreeMap::new(), &ResumeOptions::default())
            .await
            .unwrap();
        assert!(rehydrated.resources.is_empty());
        assert!(rehydrated.is_complete());
    }
}
