//! Single-fulfillment results of asynchronous rehydration.
//!
//! A [`PendingResource`] is handed out by
//! [`Placeholder::begin_rehydrate`](crate::placeholder::Placeholder::begin_rehydrate)
//! before the resource exists. It settles exactly once, into a value, a
//! [`RehydrationError`], or cancellation, and every clone of it (every waiter)
//! observes that same outcome.

use crate::error::RehydrationError;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// A reconstructed live resource, type-erased so resources of different kinds
/// can be collected together.
#[derive(Clone)]
pub struct LiveResource(Arc<dyn Any + Send + Sync>);

impl LiveResource {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self(value)
    }

    /// The resource as its concrete type, if it is one.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.0).downcast::<T>().ok()
    }

    pub fn is<T: Any>(&self) -> bool {
        self.0.is::<T>()
    }
}

impl fmt::Debug for LiveResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveResource").finish_non_exhaustive()
    }
}

/// Observable state of a [`PendingResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RehydrationState {
    /// Reconstruction is still running.
    Requested,
    Resolved,
    Failed,
    Cancelled,
}

impl RehydrationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RehydrationState::Requested)
    }
}

enum Slot<T> {
    Pending,
    Resolved(T),
    Failed(RehydrationError),
    Cancelled,
}

impl<T> Slot<T> {
    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending)
    }

    fn state(&self) -> RehydrationState {
        match self {
            Slot::Pending => RehydrationState::Requested,
            Slot::Resolved(_) => RehydrationState::Resolved,
            Slot::Failed(_) => RehydrationState::Failed,
            Slot::Cancelled => RehydrationState::Cancelled,
        }
    }
}

/// A resource that is being reconstructed.
///
/// Cheap to clone; clones share the same outcome.
pub struct PendingResource<T = LiveResource> {
    slot: Arc<watch::Sender<Slot<T>>>,
}

/// The completing side of a [`PendingResource`].
///
/// Dropping it without completing fails the pending resource with
/// [`RehydrationError::Abandoned`], so waiters never hang.
pub struct Completer<T = LiveResource> {
    slot: Arc<watch::Sender<Slot<T>>>,
}

impl<T> PendingResource<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a pending resource together with the handle that completes it.
    pub fn channel() -> (Self, Completer<T>) {
        let (tx, _rx) = watch::channel(Slot::Pending);
        let slot = Arc::new(tx);
        (
            Self {
                slot: Arc::clone(&slot),
            },
            Completer { slot },
        )
    }

    /// Run `work` on a detached task and return its pending result immediately.
    ///
    /// Cancelling the returned resource drops `work` at its next suspension
    /// point. Without a tokio runtime in scope the result fails with
    /// [`RehydrationError::NoRuntime`].
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Result<T, RehydrationError>> + Send + 'static,
    {
        let (pending, completer) = Self::channel();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let mut settled = pending.slot.subscribe();
                runtime.spawn(async move {
                    tokio::select! {
                        result = work => {
                            completer.complete(result);
                        }
                        _ = wait_settled(&mut settled) => {
                            tracing::trace!("Rehydration work dropped after cancellation");
                        }
                    }
                });
            }
            Err(_) => {
                completer.complete(Err(RehydrationError::NoRuntime));
            }
        }
        pending
    }

    /// An already resolved resource.
    pub fn resolved(value: T) -> Self {
        let (pending, completer) = Self::channel();
        completer.complete(Ok(value));
        pending
    }

    /// An already failed resource.
    pub fn failed(error: RehydrationError) -> Self {
        let (pending, completer) = Self::channel();
        completer.complete(Err(error));
        pending
    }

    pub fn state(&self) -> RehydrationState {
        self.slot.borrow().state()
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Cancel the reconstruction.
    ///
    /// Returns `true` if this call cancelled it, `false` if it had already
    /// settled (in which case the settled outcome is left untouched).
    pub fn cancel(&self) -> bool {
        let cancelled = self.slot.send_if_modified(|slot| {
            if slot.is_pending() {
                *slot = Slot::Cancelled;
                true
            } else {
                false
            }
        });
        if cancelled {
            tracing::debug!("Rehydration cancelled");
        }
        cancelled
    }

    /// Wait for the outcome.
    ///
    /// A cancelled resource yields [`RehydrationError::Cancelled`].
    pub async fn wait(&self) -> Result<T, RehydrationError> {
        let mut rx = self.slot.subscribe();
        let slot = rx
            .wait_for(|slot| !slot.is_pending())
            .await
            .map_err(|_| RehydrationError::Abandoned)?;
        match &*slot {
            Slot::Resolved(value) => Ok(value.clone()),
            Slot::Failed(error) => Err(error.clone()),
            Slot::Cancelled => Err(RehydrationError::Cancelled),
            Slot::Pending => Err(RehydrationError::Abandoned),
        }
    }
}

impl<T> Clone for PendingResource<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> fmt::Debug for PendingResource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResource")
            .field("state", &self.slot.borrow().state())
            .finish()
    }
}

impl<T> Completer<T> {
    /// Deliver the outcome.
    ///
    /// Returns `false` without changing anything if the resource already
    /// settled or was cancelled.
    pub fn complete(&self, result: Result<T, RehydrationError>) -> bool {
        self.slot.send_if_modified(|slot| {
            if !slot.is_pending() {
                return false;
            }
            *slot = match result {
                Ok(value) => Slot::Resolved(value),
                Err(error) => Slot::Failed(error),
            };
            true
        })
    }

    /// Whether the pending side was cancelled; long reconstructions may poll
    /// this to stop early.
    pub fn is_cancelled(&self) -> bool {
        matches!(*self.slot.borrow(), Slot::Cancelled)
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        let abandoned = self.slot.send_if_modified(|slot| {
            if slot.is_pending() {
                *slot = Slot::Failed(RehydrationError::Abandoned);
                true
            } else {
                false
            }
        });
        if abandoned {
            tracing::warn!("Rehydration completer dropped without an outcome");
        }
    }
}

async fn wait_settled<T>(rx: &mut watch::Receiver<Slot<T>>) {
    let _ = rx.wait_for(|slot| !slot.is_pending()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_waiters_see_same_outcome() {
        let (pending, completer) = PendingResource::<u32>::channel();

        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let pending = pending.clone();
                tokio::spawn(async move { pending.wait().await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(completer.complete(Ok(7)));

        for waiter in waiters {
            assert_eq!(waiter.await.unwrap(), Ok(7));
        }
        assert_eq!(pending.state(), RehydrationState::Resolved);
    }

    #[tokio::test]
    async fn test_second_completion_is_noop() {
        let (pending, completer) = PendingResource::<u32>::channel();
        assert!(completer.complete(Err(RehydrationError::Missing("a".to_string()))));
        assert!(!completer.complete(Ok(1)));
        assert_eq!(
            pending.wait().await,
            Err(RehydrationError::Missing("a".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancel_before_completion_blocks_delivery() {
        let (pending, completer) = PendingResource::<u32>::channel();
        let waiter = {
            let pending = pending.clone();
            tokio::spawn(async move { pending.wait().await })
        };
        tokio::task::yield_now().await;

        assert!(pending.cancel());
        assert!(!completer.complete(Ok(3)));
        assert!(completer.is_cancelled());

        assert_eq!(waiter.await.unwrap(), Err(RehydrationError::Cancelled));
        assert_eq!(pending.state(), RehydrationState::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_has_no_effect() {
        let pending = PendingResource::resolved(5u32);
        assert!(!pending.cancel());
        assert_eq!(pending.state(), RehydrationState::Resolved);
        assert_eq!(pending.wait().await, Ok(5));
    }

    #[tokio::test]
    async fn test_spawn_returns_before_work_finishes() {
        let started = Instant::now();
        let pending = PendingResource::spawn(async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, RehydrationError>(1u32)
        });
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(pending.state(), RehydrationState::Requested);
        assert!(pending.cancel());
    }

    #[tokio::test]
    async fn test_spawned_failure_is_delivered_not_returned() {
        let pending: PendingResource<u32> =
            PendingResource::spawn(async { Err(RehydrationError::Malformed("x".to_string())) });
        assert_eq!(
            pending.wait().await,
            Err(RehydrationError::Malformed("x".to_string()))
        );
    }

    #[tokio::test]
    async fn test_cancel_drops_spawned_work() {
        let dropped = Arc::new(AtomicBool::new(false));
        let guard = SetOnDrop(Arc::clone(&dropped));
        let pending = PendingResource::spawn(async move {
            let _guard = guard;
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, RehydrationError>(0u32)
        });

        tokio::task::yield_now().await;
        assert!(pending.cancel());

        tokio::time::timeout(Duration::from_secs(5), async {
            while !dropped.load(Ordering::SeqCst) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_completer_abandons() {
        let (pending, completer) = PendingResource::<u32>::channel();
        drop(completer);
        assert_eq!(pending.wait().await, Err(RehydrationError::Abandoned));
    }

    #[test]
    fn test_spawn_without_runtime() {
        let pending = PendingResource::spawn(async { Ok::<_, RehydrationError>(1u32) });
        assert_eq!(pending.state(), RehydrationState::Failed);
    }

    #[test]
    fn test_live_resource_downcast() {
        let resource = LiveResource::new(String::from("conn"));
        assert!(resource.is::<String>());
        assert_eq!(resource.downcast::<String>().unwrap().as_str(), "conn");
        assert!(resource.downcast::<u32>().is_none());
    }
}
