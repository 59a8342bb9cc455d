//! Blocking gate - suspends callers on an in-flight fetch.
//!
//! A caller that misses either joins the fetch already running for its key or
//! becomes the leader and dispatches a new one. Every waiter is resumed with
//! the single outcome published for that fetch, or with a timeout once its own
//! wait bound elapses. The fetch itself is never cancelled by a waiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

/// Terminal result of one fetch, shared by every waiter.
pub type FetchOutcome = Result<()>;

type OutcomeSlot = Option<FetchOutcome>;

// == Fetch Key ==
/// Identifies one in-flight fetch: a definition instance and its schema key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchKey {
    pub definition_id: u64,
    pub key: String,
}

impl FetchKey {
    pub fn new(definition_id: u64, key: impl Into<String>) -> Self {
        Self {
            definition_id,
            key: key.into(),
        }
    }
}

type InFlight = Arc<Mutex<HashMap<FetchKey, watch::Receiver<OutcomeSlot>>>>;

// == Resolution ==
/// How a successful wait was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// This caller dispatched the fetch
    Led,
    /// This caller waited on a fetch someone else dispatched
    Joined,
}

// == Pending Fetch ==
/// Handed to the dispatched fetch; publishes its outcome exactly once.
///
/// Dropping it unresolved publishes an error, so waiters are never left
/// hanging on a fetch task that panicked.
pub struct PendingFetch {
    key: FetchKey,
    sender: Option<watch::Sender<OutcomeSlot>>,
    in_flight: InFlight,
}

impl PendingFetch {
    /// Clears the in-flight marker, then wakes every waiter with `outcome`.
    pub fn resolve(mut self, outcome: FetchOutcome) {
        self.publish(outcome);
    }

    fn publish(&mut self, outcome: FetchOutcome) {
        if let Some(sender) = self.sender.take() {
            self.in_flight.lock().remove(&self.key);
            sender.send_replace(Some(outcome));
        }
    }
}

impl Drop for PendingFetch {
    fn drop(&mut self) {
        if self.sender.is_some() {
            warn!(key = %self.key.key, "fetch dropped without an outcome");
            self.publish(Err(CacheError::Internal("fetch worker aborted".to_string())));
        }
    }
}

// == Blocking Gate ==
pub struct BlockingGate {
    in_flight: InFlight,
    timeout: Duration,
}

impl BlockingGate {
    pub fn new(timeout: Duration) -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            timeout,
        }
    }

    /// Number of fetches currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Suspends until the fetch for `key` resolves.
    ///
    /// If no fetch is in flight for `key`, `dispatch` is called with the
    /// `PendingFetch` it must eventually resolve. It is called at most once
    /// and before the caller starts waiting.
    pub async fn block_on<F>(&self, key: FetchKey, dispatch: F) -> Result<Resolution>
    where
        F: FnOnce(PendingFetch),
    {
        let (mut receiver, pending) = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&key) {
                Some(receiver) => (receiver.clone(), None),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    in_flight.insert(key.clone(), receiver.clone());
                    let pending = PendingFetch {
                        key: key.clone(),
                        sender: Some(sender),
                        in_flight: Arc::clone(&self.in_flight),
                    };
                    (receiver, Some(pending))
                }
            }
        };

        let resolution = match pending {
            Some(pending) => {
                debug!(key = %key.key, "dispatching fetch");
                dispatch(pending);
                Resolution::Led
            }
            None => {
                debug!(key = %key.key, "joining in-flight fetch");
                Resolution::Joined
            }
        };

        let waited = tokio::time::timeout(self.timeout, async {
            receiver
                .wait_for(Option::is_some)
                .await
                .map(|slot| (*slot).clone())
        })
        .await;

        match waited {
            Ok(Ok(Some(outcome))) => outcome.map(|()| resolution),
            Ok(Ok(None)) | Ok(Err(_)) => Err(CacheError::Internal(
                "fetch finished without an outcome".to_string(),
            )),
            Err(_elapsed) => {
                warn!(key = %key.key, timeout_ms = self.timeout.as_millis() as u64, "timed out waiting for fetch");
                Err(CacheError::Timeout(key.key))
            }
        }
    }
}

impl std::fmt::Debug for BlockingGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingGate")
            .field("in_flight", &self.in_flight())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(name: &str) -> FetchKey {
        FetchKey::new(1, name)
    }

    #[tokio::test]
    async fn test_leader_resolves_success() {
        let gate = BlockingGate::new(Duration::from_secs(1));

        let result = gate
            .block_on(key("k"), |pending| {
                tokio::spawn(async move { pending.resolve(Ok(())) });
            })
            .await;

        assert_eq!(result, Ok(Resolution::Led));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_error_outcome_is_delivered() {
        let gate = BlockingGate::new(Duration::from_secs(1));

        let result = gate
            .block_on(key("k"), |pending| {
                pending.resolve(Err(CacheError::Query("bad query".to_string())));
            })
            .await;

        assert_eq!(result, Err(CacheError::Query("bad query".to_string())));
    }

    #[tokio::test]
    async fn test_timeout_leaves_fetch_running() {
        let gate = BlockingGate::new(Duration::from_millis(50));
        let (park_tx, park_rx) = tokio::sync::oneshot::channel::<PendingFetch>();

        let result = gate
            .block_on(key("slow"), move |pending| {
                let _ = park_tx.send(pending);
            })
            .await;

        assert_eq!(result, Err(CacheError::Timeout("slow".to_string())));
        assert_eq!(gate.in_flight(), 1, "fetch still in flight after timeout");

        let pending = park_rx.await.unwrap();
        pending.resolve(Ok(()));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_dropped_pending_fetch_wakes_waiters() {
        let gate = BlockingGate::new(Duration::from_secs(1));

        let result = gate.block_on(key("k"), drop).await;

        assert!(matches!(result, Err(CacheError::Internal(_))));
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_waiters_share_one_dispatch() {
        let gate = Arc::new(BlockingGate::new(Duration::from_secs(2)));
        let dispatched = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let gate = Arc::clone(&gate);
            let dispatched = Arc::clone(&dispatched);
            handles.push(tokio::spawn(async move {
                gate.block_on(key("shared"), move |pending| {
                    dispatched.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        pending.resolve(Ok(()));
                    });
                })
                .await
            }));
        }

        let mut led = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Resolution::Led => led += 1,
                Resolution::Joined => {}
            }
        }

        assert_eq!(led, 1);
        assert_eq!(dispatched.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_distinct_definitions_do_not_share() {
        let gate = BlockingGate::new(Duration::from_secs(1));

        for definition_id in [1, 2] {
            let result = gate
                .block_on(FetchKey::new(definition_id, "k"), |pending| {
                    pending.resolve(Ok(()))
                })
                .await;
            assert_eq!(result, Ok(Resolution::Led));
        }
    }
}
