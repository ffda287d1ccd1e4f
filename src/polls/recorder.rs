//! Vote Recorder
//!
//! Read-modify-write of a poll's ledger. The store only offers independent
//! get/set, so every update for one poll goes through a serialization
//! point: an in-process lock per poll id, or a compare-and-swap retry loop
//! on stores that support conditional writes.

use super::error::{PollError, Result};
use super::repository::PollRepository;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Default retry budget for optimistic updates
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How concurrent ledger updates are serialised
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStrategy {
    /// One async mutex per poll id. Sufficient when a single process owns the store.
    #[default]
    Lock,
    /// Compare-and-swap against the ledger bytes read, retried up to a bound.
    Optimistic,
}

/// Per-poll async locks, created on demand
#[derive(Debug, Default)]
pub struct PollLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl PollLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `poll_id`
    pub async fn acquire(&self, poll_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // An entry only the table references has no holder and no waiter.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(poll_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of polls with a holder or waiter right now
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|lock| Arc::strong_count(lock) > 1)
            .count()
    }
}

/// Records votes into poll ledgers
#[derive(Debug, Clone)]
pub struct VoteRecorder {
    repo: PollRepository,
    locks: Arc<PollLocks>,
    strategy: VoteStrategy,
    max_attempts: u32,
}

impl VoteRecorder {
    /// Create a recorder using per-poll locks
    pub fn new(repo: PollRepository) -> Self {
        Self {
            repo,
            locks: Arc::new(PollLocks::new()),
            strategy: VoteStrategy::Lock,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Set the update strategy
    pub fn with_strategy(mut self, strategy: VoteStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the optimistic retry budget (at least one attempt is always made)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Active strategy
    pub fn strategy(&self) -> VoteStrategy {
        self.strategy
    }

    /// Lock table shared with anything else that mutates ledgers
    pub fn locks(&self) -> &Arc<PollLocks> {
        &self.locks
    }

    /// Hold off ledger updates for `poll_id` while the guard lives.
    ///
    /// Only the lock strategy needs this; optimistic writers notice changes
    /// on their own.
    pub async fn exclusive(&self, poll_id: &str) -> Option<OwnedMutexGuard<()>> {
        match self.strategy {
            VoteStrategy::Lock => Some(self.locks.acquire(poll_id).await),
            VoteStrategy::Optimistic => None,
        }
    }

    /// Record `voter_id`'s choice of `option_id` in `poll_id`.
    ///
    /// Returns `true` when the voter already had a vote that was replaced.
    pub async fn record_vote(&self, poll_id: &str, option_id: &str, voter_id: &str) -> Result<bool> {
        if voter_id.trim().is_empty() {
            return Err(PollError::InputValidation("voter id is required".to_string()));
        }

        let was_update = match self.strategy {
            VoteStrategy::Lock => self.record_locked(poll_id, option_id, voter_id).await?,
            VoteStrategy::Optimistic => {
                self.record_optimistic(poll_id, option_id, voter_id).await?
            }
        };

        tracing::info!(
            poll_id = %poll_id,
            voter_id = %voter_id,
            option_id = %option_id,
            was_update,
            "Recorded vote"
        );
        Ok(was_update)
    }

    async fn record_locked(&self, poll_id: &str, option_id: &str, voter_id: &str) -> Result<bool> {
        let _guard = self.locks.acquire(poll_id).await;

        self.check_option(poll_id, option_id).await?;
        let mut ledger = self.repo.load_ledger(poll_id).await?.ledger;
        let was_update = ledger.record(voter_id, option_id).is_some();
        self.repo.write_ledger(poll_id, &ledger).await?;

        Ok(was_update)
    }

    async fn record_optimistic(
        &self,
        poll_id: &str,
        option_id: &str,
        voter_id: &str,
    ) -> Result<bool> {
        self.check_option(poll_id, option_id).await?;

        for attempt in 1..=self.max_attempts {
            let mut current = self.repo.load_ledger(poll_id).await?;
            let was_update = current.ledger.record(voter_id, option_id).is_some();

            if self
                .repo
                .swap_ledger(poll_id, &current.raw, &current.ledger)
                .await?
            {
                return Ok(was_update);
            }

            tracing::warn!(
                poll_id = %poll_id,
                voter_id = %voter_id,
                attempt,
                max_attempts = self.max_attempts,
                "Ledger changed during vote, retrying"
            );
            tokio::task::yield_now().await;
        }

        Err(PollError::Contention {
            poll_id: poll_id.to_string(),
            attempts: self.max_attempts,
        })
    }

    async fn check_option(&self, poll_id: &str, option_id: &str) -> Result<()> {
        let poll = self.repo.read_poll(poll_id).await?;
        if !poll.has_option(option_id) {
            return Err(PollError::InvalidOption {
                poll_id: poll_id.to_string(),
                option_id: option_id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polls::model::{NewPoll, Poll};
    use crate::polls::repository::{ledger_key, poll_key};
    use crate::store::{KeyValueStore, MemoryStore, StoreError};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Store that pauses between request and response to widen race windows
    struct SlowStore {
        inner: MemoryStore,
        delay: Duration,
    }

    #[async_trait]
    impl KeyValueStore for SlowStore {
        async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
            let value = self.inner.get(key).await;
            tokio::time::sleep(self.delay).await;
            value
        }

        async fn set(&self, key: &str, value: Vec<u8>) -> std::result::Result<(), StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> std::result::Result<(), StoreError> {
            self.inner.delete(key).await
        }

        async fn compare_and_swap(
            &self,
            key: &str,
            expected: Option<&[u8]>,
            value: Vec<u8>,
        ) -> std::result::Result<bool, StoreError> {
            tokio::time::sleep(self.delay).await;
            self.inner.compare_and_swap(key, expected, value).await
        }
    }

    /// Store whose conditional writes always lose
    struct AlwaysStaleStore(MemoryStore);

    #[async_trait]
    impl KeyValueStore for AlwaysStaleStore {
        async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: Vec<u8>) -> std::result::Result<(), StoreError> {
            self.0.set(key, value).await
        }

        async fn delete(&self, key: &str) -> std::result::Result<(), StoreError> {
            self.0.delete(key).await
        }

        async fn compare_and_swap(
            &self,
            _key: &str,
            _expected: Option<&[u8]>,
            _value: Vec<u8>,
        ) -> std::result::Result<bool, StoreError> {
            Ok(false)
        }
    }

    async fn setup(store: Arc<dyn KeyValueStore>) -> (PollRepository, Poll) {
        let repo = PollRepository::new(store);
        let poll = repo
            .create(NewPoll::new("Lunch?", ["Pizza", "Salad"]))
            .await
            .unwrap();
        (repo, poll)
    }

    fn slow_store() -> Arc<dyn KeyValueStore> {
        Arc::new(SlowStore {
            inner: MemoryStore::new(),
            delay: Duration::from_millis(2),
        })
    }

    #[tokio::test]
    async fn test_first_vote_then_change() {
        for strategy in [VoteStrategy::Lock, VoteStrategy::Optimistic] {
            let (repo, poll) = setup(Arc::new(MemoryStore::new())).await;
            let recorder = VoteRecorder::new(repo.clone()).with_strategy(strategy);

            assert!(!recorder.record_vote(&poll.id, "0", "userA").await.unwrap());
            let ledger = repo.read_ledger(&poll.id).await.unwrap();
            assert_eq!(ledger.choice_of("userA"), Some("0"));

            assert!(recorder.record_vote(&poll.id, "1", "userA").await.unwrap());
            let ledger = repo.read_ledger(&poll.id).await.unwrap();
            assert_eq!(ledger.len(), 1);
            assert_eq!(ledger.choice_of("userA"), Some("1"));
        }
    }

    #[tokio::test]
    async fn test_vote_on_unknown_poll() {
        let (repo, _) = setup(Arc::new(MemoryStore::new())).await;
        let recorder = VoteRecorder::new(repo);
        assert!(matches!(
            recorder.record_vote("missing", "0", "u").await,
            Err(PollError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_vote_for_unknown_option() {
        let (repo, poll) = setup(Arc::new(MemoryStore::new())).await;
        let recorder = VoteRecorder::new(repo.clone());

        let err = recorder.record_vote(&poll.id, "5", "u").await.unwrap_err();
        assert!(matches!(err, PollError::InvalidOption { ref option_id, .. } if option_id == "5"));
        assert!(repo.read_ledger(&poll.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vote_requires_voter() {
        let (repo, poll) = setup(Arc::new(MemoryStore::new())).await;
        let recorder = VoteRecorder::new(repo);
        assert!(matches!(
            recorder.record_vote(&poll.id, "0", "  ").await,
            Err(PollError::InputValidation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_ledger_is_corrupt_not_empty() {
        let store = Arc::new(MemoryStore::new());
        let (repo, poll) = setup(store.clone()).await;
        store.delete(&ledger_key(&poll.id)).await.unwrap();

        let recorder = VoteRecorder::new(repo);
        match recorder.record_vote(&poll.id, "0", "u").await {
            Err(PollError::CorruptRecord { key, .. }) => assert_eq!(key, ledger_key(&poll.id)),
            other => panic!("expected corrupt record, got {:?}", other),
        }
        assert!(!store.contains_key(&ledger_key(&poll.id)));
    }

    #[tokio::test]
    async fn test_vote_after_poll_removed() {
        let store = Arc::new(MemoryStore::new());
        let (repo, poll) = setup(store.clone()).await;
        store.delete(&poll_key(&poll.id)).await.unwrap();
        store.delete(&ledger_key(&poll.id)).await.unwrap();

        let recorder = VoteRecorder::new(repo).with_strategy(VoteStrategy::Optimistic);
        assert!(matches!(
            recorder.record_vote(&poll.id, "0", "u").await,
            Err(PollError::NotFound(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_voters_are_all_kept() {
        for strategy in [VoteStrategy::Lock, VoteStrategy::Optimistic] {
            let (repo, poll) = setup(slow_store()).await;
            let recorder = VoteRecorder::new(repo.clone())
                .with_strategy(strategy)
                .with_max_attempts(64);

            let mut handles = Vec::new();
            for i in 0..24 {
                let recorder = recorder.clone();
                let poll_id = poll.id.clone();
                handles.push(tokio::spawn(async move {
                    let option = (i % 2).to_string();
                    recorder
                        .record_vote(&poll_id, &option, &format!("voter{i}"))
                        .await
                }));
            }
            for handle in handles {
                assert!(!handle.await.unwrap().unwrap());
            }

            let ledger = repo.read_ledger(&poll.id).await.unwrap();
            assert_eq!(ledger.len(), 24, "strategy {:?} lost votes", strategy);
        }
    }

    #[tokio::test]
    async fn test_optimistic_gives_up_after_budget() {
        let (repo, poll) = setup(Arc::new(AlwaysStaleStore(MemoryStore::new()))).await;
        let recorder = VoteRecorder::new(repo.clone())
            .with_strategy(VoteStrategy::Optimistic)
            .with_max_attempts(3);

        match recorder.record_vote(&poll.id, "0", "u").await {
            Err(PollError::Contention { attempts, .. }) => assert_eq!(attempts, 3),
            other => panic!("expected contention, got {:?}", other),
        }
        assert!(repo.read_ledger(&poll.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_optimistic_needs_conditional_writes() {
        struct NoCasStore(MemoryStore);

        #[async_trait]
        impl KeyValueStore for NoCasStore {
            async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
                self.0.get(key).await
            }
            async fn set(&self, key: &str, value: Vec<u8>) -> std::result::Result<(), StoreError> {
                self.0.set(key, value).await
            }
            async fn delete(&self, key: &str) -> std::result::Result<(), StoreError> {
                self.0.delete(key).await
            }
        }

        let (repo, poll) = setup(Arc::new(NoCasStore(MemoryStore::new()))).await;
        let recorder = VoteRecorder::new(repo).with_strategy(VoteStrategy::Optimistic);
        assert!(matches!(
            recorder.record_vote(&poll.id, "0", "u").await,
            Err(PollError::Persistence(StoreError::Unsupported(_)))
        ));
    }

    #[tokio::test]
    async fn test_polls_do_not_share_locks() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let repo = PollRepository::new(store);
        let a = repo.create(NewPoll::new("A?", ["x"])).await.unwrap();
        let b = repo.create(NewPoll::new("B?", ["y"])).await.unwrap();
        let recorder = VoteRecorder::new(repo);

        let _held = recorder.exclusive(&a.id).await.expect("lock strategy hands out guards");
        let vote = tokio::time::timeout(
            Duration::from_secs(1),
            recorder.record_vote(&b.id, "0", "u"),
        )
        .await;
        assert!(!vote.expect("vote on another poll must not wait").unwrap());
    }

    #[tokio::test]
    async fn test_lock_table_drains() {
        let (repo, poll) = setup(Arc::new(MemoryStore::new())).await;
        let recorder = VoteRecorder::new(repo);

        recorder.record_vote(&poll.id, "0", "u1").await.unwrap();
        recorder.record_vote(&poll.id, "1", "u2").await.unwrap();
        assert_eq!(recorder.locks().active(), 0);

        let guard = recorder.exclusive(&poll.id).await;
        assert_eq!(recorder.locks().active(), 1);
        drop(guard);
        assert_eq!(recorder.locks().active(), 0);
    }

    #[test]
    fn test_strategy_serialization() {
        let json = serde_json::to_string(&VoteStrategy::Optimistic).unwrap();
        assert_eq!(json, "\"optimistic\"");
        let parsed: VoteStrategy = serde_json::from_str("\"lock\"").unwrap();
        assert_eq!(parsed, VoteStrategy::Lock);
    }
}
