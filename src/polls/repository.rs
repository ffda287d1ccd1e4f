//! Poll Repository
//!
//! Maps polls and ledgers onto store keys and JSON records.
//!
//! Key scheme:
//! - `poll_<poll_id>` holds the poll definition
//! - `poll_<poll_id>_vote` holds the vote ledger
//!
//! Poll ids are lowercase alphanumeric, so no id can name another poll's
//! ledger. Anything else is treated as an unknown poll.

use super::error::{PollError, Result};
use super::model::{NewPoll, Poll, VoteLedger};
use crate::store::{KeyValueStore, StoreError};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// Longest poll id accepted on lookup; generated ids are 32 hex chars
pub const MAX_POLL_ID_LEN: usize = 64;

/// Whether `poll_id` could have been issued by [`PollRepository::create`]
pub fn is_valid_poll_id(poll_id: &str) -> bool {
    !poll_id.is_empty()
        && poll_id.len() <= MAX_POLL_ID_LEN
        && poll_id
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
}

fn check_poll_id(poll_id: &str) -> Result<()> {
    if is_valid_poll_id(poll_id) {
        Ok(())
    } else {
        Err(PollError::NotFound(poll_id.to_string()))
    }
}

/// Store key of a poll record
pub fn poll_key(poll_id: &str) -> String {
    format!("poll_{}", poll_id)
}

/// Store key of a poll's ledger record
pub fn ledger_key(poll_id: &str) -> String {
    format!("poll_{}_vote", poll_id)
}

/// Result of removing a poll
#[derive(Debug)]
pub enum RemoveOutcome {
    /// Poll and ledger are both gone
    Complete,
    /// The poll is gone but its ledger could not be deleted
    LedgerRetained(StoreError),
}

impl RemoveOutcome {
    /// Whether the ledger was left behind
    pub fn ledger_retained(&self) -> bool {
        matches!(self, RemoveOutcome::LedgerRetained(_))
    }
}

/// Ledger bytes as read from the store, kept for conditional writes
#[derive(Debug, Clone)]
pub struct VersionedLedger {
    pub ledger: VoteLedger,
    pub raw: Vec<u8>,
}

/// Reads and writes poll records
#[derive(Clone)]
pub struct PollRepository {
    store: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for PollRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollRepository").finish_non_exhaustive()
    }
}

impl PollRepository {
    /// Create a repository over `store`
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persist a new poll and its empty ledger, returning the stored poll.
    ///
    /// The ledger is written first. A poll record is what makes a poll
    /// reachable, so a failure before it lands leaves nothing visible; the
    /// stray ledger is removed best-effort.
    pub async fn create(&self, new_poll: NewPoll) -> Result<Poll> {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let poll = new_poll.into_poll(id, Utc::now());

        let poll_bytes = encode(&poll_key(&poll.id), &poll)?;
        let ledger_bytes = encode(&ledger_key(&poll.id), &VoteLedger::new())?;

        self.store.set(&ledger_key(&poll.id), ledger_bytes).await?;
        if let Err(e) = self.store.set(&poll_key(&poll.id), poll_bytes).await {
            if let Err(cleanup) = self.store.delete(&ledger_key(&poll.id)).await {
                tracing::warn!(
                    poll_id = %poll.id,
                    error = %cleanup,
                    "Failed to clean up ledger after poll write failure"
                );
            }
            return Err(e.into());
        }

        tracing::debug!(poll_id = %poll.id, options = poll.options.len(), "Stored poll");
        Ok(poll)
    }

    /// Load a poll definition
    pub async fn read_poll(&self, poll_id: &str) -> Result<Poll> {
        check_poll_id(poll_id)?;
        let key = poll_key(poll_id);
        let bytes = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| PollError::NotFound(poll_id.to_string()))?;
        decode(&key, &bytes)
    }

    /// Load a poll's ledger
    pub async fn read_ledger(&self, poll_id: &str) -> Result<VoteLedger> {
        Ok(self.read_ledger_versioned(poll_id).await?.ledger)
    }

    /// Load a poll's ledger together with the raw bytes it was decoded from
    pub async fn read_ledger_versioned(&self, poll_id: &str) -> Result<VersionedLedger> {
        check_poll_id(poll_id)?;
        let key = ledger_key(poll_id);
        let raw = self
            .store
            .get(&key)
            .await?
            .ok_or_else(|| PollError::NotFound(poll_id.to_string()))?;
        let ledger = decode(&key, &raw)?;
        Ok(VersionedLedger { ledger, raw })
    }

    /// Load the ledger of a poll that is expected to exist.
    ///
    /// A missing ledger next to a present poll record means a creation or
    /// removal was interrupted; that is reported as a corrupt record rather
    /// than treated as an empty ledger. If the poll record is gone too the
    /// poll simply does not exist.
    pub async fn load_ledger(&self, poll_id: &str) -> Result<VersionedLedger> {
        match self.read_ledger_versioned(poll_id).await {
            Err(PollError::NotFound(_)) => {
                self.read_poll(poll_id).await?;
                tracing::warn!(poll_id = %poll_id, "Poll record has no ledger");
                Err(PollError::CorruptRecord {
                    key: ledger_key(poll_id),
                    reason: "ledger missing for existing poll".to_string(),
                })
            }
            other => other,
        }
    }

    /// Overwrite a poll's ledger
    pub async fn write_ledger(&self, poll_id: &str, ledger: &VoteLedger) -> Result<()> {
        check_poll_id(poll_id)?;
        let key = ledger_key(poll_id);
        let bytes = encode(&key, ledger)?;
        self.store.set(&key, bytes).await?;
        Ok(())
    }

    /// Replace a poll's ledger only if it still holds `expected` bytes.
    ///
    /// Returns `false` when another writer got there first.
    pub async fn swap_ledger(
        &self,
        poll_id: &str,
        expected: &[u8],
        ledger: &VoteLedger,
    ) -> Result<bool> {
        check_poll_id(poll_id)?;
        let key = ledger_key(poll_id);
        let bytes = encode(&key, ledger)?;
        Ok(self
            .store
            .compare_and_swap(&key, Some(expected), bytes)
            .await?)
    }

    /// Remove a poll and its ledger.
    ///
    /// Failing to remove the poll record is an error. Failing to remove the
    /// ledger afterwards is reported through the outcome.
    pub async fn delete(&self, poll: &Poll) -> Result<RemoveOutcome> {
        self.store.delete(&poll_key(&poll.id)).await?;

        match self.store.delete(&ledger_key(&poll.id)).await {
            Ok(()) => Ok(RemoveOutcome::Complete),
            Err(e) => {
                tracing::warn!(poll_id = %poll.id, error = %e, "Poll removed but ledger was retained");
                Ok(RemoveOutcome::LedgerRetained(e))
            }
        }
    }
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| PollError::CorruptRecord {
        key: key.to_string(),
        reason: format!("failed to encode: {}", e),
    })
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| PollError::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
