//! Poll Service
//!
//! Lifecycle entry point for callers: create, look up, vote, end and remove
//! polls. Composes the repository, the vote recorder and the tally engine.

use super::error::{PollError, Result};
use super::model::{NewPoll, Poll, Tally, VoteLedger};
use super::recorder::{VoteRecorder, VoteStrategy};
use super::repository::{PollRepository, RemoveOutcome};
use super::tally::tally;
use crate::store::KeyValueStore;
use std::sync::Arc;

/// Upper bound on options per poll
pub const MAX_OPTIONS: usize = 50;

/// Poll lifecycle controller
#[derive(Debug, Clone)]
pub struct PollService {
    repo: PollRepository,
    recorder: VoteRecorder,
}

impl PollService {
    /// Create a service over `store` with default vote handling
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let repo = PollRepository::new(store);
        let recorder = VoteRecorder::new(repo.clone());
        Self { repo, recorder }
    }

    /// Choose how concurrent votes are serialised
    pub fn with_vote_strategy(mut self, strategy: VoteStrategy, max_attempts: u32) -> Self {
        self.recorder = self
            .recorder
            .with_strategy(strategy)
            .with_max_attempts(max_attempts);
        self
    }

    /// Underlying repository
    pub fn repository(&self) -> &PollRepository {
        &self.repo
    }

    /// Underlying vote recorder
    pub fn recorder(&self) -> &VoteRecorder {
        &self.recorder
    }

    /// Validate and persist a new poll with an empty ledger
    pub async fn create(&self, new_poll: NewPoll) -> Result<Poll> {
        validate_new_poll(&new_poll)?;
        let poll = self.repo.create(new_poll).await?;
        tracing::info!(poll_id = %poll.id, options = poll.options.len(), "Created poll");
        Ok(poll)
    }

    /// Fetch a poll definition
    pub async fn get(&self, poll_id: &str) -> Result<Poll> {
        self.repo.read_poll(poll_id).await
    }

    /// Current ledger of a poll
    pub async fn ledger(&self, poll_id: &str) -> Result<VoteLedger> {
        Ok(self.repo.load_ledger(poll_id).await?.ledger)
    }

    /// Record or change a vote; `true` means an earlier vote was replaced
    pub async fn record_vote(&self, poll_id: &str, option_id: &str, voter_id: &str) -> Result<bool> {
        self.recorder.record_vote(poll_id, option_id, voter_id).await
    }

    /// Close out a poll: return it along with its current tally.
    ///
    /// Nothing is written, so ending is repeatable. Votes arriving after an
    /// end are still accepted and show up in the next tally.
    pub async fn end(&self, poll_id: &str) -> Result<(Poll, Tally)> {
        let poll = self.repo.read_poll(poll_id).await?;
        let ledger = self.repo.load_ledger(poll_id).await?.ledger;
        let result = tally(&poll, &ledger);
        tracing::info!(poll_id = %poll_id, votes = result.total_votes(), "Ended poll");
        Ok((poll, result))
    }

    /// Delete a poll and its ledger
    pub async fn remove(&self, poll_id: &str) -> Result<RemoveOutcome> {
        let _guard = self.recorder.exclusive(poll_id).await;
        let poll = self.repo.read_poll(poll_id).await?;
        let outcome = self.repo.delete(&poll).await?;
        tracing::info!(
            poll_id = %poll_id,
            ledger_retained = outcome.ledger_retained(),
            "Removed poll"
        );
        Ok(outcome)
    }
}

fn validate_new_poll(new_poll: &NewPoll) -> Result<()> {
    if new_poll.text.trim().is_empty() {
        return Err(PollError::InputValidation(
            "poll question is required".to_string(),
        ));
    }
    if new_poll.option_texts.is_empty() {
        return Err(PollError::InputValidation(
            "poll needs at least one option".to_string(),
        ));
    }
    if new_poll.option_texts.len() > MAX_OPTIONS {
        return Err(PollError::InputValidation(format!(
            "poll cannot have more than {} options",
            MAX_OPTIONS
        )));
    }
    if let Some(pos) = new_poll.option_texts.iter().position(|t| t.trim().is_empty()) {
        return Err(PollError::InputValidation(format!(
            "option {} has no text",
            pos
        )));
    }
    Ok(())
}
