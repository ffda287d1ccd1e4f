//! Poll data model
//!
//! Polls, their options, the per-poll vote ledger and the derived tally.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One selectable choice within a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// Option ID (ordinal position, unique within the poll)
    pub id: String,
    /// Display label
    pub text: String,
}

impl PollOption {
    /// Create a new poll option
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// A stored poll definition
///
/// Field names match the stored record layout so existing data keeps
/// loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    /// Poll ID, assigned at creation
    #[serde(rename = "poll_id")]
    pub id: String,
    /// The question
    #[serde(rename = "poll_text")]
    pub text: String,
    /// Creation time, stored as Unix nanoseconds
    #[serde(with = "chrono::serde::ts_nanoseconds")]
    pub created_at: DateTime<Utc>,
    /// Options in display order
    #[serde(alias = "Options")]
    pub options: Vec<PollOption>,
}

impl Poll {
    /// Look up an option by ID
    pub fn option(&self, option_id: &str) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Whether `option_id` names one of this poll's options
    pub fn has_option(&self, option_id: &str) -> bool {
        self.option(option_id).is_some()
    }
}

/// A poll as handed over by the command parser, before an ID is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPoll {
    /// The question
    pub text: String,
    /// Option labels in display order
    pub option_texts: Vec<String>,
}

impl NewPoll {
    /// Create a new unsaved poll
    pub fn new<I, S>(text: impl Into<String>, option_texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            text: text.into(),
            option_texts: option_texts.into_iter().map(Into::into).collect(),
        }
    }

    /// Turn into a `Poll`, numbering options by position
    pub(crate) fn into_poll(self, id: String, created_at: DateTime<Utc>) -> Poll {
        let options = self
            .option_texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PollOption::new(i.to_string(), text))
            .collect();
        Poll {
            id,
            text: self.text,
            created_at,
            options,
        }
    }
}

/// Current vote of every voter in one poll (voter_id -> option_id)
///
/// At most one entry per voter; a later vote replaces the earlier one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoteLedger {
    votes: BTreeMap<String, String>,
}

impl VoteLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `voter_id` currently holds a vote
    pub fn contains(&self, voter_id: &str) -> bool {
        self.votes.contains_key(voter_id)
    }

    /// Option currently held by `voter_id`
    pub fn choice_of(&self, voter_id: &str) -> Option<&str> {
        self.votes.get(voter_id).map(String::as_str)
    }

    /// Record a vote, returning the option it replaced
    pub fn record(
        &mut self,
        voter_id: impl Into<String>,
        option_id: impl Into<String>,
    ) -> Option<String> {
        self.votes.insert(voter_id.into(), option_id.into())
    }

    /// Number of voters
    pub fn len(&self) -> usize {
        self.votes.len()
    }

    /// Whether nobody has voted
    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Iterate `(voter_id, option_id)` pairs in voter order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.votes.iter().map(|(v, o)| (v.as_str(), o.as_str()))
    }
}

impl<V: Into<String>, O: Into<String>> FromIterator<(V, O)> for VoteLedger {
    fn from_iter<T: IntoIterator<Item = (V, O)>>(iter: T) -> Self {
        Self {
            votes: iter
                .into_iter()
                .map(|(v, o)| (v.into(), o.into()))
                .collect(),
        }
    }
}

/// Voters holding one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TallyEntry {
    /// Option ID
    pub option_id: String,
    /// Voter IDs, sorted
    pub voters: Vec<String>,
}

/// Voters grouped by the option they hold
///
/// Derived from a ledger on demand and never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Entries in poll option order, followed by any unknown option IDs
    pub entries: Vec<TallyEntry>,
}

impl Tally {
    /// Voters for `option_id`, `None` if the tally has no such entry
    pub fn voters(&self, option_id: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.option_id == option_id)
            .map(|e| e.voters.as_slice())
    }

    /// Total number of votes counted
    pub fn total_votes(&self) -> usize {
        self.entries.iter().map(|e| e.voters.len()).sum()
    }
}
