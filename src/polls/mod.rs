//! Polling Module
//!
//! Single-choice polls for chat channels: one active vote per user,
//! changeable until the poll is removed, tallied on demand.

pub mod command;
pub mod error;
pub mod model;
pub mod recorder;
pub mod render;
pub mod repository;
pub mod service;
pub mod tally;

pub use command::parse_command;
pub use error::{PollError, Result};
pub use model::{NewPoll, Poll, PollOption, Tally, TallyEntry, VoteLedger};
pub use recorder::{PollLocks, VoteRecorder, VoteStrategy};
pub use repository::{
    is_valid_poll_id, ledger_key, poll_key, PollRepository, RemoveOutcome, MAX_POLL_ID_LEN,
};
pub use service::PollService;
pub use tally::tally;
