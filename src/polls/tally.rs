//! Tally Engine
//!
//! Groups a ledger's voters by the option they hold.

use super::model::{Poll, Tally, TallyEntry, VoteLedger};
use std::collections::BTreeMap;

/// Compute the tally for `poll` from its ledger.
///
/// Every poll option gets an entry, in poll order, even when nobody chose
/// it. Votes for option IDs the poll does not define are kept as trailing
/// entries sorted by option ID, so no ledger pair is ever dropped. Voters
/// within an entry are sorted.
pub fn tally(poll: &Poll, ledger: &VoteLedger) -> Tally {
    let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (voter_id, option_id) in ledger.iter() {
        grouped
            .entry(option_id)
            .or_default()
            .push(voter_id.to_string());
    }

    let mut entries = Vec::with_capacity(poll.options.len());
    for option in &poll.options {
        let voters = grouped.remove(option.id.as_str()).unwrap_or_default();
        entries.push(TallyEntry {
            option_id: option.id.clone(),
            voters,
        });
    }

    if !grouped.is_empty() {
        tracing::warn!(
            poll_id = %poll.id,
            unknown_options = grouped.len(),
            "Ledger holds votes for options the poll does not define"
        );
    }
    entries.extend(grouped.into_iter().map(|(option_id, voters)| TallyEntry {
        option_id: option_id.to_string(),
        voters,
    }));

    for entry in &mut entries {
        entry.voters.sort();
    }

    Tally { entries }
}
