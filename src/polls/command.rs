//! Poll command parsing
//!
//! Turns slash-command text such as
//! `/poll "Lunch?" "Pizza" "Salad"` into a [`NewPoll`]. The first quoted
//! segment is the question, each further segment is one option.

use super::error::{PollError, Result};
use super::model::NewPoll;

/// Trigger word accepted in front of the quoted segments
pub const TRIGGER: &str = "/poll";

const SEGMENT_SEPARATOR: &str = "\" \"";

/// Parse command text into an unsaved poll
pub fn parse_command(text: &str) -> Result<NewPoll> {
    let body = text.trim();
    // The trigger is a whole word; `/pollster` is not `/poll`
    let body = match body.strip_prefix(TRIGGER) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim(),
        _ => body,
    };

    let body = match body.strip_prefix('"') {
        Some(quoted) if !quoted.trim().is_empty() => quoted.strip_suffix('"').unwrap_or(quoted),
        _ => {
            return Err(PollError::InputValidation(format!(
                "expected a quoted question followed by quoted options, got '{}'",
                text.trim()
            )))
        }
    };

    let mut segments = body.split(SEGMENT_SEPARATOR);
    let question = segments.next().unwrap_or_default().to_string();
    let options: Vec<String> = segments.map(str::to_string).collect();

    if options.is_empty() {
        return Err(PollError::InputValidation(
            "poll needs at least one option".to_string(),
        ));
    }
    if question.trim().is_empty() {
        return Err(PollError::InputValidation(
            "poll question is required".to_string(),
        ));
    }
    if options.iter().any(|o| o.trim().is_empty()) {
        return Err(PollError::InputValidation(
            "poll options cannot be empty".to_string(),
        ));
    }

    Ok(NewPoll::new(question, options))
}
