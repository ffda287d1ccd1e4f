//! Outbound chat content
//!
//! Builds the interactive message posted when a poll is created and the
//! texts returned from its button callbacks.

use super::model::{Poll, Tally};
use serde::{Deserialize, Serialize};

/// Author shown on poll attachments
pub const AUTHOR_NAME: &str = "chatpoll";

/// Label of the button that ends a poll
pub const END_POLL_LABEL: &str = "End Poll";

/// Message posted to the channel for a new poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollMessage {
    pub response_type: String,
    pub attachments: Vec<Attachment>,
}

/// Message attachment carrying the question and buttons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub author_name: String,
    pub text: String,
    pub actions: Vec<Action>,
}

/// Interactive button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub integration: Integration,
}

/// Callback target of a button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Integration {
    pub url: String,
}

/// Reply to a button callback
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// Text shown only to the user who clicked
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_text: Option<String>,
    /// Replacement for the original post
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<PostUpdate>,
}

/// New content for an existing post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostUpdate {
    pub message: String,
}

/// Callback URL for voting `option_id` in `poll_id`
pub fn vote_url(base_url: &str, poll_id: &str, option_id: &str) -> String {
    format!(
        "{}/polls/{}/answers/{}/vote",
        base_url.trim_end_matches('/'),
        poll_id,
        option_id
    )
}

/// Callback URL for ending `poll_id`
pub fn end_url(base_url: &str, poll_id: &str) -> String {
    format!("{}/polls/{}/end", base_url.trim_end_matches('/'), poll_id)
}

/// In-channel message for a freshly created poll
pub fn poll_message(poll: &Poll, base_url: &str) -> PollMessage {
    let mut actions: Vec<Action> = poll
        .options
        .iter()
        .map(|option| Action {
            name: option.text.clone(),
            integration: Integration {
                url: vote_url(base_url, &poll.id, &option.id),
            },
        })
        .collect();
    actions.push(Action {
        name: END_POLL_LABEL.to_string(),
        integration: Integration {
            url: end_url(base_url, &poll.id),
        },
    });

    PollMessage {
        response_type: "in_channel".to_string(),
        attachments: vec![Attachment {
            author_name: AUTHOR_NAME.to_string(),
            text: poll.text.clone(),
            actions,
        }],
    }
}

/// Acknowledgement shown to a voter
pub fn vote_ack(was_update: bool) -> ActionResponse {
    let text = if was_update {
        "Your vote has been changed"
    } else {
        "Your vote has been recorded"
    };
    ActionResponse {
        ephemeral_text: Some(text.to_string()),
        update: None,
    }
}

/// One line per option: `<id>: <label>: [voter, ...]`
pub fn end_summary(poll: &Poll, tally: &Tally) -> String {
    tally
        .entries
        .iter()
        .map(|entry| {
            let label = poll
                .option(&entry.option_id)
                .map(|o| o.text.as_str())
                .unwrap_or("(unknown option)");
            format!("{}: {}: [{}]", entry.option_id, label, entry.voters.join(", "))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Reply to the end-poll button: replaces the post with the summary
pub fn end_response(poll: &Poll, tally: &Tally) -> ActionResponse {
    ActionResponse {
        ephemeral_text: None,
        update: Some(PostUpdate {
            message: end_summary(poll, tally),
        }),
    }
}
