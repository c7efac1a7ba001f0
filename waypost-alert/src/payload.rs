//! Discord-compatible webhook body
//!
//! ```json
//! {"embeds": [{"title": "...", "description": "...", "color": 16711680,
//!   "fields": [{"name": "From", "value": "...", "inline": true}, ...],
//!   "timestamp": "2024-03-01T09:30:05.000Z"}]}
//! ```

use serde::Serialize;

use crate::event::AlertEvent;

const TITLE: &str = "🚨 Email Delivery Failed";
const RED: u32 = 0x00FF_0000;
const UNKNOWN_TARGET: &str = "unknown target";
const NO_TARGET: &str = "No routing rule found";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

impl EmbedField {
    fn new(name: &str, value: impl Into<String>, inline: bool) -> Self {
        Self {
            name: name.to_string(),
            value: value.into(),
            inline,
        }
    }
}

impl WebhookPayload {
    /// Render `event` as a single red embed stamped with `timestamp`
    #[must_use]
    pub fn from_event(event: &AlertEvent, timestamp: &str) -> Self {
        let description = format!(
            "Failed to forward email from **{}** to **{}**",
            event.from,
            event.target.as_deref().unwrap_or(UNKNOWN_TARGET)
        );

        let fields = vec![
            EmbedField::new("From", event.from.as_str(), true),
            EmbedField::new("Original Recipient", event.to.as_str(), true),
            EmbedField::new(
                "Target Email",
                event.target.as_deref().unwrap_or(NO_TARGET),
                true,
            ),
            EmbedField::new("Subject", event.subject.as_str(), true),
            EmbedField::new("Error", format!("```{}```", event.error), false),
            EmbedField::new("Timestamp", timestamp, true),
            EmbedField::new("Status", event.backup.to_string(), true),
        ];

        Self {
            embeds: vec![Embed {
                title: TITLE.to_string(),
                description,
                color: RED,
                fields,
                timestamp: timestamp.to_string(),
            }],
        }
    }
}
