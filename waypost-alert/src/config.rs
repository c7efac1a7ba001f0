use serde::Deserialize;

/// Environment variable that replaces [`AlertConfig::webhook_url`]
pub const WEBHOOK_URL_ENV: &str = "WAYPOST_WEBHOOK_URL";

/// Where alerts are sent
///
/// ```ron
/// alert: (
///     webhook_url: Some("https://discord.com/api/webhooks/..."),
/// ),
/// ```
///
/// Leaving `webhook_url` unset (or empty) disables alerting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AlertConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl AlertConfig {
    /// Apply `WAYPOST_WEBHOOK_URL` if it is set
    pub fn apply_env(&mut self) {
        self.apply_override(std::env::var(WEBHOOK_URL_ENV).ok());
    }

    fn apply_override(&mut self, value: Option<String>) {
        if let Some(url) = value {
            self.webhook_url = Some(url);
        }
    }

    /// The endpoint to post to, if alerting is enabled
    #[must_use]
    pub fn endpoint(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}
