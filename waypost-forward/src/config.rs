use std::time::Duration;

use serde::Deserialize;

/// The SMTP relay all forwarded mail is handed to
///
/// ```ron
/// relay: (
///     host: "smtp.example.com",
///     port: 587,
///     helo: "waypost.example.com",
///     starttls: true,
/// ),
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Name announced in EHLO/HELO
    #[serde(default = "default_helo")]
    pub helo: String,

    /// Require the session to be upgraded with STARTTLS before MAIL FROM
    #[serde(default)]
    pub starttls: bool,

    /// Accept any certificate during STARTTLS (self-signed relays only)
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Upper bound on each step of the SMTP conversation, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

const fn default_port() -> u16 {
    25
}

fn default_helo() -> String {
    "localhost".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            helo: default_helo(),
            starttls: false,
            accept_invalid_certs: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RelayConfig {
    /// `host:port`, as passed to `connect`
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
