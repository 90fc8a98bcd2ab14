//! Slack chat relay

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SlackConfig;
use crate::io::HttpClient;
use crate::notifier::Notifier;
use crate::LookoutError;

const SLACK_API_URL: &str = "https://slack.com/api/chat.postMessage";

/// Upper bound on the wait between two attempts
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Errors Slack reports that no amount of retrying will fix
const PERMANENT_ERRORS: [&str; 5] = [
    "not_authed",
    "invalid_auth",
    "account_inactive",
    "channel_not_found",
    "is_archived",
];

#[derive(Debug, Deserialize)]
struct SlackReply {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Retry bookkeeping for one send, owned by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
    backoff: Duration,
}

impl RetryState {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
            backoff: initial_backoff,
        }
    }

    /// Attempts made so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Record a failed attempt. Returns how long to wait before the next
    /// one, or `None` once the attempts are used up. The wait doubles each
    /// time, capped at [`MAX_BACKOFF`].
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.backoff;
        self.backoff = (self.backoff * 2).min(MAX_BACKOFF);
        Some(delay)
    }
}

/// Slack notifier using `chat.postMessage`
pub struct SlackNotifier {
    token: String,
    channel: String,
    prefix: String,
    max_attempts: u32,
    initial_backoff: Duration,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("channel", &self.channel)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created SlackNotifier for channel '{}'", config.channel);

        Self {
            token: config.token.clone(),
            channel: config.channel.clone(),
            prefix: config.prefix.clone(),
            max_attempts: config.max_attempts,
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            http,
        }
    }

    /// Send `text`, retrying transient failures according to `state`
    pub async fn send_with_retry(&self, state: &mut RetryState, text: &str) -> crate::Result<()> {
        loop {
            let err = match self.post_once(text).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            if is_permanent(&err) {
                return Err(err);
            }
            match state.next_delay() {
                Some(delay) => {
                    tracing::warn!(
                        "Slack send attempt {} failed: {}; retrying in {:?}",
                        state.attempt(),
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(LookoutError::Notifier(format!(
                        "giving up after {} attempts: {}",
                        state.attempt(),
                        err
                    )));
                }
            }
        }
    }

    async fn post_once(&self, text: &str) -> crate::Result<()> {
        let params = [
            ("token", self.token.as_str()),
            ("channel", self.channel.as_str()),
            ("text", text),
        ];

        let response = self.http.post_form(SLACK_API_URL, &params).await?;

        if response.status != 200 {
            return Err(LookoutError::Notifier(format!(
                "Slack API returned status {}: {}",
                response.status,
                response.text()
            )));
        }

        let reply: SlackReply = serde_json::from_slice(&response.body)?;
        if !reply.ok {
            return Err(LookoutError::Notifier(format!(
                "Slack rejected message: {}",
                reply.error.as_deref().unwrap_or("unknown error")
            )));
        }

        tracing::debug!("Slack message sent to '{}'", self.channel);
        Ok(())
    }
}

fn is_permanent(err: &LookoutError) -> bool {
    match err {
        LookoutError::Notifier(msg) => PERMANENT_ERRORS.iter().any(|code| msg.ends_with(code)),
        _ => false,
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    fn type_name(&self) -> &str {
        "slack"
    }

    async fn notify(&self, message: &str) -> crate::Result<()> {
        let text = format!("{}{}", self.prefix, message);
        let mut state = RetryState::new(self.max_attempts, self.initial_backoff);
        self.send_with_retry(&mut state, &text).await
    }
}
