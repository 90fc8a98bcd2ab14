//! Configuration types for the lookout monitors

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::io::BasicAuth;

/// Main configuration structure: one monitor per process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
}

/// Monitor configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MonitorConfig {
    #[serde(rename = "site_liveness")]
    SiteLiveness(SiteLivenessConfig),
    #[serde(rename = "mailing_list")]
    MailingList(MailingListConfig),
    #[serde(rename = "updown")]
    UpDown(UpDownConfig),
}

impl MonitorConfig {
    pub fn name(&self) -> &str {
        match self {
            MonitorConfig::SiteLiveness(c) => &c.name,
            MonitorConfig::MailingList(c) => &c.name,
            MonitorConfig::UpDown(c) => &c.name,
        }
    }

    /// Fixed delay between cycles
    pub fn delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.delay_seconds())
    }

    pub fn delay_seconds(&self) -> u64 {
        match self {
            MonitorConfig::SiteLiveness(c) => c.delay_seconds,
            MonitorConfig::MailingList(c) => c.delay_seconds,
            MonitorConfig::UpDown(c) => c.delay_seconds,
        }
    }

    /// Override the poll interval, e.g. from the command line
    pub fn with_delay_override(mut self, seconds: Option<u64>) -> Self {
        if let Some(seconds) = seconds {
            match &mut self {
                MonitorConfig::SiteLiveness(c) => c.delay_seconds = seconds,
                MonitorConfig::MailingList(c) => c.delay_seconds = seconds,
                MonitorConfig::UpDown(c) => c.delay_seconds = seconds,
            }
        }
        self
    }
}

/// Status page listing remote sites with their last check-in time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteLivenessConfig {
    pub name: String,
    pub url: String,
    #[serde(default = "default_sites_snapshot")]
    pub snapshot_path: PathBuf,
    #[serde(default = "default_slow_delay")]
    pub delay_seconds: u64,
    #[serde(default = "default_cutoff_hours")]
    pub cutoff_hours: i64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Name used in the "is down" alert; defaults to the URL
    #[serde(default)]
    pub source_label: Option<String>,
}

/// Pipermail-style mailing-list archive
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailingListConfig {
    pub name: String,
    pub archive_url: String,
    #[serde(default = "default_message_snapshot")]
    pub snapshot_path: PathBuf,
    #[serde(default = "default_slow_delay")]
    pub delay_seconds: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// `key = value` file holding `user` and `password`
    #[serde(default)]
    pub http_auth_file: Option<PathBuf>,
    /// List tag stripped from subjects, e.g. `[grid-logbook]`
    #[serde(default)]
    pub subject_tag: Option<String>,
    #[serde(default = "default_mailing_list_label")]
    pub source_label: String,
    /// Filled from `http_auth_file` by [`Config::resolve_secrets`]
    #[serde(skip)]
    pub auth: Option<BasicAuth>,
}

/// Plain availability check over a set of servers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpDownConfig {
    pub name: String,
    pub servers: Vec<String>,
    #[serde(default = "default_fast_delay")]
    pub delay_seconds: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,
}

/// Notifier configuration with tagged enum for extensibility
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NotifierConfig {
    #[serde(rename = "slack")]
    Slack(SlackConfig),
    #[serde(rename = "log")]
    Log(LogConfig),
}

impl Default for NotifierConfig {
    fn default() -> Self {
        NotifierConfig::Log(LogConfig::default())
    }
}

impl NotifierConfig {
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Slack(_) => "slack",
            NotifierConfig::Log(_) => "log",
        }
    }

    pub fn prefix(&self) -> &str {
        match self {
            NotifierConfig::Slack(c) => &c.prefix,
            NotifierConfig::Log(c) => &c.prefix,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token; read from `token_file` when empty
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_token_file")]
    pub token_file: Option<PathBuf>,
    pub channel: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default)]
    pub prefix: String,
}

fn default_sites_snapshot() -> PathBuf {
    PathBuf::from("sites.json")
}

fn default_message_snapshot() -> PathBuf {
    PathBuf::from(".last_message")
}

fn default_slow_delay() -> u64 {
    300
}

fn default_fast_delay() -> u64 {
    60
}

fn default_cutoff_hours() -> i64 {
    2
}

fn default_retention_days() -> i64 {
    crate::detect::DEFAULT_RETENTION_DAYS
}

fn default_failure_threshold() -> u32 {
    crate::backoff::DEFAULT_THRESHOLD
}

fn default_mailing_list_label() -> String {
    "mailinglist server".to_string()
}

fn default_true() -> bool {
    true
}

fn default_token_file() -> Option<PathBuf> {
    Some(PathBuf::from(".slack_token"))
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

impl Config {
    /// Fill in credentials kept outside the config file
    pub fn resolve_secrets(&mut self) -> crate::Result<()> {
        if let NotifierConfig::Slack(slack) = &mut self.notifier {
            if slack.token.is_empty() {
                let path = slack.token_file.as_ref().ok_or_else(|| {
                    crate::LookoutError::Config(
                        "Slack notifier needs either token or token_file".to_string(),
                    )
                })?;
                tracing::debug!("Reading Slack token from {:?}", path);
                let token = std::fs::read_to_string(path).map_err(|e| {
                    crate::LookoutError::Config(format!(
                        "Failed to read token file {:?}: {}",
                        path, e
                    ))
                })?;
                slack.token = token.trim().to_string();
            }
        }

        if let MonitorConfig::MailingList(list) = &mut self.monitor {
            if let Some(path) = &list.http_auth_file {
                list.auth = load_credentials(path)?;
            }
        }

        Ok(())
    }
}

/// Read HTTP basic auth credentials from a `key = value` file.
///
/// A missing file means no credentials. Lines without `=` are ignored;
/// both `user` and `password` must be present to form a credential pair.
pub fn load_credentials(path: &Path) -> crate::Result<Option<BasicAuth>> {
    if !path.exists() {
        tracing::debug!("No credentials file at {:?}", path);
        return Ok(None);
    }
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::LookoutError::Config(format!("Failed to read credentials {:?}: {}", path, e))
    })?;

    let mut user = None;
    let mut password = None;
    for line in content.lines() {
        if let Some((key, value)) = line.split_once('=') {
            match key.trim() {
                "user" => user = Some(value.trim().to_string()),
                "password" => password = Some(value.trim().to_string()),
                other => tracing::debug!("Ignoring credentials key {:?}", other),
            }
        }
    }

    match (user, password) {
        (Some(user), Some(password)) => Ok(Some(BasicAuth { user, password })),
        _ => {
            tracing::warn!("Credentials file {:?} lacks user or password", path);
            Ok(None)
        }
    }
}

/// Load configuration from a JSON file
pub fn load_config(path: &Path) -> crate::Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::LookoutError::Config(format!("Failed to read config file {:?}: {}", path, e))
    })?;
    let config: Config = serde_json::from_str(&content)?;
    Ok(config)
}
