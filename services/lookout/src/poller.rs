//! Source poller: one bounded fetch per call, classified failures

use std::sync::Arc;

use reqwest::Url;

use crate::backoff::FailureCounter;
use crate::io::{BasicAuth, HttpClient, HttpResponse};
use crate::notifier::{dispatch, Notifier};
use crate::LookoutError;

/// Fetches a monitored source, attaching credentials when configured
pub struct Poller {
    http: Arc<dyn HttpClient>,
    auth: Option<BasicAuth>,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("auth", &self.auth.as_ref().map(|a| &a.user))
            .finish()
    }
}

impl Poller {
    pub fn new(http: Arc<dyn HttpClient>, auth: Option<BasicAuth>) -> Self {
        Self { http, auth }
    }

    /// Fetch `url`, returning the response only for a 2xx status.
    ///
    /// Connection errors and timeouts surface as
    /// [`LookoutError::Unreachable`], other statuses as
    /// [`LookoutError::HttpStatus`].
    pub async fn fetch(&self, url: &str) -> crate::Result<HttpResponse> {
        let response = self.http.get(url, self.auth.as_ref()).await?;
        if !response.is_success() {
            return Err(LookoutError::HttpStatus {
                url: url.to_string(),
                status: response.status,
            });
        }
        Ok(response)
    }

    /// Fetch `url` and feed the outcome to `counter`.
    ///
    /// A poll failure is logged, counted, and alerted on once the counter
    /// reaches its threshold; the caller gets `None` and should skip the
    /// rest of its cycle.
    pub async fn fetch_counted(
        &self,
        url: &str,
        counter: &mut FailureCounter,
        notifier: &dyn Notifier,
    ) -> crate::Result<Option<HttpResponse>> {
        match self.fetch(url).await {
            Ok(response) => {
                counter.record_success();
                Ok(Some(response))
            }
            Err(e) if e.is_poll_failure() => {
                tracing::warn!("Error getting {}: {}", url, e);
                if let Some(alert) = counter.record_failure() {
                    dispatch(notifier, &alert).await;
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Resolve `link` against the directory named by `base`
    pub fn join(base: &str, link: &str) -> crate::Result<String> {
        let base = if base.ends_with('/') {
            Url::parse(base)
        } else {
            Url::parse(&format!("{}/", base))
        }
        .map_err(|e| LookoutError::Config(format!("Invalid URL {:?}: {}", base, e)))?;
        let joined = base
            .join(link)
            .map_err(|e| LookoutError::Parse(format!("Invalid link {:?}: {}", link, e)))?;
        Ok(joined.to_string())
    }
}
