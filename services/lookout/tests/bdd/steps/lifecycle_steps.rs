//! BDD step definitions for the builder and lifecycle feature

use std::sync::Arc;

use cucumber::{given, then, when};
use tokio_util::sync::CancellationToken;

use lookout::config::{Config, MonitorConfig, NotifierConfig, SlackConfig, UpDownConfig};
use lookout::io::{BasicAuth, HttpClient, HttpResponse};
use lookout::notifier::Notifier;
use lookout::LookoutBuilder;

use crate::doubles::{RecordingNotifier, ScriptedHttpClient};
use crate::world::LookoutWorld;

/// Cancels the token as soon as the wrapped client has answered once
#[derive(Debug)]
struct CancelAfterFirstPoll {
    inner: Arc<ScriptedHttpClient>,
    cancel: CancellationToken,
}

#[async_trait::async_trait]
impl HttpClient for CancelAfterFirstPoll {
    async fn get(&self, url: &str, auth: Option<&BasicAuth>) -> lookout::Result<HttpResponse> {
        let response = self.inner.get(url, auth).await;
        self.cancel.cancel();
        response
    }

    async fn post_form(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> lookout::Result<HttpResponse> {
        self.inner.post_form(url, params).await
    }
}

#[derive(Debug, Default)]
pub struct LifecycleSetup {
    pub notifier: Option<NotifierConfig>,
    pub cancel: Option<CancellationToken>,
    pub cancel_after_first_poll: bool,
}

fn build(world: &mut LookoutWorld) -> LookoutBuilder {
    let config = Config {
        monitor: MonitorConfig::UpDown(UpDownConfig {
            name: "iceprod".to_string(),
            servers: world.servers.clone(),
            delay_seconds: 60,
            failure_threshold: 5,
            accept_invalid_certs: true,
        }),
        notifier: world.lifecycle.notifier.clone().unwrap_or_default(),
    };

    let scripted = world
        .http
        .get_or_insert_with(|| Arc::new(ScriptedHttpClient::default()))
        .clone();

    let mut builder = LookoutBuilder::new(config);
    if world.lifecycle.notifier.is_none() {
        let recorder = world.recorder.get_or_insert_with(RecordingNotifier::default).clone();
        builder = builder.with_notifier(Arc::new(recorder) as Arc<dyn Notifier>);
    }

    if world.lifecycle.cancel_after_first_poll {
        let cancel = CancellationToken::new();
        builder = builder
            .with_http_client(Arc::new(CancelAfterFirstPoll {
                inner: scripted,
                cancel: cancel.clone(),
            }))
            .with_cancellation_token(cancel);
    } else {
        builder = builder.with_http_client(scripted as Arc<dyn HttpClient>);
        if let Some(cancel) = world.lifecycle.cancel.take() {
            builder = builder.with_cancellation_token(cancel);
        }
    }

    builder
}

// --- Given steps ---

#[given(regex = r#"^an up/down config for server "([^"]*)"$"#)]
async fn updown_config(world: &mut LookoutWorld, server: String) {
    let http = Arc::new(ScriptedHttpClient::default());
    http.serve(server.clone(), 200, "ok").await;
    world.http = Some(http);
    world.servers = vec![server];
}

#[given("a pre-cancelled cancellation token")]
fn pre_cancelled_token(world: &mut LookoutWorld) {
    let token = CancellationToken::new();
    token.cancel();
    world.lifecycle.cancel = Some(token);
}

#[given("a cancellation token that fires after the first poll")]
fn cancel_after_first_poll(world: &mut LookoutWorld) {
    world.lifecycle.cancel_after_first_poll = true;
}

#[given("a Slack notifier config without a token")]
fn slack_without_token(world: &mut LookoutWorld) {
    world.lifecycle.notifier = Some(NotifierConfig::Slack(SlackConfig {
        token: String::new(),
        token_file: None,
        channel: "pyglidein-sites".to_string(),
        prefix: String::new(),
        max_attempts: 5,
        initial_backoff_ms: 1000,
    }));
}

// --- When steps ---

#[when("the lookout is built")]
async fn lookout_is_built(world: &mut LookoutWorld) {
    let builder = build(world);
    world.build_succeeded = Some(builder.build().await.is_ok());
}

#[when("the lookout is built and started")]
async fn lookout_is_built_and_started(world: &mut LookoutWorld) {
    let builder = build(world);
    match builder.build().await {
        Ok(lookout) => {
            world.build_succeeded = Some(true);
            world.start_succeeded = Some(lookout.start().await.is_ok());
        }
        Err(_) => {
            world.build_succeeded = Some(false);
            world.start_succeeded = Some(false);
        }
    }
}

// --- Then steps ---

#[then("the build should fail")]
fn build_should_fail(world: &mut LookoutWorld) {
    assert_eq!(world.build_succeeded, Some(false), "Expected build to fail");
}

#[then("the lifecycle should complete successfully")]
fn lifecycle_should_complete(world: &mut LookoutWorld) {
    assert_eq!(
        world.build_succeeded,
        Some(true),
        "Expected build to succeed"
    );
    assert_eq!(
        world.start_succeeded,
        Some(true),
        "Expected start to succeed"
    );
}

#[then(regex = r#"^"([^"]*)" was polled (\d+) times?$"#)]
async fn server_polled(world: &mut LookoutWorld, server: String, times: usize) {
    let http = world.http.as_ref().expect("no HTTP client");
    let polls = http
        .requests
        .read()
        .await
        .iter()
        .filter(|r| r.method == "GET" && r.url == server)
        .count();
    assert_eq!(polls, times);
}
