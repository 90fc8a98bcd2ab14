//! BDD step definitions for failure backoff

use std::sync::Arc;

use cucumber::{given, then, when};

use lookout::backoff::FailureCounter;
use lookout::config::UpDownConfig;
use lookout::monitor::Monitor;
use lookout::notifier::Notifier;
use lookout::updown::UpDownMonitor;

use crate::doubles::{RecordingNotifier, ScriptedHttpClient};
use crate::world::LookoutWorld;

#[given(expr = "a failure counter for {string} with threshold {int}")]
fn failure_counter(world: &mut LookoutWorld, source: String, threshold: u32) {
    world.counter = Some(FailureCounter::new(source, threshold));
    world.counter_alerts.clear();
}

#[given(expr = "servers {string} and {string} where only {string} answers")]
async fn servers(world: &mut LookoutWorld, first: String, second: String, up: String) {
    let http = Arc::new(ScriptedHttpClient::default());
    http.serve(up, 200, "ok").await;
    world.http = Some(http);
    world.servers = vec![first, second];
}

#[when(regex = r"^the source fails (\d+) times?$")]
fn source_fails(world: &mut LookoutWorld, times: u32) {
    let counter = world.counter.as_mut().expect("counter not set");
    for _ in 0..times {
        if let Some(alert) = counter.record_failure() {
            world.counter_alerts.push(alert);
        }
    }
}

#[when("the source recovers")]
fn source_recovers(world: &mut LookoutWorld) {
    world
        .counter
        .as_mut()
        .expect("counter not set")
        .record_success();
}

#[when(regex = r"^the up/down monitor runs (\d+) cycles$")]
async fn updown_runs(world: &mut LookoutWorld, cycles: u32) {
    let config = UpDownConfig {
        name: "iceprod".to_string(),
        servers: world.servers.clone(),
        delay_seconds: 60,
        failure_threshold: 5,
        accept_invalid_certs: true,
    };
    let http = world.http.clone().expect("servers not set");
    let recorder = RecordingNotifier::default();
    let notifier: Arc<dyn Notifier> = Arc::new(recorder.clone());

    let mut monitor = UpDownMonitor::new(&config, http, notifier);
    let now = chrono::Utc::now().naive_utc();
    for _ in 0..cycles {
        monitor.run_cycle(now).await.expect("cycle failed");
    }
    world.recorder = Some(recorder);
}

#[then(regex = r"^(\d+) alerts? (?:has|have) been raised$")]
fn alerts_raised(world: &mut LookoutWorld, count: usize) {
    assert_eq!(
        world.counter_alerts.len(),
        count,
        "alerts: {:?}",
        world.counter_alerts
    );
}

#[then(expr = "the last alert is {string}")]
fn last_alert(world: &mut LookoutWorld, alert: String) {
    assert_eq!(world.counter_alerts.last(), Some(&alert));
}

#[then(expr = "the failure count is {int}")]
fn failure_count(world: &mut LookoutWorld, count: u32) {
    assert_eq!(world.counter.as_ref().expect("counter not set").failures(), count);
}

#[then(expr = "the monitor sent exactly {string}")]
async fn monitor_sent_exactly(world: &mut LookoutWorld, alert: String) {
    let recorder = world.recorder.as_ref().expect("no notifier");
    assert_eq!(recorder.messages().await, vec![alert]);
}
