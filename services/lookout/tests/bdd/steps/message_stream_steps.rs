//! BDD step definitions for the mailing-list message stream

use std::path::PathBuf;
use std::sync::Arc;

use cucumber::{given, then, when};

use lookout::archive::content_hash;
use lookout::config::MailingListConfig;
use lookout::mailing_list::MailingListMonitor;
use lookout::monitor::Monitor;
use lookout::notifier::Notifier;
use lookout::snapshot::Snapshot;

use crate::doubles::{RecordingNotifier, ScriptedHttpClient};
use crate::world::LookoutWorld;

const ARCHIVE_URL: &str = "http://lists.example/pipermail/grid-logbook/";

/// Normalised text of a test message with the given subject
fn summary(subject: &str) -> String {
    format!(
        "From: Jane Doe\nSubject: {}\n\nbody of {}",
        subject, subject
    )
}

fn month_file(subjects: &str) -> String {
    subjects
        .split_whitespace()
        .map(|subject| {
            format!(
                "From jdoe at icecube.wisc.edu  Mon May  6 10:00:00 2024\n\
                 From: jdoe at icecube.wisc.edu (Jane Doe)\n\
                 Subject: [grid-logbook] {}\n\
                 \n\
                 body of {}\n",
                subject, subject
            )
        })
        .collect()
}

fn snapshot_path(world: &mut LookoutWorld) -> PathBuf {
    world.dir().join(".last_message")
}

/// Months are listed newest first, as the archive index does
async fn publish_index(http: &ScriptedHttpClient, months: &[String]) {
    let rows: String = months
        .iter()
        .rev()
        .map(|m| format!(r#"<tr><td><a href="{}">[ Text ]</a></td></tr>"#, m))
        .collect();
    http.serve(ARCHIVE_URL, 200, format!("<table>{}</table>", rows))
        .await;
}

async fn add_month(world: &mut LookoutWorld, month: String, subjects: String) {
    let http = world
        .http
        .get_or_insert_with(|| Arc::new(ScriptedHttpClient::default()))
        .clone();
    http.serve(format!("{}{}", ARCHIVE_URL, month), 200, month_file(&subjects))
        .await;
    world.months.push(month);
    publish_index(&http, &world.months).await;
}

#[given(expr = "a mailing-list archive with month {string} holding messages {string}")]
async fn archive_with_month(world: &mut LookoutWorld, month: String, subjects: String) {
    add_month(world, month, subjects).await;
}

#[given(expr = "the archive also has month {string} holding messages {string}")]
async fn archive_also_has(world: &mut LookoutWorld, month: String, subjects: String) {
    add_month(world, month, subjects).await;
}

#[given(expr = "the high-water mark is message {string} in {string}")]
fn high_water_mark(world: &mut LookoutWorld, subject: String, month: String) {
    let mut snapshot = Snapshot::new();
    snapshot.set_last_message(&content_hash(&summary(&subject)), &month);
    snapshot.store(&snapshot_path(world));
}

#[given(expr = "the month {string} cannot be fetched")]
async fn month_unavailable(world: &mut LookoutWorld, month: String) {
    let http = world.http.clone().expect("archive not set");
    http.serve(format!("{}{}", ARCHIVE_URL, month), 404, "").await;
}

#[when("the mailing-list monitor runs a cycle")]
async fn monitor_runs(world: &mut LookoutWorld) {
    let config = MailingListConfig {
        name: "grid-logbook".to_string(),
        archive_url: ARCHIVE_URL.to_string(),
        snapshot_path: snapshot_path(world),
        delay_seconds: 300,
        failure_threshold: 5,
        http_auth_file: None,
        subject_tag: Some("[grid-logbook]".to_string()),
        source_label: "mailinglist server".to_string(),
        auth: None,
    };
    let http = world.http.clone().expect("archive not set");
    let recorder = world.recorder.get_or_insert_with(RecordingNotifier::default).clone();
    let notifier: Arc<dyn Notifier> = Arc::new(recorder);

    // A fresh monitor per cycle, so the mark must come from the file
    let mut monitor = MailingListMonitor::new(&config, http, notifier);
    world.cycle_result = Some(monitor.run_cycle(chrono::Utc::now().naive_utc()).await);
}

#[then(expr = "the relayed subjects are {string}")]
async fn relayed_subjects(world: &mut LookoutWorld, subjects: String) {
    let recorder = world.recorder.as_ref().expect("no notifier");
    let expected: Vec<String> = subjects
        .split_whitespace()
        .map(|s| format!("```{}```", summary(s)))
        .collect();
    assert_eq!(recorder.messages().await, expected);
}

#[then(expr = "the high-water mark is message {string} in {string}")]
fn mark_is(world: &mut LookoutWorld, subject: String, month: String) {
    let snapshot = Snapshot::load(&snapshot_path(world));
    let hash = content_hash(&summary(&subject));
    assert_eq!(
        snapshot.last_message(),
        Some((hash.as_str(), month.as_str()))
    );
}

#[then("the cycle fails")]
fn cycle_fails(world: &mut LookoutWorld) {
    let result = world.cycle_result.as_ref().expect("no cycle ran");
    assert!(result.is_err());
}

#[then("nothing is relayed")]
async fn nothing_relayed(world: &mut LookoutWorld) {
    let recorder = world.recorder.as_ref().expect("no notifier");
    assert!(recorder.messages().await.is_empty());
    assert!(Snapshot::load(&snapshot_path(world)).last_message().is_none());
}
