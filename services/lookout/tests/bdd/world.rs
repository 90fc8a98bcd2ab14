//! BDD test world for the lookout monitors

use std::sync::Arc;

use chrono::NaiveDateTime;
use cucumber::World;
use lookout::backoff::FailureCounter;
use lookout::detect::StalenessPolicy;
use lookout::notifier::Notifier;
use lookout::snapshot::Snapshot;
use lookout::store::Document;

use crate::doubles::{RecordingNotifier, ScriptedHttpClient};
use crate::steps::lifecycle_steps::LifecycleSetup;

#[derive(Debug, Default, World)]
pub struct LookoutWorld {
    // Scratch directory for snapshot files
    pub dir: Option<tempfile::TempDir>,

    // Site detection
    pub snapshot: Snapshot,
    pub policy: Option<StalenessPolicy>,
    pub now: Option<NaiveDateTime>,
    pub alerts: Vec<String>,

    // Failure backoff
    pub counter: Option<FailureCounter>,
    pub counter_alerts: Vec<String>,

    // Monitors
    pub servers: Vec<String>,
    pub months: Vec<String>,
    pub http: Option<Arc<ScriptedHttpClient>>,
    pub recorder: Option<RecordingNotifier>,
    pub cycle_result: Option<lookout::Result<()>>,

    // Snapshot store
    pub document: Document,
    pub loaded: Option<Document>,

    // Notifier
    pub notifier: Option<Box<dyn Notifier>>,
    pub notification_result: Option<lookout::Result<()>>,

    // Lifecycle
    pub lifecycle: LifecycleSetup,
    pub build_succeeded: Option<bool>,
    pub start_succeeded: Option<bool>,
}

impl LookoutWorld {
    pub fn dir(&mut self) -> &std::path::Path {
        self.dir
            .get_or_insert_with(|| tempfile::tempdir().expect("tempdir"))
            .path()
    }
}
