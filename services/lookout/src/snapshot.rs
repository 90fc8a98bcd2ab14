//! Typed view over the persisted document: one record per monitored entity

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::codec::Value;
use crate::store::{self, Document};

/// Key of the message-stream high-water mark
pub const LAST_MESSAGE_KEY: &str = "last_message";

/// Liveness of a monitored site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteState {
    Ok,
    Failed,
}

impl SiteState {
    fn as_str(self) -> &'static str {
        match self {
            SiteState::Ok => "OK",
            SiteState::Failed => "FAILED",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(SiteState::Ok),
            "FAILED" => Some(SiteState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted state of one entity
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    SiteStatus {
        last_seen: NaiveDateTime,
        status: SiteState,
    },
    LastMessage {
        content_hash: String,
        source_link: String,
    },
}

impl Record {
    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        match self {
            Record::SiteStatus { last_seen, status } => {
                map.insert("date".to_string(), Value::DateTime(*last_seen));
                map.insert("status".to_string(), Value::from(status.as_str()));
            }
            Record::LastMessage {
                content_hash,
                source_link,
            } => {
                map.insert("hash".to_string(), Value::from(content_hash.as_str()));
                map.insert("link".to_string(), Value::from(source_link.as_str()));
            }
        }
        Value::Object(map)
    }

    fn from_value(value: &Value) -> Option<Self> {
        let map = value.as_object()?;
        if let (Some(date), Some(status)) = (map.get("date"), map.get("status")) {
            return Some(Record::SiteStatus {
                last_seen: date.as_datetime()?,
                status: SiteState::parse(status.as_str()?)?,
            });
        }
        if let (Some(hash), Some(link)) = (map.get("hash"), map.get("link")) {
            return Some(Record::LastMessage {
                content_hash: hash.as_str()?.to_string(),
                source_link: link.as_str()?.to_string(),
            });
        }
        None
    }
}

/// Last-known state of every entity a monitor tracks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    records: BTreeMap<String, Record>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the snapshot owned by a monitor. A missing file is a first
    /// boot and yields the empty snapshot; an unreadable one is logged by
    /// the store and also yields empty.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No snapshot at {:?}, starting empty", path);
            return Self::new();
        }
        let snapshot = Self::from_document(&store::load(path));
        tracing::debug!("Loaded {} records from {:?}", snapshot.len(), path);
        snapshot
    }

    /// Persist the snapshot atomically; failures are logged by the store.
    /// Returns whether the write landed.
    pub fn store(&self, path: &Path) -> bool {
        store::store(&self.to_document(), path)
    }

    pub fn from_document(document: &Document) -> Self {
        let mut records = BTreeMap::new();
        for (key, value) in document {
            match Record::from_value(value) {
                Some(record) => {
                    records.insert(key.clone(), record);
                }
                None => tracing::warn!("Skipping snapshot entry {:?} of unknown shape", key),
            }
        }
        Self { records }
    }

    pub fn to_document(&self) -> Document {
        self.records
            .iter()
            .map(|(key, record)| (key.clone(), record.to_value()))
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&Record> {
        self.records.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, record: Record) -> Option<Record> {
        self.records.insert(key.into(), record)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The message-stream high-water mark as `(content_hash, source_link)`
    pub fn last_message(&self) -> Option<(&str, &str)> {
        match self.records.get(LAST_MESSAGE_KEY) {
            Some(Record::LastMessage {
                content_hash,
                source_link,
            }) => Some((content_hash.as_str(), source_link.as_str())),
            _ => None,
        }
    }

    pub fn set_last_message(&mut self, content_hash: &str, source_link: &str) {
        self.records.insert(
            LAST_MESSAGE_KEY.to_string(),
            Record::LastMessage {
                content_hash: content_hash.to_string(),
                source_link: source_link.to_string(),
            },
        );
    }
}
