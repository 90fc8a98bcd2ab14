//! Durable key-value document store
//!
//! A document is a mapping from string keys to [`Value`]s, persisted as a
//! single compact JSON file using the tagged encoding from [`crate::codec`].
//! Loading never fails: a missing, truncated or wrongly shaped file reads
//! as an empty document. Writes go to a sibling temporary file which is
//! synced and then renamed over the target, so the previous contents stay
//! intact if the process dies mid-write.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::codec::{self, Value};

/// Top-level snapshot document
pub type Document = BTreeMap<String, Value>;

/// Load a document, returning an empty one on any failure
pub fn load(path: &Path) -> Document {
    match try_load(path) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("Ignoring unreadable snapshot {:?}: {}", path, e);
            Document::new()
        }
    }
}

/// Persist a document atomically. Failures are logged, never returned;
/// the result only tells whether the file now holds `document`.
pub fn store(document: &Document, path: &Path) -> bool {
    let tmp = temp_path(path);
    let saved = match write_atomic(document, path, &tmp) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Cannot save snapshot {:?}: {}", path, e);
            false
        }
    };
    if tmp.exists() {
        if let Err(e) = fs::remove_file(&tmp) {
            tracing::warn!("Cannot remove temporary file {:?}: {}", tmp, e);
        }
    }
    saved
}

fn try_load(path: &Path) -> crate::Result<Document> {
    let content = fs::read_to_string(path)?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    match codec::decode(json) {
        Value::Object(map) => Ok(map),
        other => Err(crate::LookoutError::Codec(format!(
            "top level is not a mapping: {:?}",
            other
        ))),
    }
}

fn write_atomic(document: &Document, path: &Path, tmp: &Path) -> crate::Result<()> {
    let mut encoded = serde_json::Map::with_capacity(document.len());
    for (key, value) in document {
        encoded.insert(key.clone(), codec::encode(value)?);
    }
    let bytes = serde_json::to_vec(&serde_json::Value::Object(encoded))?;

    let mut file = File::create(tmp)?;
    file.write_all(&bytes)?;
    file.flush()?;
    file.sync_all()?;
    drop(file);

    fs::rename(tmp, path)?;
    tracing::debug!("Saved snapshot {:?} ({} bytes)", path, bytes.len());
    Ok(())
}

/// Sibling path used while writing: the file name with `_` appended
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push("_");
    path.with_file_name(name)
}
