//! BDD step definitions for the snapshot store

use std::collections::BTreeSet;

use cucumber::{given, then, when};

use lookout::codec::{parse_datetime, Value};
use lookout::store::{self, Document};

use crate::world::LookoutWorld;

const SNAPSHOT_FILE: &str = "snapshot.json";

#[given(expr = "a document with timestamp {string} under {string}")]
fn document_with_timestamp(world: &mut LookoutWorld, repr: String, key: String) {
    let ts = parse_datetime(&repr).unwrap_or_else(|| panic!("bad timestamp {:?}", repr));
    world.document.insert(key, Value::DateTime(ts));
}

#[given(expr = "a set {string} under {string}")]
fn document_with_set(world: &mut LookoutWorld, members: String, key: String) {
    let set: BTreeSet<String> = members.split(',').map(str::to_string).collect();
    world.document.insert(key, Value::Set(set));
}

#[given(expr = "a snapshot file containing {string}")]
fn snapshot_file_containing(world: &mut LookoutWorld, content: String) {
    let path = world.dir().join(SNAPSHOT_FILE);
    std::fs::write(path, content.replace("\\\"", "\"")).expect("write snapshot");
}

#[given("the document is stored")]
fn document_is_stored(world: &mut LookoutWorld) {
    let path = world.dir().join(SNAPSHOT_FILE);
    store::store(&world.document, &path);
}

#[when("the document is stored and loaded again")]
fn store_and_load(world: &mut LookoutWorld) {
    let path = world.dir().join(SNAPSHOT_FILE);
    store::store(&world.document, &path);
    world.loaded = Some(store::load(&path));
}

#[when("the snapshot file is loaded")]
fn snapshot_loaded(world: &mut LookoutWorld) {
    let path = world.dir().join(SNAPSHOT_FILE);
    world.loaded = Some(store::load(&path));
}

#[when("a different document is stored while the temporary file is blocked")]
fn store_with_blocked_temp(world: &mut LookoutWorld) {
    let path = world.dir().join(SNAPSHOT_FILE);
    std::fs::create_dir(store::temp_path(&path)).expect("block temp path");
    let mut other = Document::new();
    other.insert("other".to_string(), Value::from("value"));
    store::store(&other, &path);
}

#[then("the loaded document equals the stored one")]
fn loaded_equals_stored(world: &mut LookoutWorld) {
    assert_eq!(world.loaded.as_ref(), Some(&world.document));
}

#[then("the loaded document is empty")]
fn loaded_is_empty(world: &mut LookoutWorld) {
    let loaded = world.loaded.as_ref().expect("nothing loaded");
    assert!(loaded.is_empty(), "Expected empty document, got {:?}", loaded);
}

#[then("no temporary file is left behind")]
fn no_temp_file(world: &mut LookoutWorld) {
    let tmp = store::temp_path(&world.dir().join(SNAPSHOT_FILE));
    assert!(!tmp.exists(), "{:?} still exists", tmp);
}
