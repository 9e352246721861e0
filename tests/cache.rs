mod common;

use std::fs;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use vdjdb_search::cache::SnapshotCache;
use vdjdb_search::error::SearchError;
use vdjdb_search::normalize::SegmentNormalizer;

use common::{Recorder, sample_table};

fn cache_in(dir: &tempfile::TempDir) -> SnapshotCache {
    SnapshotCache::new(Utf8PathBuf::from_path_buf(dir.path().join(".vdjdb_cache.tsv.gz")).unwrap())
}

#[test]
fn stored_snapshot_loads_identically() {
    let temp = tempfile::tempdir().unwrap();
    let cache = cache_in(&temp);
    let recorder = Recorder::default();
    let table = SegmentNormalizer::new().normalize(&sample_table(), &recorder);

    cache.store(&table, &recorder).unwrap();
    let loaded = cache.load(&recorder).unwrap();
    assert_eq!(loaded, table);
}

#[test]
fn missing_file_is_a_miss() {
    let temp = tempfile::tempdir().unwrap();
    let err = cache_in(&temp).load(&Recorder::default()).unwrap_err();
    assert_matches!(err, SearchError::CacheUnavailable(_));
}

#[test]
fn corrupt_file_is_a_miss() {
    let temp = tempfile::tempdir().unwrap();
    let cache = cache_in(&temp);
    fs::write(cache.path().as_std_path(), b"gene\tcdr3\nTRB\tCASS\n").unwrap();
    let err = cache.load(&Recorder::default()).unwrap_err();
    assert_matches!(err, SearchError::CacheUnavailable(_));
}

#[test]
fn store_replaces_previous_artifact() {
    let temp = tempfile::tempdir().unwrap();
    let cache = cache_in(&temp);
    let recorder = Recorder::default();
    let table = sample_table();

    cache.store(&table, &recorder).unwrap();
    let smaller = table.select(&["gene", "cdr3"]).unwrap();
    cache.store(&smaller, &recorder).unwrap();
    assert_eq!(cache.load(&recorder).unwrap(), smaller);

    assert!(cache.clear().unwrap());
    assert!(!cache.clear().unwrap());
}
