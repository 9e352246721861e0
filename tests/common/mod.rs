#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use vdjdb_search::app::App;
use vdjdb_search::cache::SnapshotCache;
use vdjdb_search::diagnostics::{Diagnostics, Level};
use vdjdb_search::domain::ReceptorTable;
use vdjdb_search::error::SearchError;
use vdjdb_search::extract::{SnapshotExtractor, parse_tsv};
use vdjdb_search::release::ReleaseClient;

pub const ASSET_URL: &str = "https://example.org/vdjdb-2024-06-13.zip";

pub fn sample_tsv() -> String {
    std::fs::read_to_string("tests/fixtures/vdjdb_slim_sample.txt").unwrap()
}

pub fn sample_table() -> ReceptorTable {
    parse_tsv(sample_tsv().as_bytes(), "vdjdb.slim.txt").unwrap()
}

pub fn ingestion_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
}

pub fn zip_archive(members: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Serves a fixed archive and counts how often the network was touched.
pub struct MockRelease {
    archive: Option<Vec<u8>>,
    pub resolves: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl MockRelease {
    pub fn with_archive(archive: Vec<u8>) -> Self {
        Self {
            archive: Some(archive),
            resolves: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn sample() -> Self {
        Self::with_archive(zip_archive(&[("vdjdb.slim.txt", &sample_tsv())]))
    }

    pub fn unreachable() -> Self {
        Self {
            archive: None,
            resolves: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
        }
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl ReleaseClient for MockRelease {
    fn resolve(&self) -> Result<String, SearchError> {
        self.resolves.fetch_add(1, Ordering::SeqCst);
        match self.archive {
            Some(_) => Ok(ASSET_URL.to_string()),
            None => Err(SearchError::ReleaseNotFound("connection refused".to_string())),
        }
    }

    fn download(&self, uri: &str) -> Result<Vec<u8>, SearchError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        assert_eq!(uri, ASSET_URL);
        self.archive
            .clone()
            .ok_or_else(|| SearchError::ReleaseHttp("connection refused".to_string()))
    }
}

#[derive(Default)]
pub struct Recorder {
    entries: Mutex<Vec<(Level, String)>>,
}

impl Recorder {
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(entry_level, _)| *entry_level == level)
            .map(|(_, message)| message.clone())
            .collect()
    }
}

impl Diagnostics for Recorder {
    fn emit(&self, level: Level, message: &str) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

pub fn sample_app(
    client: MockRelease,
    cache_path: &std::path::Path,
    species: Option<&str>,
) -> App<MockRelease> {
    let extractor = SnapshotExtractor::new(
        vec!["vdjdb.slim.txt".to_string()],
        species.map(|species| species.to_string()),
    );
    let cache_path = Utf8PathBuf::from_path_buf(cache_path.to_path_buf()).unwrap();
    App::new(client, extractor, SnapshotCache::new(cache_path))
        .with_ingestion_date(ingestion_date())
}
