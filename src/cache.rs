use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use camino::{Utf8Path, Utf8PathBuf};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::diagnostics::Diagnostics;
use crate::domain::ReceptorTable;
use crate::error::SearchError;
use crate::fs_util;
use crate::tsv;

pub const DEFAULT_CACHE_PATH: &str = ".vdjdb_cache.tsv.gz";

/// Gzipped TSV copy of the last normalized snapshot.
///
/// The cache only saves a download. Anything wrong with the file is reported
/// as [`SearchError::CacheUnavailable`] and callers fall back to a fetch.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: Utf8PathBuf,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_PATH)
    }
}

impl SnapshotCache {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    pub fn load(&self, diagnostics: &dyn Diagnostics) -> Result<ReceptorTable, SearchError> {
        let result = self.read();
        match &result {
            Ok(table) => diagnostics.info(&format!(
                "loaded {} cached rows from {}",
                table.len(),
                self.path
            )),
            Err(err) => diagnostics.debug(&err.to_string()),
        }
        result
    }

    fn read(&self) -> Result<ReceptorTable, SearchError> {
        let unavailable = SearchError::CacheUnavailable;
        let file = File::open(self.path.as_std_path())
            .map_err(|err| unavailable(format!("{}: {err}", self.path)))?;
        let decoder = GzDecoder::new(BufReader::new(file));
        let table = tsv::read_table(decoder, self.path.as_str(), true)
            .map_err(|err| unavailable(err.to_string()))?;
        if !table.has_columns() {
            return Err(unavailable(format!("{} holds no table", self.path)));
        }
        Ok(table)
    }

    pub fn store(
        &self,
        table: &ReceptorTable,
        diagnostics: &dyn Diagnostics,
    ) -> Result<(), SearchError> {
        fs_util::write_atomic(&self.path, |file| {
            let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
            tsv::write_table(&mut encoder, table)?;
            let mut inner = encoder
                .finish()
                .map_err(|err| SearchError::Filesystem(err.to_string()))?;
            inner
                .flush()
                .map_err(|err| SearchError::Filesystem(err.to_string()))
        })?;
        diagnostics.info(&format!("snapshot cached to {}", self.path));
        Ok(())
    }

    /// Removes the artifact if present.
    pub fn clear(&self) -> Result<bool, SearchError> {
        if !self.path.as_std_path().exists() {
            return Ok(false);
        }
        std::fs::remove_file(self.path.as_std_path())
            .map_err(|err| SearchError::Filesystem(err.to_string()))?;
        Ok(true)
    }
}
