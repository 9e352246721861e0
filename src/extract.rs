use std::io::{Cursor, Read};

use chrono::NaiveDate;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::diagnostics::Diagnostics;
use crate::domain::{DATE_PULLED, ReceptorTable, SPECIES};
use crate::error::SearchError;
use crate::release::ReleaseClient;
use crate::tsv;

pub const DEFAULT_MEMBER: &str = "vdjdb.slim.txt";

/// Pulls named TSV members out of a release archive.
#[derive(Debug, Clone)]
pub struct SnapshotExtractor {
    members: Vec<String>,
    species: Option<String>,
}

impl SnapshotExtractor {
    pub fn new(members: Vec<String>, species: Option<String>) -> Self {
        Self { members, species }
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Downloads `uri` once and extracts every requested member present,
    /// keeping only rows of the configured species.
    pub fn extract<C: ReleaseClient + ?Sized>(
        &self,
        client: &C,
        uri: &str,
        ingested_on: NaiveDate,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<ReceptorTable>, SearchError> {
        let mut tables = self.extract_unfiltered(client, uri, ingested_on, diagnostics)?;
        for table in &mut tables {
            self.filter_species(table, diagnostics)?;
        }
        Ok(tables)
    }

    /// Like [`SnapshotExtractor::extract`] but ignores the species setting.
    pub fn extract_unfiltered<C: ReleaseClient + ?Sized>(
        &self,
        client: &C,
        uri: &str,
        ingested_on: NaiveDate,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<ReceptorTable>, SearchError> {
        diagnostics.info(&format!("downloading release archive {uri}"));
        let bytes = client.download(uri)?;
        diagnostics.debug(&format!("downloaded {} bytes", bytes.len()));
        self.read_archive(&bytes, ingested_on, diagnostics)
    }

    pub fn extract_archive(
        &self,
        bytes: &[u8],
        ingested_on: NaiveDate,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<ReceptorTable>, SearchError> {
        let mut tables = self.read_archive(bytes, ingested_on, diagnostics)?;
        for table in &mut tables {
            self.filter_species(table, diagnostics)?;
        }
        Ok(tables)
    }

    /// Keeps rows whose `species` equals the configured one; no-op without one.
    pub fn filter_species(
        &self,
        table: &mut ReceptorTable,
        diagnostics: &dyn Diagnostics,
    ) -> Result<(), SearchError> {
        let Some(species) = &self.species else {
            return Ok(());
        };
        let before = table.len();
        table.retain_equal(SPECIES, species)?;
        diagnostics.debug(&format!(
            "kept {} of {before} rows for species {species}",
            table.len()
        ));
        Ok(())
    }

    fn read_archive(
        &self,
        bytes: &[u8],
        ingested_on: NaiveDate,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Vec<ReceptorTable>, SearchError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|err| SearchError::Archive(err.to_string()))?;
        let stamp = ingested_on.format("%Y-%m-%d").to_string();

        let mut tables = Vec::new();
        for member in &self.members {
            let entry = match archive.by_name(member) {
                Ok(entry) => entry,
                Err(ZipError::FileNotFound) => {
                    diagnostics.warn(&format!("{member} was not found in archive, skipping"));
                    continue;
                }
                Err(err) => return Err(SearchError::Archive(err.to_string())),
            };

            let mut table = parse_tsv(entry, member)?;
            table.stamp_column(DATE_PULLED, &stamp);
            diagnostics.info(&format!("extracted {} rows from {member}", table.len()));
            tables.push(table);
        }
        Ok(tables)
    }
}

/// Parses a tab-separated table, keeping every field as literal text.
pub fn parse_tsv<R: Read>(reader: R, name: &str) -> Result<ReceptorTable, SearchError> {
    tsv::read_table(reader, name, false)
}
