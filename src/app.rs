use std::fmt;

use camino::Utf8PathBuf;
use chrono::{Local, NaiveDate};
use rayon::prelude::*;
use serde::Serialize;

use crate::cache::SnapshotCache;
use crate::config::QueryBatch;
use crate::diagnostics::Diagnostics;
use crate::domain::{Projection, QuerySpec, ReceptorTable};
use crate::error::SearchError;
use crate::extract::SnapshotExtractor;
use crate::normalize::SegmentNormalizer;
use crate::output::ResultSink;
use crate::query;
use crate::release::ReleaseClient;

/// Id of the single result produced when a batch has no queries.
pub const FULL_SNAPSHOT_ID: &str = "full_snapshot";

#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Skip the cache lookup and download a fresh release.
    pub refresh: bool,
    /// Read and write the cache artifact at all.
    pub use_cache: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            refresh: false,
            use_cache: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    Cache(Utf8PathBuf),
    Release(String),
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotSource::Cache(path) => write!(f, "{path}"),
            SnapshotSource::Release(uri) => write!(f, "{uri}"),
        }
    }
}

/// A fully normalized table, ready for read-only querying.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub table: ReceptorTable,
    pub source: SnapshotSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub source: String,
    pub from_cache: bool,
    pub rows: usize,
    pub columns: usize,
}

impl Snapshot {
    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            source: self.source.to_string(),
            from_cache: matches!(self.source, SnapshotSource::Cache(_)),
            rows: self.table.len(),
            columns: self.table.columns().len(),
        }
    }
}

/// Outcome of one named query. Only `output_path` changes after creation.
#[derive(Debug, Clone)]
pub struct QueryResult {
    pub id: String,
    pub rows: ReceptorTable,
    pub query: QuerySpec,
    pub source_name: String,
    pub output_path: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuerySummary {
    pub id: String,
    pub query: String,
    pub matches: usize,
    pub source_name: String,
    pub output_path: Option<String>,
}

impl QueryResult {
    pub fn summary(&self) -> QuerySummary {
        QuerySummary {
            id: self.id.clone(),
            query: self.query.to_string(),
            matches: self.rows.len(),
            source_name: self.source_name.clone(),
            output_path: self.output_path.as_ref().map(|path| path.to_string()),
        }
    }
}

#[derive(Debug)]
pub struct QueryFailure {
    pub id: String,
    pub error: SearchError,
}

/// Results and failures of a batch, each in query declaration order.
///
/// Every query that evaluated has a result, even if a sink rejected it; the
/// sink error is listed in `failures` under the same id.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<QueryResult>,
    pub failures: Vec<QueryFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailureSummary {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub results: Vec<QuerySummary>,
    pub failures: Vec<FailureSummary>,
}

impl BatchReport {
    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            results: self.results.iter().map(QueryResult::summary).collect(),
            failures: self
                .failures
                .iter()
                .map(|failure| FailureSummary {
                    id: failure.id.clone(),
                    error: failure.error.to_string(),
                })
                .collect(),
        }
    }
}

pub struct App<C: ReleaseClient> {
    client: C,
    extractor: SnapshotExtractor,
    normalizer: SegmentNormalizer,
    cache: SnapshotCache,
    ingestion_date: Option<NaiveDate>,
}

impl<C: ReleaseClient> App<C> {
    pub fn new(client: C, extractor: SnapshotExtractor, cache: SnapshotCache) -> Self {
        Self {
            client,
            extractor,
            normalizer: SegmentNormalizer::new(),
            cache,
            ingestion_date: None,
        }
    }

    /// Pins the date stamped on fetched rows instead of today's.
    pub fn with_ingestion_date(mut self, date: NaiveDate) -> Self {
        self.ingestion_date = Some(date);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Cache-or-fetch. The returned table is fully normalized.
    pub fn snapshot(
        &self,
        options: FetchOptions,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Snapshot, SearchError> {
        if options.use_cache && !options.refresh {
            match self.load_cached(diagnostics) {
                Ok(table) => {
                    return Ok(Snapshot {
                        table,
                        source: SnapshotSource::Cache(self.cache.path().to_path_buf()),
                    });
                }
                Err(err) => diagnostics.info(&format!("{err}; fetching latest release")),
            }
        }

        // The cache holds every species; the filter applies on the way out.
        let mut snapshot = self.fetch_unfiltered(diagnostics)?;
        if options.use_cache {
            if let Err(err) = self.cache.store(&snapshot.table, diagnostics) {
                diagnostics.warn(&format!("could not cache snapshot: {err}"));
            }
        }
        self.extractor.filter_species(&mut snapshot.table, diagnostics)?;
        Ok(snapshot)
    }

    fn load_cached(&self, diagnostics: &dyn Diagnostics) -> Result<ReceptorTable, SearchError> {
        let mut table = self.cache.load(diagnostics)?;
        self.extractor
            .filter_species(&mut table, diagnostics)
            .map_err(|err| SearchError::CacheUnavailable(err.to_string()))?;
        Ok(table)
    }

    /// Resolve, download, extract and normalize the current release.
    pub fn fetch(&self, diagnostics: &dyn Diagnostics) -> Result<Snapshot, SearchError> {
        let mut snapshot = self.fetch_unfiltered(diagnostics)?;
        self.extractor.filter_species(&mut snapshot.table, diagnostics)?;
        Ok(snapshot)
    }

    fn fetch_unfiltered(&self, diagnostics: &dyn Diagnostics) -> Result<Snapshot, SearchError> {
        let uri = self.client.resolve()?;
        diagnostics.info(&format!("latest release asset: {uri}"));

        let ingested_on = self
            .ingestion_date
            .unwrap_or_else(|| Local::now().date_naive());
        let tables = self
            .extractor
            .extract_unfiltered(&self.client, &uri, ingested_on, diagnostics)?;
        if tables.is_empty() {
            diagnostics.error(&format!(
                "could not locate {} in release",
                self.extractor.members().join(", ")
            ));
            return Err(SearchError::MemberNotFound(
                self.extractor.members().join(", "),
            ));
        }

        let raw = ReceptorTable::concat(tables);
        let table = self.normalizer.normalize(&raw, diagnostics);
        Ok(Snapshot {
            table,
            source: SnapshotSource::Release(uri),
        })
    }

    /// Ad hoc single query against a snapshot.
    pub fn find(
        &self,
        snapshot: &Snapshot,
        query: &QuerySpec,
        projection: Projection,
        diagnostics: &dyn Diagnostics,
    ) -> Result<ReceptorTable, SearchError> {
        query::find(&snapshot.table, query, projection, diagnostics)
    }

    /// Resolves the snapshot once, then evaluates every query against it.
    pub fn run_batch(
        &self,
        queries: Option<&QueryBatch>,
        options: FetchOptions,
        sinks: &[&dyn ResultSink],
        diagnostics: &dyn Diagnostics,
    ) -> Result<BatchReport, SearchError> {
        let snapshot = self.snapshot(options, diagnostics)?;
        Ok(evaluate_batch(&snapshot, queries, sinks, diagnostics))
    }
}

/// Evaluates queries in parallel over the shared snapshot.
///
/// Each result goes to every sink as soon as it exists; one query or sink
/// failing does not stop the others.
pub fn evaluate_batch(
    snapshot: &Snapshot,
    queries: Option<&QueryBatch>,
    sinks: &[&dyn ResultSink],
    diagnostics: &dyn Diagnostics,
) -> BatchReport {
    let named = match queries {
        Some(batch) if !batch.is_empty() => batch
            .queries()
            .iter()
            .map(|named| (named.id.clone(), named.query.clone()))
            .collect::<Vec<_>>(),
        _ => {
            diagnostics.info("no queries supplied, returning the full snapshot");
            vec![(FULL_SNAPSHOT_ID.to_string(), QuerySpec::new())]
        }
    };

    let source_name = snapshot.source.to_string();
    let outcomes = named
        .into_par_iter()
        .map(|(id, query)| {
            evaluate_one(snapshot, id, query, &source_name, sinks, diagnostics)
        })
        .collect::<Vec<_>>();

    let mut report = BatchReport::default();
    for outcome in outcomes {
        let failures = match outcome {
            Ok((result, sink_failures)) => {
                report.results.push(result);
                sink_failures
            }
            Err(failure) => vec![failure],
        };
        for failure in failures {
            diagnostics.error(&format!("query {} failed: {}", failure.id, failure.error));
            report.failures.push(failure);
        }
    }
    report
}

/// A query that evaluated, plus any sink that could not take it.
type Evaluated = (QueryResult, Vec<QueryFailure>);

fn evaluate_one(
    snapshot: &Snapshot,
    id: String,
    query: QuerySpec,
    source_name: &str,
    sinks: &[&dyn ResultSink],
    diagnostics: &dyn Diagnostics,
) -> Result<Evaluated, QueryFailure> {
    if !query.is_empty() {
        diagnostics.info(&format!("filtering snapshot for {id}: {query}"));
    }
    let rows = match query::find(&snapshot.table, &query, Projection::Full, diagnostics) {
        Ok(rows) => rows,
        Err(error) => return Err(QueryFailure { id, error }),
    };
    if rows.is_empty() {
        diagnostics.info(&format!("no hits found for {id}"));
    } else {
        diagnostics.info(&format!("{} results found for {id}", rows.len()));
    }

    let mut result = QueryResult {
        id,
        rows,
        query,
        source_name: source_name.to_string(),
        output_path: None,
    };
    let mut sink_failures = Vec::new();
    for sink in sinks {
        if let Err(error) = sink.deliver(&mut result, diagnostics) {
            sink_failures.push(QueryFailure {
                id: result.id.clone(),
                error,
            });
        }
    }
    Ok((result, sink_failures))
}
