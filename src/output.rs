use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use camino::Utf8PathBuf;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Serialize;

use crate::app::{BatchSummary, QueryResult, SnapshotSummary};
use crate::diagnostics::Diagnostics;
use crate::error::SearchError;
use crate::fs_util;
use crate::tsv;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

/// Destination for finished query results.
///
/// Sinks are shared across the batch worker threads; each call handles one
/// result and must not depend on any other result being delivered first.
pub trait ResultSink: Send + Sync {
    fn deliver(
        &self,
        result: &mut QueryResult,
        diagnostics: &dyn Diagnostics,
    ) -> Result<(), SearchError>;
}

/// Writes `<dir>/<id>.tsv` for every result.
#[derive(Debug, Clone)]
pub struct TsvDirectorySink {
    dir: Utf8PathBuf,
}

impl TsvDirectorySink {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, id: &str) -> Utf8PathBuf {
        self.dir.join(format!("{}.tsv", file_stem(id)))
    }
}

impl ResultSink for TsvDirectorySink {
    fn deliver(
        &self,
        result: &mut QueryResult,
        diagnostics: &dyn Diagnostics,
    ) -> Result<(), SearchError> {
        fs_util::ensure_dir(&self.dir)?;
        let path = self.path_for(&result.id);
        fs_util::write_atomic(&path, |file| tsv::write_table(file, &result.rows))?;
        diagnostics.info(&format!("wrote {} rows to {path}", result.rows.len()));
        result.output_path = Some(path);
        Ok(())
    }
}

/// Upload secret. Never printed, not even through `Debug`.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Reads the secret from `var` once.
    pub fn from_env(var: &str) -> Result<Self, SearchError> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Ok(Self(value)),
            _ => Err(SearchError::MissingCredential(var.to_string())),
        }
    }

    fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// PUTs every result as TSV to `<endpoint>/<id>.tsv` with bearer auth.
#[derive(Clone)]
pub struct HttpUploadSink {
    client: Client,
    endpoint: String,
    credential: Credential,
}

impl HttpUploadSink {
    pub fn new(endpoint: impl Into<String>, credential: Credential) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("vdjdb-search/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SearchError::UploadHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| SearchError::UploadHttp(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credential,
        })
    }

    pub fn url_for(&self, id: &str) -> String {
        format!("{}/{}.tsv", self.endpoint, file_stem(id))
    }
}

impl ResultSink for HttpUploadSink {
    fn deliver(
        &self,
        result: &mut QueryResult,
        diagnostics: &dyn Diagnostics,
    ) -> Result<(), SearchError> {
        let mut body = Vec::new();
        tsv::write_table(&mut body, &result.rows)?;
        let url = self.url_for(&result.id);
        let response = self
            .client
            .put(&url)
            .bearer_auth(self.credential.secret())
            .header(CONTENT_TYPE, "text/tab-separated-values")
            .body(body)
            .send()
            .map_err(|err| SearchError::UploadHttp(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "upload failed".to_string());
            return Err(SearchError::UploadStatus { status, message });
        }
        diagnostics.info(&format!("uploaded {} to {url}", result.id));
        Ok(())
    }
}

/// Query ids come from user files; keep them to a single safe path component.
pub fn file_stem(id: &str) -> String {
    let stem = id
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect::<String>();
    match stem.trim_matches('.') {
        "" => "_".to_string(),
        trimmed => trimmed.to_string(),
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_batch(summary: &BatchSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_snapshot(summary: &SnapshotSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}
