use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error("no downloadable release asset found: {0}")]
    ReleaseNotFound(String),

    #[error("release request failed: {0}")]
    ReleaseHttp(String),

    #[error("release endpoint returned status {status}: {message}")]
    ReleaseStatus { status: u16, message: String },

    #[error("archive member not found: {0}")]
    MemberNotFound(String),

    #[error("failed to read archive: {0}")]
    Archive(String),

    #[error("failed to parse table {name}: {message}")]
    TableParse { name: String, message: String },

    #[error("snapshot cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("query references unknown column: {0}")]
    InvalidQueryColumn(String),

    #[error("snapshot is missing required column: {0}")]
    MissingColumn(String),

    #[error("no snapshot table available to query")]
    EmptyTable,

    #[error("failed to read query file at {0}")]
    QueryConfigRead(PathBuf),

    #[error("failed to parse query file: {0}")]
    QueryConfigParse(String),

    #[error("failed to read settings file at {0}")]
    SettingsRead(PathBuf),

    #[error("failed to parse settings file: {0}")]
    SettingsParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("upload credential not set: environment variable {0} is missing")]
    MissingCredential(String),

    #[error("upload request failed: {0}")]
    UploadHttp(String),

    #[error("upload endpoint returned status {status}: {message}")]
    UploadStatus { status: u16, message: String },
}
