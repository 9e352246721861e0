use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use crate::error::SearchError;

pub const DEFAULT_RELEASE_URL: &str =
    "https://api.github.com/repos/antigenomics/vdjdb-db/releases/latest";

/// Remote source of snapshot releases.
pub trait ReleaseClient: Send + Sync {
    /// Download URI of the first asset of the current release.
    fn resolve(&self) -> Result<String, SearchError>;
    fn download(&self, uri: &str) -> Result<Vec<u8>, SearchError>;
}

#[derive(Clone)]
pub struct GithubReleaseClient {
    client: Client,
    release_url: String,
}

impl GithubReleaseClient {
    pub fn new(release_url: impl Into<String>) -> Result<Self, SearchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("vdjdb-search/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SearchError::ReleaseHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|err| SearchError::ReleaseHttp(err.to_string()))?;
        Ok(Self {
            client,
            release_url: release_url.into(),
        })
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, SearchError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "release request failed".to_string());
        Err(SearchError::ReleaseStatus { status, message })
    }
}

impl ReleaseClient for GithubReleaseClient {
    fn resolve(&self) -> Result<String, SearchError> {
        let response = self
            .client
            .get(&self.release_url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .map_err(|err| SearchError::ReleaseNotFound(err.to_string()))?;
        let response = Self::handle_status(response)
            .map_err(|err| SearchError::ReleaseNotFound(err.to_string()))?;
        let body: Value = response
            .json()
            .map_err(|err| SearchError::ReleaseNotFound(err.to_string()))?;
        first_asset_url(&body)
    }

    fn download(&self, uri: &str) -> Result<Vec<u8>, SearchError> {
        let response = self
            .client
            .get(uri)
            .send()
            .map_err(|err| SearchError::ReleaseHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let bytes = response
            .bytes()
            .map_err(|err| SearchError::ReleaseHttp(err.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Reads `assets[0].browser_download_url` from a release payload.
pub fn first_asset_url(release: &Value) -> Result<String, SearchError> {
    let tag = release
        .get("tag_name")
        .and_then(|value| value.as_str())
        .unwrap_or("latest");
    release
        .get("assets")
        .and_then(|value| value.as_array())
        .and_then(|assets| assets.first())
        .and_then(|asset| asset.get("browser_download_url"))
        .and_then(|value| value.as_str())
        .filter(|url| !url.is_empty())
        .map(|url| url.to_string())
        .ok_or_else(|| SearchError::ReleaseNotFound(format!("release {tag} lists no assets")))
}
