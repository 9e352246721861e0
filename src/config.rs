use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CACHE_PATH;
use crate::domain::{Condition, QuerySpec};
use crate::error::SearchError;
use crate::extract::DEFAULT_MEMBER;
use crate::release::DEFAULT_RELEASE_URL;

pub const DEFAULT_SETTINGS_FILE: &str = "vdjdb-search.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "vdjdb_queries";
pub const DEFAULT_UPLOAD_TOKEN_ENV: &str = "VDJDB_UPLOAD_TOKEN";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub release_url: String,
    pub members: Vec<String>,
    pub species: Option<String>,
    pub cache_path: String,
    pub use_cache: bool,
    pub output_dir: String,
    pub upload_endpoint: Option<String>,
    pub upload_token_env: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            release_url: DEFAULT_RELEASE_URL.to_string(),
            members: vec![DEFAULT_MEMBER.to_string()],
            species: None,
            cache_path: DEFAULT_CACHE_PATH.to_string(),
            use_cache: true,
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            upload_endpoint: None,
            upload_token_env: DEFAULT_UPLOAD_TOKEN_ENV.to_string(),
        }
    }
}

/// One named entry of a query file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedQuery {
    pub id: String,
    pub query: QuerySpec,
}

/// Queries in the order they were declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBatch {
    queries: Vec<NamedQuery>,
}

impl QueryBatch {
    pub fn queries(&self) -> &[NamedQuery] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Parses `[query_id]` tables of `column = "substring"` pairs.
    ///
    /// Integer values are accepted and matched by their decimal text.
    pub fn from_toml_str(content: &str) -> Result<Self, SearchError> {
        let document: toml::Table = content
            .parse()
            .map_err(|err: toml::de::Error| SearchError::QueryConfigParse(err.to_string()))?;

        let queries = document
            .into_iter()
            .map(|(id, value)| {
                let toml::Value::Table(conditions) = value else {
                    return Err(SearchError::QueryConfigParse(format!(
                        "query {id} must be a table of column = \"substring\" pairs"
                    )));
                };
                let query = conditions
                    .into_iter()
                    .map(|(column, needle)| match needle {
                        toml::Value::String(needle) => Ok(Condition::new(column, needle)),
                        toml::Value::Integer(needle) => {
                            Ok(Condition::new(column, needle.to_string()))
                        }
                        other => Err(SearchError::QueryConfigParse(format!(
                            "query {id}: value for {column} must be a string, got {}",
                            other.type_str()
                        ))),
                    })
                    .collect::<Result<QuerySpec, SearchError>>()?;
                Ok(NamedQuery { id, query })
            })
            .collect::<Result<Vec<_>, SearchError>>()?;

        Ok(Self { queries })
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads an explicit settings file, or the default one when present.
    pub fn load_settings(path: Option<&str>) -> Result<Settings, SearchError> {
        let settings_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_SETTINGS_FILE),
        };

        if path.is_none() && !settings_path.exists() {
            return Ok(Settings::default());
        }

        let content = fs::read_to_string(&settings_path)
            .map_err(|_| SearchError::SettingsRead(settings_path.clone()))?;
        toml::from_str(&content).map_err(|err| SearchError::SettingsParse(err.to_string()))
    }

    pub fn load_queries(path: &Path) -> Result<QueryBatch, SearchError> {
        let content = fs::read_to_string(path)
            .map_err(|_| SearchError::QueryConfigRead(path.to_path_buf()))?;
        QueryBatch::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn partial_settings_keep_defaults() {
        let settings: Settings = toml::from_str("species = \"HomoSapiens\"").unwrap();
        assert_eq!(settings.species.as_deref(), Some("HomoSapiens"));
        assert_eq!(settings.members, vec![DEFAULT_MEMBER.to_string()]);
        assert_eq!(settings.cache_path, DEFAULT_CACHE_PATH);
        assert!(settings.use_cache);
    }

    #[test]
    fn queries_keep_declaration_order() {
        let batch = QueryBatch::from_toml_str(
            r#"
            [zeta]
            cdr3 = "CASS"

            [alpha]
            "v.segm" = "TCRBV07"
            "complex.id" = 42
            "#,
        )
        .unwrap();

        let ids = batch
            .queries()
            .iter()
            .map(|query| query.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["zeta", "alpha"]);
        assert_eq!(
            batch.queries()[1].query,
            QuerySpec::new().with("v.segm", "TCRBV07").with("complex.id", "42")
        );
    }

    #[test]
    fn non_table_query_is_rejected() {
        let err = QueryBatch::from_toml_str("cdr3 = \"CASS\"").unwrap_err();
        assert_matches!(err, SearchError::QueryConfigParse(_));
    }
}
