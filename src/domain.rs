use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

pub const GENE: &str = "gene";
pub const CDR3: &str = "cdr3";
pub const V_SEGMENT: &str = "v.segm";
pub const J_SEGMENT: &str = "j.segm";
pub const COMPLEX_ID: &str = "complex.id";
pub const SPECIES: &str = "species";
pub const DATE_PULLED: &str = "date.pulled";

/// Columns needed to rebuild a receptor construct, in output order.
pub const CONSTRUCT_COLUMNS: [&str; 5] = [GENE, CDR3, V_SEGMENT, J_SEGMENT, COMPLEX_ID];

/// Gene-segment columns rewritten by the normalizer.
pub const SEGMENT_COLUMNS: [&str; 2] = [V_SEGMENT, J_SEGMENT];

/// A text-only table: every cell is kept verbatim as a string.
///
/// Rows always have exactly one cell per column; short rows are padded with
/// empty strings so substring matching never meets a missing value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceptorTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ReceptorTable {
    /// Rows are fitted to the header width; callers reject wider rows first.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// A table without columns carries no snapshot at all.
    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.column_index(column)?;
        self.rows.get(row).map(|cells| cells[index].as_str())
    }

    /// Sets `column` to `value` on every row, appending the column if needed.
    pub fn stamp_column(&mut self, column: &str, value: &str) {
        let index = match self.column_index(column) {
            Some(index) => index,
            None => {
                self.columns.push(column.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.columns.len() - 1
            }
        };
        for row in &mut self.rows {
            row[index] = value.to_string();
        }
    }

    /// Keeps rows whose `column` equals `expected` exactly.
    pub fn retain_equal(&mut self, column: &str, expected: &str) -> Result<(), SearchError> {
        let index = self
            .column_index(column)
            .ok_or_else(|| SearchError::MissingColumn(column.to_string()))?;
        self.rows.retain(|row| row[index] == expected);
        Ok(())
    }

    /// Copies the named columns, in the given order, into a new table.
    pub fn select(&self, names: &[&str]) -> Result<Self, SearchError> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| SearchError::MissingColumn(name.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&index| row[index].clone()).collect())
            .collect();
        Ok(Self {
            columns: names.iter().map(|name| name.to_string()).collect(),
            rows,
        })
    }

    /// Stacks tables, aligning cells by column name.
    ///
    /// The result has the union of all columns in first-seen order; cells a
    /// table does not have are left empty.
    pub fn concat(tables: Vec<ReceptorTable>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for table in &tables {
            for column in &table.columns {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }

        let mut rows = Vec::new();
        for table in tables {
            let positions = table
                .columns
                .iter()
                .map(|column| columns.iter().position(|c| c == column))
                .collect::<Vec<_>>();
            for row in table.rows {
                let mut aligned = vec![String::new(); columns.len()];
                for (cell, position) in row.into_iter().zip(&positions) {
                    if let Some(position) = position {
                        aligned[*position] = cell;
                    }
                }
                rows.push(aligned);
            }
        }

        Self { columns, rows }
    }

    /// Typed view over the construct columns of every row.
    pub fn records(&self) -> Result<Vec<ReceptorRecord>, SearchError> {
        let required = |name: &str| {
            self.column_index(name)
                .ok_or_else(|| SearchError::MissingColumn(name.to_string()))
        };
        let gene = required(GENE)?;
        let cdr3 = required(CDR3)?;
        let v = required(V_SEGMENT)?;
        let j = required(J_SEGMENT)?;
        let complex = required(COMPLEX_ID)?;
        let species = self.column_index(SPECIES);
        let date = self.column_index(DATE_PULLED);

        Ok(self
            .rows
            .iter()
            .map(|row| ReceptorRecord {
                locus: row[gene].clone(),
                cdr3: row[cdr3].clone(),
                v_segment: row[v].clone(),
                j_segment: row[j].clone(),
                complex_id: row[complex].clone(),
                species: species.map(|index| row[index].clone()).unwrap_or_default(),
                date_pulled: date.map(|index| row[index].clone()).unwrap_or_default(),
            })
            .collect())
    }
}

/// One chain record of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceptorRecord {
    pub locus: String,
    pub cdr3: String,
    pub v_segment: String,
    pub j_segment: String,
    pub complex_id: String,
    pub species: String,
    pub date_pulled: String,
}

impl ReceptorRecord {
    /// VDJdb uses `0` for chains that were not sequenced as a pair.
    pub fn is_paired(&self) -> bool {
        !self.complex_id.is_empty() && self.complex_id != "0"
    }
}

/// Require `column` to contain `needle` as a literal substring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub needle: String,
}

impl Condition {
    pub fn new(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            needle: needle.into(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.column, self.needle)
    }
}

impl FromStr for Condition {
    type Err = SearchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (column, needle) = value.split_once('=').ok_or_else(|| {
            SearchError::QueryConfigParse(format!("expected COLUMN=SUBSTRING, got {value}"))
        })?;
        let column = column.trim();
        if column.is_empty() {
            return Err(SearchError::QueryConfigParse(format!(
                "empty column name in condition {value}"
            )));
        }
        Ok(Self::new(column, needle))
    }
}

/// Conjunction of substring conditions. Empty means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuerySpec {
    conditions: Vec<Condition>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: impl Into<String>, needle: impl Into<String>) -> Self {
        self.conditions.push(Condition::new(column, needle));
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl FromIterator<Condition> for QuerySpec {
    fn from_iter<I: IntoIterator<Item = Condition>>(iter: I) -> Self {
        Self {
            conditions: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self
            .conditions
            .iter()
            .map(|condition| condition.to_string())
            .collect::<Vec<_>>();
        write!(f, "{}", parts.join(" & "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Projection {
    /// Every column of the snapshot.
    #[default]
    Full,
    /// Only [`CONSTRUCT_COLUMNS`], in that order.
    Construct,
}
