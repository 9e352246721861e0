use crate::diagnostics::Diagnostics;
use crate::domain::{COMPLEX_ID, CONSTRUCT_COLUMNS, GENE, Projection, QuerySpec, ReceptorTable};
use crate::error::SearchError;

/// Sort key for `complex.id`: integers first, numerically, then other text.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum ComplexKey<'a> {
    Numeric(u64),
    Text(&'a str),
}

impl<'a> ComplexKey<'a> {
    fn of(value: &'a str) -> Self {
        match value.parse::<u64>() {
            Ok(number) => ComplexKey::Numeric(number),
            Err(_) => ComplexKey::Text(value),
        }
    }
}

/// Filters `table` by every condition of `query`, ANDed, as literal substrings.
///
/// Rows come back sorted by `complex.id`, then `gene`, so the alpha chain of a
/// paired receptor always directly precedes its beta chain. The sort is stable,
/// making the output a pure function of the inputs. An empty query keeps every
/// row. Zero matches is an empty table, not an error.
pub fn find(
    table: &ReceptorTable,
    query: &QuerySpec,
    projection: Projection,
    diagnostics: &dyn Diagnostics,
) -> Result<ReceptorTable, SearchError> {
    if !table.has_columns() {
        return Err(SearchError::EmptyTable);
    }

    let conditions = query
        .conditions()
        .iter()
        .map(|condition| {
            table
                .column_index(&condition.column)
                .map(|index| (index, condition.needle.as_str()))
                .ok_or_else(|| SearchError::InvalidQueryColumn(condition.column.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let complex = table
        .column_index(COMPLEX_ID)
        .ok_or_else(|| SearchError::MissingColumn(COMPLEX_ID.to_string()))?;
    let gene = table
        .column_index(GENE)
        .ok_or_else(|| SearchError::MissingColumn(GENE.to_string()))?;

    if conditions.is_empty() {
        diagnostics.warn("no query params specified, returning the entire snapshot");
    } else {
        diagnostics.debug(&format!("filtering snapshot by {query}"));
    }

    let mut matched = table
        .rows()
        .iter()
        .filter(|row| {
            conditions
                .iter()
                .all(|&(index, needle)| row[index].contains(needle))
        })
        .collect::<Vec<_>>();

    matched.sort_by(|a, b| {
        ComplexKey::of(&a[complex])
            .cmp(&ComplexKey::of(&b[complex]))
            .then_with(|| a[gene].cmp(&b[gene]))
    });

    let sorted = ReceptorTable::new(
        table.columns().to_vec(),
        matched.into_iter().cloned().collect(),
    );

    match projection {
        Projection::Full => Ok(sorted),
        Projection::Construct => sorted.select(&CONSTRUCT_COLUMNS),
    }
}
