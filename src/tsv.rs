use std::io::{Read, Write};

use crate::domain::ReceptorTable;
use crate::error::SearchError;

/// Reads a tab-separated table with a header row; every cell stays text.
///
/// Short rows are padded; a row wider than the header is a
/// [`SearchError::TableParse`].
///
/// `quoted` enables RFC 4180 style quoting, used for files this crate wrote
/// itself. Upstream release files are read with quoting off so stray quote
/// characters survive verbatim.
pub fn read_table<R: Read>(
    reader: R,
    name: &str,
    quoted: bool,
) -> Result<ReceptorTable, SearchError> {
    let parse_err = |err: csv::Error| SearchError::TableParse {
        name: name.to_string(),
        message: err.to_string(),
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(quoted)
        .from_reader(reader);

    let columns = reader
        .headers()
        .map_err(parse_err)?
        .iter()
        .map(|column| column.to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(parse_err)?;
        if record.len() > columns.len() {
            let line = record.position().map_or(0, |position| position.line());
            return Err(SearchError::TableParse {
                name: name.to_string(),
                message: format!(
                    "line {line} has {} cells but the header has {}",
                    record.len(),
                    columns.len()
                ),
            });
        }
        rows.push(record.iter().map(|cell| cell.to_string()).collect());
    }
    Ok(ReceptorTable::new(columns, rows))
}

/// Writes header and rows, quoting only cells that need it. No index column.
pub fn write_table<W: Write>(writer: W, table: &ReceptorTable) -> Result<(), SearchError> {
    let write_err = |err: csv::Error| SearchError::Filesystem(err.to_string());
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);
    writer.write_record(table.columns()).map_err(write_err)?;
    for row in table.rows() {
        writer.write_record(row).map_err(write_err)?;
    }
    writer
        .flush()
        .map_err(|err| SearchError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn written_table_reads_back_identically() {
        let table = ReceptorTable::new(
            vec!["gene".to_string(), "meta".to_string(), "complex.id".to_string()],
            vec![
                vec![
                    "TRA".to_string(),
                    "{\"cell.subset\": \"CD8\"}".to_string(),
                    "01".to_string(),
                ],
                vec!["TRB".to_string(), "tab\there".to_string(), String::new()],
            ],
        );
        let mut buffer = Vec::new();
        write_table(&mut buffer, &table).unwrap();
        let read = read_table(buffer.as_slice(), "buffer", true).unwrap();
        assert_eq!(read, table);
    }

    #[test]
    fn row_wider_than_header_is_rejected() {
        let text = "gene\tcdr3\nTRB\tCASS\textra\n";
        let err = read_table(text.as_bytes(), "inline", false).unwrap_err();
        assert_matches!(
            err,
            SearchError::TableParse { name, message }
                if name == "inline" && message.contains("line 2")
        );
    }
}
