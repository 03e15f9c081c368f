//! CSV reading and writing through polars.

use std::io::Cursor;

use anyhow::{Context, Result};
use polars::prelude::*;

/// Read CSV bytes with every column forced to String, preserving leading zeros in
/// identifier columns ("05", "005", "07001").
pub(crate) fn read_csv_bytes_as_strings(bytes: &[u8]) -> Result<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .into_reader_with_file_handle(Cursor::new(bytes.to_vec()))
        .finish()
        .context("[io::csv] Failed to read CSV from bytes")
}

/// Extract a column as owned optional strings, trimming whitespace and mapping
/// empty cells to `None`.
pub(crate) fn string_column(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)
        .with_context(|| format!("[io::csv] missing column {name:?}"))?
        .cast(&DataType::String)?;

    Ok(column.str()?
        .into_iter()
        .map(|value| value
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string))
        .collect())
}

/// Serialize a DataFrame to CSV bytes with a header row, in the frame's column order.
pub(crate) fn write_csv_bytes(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .include_header(true)
        .finish(df)
        .context("[io::csv] Failed to write CSV")?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zeros_survive() {
        let df = read_csv_bytes_as_strings(b"zip,county\n07001,005\n10456, 36005 \n").unwrap();
        assert_eq!(string_column(&df, "zip").unwrap(), vec![Some("07001".into()), Some("10456".into())]);
        assert_eq!(string_column(&df, "county").unwrap(), vec![Some("005".into()), Some("36005".into())]);
    }

    #[test]
    fn empty_cells_are_none() {
        let df = read_csv_bytes_as_strings(b"a,b\n1,\n,2\n").unwrap();
        assert_eq!(string_column(&df, "a").unwrap(), vec![Some("1".into()), None]);
        assert_eq!(string_column(&df, "b").unwrap(), vec![None, Some("2".into())]);
    }

    #[test]
    fn missing_column_is_error() {
        let df = read_csv_bytes_as_strings(b"a\n1\n").unwrap();
        assert!(string_column(&df, "b").is_err());
    }
}
