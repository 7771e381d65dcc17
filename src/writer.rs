use crate::config::{AUDIT_DELIMITER, IDENTIFIER_COLUMN};
use crate::encoding;
use crate::models::{PersonRecord, UnresolvedEntry};
use crate::reader::InputTable;
use anyhow::{anyhow, Context, Result};
use csv::WriterBuilder;
use std::fs;
use std::path::Path;

/// Rewrites the input file in place with resolved identifiers.
///
/// Only rows that produced a record are kept. The header order of the input is
/// preserved; an identifier column is prepended when the input had none. Cells
/// past the last header are not written, so every output row matches the header.
/// Returns `false` without touching the file when there are no records.
pub fn rewrite_input(
    path: &Path,
    table: &InputTable,
    records: &[PersonRecord],
    id_column: Option<usize>,
    output_encoding: &'static encoding_rs::Encoding,
) -> Result<bool> {
    if records.is_empty() {
        return Ok(false);
    }

    let mut out = WriterBuilder::new()
        .delimiter(table.delimiter)
        .from_writer(Vec::new());

    match id_column {
        Some(_) => out.write_record(&table.headers)?,
        None => out.write_record(
            std::iter::once(IDENTIFIER_COLUMN).chain(table.headers.iter().map(String::as_str)),
        )?,
    }

    for record in records {
        let row = table
            .rows
            .get(record.line)
            .with_context(|| format!("Record refers to missing row {}", record.line))?;
        let mut row: Vec<&str> = row.iter().map(String::as_str).collect();
        row.resize(table.headers.len(), "");
        match id_column {
            Some(col) => {
                row[col] = record.identifier.as_str();
                out.write_record(&row)?;
            }
            None => out.write_record(std::iter::once(record.identifier.as_str()).chain(row))?,
        }
    }

    let buffer = out
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV buffer: {}", e.error()))?;
    let text = String::from_utf8(buffer)?;
    let bytes = encoding::encode(&text, output_encoding)
        .with_context(|| format!("Failed to encode {}", path.display()))?;
    fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Writes the unresolved-logins audit (UTF-8, semicolon-delimited), sorted by login.
/// Returns `false` when there is nothing to write.
pub fn write_audit(path: &Path, entries: &[UnresolvedEntry]) -> Result<bool> {
    if entries.is_empty() {
        return Ok(false);
    }

    let mut sorted: Vec<&UnresolvedEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.login.cmp(&b.login));

    let mut out = WriterBuilder::new()
        .delimiter(AUDIT_DELIMITER)
        .from_path(path)
        .with_context(|| format!("Failed to create audit file {}", path.display()))?;
    out.write_record(["login", "name", IDENTIFIER_COLUMN])?;
    for entry in sorted {
        out.write_record([&entry.login, &entry.name, &entry.identifier])?;
    }
    out.flush()?;
    Ok(true)
}
