use crate::encoding::{self, TextEncoding};
use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// A delimited file held in memory: header names plus raw row values.
///
/// Every row has exactly the header width: short rows are padded and cells
/// past the last header are dropped.
#[derive(Debug, Clone)]
pub struct InputTable {
    pub encoding: TextEncoding,
    pub delimiter: u8,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Chooses the delimiter from the first line of the file.
///
/// The preferred delimiter wins if present, then comma, then semicolon as last resort.
pub fn detect_delimiter(first_line: &str, preferred: u8) -> u8 {
    let has = |b: u8| first_line.as_bytes().contains(&b);
    if has(preferred) {
        preferred
    } else if has(b',') {
        b','
    } else {
        b';'
    }
}

/// Reads and decodes `path`, falling back to `fallback` when no byte-order mark is found.
pub fn read_file(
    path: &Path,
    fallback: &'static encoding_rs::Encoding,
    preferred: u8,
) -> Result<InputTable> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read input: {}", path.display()))?;
    let encoding = encoding::detect(&bytes, fallback);
    let text = encoding::decode(&bytes, encoding)
        .with_context(|| format!("Failed to decode {} as {}", path.display(), encoding))?;
    parse_text(&text, encoding, preferred)
}

pub fn parse_text(text: &str, encoding: TextEncoding, preferred: u8) -> Result<InputTable> {
    let first_line = text.lines().next().unwrap_or("");
    let delimiter = detect_delimiter(first_line, preferred);
    debug!(delimiter = %(delimiter as char), "Detected delimiter");

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        bail!("Header row is empty");
    }

    let mut rows = Vec::new();
    for (index, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse row {}", index + 1))?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        if row.len() > headers.len() {
            let extra = row.split_off(headers.len());
            if extra.iter().any(|cell| !cell.trim().is_empty()) {
                warn!(row = index + 1, dropped = extra.len(), "Ignoring cells past the last header");
            }
        }
        row.resize(headers.len(), String::new());
        rows.push(row);
    }

    Ok(InputTable {
        encoding,
        delimiter,
        headers,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1251};

    fn plain() -> TextEncoding {
        TextEncoding::Standard { encoding: UTF_8, bom_len: 0 }
    }

    #[test]
    fn delimiter_preference_order() {
        assert_eq!(detect_delimiter("a|b,c", b'|'), b'|');
        assert_eq!(detect_delimiter("a,b;c", b'|'), b',');
        assert_eq!(detect_delimiter("a;b", b'|'), b';');
        assert_eq!(detect_delimiter("single", b'|'), b';');
    }

    #[test]
    fn parses_semicolon_table() -> Result<()> {
        let table = parse_text("name;login\nИванов Иван;ivanov\nПетров;petrov\n", plain(), b';')?;
        assert_eq!(table.delimiter, b';');
        assert_eq!(table.headers, vec!["name", "login"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Иванов Иван", "ivanov"]);
        Ok(())
    }

    #[test]
    fn comma_used_when_preferred_missing() -> Result<()> {
        let table = parse_text("name,login\n\"Smith, John\",smith\n", plain(), b';')?;
        assert_eq!(table.delimiter, b',');
        assert_eq!(table.rows[0][0], "Smith, John");
        Ok(())
    }

    #[test]
    fn short_rows_are_padded() -> Result<()> {
        let table = parse_text("name;login;email\nA B;a\n", plain(), b';')?;
        assert_eq!(table.rows[0], vec!["A B", "a", ""]);
        Ok(())
    }

    #[test]
    fn wide_rows_are_cut_to_header_width() -> Result<()> {
        let table = parse_text("name;login\nAB CD;ab;\nEF GH;ef;;extra\n", plain(), b';')?;
        assert_eq!(table.rows[0], vec!["AB CD", "ab"]);
        assert_eq!(table.rows[1], vec!["EF GH", "ef"]);
        Ok(())
    }

    #[test]
    fn reads_legacy_encoded_file() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("people.csv");
        let (bytes, _, _) = WINDOWS_1251.encode("name;login\nСмирнов;smirnov\n");
        fs::write(&path, &bytes)?;

        let table = read_file(&path, WINDOWS_1251, b';')?;
        assert_eq!(table.rows[0][0], "Смирнов");
        assert_eq!(table.encoding.to_string(), "windows-1251");
        Ok(())
    }
}
