//! Header-first CSV tables: quote and CRLF tolerant reader, RFC 4180 writer.
use std::io::{self, Write};
use std::mem::take;
use std::path::{Path, PathBuf};

use placelens_common::PlacelensError;

#[derive(thiserror::Error, Debug)]
pub enum TableError {
    #[error("{0} not found")]
    NotFound(PathBuf),

    #[error("{0} is empty")]
    Empty(PathBuf),

    #[error("{path} is missing required column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    #[error("i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<TableError> for PlacelensError {
    fn from(e: TableError) -> Self {
        PlacelensError::Input(e.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell by column name; short rows read as empty.
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        let idx = self.column(name)?;
        Some(row.get(idx).map(String::as_str).unwrap_or(""))
    }

    /// Fail unless every name in `columns` is a header.
    pub fn require_columns(&self, path: &Path, columns: &[&str]) -> Result<(), TableError> {
        for column in columns {
            if self.column(column).is_none() {
                return Err(TableError::MissingColumn {
                    path: path.to_path_buf(),
                    column: (*column).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Index of `name`, appending the column if absent.
    ///
    /// Short rows are padded. Cells past the old header width move one
    /// place right, so the new column never overwrites them.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        let idx = self.headers.len();
        self.headers.push(name.to_string());
        for row in &mut self.rows {
            if row.len() < idx {
                row.resize(idx, String::new());
            }
            row.insert(idx, String::new());
        }
        idx
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_csv_string(&self) -> String {
        let mut buf: Vec<u8> = Vec::new();
        // Writes into a Vec cannot fail.
        let _ = write_row(&mut buf, &self.headers, ',');
        for row in &self.rows {
            let _ = write_row(&mut buf, row, ',');
        }
        match String::from_utf8(buf) {
            Ok(s) => s,
            Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
        }
    }
}

/// Minimal CSV/TSV parser (quotes + CRLF tolerant).
pub fn parse_rows(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                if in_quotes {
                    if matches!(chars.peek(), Some('"')) {
                        chars.next(); // double-quote escape
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                } else {
                    in_quotes = true;
                }
            }
            c if c == sep && !in_quotes => {
                row.push(take(&mut field));
            }
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    // Flush any trailing field/row even if quotes were unterminated.
    row.push(field);
    if !(row.len() == 1 && row[0].is_empty()) {
        rows.push(row);
    }
    rows
}

/// Parse CSV text whose first row is the header.
pub fn parse_table(text: &str) -> Option<Table> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut rows = parse_rows(text, ',');
    if rows.is_empty() {
        return None;
    }
    let headers: Vec<String> = rows.remove(0).into_iter().map(|h| h.trim().to_string()).collect();
    let width = headers.len();
    for row in &mut rows {
        if row.len() < width {
            row.resize(width, String::new());
        }
    }
    Some(Table { headers, rows })
}

pub fn read_table(path: &Path) -> Result<Table, TableError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            TableError::NotFound(path.to_path_buf())
        } else {
            TableError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    parse_table(&text).ok_or_else(|| TableError::Empty(path.to_path_buf()))
}

pub fn write_table(path: &Path, table: &Table) -> Result<(), TableError> {
    let io_err = |source| TableError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, table.to_csv_string()).map_err(io_err)
}

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// Write a single CSV/TSV row to any writer.
pub fn write_row<W: Write>(mut w: W, row: &[String], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{sep}")?;
        } else {
            first = false;
        }
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{cell}")?;
        }
    }
    writeln!(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quotes_and_crlf() {
        let rows = parse_rows("a,\"b,c\"\r\n\"say \"\"hi\"\"\",d\r\n", ',');
        assert_eq!(
            rows,
            vec![
                vec!["a".to_string(), "b,c".to_string()],
                vec!["say \"hi\"".to_string(), "d".to_string()],
            ]
        );
    }

    #[test]
    fn quoted_newline_stays_in_field() {
        let rows = parse_rows("x\n\"line1\nline2\"\n", ',');
        assert_eq!(rows[1][0], "line1\nline2");
    }

    #[test]
    fn header_row_and_short_rows_are_padded() {
        let t = parse_table("\u{feff}keyword, location\nplumbers\n").unwrap();
        assert_eq!(t.headers, vec!["keyword", "location"]);
        assert_eq!(t.rows[0], vec!["plumbers".to_string(), String::new()]);
        assert_eq!(t.cell(&t.rows[0], "location"), Some(""));
        assert_eq!(t.cell(&t.rows[0], "title"), None);
    }

    #[test]
    fn writer_quotes_only_when_needed() {
        let mut t = Table::new(vec!["a".into(), "b".into()]);
        t.rows.push(vec!["plain".into(), "has,comma \"q\"".into()]);
        assert_eq!(t.to_csv_string(), "a,b\nplain,\"has,comma \"\"q\"\"\"\n");
    }

    #[test]
    fn ensure_column_pads_rows() {
        let mut t = parse_table("website\nhttps://a.com\n").unwrap();
        let idx = t.ensure_column("screenshot_path");
        assert_eq!(idx, 1);
        assert_eq!(t.rows[0].len(), 2);
        assert_eq!(t.ensure_column("website"), 0);
    }

    #[test]
    fn ensure_column_keeps_cells_past_the_header() {
        let mut t = parse_table("title,website\nJoe's,https://a.com,extra\n").unwrap();
        let idx = t.ensure_column("aesthetic_category");
        assert_eq!(idx, 2);
        t.rows[0][idx] = "Modern".into();
        assert_eq!(t.rows[0], vec!["Joe's", "https://a.com", "Modern", "extra"]);
    }

    #[test]
    fn missing_file_and_missing_column_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.csv");
        assert!(matches!(read_table(&missing), Err(TableError::NotFound(_))));

        let path = dir.path().join("q.csv");
        std::fs::write(&path, "keyword\nplumbers\n").unwrap();
        let t = read_table(&path).unwrap();
        let err = t.require_columns(&path, &["keyword", "location"]).unwrap_err();
        assert!(err.to_string().contains("'location'"));

        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(read_table(&empty), Err(TableError::Empty(_))));
    }
}
