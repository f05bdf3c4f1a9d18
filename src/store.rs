/// Whole-file CSV persistence for tracker rows.
///
/// Every append is a read-modify-write of the full store: existing rows are
/// parsed, the new row's columns are merged in, and the complete table is
/// written to a temp file then renamed into place so readers never see a
/// partial write. An exclusive sidecar lock serializes concurrent runs for
/// the same tracker.
use crate::naming;
use fs2::FileExt;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Always-present timestamp columns, first in every store.
pub const LOG_DATE: &str = "log date";
pub const LOG_TIME: &str = "log time";

/// In-memory CSV table: ordered column names plus string cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// An empty table with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Append a row given as (column, cell) pairs, merging its column set
    /// into the table: existing columns keep their historical order, new
    /// columns are appended in the row's order, and cells missing on either
    /// side are backfilled as empty strings.
    pub fn append_merged(&mut self, row: &[(String, String)]) {
        for (col, _) in row {
            if !self.columns.iter().any(|c| c == col) {
                self.columns.push(col.clone());
                for existing in &mut self.rows {
                    existing.push(String::new());
                }
            }
        }
        let mut cells = vec![String::new(); self.columns.len()];
        for (i, col) in self.columns.iter().enumerate() {
            if let Some((_, value)) = row.iter().find(|(c, _)| c == col) {
                cells[i] = value.clone();
            }
        }
        self.rows.push(cells);
    }

    /// Parse a full CSV document. The first record is the header; every data
    /// row must match its width. Fully blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut records = parse_records(text)?;
        records.retain(|(_, r)| !(r.len() == 1 && r[0].is_empty()));
        if records.is_empty() {
            return Err(ParseError::MissingHeader);
        }
        let (_, columns) = records.remove(0);
        let width = columns.len();
        let mut rows = Vec::with_capacity(records.len());
        for (line, row) in records {
            if row.len() != width {
                return Err(ParseError::RowWidth {
                    row: line,
                    expected: width,
                    found: row.len(),
                });
            }
            rows.push(row);
        }
        Ok(Self { columns, rows })
    }

    /// Serialize to CSV text, header first, trailing newline.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        write_record(&mut out, &self.columns);
        for row in &self.rows {
            write_record(&mut out, row);
        }
        out
    }
}

fn write_record(out: &mut String, cells: &[String]) {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if cell.contains(['"', ',', '\n', '\r']) {
            out.push('"');
            for c in cell.chars() {
                if c == '"' {
                    out.push('"');
                }
                out.push(c);
            }
            out.push('"');
        } else {
            out.push_str(cell);
        }
    }
    out.push('\n');
}

/// Split CSV text into records, each tagged with the 1-based line number it
/// starts on so parse errors can point at the real line even when blank
/// lines are later skipped.
fn parse_records(text: &str) -> Result<Vec<(usize, Vec<String>)>, ParseError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut pending = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    cell.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                if c == '\n' {
                    line += 1;
                }
                cell.push(c);
            }
            continue;
        }
        match c {
            '"' if cell.is_empty() => {
                in_quotes = true;
                pending = true;
            }
            ',' => {
                record.push(std::mem::take(&mut cell));
                pending = true;
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                line += 1;
                record.push(std::mem::take(&mut cell));
                records.push((record_line, std::mem::take(&mut record)));
                record_line = line;
                pending = false;
            }
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut cell));
                records.push((record_line, std::mem::take(&mut record)));
                record_line = line;
                pending = false;
            }
            _ => {
                cell.push(c);
                pending = true;
            }
        }
    }

    if in_quotes {
        return Err(ParseError::UnterminatedQuote);
    }
    // Final record when the document doesn't end with a newline.
    if pending || !cell.is_empty() || !record.is_empty() {
        record.push(cell);
        records.push((record_line, record));
    }
    Ok(records)
}

/// Handle to one tracker's on-disk CSV store.
#[derive(Debug, Clone)]
pub struct Store {
    data_dir: PathBuf,
    tracker: String,
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>, tracker: &str) -> Self {
        Self {
            data_dir: data_dir.into(),
            tracker: tracker.to_string(),
        }
    }

    /// Path to the CSV file.
    pub fn path(&self) -> PathBuf {
        self.data_dir.join(naming::store_filename(&self.tracker))
    }

    fn lock_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.lock", self.tracker))
    }

    /// Append one row, creating the data directory and the store lazily.
    ///
    /// The whole read-modify-write runs under an exclusive advisory lock on
    /// a sidecar file, so concurrent runs for the same tracker serialize
    /// instead of losing rows. Returns the table as written.
    pub fn append_row(&self, row: &[(String, String)]) -> Result<Table, StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| StoreError::CreateDir {
            path: self.data_dir.clone(),
            source: e,
        })?;

        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.lock_path())
            .map_err(|e| StoreError::Lock {
                path: self.lock_path(),
                source: e,
            })?;
        lock_file.lock_exclusive().map_err(|e| StoreError::Lock {
            path: self.lock_path(),
            source: e,
        })?;
        // Lock is released when lock_file drops at the end of this call.

        let path = self.path();
        let mut table = if path.exists() {
            let text = fs::read_to_string(&path).map_err(|e| StoreError::Read {
                path: path.clone(),
                source: e,
            })?;
            Table::parse(&text).map_err(|e| StoreError::Parse {
                path: path.clone(),
                source: e,
            })?
        } else {
            tracing::debug!(path = %path.display(), "creating new store");
            Table::new(row.iter().map(|(c, _)| c.clone()).collect())
        };
        table.append_merged(row);

        self.write_atomic(&path, &table.to_csv())?;
        Ok(table)
    }

    /// Write the full document to a temp file in the same directory, then
    /// rename over the store.
    fn write_atomic(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        let tmp_path = self
            .data_dir
            .join(format!(".{}.csv.tmp.{}", self.tracker, std::process::id()));
        fs::write(&tmp_path, contents).map_err(|e| StoreError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;
        fs::rename(&tmp_path, path).map_err(|e| StoreError::Rename {
            from: tmp_path,
            to: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}

/// Malformed CSV in an existing store.
#[derive(Debug)]
pub enum ParseError {
    MissingHeader,
    UnterminatedQuote,
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::MissingHeader => write!(f, "store has no header row"),
            ParseError::UnterminatedQuote => write!(f, "unterminated quoted cell"),
            ParseError::RowWidth {
                row,
                expected,
                found,
            } => write!(
                f,
                "row at line {row} has {found} cells, expected {expected}"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors from store persistence. None of these are recovered; they
/// propagate and terminate the run.
#[derive(Debug)]
pub enum StoreError {
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    Lock {
        path: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: ParseError,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::CreateDir { path, source } => {
                write!(f, "failed to create data directory {}: {source}", path.display())
            }
            StoreError::Lock { path, source } => {
                write!(f, "failed to lock {}: {source}", path.display())
            }
            StoreError::Read { path, source } => {
                write!(f, "failed to read store {}: {source}", path.display())
            }
            StoreError::Parse { path, source } => {
                write!(f, "malformed store {}: {source}", path.display())
            }
            StoreError::Write { path, source } => {
                write!(f, "failed to write temp store file {}: {source}", path.display())
            }
            StoreError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} -> {}: {source}",
                    from.display(),
                    to.display()
                )
            }
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::CreateDir { source, .. }
            | StoreError::Lock { source, .. }
            | StoreError::Read { source, .. }
            | StoreError::Write { source, .. }
            | StoreError::Rename { source, .. } => Some(source),
            StoreError::Parse { source, .. } => Some(source),
        }
    }
}
