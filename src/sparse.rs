//! Plain-text sparse matrix files.
//!
//! Both orientations share one layout: a header line `rows cols nnz` describing
//! the matrix shape, then one line per row (row-major) or per column
//! (column-major) holding space separated `index value` pairs in ascending
//! index order. An empty vector is an empty line.

use crate::config::files_handling::open_lines;
use crate::error::{GentsError, Result};

use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One sparse vector: `(index, value)` pairs, indices ascending.
pub type SparseRow = Vec<(usize, f64)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatrixHeader {
    pub rows: usize,
    pub cols: usize,
    pub nnz: usize,
}

impl MatrixHeader {
    pub fn parse(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace().map(|f| f.parse::<usize>());
        let rows = fields.next()?.ok()?;
        let cols = fields.next()?.ok()?;
        let nnz = fields.next()?.ok()?;
        if fields.next().is_some() {
            return None;
        }
        Some(Self { rows, cols, nnz })
    }
}

/// Which dimension a file has one line per.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    RowMajor,
    ColumnMajor,
}

impl Orientation {
    /// Number of vector lines a file with `header` holds.
    pub fn vectors(&self, header: &MatrixHeader) -> usize {
        match self {
            Orientation::RowMajor => header.rows,
            Orientation::ColumnMajor => header.cols,
        }
    }
}

impl Display for MatrixHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.rows, self.cols, self.nnz)
    }
}

/// Parses one vector line. Pairs that do not parse are skipped with a warning,
/// the rest of the line is kept.
pub fn parse_row(line: &str, path: &Path, line_no: usize) -> SparseRow {
    let mut row = SparseRow::new();
    let mut fields = line.split_whitespace();
    while let Some(index) = fields.next() {
        let value = match fields.next() {
            Some(value) => value,
            None => {
                warn!("{}:{}: dangling index '{}' without value", path.display(), line_no, index);
                break;
            }
        };
        match (index.parse::<usize>(), value.parse::<f64>()) {
            (Ok(index), Ok(value)) => row.push((index, value)),
            _ => warn!("{}:{}: skipping malformed pair '{} {}'", path.display(), line_no, index, value),
        }
    }
    row
}

/// Streams the vectors of a matrix file after its header.
pub struct MatrixReader {
    path: PathBuf,
    header: MatrixHeader,
    lines: Lines<Box<dyn BufRead>>,
    line_no: usize,
}

impl MatrixReader {
    pub fn open(path: &Path) -> Result<Self> {
        let mut lines = open_lines(path)?;
        let first = match lines.next() {
            Some(line) => line.map_err(|e| GentsError::read(path, e))?,
            None => String::new(),
        };
        let header = MatrixHeader::parse(&first).ok_or_else(|| GentsError::MalformedHeader {
            path: path.to_path_buf(),
            line: first.clone(),
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            header,
            lines,
            line_no: 1,
        })
    }

    pub fn header(&self) -> MatrixHeader {
        self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for MatrixReader {
    type Item = Result<SparseRow>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = self.lines.next()?;
        self.line_no += 1;
        Some(
            line.map(|line| parse_row(&line, &self.path, self.line_no))
                .map_err(|e| GentsError::read(&self.path, e)),
        )
    }
}

/// Writes a matrix file: header first, then one vector per call.
pub struct MatrixWriter {
    path: PathBuf,
    out: BufWriter<File>,
    written: usize,
}

impl MatrixWriter {
    pub fn create(path: &Path, header: MatrixHeader) -> Result<Self> {
        let file = File::create(path).map_err(|e| GentsError::write(path, e))?;
        let mut out = BufWriter::new(file);
        writeln!(out, "{}", header).map_err(|e| GentsError::write(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            out,
            written: 0,
        })
    }

    pub fn write_row(&mut self, row: &[(usize, f64)]) -> Result<()> {
        let line = row
            .iter()
            .map(|(index, value)| format!("{} {}", index, value))
            .collect::<Vec<String>>()
            .join(" ");
        writeln!(self.out, "{}", line).map_err(|e| GentsError::write(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    /// Flushes and closes the file, returning the number of vectors written.
    pub fn finish(mut self) -> Result<usize> {
        self.out.flush().map_err(|e| GentsError::write(&self.path, e))?;
        Ok(self.written)
    }
}

/// Reads a whole matrix file into memory. Vectors beyond the header count are
/// ignored, missing ones come back empty.
pub fn read_matrix(path: &Path, orientation: Orientation) -> Result<(MatrixHeader, Vec<SparseRow>)> {
    let reader = MatrixReader::open(path)?;
    let header = reader.header();
    let expected = orientation.vectors(&header);
    let mut vectors = Vec::with_capacity(expected);
    for vector in reader {
        if vectors.len() == expected {
            warn!("{}: more vectors than the header announces ({}), ignoring the rest", path.display(), expected);
            break;
        }
        vectors.push(vector?);
    }
    if vectors.len() < expected {
        warn!("{}: only {} of {} vectors present, padding with empty ones", path.display(), vectors.len(), expected);
        vectors.resize_with(expected, SparseRow::new);
    }
    Ok((header, vectors))
}

/// Writes the column-major form of the row-major file at `row_path` to
/// `col_path` and returns the columns.
///
/// The row file is streamed once; all `cols` accumulators are held at the same
/// time.
pub fn transpose_file(row_path: &Path, col_path: &Path, progress_every: usize) -> Result<Vec<SparseRow>> {
    let reader = MatrixReader::open(row_path)?;
    let header = reader.header();
    let mut columns: Vec<SparseRow> = vec![SparseRow::new(); header.cols];

    for (row_id, row) in reader.enumerate() {
        for (col, value) in row? {
            match columns.get_mut(col) {
                Some(column) => column.push((row_id, value)),
                None => warn!("{}: column {} outside of {} columns, skipped", row_path.display(), col, header.cols),
            }
        }
        if progress_every > 0 && (row_id + 1) % progress_every == 0 {
            info!("transposed {} rows", row_id + 1);
        }
    }

    let mut writer = MatrixWriter::create(col_path, header)?;
    for column in &columns {
        writer.write_row(column)?;
    }
    writer.finish()?;

    Ok(columns)
}
