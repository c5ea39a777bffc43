//! Grid readers for workbook and CSV sources.
//!
//! A reader only turns a file into a rectangle of normalized cell strings;
//! reducing that rectangle to a table is done by [`super::SourceTable`].

use crate::config::SourceDescriptor;
use crate::constants::{CSV_EXTENSIONS, DEFAULT_CSV_DELIMITER, WORKBOOK_EXTENSIONS};
use crate::error::{Error, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::{Path, PathBuf};

/// Rows of cells; `None` marks an empty cell.
pub type Grid = Vec<Vec<Option<String>>>;

/// Trait for reading a tabular file into a grid.
pub trait GridReader {
    /// Reads the whole source.
    ///
    /// # Returns
    /// * `Result<Grid>` - Header row first, identifier column first
    fn read(&self) -> Result<Grid>;
}

/// Reader for spreadsheet workbooks.
pub struct WorkbookReader {
    id: String,
    path: PathBuf,
    sheet: String,
}

/// Reader for delimited text files.
pub struct CsvReader {
    id: String,
    path: PathBuf,
    delimiter: char,
}

impl WorkbookReader {
    pub fn new<S: Into<String>>(id: S, path: PathBuf, sheet: S) -> Self {
        Self { id: id.into(), path, sheet: sheet.into() }
    }

    fn error<R: ToString>(&self, reason: R) -> Error {
        read_error(&self.id, &self.path, reason)
    }
}

impl CsvReader {
    pub fn new<S: Into<String>>(id: S, path: PathBuf, delimiter: Option<char>) -> Self {
        Self { id: id.into(), path, delimiter: delimiter.unwrap_or(DEFAULT_CSV_DELIMITER) }
    }

    fn error<R: ToString>(&self, reason: R) -> Error {
        read_error(&self.id, &self.path, reason)
    }
}

fn read_error<R: ToString>(id: &str, path: &Path, reason: R) -> Error {
    Error::SourceReadError {
        source_id: id.to_string(),
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Renders a floating point cell the way it reads in the sheet.
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

fn normalize_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_float(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(d) => Some(format_float(d.as_f64())),
        Data::Error(e) => Some(e.to_string()),
        other => Some(other.to_string()),
    }
}

impl GridReader for WorkbookReader {
    fn read(&self) -> Result<Grid> {
        if !self.path.is_file() {
            return Err(self.error("file does not exist"));
        }
        let mut workbook = open_workbook_auto(&self.path).map_err(|e| self.error(e))?;
        if !workbook.sheet_names().iter().any(|name| name == &self.sheet) {
            return Err(self.error(format!("worksheet '{}' not found", self.sheet)));
        }
        let range = workbook.worksheet_range(&self.sheet).map_err(|e| self.error(e))?;

        // Ranges start at the first used cell; pad so that A1 is grid[0][0].
        let Some((end_row, end_col)) = range.end() else {
            return Ok(Grid::new());
        };
        let grid = (0..=end_row)
            .map(|row| {
                (0..=end_col)
                    .map(|col| range.get_value((row, col)).and_then(normalize_cell))
                    .collect()
            })
            .collect();
        Ok(grid)
    }
}

impl GridReader for CsvReader {
    fn read(&self) -> Result<Grid> {
        if !self.path.is_file() {
            return Err(self.error("file does not exist"));
        }
        let delimiter = u8::try_from(self.delimiter)
            .map_err(|_| self.error(format!("delimiter '{}' is not ASCII", self.delimiter)))?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(false)
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| self.error(e))?;

        let mut grid = Grid::new();
        for record in reader.records() {
            let record = record.map_err(|e| self.error(e))?;
            grid.push(
                record
                    .iter()
                    .map(|field| if field.is_empty() { None } else { Some(field.to_string()) })
                    .collect(),
            );
        }
        Ok(grid)
    }
}

/// Returns the reader matching the descriptor's file type.
///
/// # Errors
/// * `Error::SourceReadError` if the file type is not supported or a
///   workbook descriptor has no sheet
pub fn reader_for(descriptor: &SourceDescriptor, root: &Path) -> Result<Box<dyn GridReader>> {
    let path = root.join(&descriptor.filename);
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        let sheet = descriptor
            .sheet
            .clone()
            .ok_or_else(|| read_error(&descriptor.id, &path, "no sheet given"))?;
        Ok(Box::new(WorkbookReader::new(descriptor.id.clone(), path, sheet)))
    } else if CSV_EXTENSIONS.contains(&extension.as_str()) {
        Ok(Box::new(CsvReader::new(descriptor.id.clone(), path, descriptor.delimiter)))
    } else {
        Err(read_error(&descriptor.id, &path, "unsupported file type"))
    }
}
