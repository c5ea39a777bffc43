//! Source tables and the registry that holds them.
//!
//! A [`SourceTable`] is the populated rectangle of one tabular source: the
//! first row holds column headers, the first column holds row keys.

use crate::config::SourceDescriptor;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::Path;

pub mod reader;

pub use reader::{reader_for, CsvReader, Grid, GridReader, WorkbookReader};

/// Column header to cell value, in column order. `None` marks an empty cell.
pub type Row = IndexMap<String, Option<String>>;

/// One source, keyed by the identifying first column, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    id: String,
    columns: Vec<String>,
    rows: IndexMap<String, Row>,
}

impl SourceTable {
    /// Reduces a grid to a table.
    ///
    /// Columns end at the first empty header cell and rows end at the first
    /// row without any value in those columns.
    ///
    /// # Errors
    /// * `Error::SourceReadError` on duplicate headers, duplicate row keys or
    ///   a populated row without a key
    pub fn from_grid<S: Into<String>>(id: S, grid: &Grid) -> Result<Self> {
        let id = id.into();
        let invalid = |reason: String| Error::SourceReadError {
            source_id: id.clone(),
            path: String::new(),
            reason,
        };

        let mut columns: Vec<String> = Vec::new();
        if let Some(header) = grid.first() {
            for cell in header {
                let Some(name) = cell else { break };
                if columns.contains(name) {
                    return Err(invalid(format!("duplicate column header '{name}'")));
                }
                columns.push(name.clone());
            }
        }

        let mut rows = IndexMap::new();
        for (index, cells) in grid.iter().enumerate().skip(1) {
            let values: Vec<Option<String>> =
                (0..columns.len()).map(|col| cells.get(col).cloned().flatten()).collect();
            if values.iter().all(Option::is_none) {
                break;
            }
            let Some(key) = values[0].clone() else {
                return Err(invalid(format!("row {} has no key", index + 1)));
            };
            let row: Row = columns.iter().cloned().zip(values).collect();
            if rows.insert(key.clone(), row).is_some() {
                return Err(invalid(format!("duplicate row key '{key}'")));
            }
        }

        Ok(Self { id, columns, rows })
    }

    /// Builds a table directly from rows, deriving columns from the first row.
    pub fn from_rows<S: Into<String>>(id: S, rows: IndexMap<String, Row>) -> Self {
        let columns = rows.values().next().map(|r| r.keys().cloned().collect()).unwrap_or_default();
        Self { id: id.into(), columns, rows }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, key: &str) -> Option<&Row> {
        self.rows.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Row keys in source order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    /// Rows in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Row)> {
        self.rows.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reads and reduces one source.
///
/// # Errors
/// * `Error::SourceReadError` if the file is missing, unreadable, in an
///   unsupported format, or the sheet does not exist
pub fn load(descriptor: &SourceDescriptor, root: &Path) -> Result<SourceTable> {
    let path = root.join(&descriptor.filename);
    let grid = reader_for(descriptor, root)?.read()?;
    SourceTable::from_grid(descriptor.id.clone(), &grid).map_err(|e| match e {
        Error::SourceReadError { source_id, reason, .. } => Error::SourceReadError {
            source_id,
            path: path.display().to_string(),
            reason,
        },
        other => other,
    })
}

/// All source tables of a run, keyed by source id.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    tables: HashMap<String, SourceTable>,
}

impl SourceRegistry {
    pub fn new(tables: Vec<SourceTable>) -> Self {
        Self { tables: tables.into_iter().map(|t| (t.id.clone(), t)).collect() }
    }

    pub fn get(&self, id: &str) -> Option<&SourceTable> {
        self.tables.get(id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Loads every source, failing as a whole if any single source fails.
///
/// # Errors
/// * `Error::SourceErrors` carrying every per-source failure
pub fn get_all(
    descriptors: &[SourceDescriptor],
    root: &Path,
    diag: &dyn Diagnostics,
) -> Result<SourceRegistry> {
    let mut tables = Vec::new();
    let mut errors = Vec::new();

    for descriptor in descriptors {
        match load(descriptor, root) {
            Ok(table) => {
                diag.debug(&format!(
                    "Loaded source '{}' with {} rows and {} columns",
                    table.id(),
                    table.len(),
                    table.columns().len()
                ));
                tables.push(table);
            }
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(Error::SourceErrors(errors));
    }
    Ok(SourceRegistry::new(tables))
}
