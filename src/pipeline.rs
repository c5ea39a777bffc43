//! Render pipeline: row selection, per-entry rendering and concatenation of
//! the full output in layout order.

use crate::config::LayoutEntry;
use crate::constants::LINE_TERMINATOR;
use crate::diagnostics::Diagnostics;
use crate::error::{Error, Result};
use crate::renderer::TemplateRenderer;
use crate::source::{Row, SourceRegistry, SourceTable};
use minijinja::ErrorKind;
use std::collections::HashSet;

/// Row keys of `table` selected by `entry`, in table order.
///
/// An `include` list is authoritative and makes `exclude` irrelevant;
/// otherwise every row not listed in `exclude` is selected.
pub fn select_rows<'a>(entry: &LayoutEntry, table: &'a SourceTable) -> Vec<&'a str> {
    match (&entry.include, &entry.exclude) {
        (Some(include), _) => {
            let include: HashSet<&str> = include.iter().map(String::as_str).collect();
            table.keys().filter(|key| include.contains(key)).collect()
        }
        (None, Some(exclude)) => {
            let exclude: HashSet<&str> = exclude.iter().map(String::as_str).collect();
            table.keys().filter(|key| !exclude.contains(key)).collect()
        }
        (None, None) => table.keys().collect(),
    }
}

/// Converts line endings to `\n` and leaves exactly one terminator at the end.
pub fn normalize_block(text: &str) -> String {
    let mut block = text.replace("\r\n", "\n");
    block.truncate(block.trim_end_matches('\n').len());
    block.push_str(LINE_TERMINATOR);
    block
}

/// Builds the value context for one row.
pub fn row_context(row: &Row) -> serde_json::Value {
    let map = row
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Some(v) => serde_json::Value::String(v.clone()),
                None => serde_json::Value::Null,
            };
            (key.clone(), value)
        })
        .collect();
    serde_json::Value::Object(map)
}

fn classify(err: minijinja::Error, template: &str, row: Option<&str>) -> Error {
    match err.kind() {
        ErrorKind::TemplateNotFound => Error::TemplateNotFound { name: template.to_string() },
        ErrorKind::UndefinedError => Error::UndefinedValue {
            template: template.to_string(),
            row: row.unwrap_or("-").to_string(),
            detail: err.to_string(),
        },
        _ => Error::RenderError { template: template.to_string(), detail: err.to_string() },
    }
}

/// Renders one layout entry.
///
/// # Returns
/// * `Result<Vec<String>>` - One normalized block per selected row, or at
///   most one block for an entry without a source
///
/// # Errors
/// * `Error::UnknownSource` if the entry's source is not in the registry
/// * `Error::TemplateNotFound` if the template cannot be resolved
/// * `Error::UndefinedValue` if the template references a missing value
pub fn render_entry(
    entry: &LayoutEntry,
    registry: &SourceRegistry,
    renderer: &dyn TemplateRenderer,
    diag: &dyn Diagnostics,
) -> Result<Vec<String>> {
    let Some(source_id) = &entry.source else {
        let rendered = renderer
            .render(&entry.name, &serde_json::Value::Object(serde_json::Map::new()))
            .map_err(|e| classify(e, &entry.name, None))?;
        diag.debug(&format!("Rendered '{}' without source", entry.name));
        if rendered.trim_end_matches(['\r', '\n']).is_empty() {
            return Ok(Vec::new());
        }
        return Ok(vec![normalize_block(&rendered)]);
    };

    let table = registry.get(source_id).ok_or_else(|| Error::UnknownSource {
        template: entry.name.clone(),
        source_id: source_id.clone(),
    })?;

    if let Some(include) = &entry.include {
        for key in include.iter().filter(|k| !table.contains_key(k.as_str())) {
            diag.warn(&format!(
                "Template '{}' includes row '{}' which is not in source '{}'",
                entry.name, key, source_id
            ));
        }
    }

    let selected = select_rows(entry, table);
    let mut blocks = Vec::with_capacity(selected.len());
    for key in selected {
        let Some(row) = table.get(key) else { continue };
        let rendered = renderer
            .render(&entry.name, &row_context(row))
            .map_err(|e| classify(e, &entry.name, Some(key)))?;
        blocks.push(normalize_block(&rendered));
    }
    diag.debug(&format!(
        "Rendered '{}' for {} row(s) of source '{}'",
        entry.name,
        blocks.len(),
        source_id
    ));
    Ok(blocks)
}

/// Renders the whole layout into one text, in layout order.
pub fn generate(
    layout: &[LayoutEntry],
    registry: &SourceRegistry,
    renderer: &dyn TemplateRenderer,
    diag: &dyn Diagnostics,
) -> Result<String> {
    let mut output = String::new();
    for entry in layout {
        for block in render_entry(entry, registry, renderer, diag)? {
            output.push_str(&block);
        }
    }
    Ok(output)
}
