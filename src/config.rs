//! Configuration handling for sheetgen.
//! This module loads the YAML configuration file into typed structures and
//! validates it once, so the rest of the pipeline can rely on its shape.

use crate::constants::{CONFIG_EXTENSION, CSV_EXTENSIONS, DEFAULT_ENCODING, WORKBOOK_EXTENSIONS};
use crate::diagnostics::Diagnostics;
use crate::encoding::resolve;
use crate::error::{Error, Result};
use encoding_rs::{Encoding, WINDOWS_1252};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

const fn default_true() -> bool {
    true
}

fn default_encoding() -> String {
    DEFAULT_ENCODING.to_string()
}

fn default_text_encoding() -> &'static Encoding {
    WINDOWS_1252
}

/// A named counter shared by every template of a run.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CounterSpec {
    pub name: String,
    /// Value before the first increment
    #[serde(default)]
    pub value: i64,
}

/// One tabular data source.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SourceDescriptor {
    /// Unique identifier referenced by layout entries
    pub id: String,
    /// Workbook or CSV file, relative to the configuration directory
    pub filename: PathBuf,
    /// Sheet name, required for workbooks
    pub sheet: Option<String>,
    /// Field delimiter, CSV only
    pub delimiter: Option<char>,
}

/// One template to render and the rows that drive it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct LayoutEntry {
    /// Template file name inside the template directory
    pub name: String,
    /// Source id to iterate over; renders once without rows when absent
    pub source: Option<String>,
    /// Row keys to render; takes precedence over `exclude`
    pub include: Option<Vec<String>>,
    /// Row keys to skip when no `include` list is given
    pub exclude: Option<Vec<String>>,
    /// Row used as the master example when recovering this template
    pub masterkey: Option<String>,
}

impl LayoutEntry {
    /// Builds an entry that renders `name` once, without a source.
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Builds an entry that renders `name` for every row of `source`.
    pub fn with_source<S: Into<String>, T: Into<String>>(name: S, source: T) -> Self {
        Self { name: name.into(), source: Some(source.into()), ..Default::default() }
    }
}

/// Validated configuration.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The file that will be generated. Written to stdout when absent.
    pub outputfile: Option<PathBuf>,
    /// Directory containing all templates
    pub templatepath: PathBuf,
    /// Directory containing master examples for template recovery
    pub masterpath: Option<PathBuf>,
    /// Default master row for template recovery
    pub masterkey: Option<String>,
    /// Ask for confirmation before replacing an existing file that differs
    #[serde(default = "default_true")]
    pub verifycontent: bool,
    /// Encoding label for templates, master files and the output file
    #[serde(default = "default_encoding")]
    pub encoding: String,
    /// Counters available as template functions
    #[serde(default)]
    pub counters: Vec<CounterSpec>,
    #[serde(default)]
    pub sources: Vec<SourceDescriptor>,
    /// Templates in the order they are rendered
    pub layout: Vec<LayoutEntry>,
    /// Directory of the configuration file; relative paths resolve against it
    #[serde(skip)]
    pub root: PathBuf,
    /// The resolved `encoding`
    #[serde(skip, default = "default_text_encoding")]
    pub text_encoding: &'static Encoding,
}

impl Config {
    pub fn template_dir(&self) -> PathBuf {
        self.root.join(&self.templatepath)
    }

    pub fn master_dir(&self) -> Option<PathBuf> {
        self.masterpath.as_ref().map(|p| self.root.join(p))
    }

    pub fn output_file(&self) -> Option<PathBuf> {
        self.outputfile.as_ref().map(|p| self.root.join(p))
    }
}

/// Appends the default extension to a configuration path that has none.
pub fn with_default_extension<P: AsRef<Path>>(path: P) -> PathBuf {
    let mut path = path.as_ref().to_path_buf();
    if path.extension().is_none() {
        path.set_extension(CONFIG_EXTENSION);
    }
    path
}

/// Parses and validates configuration content.
///
/// # Arguments
/// * `content` - Raw YAML content
/// * `root` - Directory relative paths are resolved against
/// * `diag` - Sink for non-fatal findings
///
/// # Errors
/// * `Error::YamlError` if the content does not match the schema
/// * `Error::ConfigError` if validation fails
pub fn parse_config(content: &str, root: &Path, diag: &dyn Diagnostics) -> Result<Config> {
    let mut config: Config = serde_yaml::from_str(content)?;
    config.root = root.to_path_buf();
    validate_config(&config, diag)?;
    config.text_encoding = resolve(&config.encoding)?;
    Ok(config)
}

/// Loads the configuration file at `path`.
///
/// # Errors
/// * `Error::ConfigError` if the file does not exist
/// * Any error from [`parse_config`]
pub fn get_config<P: AsRef<Path>>(path: P, diag: &dyn Diagnostics) -> Result<Config> {
    let path = with_default_extension(path);
    if !path.is_file() {
        return Err(Error::ConfigError(format!(
            "configuration file '{}' does not exist",
            path.display()
        )));
    }
    diag.debug(&format!("Loading configuration from {}", path.display()));

    let content = std::fs::read_to_string(&path)?;
    let root = path.parent().map(Path::to_path_buf).unwrap_or_default();
    parse_config(&content, &root, diag)
}

fn validate_config(config: &Config, diag: &dyn Diagnostics) -> Result<()> {
    let mut ids = HashSet::new();
    for source in &config.sources {
        if !ids.insert(source.id.as_str()) {
            return Err(Error::ConfigError(format!("duplicate source id '{}'", source.id)));
        }
        validate_source(source)?;
    }

    let mut counters = HashSet::new();
    for counter in &config.counters {
        if !counters.insert(counter.name.as_str()) {
            return Err(Error::ConfigError(format!("duplicate counter '{}'", counter.name)));
        }
    }

    for entry in &config.layout {
        if let Some(source) = &entry.source {
            if !ids.contains(source.as_str()) {
                return Err(Error::UnknownSource {
                    template: entry.name.clone(),
                    source_id: source.clone(),
                });
            }
        } else if entry.include.is_some() || entry.exclude.is_some() {
            return Err(Error::ConfigError(format!(
                "template '{}' has include/exclude but no source",
                entry.name
            )));
        }
        if entry.include.is_some() && entry.exclude.is_some() {
            diag.warn(&format!(
                "Template '{}' has both include and exclude; exclude is ignored",
                entry.name
            ));
        }
    }
    Ok(())
}

/// Checks a source descriptor against the rules for its file type.
pub fn validate_source(source: &SourceDescriptor) -> Result<()> {
    let extension = source
        .filename
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
        if source.sheet.is_none() {
            return Err(Error::ConfigError(format!(
                "missing field 'sheet' for workbook source '{}'",
                source.id
            )));
        }
        if source.delimiter.is_some() {
            return Err(Error::ConfigError(format!(
                "field 'delimiter' invalid for workbook source '{}'",
                source.id
            )));
        }
    } else if CSV_EXTENSIONS.contains(&extension.as_str()) {
        if source.sheet.is_some() {
            return Err(Error::ConfigError(format!(
                "field 'sheet' invalid for .csv source '{}'",
                source.id
            )));
        }
    } else {
        return Err(Error::ConfigError(format!(
            "invalid file extension for source '{}'",
            source.id
        )));
    }
    Ok(())
}
