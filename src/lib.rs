//! sheetgen generates text configuration files from tabular sources and
//! templates, and recovers templates from previously rendered examples.

/// Command-line interface module for the sheetgen application
pub mod cli;

/// Generate, recover and diff operations
pub mod commands;

/// YAML configuration loading and validation
pub mod config;

/// Common constants
pub mod constants;

/// Injected diagnostic output
pub mod diagnostics;

/// Decoding and encoding of text files
pub mod encoding;

/// Error types and handling for the sheetgen application
pub mod error;

/// Logger setup for the binary
pub mod logger;

/// Row selection and ordered rendering of the layout
pub mod pipeline;

/// User input and interaction handling
pub mod prompt;

/// Diff, backup and atomic replacement of output files
pub mod reconcile;

/// MiniJinja template rendering
pub mod renderer;

/// Recovery of templates from rendered master files
pub mod reverse;

/// Source tables and the source registry
/// Reads .xlsx/.xlsm/.xlsb/.xls/.ods workbooks and .csv files
pub mod source;
