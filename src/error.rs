//! Error handling for sheetgen.
//! Defines the error type and result alias used throughout the application.

use std::io;
use thiserror::Error;

/// Errors that can occur while generating or recovering configuration files.
///
/// Every variant except the wrapped foreign errors names the identifier
/// (source id, template name, row key) that caused it.
#[derive(Error, Debug)]
pub enum Error {
    /// Represents errors that occur during file system operations
    #[error("IO error: {0}.")]
    IoError(#[from] io::Error),

    /// Represents errors raised while decoding the YAML configuration
    #[error("Failed to parse configuration: {0}.")]
    YamlError(#[from] serde_yaml::Error),

    /// Represents configuration validation failures
    #[error("Configuration error: {0}.")]
    ConfigError(String),

    /// A single tabular source could not be read or reduced to a table
    #[error("Cannot read source '{source_id}' from '{path}': {reason}.")]
    SourceReadError { source_id: String, path: String, reason: String },

    /// One or more sources failed while building the registry
    #[error("Failed to load {} source(s):\n{}", .0.len(), join_errors(.0))]
    SourceErrors(Vec<Error>),

    /// A layout entry references a source id that was never declared
    #[error("Template '{template}' references unknown source '{source_id}'.")]
    UnknownSource { template: String, source_id: String },

    /// The named template does not exist in the template directory
    #[error("Template '{name}' not found.")]
    TemplateNotFound { name: String },

    /// Strict rendering hit a reference that is not in the value context
    #[error("Undefined value in template '{template}' (row '{row}'): {detail}.")]
    UndefinedValue { template: String, row: String, detail: String },

    /// Any other failure reported by the templating evaluator
    #[error("Failed to render template '{template}': {detail}.")]
    RenderError { template: String, detail: String },

    /// The master key does not identify a row of the source
    #[error("Master key '{key}' not found in source '{source_id}'.")]
    UnknownMasterKey { key: String, source_id: String },

    /// Recovery was requested for a template without any master key configured
    #[error("No master key configured for template '{template}'.")]
    MissingMasterKey { template: String },

    /// Strict recovery found substitutions it cannot perform unambiguously
    #[error("Ambiguous substitution in template '{template}': {issues}.")]
    AmbiguousSubstitution { template: String, issues: String },

    /// A literal value could not be turned into a match pattern
    #[error("Pattern error: {0}.")]
    PatternError(#[from] regex::Error),

    /// Represents errors raised by the interactive prompt
    #[error("Prompt error: {0}.")]
    PromptError(#[from] dialoguer::Error),
}

fn join_errors(errors: &[Error]) -> String {
    errors.iter().map(|e| format!("  - {e}")).collect::<Vec<_>>().join("\n")
}

/// Convenience type alias for Results with sheetgen's Error as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Default error handler that prints the error and exits the program.
///
/// # Arguments
/// * `err` - The Error to handle
///
/// # Behavior
/// Prints the error message to stderr and exits with status code 1
pub fn default_error_handler(err: Error) {
    eprintln!("{err}");
    std::process::exit(1);
}
