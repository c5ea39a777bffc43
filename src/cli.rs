//! Command-line interface implementation for sheetgen.
//! Provides argument parsing and help text formatting using clap.

use crate::commands::{GenerateOptions, RecoverOptions};
use crate::constants::DEFAULT_ENCODING;
use crate::reverse::SubstitutionPolicy;
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments structure for sheetgen.
#[derive(Parser, Debug)]
#[command(author, version, about = "sheetgen: generate configuration files from spreadsheets and templates", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only output warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the configuration file from sources and templates
    Generate(GenerateArgs),
    /// Recover templates from rendered master files
    Recover(RecoverArgs),
    /// Show the difference between two text files
    Diff(DiffArgs),
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// The yaml config file
    #[arg(value_name = "CONFIG")]
    pub config_file: PathBuf,

    /// Name of output file (overrides config option "outputfile")
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Replace the output file without asking (overrides config option "verifycontent")
    #[arg(short = 'n', long = "no-verify")]
    pub no_verify: bool,

    /// Global variable visible in all templates. Can be repeated.
    #[arg(short = 'V', long = "var", num_args = 2, value_names = ["NAME", "VALUE"])]
    pub var: Vec<String>,

    /// Only generate if the config, a source or a template is newer than the output file
    #[arg(long)]
    pub ifchanged: bool,
}

#[derive(Parser, Debug)]
pub struct RecoverArgs {
    /// The yaml config file
    #[arg(value_name = "CONFIG")]
    pub config_file: PathBuf,

    /// Only recover this template. Can be repeated.
    #[arg(short, long = "template", value_name = "NAME")]
    pub templates: Vec<String>,

    /// Replace templates without asking (overrides config option "verifycontent")
    #[arg(short = 'n', long = "no-verify")]
    pub no_verify: bool,

    /// Fail instead of warning when a substitution is missing or ambiguous
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct DiffArgs {
    /// Original file
    pub original: PathBuf,

    /// Modified file
    pub modified: PathBuf,

    /// Encoding of both files
    #[arg(short, long, default_value = DEFAULT_ENCODING)]
    pub encoding: String,
}

impl GenerateArgs {
    pub fn options(&self) -> GenerateOptions {
        GenerateOptions {
            output: self.output.clone(),
            verify: self.no_verify.then_some(false),
            globals: self
                .var
                .chunks(2)
                .filter(|pair| pair.len() == 2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect(),
            if_changed: self.ifchanged,
        }
    }
}

impl RecoverArgs {
    pub fn options(&self) -> RecoverOptions {
        RecoverOptions {
            templates: self.templates.clone(),
            verify: self.no_verify.then_some(false),
            policy: if self.strict { SubstitutionPolicy::Strict } else { SubstitutionPolicy::Warn },
        }
    }
}

/// Parses command line arguments and returns the Args structure.
///
/// # Returns
/// * `Args` - Parsed command line arguments
///
/// # Exits
/// * With status code 1 if required arguments or the subcommand are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(
                e.kind(),
                ErrorKind::MissingRequiredArgument
                    | ErrorKind::MissingSubcommand
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
