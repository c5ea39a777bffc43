//! sheetgen's main application entry point.
//! Parses the command line, sets up logging and dispatches to the commands.

use std::io::IsTerminal;

use sheetgen::{
    cli::{get_args, Args, Command},
    commands::{diff_files, generate_config, recover_templates, GenerateOutcome},
    diagnostics::LogDiagnostics,
    encoding::resolve,
    error::{default_error_handler, Result},
    logger::init_logger,
    prompt::DialoguerPrompter,
};

/// Main application entry point.
fn main() {
    let args = get_args();

    init_logger(args.verbose, args.silent);

    if let Err(err) = run(args) {
        default_error_handler(err);
    }
}

/// Main application logic execution.
///
/// # Arguments
/// * `args` - Parsed command line arguments
///
/// # Returns
/// * `Result<()>` - Success, including a declined or unchanged replacement
fn run(args: Args) -> Result<()> {
    let prompt = DialoguerPrompter::new();
    let diag = LogDiagnostics::new();

    match args.command {
        Command::Generate(generate) => {
            match generate_config(&generate.config_file, &generate.options(), &prompt, &diag)? {
                GenerateOutcome::Printed(text) => print!("{text}"),
                GenerateOutcome::Written { path, result } => {
                    println!("{}: '{}'", result, path.display());
                }
                GenerateOutcome::Skipped { path } => {
                    println!("up to date: '{}'", path.display());
                }
            }
        }
        Command::Recover(recover) => {
            let recovered =
                recover_templates(&recover.config_file, &recover.options(), &prompt, &diag)?;
            for template in recovered {
                println!("{}: '{}'", template.result, template.path.display());
                for entry in &template.report.entries {
                    println!(
                        "  {} <- '{}': {} replacement(s)",
                        entry.placeholder, entry.value, entry.count
                    );
                }
            }
        }
        Command::Diff(diff) => {
            let color = std::io::stdout().is_terminal();
            let encoding = resolve(&diff.encoding)?;
            match diff_files(&diff.original, &diff.modified, encoding, color)? {
                Some(patch) => println!("{patch}"),
                None => println!("Files are identical."),
            }
        }
    }
    Ok(())
}
