use crate::config::{get_config, with_default_extension, Config};
use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::pipeline::generate;
use crate::prompt::Prompter;
use crate::reconcile::{Reconciler, Reconciliation};
use crate::renderer::MiniJinjaRenderer;
use crate::source::get_all;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Command line overrides for `generate`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Output file, relative to the working directory; overrides `outputfile`
    pub output: Option<PathBuf>,
    /// Overrides `verifycontent`
    pub verify: Option<bool>,
    /// Global template variables
    pub globals: Vec<(String, String)>,
    /// Skip the run when no input is newer than the output file
    pub if_changed: bool,
}

/// Where the generated text went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateOutcome {
    /// No output file is configured; the caller prints the text
    Printed(String),
    /// The text was reconciled against `path`
    Written { path: PathBuf, result: Reconciliation },
    /// Nothing was rendered because `path` is newer than every input
    Skipped { path: PathBuf },
}

/// Files the output depends on: the configuration, every source and every
/// layout template.
fn input_files(config: &Config, config_path: &Path) -> Vec<PathBuf> {
    let mut inputs = vec![config_path.to_path_buf()];
    inputs.extend(config.sources.iter().map(|s| config.root.join(&s.filename)));
    let template_dir = config.template_dir();
    for entry in &config.layout {
        let path = template_dir.join(&entry.name);
        if !inputs.contains(&path) {
            inputs.push(path);
        }
    }
    inputs
}

fn modified(path: &Path) -> Result<SystemTime> {
    Ok(std::fs::metadata(path)?.modified()?)
}

/// Whether any existing input was modified after `output`.
///
/// A missing output is always out of date. Inputs that do not exist are
/// ignored here; loading reports them.
pub fn inputs_newer_than(inputs: &[PathBuf], output: &Path) -> Result<bool> {
    if !output.exists() {
        return Ok(true);
    }
    let built = modified(output)?;
    for input in inputs.iter().filter(|p| p.exists()) {
        if modified(input)? > built {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Generates the configured output file.
///
/// Everything is rendered in memory first; the output file is only touched
/// once rendering has succeeded.
pub fn generate_config<P: AsRef<Path>>(
    config_path: P,
    options: &GenerateOptions,
    prompt: &dyn Prompter,
    diag: &dyn Diagnostics,
) -> Result<GenerateOutcome> {
    let config_path = with_default_extension(config_path);
    let config = get_config(&config_path, diag)?;
    let output = options.output.clone().or_else(|| config.output_file());

    if let Some(path) = output.as_ref().filter(|_| options.if_changed) {
        if !inputs_newer_than(&input_files(&config, &config_path), path)? {
            diag.info("No files have changed. Skipping rebuild.");
            return Ok(GenerateOutcome::Skipped { path: path.clone() });
        }
    }

    let registry = get_all(&config.sources, &config.root, diag)?;

    let mut renderer = MiniJinjaRenderer::with_encoding(config.template_dir(), config.text_encoding);
    renderer.add_build_info(&config.root);
    renderer.add_counters(&config.counters);
    renderer.add_globals(&options.globals);

    let rendered = generate(&config.layout, &registry, &renderer, diag)?;

    let Some(path) = output else {
        return Ok(GenerateOutcome::Printed(rendered));
    };
    let verify = options.verify.unwrap_or(config.verifycontent);
    let result = Reconciler::new(prompt, diag)
        .with_encoding(config.text_encoding)
        .commit(&path, &rendered, verify)?;
    Ok(GenerateOutcome::Written { path, result })
}
