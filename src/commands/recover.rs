use crate::config::{get_config, Config};
use crate::diagnostics::Diagnostics;
use crate::encoding::read_text;
use crate::error::{Error, Result};
use crate::prompt::Prompter;
use crate::reconcile::{Reconciler, Reconciliation};
use crate::reverse::{reverse, SubstitutionPolicy, SubstitutionReport};
use crate::source::{get_all, SourceRegistry};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Command line options for `recover`.
#[derive(Debug, Clone, Default)]
pub struct RecoverOptions {
    /// Only recover these templates; all master files when empty
    pub templates: Vec<String>,
    /// Overrides `verifycontent`
    pub verify: Option<bool>,
    pub policy: SubstitutionPolicy,
}

/// One template recovered from its master file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveredTemplate {
    pub name: String,
    pub path: PathBuf,
    pub report: SubstitutionReport,
    pub result: Reconciliation,
}

struct Pending {
    name: String,
    path: PathBuf,
    text: String,
    report: SubstitutionReport,
}

/// File names directly inside the master directory, sorted.
fn master_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Err(Error::ConfigError(format!(
            "master directory '{}' does not exist",
            dir.display()
        )));
    }
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(e.into()))?;
        if entry.file_type().is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

fn recover_one(
    config: &Config,
    registry: &SourceRegistry,
    master_dir: &Path,
    name: &str,
    policy: SubstitutionPolicy,
    diag: &dyn Diagnostics,
) -> Result<Option<Pending>> {
    let Some(entry) = config.layout.iter().find(|e| e.name == name) else {
        diag.warn(&format!("Master file '{name}' has no layout entry, skipping"));
        return Ok(None);
    };
    let Some(source_id) = &entry.source else {
        diag.warn(&format!("Template '{name}' has no source, skipping"));
        return Ok(None);
    };
    let table = registry.get(source_id).ok_or_else(|| Error::UnknownSource {
        template: name.to_string(),
        source_id: source_id.clone(),
    })?;
    let masterkey = entry
        .masterkey
        .as_deref()
        .or(config.masterkey.as_deref())
        .ok_or_else(|| Error::MissingMasterKey { template: name.to_string() })?;

    let master_text = read_text(master_dir.join(name), config.text_encoding)?;
    let (text, report) = reverse(&master_text, table, masterkey)?;
    report.enforce(policy, name, diag)?;
    diag.debug(&format!(
        "Recovered '{name}' from row '{masterkey}' with {} replacement(s)",
        report.total()
    ));

    Ok(Some(Pending {
        name: name.to_string(),
        path: config.template_dir().join(name),
        text,
        report,
    }))
}

/// Recovers templates from the master files of the configuration.
///
/// All templates are recovered in memory before the first one is committed,
/// so a fatal error leaves every template file untouched.
pub fn recover_templates<P: AsRef<Path>>(
    config_path: P,
    options: &RecoverOptions,
    prompt: &dyn Prompter,
    diag: &dyn Diagnostics,
) -> Result<Vec<RecoveredTemplate>> {
    let config = get_config(config_path, diag)?;
    let master_dir = config.master_dir().ok_or_else(|| {
        Error::ConfigError("field 'masterpath' is required to recover templates".to_string())
    })?;
    let names = master_files(&master_dir)?;

    if let Some(missing) = options.templates.iter().find(|t| !names.contains(*t)) {
        return Err(Error::ConfigError(format!(
            "no master file '{missing}' in '{}'",
            master_dir.display()
        )));
    }

    let registry = get_all(&config.sources, &config.root, diag)?;

    let mut pending = Vec::new();
    for name in &names {
        if !options.templates.is_empty() && !options.templates.contains(name) {
            continue;
        }
        if let Some(p) = recover_one(&config, &registry, &master_dir, name, options.policy, diag)? {
            pending.push(p);
        }
    }

    let verify = options.verify.unwrap_or(config.verifycontent);
    let reconciler = Reconciler::new(prompt, diag).with_encoding(config.text_encoding);
    let mut recovered = Vec::with_capacity(pending.len());
    for p in pending {
        let result = reconciler.commit(&p.path, &p.text, verify)?;
        recovered.push(RecoveredTemplate { name: p.name, path: p.path, report: p.report, result });
    }
    Ok(recovered)
}
