//! Output reconciliation.
//!
//! Every write to a file that may already exist goes through here: the new
//! content is written to a candidate next to the target, compared with the
//! current file, optionally confirmed by the operator, and finally renamed
//! over the target. The previous content is kept as a single backup. A
//! candidate equal to the target is discarded without touching anything.

use crate::constants::{BACKUP_SUFFIX, CANDIDATE_SUFFIX};
use crate::diagnostics::Diagnostics;
use crate::encoding::{read_text, write_text};
use crate::error::Result;
use crate::prompt::Prompter;
use diffy::{create_patch, PatchFormatter};
use encoding_rs::{Encoding, WINDOWS_1252};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// What happened to the target file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// The target did not exist and now holds the candidate
    Created,
    /// The target was replaced; its previous content is in `backup`
    Replaced { backup: PathBuf },
    /// The candidate matched the target and was discarded
    Unchanged,
    /// The operator rejected the change; the target is untouched
    Declined,
}

impl std::fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Reconciliation::Created => write!(f, "created"),
            Reconciliation::Replaced { backup } => {
                write!(f, "replaced (backup: '{}')", backup.display())
            }
            Reconciliation::Unchanged => write!(f, "unchanged"),
            Reconciliation::Declined => write!(f, "declined"),
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// `<target>.bak`
pub fn backup_path<P: AsRef<Path>>(target: P) -> PathBuf {
    with_suffix(target.as_ref(), BACKUP_SUFFIX)
}

/// `<target>.new`
pub fn candidate_path<P: AsRef<Path>>(target: P) -> PathBuf {
    with_suffix(target.as_ref(), CANDIDATE_SUFFIX)
}

/// Unified diff between two texts, or `None` when they are equal.
pub fn diff_text(original: &str, modified: &str, color: bool) -> Option<String> {
    let patch = create_patch(original, modified);
    if patch.hunks().is_empty() {
        return None;
    }
    let formatter = if color { PatchFormatter::new().with_color() } else { PatchFormatter::new() };
    let text = formatter.fmt_patch(&patch).to_string();
    Some(text)
}

/// Guards replacement of existing files.
pub struct Reconciler<'a> {
    prompt: &'a dyn Prompter,
    diag: &'a dyn Diagnostics,
    encoding: &'static Encoding,
}

impl<'a> Reconciler<'a> {
    /// Creates a reconciler for Windows-1252 files.
    pub fn new(prompt: &'a dyn Prompter, diag: &'a dyn Diagnostics) -> Self {
        Self { prompt, diag, encoding: WINDOWS_1252 }
    }

    /// Reads and writes files in `encoding` instead.
    pub fn with_encoding(mut self, encoding: &'static Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Writes `content` to the candidate path of `target` and reconciles it.
    pub fn commit<P: AsRef<Path>>(
        &self,
        target: P,
        content: &str,
        verify: bool,
    ) -> Result<Reconciliation> {
        let target = target.as_ref();
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let candidate = candidate_path(target);
        if write_text(&candidate, content, self.encoding)? {
            self.diag.warn(&format!(
                "'{}' contains characters that {} cannot represent",
                target.display(),
                self.encoding.name()
            ));
        }
        self.diag.debug(&format!("Wrote candidate '{}'", candidate.display()));
        self.reconcile(target, &candidate, verify)
    }

    /// Decides whether `candidate` replaces `original`.
    ///
    /// # Arguments
    /// * `original` - Target file, may not exist yet
    /// * `candidate` - Freshly written replacement
    /// * `verify` - Ask before replacing a file whose content changes; a
    ///   candidate equal to the original is always discarded
    ///
    /// # Returns
    /// * `Result<Reconciliation>` - The outcome; the candidate never survives
    ///   a successful call
    pub fn reconcile<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        original: P,
        candidate: Q,
        verify: bool,
    ) -> Result<Reconciliation> {
        let original = original.as_ref();
        let candidate = candidate.as_ref();

        if !original.exists() {
            fs::rename(candidate, original)?;
            self.diag.info(&format!("Created '{}'", original.display()));
            return Ok(Reconciliation::Created);
        }

        let old = read_text(original, self.encoding)?;
        let new = read_text(candidate, self.encoding)?;
        let Some(diff) = diff_text(&old, &new, true) else {
            fs::remove_file(candidate)?;
            self.diag.info(&format!("No change from '{}'", original.display()));
            return Ok(Reconciliation::Unchanged);
        };

        if verify {
            self.prompt.present(&diff);
            let accepted =
                self.prompt.confirm(false, format!("Replace '{}'?", original.display()))?;
            if !accepted {
                fs::remove_file(candidate)?;
                self.diag.info(&format!("Kept '{}'", original.display()));
                return Ok(Reconciliation::Declined);
            }
        }

        let backup = backup_path(original);
        if backup.exists() {
            fs::remove_file(&backup)?;
        }
        fs::copy(original, &backup)?;
        fs::rename(candidate, original)?;
        self.diag.info(&format!(
            "Replaced '{}' (backup in '{}')",
            original.display(),
            backup.display()
        ));
        Ok(Reconciliation::Replaced { backup })
    }
}
