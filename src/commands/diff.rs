use crate::encoding::read_text;
use crate::error::Result;
use crate::reconcile::diff_text;
use encoding_rs::Encoding;
use std::path::Path;

/// Compares two text files decoded with `encoding`.
///
/// # Returns
/// * `Result<Option<String>>` - The unified diff, or `None` when the files
///   are identical
pub fn diff_files<P: AsRef<Path>, Q: AsRef<Path>>(
    original: P,
    modified: Q,
    encoding: &'static Encoding,
    color: bool,
) -> Result<Option<String>> {
    let original = read_text(original, encoding)?;
    let modified = read_text(modified, encoding)?;
    Ok(diff_text(&original, &modified, color))
}
