//! Text encoding of templates, master files and generated output.
//!
//! Files are decoded with the configured encoding unless they start with a
//! byte order mark, and written back in the configured encoding.

use crate::error::{Error, Result};
use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Looks up an encoding by its WHATWG label (`Windows-1252`, `utf-8`, ...).
///
/// # Errors
/// * `Error::ConfigError` if the label is unknown
pub fn resolve(label: &str) -> Result<&'static Encoding> {
    Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| Error::ConfigError(format!("invalid encoding '{label}'")))
}

/// Reads a whole file as text.
pub fn read_text<P: AsRef<Path>>(path: P, encoding: &'static Encoding) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = DecodeReaderBytesBuilder::new().encoding(Some(encoding)).build(file);
    let mut text = String::new();
    reader.read_to_string(&mut text)?;
    Ok(text)
}

/// Writes `text` in `encoding`.
///
/// # Returns
/// * `Result<bool>` - `true` if some characters had no representation in
///   the encoding and were written as numeric character references
pub fn write_text<P: AsRef<Path>>(
    path: P,
    text: &str,
    encoding: &'static Encoding,
) -> Result<bool> {
    let (bytes, _, unmappable) = encoding.encode(text);
    std::fs::write(path, &bytes)?;
    Ok(unmappable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{UTF_8, WINDOWS_1252};
    use tempfile::TempDir;

    #[test]
    fn resolves_labels() {
        assert_eq!(resolve("Windows-1252").unwrap(), WINDOWS_1252);
        assert_eq!(resolve("latin1").unwrap(), WINDOWS_1252);
        assert_eq!(resolve("utf-8").unwrap(), UTF_8);
        let err = resolve("klingon").unwrap_err();
        assert!(err.to_string().contains("invalid encoding 'klingon'"));
    }

    #[test]
    fn round_trips_latin1_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.cnfg");
        let unmappable = write_text(&path, "ae: æ\nm^3: m³\n", WINDOWS_1252).unwrap();
        assert!(!unmappable);
        assert_eq!(std::fs::read(&path).unwrap(), b"ae: \xe6\nm^3: m\xb3\n");
        assert_eq!(read_text(&path, WINDOWS_1252).unwrap(), "ae: æ\nm^3: m³\n");
    }

    #[test]
    fn byte_order_mark_wins_over_configured_encoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bom.txt");
        std::fs::write(&path, b"\xef\xbb\xbfm\xc2\xb3").unwrap();
        let text = read_text(&path, WINDOWS_1252).unwrap();
        assert!(text.ends_with("m³"));
        assert!(!text.contains('Â'));
    }

    #[test]
    fn reports_unmappable_characters() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("arrow.txt");
        assert!(write_text(&path, "a → b", WINDOWS_1252).unwrap());
    }
}
