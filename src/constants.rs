//! Common constants used throughout sheetgen.

/// Extension appended to configuration paths given without one
pub const CONFIG_EXTENSION: &str = "yaml";

/// Suffix of the single-generation backup kept next to a replaced file
pub const BACKUP_SUFFIX: &str = "bak";

/// Suffix of the candidate file written before a replacement is committed
pub const CANDIDATE_SUFFIX: &str = "new";

/// Line terminator of generated output
pub const LINE_TERMINATOR: &str = "\n";

/// Field delimiter for CSV sources that do not specify one
pub const DEFAULT_CSV_DELIMITER: char = ';';

/// Workbook formats read through calamine
pub const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Delimited text formats read through csv
pub const CSV_EXTENSIONS: [&str; 1] = ["csv"];

/// Encoding of templates, master files and generated output unless configured
pub const DEFAULT_ENCODING: &str = "Windows-1252";

/// Format of the `now()` template function when called without one
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of the `bitmask` filter when called without one
pub const DEFAULT_BITMASK_LENGTH: usize = 31;
