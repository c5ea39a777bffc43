//! Template renderer for sheetgen.
//! Resolves named templates from the template directory and renders them
//! with MiniJinja in strict mode.
//!
//! Besides row values and command line globals, templates can use:
//! * `bitmask` filter: `{{ [1, 3] | bitmask(5) }}` renders `00101`
//! * `now(format?)`: local time, `%Y-%m-%d %H:%M:%S` by default
//! * `sheetgenversion`, `gitcommit`, `gitcommitlong` globals
//! * one `name()` / `setname(value)` function pair per configured counter
use crate::config::CounterSpec;
use crate::constants::{DEFAULT_BITMASK_LENGTH, DEFAULT_TIMESTAMP_FORMAT};
use crate::encoding::read_text;
use chrono::Local;
use encoding_rs::{Encoding, WINDOWS_1252};
use minijinja::value::{Value, ValueKind};
use minijinja::{AutoEscape, Environment, Error, ErrorKind, UndefinedBehavior};
use std::collections::HashMap;
use std::path::{Component, Path};
use std::process::Command;
use std::sync::{Arc, Mutex, MutexGuard};

/// Printed in place of a commit hash outside a git work tree.
const UNKNOWN_COMMIT: &str = "unknown";

/// Trait for template rendering engines.
pub trait TemplateRenderer {
    /// Renders the named template with the given context.
    ///
    /// # Arguments
    /// * `name` - Template name, relative to the template directory
    /// * `context` - Context variables for rendering
    ///
    /// # Returns
    /// * `Result<String, minijinja::Error>` - Rendered text, or the
    ///   evaluator's error for the caller to classify
    fn render(&self, name: &str, context: &serde_json::Value) -> Result<String, Error>;
}

/// MiniJinja-based template rendering engine.
pub struct MiniJinjaRenderer {
    /// MiniJinja environment instance
    env: Environment<'static>,
}

type Counters = Arc<Mutex<HashMap<String, i64>>>;

impl MiniJinjaRenderer {
    /// Creates a renderer that loads Windows-1252 templates from `template_dir`.
    pub fn new<P: AsRef<Path>>(template_dir: P) -> Self {
        Self::with_encoding(template_dir, WINDOWS_1252)
    }

    /// Creates a renderer that loads templates from `template_dir`, decoding
    /// them with `encoding`.
    pub fn with_encoding<P: AsRef<Path>>(template_dir: P, encoding: &'static Encoding) -> Self {
        let mut env = base_environment();
        let dir = template_dir.as_ref().to_path_buf();
        env.set_loader(move |name| load_template(&dir, name, encoding));
        Self { env }
    }

    /// Creates a renderer over in-memory templates.
    pub fn from_templates<I, N, S>(templates: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (N, S)>,
        N: Into<String>,
        S: Into<String>,
    {
        let mut env = base_environment();
        for (name, source) in templates {
            env.add_template_owned(name.into(), source.into())?;
        }
        Ok(Self { env })
    }

    /// Makes a global variable visible to every template.
    pub fn add_global<S: Into<String>>(&mut self, name: S, value: Value) {
        self.env.add_global(name.into(), value);
    }

    /// Adds `NAME VALUE` pairs as globals, typing booleans and numbers.
    pub fn add_globals(&mut self, globals: &[(String, String)]) {
        for (name, value) in globals {
            self.add_global(name.clone(), typed_global(value));
        }
    }

    /// Adds the tool version and the commit of the git work tree at `dir`.
    pub fn add_build_info<P: AsRef<Path>>(&mut self, dir: P) {
        let dir = dir.as_ref();
        self.add_global("sheetgenversion", Value::from(env!("CARGO_PKG_VERSION")));
        self.add_global("gitcommit", Value::from(git_commit(dir, false)));
        self.add_global("gitcommitlong", Value::from(git_commit(dir, true)));
    }

    /// Registers the counter functions.
    ///
    /// Counters keep their value across templates and rows for the lifetime
    /// of the renderer. `name()` increments and returns the counter,
    /// `setname(value)` sets it and returns `value`.
    pub fn add_counters(&mut self, specs: &[CounterSpec]) {
        let counters: Counters =
            Arc::new(Mutex::new(specs.iter().map(|c| (c.name.clone(), c.value)).collect()));
        for spec in specs {
            let (name, state) = (spec.name.clone(), Arc::clone(&counters));
            self.env.add_function(spec.name.clone(), move || -> Result<i64, Error> {
                let mut values = lock(&state)?;
                let value = values.entry(name.clone()).or_insert(0);
                *value += 1;
                Ok(*value)
            });
            let (name, state) = (spec.name.clone(), Arc::clone(&counters));
            self.env.add_function(format!("set{}", spec.name), move |value: i64| -> Result<i64, Error> {
                lock(&state)?.insert(name.clone(), value);
                Ok(value)
            });
        }
    }
}

fn lock(counters: &Counters) -> Result<MutexGuard<'_, HashMap<String, i64>>, Error> {
    counters
        .lock()
        .map_err(|_| Error::new(ErrorKind::InvalidOperation, "counter state is poisoned"))
}

fn load_template(
    dir: &Path,
    name: &str,
    encoding: &'static Encoding,
) -> Result<Option<String>, Error> {
    if Path::new(name).components().any(|c| !matches!(c, Component::Normal(_))) {
        return Ok(None);
    }
    let path = dir.join(name);
    if !path.is_file() {
        return Ok(None);
    }
    read_text(&path, encoding).map(Some).map_err(|e| {
        Error::new(ErrorKind::InvalidOperation, format!("cannot read template '{name}'"))
            .with_source(e)
    })
}

fn base_environment() -> Environment<'static> {
    let mut env = Environment::new();
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env.set_keep_trailing_newline(true);
    env.set_formatter(|out, state, value| {
        // Empty cells arrive as none and print as nothing.
        if value.is_none() {
            return Ok(());
        }
        minijinja::escape_formatter(out, state, value)
    });
    env.add_filter("bitmask", bitmask);
    env.add_function("now", now);
    env
}

/// Converts a command line value to the most specific template value.
pub fn typed_global(value: &str) -> Value {
    match value {
        "true" => Value::from(true),
        "false" => Value::from(false),
        _ => match value.parse::<i64>() {
            Ok(i) => Value::from(i),
            Err(_) => match value.parse::<f64>() {
                Ok(f) => Value::from(f),
                Err(_) => Value::from(value.to_string()),
            },
        },
    }
}

/// Renders bit positions as a string of `length` digits, bit 1 rightmost.
///
/// `value` is one position or a sequence of positions; position 0 sets no
/// bit.
pub fn bitmask(value: Value, length: Option<usize>) -> Result<String, Error> {
    let invalid = || {
        Error::new(
            ErrorKind::InvalidOperation,
            "input value must be a sequence of integers or an integer",
        )
    };
    let positions: Vec<Value> = match value.kind() {
        ValueKind::Number => vec![value],
        ValueKind::Seq => value.try_iter()?.collect(),
        _ => return Err(invalid()),
    };
    let length = length.unwrap_or(DEFAULT_BITMASK_LENGTH);

    let mut mask = vec!['0'; length];
    for position in positions {
        let pos = usize::try_from(position).map_err(|_| invalid())?;
        if pos > length {
            return Err(Error::new(
                ErrorKind::InvalidOperation,
                format!("value is larger than mask size ({pos} > {length})"),
            ));
        }
        if pos > 0 {
            mask[length - pos] = '1';
        }
    }
    Ok(mask.into_iter().collect())
}

/// Local time in a chrono `strftime` format.
pub fn now(format: Option<&str>) -> Result<String, Error> {
    use std::fmt::Write;

    let format = format.unwrap_or(DEFAULT_TIMESTAMP_FORMAT);
    let mut out = String::new();
    write!(out, "{}", Local::now().format(format)).map_err(|_| {
        Error::new(ErrorKind::InvalidOperation, format!("invalid time format '{format}'"))
    })?;
    Ok(out)
}

/// Short or full hash of `HEAD` in the work tree at `dir`.
pub fn git_commit(dir: &Path, long: bool) -> String {
    let args = if long {
        ["rev-parse", "--verify", "HEAD"]
    } else {
        ["rev-parse", "--short", "HEAD"]
    };
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    match Command::new("git").args(args).current_dir(dir).output() {
        Ok(output) if output.status.success() => {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        }
        _ => UNKNOWN_COMMIT.to_string(),
    }
}

impl TemplateRenderer for MiniJinjaRenderer {
    /// Renders a named template using MiniJinja.
    ///
    /// # Errors
    /// * `ErrorKind::TemplateNotFound` if the template cannot be resolved
    /// * `ErrorKind::UndefinedError` if the template references a value
    ///   missing from `context`
    fn render(&self, name: &str, context: &serde_json::Value) -> Result<String, Error> {
        let tmpl = self.env.get_template(name)?;
        tmpl.render(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;
    use serde_json::json;
    use tempfile::TempDir;

    fn renderer(source: &str) -> MiniJinjaRenderer {
        MiniJinjaRenderer::from_templates([("t", source)]).unwrap()
    }

    #[test]
    fn renders_row_values() {
        let result = renderer("Tag={{ Name }} Value={{ Rate }}")
            .render("t", &json!({"Name": "Pump1", "Rate": "10"}))
            .unwrap();
        assert_eq!(result, "Tag=Pump1 Value=10");
    }

    #[test]
    fn undefined_reference_is_an_error() {
        let err = renderer("{{ Missing }}").render("t", &json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UndefinedError);
    }

    #[test]
    fn unknown_template_is_an_error() {
        let err = renderer("").render("other", &json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
    }

    #[test]
    fn null_values_render_empty() {
        let result = renderer("[{{ Empty }}]").render("t", &json!({"Empty": null})).unwrap();
        assert_eq!(result, "[]");
    }

    #[test]
    fn markup_is_not_escaped() {
        let result = renderer("{{ v }}").render("t", &json!({"v": "<a & b>"})).unwrap();
        assert_eq!(result, "<a & b>");
    }

    #[test]
    fn keeps_trailing_newline() {
        let result = renderer("line\n").render("t", &json!({})).unwrap();
        assert_eq!(result, "line\n");
    }

    #[test]
    fn globals_are_typed() {
        let mut r = renderer("{% if flag %}{{ n + 1 }} {{ name }}{% endif %}");
        r.add_globals(&[
            ("flag".to_string(), "true".to_string()),
            ("n".to_string(), "41".to_string()),
            ("name".to_string(), "site".to_string()),
        ]);
        assert_eq!(r.render("t", &json!({})).unwrap(), "42 site");
    }

    #[test]
    fn row_values_shadow_globals() {
        let mut r = renderer("{{ name }}");
        r.add_globals(&[("name".to_string(), "global".to_string())]);
        assert_eq!(r.render("t", &json!({"name": "row"})).unwrap(), "row");
    }

    #[test]
    fn loads_latin1_templates_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("enc.tmpl"), b"ae: \xe6\noe: \xf8\nm^3: m\xb3\n").unwrap();
        let result = MiniJinjaRenderer::new(dir.path()).render("enc.tmpl", &json!({})).unwrap();
        assert_eq!(result, "ae: æ\noe: ø\nm^3: m³\n");

        let err = MiniJinjaRenderer::new(dir.path()).render("../enc.tmpl", &json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateNotFound);
    }

    #[test]
    fn utf8_templates_need_utf8_encoding() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("enc.tmpl"), "m³").unwrap();
        let renderer = MiniJinjaRenderer::with_encoding(dir.path(), encoding_rs::UTF_8);
        assert_eq!(renderer.render("enc.tmpl", &json!({})).unwrap(), "m³");
    }

    #[test]
    fn timestamp_uses_default_and_custom_format() {
        let re = Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap();
        assert!(re.is_match(&now(None).unwrap()));
        let re = Regex::new(r"^\w{3} \d{1,2} \w{3} \d{4}$").unwrap();
        assert!(re.is_match(&now(Some("%a %-d %b %Y")).unwrap()));
        assert!(re.is_match(&renderer("{{ now('%a %-d %b %Y') }}").render("t", &json!({})).unwrap()));
    }

    #[test]
    fn git_commit_is_hash_or_unknown() {
        let short = git_commit(Path::new("."), false);
        let long = git_commit(Path::new("."), true);
        if short != UNKNOWN_COMMIT {
            assert!(Regex::new(r"^[0-9a-f]{7,}$").unwrap().is_match(&short));
            assert!(Regex::new(r"^[0-9a-f]{40}$").unwrap().is_match(&long));
        }
        assert_eq!(git_commit(Path::new("/nonexistent/dir"), false), UNKNOWN_COMMIT);
    }

    #[test]
    fn build_info_globals() {
        let mut r = renderer("{{ sheetgenversion }}|{{ gitcommit is string }}");
        r.add_build_info(".");
        assert_eq!(
            r.render("t", &json!({})).unwrap(),
            format!("{}|true", env!("CARGO_PKG_VERSION"))
        );
    }

    #[test]
    fn bitmask_on_valid_integer() {
        assert_eq!(bitmask(Value::from(1), Some(31)).unwrap(), "0000000000000000000000000000001");
        assert_eq!(bitmask(Value::from(31), None).unwrap(), "1000000000000000000000000000000");
        assert_eq!(bitmask(Value::from(vec![3]), Some(5)).unwrap(), "00100");
        assert_eq!(bitmask(Value::from(0), Some(5)).unwrap(), "00000");
    }

    #[test]
    fn bitmask_on_valid_sequence() {
        assert_eq!(bitmask(Value::from(vec![0, 1, 3]), Some(5)).unwrap(), "00101");
        assert_eq!(
            bitmask(Value::from(vec![1, 3, 31]), Some(31)).unwrap(),
            "1000000000000000000000000000101"
        );
    }

    #[test]
    fn bitmask_rejects_out_of_range_values() {
        let err = bitmask(Value::from(-1), Some(31)).unwrap_err();
        assert!(err.to_string().contains("input value must be "));
        let err = bitmask(Value::from(vec![1, 3, 32]), Some(31)).unwrap_err();
        assert!(err.to_string().contains("value is larger than mask size (32 > 31)"));
        let err = bitmask(Value::from("abc"), Some(31)).unwrap_err();
        assert!(err.to_string().contains("input value must be "));
    }

    #[test]
    fn bitmask_as_filter() {
        let result = renderer("{{ bits | bitmask(8) }}").render("t", &json!({"bits": [1, 8]})).unwrap();
        assert_eq!(result, "10000001");
    }

    #[test]
    fn counters_persist_across_renders() {
        let mut r = MiniJinjaRenderer::from_templates([
            ("a", "{{ slot() }},{{ slot() }}"),
            ("b", "{{ setslot(10) }},{{ slot() }},{{ line() }}"),
        ])
        .unwrap();
        r.add_counters(&[
            CounterSpec { name: "slot".to_string(), value: 267 },
            CounterSpec { name: "line".to_string(), value: 0 },
        ]);
        assert_eq!(r.render("a", &json!({})).unwrap(), "268,269");
        assert_eq!(r.render("a", &json!({})).unwrap(), "270,271");
        assert_eq!(r.render("b", &json!({})).unwrap(), "10,11,1");
    }
}
