mod common;

use common::{pump_project, read_file, write_file, ScriptedPrompter};
use sheetgen::commands::{generate_config, GenerateOptions, GenerateOutcome};
use sheetgen::diagnostics::MemoryDiagnostics;
use sheetgen::error::Error;
use sheetgen::reconcile::{backup_path, Reconciliation};
use std::fs::File;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const EXPECTED: &str = "# generated for plant\nTag=Pump1 Value=10\nTag=Pump3 Value=30\n";

fn site_options() -> GenerateOptions {
    GenerateOptions {
        globals: vec![("site".to_string(), "plant".to_string())],
        ..Default::default()
    }
}

#[test_log::test]
fn test_generate_creates_output() {
    let dir = TempDir::new().unwrap();
    let config = pump_project(dir.path(), true);
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();

    let outcome = generate_config(&config, &site_options(), &prompt, &diag).unwrap();

    let output = dir.path().join("out/site.cnfg");
    assert_eq!(
        outcome,
        GenerateOutcome::Written { path: output.clone(), result: Reconciliation::Created }
    );
    assert_eq!(read_file(&output), EXPECTED);
}

#[test]
fn test_config_extension_is_optional() {
    let dir = TempDir::new().unwrap();
    pump_project(dir.path(), true);
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();

    let outcome =
        generate_config(dir.path().join("site"), &site_options(), &prompt, &diag).unwrap();
    assert!(matches!(outcome, GenerateOutcome::Written { .. }));
}

#[test]
fn test_second_run_is_unchanged() {
    let dir = TempDir::new().unwrap();
    let config = pump_project(dir.path(), true);
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();

    generate_config(&config, &site_options(), &prompt, &diag).unwrap();
    let outcome = generate_config(&config, &site_options(), &prompt, &diag).unwrap();

    match outcome {
        GenerateOutcome::Written { result, .. } => assert_eq!(result, Reconciliation::Unchanged),
        other => panic!("Expected Written, got {other:?}"),
    }
    assert_eq!(prompt.asked(), 0);
}

#[test]
fn test_changed_output_is_declined() {
    let dir = TempDir::new().unwrap();
    let config = pump_project(dir.path(), true);
    let output = write_file(dir.path(), "out/site.cnfg", "hand edited\n");
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();

    let outcome = generate_config(&config, &site_options(), &prompt, &diag).unwrap();

    assert!(matches!(outcome, GenerateOutcome::Written { result: Reconciliation::Declined, .. }));
    assert_eq!(read_file(&output), "hand edited\n");
    assert_eq!(prompt.asked(), 1);
}

#[test]
fn test_no_verify_replaces_with_backup() {
    let dir = TempDir::new().unwrap();
    let config = pump_project(dir.path(), true);
    let output = write_file(dir.path(), "out/site.cnfg", "hand edited\n");
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();
    let options = GenerateOptions { verify: Some(false), ..site_options() };

    generate_config(&config, &options, &prompt, &diag).unwrap();

    assert_eq!(read_file(&output), EXPECTED);
    assert_eq!(read_file(&backup_path(&output)), "hand edited\n");
    assert_eq!(prompt.asked(), 0);
}

#[test]
fn test_output_override() {
    let dir = TempDir::new().unwrap();
    let config = pump_project(dir.path(), false);
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();
    let other = dir.path().join("other.cnfg");
    let options = GenerateOptions { output: Some(other.clone()), ..site_options() };

    generate_config(&config, &options, &prompt, &diag).unwrap();

    assert_eq!(read_file(&other), EXPECTED);
    assert!(!dir.path().join("out/site.cnfg").exists());
}

#[test]
fn test_missing_global_fails_before_writing() {
    let dir = TempDir::new().unwrap();
    let config = pump_project(dir.path(), false);
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();

    let err = generate_config(&config, &GenerateOptions::default(), &prompt, &diag).unwrap_err();

    assert!(matches!(err, Error::UndefinedValue { template, .. } if template == "header.tmpl"));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_without_outputfile_text_is_returned() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "templates/hello.tmpl", "hello {{ who }}");
    let config = write_file(
        dir.path(),
        "hello.yaml",
        "templatepath: templates\nlayout:\n  - name: hello.tmpl\n",
    );
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();
    let options =
        GenerateOptions { globals: vec![("who".to_string(), "world".to_string())], ..Default::default() };

    let outcome = generate_config(&config, &options, &prompt, &diag).unwrap();
    assert_eq!(outcome, GenerateOutcome::Printed("hello world\n".to_string()));
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();

    let err = generate_config(dir.path().join("nope.yaml"), &site_options(), &prompt, &diag)
        .unwrap_err();
    assert!(matches!(err, Error::ConfigError(_)));
}

fn set_modified(path: &Path, time: SystemTime) {
    File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
}

#[test]
fn test_ifchanged_skips_up_to_date_output() {
    let dir = TempDir::new().unwrap();
    let config = pump_project(dir.path(), true);
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();
    let options = GenerateOptions { if_changed: true, ..site_options() };

    let first = generate_config(&config, &options, &prompt, &diag).unwrap();
    assert!(matches!(first, GenerateOutcome::Written { result: Reconciliation::Created, .. }));

    let output = dir.path().join("out/site.cnfg");
    set_modified(&output, SystemTime::now() + Duration::from_secs(60));
    let second = generate_config(&config, &options, &prompt, &diag).unwrap();
    assert_eq!(second, GenerateOutcome::Skipped { path: output.clone() });

    set_modified(
        &dir.path().join("templates/pump.tmpl"),
        SystemTime::now() + Duration::from_secs(120),
    );
    let third = generate_config(&config, &options, &prompt, &diag).unwrap();
    assert!(matches!(third, GenerateOutcome::Written { result: Reconciliation::Unchanged, .. }));
}

#[test]
fn test_latin1_templates_and_output() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("templates")).unwrap();
    std::fs::write(dir.path().join("templates/unit.tmpl"), b"Unit={{ unit }} \xe6\xf8\xe5").unwrap();
    let config = write_file(
        dir.path(),
        "units.yaml",
        "outputfile: units.cnfg\ntemplatepath: templates\nlayout:\n  - name: unit.tmpl\n",
    );
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();
    let options = GenerateOptions {
        globals: vec![("unit".to_string(), "m³".to_string())],
        ..Default::default()
    };

    generate_config(&config, &options, &prompt, &diag).unwrap();

    assert_eq!(
        std::fs::read(dir.path().join("units.cnfg")).unwrap(),
        b"Unit=m\xb3 \xe6\xf8\xe5\n"
    );
}

#[test]
fn test_counters_and_bitmask_in_layout() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "pumps.csv", "Id;Bits\nA1;1\nA2;3\n");
    write_file(
        dir.path(),
        "templates/slot.tmpl",
        "{{ Id }} slot={{ slot() }} mask={{ Bits | int | bitmask(4) }}",
    );
    write_file(dir.path(), "templates/reset.tmpl", "{{ setslot(100) }}");
    let config = write_file(
        dir.path(),
        "slots.yaml",
        r#"templatepath: templates
encoding: utf-8
counters:
  - name: slot
    value: 10
sources:
  - id: pumps
    filename: pumps.csv
layout:
  - name: slot.tmpl
    source: pumps
  - name: reset.tmpl
  - name: slot.tmpl
    source: pumps
    include: [A1]
"#,
    );
    let prompt = ScriptedPrompter::new(false);
    let diag = MemoryDiagnostics::new();

    let outcome = generate_config(&config, &GenerateOptions::default(), &prompt, &diag).unwrap();

    assert_eq!(
        outcome,
        GenerateOutcome::Printed(
            "A1 slot=11 mask=0001\nA2 slot=12 mask=0100\n100\nA1 slot=101 mask=0001\n"
                .to_string()
        )
    );
}
