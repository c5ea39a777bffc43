#![allow(dead_code)]

use sheetgen::error::Result;
use sheetgen::prompt::Prompter;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

/// Prompter that gives the same answer to every question.
pub struct ScriptedPrompter {
    answer: bool,
    presented: RefCell<Vec<String>>,
    asked: Cell<usize>,
}

impl ScriptedPrompter {
    pub fn new(answer: bool) -> Self {
        Self { answer, presented: RefCell::new(Vec::new()), asked: Cell::new(0) }
    }

    pub fn presented(&self) -> Vec<String> {
        self.presented.borrow().clone()
    }

    pub fn asked(&self) -> usize {
        self.asked.get()
    }
}

impl Prompter for ScriptedPrompter {
    fn present(&self, text: &str) {
        self.presented.borrow_mut().push(text.to_string());
    }

    fn confirm(&self, skip: bool, _prompt: String) -> Result<bool> {
        if skip {
            return Ok(true);
        }
        self.asked.set(self.asked.get() + 1);
        Ok(self.answer)
    }
}

/// Writes `content` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}

pub fn read_file(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// A project with one CSV source, a template directory and a master directory.
pub fn pump_project(dir: &Path, verify: bool) -> PathBuf {
    write_file(dir, "pumps.csv", "Id;Name;Rate\nA1;Pump1;10\nA2;Pump2;20\nA3;Pump3;30\n");
    write_file(dir, "templates/header.tmpl", "# generated for {{ site }}\n\n");
    write_file(dir, "templates/pump.tmpl", "Tag={{ Name }} Value={{ Rate }}");
    write_file(
        dir,
        "site.yaml",
        &format!(
            r#"outputfile: out/site.cnfg
templatepath: templates
masterpath: masters
masterkey: A1
verifycontent: {verify}
sources:
  - id: pumps
    filename: pumps.csv
layout:
  - name: header.tmpl
  - name: pump.tmpl
    source: pumps
    exclude: [A2]
"#
        ),
    )
}
