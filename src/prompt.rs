//! Operator interaction.
//! Presents diffs and asks for confirmation before a file is replaced.

use crate::error::Result;
use dialoguer::Confirm;

/// Trait for asking the operator questions.
pub trait Prompter {
    /// Shows text (usually a diff) to the operator.
    fn present(&self, text: &str);

    /// Asks a yes/no question.
    ///
    /// # Arguments
    /// * `skip` - Answer yes without asking
    /// * `prompt` - The question
    ///
    /// # Returns
    /// * `Result<bool>` - The operator's answer
    fn confirm(&self, skip: bool, prompt: String) -> Result<bool>;
}

/// Terminal prompter built on dialoguer.
#[derive(Debug, Default)]
pub struct DialoguerPrompter;

impl DialoguerPrompter {
    pub fn new() -> Self {
        Self
    }
}

impl Prompter for DialoguerPrompter {
    fn present(&self, text: &str) {
        println!("{text}");
    }

    fn confirm(&self, skip: bool, prompt: String) -> Result<bool> {
        if skip {
            return Ok(true);
        }
        Ok(Confirm::new().with_prompt(prompt).default(false).interact()?)
    }
}
