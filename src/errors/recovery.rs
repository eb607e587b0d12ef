// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Error recovery suggestions
//!
//! Provides actionable suggestions for recovering from errors.

use super::StagecraftError;

/// A recovery suggestion with concrete steps
#[derive(Debug, Clone)]
pub struct RecoverySuggestion {
    /// Brief description of what to do
    pub action: String,
    /// Detailed steps
    pub steps: Vec<String>,
    /// Commands to run
    pub commands: Vec<String>,
}

impl RecoverySuggestion {
    /// Pick a suggestion for an error, if one applies
    pub fn for_error(error: &StagecraftError) -> Option<Self> {
        match error {
            StagecraftError::Cardinality { slot, expected, .. } => {
                Some(Self::fix_cardinality(slot, &expected.to_string()))
            }
            StagecraftError::MissingInput { slot, pattern, .. } => {
                Some(Self::fix_missing_input(slot, pattern))
            }
            StagecraftError::MissingParameter { param, .. } => Some(Self::add_parameter(param)),
            StagecraftError::RecipeRebind { requested, .. } => Some(Self::fresh_recipe(requested)),
            StagecraftError::InvalidTagType { key, .. } => Some(Self::fix_tag(key)),
            _ => None,
        }
    }

    /// Suggest fixing a slot whose matched file count is wrong
    pub fn fix_cardinality(slot: &str, expected: &str) -> Self {
        Self {
            action: format!("Make '{}' match {} file(s)", slot, expected),
            steps: vec![
                "Check which parent stage produces the files for this slot".into(),
                "Either relax the cardinality or change the relationship so each task sees enough parents".into(),
            ],
            commands: vec![
                "# Inspect parent tasks and their outputs:".into(),
                "stagecraft graph <recipe> --tasks".into(),
            ],
        }
    }

    /// Suggest fixing an input slot that matched nothing
    pub fn fix_missing_input(slot: &str, pattern: &str) -> Self {
        Self {
            action: format!("Provide a file for '{}'", slot),
            steps: vec![
                format!("No parent output matched the pattern '{}'", pattern),
                "Either fix the pattern, or pass the path with a tag named after the slot".into(),
            ],
            commands: vec![],
        }
    }

    /// Suggest declaring a missing command parameter
    pub fn add_parameter(param: &str) -> Self {
        Self {
            action: format!("Supply the parameter '{}'", param),
            steps: vec![
                format!("Add a tag '{}' to the tasks of this stage", param),
                format!("Or give '{}' a default in the tool definition", param),
            ],
            commands: vec![],
        }
    }

    /// Suggest rebuilding a recipe for a new execution
    pub fn fresh_recipe(execution: &str) -> Self {
        Self {
            action: format!("Build a new recipe for execution '{}'", execution),
            steps: vec!["A recipe is consumed by the first execution that renders it".into()],
            commands: vec![],
        }
    }

    /// Suggest fixing a non-scalar tag value
    pub fn fix_tag(key: &str) -> Self {
        Self {
            action: format!("Make tag '{}' a scalar", key),
            steps: vec![
                "Tags identify tasks and are stored, so only strings, numbers and booleans are allowed".into(),
                "Set `strict_tags: false` under `execution:` to store the value as text instead".into(),
            ],
            commands: vec![],
        }
    }
}

impl std::fmt::Display for RecoverySuggestion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "→ {}", self.action)?;

        for step in &self.steps {
            writeln!(f, "  {}", step)?;
        }

        if !self.commands.is_empty() {
            writeln!(f)?;
            for cmd in &self.commands {
                writeln!(f, "  {}", cmd)?;
            }
        }

        Ok(())
    }
}
