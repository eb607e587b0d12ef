// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Error types carrying their diagnostic context
//!
//! Every failure while building a tool, task or stage is a typed variant
//! that holds the offending tags, slot, parents and matched files as data.
//! Formatting happens only when the error is displayed.

mod recovery;

pub use recovery::RecoverySuggestion;

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::tool::{Cardinality, TagSet};

/// Result type for stagecraft operations
pub type StagecraftResult<T> = Result<T, StagecraftError>;

/// Main error type for stagecraft
#[derive(Error, Debug, Diagnostic)]
pub enum StagecraftError {
    // ─────────────────────────────────────────────────────────────────────────
    // Tag and Tool Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Tag '{key}' in {tags} has a {found} value; tag values must be a string, integer, float or boolean")]
    #[diagnostic(
        code(stagecraft::invalid_tag_type),
        help("Flatten the value into a scalar, or set `strict_tags: false` to coerce it to text")
    )]
    InvalidTagType {
        key: String,
        found: String,
        tags: String,
    },

    #[error("{tool} {tags}: parent {parent} is not a task of this execution")]
    #[diagnostic(code(stagecraft::invalid_parent))]
    InvalidParent {
        tool: String,
        tags: TagSet,
        parent: String,
    },

    #[error("Invalid cardinality expression '{expr}'")]
    #[diagnostic(
        code(stagecraft::invalid_cardinality),
        help("Use an optional comparator (<=, <, >=, >, =, ==) followed by a count, e.g. '==1' or '>=2'")
    )]
    InvalidCardinality { expr: String },

    #[error("Invalid file pattern '{pattern}': {message}")]
    #[diagnostic(code(stagecraft::invalid_pattern))]
    InvalidPattern { pattern: String, message: String },

    #[error("Tool '{tool}' has an invalid schema: {reason}")]
    #[diagnostic(code(stagecraft::invalid_tool_schema))]
    InvalidToolSchema { tool: String, reason: String },

    #[error(
        "{tool} {tags}: expected {expected} file(s) for '{slot}', matched {} [{}] from parents [{}]",
        .matched.len(),
        .matched.join(", "),
        .parents.join(", ")
    )]
    #[diagnostic(code(stagecraft::cardinality))]
    Cardinality {
        tool: String,
        tags: TagSet,
        slot: String,
        expected: Cardinality,
        parents: Vec<String>,
        matched: Vec<String>,
    },

    #[error(
        "{tool} {tags}: no input file matches '{slot}' (pattern '{pattern}') among parents [{}]",
        .parents.join(", ")
    )]
    #[diagnostic(code(stagecraft::missing_input))]
    MissingInput {
        tool: String,
        tags: TagSet,
        slot: String,
        pattern: String,
        parents: Vec<String>,
    },

    #[error("{tool} {tags}: input file '{file}' maps to more than one slot ({})", .slots.join(", "))]
    #[diagnostic(
        code(stagecraft::ambiguous_input_mapping),
        help("Tighten the slot patterns so each file satisfies exactly one input")
    )]
    AmbiguousInputMapping {
        tool: String,
        tags: TagSet,
        file: String,
        slots: Vec<String>,
    },

    #[error("{tool} {tags}: command requires the parameter '{param}'")]
    #[diagnostic(
        code(stagecraft::missing_parameter),
        help("Either declare a default for '{param}', or pass a value with a tag named '{param}'")
    )]
    MissingParameter {
        tool: String,
        tags: TagSet,
        param: String,
    },

    #[error("{tool} {tags}: tool does not build a command")]
    #[diagnostic(
        code(stagecraft::not_implemented),
        help("Give the tool a command, or mark it as a no-op if it only registers existing files")
    )]
    NotImplementedContract { tool: String, tags: TagSet },

    #[error("Output template '{template}' references unknown tag '{key}' (tags: {tags})")]
    #[diagnostic(code(stagecraft::output_template))]
    OutputTemplate {
        template: String,
        key: String,
        tags: TagSet,
    },

    // ─────────────────────────────────────────────────────────────────────────
    // Recipe Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Recipe '{recipe}' is bound to execution '{bound}' and cannot be rendered for '{requested}'")]
    #[diagnostic(
        code(stagecraft::recipe_rebind),
        help("Build a fresh recipe for each execution")
    )]
    RecipeRebind {
        recipe: String,
        bound: String,
        requested: String,
    },

    #[error("Stage '{stage}' is defined more than once")]
    #[diagnostic(code(stagecraft::duplicate_stage))]
    DuplicateStage { stage: String },

    #[error("Stage '{stage}' depends on unknown stage '{parent}'")]
    #[diagnostic(
        code(stagecraft::unknown_stage),
        help("Parents must be defined before the stages that use them")
    )]
    UnknownStage { stage: String, parent: String },

    #[error("Stage '{stage}' uses unknown tool '{tool}'")]
    #[diagnostic(code(stagecraft::unknown_tool))]
    UnknownTool { stage: String, tool: String },

    #[error("Stage '{stage}' is invalid: {reason}")]
    #[diagnostic(code(stagecraft::invalid_stage))]
    InvalidStage { stage: String, reason: String },

    #[error("Invalid recipe: {reason}")]
    #[diagnostic(code(stagecraft::invalid_recipe))]
    InvalidRecipe {
        reason: String,
        #[help]
        help: Option<String>,
    },

    #[error("Recipe file not found: {path}")]
    #[diagnostic(
        code(stagecraft::recipe_not_found),
        help("Pass the path of a recipe file, e.g. 'stagecraft plan recipe.yaml'")
    )]
    RecipeNotFound { path: PathBuf },

    #[error("Circular dependency detected involving {}", .tasks.join(", "))]
    #[diagnostic(code(stagecraft::circular_dependency))]
    CircularDependency { tasks: Vec<String> },

    #[error("Task #{id} does not exist in this execution")]
    #[diagnostic(code(stagecraft::task_not_found))]
    TaskNotFound { id: usize },

    #[error("No submission backend named '{drm}' for task {task}")]
    #[diagnostic(
        code(stagecraft::unknown_drm),
        help("Set 'default_drm' or the tool's 'drm' to a registered backend such as 'local'")
    )]
    UnknownDrm { drm: String, task: String },

    // ─────────────────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Failed to read file '{path}': {error}")]
    #[diagnostic(code(stagecraft::file_read_error))]
    FileReadError { path: PathBuf, error: String },

    #[error("Failed to write file '{path}': {error}")]
    #[diagnostic(code(stagecraft::file_write_error))]
    FileWriteError { path: PathBuf, error: String },

    #[error("No input files matched pattern: {pattern}")]
    #[diagnostic(
        code(stagecraft::no_input_files),
        help("Check that files matching '{pattern}' exist relative to the recipe")
    )]
    NoInputFiles { pattern: String },

    // ─────────────────────────────────────────────────────────────────────────
    // Store Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("Store error: {message}")]
    #[diagnostic(code(stagecraft::store_error))]
    Store { message: String },

    // ─────────────────────────────────────────────────────────────────────────
    // IO/System Errors
    // ─────────────────────────────────────────────────────────────────────────
    #[error("IO error: {message}")]
    #[diagnostic(code(stagecraft::io_error))]
    Io { message: String },

    #[error("YAML parsing error: {message}")]
    #[diagnostic(code(stagecraft::yaml_error))]
    Yaml { message: String },

    #[error("JSON parsing error: {message}")]
    #[diagnostic(code(stagecraft::json_error))]
    Json { message: String },

    #[error("TOML parsing error: {message}")]
    #[diagnostic(code(stagecraft::toml_error))]
    Toml { message: String },

    #[error("Glob pattern error: {message}")]
    #[diagnostic(code(stagecraft::glob_error))]
    GlobPattern { message: String },
}

impl From<std::io::Error> for StagecraftError {
    fn from(e: std::io::Error) -> Self {
        Self::Io { message: e.to_string() }
    }
}

impl From<serde_yaml::Error> for StagecraftError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Yaml { message: e.to_string() }
    }
}

impl From<serde_json::Error> for StagecraftError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json { message: e.to_string() }
    }
}

impl From<toml::de::Error> for StagecraftError {
    fn from(e: toml::de::Error) -> Self {
        Self::Toml { message: e.to_string() }
    }
}

impl From<glob::PatternError> for StagecraftError {
    fn from(e: glob::PatternError) -> Self {
        Self::GlobPattern { message: e.to_string() }
    }
}

impl StagecraftError {
    /// Short machine-friendly name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTagType { .. } => "invalid_tag_type",
            Self::InvalidParent { .. } => "invalid_parent",
            Self::InvalidCardinality { .. } => "invalid_cardinality",
            Self::InvalidPattern { .. } => "invalid_pattern",
            Self::InvalidToolSchema { .. } => "invalid_tool_schema",
            Self::Cardinality { .. } => "cardinality",
            Self::MissingInput { .. } => "missing_input",
            Self::AmbiguousInputMapping { .. } => "ambiguous_input_mapping",
            Self::MissingParameter { .. } => "missing_parameter",
            Self::NotImplementedContract { .. } => "not_implemented",
            Self::OutputTemplate { .. } => "output_template",
            Self::RecipeRebind { .. } => "recipe_rebind",
            Self::DuplicateStage { .. } => "duplicate_stage",
            Self::UnknownStage { .. } => "unknown_stage",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::InvalidStage { .. } => "invalid_stage",
            Self::InvalidRecipe { .. } => "invalid_recipe",
            Self::RecipeNotFound { .. } => "recipe_not_found",
            Self::CircularDependency { .. } => "circular_dependency",
            Self::TaskNotFound { .. } => "task_not_found",
            Self::UnknownDrm { .. } => "unknown_drm",
            Self::FileReadError { .. } => "file_read_error",
            Self::FileWriteError { .. } => "file_write_error",
            Self::NoInputFiles { .. } => "no_input_files",
            Self::Store { .. } => "store_error",
            Self::Io { .. } => "io_error",
            Self::Yaml { .. } => "yaml_error",
            Self::Json { .. } => "json_error",
            Self::Toml { .. } => "toml_error",
            Self::GlobPattern { .. } => "glob_error",
        }
    }

    /// Create a store error from anything displayable
    pub fn store(message: impl std::fmt::Display) -> Self {
        Self::Store {
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::TagValue;

    #[test]
    fn test_cardinality_error_names_context() {
        let err = StagecraftError::Cardinality {
            tool: "merge".into(),
            tags: TagSet::new().with("sample", "A"),
            slot: "in_bams".into(),
            expected: ">=2".parse().unwrap(),
            parents: vec!["<Task align {sample: A}>".into()],
            matched: vec!["out/A.bam".into()],
        };

        let msg = err.to_string();
        assert!(msg.contains("merge"));
        assert!(msg.contains("sample: A"));
        assert!(msg.contains(">=2"));
        assert!(msg.contains("in_bams"));
        assert_eq!(err.kind(), "cardinality");
    }

    #[test]
    fn test_missing_parameter_display() {
        let err = StagecraftError::MissingParameter {
            tool: "align".into(),
            tags: TagSet::new().with("lane", TagValue::Int(2)),
            param: "reference".into(),
        };

        assert_eq!(
            err.to_string(),
            "align {lane: 2}: command requires the parameter 'reference'"
        );
    }
}
