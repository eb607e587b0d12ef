// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Recipe file validation
//!
//! Checks a recipe file before anything is rendered. Unlike
//! [`RecipeFile::into_recipe`], which stops at the first problem, the
//! validator collects every error and warning it finds.

use std::collections::HashSet;
use std::path::Path;

use crate::errors::StagecraftError;
use crate::pipeline::{resolve_globs, RecipeFile, RelDefinition, StageDefinition};

/// Recipe file validator
pub struct RecipeValidator;

impl RecipeValidator {
    /// Validate a recipe file
    pub fn validate(file: &RecipeFile) -> ValidationResult {
        let mut result = ValidationResult::new();

        if file.stages.is_empty() {
            result.add_error("Recipe has no stages defined");
        }

        for (name, def) in &file.tools {
            if let Err(e) = def.build(name) {
                result.add_error(&format!("Tool '{}': {}", name, e));
            } else if def.command.is_none() && !def.noop {
                result.add_warning(&format!(
                    "Tool '{}' has no command; job scripts cannot be generated for it",
                    name
                ));
            }
        }

        let mut seen = HashSet::new();
        let mut used_tools = HashSet::new();
        for stage in &file.stages {
            if !seen.insert(stage.name.as_str()) {
                result.add_error(&format!("Duplicate stage name: '{}'", stage.name));
            }
            Self::validate_stage(stage, file, &seen, &mut result);

            used_tools.extend(stage.tool.as_deref());
            used_tools.extend(stage.tasks.iter().filter_map(|t| t.tool.as_deref()));
        }

        for name in file.tools.keys() {
            if !used_tools.contains(name.as_str()) {
                result.add_warning(&format!("Tool '{}' is never used", name));
            }
        }

        result
    }

    /// Validate one stage; `defined` holds the stages seen so far
    fn validate_stage(
        stage: &StageDefinition,
        file: &RecipeFile,
        defined: &HashSet<&str>,
        result: &mut ValidationResult,
    ) {
        let known_tool = |name: &str| file.tools.contains_key(name);

        match &stage.tool {
            Some(tool) => {
                if !stage.tasks.is_empty() {
                    result.add_error(&format!(
                        "Stage '{}': has both 'tool' and 'tasks'",
                        stage.name
                    ));
                }
                if !known_tool(tool) {
                    result.add_error(&format!("Stage '{}': unknown tool '{}'", stage.name, tool));
                }
                if stage.parents.is_empty() {
                    result.add_warning(&format!(
                        "Stage '{}': derived stage without parents will have no tasks",
                        stage.name
                    ));
                }
            }
            None => {
                if stage.tasks.is_empty() {
                    result.add_warning(&format!("Stage '{}': source stage has no tasks", stage.name));
                }
                if !stage.parents.is_empty() {
                    result.add_error(&format!(
                        "Stage '{}': source stage cannot have parents",
                        stage.name
                    ));
                }
                for (i, task) in stage.tasks.iter().enumerate() {
                    match &task.tool {
                        Some(tool) if !known_tool(tool) => result.add_error(&format!(
                            "Stage '{}': task {} uses unknown tool '{}'",
                            stage.name,
                            i + 1,
                            tool
                        )),
                        None if task.files.is_empty() => result.add_error(&format!(
                            "Stage '{}': task {} has neither files nor a tool",
                            stage.name,
                            i + 1
                        )),
                        _ => {}
                    }
                }
            }
        }

        for parent in &stage.parents {
            if parent == &stage.name {
                result.add_error(&format!("Stage '{}': lists itself as a parent", stage.name));
            } else if !defined.contains(parent.as_str()) {
                let later = file.get_stage(parent).is_some();
                result.add_error(&format!(
                    "Stage '{}': parent '{}' {}",
                    stage.name,
                    parent,
                    if later {
                        "must be defined before it"
                    } else {
                        "does not exist"
                    }
                ));
            }
        }

        if let RelDefinition::One2many { split } | RelDefinition::Many2many { split, .. } = &stage.rel {
            if let Some((key, _)) = split.iter().find(|(_, values)| values.is_empty()) {
                result.add_warning(&format!(
                    "Stage '{}': split '{}' has no values, so no tasks will be generated",
                    stage.name, key
                ));
            }
        }
    }

    /// Check that every source file pattern matches (runtime validation)
    pub fn validate_files(file: &RecipeFile, base_dir: &Path) -> Vec<String> {
        let mut missing = Vec::new();

        for stage in &file.stages {
            for task in &stage.tasks {
                for pattern in &task.files {
                    match resolve_globs(std::slice::from_ref(pattern), base_dir) {
                        Ok(_) => {}
                        Err(StagecraftError::NoInputFiles { .. }) => missing.push(format!(
                            "Stage '{}': no files match '{}'",
                            stage.name, pattern
                        )),
                        Err(e) => missing.push(format!("Stage '{}': {}", stage.name, e)),
                    }
                }
            }
        }

        missing
    }
}

/// Result of recipe validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    pub fn add_warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(yaml: &str) -> ValidationResult {
        RecipeValidator::validate(&RecipeFile::from_yaml(yaml).unwrap())
    }

    #[test]
    fn test_validate_empty_recipe() {
        let result = validate("name: empty\nstages: []\n");
        assert!(!result.is_valid());
        assert!(result.errors[0].contains("no stages"));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let result = validate(
            r#"
name: dup
stages:
  - name: inputs
    tasks: [{files: ["a.fq"]}]
  - name: inputs
    tasks: [{files: ["b.fq"]}]
"#,
        );
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.contains("Duplicate")));
    }

    #[test]
    fn test_validate_parent_order_and_unknown_tool() {
        let result = validate(
            r#"
name: order
tools:
  cat:
    inputs: [{slot: in_x, pattern: 'x'}]
    command: "cat {in_x}"
stages:
  - name: second
    tool: cat
    parents: [first]
  - name: first
    tool: dog
    parents: [nowhere]
"#,
        );
        assert!(result.errors.iter().any(|e| e.contains("must be defined before it")));
        assert!(result.errors.iter().any(|e| e.contains("unknown tool 'dog'")));
        assert!(result.errors.iter().any(|e| e.contains("does not exist")));
    }

    #[test]
    fn test_validate_bad_tool_declarations() {
        let result = validate(
            r#"
name: tools
tools:
  bad_n:
    inputs: [{slot: in_x, pattern: 'x', n: "~3"}]
    command: "cat {in_x}"
  bad_placeholder:
    command: "cat {nothing}"
  bad_pattern:
    inputs: [{slot: in_x, pattern: '('}]
stages:
  - name: inputs
    tasks: [{files: ["a.fq"]}]
"#,
        );
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().any(|e| e.starts_with("Tool 'bad_n'")));
        assert!(result.errors.iter().any(|e| e.starts_with("Tool 'bad_placeholder'")));
        assert!(result.errors.iter().any(|e| e.starts_with("Tool 'bad_pattern'")));
        assert!(result.warnings.iter().any(|w| w.contains("never used")));
    }

    #[test]
    fn test_validate_warnings() {
        let result = validate(
            r#"
name: warn
tools:
  todo: {}
stages:
  - name: orphan
    tool: todo
"#,
        );
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.contains("without parents")));
        assert!(result.warnings.iter().any(|w| w.contains("no command")));
    }

    #[test]
    fn test_validate_files() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.fq"), "").unwrap();
        let file = RecipeFile::from_yaml(
            r#"
name: files
stages:
  - name: inputs
    tasks: [{files: ["a.fq"]}, {files: ["b.fq"]}]
"#,
        )
        .unwrap();

        let missing = RecipeValidator::validate_files(&file, temp.path());
        assert_eq!(missing, vec!["Stage 'inputs': no files match 'b.fq'"]);
    }
}
