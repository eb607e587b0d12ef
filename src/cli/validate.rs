// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Validate command - check a recipe file

use colored::Colorize;
use miette::Result;
use std::path::{Path, PathBuf};

use crate::pipeline::{RecipeFile, RecipeValidator};

/// Run the validate command
pub async fn run(recipe_path: PathBuf, verbose: bool) -> Result<()> {
    println!("{}", "Validating recipe...".bold());
    println!();

    let file = match RecipeFile::from_file(&recipe_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("  {} Failed to parse recipe", "✗".red());
            eprintln!();
            return Err(super::report(e));
        }
    };

    println!("  {} Recipe file parses", "✓".green());

    let validation = RecipeValidator::validate(&file);
    let base_dir = recipe_path.parent().unwrap_or_else(|| Path::new(""));
    let missing_files = RecipeValidator::validate_files(&file, base_dir);

    let mut has_issues = false;

    if !validation.errors.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Errors".red().bold());
        for error in &validation.errors {
            println!("  {} {}", "✗".red(), error);
        }
    }

    if !missing_files.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Missing files".yellow().bold());
        for missing in &missing_files {
            println!("  {} {}", "⚠".yellow(), missing);
        }
    }

    if !validation.warnings.is_empty() {
        has_issues = true;
        println!();
        println!("{}:", "Warnings".yellow().bold());
        for warning in &validation.warnings {
            println!("  {} {}", "⚠".yellow(), warning);
        }
    }

    if verbose {
        println!();
        println!("{}:", "Recipe summary".bold());
        println!("  Name: {}", file.name);
        println!("  Execution: {}", file.execution.name);
        println!("  Tools: {}", file.tools.len());
        println!("  Stages: {}", file.stages.len());
        for stage in &file.stages {
            let kind = match &stage.tool {
                Some(tool) => tool.clone(),
                None => format!("{} source task(s)", stage.tasks.len()),
            };
            let parents = if stage.parents.is_empty() {
                String::new()
            } else {
                format!(" [parents: {}]", stage.parents.join(", "))
            };
            println!("    - {} ({}){}", stage.name, kind, parents.dimmed());
        }
    }

    println!();

    if has_issues {
        if validation.is_valid() && missing_files.is_empty() {
            println!("{}", "Recipe is valid but has warnings.".yellow().bold());
            Ok(())
        } else {
            Err(miette::miette!("Recipe validation failed"))
        }
    } else {
        println!("{}", "Recipe is valid!".green().bold());
        Ok(())
    }
}
