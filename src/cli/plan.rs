// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Plan command - render a recipe and save its tasks

use colored::Colorize;
use miette::Result;
use std::collections::HashSet;

use super::store::status_label;
use super::RecipeArgs;
use crate::store::Store;

/// Run the plan command
pub async fn run(args: RecipeArgs, verbose: bool) -> Result<()> {
    let mut session = args.render().map_err(super::report)?;

    println!(
        "{} {} {} {}",
        "Planning".bold(),
        session.recipe.name().bold(),
        "into".dimmed(),
        session.config.name.bold()
    );
    println!();

    let created: HashSet<_> = session.rendered.created.iter().copied().collect();

    for (_, template) in session.recipe.stages() {
        let Some(stage) = session.execution.stage(&template.name) else {
            continue;
        };
        let new = stage.tasks.iter().filter(|id| created.contains(id)).count();

        println!(
            "  {} {} ({} tasks, {} new)",
            "→".blue(),
            stage.name.bold(),
            stage.tasks.len(),
            new
        );

        if verbose {
            for id in &stage.tasks {
                let task = session.execution.get(*id)?;
                let marker = if created.contains(id) { "+".green() } else { "=".dimmed() };
                println!(
                    "      {} {} {} [{}]",
                    marker,
                    id.to_string().dimmed(),
                    task.tags,
                    status_label(task.status)
                );
            }
        }
    }

    session.store.persist(&session.execution)?;

    println!();
    println!(
        "{} {} tasks ({} new, {} reused) saved to {}",
        "✓".green(),
        session.rendered.tasks.len(),
        session.rendered.created.len(),
        session.rendered.reused.len(),
        session.store.snapshot_path(&session.config.name).display()
    );

    Ok(())
}
