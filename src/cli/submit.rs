// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Submit command - hand tasks to their backends in dependency order

use colored::Colorize;
use miette::Result;

use super::RecipeArgs;
use crate::drm::Submitter;
use crate::store::Store;

/// Run the submit command
///
/// Every backend is a dry run: scripts are generated and recorded, and the
/// tasks are marked successful.
pub async fn run(args: RecipeArgs, verbose: bool) -> Result<()> {
    let mut session = args.render().map_err(super::report)?;

    println!("{} {}", "Submitting".bold(), session.config.name.bold());
    println!();

    let submitter = Submitter::dry_run(&session.execution);
    let result = submitter
        .submit_all(&mut session.execution, &session.rendered.tasks)
        .await;

    // Statuses reached before a failure are still worth keeping
    session.store.persist(&session.execution)?;
    let report = result.map_err(super::report)?;

    if verbose {
        for id in &report.submitted {
            let task = session.execution.get(*id)?;
            let mark = if report.failed.contains(id) { "✗".red() } else { "✓".green() };
            println!("  {} {} via {}", mark, task.label(), task.drm);
        }
        println!();
    }

    println!("  Waves:     {}", report.waves);
    println!("  Submitted: {}", report.submitted.len());
    println!("  No-op:     {}", report.noop.len());
    if !report.failed.is_empty() {
        println!("  Failed:    {}", report.failed.len().to_string().red());
    }
    if !report.blocked.is_empty() {
        println!("  Blocked:   {}", report.blocked.len().to_string().yellow());
    }
    if !report.pending.is_empty() {
        println!("  Pending:   {}", report.pending.len().to_string().blue());
    }
    println!();

    if report.is_complete() {
        println!("{}", "All tasks completed.".green().bold());
        Ok(())
    } else if report.success() {
        println!("{}", "Tasks handed over; some are still pending.".blue().bold());
        Ok(())
    } else {
        Err(miette::miette!(
            "{} task(s) failed, {} could not be attempted",
            report.failed.len(),
            report.blocked.len()
        ))
    }
}
