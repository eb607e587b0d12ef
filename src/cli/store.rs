// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Store command - inspect and clear saved executions

use colored::Colorize;
use miette::Result;
use std::io::{self, Write};
use std::path::PathBuf;

use super::StoreAction;
use crate::execution::TaskStatus;
use crate::store::{FileStore, Store};

/// Run the store command
pub async fn run(action: StoreAction, store_dir: PathBuf, _verbose: bool) -> Result<()> {
    let mut store = FileStore::new(&store_dir)?;

    match action {
        StoreAction::List => {
            let snapshots = store.list()?;

            println!("{}", "Saved Executions".bold());
            println!("{}", "═".repeat(40));
            println!("  Location: {}", store_dir.display());

            if snapshots.is_empty() {
                println!("{}", "  No saved executions.".dimmed());
                return Ok(());
            }

            println!();
            for snapshot in &snapshots {
                let age = snapshot
                    .saved_at
                    .elapsed()
                    .map(format_duration)
                    .unwrap_or_else(|_| "?".into());
                println!(
                    "  {} {} tasks ({} successful, {} failed) {}",
                    snapshot.execution.bold(),
                    snapshot.tasks.len(),
                    snapshot.count_by_status(TaskStatus::Successful),
                    snapshot.count_by_status(TaskStatus::Failed),
                    format!("saved {} ago", age).dimmed()
                );
            }

            Ok(())
        }

        StoreAction::Show { execution } => {
            let Some(snapshot) = store.load(&execution)? else {
                return Err(miette::miette!("No saved execution named '{}'", execution));
            };

            println!("{} {}", "Execution".bold(), snapshot.execution.bold());
            println!("  Output: {}", snapshot.output_dir.display());
            for stage in &snapshot.stages {
                let tasks: Vec<_> = snapshot.tasks.iter().filter(|t| t.stage == stage.name).collect();
                let marker = if stage.resolved { "✓".green() } else { "○".dimmed() };
                println!();
                println!("  {} {} ({} tasks)", marker, stage.name.bold(), tasks.len());
                for task in tasks {
                    println!("      {} [{}]", task.tags, status_label(task.status));
                }
            }

            Ok(())
        }

        StoreAction::Clear { execution, yes } => {
            if store.load(&execution)?.is_none() {
                println!("{}", "Nothing saved for that execution.".dimmed());
                return Ok(());
            }

            if !yes {
                print!("Forget execution '{}'? [y/N] ", execution);
                io::stdout().flush().ok();

                let mut input = String::new();
                io::stdin().read_line(&mut input).ok();

                if !input.trim().eq_ignore_ascii_case("y") {
                    println!("{}", "Cancelled.".dimmed());
                    return Ok(());
                }
            }

            store.clear(&execution)?;
            println!("{}", "Execution cleared.".green());

            Ok(())
        }
    }
}

pub(crate) fn status_label(status: TaskStatus) -> colored::ColoredString {
    let text = status.to_string();
    match status {
        TaskStatus::Successful => text.green(),
        TaskStatus::Failed => text.red(),
        TaskStatus::Submitted | TaskStatus::Waiting => text.blue(),
        TaskStatus::NoAttempt => text.dimmed(),
    }
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else if secs < 86400 {
        format!("{}h", secs / 3600)
    } else {
        format!("{}d", secs / 86400)
    }
}
