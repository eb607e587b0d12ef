// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Script command - print the job scripts of a stage

use colored::Colorize;
use miette::Result;

use super::RecipeArgs;

/// Run the script command
pub async fn run(args: RecipeArgs, stage: String, _verbose: bool) -> Result<()> {
    let session = args.render().map_err(super::report)?;

    let Some(realized) = session.execution.stage(&stage) else {
        return Err(miette::miette!(
            "Recipe '{}' has no stage named '{}'",
            session.recipe.name(),
            stage
        ));
    };

    for id in &realized.tasks {
        let task = session.execution.get(*id)?;
        println!("{}", format!("# {} {}", id, task.label()).dimmed());

        match session.execution.command_script(*id).map_err(super::report)? {
            Some(script) => println!("{}", script),
            None => println!("{}\n", "# no-op".dimmed()),
        }
    }

    Ok(())
}
