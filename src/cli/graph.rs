// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Graph command - show the stage or task graph

use miette::Result;

use super::{GraphFormat, RecipeArgs};
use crate::pipeline::StageGraph;

/// Run the graph command
///
/// The stage graph only needs the recipe file. The task graph renders the
/// recipe into its execution first; its tasks are not persisted.
pub async fn run(args: RecipeArgs, tasks: bool, format: GraphFormat, _verbose: bool) -> Result<()> {
    let output = if tasks {
        let session = args.render().map_err(super::report)?;
        let graph = &session.rendered.tasks;
        match format {
            GraphFormat::Text => graph.to_text(&session.execution)?,
            GraphFormat::Dot => graph.to_dot(&session.execution),
            GraphFormat::Mermaid => graph.to_mermaid(&session.execution),
        }
    } else {
        let (file, _) = args.load().map_err(super::report)?;
        let recipe = file.into_recipe(args.base_dir()).map_err(super::report)?;
        let stages = StageGraph::from_recipe(&recipe);
        match format {
            GraphFormat::Text => stages.to_text(&recipe)?,
            GraphFormat::Dot => stages.to_dot(),
            GraphFormat::Mermaid => stages.to_mermaid(),
        }
    };

    println!("{}", output);

    Ok(())
}
