// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! stagecraft - pipeline recipe expansion
//!
//! Render stage templates into task graphs, save them, and emit job scripts.

use clap::Parser;
use miette::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stagecraft::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stagecraft=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();

    if let Some(ref dir) = cli.directory {
        std::env::set_current_dir(dir).map_err(|e| {
            miette::miette!("Failed to change to directory '{}': {}", dir.display(), e)
        })?;
    }

    match cli.command {
        Commands::Validate { recipe } => stagecraft::cli::validate::run(recipe, cli.verbose).await,
        Commands::Plan { args } => stagecraft::cli::plan::run(args, cli.verbose).await,
        Commands::Graph {
            args,
            tasks,
            format,
        } => stagecraft::cli::graph::run(args, tasks, format, cli.verbose).await,
        Commands::Script { args, stage } => {
            stagecraft::cli::script::run(args, stage, cli.verbose).await
        }
        Commands::Submit { args } => stagecraft::cli::submit::run(args, cli.verbose).await,
        Commands::Store { action, store_dir } => {
            stagecraft::cli::store::run(action, store_dir, cli.verbose).await
        }
    }
}
