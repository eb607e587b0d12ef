// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! CLI command definitions and handlers
//!
//! Defines the command-line interface for stagecraft.

pub mod graph;
pub mod plan;
pub mod script;
pub mod store;
pub mod submit;
pub mod validate;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};

use crate::errors::{RecoverySuggestion, StagecraftError};
use crate::execution::{Execution, ResumePolicy};
use crate::pipeline::{render_recipe, ExecutionConfig, Recipe, RecipeFile, Rendered};
use crate::store::FileStore;

/// Pipeline recipe expansion
///
/// Turns stage templates into resumable, cardinality-checked task graphs.
#[derive(Parser, Debug)]
#[clap(
    name = "stagecraft",
    version,
    about = "Expand pipeline recipes into task graphs and job scripts",
    long_about = None,
    after_help = "Examples:\n\
        stagecraft validate recipe.yaml         Check a recipe file\n\
        stagecraft plan recipe.yaml             Render tasks and save them\n\
        stagecraft graph recipe.yaml --tasks    Show the task graph\n\
        stagecraft submit recipe.yaml           Dry-run submission in DAG order\n\n\
        See 'stagecraft <command> --help' for more information on a specific command."
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Change to directory before executing
    #[clap(short = 'C', long, global = true, value_name = "DIR")]
    pub directory: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a recipe file
    Validate {
        /// Recipe file to validate
        #[clap(default_value = "recipe.yaml")]
        recipe: PathBuf,
    },

    /// Render a recipe into its execution and save the tasks
    Plan {
        #[clap(flatten)]
        args: RecipeArgs,
    },

    /// Show the stage or task graph
    Graph {
        #[clap(flatten)]
        args: RecipeArgs,

        /// Show concrete tasks instead of stages
        #[clap(long)]
        tasks: bool,

        /// Output format
        #[clap(short, long, value_enum, default_value_t = GraphFormat::Text)]
        format: GraphFormat,
    },

    /// Print the job scripts of a stage
    Script {
        #[clap(flatten)]
        args: RecipeArgs,

        /// Stage whose tasks to print
        stage: String,
    },

    /// Submit ready tasks in dependency order (dry run)
    Submit {
        #[clap(flatten)]
        args: RecipeArgs,
    },

    /// Inspect or clear saved executions
    Store {
        #[clap(subcommand)]
        action: StoreAction,

        /// Store directory
        #[clap(long, default_value = ".stagecraft/store")]
        store_dir: PathBuf,
    },
}

/// Options shared by the commands that render a recipe
#[derive(Args, Debug, Clone)]
pub struct RecipeArgs {
    /// Recipe file
    #[clap(default_value = "recipe.yaml")]
    pub recipe: PathBuf,

    /// Execution name (overrides the recipe file)
    #[clap(short, long, env = "STAGECRAFT_EXECUTION")]
    pub execution: Option<String>,

    /// Output directory (overrides the recipe file)
    #[clap(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Store directory (overrides the recipe file)
    #[clap(long)]
    pub store_dir: Option<PathBuf>,

    /// Keep failed tasks from previous runs instead of regenerating them
    #[clap(long)]
    pub keep_failed: bool,

    /// Store non-scalar tag values as text instead of rejecting them
    #[clap(long)]
    pub lenient_tags: bool,
}

/// Store management actions
#[derive(Subcommand, Debug, Clone)]
pub enum StoreAction {
    /// List saved executions
    List,

    /// Show the tasks of an execution
    Show {
        /// Execution name
        execution: String,
    },

    /// Forget an execution
    Clear {
        /// Execution name
        execution: String,

        /// Skip confirmation
        #[clap(short, long)]
        yes: bool,
    },
}

/// Graph output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Text,
    Dot,
    Mermaid,
}

/// A recipe file rendered into its execution
pub struct Session {
    pub file: RecipeFile,
    pub config: ExecutionConfig,
    pub recipe: Recipe,
    pub execution: Execution,
    pub store: FileStore,
    pub rendered: Rendered,
}

impl RecipeArgs {
    /// Load the recipe file and apply command-line overrides
    pub fn load(&self) -> Result<(RecipeFile, ExecutionConfig), StagecraftError> {
        let mut file = RecipeFile::from_file(&self.recipe)?;

        let mut config = file.execution.clone();
        if let Some(name) = &self.execution {
            config.name = name.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(dir) = &self.store_dir {
            config.store_dir = dir.clone();
        }
        if self.keep_failed {
            config.resume = ResumePolicy::KeepAll;
        }
        if self.lenient_tags {
            config.strict_tags = false;
        }
        file.execution = config.clone();

        Ok((file, config))
    }

    /// Directory that source file globs are relative to
    pub fn base_dir(&self) -> &Path {
        self.recipe.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Load, open the execution from the store, and render
    pub fn render(&self) -> Result<Session, StagecraftError> {
        let (file, config) = self.load()?;
        let mut recipe = file.into_recipe(self.base_dir())?;
        let mut store = FileStore::new(&config.store_dir)?;
        let mut execution = Execution::open(&config, &store)?;
        let rendered = render_recipe(&mut execution, &mut recipe, &mut store)?;

        Ok(Session {
            file,
            config,
            recipe,
            execution,
            store,
            rendered,
        })
    }
}

/// Print a recovery suggestion for `error`, then convert it for reporting
pub fn report(error: StagecraftError) -> miette::Report {
    if let Some(suggestion) = RecoverySuggestion::for_error(&error) {
        eprintln!("{}", suggestion.to_string().yellow());
    }
    error.into()
}
