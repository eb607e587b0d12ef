// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! # stagecraft - pipeline recipe expansion
//!
//! `stagecraft` turns a recipe of stage templates into a graph of concrete
//! tasks, each with resolved input files, output files and a job script.
//!
//! ## Features
//!
//! - **Tag-driven expansion** - one-to-one, many-to-one, one-to-many and
//!   many-to-many relationships between stages
//! - **Cardinality checks** - every input slot declares how many files it takes
//! - **Resumable executions** - rendering twice yields the same tasks, and
//!   saved executions are picked up again from the store
//! - **Dependency-ordered submission** - tasks are handed to their backend
//!   once all their parents have succeeded
//!
//! ## Quick Start
//!
//! ```bash
//! # Check a recipe
//! stagecraft validate recipe.yaml
//!
//! # Render and save the tasks
//! stagecraft plan recipe.yaml
//!
//! # Print the job scripts of a stage
//! stagecraft script recipe.yaml align
//! ```

pub mod cli;
pub mod drm;
pub mod errors;
pub mod execution;
pub mod pipeline;
pub mod store;
pub mod tool;

pub use errors::{StagecraftError, StagecraftResult};
pub use execution::{Execution, ResumePolicy, Task, TaskId, TaskKey, TaskStatus};
pub use pipeline::{render_recipe, Recipe, RecipeFile, Relationship, Rendered};
pub use store::{FileStore, MemoryStore, Store};
pub use tool::{TagSet, TagValue, Tool, ToolDef, ToolSchema};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
