// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Built-in tools

use once_cell::sync::Lazy;
use std::path::PathBuf;
use std::sync::Arc;

use super::{CommandArgs, CommandOutput, Parents, Resources, TagSet, TaskFile, Tool, ToolDef, ToolSchema};
use crate::errors::StagecraftResult;

static INPUT_SCHEMA: Lazy<ToolSchema> = Lazy::new(|| {
    let mut schema = ToolSchema::empty("load_input_files");
    schema.resources = Resources {
        cpu_req: Some(0),
        ..Resources::default()
    };
    schema
});

/// Registers files that already exist as the outputs of a no-op task
///
/// Used for the source stage of a pipeline.
#[derive(Debug, Clone)]
pub struct Input {
    paths: Vec<PathBuf>,
}

impl Input {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Wrap into a tool instance with `tags`
    pub fn tool(self, tags: TagSet) -> Tool {
        Tool::new(Arc::new(self), tags, Parents::None, "")
    }
}

impl ToolDef for Input {
    fn schema(&self) -> &ToolSchema {
        &INPUT_SCHEMA
    }

    fn cmd(&self, _args: &CommandArgs) -> StagecraftResult<CommandOutput> {
        Ok(CommandOutput::Noop)
    }

    fn sources(&self) -> Vec<TaskFile> {
        self.paths
            .iter()
            .enumerate()
            .map(|(i, p)| TaskFile::external(p, i))
            .collect()
    }
}
