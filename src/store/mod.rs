// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Persistence of stages and tasks between runs
//!
//! The engine only needs three operations from a store: fetch-or-create a
//! stage record, list the tasks recorded for an execution, and save the
//! current state. Stores are keyed by execution name.

mod filesystem;
mod memory;

pub use filesystem::FileStore;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

use crate::errors::StagecraftResult;
use crate::execution::{Execution, Task, TaskId, TaskKey, TaskStatus};
use crate::tool::{Resources, TagSet, TaskFile};

/// Persistence backend for executions
pub trait Store {
    /// Fetch the stage record, creating it when absent
    ///
    /// The flag is `true` when the record was created by this call.
    fn get_or_create_stage(
        &mut self,
        execution: &str,
        stage: &str,
    ) -> StagecraftResult<(StageRecord, bool)>;

    /// Tasks recorded for `execution`, parents before children
    fn existing_tasks(&self, execution: &str) -> StagecraftResult<Vec<TaskRecord>>;

    /// Save every stage and task of `execution`
    fn persist(&mut self, execution: &Execution) -> StagecraftResult<()>;

    /// Forget everything recorded for `execution`
    fn clear(&mut self, execution: &str) -> StagecraftResult<()>;
}

/// Persisted form of a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    #[serde(default)]
    pub resolved: bool,
}

/// Persisted form of a task
///
/// Parents are stored by identity rather than by index so a snapshot stays
/// valid when task ids change between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Digest of the task identity
    pub uid: String,
    pub stage: String,
    pub tags: TagSet,
    #[serde(default)]
    pub parents: Vec<TaskKey>,
    #[serde(default)]
    pub input_files: Vec<TaskFile>,
    #[serde(default)]
    pub output_files: Vec<TaskFile>,
    #[serde(default)]
    pub resources: Resources,
    pub drm: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub output_dir: String,
    #[serde(default)]
    pub forward_inputs: bool,
}

impl TaskRecord {
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.stage.clone(), self.tags.clone())
    }

    pub fn from_task(task: &Task, parents: Vec<TaskKey>) -> Self {
        Self {
            uid: task.key().digest(),
            stage: task.stage.clone(),
            tags: task.tags.clone(),
            parents,
            input_files: task.input_files.clone(),
            output_files: task.output_files.clone(),
            resources: task.resources.clone(),
            drm: task.drm.clone(),
            status: task.status,
            output_dir: task.output_dir.clone(),
            forward_inputs: task.forward_inputs,
        }
    }

    /// Rebuild the task; the tool is attached again when the recipe renders
    pub fn into_task(self, parents: Vec<TaskId>) -> Task {
        Task {
            stage: self.stage,
            tags: self.tags,
            parents,
            input_files: self.input_files,
            output_files: self.output_files,
            resources: self.resources,
            drm: self.drm,
            status: self.status,
            output_dir: self.output_dir,
            forward_inputs: self.forward_inputs,
            tool: None,
        }
    }
}

/// Everything a store keeps for one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub execution: String,
    pub saved_at: SystemTime,
    /// Output directory the execution was rendered for
    #[serde(default)]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub stages: Vec<StageRecord>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
}

impl Snapshot {
    pub fn empty(execution: &str) -> Self {
        Self {
            execution: execution.to_string(),
            saved_at: SystemTime::now(),
            output_dir: PathBuf::new(),
            stages: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// Capture the current state of `execution`
    pub fn capture(execution: &Execution) -> StagecraftResult<Self> {
        Ok(Self {
            execution: execution.name().to_string(),
            saved_at: SystemTime::now(),
            output_dir: execution.output_dir().to_path_buf(),
            stages: execution.stage_records(),
            tasks: execution.task_records()?,
        })
    }

    /// Find or append the stage record called `stage`
    pub(crate) fn stage_entry(&mut self, stage: &str) -> (StageRecord, bool) {
        match self.stages.iter().find(|s| s.name == stage) {
            Some(record) => (record.clone(), false),
            None => {
                let record = StageRecord {
                    name: stage.to_string(),
                    resolved: false,
                };
                self.stages.push(record.clone());
                (record, true)
            }
        }
    }

    pub fn count_by_status(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}
