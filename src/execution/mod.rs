// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Executions: the run-scoped owner of realized stages and tasks
//!
//! An execution is opened against a [`Store`] snapshot of a previous run so
//! that rendering a recipe again reuses completed tasks instead of
//! duplicating them.

mod task;

pub use task::{Task, TaskId, TaskKey, TaskStatus};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::errors::{StagecraftError, StagecraftResult};
use crate::pipeline::{ExecutionConfig, TaskGraph};
use crate::store::{StageRecord, Store, TaskRecord};
use crate::tool::{CommandOutput, TagPolicy};

/// What to do with tasks of a previous run that did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumePolicy {
    /// Drop unsuccessful tasks and their descendants so they are regenerated
    #[default]
    RetryUnsuccessful,
    /// Keep every task as it was recorded
    KeepAll,
}

/// The per-execution realization of a stage template
#[derive(Debug, Clone)]
pub struct Stage {
    pub name: String,
    /// Set once the stage has been expanded in this execution
    pub resolved: bool,
    pub tasks: Vec<TaskId>,
    pub parents: Vec<String>,
}

/// Run-scoped container of stages and tasks
#[derive(Debug)]
pub struct Execution {
    name: String,
    output_dir: PathBuf,
    default_drm: String,
    tag_policy: TagPolicy,
    stages: Vec<Stage>,
    tasks: Vec<Task>,
    index: HashMap<TaskKey, TaskId>,
}

impl Execution {
    /// Create an empty execution
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            name: config.name.clone(),
            output_dir: config.output_dir.clone(),
            default_drm: config.default_drm.clone(),
            tag_policy: TagPolicy {
                strict: config.strict_tags,
            },
            stages: Vec::new(),
            tasks: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Open an execution with the tasks `store` knows from previous runs
    pub fn open(config: &ExecutionConfig, store: &dyn Store) -> StagecraftResult<Self> {
        let mut execution = Self::new(config);
        let records = store.existing_tasks(&config.name)?;
        execution.load(records, config.resume)?;
        Ok(execution)
    }

    /// Insert recorded tasks; records must list parents before children
    fn load(&mut self, records: Vec<TaskRecord>, policy: ResumePolicy) -> StagecraftResult<()> {
        let mut dropped: HashSet<TaskKey> = HashSet::new();
        let total = records.len();

        for record in records {
            let key = record.key();

            let stale = policy == ResumePolicy::RetryUnsuccessful
                && (record.status != TaskStatus::Successful
                    || record.parents.iter().any(|p| dropped.contains(p)));
            if stale {
                dropped.insert(key);
                continue;
            }

            let mut parents = Vec::with_capacity(record.parents.len());
            for parent in &record.parents {
                let id = self.index.get(parent).copied().ok_or_else(|| {
                    StagecraftError::store(format!(
                        "task {} references parent {} which is not recorded before it",
                        key, parent
                    ))
                })?;
                parents.push(id);
            }

            self.insert_task(record.into_task(parents));
        }

        if total > 0 {
            tracing::info!(
                execution = %self.name,
                loaded = self.tasks.len(),
                dropped = dropped.len(),
                "loaded previous tasks"
            );
        }

        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn default_drm(&self) -> &str {
        &self.default_drm
    }

    pub fn tag_policy(&self) -> TagPolicy {
        self.tag_policy
    }

    pub fn tasks(&self) -> impl Iterator<Item = (TaskId, &Task)> {
        self.tasks.iter().enumerate().map(|(i, t)| (TaskId(i), t))
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id.0)
    }

    /// Like [`Execution::task`] but an error for unknown ids
    pub fn get(&self, id: TaskId) -> StagecraftResult<&Task> {
        self.tasks
            .get(id.0)
            .ok_or(StagecraftError::TaskNotFound { id: id.0 })
    }

    pub(crate) fn task_mut(&mut self, id: TaskId) -> StagecraftResult<&mut Task> {
        self.tasks
            .get_mut(id.0)
            .ok_or(StagecraftError::TaskNotFound { id: id.0 })
    }

    /// Look up a task by its `(stage, tags)` identity
    pub fn find(&self, key: &TaskKey) -> Option<TaskId> {
        self.index.get(key).copied()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&Stage> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub(crate) fn stage_mut(&mut self, name: &str) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.name == name)
    }

    /// Tasks of the named stages, in stage order
    pub fn stage_tasks<'a>(&'a self, names: &[String]) -> Vec<(TaskId, &'a Task)> {
        names
            .iter()
            .filter_map(|n| self.stage(n))
            .flat_map(|s| s.tasks.iter())
            .filter_map(|id| self.task(*id).map(|t| (*id, t)))
            .collect()
    }

    /// Fetch or create the realized stage called `name`
    ///
    /// A stage already realized in this execution is returned as is, so
    /// repeated rendering is idempotent at the stage level.
    pub(crate) fn ensure_stage(
        &mut self,
        name: &str,
        parents: Vec<String>,
        store: &mut dyn Store,
    ) -> StagecraftResult<&mut Stage> {
        if let Some(pos) = self.stages.iter().position(|s| s.name == name) {
            self.stages[pos].parents = parents;
            return Ok(&mut self.stages[pos]);
        }

        let (_, created) = store.get_or_create_stage(&self.name, name)?;
        let tasks: Vec<TaskId> = self
            .tasks()
            .filter(|(_, t)| t.stage == name)
            .map(|(id, _)| id)
            .collect();

        if created {
            tracing::info!(stage = %name, "Created stage");
        } else {
            tracing::info!(stage = %name, tasks = tasks.len(), "Loaded stage");
        }

        // Loaded stages are expanded again: their tasks get their tools back
        // and tag combinations new to the recipe are generated.
        self.stages.push(Stage {
            name: name.to_string(),
            resolved: false,
            tasks,
            parents,
        });

        let last = self.stages.len() - 1;
        Ok(&mut self.stages[last])
    }

    /// Register a new task and return its id
    pub(crate) fn insert_task(&mut self, task: Task) -> TaskId {
        let id = TaskId(self.tasks.len());
        self.index.insert(task.key(), id);
        if let Some(stage) = self.stage_mut(&task.stage) {
            stage.tasks.push(id);
        }
        self.tasks.push(task);
        id
    }

    pub fn set_status(&mut self, id: TaskId, status: TaskStatus) -> StagecraftResult<()> {
        self.task_mut(id)?.status = status;
        Ok(())
    }

    /// Generate the job script of a task, or `None` for a no-op task
    ///
    /// The tool's command is built exactly once per call.
    pub fn command_script(&self, id: TaskId) -> StagecraftResult<Option<String>> {
        let task = self.get(id)?;
        let tool = task.tool.as_ref().ok_or_else(|| StagecraftError::InvalidStage {
            stage: task.stage.clone(),
            reason: format!(
                "{} was loaded from the store without its tool; render the recipe first",
                task.label()
            ),
        })?;

        let parents = task
            .parents
            .iter()
            .map(|p| self.get(*p).map(Task::label))
            .collect::<StagecraftResult<Vec<_>>>()?;

        let cmd = match tool.build_command_with_parents(
            &task.input_files,
            &task.output_files,
            task,
            &parents,
        )? {
            CommandOutput::Noop => return Ok(None),
            CommandOutput::Script(cmd) => cmd,
        };

        let mut script = String::from("#!/bin/bash\nset -e\nset -o pipefail\n");
        script.push_str(&format!("cd {}\n", self.output_dir.display()));
        if !task.output_dir.is_empty() {
            script.push_str(&format!("mkdir -p {}\n", task.output_dir));
        }
        script.push('\n');
        script.push_str(cmd.render().trim());
        script.push('\n');

        Ok(Some(script))
    }

    /// Snapshot of the realized stages
    pub fn stage_records(&self) -> Vec<StageRecord> {
        self.stages
            .iter()
            .map(|s| StageRecord {
                name: s.name.clone(),
                resolved: s.resolved,
            })
            .collect()
    }

    /// Snapshot of every task, parents before children
    pub fn task_records(&self) -> StagecraftResult<Vec<TaskRecord>> {
        let graph = TaskGraph::from_tasks(self.tasks());
        let order = graph.topological_order()?;

        order
            .into_iter()
            .map(|id| {
                let task = self.get(id)?;
                let parents = task
                    .parents
                    .iter()
                    .map(|p| self.get(*p).map(Task::key))
                    .collect::<StagecraftResult<Vec<_>>>()?;
                Ok(TaskRecord::from_task(task, parents))
            })
            .collect()
    }
}
