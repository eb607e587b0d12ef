// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Concrete tasks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::tool::{Resources, TagSet, TaskFile, Tool};

/// Index of a task within its execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a task as reported by the submission backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    NoAttempt,
    Waiting,
    Submitted,
    Successful,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Successful | Self::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoAttempt => "no_attempt",
            Self::Waiting => "waiting",
            Self::Submitted => "submitted",
            Self::Successful => "successful",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Identity of a task: its stage plus its tag set
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub stage: String,
    pub tags: TagSet,
}

impl TaskKey {
    pub fn new(stage: impl Into<String>, tags: TagSet) -> Self {
        Self {
            stage: stage.into(),
            tags,
        }
    }

    /// Stable BLAKE3 digest of the key
    pub fn digest(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.stage.as_bytes());
        for (k, v) in self.tags.iter() {
            hasher.update(&[0]);
            hasher.update(k.as_bytes());
            hasher.update(&[1]);
            hasher.update(v.type_name().as_bytes());
            hasher.update(v.to_string().as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.stage, self.tags)
    }
}

/// A concrete unit of work with resolved inputs, outputs and parents
#[derive(Debug, Clone)]
pub struct Task {
    pub stage: String,
    pub tags: TagSet,
    pub parents: Vec<TaskId>,
    pub input_files: Vec<TaskFile>,
    pub output_files: Vec<TaskFile>,
    pub resources: Resources,
    pub drm: String,
    pub status: TaskStatus,
    pub output_dir: String,
    /// Offer this task's inputs to children alongside its outputs
    pub forward_inputs: bool,
    /// The tool that produced this task; absent for tasks loaded from a store
    pub tool: Option<Arc<Tool>>,
}

impl Task {
    pub fn key(&self) -> TaskKey {
        TaskKey::new(self.stage.clone(), self.tags.clone())
    }

    /// Human-readable label used in diagnostics
    pub fn label(&self) -> String {
        format!("<Task {} {}>", self.stage, self.tags)
    }

    /// Files a child task may match its inputs against
    pub fn match_candidates(&self) -> impl Iterator<Item = &TaskFile> {
        let forwarded: &[TaskFile] = if self.forward_inputs {
            &self.input_files
        } else {
            &[]
        };
        self.output_files.iter().chain(forwarded.iter())
    }

    pub fn must_succeed(&self) -> bool {
        self.resources.must_succeed
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
