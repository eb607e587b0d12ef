// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! In-memory store

use std::collections::HashMap;

use super::{Snapshot, StageRecord, Store, TaskRecord};
use crate::errors::StagecraftResult;
use crate::execution::Execution;

/// Store that keeps snapshots for the lifetime of the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: HashMap<String, Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, execution: &str) -> Option<&Snapshot> {
        self.snapshots.get(execution)
    }

    /// Seed records directly, as if a previous run had persisted them
    pub fn insert_records(
        &mut self,
        execution: &str,
        stages: Vec<StageRecord>,
        tasks: Vec<TaskRecord>,
    ) {
        let snapshot = self
            .snapshots
            .entry(execution.to_string())
            .or_insert_with(|| Snapshot::empty(execution));
        snapshot.stages.extend(stages);
        snapshot.tasks.extend(tasks);
    }
}

impl Store for MemoryStore {
    fn get_or_create_stage(
        &mut self,
        execution: &str,
        stage: &str,
    ) -> StagecraftResult<(StageRecord, bool)> {
        let snapshot = self
            .snapshots
            .entry(execution.to_string())
            .or_insert_with(|| Snapshot::empty(execution));
        Ok(snapshot.stage_entry(stage))
    }

    fn existing_tasks(&self, execution: &str) -> StagecraftResult<Vec<TaskRecord>> {
        Ok(self
            .snapshots
            .get(execution)
            .map(|s| s.tasks.clone())
            .unwrap_or_default())
    }

    fn persist(&mut self, execution: &Execution) -> StagecraftResult<()> {
        let snapshot = Snapshot::capture(execution)?;
        self.snapshots.insert(execution.name().to_string(), snapshot);
        Ok(())
    }

    fn clear(&mut self, execution: &str) -> StagecraftResult<()> {
        self.snapshots.remove(execution);
        Ok(())
    }
}
