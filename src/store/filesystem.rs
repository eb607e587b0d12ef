// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Filesystem-based store
//!
//! Each execution is one JSON snapshot under the store directory.

use std::path::{Path, PathBuf};

use super::{Snapshot, StageRecord, Store, TaskRecord};
use crate::errors::{StagecraftError, StagecraftResult};
use crate::execution::Execution;

/// Store that writes one JSON file per execution
#[derive(Debug, Clone)]
pub struct FileStore {
    store_dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `store_dir`
    pub fn new(store_dir: impl Into<PathBuf>) -> StagecraftResult<Self> {
        let store_dir = store_dir.into();
        if !store_dir.exists() {
            std::fs::create_dir_all(&store_dir).map_err(|e| {
                StagecraftError::store(format!("Failed to create store directory: {}", e))
            })?;
        }
        Ok(Self { store_dir })
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Path of the snapshot for `execution`
    pub fn snapshot_path(&self, execution: &str) -> PathBuf {
        let key = blake3::hash(execution.as_bytes()).to_hex().to_string();
        let (prefix, rest) = key.split_at(2);
        self.store_dir.join(prefix).join(format!("{}.json", rest))
    }

    /// Read the snapshot for `execution`, if one was saved
    pub fn load(&self, execution: &str) -> StagecraftResult<Option<Snapshot>> {
        let path = self.snapshot_path(execution);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            StagecraftError::store(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let snapshot: Snapshot = serde_json::from_str(&content).map_err(|e| {
            StagecraftError::store(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        if snapshot.execution != execution {
            return Err(StagecraftError::store(format!(
                "{} belongs to execution '{}', not '{}'",
                path.display(),
                snapshot.execution,
                execution
            )));
        }

        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> StagecraftResult<()> {
        let path = self.snapshot_path(&snapshot.execution);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StagecraftError::store(format!("Failed to create store subdirectory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, content).map_err(|e| {
            StagecraftError::store(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            StagecraftError::store(format!("Failed to write {}: {}", path.display(), e))
        })?;

        tracing::debug!(execution = %snapshot.execution, path = %path.display(), "saved snapshot");
        Ok(())
    }

    /// Every snapshot in the store
    pub fn list(&self) -> StagecraftResult<Vec<Snapshot>> {
        let mut snapshots = Vec::new();

        for prefix_dir in std::fs::read_dir(&self.store_dir)? {
            let prefix_dir = prefix_dir?.path();
            if !prefix_dir.is_dir() {
                continue;
            }

            for entry in std::fs::read_dir(&prefix_dir)? {
                let entry = entry?.path();
                if entry.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                // Unreadable snapshots are skipped rather than failing the listing
                match std::fs::read_to_string(&entry)
                    .ok()
                    .and_then(|c| serde_json::from_str::<Snapshot>(&c).ok())
                {
                    Some(snapshot) => snapshots.push(snapshot),
                    None => tracing::warn!(path = %entry.display(), "skipping unreadable snapshot"),
                }
            }
        }

        snapshots.sort_by(|a, b| a.execution.cmp(&b.execution));
        Ok(snapshots)
    }
}

impl Store for FileStore {
    fn get_or_create_stage(
        &mut self,
        execution: &str,
        stage: &str,
    ) -> StagecraftResult<(StageRecord, bool)> {
        let mut snapshot = self
            .load(execution)?
            .unwrap_or_else(|| Snapshot::empty(execution));
        let (record, created) = snapshot.stage_entry(stage);
        if created {
            self.save(&snapshot)?;
        }
        Ok((record, created))
    }

    fn existing_tasks(&self, execution: &str) -> StagecraftResult<Vec<TaskRecord>> {
        Ok(self.load(execution)?.map(|s| s.tasks).unwrap_or_default())
    }

    fn persist(&mut self, execution: &Execution) -> StagecraftResult<()> {
        self.save(&Snapshot::capture(execution)?)
    }

    fn clear(&mut self, execution: &str) -> StagecraftResult<()> {
        let path = self.snapshot_path(execution);
        if path.exists() {
            std::fs::remove_file(&path).map_err(|e| {
                StagecraftError::store(format!("Failed to remove {}: {}", path.display(), e))
            })?;
        }
        Ok(())
    }
}
