// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Submission backends (DRMs) and DAG-ordered submission
//!
//! Concrete schedulers live outside this crate; they implement [`Drm`]. The
//! [`Submitter`] walks a task graph in waves of ready tasks so that a task is
//! only handed to its backend once every parent has succeeded.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use tokio::sync::Mutex;

use crate::errors::{StagecraftError, StagecraftResult};
use crate::execution::{Execution, Task, TaskId, TaskKey, TaskStatus};
use crate::pipeline::TaskGraph;

/// A job submission backend
#[async_trait]
pub trait Drm: Send + Sync {
    /// Name tasks use to select this backend
    fn name(&self) -> &str;

    /// Hand over a task and its job script, returning the resulting status
    async fn submit(&self, task: &Task, script: &str) -> StagecraftResult<TaskStatus>;
}

/// A submitted job script, as recorded by [`DryRunDrm`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub task: TaskKey,
    pub script: String,
}

/// Backend that records submissions instead of running them
#[derive(Debug, Default)]
pub struct DryRunDrm {
    name: String,
    failing: HashSet<TaskKey>,
    submissions: Mutex<Vec<Submission>>,
}

impl DryRunDrm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failing: HashSet::new(),
            submissions: Mutex::new(Vec::new()),
        }
    }

    /// Report `task` as failed when it is submitted
    pub fn fail_on(mut self, task: TaskKey) -> Self {
        self.failing.insert(task);
        self
    }

    pub async fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().await.clone()
    }
}

#[async_trait]
impl Drm for DryRunDrm {
    fn name(&self) -> &str {
        &self.name
    }

    async fn submit(&self, task: &Task, script: &str) -> StagecraftResult<TaskStatus> {
        let key = task.key();
        let status = if self.failing.contains(&key) {
            TaskStatus::Failed
        } else {
            TaskStatus::Successful
        };

        self.submissions.lock().await.push(Submission {
            task: key,
            script: script.to_string(),
        });
        Ok(status)
    }
}

/// Outcome of [`Submitter::submit_all`]
#[derive(Debug, Clone, Default)]
pub struct SubmissionReport {
    /// Tasks handed to a backend, in submission order
    pub submitted: Vec<TaskId>,
    /// No-op tasks marked successful without a backend
    pub noop: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    /// Failed tasks whose failure halts dependent work
    pub failed_required: Vec<TaskId>,
    /// Tasks never attempted because a parent did not succeed
    pub blocked: Vec<TaskId>,
    /// Handed-over tasks whose backend reported a non-terminal status
    pub pending: Vec<TaskId>,
    /// Number of ready waves processed
    pub waves: usize,
}

impl SubmissionReport {
    pub fn success(&self) -> bool {
        self.failed_required.is_empty() && self.blocked.is_empty()
    }

    /// Successful, and no task is left waiting on its backend
    pub fn is_complete(&self) -> bool {
        self.success() && self.pending.is_empty()
    }
}

/// Submits the tasks of a graph in dependency order
#[derive(Default)]
pub struct Submitter {
    drms: HashMap<String, Box<dyn Drm>>,
}

impl Submitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own name
    pub fn register(&mut self, drm: Box<dyn Drm>) {
        self.drms.insert(drm.name().to_string(), drm);
    }

    /// A submitter with a dry-run backend for every DRM used by `execution`
    pub fn dry_run(execution: &Execution) -> Self {
        let mut submitter = Self::new();
        let names: BTreeSet<&str> = execution.tasks().map(|(_, t)| t.drm.as_str()).collect();
        for name in names {
            submitter.register(Box::new(DryRunDrm::new(name)));
        }
        submitter
    }

    pub fn drm(&self, name: &str) -> Option<&dyn Drm> {
        self.drms.get(name).map(|d| d.as_ref())
    }

    /// Submit every not-yet-attempted task of `graph`
    ///
    /// Each wave submits the tasks whose parents have all succeeded. No-op
    /// tasks succeed immediately. Children of a failed task are never
    /// submitted and end up in [`SubmissionReport::blocked`]. A task is handed
    /// to its backend at most once per call; if the backend answers with a
    /// non-terminal status the task ends up in [`SubmissionReport::pending`].
    pub async fn submit_all(
        &self,
        execution: &mut Execution,
        graph: &TaskGraph,
    ) -> StagecraftResult<SubmissionReport> {
        let mut report = SubmissionReport::default();
        let mut handed: HashSet<TaskId> = HashSet::new();

        loop {
            let ready: Vec<TaskId> = graph
                .ready(execution)
                .into_iter()
                .filter(|id| !handed.contains(id))
                .collect();
            if ready.is_empty() {
                break;
            }
            report.waves += 1;
            tracing::debug!(wave = report.waves, tasks = ready.len(), "submitting wave");

            for id in ready {
                handed.insert(id);
                let Some(script) = execution.command_script(id)? else {
                    execution.set_status(id, TaskStatus::Successful)?;
                    report.noop.push(id);
                    continue;
                };

                let (drm, must_succeed) = {
                    let task = execution.get(id)?;
                    let drm = self.drms.get(&task.drm).ok_or_else(|| StagecraftError::UnknownDrm {
                        drm: task.drm.clone(),
                        task: task.label(),
                    })?;
                    (drm, task.must_succeed())
                };

                execution.set_status(id, TaskStatus::Submitted)?;
                let status = drm.submit(execution.get(id)?, &script).await?;
                execution.set_status(id, status)?;
                report.submitted.push(id);

                if !status.is_terminal() {
                    let task = execution.get(id)?;
                    tracing::warn!(task = %task.label(), %status, "backend left task pending");
                    report.pending.push(id);
                } else if status == TaskStatus::Failed {
                    let task = execution.get(id)?;
                    if must_succeed {
                        tracing::error!(task = %task.label(), "required task failed");
                        report.failed_required.push(id);
                    } else {
                        tracing::warn!(task = %task.label(), "optional task failed");
                    }
                    report.failed.push(id);
                }
            }
        }

        report.blocked = graph
            .tasks()
            .into_iter()
            .filter(|id| !handed.contains(id))
            .filter(|id| {
                execution
                    .task(*id)
                    .is_some_and(|t| t.status == TaskStatus::NoAttempt)
            })
            .collect();

        tracing::info!(
            submitted = report.submitted.len(),
            failed = report.failed.len(),
            blocked = report.blocked.len(),
            pending = report.pending.len(),
            "submission finished"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{render_recipe, ExecutionConfig, ManyToOne, OneToOne, Recipe};
    use crate::store::MemoryStore;
    use crate::tool::{FileSpec, Input, TagSet, TemplateTool, ToolDef, ToolSchema};
    use std::sync::Arc;

    fn copy_tool() -> Arc<dyn ToolDef> {
        let schema = ToolSchema::builder("copy")
            .input("in_src", FileSpec::input("src", r"\.txt$").unwrap())
            .output("out_dst", FileSpec::output("{sample}.txt"))
            .build()
            .unwrap();
        Arc::new(TemplateTool::new(schema, "cp {in_src} {out_dst}").unwrap())
    }

    fn concat_tool() -> Arc<dyn ToolDef> {
        let schema = ToolSchema::builder("concat")
            .input("in_parts", FileSpec::input("parts", r"\.txt$").unwrap().n(">=1").unwrap())
            .output("out_all", FileSpec::output("all.txt"))
            .build()
            .unwrap();
        Arc::new(TemplateTool::new(schema, "cat {in_parts} > {out_all}").unwrap())
    }

    fn rendered() -> (Execution, TaskGraph) {
        let mut recipe = Recipe::new("copy");
        let load = recipe
            .add_source(
                "inputs",
                vec![
                    Input::new(["a.txt"]).tool(TagSet::new().with("sample", "a")),
                    Input::new(["b.txt"]).tool(TagSet::new().with("sample", "b")),
                ],
            )
            .unwrap();
        let copy = recipe
            .add_stage("copy", copy_tool(), &[load], OneToOne, "copied")
            .unwrap();
        recipe
            .add_stage("concat", concat_tool(), &[copy], ManyToOne::new(Vec::<String>::new()), "")
            .unwrap();

        let mut store = MemoryStore::new();
        let mut execution = Execution::new(&ExecutionConfig::default());
        let out = render_recipe(&mut execution, &mut recipe, &mut store).unwrap();
        (execution, out.tasks)
    }

    #[tokio::test]
    async fn test_submit_all_in_waves() {
        let (mut execution, graph) = rendered();
        let submitter = Submitter::dry_run(&execution);

        let report = submitter.submit_all(&mut execution, &graph).await.unwrap();

        assert!(report.success());
        assert_eq!(report.noop, vec![TaskId(0), TaskId(1)]);
        assert_eq!(report.submitted, vec![TaskId(2), TaskId(3), TaskId(4)]);
        assert_eq!(report.waves, 3);
        assert!(execution
            .tasks()
            .all(|(_, t)| t.status == TaskStatus::Successful));
    }

    #[tokio::test]
    async fn test_failure_blocks_dependents() {
        let (mut execution, graph) = rendered();
        let failing = execution.get(TaskId(3)).unwrap().key();

        let mut submitter = Submitter::new();
        submitter.register(Box::new(DryRunDrm::new("local").fail_on(failing)));

        let report = submitter.submit_all(&mut execution, &graph).await.unwrap();
        assert_eq!(report.failed, vec![TaskId(3)]);
        assert_eq!(report.failed_required, vec![TaskId(3)]);
        assert_eq!(report.blocked, vec![TaskId(4)]);
        assert!(!report.success());
        assert_eq!(execution.get(TaskId(2)).unwrap().status, TaskStatus::Successful);
    }

    #[tokio::test]
    async fn test_unknown_drm() {
        let (mut execution, graph) = rendered();
        let submitter = Submitter::new();

        let err = submitter.submit_all(&mut execution, &graph).await.unwrap_err();
        assert!(matches!(err, StagecraftError::UnknownDrm { .. }));
    }

    /// Backend that accepts nothing and leaves every task un-attempted
    struct Declining {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Drm for Declining {
        fn name(&self) -> &str {
            "local"
        }

        async fn submit(&self, _task: &Task, _script: &str) -> StagecraftResult<TaskStatus> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(TaskStatus::NoAttempt)
        }
    }

    struct Shared(Arc<Declining>);

    #[async_trait]
    impl Drm for Shared {
        fn name(&self) -> &str {
            self.0.name()
        }

        async fn submit(&self, task: &Task, script: &str) -> StagecraftResult<TaskStatus> {
            self.0.submit(task, script).await
        }
    }

    #[tokio::test]
    async fn test_declined_tasks_are_submitted_once() {
        let (mut execution, graph) = rendered();
        let drm = Arc::new(Declining {
            calls: Default::default(),
        });

        let mut submitter = Submitter::new();
        submitter.register(Box::new(Shared(drm.clone())));

        let report = submitter.submit_all(&mut execution, &graph).await.unwrap();

        assert_eq!(drm.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(report.pending, vec![TaskId(2), TaskId(3)]);
        assert_eq!(report.blocked, vec![TaskId(4)]);
        assert!(report.failed.is_empty());
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_dry_run_records_scripts() {
        let (execution, _) = rendered();
        let drm = DryRunDrm::new("local");
        let task = execution.get(TaskId(2)).unwrap();
        let script = execution.command_script(TaskId(2)).unwrap().unwrap();

        let status = drm.submit(task, &script).await.unwrap();
        assert_eq!(status, TaskStatus::Successful);

        let submissions = drm.submissions().await;
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].script.ends_with("cp a.txt copied/a.txt\n"));
    }
}
