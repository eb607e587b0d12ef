// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Recipe expansion: turning stage templates into concrete tasks
//!
//! Stages are expanded in recipe order, so every parent stage is resolved
//! before its children. A task whose `(stage, tags)` identity is already
//! known to the execution is reused rather than duplicated, which makes
//! rendering the same recipe twice a no-op.

use std::collections::HashSet;

use super::dag::{StageGraph, TaskGraph};
use super::recipe::{Recipe, StageKind};
use super::relationship::StageContext;
use crate::errors::{StagecraftError, StagecraftResult};
use crate::execution::{Execution, Task, TaskId};
use crate::store::Store;

/// Result of rendering a recipe into an execution
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Every task of the recipe's stages, with parent edges
    pub tasks: TaskGraph,
    pub stages: StageGraph,
    /// Tasks created by this render
    pub created: Vec<TaskId>,
    /// Previously known tasks this render resolved to
    pub reused: Vec<TaskId>,
}

#[derive(Default)]
struct Outcome {
    created: Vec<TaskId>,
    reused: Vec<TaskId>,
    created_set: HashSet<TaskId>,
}

/// Expand `recipe` into `execution`
///
/// The recipe is bound to the execution on first use; rendering it into a
/// different execution afterwards fails with a rebind error. Resolved stages
/// are not expanded again.
pub fn render_recipe(
    execution: &mut Execution,
    recipe: &mut Recipe,
    store: &mut dyn Store,
) -> StagecraftResult<Rendered> {
    recipe.bind(execution.name())?;

    let stage_names: Vec<String> = recipe.stages().map(|(_, t)| t.name.clone()).collect();

    for (handle, template) in recipe.stages() {
        execution.ensure_stage(&template.name, recipe.parent_names(handle), store)?;
    }

    let mut outcome = Outcome::default();

    for (handle, template) in recipe.stages() {
        let resolved = execution
            .stage(&template.name)
            .is_some_and(|s| s.resolved);
        if resolved {
            tracing::debug!(stage = %template.name, "stage already resolved");
            continue;
        }

        let drm = template
            .drm
            .clone()
            .unwrap_or_else(|| execution.default_drm().to_string());

        let candidates = match &template.kind {
            StageKind::Source(tools) => {
                let mut candidates = Vec::with_capacity(tools.len());
                for tool in tools {
                    let parents = tool
                        .parents()
                        .iter()
                        .map(|id| {
                            execution
                                .task(*id)
                                .map(|t| (*id, t))
                                .ok_or_else(|| StagecraftError::InvalidParent {
                                    tool: tool.name().to_string(),
                                    tags: tool.tags().clone(),
                                    parent: id.to_string(),
                                })
                        })
                        .collect::<StagecraftResult<Vec<_>>>()?;
                    candidates.push(tool.generate_task(&template.name, &parents, &drm)?);
                }
                candidates
            }
            StageKind::Derived { tool, rel, out } => {
                let ctx = StageContext {
                    stage: &template.name,
                    tool,
                    out,
                    parents: execution.stage_tasks(&recipe.parent_names(handle)),
                };
                let tools = rel.gen_tasks(&ctx)?;

                // Generate every task before registering any, so a failing
                // tool leaves the stage untouched.
                let mut candidates = Vec::with_capacity(tools.len());
                for tool in &tools {
                    let parents = tool
                        .parents()
                        .iter()
                        .map(|id| execution.get(*id).map(|t| (*id, t)))
                        .collect::<StagecraftResult<Vec<_>>>()?;
                    candidates.push(tool.generate_task(&template.name, &parents, &drm)?);
                }
                candidates
            }
        };

        let before = outcome.created.len();
        for candidate in candidates {
            register(execution, candidate, &mut outcome)?;
        }

        if let Some(stage) = execution.stage_mut(&template.name) {
            stage.resolved = true;
        }
        tracing::info!(
            stage = %template.name,
            created = outcome.created.len() - before,
            "expanded stage"
        );
    }

    let tasks = TaskGraph::from_tasks(execution.stage_tasks(&stage_names));
    tracing::info!(
        recipe = %recipe.name(),
        tasks = tasks.len(),
        created = outcome.created.len(),
        reused = outcome.reused.len(),
        "rendered recipe"
    );

    Ok(Rendered {
        tasks,
        stages: StageGraph::from_recipe(recipe),
        created: outcome.created,
        reused: outcome.reused,
    })
}

/// Register `candidate`, or resolve it to the known task with its identity
fn register(
    execution: &mut Execution,
    candidate: Task,
    outcome: &mut Outcome,
) -> StagecraftResult<TaskId> {
    let Some(id) = execution.find(&candidate.key()) else {
        let id = execution.insert_task(candidate);
        outcome.created.push(id);
        outcome.created_set.insert(id);
        return Ok(id);
    };

    let fresh = outcome.created_set.contains(&id);
    let existing = execution.task_mut(id)?;

    if fresh {
        for parent in candidate.parents {
            if !existing.parents.contains(&parent) {
                existing.parents.push(parent);
            }
        }
    } else {
        existing.parents = candidate.parents;
        if !outcome.reused.contains(&id) {
            outcome.reused.push(id);
        }
    }
    if existing.tool.is_none() {
        existing.tool = candidate.tool;
    }

    tracing::debug!(task = %existing.label(), "reusing existing task");
    Ok(id)
}
