// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Recipes: reusable graphs of stage templates

use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::relationship::Relationship;
use crate::errors::{StagecraftError, StagecraftResult};
use crate::tool::{Tool, ToolDef};

/// Opaque reference to a stage template within its recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StageHandle(NodeIndex);

impl StageHandle {
    pub fn index(self) -> usize {
        self.0.index()
    }
}

/// How a stage obtains its tools
#[derive(Debug)]
pub enum StageKind {
    /// Explicit tool instances, usually [`crate::tool::Input`] tools
    Source(Vec<Tool>),
    /// Tools generated from the parent stages' tasks
    Derived {
        tool: Arc<dyn ToolDef>,
        rel: Box<dyn Relationship>,
        /// Output directory template, formatted with each task's tags
        out: String,
    },
}

/// Named stage node of a recipe
#[derive(Debug)]
pub struct StageTemplate {
    pub name: String,
    pub kind: StageKind,
    /// Submission backend for this stage's tasks unless a tool overrides it
    pub drm: Option<String>,
}

impl StageTemplate {
    pub fn is_source(&self) -> bool {
        matches!(self.kind, StageKind::Source(_))
    }

    /// Name of the tool type, or "input" for source stages
    pub fn tool_name(&self) -> &str {
        match &self.kind {
            StageKind::Source(tools) => tools.first().map_or("input", |t| t.name()),
            StageKind::Derived { tool, .. } => tool.schema().name(),
        }
    }

    pub fn relationship_name(&self) -> Option<&'static str> {
        match &self.kind {
            StageKind::Source(_) => None,
            StageKind::Derived { rel, .. } => Some(rel.name()),
        }
    }
}

/// A graph of stage templates
///
/// Edges can only point from an existing stage to a newly added one, so the
/// graph is acyclic and node order is a topological order.
pub struct Recipe {
    name: String,
    graph: DiGraph<StageTemplate, ()>,
    by_name: HashMap<String, NodeIndex>,
    execution: Option<String>,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: DiGraph::new(),
            by_name: HashMap::new(),
            execution: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Add a stage whose tasks come from explicit tools
    pub fn add_source(
        &mut self,
        name: impl Into<String>,
        tools: Vec<Tool>,
    ) -> StagecraftResult<StageHandle> {
        self.insert(
            StageTemplate {
                name: name.into(),
                kind: StageKind::Source(tools),
                drm: None,
            },
            &[],
        )
    }

    /// Add a stage whose tasks are derived from `parents`
    pub fn add_stage(
        &mut self,
        name: impl Into<String>,
        tool: Arc<dyn ToolDef>,
        parents: &[StageHandle],
        rel: impl Relationship + 'static,
        out: impl Into<String>,
    ) -> StagecraftResult<StageHandle> {
        self.add_boxed_stage(name, tool, parents, Box::new(rel), out)
    }

    /// [`Recipe::add_stage`] for a relationship chosen at runtime
    pub fn add_boxed_stage(
        &mut self,
        name: impl Into<String>,
        tool: Arc<dyn ToolDef>,
        parents: &[StageHandle],
        rel: Box<dyn Relationship>,
        out: impl Into<String>,
    ) -> StagecraftResult<StageHandle> {
        self.insert(
            StageTemplate {
                name: name.into(),
                kind: StageKind::Derived {
                    tool,
                    rel,
                    out: out.into(),
                },
                drm: None,
            },
            parents,
        )
    }

    fn insert(
        &mut self,
        template: StageTemplate,
        parents: &[StageHandle],
    ) -> StagecraftResult<StageHandle> {
        if self.by_name.contains_key(&template.name) {
            return Err(StagecraftError::DuplicateStage {
                stage: template.name,
            });
        }
        for parent in parents {
            if parent.0.index() >= self.graph.node_count() {
                return Err(StagecraftError::UnknownStage {
                    stage: template.name,
                    parent: format!("#{}", parent.index()),
                });
            }
        }

        let name = template.name.clone();
        let node = self.graph.add_node(template);
        for parent in parents {
            self.graph.update_edge(parent.0, node, ());
        }
        self.by_name.insert(name, node);

        Ok(StageHandle(node))
    }

    /// Set the default submission backend of a stage
    pub fn set_drm(&mut self, stage: StageHandle, drm: impl Into<String>) {
        if let Some(template) = self.graph.node_weight_mut(stage.0) {
            template.drm = Some(drm.into());
        }
    }

    pub fn handle(&self, name: &str) -> Option<StageHandle> {
        self.by_name.get(name).copied().map(StageHandle)
    }

    pub fn template(&self, stage: StageHandle) -> Option<&StageTemplate> {
        self.graph.node_weight(stage.0)
    }

    /// Stage templates in topological order
    pub fn stages(&self) -> impl Iterator<Item = (StageHandle, &StageTemplate)> {
        self.graph
            .node_indices()
            .map(move |n| (StageHandle(n), &self.graph[n]))
    }

    /// Parent stages in the order they were added
    pub fn parents(&self, stage: StageHandle) -> Vec<StageHandle> {
        let mut parents: Vec<StageHandle> = self
            .graph
            .neighbors_directed(stage.0, petgraph::Direction::Incoming)
            .map(StageHandle)
            .collect();
        parents.sort();
        parents
    }

    pub fn parent_names(&self, stage: StageHandle) -> Vec<String> {
        self.parents(stage)
            .into_iter()
            .map(|p| self.graph[p.0].name.clone())
            .collect()
    }

    pub fn edges(&self) -> Vec<(String, String)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| {
                (
                    self.graph[e.source()].name.clone(),
                    self.graph[e.target()].name.clone(),
                )
            })
            .collect()
    }

    /// Name of the execution this recipe was first rendered into
    pub fn bound_execution(&self) -> Option<&str> {
        self.execution.as_deref()
    }

    /// Bind to `execution`, refusing to switch to a different one
    pub(crate) fn bind(&mut self, execution: &str) -> StagecraftResult<()> {
        match &self.execution {
            Some(bound) if bound != execution => Err(StagecraftError::RecipeRebind {
                recipe: self.name.clone(),
                bound: bound.clone(),
                requested: execution.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.execution = Some(execution.to_string());
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipe")
            .field("name", &self.name)
            .field("stages", &self.stages().map(|(_, t)| &t.name).collect::<Vec<_>>())
            .field("execution", &self.execution)
            .finish()
    }
}
