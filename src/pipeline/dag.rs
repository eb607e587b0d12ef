// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Stage and task dependency graphs
//!
//! Both graphs are built from already-acyclic structures, but topological
//! sorting still reports a cycle instead of panicking if one appears.

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

use super::recipe::Recipe;
use crate::errors::{StagecraftError, StagecraftResult};
use crate::execution::{Execution, Task, TaskId, TaskStatus};

/// Graph of concrete tasks, edges point from parent to child
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    graph: DiGraph<TaskId, ()>,
    nodes: HashMap<TaskId, NodeIndex>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph of `tasks` and their parent edges
    ///
    /// Parents outside `tasks` are added as nodes too.
    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = (TaskId, &'a Task)>) -> Self {
        let mut graph = Self::new();
        for (id, task) in tasks {
            graph.add_task(id);
            for parent in &task.parents {
                graph.add_edge(*parent, id);
            }
        }
        graph
    }

    pub fn add_task(&mut self, id: TaskId) -> NodeIndex {
        if let Some(node) = self.nodes.get(&id) {
            return *node;
        }
        let node = self.graph.add_node(id);
        self.nodes.insert(id, node);
        node
    }

    /// Add a parent edge; returns `false` if it already existed
    pub fn add_edge(&mut self, parent: TaskId, child: TaskId) -> bool {
        let from = self.add_task(parent);
        let to = self.add_task(child);
        if self.graph.contains_edge(from, to) {
            return false;
        }
        self.graph.add_edge(from, to, ());
        true
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Task ids in insertion order
    pub fn tasks(&self) -> Vec<TaskId> {
        self.graph.node_indices().map(|n| self.graph[n]).collect()
    }

    pub fn edges(&self) -> Vec<(TaskId, TaskId)> {
        self.graph
            .raw_edges()
            .iter()
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
            .collect()
    }

    fn neighbors(&self, id: TaskId, direction: Direction) -> Vec<TaskId> {
        let Some(node) = self.nodes.get(&id) else {
            return Vec::new();
        };
        let mut ids: Vec<TaskId> = self
            .graph
            .neighbors_directed(*node, direction)
            .map(|n| self.graph[n])
            .collect();
        ids.sort();
        ids
    }

    pub fn parents(&self, id: TaskId) -> Vec<TaskId> {
        self.neighbors(id, Direction::Incoming)
    }

    pub fn children(&self, id: TaskId) -> Vec<TaskId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Whether `a` depends, directly or transitively, on `b`
    pub fn depends_on(&self, a: TaskId, b: TaskId) -> bool {
        match (self.nodes.get(&a), self.nodes.get(&b)) {
            (Some(a), Some(b)) => a != b && has_path_connecting(&self.graph, *b, *a, None),
            _ => false,
        }
    }

    pub fn is_acyclic(&self) -> bool {
        toposort(&self.graph, None).is_ok()
    }

    /// Task ids with every parent before its children
    pub fn topological_order(&self) -> StagecraftResult<Vec<TaskId>> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n]).collect())
            .map_err(|cycle| StagecraftError::CircularDependency {
                tasks: vec![self.graph[cycle.node_id()].to_string()],
            })
    }

    /// Tasks not yet attempted whose parents have all succeeded
    pub fn ready(&self, execution: &Execution) -> Vec<TaskId> {
        let mut ready: Vec<TaskId> = self
            .tasks()
            .into_iter()
            .filter(|id| {
                execution
                    .task(*id)
                    .is_some_and(|t| t.status == TaskStatus::NoAttempt)
            })
            .filter(|id| {
                self.parents(*id).iter().all(|p| {
                    execution
                        .task(*p)
                        .is_some_and(|t| t.status == TaskStatus::Successful)
                })
            })
            .collect();
        ready.sort();
        ready
    }

    /// Graphviz rendering with one cluster per stage, colored by status
    pub fn to_dot(&self, execution: &Execution) -> String {
        let mut by_stage: BTreeMap<usize, (&str, Vec<(TaskId, &Task)>)> = BTreeMap::new();
        for id in self.tasks() {
            if let Some(task) = execution.task(id) {
                let rank = execution
                    .stages()
                    .iter()
                    .position(|s| s.name == task.stage)
                    .unwrap_or(usize::MAX);
                by_stage
                    .entry(rank)
                    .or_insert_with(|| (task.stage.as_str(), Vec::new()))
                    .1
                    .push((id, task));
            }
        }

        let mut out = String::from("digraph tasks {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=\"rounded,filled\"];\n\n");

        for (i, (stage, tasks)) in by_stage.values().enumerate() {
            out.push_str(&format!("    subgraph cluster_{} {{\n", i));
            out.push_str(&format!("        label=\"{}\";\n", escape(stage)));
            for (id, task) in tasks {
                out.push_str(&format!(
                    "        t{} [label=\"{}\", fillcolor=\"{}\"];\n",
                    id.0,
                    escape(&task.tags.to_string()),
                    status_color(task.status)
                ));
            }
            out.push_str("    }\n");
        }

        if self.edge_count() > 0 {
            out.push('\n');
        }
        for (parent, child) in self.edges() {
            out.push_str(&format!("    t{} -> t{};\n", parent.0, child.0));
        }

        out.push_str("}\n");
        out
    }

    pub fn to_mermaid(&self, execution: &Execution) -> String {
        let mut out = String::from("graph TD\n");

        for id in self.tasks() {
            let label = execution
                .task(id)
                .map(|t| format!("{} {}", t.stage, t.tags))
                .unwrap_or_else(|| id.to_string());
            out.push_str(&format!("    t{}[\"{}\"]\n", id.0, label.replace('"', "'")));
        }

        for (parent, child) in self.edges() {
            out.push_str(&format!("    t{} --> t{}\n", parent.0, child.0));
        }

        out
    }

    /// Numbered listing in topological order
    pub fn to_text(&self, execution: &Execution) -> StagecraftResult<String> {
        let order = self.topological_order()?;
        let mut out = String::new();

        for (i, id) in order.iter().enumerate() {
            let task = execution.get(*id)?;
            out.push_str(&format!("{}. {} [{}]", i + 1, task.label(), task.status));

            let parents = self.parents(*id);
            if !parents.is_empty() {
                let parents: Vec<String> = parents.iter().map(|p| p.to_string()).collect();
                out.push_str(&format!(" <- {}", parents.join(", ")));
            }
            out.push_str(&format!(" ({})\n", id));
        }

        Ok(out)
    }
}

/// Graph of the stages of a recipe
#[derive(Debug, Clone, Default)]
pub struct StageGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl StageGraph {
    pub fn from_recipe(recipe: &Recipe) -> Self {
        let mut graph = Self::default();
        for (_, template) in recipe.stages() {
            let node = graph.graph.add_node(template.name.clone());
            graph.nodes.insert(template.name.clone(), node);
        }
        for (from, to) in recipe.edges() {
            graph.graph.update_edge(graph.nodes[&from], graph.nodes[&to], ());
        }
        graph
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn names(&self) -> Vec<&str> {
        self.graph.node_indices().map(|n| self.graph[n].as_str()).collect()
    }

    pub fn topological_order_names(&self) -> StagecraftResult<Vec<String>> {
        toposort(&self.graph, None)
            .map(|nodes| nodes.into_iter().map(|n| self.graph[n].clone()).collect())
            .map_err(|cycle| StagecraftError::CircularDependency {
                tasks: vec![self.graph[cycle.node_id()].clone()],
            })
    }

    /// Stages that must be expanded before `stage`
    pub fn dependencies(&self, stage: &str) -> Option<Vec<String>> {
        let node = self.nodes.get(stage)?;
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(*node, Direction::Incoming)
            .collect();
        deps.sort();
        Some(deps.into_iter().map(|n| self.graph[n].clone()).collect())
    }

    /// Stages that consume the tasks of `stage`
    pub fn dependents(&self, stage: &str) -> Option<Vec<String>> {
        let node = self.nodes.get(stage)?;
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(*node, Direction::Outgoing)
            .collect();
        deps.sort();
        Some(deps.into_iter().map(|n| self.graph[n].clone()).collect())
    }

    /// Check if stage `a` depends (directly or transitively) on stage `b`
    pub fn depends_on(&self, a: &str, b: &str) -> bool {
        let (Some(a), Some(b)) = (self.nodes.get(a), self.nodes.get(b)) else {
            return false;
        };
        a != b && has_path_connecting(&self.graph, *b, *a, None)
    }

    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("graph TD\n");
        for node in self.graph.node_indices() {
            out.push_str(&format!("    s{}[{}]\n", node.index(), self.graph[node]));
        }
        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    s{} --> s{}\n",
                edge.source().index(),
                edge.target().index()
            ));
        }
        out
    }

    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph stages {\n");
        out.push_str("    rankdir=TB;\n");
        out.push_str("    node [shape=box, style=rounded];\n\n");

        for node in self.graph.node_indices() {
            out.push_str(&format!("    \"{}\";\n", escape(&self.graph[node])));
        }
        for edge in self.graph.raw_edges() {
            out.push_str(&format!(
                "    \"{}\" -> \"{}\";\n",
                escape(&self.graph[edge.source()]),
                escape(&self.graph[edge.target()])
            ));
        }

        out.push_str("}\n");
        out
    }

    /// Numbered listing with each stage's tool and relationship
    pub fn to_text(&self, recipe: &Recipe) -> StagecraftResult<String> {
        let mut out = String::new();

        for (i, name) in self.topological_order_names()?.iter().enumerate() {
            let template = recipe.handle(name).and_then(|h| recipe.template(h));
            let tool = template.map_or("?", |t| t.tool_name());
            out.push_str(&format!("{}. {} ({})", i + 1, name, tool));

            if let Some(rel) = template.and_then(|t| t.relationship_name()) {
                out.push_str(&format!(" {}", rel));
            }

            let deps = self.dependencies(name).unwrap_or_default();
            if !deps.is_empty() {
                out.push_str(&format!(" [depends: {}]", deps.join(", ")));
            }
            out.push('\n');
        }

        Ok(out)
    }
}

fn status_color(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::NoAttempt => "white",
        TaskStatus::Waiting => "lightgrey",
        TaskStatus::Submitted => "lightskyblue",
        TaskStatus::Successful => "darkseagreen",
        TaskStatus::Failed => "lightcoral",
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
