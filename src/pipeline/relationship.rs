// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Relationships: how a stage's tasks derive from its parent stages' tasks
//!
//! A relationship turns the parent tasks into tool instances. Each tool
//! carries the parent task ids it depends on and the tag set of the task it
//! will generate.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::{StagecraftError, StagecraftResult};
use crate::execution::{Task, TaskId};
use crate::tool::{TagSet, TagValue, Tool, ToolDef};

/// Everything a relationship can see while expanding one stage
pub struct StageContext<'a> {
    pub stage: &'a str,
    pub tool: &'a Arc<dyn ToolDef>,
    /// Output directory template for the generated tools
    pub out: &'a str,
    /// Tasks of all parent stages, in stage order
    pub parents: Vec<(TaskId, &'a Task)>,
}

impl StageContext<'_> {
    fn tool(&self, tags: TagSet, parents: Vec<TaskId>) -> Tool {
        Tool::new(Arc::clone(self.tool), tags, parents, self.out)
    }
}

/// Strategy producing the tools of a derived stage
pub trait Relationship: Send + Sync + fmt::Debug {
    /// Short name used in graphs and listings
    fn name(&self) -> &'static str;

    fn gen_tasks(&self, ctx: &StageContext<'_>) -> StagecraftResult<Vec<Tool>>;
}

/// One child per parent task, with the parent's tags
#[derive(Debug, Clone, Copy, Default)]
pub struct OneToOne;

impl Relationship for OneToOne {
    fn name(&self) -> &'static str {
        "one2one"
    }

    fn gen_tasks(&self, ctx: &StageContext<'_>) -> StagecraftResult<Vec<Tool>> {
        Ok(ctx
            .parents
            .iter()
            .map(|(id, task)| ctx.tool(task.tags.clone(), vec![*id]))
            .collect())
    }
}

/// One child per group of parents sharing the values of `keywords`
#[derive(Debug, Clone, Default)]
pub struct ManyToOne {
    pub keywords: Vec<String>,
}

impl ManyToOne {
    pub fn new<S: Into<String>>(keywords: impl IntoIterator<Item = S>) -> Self {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

impl Relationship for ManyToOne {
    fn name(&self) -> &'static str {
        "many2one"
    }

    fn gen_tasks(&self, ctx: &StageContext<'_>) -> StagecraftResult<Vec<Tool>> {
        Ok(group_by(ctx, &self.keywords)?
            .into_iter()
            .map(|(tags, parents)| ctx.tool(tags, parents))
            .collect())
    }
}

/// Several children per parent, one for each combination of split values
#[derive(Debug, Clone, Default)]
pub struct OneToMany {
    pub split: BTreeMap<String, Vec<TagValue>>,
}

impl OneToMany {
    pub fn new(split: BTreeMap<String, Vec<TagValue>>) -> Self {
        Self { split }
    }
}

impl Relationship for OneToMany {
    fn name(&self) -> &'static str {
        "one2many"
    }

    fn gen_tasks(&self, ctx: &StageContext<'_>) -> StagecraftResult<Vec<Tool>> {
        let combos = combinations(&self.split);
        let mut tools = Vec::with_capacity(ctx.parents.len() * combos.len());
        for (id, task) in &ctx.parents {
            for combo in &combos {
                tools.push(ctx.tool(task.tags.merged(combo), vec![*id]));
            }
        }
        Ok(tools)
    }
}

/// Group parents by `keywords`, then split each group
#[derive(Debug, Clone, Default)]
pub struct ManyToMany {
    pub keywords: Vec<String>,
    pub split: BTreeMap<String, Vec<TagValue>>,
}

impl Relationship for ManyToMany {
    fn name(&self) -> &'static str {
        "many2many"
    }

    fn gen_tasks(&self, ctx: &StageContext<'_>) -> StagecraftResult<Vec<Tool>> {
        let combos = combinations(&self.split);
        let mut tools = Vec::new();
        for (tags, parents) in group_by(ctx, &self.keywords)? {
            for combo in &combos {
                tools.push(ctx.tool(tags.merged(combo), parents.clone()));
            }
        }
        Ok(tools)
    }
}

/// Group parent tasks by the projection of their tags onto `keywords`
///
/// Groups keep first-seen order, and parents keep their order within a group.
fn group_by(
    ctx: &StageContext<'_>,
    keywords: &[String],
) -> StagecraftResult<Vec<(TagSet, Vec<TaskId>)>> {
    let mut groups: Vec<(TagSet, Vec<TaskId>)> = Vec::new();

    for (id, task) in &ctx.parents {
        let key = task.tags.project(keywords).ok_or_else(|| {
            let missing = keywords
                .iter()
                .filter(|k| !task.tags.contains_key(k))
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            StagecraftError::InvalidStage {
                stage: ctx.stage.to_string(),
                reason: format!("parent {} has no tag(s) {} to group by", task.label(), missing),
            }
        })?;

        match groups.iter_mut().find(|(tags, _)| *tags == key) {
            Some((_, ids)) => ids.push(*id),
            None => groups.push((key, vec![*id])),
        }
    }

    Ok(groups)
}

/// Cartesian product of split values, in key then value order
fn combinations(split: &BTreeMap<String, Vec<TagValue>>) -> Vec<TagSet> {
    let mut combos = vec![TagSet::new()];
    for (key, values) in split {
        combos = combos
            .iter()
            .flat_map(|base| {
                values
                    .iter()
                    .map(move |v| base.clone().with(key.clone(), v.clone()))
            })
            .collect();
    }
    combos
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::tests::Align;
    use crate::tool::Input;

    fn reads(tags: TagSet) -> Task {
        Input::new(["data/x.fq"])
            .tool(tags)
            .generate_task("inputs", &[], "local")
            .unwrap()
    }

    fn context<'a>(tool: &'a Arc<dyn ToolDef>, parents: &'a [Task]) -> StageContext<'a> {
        StageContext {
            stage: "child",
            tool,
            out: "child/{sample}",
            parents: parents.iter().enumerate().map(|(i, t)| (TaskId(i), t)).collect(),
        }
    }

    fn samples() -> Vec<Task> {
        vec![
            reads(TagSet::new().with("sample", "A").with("lane", 1)),
            reads(TagSet::new().with("sample", "B").with("lane", 1)),
            reads(TagSet::new().with("sample", "A").with("lane", 2)),
        ]
    }

    #[test]
    fn test_one2one() {
        let def = Align::new();
        let parents = samples();
        let tools = OneToOne.gen_tasks(&context(&def, &parents)).unwrap();

        assert_eq!(tools.len(), 3);
        assert_eq!(tools[1].tags(), &parents[1].tags);
        assert_eq!(tools[1].parents(), &[TaskId(1)]);
        assert_eq!(tools[1].out(), "child/{sample}");
    }

    #[test]
    fn test_many2one_groups_in_first_seen_order() {
        let def = Align::new();
        let parents = samples();
        let tools = ManyToOne::new(["sample"])
            .gen_tasks(&context(&def, &parents))
            .unwrap();

        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].tags(), &TagSet::new().with("sample", "A"));
        assert_eq!(tools[0].parents(), &[TaskId(0), TaskId(2)]);
        assert_eq!(tools[1].parents(), &[TaskId(1)]);
    }

    #[test]
    fn test_many2one_missing_keyword() {
        let def = Align::new();
        let parents = vec![reads(TagSet::new().with("lane", 1))];
        let err = ManyToOne::new(["sample"])
            .gen_tasks(&context(&def, &parents))
            .unwrap_err();

        match err {
            StagecraftError::InvalidStage { stage, reason } => {
                assert_eq!(stage, "child");
                assert!(reason.contains("sample"));
            }
            other => panic!("expected InvalidStage, got {:?}", other),
        }
    }

    #[test]
    fn test_one2many_splits_each_parent() {
        let def = Align::new();
        let parents = vec![reads(TagSet::new().with("sample", "A"))];
        let mut split = BTreeMap::new();
        split.insert("chrom".to_string(), vec![TagValue::from("1"), TagValue::from("2")]);
        split.insert("strand".to_string(), vec![TagValue::from("+"), TagValue::from("-")]);

        let tools = OneToMany::new(split).gen_tasks(&context(&def, &parents)).unwrap();
        assert_eq!(tools.len(), 4);
        assert_eq!(
            tools[0].tags(),
            &TagSet::new().with("sample", "A").with("chrom", "1").with("strand", "+")
        );
        assert!(tools.iter().all(|t| t.parents() == [TaskId(0)]));
    }

    #[test]
    fn test_many2many() {
        let def = Align::new();
        let parents = samples();
        let mut split = BTreeMap::new();
        split.insert("chrom".to_string(), vec![TagValue::from("1"), TagValue::from("2")]);

        let rel = ManyToMany {
            keywords: vec!["sample".into()],
            split,
        };
        let tools = rel.gen_tasks(&context(&def, &parents)).unwrap();

        assert_eq!(tools.len(), 4);
        assert_eq!(tools[1].tags(), &TagSet::new().with("sample", "A").with("chrom", "2"));
        assert_eq!(tools[1].parents(), &[TaskId(0), TaskId(2)]);
    }

    #[test]
    fn test_empty_split_is_identity() {
        assert_eq!(combinations(&BTreeMap::new()), vec![TagSet::new()]);
    }
}
