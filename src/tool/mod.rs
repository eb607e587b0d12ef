// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Tools: factories that declare a task's data contract and produce tasks
//!
//! A tool type describes itself once with a [`ToolSchema`] (input slots,
//! output slots, parameters, resource defaults). A [`Tool`] instance pairs
//! that schema with a tag set, parent tasks and an output directory template,
//! and generates exactly one [`Task`].

mod builtin;
mod cardinality;
mod command;
mod file;
mod tags;
mod template;

pub use builtin::Input;
pub use cardinality::{Cardinality, Comparator};
pub use command::{Command, CommandArgs, CommandOutput, Segment};
pub use file::{unpack, Binding, FileSpec, MatchContext, TaskFile};
pub use tags::{TagPolicy, TagSet, TagValue};
pub use template::TemplateTool;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::errors::{StagecraftError, StagecraftResult};
use crate::execution::{Task, TaskId, TaskStatus};

/// Resource requests forwarded to the submission backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Memory in megabytes
    #[serde(default)]
    pub mem_req: Option<u64>,
    /// Wall time in minutes
    #[serde(default)]
    pub time_req: Option<u64>,
    #[serde(default)]
    pub cpu_req: Option<u32>,
    /// Whether a failure should halt dependent work
    #[serde(default = "default_true")]
    pub must_succeed: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            mem_req: None,
            time_req: None,
            cpu_req: None,
            must_succeed: true,
        }
    }
}

/// A command parameter, filled from a tag of the same name
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub default: Option<TagValue>,
}

impl ParamSpec {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Per-tool-type declaration of slots, parameters and defaults
///
/// Built once and shared; instances never mutate it.
#[derive(Debug, Clone)]
pub struct ToolSchema {
    name: String,
    inputs: Vec<(String, FileSpec)>,
    outputs: Vec<(String, FileSpec)>,
    params: Vec<ParamSpec>,
    resources: Resources,
    drm: Option<String>,
    forward_inputs: bool,
}

impl ToolSchema {
    pub fn builder(name: impl Into<String>) -> ToolSchemaBuilder {
        ToolSchemaBuilder {
            schema: Self::empty(name),
        }
    }

    pub(crate) fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: Vec::new(),
            resources: Resources::default(),
            drm: None,
            forward_inputs: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Input slots in declaration order
    pub fn inputs(&self) -> &[(String, FileSpec)] {
        &self.inputs
    }

    /// Output slots in declaration order
    pub fn outputs(&self) -> &[(String, FileSpec)] {
        &self.outputs
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn drm(&self) -> Option<&str> {
        self.drm.as_deref()
    }

    pub fn forward_inputs(&self) -> bool {
        self.forward_inputs
    }

    pub fn input(&self, slot: &str) -> Option<&FileSpec> {
        self.inputs.iter().find(|(s, _)| s == slot).map(|(_, spec)| spec)
    }

    pub fn output(&self, slot: &str) -> Option<&FileSpec> {
        self.outputs.iter().find(|(s, _)| s == slot).map(|(_, spec)| spec)
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Whether `name` is any declared slot or parameter
    pub fn declares(&self, name: &str) -> bool {
        self.input(name).is_some() || self.output(name).is_some() || self.param(name).is_some()
    }
}

/// Explicit registration API for [`ToolSchema`]
#[derive(Debug)]
pub struct ToolSchemaBuilder {
    schema: ToolSchema,
}

impl ToolSchemaBuilder {
    pub fn input(mut self, slot: impl Into<String>, spec: FileSpec) -> Self {
        self.schema.inputs.push((slot.into(), spec));
        self
    }

    pub fn output(mut self, slot: impl Into<String>, spec: FileSpec) -> Self {
        self.schema.outputs.push((slot.into(), spec));
        self
    }

    /// A required parameter
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.schema.params.push(ParamSpec {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn param_default(mut self, name: impl Into<String>, default: impl Into<TagValue>) -> Self {
        self.schema.params.push(ParamSpec {
            name: name.into(),
            default: Some(default.into()),
        });
        self
    }

    pub fn mem_req(mut self, megabytes: u64) -> Self {
        self.schema.resources.mem_req = Some(megabytes);
        self
    }

    pub fn time_req(mut self, minutes: u64) -> Self {
        self.schema.resources.time_req = Some(minutes);
        self
    }

    pub fn cpu_req(mut self, cpus: u32) -> Self {
        self.schema.resources.cpu_req = Some(cpus);
        self
    }

    pub fn must_succeed(mut self, must_succeed: bool) -> Self {
        self.schema.resources.must_succeed = must_succeed;
        self
    }

    pub fn drm(mut self, drm: impl Into<String>) -> Self {
        self.schema.drm = Some(drm.into());
        self
    }

    pub fn forward_inputs(mut self, forward: bool) -> Self {
        self.schema.forward_inputs = forward;
        self
    }

    /// Finish the schema, rejecting duplicate slot or parameter names
    pub fn build(self) -> StagecraftResult<ToolSchema> {
        let schema = self.schema;
        let mut seen = HashSet::new();

        let names = schema
            .inputs
            .iter()
            .map(|(s, _)| s.as_str())
            .chain(schema.outputs.iter().map(|(s, _)| s.as_str()))
            .chain(schema.params.iter().map(|p| p.name.as_str()));

        for name in names {
            if name.is_empty() {
                return Err(StagecraftError::InvalidToolSchema {
                    tool: schema.name.clone(),
                    reason: "slot and parameter names cannot be empty".into(),
                });
            }
            if !seen.insert(name) {
                return Err(StagecraftError::InvalidToolSchema {
                    tool: schema.name.clone(),
                    reason: format!("'{}' is declared more than once", name),
                });
            }
        }

        Ok(schema)
    }
}

/// Behaviour of a tool type
pub trait ToolDef: Send + Sync + fmt::Debug {
    /// The tool type's slot and parameter declaration
    fn schema(&self) -> &ToolSchema;

    /// Build the command text from bound inputs, outputs and parameters
    ///
    /// Tools that only register existing files return [`CommandOutput::Noop`].
    fn cmd(&self, _args: &CommandArgs) -> StagecraftResult<CommandOutput> {
        Err(StagecraftError::NotImplementedContract {
            tool: self.schema().name().to_string(),
            tags: TagSet::new(),
        })
    }

    /// Pre-existing files this tool registers as outputs
    fn sources(&self) -> Vec<TaskFile> {
        Vec::new()
    }
}

/// Parent tasks given to a tool: one, several, or none
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Parents {
    #[default]
    None,
    One(TaskId),
    Many(Vec<TaskId>),
}

impl Parents {
    pub fn into_vec(self) -> Vec<TaskId> {
        match self {
            Self::None => Vec::new(),
            Self::One(id) => vec![id],
            Self::Many(ids) => ids,
        }
    }
}

impl From<TaskId> for Parents {
    fn from(id: TaskId) -> Self {
        Self::One(id)
    }
}

impl From<Option<TaskId>> for Parents {
    fn from(id: Option<TaskId>) -> Self {
        id.map_or(Self::None, Self::One)
    }
}

impl From<Vec<TaskId>> for Parents {
    fn from(ids: Vec<TaskId>) -> Self {
        Self::Many(ids)
    }
}

impl From<&[TaskId]> for Parents {
    fn from(ids: &[TaskId]) -> Self {
        Self::Many(ids.to_vec())
    }
}

impl From<Vec<Option<TaskId>>> for Parents {
    fn from(ids: Vec<Option<TaskId>>) -> Self {
        Self::Many(ids.into_iter().flatten().collect())
    }
}

impl FromIterator<TaskId> for Parents {
    fn from_iter<I: IntoIterator<Item = TaskId>>(iter: I) -> Self {
        Self::Many(iter.into_iter().collect())
    }
}

/// One tool invocation; generates exactly one task
#[derive(Debug, Clone)]
pub struct Tool {
    def: Arc<dyn ToolDef>,
    tags: TagSet,
    parents: Vec<TaskId>,
    out: String,
    resources: Resources,
    drm: Option<String>,
}

impl Tool {
    /// Create a tool instance
    ///
    /// `out` is the output directory template, formatted with the tags.
    pub fn new(
        def: Arc<dyn ToolDef>,
        tags: TagSet,
        parents: impl Into<Parents>,
        out: impl Into<String>,
    ) -> Self {
        let mut parents = parents.into().into_vec();
        let mut seen = HashSet::new();
        parents.retain(|p| seen.insert(*p));

        let resources = def.schema().resources().clone();
        let drm = def.schema().drm().map(String::from);

        Self {
            def,
            tags,
            parents,
            out: out.into(),
            resources,
            drm,
        }
    }

    /// Create a tool from untyped tags, validating them first
    pub fn from_raw_tags(
        def: Arc<dyn ToolDef>,
        tags: &serde_json::Map<String, serde_json::Value>,
        policy: TagPolicy,
        parents: impl Into<Parents>,
        out: impl Into<String>,
    ) -> StagecraftResult<Self> {
        let tags = TagSet::from_json(tags, policy)?;
        Ok(Self::new(def, tags, parents, out))
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_drm(mut self, drm: impl Into<String>) -> Self {
        self.drm = Some(drm.into());
        self
    }

    pub fn name(&self) -> &str {
        self.def.schema().name()
    }

    pub fn def(&self) -> &Arc<dyn ToolDef> {
        &self.def
    }

    pub fn schema(&self) -> &ToolSchema {
        self.def.schema()
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn parents(&self) -> &[TaskId] {
        &self.parents
    }

    pub fn out(&self) -> &str {
        &self.out
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn abstract_inputs(&self) -> impl Iterator<Item = &FileSpec> {
        self.schema().inputs().iter().map(|(_, spec)| spec)
    }

    pub fn abstract_outputs(&self) -> impl Iterator<Item = &FileSpec> {
        self.schema().outputs().iter().map(|(_, spec)| spec)
    }

    /// Resolve every input slot against `candidates`
    ///
    /// A tag named after a slot overrides matching with a literal path.
    fn bind_inputs(
        &self,
        candidates: &[TaskFile],
        parents: &[String],
    ) -> StagecraftResult<Vec<(String, Binding)>> {
        let ctx = MatchContext {
            tool: self.name(),
            tags: &self.tags,
            parents,
        };

        self.schema()
            .inputs()
            .iter()
            .map(|(slot, spec)| {
                let binding = match self.tags.get(slot) {
                    Some(value) => Binding::One(TaskFile::external(value.to_string(), 0)),
                    None => spec.bind(slot, candidates, ctx)?,
                };
                Ok((slot.clone(), binding))
            })
            .collect()
    }

    /// Turn this tool into a concrete task of `stage`
    ///
    /// Input slots are matched against the parents' outputs (plus forwarded
    /// inputs); output files are placed under the formatted output directory.
    pub fn generate_task(
        &self,
        stage: &str,
        parents: &[(TaskId, &Task)],
        default_drm: &str,
    ) -> StagecraftResult<Task> {
        let output_dir = self.tags.render(&self.out)?;

        let candidates: Vec<TaskFile> = parents
            .iter()
            .flat_map(|(_, p)| p.match_candidates())
            .cloned()
            .collect();
        let parent_labels: Vec<String> = parents.iter().map(|(_, p)| p.label()).collect();

        let bindings = self.bind_inputs(&candidates, &parent_labels)?;

        // A file may satisfy exactly one declared slot.
        let mut slots_by_file: BTreeMap<&std::path::Path, Vec<&str>> = BTreeMap::new();
        for (slot, binding) in &bindings {
            for file in binding.files() {
                let slots = slots_by_file.entry(file.path.as_path()).or_default();
                if !slots.contains(&slot.as_str()) {
                    slots.push(slot.as_str());
                }
            }
        }
        if let Some((file, slots)) = slots_by_file.iter().find(|(_, slots)| slots.len() > 1) {
            return Err(StagecraftError::AmbiguousInputMapping {
                tool: self.name().to_string(),
                tags: self.tags.clone(),
                file: file.display().to_string(),
                slots: slots.iter().map(|s| s.to_string()).collect(),
            });
        }

        let mut input_files: Vec<TaskFile> = Vec::new();
        for (_, binding) in &bindings {
            for file in binding.files() {
                if !input_files.iter().any(|f| f.path == file.path) {
                    input_files.push(file.clone());
                }
            }
        }

        let mut output_files = Vec::new();
        for (order, (_, spec)) in self.schema().outputs().iter().enumerate() {
            let name = self.tags.render(spec.name())?;
            let path = if output_dir.is_empty() {
                std::path::PathBuf::from(&name)
            } else {
                std::path::Path::new(&output_dir).join(&name)
            };
            output_files.push(TaskFile::new(name, path, order));
        }
        let offset = output_files.len();
        for (i, mut source) in self.def.sources().into_iter().enumerate() {
            source.order = offset + i;
            output_files.push(source);
        }

        Ok(Task {
            stage: stage.to_string(),
            tags: self.tags.clone(),
            parents: parents.iter().map(|(id, _)| *id).collect(),
            input_files,
            output_files,
            resources: self.resources.clone(),
            drm: self
                .drm
                .clone()
                .unwrap_or_else(|| default_drm.to_string()),
            status: TaskStatus::NoAttempt,
            output_dir,
            forward_inputs: self.schema().forward_inputs(),
            tool: Some(Arc::new(self.clone())),
        })
    }

    /// Bind inputs, outputs and parameters, then build the command once
    ///
    /// Matching errors describe the parents by input file count; use
    /// [`Tool::build_command_with_parents`] when the parent tasks are known.
    pub fn build_command(
        &self,
        possible_input_files: &[TaskFile],
        output_files: &[TaskFile],
        task: &Task,
    ) -> StagecraftResult<CommandOutput> {
        let parent_labels = vec![format!("{} input file(s)", possible_input_files.len())];
        self.build_command_with_parents(possible_input_files, output_files, task, &parent_labels)
    }

    /// [`Tool::build_command`], naming `parents` in matching errors
    pub fn build_command_with_parents(
        &self,
        possible_input_files: &[TaskFile],
        output_files: &[TaskFile],
        task: &Task,
        parents: &[String],
    ) -> StagecraftResult<CommandOutput> {
        let schema = self.schema();

        let mut params = BTreeMap::new();
        for param in schema.params() {
            match (task.tags.get(&param.name), &param.default) {
                (Some(value), _) => {
                    params.insert(param.name.clone(), value.clone());
                }
                (None, Some(default)) => {
                    params.insert(param.name.clone(), default.clone());
                }
                (None, None) => {
                    return Err(StagecraftError::MissingParameter {
                        tool: self.name().to_string(),
                        tags: task.tags.clone(),
                        param: param.name.clone(),
                    })
                }
            }
        }

        let inputs = self.bind_inputs(possible_input_files, parents)?;

        let mut outputs: Vec<&TaskFile> = output_files.iter().collect();
        outputs.sort_by_key(|f| f.order);
        let outputs = schema
            .outputs()
            .iter()
            .map(|(slot, _)| slot.clone())
            .zip(outputs.into_iter().cloned())
            .collect();

        let args = CommandArgs {
            inputs: inputs.into_iter().collect(),
            outputs,
            params,
        };

        self.def.cmd(&args).map_err(|e| match e {
            StagecraftError::NotImplementedContract { tool, .. } => {
                StagecraftError::NotImplementedContract {
                    tool,
                    tags: task.tags.clone(),
                }
            }
            StagecraftError::MissingParameter { tool, param, .. } => {
                StagecraftError::MissingParameter {
                    tool,
                    tags: task.tags.clone(),
                    param,
                }
            }
            other => other,
        })
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Tool {} {}>", self.name(), self.tags)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// `align`: one fastq in, one bam out, a required reference parameter
    #[derive(Debug)]
    pub(crate) struct Align {
        schema: ToolSchema,
    }

    impl Align {
        pub(crate) fn new() -> Arc<dyn ToolDef> {
            let schema = ToolSchema::builder("align")
                .input("in_reads", FileSpec::input("reads", r"\.fq$").unwrap())
                .output("out_bam", FileSpec::output("{sample}.bam"))
                .param("reference")
                .param_default("threads", 4)
                .cpu_req(4)
                .build()
                .unwrap();
            Arc::new(Self { schema })
        }
    }

    impl ToolDef for Align {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }

        fn cmd(&self, args: &CommandArgs) -> StagecraftResult<CommandOutput> {
            let reads = args.input("in_reads").and_then(Binding::as_one).unwrap();
            let bam = args.output("out_bam").unwrap();
            Ok(Command::new()
                .text("bwa mem -t ")
                .value(args.param("threads").unwrap())
                .text(" ")
                .value(args.param("reference").unwrap())
                .text(" ")
                .file(reads)
                .text(" > ")
                .file(bam)
                .into())
        }
    }

    #[derive(Debug)]
    struct Unfinished {
        schema: ToolSchema,
    }

    impl ToolDef for Unfinished {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }
    }

    fn reads_task(sample: &str) -> Task {
        Input::new(vec![format!("data/{}.fq", sample)])
            .tool(TagSet::new().with("sample", sample))
            .generate_task("inputs", &[], "local")
            .unwrap()
    }

    #[test]
    fn test_schema_rejects_duplicate_names() {
        let err = ToolSchema::builder("dup")
            .input("x", FileSpec::input("x", "x").unwrap())
            .param("x")
            .build()
            .unwrap_err();
        assert!(matches!(err, StagecraftError::InvalidToolSchema { .. }));
    }

    #[test]
    fn test_slots_follow_declaration_order() {
        let tool = Tool::new(Align::new(), TagSet::new(), Parents::None, "");
        let inputs: Vec<_> = tool.abstract_inputs().map(|s| s.name().to_string()).collect();
        let outputs: Vec<_> = tool.abstract_outputs().map(|s| s.name().to_string()).collect();
        assert_eq!(inputs, vec!["reads"]);
        assert_eq!(outputs, vec!["{sample}.bam"]);
    }

    #[test]
    fn test_parents_normalization() {
        assert_eq!(Parents::from(TaskId(3)).into_vec(), vec![TaskId(3)]);
        assert_eq!(
            Parents::from(vec![Some(TaskId(1)), None, Some(TaskId(2))]).into_vec(),
            vec![TaskId(1), TaskId(2)]
        );
        assert!(Parents::from(None::<TaskId>).into_vec().is_empty());

        let tool = Tool::new(Align::new(), TagSet::new(), vec![TaskId(1), TaskId(1)], "");
        assert_eq!(tool.parents(), &[TaskId(1)]);
    }

    #[test]
    fn test_from_raw_tags_rejects_before_tool_exists() {
        let raw = serde_json::json!({"sample": {"nested": true}});
        let result = Tool::from_raw_tags(
            Align::new(),
            raw.as_object().unwrap(),
            TagPolicy::default(),
            Parents::None,
            "",
        );
        assert!(matches!(result, Err(StagecraftError::InvalidTagType { .. })));
    }

    #[test]
    fn test_generate_task_binds_single_input() {
        let parent = reads_task("A");
        let tool = Tool::new(
            Align::new(),
            TagSet::new().with("sample", "A"),
            TaskId(0),
            "align/{sample}",
        );

        let task = tool
            .generate_task("align", &[(TaskId(0), &parent)], "local")
            .unwrap();

        assert_eq!(task.output_dir, "align/A");
        assert_eq!(task.parents, vec![TaskId(0)]);
        assert_eq!(task.input_files.len(), 1);
        assert_eq!(task.input_files[0].name, "A.fq");
        assert_eq!(task.output_files[0].path, std::path::PathBuf::from("align/A/A.bam"));
        assert_eq!(task.resources.cpu_req, Some(4));
        assert_eq!(task.drm, "local");
    }

    #[test]
    fn test_drm_override_wins() {
        let parent = reads_task("A");
        let tool = Tool::new(
            Align::new(),
            TagSet::new().with("sample", "A"),
            TaskId(0),
            "",
        )
        .with_drm("slurm");

        let task = tool
            .generate_task("align", &[(TaskId(0), &parent)], "local")
            .unwrap();
        assert_eq!(task.drm, "slurm");
    }

    #[test]
    fn test_ambiguous_input_mapping() {
        #[derive(Debug)]
        struct Pair {
            schema: ToolSchema,
        }
        impl ToolDef for Pair {
            fn schema(&self) -> &ToolSchema {
                &self.schema
            }
        }
        let def: Arc<dyn ToolDef> = Arc::new(Pair {
            schema: ToolSchema::builder("pair")
                .input("in_a", FileSpec::input("a", r"\.fq$").unwrap())
                .input("in_b", FileSpec::input("b", r"^A").unwrap())
                .build()
                .unwrap(),
        });

        let parent = reads_task("A");
        let tool = Tool::new(def, TagSet::new().with("sample", "A"), TaskId(0), "");
        let err = tool
            .generate_task("pair", &[(TaskId(0), &parent)], "local")
            .unwrap_err();

        match err {
            StagecraftError::AmbiguousInputMapping { file, slots, .. } => {
                assert_eq!(file, "data/A.fq");
                assert_eq!(slots, vec!["in_a", "in_b"]);
            }
            other => panic!("expected AmbiguousInputMapping, got {:?}", other),
        }
    }

    #[test]
    fn test_build_command() {
        let parent = reads_task("A");
        let tool = Tool::new(
            Align::new(),
            TagSet::new().with("sample", "A").with("reference", "hg38.fa"),
            TaskId(0),
            "align/{sample}",
        );
        let task = tool
            .generate_task("align", &[(TaskId(0), &parent)], "local")
            .unwrap();

        let cmd = tool
            .build_command(&task.input_files, &task.output_files, &task)
            .unwrap();

        match cmd {
            CommandOutput::Script(cmd) => assert_eq!(
                cmd.render(),
                "bwa mem -t 4 hg38.fa data/A.fq > align/A/A.bam"
            ),
            CommandOutput::Noop => panic!("expected a script"),
        }
    }

    #[test]
    fn test_tag_overrides_input_slot() {
        let tool = Tool::new(
            Align::new(),
            TagSet::new()
                .with("sample", "B")
                .with("reference", "hg38.fa")
                .with("in_reads", "/data/manual.fq"),
            Parents::None,
            "",
        );
        let task = tool.generate_task("align", &[], "local").unwrap();
        assert_eq!(task.input_files[0].path, std::path::PathBuf::from("/data/manual.fq"));

        let cmd = tool
            .build_command(&task.input_files, &task.output_files, &task)
            .unwrap();
        assert!(matches!(cmd, CommandOutput::Script(c) if c.render().contains("/data/manual.fq")));
    }

    #[derive(Debug)]
    struct Forgetful {
        schema: ToolSchema,
    }

    impl ToolDef for Forgetful {
        fn schema(&self) -> &ToolSchema {
            &self.schema
        }

        fn cmd(&self, _args: &CommandArgs) -> StagecraftResult<CommandOutput> {
            Err(StagecraftError::MissingParameter {
                tool: "forgetful".into(),
                tags: TagSet::new(),
                param: "depth".into(),
            })
        }
    }

    #[test]
    fn test_missing_parameter_from_cmd_carries_task_tags() {
        let tool = Tool::new(
            Arc::new(Forgetful {
                schema: ToolSchema::builder("forgetful").build().unwrap(),
            }),
            TagSet::new().with("sample", "C"),
            Parents::None,
            "",
        );
        let task = tool.generate_task("call", &[], "local").unwrap();

        let err = tool.build_command(&[], &task.output_files, &task).unwrap_err();
        match err {
            StagecraftError::MissingParameter { param, tags, .. } => {
                assert_eq!(param, "depth");
                assert_eq!(tags.get("sample"), Some(&TagValue::from("C")));
            }
            other => panic!("expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_parameter() {
        let parent = reads_task("A");
        let tool = Tool::new(Align::new(), TagSet::new().with("sample", "A"), TaskId(0), "");
        let task = tool
            .generate_task("align", &[(TaskId(0), &parent)], "local")
            .unwrap();

        let err = tool
            .build_command(&task.input_files, &task.output_files, &task)
            .unwrap_err();
        match err {
            StagecraftError::MissingParameter { tool, param, tags } => {
                assert_eq!(tool, "align");
                assert_eq!(param, "reference");
                assert_eq!(tags.get("sample"), Some(&TagValue::from("A")));
            }
            other => panic!("expected MissingParameter, got {:?}", other),
        }
    }

    #[test]
    fn test_unimplemented_cmd() {
        let def: Arc<dyn ToolDef> = Arc::new(Unfinished {
            schema: ToolSchema::builder("unfinished").build().unwrap(),
        });
        let tool = Tool::new(def, TagSet::new().with("k", 1), Parents::None, "");
        let task = tool.generate_task("s", &[], "local").unwrap();

        let err = tool.build_command(&[], &task.output_files, &task).unwrap_err();
        assert!(matches!(
            err,
            StagecraftError::NotImplementedContract { ref tags, .. } if tags.get("k").is_some()
        ));
    }
}
