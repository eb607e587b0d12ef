// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Recipe file structures
//!
//! Defines the schema for recipe files (YAML, or TOML when the file ends in
//! `.toml`) and how they turn into a [`Recipe`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::recipe::Recipe;
use super::relationship::{ManyToMany, ManyToOne, OneToMany, OneToOne, Relationship};
use crate::errors::{StagecraftError, StagecraftResult};
use crate::execution::ResumePolicy;
use crate::tool::{
    FileSpec, Input, Parents, TagPolicy, TagSet, TagValue, TemplateTool, Tool, ToolDef,
    ToolSchema,
};

/// Recipe definition from a recipe file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeFile {
    /// Recipe file version (for future compatibility)
    #[serde(default = "default_version")]
    pub version: String,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Execution the recipe renders into
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Declarative tools, by name
    #[serde(default)]
    pub tools: BTreeMap<String, ToolDefinition>,

    /// Stages, parents before children
    pub stages: Vec<StageDefinition>,
}

fn default_version() -> String {
    "1".to_string()
}

impl RecipeFile {
    /// Load a recipe file, choosing the format from the extension
    pub fn from_file(path: &Path) -> StagecraftResult<Self> {
        if !path.exists() {
            return Err(StagecraftError::RecipeNotFound {
                path: path.to_path_buf(),
            });
        }

        let content =
            std::fs::read_to_string(path).map_err(|e| StagecraftError::FileReadError {
                path: path.to_path_buf(),
                error: e.to_string(),
            })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    pub fn from_yaml(yaml: &str) -> StagecraftResult<Self> {
        serde_yaml::from_str(yaml).map_err(Into::into)
    }

    pub fn from_toml(text: &str) -> StagecraftResult<Self> {
        toml::from_str(text).map_err(Into::into)
    }

    pub fn to_yaml(&self) -> StagecraftResult<String> {
        serde_yaml::to_string(self).map_err(Into::into)
    }

    pub fn get_stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn tag_policy(&self) -> TagPolicy {
        TagPolicy {
            strict: self.execution.strict_tags,
        }
    }

    /// Build every declared tool
    pub fn build_tools(&self) -> StagecraftResult<BTreeMap<String, Arc<dyn ToolDef>>> {
        self.tools
            .iter()
            .map(|(name, def)| Ok((name.clone(), def.build(name)?)))
            .collect()
    }

    /// Turn the file into a recipe
    ///
    /// Source file globs are resolved relative to `base_dir`.
    pub fn into_recipe(&self, base_dir: &Path) -> StagecraftResult<Recipe> {
        if self.stages.is_empty() {
            return Err(StagecraftError::InvalidRecipe {
                reason: format!("recipe '{}' has no stages", self.name),
                help: Some("Add at least one source stage with 'tasks'".into()),
            });
        }

        let tools = self.build_tools()?;
        let policy = self.tag_policy();
        let mut recipe = Recipe::new(self.name.clone());

        for stage in &self.stages {
            let handle = match &stage.tool {
                Some(tool_name) => {
                    if !stage.tasks.is_empty() {
                        return Err(StagecraftError::InvalidStage {
                            stage: stage.name.clone(),
                            reason: "a stage has either 'tool' or 'tasks', not both".into(),
                        });
                    }
                    let tool = lookup_tool(&tools, &stage.name, tool_name)?;
                    let parents = stage
                        .parents
                        .iter()
                        .map(|p| {
                            recipe.handle(p).ok_or_else(|| StagecraftError::UnknownStage {
                                stage: stage.name.clone(),
                                parent: p.clone(),
                            })
                        })
                        .collect::<StagecraftResult<Vec<_>>>()?;

                    recipe.add_boxed_stage(
                        stage.name.clone(),
                        tool,
                        &parents,
                        stage.rel.to_relationship(),
                        stage.out.clone(),
                    )?
                }
                None => {
                    if !stage.parents.is_empty() {
                        return Err(StagecraftError::InvalidStage {
                            stage: stage.name.clone(),
                            reason: "a source stage cannot have parents".into(),
                        });
                    }
                    let sources = stage
                        .tasks
                        .iter()
                        .map(|t| t.to_tool(&stage.name, &tools, policy, base_dir))
                        .collect::<StagecraftResult<Vec<_>>>()?;
                    recipe.add_source(stage.name.clone(), sources)?
                }
            };

            if let Some(drm) = &stage.drm {
                recipe.set_drm(handle, drm.clone());
            }
        }

        Ok(recipe)
    }
}

fn lookup_tool(
    tools: &BTreeMap<String, Arc<dyn ToolDef>>,
    stage: &str,
    name: &str,
) -> StagecraftResult<Arc<dyn ToolDef>> {
    tools
        .get(name)
        .cloned()
        .ok_or_else(|| StagecraftError::UnknownTool {
            stage: stage.to_string(),
            tool: name.to_string(),
        })
}

/// Execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_execution_name")]
    pub name: String,

    /// Directory job scripts `cd` into; task output paths are relative to it
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Submission backend for tools that do not name one
    #[serde(default = "default_drm")]
    pub default_drm: String,

    /// Reject non-scalar tag values instead of storing them as text
    #[serde(default = "default_true")]
    pub strict_tags: bool,

    #[serde(default)]
    pub resume: ResumePolicy,

    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            name: default_execution_name(),
            output_dir: default_output_dir(),
            default_drm: default_drm(),
            strict_tags: true,
            resume: ResumePolicy::default(),
            store_dir: default_store_dir(),
        }
    }
}

fn default_execution_name() -> String {
    "default".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_drm() -> String {
    "local".to_string()
}

fn default_true() -> bool {
    true
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".stagecraft/store")
}

/// A tool declared in the recipe file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(default)]
    pub inputs: Vec<InputDefinition>,

    #[serde(default)]
    pub outputs: Vec<OutputDefinition>,

    #[serde(default)]
    pub params: Vec<ParamDefinition>,

    /// Command template; `{name}` is replaced by a slot's files or a parameter
    #[serde(default)]
    pub command: Option<String>,

    /// Only register files, never run anything
    #[serde(default)]
    pub noop: bool,

    #[serde(default)]
    pub mem_req: Option<u64>,

    #[serde(default)]
    pub time_req: Option<u64>,

    #[serde(default)]
    pub cpu_req: Option<u32>,

    #[serde(default)]
    pub must_succeed: Option<bool>,

    #[serde(default)]
    pub drm: Option<String>,

    #[serde(default)]
    pub forward_inputs: bool,
}

impl ToolDefinition {
    /// Build the tool type called `name`
    pub fn build(&self, name: &str) -> StagecraftResult<Arc<dyn ToolDef>> {
        let mut builder = ToolSchema::builder(name);

        for input in &self.inputs {
            let spec = FileSpec::input(input.display_name(), &input.pattern)?.n(&input.n)?;
            builder = builder.input(input.slot.clone(), spec);
        }
        for output in &self.outputs {
            builder = builder.output(output.slot.clone(), FileSpec::output(output.name.clone()));
        }
        for param in &self.params {
            builder = match param {
                ParamDefinition::Name(name) => builder.param(name.clone()),
                ParamDefinition::WithDefault { name, default } => {
                    builder.param_default(name.clone(), default.clone())
                }
            };
        }

        if let Some(mem) = self.mem_req {
            builder = builder.mem_req(mem);
        }
        if let Some(time) = self.time_req {
            builder = builder.time_req(time);
        }
        if let Some(cpu) = self.cpu_req {
            builder = builder.cpu_req(cpu);
        }
        if let Some(must_succeed) = self.must_succeed {
            builder = builder.must_succeed(must_succeed);
        }
        if let Some(drm) = &self.drm {
            builder = builder.drm(drm.clone());
        }
        let schema = builder.forward_inputs(self.forward_inputs).build()?;

        let tool: Arc<dyn ToolDef> = match (&self.command, self.noop) {
            (Some(_), true) => {
                return Err(StagecraftError::InvalidToolSchema {
                    tool: name.to_string(),
                    reason: "a no-op tool cannot have a command".into(),
                })
            }
            (Some(command), false) => Arc::new(TemplateTool::new(schema, command)?),
            (None, true) => Arc::new(TemplateTool::noop(schema)),
            (None, false) => Arc::new(TemplateTool::without_command(schema)),
        };

        Ok(tool)
    }
}

/// An input slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputDefinition {
    pub slot: String,

    /// Display name; defaults to the slot
    #[serde(default)]
    pub name: Option<String>,

    /// Regular expression matched against parent file names
    pub pattern: String,

    /// Cardinality expression such as `==1` or `>=2`
    #[serde(default = "default_cardinality")]
    pub n: String,
}

impl InputDefinition {
    fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.slot.clone())
    }
}

fn default_cardinality() -> String {
    "==1".to_string()
}

/// An output slot; `name` is formatted with the task's tags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDefinition {
    pub slot: String,
    pub name: String,
}

/// A parameter, with or without a default
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamDefinition {
    Name(String),
    WithDefault { name: String, default: TagValue },
}

/// A stage of the recipe file
///
/// Stages with `tool` derive their tasks from `parents`; stages with `tasks`
/// are source stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDefinition {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tasks: Vec<SourceTaskDefinition>,

    #[serde(default)]
    pub tool: Option<String>,

    #[serde(default)]
    pub parents: Vec<String>,

    #[serde(default)]
    pub rel: RelDefinition,

    /// Output directory template
    #[serde(default)]
    pub out: String,

    /// Default submission backend for this stage
    #[serde(default)]
    pub drm: Option<String>,
}

impl StageDefinition {
    pub fn is_source(&self) -> bool {
        self.tool.is_none()
    }
}

/// One task of a source stage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTaskDefinition {
    /// Declared tool to run; without it the task registers `files`
    #[serde(default)]
    pub tool: Option<String>,

    #[serde(default)]
    pub tags: serde_json::Map<String, serde_json::Value>,

    /// Glob patterns of existing files
    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub out: String,
}

impl SourceTaskDefinition {
    fn to_tool(
        &self,
        stage: &str,
        tools: &BTreeMap<String, Arc<dyn ToolDef>>,
        policy: TagPolicy,
        base_dir: &Path,
    ) -> StagecraftResult<Tool> {
        match &self.tool {
            Some(name) => {
                if !self.files.is_empty() {
                    return Err(StagecraftError::InvalidStage {
                        stage: stage.to_string(),
                        reason: format!("task using tool '{}' cannot also list files", name),
                    });
                }
                let def = lookup_tool(tools, stage, name)?;
                Tool::from_raw_tags(def, &self.tags, policy, Parents::None, self.out.clone())
            }
            None => {
                if self.files.is_empty() {
                    return Err(StagecraftError::InvalidStage {
                        stage: stage.to_string(),
                        reason: "source task needs 'files' or a 'tool'".into(),
                    });
                }
                let tags = TagSet::from_json(&self.tags, policy)?;
                let files = resolve_globs(&self.files, base_dir)?;
                Ok(Input::new(files).tool(tags))
            }
        }
    }
}

/// How a derived stage relates to its parents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelDefinition {
    #[default]
    One2one,
    Many2one {
        keywords: Vec<String>,
    },
    One2many {
        split: BTreeMap<String, Vec<TagValue>>,
    },
    Many2many {
        keywords: Vec<String>,
        #[serde(default)]
        split: BTreeMap<String, Vec<TagValue>>,
    },
}

impl RelDefinition {
    pub fn to_relationship(&self) -> Box<dyn Relationship> {
        match self {
            Self::One2one => Box::new(OneToOne),
            Self::Many2one { keywords } => Box::new(ManyToOne::new(keywords.clone())),
            Self::One2many { split } => Box::new(OneToMany::new(split.clone())),
            Self::Many2many { keywords, split } => Box::new(ManyToMany {
                keywords: keywords.clone(),
                split: split.clone(),
            }),
        }
    }
}

/// Resolve glob patterns to file paths
pub fn resolve_globs(patterns: &[String], base_dir: &Path) -> StagecraftResult<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        let full_pattern = if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            base_dir.join(pattern).to_string_lossy().to_string()
        };

        let matches: Vec<_> = glob::glob(&full_pattern)?
            .filter_map(Result::ok)
            .collect();

        if matches.is_empty() {
            return Err(StagecraftError::NoInputFiles {
                pattern: pattern.to_string(),
            });
        }

        files.extend(matches);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RECIPE: &str = r#"
name: variant-calling
execution:
  name: run1
  output_dir: results
tools:
  align:
    inputs:
      - slot: in_reads
        pattern: '\.fq$'
    outputs:
      - slot: out_bam
        name: "{sample}.bam"
    params:
      - reference
      - name: threads
        default: 4
    command: "bwa mem -t {threads} {reference} {in_reads} > {out_bam}"
    cpu_req: 4
  merge:
    inputs:
      - slot: in_bams
        pattern: '\.bam$'
        n: ">=1"
    outputs:
      - slot: out_merged
        name: "merged.bam"
    command: "samtools merge {out_merged} {in_bams}"
stages:
  - name: inputs
    tasks:
      - tags: {sample: A, reference: hg38.fa}
        files: ["data/A.fq"]
      - tags: {sample: B, reference: hg38.fa}
        files: ["data/B.fq"]
  - name: align
    tool: align
    parents: [inputs]
    out: "align/{sample}"
  - name: merge
    tool: merge
    parents: [align]
    rel:
      type: many2one
      keywords: []
    drm: slurm
"#;

    fn data_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("data")).unwrap();
        std::fs::write(temp.path().join("data/A.fq"), "@A\n").unwrap();
        std::fs::write(temp.path().join("data/B.fq"), "@B\n").unwrap();
        temp
    }

    #[test]
    fn test_parse_recipe_file() {
        let file = RecipeFile::from_yaml(RECIPE).unwrap();
        assert_eq!(file.name, "variant-calling");
        assert_eq!(file.execution.name, "run1");
        assert_eq!(file.execution.default_drm, "local");
        assert!(file.execution.strict_tags);
        assert_eq!(file.stage_names(), vec!["inputs", "align", "merge"]);
        assert_eq!(file.get_stage("align").unwrap().rel, RelDefinition::One2one);
        assert!(matches!(
            file.get_stage("merge").unwrap().rel,
            RelDefinition::Many2one { .. }
        ));
    }

    #[test]
    fn test_parse_toml() {
        let text = r#"
name = "toml-recipe"

[execution]
name = "run"
resume = "keep_all"

[[stages]]
name = "inputs"

[[stages.tasks]]
files = ["data/*.fq"]
tags = { sample = "A" }
"#;
        let file = RecipeFile::from_toml(text).unwrap();
        assert_eq!(file.execution.resume, ResumePolicy::KeepAll);
        assert_eq!(file.stages[0].tasks[0].files, vec!["data/*.fq"]);
    }

    #[test]
    fn test_into_recipe() {
        let temp = data_dir();
        let file = RecipeFile::from_yaml(RECIPE).unwrap();
        let recipe = file.into_recipe(temp.path()).unwrap();

        assert_eq!(recipe.len(), 3);
        let merge = recipe.handle("merge").unwrap();
        assert_eq!(recipe.template(merge).unwrap().drm.as_deref(), Some("slurm"));
        assert_eq!(recipe.parent_names(merge), vec!["align"]);
    }

    #[test]
    fn test_unknown_tool() {
        let temp = data_dir();
        let mut file = RecipeFile::from_yaml(RECIPE).unwrap();
        file.stages[1].tool = Some("bowtie".into());

        let err = file.into_recipe(temp.path()).unwrap_err();
        assert!(matches!(err, StagecraftError::UnknownTool { .. }));
    }

    #[test]
    fn test_unknown_parent_stage() {
        let temp = data_dir();
        let mut file = RecipeFile::from_yaml(RECIPE).unwrap();
        file.stages[1].parents = vec!["merge".into()];

        let err = file.into_recipe(temp.path()).unwrap_err();
        assert!(matches!(err, StagecraftError::UnknownStage { .. }));
    }

    #[test]
    fn test_missing_files() {
        let temp = TempDir::new().unwrap();
        let file = RecipeFile::from_yaml(RECIPE).unwrap();

        let err = file.into_recipe(temp.path()).unwrap_err();
        assert!(matches!(err, StagecraftError::NoInputFiles { .. }));
    }

    #[test]
    fn test_nested_tag_rejected_when_strict() {
        let temp = data_dir();
        let mut file = RecipeFile::from_yaml(RECIPE).unwrap();
        file.stages[0].tasks[0]
            .tags
            .insert("extra".into(), serde_json::json!(["x"]));

        let err = file.into_recipe(temp.path()).unwrap_err();
        assert!(matches!(err, StagecraftError::InvalidTagType { .. }));

        file.execution.strict_tags = false;
        assert!(file.into_recipe(temp.path()).is_ok());
    }

    #[test]
    fn test_noop_with_command_rejected() {
        let def = ToolDefinition {
            command: Some("true".into()),
            noop: true,
            ..ToolDefinition::default()
        };
        assert!(matches!(
            def.build("both"),
            Err(StagecraftError::InvalidToolSchema { .. })
        ));
    }

    #[test]
    fn test_round_trip_yaml() {
        let file = RecipeFile::from_yaml(RECIPE).unwrap();
        let parsed = RecipeFile::from_yaml(&file.to_yaml().unwrap()).unwrap();
        assert_eq!(parsed.name, file.name);
        assert_eq!(parsed.stages.len(), file.stages.len());
        assert_eq!(parsed.execution, file.execution);
    }
}
