// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! File slots and the matcher that binds task files to them

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use super::{Cardinality, TagSet};
use crate::errors::{StagecraftError, StagecraftResult};

/// A concrete file produced or consumed by a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskFile {
    /// Identifying basename that slot patterns are matched against
    pub name: String,
    /// Path relative to the execution output directory (or absolute)
    pub path: PathBuf,
    /// Creation order within the producing task
    pub order: usize,
}

impl TaskFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, order: usize) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            order,
        }
    }

    /// A pre-existing file, named after its basename
    pub fn external(path: impl AsRef<Path>, order: usize) -> Self {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self::new(name, path, order)
    }
}

impl fmt::Display for TaskFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Files bound to one slot
///
/// A slot with cardinality `==1` binds a single file, everything else binds
/// the full ordered list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    One(TaskFile),
    Many(Vec<TaskFile>),
}

impl Binding {
    pub fn files(&self) -> Vec<&TaskFile> {
        match self {
            Self::One(f) => vec![f],
            Self::Many(v) => v.iter().collect(),
        }
    }

    pub fn as_one(&self) -> Option<&TaskFile> {
        match self {
            Self::One(f) => Some(f),
            Self::Many(_) => None,
        }
    }

    pub fn as_many(&self) -> Option<&[TaskFile]> {
        match self {
            Self::One(_) => None,
            Self::Many(v) => Some(v),
        }
    }
}

/// Who is asking for a match, for error context
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub tool: &'a str,
    pub tags: &'a TagSet,
    pub parents: &'a [String],
}

/// A named, cardinality-constrained file declaration
///
/// For input slots `pattern` selects candidate files by name. For output
/// slots `name` is the basename template formatted with the task's tags.
#[derive(Debug, Clone)]
pub struct FileSpec {
    name: String,
    pattern: Regex,
    cardinality: Cardinality,
}

impl FileSpec {
    /// An input slot matching `pattern`, exactly one file by default
    pub fn input(name: impl Into<String>, pattern: &str) -> StagecraftResult<Self> {
        let pattern = Regex::new(pattern).map_err(|e| StagecraftError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            name: name.into(),
            pattern,
            cardinality: Cardinality::default(),
        })
    }

    /// An output slot producing the file `basename` (a tag template)
    pub fn output(basename: impl Into<String>) -> Self {
        let name = basename.into();
        let pattern = Regex::new(&format!("^{}$", regex::escape(&name)))
            .expect("escaped literal is a valid regex");

        Self {
            name,
            pattern,
            cardinality: Cardinality::default(),
        }
    }

    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = cardinality;
        self
    }

    /// Parse and apply a cardinality expression such as `">=2"`
    pub fn n(self, expr: &str) -> StagecraftResult<Self> {
        Ok(self.with_cardinality(expr.parse()?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn matches(&self, file: &TaskFile) -> bool {
        self.pattern.is_match(&file.name)
    }

    /// Candidates selected by this spec, in stable order without repeats
    pub fn select<'f>(&self, candidates: impl IntoIterator<Item = &'f TaskFile>) -> Vec<TaskFile> {
        let mut selected: Vec<TaskFile> = Vec::new();
        for file in candidates {
            if self.matches(file) && !selected.iter().any(|s| s.path == file.path) {
                selected.push(file.clone());
            }
        }
        selected
    }

    /// Select candidates for `slot` and check them against the cardinality
    pub fn bind(
        &self,
        slot: &str,
        candidates: &[TaskFile],
        ctx: MatchContext<'_>,
    ) -> StagecraftResult<Binding> {
        let selected = self.select(candidates);

        if selected.is_empty() && self.cardinality.requires_any() {
            return Err(StagecraftError::MissingInput {
                tool: ctx.tool.to_string(),
                tags: ctx.tags.clone(),
                slot: slot.to_string(),
                pattern: self.pattern().to_string(),
                parents: ctx.parents.to_vec(),
            });
        }

        if !self.cardinality.admits(selected.len()) {
            return Err(StagecraftError::Cardinality {
                tool: ctx.tool.to_string(),
                tags: ctx.tags.clone(),
                slot: slot.to_string(),
                expected: self.cardinality,
                parents: ctx.parents.to_vec(),
                matched: selected.iter().map(|f| f.to_string()).collect(),
            });
        }

        Ok(unpack(self.cardinality, selected))
    }
}

/// Collapse a single-cardinality match into a bare value
pub fn unpack(cardinality: Cardinality, mut files: Vec<TaskFile>) -> Binding {
    if cardinality.is_single() && files.len() == 1 {
        Binding::One(files.remove(0))
    } else {
        Binding::Many(files)
    }
}

impl fmt::Display for FileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}/ {}", self.name, self.pattern, self.cardinality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(names: &[&str]) -> Vec<TaskFile> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| TaskFile::new(*n, format!("out/{}", n), i))
            .collect()
    }

    fn ctx<'a>(tags: &'a TagSet, parents: &'a [String]) -> MatchContext<'a> {
        MatchContext {
            tool: "merge",
            tags,
            parents,
        }
    }

    #[test]
    fn test_single_cardinality_unpacks() {
        let spec = FileSpec::input("bam", r"\.bam$").unwrap();
        let tags = TagSet::new();
        let binding = spec
            .bind("in_bam", &files(&["A.bam", "A.log"]), ctx(&tags, &[]))
            .unwrap();

        assert_eq!(binding.as_one().map(|f| f.name.as_str()), Some("A.bam"));
    }

    #[test]
    fn test_at_least_keeps_all_in_order() {
        let spec = FileSpec::input("bams", r"\.bam$").unwrap().n(">=2").unwrap();
        let tags = TagSet::new();
        let binding = spec
            .bind("in_bams", &files(&["A.bam", "B.bam", "x.txt", "C.bam"]), ctx(&tags, &[]))
            .unwrap();

        let names: Vec<_> = binding.as_many().unwrap().iter().map(|f| f.name.clone()).collect();
        assert_eq!(names, vec!["A.bam", "B.bam", "C.bam"]);
    }

    #[test]
    fn test_at_least_one_with_one_match_stays_a_list() {
        let spec = FileSpec::input("bams", r"\.bam$").unwrap().n(">=1").unwrap();
        let tags = TagSet::new();
        let binding = spec
            .bind("in_bams", &files(&["A.bam"]), ctx(&tags, &[]))
            .unwrap();

        assert_eq!(binding.as_many().map(|v| v.len()), Some(1));
    }

    #[test]
    fn test_cardinality_violation_names_matches() {
        let spec = FileSpec::input("bams", r"\.bam$").unwrap().n(">=2").unwrap();
        let tags = TagSet::new().with("sample", "A");
        let parents = vec!["<Task align {sample: A}>".to_string()];
        let err = spec
            .bind("in_bams", &files(&["A.bam"]), ctx(&tags, &parents))
            .unwrap_err();

        match err {
            StagecraftError::Cardinality {
                slot,
                matched,
                parents,
                expected,
                ..
            } => {
                assert_eq!(slot, "in_bams");
                assert_eq!(matched, vec!["out/A.bam"]);
                assert_eq!(parents.len(), 1);
                assert_eq!(expected, Cardinality::at_least(2));
            }
            other => panic!("expected Cardinality, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_input() {
        let spec = FileSpec::input("vcf", r"\.vcf$").unwrap();
        let tags = TagSet::new();
        let err = spec
            .bind("in_vcf", &files(&["A.bam"]), ctx(&tags, &[]))
            .unwrap_err();

        assert!(matches!(err, StagecraftError::MissingInput { .. }));
    }

    #[test]
    fn test_optional_slot_may_be_empty() {
        let spec = FileSpec::input("index", r"\.bai$").unwrap().n("<=1").unwrap();
        let tags = TagSet::new();
        let binding = spec
            .bind("in_index", &files(&["A.bam"]), ctx(&tags, &[]))
            .unwrap();

        assert_eq!(binding, Binding::Many(vec![]));
    }

    #[test]
    fn test_select_skips_duplicate_paths() {
        let spec = FileSpec::input("bam", r"\.bam$").unwrap().n(">=1").unwrap();
        let mut candidates = files(&["A.bam"]);
        candidates.push(candidates[0].clone());

        assert_eq!(spec.select(&candidates).len(), 1);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = FileSpec::input("bad", "(").unwrap_err();
        assert!(matches!(err, StagecraftError::InvalidPattern { .. }));
    }

    #[test]
    fn test_output_spec_matches_its_own_name() {
        let spec = FileSpec::output("A.bam");
        assert!(spec.matches(&TaskFile::new("A.bam", "out/A.bam", 0)));
        assert!(!spec.matches(&TaskFile::new("AxBam", "out/AxBam", 0)));
    }
}
