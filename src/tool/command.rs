// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Structured command text
//!
//! Commands are built as a list of literal and file segments. File segments
//! stay typed until [`Command::render`] substitutes their resolved paths.

use std::collections::BTreeMap;

use super::{Binding, TagValue, TaskFile};

/// One piece of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    File(TaskFile),
}

/// Command text with typed file placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    segments: Vec<Segment>,
}

impl Command {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append literal text
    pub fn text(mut self, text: impl AsRef<str>) -> Self {
        self.push_text(text.as_ref());
        self
    }

    /// Append a file placeholder
    pub fn file(mut self, file: &TaskFile) -> Self {
        self.push_file(file);
        self
    }

    /// Append every file of a binding, space separated
    pub fn files(mut self, binding: &Binding) -> Self {
        self.push_binding(binding);
        self
    }

    /// Append a parameter value as literal text
    pub fn value(mut self, value: &TagValue) -> Self {
        self.push_text(&value.to_string());
        self
    }

    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.segments.last_mut() {
            Some(Segment::Literal(last)) => last.push_str(text),
            _ => self.segments.push(Segment::Literal(text.to_string())),
        }
    }

    pub fn push_file(&mut self, file: &TaskFile) {
        self.segments.push(Segment::File(file.clone()));
    }

    pub fn push_binding(&mut self, binding: &Binding) {
        for (i, file) in binding.files().into_iter().enumerate() {
            if i > 0 {
                self.push_text(" ");
            }
            self.push_file(file);
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Files referenced by this command, in order of appearance
    pub fn referenced_files(&self) -> impl Iterator<Item = &TaskFile> {
        self.segments.iter().filter_map(|s| match s {
            Segment::File(f) => Some(f),
            Segment::Literal(_) => None,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Substitute every file placeholder with its path
    pub fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::File(file) => out.push_str(&file.path.to_string_lossy()),
            }
        }
        out
    }
}

/// What a tool's command-building step returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutput {
    Script(Command),
    /// Nothing to run; the task only registers files
    Noop,
}

impl CommandOutput {
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop)
    }
}

impl From<Command> for CommandOutput {
    fn from(cmd: Command) -> Self {
        Self::Script(cmd)
    }
}

/// Everything a tool receives when building its command
#[derive(Debug, Clone, Default)]
pub struct CommandArgs {
    pub(crate) inputs: BTreeMap<String, Binding>,
    pub(crate) outputs: BTreeMap<String, TaskFile>,
    pub(crate) params: BTreeMap<String, TagValue>,
}

impl CommandArgs {
    pub fn input(&self, slot: &str) -> Option<&Binding> {
        self.inputs.get(slot)
    }

    pub fn output(&self, slot: &str) -> Option<&TaskFile> {
        self.outputs.get(slot)
    }

    pub fn param(&self, name: &str) -> Option<&TagValue> {
        self.params.get(name)
    }

    pub fn inputs(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.inputs.iter()
    }

    pub fn outputs(&self) -> impl Iterator<Item = (&String, &TaskFile)> {
        self.outputs.iter()
    }

    pub fn params(&self) -> impl Iterator<Item = (&String, &TagValue)> {
        self.params.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_substitutes_paths() {
        let bam = TaskFile::new("A.bam", "align/A.bam", 0);
        let cmd = Command::new()
            .text("samtools index ")
            .file(&bam)
            .text(" && echo done");

        assert_eq!(cmd.render(), "samtools index align/A.bam && echo done");
        assert_eq!(cmd.referenced_files().count(), 1);
    }

    #[test]
    fn test_adjacent_literals_merge() {
        let cmd = Command::new().text("a").text("b").text("");
        assert_eq!(cmd.segments(), &[Segment::Literal("ab".into())]);
    }

    #[test]
    fn test_binding_is_space_separated() {
        let binding = Binding::Many(vec![
            TaskFile::new("A.bam", "A.bam", 0),
            TaskFile::new("B.bam", "B.bam", 1),
        ]);
        let cmd = Command::new().text("cat ").files(&binding);
        assert_eq!(cmd.render(), "cat A.bam B.bam");
    }
}
