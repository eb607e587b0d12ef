// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Tools declared in recipe files
//!
//! The command is a template such as `cat {in_parts} > {out_merged}`. It is
//! parsed once into literal and placeholder parts; placeholders name an input
//! slot, an output slot or a parameter.

use super::{Command, CommandArgs, CommandOutput, TagSet, ToolDef, ToolSchema};
use crate::errors::{StagecraftError, StagecraftResult};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Literal(String),
    Placeholder(String),
}

/// What a tool declared in a recipe file does when asked for a command
#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Template(Vec<Part>),
    Noop,
    Missing,
}

/// A tool whose command comes from a template string
#[derive(Debug)]
pub struct TemplateTool {
    schema: ToolSchema,
    body: Body,
}

impl TemplateTool {
    /// A tool running `template`
    pub fn new(schema: ToolSchema, template: &str) -> StagecraftResult<Self> {
        let parts = parse(template).map_err(|reason| StagecraftError::InvalidToolSchema {
            tool: schema.name().to_string(),
            reason,
        })?;

        if let Some(unknown) = parts.iter().find_map(|p| match p {
            Part::Placeholder(name) if !schema.declares(name) => Some(name.clone()),
            _ => None,
        }) {
            return Err(StagecraftError::InvalidToolSchema {
                tool: schema.name().to_string(),
                reason: format!("command references '{}' which is not a slot or parameter", unknown),
            });
        }

        Ok(Self {
            schema,
            body: Body::Template(parts),
        })
    }

    /// A tool that only registers files
    pub fn noop(schema: ToolSchema) -> Self {
        Self {
            schema,
            body: Body::Noop,
        }
    }

    /// A tool with no command; generating its command fails
    pub fn without_command(schema: ToolSchema) -> Self {
        Self {
            schema,
            body: Body::Missing,
        }
    }

    /// Names referenced by the command template
    pub fn placeholders(&self) -> Vec<&str> {
        match &self.body {
            Body::Template(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    Part::Placeholder(name) => Some(name.as_str()),
                    Part::Literal(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl ToolDef for TemplateTool {
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    fn cmd(&self, args: &CommandArgs) -> StagecraftResult<CommandOutput> {
        let parts = match &self.body {
            Body::Template(parts) => parts,
            Body::Noop => return Ok(CommandOutput::Noop),
            Body::Missing => {
                return Err(StagecraftError::NotImplementedContract {
                    tool: self.schema.name().to_string(),
                    tags: TagSet::new(),
                })
            }
        };

        let mut cmd = Command::new();
        for part in parts {
            match part {
                Part::Literal(text) => cmd.push_text(text),
                Part::Placeholder(name) => {
                    if let Some(binding) = args.input(name) {
                        cmd.push_binding(binding);
                    } else if let Some(file) = args.output(name) {
                        cmd.push_file(file);
                    } else if let Some(value) = args.param(name) {
                        cmd.push_text(&value.to_string());
                    } else {
                        return Err(StagecraftError::MissingParameter {
                            tool: self.schema.name().to_string(),
                            tags: TagSet::new(),
                            param: name.clone(),
                        });
                    }
                }
            }
        }

        Ok(CommandOutput::Script(cmd))
    }
}

fn parse(template: &str) -> Result<Vec<Part>, String> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(k) => name.push(k),
                        None => return Err(format!("unclosed placeholder '{{{}'", name)),
                    }
                }
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err("empty placeholder '{}'".to_string());
                }
                if !literal.is_empty() {
                    parts.push(Part::Literal(std::mem::take(&mut literal)));
                }
                parts.push(Part::Placeholder(name));
            }
            '}' => return Err("unmatched '}' in command".to_string()),
            c => literal.push(c),
        }
    }

    if !literal.is_empty() {
        parts.push(Part::Literal(literal));
    }

    Ok(parts)
}
