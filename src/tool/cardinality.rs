// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Cardinality constraints on file slots
//!
//! Grammar: `^(<=|<|>=|>|=|==)?(\d+)$`. A bare count means exact equality.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::StagecraftError;

static CARDINALITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(<=|<|>=|>|==|=)?(\d+)$").expect("cardinality grammar is a valid regex")
});

/// Comparison applied between the matched count and the declared count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Le,
    Lt,
    Ge,
    Gt,
    Eq,
}

impl Comparator {
    pub fn apply(self, actual: usize, expected: usize) -> bool {
        match self {
            Self::Le => actual <= expected,
            Self::Lt => actual < expected,
            Self::Ge => actual >= expected,
            Self::Gt => actual > expected,
            Self::Eq => actual == expected,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Le => "<=",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Gt => ">",
            Self::Eq => "==",
        }
    }
}

/// A parsed `(comparator, count)` constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cardinality {
    pub comparator: Comparator,
    pub count: usize,
}

impl Cardinality {
    pub const fn exactly(count: usize) -> Self {
        Self {
            comparator: Comparator::Eq,
            count,
        }
    }

    pub const fn at_least(count: usize) -> Self {
        Self {
            comparator: Comparator::Ge,
            count,
        }
    }

    pub const fn at_most(count: usize) -> Self {
        Self {
            comparator: Comparator::Le,
            count,
        }
    }

    /// Whether `actual` matched items satisfy this constraint
    pub fn admits(&self, actual: usize) -> bool {
        self.comparator.apply(actual, self.count)
    }

    /// Exactly one: matches bind as a bare value instead of a list
    pub fn is_single(&self) -> bool {
        self.comparator == Comparator::Eq && self.count == 1
    }

    /// Whether an empty match violates the constraint
    pub fn requires_any(&self) -> bool {
        !self.admits(0)
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::exactly(1)
    }
}

impl FromStr for Cardinality {
    type Err = StagecraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StagecraftError::InvalidCardinality { expr: s.to_string() };
        let caps = CARDINALITY.captures(s.trim()).ok_or_else(invalid)?;

        let comparator = match caps.get(1).map(|m| m.as_str()) {
            None | Some("=") | Some("==") => Comparator::Eq,
            Some("<=") => Comparator::Le,
            Some("<") => Comparator::Lt,
            Some(">=") => Comparator::Ge,
            Some(">") => Comparator::Gt,
            Some(_) => return Err(invalid()),
        };
        let count = caps[2].parse().map_err(|_| invalid())?;

        Ok(Self { comparator, count })
    }
}

impl TryFrom<String> for Cardinality {
    type Error = StagecraftError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Cardinality> for String {
    fn from(c: Cardinality) -> Self {
        c.to_string()
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.comparator.symbol(), self.count)
    }
}
