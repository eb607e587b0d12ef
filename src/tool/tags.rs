// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagecraft contributors

//! Tag sets
//!
//! A tag set is the identity of a task within its stage. Values are limited
//! to scalars so that tag sets can be hashed, compared and persisted.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::errors::{StagecraftError, StagecraftResult};

/// A scalar tag value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl TagValue {
    /// Name of the value's type, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }

    /// The value as a string slice, if it is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

// Floats compare and hash by bit pattern so tag sets can be map keys.
impl PartialEq for TagValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TagValue {}

impl Hash for TagValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Float(v) => v.to_bits().hash(state),
            Self::Str(v) => v.hash(state),
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for TagValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// How strictly untyped tag input is validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagPolicy {
    /// Reject non-scalar values instead of storing them as JSON text
    pub strict: bool,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self { strict: true }
    }
}

/// Ordered mapping from tag key to scalar value
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeMap<String, TagValue>);

impl TagSet {
    /// Create an empty tag set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TagValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&TagValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TagValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validate and convert untyped (JSON/YAML/TOML) tags
    ///
    /// Under a strict policy any non-scalar value is rejected before a tool
    /// or task exists. A lenient policy keeps the value as its JSON text.
    pub fn from_json(
        map: &serde_json::Map<String, serde_json::Value>,
        policy: TagPolicy,
    ) -> StagecraftResult<Self> {
        use serde_json::Value;

        let mut tags = Self::new();
        for (key, value) in map {
            let converted = match value {
                Value::String(s) => TagValue::Str(s.clone()),
                Value::Bool(b) => TagValue::Bool(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => TagValue::Int(i),
                    None => TagValue::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
                other => {
                    let found = match other {
                        Value::Null => "null",
                        Value::Array(_) => "list",
                        _ => "mapping",
                    };
                    if policy.strict {
                        return Err(StagecraftError::InvalidTagType {
                            key: key.clone(),
                            found: found.to_string(),
                            tags: Value::Object(map.clone()).to_string(),
                        });
                    }
                    tracing::warn!(tag = %key, "non-scalar tag value stored as text");
                    TagValue::Str(other.to_string())
                }
            };
            tags.0.insert(key.clone(), converted);
        }

        Ok(tags)
    }

    /// Tags restricted to `keys`; `None` if any key is missing
    pub fn project(&self, keys: &[String]) -> Option<TagSet> {
        let mut out = TagSet::new();
        for key in keys {
            out.0.insert(key.clone(), self.0.get(key)?.clone());
        }
        Some(out)
    }

    /// Copy of these tags with `other` layered on top
    pub fn merged(&self, other: &TagSet) -> TagSet {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    /// Format a `{key}` template against these tags
    ///
    /// `{{` and `}}` produce literal braces.
    pub fn render(&self, template: &str) -> StagecraftResult<String> {
        let mut out = String::with_capacity(template.len());
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    let mut key = String::new();
                    let mut closed = false;
                    for k in chars.by_ref() {
                        if k == '}' {
                            closed = true;
                            break;
                        }
                        key.push(k);
                    }
                    let value = if closed { self.get(key.trim()) } else { None };
                    match value {
                        Some(value) => out.push_str(&value.to_string()),
                        None => {
                            return Err(StagecraftError::OutputTemplate {
                                template: template.to_string(),
                                key,
                                tags: self.clone(),
                            })
                        }
                    }
                }
                c => out.push(c),
            }
        }

        Ok(out)
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

impl FromIterator<(String, TagValue)> for TagSet {
    fn from_iter<I: IntoIterator<Item = (String, TagValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_tag_identity_ignores_insertion_order() {
        let a = TagSet::new().with("sample", "A").with("lane", 1);
        let b = TagSet::new().with("lane", 1).with("sample", "A");
        assert_eq!(a, b);

        let mut set = std::collections::HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_int_and_float_are_distinct() {
        let a = TagSet::new().with("n", 1);
        let b = TagSet::new().with("n", 1.0);
        assert_ne!(a, b);
    }

    #[test]
    fn test_from_json_scalars() {
        let tags = TagSet::from_json(
            &object(json!({"sample": "A", "lane": 2, "ratio": 0.5, "paired": true})),
            TagPolicy::default(),
        )
        .unwrap();

        assert_eq!(tags.get("sample"), Some(&TagValue::Str("A".into())));
        assert_eq!(tags.get("lane"), Some(&TagValue::Int(2)));
        assert_eq!(tags.get("ratio"), Some(&TagValue::Float(0.5)));
        assert_eq!(tags.get("paired"), Some(&TagValue::Bool(true)));
    }

    #[test]
    fn test_from_json_rejects_non_scalar() {
        let result = TagSet::from_json(
            &object(json!({"sample": "A", "lanes": [1, 2]})),
            TagPolicy::default(),
        );

        match result {
            Err(StagecraftError::InvalidTagType { key, found, .. }) => {
                assert_eq!(key, "lanes");
                assert_eq!(found, "list");
            }
            other => panic!("expected InvalidTagType, got {:?}", other),
        }
    }

    #[test]
    fn test_from_json_lenient_keeps_text() {
        let tags = TagSet::from_json(
            &object(json!({"lanes": [1, 2]})),
            TagPolicy { strict: false },
        )
        .unwrap();

        assert_eq!(tags.get("lanes"), Some(&TagValue::Str("[1,2]".into())));
    }

    #[test]
    fn test_render_template() {
        let tags = TagSet::new().with("sample", "A").with("chunk", 3);
        assert_eq!(tags.render("{sample}/chunk_{chunk}").unwrap(), "A/chunk_3");
        assert_eq!(tags.render("{{literal}}").unwrap(), "{literal}");
        assert_eq!(tags.render("").unwrap(), "");
    }

    #[test]
    fn test_render_unknown_key() {
        let tags = TagSet::new().with("sample", "A");
        let err = tags.render("{lane}").unwrap_err();
        assert!(matches!(err, StagecraftError::OutputTemplate { key, .. } if key == "lane"));
    }

    #[test]
    fn test_project() {
        let tags = TagSet::new().with("sample", "A").with("lane", 1);
        let keys = vec!["sample".to_string()];
        assert_eq!(tags.project(&keys), Some(TagSet::new().with("sample", "A")));
        assert_eq!(tags.project(&["missing".to_string()]), None);
    }

    #[test]
    fn test_display() {
        let tags = TagSet::new().with("sample", "A").with("lane", 1);
        assert_eq!(tags.to_string(), "{lane: 1, sample: A}");
    }
}
