// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Work-item identity: context types, references, and registry keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of work item an agent can be bound to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    Task,
    Epic,
    Project,
}

impl ContextType {
    pub const ALL: [ContextType; 3] = [Self::Task, Self::Epic, Self::Project];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Epic => "epic",
            Self::Project => "project",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = UnknownContextType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "epic" => Ok(Self::Epic),
            "project" => Ok(Self::Project),
            other => Err(UnknownContextType(other.to_owned())),
        }
    }
}

/// A path segment that names no known context type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownContextType(pub String);

impl fmt::Display for UnknownContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown context type: {}", self.0)
    }
}

impl std::error::Error for UnknownContextType {}

/// A single unit of work (task, epic, or project) identified by type and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextRef {
    #[serde(rename = "contextType")]
    pub kind: ContextType,
    #[serde(rename = "contextId")]
    pub id: u64,
}

impl ContextRef {
    pub fn new(kind: ContextType, id: u64) -> Self {
        Self { kind, id }
    }

    pub fn task(id: u64) -> Self {
        Self::new(ContextType::Task, id)
    }

    pub fn epic(id: u64) -> Self {
        Self::new(ContextType::Epic, id)
    }

    pub fn project(id: u64) -> Self {
        Self::new(ContextType::Project, id)
    }

    /// Parse a `(type, id)` pair of path segments.
    ///
    /// The id must be a non-negative decimal integer with no sign or
    /// whitespace; anything else yields `None`.
    pub fn from_segments(kind: &str, id: &str) -> Option<Self> {
        let kind = kind.parse().ok()?;
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let id = id.parse().ok()?;
        Some(Self { kind, id })
    }

    pub fn key(&self) -> ContextKey {
        ContextKey::from(*self)
    }
}

impl fmt::Display for ContextRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.id)
    }
}

/// Registry lookup key, `"{type}-{id}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextKey(String);

impl ContextKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Recover the context from a key. Only used when enumerating buckets.
    pub fn to_context(&self) -> Option<ContextRef> {
        let (kind, id) = self.0.split_once('-')?;
        ContextRef::from_segments(kind, id)
    }
}

impl From<ContextRef> for ContextKey {
    fn from(ctx: ContextRef) -> Self {
        Self(ctx.to_string())
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
