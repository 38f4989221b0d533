use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::provenance::ToolKey;

/// A formatted reference for one tool release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub tool_id: String,
    pub tool_version: String,
    /// Human-readable reference line.
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Citations of a tool release, or why they could not be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CitationSet {
    Available { citations: Vec<Citation> },
    Unavailable { reason: String },
}

impl CitationSet {
    /// Placeholder for a tool whose citations could not be fetched.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        CitationSet::Unavailable {
            reason: reason.into(),
        }
    }

    /// Whether at least one citation was retrieved.
    pub fn is_available(&self) -> bool {
        matches!(self, CitationSet::Available { .. })
    }
}

/// Citations keyed by tool release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CitationMap {
    entries: BTreeMap<ToolKey, CitationSet>,
}

impl CitationMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the citations for a tool release, replacing any earlier entry.
    pub fn insert(&mut self, tool: ToolKey, citations: CitationSet) {
        self.entries.insert(tool, citations);
    }

    /// Citations for a tool release, if it was resolved.
    pub fn get(&self, tool: &ToolKey) -> Option<&CitationSet> {
        self.entries.get(tool)
    }

    /// Number of tool releases in the map.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tool release was resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in tool release order.
    pub fn iter(&self) -> impl Iterator<Item = (&ToolKey, &CitationSet)> {
        self.entries.iter()
    }
}

impl FromIterator<(ToolKey, CitationSet)> for CitationMap {
    fn from_iter<I: IntoIterator<Item = (ToolKey, CitationSet)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
