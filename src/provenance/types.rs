use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::PartialDataError;

/// Identifies one tool release: tool id plus version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ToolKey {
    pub tool_id: String,
    pub version: String,
}

impl ToolKey {
    /// Create a new tool key
    pub fn new(tool_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            version: version.into(),
        }
    }

    /// Short, readable tool name.
    ///
    /// Toolshed ids look like `host/repos/owner/repo/tool/version`; the tool
    /// segment is used for those. Built-in ids are returned as-is.
    pub fn display_name(&self) -> &str {
        let segments: Vec<&str> = self.tool_id.split('/').collect();
        if segments.len() >= 3 && segments.contains(&"repos") {
            segments[segments.len() - 2]
        } else {
            &self.tool_id
        }
    }
}

impl fmt::Display for ToolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (version {})", self.tool_id, self.version)
    }
}

/// The job output a dataset came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSlot {
    pub job_id: String,
    pub output_name: String,
}

/// A parameter value pointing at a dataset instead of a literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRef {
    pub dataset_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Producing job and output slot, when that job belongs to the same history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer: Option<OutputSlot>,
}

/// A resolved tool parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<ParamValue>),
    Dataset(DatasetRef),
    /// A value only known at run time (e.g. a workflow runtime placeholder).
    Unresolved,
}

impl ParamValue {
    /// Whether this value, or anything nested in it, is unresolved.
    pub fn contains_unresolved(&self) -> bool {
        match self {
            ParamValue::Unresolved => true,
            ParamValue::List(items) => items.iter().any(ParamValue::contains_unresolved),
            _ => false,
        }
    }
}

/// One completed tool execution in a history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub job_id: String,
    pub tool: ToolKey,
    /// Parameter name to value, sorted by name.
    pub parameters: BTreeMap<String, ParamValue>,
    /// Output slot name to dataset id.
    pub outputs: BTreeMap<String, String>,
    /// 1-based execution position within the history.
    pub position: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<NaiveDateTime>,
    /// Present when the parameters could not be fully resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial: Option<PartialDataError>,
}

impl ToolInvocation {
    /// Whether all parameters were resolved.
    pub fn is_complete(&self) -> bool {
        self.partial.is_none()
    }
}

/// The ordered tool invocations of one history.
///
/// Immutable once extracted; re-run the extractor to refresh it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryProvenance {
    history_id: String,
    history_name: String,
    invocations: Vec<ToolInvocation>,
}

impl HistoryProvenance {
    /// Build provenance from invocations already in execution order.
    ///
    /// Positions are reassigned `1..=n` so they are strictly increasing.
    pub fn new(
        history_id: impl Into<String>,
        history_name: impl Into<String>,
        mut invocations: Vec<ToolInvocation>,
    ) -> Self {
        for (index, invocation) in invocations.iter_mut().enumerate() {
            invocation.position = index as u32 + 1;
        }
        Self {
            history_id: history_id.into(),
            history_name: history_name.into(),
            invocations,
        }
    }

    /// History id on the platform
    pub fn history_id(&self) -> &str {
        &self.history_id
    }

    /// History display name
    pub fn history_name(&self) -> &str {
        &self.history_name
    }

    /// Invocations in execution order
    pub fn invocations(&self) -> &[ToolInvocation] {
        &self.invocations
    }

    /// Distinct tool releases in order of first appearance.
    pub fn distinct_tools(&self) -> Vec<ToolKey> {
        let mut seen = HashSet::new();
        self.invocations
            .iter()
            .filter(|invocation| seen.insert(&invocation.tool))
            .map(|invocation| invocation.tool.clone())
            .collect()
    }

    /// Invocations of one tool release, in execution order.
    pub fn invocations_of<'a>(
        &'a self,
        tool: &'a ToolKey,
    ) -> impl Iterator<Item = &'a ToolInvocation> + 'a {
        self.invocations
            .iter()
            .filter(move |invocation| &invocation.tool == tool)
    }
}
