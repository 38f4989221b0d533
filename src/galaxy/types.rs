use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Job state Galaxy reports for a successfully completed job.
pub const JOB_STATE_OK: &str = "ok";

/// The authenticated Galaxy user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl UserRecord {
    /// Name to show the user: username, then email, then id.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.email.as_deref())
            .or(self.id.as_deref())
            .unwrap_or("unknown user")
    }
}

/// Tool entry returned by tool search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// History entry in the summary listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "count")]
    pub items_count: u64,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Detailed history record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub nice_size: Option<String>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
}

/// Reference from a job to one of its input or output datasets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetLink {
    pub id: String,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub uuid: Option<String>,
}

/// A job as reported by Galaxy.
///
/// The history job listing fills only the summary fields; `params`, `inputs`
/// and `outputs` are populated by the full job view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub tool_id: String,
    #[serde(default)]
    pub tool_version: Option<String>,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub history_id: Option<String>,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub update_time: Option<String>,
    /// Explicit execution order, when the server reports one.
    #[serde(default, alias = "order_index", alias = "seq")]
    pub sequence: Option<u64>,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub inputs: BTreeMap<String, DatasetLink>,
    #[serde(default)]
    pub outputs: BTreeMap<String, DatasetLink>,
}

impl JobRecord {
    /// Whether the job finished successfully.
    pub fn is_completed(&self) -> bool {
        self.state == JOB_STATE_OK
    }

    /// Creation time parsed from Galaxy's naive ISO timestamps (RFC 3339 also accepted).
    pub fn created_at(&self) -> Option<NaiveDateTime> {
        self.create_time.as_deref().and_then(parse_timestamp)
    }
}

/// Parse a Galaxy timestamp.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.naive_utc()))
}

/// Citation as served by the tool citations endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCitation {
    #[serde(default = "default_citation_format")]
    pub format: String,
    #[serde(default)]
    pub content: String,
}

fn default_citation_format() -> String {
    "bibtex".to_string()
}

/// One workflow in the IWC manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IwcWorkflow {
    #[serde(rename = "trsID")]
    pub trs_id: String,
    #[serde(default)]
    pub definition: Value,
}

impl IwcWorkflow {
    /// Workflow name from its definition.
    pub fn name(&self) -> &str {
        self.definition
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Workflow annotation (description) from its definition.
    pub fn annotation(&self) -> &str {
        self.definition
            .get("annotation")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Tags attached to the workflow definition.
    pub fn tags(&self) -> Vec<&str> {
        self.definition
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Case-insensitive match on name, annotation or any tag.
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.name().to_lowercase().contains(&query)
            || self.annotation().to_lowercase().contains(&query)
            || self
                .tags()
                .iter()
                .any(|tag| tag.to_lowercase().contains(&query))
    }
}

/// Top-level manifest entry grouping workflows by repository
#[derive(Debug, Clone, Deserialize)]
pub struct IwcManifestEntry {
    #[serde(default)]
    pub workflows: Vec<IwcWorkflow>,
}
