//! The operation catalogue and the typed arguments of each operation.

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{AgentError, AgentResult};

/// Every operation the dispatcher accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Connect,
    Disconnect,
    Status,
    SearchTools,
    GetToolDetails,
    GetToolCitations,
    RunTool,
    ListHistories,
    CreateHistory,
    GetHistoryDetails,
    GetJobDetails,
    UploadFile,
    ListIwcWorkflows,
    SearchIwcWorkflows,
    ImportWorkflow,
    GenerateMethods,
}

impl Operation {
    pub const ALL: [Operation; 16] = [
        Operation::Connect,
        Operation::Disconnect,
        Operation::Status,
        Operation::SearchTools,
        Operation::GetToolDetails,
        Operation::GetToolCitations,
        Operation::RunTool,
        Operation::ListHistories,
        Operation::CreateHistory,
        Operation::GetHistoryDetails,
        Operation::GetJobDetails,
        Operation::UploadFile,
        Operation::ListIwcWorkflows,
        Operation::SearchIwcWorkflows,
        Operation::ImportWorkflow,
        Operation::GenerateMethods,
    ];

    /// Canonical camelCase name.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::Status => "status",
            Operation::SearchTools => "searchTools",
            Operation::GetToolDetails => "getToolDetails",
            Operation::GetToolCitations => "getToolCitations",
            Operation::RunTool => "runTool",
            Operation::ListHistories => "listHistories",
            Operation::CreateHistory => "createHistory",
            Operation::GetHistoryDetails => "getHistoryDetails",
            Operation::GetJobDetails => "getJobDetails",
            Operation::UploadFile => "uploadFile",
            Operation::ListIwcWorkflows => "listIwcWorkflows",
            Operation::SearchIwcWorkflows => "searchIwcWorkflows",
            Operation::ImportWorkflow => "importWorkflow",
            Operation::GenerateMethods => "generateMethods",
        }
    }

    /// snake_case alias, also used as the MCP tool name.
    pub fn snake_name(&self) -> &'static str {
        match self {
            Operation::Connect => "connect",
            Operation::Disconnect => "disconnect",
            Operation::Status => "status",
            Operation::SearchTools => "search_tools",
            Operation::GetToolDetails => "get_tool_details",
            Operation::GetToolCitations => "get_tool_citations",
            Operation::RunTool => "run_tool",
            Operation::ListHistories => "list_histories",
            Operation::CreateHistory => "create_history",
            Operation::GetHistoryDetails => "get_history_details",
            Operation::GetJobDetails => "get_job_details",
            Operation::UploadFile => "upload_file",
            Operation::ListIwcWorkflows => "list_iwc_workflows",
            Operation::SearchIwcWorkflows => "search_iwc_workflows",
            Operation::ImportWorkflow => "import_workflow",
            Operation::GenerateMethods => "generate_methods",
        }
    }

    /// Whether the operation needs a verified connection first.
    pub fn requires_connection(&self) -> bool {
        !matches!(self, Operation::Connect | Operation::Disconnect)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Operation::Connect => {
                "Connect to a Galaxy server and verify the API key. Falls back to the configured URL and key."
            }
            Operation::Disconnect => "Forget the current Galaxy connection.",
            Operation::Status => "Show the Galaxy server and user of the current connection.",
            Operation::SearchTools => "Search Galaxy tools by name or function.",
            Operation::GetToolDetails => "Get the full description of a Galaxy tool.",
            Operation::GetToolCitations => "Get the formatted citations of a Galaxy tool.",
            Operation::RunTool => "Run a Galaxy tool in a history with the given inputs.",
            Operation::ListHistories => "List the user's Galaxy histories.",
            Operation::CreateHistory => "Create a new, empty Galaxy history.",
            Operation::GetHistoryDetails => "Get a history and its datasets.",
            Operation::GetJobDetails => "Get a job with its parameters, inputs and outputs.",
            Operation::UploadFile => "Upload a local file to Galaxy, optionally into a history.",
            Operation::ListIwcWorkflows => "List the curated IWC workflows.",
            Operation::SearchIwcWorkflows => {
                "Search IWC workflows by name, description or tag."
            }
            Operation::ImportWorkflow => "Import an IWC workflow into Galaxy by its TRS id.",
            Operation::GenerateMethods => {
                "Generate a citation-backed methods section from the tool invocations of a history."
            }
        }
    }

    /// JSON schema of the operation's arguments.
    pub fn input_schema(&self) -> Value {
        fn schema(properties: Value, required: &[&str]) -> Value {
            json!({
                "type": "object",
                "properties": properties,
                "required": required
            })
        }
        let string = |description: &str| json!({"type": "string", "description": description});

        match self {
            Operation::Connect => schema(
                json!({
                    "url": string("Galaxy server URL"),
                    "api_key": string("Galaxy API key")
                }),
                &[],
            ),
            Operation::Disconnect
            | Operation::Status
            | Operation::ListHistories
            | Operation::ListIwcWorkflows => schema(json!({}), &[]),
            Operation::SearchTools | Operation::SearchIwcWorkflows => {
                schema(json!({"query": string("Search text")}), &["query"])
            }
            Operation::GetToolDetails => schema(
                json!({
                    "tool_id": string("Galaxy tool id"),
                    "io_details": {"type": "boolean", "description": "Include input and output details"}
                }),
                &["tool_id"],
            ),
            Operation::GetToolCitations => schema(
                json!({
                    "tool_id": string("Galaxy tool id"),
                    "version": string("Tool version; the installed version when omitted")
                }),
                &["tool_id"],
            ),
            Operation::RunTool => schema(
                json!({
                    "history_id": string("History to run the tool in"),
                    "tool_id": string("Galaxy tool id"),
                    "inputs": {"type": "object", "description": "Tool inputs keyed by parameter name"}
                }),
                &["history_id", "tool_id"],
            ),
            Operation::CreateHistory => {
                schema(json!({"name": string("Name of the new history")}), &["name"])
            }
            Operation::GetHistoryDetails | Operation::GenerateMethods => {
                schema(json!({"history_id": string("Galaxy history id")}), &["history_id"])
            }
            Operation::GetJobDetails => {
                schema(json!({"job_id": string("Galaxy job id")}), &["job_id"])
            }
            Operation::UploadFile => schema(
                json!({
                    "path": string("Local file to upload"),
                    "history_id": string("Target history; the current history when omitted")
                }),
                &["path"],
            ),
            Operation::ImportWorkflow => schema(
                json!({"trs_id": string("TRS id of the IWC workflow")}),
                &["trs_id"],
            ),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Operation {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s || op.snake_name() == s)
            .ok_or_else(|| AgentError::UnknownOperation {
                operation: s.to_string(),
            })
    }
}

/// Parse an operation's arguments; `null` counts as no arguments.
pub(crate) fn parse_arguments<T: serde::de::DeserializeOwned>(
    operation: Operation,
    arguments: Value,
) -> AgentResult<T> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(arguments)
        .map_err(|e| AgentError::invalid(operation.name(), e.to_string()))
}

/// Reject blank identifiers before they reach the gateway.
pub(crate) fn require(operation: Operation, field: &str, value: &str) -> AgentResult<()> {
    if value.trim().is_empty() {
        return Err(AgentError::invalid(
            operation.name(),
            format!("{} must not be empty", field),
        ));
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConnectParams {
    pub url: Option<String>,
    #[serde(alias = "apiKey")]
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryParams {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolDetailsParams {
    #[serde(alias = "toolId")]
    pub tool_id: String,
    #[serde(default, alias = "ioDetails")]
    pub io_details: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToolCitationsParams {
    #[serde(alias = "toolId")]
    pub tool_id: String,
    #[serde(alias = "toolVersion", alias = "tool_version")]
    pub version: Option<String>,
}

fn empty_inputs() -> Value {
    Value::Object(Map::new())
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunToolParams {
    #[serde(alias = "historyId")]
    pub history_id: String,
    #[serde(alias = "toolId")]
    pub tool_id: String,
    #[serde(default = "empty_inputs")]
    pub inputs: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateHistoryParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryParams {
    #[serde(alias = "historyId")]
    pub history_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JobParams {
    #[serde(alias = "jobId")]
    pub job_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadParams {
    #[serde(alias = "filePath", alias = "file_path")]
    pub path: PathBuf,
    #[serde(alias = "historyId")]
    pub history_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportWorkflowParams {
    #[serde(alias = "trsId", alias = "trsID")]
    pub trs_id: String,
}
