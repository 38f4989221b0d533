//! Command-line front-end.
//!
//! Each subcommand maps onto one dispatcher operation; output is rendered as
//! plain text for a terminal.

mod format;
mod interactive;

pub use format::format_response;
pub use interactive::run_interactive;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::dispatch::{Dispatcher, Operation};
use crate::intent::IntentResolver;

/// Galaxy agent: tools, histories, IWC workflows and methods sections.
#[derive(Parser, Debug)]
#[command(name = "galaxy-agent", version, about)]
pub struct Cli {
    /// Galaxy server URL (overrides GALAXY_URL)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Galaxy API key (overrides GALAXY_API_KEY)
    #[arg(long = "api-key", global = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Verify the Galaxy URL and API key
    Connect,

    /// Search, inspect and run Galaxy tools
    #[command(subcommand)]
    Tools(ToolsCommands),

    /// Manage histories and inspect jobs
    #[command(subcommand)]
    History(HistoryCommands),

    /// Browse and import IWC workflows
    #[command(subcommand)]
    Workflow(WorkflowCommands),

    /// Upload files
    #[command(subcommand)]
    File(FileCommands),

    /// Generate methods sections
    #[command(subcommand)]
    Methods(MethodsCommands),

    /// Run a single natural-language request
    Ask {
        /// The request, e.g. "find tools for read trimming"
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Interactive session of natural-language requests
    Interact,

    /// Serve every operation as an MCP tool over stdio
    Serve,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ToolsCommands {
    /// Search tools by name or function
    Search { query: String },

    /// Show a tool's description
    Details {
        tool_id: String,
        /// Include input and output details
        #[arg(long)]
        io_details: bool,
    },

    /// Show a tool's citations
    Citations {
        tool_id: String,
        /// Tool version; the installed version when omitted
        #[arg(long)]
        version: Option<String>,
    },

    /// Run a tool in a history
    Run {
        tool_id: String,
        #[arg(long)]
        history_id: String,
        /// Tool inputs as a JSON object
        #[arg(long, default_value = "{}")]
        inputs: String,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum HistoryCommands {
    /// List histories
    List,
    /// Create a new history
    Create { name: String },
    /// Show a history and its datasets
    Details { history_id: String },
    /// Show a job's parameters, inputs and outputs
    Job { job_id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum WorkflowCommands {
    /// List IWC workflows
    List,
    /// Search IWC workflows by name, description or tag
    Search { query: String },
    /// Import an IWC workflow by TRS id
    Import { trs_id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum FileCommands {
    /// Upload a local file
    Upload {
        path: PathBuf,
        #[arg(long)]
        history_id: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum MethodsCommands {
    /// Generate a methods section from a history's tool invocations
    Generate {
        history_id: String,
        /// Write the document to this file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markdown)]
        format: OutputFormat,
        /// Give up after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// Rendering of a generated methods document.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Markdown,
    Json,
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

impl Commands {
    /// The dispatcher request for commands that are a single operation.
    pub fn to_request(&self) -> Option<Result<(Operation, Value), String>> {
        let request = match self {
            Commands::Connect => (Operation::Status, json!({})),
            Commands::Tools(ToolsCommands::Search { query }) => {
                (Operation::SearchTools, json!({ "query": query }))
            }
            Commands::Tools(ToolsCommands::Details {
                tool_id,
                io_details,
            }) => (
                Operation::GetToolDetails,
                json!({ "tool_id": tool_id, "io_details": io_details }),
            ),
            Commands::Tools(ToolsCommands::Citations { tool_id, version }) => (
                Operation::GetToolCitations,
                json!({ "tool_id": tool_id, "version": version }),
            ),
            Commands::Tools(ToolsCommands::Run {
                tool_id,
                history_id,
                inputs,
            }) => {
                let inputs: Value = match serde_json::from_str(inputs) {
                    Ok(inputs) => inputs,
                    Err(e) => return Some(Err(format!("--inputs is not valid JSON: {}", e))),
                };
                (
                    Operation::RunTool,
                    json!({ "tool_id": tool_id, "history_id": history_id, "inputs": inputs }),
                )
            }
            Commands::History(HistoryCommands::List) => (Operation::ListHistories, json!({})),
            Commands::History(HistoryCommands::Create { name }) => {
                (Operation::CreateHistory, json!({ "name": name }))
            }
            Commands::History(HistoryCommands::Details { history_id }) => (
                Operation::GetHistoryDetails,
                json!({ "history_id": history_id }),
            ),
            Commands::History(HistoryCommands::Job { job_id }) => {
                (Operation::GetJobDetails, json!({ "job_id": job_id }))
            }
            Commands::Workflow(WorkflowCommands::List) => (Operation::ListIwcWorkflows, json!({})),
            Commands::Workflow(WorkflowCommands::Search { query }) => {
                (Operation::SearchIwcWorkflows, json!({ "query": query }))
            }
            Commands::Workflow(WorkflowCommands::Import { trs_id }) => {
                (Operation::ImportWorkflow, json!({ "trs_id": trs_id }))
            }
            Commands::File(FileCommands::Upload { path, history_id }) => (
                Operation::UploadFile,
                json!({ "path": path, "history_id": history_id }),
            ),
            Commands::Methods(_) | Commands::Ask { .. } | Commands::Interact | Commands::Serve => {
                return None
            }
        };
        Some(Ok(request))
    }
}

/// Execute a CLI command against a connected dispatcher.
pub async fn execute_command(
    command: Commands,
    dispatcher: &Dispatcher,
    resolver: &dyn IntentResolver,
) -> CliResult {
    if let Some(request) = command.to_request() {
        let (operation, arguments) = match request {
            Ok(request) => request,
            Err(message) => return CliResult::error(message),
        };
        return match dispatcher
            .execute(operation, arguments, &CancelToken::never())
            .await
        {
            Ok(result) => CliResult::success(format_response(operation, &result)),
            Err(e) => CliResult::error(format!("Error: {}", e)),
        };
    }

    match command {
        Commands::Methods(MethodsCommands::Generate {
            history_id,
            output,
            format,
            timeout_secs,
        }) => execute_methods(dispatcher, &history_id, output, format, timeout_secs).await,
        Commands::Ask { text } => execute_ask(dispatcher, resolver, &text.join(" ")).await,
        other => CliResult::error(format!("{:?} cannot be executed as a one-shot command", other)),
    }
}

async fn execute_methods(
    dispatcher: &Dispatcher,
    history_id: &str,
    output: Option<PathBuf>,
    format: OutputFormat,
    timeout_secs: Option<u64>,
) -> CliResult {
    let (handle, mut cancel) = CancelToken::new();
    if let Some(secs) = timeout_secs {
        cancel = cancel.with_timeout(Duration::from_secs(secs));
    }

    // Ctrl-C cancels the run instead of killing the process mid-write.
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling methods generation");
            handle.cancel();
        }
    });

    let result = dispatcher.generate_methods_with(history_id, &cancel).await;
    interrupt.abort();

    let document = match result {
        Ok(document) => document,
        Err(e) => return CliResult::error(format!("Error: {}", e)),
    };

    let rendered = match format {
        OutputFormat::Markdown => document.to_markdown(),
        OutputFormat::Json => match document
            .to_json()
            .and_then(|json| serde_json::to_string_pretty(&json))
        {
            Ok(json) => json,
            Err(e) => return CliResult::error(format!("Error: {}", e)),
        },
    };

    match output {
        Some(path) => match tokio::fs::write(&path, &rendered).await {
            Ok(()) => CliResult::success(format!(
                "Methods section for history '{}' written to {}",
                document.history_name(),
                path.display()
            )),
            Err(e) => CliResult::error(format!("Failed to write {}: {}", path.display(), e)),
        },
        None => CliResult::success(rendered),
    }
}

/// Resolve and run one natural-language request.
pub async fn execute_ask(
    dispatcher: &Dispatcher,
    resolver: &dyn IntentResolver,
    text: &str,
) -> CliResult {
    let intent = match resolver.resolve(text).await {
        Ok(intent) => intent,
        Err(e) => return CliResult::error(e.to_string()),
    };

    match dispatcher
        .execute(intent.operation, intent.arguments, &CancelToken::never())
        .await
    {
        Ok(result) => CliResult::success(format_response(intent.operation, &result)),
        Err(e) => CliResult::error(format!("Error: {}", e)),
    }
}
