use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Galaxy error: {0}")]
    Galaxy(#[from] GalaxyError),

    #[error("Intent error: {0}")]
    Intent(#[from] IntentError),

    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Errors raised by the Galaxy operation gateway (HTTP client and IWC catalog).
#[derive(Debug, Error)]
pub enum GalaxyError {
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("Galaxy unavailable: {message} (retries: {retries})")]
    Unavailable { message: String, retries: u32 },

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl GalaxyError {
    /// Whether a retry of the same idempotent request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GalaxyError::Timeout { .. } => true,
            GalaxyError::Api { status, .. } => *status >= 500,
            GalaxyError::Http(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

/// Errors surfaced by the request dispatcher and the methods pipeline.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Not connected to Galaxy. Use the connect operation first.")]
    NotConnected,

    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("History {history_id} has no completed jobs; cannot generate a methods section")]
    EmptyHistory { history_id: String },

    #[error("Cancelled during {stage}")]
    Cancelled { stage: String },

    #[error("{context}: {source}")]
    Upstream {
        context: String,
        #[source]
        source: GalaxyError,
    },

    #[error("Failed to connect to Galaxy at {url}: {message}")]
    ConnectFailed { url: String, message: String },

    #[error("Unknown operation: {operation}")]
    UnknownOperation { operation: String },

    #[error("Invalid arguments for {operation}: {message}")]
    InvalidArguments { operation: String, message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AgentError {
    /// Map a gateway failure into the core taxonomy.
    ///
    /// Unknown identifiers keep their meaning; everything else is opaque to the
    /// core and surfaces verbatim as an upstream failure.
    pub fn from_gateway(context: impl Into<String>, err: GalaxyError) -> Self {
        match err {
            GalaxyError::NotFound { resource, id } => AgentError::NotFound { resource, id },
            other => AgentError::Upstream {
                context: context.into(),
                source: other,
            },
        }
    }

    /// Shorthand for an argument validation failure.
    pub fn invalid(operation: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::InvalidArguments {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// A job whose parameters could not be fully resolved.
///
/// Never propagated as a failure: it is attached to the affected invocation and
/// rendered inline in the methods document.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("Incomplete data for job {job_id} ({tool_id}): {reason}")]
pub struct PartialDataError {
    pub job_id: String,
    pub tool_id: String,
    pub reason: String,
}

/// Errors from turning free text into a structured request.
#[derive(Debug, Error)]
pub enum IntentError {
    #[error("Ambiguous request '{text}': could mean {}", .candidates.join(" or "))]
    Ambiguous {
        text: String,
        candidates: Vec<String>,
    },

    #[error("Could not understand request '{text}'")]
    Unrecognized { text: String },

    #[error("Missing {argument} in request '{text}'")]
    MissingArgument { text: String, argument: String },
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Tool execution failed: {0}")]
    Execution(#[from] AgentError),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for gateway operations
pub type GalaxyResult<T> = Result<T, GalaxyError>;

/// Result type alias for dispatcher and pipeline operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
