//! Galaxy operation gateway.
//!
//! [`GalaxyGateway`] is the only platform-facing seam the rest of the crate
//! depends on. [`GalaxyClient`] implements it over the Galaxy REST API; transport,
//! authentication header and retry policy all live there.

mod client;
mod iwc;
mod types;

pub use client::*;
pub use iwc::*;
pub use types::*;

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;

use crate::error::GalaxyResult;

/// Individual Galaxy platform operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GalaxyGateway: Send + Sync {
    /// Fetch the user owning the API key.
    async fn current_user(&self) -> GalaxyResult<UserRecord>;
    /// Search tools by name or function.
    async fn search_tools(&self, query: &str) -> GalaxyResult<Vec<ToolSummary>>;
    /// Fetch a tool's full description.
    async fn get_tool(&self, tool_id: &str, io_details: bool) -> GalaxyResult<Value>;
    /// Fetch the citations registered for one tool release.
    async fn get_tool_citations(
        &self,
        tool_id: &str,
        tool_version: &str,
    ) -> GalaxyResult<Vec<RawCitation>>;
    /// Execute a tool in a history.
    async fn run_tool(&self, history_id: &str, tool_id: &str, inputs: Value)
        -> GalaxyResult<Value>;
    /// List the user's histories.
    async fn list_histories(&self) -> GalaxyResult<Vec<HistorySummary>>;
    /// Create a new, empty history.
    async fn create_history(&self, name: &str) -> GalaxyResult<HistorySummary>;
    /// Fetch one history.
    async fn get_history(&self, history_id: &str) -> GalaxyResult<HistoryRecord>;
    /// Fetch the datasets and collections of a history.
    async fn get_history_contents(&self, history_id: &str) -> GalaxyResult<Vec<Value>>;
    /// List the jobs that ran in a history (summary view).
    async fn list_jobs(&self, history_id: &str) -> GalaxyResult<Vec<JobRecord>>;
    /// Fetch one job with its parameters, inputs and outputs.
    async fn get_job(&self, job_id: &str) -> GalaxyResult<JobRecord>;
    /// Upload a local file, optionally into a specific history.
    async fn upload_file(&self, path: &Path, history_id: Option<String>) -> GalaxyResult<Value>;
    /// Import a workflow definition into the user's workflows.
    async fn import_workflow(&self, definition: &Value) -> GalaxyResult<Value>;
}
