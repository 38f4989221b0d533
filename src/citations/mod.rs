//! Citation resolution for the tools used in a history.
//!
//! Each distinct tool release is looked up exactly once. Lookups run
//! concurrently; results are placed by first-occurrence index so the output
//! never depends on completion order.

mod format;
mod types;

pub use format::{format_citation, parse_bibtex_fields};
pub use types::*;

use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::error::{AgentError, AgentResult, GalaxyResult};
use crate::galaxy::{GalaxyGateway, RawCitation};
use crate::provenance::{HistoryProvenance, ToolKey};

/// Looks up and formats citations for tool releases.
#[derive(Clone)]
pub struct CitationResolver {
    gateway: Arc<dyn GalaxyGateway>,
}

impl CitationResolver {
    /// Create a new resolver over a gateway
    pub fn new(gateway: Arc<dyn GalaxyGateway>) -> Self {
        Self { gateway }
    }

    /// Resolve citations for every distinct tool release in `provenance`.
    ///
    /// A failed lookup, or a tool with no registered citations, yields
    /// [`CitationSet::Unavailable`] for that tool only. Cancellation aborts
    /// lookups still in flight.
    pub async fn resolve(
        &self,
        provenance: &HistoryProvenance,
        cancel: &CancelToken,
    ) -> AgentResult<CitationMap> {
        self.resolve_tools(&provenance.distinct_tools(), cancel).await
    }

    /// Resolve citations for the given tool releases.
    pub async fn resolve_tools(
        &self,
        tools: &[ToolKey],
        cancel: &CancelToken,
    ) -> AgentResult<CitationMap> {
        let start = Instant::now();
        let mut tasks = JoinSet::new();

        for (index, tool) in tools.iter().cloned().enumerate() {
            let gateway = Arc::clone(&self.gateway);
            tasks.spawn(async move {
                let result = gateway
                    .get_tool_citations(&tool.tool_id, &tool.version)
                    .await;
                (index, result)
            });
        }

        let mut results: Vec<Option<GalaxyResult<Vec<RawCitation>>>> =
            tools.iter().map(|_| None).collect();

        let collected = cancel
            .run(async {
                while let Some(joined) = tasks.join_next().await {
                    match joined {
                        Ok((index, result)) => results[index] = Some(result),
                        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                        Err(e) => warn!(error = %e, "Citation lookup task ended early"),
                    }
                }
            })
            .await;

        if collected.is_err() {
            tasks.abort_all();
            return Err(AgentError::Cancelled {
                stage: "citation resolution".to_string(),
            });
        }

        let map: CitationMap = tools
            .iter()
            .zip(results)
            .map(|(tool, result)| {
                let set = citation_set(tool, result);
                (tool.clone(), set)
            })
            .collect();

        let unavailable = map.iter().filter(|(_, set)| !set.is_available()).count();
        info!(
            tools = tools.len(),
            unavailable,
            latency_ms = start.elapsed().as_millis(),
            "Citations resolved"
        );

        Ok(map)
    }
}

fn citation_set(tool: &ToolKey, result: Option<GalaxyResult<Vec<RawCitation>>>) -> CitationSet {
    match result {
        Some(Ok(raw)) if raw.is_empty() => {
            debug!(tool = %tool, "Tool has no registered citations");
            CitationSet::unavailable("no citations registered for this tool")
        }
        Some(Ok(raw)) => CitationSet::Available {
            citations: raw.iter().map(|r| format_citation(tool, r)).collect(),
        },
        Some(Err(e)) => {
            warn!(tool = %tool, error = %e, "Citation lookup failed");
            CitationSet::unavailable(e.to_string())
        }
        None => CitationSet::unavailable("citation lookup did not complete"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_citations_are_unavailable() {
        let set = citation_set(&ToolKey::new("cat1", "1.0"), Some(Ok(vec![])));
        assert!(!set.is_available());
    }

    #[test]
    fn test_failed_lookup_is_unavailable() {
        let set = citation_set(
            &ToolKey::new("cat1", "1.0"),
            Some(Err(crate::error::GalaxyError::Timeout { timeout_ms: 5 })),
        );
        match set {
            CitationSet::Unavailable { reason } => assert!(reason.contains("timeout")),
            other => panic!("expected unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_citation_set_serialization() {
        let json = serde_json::to_value(CitationSet::unavailable("gone")).unwrap();
        assert_eq!(json["status"], "unavailable");
        assert_eq!(json["reason"], "gone");
    }
}
