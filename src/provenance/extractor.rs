use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::params::resolve_parameters;
use super::types::{HistoryProvenance, OutputSlot, ToolInvocation, ToolKey};
use crate::cancel::CancelToken;
use crate::error::{AgentError, AgentResult, PartialDataError};
use crate::galaxy::{GalaxyGateway, JobRecord};

/// Version recorded when Galaxy does not report one.
pub const UNKNOWN_VERSION: &str = "unknown";

/// A completed job on its way to becoming a [`ToolInvocation`].
struct JobEntry {
    /// Position in the platform's job listing.
    listing_index: usize,
    job: JobRecord,
    sequence: Option<u64>,
    created_at: Option<NaiveDateTime>,
    fetch_failure: Option<String>,
}

/// Reconstructs the ordered tool invocations of a history.
#[derive(Clone)]
pub struct ProvenanceExtractor {
    gateway: Arc<dyn GalaxyGateway>,
}

impl ProvenanceExtractor {
    /// Create a new extractor over a gateway
    pub fn new(gateway: Arc<dyn GalaxyGateway>) -> Self {
        Self { gateway }
    }

    /// Extract the provenance of one history.
    ///
    /// Only completed (`ok`) jobs are included. A job whose details cannot be
    /// fetched or whose parameters are not fully known is still included,
    /// carrying a [`PartialDataError`].
    pub async fn extract(
        &self,
        history_id: &str,
        cancel: &CancelToken,
    ) -> AgentResult<HistoryProvenance> {
        let start = Instant::now();

        let history = cancel
            .run(self.gateway.get_history(history_id))
            .await
            .map_err(|_| cancelled("history lookup"))?
            .map_err(|e| AgentError::from_gateway(format!("fetching history {}", history_id), e))?;

        let jobs = cancel
            .run(self.gateway.list_jobs(history_id))
            .await
            .map_err(|_| cancelled("job listing"))?
            .map_err(|e| {
                AgentError::from_gateway(format!("listing jobs of history {}", history_id), e)
            })?;

        let total_jobs = jobs.len();
        let completed: Vec<(usize, JobRecord)> = jobs
            .into_iter()
            .enumerate()
            .filter(|(_, job)| job.is_completed())
            .collect();

        if completed.is_empty() {
            return Err(AgentError::EmptyHistory {
                history_id: history_id.to_string(),
            });
        }

        debug!(
            history_id = %history_id,
            total_jobs,
            completed_jobs = completed.len(),
            "Fetching job details"
        );

        let mut entries = Vec::with_capacity(completed.len());
        for (listing_index, summary) in completed {
            let detail = cancel
                .run(self.gateway.get_job(&summary.id))
                .await
                .map_err(|_| cancelled("job detail fetch"))?;
            entries.push(merge_job(listing_index, summary, detail));
        }

        order_entries(&mut entries);

        let producers = output_producers(&entries);
        let invocations: Vec<ToolInvocation> = entries
            .into_iter()
            .map(|entry| build_invocation(entry, &producers))
            .collect();

        let partial = invocations.iter().filter(|i| !i.is_complete()).count();
        info!(
            history_id = %history_id,
            invocations = invocations.len(),
            partial,
            latency_ms = start.elapsed().as_millis(),
            "History provenance extracted"
        );

        Ok(HistoryProvenance::new(history_id, history.name, invocations))
    }
}

fn cancelled(stage: &str) -> AgentError {
    AgentError::Cancelled {
        stage: stage.to_string(),
    }
}

/// Prefer the full job view, keeping listing fields it leaves out.
fn merge_job(
    listing_index: usize,
    summary: JobRecord,
    detail: crate::error::GalaxyResult<JobRecord>,
) -> JobEntry {
    let summary_created = summary.created_at();
    match detail {
        Ok(mut job) => {
            if job.tool_version.is_none() {
                job.tool_version = summary.tool_version.clone();
            }
            JobEntry {
                listing_index,
                sequence: job.sequence.or(summary.sequence),
                created_at: job.created_at().or(summary_created),
                job,
                fetch_failure: None,
            }
        }
        Err(e) => {
            warn!(job_id = %summary.id, error = %e, "Job details unavailable");
            JobEntry {
                listing_index,
                sequence: summary.sequence,
                created_at: summary_created,
                job: summary,
                fetch_failure: Some(format!("job details unavailable: {}", e)),
            }
        }
    }
}

/// Sort into execution order.
///
/// The explicit sequence is used only when every job has one; otherwise the
/// creation timestamp decides (jobs without one go last). Ties fall back to
/// the listing position, then the job id.
fn order_entries(entries: &mut [JobEntry]) {
    if entries.iter().all(|entry| entry.sequence.is_some()) {
        entries.sort_by(|a, b| {
            a.sequence
                .cmp(&b.sequence)
                .then(a.listing_index.cmp(&b.listing_index))
                .then_with(|| a.job.id.cmp(&b.job.id))
        });
    } else {
        entries.sort_by(|a, b| {
            (a.created_at.is_none(), a.created_at)
                .cmp(&(b.created_at.is_none(), b.created_at))
                .then(a.listing_index.cmp(&b.listing_index))
                .then_with(|| a.job.id.cmp(&b.job.id))
        });
    }
}

fn output_producers(entries: &[JobEntry]) -> HashMap<String, OutputSlot> {
    let mut producers = HashMap::new();
    for entry in entries {
        for (output_name, dataset) in &entry.job.outputs {
            producers.insert(
                dataset.id.clone(),
                OutputSlot {
                    job_id: entry.job.id.clone(),
                    output_name: output_name.clone(),
                },
            );
        }
    }
    producers
}

fn build_invocation(entry: JobEntry, producers: &HashMap<String, OutputSlot>) -> ToolInvocation {
    let job = entry.job;
    let resolved = resolve_parameters(&job.params, producers);

    let partial = match (entry.fetch_failure, resolved.unresolved.is_empty()) {
        (Some(reason), _) => Some(reason),
        (None, false) => Some(format!(
            "unresolved parameters: {}",
            resolved.unresolved.join(", ")
        )),
        (None, true) => None,
    }
    .map(|reason| PartialDataError {
        job_id: job.id.clone(),
        tool_id: job.tool_id.clone(),
        reason,
    });

    let outputs: BTreeMap<String, String> = job
        .outputs
        .into_iter()
        .map(|(name, dataset)| (name, dataset.id))
        .collect();

    ToolInvocation {
        tool: ToolKey::new(
            job.tool_id,
            job.tool_version
                .unwrap_or_else(|| UNKNOWN_VERSION.to_string()),
        ),
        job_id: job.id,
        parameters: resolved.values,
        outputs,
        position: 0,
        created_at: entry.created_at,
        partial,
    }
}
