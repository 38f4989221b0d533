use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::types::{IwcManifestEntry, IwcWorkflow};
use crate::config::{IwcConfig, RequestConfig};
use crate::error::{GalaxyError, GalaxyResult};

/// Source of curated workflows that can be imported into Galaxy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WorkflowCatalog: Send + Sync {
    /// Fetch every workflow in the catalog.
    async fn workflows(&self) -> GalaxyResult<Vec<IwcWorkflow>>;
}

/// Client for the public IWC (Intergalactic Workflow Commission) manifest
#[derive(Clone)]
pub struct IwcClient {
    client: Client,
    manifest_url: String,
    timeout_ms: u64,
}

impl IwcClient {
    /// Create a new IWC manifest client
    pub fn new(config: &IwcConfig, request_config: &RequestConfig) -> GalaxyResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GalaxyError::Http)?;

        Ok(Self {
            client,
            manifest_url: config.manifest_url.clone(),
            timeout_ms: request_config.timeout_ms,
        })
    }
}

#[async_trait]
impl WorkflowCatalog for IwcClient {
    async fn workflows(&self) -> GalaxyResult<Vec<IwcWorkflow>> {
        debug!(url = %self.manifest_url, "Fetching IWC manifest");

        let response = self
            .client
            .get(&self.manifest_url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GalaxyError::Timeout {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    GalaxyError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(GalaxyError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let manifest: Vec<IwcManifestEntry> =
            response
                .json()
                .await
                .map_err(|e| GalaxyError::InvalidResponse {
                    message: format!("Failed to parse IWC manifest: {}", e),
                })?;

        let workflows: Vec<IwcWorkflow> = manifest
            .into_iter()
            .flat_map(|entry| entry.workflows)
            .collect();

        info!(count = workflows.len(), "IWC manifest loaded");
        Ok(workflows)
    }
}

/// Workflows matching a free-text query, in manifest order.
pub fn search_workflows(workflows: Vec<IwcWorkflow>, query: &str) -> Vec<IwcWorkflow> {
    workflows
        .into_iter()
        .filter(|workflow| workflow.matches(query))
        .collect()
}
