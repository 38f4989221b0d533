use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{HistoryRecord, HistorySummary, JobRecord, RawCitation, ToolSummary, UserRecord};
use super::GalaxyGateway;
use crate::config::RequestConfig;
use crate::error::{GalaxyError, GalaxyResult};

/// Header Galaxy reads the API key from.
const API_KEY_HEADER: &str = "x-api-key";

/// Jobs requested per page; Galaxy caps an unpaged listing at its own default.
pub const JOB_PAGE_SIZE: usize = 500;

/// Resource named in a not-found error when a lookup misses.
struct Lookup<'a> {
    resource: &'static str,
    id: &'a str,
}

/// Client for the Galaxy REST API
#[derive(Clone)]
pub struct GalaxyClient {
    client: Client,
    base_url: Url,
    api_key: String,
    request_config: RequestConfig,
}

impl GalaxyClient {
    /// Create a new Galaxy client
    pub fn new(url: &str, api_key: &str, request_config: RequestConfig) -> GalaxyResult<Self> {
        let base_url = normalize_base_url(url)?;

        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(GalaxyError::Http)?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.to_string(),
            request_config,
        })
    }

    /// Get the normalized base URL (always ends with `/`)
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Build an endpoint URL from path segments, percent-encoding each one.
    ///
    /// Toolshed tool ids contain `/`, so segments must never be joined as text.
    fn endpoint(&self, segments: &[&str]) -> GalaxyResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GalaxyError::InvalidUrl {
                url: self.base_url.to_string(),
                message: "URL cannot be a base".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET a JSON resource, retrying transient failures with exponential backoff
    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
        lookup: Option<Lookup<'_>>,
    ) -> GalaxyResult<T> {
        let url = self.endpoint(segments)?;
        let mut retries = 0;

        loop {
            if retries > 0 {
                let delay = Duration::from_millis(
                    self.request_config.retry_delay_ms * (2_u64.pow(retries - 1)),
                );
                warn!(
                    url = %url,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying Galaxy request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();
            let request = self.client.get(url.clone()).query(query);

            match self.execute(request, lookup.as_ref()).await {
                Ok(value) => {
                    debug!(
                        url = %url,
                        latency_ms = start.elapsed().as_millis(),
                        "Galaxy request succeeded"
                    );
                    return Ok(value);
                }
                Err(e) if e.is_transient() && retries < self.request_config.max_retries => {
                    error!(
                        url = %url,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Galaxy request failed"
                    );
                    retries += 1;
                }
                Err(e) if e.is_transient() && retries > 0 => {
                    return Err(GalaxyError::Unavailable {
                        message: e.to_string(),
                        retries,
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a single request and decode the JSON body (internal)
    async fn execute<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        lookup: Option<&Lookup<'_>>,
    ) -> GalaxyResult<T> {
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GalaxyError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    GalaxyError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            // Galaxy answers 400 for ids it cannot decode and 404 for unknown ones.
            if let Some(lookup) = lookup {
                if status == StatusCode::NOT_FOUND || status == StatusCode::BAD_REQUEST {
                    return Err(GalaxyError::NotFound {
                        resource: lookup.resource.to_string(),
                        id: lookup.id.to_string(),
                    });
                }
            }
            let error_body = response.text().await.unwrap_or_default();
            return Err(GalaxyError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GalaxyError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }
}

/// Validate a Galaxy URL and make sure it ends with a slash.
pub fn normalize_base_url(url: &str) -> GalaxyResult<Url> {
    let trimmed = url.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    };

    let parsed = Url::parse(&with_slash).map_err(|e| GalaxyError::InvalidUrl {
        url: url.to_string(),
        message: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(GalaxyError::InvalidUrl {
            url: url.to_string(),
            message: format!("unsupported scheme '{}'", other),
        }),
    }
}

#[async_trait]
impl GalaxyGateway for GalaxyClient {
    async fn current_user(&self) -> GalaxyResult<UserRecord> {
        self.get_json(&["api", "users", "current"], &[], None).await
    }

    async fn search_tools(&self, query: &str) -> GalaxyResult<Vec<ToolSummary>> {
        self.get_json(&["api", "tools"], &[("q", query)], None).await
    }

    async fn get_tool(&self, tool_id: &str, io_details: bool) -> GalaxyResult<Value> {
        let query: &[(&str, &str)] = if io_details {
            &[("io_details", "true")]
        } else {
            &[]
        };
        self.get_json(
            &["api", "tools", tool_id],
            query,
            Some(Lookup {
                resource: "Tool",
                id: tool_id,
            }),
        )
        .await
    }

    async fn get_tool_citations(
        &self,
        tool_id: &str,
        tool_version: &str,
    ) -> GalaxyResult<Vec<RawCitation>> {
        self.get_json(
            &["api", "tools", tool_id, "citations"],
            &[("tool_version", tool_version)],
            Some(Lookup {
                resource: "Tool",
                id: tool_id,
            }),
        )
        .await
    }

    async fn run_tool(
        &self,
        history_id: &str,
        tool_id: &str,
        inputs: Value,
    ) -> GalaxyResult<Value> {
        let url = self.endpoint(&["api", "tools"])?;
        info!(tool = %tool_id, history = %history_id, "Running Galaxy tool");

        let request = self.client.post(url).json(&json!({
            "history_id": history_id,
            "tool_id": tool_id,
            "inputs": inputs,
        }));
        self.execute(request, None).await
    }

    async fn list_histories(&self) -> GalaxyResult<Vec<HistorySummary>> {
        self.get_json(&["api", "histories"], &[("view", "summary")], None)
            .await
    }

    async fn create_history(&self, name: &str) -> GalaxyResult<HistorySummary> {
        let url = self.endpoint(&["api", "histories"])?;
        info!(name = %name, "Creating Galaxy history");

        let request = self.client.post(url).json(&json!({ "name": name }));
        self.execute(request, None).await
    }

    async fn get_history(&self, history_id: &str) -> GalaxyResult<HistoryRecord> {
        self.get_json(
            &["api", "histories", history_id],
            &[("view", "detailed")],
            Some(Lookup {
                resource: "History",
                id: history_id,
            }),
        )
        .await
    }

    async fn get_history_contents(&self, history_id: &str) -> GalaxyResult<Vec<Value>> {
        self.get_json(
            &["api", "histories", history_id, "contents"],
            &[("view", "detailed")],
            Some(Lookup {
                resource: "History",
                id: history_id,
            }),
        )
        .await
    }

    async fn list_jobs(&self, history_id: &str) -> GalaxyResult<Vec<JobRecord>> {
        let limit = JOB_PAGE_SIZE.to_string();
        let mut jobs: Vec<JobRecord> = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = 0;

        loop {
            let offset_text = offset.to_string();
            let page: Vec<JobRecord> = self
                .get_json(
                    &["api", "jobs"],
                    &[
                        ("history_id", history_id),
                        ("limit", &limit),
                        ("offset", &offset_text),
                    ],
                    Some(Lookup {
                        resource: "History",
                        id: history_id,
                    }),
                )
                .await?;

            let page_len = page.len();
            // Jobs updated between pages can shift into the next one.
            jobs.extend(page.into_iter().filter(|job| seen.insert(job.id.clone())));

            if page_len < JOB_PAGE_SIZE {
                break;
            }
            offset += page_len;
            debug!(history_id, offset, "Fetching next page of jobs");
        }

        Ok(jobs)
    }

    async fn get_job(&self, job_id: &str) -> GalaxyResult<JobRecord> {
        self.get_json(
            &["api", "jobs", job_id],
            &[("full", "true")],
            Some(Lookup {
                resource: "Job",
                id: job_id,
            }),
        )
        .await
    }

    async fn upload_file(&self, path: &Path, history_id: Option<String>) -> GalaxyResult<Value> {
        let content = tokio::fs::read(path).await.map_err(|e| GalaxyError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        info!(file = %file_name, bytes = content.len(), "Uploading file to Galaxy");

        let mut form = multipart::Form::new().part(
            "files_0|file_data",
            multipart::Part::bytes(content).file_name(file_name),
        );
        if let Some(history_id) = history_id {
            form = form.text("history_id", history_id);
        }

        let url = self.endpoint(&["api", "tools", "fetch"])?;
        self.execute(self.client.post(url).multipart(form), None)
            .await
    }

    async fn import_workflow(&self, definition: &Value) -> GalaxyResult<Value> {
        let url = self.endpoint(&["api", "workflows"])?;
        let request = self
            .client
            .post(url)
            .json(&json!({ "workflow": definition }));
        self.execute(request, None).await
    }
}
