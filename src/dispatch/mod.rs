//! Request dispatch.
//!
//! The [`Dispatcher`] is the single entry point both front-ends use: it takes an
//! operation name and a JSON argument map, enforces the connected precondition
//! and turns the request into gateway calls.

mod connection;
mod operations;

pub use connection::*;
pub use operations::Operation;

use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cancel::CancelToken;
use crate::citations::CitationResolver;
use crate::config::{Config, GalaxyConfig};
use crate::error::{AgentError, AgentResult, AppResult, GalaxyResult};
use crate::galaxy::{
    normalize_base_url, search_workflows, GalaxyGateway, IwcClient, IwcWorkflow, WorkflowCatalog,
};
use crate::methods::{synthesize, MethodsDocument};
use crate::provenance::{ProvenanceExtractor, ToolKey, UNKNOWN_VERSION};
use operations::{
    parse_arguments, require, ConnectParams, CreateHistoryParams, HistoryParams,
    ImportWorkflowParams, JobParams, QueryParams, RunToolParams, ToolCitationsParams,
    ToolDetailsParams, UploadParams,
};

/// Routes operations to the gateway and the methods pipeline.
#[derive(Clone)]
pub struct Dispatcher {
    context: ConnectionContext,
    connector: Arc<dyn Connector>,
    catalog: Arc<dyn WorkflowCatalog>,
    defaults: GalaxyConfig,
    methods_timeout: Option<Duration>,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        context: ConnectionContext,
        connector: Arc<dyn Connector>,
        catalog: Arc<dyn WorkflowCatalog>,
    ) -> Self {
        Self {
            context,
            connector,
            catalog,
            defaults: GalaxyConfig::default(),
            methods_timeout: None,
        }
    }

    /// Build a dispatcher over HTTP from the loaded configuration.
    pub fn from_config(config: &Config, context: ConnectionContext) -> AppResult<Self> {
        let connector = Arc::new(HttpConnector::new(config.request.clone()));
        let catalog = Arc::new(IwcClient::new(&config.iwc, &config.request)?);

        Ok(Self::new(context, connector, catalog)
            .with_defaults(config.galaxy.clone())
            .with_methods_timeout(config.methods.timeout_ms.map(Duration::from_millis)))
    }

    /// URL and API key used when connect is called without them.
    pub fn with_defaults(mut self, defaults: GalaxyConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Deadline applied to every methods generation run.
    pub fn with_methods_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.methods_timeout = timeout;
        self
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.context
    }

    /// Dispatch an operation by name.
    pub async fn dispatch(&self, operation: &str, arguments: Value) -> AgentResult<Value> {
        self.dispatch_with(operation, arguments, &CancelToken::never())
            .await
    }

    /// Dispatch an operation by name under a cancellation token.
    pub async fn dispatch_with(
        &self,
        operation: &str,
        arguments: Value,
        cancel: &CancelToken,
    ) -> AgentResult<Value> {
        let operation: Operation = operation.parse()?;
        self.execute(operation, arguments, cancel).await
    }

    /// Execute a parsed operation.
    pub async fn execute(
        &self,
        operation: Operation,
        arguments: Value,
        cancel: &CancelToken,
    ) -> AgentResult<Value> {
        info!(operation = %operation, "Dispatching operation");
        let start = Instant::now();

        let result = self.route(operation, arguments, cancel).await;

        match &result {
            Ok(_) => info!(
                operation = %operation,
                latency_ms = start.elapsed().as_millis(),
                "Operation completed"
            ),
            Err(e) => warn!(operation = %operation, error = %e, "Operation failed"),
        }
        result
    }

    async fn route(
        &self,
        operation: Operation,
        arguments: Value,
        cancel: &CancelToken,
    ) -> AgentResult<Value> {
        match operation {
            Operation::Connect => {
                let params: ConnectParams = parse_arguments(operation, arguments)?;
                return self.connect_with(params.url, params.api_key, cancel).await;
            }
            Operation::Disconnect => return Ok(self.disconnect().await),
            _ => {}
        }

        // Everything else needs a connection; check before touching arguments
        // or the gateway.
        let connection = self.context.snapshot().await.ok_or(AgentError::NotConnected)?;
        let gateway = connection.gateway();

        match operation {
            Operation::Connect | Operation::Disconnect => Err(AgentError::invalid(
                operation.name(),
                "connection lifecycle operations are handled before routing",
            )),
            Operation::Status => Ok(json!({
                "connected": true,
                "url": connection.endpoint(),
                "user": connection.user(),
            })),
            Operation::SearchTools => {
                let params: QueryParams = parse_arguments(operation, arguments)?;
                require(operation, "query", &params.query)?;
                let tools = call(
                    cancel,
                    "searching tools",
                    gateway.search_tools(&params.query),
                )
                .await?;
                Ok(json!({ "query": params.query, "tools": tools }))
            }
            Operation::GetToolDetails => {
                let params: ToolDetailsParams = parse_arguments(operation, arguments)?;
                require(operation, "tool_id", &params.tool_id)?;
                let tool = call(
                    cancel,
                    format!("fetching tool {}", params.tool_id),
                    gateway.get_tool(&params.tool_id, params.io_details),
                )
                .await?;
                Ok(json!({ "tool": tool }))
            }
            Operation::GetToolCitations => {
                let params: ToolCitationsParams = parse_arguments(operation, arguments)?;
                require(operation, "tool_id", &params.tool_id)?;
                self.tool_citations(gateway, params, cancel).await
            }
            Operation::RunTool => {
                let params: RunToolParams = parse_arguments(operation, arguments)?;
                require(operation, "history_id", &params.history_id)?;
                require(operation, "tool_id", &params.tool_id)?;
                if !params.inputs.is_object() {
                    return Err(AgentError::invalid(
                        operation.name(),
                        "inputs must be an object",
                    ));
                }
                let result = call(
                    cancel,
                    format!("running tool {}", params.tool_id),
                    gateway.run_tool(&params.history_id, &params.tool_id, params.inputs),
                )
                .await?;
                Ok(json!({ "result": result }))
            }
            Operation::ListHistories => {
                let histories = call(cancel, "listing histories", gateway.list_histories()).await?;
                Ok(json!({ "histories": histories }))
            }
            Operation::CreateHistory => {
                let params: CreateHistoryParams = parse_arguments(operation, arguments)?;
                require(operation, "name", &params.name)?;
                let history = call(
                    cancel,
                    "creating history",
                    gateway.create_history(&params.name),
                )
                .await?;
                Ok(json!({ "history": history }))
            }
            Operation::GetHistoryDetails => {
                let params: HistoryParams = parse_arguments(operation, arguments)?;
                require(operation, "history_id", &params.history_id)?;
                let context = format!("fetching history {}", params.history_id);
                let history = call(
                    cancel,
                    context.clone(),
                    gateway.get_history(&params.history_id),
                )
                .await?;
                let contents = call(
                    cancel,
                    context,
                    gateway.get_history_contents(&params.history_id),
                )
                .await?;
                Ok(json!({ "history": history, "contents": contents }))
            }
            Operation::GetJobDetails => {
                let params: JobParams = parse_arguments(operation, arguments)?;
                require(operation, "job_id", &params.job_id)?;
                let job = call(
                    cancel,
                    format!("fetching job {}", params.job_id),
                    gateway.get_job(&params.job_id),
                )
                .await?;
                Ok(json!({ "job": job }))
            }
            Operation::UploadFile => {
                let params: UploadParams = parse_arguments(operation, arguments)?;
                let is_file = tokio::fs::metadata(&params.path)
                    .await
                    .map(|meta| meta.is_file())
                    .unwrap_or(false);
                if !is_file {
                    return Err(AgentError::invalid(
                        operation.name(),
                        format!("file not found: {}", params.path.display()),
                    ));
                }
                let result = call(
                    cancel,
                    format!("uploading {}", params.path.display()),
                    gateway.upload_file(&params.path, params.history_id),
                )
                .await?;
                Ok(json!({ "result": result }))
            }
            Operation::ListIwcWorkflows => {
                let workflows = self.iwc_workflows(cancel).await?;
                Ok(json!({ "workflows": workflow_summaries(&workflows) }))
            }
            Operation::SearchIwcWorkflows => {
                let params: QueryParams = parse_arguments(operation, arguments)?;
                require(operation, "query", &params.query)?;
                let workflows = search_workflows(self.iwc_workflows(cancel).await?, &params.query);
                Ok(json!({
                    "query": params.query,
                    "workflows": workflow_summaries(&workflows),
                }))
            }
            Operation::ImportWorkflow => {
                let params: ImportWorkflowParams = parse_arguments(operation, arguments)?;
                require(operation, "trs_id", &params.trs_id)?;
                let workflow = self
                    .iwc_workflows(cancel)
                    .await?
                    .into_iter()
                    .find(|workflow| workflow.trs_id == params.trs_id)
                    .ok_or_else(|| AgentError::NotFound {
                        resource: "IWC workflow".to_string(),
                        id: params.trs_id.clone(),
                    })?;
                let imported = call(
                    cancel,
                    format!("importing workflow {}", params.trs_id),
                    gateway.import_workflow(&workflow.definition),
                )
                .await?;
                Ok(json!({
                    "trs_id": workflow.trs_id,
                    "name": workflow.name(),
                    "imported": imported,
                }))
            }
            Operation::GenerateMethods => {
                let params: HistoryParams = parse_arguments(operation, arguments)?;
                let document = self
                    .methods_pipeline(gateway, &params.history_id, cancel)
                    .await?;
                Ok(json!({
                    "history_id": document.history_id(),
                    "history_name": document.history_name(),
                    "methods_text": document.to_markdown(),
                    "document": document.to_json()?,
                }))
            }
        }
    }

    /// Connect using configured defaults for anything not given.
    pub async fn connect(
        &self,
        url: Option<String>,
        api_key: Option<String>,
    ) -> AgentResult<Value> {
        self.connect_with(url, api_key, &CancelToken::never()).await
    }

    async fn connect_with(
        &self,
        url: Option<String>,
        api_key: Option<String>,
        cancel: &CancelToken,
    ) -> AgentResult<Value> {
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        let url = non_empty(url).or_else(|| self.defaults.url.clone());
        let api_key = non_empty(api_key).or_else(|| self.defaults.api_key.clone());

        let (url, api_key) = match (url, api_key) {
            (Some(url), Some(api_key)) => (url, api_key),
            _ => {
                return Err(AgentError::invalid(
                    Operation::Connect.name(),
                    "a Galaxy URL and API key must be given or set in GALAXY_URL and GALAXY_API_KEY",
                ))
            }
        };

        let endpoint = normalize_base_url(&url)
            .map_err(|e| AgentError::ConnectFailed {
                url: url.clone(),
                message: e.to_string(),
            })?
            .to_string();

        if let Some(existing) = self.context.snapshot().await {
            if existing.is_same(&endpoint, &api_key) {
                return Ok(connection_summary(&existing, "Already connected to Galaxy"));
            }
        }

        let connected = cancel
            .run(self.connector.connect(&endpoint, &api_key))
            .await
            .map_err(|_| AgentError::Cancelled {
                stage: "connect".to_string(),
            })?;

        match connected {
            Ok((gateway, user)) => {
                let connection = self
                    .context
                    .set_connected(Connection::new(endpoint, api_key, user, gateway))
                    .await;
                info!(
                    endpoint = %connection.endpoint(),
                    user = %connection.user().display_name(),
                    "Connected to Galaxy"
                );
                Ok(connection_summary(&connection, "Successfully connected to Galaxy"))
            }
            Err(e) => Err(AgentError::ConnectFailed {
                url: endpoint,
                message: e.to_string(),
            }),
        }
    }

    /// Forget the current connection.
    pub async fn disconnect(&self) -> Value {
        let was_connected = self.context.disconnect().await;
        if was_connected {
            info!("Disconnected from Galaxy");
        }
        let message = if was_connected {
            "Disconnected from Galaxy"
        } else {
            "Was not connected"
        };
        json!({ "connected": false, "message": message })
    }

    /// Generate the methods document for a history.
    pub async fn generate_methods(&self, history_id: &str) -> AgentResult<MethodsDocument> {
        self.generate_methods_with(history_id, &CancelToken::never())
            .await
    }

    /// Generate the methods document under a cancellation token.
    pub async fn generate_methods_with(
        &self,
        history_id: &str,
        cancel: &CancelToken,
    ) -> AgentResult<MethodsDocument> {
        let connection = self.context.snapshot().await.ok_or(AgentError::NotConnected)?;
        self.methods_pipeline(connection.gateway(), history_id, cancel)
            .await
    }

    async fn methods_pipeline(
        &self,
        gateway: Arc<dyn GalaxyGateway>,
        history_id: &str,
        cancel: &CancelToken,
    ) -> AgentResult<MethodsDocument> {
        require(Operation::GenerateMethods, "history_id", history_id)?;

        let cancel = match self.methods_timeout {
            Some(timeout) => cancel.clone().with_timeout(timeout),
            None => cancel.clone(),
        };
        let start = Instant::now();

        let provenance = ProvenanceExtractor::new(Arc::clone(&gateway))
            .extract(history_id, &cancel)
            .await?;
        let citations = CitationResolver::new(gateway)
            .resolve(&provenance, &cancel)
            .await?;
        let document = synthesize(&provenance, &citations);

        info!(
            history_id = %history_id,
            blocks = document.blocks().len(),
            latency_ms = start.elapsed().as_millis(),
            "Methods section generated"
        );
        Ok(document)
    }

    async fn tool_citations(
        &self,
        gateway: Arc<dyn GalaxyGateway>,
        params: ToolCitationsParams,
        cancel: &CancelToken,
    ) -> AgentResult<Value> {
        let (tool_name, version) = match params.version.filter(|v| !v.trim().is_empty()) {
            Some(version) => (None, version),
            None => {
                let tool = call(
                    cancel,
                    format!("fetching tool {}", params.tool_id),
                    gateway.get_tool(&params.tool_id, false),
                )
                .await?;
                let version = tool
                    .get("version")
                    .and_then(Value::as_str)
                    .unwrap_or(UNKNOWN_VERSION)
                    .to_string();
                let name = tool.get("name").and_then(Value::as_str).map(str::to_string);
                (name, version)
            }
        };

        let key = ToolKey::new(params.tool_id, version);
        let citations = CitationResolver::new(gateway)
            .resolve_tools(std::slice::from_ref(&key), cancel)
            .await?;

        Ok(json!({
            "tool_id": key.tool_id,
            "tool_name": tool_name.unwrap_or_else(|| key.display_name().to_string()),
            "tool_version": key.version,
            "citations": citations.get(&key),
        }))
    }

    async fn iwc_workflows(&self, cancel: &CancelToken) -> AgentResult<Vec<IwcWorkflow>> {
        call(cancel, "fetching the IWC manifest", self.catalog.workflows()).await
    }
}

/// Run one gateway call under `cancel`, mapping its error into the core taxonomy.
async fn call<T, F>(cancel: &CancelToken, context: impl Into<String>, work: F) -> AgentResult<T>
where
    F: Future<Output = GalaxyResult<T>>,
{
    let context = context.into();
    match cancel.run(work).await {
        Ok(result) => result.map_err(|e| AgentError::from_gateway(context, e)),
        Err(_) => Err(AgentError::Cancelled { stage: context }),
    }
}

fn connection_summary(connection: &Connection, message: &str) -> Value {
    json!({
        "connected": true,
        "url": connection.endpoint(),
        "user": connection.user(),
        "message": message,
    })
}

fn workflow_summaries(workflows: &[IwcWorkflow]) -> Vec<Value> {
    workflows
        .iter()
        .map(|workflow| {
            json!({
                "trs_id": workflow.trs_id,
                "name": workflow.name(),
                "annotation": workflow.annotation(),
                "tags": workflow.tags(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::{MockGalaxyGateway, MockWorkflowCatalog, UserRecord};

    fn user() -> UserRecord {
        UserRecord {
            id: Some("u1".to_string()),
            username: Some("ada".to_string()),
            email: None,
        }
    }

    fn dispatcher(connector: MockConnector) -> Dispatcher {
        Dispatcher::new(
            ConnectionContext::new(),
            Arc::new(connector),
            Arc::new(MockWorkflowCatalog::new()),
        )
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let dispatcher = dispatcher(MockConnector::new());
        for op in Operation::ALL.into_iter().filter(Operation::requires_connection) {
            let err = dispatcher
                .dispatch(op.name(), json!({}))
                .await
                .unwrap_err();
            assert!(
                matches!(err, AgentError::NotConnected),
                "{} should need a connection",
                op
            );
        }
    }

    #[tokio::test]
    async fn test_connect_uses_defaults_and_normalizes_url() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .withf(|endpoint, key| endpoint == "https://galaxy.example.org/" && key == "k1")
            .times(1)
            .returning(|_, _| {
                let gateway: Arc<dyn GalaxyGateway> = Arc::new(MockGalaxyGateway::new());
                Ok((gateway, user()))
            });

        let dispatcher = dispatcher(connector).with_defaults(GalaxyConfig {
            url: Some("https://galaxy.example.org".to_string()),
            api_key: Some("k1".to_string()),
        });

        let result = dispatcher.dispatch("connect", Value::Null).await.unwrap();
        assert_eq!(result["url"], "https://galaxy.example.org/");
        assert_eq!(result["user"]["username"], "ada");

        // Same credentials again: no second verification.
        let result = dispatcher.dispatch("connect", json!({})).await.unwrap();
        assert_eq!(result["message"], "Already connected to Galaxy");

        let status = dispatcher.dispatch("status", Value::Null).await.unwrap();
        assert_eq!(status["connected"], true);
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_previous_state() {
        let mut connector = MockConnector::new();
        connector
            .expect_connect()
            .withf(|endpoint, _| endpoint == "https://good.example.org/")
            .returning(|_, _| {
                let gateway: Arc<dyn GalaxyGateway> = Arc::new(MockGalaxyGateway::new());
                Ok((gateway, user()))
            });
        connector
            .expect_connect()
            .withf(|endpoint, _| endpoint == "https://bad.example.org/")
            .returning(|_, _| {
                Err(crate::error::GalaxyError::Api {
                    status: 401,
                    message: "bad key".to_string(),
                })
            });

        let dispatcher = dispatcher(connector);
        dispatcher
            .dispatch("connect", json!({"url": "https://good.example.org", "api_key": "a"}))
            .await
            .unwrap();

        let err = dispatcher
            .dispatch("connect", json!({"url": "https://bad.example.org", "api_key": "b"}))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ConnectFailed { .. }));

        let snapshot = dispatcher.context().snapshot().await.unwrap();
        assert_eq!(snapshot.endpoint(), "https://good.example.org/");
    }

    #[tokio::test]
    async fn test_connect_without_credentials() {
        let dispatcher = dispatcher(MockConnector::new());
        let err = dispatcher.dispatch("connect", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let dispatcher = dispatcher(MockConnector::new());
        let result = dispatcher.dispatch("disconnect", Value::Null).await.unwrap();
        assert_eq!(result["message"], "Was not connected");
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let dispatcher = dispatcher(MockConnector::new());
        let err = dispatcher.dispatch("dropTables", json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::UnknownOperation { .. }));
    }
}
