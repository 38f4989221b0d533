//! Connection state shared by the front-ends.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::RequestConfig;
use crate::error::GalaxyResult;
use crate::galaxy::{GalaxyClient, GalaxyGateway, UserRecord};

/// A verified connection to one Galaxy server.
pub struct Connection {
    endpoint: String,
    api_key: String,
    user: UserRecord,
    gateway: Arc<dyn GalaxyGateway>,
}

impl Connection {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        user: UserRecord,
        gateway: Arc<dyn GalaxyGateway>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            user,
            gateway,
        }
    }

    /// Normalized server URL
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn user(&self) -> &UserRecord {
        &self.user
    }

    pub fn gateway(&self) -> Arc<dyn GalaxyGateway> {
        Arc::clone(&self.gateway)
    }

    /// Whether this connection was made with the same credentials.
    pub fn is_same(&self, endpoint: &str, api_key: &str) -> bool {
        self.endpoint == endpoint && self.api_key == api_key
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// Whether the agent currently has a verified connection.
#[derive(Debug, Clone, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected(Arc<Connection>),
}

/// Shared, explicitly passed connection state.
///
/// Only connect and disconnect write it; requests take a snapshot.
#[derive(Debug, Clone, Default)]
pub struct ConnectionContext {
    state: Arc<RwLock<ConnectionState>>,
}

impl ConnectionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current connection, if any.
    pub async fn snapshot(&self) -> Option<Arc<Connection>> {
        match &*self.state.read().await {
            ConnectionState::Connected(connection) => Some(Arc::clone(connection)),
            ConnectionState::Disconnected => None,
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.snapshot().await.is_some()
    }

    pub async fn set_connected(&self, connection: Connection) -> Arc<Connection> {
        let connection = Arc::new(connection);
        *self.state.write().await = ConnectionState::Connected(Arc::clone(&connection));
        connection
    }

    /// Drop the connection, returning whether there was one.
    pub async fn disconnect(&self) -> bool {
        let previous = std::mem::take(&mut *self.state.write().await);
        matches!(previous, ConnectionState::Connected(_))
    }
}

/// Opens and verifies gateway connections.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Build a gateway for `endpoint` and verify the key by fetching the user.
    async fn connect(
        &self,
        endpoint: &str,
        api_key: &str,
    ) -> GalaxyResult<(Arc<dyn GalaxyGateway>, UserRecord)>;
}

/// Connects over HTTP with [`GalaxyClient`].
#[derive(Debug, Clone, Default)]
pub struct HttpConnector {
    request_config: RequestConfig,
}

impl HttpConnector {
    pub fn new(request_config: RequestConfig) -> Self {
        Self { request_config }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(
        &self,
        endpoint: &str,
        api_key: &str,
    ) -> GalaxyResult<(Arc<dyn GalaxyGateway>, UserRecord)> {
        let client = GalaxyClient::new(endpoint, api_key, self.request_config.clone())?;
        let user = client.current_user().await?;
        debug!(endpoint = %client.base_url(), user = %user.display_name(), "Galaxy credentials verified");
        Ok((Arc::new(client), user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::galaxy::MockGalaxyGateway;

    fn user() -> UserRecord {
        UserRecord {
            id: Some("u1".to_string()),
            username: Some("ada".to_string()),
            email: Some("ada@example.org".to_string()),
        }
    }

    #[tokio::test]
    async fn test_context_lifecycle() {
        let context = ConnectionContext::new();
        assert!(!context.is_connected().await);

        let gateway: Arc<dyn GalaxyGateway> = Arc::new(MockGalaxyGateway::new());
        context
            .set_connected(Connection::new("https://usegalaxy.org/", "key", user(), gateway))
            .await;

        let snapshot = context.snapshot().await.unwrap();
        assert_eq!(snapshot.endpoint(), "https://usegalaxy.org/");
        assert!(snapshot.is_same("https://usegalaxy.org/", "key"));
        assert!(!snapshot.is_same("https://usegalaxy.org/", "other"));

        assert!(context.disconnect().await);
        assert!(!context.disconnect().await);
        assert!(context.snapshot().await.is_none());
    }

    #[test]
    fn test_debug_redacts_key() {
        let gateway: Arc<dyn GalaxyGateway> = Arc::new(MockGalaxyGateway::new());
        let connection = Connection::new("https://usegalaxy.org/", "secret", user(), gateway);
        let debug = format!("{:?}", connection);
        assert!(!debug.contains("secret"));
    }
}
