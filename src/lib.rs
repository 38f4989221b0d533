//! # Galaxy Agent
//!
//! Operates a Galaxy bioinformatics server from the command line, from an MCP
//! client, or through plain-English requests, and turns the provenance of a
//! Galaxy history into a citation-backed methods section.
//!
//! ## Architecture
//!
//! ```text
//! CLI / intent resolver / MCP server
//!                ↓
//!           Dispatcher ──→ GalaxyGateway (HTTP) + IWC catalog
//!                ↓
//!   ProvenanceExtractor → CitationResolver → synthesize → MethodsDocument
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use galaxy_agent::{Config, ConnectionContext, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let dispatcher = Dispatcher::from_config(&config, ConnectionContext::new())?;
//!     dispatcher.connect(None, None).await?;
//!     let document = dispatcher.generate_methods("f2db41e1fa331b3e").await?;
//!     println!("{}", document.to_markdown());
//!     Ok(())
//! }
//! ```

/// Cancellation tokens and deadlines.
pub mod cancel;
/// Citation lookup and formatting.
pub mod citations;
/// Command-line front-end.
pub mod cli;
/// Configuration loaded from the environment.
pub mod config;
/// Operation routing and connection state.
pub mod dispatch;
/// Error types and result aliases.
pub mod error;
/// Galaxy REST client and the IWC workflow catalog.
pub mod galaxy;
/// Natural-language request resolution.
pub mod intent;
/// Methods section synthesis.
pub mod methods;
/// History provenance extraction.
pub mod provenance;
/// MCP server over stdio.
pub mod server;

pub use config::Config;
pub use dispatch::{ConnectionContext, Dispatcher, Operation};
pub use error::{AgentError, AgentResult, AppError, AppResult};
pub use methods::MethodsDocument;
pub use server::McpServer;
