//! MCP server front-end.
//!
//! Exposes the dispatcher's operations as MCP tools over a stdio JSON-RPC 2.0
//! stream.

mod mcp;

pub use mcp::*;
