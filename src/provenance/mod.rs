//! History provenance extraction.
//!
//! Turns a Galaxy history and its jobs into an ordered list of
//! [`ToolInvocation`]s with resolved parameter values.

mod extractor;
mod params;
mod types;

pub use extractor::*;
pub use params::{resolve_parameters, ResolvedParameters};
pub use types::*;
