use serde::Serialize;
use std::fmt;

use crate::provenance::ToolKey;

/// One `name: value` line of a parameter listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedParameter {
    pub name: String,
    pub value: String,
}

/// Parameters of one invocation inside a narrative block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationDetail {
    pub job_id: String,
    /// 1-based step in the history.
    pub step: u32,
    /// Sorted by parameter name.
    pub parameters: Vec<RenderedParameter>,
    /// Why the parameters are incomplete, when they are.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incomplete: Option<String>,
}

/// The description of one distinct tool release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NarrativeBlock {
    pub tool: ToolKey,
    pub tool_name: String,
    pub narrative: String,
    /// 1-based index into the reference list.
    pub citation_marker: usize,
    pub invocations: Vec<InvocationDetail>,
}

/// An entry of the reference list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub marker: usize,
    pub tool: ToolKey,
    pub text: String,
    /// False for the placeholder of a tool whose citations were unavailable.
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable_reason: Option<String>,
}

/// A citation-backed methods section for one history.
///
/// Built by [`synthesize`](super::synthesize); immutable afterwards. `Display`
/// renders Markdown, `Serialize` gives the structured form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodsDocument {
    pub(super) history_id: String,
    pub(super) history_name: String,
    pub(super) overview: String,
    pub(super) blocks: Vec<NarrativeBlock>,
    pub(super) references: Vec<ReferenceEntry>,
}

impl MethodsDocument {
    pub fn history_id(&self) -> &str {
        &self.history_id
    }

    pub fn history_name(&self) -> &str {
        &self.history_name
    }

    pub fn overview(&self) -> &str {
        &self.overview
    }

    /// Narrative blocks, one per distinct tool release in first-use order.
    pub fn blocks(&self) -> &[NarrativeBlock] {
        &self.blocks
    }

    /// References in marker order.
    pub fn references(&self) -> &[ReferenceEntry] {
        &self.references
    }

    /// Markdown rendering.
    pub fn to_markdown(&self) -> String {
        self.to_string()
    }

    /// Structured JSON rendering.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

impl fmt::Display for MethodsDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Methods")?;
        writeln!(f)?;
        writeln!(f, "## Overview")?;
        writeln!(f)?;
        writeln!(f, "{}", self.overview)?;
        writeln!(f)?;
        writeln!(f, "## Analysis Details")?;

        for block in &self.blocks {
            writeln!(f)?;
            writeln!(
                f,
                "### {} (version {})",
                block.tool_name, block.tool.version
            )?;
            writeln!(f)?;
            writeln!(f, "{}", block.narrative)?;

            for invocation in &block.invocations {
                writeln!(f)?;
                if invocation.parameters.is_empty() {
                    writeln!(f, "*No parameters recorded (step {}).*", invocation.step)?;
                } else {
                    writeln!(f, "**Parameters used (step {}):**", invocation.step)?;
                    writeln!(f)?;
                    for param in &invocation.parameters {
                        writeln!(f, "- {}: {}", param.name, param.value)?;
                    }
                }
                if let Some(reason) = &invocation.incomplete {
                    writeln!(f)?;
                    writeln!(f, "*Parameters incomplete: {}*", reason)?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "## References")?;
        writeln!(f)?;
        for reference in &self.references {
            writeln!(f, "{}. {}", reference.marker, reference.text)?;
        }
        Ok(())
    }
}
