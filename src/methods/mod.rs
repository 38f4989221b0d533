//! Methods section synthesis.
//!
//! [`synthesize`] is a pure function of the provenance and citations: the same
//! inputs always give a byte-identical document.

mod document;

pub use document::*;

use std::collections::HashMap;

use crate::citations::{CitationMap, CitationSet};
use crate::provenance::{DatasetRef, HistoryProvenance, ParamValue, ToolInvocation, ToolKey};

/// Assemble the methods document for a history.
///
/// One narrative block per distinct tool release in first-occurrence order,
/// each citing exactly one reference entry (the tool's citations or a
/// placeholder when they are unavailable or missing from `citations`).
pub fn synthesize(provenance: &HistoryProvenance, citations: &CitationMap) -> MethodsDocument {
    let steps: HashMap<&str, u32> = provenance
        .invocations()
        .iter()
        .map(|invocation| (invocation.job_id.as_str(), invocation.position))
        .collect();

    let tools = provenance.distinct_tools();
    let mut blocks = Vec::with_capacity(tools.len());
    let mut references = Vec::with_capacity(tools.len());

    for (index, tool) in tools.iter().enumerate() {
        let marker = index + 1;
        let invocations: Vec<&ToolInvocation> = provenance.invocations_of(tool).collect();

        blocks.push(NarrativeBlock {
            tool: tool.clone(),
            tool_name: tool.display_name().to_string(),
            narrative: narrative(tool, &invocations, marker),
            citation_marker: marker,
            invocations: invocations
                .iter()
                .map(|invocation| invocation_detail(invocation, &steps))
                .collect(),
        });
        references.push(reference_entry(tool, marker, citations.get(tool)));
    }

    MethodsDocument {
        history_id: provenance.history_id().to_string(),
        history_name: provenance.history_name().to_string(),
        overview: overview(provenance, tools.len()),
        blocks,
        references,
    }
}

fn plural(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}

/// `a`, `a and b`, `a, b and c`
fn join_with_and(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {}", init.join(", "), last),
    }
}

fn overview(provenance: &HistoryProvenance, distinct_tools: usize) -> String {
    format!(
        "The analysis recorded in the Galaxy history \"{}\" comprised {} using {}.",
        provenance.history_name(),
        plural(
            provenance.invocations().len(),
            "completed tool invocation",
            "completed tool invocations"
        ),
        plural(distinct_tools, "distinct tool", "distinct tools"),
    )
}

fn tool_label(tool: &ToolKey) -> String {
    let name = tool.display_name();
    if name == tool.tool_id {
        format!("{} (version {})", name, tool.version)
    } else {
        format!(
            "{} (Galaxy tool `{}`, version {})",
            name, tool.tool_id, tool.version
        )
    }
}

fn narrative(tool: &ToolKey, invocations: &[&ToolInvocation], marker: usize) -> String {
    let steps: Vec<String> = invocations
        .iter()
        .map(|invocation| invocation.position.to_string())
        .collect();

    match invocations.len() {
        1 => format!(
            "{} was run once, at step {} [{}].",
            tool_label(tool),
            join_with_and(&steps),
            marker
        ),
        count => format!(
            "{} was run {} times, at steps {} [{}].",
            tool_label(tool),
            count,
            join_with_and(&steps),
            marker
        ),
    }
}

fn invocation_detail(invocation: &ToolInvocation, steps: &HashMap<&str, u32>) -> InvocationDetail {
    InvocationDetail {
        job_id: invocation.job_id.clone(),
        step: invocation.position,
        parameters: invocation
            .parameters
            .iter()
            .map(|(name, value)| RenderedParameter {
                name: name.clone(),
                value: render_value(value, steps),
            })
            .collect(),
        incomplete: invocation
            .partial
            .as_ref()
            .map(|partial| partial.reason.clone()),
    }
}

/// Render a parameter value for prose.
fn render_value(value: &ParamValue, steps: &HashMap<&str, u32>) -> String {
    match value {
        ParamValue::Null => "not set".to_string(),
        ParamValue::Bool(true) => "yes".to_string(),
        ParamValue::Bool(false) => "no".to_string(),
        ParamValue::Integer(integer) => integer.to_string(),
        ParamValue::Float(float) => float.to_string(),
        ParamValue::Text(text) => text.clone(),
        ParamValue::List(items) if items.is_empty() => "none".to_string(),
        ParamValue::List(items) => items
            .iter()
            .map(|item| render_value(item, steps))
            .collect::<Vec<_>>()
            .join(", "),
        ParamValue::Dataset(dataset) => render_dataset(dataset, steps),
        ParamValue::Unresolved => "unresolved (set at run time)".to_string(),
    }
}

fn render_dataset(dataset: &DatasetRef, steps: &HashMap<&str, u32>) -> String {
    match &dataset.producer {
        Some(producer) => match steps.get(producer.job_id.as_str()) {
            Some(step) => format!("output `{}` of step {}", producer.output_name, step),
            None => format!(
                "output `{}` of job {}",
                producer.output_name, producer.job_id
            ),
        },
        None => format!("dataset {}", dataset.dataset_id),
    }
}

fn reference_entry(tool: &ToolKey, marker: usize, citations: Option<&CitationSet>) -> ReferenceEntry {
    let label = format!("{} (version {})", tool.display_name(), tool.version);

    match citations {
        Some(CitationSet::Available { citations }) if !citations.is_empty() => ReferenceEntry {
            marker,
            tool: tool.clone(),
            text: format!(
                "{}: {}",
                label,
                citations
                    .iter()
                    .map(|c| c.reference.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
            available: true,
            doi: citations.iter().find_map(|c| c.doi.clone()),
            url: citations.iter().find_map(|c| c.url.clone()),
            unavailable_reason: None,
        },
        other => ReferenceEntry {
            marker,
            tool: tool.clone(),
            text: format!("{}: citation unavailable.", label),
            available: false,
            doi: None,
            url: None,
            unavailable_reason: Some(match other {
                Some(CitationSet::Unavailable { reason }) => reason.clone(),
                _ => "citation not resolved".to_string(),
            }),
        },
    }
}
