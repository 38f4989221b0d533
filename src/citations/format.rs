//! Formatting raw Galaxy citations into reference strings.
//!
//! Galaxy serves citations either as a bare DOI or as a BibTeX entry. Only the
//! handful of fields needed for a reference line are read from BibTeX.

use std::collections::HashMap;

use super::types::Citation;
use crate::galaxy::RawCitation;
use crate::provenance::ToolKey;

/// Format one raw citation for a tool release.
pub fn format_citation(tool: &ToolKey, raw: &RawCitation) -> Citation {
    let content = raw.content.trim();
    let (reference, doi, url) = match raw.format.to_lowercase().as_str() {
        "doi" => {
            let doi = strip_doi_prefix(content).to_string();
            (
                format!("doi:{}", doi),
                Some(doi.clone()),
                Some(format!("https://doi.org/{}", doi)),
            )
        }
        "bibtex" => {
            let fields = parse_bibtex_fields(content);
            let doi = fields.get("doi").map(|d| strip_doi_prefix(d).to_string());
            let url = fields.get("url").cloned();
            let reference =
                bibtex_reference(&fields).unwrap_or_else(|| collapse_whitespace(content));
            (reference, doi, url)
        }
        _ => (collapse_whitespace(content), None, None),
    };

    Citation {
        tool_id: tool.tool_id.clone(),
        tool_version: tool.version.clone(),
        reference,
        doi,
        url,
    }
}

fn strip_doi_prefix(doi: &str) -> &str {
    let doi = doi.trim();
    ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| doi.strip_prefix(prefix))
        .unwrap_or(doi)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `Authors (Year). Title. Venue, Volume, Pages.` from whatever fields exist.
fn bibtex_reference(fields: &HashMap<String, String>) -> Option<String> {
    let title = fields.get("title");
    let authors = fields.get("author").map(|a| format_authors(a));
    if title.is_none() && authors.is_none() {
        return None;
    }

    let mut reference = String::new();
    if let Some(authors) = authors {
        reference.push_str(&authors);
        if let Some(year) = fields.get("year") {
            reference.push_str(&format!(" ({})", year));
        }
        reference.push_str(". ");
    }
    if let Some(title) = title {
        reference.push_str(title.trim_end_matches('.'));
        reference.push('.');
    }

    let venue: Vec<&str> = ["journal", "booktitle", "publisher"]
        .iter()
        .find_map(|key| fields.get(*key))
        .into_iter()
        .chain(fields.get("volume"))
        .chain(fields.get("pages"))
        .map(String::as_str)
        .collect();
    if !venue.is_empty() {
        reference.push(' ');
        reference.push_str(&venue.join(", "));
        reference.push('.');
    }

    Some(collapse_whitespace(&reference))
}

/// First author, plus the second or "et al.".
fn format_authors(raw: &str) -> String {
    let authors: Vec<&str> = raw
        .split(" and ")
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect();
    match authors.as_slice() {
        [] => String::new(),
        [only] => only.to_string(),
        [first, second] => format!("{} and {}", first, second),
        [first, ..] => format!("{} et al.", first),
    }
}

/// Read `name = {value}`, `name = "value"` and `name = bare` fields.
///
/// Field names are lowercased; braces inside values are dropped.
pub fn parse_bibtex_fields(entry: &str) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    let chars: Vec<char> = entry.chars().collect();

    // Skip "@type{key," to the first field.
    let mut pos = match chars.iter().position(|&c| c == '{') {
        Some(open) => match chars[open..].iter().position(|&c| c == ',') {
            Some(comma) => open + comma + 1,
            None => return fields,
        },
        None => return fields,
    };

    loop {
        while pos < chars.len() && (chars[pos].is_whitespace() || chars[pos] == ',') {
            pos += 1;
        }
        let name_start = pos;
        while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_' || chars[pos] == '-') {
            pos += 1;
        }
        if pos == name_start {
            break;
        }
        let name: String = chars[name_start..pos].iter().collect::<String>().to_lowercase();

        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        if pos >= chars.len() || chars[pos] != '=' {
            break;
        }
        pos += 1;
        while pos < chars.len() && chars[pos].is_whitespace() {
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }

        let mut value = String::new();
        match chars[pos] {
            '{' => {
                let mut depth = 0usize;
                while pos < chars.len() {
                    match chars[pos] {
                        '{' => depth += 1,
                        '}' => {
                            depth -= 1;
                            if depth == 0 {
                                pos += 1;
                                break;
                            }
                        }
                        c => value.push(c),
                    }
                    pos += 1;
                }
            }
            '"' => {
                pos += 1;
                while pos < chars.len() && chars[pos] != '"' {
                    if chars[pos] != '{' && chars[pos] != '}' {
                        value.push(chars[pos]);
                    }
                    pos += 1;
                }
                pos += 1;
            }
            _ => {
                while pos < chars.len() && chars[pos] != ',' && chars[pos] != '}' {
                    value.push(chars[pos]);
                    pos += 1;
                }
            }
        }

        let value = collapse_whitespace(&value);
        if !value.is_empty() {
            fields.insert(name, value);
        }
    }

    fields
}
