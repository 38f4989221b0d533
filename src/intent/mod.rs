//! Turning free text into a structured request.
//!
//! [`IntentResolver`] is the seam for the natural-language front-end. The crate
//! ships [`KeywordIntentResolver`], a deterministic matcher over a fixed set of
//! phrasings; anything it cannot place is reported as unrecognized or ambiguous
//! rather than guessed.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::dispatch::Operation;
use crate::error::IntentError;

/// A resolved request: the operation plus its argument map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Intent {
    #[serde(serialize_with = "serialize_operation")]
    pub operation: Operation,
    pub arguments: Value,
}

fn serialize_operation<S: serde::Serializer>(op: &Operation, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(op.name())
}

impl Intent {
    pub fn new(operation: Operation, arguments: Value) -> Self {
        Self {
            operation,
            arguments,
        }
    }
}

/// Resolves free text into an [`Intent`].
#[async_trait]
pub trait IntentResolver: Send + Sync {
    async fn resolve(&self, text: &str) -> Result<Intent, IntentError>;
}

/// Words that never carry an argument value.
const FILLER: &[&str] = &[
    "a", "an", "the", "me", "my", "for", "with", "that", "to", "of", "in", "on", "please",
    "show", "find", "search", "list", "get", "all", "any", "some", "available", "id", "called",
    "named", "about", "is", "are", "which", "can", "i", "use", "do",
];

/// Keyword-based resolver for the common phrasings of each operation.
#[derive(Debug, Clone, Default)]
pub struct KeywordIntentResolver;

impl KeywordIntentResolver {
    pub fn new() -> Self {
        Self
    }

    fn resolve_words(&self, text: &str, words: &Words) -> Result<Intent, IntentError> {
        let missing = |argument: &str| IntentError::MissingArgument {
            text: text.to_string(),
            argument: argument.to_string(),
        };

        if words.has("disconnect") {
            return Ok(Intent::new(Operation::Disconnect, json!({})));
        }
        if words.has("connect") {
            return Ok(Intent::new(Operation::Connect, json!({})));
        }
        if words.has("status") || words.phrase(&["connected", "to"]) {
            return Ok(Intent::new(Operation::Status, json!({})));
        }

        if words.has("methods") {
            let history_id = words
                .value_after(&["history", "histories"])
                .ok_or_else(|| missing("history_id"))?;
            return Ok(Intent::new(
                Operation::GenerateMethods,
                json!({ "history_id": history_id }),
            ));
        }

        if words.has_any(&["citation", "citations", "cite", "reference", "references"]) {
            let tool_id = words
                .value_after(&["tool", "for", "of"])
                .ok_or_else(|| missing("tool_id"))?;
            return Ok(Intent::new(
                Operation::GetToolCitations,
                json!({ "tool_id": tool_id }),
            ));
        }

        if words.has("upload") {
            let path = words.value_after(&["upload", "file"]).ok_or_else(|| missing("path"))?;
            let mut arguments = json!({ "path": path });
            if let Some(history_id) = words.value_after(&["history"]) {
                arguments["history_id"] = json!(history_id);
            }
            return Ok(Intent::new(Operation::UploadFile, arguments));
        }

        if words.has("import") {
            let trs_id = words
                .value_after(&["workflow", "import"])
                .ok_or_else(|| missing("trs_id"))?;
            return Ok(Intent::new(
                Operation::ImportWorkflow,
                json!({ "trs_id": trs_id }),
            ));
        }

        if words.has_any(&["create", "new"]) && words.has_any(&["history", "histories"]) {
            let name = words.rest_after(&["called", "named"]).ok_or_else(|| missing("name"))?;
            return Ok(Intent::new(Operation::CreateHistory, json!({ "name": name })));
        }

        if words.has_any(&["run", "execute"]) {
            let tool_id = words.value_after(&["run", "execute", "tool"]);
            let history_id = words.value_after(&["history"]);
            return match (tool_id, history_id) {
                (Some(tool_id), Some(history_id)) => Ok(Intent::new(
                    Operation::RunTool,
                    json!({ "tool_id": tool_id, "history_id": history_id, "inputs": {} }),
                )),
                (None, _) => Err(missing("tool_id")),
                (_, None) => Err(missing("history_id")),
            };
        }

        if words.has("job") {
            let job_id = words.value_after(&["job"]).ok_or_else(|| missing("job_id"))?;
            return Ok(Intent::new(Operation::GetJobDetails, json!({ "job_id": job_id })));
        }

        let wants_tools = words.has_any(&["tool", "tools"]);
        let wants_workflows = words.has_any(&["workflow", "workflows", "iwc"]);
        match (wants_tools, wants_workflows) {
            (true, true) => {
                return Err(IntentError::Ambiguous {
                    text: text.to_string(),
                    candidates: vec![
                        Operation::SearchTools.name().to_string(),
                        Operation::SearchIwcWorkflows.name().to_string(),
                    ],
                })
            }
            (true, false) => {
                if words.has_any(&["details", "describe", "info", "about"]) {
                    let tool_id = words.value_after(&["tool"]).ok_or_else(|| missing("tool_id"))?;
                    return Ok(Intent::new(
                        Operation::GetToolDetails,
                        json!({ "tool_id": tool_id }),
                    ));
                }
                let query = words.query(&["tool", "tools"]).ok_or_else(|| missing("query"))?;
                return Ok(Intent::new(Operation::SearchTools, json!({ "query": query })));
            }
            (false, true) => {
                return Ok(match words.query(&["workflow", "workflows", "iwc"]) {
                    Some(query) => {
                        Intent::new(Operation::SearchIwcWorkflows, json!({ "query": query }))
                    }
                    None => Intent::new(Operation::ListIwcWorkflows, json!({})),
                });
            }
            (false, false) => {}
        }

        if words.has("histories") {
            return Ok(Intent::new(Operation::ListHistories, json!({})));
        }
        if words.has("history") {
            return match words.value_after(&["history"]) {
                Some(history_id) => Ok(Intent::new(
                    Operation::GetHistoryDetails,
                    json!({ "history_id": history_id }),
                )),
                None => Err(IntentError::Ambiguous {
                    text: text.to_string(),
                    candidates: vec![
                        Operation::ListHistories.name().to_string(),
                        Operation::GetHistoryDetails.name().to_string(),
                    ],
                }),
            };
        }

        Err(IntentError::Unrecognized {
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl IntentResolver for KeywordIntentResolver {
    async fn resolve(&self, text: &str) -> Result<Intent, IntentError> {
        let words = Words::new(text);
        let intent = self.resolve_words(text.trim(), &words)?;
        debug!(operation = %intent.operation, arguments = %intent.arguments, "Intent resolved");
        Ok(intent)
    }
}

/// Tokenized request text, keeping the original casing for argument values.
struct Words {
    raw: Vec<String>,
    lower: Vec<String>,
}

impl Words {
    fn new(text: &str) -> Self {
        let raw: Vec<String> = text
            .split_whitespace()
            .map(|word| {
                word.trim_matches(|c: char| matches!(c, '"' | '\'' | ',' | '?' | '!' | ':' | ';' | '`'))
                    .trim_end_matches('.')
                    .to_string()
            })
            .filter(|word| !word.is_empty())
            .collect();
        let lower = raw.iter().map(|word| word.to_lowercase()).collect();
        Self { raw, lower }
    }

    fn has(&self, word: &str) -> bool {
        self.lower.iter().any(|w| w == word)
    }

    fn has_any(&self, words: &[&str]) -> bool {
        words.iter().any(|word| self.has(word))
    }

    fn phrase(&self, phrase: &[&str]) -> bool {
        self.lower
            .windows(phrase.len())
            .any(|window| window.iter().zip(phrase).all(|(a, b)| a == b))
    }

    /// First non-filler word following any of `keywords`.
    fn value_after(&self, keywords: &[&str]) -> Option<String> {
        self.lower
            .iter()
            .enumerate()
            .filter(|(_, word)| keywords.contains(&word.as_str()))
            .find_map(|(index, _)| {
                (index + 1..self.raw.len())
                    .find(|&i| !FILLER.contains(&self.lower[i].as_str()) && !is_keyword(&self.lower[i]))
                    .map(|i| self.raw[i].clone())
            })
    }

    /// Every word after the first of `keywords`, joined.
    fn rest_after(&self, keywords: &[&str]) -> Option<String> {
        let index = self
            .lower
            .iter()
            .position(|word| keywords.contains(&word.as_str()))?;
        let rest = self.raw[index + 1..].join(" ");
        (!rest.is_empty()).then_some(rest)
    }

    /// Search text: the words after "for", or else every non-filler word
    /// other than `subject`.
    fn query(&self, subject: &[&str]) -> Option<String> {
        let skip = |i: &usize| {
            let word = self.lower[*i].as_str();
            FILLER.contains(&word) || subject.contains(&word)
        };
        let start = self
            .lower
            .iter()
            .position(|word| word == "for")
            .map_or(0, |index| index + 1);
        let words: Vec<&str> = (start..self.raw.len())
            .filter(|i| !skip(i))
            .map(|i| self.raw[i].as_str())
            .collect();
        (!words.is_empty()).then(|| words.join(" "))
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "history" | "histories" | "tool" | "tools" | "job" | "workflow" | "workflows" | "file"
            | "methods" | "section" | "generate" | "write" | "citation" | "citations"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn resolve(text: &str) -> Result<Intent, IntentError> {
        KeywordIntentResolver::new().resolve(text).await
    }

    #[tokio::test]
    async fn test_generate_methods() {
        let intent = resolve("Generate a methods section for history f2db41e1fa331b3e")
            .await
            .unwrap();
        assert_eq!(intent.operation, Operation::GenerateMethods);
        assert_eq!(intent.arguments["history_id"], "f2db41e1fa331b3e");
    }

    #[tokio::test]
    async fn test_methods_without_history_is_missing_argument() {
        let err = resolve("write my methods").await.unwrap_err();
        assert!(matches!(err, IntentError::MissingArgument { ref argument, .. } if argument == "history_id"));
    }

    #[tokio::test]
    async fn test_tool_search_query() {
        let intent = resolve("Find tools for RNA-seq alignment").await.unwrap();
        assert_eq!(intent.operation, Operation::SearchTools);
        assert_eq!(intent.arguments["query"], "RNA-seq alignment");

        let intent = resolve("search BWA tools").await.unwrap();
        assert_eq!(intent.arguments["query"], "BWA");
    }

    #[tokio::test]
    async fn test_workflow_search_and_list() {
        let intent = resolve("find workflows for variant calling").await.unwrap();
        assert_eq!(intent.operation, Operation::SearchIwcWorkflows);
        assert_eq!(intent.arguments["query"], "variant calling");

        let intent = resolve("list IWC workflows").await.unwrap();
        assert_eq!(intent.operation, Operation::ListIwcWorkflows);
    }

    #[tokio::test]
    async fn test_tools_and_workflows_is_ambiguous() {
        let err = resolve("search tools and workflows for assembly").await.unwrap_err();
        match err {
            IntentError::Ambiguous { candidates, .. } => {
                assert_eq!(candidates, vec!["searchTools", "searchIwcWorkflows"])
            }
            other => panic!("expected ambiguity, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_history_requests() {
        let intent = resolve("show my histories").await.unwrap();
        assert_eq!(intent.operation, Operation::ListHistories);

        let intent = resolve("show history abc123").await.unwrap();
        assert_eq!(intent.operation, Operation::GetHistoryDetails);
        assert_eq!(intent.arguments["history_id"], "abc123");

        let err = resolve("show history").await.unwrap_err();
        assert!(matches!(err, IntentError::Ambiguous { .. }));

        let intent = resolve("create a new history called QC run 2").await.unwrap();
        assert_eq!(intent.operation, Operation::CreateHistory);
        assert_eq!(intent.arguments["name"], "QC run 2");
    }

    #[tokio::test]
    async fn test_citations_upload_and_import() {
        let intent = resolve("citations for tool bwa_mem").await.unwrap();
        assert_eq!(intent.operation, Operation::GetToolCitations);
        assert_eq!(intent.arguments["tool_id"], "bwa_mem");

        let intent = resolve("upload reads.fastq to history h1").await.unwrap();
        assert_eq!(intent.operation, Operation::UploadFile);
        assert_eq!(intent.arguments["path"], "reads.fastq");
        assert_eq!(intent.arguments["history_id"], "h1");

        let intent = resolve("import workflow #workflow/github.com/iwc/rnaseq/main")
            .await
            .unwrap();
        assert_eq!(intent.operation, Operation::ImportWorkflow);
        assert_eq!(
            intent.arguments["trs_id"],
            "#workflow/github.com/iwc/rnaseq/main"
        );
    }

    #[tokio::test]
    async fn test_connection_requests() {
        assert_eq!(
            resolve("connect to galaxy").await.unwrap().operation,
            Operation::Connect
        );
        assert_eq!(
            resolve("disconnect").await.unwrap().operation,
            Operation::Disconnect
        );
        assert_eq!(
            resolve("what is my status?").await.unwrap().operation,
            Operation::Status
        );
    }

    #[tokio::test]
    async fn test_unrecognized() {
        let err = resolve("make me a sandwich").await.unwrap_err();
        assert!(matches!(err, IntentError::Unrecognized { .. }));
    }

    #[test]
    fn test_intent_serializes_operation_name() {
        let intent = Intent::new(Operation::ListHistories, json!({}));
        assert_eq!(
            serde_json::to_value(&intent).unwrap(),
            json!({"operation": "listHistories", "arguments": {}})
        );
    }
}
