//! Plain-text rendering of operation results.

use serde_json::Value;

use crate::dispatch::Operation;

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn user_name(user: &Value) -> &str {
    ["username", "email", "id"]
        .iter()
        .map(|key| text(user, key))
        .find(|name| !name.is_empty())
        .unwrap_or("unknown user")
}

fn items<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Render the result of `operation` for a terminal.
pub fn format_response(operation: Operation, result: &Value) -> String {
    match operation {
        Operation::Connect | Operation::Status => format!(
            "Connected to {} as {}",
            text(result, "url"),
            user_name(&result["user"])
        ),
        Operation::Disconnect => text(result, "message").to_string(),
        Operation::SearchTools => {
            let tools = items(result, "tools");
            let mut output = format!(
                "Found {} tools matching '{}'\n",
                tools.len(),
                text(result, "query")
            );
            for tool in tools {
                output.push_str(&format!("- {} ({})", text(tool, "name"), text(tool, "id")));
                let version = text(tool, "version");
                if !version.is_empty() {
                    output.push_str(&format!(" v{}", version));
                }
                let description = text(tool, "description");
                if !description.is_empty() {
                    output.push_str(&format!(": {}", description));
                }
                output.push('\n');
            }
            output
        }
        Operation::GetToolCitations => {
            let mut output = format!(
                "Citations for {} (version {})\n",
                text(result, "tool_name"),
                text(result, "tool_version")
            );
            let citations = &result["citations"];
            match text(citations, "status") {
                "available" => {
                    for (index, citation) in items(citations, "citations").iter().enumerate() {
                        output.push_str(&format!("{}. {}\n", index + 1, text(citation, "reference")));
                    }
                }
                _ => output.push_str(&format!(
                    "Citations unavailable: {}\n",
                    text(citations, "reason")
                )),
            }
            output
        }
        Operation::ListHistories => {
            let histories = items(result, "histories");
            let mut output = format!("{} histories\n", histories.len());
            for history in histories {
                output.push_str(&format!(
                    "- {} ({}), {} items\n",
                    text(history, "name"),
                    text(history, "id"),
                    history.get("count").and_then(Value::as_u64).unwrap_or(0)
                ));
            }
            output
        }
        Operation::CreateHistory => {
            let history = &result["history"];
            format!(
                "Created history '{}' ({})",
                text(history, "name"),
                text(history, "id")
            )
        }
        Operation::GetHistoryDetails => {
            let history = &result["history"];
            let contents = items(result, "contents");
            let mut output = format!(
                "History '{}' ({})\n{} datasets\n",
                text(history, "name"),
                text(history, "id"),
                contents.len()
            );
            for item in contents {
                let hid = item.get("hid").and_then(Value::as_u64).unwrap_or(0);
                output.push_str(&format!(
                    "{:>4}. {} [{}]\n",
                    hid,
                    text(item, "name"),
                    text(item, "state")
                ));
            }
            output
        }
        Operation::GetJobDetails => {
            let job = &result["job"];
            format!(
                "Job {}: {} (version {}), state {}\n{}",
                text(job, "id"),
                text(job, "tool_id"),
                text(job, "tool_version"),
                text(job, "state"),
                pretty(&job["params"])
            )
        }
        Operation::ListIwcWorkflows | Operation::SearchIwcWorkflows => {
            let workflows = items(result, "workflows");
            let mut output = format!("{} IWC workflows\n", workflows.len());
            for workflow in workflows {
                output.push_str(&format!(
                    "- {} [{}]\n",
                    text(workflow, "name"),
                    text(workflow, "trs_id")
                ));
                let annotation = text(workflow, "annotation");
                if !annotation.is_empty() {
                    output.push_str(&format!("  {}\n", annotation));
                }
            }
            output
        }
        Operation::ImportWorkflow => format!(
            "Imported workflow '{}' ({})",
            text(result, "name"),
            text(result, "trs_id")
        ),
        Operation::GenerateMethods => text(result, "methods_text").to_string(),
        Operation::GetToolDetails | Operation::RunTool | Operation::UploadFile => pretty(result),
    }
}
