//! Unit tests for the MCP protocol implementation.

use super::*;
use serde_json::json;
use std::sync::Arc;

use crate::dispatch::{ConnectionContext, MockConnector};
use crate::galaxy::MockWorkflowCatalog;

fn server() -> McpServer {
    McpServer::new(Dispatcher::new(
        ConnectionContext::new(),
        Arc::new(MockConnector::new()),
        Arc::new(MockWorkflowCatalog::new()),
    ))
}

fn request(value: Value) -> JsonRpcRequest {
    serde_json::from_value(value).unwrap()
}

// ============================================================================
// JsonRpcResponse tests
// ============================================================================

#[test]
fn test_jsonrpc_response_success_with_id() {
    let response = JsonRpcResponse::success(Some(json!(1)), json!({"result": "ok"}));

    assert_eq!(response.jsonrpc, "2.0");
    assert_eq!(response.id, json!(1));
    assert!(response.error.is_none());
    assert_eq!(response.result.unwrap()["result"], "ok");
}

#[test]
fn test_jsonrpc_response_error_without_id() {
    let response = JsonRpcResponse::error(None, -32700, "Parse error");

    assert_eq!(response.id, Value::Null);
    assert_eq!(response.error.unwrap().code, -32700);
}

#[test]
fn test_jsonrpc_error_serialization() {
    let response = JsonRpcResponse::error(Some(json!(1)), -32601, "Method not found");
    let serialized = serde_json::to_string(&response).unwrap();

    assert!(serialized.contains("\"error\""));
    assert!(serialized.contains("-32601"));
    assert!(!serialized.contains("\"result\""));
}

#[test]
fn test_tool_call_params_without_arguments() {
    let params: ToolCallParams = serde_json::from_str(r#"{"name":"list_histories"}"#).unwrap();

    assert_eq!(params.name, "list_histories");
    assert!(params.arguments.is_none());
}

// ============================================================================
// Tool definitions
// ============================================================================

#[test]
fn test_every_operation_is_a_tool() {
    let tools = tool_definitions();
    assert_eq!(tools.len(), Operation::ALL.len());

    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert!(names.contains(&"generate_methods"));
    assert!(names.contains(&"search_iwc_workflows"));
}

#[test]
fn test_generate_methods_tool_schema() {
    let tool = Tool::from(Operation::GenerateMethods);
    assert!(tool.description.contains("methods section"));
    assert_eq!(tool.input_schema["required"], json!(["history_id"]));

    let serialized = serde_json::to_value(&tool).unwrap();
    assert!(serialized.get("inputSchema").is_some());
}

// ============================================================================
// Request handling
// ============================================================================

#[tokio::test]
async fn test_initialize() {
    let response = server()
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"})))
        .await
        .unwrap();

    let result = response.result.unwrap();
    assert_eq!(result["protocolVersion"], "2024-11-05");
    assert_eq!(result["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let server = server();
    for method in ["initialized", "notifications/initialized", "some/unknown"] {
        let response = server
            .handle_request(request(json!({"jsonrpc": "2.0", "method": method})))
            .await;
        assert!(response.is_none(), "{} should be silent", method);
    }
}

#[tokio::test]
async fn test_unknown_method() {
    let response = server()
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 7, "method": "resources/list"})))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32601);
}

#[tokio::test]
async fn test_tools_list() {
    let response = server()
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})))
        .await
        .unwrap();

    let tools = response.result.unwrap()["tools"].as_array().unwrap().len();
    assert_eq!(tools, Operation::ALL.len());
}

#[tokio::test]
async fn test_tool_call_while_disconnected_is_tool_error() {
    let response = server()
        .handle_request(request(json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "generate_methods", "arguments": {"history_id": "h1"}}
        })))
        .await
        .unwrap();

    let result = response.result.unwrap();
    assert_eq!(result["isError"], true);
    assert!(result["content"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Not connected to Galaxy"));
}

#[tokio::test]
async fn test_tool_call_missing_params() {
    let response = server()
        .handle_request(request(json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call"})))
        .await
        .unwrap();
    assert_eq!(response.error.unwrap().code, -32602);
}

#[tokio::test]
async fn test_serve_over_streams() {
    let input = concat!(
        "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
        "\n",
        "not json\n",
        "{\"jsonrpc\":\"2.0\",\"method\":\"initialized\"}\n",
    );
    let mut output = Vec::new();

    server()
        .serve(tokio::io::BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["id"], 1);
    assert_eq!(lines[1]["error"]["code"], -32700);
}
