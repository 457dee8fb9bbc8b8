//! Tool binding for agent hosts.
//!
//! Exposes analysis, template lookup, and response recovery as named tools
//! with JSON arguments. [`ToolServer::serve`] is a Model Context Protocol
//! server: JSON-RPC 2.0, one message per line, over any async reader/writer
//! pair (stdio in the CLI). It answers `initialize`, `ping`, `tools/list`
//! and `tools/call`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::analysis::analyze;
use crate::analysis::selector::select;
use crate::normalize::normalize_with_diagnostics;
use crate::prompts::plan::prepare_prompt;
use crate::prompts::{TemplateError, TemplateRegistry};
use crate::recovery::recover;

/// MCP protocol revision this server implements.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Name reported in the `initialize` handshake.
pub const SERVER_NAME: &str = "bondprompt";

// JSON-RPC 2.0 error codes.
const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

/// Definition of a tool: name, description, and JSON schema for its arguments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    /// Tool name used in requests.
    pub name: String,
    /// Description shown to the host.
    pub description: String,
    /// JSON Schema object for the tool's arguments.
    pub input_schema: Value,
}

/// Errors from tool execution.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// No tool with this name.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Arguments are missing or have the wrong type.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A template operation failed.
    #[error(transparent)]
    Template(#[from] TemplateError),
    /// Execution failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

// ── MCP wire types ──

/// JSON-RPC 2.0 request or notification (no `id`).
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol marker, must be `"2.0"`.
    #[serde(default)]
    pub jsonrpc: String,
    /// Request id; absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// Protocol marker, always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Id of the request being answered; null when it could not be read.
    pub id: Value,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Failure payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// JSON-RPC 2.0 error object.
#[doc(hidden)]
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    /// JSON-RPC error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Parameters of `tools/call`.
#[doc(hidden)]
#[derive(Debug, Deserialize)]
pub struct CallParams {
    /// Tool name.
    pub name: String,
    /// Tool arguments.
    #[serde(default)]
    pub arguments: Value,
}

/// Every tool this crate exposes.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    let text_only = json!({
        "type": "object",
        "properties": {
            "text": {
                "type": "string",
                "description": "Trading instruction text."
            }
        },
        "required": ["text"]
    });

    vec![
        ToolDefinition {
            name: "get_available_prompts".to_owned(),
            description: "List registered prompt templates with their parameters.".to_owned(),
            input_schema: json!({ "type": "object", "properties": {} }),
        },
        ToolDefinition {
            name: "analyze_text".to_owned(),
            description: "Extract selection signals from an instruction and recommend a template."
                .to_owned(),
            input_schema: text_only.clone(),
        },
        ToolDefinition {
            name: "recommend_prompt".to_owned(),
            description: "Recommend the template category for an instruction.".to_owned(),
            input_schema: text_only,
        },
        ToolDefinition {
            name: "get_prompt_template".to_owned(),
            description: "Fetch a template by id, rendered when all its parameters are given."
                .to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": {
                        "type": "string",
                        "description": "Template id, e.g. single-basic."
                    },
                    "text": { "type": "string" },
                    "question": { "type": "string" },
                    "context_info": { "type": "string" }
                },
                "required": ["name"]
            }),
        },
        ToolDefinition {
            name: "smart_get_prompt".to_owned(),
            description: "Analyse an instruction and return the rendered best-fit prompt."
                .to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "text": {
                        "type": "string",
                        "description": "Trading instruction text."
                    },
                    "context": {
                        "type": "string",
                        "description": "Optional conversation context."
                    }
                },
                "required": ["text"]
            }),
        },
        ToolDefinition {
            name: "recover_response".to_owned(),
            description: "Recover and normalize a trade record from raw generator output."
                .to_owned(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "response": {
                        "type": "string",
                        "description": "Raw text returned by the generator."
                    }
                },
                "required": ["response"]
            }),
        },
    ]
}

/// Executes tools against a shared template registry.
#[derive(Debug, Clone)]
pub struct ToolServer {
    registry: Arc<RwLock<TemplateRegistry>>,
}

impl ToolServer {
    /// Server over a shared registry.
    pub fn new(registry: Arc<RwLock<TemplateRegistry>>) -> Self {
        Self { registry }
    }

    /// Run one tool.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for unknown tools, bad arguments, or failed
    /// template and recovery operations.
    pub async fn call(&self, name: &str, args: &Value) -> Result<Value, ToolError> {
        debug!(tool = name, "tool call");
        match name {
            "get_available_prompts" => {
                let registry = self.registry.read().await;
                to_value(&registry.available())
            }
            "analyze_text" => {
                let text = required_str(args, "text")?;
                let characteristics = analyze(text);
                let recommended = select(&characteristics);
                Ok(json!({
                    "characteristics": to_value(&characteristics)?,
                    "recommended": recommended.id(),
                }))
            }
            "recommend_prompt" => {
                let text = required_str(args, "text")?;
                let category = select(&analyze(text));
                Ok(json!({
                    "category": category.id(),
                    "description": category.description(),
                }))
            }
            "get_prompt_template" => self.prompt_template(args).await,
            "smart_get_prompt" => {
                let text = required_str(args, "text")?;
                let context = args.get("context").and_then(Value::as_str).unwrap_or("");
                let registry = self.registry.read().await;
                to_value(&prepare_prompt(&registry, text, context)?)
            }
            "recover_response" => {
                let response = required_str(args, "response")?;
                let recovered =
                    recover(response).map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
                let (record, diagnostics) = normalize_with_diagnostics(&recovered.fields);
                Ok(json!({
                    "record": to_value(&record)?,
                    "strategy": to_value(&recovered.strategy)?,
                    "diagnostics": to_value(&diagnostics)?,
                }))
            }
            other => Err(ToolError::UnknownTool(other.to_owned())),
        }
    }

    /// Rendered template when every placeholder is supplied, otherwise the raw body.
    async fn prompt_template(&self, args: &Value) -> Result<Value, ToolError> {
        let name = required_str(args, "name")?;
        let registry = self.registry.read().await;
        let template = registry
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_owned()))?;

        let params: Vec<(&str, &str)> = args
            .as_object()
            .into_iter()
            .flatten()
            .filter(|(key, _)| key.as_str() != "name")
            .filter_map(|(key, value)| value.as_str().map(|v| (key.as_str(), v)))
            .collect();

        let (prompt, rendered) = match template.render(&params) {
            Ok(prompt) => (prompt, true),
            Err(TemplateError::MissingParameter { parameter, .. }) => {
                debug!(template = name, %parameter, "returning unfilled template");
                (template.body.clone(), false)
            }
            Err(e) => return Err(e.into()),
        };

        Ok(json!({
            "name": template.id,
            "description": template.description,
            "parameters": template.required_parameters(),
            "rendered": rendered,
            "prompt": prompt,
        }))
    }

    /// Serve MCP messages until `reader` reaches EOF.
    ///
    /// Every request line gets exactly one response line; notifications and
    /// blank lines get none. Tool failures are reported in the result with
    /// `isError: true`; unknown methods, unknown tools, and malformed
    /// parameters are JSON-RPC errors.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading or writing fails.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        info!(protocol = PROTOCOL_VERSION, "tool server ready");
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let Some(response) = self.handle_message(&line).await else {
                continue;
            };
            let mut encoded = serde_json::to_vec(&response)?;
            encoded.push(b'\n');
            writer.write_all(&encoded).await?;
            writer.flush().await?;
        }
        info!("tool server input closed");
        Ok(())
    }

    /// Answer one JSON-RPC message; `None` for notifications.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "malformed JSON-RPC message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {e}"),
                ));
            }
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "notification");
            return None;
        };
        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => JsonRpcResponse::success(id, json!({ "tools": tool_definitions() })),
            "tools/call" => self.handle_call(id, request.params).await,
            other => {
                warn!(method = other, "method not found");
                let message = format!("method not found: {other}");
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, message)
            }
        };
        Some(response)
    }

    async fn handle_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: CallParams = match serde_json::from_value(params.unwrap_or(Value::Null)) {
            Ok(params) => params,
            Err(e) => {
                let message = format!("invalid params: {e}");
                return JsonRpcResponse::failure(id, INVALID_PARAMS, message);
            }
        };

        match self.call(&params.name, &params.arguments).await {
            Ok(result) => JsonRpcResponse::success(id, text_content(&result.to_string(), false)),
            Err(e @ ToolError::UnknownTool(_)) => {
                JsonRpcResponse::failure(id, INVALID_PARAMS, e.to_string())
            }
            Err(e) => {
                warn!(tool = %params.name, error = %e, "tool call failed");
                JsonRpcResponse::success(id, text_content(&e.to_string(), true))
            }
        }
    }
}

/// `tools/call` result carrying one text block.
fn text_content(text: &str, is_error: bool) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": is_error,
    })
}

fn required_str<'a>(args: &'a Value, field: &str) -> Result<&'a str, ToolError> {
    args.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::InvalidInput(format!("missing required field: {field}")))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|e| ToolError::ExecutionFailed(e.to_string()))
}
