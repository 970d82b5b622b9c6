#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::packager::Packager;
use crate::tools::{
    ArchiveParams, CompressParams, DecompressParams, DeriveKeyParams, GenerateKeysParams,
    Orchestrator, PackageParams, SignParams, ToolResponse, UnarchiveParams, VerifyParams,
};
use crate::wire::{INVALID_PARAMS, JsonRpcRequest, JsonRpcResponse, METHOD_NOT_FOUND, PARSE_ERROR};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP server over line-delimited JSON-RPC on stdio.
///
/// Each request is handled to completion before the next line is read; a
/// failing tool invocation produces a failure-flagged result and never
/// terminates the loop.
pub struct McpServer<P> {
    orchestrator: Orchestrator<P>,
}

impl<P: Packager> McpServer<P> {
    pub fn new(packager: P) -> Self {
        Self {
            orchestrator: Orchestrator::new(packager),
        }
    }

    /// Serves requests from stdin until EOF. Responses are written one per
    /// line on stdout; logging stays on stderr.
    pub async fn run_stdio(&self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        info!(protocol = PROTOCOL_VERSION, "serving MCP on stdio");

        while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(response) = self.handle_line(line) {
                let payload =
                    serde_json::to_string(&response).context("failed to encode response")?;
                stdout.write_all(payload.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("stdin closed, shutting down");
        Ok(())
    }

    /// Parses and dispatches one request line. `None` means no response is
    /// owed (notifications).
    pub fn handle_line(&self, line: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                warn!(%err, "unparseable request");
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("parse error: {err}"),
                ));
            }
        };
        self.handle_request(request)
    }

    pub fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        if method.starts_with("notifications/") {
            debug!(method, "ignoring notification");
            return None;
        }

        // Without an id there is nowhere to send a reply.
        let id = id?;

        let response = match method.as_str() {
            "initialize" => JsonRpcResponse::result(id, initialize_result()),
            "ping" => JsonRpcResponse::result(id, json!({})),
            "tools/list" => JsonRpcResponse::result(id, json!({ "tools": tool_descriptors() })),
            "tools/call" => self.handle_tool_call(id, params),
            _ => JsonRpcResponse::error(
                id,
                METHOD_NOT_FOUND,
                format!("method `{method}` is not supported"),
            ),
        };
        Some(response)
    }

    fn handle_tool_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        #[derive(Debug, Deserialize)]
        struct CallParams {
            name: String,
            #[serde(default)]
            arguments: Value,
        }

        let call: CallParams = match serde_json::from_value(params.unwrap_or(Value::Null)) {
            Ok(call) => call,
            Err(err) => {
                return JsonRpcResponse::error(
                    id,
                    INVALID_PARAMS,
                    format!("invalid tool call: {err}"),
                );
            }
        };

        info!(tool = call.name, "tool call");
        match self.dispatch_tool(&call.name, call.arguments) {
            Some(response) => JsonRpcResponse::result(id, tool_result(&response)),
            None => JsonRpcResponse::error(
                id,
                INVALID_PARAMS,
                format!("unknown tool `{}`", call.name),
            ),
        }
    }

    /// Routes a tool call by name. Malformed arguments become failure-flagged
    /// tool responses, keeping parameter validation inside the tool boundary;
    /// only an unknown tool name is a protocol-level error (`None`).
    pub fn dispatch_tool(&self, name: &str, arguments: Value) -> Option<ToolResponse> {
        let orchestrator = &self.orchestrator;
        let response = match name {
            "archive" => call(arguments, |params: ArchiveParams| {
                orchestrator.archive(params)
            }),
            "compress" => call(arguments, |params: CompressParams| {
                orchestrator.compress(params)
            }),
            "decompress" => call(arguments, |params: DecompressParams| {
                orchestrator.decompress(params)
            }),
            "sign" => call(arguments, |params: SignParams| orchestrator.sign(params)),
            "verify" => call(arguments, |params: VerifyParams| {
                orchestrator.verify(params)
            }),
            "generate-keys" => call(arguments, |params: GenerateKeysParams| {
                orchestrator.generate_keys(params)
            }),
            "derive-public-key" => call(arguments, |params: DeriveKeyParams| {
                orchestrator.derive_public_key(params)
            }),
            "package" => call(arguments, |params: PackageParams| {
                orchestrator.package(params)
            }),
            "unarchive" => call(arguments, |params: UnarchiveParams| {
                orchestrator.unarchive(params)
            }),
            _ => return None,
        };
        Some(response)
    }
}

fn call<T, F>(arguments: Value, run: F) -> ToolResponse
where
    T: serde::de::DeserializeOwned,
    F: FnOnce(T) -> ToolResponse,
{
    match serde_json::from_value(arguments) {
        Ok(params) => run(params),
        Err(err) => ToolResponse::error(format!("Invalid parameters: {err}")),
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": "filepack-mcp",
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

fn tool_result(response: &ToolResponse) -> Value {
    json!({
        "content": [{ "type": "text", "text": response.text }],
        "isError": response.is_error,
    })
}

/// Descriptors served by `tools/list`; input schemas come straight from the
/// parameter types.
pub fn tool_descriptors() -> Vec<Value> {
    vec![
        descriptor::<ArchiveParams>(
            "archive",
            "Archive a directory into a tar file, with optional comma-separated include/exclude globs",
        ),
        descriptor::<CompressParams>(
            "compress",
            "Compress a file (or a directory via archive=true) with gzip, brotli, or deflate",
        ),
        descriptor::<DecompressParams>(
            "decompress",
            "Decompress a file, optionally extracting the result as an archive",
        ),
        descriptor::<SignParams>("sign", "Create a detached Ed25519 signature for a file"),
        descriptor::<VerifyParams>(
            "verify",
            "Verify a detached Ed25519 signature against a file",
        ),
        descriptor::<GenerateKeysParams>("generate-keys", "Generate an Ed25519 key pair"),
        descriptor::<DeriveKeyParams>(
            "derive-public-key",
            "Derive the public key from an Ed25519 private key",
        ),
        descriptor::<PackageParams>(
            "package",
            "Archive, compress, and optionally sign a directory in one step",
        ),
        descriptor::<UnarchiveParams>("unarchive", "Extract a tar archive into a directory"),
    ]
}

fn descriptor<T: JsonSchema>(name: &str, description: &str) -> Value {
    let schema = serde_json::to_value(schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}));
    json!({
        "name": name,
        "description": description,
        "inputSchema": schema,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packager::LibPackager;

    fn server() -> McpServer<LibPackager> {
        McpServer::new(LibPackager::new())
    }

    #[test]
    fn lists_all_nine_tools() {
        let names: Vec<String> = tool_descriptors()
            .iter()
            .map(|tool| tool["name"].as_str().expect("name").to_string())
            .collect();
        assert_eq!(
            names,
            [
                "archive",
                "compress",
                "decompress",
                "sign",
                "verify",
                "generate-keys",
                "derive-public-key",
                "package",
                "unarchive",
            ]
        );
    }

    #[test]
    fn initialize_reports_tools_capability() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .expect("response");
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["result"]["protocolVersion"], json!(PROTOCOL_VERSION));
        assert!(value["result"]["capabilities"]["tools"].is_object());
    }

    #[test]
    fn notifications_get_no_reply() {
        let response =
            server().handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#);
        assert!(response.is_none());
    }

    #[test]
    fn unknown_method_is_rejected() {
        let response = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":7,"method":"resources/list"}"#)
            .expect("response");
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["error"]["code"], json!(METHOD_NOT_FOUND));
    }

    #[test]
    fn garbage_line_is_a_parse_error() {
        let response = server().handle_line("{not json").expect("response");
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["error"]["code"], json!(PARSE_ERROR));
    }

    #[test]
    fn unknown_tool_is_invalid_params() {
        let response = server()
            .handle_line(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"shred","arguments":{}}}"#,
            )
            .expect("response");
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["error"]["code"], json!(INVALID_PARAMS));
    }

    #[test]
    fn malformed_arguments_are_a_tool_failure() {
        let response = server()
            .dispatch_tool("compress", json!({"source": "a.txt"}))
            .expect("known tool");
        assert!(response.is_error);
        assert!(response.text.contains("Invalid parameters"));
    }
}
