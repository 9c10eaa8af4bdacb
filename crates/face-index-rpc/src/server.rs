//! Line-delimited JSON-RPC server.
//!
//! Reads one request per line, answers with one response per line. Requests
//! are handled strictly in arrival order.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{stdin, stdout, AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use face_index_core::FaceIndex;

use crate::error::RpcError;
use crate::methods::MethodExecutor;
use crate::protocol::{RpcRequest, RpcResponse};
use crate::types::*;

/// Methods the server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    AddVector,
    SearchSimilar,
    CheckDuplicate,
    RemoveVector,
    RebuildFromDatabase,
    GetStats,
    Describe,
}

impl Method {
    pub const ALL: [Method; 7] = [
        Method::AddVector,
        Method::SearchSimilar,
        Method::CheckDuplicate,
        Method::RemoveVector,
        Method::RebuildFromDatabase,
        Method::GetStats,
        Method::Describe,
    ];

    /// Resolve a wire name or one of its aliases.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.name() == name || m.aliases().contains(&name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::AddVector => "add_vector",
            Method::SearchSimilar => "search_similar",
            Method::CheckDuplicate => "check_duplicate",
            Method::RemoveVector => "remove_vector",
            Method::RebuildFromDatabase => "rebuild_from_database",
            Method::GetStats => "get_stats",
            Method::Describe => "describe",
        }
    }

    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Method::AddVector => &["insert"],
            Method::SearchSimilar => &["search"],
            Method::CheckDuplicate => &["checkDuplicate"],
            Method::RemoveVector => &["remove"],
            Method::RebuildFromDatabase => &["rebuildAll"],
            Method::GetStats => &["stats"],
            Method::Describe => &[],
        }
    }

    fn description(self) -> &'static str {
        match self {
            Method::AddVector => "Enroll one face embedding under a face profile id.",
            Method::SearchSimilar => "Find the k enrolled faces nearest to an embedding, best first.",
            Method::CheckDuplicate => {
                "Report whether an embedding matches an enrolled face at high confidence."
            }
            Method::RemoveVector => "Remove the embedding enrolled under a face profile id.",
            Method::RebuildFromDatabase => {
                "Replace the whole index with the given face profiles and persist it."
            }
            Method::GetStats => "Report entry count, dimension, thresholds and persistence state.",
            Method::Describe => "List the available methods and the JSON Schema of their params.",
        }
    }

    fn params_schema(self) -> Value {
        match self {
            Method::AddVector => schema_of::<InsertParams>(),
            Method::SearchSimilar => schema_of::<SearchParams>(),
            Method::CheckDuplicate => schema_of::<CheckDuplicateParams>(),
            Method::RemoveVector => schema_of::<RemoveParams>(),
            Method::RebuildFromDatabase => schema_of::<RebuildParams>(),
            Method::GetStats | Method::Describe => Value::Null,
        }
    }
}

fn schema_of<T: schemars::JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or(Value::Null)
}

fn to_result<T: Serialize>(output: T) -> Result<Value, RpcError> {
    serde_json::to_value(output).map_err(|e| RpcError::Internal(e.to_string()))
}

/// JSON-RPC front end for a [`FaceIndex`].
#[derive(Clone)]
pub struct IndexServer {
    executor: MethodExecutor,
}

impl IndexServer {
    pub fn new(index: FaceIndex) -> Self {
        Self {
            executor: MethodExecutor::new(index),
        }
    }

    /// Serve stdin/stdout until end of input or Ctrl-C.
    pub async fn run_stdio(self) -> Result<()> {
        let reader = BufReader::new(stdin());
        let writer = stdout();

        // Callers wait for this marker before sending requests.
        eprintln!("READY");
        info!("Serving JSON-RPC on stdio");

        tokio::select! {
            served = self.serve(reader, writer) => served?,
            _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
        }
        Ok(())
    }

    /// Answer every request line from `reader` on `writer` until EOF.
    pub async fn serve<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let server = self.clone();
            let response = tokio::task::spawn_blocking(move || server.handle_line(&line)).await?;

            if let Some(response) = response {
                let mut out = serde_json::to_vec(&response)?;
                out.push(b'\n');
                writer.write_all(&out).await?;
                writer.flush().await?;
            }
        }
        debug!("End of input");
        Ok(())
    }

    /// Handle one raw line. Blank lines produce no response.
    pub fn handle_line(&self, line: &str) -> Option<RpcResponse> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Unparseable request line");
                return Some(RpcResponse::failure(
                    Value::Null,
                    &RpcError::Parse(e.to_string()),
                ));
            }
        };

        match RpcRequest::from_value(value) {
            Ok(request) => Some(self.handle_request(request)),
            Err((id, e)) => {
                warn!(id = %id, code = e.code(), error = %e, "Malformed request");
                Some(RpcResponse::failure(id, &e))
            }
        }
    }

    pub fn handle_request(&self, request: RpcRequest) -> RpcResponse {
        debug!(method = %request.method, id = %request.id, "Handling request");
        match self.dispatch(&request.method, request.params) {
            Ok(result) => RpcResponse::success(request.id, result),
            Err(e) => {
                warn!(method = %request.method, code = e.code(), error = %e, "Request failed");
                RpcResponse::failure(request.id, &e)
            }
        }
    }

    fn dispatch(&self, name: &str, params: Value) -> Result<Value, RpcError> {
        let method =
            Method::from_name(name).ok_or_else(|| RpcError::MethodNotFound(name.to_string()))?;

        match method {
            Method::AddVector => {
                to_result(self.executor.add_vector(serde_json::from_value(params)?)?)
            }
            Method::SearchSimilar => {
                to_result(self.executor.search_similar(serde_json::from_value(params)?)?)
            }
            Method::CheckDuplicate => {
                to_result(self.executor.check_duplicate(serde_json::from_value(params)?)?)
            }
            Method::RemoveVector => {
                to_result(self.executor.remove_vector(serde_json::from_value(params)?)?)
            }
            Method::RebuildFromDatabase => to_result(
                self.executor
                    .rebuild_from_database(serde_json::from_value(params)?)?,
            ),
            Method::GetStats => to_result(self.executor.get_stats()?),
            Method::Describe => to_result(describe()),
        }
    }
}

fn describe() -> DescribeResult {
    DescribeResult {
        methods: Method::ALL
            .into_iter()
            .map(|m| MethodInfo {
                name: m.name().to_string(),
                aliases: m.aliases().iter().map(|a| a.to_string()).collect(),
                description: m.description().to_string(),
                params: m.params_schema(),
            })
            .collect(),
    }
}
