//! Script execution seam for javascript nodes.
//!
//! The runner never embeds a JS engine. It hands the node's code and
//! the flattened scope to a [`JsExecutor`], and the production
//! implementation ships both to an external worker over a unix socket
//! as newline-delimited JSON. One connection per call: the request is
//! a single line, the response is a single line, and dropping the
//! future mid-call (timeout, flow stop) just closes the connection.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

/// Environment variable naming the worker socket path.
pub const WORKER_SOCKET_ENV: &str = "WORKER_SOCKET_PATH";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JsError {
    #[error("failed to connect to js worker at {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("js worker io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("js worker protocol error: {message}")]
    Protocol { message: String },

    /// The script itself threw; the node fails but the worker is fine.
    #[error("script error: {message}")]
    Script { message: String },
}

/// Executes a javascript node's code against an evaluation context.
#[async_trait]
pub trait JsExecutor: Send + Sync {
    /// Run `code` with `context` bound as the script's environment and
    /// return whatever the script evaluates to.
    async fn execute(&self, code: &str, context: &Value) -> Result<Value, JsError>;
}

// ---------------------------------------------------------------------------
// Wire frames
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WorkerRequest<'a> {
    code: &'a str,
    context: &'a Value,
}

#[derive(Debug, Deserialize)]
struct WorkerResponse {
    ok: bool,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

// ---------------------------------------------------------------------------
// Socket executor
// ---------------------------------------------------------------------------

/// Talks to the external worker process over a unix socket.
pub struct SocketJsExecutor {
    path: PathBuf,
}

impl SocketJsExecutor {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the socket path from `WORKER_SOCKET_PATH`.
    pub fn from_env() -> Option<Self> {
        std::env::var(WORKER_SOCKET_ENV).ok().map(Self::new)
    }
}

#[async_trait]
impl JsExecutor for SocketJsExecutor {
    async fn execute(&self, code: &str, context: &Value) -> Result<Value, JsError> {
        let stream = UnixStream::connect(&self.path)
            .await
            .map_err(|source| JsError::Connect {
                path: self.path.clone(),
                source,
            })?;
        let (read_half, mut write_half) = stream.into_split();

        let mut frame = serde_json::to_vec(&WorkerRequest { code, context }).map_err(|e| {
            JsError::Protocol {
                message: format!("failed to encode request: {e}"),
            }
        })?;
        frame.push(b'\n');
        write_half.write_all(&frame).await?;
        write_half.shutdown().await?;

        let mut line = String::new();
        let mut reader = BufReader::new(read_half);
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(JsError::Protocol {
                message: "worker closed connection without a response".into(),
            });
        }

        let response: WorkerResponse =
            serde_json::from_str(line.trim_end()).map_err(|e| JsError::Protocol {
                message: format!("malformed worker response: {e}"),
            })?;
        if response.ok {
            Ok(response.result.unwrap_or(Value::Null))
        } else {
            Err(JsError::Script {
                message: response
                    .error
                    .unwrap_or_else(|| "script failed without a message".into()),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Mock executor
// ---------------------------------------------------------------------------

/// In-process stand-in for tests: returns queued results in order and
/// records every call it receives.
#[derive(Default)]
pub struct MockJsExecutor {
    results: parking_lot::Mutex<std::collections::VecDeque<Result<Value, String>>>,
    calls: parking_lot::Mutex<Vec<(String, Value)>>,
}

impl MockJsExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, result: Value) {
        self.results.lock().push_back(Ok(result));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.results.lock().push_back(Err(message.into()));
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl JsExecutor for MockJsExecutor {
    async fn execute(&self, code: &str, context: &Value) -> Result<Value, JsError> {
        self.calls.lock().push((code.to_string(), context.clone()));
        match self.results.lock().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(JsError::Script { message }),
            // Unscripted calls succeed with null, matching a script
            // that returns nothing.
            None => Ok(Value::Null),
        }
    }
}
