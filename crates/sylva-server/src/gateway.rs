//! Socket listener and connection handling.
//!
//! Connections are accepted concurrently up to a semaphore limit; each one
//! reads length-framed JSON-RPC requests in order and writes responses in
//! the same order. Notifications (requests without an id) are processed
//! but never answered.

use std::sync::Arc;
use std::time::Duration;

use sylva_core::{ErrorCode, RpcError, RpcRequest, RpcResponse};
use sylva_error::{Error, OperationalError};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;

use crate::context::ServerContext;
use crate::dispatch::dispatch;
use crate::framing::{read_frame, write_frame};

pub struct Gateway {
    ctx: Arc<ServerContext>,
}

impl Gateway {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// Accept loop. Runs until the listener errors or the task is dropped.
    pub async fn run(self, listener: UnixListener) {
        let climit = Arc::new(Semaphore::new(self.ctx.config.max_connections));
        loop {
            let permit = match Arc::clone(&climit).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let _permit = permit;
                        if let Err(e) = handle_connection(ctx, stream).await {
                            tracing::debug!("connection closed with error: {e}");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("accept failed: {e}");
                    break;
                }
            }
        }
    }
}

async fn handle_connection(
    ctx: Arc<ServerContext>,
    stream: UnixStream,
) -> sylva_error::Result<()> {
    let (mut reader, mut writer) = stream.into_split();
    let max_frame = ctx.config.max_frame_bytes;

    while let Some(payload) = read_frame(&mut reader, max_frame).await? {
        if let Some(response) = process_payload(Arc::clone(&ctx), &payload).await {
            let bytes = serde_json::to_vec(&response)
                .map_err(|e| Error::internal(format!("response serialization failed: {e}")))?;
            write_frame(&mut writer, &bytes).await?;
        }
    }
    Ok(())
}

/// Decode one frame, dispatch it, and build the response. `None` for
/// notifications.
///
/// Dispatch runs on its own task: a deadline answers the client with
/// `timeout`, but in-progress work completes in the background and its
/// result is discarded, so a half-finished pipeline can still run its own
/// rollback.
pub async fn process_payload(ctx: Arc<ServerContext>, payload: &[u8]) -> Option<RpcResponse> {
    let request: RpcRequest = match serde_json::from_slice(payload) {
        Ok(request) => request,
        Err(e) => {
            return Some(RpcResponse::failure(
                None,
                RpcError {
                    code: ErrorCode::InvalidRequest,
                    message: format!("malformed request: {e}"),
                    data: None,
                },
            ));
        }
    };

    let RpcRequest {
        method, params, id, ..
    } = request;

    let deadline_ms = params.get("timeout_ms").and_then(serde_json::Value::as_u64);
    let task = tokio::spawn(async move { dispatch(&ctx, &method, params).await });
    let outcome = match deadline_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), task).await {
            Ok(joined) => unwrap_join(joined),
            Err(_) => Error::from(OperationalError::Timeout {
                seconds: ms.div_ceil(1000),
            })
            .to_outcome(),
        },
        None => unwrap_join(task.await),
    };

    match id {
        Some(id) => Some(outcome.into_response(Some(id))),
        None => None,
    }
}

fn unwrap_join(
    joined: Result<sylva_core::HandlerOutcome, tokio::task::JoinError>,
) -> sylva_core::HandlerOutcome {
    joined.unwrap_or_else(|e| Error::internal(format!("handler task failed: {e}")).to_outcome())
}
