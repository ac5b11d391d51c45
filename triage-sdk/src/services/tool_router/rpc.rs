//! Streaming JSON-RPC client
//!
//! Posts one JSON-RPC envelope and consumes the event-stream response to the
//! end, keeping the first result it sees.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use log::{debug, warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;

use super::models::{JsonRpcRequest, ProtocolFrame, ResultConfidence, RpcResult};
use super::stream::{classify_event, FrameStream};
use crate::config::{ServiceConfig, ToolRouterConfig};
use crate::core::ServiceClient;
use crate::error::{Result, ServiceError};
use crate::services::common::{build_http_client, ClientMetrics, UserAgent};
use crate::util::{sanitize_for_logging, truncate_string};

const ACCEPT_STREAM: &str = "application/json, text/event-stream";

/// Folds frames into an `RpcResult`
#[derive(Debug, Default)]
pub(crate) struct FrameDrain {
    first_result: Option<Value>,
    last_event: Option<Value>,
    frames: usize,
}

impl FrameDrain {
    /// Accept one frame. Returns `Ok(false)` once the terminal marker is seen.
    pub(crate) fn accept(&mut self, frame: ProtocolFrame) -> Result<bool> {
        self.frames += 1;
        match frame {
            ProtocolFrame::Result(payload) => {
                if self.first_result.is_none() {
                    self.first_result = Some(payload.clone());
                } else {
                    debug!("Ignoring additional result frame");
                }
                self.last_event = Some(payload);
                Ok(true)
            }
            ProtocolFrame::Error(payload) => {
                if self.first_result.is_some() {
                    warn!("Error frame arrived after a result; failing the call");
                }
                Err(ServiceError::rpc_remote(payload))
            }
            ProtocolFrame::Unrecognized(payload) => {
                self.last_event = Some(payload);
                Ok(true)
            }
            ProtocolFrame::Terminal => Ok(false),
        }
    }

    pub(crate) fn finish(self, malformed_events: usize) -> Result<RpcResult> {
        if let Some(payload) = self.first_result {
            return Ok(RpcResult {
                payload,
                confidence: ResultConfidence::Explicit,
                frames_consumed: self.frames,
                malformed_events,
            });
        }

        match self.last_event {
            Some(payload) => {
                warn!("No explicit result in {} frames; using the last event", self.frames);
                Ok(RpcResult {
                    payload,
                    confidence: ResultConfidence::LastEventFallback,
                    frames_consumed: self.frames,
                    malformed_events,
                })
            }
            None => Err(ServiceError::rpc_no_result(format!(
                "Stream ended without a decodable event ({} malformed)",
                malformed_events
            ))),
        }
    }
}

/// Drain a frame stream to the end (or the terminal marker)
pub async fn drain_frames<S, B, E>(frames: &mut FrameStream<S>) -> Result<RpcResult>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut drain = FrameDrain::default();

    while let Some(frame) = frames.next_frame().await {
        if !drain.accept(frame?)? {
            break;
        }
    }

    drain.finish(frames.malformed_events())
}

/// The RPC operations the resolver and the discovery backend depend on
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RpcCaller: Send + Sync {
    async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<RpcResult>;
}

/// JSON-RPC over HTTP with event-stream responses
pub struct StreamingRpcClient {
    http_client: Client,
    config: ToolRouterConfig,
    metrics: ClientMetrics,
}

impl StreamingRpcClient {
    pub fn new(config: ToolRouterConfig) -> Result<Self> {
        // Streams may run long; reads are bounded by the idle timeout instead
        let http_client = build_http_client(Some(UserAgent::for_client("Tool-Router-RPC")), None)?;

        Ok(Self {
            http_client,
            config,
            metrics: ClientMetrics::new(),
        })
    }

    fn idle_timeout(&self) -> Duration {
        self.config.stream_idle_timeout()
    }

    async fn call_inner(&self, endpoint: &str, request: &JsonRpcRequest) -> Result<RpcResult> {
        let send = self
            .http_client
            .post(endpoint)
            .header("x-api-key", &self.config.api_key)
            .header(ACCEPT, ACCEPT_STREAM)
            .json(request)
            .send();

        let response = tokio::time::timeout(self.config.timeout(), send)
            .await
            .map_err(|_| {
                ServiceError::rpc_transport(format!(
                    "{} got no response within {}s",
                    request.method,
                    self.config.timeout().as_secs()
                ))
            })?
            .map_err(|e| ServiceError::rpc_transport(ServiceError::from(e).to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::rpc_transport(format!(
                "{} returned {}: {}",
                request.method,
                status,
                sanitize_for_logging(&truncate_string(&body, 200))
            )));
        }

        if response.content_length() == Some(0) {
            return Err(ServiceError::rpc_transport(format!(
                "{} returned an empty body",
                request.method
            )));
        }

        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map_or(true, |v| v.starts_with("text/event-stream"));

        if !is_event_stream {
            return self.read_single_message(response).await;
        }

        let body = Box::pin(response.bytes_stream().map(|chunk| chunk.map_err(|e| e.without_url())));
        let mut frames = FrameStream::new(body, self.idle_timeout());
        drain_frames(&mut frames).await
    }

    /// Plain JSON answer instead of a stream; treated as a single event
    async fn read_single_message(&self, response: reqwest::Response) -> Result<RpcResult> {
        let body = tokio::time::timeout(self.idle_timeout(), response.text())
            .await
            .map_err(|_| ServiceError::rpc_transport("Timed out reading response body"))?
            .map_err(|e| ServiceError::rpc_transport(ServiceError::from(e).to_string()))?;

        let mut drain = FrameDrain::default();
        let malformed = match classify_event(&body) {
            Ok(frame) => {
                drain.accept(frame)?;
                0
            }
            Err(e) => {
                warn!("Response body is not JSON: {}", e);
                1
            }
        };
        drain.finish(malformed)
    }
}

#[async_trait]
impl RpcCaller for StreamingRpcClient {
    async fn call(&self, endpoint: &str, method: &str, params: Value) -> Result<RpcResult> {
        self.config.validate()?;

        let request = JsonRpcRequest::new(method, params);
        debug!("JSON-RPC {} ({}) -> {}", request.method, request.id, endpoint);

        let start_time = Instant::now();
        let result = self.call_inner(endpoint, &request).await;
        self.metrics.record(result.is_ok(), start_time.elapsed());

        match &result {
            Ok(rpc) => debug!(
                "JSON-RPC {} finished: {} frames, {} malformed, {:?}",
                request.id, rpc.frames_consumed, rpc.malformed_events, rpc.confidence
            ),
            Err(e) => warn!("JSON-RPC {} failed: {}", request.id, e),
        }

        result
    }
}

#[async_trait]
impl ServiceClient for StreamingRpcClient {
    fn name(&self) -> &str {
        "tool_router_rpc"
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.validate().is_ok())
    }

    fn metrics(&self) -> Option<HashMap<String, String>> {
        Some(self.metrics.as_map())
    }
}
