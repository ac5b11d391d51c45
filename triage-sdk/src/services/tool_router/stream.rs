//! Incremental event-stream decoding
//!
//! `EventDecoder` turns arbitrary byte chunks into complete events.
//! `FrameStream` pulls chunks from a response body, decodes them and hands
//! out `ProtocolFrame`s one at a time.

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use futures::{Stream, StreamExt};
use log::{debug, warn};
use serde_json::Value;

use super::models::ProtocolFrame;
use crate::error::{Result, ServiceError};
use crate::util::{sanitize_for_logging, truncate_string};

/// Data value that ends the stream
pub const TERMINAL_MARKER: &str = "[DONE]";

/// A complete event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`
    pub data: String,
}

/// Byte-level event decoder. Keeps partial lines between calls to `feed`.
#[derive(Debug, Default)]
pub struct EventDecoder {
    line: Vec<u8>,
    /// Previous chunk ended on `\r`; a leading `\n` belongs to that line break
    skip_lf: bool,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl EventDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the events it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.end_line(&mut events);
                    self.skip_lf = true;
                }
                _ => self.line.push(byte),
            }
        }

        events
    }

    /// Flush whatever is buffered at end of stream
    pub fn finish(&mut self) -> Option<SseEvent> {
        if !self.line.is_empty() {
            let mut unused = Vec::new();
            self.end_line(&mut unused);
        }
        self.skip_lf = false;

        self.dispatch()
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let line = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();

        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };

        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id and retry carry nothing the client uses
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data_lines.is_empty() {
            return None;
        }

        let data = self.data_lines.join("\n");
        self.data_lines.clear();
        Some(SseEvent { event, data })
    }
}

/// Interpret one event's data.
///
/// Fails only when the data is neither the terminal marker nor JSON.
pub fn classify_event(data: &str) -> std::result::Result<ProtocolFrame, serde_json::Error> {
    let data = data.trim();
    if data == TERMINAL_MARKER {
        return Ok(ProtocolFrame::Terminal);
    }

    let value: Value = serde_json::from_str(data)?;
    Ok(classify_value(value))
}

pub(crate) fn classify_value(value: Value) -> ProtocolFrame {
    let has_error = value.get("error").map_or(false, |e| !e.is_null());
    let result_is_error = value
        .pointer("/result/isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    if has_error || result_is_error {
        return ProtocolFrame::Error(value);
    }

    if let Some(result) = value.get("result").filter(|r| !r.is_null()) {
        return ProtocolFrame::Result(result.clone());
    }

    if let Some(content) = value.get("content").filter(|c| !c.is_null()) {
        return ProtocolFrame::Result(content.clone());
    }

    ProtocolFrame::Unrecognized(value)
}

/// Pull-based frame source over a byte stream.
///
/// Lazy, finite and not restartable: once it yields `None` or an error it
/// stays exhausted.
pub struct FrameStream<S> {
    body: S,
    decoder: EventDecoder,
    pending: VecDeque<SseEvent>,
    idle_timeout: Duration,
    exhausted: bool,
    bytes_received: usize,
    frames_consumed: usize,
    malformed_events: usize,
}

impl<S, B, E> FrameStream<S>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: Display,
{
    pub fn new(body: S, idle_timeout: Duration) -> Self {
        Self {
            body,
            decoder: EventDecoder::new(),
            pending: VecDeque::new(),
            idle_timeout,
            exhausted: false,
            bytes_received: 0,
            frames_consumed: 0,
            malformed_events: 0,
        }
    }

    /// Frames handed out so far, the terminal marker included
    pub fn frames_consumed(&self) -> usize {
        self.frames_consumed
    }

    /// Events skipped because their data was not JSON
    pub fn malformed_events(&self) -> usize {
        self.malformed_events
    }

    /// Next frame, `None` at end of stream.
    ///
    /// Malformed events are logged and skipped. A read error or a read that
    /// waits longer than the idle timeout ends the stream with `RpcTransport`,
    /// as does a body that ends before its first byte.
    pub async fn next_frame(&mut self) -> Option<Result<ProtocolFrame>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                match classify_event(&event.data) {
                    Ok(frame) => {
                        self.frames_consumed += 1;
                        if frame == ProtocolFrame::Terminal {
                            debug!("Terminal marker after {} frames", self.frames_consumed);
                            self.exhausted = true;
                            self.pending.clear();
                        }
                        return Some(Ok(frame));
                    }
                    Err(e) => {
                        self.malformed_events += 1;
                        warn!(
                            "Skipping malformed event ({}): {}",
                            e,
                            sanitize_for_logging(&truncate_string(&event.data, 200))
                        );
                        continue;
                    }
                }
            }

            if self.exhausted {
                return None;
            }

            match tokio::time::timeout(self.idle_timeout, self.body.next()).await {
                Ok(Some(Ok(chunk))) => {
                    self.bytes_received += chunk.as_ref().len();
                    let events = self.decoder.feed(chunk.as_ref());
                    self.pending.extend(events);
                }
                Ok(Some(Err(e))) => {
                    self.exhausted = true;
                    return Some(Err(ServiceError::rpc_transport(format!(
                        "Event stream read failed: {}",
                        e
                    ))));
                }
                Ok(None) => {
                    self.exhausted = true;
                    if self.bytes_received == 0 {
                        return Some(Err(ServiceError::rpc_transport("Event stream body was empty")));
                    }
                    if let Some(event) = self.decoder.finish() {
                        self.pending.push_back(event);
                    }
                }
                Err(_) => {
                    self.exhausted = true;
                    return Some(Err(ServiceError::rpc_transport(format!(
                        "Event stream stalled for more than {}s",
                        self.idle_timeout.as_secs()
                    ))));
                }
            }
        }
    }
}
