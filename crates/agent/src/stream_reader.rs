//! Streaming reader.
//!
//! Consumes the inference event stream, splits visible text from think
//! spans, and stops early when the cancellation token fires.
//!
//! A marker may arrive split across two chunks, so the last `lookback`
//! characters of the buffer are always held back until more text (or the
//! end of the stream) shows whether they start a marker.

use llmcode_core::provider::{EventStream, StreamEvent, Usage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::stream_event::{AgentEvent, EventSink};

pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";
pub const DEFAULT_LOOKBACK: usize = 10;

/// A run of demultiplexed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Visible(String),
    Thinking(String),
}

impl Segment {
    fn new(thinking: bool, text: &str) -> Self {
        if thinking {
            Self::Thinking(text.to_string())
        } else {
            Self::Visible(text.to_string())
        }
    }

    fn into_event(self) -> AgentEvent {
        match self {
            Self::Visible(content) => AgentEvent::Text { content },
            Self::Thinking(content) => AgentEvent::Thinking { content },
        }
    }
}

/// Incremental think-span demultiplexer.
#[derive(Debug)]
pub struct ThinkDemux {
    lookback: usize,
    in_think: bool,
    buffer: String,
}

impl ThinkDemux {
    /// `lookback` is raised to the closing marker's length if smaller, or
    /// a split marker could leak out as text.
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(THINK_CLOSE.len()),
            in_think: false,
            buffer: String::new(),
        }
    }

    pub fn in_think(&self) -> bool {
        self.in_think
    }

    /// Feed one chunk; returns the segments that are now safe to show.
    pub fn push(&mut self, chunk: &str) -> Vec<Segment> {
        self.buffer.push_str(chunk);
        let mut out = Vec::new();

        loop {
            let marker = if self.in_think { THINK_CLOSE } else { THINK_OPEN };
            if let Some(pos) = self.buffer.find(marker) {
                if pos > 0 {
                    out.push(Segment::new(self.in_think, &self.buffer[..pos]));
                }
                self.buffer.drain(..pos + marker.len());
                self.in_think = !self.in_think;
                continue;
            }

            let held = self.buffer.chars().count();
            if held > self.lookback
                && let Some((cut, _)) = self.buffer.char_indices().nth(held - self.lookback)
            {
                out.push(Segment::new(self.in_think, &self.buffer[..cut]));
                self.buffer.drain(..cut);
            }
            break;
        }

        out
    }

    /// Flush whatever is held back, styled by the current mode.
    pub fn finish(&mut self) -> Option<Segment> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        Some(Segment::new(self.in_think, &rest))
    }
}

/// How one streamed model call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    /// The stream finished. `text` is the full raw response, think spans
    /// and markers included.
    Completed { text: String, usage: Option<Usage> },

    /// The token fired before the stream finished. `text` is the raw
    /// response received so far; the held-back tail has been shown.
    Cancelled { text: String },

    /// An `error` event or a transport failure.
    Failed { text: String, message: String },
}

impl StreamOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Completed { text, .. } | Self::Cancelled { text } | Self::Failed { text, .. } => {
                text
            }
        }
    }
}

pub struct StreamReader {
    lookback: usize,
}

impl StreamReader {
    pub fn new(lookback: usize) -> Self {
        Self { lookback }
    }

    /// Drain `events`, forwarding text and thinking to `sink`.
    pub async fn read(
        &self,
        mut events: EventStream,
        cancel: &CancellationToken,
        sink: &dyn EventSink,
    ) -> StreamOutcome {
        let mut demux = ThinkDemux::new(self.lookback);
        let mut text = String::new();

        let flush = |demux: &mut ThinkDemux| {
            if let Some(segment) = demux.finish() {
                sink.emit(segment.into_event());
            }
        };

        loop {
            if cancel.is_cancelled() {
                debug!(chars = text.len(), "Stream cancelled");
                flush(&mut demux);
                return StreamOutcome::Cancelled { text };
            }

            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(chars = text.len(), "Stream cancelled");
                    flush(&mut demux);
                    return StreamOutcome::Cancelled { text };
                }
                next = events.recv() => next,
            };

            match next {
                Some(Ok(StreamEvent::Token { content })) => {
                    text.push_str(&content);
                    for segment in demux.push(&content) {
                        sink.emit(segment.into_event());
                    }
                }
                Some(Ok(StreamEvent::Done { usage })) => {
                    flush(&mut demux);
                    return StreamOutcome::Completed { text, usage };
                }
                Some(Ok(StreamEvent::Error { message, code })) => {
                    debug!(%message, ?code, "Server reported a stream error");
                    flush(&mut demux);
                    return StreamOutcome::Failed { text, message };
                }
                Some(Ok(StreamEvent::Start { request_id })) => {
                    trace!(?request_id, "Stream started");
                }
                Some(Err(e)) => {
                    flush(&mut demux);
                    return StreamOutcome::Failed {
                        text,
                        message: e.to_string(),
                    };
                }
                // The sender went away without a terminal event
                None => {
                    flush(&mut demux);
                    return StreamOutcome::Completed { text, usage: None };
                }
            }
        }
    }
}

impl Default for StreamReader {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKBACK)
    }
}
