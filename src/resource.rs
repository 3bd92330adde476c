//! ResourceArc Wrappers
//!
//! Persistent state for streams driven from the BEAM. Listeners cannot call
//! back into Elixir, so matched elements, pass-through output and the
//! terminal outcome are queued in an outbox and taken by later NIF calls.

use crate::error::StreamError;
use crate::stream::{Element, Phase, XmlStream};
use rustler::ResourceArc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// A selector match queued for the BEAM side
#[derive(Debug, Clone)]
pub struct MatchedEvent {
    /// Canonical event name, e.g. `endElement: channel item`
    pub event: String,
    pub element: Element,
}

/// What listeners produced since the last take
#[derive(Debug, Default)]
struct Outbox {
    events: VecDeque<MatchedEvent>,
    output: String,
    ended: bool,
    error: Option<String>,
}

type SharedOutbox = Arc<Mutex<Outbox>>;

fn with_outbox<T>(outbox: &SharedOutbox, f: impl FnOnce(&mut Outbox) -> T) -> T {
    let mut guard = outbox.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Stream plus the queues its listeners write to
pub struct QueuedStream {
    stream: XmlStream,
    outbox: SharedOutbox,
    capturing: bool,
}

/// Snapshot returned by `stream_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub available: usize,
    pub output_bytes: usize,
    pub paused: bool,
    pub phase: Phase,
    pub line: usize,
}

impl QueuedStream {
    pub fn new() -> Self {
        let outbox = SharedOutbox::default();
        let mut stream = XmlStream::new();

        let sink = Arc::clone(&outbox);
        stream.on_end(move || with_outbox(&sink, |o| o.ended = true));
        let sink = Arc::clone(&outbox);
        stream.on_error(move |err| with_outbox(&sink, |o| o.error = Some(err.to_string())));

        QueuedStream {
            stream,
            outbox,
            capturing: false,
        }
    }

    /// Queue a snapshot of every element matching `event`. Returns `false`
    /// for names that are not selector events.
    pub fn subscribe(&mut self, event: &str) -> bool {
        let sink = Arc::clone(&self.outbox);
        self.stream.on(event, move |m| {
            let matched = MatchedEvent {
                event: m.event.to_string(),
                element: m.element.clone(),
            };
            with_outbox(&sink, |o| o.events.push_back(matched));
        })
    }

    pub fn collect(&mut self, selector: &str) {
        self.stream.collect(selector);
    }

    pub fn preserve(&mut self, selector: &str, whitespace: bool) {
        self.stream.preserve(selector, whitespace);
    }

    /// Start accumulating pass-through output; idempotent
    pub fn capture_output(&mut self) {
        if self.capturing {
            return;
        }
        self.capturing = true;
        let sink = Arc::clone(&self.outbox);
        self.stream
            .on_data(move |fragment| with_outbox(&sink, |o| o.output.push_str(fragment)));
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Result<(), StreamError> {
        self.stream.feed(chunk)
    }

    pub fn finish(&mut self) -> Result<(), StreamError> {
        self.stream.finish()
    }

    pub fn pause(&mut self) {
        self.stream.pause();
    }

    pub fn resume(&mut self) -> Result<(), StreamError> {
        self.stream.resume()
    }

    /// Take up to `max` queued matches
    pub fn take_events(&mut self, max: usize) -> Vec<MatchedEvent> {
        with_outbox(&self.outbox, |o| {
            let count = max.min(o.events.len());
            o.events.drain(..count).collect()
        })
    }

    /// Take the output produced so far
    pub fn take_output(&mut self) -> String {
        with_outbox(&self.outbox, |o| std::mem::take(&mut o.output))
    }

    /// Error message reported through the error listener, if any
    pub fn error(&self) -> Option<String> {
        with_outbox(&self.outbox, |o| o.error.clone())
    }

    pub fn has_ended(&self) -> bool {
        with_outbox(&self.outbox, |o| o.ended)
    }

    pub fn status(&self) -> StreamStatus {
        let (available, output_bytes) =
            with_outbox(&self.outbox, |o| (o.events.len(), o.output.len()));
        StreamStatus {
            available,
            output_bytes,
            paused: self.stream.is_paused(),
            phase: self.stream.phase(),
            line: self.stream.line(),
        }
    }
}

impl Default for QueuedStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Wrapper for QueuedStream that can be stored in a ResourceArc
pub struct StreamResource {
    pub inner: Mutex<QueuedStream>,
}

impl StreamResource {
    pub fn new() -> Self {
        StreamResource {
            inner: Mutex::new(QueuedStream::new()),
        }
    }
}

#[rustler::resource_impl]
impl rustler::Resource for StreamResource {}

impl Default for StreamResource {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for the ResourceArc
pub type StreamRef = ResourceArc<StreamResource>;
