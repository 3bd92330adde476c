//! XmlMatch - streaming, selector-driven XML matching
//!
//! Consumers register path-like selectors (`channel item`, `rss > channel`)
//! and receive the matching elements, assembled incrementally, while the
//! document streams through. Nothing outside the matched subtrees' shape is
//! kept in a DOM.
//!
//! Layers:
//! - core: push tokenizer (scanner, entities, attributes)
//! - selector: selector parsing, shared NFA, hook dispatch
//! - stream: frame stack, collect/preserve/buffer policy, re-serialization
//! - reader: `Read`-driven pump with pause/resume
//! - NIFs: `stream_*` functions over a ResourceArc

use rustler::{Binary, Env, NifResult, ResourceArc, Term};

pub mod core;
pub mod error;
pub mod reader;
mod resource;
pub mod selector;
pub mod stream;
mod term;

pub use error::StreamError;
pub use reader::{StreamOptions, StreamReader};
pub use stream::{Element, Matched, Value, XmlStream};

use resource::{StreamRef, StreamResource};
use term::{events_to_term, result_to_term, status_to_term, str_to_binary};

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Stream Setup
// ============================================================================

/// Create a new stream
#[rustler::nif]
fn stream_new() -> StreamRef {
    ResourceArc::new(StreamResource::new())
}

/// Subscribe to a selector event; false when the name is not one
#[rustler::nif]
fn stream_subscribe(stream: StreamRef, event: &str) -> bool {
    let mut inner = stream.inner.lock().unwrap();
    inner.subscribe(event)
}

/// Collect elements matching a selector into lists
#[rustler::nif]
fn stream_collect(stream: StreamRef, selector: &str) {
    let mut inner = stream.inner.lock().unwrap();
    inner.collect(selector);
}

/// Preserve document order (and optionally whitespace) below a selector
#[rustler::nif]
fn stream_preserve(stream: StreamRef, selector: &str, whitespace: bool) {
    let mut inner = stream.inner.lock().unwrap();
    inner.preserve(selector, whitespace);
}

/// Start accumulating pass-through XML output
#[rustler::nif]
fn stream_capture_output(stream: StreamRef) {
    let mut inner = stream.inner.lock().unwrap();
    inner.capture_output();
}

// ============================================================================
// Input and Control
// ============================================================================

/// Feed a chunk; returns :ok or {:error, message, line}
#[rustler::nif]
fn stream_feed<'a>(env: Env<'a>, stream: StreamRef, chunk: Binary) -> Term<'a> {
    let mut inner = stream.inner.lock().unwrap();
    result_to_term(env, inner.feed(chunk.as_slice()))
}

/// Signal end of input
#[rustler::nif]
fn stream_finish<'a>(env: Env<'a>, stream: StreamRef) -> Term<'a> {
    let mut inner = stream.inner.lock().unwrap();
    result_to_term(env, inner.finish())
}

#[rustler::nif]
fn stream_pause(stream: StreamRef) {
    let mut inner = stream.inner.lock().unwrap();
    inner.pause();
}

/// Resume delivery; buffered events are processed before returning
#[rustler::nif]
fn stream_resume<'a>(env: Env<'a>, stream: StreamRef) -> Term<'a> {
    let mut inner = stream.inner.lock().unwrap();
    result_to_term(env, inner.resume())
}

// ============================================================================
// Results
// ============================================================================

/// Take up to `max` queued matches as `{event_name, element_map}` tuples
#[rustler::nif]
fn stream_take_events<'a>(env: Env<'a>, stream: StreamRef, max: usize) -> NifResult<Term<'a>> {
    let mut inner = stream.inner.lock().unwrap();
    let events = inner.take_events(max);
    events_to_term(env, events)
}

/// Take the pass-through output produced so far
#[rustler::nif]
fn stream_take_output<'a>(env: Env<'a>, stream: StreamRef) -> Term<'a> {
    let mut inner = stream.inner.lock().unwrap();
    let output = inner.take_output();
    str_to_binary(env, &output)
}

/// Get stream status
#[rustler::nif]
fn stream_status<'a>(env: Env<'a>, stream: StreamRef) -> Term<'a> {
    let inner = stream.inner.lock().unwrap();
    status_to_term(env, inner.status())
}

// ============================================================================
// NIF Initialization
// ============================================================================

rustler::init!("Elixir.XmlMatch.Native");
