//! Elixir Term Conversion Utilities
//!
//! Converts assembled values to Elixir terms. Elements become maps with
//! reserved `"$"`-prefixed keys next to their children:
//!
//! - `"$name"`: tag name
//! - `"$"`: attribute map (omitted when empty)
//! - `"$text"`: text content (omitted when empty)
//! - `"$children"`: ordered node list (preserved elements only)
//!
//! Collected children are lists; scalar children are binaries.

use crate::error::StreamError;
use crate::resource::{MatchedEvent, StreamStatus};
use crate::stream::{Child, Element, Node, Phase, Value};
use rustler::{Encoder, Env, NewBinary, NifResult, Term};

// Pre-defined atoms for efficiency - created once at compile time
rustler::atoms! {
    ok,
    error,
    closed,
    open,
    finishing,
    ended,
    failed,
}

/// Convert a value to a term: binaries for text, maps for elements
pub fn value_to_term<'a>(env: Env<'a>, value: &Value) -> NifResult<Term<'a>> {
    match value {
        Value::Text(text) => Ok(str_to_binary(env, text)),
        Value::Element(element) => element_to_term(env, element),
    }
}

/// Convert an element to a map term
pub fn element_to_term<'a>(env: Env<'a>, element: &Element) -> NifResult<Term<'a>> {
    let mut pairs: Vec<(Term<'a>, Term<'a>)> = Vec::with_capacity(element.children.len() + 4);

    pairs.push((str_to_binary(env, "$name"), str_to_binary(env, &element.name)));

    if !element.attrs.is_empty() {
        let attrs: Vec<(Term<'a>, Term<'a>)> = element
            .attrs
            .iter()
            .map(|(name, value)| (str_to_binary(env, name), str_to_binary(env, value)))
            .collect();
        pairs.push((str_to_binary(env, "$"), Term::map_from_pairs(env, &attrs)?));
    }

    if !element.text.is_empty() {
        pairs.push((str_to_binary(env, "$text"), str_to_binary(env, &element.text)));
    }

    if let Some(nodes) = &element.nodes {
        let mut list = Term::list_new_empty(env);
        for node in nodes.iter().rev() {
            let term = match node {
                Node::Element(child) => element_to_term(env, child)?,
                Node::Text(text) => str_to_binary(env, text),
            };
            list = list.list_prepend(term);
        }
        pairs.push((str_to_binary(env, "$children"), list));
    }

    for (name, child) in &element.children {
        let term = match child {
            Child::One(value) => value_to_term(env, value)?,
            Child::Many(values) => {
                let mut list = Term::list_new_empty(env);
                for value in values.iter().rev() {
                    list = list.list_prepend(value_to_term(env, value)?);
                }
                list
            }
        };
        pairs.push((str_to_binary(env, name), term));
    }

    Term::map_from_pairs(env, &pairs)
}

/// Convert queued matches to a list of `{event_name, element}` tuples
pub fn events_to_term<'a>(env: Env<'a>, events: Vec<MatchedEvent>) -> NifResult<Term<'a>> {
    let mut list = Term::list_new_empty(env);
    for event in events.into_iter().rev() {
        let tuple = (
            str_to_binary(env, &event.event),
            element_to_term(env, &event.element)?,
        );
        list = list.list_prepend(tuple.encode(env));
    }
    Ok(list)
}

/// `{:error, message, line}`, or `{:error, :closed}` for a closed stream
pub fn error_to_term<'a>(env: Env<'a>, err: &StreamError) -> Term<'a> {
    match err {
        StreamError::Closed => (error(), closed()).encode(env),
        _ => (error(), str_to_binary(env, &err.to_string()), err.line()).encode(env),
    }
}

/// `:ok` or the error term
pub fn result_to_term<'a>(env: Env<'a>, result: Result<(), StreamError>) -> Term<'a> {
    match result {
        Ok(()) => ok().encode(env),
        Err(err) => error_to_term(env, &err),
    }
}

fn phase_to_term<'a>(env: Env<'a>, phase: Phase) -> Term<'a> {
    match phase {
        Phase::Open => open().encode(env),
        Phase::Finishing => finishing().encode(env),
        Phase::Ended => ended().encode(env),
        Phase::Failed => failed().encode(env),
    }
}

/// `{phase, available_events, output_bytes, paused, line}`
pub fn status_to_term<'a>(env: Env<'a>, status: StreamStatus) -> Term<'a> {
    (
        phase_to_term(env, status.phase),
        status.available,
        status.output_bytes,
        status.paused,
        status.line,
    )
        .encode(env)
}

/// Convert a string to a binary term (more efficient than .encode())
#[inline]
pub fn str_to_binary<'a>(env: Env<'a>, s: &str) -> Term<'a> {
    bytes_to_binary(env, s.as_bytes())
}

/// Create a binary from bytes
pub fn bytes_to_binary<'a>(env: Env<'a>, bytes: &[u8]) -> Term<'a> {
    let mut binary = NewBinary::new(env, bytes.len());
    binary.as_mut_slice().copy_from_slice(bytes);
    binary.into()
}
