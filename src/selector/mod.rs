//! Selector matching
//!
//! - `parser`: selector strings and subscription names
//! - `automaton`: the shared NFA and its active-set stack
//! - `dispatch`: (category, state) hook table

pub mod automaton;
pub mod dispatch;
pub mod parser;

pub use automaton::{ActiveSet, Automaton, StateId};
pub use dispatch::Category;
pub use parser::{parse_event, EventKind, EventSpec, Selector};
