//! Streaming assembly of matched elements
//!
//! - `assembler`: [`XmlStream`], the event loop
//! - `frame`: open-element frames, [`Context`] and [`Trace`] views
//! - `text`: whitespace collapsing
//! - `value`: assembled value types
//! - `serialize`: XML output

pub mod assembler;
pub mod frame;
pub mod serialize;
pub mod text;
pub mod value;

pub use assembler::{Listener, Matched, Phase, XmlStream};
pub use frame::{Context, Trace};
pub use value::{Child, Element, Node, Value};
