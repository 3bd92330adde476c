//! Stream drivers
//!
//! - StreamReader: feeds an `XmlStream` from any `Read` source, honouring
//!   pause/resume

pub mod buffered;

pub use buffered::{StreamOptions, StreamReader};
