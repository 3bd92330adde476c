//! Core XML tokenizing primitives
//!
//! This module contains the building blocks the stream is fed by:
//! - Scanner: SIMD-accelerated delimiter detection using memchr
//! - Tokenizer: resumable push tokenizer producing start/end/text events
//! - Entities: XML entity decoding with Cow (zero-copy when possible), escaping
//! - Attributes: Attribute parsing and extraction

pub mod attributes;
pub mod entities;
pub mod scanner;
pub mod tokenizer;
