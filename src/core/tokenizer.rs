//! XML Tokenizer - resumable push tokenizer
//!
//! Bytes are appended with [`Tokenizer::feed`] in arbitrarily sized chunks and
//! events are pulled one at a time with [`Tokenizer::next_event`]. A token
//! that is not complete in the buffer yet yields `Ok(None)` and is retried
//! after the next chunk, so feeding a document in one chunk or many produces
//! the same event sequence.
//!
//! Only the three events the matcher consumes are produced:
//! - Element start (self-closing tags produce a start and an end)
//! - Element end
//! - Text (entity-decoded; CDATA sections are delivered verbatim)
//!
//! Comments, processing instructions, the XML declaration and DOCTYPE are
//! consumed and dropped. Well-formedness problems the matcher depends on
//! (mismatched tags, junk after the root, truncated input) are reported with
//! the line they were found on.

use super::attributes::{parse_attributes, Attribute};
use super::entities::decode_text;
use super::scanner::{count_lines, is_whitespace, Scanner};
use crate::error::StreamError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const INVALID_TOKEN: &str = "not well-formed (invalid token)";

/// Tokenizer output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    StartElement {
        name: String,
        attributes: Vec<Attribute>,
    },
    EndElement {
        name: String,
    },
    Text(String),
}

/// Outcome of one scan step
enum Step {
    Event(XmlEvent),
    Skipped,
    NeedMoreInput,
}

/// Resumable XML tokenizer
pub struct Tokenizer {
    /// Unconsumed input; bytes before `pos` are drained on the next feed
    buffer: Vec<u8>,
    pos: usize,
    /// 1-based line of `buffer[pos]`
    line: usize,
    /// Names of currently open elements
    open: Vec<String>,
    /// End event owed for a self-closing tag
    pending_end: Option<String>,
    seen_root: bool,
    bom_checked: bool,
    end_of_stream: bool,
    failed: bool,
}

impl Tokenizer {
    pub fn new() -> Self {
        Self::with_capacity(8192)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Tokenizer {
            buffer: Vec::with_capacity(capacity),
            pos: 0,
            line: 1,
            open: Vec::with_capacity(32),
            pending_end: None,
            seen_root: false,
            bom_checked: false,
            end_of_stream: false,
            failed: false,
        }
    }

    /// Append a chunk of input
    pub fn feed(&mut self, chunk: &[u8]) {
        assert!(
            !self.end_of_stream,
            "Tokenizer::feed called after finish(); this violates end-of-stream contract"
        );
        if self.pos > 0 {
            self.buffer.drain(..self.pos);
            self.pos = 0;
        }
        self.buffer.extend_from_slice(chunk);
    }

    /// Mark the end of input. Buffered bytes are still tokenized by later
    /// `next_event` calls; a construct left incomplete becomes an error.
    pub fn finish(&mut self) {
        self.end_of_stream = true;
    }

    /// Current input line
    pub fn line(&self) -> usize {
        self.line
    }

    /// Number of currently open elements
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Bytes fed but not yet tokenized
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.pos
    }

    /// Whether `finish` was called and every event was delivered
    pub fn is_done(&self) -> bool {
        self.end_of_stream && self.pending_end.is_none() && self.pos >= self.buffer.len()
    }

    /// Pull the next event.
    ///
    /// `Ok(None)` means more input is needed (or, after `finish`, that the
    /// document is complete).
    ///
    /// # Errors
    ///
    /// The first well-formedness or encoding failure is returned once; every
    /// later call answers [`StreamError::Closed`].
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>, StreamError> {
        if self.failed {
            return Err(StreamError::Closed);
        }
        if let Some(name) = self.pending_end.take() {
            return Ok(Some(XmlEvent::EndElement { name }));
        }

        match self.pump() {
            Ok(event) => Ok(event),
            Err(err) => {
                self.failed = true;
                log::debug!(target: "xmlmatch.tokenizer", "tokenizer failed: {err}");
                Err(err)
            }
        }
    }

    fn pump(&mut self) -> Result<Option<XmlEvent>, StreamError> {
        if !self.bom_checked {
            let rest = &self.buffer[self.pos..];
            if rest.len() < UTF8_BOM.len() && UTF8_BOM.starts_with(rest) && !self.end_of_stream {
                return Ok(None);
            }
            if rest.starts_with(UTF8_BOM) {
                self.pos += UTF8_BOM.len();
            }
            self.bom_checked = true;
        }

        loop {
            if self.pos >= self.buffer.len() {
                if self.end_of_stream && (!self.seen_root || !self.open.is_empty()) {
                    return Err(StreamError::syntax("no element found", self.line));
                }
                return Ok(None);
            }

            match self.step()? {
                Step::Event(event) => return Ok(Some(event)),
                Step::Skipped => continue,
                Step::NeedMoreInput if self.end_of_stream => {
                    return Err(StreamError::syntax("unclosed token", self.line));
                }
                Step::NeedMoreInput => return Ok(None),
            }
        }
    }

    /// Advance past `n` bytes, keeping the line count current
    fn consume(&mut self, n: usize) {
        self.line += count_lines(&self.buffer[self.pos..self.pos + n]);
        self.pos += n;
    }

    fn step(&mut self) -> Result<Step, StreamError> {
        if self.buffer[self.pos] == b'<' {
            self.step_markup()
        } else {
            self.step_text()
        }
    }

    fn step_markup(&mut self) -> Result<Step, StreamError> {
        let line = self.line;
        let sc = Scanner::new(&self.buffer[self.pos..]);

        if self.buffered() < 2 || sc.is_prefix_of(b"<!--") || sc.is_prefix_of(b"<![CDATA[") {
            return Ok(Step::NeedMoreInput);
        }

        if sc.starts_with(b"<!--") {
            let Some(end) = sc.find_sequence(b"-->") else {
                return Ok(Step::NeedMoreInput);
            };
            self.consume(end + 3);
            return Ok(Step::Skipped);
        }

        if sc.starts_with(b"<![CDATA[") {
            let Some(end) = sc.find_sequence(b"]]>") else {
                return Ok(Step::NeedMoreInput);
            };
            if self.open.is_empty() {
                return Err(StreamError::syntax("syntax error", line));
            }
            let content = std::str::from_utf8(sc.slice(9, end))
                .map_err(|_| StreamError::Encoding { line })?
                .to_string();
            self.consume(end + 3);
            return Ok(if content.is_empty() {
                Step::Skipped
            } else {
                Step::Event(XmlEvent::Text(content))
            });
        }

        if sc.starts_with(b"<?") {
            let Some(end) = sc.find_sequence(b"?>") else {
                return Ok(Step::NeedMoreInput);
            };
            self.consume(end + 2);
            return Ok(Step::Skipped);
        }

        if sc.starts_with(b"<!") {
            let Some(end) = sc.find_declaration_end() else {
                return Ok(Step::NeedMoreInput);
            };
            if self.seen_root {
                return Err(StreamError::syntax("syntax error", line));
            }
            self.consume(end + 1);
            return Ok(Step::Skipped);
        }

        let Some(end) = sc.find_tag_end_quoted() else {
            return Ok(Step::NeedMoreInput);
        };

        if sc.starts_with(b"</") {
            let mut name_sc = Scanner::new(sc.slice(2, end));
            let name = name_sc
                .read_name()
                .ok_or_else(|| StreamError::syntax(INVALID_TOKEN, line))?;
            name_sc.skip_whitespace();
            if !name_sc.is_eof() {
                return Err(StreamError::syntax(INVALID_TOKEN, line));
            }
            let name = std::str::from_utf8(name).map_err(|_| StreamError::Encoding { line })?;
            if self.open.last().map(String::as_str) != Some(name) {
                return Err(StreamError::syntax("mismatched tag", line));
            }
            let name = self.open.pop().unwrap_or_default();
            self.consume(end + 1);
            return Ok(Step::Event(XmlEvent::EndElement { name }));
        }

        let self_closing = end > 1 && sc.slice(end - 1, end) == b"/";
        let body_end = if self_closing { end - 1 } else { end };
        let mut name_sc = Scanner::new(sc.slice(1, body_end));
        let name = name_sc
            .read_name()
            .ok_or_else(|| StreamError::syntax(INVALID_TOKEN, line))?;
        let attr_bytes = sc.slice(1 + name_sc.position(), body_end);

        if self.open.is_empty() && self.seen_root {
            return Err(StreamError::syntax("junk after document element", line));
        }

        let name = std::str::from_utf8(name)
            .map_err(|_| StreamError::Encoding { line })?
            .to_string();
        let attributes =
            parse_attributes(attr_bytes).map_err(|message| StreamError::syntax(message, line))?;

        self.seen_root = true;
        if self_closing {
            self.pending_end = Some(name.clone());
        } else {
            self.open.push(name.clone());
        }
        self.consume(end + 1);
        Ok(Step::Event(XmlEvent::StartElement { name, attributes }))
    }

    fn step_text(&mut self) -> Result<Step, StreamError> {
        let line = self.line;
        let sc = Scanner::new(&self.buffer[self.pos..]);

        let end = match sc.find_tag_start() {
            Some(end) => end,
            None if self.end_of_stream => self.buffered(),
            None => return Ok(Step::NeedMoreInput),
        };
        let raw = sc.slice(0, end);

        if self.open.is_empty() {
            if raw.iter().all(|&b| is_whitespace(b)) {
                self.consume(end);
                return Ok(Step::Skipped);
            }
            let message = if self.seen_root {
                "junk after document element"
            } else {
                "syntax error"
            };
            return Err(StreamError::syntax(message, line));
        }

        let decoded = decode_text(raw).map_err(|message| StreamError::syntax(message, line))?;
        let text = String::from_utf8(decoded.into_owned()).map_err(|_| StreamError::Encoding { line })?;
        self.consume(end);
        Ok(Step::Event(XmlEvent::Text(text)))
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new()
    }
}
