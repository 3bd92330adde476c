//! Selector and subscription-name parsing
//!
//! Selector grammar: element names separated by whitespace (descendant) or
//! `>` (immediate child). Redundant whitespace is ignored, so `a>b`,
//! ` a  >  b ` and `a > b` are the same selector.
//!
//! Subscription grammar: `<category>[:<selector>]`, e.g. `endElement: item`.

use std::fmt;

/// One selector token
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Part {
    /// Element name
    Name(String),
    /// The `>` combinator
    Child,
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Name(name) => f.write_str(name),
            Part::Child => f.write_str(">"),
        }
    }
}

/// A compiled selector: its token list and the canonical string used as
/// the automaton dedup key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector {
    normalized: String,
    parts: Vec<Part>,
}

impl Selector {
    /// Tokenize a selector string
    pub fn parse(selector: &str) -> Self {
        let mut parts = Vec::new();

        for word in selector.split_whitespace() {
            let mut rest = word;
            while !rest.is_empty() {
                match rest.find('>') {
                    Some(0) => {
                        parts.push(Part::Child);
                        rest = &rest[1..];
                    }
                    Some(i) => {
                        parts.push(Part::Name(rest[..i].to_string()));
                        rest = &rest[i..];
                    }
                    None => {
                        parts.push(Part::Name(rest.to_string()));
                        rest = "";
                    }
                }
            }
        }

        let normalized = parts
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");

        Selector { normalized, parts }
    }

    /// Canonical, space-joined form
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// A selector with no tokens addresses the document level
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Subscription category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartElement,
    EndElement,
    UpdateElement,
    Text,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::StartElement,
        EventKind::EndElement,
        EventKind::UpdateElement,
        EventKind::Text,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::StartElement => "startElement",
            EventKind::EndElement => "endElement",
            EventKind::UpdateElement => "updateElement",
            EventKind::Text => "text",
        }
    }
}

/// A parsed selector subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub kind: EventKind,
    pub selector: Selector,
    /// Canonical event name: `"<category>: <selector>"`, or the bare
    /// category when the selector is empty
    pub name: String,
}

/// Parse a subscription name such as `"endElement: channel > item"`.
///
/// Returns `None` for anything that is not a selector subscription; the
/// caller treats such names as ordinary event names.
pub fn parse_event(event: &str) -> Option<EventSpec> {
    let (kind, rest) = EventKind::ALL
        .iter()
        .find_map(|&kind| event.strip_prefix(kind.as_str()).map(|rest| (kind, rest)))?;

    let selector_str = match rest {
        "" => "",
        _ => rest.strip_prefix(':')?,
    };

    let selector = Selector::parse(selector_str);
    let name = if selector.is_empty() {
        kind.as_str().to_string()
    } else {
        format!("{}: {}", kind.as_str(), selector.normalized())
    };

    Some(EventSpec {
        kind,
        selector,
        name,
    })
}
