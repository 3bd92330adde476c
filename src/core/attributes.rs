//! XML Attribute Parsing
//!
//! Parses the attribute list of a start tag into owned name/value pairs in
//! document order. Values are entity-decoded and whitespace-normalized the
//! way a conforming parser reports them (literal tab, CR and LF become a
//! space; character references are kept as written).

use super::entities::decode_text;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace};
use memchr::memchr;
use std::borrow::Cow;

/// A parsed XML attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name (may include namespace prefix)
    pub name: String,
    /// Attribute value (entities decoded)
    pub value: String,
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'.
///
/// # Errors
///
/// Returns a parser message for a malformed list: a name without `=`, an
/// unquoted or unterminated value, `<` inside a value, a repeated name, a
/// bad entity reference, or invalid UTF-8.
pub fn parse_attributes(input: &[u8]) -> Result<Vec<Attribute>, &'static str> {
    const INVALID: &str = "not well-formed (invalid token)";

    let mut attrs: Vec<Attribute> = Vec::new();
    let mut pos = 0;

    loop {
        let ws_start = pos;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        if pos >= input.len() {
            break;
        }

        // Attributes must be separated from the name and from each other
        if pos == ws_start {
            return Err(INVALID);
        }

        let name_start = pos;
        if !is_name_start_char(input[pos]) {
            return Err(INVALID);
        }
        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }
        let name = &input[name_start..pos];

        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }
        if input.get(pos) != Some(&b'=') {
            return Err(INVALID);
        }
        pos += 1;
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        let quote = match input.get(pos) {
            Some(&q @ (b'"' | b'\'')) => q,
            _ => return Err(INVALID),
        };
        pos += 1;

        let value_start = pos;
        let value_len = memchr(quote, &input[value_start..]).ok_or(INVALID)?;
        let raw = &input[value_start..value_start + value_len];
        pos = value_start + value_len + 1;

        if memchr(b'<', raw).is_some() {
            return Err(INVALID);
        }

        let name = std::str::from_utf8(name).map_err(|_| INVALID)?;
        if attrs.iter().any(|a| a.name == name) {
            return Err("duplicate attribute");
        }

        let value = decode_text(&normalize_whitespace(raw))?.into_owned();
        let value = String::from_utf8(value).map_err(|_| INVALID)?;

        attrs.push(Attribute {
            name: name.to_string(),
            value,
        });
    }

    Ok(attrs)
}

/// Replace literal tab, CR and LF with a space
fn normalize_whitespace(raw: &[u8]) -> Cow<'_, [u8]> {
    if !raw.iter().any(|&b| matches!(b, b'\t' | b'\n' | b'\r')) {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(
        raw.iter()
            .map(|&b| if matches!(b, b'\t' | b'\n' | b'\r') { b' ' } else { b })
            .collect(),
    )
}
