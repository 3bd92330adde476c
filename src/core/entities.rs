//! XML Entity Decoding and Escaping
//!
//! Handles decoding of XML entities:
//! - Built-in entities: &lt; &gt; &amp; &quot; &apos;
//! - Numeric character references: &#123; &#x7B;
//!
//! and escaping of text and attribute values for re-serialized output.
//! Uses Cow for zero-copy when nothing needs to change.

use memchr::{memchr, memchr3};
use std::borrow::Cow;

/// Decode text content, handling entity references
///
/// Returns Borrowed if no entities present (zero-copy),
/// returns Owned if entities were decoded.
///
/// # Errors
///
/// Fails on a reference that is unterminated, names an undeclared entity,
/// or refers to a codepoint that is not an XML character.
#[inline]
pub fn decode_text(input: &[u8]) -> Result<Cow<'_, [u8]>, &'static str> {
    // Fast path: check if there are any entities using SIMD
    if memchr(b'&', input).is_none() {
        return Ok(Cow::Borrowed(input));
    }
    decode_entities(input).map(Cow::Owned)
}

/// Decode all entity references in the input
fn decode_entities(input: &[u8]) -> Result<Vec<u8>, &'static str> {
    let mut result = Vec::with_capacity(input.len());
    let mut pos = 0;

    while let Some(amp_pos) = memchr(b'&', &input[pos..]) {
        result.extend_from_slice(&input[pos..pos + amp_pos]);
        pos += amp_pos;

        let semi_offset = memchr(b';', &input[pos..]).ok_or("not well-formed (invalid token)")?;
        let entity = &input[pos + 1..pos + semi_offset];
        let mut utf8 = [0u8; 4];
        result.extend_from_slice(decode_entity(entity)?.encode_utf8(&mut utf8).as_bytes());
        pos += semi_offset + 1;
    }

    result.extend_from_slice(&input[pos..]);
    Ok(result)
}

/// Decode a single entity (without & and ;)
fn decode_entity(entity: &[u8]) -> Result<char, &'static str> {
    match entity {
        b"lt" => Ok('<'),
        b"gt" => Ok('>'),
        b"amp" => Ok('&'),
        b"quot" => Ok('"'),
        b"apos" => Ok('\''),
        [b'#', digits @ ..] => decode_numeric_entity(digits),
        [] => Err("not well-formed (invalid token)"),
        _ => Err("undefined entity"),
    }
}

/// Decode a numeric character reference
fn decode_numeric_entity(entity: &[u8]) -> Result<char, &'static str> {
    const INVALID: &str = "reference to invalid character number";

    let (digits, radix) = match entity {
        [b'x' | b'X', hex @ ..] => (hex, 16),
        _ => (entity, 10),
    };
    // from_str_radix accepts a leading sign
    if digits.is_empty() || !digits.iter().all(|&b| (b as char).is_digit(radix)) {
        return Err(INVALID);
    }
    let codepoint = std::str::from_utf8(digits)
        .ok()
        .and_then(|d| u32::from_str_radix(d, radix).ok())
        .ok_or(INVALID)?;

    if !is_valid_xml_char(codepoint) {
        return Err(INVALID);
    }
    char::from_u32(codepoint).ok_or(INVALID)
}

/// XML 1.0 Char production
#[inline]
fn is_valid_xml_char(cp: u32) -> bool {
    matches!(cp, 0x9 | 0xA | 0xD | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x10000..=0x10FFFF)
}

/// Escape text or an attribute value for XML output.
///
/// All five predefined entities are escaped so the result is safe both as
/// character data and inside a double- or single-quoted attribute.
pub fn escape(input: &str) -> Cow<'_, str> {
    // Fast path: check if any escaping needed
    if !input.bytes().any(|b| matches!(b, b'<' | b'>' | b'&' | b'"' | b'\'')) {
        return Cow::Borrowed(input);
    }

    let mut result = String::with_capacity(input.len() + 16);
    escape_into(input, &mut result);
    Cow::Owned(result)
}

/// Escape into an existing buffer
pub fn escape_into(input: &str, buf: &mut String) {
    let bytes = input.as_bytes();
    let mut start = 0;

    while start < bytes.len() {
        let rest = &bytes[start..];
        // memchr3 covers the three structural characters, quotes are rare
        let next = match memchr3(b'<', b'>', b'&', rest) {
            Some(i) => rest[..i]
                .iter()
                .position(|&b| b == b'"' || b == b'\'')
                .unwrap_or(i),
            None => match rest.iter().position(|&b| b == b'"' || b == b'\'') {
                Some(i) => i,
                None => {
                    buf.push_str(&input[start..]);
                    return;
                }
            },
        };

        buf.push_str(&input[start..start + next]);
        buf.push_str(match bytes[start + next] {
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'&' => "&amp;",
            b'"' => "&quot;",
            _ => "&apos;",
        });
        start += next + 1;
    }
}
