//! SIMD-accelerated XML scanning using memchr
//!
//! Uses memchr crate for fast byte searching with SIMD acceleration:
//! - SSE2 (default x86_64)
//! - AVX2 (runtime detection)
//! - NEON (aarch64)
//!
//! The scanner works on whatever the tokenizer currently holds in its
//! buffer. A `None` from any `find_*` method means "not in this buffer yet",
//! which the tokenizer turns into a request for more input.

use memchr::{memchr, memchr_iter, memmem};

/// Scanner for XML delimiter detection
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given input
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    /// Get the current position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Check if we've reached the end
    #[inline]
    pub fn is_eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    /// Get a slice from start to end positions
    #[inline]
    pub fn slice(&self, start: usize, end: usize) -> &'a [u8] {
        &self.input[start..end]
    }

    /// Skip whitespace characters (space, tab, newline, carriage return)
    #[inline]
    pub fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    /// Find next '<' (tag start) using SIMD
    #[inline]
    pub fn find_tag_start(&self) -> Option<usize> {
        memchr(b'<', &self.input[self.pos..]).map(|i| self.pos + i)
    }

    /// Find tag end while handling quotes properly
    /// Returns the position of '>' that is not inside quotes
    pub fn find_tag_end_quoted(&self) -> Option<usize> {
        let mut in_single_quote = false;
        let mut in_double_quote = false;

        for (offset, &b) in self.input[self.pos..].iter().enumerate() {
            match b {
                b'"' if !in_single_quote => in_double_quote = !in_double_quote,
                b'\'' if !in_double_quote => in_single_quote = !in_single_quote,
                b'>' if !in_single_quote && !in_double_quote => return Some(self.pos + offset),
                _ => {}
            }
        }
        None
    }

    /// Find the end of a `<!...>` declaration, skipping a bracketed internal
    /// subset and quoted literals. Returns the position of the closing '>'.
    pub fn find_declaration_end(&self) -> Option<usize> {
        let mut depth = 0usize;
        let mut quote: Option<u8> = None;

        for (offset, &b) in self.input[self.pos..].iter().enumerate() {
            match (quote, b) {
                (Some(q), _) if b == q => quote = None,
                (Some(_), _) => {}
                (None, b'"' | b'\'') => quote = Some(b),
                (None, b'[') => depth += 1,
                (None, b']') => depth = depth.saturating_sub(1),
                (None, b'>') if depth == 0 => return Some(self.pos + offset),
                _ => {}
            }
        }
        None
    }

    /// Find the next occurrence of a multi-byte terminator such as `-->`
    #[inline]
    pub fn find_sequence(&self, needle: &[u8]) -> Option<usize> {
        memmem::find(&self.input[self.pos..], needle).map(|i| self.pos + i)
    }

    /// Check if input starts with a byte sequence at current position
    #[inline]
    pub fn starts_with(&self, needle: &[u8]) -> bool {
        self.input[self.pos..].starts_with(needle)
    }

    /// True when the remaining input is a strict prefix of `needle`, i.e.
    /// the construct cannot be classified until more bytes arrive.
    #[inline]
    pub fn is_prefix_of(&self, needle: &[u8]) -> bool {
        let rest = &self.input[self.pos..];
        rest.len() < needle.len() && needle.starts_with(rest)
    }

    /// Read an XML name (starts with letter/underscore, continues with letters/digits/hyphens/underscores/periods)
    pub fn read_name(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;

        let first = *self.input.get(start)?;
        if !is_name_start_char(first) {
            return None;
        }

        self.pos += 1;

        while self.pos < self.input.len() && is_name_char(self.input[self.pos]) {
            self.pos += 1;
        }

        Some(&self.input[start..self.pos])
    }
}

/// Count line feeds in a byte slice
#[inline]
pub fn count_lines(bytes: &[u8]) -> usize {
    memchr_iter(b'\n', bytes).count()
}

/// Check if byte is valid XML name start character
/// Allows ASCII letters, underscore, colon, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// Check if byte is valid XML name character
/// Allows ASCII alphanumeric, punctuation, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}
