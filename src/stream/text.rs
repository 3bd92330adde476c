//! Whitespace collapsing for element text
//!
//! Text arrives in chunks split at arbitrary points. The per-element state
//! remembers whether content was seen and whether a space is owed, so
//! leading and trailing whitespace is dropped, inner runs collapse to one
//! space, and the result does not depend on where the chunks were split.

/// Normalization state of one element's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextState {
    /// Only whitespace so far
    #[default]
    NoContent,
    /// Last character appended was content
    HadContent,
    /// Whitespace followed content; one space is owed before more content
    PendingSpace,
}

impl TextState {
    /// Append `chunk` to `text` with whitespace collapsed
    pub fn push(&mut self, text: &mut String, chunk: &str) {
        for ch in chunk.chars() {
            if ch.is_whitespace() {
                if *self == TextState::HadContent {
                    *self = TextState::PendingSpace;
                }
                continue;
            }
            if *self == TextState::PendingSpace {
                text.push(' ');
            }
            text.push(ch);
            *self = TextState::HadContent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collapse(chunks: &[&str]) -> String {
        let mut state = TextState::default();
        let mut text = String::new();
        for chunk in chunks {
            state.push(&mut text, chunk);
        }
        text
    }

    #[test]
    fn test_single_chunk() {
        assert_eq!(collapse(&[" hi   there "]), "hi there");
        assert_eq!(collapse(&["\n\t  "]), "");
        assert_eq!(collapse(&["a\nb"]), "a b");
    }

    #[test]
    fn test_chunk_boundaries() {
        let whole = collapse(&["  alpha beta\n  gamma  "]);
        for split in 0..=22 {
            let input = "  alpha beta\n  gamma  ";
            let (head, tail) = input.split_at(split);
            assert_eq!(collapse(&[head, tail]), whole, "split at {split}");
        }
        assert_eq!(collapse(&["a ", "b ", "c"]), "a b c");
        assert_eq!(collapse(&["a", " ", "", "b"]), "a b");
    }

    #[test]
    fn test_no_trailing_space_owed_at_end() {
        let mut state = TextState::default();
        let mut text = String::new();
        state.push(&mut text, "x  ");
        assert_eq!(text, "x");
        assert_eq!(state, TextState::PendingSpace);
    }
}
