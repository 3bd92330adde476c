//! Stream error type
//!
//! Tokenizer failures are terminal for the stream that produced them: the
//! first one is reported with its line number, every later `feed`/`finish`
//! on the same stream answers `Closed`.

use thiserror::Error;

/// Errors surfaced by the tokenizer, the stream and the reader driver
#[derive(Debug, Error)]
pub enum StreamError {
    /// Malformed markup
    #[error("{message} in line {line}")]
    Syntax { message: String, line: usize },

    /// Bytes that are not valid UTF-8
    #[error("invalid UTF-8 in line {line}")]
    Encoding { line: usize },

    /// Failure reading from the byte source
    #[error("read error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream already failed or already reached its end
    #[error("stream is closed")]
    Closed,
}

impl StreamError {
    pub(crate) fn syntax(message: impl Into<String>, line: usize) -> Self {
        StreamError::Syntax {
            message: message.into(),
            line,
        }
    }

    /// Input line the error was detected on, when known
    pub fn line(&self) -> Option<usize> {
        match self {
            StreamError::Syntax { line, .. } | StreamError::Encoding { line } => Some(*line),
            StreamError::Io(_) | StreamError::Closed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_line() {
        let err = StreamError::syntax("mismatched tag", 3);
        assert_eq!(err.to_string(), "mismatched tag in line 3");
        assert_eq!(err.line(), Some(3));
        assert_eq!(StreamError::Closed.line(), None);
    }
}
