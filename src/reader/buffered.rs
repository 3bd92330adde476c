//! Buffered stream driver
//!
//! Pulls chunks from any source implementing the Read trait and feeds them
//! to an [`XmlStream`]. Pausing the stream, from outside or from a
//! listener, stops the pulling too; [`StreamReader::resume`] first delivers
//! what the stream already buffered and only reads more input when nothing
//! paused it again meanwhile.

use crate::error::StreamError;
use crate::stream::XmlStream;
use std::io::{ErrorKind, Read};

/// Buffer size for reading chunks
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Runtime options for a stream and its driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Bytes requested from the source per read
    pub chunk_size: usize,
    /// Initial capacity of the tokenizer's input buffer
    pub initial_capacity: usize,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            chunk_size: DEFAULT_BUFFER_SIZE,
            initial_capacity: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl StreamOptions {
    /// Create a stream sized by these options
    pub fn stream(&self) -> XmlStream {
        XmlStream::with_capacity(self.initial_capacity)
    }
}

/// Drives an [`XmlStream`] from a byte source
pub struct StreamReader<R: Read> {
    reader: R,
    stream: XmlStream,
    buffer: Vec<u8>,
    eof: bool,
}

impl<R: Read> StreamReader<R> {
    /// Create a new driver with the default chunk size
    pub fn new(reader: R, stream: XmlStream) -> Self {
        Self::with_capacity(reader, stream, DEFAULT_BUFFER_SIZE)
    }

    /// Create a new driver reading `capacity` bytes at a time
    pub fn with_capacity(reader: R, stream: XmlStream, capacity: usize) -> Self {
        StreamReader {
            reader,
            stream,
            buffer: vec![0u8; capacity.max(1)],
            eof: false,
        }
    }

    /// Create a driver and its stream from `options`
    pub fn with_options(reader: R, options: &StreamOptions) -> Self {
        Self::with_capacity(reader, options.stream(), options.chunk_size)
    }

    pub fn stream(&self) -> &XmlStream {
        &self.stream
    }

    /// The driven stream, e.g. to register listeners before running
    pub fn stream_mut(&mut self) -> &mut XmlStream {
        &mut self.stream
    }

    /// Read and feed chunks until the source is exhausted or the stream is
    /// paused.
    ///
    /// # Errors
    ///
    /// Returns the stream's terminal error. A failing source closes the
    /// stream with [`StreamError::Io`].
    pub fn run(&mut self) -> Result<(), StreamError> {
        while !self.eof && !self.stream.is_paused() {
            let read = match self.reader.read(&mut self.buffer) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.stream.abort(err.into())),
            };

            if read == 0 {
                self.eof = true;
                self.stream.finish()?;
            } else {
                self.stream.feed(&self.buffer[..read])?;
            }
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        self.stream.pause();
    }

    /// Deliver buffered events, then keep reading unless paused again
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run).
    pub fn resume(&mut self) -> Result<(), StreamError> {
        self.stream.resume()?;
        if self.stream.is_paused() {
            return Ok(());
        }
        self.run()
    }

    pub fn is_paused(&self) -> bool {
        self.stream.is_paused()
    }

    /// Check if we've reached end of input
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    pub fn into_inner(self) -> (R, XmlStream) {
        (self.reader, self.stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Phase;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    const DOC: &[u8] = b"<list><item>1</item><item>2</item><item>3</item></list>";

    fn items(stream: &mut XmlStream, pause_at: Option<usize>) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        stream.on("endElement: item", move |m| {
            let mut seen = sink.lock().unwrap();
            seen.push(m.element.text.clone());
            if Some(seen.len()) == pause_at {
                m.pause();
            }
        });
        seen
    }

    #[test]
    fn test_reads_whole_source() {
        let mut reader = StreamReader::with_capacity(Cursor::new(DOC.to_vec()), XmlStream::new(), 5);
        let seen = items(reader.stream_mut(), None);

        reader.run().unwrap();
        assert!(reader.is_eof());
        assert_eq!(reader.stream().phase(), Phase::Ended);
        assert_eq!(*seen.lock().unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_pause_stops_reading() {
        let mut reader = StreamReader::with_capacity(Cursor::new(DOC.to_vec()), XmlStream::new(), 4);
        let seen = items(reader.stream_mut(), Some(1));

        reader.run().unwrap();
        assert!(reader.is_paused());
        assert!(!reader.is_eof());
        assert_eq!(*seen.lock().unwrap(), vec!["1"]);

        reader.resume().unwrap();
        assert!(reader.is_eof());
        assert_eq!(*seen.lock().unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_pause_during_resume_is_kept() {
        let mut reader = StreamReader::new(Cursor::new(DOC.to_vec()), XmlStream::new());
        let seen = items(reader.stream_mut(), Some(1));
        let again = Arc::clone(&seen);
        reader.stream_mut().on("endElement: item", move |m| {
            if again.lock().unwrap().len() == 2 {
                m.pause();
            }
        });

        // One read holds the whole document; the second pause hits while
        // resume drains the buffered events
        reader.run().unwrap();
        reader.resume().unwrap();
        assert!(reader.is_paused());
        assert_eq!(*seen.lock().unwrap(), vec!["1", "2"]);

        reader.resume().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["1", "2", "3"]);
        assert_eq!(reader.stream().phase(), Phase::Ended);
    }

    #[test]
    fn test_source_error_closes_stream() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(ErrorKind::Other, "disk gone"))
            }
        }

        let mut reader = StreamReader::new(Failing, XmlStream::new());
        let err = reader.run().unwrap_err();
        assert!(matches!(err, StreamError::Io(_)));
        assert_eq!(reader.stream().phase(), Phase::Failed);
    }

    #[test]
    fn test_options() {
        let options = StreamOptions::default();
        assert_eq!(options.chunk_size, 8192);
        let reader = StreamReader::with_options(Cursor::new(DOC.to_vec()), &options);
        assert_eq!(reader.buffer.len(), 8192);
    }
}
