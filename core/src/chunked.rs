//! Body source that slices a blocking reader into fixed-size chunks.

use std::io::{self, Read};

use bytes::{Bytes, BytesMut};

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Reads up to `chunk_size` bytes per chunk from `R` until end of input.
///
/// Each returned chunk becomes one `ClientMessage::Content`, which the codec
/// frames as one chunk on the wire.
#[derive(Debug)]
pub struct ChunkedStream<R> {
    reader: R,
    chunk_size: usize,
    end_of_input: bool,
    transferred: u64,
}

impl<R: Read> ChunkedStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            chunk_size: DEFAULT_CHUNK_SIZE,
            end_of_input: false,
            transferred: 0,
        }
    }

    /// Panics if `chunk_size` is zero.
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be greater than zero");
        Self {
            chunk_size,
            ..Self::new(reader)
        }
    }

    pub fn is_end_of_input(&self) -> bool {
        self.end_of_input
    }

    /// Bytes handed out so far.
    pub fn transferred(&self) -> u64 {
        self.transferred
    }

    /// Next chunk, filled as far as the reader allows. Short reads are
    /// retried so every chunk except the last is exactly `chunk_size` long.
    pub fn next_chunk(&mut self) -> io::Result<Option<Bytes>> {
        if self.end_of_input {
            return Ok(None);
        }
        let mut buf = BytesMut::zeroed(self.chunk_size);
        let mut filled = 0;
        while filled < self.chunk_size {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.end_of_input = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        self.transferred += filled as u64;
        Ok(Some(buf.freeze()))
    }
}

impl<R: Read> Iterator for ChunkedStream<R> {
    type Item = io::Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}
