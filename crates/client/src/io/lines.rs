use bytes::{Buf, BytesMut};

use super::Chunks;
use crate::Error;

/// Splits a chunk stream into text lines.
///
/// Lines are terminated by `\n` with an optional preceding `\r`. A
/// trailing line without terminator is still returned at the end of
/// the stream.
pub(crate) struct Lines {
    buf: BytesMut,
    chunks: Chunks,
    eof: bool,
}

impl Lines {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: BytesMut::new(),
            chunks,
            eof: false,
        }
    }

    pub async fn next_line(&mut self) -> Result<Option<String>, Error> {
        loop {
            if let Some(eol_idx) = self.buf.iter().position(|b| *b == b'\n') {
                let mut line = self.buf.split_to(eol_idx);
                self.buf.advance(1);
                if line.last() == Some(&b'\r') {
                    line.truncate(line.len() - 1);
                }
                return decode(&line).map(Some);
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                let line = self.buf.split();
                return decode(&line).map(Some);
            }

            // Chunk boundaries can fall anywhere, even inside a UTF-8
            // sequence, so only bytes are buffered here.
            match self.chunks.next_chunk().await? {
                Some(bytes) => self.buf.extend_from_slice(&bytes),
                None => self.eof = true,
            }
        }
    }
}

#[inline]
fn decode(line: &[u8]) -> Result<String, Error> {
    String::from_utf8(line.to_vec())
        .map_err(|_| Error::malformed(String::from_utf8_lossy(line)))
}
