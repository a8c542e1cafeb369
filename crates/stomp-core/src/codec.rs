//! NUL-delimited framing for the STOMP byte stream.
//!
//! Wire format: `[frame text][0x00]`, optionally followed by heart-beat EOLs
//! before the next frame.

use crate::error::{StompError, StompResult};

/// Frame terminator on the wire.
pub const FRAME_TERMINATOR: u8 = 0x00;

/// Append the terminator to a frame's text.
pub fn frame_encode(text: &str) -> Vec<u8> {
    let mut frame = Vec::with_capacity(text.len() + 1);
    frame.extend_from_slice(text.as_bytes());
    frame.push(FRAME_TERMINATOR);
    frame
}

/// Streaming frame decoder: accumulates bytes and yields complete frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed bytes into the decoder and return the text of every complete frame.
    ///
    /// Decoding stops at a frame that is not valid UTF-8. Frames before it are
    /// returned and the bad frame stays buffered, so the error surfaces on
    /// the next call (`feed(&[])` is enough).
    pub fn feed(&mut self, data: &[u8]) -> StompResult<Vec<String>> {
        self.buffer.extend_from_slice(data);
        let mut frames = Vec::new();

        while let Some(end) = self.buffer.iter().position(|b| *b == FRAME_TERMINATOR) {
            let payload = &self.buffer[..end];

            // Heart-beats are bare EOLs between frames.
            let start = payload
                .iter()
                .position(|b| *b != b'\n' && *b != b'\r')
                .unwrap_or(payload.len());
            if start == payload.len() {
                self.buffer.drain(..=end);
                continue;
            }

            let decoded = std::str::from_utf8(&payload[start..]).map(str::to_string);
            let text = match decoded {
                Ok(text) => text,
                Err(_) if !frames.is_empty() => break,
                Err(e) => {
                    self.buffer.drain(..=end);
                    return Err(StompError::Codec(format!("frame is not valid UTF-8: {e}")));
                }
            };
            self.buffer.drain(..=end);
            frames.push(text);
        }

        Ok(frames)
    }

    /// Number of bytes remaining in the internal buffer.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}
