use std::mem;

/// Line buffer for chunked text bodies.
///
/// Bytes are decoded to UTF-8 incrementally: a character split across two
/// chunks is held back until its last byte arrives. Decoded text is split on
/// `\n`; everything after the last newline stays buffered for the next chunk.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    /// Leading bytes of a character that has not finished arriving (at most 3).
    pending_bytes: Vec<u8>,
    /// Decoded text after the last newline seen so far.
    remainder: String,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new buffer with specified capacity for the text remainder
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending_bytes: Vec::with_capacity(4),
            remainder: String::with_capacity(capacity),
        }
    }

    /// Add a chunk and return every frame it completed, in order.
    ///
    /// Frames are returned without their `\n` terminator and otherwise untouched.
    pub fn append(&mut self, bytes: &[u8]) -> Vec<String> {
        self.decode(bytes);
        self.drain_frames()
    }

    /// Take the unterminated remainder at end of stream.
    ///
    /// Returns `None` when nothing but whitespace is left. Bytes of an
    /// unfinished character are flushed as U+FFFD.
    pub fn flush(&mut self) -> Option<String> {
        if !self.pending_bytes.is_empty() {
            let pending = mem::take(&mut self.pending_bytes);
            self.remainder.push_str(&String::from_utf8_lossy(&pending));
        }

        let remainder = mem::take(&mut self.remainder);
        if remainder.trim().is_empty() {
            None
        } else {
            Some(remainder)
        }
    }

    /// Buffered text length in bytes, including undecoded bytes
    pub fn len(&self) -> usize {
        self.remainder.len() + self.pending_bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remainder.is_empty() && self.pending_bytes.is_empty()
    }

    fn decode(&mut self, bytes: &[u8]) {
        let joined: Vec<u8>;
        let mut input: &[u8] = if self.pending_bytes.is_empty() {
            bytes
        } else {
            let mut buf = mem::take(&mut self.pending_bytes);
            buf.extend_from_slice(bytes);
            joined = buf;
            &joined
        };

        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    self.remainder.push_str(text);
                    return;
                }
                Err(e) => {
                    let (valid, rest) = input.split_at(e.valid_up_to());
                    self.remainder.push_str(&String::from_utf8_lossy(valid));

                    match e.error_len() {
                        // Truncated character at the end: wait for the next chunk
                        None => {
                            self.pending_bytes.extend_from_slice(rest);
                            return;
                        }
                        Some(invalid) => {
                            self.remainder.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[invalid..];
                        }
                    }
                }
            }
        }
    }

    fn drain_frames(&mut self) -> Vec<String> {
        let Some(last_newline) = self.remainder.rfind('\n') else {
            return Vec::new();
        };

        let tail = self.remainder.split_off(last_newline + 1);
        let complete = mem::replace(&mut self.remainder, tail);

        complete[..last_newline]
            .split('\n')
            .map(str::to_owned)
            .collect()
    }
}
