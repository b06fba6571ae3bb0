use crate::error::{Result, StreamError};
use crate::streaming::ChatChunk;

/// Literal, case-sensitive marker that introduces a data frame
pub const DATA_PREFIX: &str = "data:";

/// Outcome of parsing one frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedFrame {
    /// Keepalive, comment, blank line, empty payload or any non-data line
    NoOp,
    Data(ChatChunk),
}

/// Parse a single frame.
///
/// Only `data:` lines carry meaning. A non-empty payload that does not decode
/// is returned as [`StreamError::MalformedPayload`]; the caller reports it and
/// keeps reading.
pub fn parse_frame(frame: &str) -> Result<ParsedFrame> {
    let line = frame.trim();

    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(ParsedFrame::NoOp);
    };

    let data = data.trim();
    if data.is_empty() {
        return Ok(ParsedFrame::NoOp);
    }

    serde_json::from_str::<ChatChunk>(data)
        .map(ParsedFrame::Data)
        .map_err(|source| StreamError::MalformedPayload {
            payload: data.to_string(),
            source,
        })
}
