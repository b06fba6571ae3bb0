mod frame_buffer;
mod sse_parser;

pub use frame_buffer::FrameBuffer;
pub use sse_parser::{parse_frame, ParsedFrame, DATA_PREFIX};
