pub mod message;
pub mod request;

pub use message::Message;
pub use request::{ChatRequest, StopRequest};
