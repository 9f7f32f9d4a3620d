//! Streaming primitives for reading server-sent events.

mod chunks;
mod lines;
mod sse;

pub(crate) use chunks::Chunks;
pub(crate) use lines::Lines;
pub use sse::EventStream;
