//! An abstraction layer for conversational agents exposed as models.
//!
//! This crate establishes the protocol a host tool uses to talk to a
//! remote conversational agent: hand it a prompt (optionally with file
//! attachments) and receive an incremental sequence of text, or an
//! error. The host does not need to know how the agent is reached.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod model;
mod request;
mod response;

pub use error::*;
pub use model::*;
pub use request::*;
pub use response::*;
