use std::error::Error;

/// The kind of error that occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The remote service rejected a request or could not be reached.
    Remote,
    /// The event stream contained a line that could not be decoded.
    MalformedEvent,
    /// No terminal event arrived within the configured budget.
    StreamTimeout,
    /// The remote agent reported a failure while generating its reply.
    AgentExecution,
    /// An attachment could not be uploaded.
    Upload,
    /// The model is misconfigured.
    Config,
    /// Any other errors.
    Other,
}

/// The error type for a conversational model.
pub trait ModelError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}
