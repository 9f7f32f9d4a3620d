use crate::Error;
use crate::model::Observers;
use crate::proto::MessageEvent;

/// What the reply looks like after one message-level event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Assembled {
    /// A piece of text to hand to the caller.
    Token(String),
    /// The reply is complete.
    Done,
    /// Nothing to report, keep reading.
    Pending,
}

/// Turns a message-level event into the next step of the reply.
///
/// A failure reported by the agent ends the reply with
/// [`Error::AgentExecution`].
pub(crate) fn assemble(
    event: MessageEvent,
    observers: &Observers,
) -> Result<Assembled, Error> {
    match event {
        MessageEvent::GenerationTokens { text } => Ok(Assembled::Token(text)),
        MessageEvent::AgentMessageSuccess => Ok(Assembled::Done),
        MessageEvent::AgentError { message } => {
            error!("agent error: {message}");
            Err(Error::AgentExecution { message })
        }
        MessageEvent::AgentAction(action) => {
            info!("agent action: {}", action.kind);
            if let Some(on_action) = &observers.on_action {
                on_action(&action);
            }
            Ok(Assembled::Pending)
        }
        MessageEvent::Unknown { raw_type } => {
            warn!("unknown message event type: {raw_type}");
            Ok(Assembled::Pending)
        }
    }
}
