use crate::error::ModelError;
use crate::request::Prompt;
use crate::response::ModelResponse;

/// A conversational model backed by a remote agent.
///
/// A model owns the state of one conversation: the first call to
/// [`respond`] starts it, and every later call continues it. Dropping
/// the model forgets the conversation, the remote side is not notified.
///
/// [`respond`]: ConversationalModel::respond
pub trait ConversationalModel: Send {
    /// The error type that may be returned by the model.
    type Error: ModelError;

    /// The response type for this model. A response may borrow the
    /// model, so only one turn can be in flight at a time.
    type Response<'a>: ModelResponse<Error = Self::Error>
    where
        Self: 'a;

    /// Returns a human readable name of the model.
    fn name(&self) -> &str;

    /// Sends a prompt to the agent.
    ///
    /// The returned future resolves once the prompt has been accepted by
    /// the remote side, the reply itself is delivered by the response.
    fn respond<'a>(
        &'a mut self,
        prompt: &'a Prompt,
    ) -> impl Future<Output = Result<Self::Response<'a>, Self::Error>>
    + Send
    + 'a;
}
