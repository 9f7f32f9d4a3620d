use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures_util::Stream;
use llm_dust_model::{ModelResponse, ModelResponseEvent};
use pin_project_lite::pin_project;
use tokio::time::{Instant, timeout_at};

use crate::assembler::{Assembled, assemble};
use crate::model::Observers;
use crate::proto::{self, ConversationEvent, MessageEvent};
use crate::router::route;
use crate::{Error, EventStream, Session, Transport};

/// Everything one turn needs while streaming the reply.
///
/// Dropping the state closes both event streams.
pub(crate) struct TurnState<'a> {
    transport: Transport,
    session: &'a mut Session,
    conversation_id: String,
    observers: Observers,
    deadline: Instant,
    conversation_events: Option<EventStream>,
    // The agent message being streamed, if any. The conversation stream
    // is not read while this is set.
    message: Option<(String, EventStream)>,
}

impl<'a> TurnState<'a> {
    pub fn new(
        transport: Transport,
        session: &'a mut Session,
        conversation_id: String,
        observers: Observers,
    ) -> Self {
        let deadline = Instant::now() + transport.config().stream_timeout();
        Self {
            transport,
            session,
            conversation_id,
            observers,
            deadline,
            conversation_events: None,
            message: None,
        }
    }
}

type PinnedFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type NextEvent<'a> =
    Result<(Option<ModelResponseEvent>, TurnState<'a>), Error>;

pin_project! {
    /// The reply of a Dust agent to one prompt.
    ///
    /// Text arrives as [`ModelResponseEvent::TextDelta`] events, and the
    /// reply ends with [`ModelResponseEvent::Completed`]. The response is
    /// also a [`Stream`] of text pieces. Dropping it early closes the
    /// underlying connections.
    pub struct DustResponse<'a> {
        next_event_fut: Option<PinnedFuture<'a, NextEvent<'a>>>,
    }
}

impl<'a> DustResponse<'a> {
    #[inline]
    pub(crate) fn new(state: TurnState<'a>) -> Self {
        Self {
            next_event_fut: Some(Box::pin(next_event(state))),
        }
    }
}

impl ModelResponse for DustResponse<'_> {
    type Error = Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let result = ready!(next_event_fut.as_mut().poll(cx));
        *this.next_event_fut = None;

        match result {
            Ok((Some(ModelResponseEvent::TextDelta(text)), state)) => {
                // More events may follow, create a new future for the
                // next one.
                *this.next_event_fut = Some(Box::pin(next_event(state)));
                Poll::Ready(Ok(Some(ModelResponseEvent::TextDelta(text))))
            }
            // One turn maps to exactly one agent reply, so the state is
            // dropped here and both streams are closed.
            Ok((event, _)) => Poll::Ready(Ok(event)),
            Err(err) => Poll::Ready(Err(err)),
        }
    }
}

impl Stream for DustResponse<'_> {
    type Item = Result<String, Error>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(self.as_mut().poll_next_event(cx)) {
                Ok(Some(ModelResponseEvent::TextDelta(text))) => {
                    return Poll::Ready(Some(Ok(text)));
                }
                Ok(Some(ModelResponseEvent::Completed)) => continue,
                Ok(None) => return Poll::Ready(None),
                Err(err) => return Poll::Ready(Some(Err(err))),
            }
        }
    }
}

async fn next_event(mut state: TurnState<'_>) -> NextEvent<'_> {
    match timeout_at(state.deadline, pump(&mut state)).await {
        Ok(Ok(event)) => Ok((event, state)),
        Ok(Err(err)) => Err(err),
        Err(_) => {
            let timeout = state.transport.config().stream_timeout();
            warn!(
                "no terminal event in conversation {} within {timeout:?}",
                state.conversation_id
            );
            Err(Error::StreamTimeout(timeout))
        }
    }
}

async fn pump(
    state: &mut TurnState<'_>,
) -> Result<Option<ModelResponseEvent>, Error> {
    loop {
        if let Some((message_id, message_events)) = &mut state.message {
            let Some(payload) = message_events.next_payload().await? else {
                debug!("agent message {message_id} ended without a verdict");
                state.message = None;
                continue;
            };
            trace!("got message event: {payload}");
            let event = MessageEvent::from_payload(payload)?;
            match assemble(event, &state.observers)? {
                Assembled::Token(text) => {
                    return Ok(Some(ModelResponseEvent::TextDelta(text)));
                }
                Assembled::Done => {
                    debug!("agent message {message_id} completed");
                    return Ok(Some(ModelResponseEvent::Completed));
                }
                Assembled::Pending => continue,
            }
        }

        let conversation_events = match &mut state.conversation_events {
            Some(events) => events,
            None => {
                let path =
                    proto::conversation_events_path(&state.conversation_id);
                let events = state.transport.get_stream(&path).await?;
                state.conversation_events.insert(events)
            }
        };
        let Some(payload) = conversation_events.next_payload().await? else {
            debug!("conversation stream ended without an agent reply");
            return Ok(None);
        };
        trace!("got conversation event: {payload}");
        let event = ConversationEvent::from_payload(&payload)?;
        if let Some(message_id) = route(event, state.session, &state.observers)
        {
            let path = proto::message_events_path(
                &state.conversation_id,
                &message_id,
            );
            let events = state.transport.get_stream(&path).await?;
            state.message = Some((message_id, events));
        }
    }
}
