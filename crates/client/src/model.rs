use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use llm_dust_model::{ConversationalModel, Prompt};

use crate::response::{DustResponse, TurnState};
use crate::{AgentAction, AgentConfiguration, Error, Session, Transport};

type TitleFn = Arc<dyn Fn(&str) + Send + Sync>;
type ActionFn = Arc<dyn Fn(&AgentAction) + Send + Sync>;

/// Callbacks for events that are not part of the reply text.
#[derive(Clone, Default)]
pub(crate) struct Observers {
    pub on_title: Option<TitleFn>,
    pub on_action: Option<ActionFn>,
}

/// A Dust agent exposed as a [`ConversationalModel`].
///
/// Each model owns a [`Session`], so all prompts sent to one model end up
/// in the same remote conversation. Create another model to start over.
pub struct DustModel {
    transport: Transport,
    agent: AgentConfiguration,
    session: Session,
    observers: Observers,
}

impl DustModel {
    pub(crate) fn new(transport: Transport, agent: AgentConfiguration) -> Self {
        let session = Session::new(agent.id.clone());
        Self {
            transport,
            agent,
            session,
            observers: Observers::default(),
        }
    }

    /// Attaches a callback to be invoked when the conversation gets a
    /// title.
    #[inline]
    pub fn on_title(
        mut self,
        on_title: impl Fn(&str) + Send + Sync + 'static,
    ) -> Self {
        self.observers.on_title = Some(Arc::new(on_title));
        self
    }

    /// Attaches a callback to be invoked when the agent reports a
    /// tool-use event.
    #[inline]
    pub fn on_action(
        mut self,
        on_action: impl Fn(&AgentAction) + Send + Sync + 'static,
    ) -> Self {
        self.observers.on_action = Some(Arc::new(on_action));
        self
    }

    /// Returns the agent behind this model.
    #[inline]
    pub fn agent(&self) -> &AgentConfiguration {
        &self.agent
    }

    /// Returns the conversation state of this model.
    #[inline]
    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl Debug for DustModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DustModel")
            .field("agent", &self.agent)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ConversationalModel for DustModel {
    type Error = Error;
    type Response<'a> = DustResponse<'a>;

    #[inline]
    fn name(&self) -> &str {
        &self.agent.name
    }

    fn respond<'a>(
        &'a mut self,
        prompt: &'a Prompt,
    ) -> impl Future<Output = Result<Self::Response<'a>, Self::Error>>
    + Send
    + 'a {
        async move {
            let conversation_id =
                self.session.send_prompt(&self.transport, prompt).await?;
            let state = TurnState::new(
                self.transport.clone(),
                &mut self.session,
                conversation_id,
                self.observers.clone(),
            );
            Ok(DustResponse::new(state))
        }
    }
}
