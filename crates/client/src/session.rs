use std::collections::HashSet;

use llm_dust_model::Prompt;
use serde::de::IgnoredAny;

use crate::proto::{
    self, ContentFragment, CreateConversationRequest,
    CreateConversationResponse, Mention, MessageContext, PostMessageRequest,
};
use crate::upload::upload_attachment;
use crate::{Result, Transport};

/// The state of one conversation with one agent.
///
/// The first prompt sent through a session starts a conversation, and
/// every later prompt continues that same conversation. The session also
/// remembers which agent messages have already been streamed, since the
/// conversation event stream replays the whole history on every turn.
#[derive(Clone, Debug)]
pub struct Session {
    agent_id: String,
    conversation_id: Option<String>,
    processed_message_ids: HashSet<String>,
}

impl Session {
    /// Creates an empty session for the given agent.
    #[inline]
    pub fn new<S: Into<String>>(agent_id: S) -> Self {
        Self {
            agent_id: agent_id.into(),
            conversation_id: None,
            processed_message_ids: HashSet::new(),
        }
    }

    /// Returns the agent this session talks to.
    #[inline]
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Returns the conversation id, once the conversation has started.
    #[inline]
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Returns `true` if the agent message has already been streamed.
    #[inline]
    pub fn is_processed(&self, message_id: &str) -> bool {
        self.processed_message_ids.contains(message_id)
    }

    /// Marks the agent message as streamed. Returns `false` if it was
    /// already marked.
    #[inline]
    pub(crate) fn mark_processed(&mut self, message_id: &str) -> bool {
        self.processed_message_ids.insert(message_id.to_owned())
    }

    /// Sends the prompt, starting the conversation if needed. Returns
    /// the id of the conversation the reply will appear in.
    ///
    /// Attachments are only supported on the prompt that starts the
    /// conversation, later ones are ignored with a warning.
    pub async fn send_prompt(
        &mut self,
        transport: &Transport,
        prompt: &Prompt,
    ) -> Result<String> {
        if let Some(conversation_id) = &self.conversation_id {
            if !prompt.attachments.is_empty() {
                warn!(
                    "ignoring {} attachments, the conversation has started",
                    prompt.attachments.len()
                );
            }
            continue_conversation(
                transport,
                conversation_id,
                &self.agent_id,
                &prompt.text,
            )
            .await?;
            return Ok(conversation_id.clone());
        }

        let mut fragments = Vec::with_capacity(prompt.attachments.len());
        for attachment in &prompt.attachments {
            let file_id = upload_attachment(transport, attachment).await?;
            fragments.push(ContentFragment {
                title: attachment.file_name(),
                file_id,
            });
        }

        let conversation_id = start_conversation(
            transport,
            &self.agent_id,
            &prompt.text,
            &fragments,
        )
        .await?;
        self.conversation_id = Some(conversation_id.clone());
        Ok(conversation_id)
    }
}

/// Creates a conversation whose first message mentions the agent.
///
/// The request is non-blocking: the server returns as soon as the
/// conversation exists, and the reply is streamed through its events.
pub async fn start_conversation(
    transport: &Transport,
    agent_id: &str,
    prompt_text: &str,
    fragments: &[ContentFragment],
) -> Result<String> {
    let config = transport.config();
    let request = CreateConversationRequest {
        message: PostMessageRequest {
            content: prompt_text,
            mentions: vec![Mention {
                configuration_id: agent_id,
            }],
            context: MessageContext {
                username: &config.username,
                timezone: &config.timezone,
            },
            blocking: None,
        },
        content_fragments: fragments,
        blocking: false,
    };
    let resp: CreateConversationResponse = transport
        .post(proto::CONVERSATIONS_PATH, &request)
        .await?;
    debug!("started conversation {}", resp.conversation.id);
    Ok(resp.conversation.id)
}

/// Posts a message mentioning the agent into an existing conversation.
pub async fn continue_conversation(
    transport: &Transport,
    conversation_id: &str,
    agent_id: &str,
    prompt_text: &str,
) -> Result<()> {
    let config = transport.config();
    let request = PostMessageRequest {
        content: prompt_text,
        mentions: vec![Mention {
            configuration_id: agent_id,
        }],
        context: MessageContext {
            username: &config.username,
            timezone: &config.timezone,
        },
        blocking: Some(false),
    };
    let _: IgnoredAny = transport
        .post(&proto::messages_path(conversation_id), &request)
        .await?;
    debug!("continued conversation {conversation_id}");
    Ok(())
}
