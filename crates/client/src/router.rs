use crate::Session;
use crate::model::Observers;
use crate::proto::ConversationEvent;

/// Decides what a conversation-level event means for the current turn.
///
/// Returns the id of an agent message whose events should be streamed
/// next. An agent message is handed out at most once per session, no
/// matter how many times the conversation stream announces it.
pub(crate) fn route(
    event: ConversationEvent,
    session: &mut Session,
    observers: &Observers,
) -> Option<String> {
    match event {
        ConversationEvent::UserMessageNew => None,
        ConversationEvent::ConversationTitle { title } => {
            debug!("conversation title: {title}");
            if let Some(on_title) = &observers.on_title {
                on_title(&title);
            }
            None
        }
        ConversationEvent::AgentMessageNew { message_id } => {
            if !session.mark_processed(&message_id) {
                trace!("skipping processed agent message {message_id}");
                return None;
            }
            debug!("streaming agent message {message_id}");
            Some(message_id)
        }
        ConversationEvent::Unknown { raw_type } => {
            warn!("unknown conversation event type: {raw_type}");
            None
        }
    }
}
