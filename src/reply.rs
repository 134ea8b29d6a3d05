use crate::models::ThreadMessage;

pub const NO_REPLY: &str = "No response from agent.";

/// First assistant text in the order the service returned the messages.
///
/// Only the first content block of each assistant message is looked at. When
/// nothing matches the caller still gets `NO_REPLY` rather than an error.
pub fn extract_latest_assistant_reply(messages: &[ThreadMessage]) -> String {
  messages
    .iter()
    .filter(|m| m.role == "assistant")
    .find_map(|m| {
      m.content
        .first()
        .and_then(|block| block.text.as_ref())
        .and_then(|text| text.value.as_deref())
        .filter(|value| !value.is_empty())
    })
    .unwrap_or(NO_REPLY)
    .to_string()
}
