use concierge_core::domain::message::Message;

/// Text of the most recent message by `created_at`, or `""` when the newest
/// message has no text part or the list is empty. Input order is not trusted.
pub fn latest_reply(messages: &[Message]) -> String {
    let mut ordered: Vec<&Message> = messages.iter().collect();
    ordered.sort_by(|left, right| right.created_at.cmp(&left.created_at));

    ordered
        .first()
        .and_then(|message| message.first_text())
        .map(str::to_string)
        .unwrap_or_default()
}
