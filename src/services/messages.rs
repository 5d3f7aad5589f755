//! Append-only message log.

use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::services::session::generate_id;
use crate::state::{AppState, Message};

/// Post to a joined room as the current user. Timestamps never go backwards:
/// a clock behind the last message is clamped to it.
///
/// # Errors
///
/// - `Validation` for blank content.
/// - `InvalidState` when logged out or not a member of the room.
pub fn add_message(state: &mut AppState, room_id: &str, content: &str, now_ms: u64) -> StoreResult<Message> {
    let content = content.trim();
    if content.is_empty() {
        return Err(StoreError::validation("Message is empty"));
    }
    if !state.user.logged_in {
        return Err(StoreError::invalid_state("Log in to send messages"));
    }
    if !state.user.has_joined(room_id) {
        return Err(StoreError::invalid_state(format!("You are not a member of '{room_id}'")));
    }

    let last = state.messages.last().map_or(0, |m| m.timestamp);
    let message = Message {
        id: generate_id("msg"),
        content: content.to_owned(),
        sender: state.user.nickname.clone(),
        timestamp: now_ms.max(last),
        room_id: room_id.to_owned(),
    };
    debug!(message_id = %message.id, %room_id, "message added");
    state.messages.push(message.clone());
    Ok(message)
}

/// Messages of one room in posting order.
pub fn room_messages<'a>(state: &'a AppState, room_id: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
    state.messages.iter().filter(move |m| m.room_id == room_id)
}

#[cfg(test)]
#[path = "messages_test.rs"]
mod tests;
