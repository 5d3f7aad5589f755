//! Verified-badge projection. Read-only; nothing here is stored.

use crate::state::{AppState, Message, college_id_of_room};

/// True when the active room is a college room, it is the user's own
/// college, and the user has verified their email.
#[must_use]
pub fn shows_verified_badge(state: &AppState) -> bool {
    let user = &state.user;
    if !user.logged_in || !user.is_verified {
        return false;
    }
    let Some(active) = state.active_room_id.as_deref() else {
        return false;
    };
    let room_college = match state.room(active) {
        Some(room) => room.college_id.as_deref(),
        None => college_id_of_room(active),
    };
    room_college.is_some() && room_college == user.college_id()
}

/// A message carries the badge when the badge rule holds and the message was
/// sent under the current user's nickname.
#[must_use]
pub fn message_shows_verified(state: &AppState, message: &Message) -> bool {
    message.sender == state.user.nickname
        && state.active_room_id.as_deref() == Some(message.room_id.as_str())
        && shows_verified_badge(state)
}

#[cfg(test)]
#[path = "badge_test.rs"]
mod tests;
