//! Room registry, active room, and join-request lifecycle.
//!
//! DESIGN
//! ======
//! The global room always exists. College rooms appear the first time
//! someone logs in with that college and are never removed. Join requests
//! move `pending -> approved | rejected` exactly once.
//!
//! TRADE-OFFS
//! ==========
//! Approval only grants membership when the approved request belongs to the
//! user of this session. There is no channel to deliver an approval to
//! another user's session, so approving someone else records the decision
//! and nothing more.

use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::services::domains::email_matches_college;
use crate::services::session::generate_id;
use crate::state::{AppState, College, Decision, JoinRequest, RequestStatus, Room, college_room_id};

/// Create the college's room on first use, or promote `user_id` to moderator
/// of the existing one when `email` passes the college domain rule.
/// Returns true if a room was created.
pub(crate) fn ensure_college_room(state: &mut AppState, college: &College, user_id: &str, email: Option<&str>) -> bool {
    let room_id = college_room_id(&college.id);
    match state.room_mut(&room_id) {
        None => {
            state.rooms.push(Room::for_college(college, user_id));
            info!(%room_id, moderator = %user_id, "college room created");
            true
        }
        Some(room) => {
            if email.is_some_and(|e| email_matches_college(e, &college.id)) && room.add_moderator(user_id) {
                info!(%room_id, moderator = %user_id, "moderator added");
            }
            false
        }
    }
}

/// Switch the active room, or clear it with `None`.
///
/// # Errors
///
/// `InvalidState` when logged out or when the room has not been joined.
pub fn set_active_room(state: &mut AppState, room_id: Option<&str>) -> StoreResult<()> {
    let Some(room_id) = room_id else {
        state.active_room_id = None;
        return Ok(());
    };
    if !state.user.logged_in {
        return Err(StoreError::invalid_state("Log in to enter a room"));
    }
    if !state.user.has_joined(room_id) {
        return Err(StoreError::invalid_state(format!("You are not a member of '{room_id}'")));
    }
    state.active_room_id = Some(room_id.to_owned());
    Ok(())
}

/// Rooms shown in the sidebar: the global room, the user's college room,
/// and any other room the user has joined.
#[must_use]
pub fn visible_rooms(state: &AppState) -> Vec<&Room> {
    let college_id = state.user.college_id();
    state
        .rooms
        .iter()
        .filter(|room| {
            room.is_global() || room.college_id.as_deref() == college_id || state.user.has_joined(&room.id)
        })
        .collect()
}

/// Check that the current user may ask to join `room_id`, without
/// recording anything.
///
/// # Errors
///
/// Same as [`request_to_join_room`].
pub fn check_can_request(state: &AppState, room_id: &str) -> StoreResult<()> {
    let room_id = room_id.trim();
    if !state.user.logged_in {
        return Err(StoreError::invalid_state("Log in to request access to a room"));
    }
    if room_id.is_empty() {
        return Err(StoreError::validation("Choose a room to join"));
    }
    if state.user.has_joined(room_id) {
        return Err(StoreError::invalid_state(format!("You are already a member of '{room_id}'")));
    }
    let duplicate = state
        .join_requests
        .iter()
        .any(|r| r.is_pending() && r.user_id == state.user.id && r.room_id == room_id);
    if duplicate {
        return Err(StoreError::invalid_state(format!("A request to join '{room_id}' is already pending")));
    }
    Ok(())
}

/// Ask to join a room. The request starts `pending`; membership is
/// unchanged until it is approved. At most one pending request per user and
/// room; asking again after a rejection is allowed.
///
/// # Errors
///
/// - `InvalidState` when logged out, already a member, or a request for
///   this room is already pending.
/// - `Validation` for an empty room id.
pub fn request_to_join_room(state: &mut AppState, room_id: &str, now_ms: u64) -> StoreResult<JoinRequest> {
    check_can_request(state, room_id)?;
    let room_id = room_id.trim();

    let request = JoinRequest {
        id: generate_id("req"),
        user_id: state.user.id.clone(),
        nickname: state.user.nickname.clone(),
        room_id: room_id.to_owned(),
        status: RequestStatus::Pending,
        timestamp: now_ms,
    };
    info!(request_id = %request.id, user_id = %request.user_id, %room_id, "join request created");
    state.join_requests.push(request.clone());
    Ok(request)
}

/// Resolve a pending request.
///
/// # Errors
///
/// - `Validation` when no request has this id.
/// - `InvalidState` when the request was already resolved.
pub fn handle_join_request(state: &mut AppState, request_id: &str, decision: Decision) -> StoreResult<JoinRequest> {
    let current_user = state.user.id.clone();
    let Some(request) = state.join_requests.iter_mut().find(|r| r.id == request_id) else {
        return Err(StoreError::validation(format!("No join request '{request_id}'")));
    };
    if !request.is_pending() {
        warn!(%request_id, status = ?request.status, "join request already resolved");
        return Err(StoreError::invalid_state(format!(
            "Join request '{request_id}' is already {}",
            status_label(request.status)
        )));
    }

    request.status = decision.into();
    let resolved = request.clone();
    info!(%request_id, status = ?resolved.status, room_id = %resolved.room_id, "join request resolved");

    if resolved.status == RequestStatus::Approved && !current_user.is_empty() && resolved.user_id == current_user {
        state.user.join(&resolved.room_id);
    }
    Ok(resolved)
}

/// Pending requests for a room, oldest first.
#[must_use]
pub fn pending_requests<'a>(state: &'a AppState, room_id: &str) -> Vec<&'a JoinRequest> {
    state
        .join_requests
        .iter()
        .filter(|r| r.is_pending() && r.room_id == room_id)
        .collect()
}

fn status_label(status: RequestStatus) -> &'static str {
    match status {
        RequestStatus::Pending => "pending",
        RequestStatus::Approved => "approved",
        RequestStatus::Rejected => "rejected",
    }
}

#[cfg(test)]
#[path = "rooms_test.rs"]
mod tests;
