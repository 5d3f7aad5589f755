//! Chat state model.
//!
//! DESIGN
//! ======
//! `AppState` is the whole persisted state: the session user, the room
//! registry, the message log, the fetched college list and the join-request
//! queue. It is plain data; every mutation goes through `ChatStore`, which
//! hands observers immutable `Arc<AppState>` snapshots.
//!
//! Serialized field names are camelCase so a snapshot reads the same as the
//! browser storage layout it replaces.

use serde::{Deserialize, Serialize};

/// Id of the single room with no college.
pub const GLOBAL_ROOM_ID: &str = "global";
pub const GLOBAL_ROOM_NAME: &str = "Global Chat";

const COLLEGE_ROOM_PREFIX: &str = "college-";

/// Room id for a college, e.g. `college-iit-delhi`.
#[must_use]
pub fn college_room_id(college_id: &str) -> String {
    format!("{COLLEGE_ROOM_PREFIX}{college_id}")
}

/// Inverse of [`college_room_id`]. `None` for the global room and unknown shapes.
#[must_use]
pub fn college_id_of_room(room_id: &str) -> Option<&str> {
    room_id.strip_prefix(COLLEGE_ROOM_PREFIX).filter(|id| !id.is_empty())
}

// =============================================================================
// COLLEGE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramLevel {
    Undergraduate,
    Postgraduate,
}

/// Catalog reference data. Never mutated by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct College {
    pub id: String,
    pub name: String,
    pub level: ProgramLevel,
}

// =============================================================================
// USER
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Empty while logged out.
    pub id: String,
    pub nickname: String,
    pub email: Option<String>,
    pub college: Option<College>,
    pub logged_in: bool,
    #[serde(default)]
    pub is_verified: bool,
    /// Insertion-ordered, no duplicates.
    pub joined_rooms: Vec<String>,
}

impl User {
    #[must_use]
    pub fn has_joined(&self, room_id: &str) -> bool {
        self.joined_rooms.iter().any(|r| r == room_id)
    }

    /// Add a room to the joined set. Returns false if it was already there.
    pub fn join(&mut self, room_id: &str) -> bool {
        if self.has_joined(room_id) {
            return false;
        }
        self.joined_rooms.push(room_id.to_owned());
        true
    }

    #[must_use]
    pub fn college_id(&self) -> Option<&str> {
        self.college.as_ref().map(|c| c.id.as_str())
    }
}

/// Derived position in the login/verification lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    LoggedOut,
    Guest,
    Unverified,
    Verified,
}

impl SessionStatus {
    #[must_use]
    pub fn of(user: &User) -> Self {
        match (user.logged_in, user.college.is_some(), user.is_verified) {
            (false, _, _) => Self::LoggedOut,
            (true, false, _) => Self::Guest,
            (true, true, false) => Self::Unverified,
            (true, true, true) => Self::Verified,
        }
    }
}

// =============================================================================
// ROOM
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    /// `None` marks the global room.
    pub college_id: Option<String>,
    /// User ids, add-only.
    pub moderators: Vec<String>,
}

impl Room {
    #[must_use]
    pub fn global() -> Self {
        Self {
            id: GLOBAL_ROOM_ID.to_owned(),
            name: GLOBAL_ROOM_NAME.to_owned(),
            college_id: None,
            moderators: Vec::new(),
        }
    }

    #[must_use]
    pub fn for_college(college: &College, first_moderator: &str) -> Self {
        Self {
            id: college_room_id(&college.id),
            name: format!("{} Chat", college.name),
            college_id: Some(college.id.clone()),
            moderators: vec![first_moderator.to_owned()],
        }
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.college_id.is_none()
    }

    #[must_use]
    pub fn is_moderator(&self, user_id: &str) -> bool {
        self.moderators.iter().any(|m| m == user_id)
    }

    /// Returns false if the user already moderates this room.
    pub fn add_moderator(&mut self, user_id: &str) -> bool {
        if self.is_moderator(user_id) {
            return false;
        }
        self.moderators.push(user_id.to_owned());
        true
    }
}

// =============================================================================
// JOIN REQUEST
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A moderator's decision on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for RequestStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => Self::Approved,
            Decision::Reject => Self::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub id: String,
    pub user_id: String,
    pub nickname: String,
    pub room_id: String,
    pub status: RequestStatus,
    pub timestamp: u64,
}

impl JoinRequest {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

// =============================================================================
// MESSAGE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub content: String,
    pub sender: String,
    pub timestamp: u64,
    pub room_id: String,
}

// =============================================================================
// APP STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub user: User,
    pub rooms: Vec<Room>,
    pub messages: Vec<Message>,
    pub colleges: Vec<College>,
    pub join_requests: Vec<JoinRequest>,
    pub active_room_id: Option<String>,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default)]
    pub fetching_colleges: bool,
}

impl AppState {
    /// Logged out, with only the global room.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user: User::default(),
            rooms: vec![Room::global()],
            messages: Vec::new(),
            colleges: Vec::new(),
            join_requests: Vec::new(),
            active_room_id: None,
            is_loading: false,
            fetching_colleges: false,
        }
    }

    #[must_use]
    pub fn room(&self, room_id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == room_id)
    }

    pub(crate) fn room_mut(&mut self, room_id: &str) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == room_id)
    }

    #[must_use]
    pub fn join_request(&self, request_id: &str) -> Option<&JoinRequest> {
        self.join_requests.iter().find(|r| r.id == request_id)
    }

    #[must_use]
    pub fn session_status(&self) -> SessionStatus {
        SessionStatus::of(&self.user)
    }

    /// Restore the invariant that the global room exists, e.g. after loading
    /// a snapshot that lost it.
    pub(crate) fn ensure_global_room(&mut self) {
        if !self.rooms.iter().any(Room::is_global) {
            self.rooms.insert(0, Room::global());
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
