//! Login and logout.
//!
//! ARCHITECTURE
//! ============
//! Login validates everything before touching state, so a failed login
//! leaves the previous session exactly as it was. Each login mints a fresh
//! user id; ids are never reused, even for the same nickname.

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::services::catalog::Catalog;
use crate::services::domains::normalize_email;
use crate::services::rooms::ensure_college_room;
use crate::state::{AppState, College, GLOBAL_ROOM_ID, User, college_room_id};

/// `<prefix>-<32 hex>` from a random UUID.
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

/// Milliseconds since the Unix epoch; 0 if the clock is before it.
#[must_use]
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Validated login input.
struct LoginInput {
    nickname: String,
    college: Option<College>,
    email: Option<String>,
}

fn validate_login(
    catalog: &Catalog,
    nickname: &str,
    college: Option<&College>,
    email: Option<&str>,
) -> StoreResult<LoginInput> {
    let nickname = nickname.trim();
    if nickname.is_empty() {
        return Err(StoreError::validation("Please enter a nickname to continue"));
    }

    let college = match college {
        None => None,
        Some(c) => Some(
            catalog
                .find(&c.id)
                .cloned()
                .ok_or_else(|| StoreError::validation(format!("Unknown college '{}'", c.id)))?,
        ),
    };

    let email = match email.map(str::trim).filter(|e| !e.is_empty()) {
        None => None,
        Some(raw) => {
            Some(normalize_email(raw).ok_or_else(|| StoreError::validation("Please enter a valid email address"))?)
        }
    };

    Ok(LoginInput { nickname: nickname.to_owned(), college, email })
}

/// Start a session as a guest (`college = None`) or as a college member.
///
/// # Errors
///
/// `Validation` for a blank nickname, a college missing from the catalog, or
/// a malformed email. State is unchanged on error.
pub fn login(
    state: &mut AppState,
    catalog: &Catalog,
    nickname: &str,
    college: Option<&College>,
    email: Option<&str>,
) -> StoreResult<User> {
    let LoginInput { nickname, college, email } = validate_login(catalog, nickname, college, email)?;
    let user_id = generate_id("user");

    let mut user = User {
        id: user_id.clone(),
        nickname,
        email,
        college,
        logged_in: true,
        is_verified: false,
        joined_rooms: Vec::new(),
    };
    user.join(GLOBAL_ROOM_ID);

    let active_room = match &user.college {
        Some(college) => {
            ensure_college_room(state, college, &user_id, user.email.as_deref());
            let room_id = college_room_id(&college.id);
            user.join(&room_id);
            room_id
        }
        None => GLOBAL_ROOM_ID.to_owned(),
    };

    info!(
        %user_id,
        nickname = %user.nickname,
        college = user.college_id().unwrap_or("guest"),
        "user logged in"
    );

    state.user = user.clone();
    state.active_room_id = Some(active_room);
    Ok(user)
}

/// End the session. Rooms, messages and requests survive.
pub fn logout(state: &mut AppState) {
    if state.user.logged_in {
        info!(user_id = %state.user.id, "user logged out");
    }
    state.user = User::default();
    state.active_room_id = None;
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
