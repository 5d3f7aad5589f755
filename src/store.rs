//! The state owner.
//!
//! DESIGN
//! ======
//! `ChatStore` is the only way to change chat state. Each operation runs a
//! service function against the owned `AppState`, then commits: observers
//! get a fresh `Arc<AppState>` over a `watch` channel and the snapshot is
//! saved to the key-value store. An operation rejected by validation changes
//! nothing and publishes nothing.
//!
//! The pending verification token lives here, beside the state rather
//! than inside it, so it is never published or persisted.
//!
//! TRADE-OFFS
//! ==========
//! If the save fails after a successful mutation the change is kept and
//! published; the caller gets the `Persistence` error and may retry `save`.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{StoreError, StoreResult};
use crate::services::catalog::Catalog;
use crate::services::domains::{email_matches_college, example_domains, normalize_email};
use crate::services::notify::{JoinRequestNotice, LogNotifier, Notifier};
use crate::services::persistence::{self, FileStore, KvStore, MemoryStore};
use crate::services::verification::VerificationToken;
use crate::services::{badge, messages, rooms, session};
use crate::state::{
    AppState, College, Decision, JoinRequest, Message, ProgramLevel, Room, SessionStatus, User, college_room_id,
};

/// Source of "now" in Unix milliseconds.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

pub struct ChatStore {
    state: AppState,
    config: Config,
    catalog: Catalog,
    notifier: Arc<dyn Notifier>,
    kv: Arc<dyn KvStore>,
    clock: Clock,
    pending_verification: Option<VerificationToken>,
    snapshots: watch::Sender<Arc<AppState>>,
}

impl ChatStore {
    /// Open a store, restoring the saved snapshot if there is one.
    ///
    /// # Errors
    ///
    /// Returns `Persistence` if a saved snapshot exists but cannot be read.
    pub fn open(
        config: Config,
        catalog: Catalog,
        notifier: Arc<dyn Notifier>,
        kv: Arc<dyn KvStore>,
    ) -> StoreResult<Self> {
        let state = persistence::load(kv.as_ref(), &config.storage_key)?.unwrap_or_default();
        let (snapshots, _) = watch::channel(Arc::new(state.clone()));
        Ok(Self {
            state,
            config,
            catalog,
            notifier,
            kv,
            clock: Arc::new(session::now_ms),
            pending_verification: None,
            snapshots,
        })
    }

    /// Open with the built-in catalog, the logging notifier, and a file store
    /// under `data_dir` (in-memory when unset).
    ///
    /// # Errors
    ///
    /// Same as [`ChatStore::open`].
    pub fn from_config(config: Config) -> StoreResult<Self> {
        let catalog = Catalog::with_defaults(config.catalog_delay);
        let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier::new(config.notify_delay));
        let kv: Arc<dyn KvStore> = match &config.data_dir {
            Some(dir) => Arc::new(FileStore::new(dir.clone())),
            None => Arc::new(MemoryStore::new()),
        };
        Self::open(config, catalog, notifier, kv)
    }

    /// Replace the clock, mainly to control token expiry.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    // =========================================================================
    // READ SIDE
    // =========================================================================

    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AppState> {
        self.snapshots.borrow().clone()
    }

    /// Receive a new snapshot after every committed change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<AppState>> {
        self.snapshots.subscribe()
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn user(&self) -> &User {
        &self.state.user
    }

    #[must_use]
    pub fn session_status(&self) -> SessionStatus {
        self.state.session_status()
    }

    #[must_use]
    pub fn visible_rooms(&self) -> Vec<&Room> {
        rooms::visible_rooms(&self.state)
    }

    pub fn room_messages<'a>(&'a self, room_id: &'a str) -> impl Iterator<Item = &'a Message> + 'a {
        messages::room_messages(&self.state, room_id)
    }

    /// Messages of the active room; empty when no room is active.
    #[must_use]
    pub fn active_room_messages(&self) -> Vec<&Message> {
        match self.state.active_room_id.as_deref() {
            Some(room_id) => messages::room_messages(&self.state, room_id).collect(),
            None => Vec::new(),
        }
    }

    #[must_use]
    pub fn pending_requests(&self, room_id: &str) -> Vec<&JoinRequest> {
        rooms::pending_requests(&self.state, room_id)
    }

    #[must_use]
    pub fn shows_verified_badge(&self) -> bool {
        badge::shows_verified_badge(&self.state)
    }

    #[must_use]
    pub fn message_shows_verified(&self, message: &Message) -> bool {
        badge::message_shows_verified(&self.state, message)
    }

    /// Whether a verification code is outstanding and still usable.
    #[must_use]
    pub fn has_pending_verification(&self) -> bool {
        let now = self.now();
        self.pending_verification.as_ref().is_some_and(|t| t.is_live(now))
    }

    // =========================================================================
    // SESSION
    // =========================================================================

    /// # Errors
    ///
    /// See [`session::login`].
    pub fn login(&mut self, nickname: &str, college: Option<&College>, email: Option<&str>) -> StoreResult<User> {
        let user = session::login(&mut self.state, &self.catalog, nickname, college, email)?;
        self.pending_verification = None;
        self.commit()?;
        Ok(user)
    }

    /// # Errors
    ///
    /// Only `Persistence`; the logout itself always happens.
    pub fn logout(&mut self) -> StoreResult<()> {
        session::logout(&mut self.state);
        self.pending_verification = None;
        self.commit()
    }

    /// Toggle the loading flag a caller sets around a slow login.
    ///
    /// # Errors
    ///
    /// Only `Persistence`.
    pub fn set_loading(&mut self, loading: bool) -> StoreResult<()> {
        self.state.is_loading = loading;
        self.commit()
    }

    // =========================================================================
    // ROOMS AND MESSAGES
    // =========================================================================

    /// # Errors
    ///
    /// See [`rooms::set_active_room`].
    pub fn set_active_room(&mut self, room_id: Option<&str>) -> StoreResult<()> {
        rooms::set_active_room(&mut self.state, room_id)?;
        self.commit()
    }

    /// Post to the active room.
    ///
    /// # Errors
    ///
    /// `InvalidState` when no room is active, otherwise see [`messages::add_message`].
    pub fn add_message(&mut self, content: &str) -> StoreResult<Message> {
        let Some(room_id) = self.state.active_room_id.clone() else {
            return Err(StoreError::invalid_state("Pick a room before sending messages"));
        };
        self.add_message_to(&room_id, content)
    }

    /// # Errors
    ///
    /// See [`messages::add_message`].
    pub fn add_message_to(&mut self, room_id: &str, content: &str) -> StoreResult<Message> {
        let now = self.now();
        let message = messages::add_message(&mut self.state, room_id, content, now)?;
        self.commit()?;
        Ok(message)
    }

    /// # Errors
    ///
    /// See [`rooms::request_to_join_room`].
    pub fn request_to_join_room(&mut self, room_id: &str) -> StoreResult<JoinRequest> {
        let now = self.now();
        let request = rooms::request_to_join_room(&mut self.state, room_id, now)?;
        self.commit()?;
        Ok(request)
    }

    /// # Errors
    ///
    /// See [`rooms::handle_join_request`].
    pub fn handle_join_request(&mut self, request_id: &str, decision: Decision) -> StoreResult<JoinRequest> {
        let request = rooms::handle_join_request(&mut self.state, request_id, decision)?;
        self.commit()?;
        Ok(request)
    }

    /// The join form: check the address against the college, notify the
    /// college's moderators, then record a pending request for its room.
    ///
    /// # Errors
    ///
    /// - `Validation` for a blank nickname/email, a malformed email, or an
    ///   unknown college.
    /// - `DomainMismatch` when the email is not from the college.
    /// - `InvalidState` when a request cannot be made (see [`rooms::check_can_request`]).
    /// - `NotificationFailure` when the notice could not be sent; nothing is recorded.
    pub async fn submit_join_request(&mut self, college_id: &str, nickname: &str, email: &str) -> StoreResult<JoinRequest> {
        let nickname = nickname.trim();
        if nickname.is_empty() || email.trim().is_empty() {
            return Err(StoreError::validation("Please provide both your nickname and college email"));
        }
        let email = normalize_email(email).ok_or_else(|| StoreError::validation("Please enter a valid email address"))?;
        let college = self
            .catalog
            .find(college_id)
            .cloned()
            .ok_or_else(|| StoreError::validation(format!("Unknown college '{college_id}'")))?;
        require_college_domain(&email, &college)?;

        let room_id = college_room_id(&college.id);
        rooms::check_can_request(&self.state, &room_id)?;

        let notice = JoinRequestNotice {
            nickname: nickname.to_owned(),
            email,
            college_id: college.id.clone(),
            college_name: college.name.clone(),
        };
        if let Err(e) = self.notifier.send_join_request_notice(&notice).await {
            warn!(error = %e, college_id = %college.id, "join request notice failed");
            return Err(e.into());
        }

        self.request_to_join_room(&room_id)
    }

    /// Fetch the catalog for a level into state, raising `fetching_colleges`
    /// for the duration. The raised flag is published but never saved.
    ///
    /// # Errors
    ///
    /// Only `Persistence`; the flag is cleared either way.
    pub async fn load_colleges(&mut self, level: ProgramLevel) -> StoreResult<Vec<College>> {
        self.state.fetching_colleges = true;
        self.publish();
        let colleges = self.catalog.fetch(level).await;
        self.state.colleges = colleges.clone();
        self.state.fetching_colleges = false;
        self.commit()?;
        Ok(colleges)
    }

    // =========================================================================
    // VERIFICATION
    // =========================================================================

    /// Issue a fresh code for `raw_email` and send it. Any earlier code stops
    /// working immediately, even if this send fails.
    ///
    /// # Errors
    ///
    /// - `Validation` when not logged in with a college, or the email is malformed.
    /// - `InvalidState` when already verified.
    /// - `DomainMismatch` when the email is not from the user's college.
    /// - `NotificationFailure` when the code could not be sent.
    pub async fn send_verification_code(&mut self, raw_email: &str) -> StoreResult<()> {
        let (email, college) = self.verification_target(raw_email)?;
        if self.state.user.is_verified {
            return Err(StoreError::invalid_state("Your email is already verified"));
        }

        self.pending_verification = None;
        let (token, code) = VerificationToken::issue(&email, self.now(), self.config.code_ttl);
        if let Err(e) = self.notifier.send_verification_code(&email, &code).await {
            error!(error = %e, college_id = %college.id, "verification email failed");
            return Err(e.into());
        }

        info!(user_id = %self.state.user.id, expires_at_ms = token.expires_at_ms(), "verification code issued");
        self.pending_verification = Some(token);
        self.state.user.email = Some(email);
        self.commit()
    }

    /// Check a code against the outstanding token for `raw_email`.
    ///
    /// # Errors
    ///
    /// - `Validation` / `DomainMismatch` as for [`ChatStore::send_verification_code`].
    /// - `Verification` when there is no live code for this address or the code is wrong.
    pub fn verify_email(&mut self, raw_email: &str, code: &str) -> StoreResult<()> {
        let (email, _) = self.verification_target(raw_email)?;
        let now = self.now();
        let max_attempts = self.config.max_code_attempts;

        let Some(token) = self.pending_verification.as_mut() else {
            return Err(StoreError::verification("No verification code has been requested"));
        };
        if let Err(e) = token.check(&email, code, now, max_attempts) {
            warn!(user_id = %self.state.user.id, reason = %e, "verification failed");
            return Err(StoreError::verification(e.to_string()));
        }

        self.pending_verification = None;
        self.state.user.is_verified = true;
        self.state.user.email = Some(email);
        info!(user_id = %self.state.user.id, "email verified");
        self.commit()
    }

    /// Normalized email plus the user's college, after the shared checks.
    fn verification_target(&self, raw_email: &str) -> StoreResult<(String, College)> {
        let user = &self.state.user;
        let college = match (&user.college, user.logged_in) {
            (Some(college), true) => college.clone(),
            _ => {
                return Err(StoreError::validation(
                    "You need to be associated with a college to verify your email",
                ));
            }
        };
        let email =
            normalize_email(raw_email).ok_or_else(|| StoreError::validation("Please enter your email address"))?;
        require_college_domain(&email, &college)?;
        Ok((email, college))
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Save the current state now.
    ///
    /// # Errors
    ///
    /// `Persistence` if the write fails.
    pub fn save(&self) -> StoreResult<()> {
        persistence::save(self.kv.as_ref(), &self.config.storage_key, &self.state)?;
        Ok(())
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.state.clone()));
    }

    fn commit(&mut self) -> StoreResult<()> {
        self.publish();
        if let Err(e) = self.save() {
            error!(error = %e, key = %self.config.storage_key, "snapshot save failed");
            return Err(e);
        }
        Ok(())
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }
}

fn require_college_domain(email: &str, college: &College) -> StoreResult<()> {
    if email_matches_college(email, &college.id) {
        return Ok(());
    }
    Err(StoreError::DomainMismatch(format!(
        "Your email must be from {}'s domain (e.g., {})",
        college.name,
        example_domains(&college.id)
    )))
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
