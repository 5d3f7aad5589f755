use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use super::*;
use crate::error::ErrorKind;
use crate::services::notify::NotifyError;
use crate::services::persistence::PersistError;
use crate::state::RequestStatus;

// =========================================================================
// MockNotifier
// =========================================================================

#[derive(Default)]
struct MockNotifier {
    fail: AtomicBool,
    codes: Mutex<Vec<(String, String)>>,
    notices: Mutex<Vec<JoinRequestNotice>>,
}

impl MockNotifier {
    fn failing() -> Self {
        Self { fail: AtomicBool::new(true), ..Self::default() }
    }

    fn last_code(&self) -> String {
        self.codes.lock().unwrap().last().unwrap().1.clone()
    }
}

#[async_trait::async_trait]
impl Notifier for MockNotifier {
    async fn send_join_request_notice(&self, notice: &JoinRequestNotice) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("mock failure".into()));
        }
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }

    async fn send_verification_code(&self, email: &str, code: &str) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("mock failure".into()));
        }
        self.codes.lock().unwrap().push((email.to_owned(), code.to_owned()));
        Ok(())
    }
}

struct Harness {
    store: ChatStore,
    notifier: Arc<MockNotifier>,
    kv: MemoryStore,
    clock: Arc<AtomicU64>,
}

fn harness_with(notifier: MockNotifier, kv: MemoryStore) -> Harness {
    let notifier = Arc::new(notifier);
    let clock = Arc::new(AtomicU64::new(1_000));
    let clock_ref = clock.clone();
    let store = ChatStore::open(Config::default(), Catalog::default(), notifier.clone(), Arc::new(kv.clone()))
        .unwrap()
        .with_clock(Arc::new(move || clock_ref.load(Ordering::SeqCst)));
    Harness { store, notifier, kv, clock }
}

fn harness() -> Harness {
    harness_with(MockNotifier::default(), MemoryStore::new())
}

fn college(store: &ChatStore, id: &str) -> College {
    store.catalog().find(id).cloned().unwrap()
}

// =========================================================================
// session
// =========================================================================

#[test]
fn guest_login_scenario() {
    let mut h = harness();
    h.store.login("Fox", None, None).unwrap();
    assert_eq!(h.store.state().active_room_id.as_deref(), Some("global"));
    assert_eq!(h.store.user().joined_rooms, vec!["global".to_owned()]);
    assert_eq!(h.store.session_status(), SessionStatus::Guest);
}

#[test]
fn two_sessions_share_one_college_room() {
    let kv = MemoryStore::new();
    let mut first = harness_with(MockNotifier::default(), kv.clone());
    let iit = college(&first.store, "iit-delhi");
    let owl = first.store.login("Owl", Some(&iit), None).unwrap();

    let mut second = harness_with(MockNotifier::default(), kv);
    let fox = second.store.login("Fox", Some(&iit), None).unwrap();

    let rooms: Vec<_> = second
        .store
        .state()
        .rooms
        .iter()
        .filter(|r| r.college_id.as_deref() == Some("iit-delhi"))
        .collect();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].id, "college-iit-delhi");
    assert!(rooms[0].is_moderator(&owl.id));
    assert!(!rooms[0].is_moderator(&fox.id));
    first.store.logout().unwrap();
}

#[test]
fn logout_resets_regardless_of_state() {
    let mut h = harness();
    let jnu = college(&h.store, "jnu");
    h.store.login("Owl", Some(&jnu), None).unwrap();
    h.store.request_to_join_room("college-tiss").unwrap();
    h.store.logout().unwrap();
    assert!(h.store.user().joined_rooms.is_empty());
    assert!(h.store.state().active_room_id.is_none());
    assert_eq!(h.store.session_status(), SessionStatus::LoggedOut);
    h.store.logout().unwrap();
}

// =========================================================================
// snapshots and persistence
// =========================================================================

#[test]
fn subscribers_see_committed_changes_only() {
    let mut h = harness();
    let mut rx = h.store.subscribe();
    assert!(!rx.has_changed().unwrap());

    h.store.login("", None, None).unwrap_err();
    assert!(!rx.has_changed().unwrap());

    h.store.login("Fox", None, None).unwrap();
    assert!(rx.has_changed().unwrap());
    let snapshot = rx.borrow_and_update().clone();
    assert_eq!(snapshot.user.nickname, "Fox");
    assert_eq!(*h.store.snapshot(), *h.store.state());
}

#[test]
fn state_is_saved_and_restored() {
    let h = {
        let mut h = harness();
        let jnu = college(&h.store, "jnu");
        h.store.login("Owl", Some(&jnu), None).unwrap();
        h.store.add_message("hello").unwrap();
        h
    };
    assert!(h.kv.get(DEFAULT_KEY).unwrap().is_some());

    let restored = harness_with(MockNotifier::default(), h.kv.clone());
    assert_eq!(restored.store.state(), h.store.state());
    assert_eq!(restored.store.active_room_messages().len(), 1);
}

#[test]
fn corrupt_snapshot_fails_open() {
    let kv = MemoryStore::new();
    kv.set(DEFAULT_KEY, "{broken").unwrap();
    let result = ChatStore::open(Config::default(), Catalog::default(), Arc::new(MockNotifier::default()), Arc::new(kv));
    assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::Persistence));
}

const DEFAULT_KEY: &str = crate::config::DEFAULT_STORAGE_KEY;

// =========================================================================
// rooms and messages
// =========================================================================

#[test]
fn add_message_needs_active_room() {
    let mut h = harness();
    h.store.login("Fox", None, None).unwrap();
    h.store.set_active_room(None).unwrap();
    let err = h.store.add_message("hi").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert!(h.store.active_room_messages().is_empty());
}

#[test]
fn messages_stay_in_their_room() {
    let mut h = harness();
    let jnu = college(&h.store, "jnu");
    h.store.login("Owl", Some(&jnu), None).unwrap();
    h.store.add_message("college only").unwrap();
    h.store.set_active_room(Some("global")).unwrap();
    h.store.add_message("everyone").unwrap();

    let global: Vec<_> = h.store.room_messages("global").map(|m| m.content.clone()).collect();
    assert_eq!(global, vec!["everyone".to_owned()]);
    assert_eq!(h.store.room_messages("college-jnu").count(), 1);
}

#[test]
fn join_request_approved_by_requester() {
    let mut h = harness();
    h.store.login("Owl", None, None).unwrap();
    let request = h.store.request_to_join_room("college-x").unwrap();
    assert_eq!(request.timestamp, 1_000);
    assert_eq!(h.store.pending_requests("college-x").len(), 1);

    h.store.handle_join_request(&request.id, Decision::Approve).unwrap();
    assert!(h.store.user().has_joined("college-x"));
    assert!(h.store.pending_requests("college-x").is_empty());

    let err = h.store.handle_join_request(&request.id, Decision::Approve).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test]
async fn submit_join_request_sends_notice_then_records() {
    let mut h = harness();
    h.store.login("Owl", None, None).unwrap();
    let request = h.store.submit_join_request("jnu", "Owl", "owl@student.jnu.ac.in").await.unwrap();
    assert_eq!(request.room_id, "college-jnu");
    assert_eq!(request.status, RequestStatus::Pending);

    let notices = h.notifier.notices.lock().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].college_name, "Jawaharlal Nehru University");
    assert_eq!(notices[0].email, "owl@student.jnu.ac.in");
}

#[tokio::test]
async fn submit_join_request_validates_before_sending() {
    let mut h = harness();
    h.store.login("Owl", None, None).unwrap();

    let err = h.store.submit_join_request("jnu", "", "owl@jnu.edu").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = h.store.submit_join_request("jnu", "Owl", "owl").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = h.store.submit_join_request("hogwarts", "Owl", "owl@hogwarts.edu").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = h.store.submit_join_request("jnu", "Owl", "owl@gmail.com").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DomainMismatch);
    assert!(err.to_string().contains("jnu.edu, jnu.ac.in"));

    h.store.submit_join_request("jnu", "Owl", "owl@jnu.edu").await.unwrap();
    let err = h.store.submit_join_request("jnu", "Owl", "owl@jnu.edu").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    assert_eq!(h.notifier.notices.lock().unwrap().len(), 1);
    assert_eq!(h.store.state().join_requests.len(), 1);
}

#[tokio::test]
async fn failed_notice_records_nothing() {
    let mut h = harness_with(MockNotifier::failing(), MemoryStore::new());
    h.store.login("Owl", None, None).unwrap();
    let err = h.store.submit_join_request("jnu", "Owl", "owl@jnu.edu").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotificationFailure);
    assert!(h.store.state().join_requests.is_empty());
}

#[tokio::test]
async fn load_colleges_fills_state() {
    let mut h = harness();
    let mut rx = h.store.subscribe();
    let colleges = h.store.load_colleges(ProgramLevel::Postgraduate).await.unwrap();
    assert_eq!(colleges.len(), 10);
    assert_eq!(h.store.state().colleges, colleges);
    assert!(!h.store.state().fetching_colleges);
    assert!(rx.has_changed().unwrap());
}

/// Reads nothing and refuses every write.
struct FailingKv;

impl KvStore for FailingKv {
    fn get(&self, _key: &str) -> Result<Option<String>, PersistError> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), PersistError> {
        Err(std::io::Error::other("disk full").into())
    }

    fn remove(&self, _key: &str) -> Result<(), PersistError> {
        Ok(())
    }
}

#[tokio::test]
async fn load_colleges_clears_flag_when_save_fails() {
    let mut store =
        ChatStore::open(Config::default(), Catalog::default(), Arc::new(MockNotifier::default()), Arc::new(FailingKv))
            .unwrap();
    let err = store.load_colleges(ProgramLevel::Undergraduate).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert!(!store.state().fetching_colleges);
    assert!(!store.snapshot().fetching_colleges);
    assert_eq!(store.state().colleges.len(), 10);
}

#[tokio::test]
async fn fetching_flag_is_never_saved() {
    let mut h = harness();
    h.store.load_colleges(ProgramLevel::Undergraduate).await.unwrap();
    let restored = harness_with(MockNotifier::default(), h.kv.clone());
    assert!(!restored.store.state().fetching_colleges);
    assert_eq!(restored.store.state().colleges.len(), 10);
}

#[test]
fn loading_flag_round_trips() {
    let mut h = harness();
    h.store.set_loading(true).unwrap();
    assert!(h.store.state().is_loading);
    h.store.set_loading(false).unwrap();
    assert!(!h.store.state().is_loading);
}

// =========================================================================
// verification
// =========================================================================

async fn member_with_code(h: &mut Harness) -> String {
    let jnu = college(&h.store, "jnu");
    h.store.login("Owl", Some(&jnu), None).unwrap();
    h.store.send_verification_code("Owl@JNU.ac.in").await.unwrap();
    h.notifier.last_code()
}

#[tokio::test]
async fn correct_code_verifies() {
    let mut h = harness();
    let code = member_with_code(&mut h).await;
    assert!(h.store.has_pending_verification());
    assert_eq!(h.store.user().email.as_deref(), Some("owl@jnu.ac.in"));
    assert!(!h.store.user().is_verified);

    h.store.verify_email("owl@jnu.ac.in", &code).unwrap();
    assert!(h.store.user().is_verified);
    assert_eq!(h.store.session_status(), SessionStatus::Verified);
    assert!(!h.store.has_pending_verification());
    assert!(h.store.shows_verified_badge());
}

#[tokio::test]
async fn wrong_or_empty_code_leaves_state() {
    let mut h = harness();
    let code = member_with_code(&mut h).await;
    let wrong = if code == "111111" { "222222" } else { "111111" };

    for attempt in [wrong, ""] {
        let err = h.store.verify_email("owl@jnu.ac.in", attempt).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Verification);
    }
    assert!(!h.store.user().is_verified);
    h.store.verify_email("owl@jnu.ac.in", &code).unwrap();
}

#[tokio::test]
async fn only_latest_code_works() {
    let mut h = harness();
    let old = member_with_code(&mut h).await;
    h.store.send_verification_code("owl@jnu.ac.in").await.unwrap();
    let new = h.notifier.last_code();

    if old != new {
        let err = h.store.verify_email("owl@jnu.ac.in", &old).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Verification);
    }
    h.store.verify_email("owl@jnu.ac.in", &new).unwrap();
}

#[tokio::test]
async fn code_expires_after_ttl() {
    let mut h = harness();
    let code = member_with_code(&mut h).await;
    let ttl_ms = u64::try_from(Config::default().code_ttl.as_millis()).unwrap();
    h.clock.fetch_add(ttl_ms, Ordering::SeqCst);

    assert!(!h.store.has_pending_verification());
    let err = h.store.verify_email("owl@jnu.ac.in", &code).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Verification);
}

#[tokio::test]
async fn too_many_wrong_codes_burn_token() {
    let mut h = harness();
    let code = member_with_code(&mut h).await;
    let wrong = if code == "111111" { "222222" } else { "111111" };
    for _ in 0..Config::default().max_code_attempts {
        h.store.verify_email("owl@jnu.ac.in", wrong).unwrap_err();
    }
    let err = h.store.verify_email("owl@jnu.ac.in", &code).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Verification);
}

#[tokio::test]
async fn verification_requires_college_and_domain() {
    let mut h = harness();
    h.store.login("Fox", None, None).unwrap();
    let err = h.store.send_verification_code("fox@jnu.ac.in").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let jnu = college(&h.store, "jnu");
    h.store.login("Owl", Some(&jnu), None).unwrap();
    let err = h.store.send_verification_code("owl@gmail.com").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DomainMismatch);
    let err = h.store.send_verification_code("nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    let err = h.store.verify_email("owl@jnu.ac.in", "123456").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Verification);
    assert!(h.notifier.codes.lock().unwrap().is_empty());
}

#[tokio::test]
async fn code_for_other_address_refused() {
    let mut h = harness();
    let code = member_with_code(&mut h).await;
    let err = h.store.verify_email("fox@jnu.ac.in", &code).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Verification);
}

#[tokio::test]
async fn failed_first_send_leaves_no_code() {
    let mut h = harness_with(MockNotifier::failing(), MemoryStore::new());
    let jnu = college(&h.store, "jnu");
    h.store.login("Owl", Some(&jnu), None).unwrap();
    let err = h.store.send_verification_code("owl@jnu.ac.in").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotificationFailure);
    assert!(!h.store.has_pending_verification());
    assert!(h.store.user().email.is_none());
}

#[tokio::test]
async fn failed_resend_invalidates_previous_code() {
    let mut h = harness();
    let first = member_with_code(&mut h).await;

    h.notifier.fail.store(true, Ordering::SeqCst);
    let err = h.store.send_verification_code("owl@jnu.ac.in").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotificationFailure);
    assert!(!h.store.has_pending_verification());

    let err = h.store.verify_email("owl@jnu.ac.in", &first).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Verification);
    assert!(!h.store.user().is_verified);
}

#[tokio::test]
async fn logout_and_relogin_drop_pending_code() {
    let mut h = harness();
    let code = member_with_code(&mut h).await;
    h.store.logout().unwrap();
    assert!(!h.store.has_pending_verification());

    let jnu = college(&h.store, "jnu");
    h.store.login("Owl", Some(&jnu), None).unwrap();
    let err = h.store.verify_email("owl@jnu.ac.in", &code).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Verification);
}

#[tokio::test]
async fn already_verified_cannot_request_again() {
    let mut h = harness();
    let code = member_with_code(&mut h).await;
    h.store.verify_email("owl@jnu.ac.in", &code).unwrap();
    let err = h.store.send_verification_code("owl@jnu.ac.in").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
}

#[tokio::test(start_paused = true)]
async fn from_config_uses_simulated_delays() {
    let config = Config { notify_delay: Duration::from_millis(800), ..Config::default() };
    let mut store = ChatStore::from_config(config).unwrap();
    let jnu = store.catalog().find("jnu").cloned().unwrap();
    store.login("Owl", Some(&jnu), None).unwrap();

    let start = tokio::time::Instant::now();
    store.send_verification_code("owl@jnu.edu").await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(800));
    assert!(store.has_pending_verification());
}
