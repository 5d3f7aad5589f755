//! Session, room-membership and verification core for an anonymous
//! college chat.
//!
//! `ChatStore` owns all state and is the only mutation surface. Everything
//! else is either plain data (`state`), a pure rule (`services::domains`),
//! or a collaborator behind a trait (`Notifier`, `KvStore`).

pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod store;

pub use config::Config;
pub use error::{ErrorKind, StoreError, StoreResult};
pub use services::catalog::Catalog;
pub use services::notify::{LogNotifier, Notifier, NotifyError};
pub use services::persistence::{FileStore, KvStore, MemoryStore};
pub use state::{AppState, College, Decision, JoinRequest, Message, ProgramLevel, RequestStatus, Room, SessionStatus, User};
pub use store::ChatStore;
