//! Domain services behind `ChatStore`.
//!
//! ARCHITECTURE
//! ============
//! Services are plain functions over `&mut AppState` (or pure functions) so
//! every rule can be tested without a store, a clock, or a notifier. The
//! store sequences them, supplies time, and publishes the result.

pub mod badge;
pub mod catalog;
pub mod domains;
pub mod messages;
pub mod notify;
pub mod persistence;
pub mod rooms;
pub mod session;
pub mod verification;
