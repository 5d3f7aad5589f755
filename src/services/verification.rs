//! Email verification codes.
//!
//! ARCHITECTURE
//! ============
//! A `VerificationToken` is owned by the store, never persisted, and holds
//! only a SHA-256 hash of the code. Issuing a new token replaces the old one,
//! so only the most recent code can ever match. A token dies when it is
//! consumed, when its TTL passes, or after too many wrong guesses.

use std::time::Duration;

use rand::Rng;
use sha2::{Digest, Sha256};

pub const CODE_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("no verification code has been requested")]
    Missing,
    #[error("the verification code has expired, request a new one")]
    Expired,
    #[error("the verification code was already used, request a new one")]
    Consumed,
    #[error("the verification code was sent to a different address")]
    WrongEmail,
    #[error("the verification code is incorrect")]
    Mismatch,
    #[error("too many incorrect attempts, request a new code")]
    AttemptsExhausted,
}

/// Random six-digit code in `100000..=999999`.
#[must_use]
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(100_000..=999_999);
    n.to_string()
}

#[must_use]
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

/// Trim and check shape. `None` unless exactly six ASCII digits remain.
#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if trimmed.len() != CODE_LEN || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(trimmed.to_owned())
}

/// Plain comparison against a known expected code. Empty never matches.
#[must_use]
pub fn verify_code(code: &str, expected: &str) -> bool {
    let code = code.trim();
    !code.is_empty() && code == expected.trim()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationToken {
    /// Normalized address the code was sent to.
    pub email: String,
    code_hash: String,
    pub issued_at_ms: u64,
    pub ttl: Duration,
    pub consumed: bool,
    pub failed_attempts: u32,
}

impl VerificationToken {
    /// Create a token for `email` and return it with the plaintext code,
    /// which the caller sends and then drops.
    #[must_use]
    pub fn issue(email: &str, now_ms: u64, ttl: Duration) -> (Self, String) {
        let code = generate_code();
        (Self::with_code(email, &code, now_ms, ttl), code)
    }

    pub(crate) fn with_code(email: &str, code: &str, now_ms: u64, ttl: Duration) -> Self {
        Self {
            email: email.to_owned(),
            code_hash: hash_code(code),
            issued_at_ms: now_ms,
            ttl,
            consumed: false,
            failed_attempts: 0,
        }
    }

    #[must_use]
    pub fn expires_at_ms(&self) -> u64 {
        let ttl_ms = u64::try_from(self.ttl.as_millis()).unwrap_or(u64::MAX);
        self.issued_at_ms.saturating_add(ttl_ms)
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms()
    }

    #[must_use]
    pub fn is_live(&self, now_ms: u64) -> bool {
        !self.consumed && !self.is_expired(now_ms)
    }

    /// Check a guess. A match consumes the token. A miss counts an attempt
    /// and burns the token once `max_attempts` misses have accumulated.
    ///
    /// # Errors
    ///
    /// Returns why the guess was refused.
    pub fn check(&mut self, email: &str, code: &str, now_ms: u64, max_attempts: u32) -> Result<(), TokenError> {
        if self.consumed {
            return Err(TokenError::Consumed);
        }
        if self.is_expired(now_ms) {
            return Err(TokenError::Expired);
        }
        if self.email != email {
            return Err(TokenError::WrongEmail);
        }

        let matches = normalize_code(code).is_some_and(|c| hash_code(&c) == self.code_hash);
        if matches {
            self.consumed = true;
            return Ok(());
        }

        self.failed_attempts += 1;
        if self.failed_attempts >= max_attempts {
            self.consumed = true;
            return Err(TokenError::AttemptsExhausted);
        }
        Err(TokenError::Mismatch)
    }
}

#[cfg(test)]
#[path = "verification_test.rs"]
mod tests;
