//! College catalog.
//!
//! Read-only reference data queried by program level. The fetch sleeps a
//! configurable delay to stand in for network latency; callers treat that
//! latency as opaque.

use std::time::Duration;

use tracing::debug;

use crate::state::{College, ProgramLevel};

const DEFAULT_COLLEGES: &[(&str, &str, ProgramLevel)] = &[
    ("iit-delhi", "Indian Institute of Technology Delhi", ProgramLevel::Undergraduate),
    ("iit-bombay", "Indian Institute of Technology Bombay", ProgramLevel::Undergraduate),
    ("iit-madras", "Indian Institute of Technology Madras", ProgramLevel::Undergraduate),
    ("iit-kanpur", "Indian Institute of Technology Kanpur", ProgramLevel::Undergraduate),
    ("iit-kharagpur", "Indian Institute of Technology Kharagpur", ProgramLevel::Undergraduate),
    ("bits-pilani", "Birla Institute of Technology and Science, Pilani", ProgramLevel::Undergraduate),
    ("delhi-university", "University of Delhi", ProgramLevel::Undergraduate),
    ("jadavpur-university", "Jadavpur University", ProgramLevel::Undergraduate),
    ("mumbai-university", "University of Mumbai", ProgramLevel::Undergraduate),
    ("st-stephens", "St. Stephen's College", ProgramLevel::Undergraduate),
    ("iim-ahmedabad", "Indian Institute of Management Ahmedabad", ProgramLevel::Postgraduate),
    ("iim-bangalore", "Indian Institute of Management Bangalore", ProgramLevel::Postgraduate),
    ("iim-calcutta", "Indian Institute of Management Calcutta", ProgramLevel::Postgraduate),
    ("iim-lucknow", "Indian Institute of Management Lucknow", ProgramLevel::Postgraduate),
    ("jnu", "Jawaharlal Nehru University", ProgramLevel::Postgraduate),
    ("tiss", "Tata Institute of Social Sciences", ProgramLevel::Postgraduate),
    ("aiims", "All India Institute of Medical Sciences", ProgramLevel::Postgraduate),
    ("xlri", "XLRI - Xavier School of Management", ProgramLevel::Postgraduate),
    ("nls-bangalore", "National Law School of India University", ProgramLevel::Postgraduate),
    ("iift", "Indian Institute of Foreign Trade", ProgramLevel::Postgraduate),
];

#[derive(Debug, Clone)]
pub struct Catalog {
    colleges: Vec<College>,
    delay: Duration,
}

impl Catalog {
    #[must_use]
    pub fn new(colleges: Vec<College>, delay: Duration) -> Self {
        Self { colleges, delay }
    }

    /// The built-in college list with the given fetch delay.
    #[must_use]
    pub fn with_defaults(delay: Duration) -> Self {
        let colleges = DEFAULT_COLLEGES
            .iter()
            .map(|(id, name, level)| College { id: (*id).to_owned(), name: (*name).to_owned(), level: *level })
            .collect();
        Self::new(colleges, delay)
    }

    #[must_use]
    pub fn find(&self, college_id: &str) -> Option<&College> {
        self.colleges.iter().find(|c| c.id == college_id)
    }

    #[must_use]
    pub fn all(&self) -> &[College] {
        &self.colleges
    }

    /// Colleges of one level, without the simulated delay.
    #[must_use]
    pub fn by_level(&self, level: ProgramLevel) -> Vec<College> {
        self.colleges.iter().filter(|c| c.level == level).cloned().collect()
    }

    /// Colleges of one level after the simulated fetch delay.
    pub async fn fetch(&self, level: ProgramLevel) -> Vec<College> {
        tokio::time::sleep(self.delay).await;
        let colleges = self.by_level(level);
        debug!(?level, count = colleges.len(), "college catalog fetched");
        colleges
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::with_defaults(Duration::ZERO)
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
