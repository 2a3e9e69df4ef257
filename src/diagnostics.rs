//! One log entry per distinct failure condition, never one per frame.

use std::collections::HashSet;

use crate::error::{FailureCategory, ShadowDataError};

#[derive(Debug, Default)]
pub struct FailureReports {
    active: HashSet<ShadowDataError>,
    history: Vec<ShadowDataError>,
}

impl FailureReports {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs `error` unless the same condition is already active. Returns true when it was logged.
    pub fn report(&mut self, error: &ShadowDataError) -> bool {
        if !self.active.insert(error.clone()) {
            return false;
        }
        match error.category() {
            FailureCategory::ExpectedAbsent | FailureCategory::Transient => log::warn!("[shadow] {error}"),
            _ => log::error!("[shadow] {error}"),
        }
        self.history.push(error.clone());
        true
    }

    /// Ends the episode for `error` so a later recurrence is reported again.
    pub fn resolve(&mut self, error: &ShadowDataError) -> bool {
        self.active.remove(error)
    }

    /// Ends every active episode matching `predicate`. Returns how many ended.
    pub fn resolve_matching(&mut self, predicate: impl Fn(&ShadowDataError) -> bool) -> usize {
        let before = self.active.len();
        self.active.retain(|error| !predicate(error));
        before - self.active.len()
    }

    pub fn is_active(&self, error: &ShadowDataError) -> bool {
        self.active.contains(error)
    }

    /// Every report emitted so far, in order.
    pub fn history(&self) -> &[ShadowDataError] {
        &self.history
    }

    pub fn count_of(&self, error: &ShadowDataError) -> usize {
        self.history.iter().filter(|reported| *reported == error).count()
    }
}
