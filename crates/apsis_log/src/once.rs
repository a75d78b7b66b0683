//! Suppression of repeated log messages.

use std::collections::HashMap;

/// Keeps track of which classes of recurring events have already been
/// logged, so that a fault recurring every frame is reported only once.
///
/// Occurrences after the first are still counted.
#[derive(Clone, Debug, Default)]
pub struct LogOnce {
    occurrences: HashMap<&'static str, u64>,
}

impl LogOnce {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an occurrence of the given class.
    ///
    /// # Returns
    /// `true` if this is the first occurrence of the class.
    pub fn first_occurrence(&mut self, class: &'static str) -> bool {
        let count = self.occurrences.entry(class).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Returns the number of registered occurrences of the given class.
    pub fn occurrence_count(&self, class: &str) -> u64 {
        self.occurrences.get(class).copied().unwrap_or(0)
    }

    /// Forgets all registered occurrences, so that every class will be
    /// logged again on its next occurrence.
    pub fn reset(&mut self) {
        self.occurrences.clear();
    }
}
