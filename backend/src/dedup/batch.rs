//! In-batch deduplication.

use std::collections::HashSet;

use crate::models::{IdentityKey, NormalizedContact};

/// Tracks identity keys already accepted in the current batch.
#[derive(Debug, Default)]
pub struct BatchDedup {
    seen: HashSet<IdentityKey>,
    duplicates: usize,
}

impl BatchDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key`. Returns `true` on its first occurrence; later calls
    /// return `false` and count a duplicate.
    pub fn first_seen(&mut self, key: &IdentityKey) -> bool {
        if self.seen.contains(key) {
            self.duplicates += 1;
            false
        } else {
            self.seen.insert(key.clone());
            true
        }
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Split of a batch into first occurrences and repeats.
#[derive(Debug, Clone, Default)]
pub struct BatchDedupOutcome {
    /// First occurrence of each key, input order preserved.
    pub unique: Vec<NormalizedContact>,
    /// Later occurrences, input order preserved.
    pub duplicates: Vec<NormalizedContact>,
}

/// Keep the first contact for each identity key.
pub fn dedup_batch(contacts: Vec<NormalizedContact>) -> BatchDedupOutcome {
    let mut tracker = BatchDedup::new();
    let mut outcome = BatchDedupOutcome::default();

    for contact in contacts {
        if tracker.first_seen(&contact.identity_key()) {
            outcome.unique.push(contact);
        } else {
            outcome.duplicates.push(contact);
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn contact(line: usize, identifier: &str, category: Category, value: &str) -> NormalizedContact {
        NormalizedContact {
            line,
            identifier: identifier.into(),
            category,
            subcategory: None,
            value: value.into(),
            is_primary: false,
            label: None,
        }
    }

    #[test]
    fn test_first_occurrence_wins() {
        let mut first = contact(2, "001", Category::Email, "a@b.com");
        first.label = Some("first".into());
        let mut repeat = contact(4, "001", Category::Email, "a@b.com");
        repeat.is_primary = true;

        let outcome = dedup_batch(vec![
            first,
            contact(3, "001", Category::Telefone, "1133334444"),
            repeat,
        ]);

        assert_eq!(outcome.unique.len(), 2);
        assert_eq!(outcome.unique[0].label.as_deref(), Some("first"));
        assert!(!outcome.unique[0].is_primary);
        assert_eq!(outcome.duplicates.len(), 1);
        assert_eq!(outcome.duplicates[0].line, 4);
    }

    #[test]
    fn test_same_value_different_parent_is_distinct() {
        let outcome = dedup_batch(vec![
            contact(2, "001", Category::Email, "a@b.com"),
            contact(3, "002", Category::Email, "a@b.com"),
            contact(4, "001", Category::Outro, "a@b.com"),
        ]);
        assert_eq!(outcome.unique.len(), 3);
        assert!(outcome.duplicates.is_empty());
    }

    #[test]
    fn test_tracker_counts() {
        let key = IdentityKey::new("001", Category::Email, "a@b.com");
        let mut tracker = BatchDedup::new();
        assert!(tracker.is_empty());
        assert!(tracker.first_seen(&key));
        assert!(!tracker.first_seen(&key));
        assert!(!tracker.first_seen(&key));
        assert_eq!(tracker.duplicates(), 2);
        assert_eq!(tracker.len(), 1);
    }
}
