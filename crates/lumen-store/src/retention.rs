//! # Audit Retention
//!
//! One retention policy, applied uniformly by every backend after each
//! audit append. Retention is a property of the storage configuration,
//! not of a particular backend.

use serde::{Deserialize, Serialize};

/// Bounded-retention configuration for the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RetentionPolicy {
    /// Keep at most this many audit entries, dropping the oldest first.
    /// `None` disables trimming.
    pub max_audit_entries: Option<usize>,
}

impl RetentionPolicy {
    /// Unbounded retention.
    pub const fn unbounded() -> Self {
        RetentionPolicy {
            max_audit_entries: None,
        }
    }

    /// Keep at most `max` entries.
    pub const fn keep_latest(max: usize) -> Self {
        RetentionPolicy {
            max_audit_entries: Some(max),
        }
    }

    /// How many of the oldest entries must be dropped so `current_len`
    /// entries fit the policy.
    pub fn excess(&self, current_len: usize) -> usize {
        match self.max_audit_entries {
            Some(max) => current_len.saturating_sub(max),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_trims() {
        let policy = RetentionPolicy::unbounded();
        assert_eq!(policy.excess(0), 0);
        assert_eq!(policy.excess(1_000_000), 0);
    }

    #[test]
    fn keep_latest_trims_only_the_overflow() {
        let policy = RetentionPolicy::keep_latest(100);
        assert_eq!(policy.excess(99), 0);
        assert_eq!(policy.excess(100), 0);
        assert_eq!(policy.excess(101), 1);
        assert_eq!(policy.excess(150), 50);
    }
}
