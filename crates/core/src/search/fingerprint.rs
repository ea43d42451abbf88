//! Per-request set of content fingerprints.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

/// Fingerprints already claimed during one search.
///
/// Shared by every worker of a single detail expansion and dropped with it.
#[derive(Debug, Default)]
pub struct FingerprintSet {
    seen: Mutex<HashSet<String>>,
}

impl FingerprintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a fingerprint. Returns `true` only for the first caller.
    ///
    /// Fingerprints are compared case-insensitively.
    pub fn insert_if_absent(&self, fingerprint: &str) -> bool {
        let key = fingerprint.trim().to_ascii_lowercase();
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }

    pub fn len(&self) -> usize {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
