//! Immutable lookup table of configured backends.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;

use super::Backend;

/// Errors raised while assembling the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate backend id: {0}")]
    DuplicateId(String),

    #[error("backend id must not be empty")]
    EmptyId,

    #[error("failed to build backend {id}: {reason}")]
    InvalidBackend { id: String, reason: String },
}

/// Backends known to the process, in registration order.
///
/// Built once at startup and never mutated. Ids are matched
/// case-insensitively.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<Arc<dyn Backend>>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<Arc<dyn Backend>>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for backend in &backends {
            let id = backend.id().trim();
            if id.is_empty() {
                return Err(RegistryError::EmptyId);
            }
            if !seen.insert(id.to_lowercase()) {
                return Err(RegistryError::DuplicateId(id.to_string()));
            }
        }
        Ok(Self { backends })
    }

    /// Look up a backend by id, falling back to its display name.
    pub fn find(&self, id_or_name: &str) -> Option<Arc<dyn Backend>> {
        let wanted = id_or_name.trim();
        if wanted.is_empty() {
            return None;
        }
        self.backends
            .iter()
            .find(|b| b.id().eq_ignore_ascii_case(wanted))
            .or_else(|| {
                self.backends
                    .iter()
                    .find(|b| b.display_name().eq_ignore_ascii_case(wanted))
            })
            .cloned()
    }

    /// Backends whose id appears in `ids`, in registration order.
    ///
    /// An empty selection (after trimming blanks) means every backend.
    pub fn select<S: AsRef<str>>(&self, ids: &[S]) -> Vec<Arc<dyn Backend>> {
        let wanted: HashSet<String> = ids
            .iter()
            .map(|id| id.as_ref().trim().to_lowercase())
            .filter(|id| !id.is_empty())
            .collect();

        if wanted.is_empty() {
            return self.backends.clone();
        }

        self.backends
            .iter()
            .filter(|b| wanted.contains(&b.id().to_lowercase()))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> &[Arc<dyn Backend>] {
        &self.backends
    }

    pub fn ids(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}
