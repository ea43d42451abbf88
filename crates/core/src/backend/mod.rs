//! Backend contract and registry.
//!
//! A backend is a connector to one remote catalog. Each backend exposes a
//! search operation and may optionally expose an authenticated session that
//! the download relay can borrow.

mod registry;
mod types;

pub use registry::{BackendRegistry, RegistryError};
pub use types::*;
