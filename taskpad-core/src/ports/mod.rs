//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core domain
//! depends only on these traits, not on concrete implementations.

mod auth_backend;
mod task_store;

pub use auth_backend::AuthBackend;
pub use task_store::TaskStore;
