//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

pub mod result;
mod task;
mod user;

pub use task::{display_cmp, display_order, Task, TaskStats, TaskTitle};
pub use user::{AuthChange, AuthEvent, Session, SignUpOutcome, User};
