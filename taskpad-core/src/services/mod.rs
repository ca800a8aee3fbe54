//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

pub mod auth;
mod demo;
pub mod logging;
pub mod migration;
pub mod tasks;
pub mod view;

pub use auth::{AuthContext, AuthState};
pub use demo::DemoService;
pub use logging::{LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use tasks::TaskListController;
pub use view::AppView;
