//! Demo data for the local backend
//!
//! A fixed account and a handful of tasks spread over the last few days so
//! that the list shows both pending and completed items in display order.

use chrono::{DateTime, Duration, Utc};

use crate::adapters::duckdb::DuckDbBackend;
use crate::domain::result::Result;
use crate::domain::{TaskTitle, User};

/// Email of the seeded demo account
pub const DEMO_EMAIL: &str = "demo@taskpad.local";

/// Password of the seeded demo account
pub const DEMO_PASSWORD: &str = "demo-password";

/// A sample task: title, age in hours, completed
pub struct DemoTask {
    pub title: &'static str,
    pub hours_ago: i64,
    pub completed: bool,
}

/// Generate demo tasks
pub fn generate_demo_tasks() -> Vec<DemoTask> {
    vec![
        DemoTask { title: "Renew passport", hours_ago: 2, completed: false },
        DemoTask { title: "Book dentist appointment", hours_ago: 5, completed: false },
        DemoTask { title: "Buy groceries for the week", hours_ago: 9, completed: true },
        DemoTask { title: "Reply to landlord about the lease", hours_ago: 26, completed: false },
        DemoTask { title: "Water the plants", hours_ago: 30, completed: true },
        DemoTask { title: "Back up laptop", hours_ago: 50, completed: false },
        DemoTask { title: "Call mom", hours_ago: 75, completed: true },
    ]
}

/// Create the demo account and insert the sample tasks
pub fn seed_demo_data(backend: &DuckDbBackend, now: DateTime<Utc>) -> Result<User> {
    let user = backend.create_account(DEMO_EMAIL, DEMO_PASSWORD)?;

    for task in generate_demo_tasks() {
        let title = TaskTitle::parse(task.title)?;
        backend.insert_task(
            &user.id,
            &title,
            now - Duration::hours(task.hours_ago),
            task.completed,
        )?;
    }

    Ok(user)
}
