//! Tracks how much active time is spent on each web domain per day, keeps
//! per-domain time budgets (with `*.suffix` wildcard rules) and raises a
//! warning once a budget is exceeded. Persistence is a plain key-value
//! store, so the core runs the same against a JSON file or an in-memory
//! fake.

pub mod agent;
pub mod cli;
pub mod config;
pub mod page;
pub mod records;
pub mod report;
pub mod store;
pub mod utils;
