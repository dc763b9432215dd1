pub mod config;
pub mod error;
pub mod leaderboard;
pub mod model;
pub mod notify;
pub mod rank;
pub mod scoring;
pub mod storage;
pub mod task_api;

pub use task_api::{SweepReport, Tally, ToggleOutcome};
