pub mod api;
pub mod commission;
pub mod config;
pub mod error;
pub mod leaderboard;
pub mod ranks;
pub mod sale;
pub mod standing;
pub mod types;
