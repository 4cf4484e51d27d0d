//! Core of Habitline: persistence, streak arithmetic, accounts and the
//! habit/goal/check-in services consumed by the desktop shell.

pub mod auth;
pub mod clock;
pub mod db;
pub mod errors;
pub mod models;
pub mod session;
pub mod streak;
pub mod tracker;

pub use errors::{AppError, AppResult};
pub use tracker::HabitTracker;
