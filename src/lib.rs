//! gymlens - gym machine companion
//!
//! Snap a machine, let the model name it and the muscles it works, keep it in
//! a local list, and ask for a workout plan built around it.

pub mod client;
pub mod config;
pub mod db;
pub mod exercises;
pub mod functions;
pub mod gateway;
pub mod join;
pub mod muscles;
pub mod tui;
pub mod views;

pub use db::Database;
