//! FocusTools: a REST backend for tasks and Pomodoro focus sessions.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
