pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod watch;

pub use taskminder_core as core;

pub use taskminder_core::AppConfig;
