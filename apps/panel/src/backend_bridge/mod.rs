//! Bridge between the terminal UI thread and the async backend worker.

pub mod commands;
pub mod runtime;
