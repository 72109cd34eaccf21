//! Drover library — re-exports modules for the binary and integration tests.

pub mod daemon;
pub mod session;
pub mod state;
pub mod tmux;
