//! Application wiring and commands.

mod commands;
mod init;
mod lifecycle_signals;

pub use commands::{login, logout, status, watch};
pub use init::{build, App};
