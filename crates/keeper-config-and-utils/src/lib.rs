//! Core types, configuration, and utilities for the session keeper.

mod clock;
mod config;
mod error;
mod logging;
mod paths;
mod session;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, DEFAULT_LOG_LEVEL, DEFAULT_SUPABASE_PUBLISHABLE_KEY, DEFAULT_SUPABASE_URL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
pub use session::Session;
