//! Core of astrocron: editing scheduled home-automation events.
//!
//! - `event` is the stored record shape
//! - `recurrence` reads and writes the cron-style repeat strings
//! - `server_clock` converts between local time and the scheduler host's clock
//! - `astro` computes sunrise, sunset and the other solar events
//! - `session` edits one event and commits it to an [`store::EventStore`]

pub mod astro;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod event;
pub mod recurrence;
pub mod server_clock;
pub mod session;
pub mod store;
pub mod translate;

// Re-export event types at crate root for convenience
pub use event::*;
