//! chatpoll library
//!
//! Poll lifecycle and vote tallying over a key-value store, plus the HTTP
//! surface, configuration and logging used by the `chatpoll` binary.

pub mod cli;
pub mod config;
pub mod logging;
pub mod polls;
pub mod server;
pub mod store;
