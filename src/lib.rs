//! Bridges the host's "now playing" media state to a serial display.

pub mod artwork;
pub mod bridge;
pub mod config;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod provider;
pub mod transport;
