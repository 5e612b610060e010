//! Bridge configuration.
//!
//! Loaded from the platform config directory via `confy`; the serial
//! port and baud rate can be overridden from the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artwork::ArtworkSpec;
use crate::bridge::BridgeSettings;
use crate::protocol::frame::MAX_PAYLOAD_SIZE;
use crate::transport::{Pacing, TransportSettings};

const CONFIG_NAME: &str = "nowplaying-bridge";

pub const PORT_ENV: &str = "NOWPLAYING_PORT";
pub const BAUD_ENV: &str = "NOWPLAYING_BAUD";

/// ART_CHUNK carries a 4-byte offset ahead of the data
const MAX_CHUNK_SIZE: usize = MAX_PAYLOAD_SIZE - 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("baud rate must be non-zero")]
    ZeroBaud,
    #[error("artwork size {0}x{1} must be non-zero and fit in 16 bits")]
    ArtSize(u32, u32),
    #[error("{var} is not a valid baud rate: {value:?}")]
    BadBaudEnv { var: &'static str, value: String },
    #[error("invalid baud rate argument: {0:?}")]
    BadBaudArg(String),
    #[error("unexpected argument: {0:?}")]
    UnexpectedArg(String),
}

/// Command line: `[--list-ports] [PORT [BAUD]]`
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliArgs {
    pub list_ports: bool,
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
}

impl CliArgs {
    /// Parse arguments, excluding the program name.
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cli = CliArgs::default();
        for arg in args.into_iter().map(Into::into) {
            if arg == "--list-ports" {
                cli.list_ports = true;
            } else if arg.starts_with("--") {
                return Err(ConfigError::UnexpectedArg(arg));
            } else if cli.port.is_none() {
                cli.port = Some(arg);
            } else if cli.baud_rate.is_none() {
                let baud = arg.parse().map_err(|_| ConfigError::BadBaudArg(arg.clone()))?;
                cli.baud_rate = Some(baud);
            } else {
                return Err(ConfigError::UnexpectedArg(arg));
            }
        }
        Ok(cli)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BridgeConfig {
    pub port: String,
    pub baud_rate: u32,
    pub art_width: u32,
    pub art_height: u32,
    pub art_chunk_size: usize,
    pub small_frame_threshold: usize,
    pub small_frame_delay_ms: u64,
    pub large_frame_delay_ms: u64,
    pub reconnect_backoff_ms: u64,
    pub session_poll_ms: u64,
    pub tick_interval_ms: u64,
    pub read_timeout_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: "COM3".to_string(),
            baud_rate: 921_600,
            art_width: 240,
            art_height: 200,
            art_chunk_size: 3072,
            small_frame_threshold: 50,
            small_frame_delay_ms: 50,
            large_frame_delay_ms: 1,
            reconnect_backoff_ms: 2000,
            session_poll_ms: 2000,
            tick_interval_ms: 1000,
            read_timeout_ms: 100,
        }
    }
}

impl BridgeConfig {
    /// Load from disk, falling back to defaults on a missing or broken file.
    pub fn load() -> Self {
        match confy::load(CONFIG_NAME, None) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load config, using defaults");
                Self::default()
            }
        }
    }

    /// Apply `NOWPLAYING_PORT` / `NOWPLAYING_BAUD` from `lookup`
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.trim().is_empty()) {
            self.port = port.trim().to_string();
        }
        if let Some(value) = lookup(BAUD_ENV) {
            self.baud_rate = value.trim().parse().map_err(|_| ConfigError::BadBaudEnv {
                var: BAUD_ENV,
                value,
            })?;
        }
        Ok(())
    }

    /// Command-line values win over both the file and the environment
    pub fn apply_args(&mut self, cli: &CliArgs) {
        if let Some(port) = &cli.port {
            self.port = port.clone();
        }
        if let Some(baud) = cli.baud_rate {
            self.baud_rate = baud;
        }
    }

    /// Reject unusable values and clamp the chunk size into frame range.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ZeroBaud);
        }
        let fits = |v: u32| v > 0 && v <= u16::MAX as u32;
        if !fits(self.art_width) || !fits(self.art_height) {
            return Err(ConfigError::ArtSize(self.art_width, self.art_height));
        }
        self.art_chunk_size = self.art_chunk_size.clamp(1, MAX_CHUNK_SIZE);
        Ok(self)
    }

    pub fn bridge_settings(&self) -> BridgeSettings {
        BridgeSettings {
            artwork: ArtworkSpec {
                width: self.art_width,
                height: self.art_height,
                chunk_size: self.art_chunk_size,
            },
            tick_interval: Duration::from_millis(self.tick_interval_ms.max(1)),
            session_poll: Duration::from_millis(self.session_poll_ms.max(1)),
        }
    }

    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            pacing: Pacing {
                small_frame_threshold: self.small_frame_threshold,
                small_delay: Duration::from_millis(self.small_frame_delay_ms),
                large_delay: Duration::from_millis(self.large_frame_delay_ms),
            },
            reconnect_backoff: Duration::from_millis(self.reconnect_backoff_ms),
            ..TransportSettings::default()
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}
