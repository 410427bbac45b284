//! Configuration system for partcheck.
//!
//! Resolution order: defaults → config file → environment variables.
//! Command-line flags are applied on top by the binaries.
//!
//! Config file location:
//!   1. $PARTCHECK_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/partcheck/config.toml
//!   3. ~/.config/partcheck/config.toml
//!
//! A missing file is not an error; defaults reproduce the reference scenario.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Top-level configuration, shared by both halves of the test.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PartcheckConfig {
    pub run: RunConfig,
    pub bands: BandsConfig,
    pub partition: PartitionConfig,
    pub generator: GeneratorConfig,
    pub ports: PortsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Worker threads for the flow runtime.
    pub cores: usize,
    /// Generation rate, packets per second.
    pub speed: u64,
    /// Minimum received/sent percentage required to pass (strictly greater).
    pub passed_limit: u64,
    /// Arrivals observed before the verdict is computed.
    pub sample_target: u64,
}

/// Expected share of traffic per receive path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandsConfig {
    pub path0: BandConfig,
    pub path1: BandConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandConfig {
    /// Target percentage.
    pub target: u64,
    /// Accepted deviation either side, in percentage points.
    pub epsilon: u64,
}

/// The declared partition the pipeline must honour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub input_port: u16,
    pub block_a: u64,
    pub block_b: u64,
    pub output_a: u16,
    pub output_b: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Port generated traffic leaves on.
    pub tx_port: u16,
    /// Ports validated as path 0 and path 1.
    pub rx_ports: [u16; 2],
}

/// UDP links standing in for NIC ports, one list per process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortsConfig {
    pub generator_links: Vec<PortLink>,
    pub partitioner_links: Vec<PortLink>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortLink {
    pub port: u16,
    /// Local address frames for this port arrive on.
    pub bind: SocketAddr,
    /// Remote address frames sent on this port go to.
    pub peer: SocketAddr,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            cores: 16,
            speed: 1000,
            passed_limit: 85,
            sample_target: 10_000_000,
        }
    }
}

impl Default for BandsConfig {
    fn default() -> Self {
        Self {
            path0: BandConfig {
                target: 90,
                epsilon: 3,
            },
            path1: BandConfig {
                target: 10,
                epsilon: 3,
            },
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            input_port: 0,
            block_a: 1000,
            block_b: 100,
            output_a: 0,
            output_b: 1,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tx_port: 0,
            rx_ports: [0, 1],
        }
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            generator_links: vec![link(0, 47000, 47100), link(1, 47001, 47101)],
            partitioner_links: vec![link(0, 47100, 47000), link(1, 47101, 47001)],
        }
    }
}

fn link(port: u16, bind: u16, peer: u16) -> PortLink {
    PortLink {
        port,
        bind: SocketAddr::from(([127, 0, 0, 1], bind)),
        peer: SocketAddr::from(([127, 0, 0, 1], peer)),
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("partcheck")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PartcheckConfig {
    /// Load config: defaults → file at the default location → env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::file_path())
    }

    /// Load config from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))?
        } else {
            PartcheckConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PARTCHECK_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Apply PARTCHECK_* overrides. Unparseable values are ignored.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(v) = number("PARTCHECK_RUN__CORES") {
            self.run.cores = v as usize;
        }
        if let Some(v) = number("PARTCHECK_RUN__SPEED") {
            self.run.speed = v;
        }
        if let Some(v) = number("PARTCHECK_RUN__PASSED_LIMIT") {
            self.run.passed_limit = v;
        }
        if let Some(v) = number("PARTCHECK_RUN__SAMPLE_TARGET") {
            self.run.sample_target = v;
        }
        if let Some(v) = number("PARTCHECK_PARTITION__BLOCK_A") {
            self.partition.block_a = v;
        }
        if let Some(v) = number("PARTCHECK_PARTITION__BLOCK_B") {
            self.partition.block_b = v;
        }
    }
}
