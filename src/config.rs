//! Machine configuration.
//!
//! Loaded from JSON with `--config`, then overridden by command-line flags.

use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;

/// Default size of main memory in bytes.
pub const DEFAULT_MEMORY_SIZE: usize = 5000;

/// Smallest memory a machine may be configured with.
pub const MIN_MEMORY_SIZE: usize = 1000;

/// Largest memory a machine may be configured with (1 MiB).
pub const MAX_MEMORY_SIZE: usize = 1 << 20;

/// Default instruction budget for a run.
pub const DEFAULT_STEP_LIMIT: u64 = 1000;

/// Tunable machine parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Bytes of flat main memory.
    pub memory_size: usize,
    /// Maximum instructions executed by [`Cpu::run`](crate::Cpu::run).
    pub step_limit: u64,
}

impl MachineConfig {
    /// Check the configuration describes a usable machine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_size < MIN_MEMORY_SIZE {
            return Err(ConfigError::MemoryTooSmall {
                size: self.memory_size,
                min: MIN_MEMORY_SIZE,
            });
        }
        if self.memory_size > MAX_MEMORY_SIZE {
            return Err(ConfigError::MemoryTooLarge {
                size: self.memory_size,
                max: MAX_MEMORY_SIZE,
            });
        }
        Ok(())
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: MachineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_size: DEFAULT_MEMORY_SIZE,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

/// Errors that can occur while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(String),

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("memory size {size} is below the minimum of {min} bytes")]
    MemoryTooSmall { size: usize, min: usize },

    #[error("memory size {size} exceeds the maximum of {max} bytes")]
    MemoryTooLarge { size: usize, max: usize },
}
