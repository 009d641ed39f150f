use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
    /// When set, the application resubmits a rejected message after this delay.
    pub resubmit_delay: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 1,
            max_latency: 10,
            seed: 0,
            resubmit_delay: None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,
    #[error("sequence space {seq_space} is smaller than twice the window size {window_size}")]
    SeqSpaceTooSmall { window_size: usize, seq_space: u32 },
    #[error("sequence space {seq_space} is not a multiple of the window size {window_size}")]
    SeqSpaceNotMultiple { window_size: usize, seq_space: u32 },
}

/// Window and timing parameters shared by both protocol entities.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Maximum number of unacknowledged packets (W)
    pub window_size: usize,
    /// Number of distinct sequence numbers (S)
    pub seq_space: u32,
    /// Retransmission timeout
    pub rtt: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            seq_space: 12,
            rtt: 16,
        }
    }
}

impl ProtocolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        let w = self.window_size as u64;
        let s = self.seq_space as u64;
        if s < 2 * w {
            return Err(ConfigError::SeqSpaceTooSmall {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        // Slots are indexed by `seq % W`; a wrap must not alias two live slots.
        if s % w != 0 {
            return Err(ConfigError::SeqSpaceNotMultiple {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        Ok(())
    }

    pub fn window(&self) -> u32 {
        self.window_size as u32
    }
}
