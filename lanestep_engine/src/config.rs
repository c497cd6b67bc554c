use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Engine settings that are not part of a pattern: MIDI routing, gate mode
/// and the start behaviour.
///
/// Held in an `ArcSwap`, so the control side may replace it while playing;
/// the audio thread picks up the new value on its next block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Channel of every generated event (0-15).
    pub output_channel: u8,
    /// Notes on this channel drive the lanes when `gate_mode` is on.
    pub gate_channel: u8,
    /// Notes 0-63 on this channel load pattern `note / 16`, `note % 16`.
    pub pattern_channel: u8,
    /// Notes on this channel transpose relative to `transpose_reference`.
    pub transpose_channel: u8,
    pub transpose_reference: u8,
    pub gate_mode: bool,
    /// Starting mid-bar waits for the next bar line before stepping.
    pub wait_for_bar_sync: bool,
    pub command_queue_capacity: usize,
    /// Fixed seed for reproducible randomness; drawn from the OS otherwise.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_channel: 0,
            gate_channel: 15,
            pattern_channel: 14,
            transpose_channel: 13,
            transpose_reference: 60,
            gate_mode: false,
            wait_for_bar_sync: true,
            command_queue_capacity: 1024,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, EngineError> {
        let mut config: EngineConfig = toml::from_str(text)?;
        config.sanitize();
        Ok(config)
    }

    pub fn sanitize(&mut self) {
        self.output_channel = self.output_channel.min(15);
        self.gate_channel = self.gate_channel.min(15);
        self.pattern_channel = self.pattern_channel.min(15);
        self.transpose_channel = self.transpose_channel.min(15);
        self.transpose_reference = self.transpose_reference.min(127);
        self.command_queue_capacity = self.command_queue_capacity.max(16);
    }

    pub fn rng(&self) -> fastrand::Rng {
        match self.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        }
    }
}
