pub mod commands;
pub mod config;
pub mod controller;
pub mod engine; // SequencerEngine lives here
pub mod error;
pub mod gate;
pub mod handle;
pub mod lane;
pub mod midi_buffer;
pub mod monitor;
pub mod notes;
pub mod patterns;
pub mod sequencer;
pub mod state_io;
pub mod transport;

#[cfg(test)]
mod tests_scenarios;

use std::sync::Arc;

use arc_swap::ArcSwap;

// Re-exports
pub use commands::{EngineCommand, EngineFeedback};
pub use config::EngineConfig;
pub use engine::SequencerEngine;
pub use error::EngineError;
pub use handle::SequencerHandle;
pub use lanestep_shared::SequencerState;
pub use monitor::{EngineMonitor, TransportSnapshot};
pub use patterns::PatternStore;

/// Feedback is rare; a small queue is plenty.
const FEEDBACK_QUEUE_CAPACITY: usize = 64;

/// Builds a connected handle/engine pair with default lanes and an empty
/// pattern store. The engine goes to the audio thread, the handle stays with
/// the UI.
pub fn create(config: EngineConfig, sample_rate: f64) -> Result<(SequencerHandle, SequencerEngine), EngineError> {
    create_with_state(config, sample_rate, &SequencerState::default())
}

/// Like [`create`], starting from a restored state.
pub fn create_with_state(
    mut config: EngineConfig,
    sample_rate: f64,
    state: &SequencerState,
) -> Result<(SequencerHandle, SequencerEngine), EngineError> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(EngineError::InvalidSampleRate(sample_rate));
    }
    config.sanitize();

    let mut state = state.clone();
    state.sanitize();
    let snapshot = state.snapshot();

    let (command_tx, command_rx) = crossbeam_channel::bounded(config.command_queue_capacity);
    let (feedback_tx, feedback_rx) = crossbeam_channel::bounded(FEEDBACK_QUEUE_CAPACITY);
    let config = Arc::new(ArcSwap::from_pointee(config));
    let patterns = Arc::new(PatternStore::new());
    patterns.import(&state.patterns);
    let monitor = Arc::new(EngineMonitor::default());

    log::info!(
        "[Sequencer] Created at {} Hz with {} stored patterns",
        sample_rate,
        state.patterns.len()
    );

    let engine = SequencerEngine::new(
        config.clone(),
        command_rx,
        feedback_tx,
        patterns.clone(),
        monitor.clone(),
        sample_rate,
        &snapshot,
    );
    let handle = SequencerHandle::new(snapshot, command_tx, feedback_rx, patterns, monitor, config);
    Ok((handle, engine))
}
