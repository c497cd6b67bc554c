use thiserror::Error;

/// Failures when decoding or encoding persisted sequencer state.
///
/// Missing fields never produce an error (they fall back to defaults); only
/// input that is not a state document at all does.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported state version {found} (expected <= {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}
