use lanestep_shared::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid engine config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("sample rate must be positive, got {0}")]
    InvalidSampleRate(f64),

    #[error(transparent)]
    State(#[from] StateError),
}
