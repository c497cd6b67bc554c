use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use lanestep_shared::SequencerState;

use crate::config::EngineConfig;

pub fn load_state_file(path: impl AsRef<Path>) -> Result<SequencerState, anyhow::Error> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading state file {}", path.display()))?;
    let state = SequencerState::from_json(&content)
        .with_context(|| format!("decoding state file {}", path.display()))?;
    log::info!("[StateIO] Loaded {} ({} patterns)", path.display(), state.patterns.len());
    Ok(state)
}

pub fn save_state_file(state: &SequencerState, path: impl AsRef<Path>) -> Result<(), anyhow::Error> {
    let path = path.as_ref();
    let json = state.to_json()?;
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    file.write_all(json.as_bytes())?;
    log::info!("[StateIO] Saved {}", path.display());
    Ok(())
}

pub fn load_config_file(path: impl AsRef<Path>) -> Result<EngineConfig, anyhow::Error> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    Ok(EngineConfig::from_toml_str(&content)?)
}
