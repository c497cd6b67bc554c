use std::path::PathBuf;

use clap::Parser;
use lanestep_engine::state_io::{load_config_file, load_state_file};
use lanestep_engine::{create_with_state, EngineConfig, SequencerState};
use lanestep_shared::{HostTransport, LaneKind, MidiMessage, NUM_STEPS};
use serde::Serialize;

/// Renders a sequencer state offline and prints the MIDI it produces as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "headless_render")]
struct Args {
    /// Sequencer state (JSON). A small demo pattern is used when omitted.
    #[arg(long)]
    state: Option<PathBuf>,

    /// Engine config (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 120.0)]
    bpm: f64,

    #[arg(long, default_value_t = 48000.0)]
    sample_rate: f64,

    #[arg(long, default_value_t = 512)]
    block_size: usize,

    /// Length of the render in 4/4 bars.
    #[arg(long, default_value_t = 2)]
    bars: u32,

    /// Load this pattern (bank * 16 + slot) before rendering.
    #[arg(long)]
    pattern: Option<usize>,
}

#[derive(Serialize)]
struct Line {
    sample: u64,
    message: MidiMessage,
}

fn demo_state() -> SequencerState {
    let mut state = SequencerState::default();
    for step in 0..NUM_STEPS {
        state.master.set_trigger(step, step % 2 == 0 || step == 7);
        state.lanes.note.set_value(LaneKind::Note, step, [0, 3, 7, 10][step % 4]);
        state.lanes.velocity.set_value(LaneKind::Velocity, step, 70 + (step as i32 * 3));
    }
    state.master.set_shuffle(4);
    state.lanes.length.fill_values(7);
    state
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config_file(path)?,
        None => EngineConfig::default(),
    };
    let state = match &args.state {
        Some(path) => load_state_file(path)?,
        None => demo_state(),
    };

    let (mut handle, mut engine) = create_with_state(config, args.sample_rate, &state)?;
    if let Some(code) = args.pattern {
        if !handle.load_pattern(code / 16, code % 16) {
            log::warn!("[Headless] Pattern {} is empty or out of range", code);
        }
    }

    let block_size = args.block_size.max(1);
    let samples_per_qn = args.sample_rate * 60.0 / args.bpm;
    let total_samples = (args.bars as f64 * 4.0 * samples_per_qn) as u64;
    log::info!(
        "[Headless] Rendering {} bars at {} BPM ({} samples, blocks of {})",
        args.bars,
        args.bpm,
        total_samples,
        block_size
    );

    let mut rendered: u64 = 0;
    let mut events = 0usize;
    while rendered < total_samples {
        let position = rendered as f64 / samples_per_qn;
        let host = HostTransport::playing(position, args.bpm, (position / 4.0).floor() * 4.0);
        for event in engine.process_block(&host, block_size, &[]) {
            let line = Line { sample: rendered + event.sample_offset as u64, message: event.message };
            println!("{}", serde_json::to_string(&line)?);
            events += 1;
        }
        rendered += block_size as u64;
        handle.poll_feedback();
    }

    // Stop block releases whatever is still sounding
    let position = rendered as f64 / samples_per_qn;
    for event in engine.process_block(&HostTransport::stopped(position, args.bpm), block_size, &[]) {
        let line = Line { sample: rendered + event.sample_offset as u64, message: event.message };
        println!("{}", serde_json::to_string(&line)?);
        events += 1;
    }

    log::info!("[Headless] Done. {} events", events);
    Ok(())
}
