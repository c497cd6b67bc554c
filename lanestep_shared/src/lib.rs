use serde::{Deserialize, Serialize};

pub mod chords;
pub mod error;
pub mod lane;
pub mod master;
mod numeric;
pub mod state;

pub use chords::ChordType;
pub use error::StateError;
pub use lane::{CcRoute, Direction, LaneConfig, LaneKind, LANE_COUNT, LANE_KINDS};
pub use master::MasterConfig;
pub use state::{LaneSet, PatternSnapshot, SequencerState, StoredPattern};

/// Steps in every lane row and in the master gate.
pub const NUM_STEPS: usize = 16;
/// Pattern store dimensions.
pub const NUM_BANKS: usize = 4;
pub const SLOTS_PER_BANK: usize = 16;
/// Capacity of the in-flight note pool.
pub const MAX_ACTIVE_NOTES: usize = 64;

/// One grid step is a 16th note, in quarter notes.
pub const STEP_DURATION_QN: f64 = 0.25;
/// Full swing delays an odd step by a 32nd note.
pub const MAX_SWING_QN: f64 = 0.125;

pub const MIN_SHUFFLE: u8 = 1;
pub const MAX_SHUFFLE: u8 = 7;

/// Host playhead as reported at the start of an audio block.
///
/// Every field is optional because hosts are free to omit any of them; the
/// engine skips a block when something it needs is missing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HostTransport {
    pub is_playing: Option<bool>,
    pub ppq_position: Option<f64>,
    pub bpm: Option<f64>,
    /// (numerator, denominator)
    pub time_signature: Option<(u32, u32)>,
    pub bar_start_ppq: Option<f64>,
}

impl HostTransport {
    /// A fully populated playing transport, mostly for tests and offline rendering.
    pub fn playing(ppq: f64, bpm: f64, bar_start_ppq: f64) -> Self {
        Self {
            is_playing: Some(true),
            ppq_position: Some(ppq),
            bpm: Some(bpm),
            time_signature: Some((4, 4)),
            bar_start_ppq: Some(bar_start_ppq),
        }
    }

    pub fn stopped(ppq: f64, bpm: f64) -> Self {
        Self {
            is_playing: Some(false),
            ppq_position: Some(ppq),
            bpm: Some(bpm),
            time_signature: Some((4, 4)),
            bar_start_ppq: Some(0.0),
        }
    }
}

/// Short MIDI message produced or consumed by the engine.
/// Channels are zero-based (0-15).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiMessage {
    NoteOn { channel: u8, pitch: u8, velocity: u8 },
    NoteOff { channel: u8, pitch: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    ChannelPressure { channel: u8, pressure: u8 },
}

impl MidiMessage {
    pub fn channel(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. }
            | MidiMessage::NoteOff { channel, .. }
            | MidiMessage::ControlChange { channel, .. }
            | MidiMessage::ProgramChange { channel, .. }
            | MidiMessage::ChannelPressure { channel, .. } => channel,
        }
    }

    /// Note-on with velocity 0 is a note-off on the wire.
    pub fn is_note_on(&self) -> bool {
        matches!(self, MidiMessage::NoteOn { velocity, .. } if *velocity > 0)
    }

    pub fn is_note_off(&self) -> bool {
        matches!(
            self,
            MidiMessage::NoteOff { .. } | MidiMessage::NoteOn { velocity: 0, .. }
        )
    }
}

/// A MIDI message tagged with its sample offset inside the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiEvent {
    pub sample_offset: usize,
    pub message: MidiMessage,
}

impl MidiEvent {
    pub fn new(sample_offset: usize, message: MidiMessage) -> Self {
        Self { sample_offset, message }
    }
}
