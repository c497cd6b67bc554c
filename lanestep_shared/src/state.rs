use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::lane::{LaneConfig, LaneKind, LANE_COUNT, LANE_KINDS};
use crate::master::MasterConfig;
use crate::numeric;
use crate::{NUM_BANKS, SLOTS_PER_BANK};

pub const STATE_VERSION: u32 = 1;

/// Configuration of all eight lanes, one named block each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneSet {
    pub note: LaneConfig,
    pub octave: LaneConfig,
    pub velocity: LaneConfig,
    pub length: LaneConfig,
    pub cc1: LaneConfig,
    pub cc2: LaneConfig,
    pub cc3: LaneConfig,
    pub cc4: LaneConfig,
}

impl Default for LaneSet {
    fn default() -> Self {
        Self::from_array(LANE_KINDS.map(LaneConfig::for_kind))
    }
}

impl LaneSet {
    pub fn get(&self, kind: LaneKind) -> &LaneConfig {
        match kind {
            LaneKind::Note => &self.note,
            LaneKind::Octave => &self.octave,
            LaneKind::Velocity => &self.velocity,
            LaneKind::Length => &self.length,
            LaneKind::Controller(0) => &self.cc1,
            LaneKind::Controller(1) => &self.cc2,
            LaneKind::Controller(2) => &self.cc3,
            LaneKind::Controller(_) => &self.cc4,
        }
    }

    pub fn get_mut(&mut self, kind: LaneKind) -> &mut LaneConfig {
        match kind {
            LaneKind::Note => &mut self.note,
            LaneKind::Octave => &mut self.octave,
            LaneKind::Velocity => &mut self.velocity,
            LaneKind::Length => &mut self.length,
            LaneKind::Controller(0) => &mut self.cc1,
            LaneKind::Controller(1) => &mut self.cc2,
            LaneKind::Controller(2) => &mut self.cc3,
            LaneKind::Controller(_) => &mut self.cc4,
        }
    }

    /// Lanes in `LANE_KINDS` order.
    pub fn to_array(&self) -> [LaneConfig; LANE_COUNT] {
        LANE_KINDS.map(|kind| *self.get(kind))
    }

    pub fn from_array(lanes: [LaneConfig; LANE_COUNT]) -> Self {
        let [note, octave, velocity, length, cc1, cc2, cc3, cc4] = lanes;
        Self { note, octave, velocity, length, cc1, cc2, cc3, cc4 }
    }

    pub fn sanitize(&mut self) {
        for kind in LANE_KINDS {
            self.get_mut(kind).sanitize(kind);
        }
    }
}

/// Everything a pattern slot remembers. Plain data, so copying it never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PatternSnapshot {
    pub master: MasterConfig,
    pub lanes: LaneSet,
}

impl PatternSnapshot {
    pub fn sanitize(&mut self) {
        self.master.sanitize();
        self.lanes.sanitize();
    }
}

/// A non-empty pattern slot as written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPattern {
    #[serde(deserialize_with = "numeric::grid_index")]
    pub bank: usize,
    #[serde(deserialize_with = "numeric::grid_index")]
    pub slot: usize,
    #[serde(default)]
    pub pattern: PatternSnapshot,
}

/// Root of the persisted document: live configuration plus the pattern banks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerState {
    pub version: u32,
    pub master: MasterConfig,
    pub lanes: LaneSet,
    pub patterns: Vec<StoredPattern>,
}

impl Default for SequencerState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            master: MasterConfig::default(),
            lanes: LaneSet::default(),
            patterns: Vec::new(),
        }
    }
}

impl SequencerState {
    pub fn snapshot(&self) -> PatternSnapshot {
        PatternSnapshot { master: self.master, lanes: self.lanes }
    }

    pub fn to_json(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes a state document. Missing fields take their defaults, out-of-range
    /// numbers are clamped and patterns outside the bank grid are dropped.
    pub fn from_json(json: &str) -> Result<Self, StateError> {
        let mut state: SequencerState = serde_json::from_str(json)?;
        if state.version > STATE_VERSION {
            return Err(StateError::UnsupportedVersion {
                found: state.version,
                supported: STATE_VERSION,
            });
        }
        state.sanitize();
        Ok(state)
    }

    pub fn sanitize(&mut self) {
        self.version = STATE_VERSION;
        self.master.sanitize();
        self.lanes.sanitize();
        self.patterns
            .retain(|p| p.bank < NUM_BANKS && p.slot < SLOTS_PER_BANK);
        for stored in self.patterns.iter_mut() {
            stored.pattern.sanitize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lane::{CcRoute, Direction};

    #[test]
    fn test_json_roundtrip_preserves_everything() {
        let mut state = SequencerState::default();
        state.master.set_length(12);
        state.master.set_shuffle(4);
        state.master.set_probability_enabled(2, true);
        state.master.set_probability(35);
        state.lanes.note.values[3] = 7;
        state.lanes.note.value_direction = Direction::PingPong;
        state.lanes.cc2.cc_route = CcRoute::ChordSelector;
        state.lanes.cc1.smoothing = 40;
        state.lanes.length.trigger_reset_interval = 2;
        state.patterns.push(StoredPattern { bank: 3, slot: 15, pattern: state.snapshot() });

        let json = state.to_json().unwrap();
        let decoded = SequencerState::from_json(&json).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let json = r#"{ "master": { "length": 8 }, "lanes": { "octave": { "valueLoopLength": 4 } } }"#;
        let state = SequencerState::from_json(json).unwrap();
        assert_eq!(state.master.length, 8);
        assert_eq!(state.master.probability, 100);
        assert_eq!(state.lanes.octave.value_loop_length, 4);
        assert_eq!(state.lanes.octave.trigger_loop_length, 16);
        assert_eq!(state.lanes.octave.value_direction, Direction::Forward);
        // Missing lane blocks keep their kind defaults
        assert_eq!(state.lanes.velocity.values, [100; 16]);
        assert!(state.patterns.is_empty());
    }

    #[test]
    fn test_cc_route_uses_numeric_code() {
        let mut state = SequencerState::default();
        state.lanes.cc3.cc_route = CcRoute::ProgramChange;
        let json = state.to_json().unwrap();
        assert!(json.contains("\"midiCC\": 128"));
    }

    #[test]
    fn test_out_of_grid_patterns_dropped() {
        let json = r#"{ "patterns": [ { "bank": 4, "slot": 0 }, { "bank": 1, "slot": 2 } ] }"#;
        let state = SequencerState::from_json(json).unwrap();
        assert_eq!(state.patterns.len(), 1);
        assert_eq!((state.patterns[0].bank, state.patterns[0].slot), (1, 2));
    }

    #[test]
    fn test_out_of_type_numbers_are_clamped() {
        let json = r#"{
            "master": { "length": -3, "shuffle": 900, "probability": 1000 },
            "lanes": {
                "cc1": { "smoothing": 300, "valueLoopLength": -1, "triggerLoopLength": 1e6,
                         "randomRange": 99999999999, "midiCC": 512 },
                "note": { "valueResetInterval": -2 }
            },
            "patterns": [ { "bank": -1, "slot": 0 }, { "bank": 0, "slot": 5 } ]
        }"#;
        let state = SequencerState::from_json(json).unwrap();
        assert_eq!(state.master.length, 1);
        assert_eq!(state.master.shuffle, 7);
        assert_eq!(state.master.probability, 100);
        assert_eq!(state.lanes.cc1.smoothing, 100);
        assert_eq!(state.lanes.cc1.value_loop_length, 1);
        assert_eq!(state.lanes.cc1.trigger_loop_length, 16);
        assert_eq!(state.lanes.cc1.random_range, 127);
        assert_eq!(state.lanes.cc1.cc_route, CcRoute::Off);
        assert_eq!(state.lanes.note.value_reset_interval, 0);
        assert_eq!(state.patterns.len(), 1);
        assert_eq!((state.patterns[0].bank, state.patterns[0].slot), (0, 5));
    }

    #[test]
    fn test_future_version_rejected() {
        let json = r#"{ "version": 99 }"#;
        assert!(matches!(
            SequencerState::from_json(json),
            Err(StateError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_garbage_is_an_error() {
        assert!(matches!(SequencerState::from_json("not json"), Err(StateError::Json(_))));
    }
}
