use serde::{Deserialize, Serialize};

use crate::numeric;
use crate::NUM_STEPS;

/// Playback order of a lane cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
    /// Bounces between the ends, playing each end step twice.
    PingPong,
    /// Bounces between the ends without repeating them.
    Bounce,
    Random,
    /// One step left or right, chosen at random on every advance.
    RandomDirection,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::Forward,
        Direction::Backward,
        Direction::PingPong,
        Direction::Bounce,
        Direction::Random,
        Direction::RandomDirection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Direction::Forward => "FWD",
            Direction::Backward => "BWD",
            Direction::PingPong => "PING",
            Direction::Bounce => "BNC",
            Direction::Random => "RND",
            Direction::RandomDirection => "WALK",
        }
    }
}

/// What a controller lane sends. Persisted as the plain `midiCC` number
/// (0 off, 1-127 controller, 128 program, 129 pressure, 130 chord selector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "i64", into = "u8")]
pub enum CcRoute {
    #[default]
    Off,
    Controller(u8),
    ProgramChange,
    ChannelPressure,
    ChordSelector,
}

impl From<u8> for CcRoute {
    fn from(code: u8) -> Self {
        match code {
            1..=127 => CcRoute::Controller(code),
            128 => CcRoute::ProgramChange,
            129 => CcRoute::ChannelPressure,
            130 => CcRoute::ChordSelector,
            _ => CcRoute::Off,
        }
    }
}

impl From<i64> for CcRoute {
    fn from(code: i64) -> Self {
        u8::try_from(code).map_or(CcRoute::Off, CcRoute::from)
    }
}

impl From<CcRoute> for u8 {
    fn from(route: CcRoute) -> Self {
        match route {
            CcRoute::Off => 0,
            CcRoute::Controller(cc) => cc.clamp(1, 127),
            CcRoute::ProgramChange => 128,
            CcRoute::ChannelPressure => 129,
            CcRoute::ChordSelector => 130,
        }
    }
}

impl CcRoute {
    /// True for routes that put controller-type messages on the output.
    pub fn emits_midi(&self) -> bool {
        matches!(
            self,
            CcRoute::Controller(_) | CcRoute::ProgramChange | CcRoute::ChannelPressure
        )
    }

    pub fn label(&self) -> String {
        match self {
            CcRoute::Off => "OFF".to_string(),
            CcRoute::Controller(cc) => format!("CC {}", cc),
            CcRoute::ProgramChange => "PGM".to_string(),
            CcRoute::ChannelPressure => "PRESSURE".to_string(),
            CcRoute::ChordSelector => "CHORD".to_string(),
        }
    }
}

/// The musical parameter a lane drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaneKind {
    Note,
    Octave,
    Velocity,
    Length,
    /// Controller lane 0-3.
    Controller(u8),
}

pub const LANE_COUNT: usize = 8;

/// Fixed lane order used everywhere an engine or snapshot indexes lanes.
pub const LANE_KINDS: [LaneKind; LANE_COUNT] = [
    LaneKind::Note,
    LaneKind::Octave,
    LaneKind::Velocity,
    LaneKind::Length,
    LaneKind::Controller(0),
    LaneKind::Controller(1),
    LaneKind::Controller(2),
    LaneKind::Controller(3),
];

impl LaneKind {
    pub fn index(self) -> usize {
        match self {
            LaneKind::Note => 0,
            LaneKind::Octave => 1,
            LaneKind::Velocity => 2,
            LaneKind::Length => 3,
            LaneKind::Controller(n) => 4 + (n as usize).min(3),
        }
    }

    pub fn from_index(idx: usize) -> Option<LaneKind> {
        LANE_KINDS.get(idx).copied()
    }

    /// Inclusive value range.
    pub fn range(self) -> (i32, i32) {
        match self {
            LaneKind::Note => (0, 11),
            LaneKind::Octave => (-2, 8),
            LaneKind::Velocity => (0, 127),
            LaneKind::Length => (0, 9),
            LaneKind::Controller(_) => (0, 127),
        }
    }

    pub fn default_value(self) -> i32 {
        match self {
            LaneKind::Note => 0,
            LaneKind::Octave => 3,
            LaneKind::Velocity => 100,
            LaneKind::Length => 5, // 1/32
            LaneKind::Controller(_) => 0,
        }
    }

    pub fn clamp(self, value: i32) -> i32 {
        let (lo, hi) = self.range();
        value.clamp(lo, hi)
    }

    pub fn name(self) -> &'static str {
        match self {
            LaneKind::Note => "NOTE",
            LaneKind::Octave => "OCT",
            LaneKind::Velocity => "VEL",
            LaneKind::Length => "LEN",
            LaneKind::Controller(0) => "CC 1",
            LaneKind::Controller(1) => "CC 2",
            LaneKind::Controller(2) => "CC 3",
            LaneKind::Controller(_) => "CC 4",
        }
    }
}

/// Editable configuration of one lane. This is what patterns and the persisted
/// state store; cursors live in the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LaneConfig {
    #[serde(deserialize_with = "numeric::saturating_values")]
    pub values: [i32; NUM_STEPS],
    #[serde(deserialize_with = "numeric::saturating_usize")]
    pub value_loop_length: usize,
    pub triggers: [bool; NUM_STEPS],
    #[serde(deserialize_with = "numeric::saturating_usize")]
    pub trigger_loop_length: usize,
    pub value_direction: Direction,
    pub trigger_direction: Direction,
    pub enable_master_source: bool,
    pub enable_local_source: bool,
    /// Bars between automatic value cursor resets, 0 = never.
    #[serde(deserialize_with = "numeric::saturating_u32")]
    pub value_reset_interval: u32,
    #[serde(deserialize_with = "numeric::saturating_u32")]
    pub trigger_reset_interval: u32,
    /// 0 randomizes over the whole range, otherwise jitters by +/- this much.
    #[serde(deserialize_with = "numeric::saturating_i32")]
    pub random_range: i32,
    #[serde(rename = "midiCC")]
    pub cc_route: CcRoute,
    /// Controller ramp time as a percentage of one step (0 = jump).
    #[serde(deserialize_with = "numeric::saturating_u8")]
    pub smoothing: u8,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            values: [0; NUM_STEPS],
            value_loop_length: NUM_STEPS,
            triggers: [true; NUM_STEPS],
            trigger_loop_length: NUM_STEPS,
            value_direction: Direction::Forward,
            trigger_direction: Direction::Forward,
            enable_master_source: false,
            enable_local_source: true,
            value_reset_interval: 0,
            trigger_reset_interval: 0,
            random_range: 0,
            cc_route: CcRoute::Off,
            smoothing: 0,
        }
    }
}

impl LaneConfig {
    pub fn for_kind(kind: LaneKind) -> Self {
        Self {
            values: [kind.default_value(); NUM_STEPS],
            ..Self::default()
        }
    }

    pub fn set_value(&mut self, kind: LaneKind, step: usize, value: i32) {
        if let Some(slot) = self.values.get_mut(step) {
            *slot = kind.clamp(value);
        }
    }

    pub fn set_trigger(&mut self, step: usize, on: bool) {
        if let Some(slot) = self.triggers.get_mut(step) {
            *slot = on;
        }
    }

    pub fn set_value_loop_length(&mut self, len: usize) {
        self.value_loop_length = len.clamp(1, NUM_STEPS);
    }

    pub fn set_trigger_loop_length(&mut self, len: usize) {
        self.trigger_loop_length = len.clamp(1, NUM_STEPS);
    }

    pub fn fill_values(&mut self, value: i32) {
        self.values = [value; NUM_STEPS];
    }

    /// Rotates the looped part of the value row; positive `delta` moves values later.
    pub fn shift_values(&mut self, delta: i32) {
        let len = self.value_loop_length.clamp(1, NUM_STEPS);
        let by = delta.rem_euclid(len as i32) as usize;
        self.values[..len].rotate_right(by);
    }

    pub fn shift_triggers(&mut self, delta: i32) {
        let len = self.trigger_loop_length.clamp(1, NUM_STEPS);
        let by = delta.rem_euclid(len as i32) as usize;
        self.triggers[..len].rotate_right(by);
    }

    pub fn randomize_values(&mut self, kind: LaneKind, rng: &mut fastrand::Rng) {
        let (lo, hi) = kind.range();
        let range = self.random_range.clamp(0, hi - lo);
        for v in self.values.iter_mut() {
            *v = if range == 0 {
                rng.i32(lo..=hi)
            } else {
                (*v + rng.i32(-range..=range)).clamp(lo, hi)
            };
        }
    }

    pub fn randomize_triggers(&mut self, rng: &mut fastrand::Rng) {
        for t in self.triggers.iter_mut() {
            *t = rng.bool();
        }
    }

    /// Pulls every field back into its legal range after decoding or editing.
    pub fn sanitize(&mut self, kind: LaneKind) {
        self.value_loop_length = self.value_loop_length.clamp(1, NUM_STEPS);
        self.trigger_loop_length = self.trigger_loop_length.clamp(1, NUM_STEPS);
        for v in self.values.iter_mut() {
            *v = kind.clamp(*v);
        }
        let (lo, hi) = kind.range();
        self.random_range = self.random_range.clamp(0, hi - lo);
        self.smoothing = self.smoothing.min(100);
    }
}
