use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use lanestep_shared::{LaneKind, LANE_COUNT};

/// Transport as last seen by the audio thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransportSnapshot {
    pub is_playing: bool,
    pub position_qn: f64,
    pub bar_start_qn: f64,
    pub time_sig_num: u32,
    pub time_sig_denom: u32,
}

/// Playback state the audio thread publishes for the UI. Lock-free: every
/// field is its own atomic, written once per block.
#[derive(Debug)]
pub struct EngineMonitor {
    active_value_steps: [AtomicU8; LANE_COUNT],
    active_trigger_steps: [AtomicU8; LANE_COUNT],
    master_step: AtomicU8,
    is_playing: AtomicBool,
    position_bits: AtomicU64,
    bar_start_bits: AtomicU64,
    /// numerator << 16 | denominator
    time_signature: AtomicU32,
    active_notes: AtomicU32,
    dropped_notes: AtomicU64,
    transpose: AtomicU32,
}

impl Default for EngineMonitor {
    fn default() -> Self {
        Self {
            active_value_steps: std::array::from_fn(|_| AtomicU8::new(0)),
            active_trigger_steps: std::array::from_fn(|_| AtomicU8::new(0)),
            master_step: AtomicU8::new(0),
            is_playing: AtomicBool::new(false),
            position_bits: AtomicU64::new(0.0f64.to_bits()),
            bar_start_bits: AtomicU64::new(0.0f64.to_bits()),
            time_signature: AtomicU32::new(4 << 16 | 4),
            active_notes: AtomicU32::new(0),
            dropped_notes: AtomicU64::new(0),
            transpose: AtomicU32::new(0),
        }
    }
}

impl EngineMonitor {
    pub fn publish_lane(&self, lane: usize, value_step: usize, trigger_step: usize) {
        if lane < LANE_COUNT {
            self.active_value_steps[lane].store(value_step as u8, Ordering::Relaxed);
            self.active_trigger_steps[lane].store(trigger_step as u8, Ordering::Relaxed);
        }
    }

    pub fn publish_master_step(&self, step: usize) {
        self.master_step.store(step as u8, Ordering::Relaxed);
    }

    pub fn publish_transport(&self, snapshot: TransportSnapshot) {
        self.is_playing.store(snapshot.is_playing, Ordering::Relaxed);
        self.position_bits.store(snapshot.position_qn.to_bits(), Ordering::Relaxed);
        self.bar_start_bits.store(snapshot.bar_start_qn.to_bits(), Ordering::Relaxed);
        let sig = (snapshot.time_sig_num.min(0xFFFF) << 16) | snapshot.time_sig_denom.min(0xFFFF);
        self.time_signature.store(sig, Ordering::Relaxed);
    }

    pub fn publish_notes(&self, active: usize, dropped: u64) {
        self.active_notes.store(active as u32, Ordering::Relaxed);
        self.dropped_notes.store(dropped, Ordering::Relaxed);
    }

    pub fn publish_transpose(&self, semitones: i32) {
        self.transpose.store(semitones as u32, Ordering::Relaxed);
    }

    pub fn active_value_step(&self, lane: LaneKind) -> usize {
        self.active_value_steps[lane.index()].load(Ordering::Relaxed) as usize
    }

    pub fn active_trigger_step(&self, lane: LaneKind) -> usize {
        self.active_trigger_steps[lane.index()].load(Ordering::Relaxed) as usize
    }

    pub fn master_step(&self) -> usize {
        self.master_step.load(Ordering::Relaxed) as usize
    }

    pub fn active_notes(&self) -> usize {
        self.active_notes.load(Ordering::Relaxed) as usize
    }

    pub fn dropped_notes(&self) -> u64 {
        self.dropped_notes.load(Ordering::Relaxed)
    }

    pub fn transpose(&self) -> i32 {
        self.transpose.load(Ordering::Relaxed) as i32
    }

    pub fn transport(&self) -> TransportSnapshot {
        let sig = self.time_signature.load(Ordering::Relaxed);
        TransportSnapshot {
            is_playing: self.is_playing.load(Ordering::Relaxed),
            position_qn: f64::from_bits(self.position_bits.load(Ordering::Relaxed)),
            bar_start_qn: f64::from_bits(self.bar_start_bits.load(Ordering::Relaxed)),
            time_sig_num: sig >> 16,
            time_sig_denom: sig & 0xFFFF,
        }
    }
}
