use lanestep_shared::{MAX_SHUFFLE, MAX_SWING_QN, MIN_SHUFFLE, STEP_DURATION_QN};

/// Most steps a single block may contain. Blocks longer than this at the
/// current tempo lose the excess steps.
pub const MAX_STEPS_PER_BLOCK: usize = 256;

/// A step is never shorter than this, in quarter notes.
pub const MIN_STEP_DURATION_QN: f64 = 0.001;

/// Positions past this are not scheduled; step indices would lose precision.
pub const MAX_POSITION_QN: f64 = 1.0e12;

const TIME_EPSILON: f64 = 1e-9;
const OFFSET_EPSILON: f64 = 1e-6;

/// Where a block sits on the musical timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockTiming {
    pub start_qn: f64,
    pub end_qn: f64,
    pub samples_per_qn: f64,
    pub block_size: usize,
}

impl BlockTiming {
    pub fn new(ppq_position: f64, bpm: f64, sample_rate: f64, block_size: usize) -> Self {
        let samples_per_qn = sample_rate * 60.0 / bpm;
        Self {
            start_qn: ppq_position,
            end_qn: ppq_position + block_size as f64 / samples_per_qn,
            samples_per_qn,
            block_size,
        }
    }

    /// Sample offset of a musical time, clamped into the block.
    pub fn sample_offset(&self, time_qn: f64) -> usize {
        let raw = ((time_qn - self.start_qn) * self.samples_per_qn + OFFSET_EPSILON).floor();
        let last = self.block_size.saturating_sub(1) as f64;
        raw.clamp(0.0, last) as usize
    }

    /// Musical time of a sample offset inside the block.
    pub fn time_at(&self, sample_offset: usize) -> f64 {
        self.start_qn + sample_offset as f64 / self.samples_per_qn
    }

    /// False when the host handed over a position or tempo that cannot be scheduled.
    pub fn is_usable(&self) -> bool {
        self.start_qn.is_finite()
            && self.end_qn.is_finite()
            && self.samples_per_qn.is_finite()
            && self.start_qn.abs() < MAX_POSITION_QN
    }

    pub fn step_samples(&self) -> f64 {
        STEP_DURATION_QN * self.samples_per_qn
    }
}

/// One step due inside the current block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepEvent {
    pub absolute_step: i64,
    /// Swung start time in quarter notes.
    pub time_qn: f64,
    pub sample_offset: usize,
    /// Distance to the next swung step.
    pub duration_qn: f64,
}

impl StepEvent {
    /// Unswung grid time of the step.
    pub fn base_time_qn(&self) -> f64 {
        self.absolute_step as f64 * STEP_DURATION_QN
    }
}

/// Delay applied to odd steps for a shuffle amount.
pub fn swing_delay_qn(shuffle: u8) -> f64 {
    let amount = shuffle.clamp(MIN_SHUFFLE, MAX_SHUFFLE) - MIN_SHUFFLE;
    amount as f64 / (MAX_SHUFFLE - MIN_SHUFFLE) as f64 * MAX_SWING_QN
}

/// Finds the swung grid steps falling inside each block.
///
/// The shuffle amount is latched on even steps so both halves of a pair
/// always share one swing value. Each even step latches once; rescanning it
/// in a later block keeps the value it latched the first time.
#[derive(Debug, Clone)]
pub struct StepScheduler {
    latched_shuffle: u8,
    latched_step: Option<i64>,
    last_start_qn: f64,
    events: Vec<StepEvent>,
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl StepScheduler {
    pub fn new() -> Self {
        Self {
            latched_shuffle: MIN_SHUFFLE,
            latched_step: None,
            last_start_qn: f64::NEG_INFINITY,
            events: Vec::with_capacity(MAX_STEPS_PER_BLOCK),
        }
    }

    pub fn reset(&mut self) {
        self.latched_shuffle = MIN_SHUFFLE;
        self.latched_step = None;
        self.last_start_qn = f64::NEG_INFINITY;
        self.events.clear();
    }

    pub fn latched_shuffle(&self) -> u8 {
        self.latched_shuffle
    }

    fn effective_time(&self, k: i64) -> f64 {
        let base = k as f64 * STEP_DURATION_QN;
        if k.rem_euclid(2) == 1 {
            base + swing_delay_qn(self.latched_shuffle)
        } else {
            base
        }
    }

    /// Collects every step whose swung time lies in `[start, end)` of the block.
    pub fn schedule(&mut self, timing: &BlockTiming, shuffle: u8) -> &[StepEvent] {
        self.events.clear();
        if !timing.is_usable() {
            return &self.events;
        }
        if timing.start_qn + TIME_EPSILON < self.last_start_qn {
            // Playhead moved backwards (loop or seek)
            self.latched_step = None;
        }
        self.last_start_qn = timing.start_qn;

        // Start far enough back that a swung odd step from before the block
        // start is still considered.
        let scan_from = (timing.start_qn - STEP_DURATION_QN - MAX_SWING_QN - TIME_EPSILON) / STEP_DURATION_QN;
        let mut k = scan_from.floor() as i64;

        while self.events.len() < MAX_STEPS_PER_BLOCK {
            // Even steps sit on the grid, so this check never needs the latch
            let time_qn = self.effective_time(k);
            if time_qn >= timing.end_qn {
                break;
            }
            if k.rem_euclid(2) == 0 && self.latched_step.map_or(true, |last| k > last) {
                self.latched_shuffle = shuffle.clamp(MIN_SHUFFLE, MAX_SHUFFLE);
                self.latched_step = Some(k);
            }
            if time_qn >= timing.start_qn {
                let duration_qn = (self.effective_time(k + 1) - time_qn).max(MIN_STEP_DURATION_QN);
                self.events.push(StepEvent {
                    absolute_step: k,
                    time_qn,
                    sample_offset: timing.sample_offset(time_qn),
                    duration_qn,
                });
            }
            k += 1;
        }

        &self.events
    }

    pub fn events(&self) -> &[StepEvent] {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_steps_at_120_bpm() {
        let mut scheduler = StepScheduler::new();
        let timing = BlockTiming::new(0.0, 120.0, 48000.0, 24000);
        let steps = scheduler.schedule(&timing, 1).to_vec();
        let offsets: Vec<usize> = steps.iter().map(|s| s.sample_offset).collect();
        assert_eq!(offsets, vec![0, 6000, 12000, 18000]);
        assert!(steps.iter().all(|s| (s.duration_qn - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_full_shuffle_delays_odd_steps_by_3000_samples() {
        let mut scheduler = StepScheduler::new();
        let timing = BlockTiming::new(0.0, 120.0, 48000.0, 24000);
        let steps = scheduler.schedule(&timing, 7).to_vec();
        let offsets: Vec<(i64, usize)> = steps.iter().map(|s| (s.absolute_step, s.sample_offset)).collect();
        assert_eq!(offsets, vec![(0, 0), (1, 9000), (2, 12000), (3, 21000)]);
        // Even step runs long, odd step short
        assert!((steps[0].duration_qn - 0.375).abs() < 1e-12);
        assert!((steps[1].duration_qn - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_swung_step_from_previous_window_lands_in_next_block() {
        let mut scheduler = StepScheduler::new();
        // Step 1 base 0.25, swung to 0.375. Block covers [0.3, 0.4)
        let timing = BlockTiming::new(0.3, 120.0, 48000.0, 2400);
        let steps = scheduler.schedule(&timing, 7).to_vec();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].absolute_step, 1);
        assert_eq!(steps[0].sample_offset, 1800);
    }

    #[test]
    fn test_shuffle_latched_on_even_step() {
        let mut scheduler = StepScheduler::new();
        // Block ends between step 0 and its swung partner
        let first = BlockTiming::new(0.0, 120.0, 48000.0, 7200);
        assert_eq!(scheduler.schedule(&first, 7).len(), 1);

        // Shuffle changes before step 1 is reached: the pair keeps 7
        let second = BlockTiming::new(0.3, 120.0, 48000.0, 4800);
        let steps = scheduler.schedule(&second, 1).to_vec();
        assert_eq!(steps[0].absolute_step, 1);
        assert!((steps[0].time_qn - 0.375).abs() < 1e-12);
        // Step 2 starts exactly at the block end and has not latched yet
        assert_eq!(scheduler.latched_shuffle(), 7);
    }

    #[test]
    fn test_shuffle_change_applies_to_next_unprocessed_pair() {
        let mut scheduler = StepScheduler::new();
        // [0, 0.49): steps 0 and 1 at full swing
        let first = BlockTiming::new(0.0, 120.0, 48000.0, 11760);
        let steps: Vec<i64> = scheduler.schedule(&first, 7).iter().map(|s| s.absolute_step).collect();
        assert_eq!(steps, vec![0, 1]);

        // Step 2 was past the end of the first block, so it latches the new amount
        let second = BlockTiming::new(0.49, 120.0, 48000.0, 12000);
        let steps: Vec<(i64, f64)> = scheduler
            .schedule(&second, 1)
            .iter()
            .map(|s| (s.absolute_step, s.time_qn))
            .collect();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].0, 2);
        assert!((steps[0].1 - 0.5).abs() < 1e-12);
        assert_eq!(steps[1].0, 3);
        assert!((steps[1].1 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_unusable_timing_schedules_nothing() {
        let mut scheduler = StepScheduler::new();
        for timing in [
            BlockTiming::new(f64::NAN, 120.0, 48000.0, 512),
            BlockTiming::new(f64::INFINITY, 120.0, 48000.0, 512),
            BlockTiming::new(0.0, f64::INFINITY, 48000.0, 512),
            BlockTiming::new(0.0, f64::NAN, 48000.0, 512),
            BlockTiming::new(1.0e300, 120.0, 48000.0, 512),
        ] {
            assert!(!timing.is_usable());
            assert!(scheduler.schedule(&timing, 4).is_empty());
        }
        // Still schedules normally afterwards
        let timing = BlockTiming::new(0.0, 120.0, 48000.0, 512);
        assert_eq!(scheduler.schedule(&timing, 4).len(), 1);
    }

    #[test]
    fn test_huge_tempo_caps_steps_per_block() {
        let mut scheduler = StepScheduler::new();
        let timing = BlockTiming::new(0.0, 1.0e9, 48000.0, 512);
        assert_eq!(scheduler.schedule(&timing, 1).len(), MAX_STEPS_PER_BLOCK);
    }

    #[test]
    fn test_consecutive_blocks_cover_every_step_once() {
        let mut scheduler = StepScheduler::new();
        let mut seen = Vec::new();
        let block = 512;
        let samples_per_qn = 48000.0 * 60.0 / 133.0;
        let mut pos = 0.0;
        for _ in 0..400 {
            let timing = BlockTiming::new(pos, 133.0, 48000.0, block);
            seen.extend(scheduler.schedule(&timing, 5).iter().map(|s| s.absolute_step));
            pos += block as f64 / samples_per_qn;
        }
        let expected: Vec<i64> = (0..seen.len() as i64).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_swing_delay_range() {
        assert_eq!(swing_delay_qn(1), 0.0);
        assert!((swing_delay_qn(7) - MAX_SWING_QN).abs() < 1e-12);
        assert!((swing_delay_qn(4) - MAX_SWING_QN / 2.0).abs() < 1e-12);
        assert_eq!(swing_delay_qn(0), 0.0);
    }
}
