use lanestep_shared::STEP_DURATION_QN;

const BAR_EPSILON: f64 = 1e-6;

/// Host tempo used when the reported one is unusable.
pub const FALLBACK_BPM: f64 = 120.0;

/// Play-state edge detected at the start of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportChange {
    None,
    Started,
    Stopped,
}

/// Engine-side view of the host transport. Owned by the audio thread.
#[derive(Clone, Copy, Debug)]
pub struct TransportState {
    pub is_playing: bool,
    /// Frozen while stopped.
    pub last_position_qn: f64,
    pub last_bar_start_qn: f64,
    pub time_sig_num: u32,
    pub time_sig_denom: u32,
    pub tempo: f64,
    /// Added to the absolute step before the master gate looks it up.
    pub global_step_offset: i64,
    pub last_absolute_step: Option<i64>,
    pub last_bar_index: Option<i64>,
    /// When starting mid-bar, steps before this time are skipped.
    pub sync_from_qn: Option<f64>,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            is_playing: false,
            last_position_qn: 0.0,
            last_bar_start_qn: 0.0,
            time_sig_num: 4,
            time_sig_denom: 4,
            tempo: FALLBACK_BPM,
            global_step_offset: 0,
            last_absolute_step: None,
            last_bar_index: None,
            sync_from_qn: None,
        }
    }
}

impl TransportState {
    /// Bar length in quarter notes for the current time signature.
    pub fn bar_length_qn(&self) -> f64 {
        let len = self.time_sig_num as f64 * 4.0 / self.time_sig_denom.max(1) as f64;
        if len > 0.0 {
            len
        } else {
            4.0
        }
    }

    /// Takes the host values for this block and reports play-state edges.
    pub fn update(
        &mut self,
        is_playing: bool,
        position_qn: f64,
        tempo: f64,
        time_signature: (u32, u32),
        bar_start_qn: f64,
        wait_for_bar_sync: bool,
    ) -> TransportChange {
        let was_playing = self.is_playing;
        self.is_playing = is_playing;

        if !is_playing {
            return if was_playing { TransportChange::Stopped } else { TransportChange::None };
        }

        let jumped_back = was_playing && position_qn + BAR_EPSILON < self.last_position_qn;

        self.tempo = if tempo.is_finite() && tempo > 0.0 { tempo } else { FALLBACK_BPM };
        if time_signature.0 > 0 && time_signature.1 > 0 {
            self.time_sig_num = time_signature.0;
            self.time_sig_denom = time_signature.1;
        }
        self.last_position_qn = position_qn;
        self.last_bar_start_qn = bar_start_qn;

        if !was_playing {
            self.global_step_offset = 0;
            self.last_absolute_step = None;
            self.last_bar_index = None;
            self.sync_from_qn = None;

            let bar_len = self.bar_length_qn();
            let into_bar = position_qn - bar_start_qn;
            if wait_for_bar_sync && into_bar > BAR_EPSILON && bar_len - into_bar > BAR_EPSILON {
                self.sync_from_qn = Some(bar_start_qn + bar_len);
            }
            return TransportChange::Started;
        }

        if jumped_back {
            // Host looped: let the earlier steps play again
            self.last_absolute_step = None;
        }
        TransportChange::None
    }

    /// Bar number a grid time belongs to.
    pub fn bar_index_at(&self, time_qn: f64) -> i64 {
        let bar_len = self.bar_length_qn();
        let bar_start = self.last_bar_start_qn;
        ((time_qn - bar_start) / bar_len + BAR_EPSILON).floor() as i64 + (bar_start / bar_len).round() as i64
    }

    /// Grid steps between the start of the bar containing `time_qn` and `time_qn`.
    pub fn steps_into_bar(&self, time_qn: f64) -> usize {
        let bar_len = self.bar_length_qn();
        let bars = ((time_qn - self.last_bar_start_qn) / bar_len + BAR_EPSILON).floor();
        let bar_start = self.last_bar_start_qn + bars * bar_len;
        ((time_qn - bar_start) / STEP_DURATION_QN + BAR_EPSILON).floor().max(0.0) as usize
    }

    /// Absolute step the grid will process next.
    pub fn next_absolute_step(&self) -> i64 {
        match self.last_absolute_step {
            Some(step) => step + 1,
            None => (self.last_position_qn / STEP_DURATION_QN - BAR_EPSILON).ceil() as i64,
        }
    }

    /// Whether step `k` at swung time `time_qn` should be processed now.
    /// Marks it processed when it is.
    pub fn accept_step(&mut self, k: i64, time_qn: f64) -> bool {
        if let Some(last) = self.last_absolute_step {
            if k <= last {
                return false;
            }
        }
        if let Some(sync_from) = self.sync_from_qn {
            if time_qn + BAR_EPSILON < sync_from {
                return false;
            }
            self.sync_from_qn = None;
        }
        self.last_absolute_step = Some(k);
        true
    }
}
