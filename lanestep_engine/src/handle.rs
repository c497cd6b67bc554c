use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use lanestep_shared::{
    CcRoute, Direction, LaneConfig, LaneKind, MasterConfig, PatternSnapshot, SequencerState,
    LANE_KINDS, NUM_BANKS, SLOTS_PER_BANK,
};

use crate::commands::{EngineCommand, EngineFeedback};
use crate::config::EngineConfig;
use crate::monitor::{EngineMonitor, TransportSnapshot};
use crate::patterns::PatternStore;

/// Control-side half of the sequencer.
///
/// Keeps a mirror of the live configuration. Every edit changes the mirror
/// first and then ships the affected block to the audio thread, so reads
/// here never have to wait on playback.
pub struct SequencerHandle {
    mirror: PatternSnapshot,
    command_tx: Sender<EngineCommand>,
    feedback_rx: Receiver<EngineFeedback>,
    patterns: Arc<PatternStore>,
    monitor: Arc<EngineMonitor>,
    config: Arc<ArcSwap<EngineConfig>>,
    rng: fastrand::Rng,
}

impl SequencerHandle {
    pub(crate) fn new(
        mirror: PatternSnapshot,
        command_tx: Sender<EngineCommand>,
        feedback_rx: Receiver<EngineFeedback>,
        patterns: Arc<PatternStore>,
        monitor: Arc<EngineMonitor>,
        config: Arc<ArcSwap<EngineConfig>>,
    ) -> Self {
        let rng = match config.load().seed {
            Some(seed) => fastrand::Rng::with_seed(seed.wrapping_add(1)),
            None => fastrand::Rng::new(),
        };
        Self { mirror, command_tx, feedback_rx, patterns, monitor, config, rng }
    }

    fn send(&self, cmd: EngineCommand) {
        match self.command_tx.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                log::warn!("[Handle] Command queue full, dropping {:?}", cmd);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("[Handle] Engine is gone, command ignored");
            }
        }
    }

    // --- Reads ---

    pub fn master(&self) -> &MasterConfig {
        &self.mirror.master
    }

    pub fn lane(&self, kind: LaneKind) -> &LaneConfig {
        self.mirror.lanes.get(kind)
    }

    pub fn snapshot(&self) -> PatternSnapshot {
        self.mirror
    }

    pub fn monitor(&self) -> &EngineMonitor {
        &self.monitor
    }

    pub fn active_value_step(&self, kind: LaneKind) -> usize {
        self.monitor.active_value_step(kind)
    }

    pub fn active_trigger_step(&self, kind: LaneKind) -> usize {
        self.monitor.active_trigger_step(kind)
    }

    pub fn master_step(&self) -> usize {
        self.monitor.master_step()
    }

    pub fn transport(&self) -> TransportSnapshot {
        self.monitor.transport()
    }

    pub fn patterns(&self) -> &PatternStore {
        &self.patterns
    }

    // --- Master gate ---

    fn edit_master(&mut self, edit: impl FnOnce(&mut MasterConfig)) {
        edit(&mut self.mirror.master);
        self.mirror.master.sanitize();
        self.send(EngineCommand::SetMaster(self.mirror.master));
    }

    pub fn set_master_trigger(&mut self, step: usize, on: bool) {
        self.edit_master(|m| m.set_trigger(step, on));
    }

    pub fn set_master_probability_enabled(&mut self, step: usize, on: bool) {
        self.edit_master(|m| m.set_probability_enabled(step, on));
    }

    pub fn set_master_probability(&mut self, percent: u8) {
        self.edit_master(|m| m.set_probability(percent));
    }

    pub fn set_master_length(&mut self, len: usize) {
        self.edit_master(|m| m.set_length(len));
    }

    pub fn set_shuffle(&mut self, amount: u8) {
        self.edit_master(|m| m.set_shuffle(amount));
    }

    pub fn set_global_shuffle(&mut self, on: bool) {
        self.edit_master(|m| m.global_shuffle = on);
    }

    pub fn clear_master(&mut self) {
        self.edit_master(|m| {
            m.triggers = Default::default();
            m.clear_probability_flags();
        });
    }

    pub fn shift_master(&mut self, delta: i32) {
        self.edit_master(|m| {
            let len = m.length.max(1);
            let by = delta.rem_euclid(len as i32) as usize;
            m.triggers[..len].rotate_right(by);
            m.prob_enabled[..len].rotate_right(by);
        });
    }

    // --- Lanes ---

    fn edit_lane(&mut self, kind: LaneKind, edit: impl FnOnce(&mut LaneConfig)) {
        let lane = self.mirror.lanes.get_mut(kind);
        edit(lane);
        lane.sanitize(kind);
        let config = *lane;
        self.send(EngineCommand::SetLane { lane: kind, config });
    }

    pub fn set_lane_value(&mut self, kind: LaneKind, step: usize, value: i32) {
        self.edit_lane(kind, |l| l.set_value(kind, step, value));
    }

    pub fn set_lane_trigger(&mut self, kind: LaneKind, step: usize, on: bool) {
        self.edit_lane(kind, |l| l.set_trigger(step, on));
    }

    pub fn set_value_loop_length(&mut self, kind: LaneKind, len: usize) {
        self.edit_lane(kind, |l| l.set_value_loop_length(len));
    }

    pub fn set_trigger_loop_length(&mut self, kind: LaneKind, len: usize) {
        self.edit_lane(kind, |l| l.set_trigger_loop_length(len));
    }

    pub fn set_value_direction(&mut self, kind: LaneKind, direction: Direction) {
        self.edit_lane(kind, |l| l.value_direction = direction);
    }

    pub fn set_trigger_direction(&mut self, kind: LaneKind, direction: Direction) {
        self.edit_lane(kind, |l| l.trigger_direction = direction);
    }

    pub fn set_lane_sources(&mut self, kind: LaneKind, master: bool, local: bool) {
        self.edit_lane(kind, |l| {
            l.enable_master_source = master;
            l.enable_local_source = local;
        });
    }

    pub fn set_reset_intervals(&mut self, kind: LaneKind, value_bars: u32, trigger_bars: u32) {
        self.edit_lane(kind, |l| {
            l.value_reset_interval = value_bars;
            l.trigger_reset_interval = trigger_bars;
        });
    }

    pub fn set_random_range(&mut self, kind: LaneKind, range: i32) {
        self.edit_lane(kind, |l| l.random_range = range);
    }

    pub fn set_cc_route(&mut self, kind: LaneKind, route: CcRoute) {
        if matches!(kind, LaneKind::Controller(_)) {
            self.edit_lane(kind, |l| l.cc_route = route);
        }
    }

    pub fn set_smoothing(&mut self, kind: LaneKind, percent: u8) {
        self.edit_lane(kind, |l| l.smoothing = percent);
    }

    pub fn shift_values(&mut self, kind: LaneKind, delta: i32) {
        self.edit_lane(kind, |l| l.shift_values(delta));
    }

    pub fn shift_triggers(&mut self, kind: LaneKind, delta: i32) {
        self.edit_lane(kind, |l| l.shift_triggers(delta));
    }

    pub fn randomize_values(&mut self, kind: LaneKind) {
        let mut rng = self.rng.fork();
        self.edit_lane(kind, |l| l.randomize_values(kind, &mut rng));
    }

    pub fn randomize_triggers(&mut self, kind: LaneKind) {
        let mut rng = self.rng.fork();
        self.edit_lane(kind, |l| l.randomize_triggers(&mut rng));
    }

    /// Back to the kind's default values with cursors at the start.
    pub fn reset_lane(&mut self, kind: LaneKind) {
        self.edit_lane(kind, |l| l.fill_values(kind.default_value()));
        self.send(EngineCommand::ResetLane(kind));
    }

    pub fn reset_all(&mut self) {
        for kind in LANE_KINDS {
            let lane = self.mirror.lanes.get_mut(kind);
            lane.fill_values(kind.default_value());
            let config = *lane;
            self.send(EngineCommand::SetLane { lane: kind, config });
        }
        self.send(EngineCommand::ResetAll);
    }

    // --- Cursors ---

    pub fn set_lane_value_index(&self, kind: LaneKind, step: usize) {
        self.send(EngineCommand::SetLaneValueIndex { lane: kind, step });
    }

    pub fn set_lane_trigger_index(&self, kind: LaneKind, step: usize) {
        self.send(EngineCommand::SetLaneTriggerIndex { lane: kind, step });
    }

    /// Makes the next grid step play master step `step`.
    pub fn set_global_step_index(&self, step: usize) {
        self.send(EngineCommand::SetGlobalStepIndex(step));
    }

    pub fn sync_lane_to_bar(&self, kind: LaneKind) {
        self.send(EngineCommand::SyncLaneToBar(kind));
    }

    pub fn sync_all_to_bar(&self) {
        self.send(EngineCommand::SyncAllToBar);
    }

    pub fn all_notes_off(&self) {
        self.send(EngineCommand::AllNotesOff);
    }

    // --- Patterns ---

    pub fn save_pattern(&self, bank: usize, slot: usize) -> bool {
        self.patterns.save(bank, slot, &self.mirror)
    }

    /// Queues a load; the mirror follows once the engine reports it applied.
    pub fn load_pattern(&self, bank: usize, slot: usize) -> bool {
        if bank >= NUM_BANKS || slot >= SLOTS_PER_BANK {
            return false;
        }
        if self.patterns.is_empty(bank, slot) {
            log::debug!("[Handle] Pattern {}:{} is empty, not loading", bank, slot);
            return false;
        }
        self.patterns.request_load(bank, slot)
    }

    pub fn clear_pattern(&self, bank: usize, slot: usize) -> bool {
        self.patterns.clear(bank, slot)
    }

    /// Applies engine notifications to the mirror. Call from the UI loop.
    pub fn poll_feedback(&mut self) -> Vec<EngineFeedback> {
        let events: Vec<EngineFeedback> = self.feedback_rx.try_iter().collect();
        for event in &events {
            match *event {
                EngineFeedback::PatternLoaded { bank, slot } => {
                    if let Some(stored) = self.patterns.slot(bank, slot) {
                        self.mirror.master = self.mirror.master.loaded_from(&stored.snapshot.master);
                        self.mirror.lanes = stored.snapshot.lanes;
                        log::info!("[Handle] Pattern {}:{} loaded", bank, slot);
                    }
                }
                EngineFeedback::TransportStarted => {
                    log::debug!("[Handle] Transport started at {:.3} qn", self.monitor.transport().position_qn);
                }
                EngineFeedback::TransportStopped => {
                    log::debug!("[Handle] Transport stopped at {:.3} qn", self.monitor.transport().position_qn);
                }
            }
        }
        events
    }

    // --- State ---

    pub fn export_state(&self) -> SequencerState {
        SequencerState {
            master: self.mirror.master,
            lanes: self.mirror.lanes,
            patterns: self.patterns.export(),
            ..SequencerState::default()
        }
    }

    pub fn import_state(&mut self, state: &SequencerState) {
        let mut state = state.clone();
        state.sanitize();
        self.mirror = state.snapshot();
        self.patterns.import(&state.patterns);
        self.send(EngineCommand::ReplaceAll(self.mirror));
        log::info!("[Handle] Imported state with {} patterns", state.patterns.len());
    }

    // --- Engine config ---

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::clone(&self.config.load())
    }

    pub fn set_engine_config(&self, mut config: EngineConfig) {
        config.sanitize();
        self.config.store(Arc::new(config));
    }
}
