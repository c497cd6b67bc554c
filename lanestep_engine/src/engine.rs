use std::sync::Arc;

use arc_swap::ArcSwap;
use crossbeam_channel::{Receiver, Sender};
use lanestep_shared::chords::MAX_CHORD_NOTES;
use lanestep_shared::{
    CcRoute, ChordType, HostTransport, LaneKind, MidiEvent, MidiMessage, PatternSnapshot,
    LANE_COUNT, LANE_KINDS, SLOTS_PER_BANK, STEP_DURATION_QN,
};

use crate::commands::{EngineCommand, EngineFeedback};
use crate::config::EngineConfig;
use crate::gate::MasterGate;
use crate::lane::Lane;
use crate::midi_buffer::MidiBuffer;
use crate::monitor::{EngineMonitor, TransportSnapshot};
use crate::notes::{NoteLength, NoteManager, NoteRequest};
use crate::patterns::{PatternStore, PendingLoad};
use crate::sequencer::{BlockTiming, StepEvent, StepScheduler};
use crate::transport::{TransportChange, TransportState};

const NOTE_LANE: usize = 0;
const OCTAVE_LANE: usize = 1;
const VELOCITY_LANE: usize = 2;
const LENGTH_LANE: usize = 3;
const FIRST_CC_LANE: usize = 4;

/// Pattern-select notes above this are ignored.
const PATTERN_NOTE_LIMIT: u8 = 64;

/// Audio-thread half of the sequencer.
///
/// Owns all playback state; the control side reaches it only through the
/// command queue, the pattern store and the shared config. `process_block`
/// does not allocate or block.
pub struct SequencerEngine {
    config: Arc<ArcSwap<EngineConfig>>,
    command_rx: Receiver<EngineCommand>,
    feedback_tx: Sender<EngineFeedback>,
    patterns: Arc<PatternStore>,
    monitor: Arc<EngineMonitor>,
    sample_rate: f64,

    transport: TransportState,
    scheduler: StepScheduler,
    gate: MasterGate,
    lanes: [Lane; LANE_COUNT],
    notes: NoteManager,
    output: MidiBuffer,
    rng: fastrand::Rng,
    transpose: i32,
    /// Step counter for gate-mode input, which has no grid position.
    gate_steps: i64,
}

impl SequencerEngine {
    pub(crate) fn new(
        config: Arc<ArcSwap<EngineConfig>>,
        command_rx: Receiver<EngineCommand>,
        feedback_tx: Sender<EngineFeedback>,
        patterns: Arc<PatternStore>,
        monitor: Arc<EngineMonitor>,
        sample_rate: f64,
        initial: &PatternSnapshot,
    ) -> Self {
        let rng = config.load().rng();
        let lane_configs = initial.lanes.to_array();
        Self {
            config,
            command_rx,
            feedback_tx,
            patterns,
            monitor,
            sample_rate,
            transport: TransportState::default(),
            scheduler: StepScheduler::new(),
            gate: MasterGate::new(initial.master),
            lanes: std::array::from_fn(|i| Lane::new(LANE_KINDS[i], lane_configs[i])),
            notes: NoteManager::default(),
            output: MidiBuffer::default(),
            rng,
            transpose: 0,
            gate_steps: 0,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn lane(&self, kind: LaneKind) -> &Lane {
        &self.lanes[kind.index()]
    }

    pub fn gate(&self) -> &MasterGate {
        &self.gate
    }

    pub fn notes(&self) -> &NoteManager {
        &self.notes
    }

    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    /// Runs one audio block and returns the MIDI it produced, sorted by
    /// sample offset. `midi_in` must be sorted by offset as well.
    pub fn process_block(&mut self, host: &HostTransport, block_size: usize, midi_in: &[MidiEvent]) -> &[MidiEvent] {
        self.output.begin(block_size);
        if block_size == 0 {
            return self.output.finish();
        }

        let config = self.config.load_full();

        while let Ok(cmd) = self.command_rx.try_recv() {
            self.apply_command(cmd);
        }
        self.handle_control_input(midi_in, &config);
        self.apply_pending_load();

        let (Some(is_playing), Some(position), Some(bpm), Some(time_sig), Some(bar_start)) = (
            host.is_playing,
            host.ppq_position.filter(|p| p.is_finite()),
            host.bpm,
            host.time_signature,
            host.bar_start_ppq.filter(|p| p.is_finite()),
        ) else {
            // No usable clock: only gate releases can be honoured
            self.release_gate_keys(midi_in, &config);
            self.publish();
            return self.output.finish();
        };

        match self.transport.update(is_playing, position, bpm, time_sig, bar_start, config.wait_for_bar_sync) {
            TransportChange::Started => self.on_transport_start(),
            TransportChange::Stopped => self.on_transport_stop(),
            TransportChange::None => {}
        }

        let timing = BlockTiming::new(position, self.transport.tempo, self.sample_rate, block_size);

        if config.gate_mode {
            self.process_gate_input(midi_in, &timing, &config);
        } else {
            self.release_gate_keys(midi_in, &config);
            if self.transport.is_playing {
                self.process_grid(&timing, &config);
            }
        }

        for i in FIRST_CC_LANE..LANE_COUNT {
            let route = self.lanes[i].config().cc_route;
            self.lanes[i]
                .ramp
                .finish_block(block_size, route, config.output_channel, &mut self.output);
        }
        self.notes.flush(&timing, &mut self.output);

        self.publish();
        self.output.finish()
    }

    fn process_grid(&mut self, timing: &BlockTiming, config: &EngineConfig) {
        let count = self.scheduler.schedule(timing, self.gate.shuffle()).len();
        for i in 0..count {
            let step = self.scheduler.events()[i];
            if !self.transport.accept_step(step.absolute_step, step.time_qn) {
                continue;
            }
            self.check_bar_change(&step);
            self.process_step(&step, timing, config, None);
        }
    }

    fn check_bar_change(&mut self, step: &StepEvent) {
        let bar = self.transport.bar_index_at(step.base_time_qn());
        if self.transport.last_bar_index != Some(bar) {
            self.transport.last_bar_index = Some(bar);
            for lane in self.lanes.iter_mut() {
                lane.on_bar(bar);
            }
        }
    }

    /// One step through gate, lanes, notes and controllers. `gate_key` is set
    /// for gate-mode input: the step always fires and its notes sustain.
    fn process_step(&mut self, step: &StepEvent, timing: &BlockTiming, config: &EngineConfig, gate_key: Option<u8>) {
        let offset_step = step.absolute_step + self.transport.global_step_offset;
        let gate_fired = self.gate.evaluate(offset_step, &mut self.rng);
        let master_fired = gate_fired || gate_key.is_some();

        let mut lane_fired = [false; LANE_COUNT];
        for (fired, lane) in lane_fired.iter_mut().zip(self.lanes.iter_mut()) {
            *fired = lane.step(master_fired, &mut self.rng);
        }

        if master_fired {
            self.fire_notes(step, timing, config, gate_key);
        } else if NoteLength::from_code(self.lanes[LENGTH_LANE].current_value()).is_hold() {
            self.notes.extend_hold(step.time_qn, step.duration_qn);
        } else {
            self.notes.end_hold();
        }

        let ramp_samples_per_percent = timing.step_samples() / 100.0;
        for i in FIRST_CC_LANE..LANE_COUNT {
            let lane = &mut self.lanes[i];
            let route = lane.config().cc_route;
            if !lane_fired[i] || !route.emits_midi() {
                continue;
            }
            let value = lane.current_value().clamp(0, 127) as u8;
            let ramp_samples = match route {
                CcRoute::Controller(_) => (lane.config().smoothing as f64 * ramp_samples_per_percent) as usize,
                _ => 0,
            };
            lane.ramp
                .retarget(value, ramp_samples, step.sample_offset, route, config.output_channel, &mut self.output);
        }
    }

    fn fire_notes(&mut self, step: &StepEvent, timing: &BlockTiming, config: &EngineConfig, gate_key: Option<u8>) {
        let length = NoteLength::from_code(self.lanes[LENGTH_LANE].current_value());
        let velocity = self.lanes[VELOCITY_LANE].current_value();
        let Some(duration_qn) = length.duration_qn(step.duration_qn) else {
            self.notes.end_hold();
            return;
        };
        if velocity <= 0 {
            self.notes.end_hold();
            return;
        }

        let root = (self.lanes[OCTAVE_LANE].current_value() + 2) * 12
            + self.lanes[NOTE_LANE].current_value()
            + self.transpose;
        let mut pitches = [0u8; MAX_CHORD_NOTES];
        let count = self.selected_chord().expand_into(root.clamp(0, 127), &mut pitches);

        let request = NoteRequest {
            pitches: &pitches[..count],
            channel: config.output_channel,
            velocity: velocity.clamp(1, 127) as u8,
            start_qn: step.time_qn,
            sample_offset: step.sample_offset,
            duration_qn,
            hold: length.is_hold(),
            sustain_key: gate_key,
        };
        self.notes.trigger(&request, timing, &mut self.output);
    }

    /// First chord-selector lane with a non-zero value picks the chord.
    fn selected_chord(&self) -> ChordType {
        self.lanes[FIRST_CC_LANE..]
            .iter()
            .filter(|lane| lane.config().cc_route == CcRoute::ChordSelector)
            .map(|lane| lane.current_value())
            .find(|&value| value != 0)
            .map_or(ChordType::None, ChordType::from_selector_value)
    }

    /// Pattern-select and transpose channels. Handled before the transport so
    /// they work while stopped.
    fn handle_control_input(&mut self, midi_in: &[MidiEvent], config: &EngineConfig) {
        for event in midi_in {
            let MidiMessage::NoteOn { channel, pitch, velocity } = event.message else { continue };
            if velocity == 0 {
                continue;
            }
            if channel == config.pattern_channel && pitch < PATTERN_NOTE_LIMIT {
                let bank = pitch as usize / SLOTS_PER_BANK;
                let slot = pitch as usize % SLOTS_PER_BANK;
                self.patterns.request_load(bank, slot);
            } else if channel == config.transpose_channel {
                self.transpose = pitch as i32 - config.transpose_reference as i32;
            }
        }
    }

    fn process_gate_input(&mut self, midi_in: &[MidiEvent], timing: &BlockTiming, config: &EngineConfig) {
        for event in midi_in {
            if event.message.channel() != config.gate_channel {
                continue;
            }
            match event.message {
                MidiMessage::NoteOn { pitch, velocity, .. } if velocity > 0 => {
                    let sample_offset = event.sample_offset.min(timing.block_size - 1);
                    let step = StepEvent {
                        absolute_step: self.gate_steps,
                        time_qn: timing.time_at(sample_offset),
                        sample_offset,
                        duration_qn: STEP_DURATION_QN,
                    };
                    self.gate_steps += 1;
                    self.process_step(&step, timing, config, Some(pitch));
                }
                MidiMessage::NoteOn { pitch, .. } | MidiMessage::NoteOff { pitch, .. } => {
                    self.notes.release_key(pitch, event.sample_offset, &mut self.output);
                }
                _ => {}
            }
        }
    }

    fn release_gate_keys(&mut self, midi_in: &[MidiEvent], config: &EngineConfig) {
        for event in midi_in {
            if event.message.channel() == config.gate_channel && event.message.is_note_off() {
                if let MidiMessage::NoteOn { pitch, .. } | MidiMessage::NoteOff { pitch, .. } = event.message {
                    self.notes.release_key(pitch, event.sample_offset, &mut self.output);
                }
            }
        }
    }

    fn apply_pending_load(&mut self) {
        match self.patterns.take_pending() {
            PendingLoad::Loaded { bank, slot, snapshot } => {
                self.load_snapshot(&snapshot, true);
                let _ = self.feedback_tx.try_send(EngineFeedback::PatternLoaded { bank, slot });
            }
            PendingLoad::Empty { .. } | PendingLoad::Busy | PendingLoad::Nothing => {}
        }
    }

    /// Installs a full configuration and restarts every lane.
    fn load_snapshot(&mut self, snapshot: &PatternSnapshot, keep_live_groove: bool) {
        let master = if keep_live_groove {
            self.gate.config().loaded_from(&snapshot.master)
        } else {
            snapshot.master
        };
        self.gate.set_config(master);
        for (lane, config) in self.lanes.iter_mut().zip(snapshot.lanes.to_array()) {
            lane.load(config);
        }
    }

    fn apply_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::SetMaster(master) => self.gate.set_config(master),
            EngineCommand::SetLane { lane, config } => self.lanes[lane.index()].apply_config(config),
            EngineCommand::ReplaceAll(snapshot) => self.load_snapshot(&snapshot, false),
            EngineCommand::ResetLane(lane) => self.lanes[lane.index()].reset(),
            EngineCommand::ResetAll => {
                self.lanes.iter_mut().for_each(Lane::reset);
                self.transport.global_step_offset = 0;
            }
            EngineCommand::SetLaneValueIndex { lane, step } => self.lanes[lane.index()].set_value_index(step),
            EngineCommand::SetLaneTriggerIndex { lane, step } => {
                self.lanes[lane.index()].set_trigger_index(step)
            }
            EngineCommand::SetGlobalStepIndex(step) => {
                let next = self.transport.next_absolute_step();
                self.transport.global_step_offset = step as i64 - next;
            }
            EngineCommand::SyncLaneToBar(lane) => {
                let steps = self.steps_into_bar_for_next_step();
                self.lanes[lane.index()].sync_to_bar(steps);
            }
            EngineCommand::SyncAllToBar => {
                let steps = self.steps_into_bar_for_next_step();
                self.lanes.iter_mut().for_each(|lane| lane.sync_to_bar(steps));
            }
            EngineCommand::AllNotesOff => self.notes.release_all(0, &mut self.output),
        }
    }

    fn steps_into_bar_for_next_step(&self) -> usize {
        let next = self.transport.next_absolute_step();
        self.transport.steps_into_bar(next as f64 * STEP_DURATION_QN)
    }

    fn on_transport_start(&mut self) {
        self.scheduler.reset();
        self.lanes.iter_mut().for_each(Lane::reset);
        self.notes.end_hold();
        let _ = self.feedback_tx.try_send(EngineFeedback::TransportStarted);
    }

    fn on_transport_stop(&mut self) {
        self.notes.release_timed(0, &mut self.output);
        let _ = self.feedback_tx.try_send(EngineFeedback::TransportStopped);
    }

    fn publish(&self) {
        for (i, lane) in self.lanes.iter().enumerate() {
            self.monitor
                .publish_lane(i, lane.active_value_step(), lane.active_trigger_step());
        }
        self.monitor.publish_master_step(self.gate.current_step());
        self.monitor.publish_transport(TransportSnapshot {
            is_playing: self.transport.is_playing,
            position_qn: self.transport.last_position_qn,
            bar_start_qn: self.transport.last_bar_start_qn,
            time_sig_num: self.transport.time_sig_num,
            time_sig_denom: self.transport.time_sig_denom,
        });
        self.monitor
            .publish_notes(self.notes.active_count(), self.notes.dropped());
        self.monitor.publish_transpose(self.transpose);
    }
}
