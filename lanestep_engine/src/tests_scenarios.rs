#[cfg(test)]
mod tests {
    use crate::{create, EngineConfig, EngineFeedback, SequencerEngine, SequencerHandle};
    use lanestep_shared::{CcRoute, HostTransport, LaneKind, MidiEvent, MidiMessage, NUM_STEPS};

    const SAMPLE_RATE: f64 = 48000.0;
    const BLOCK: usize = 512;
    /// One 16th at 120 BPM / 48 kHz.
    const STEP_SAMPLES: u64 = 6000;

    struct Rig {
        handle: SequencerHandle,
        engine: SequencerEngine,
        blocks: u64,
        start_qn: f64,
        bpm: f64,
    }

    impl Rig {
        fn new(config: EngineConfig) -> Self {
            let (handle, engine) = create(config, SAMPLE_RATE).unwrap();
            Self { handle, engine, blocks: 0, start_qn: 0.0, bpm: 120.0 }
        }

        fn default_rig() -> Self {
            Self::new(EngineConfig { seed: Some(1), wait_for_bar_sync: false, ..Default::default() })
        }

        fn position(&self) -> f64 {
            let samples_per_qn = SAMPLE_RATE * 60.0 / self.bpm;
            self.start_qn + (self.blocks * BLOCK as u64) as f64 / samples_per_qn
        }

        fn host(&self, playing: bool) -> HostTransport {
            let pos = self.position();
            HostTransport {
                is_playing: Some(playing),
                ppq_position: Some(pos),
                bpm: Some(self.bpm),
                time_signature: Some((4, 4)),
                bar_start_ppq: Some((pos / 4.0).floor() * 4.0),
            }
        }

        /// One block; events come back with absolute sample times.
        fn block(&mut self, playing: bool, midi_in: &[MidiEvent]) -> Vec<(u64, MidiMessage)> {
            let host = self.host(playing);
            let base = self.blocks * BLOCK as u64;
            let out = self
                .engine
                .process_block(&host, BLOCK, midi_in)
                .iter()
                .map(|e| (base + e.sample_offset as u64, e.message))
                .collect();
            self.blocks += 1;
            out
        }

        fn play(&mut self, blocks: usize) -> Vec<(u64, MidiMessage)> {
            (0..blocks).flat_map(|_| self.block(true, &[])).collect()
        }

        fn all_master_steps(&mut self) {
            for step in 0..NUM_STEPS {
                self.handle.set_master_trigger(step, true);
            }
        }

        fn fill_lane(&mut self, kind: LaneKind, value: i32) {
            for step in 0..NUM_STEPS {
                self.handle.set_lane_value(kind, step, value);
            }
        }
    }

    fn note_ons(events: &[(u64, MidiMessage)]) -> Vec<(u64, u8, u8)> {
        events
            .iter()
            .filter_map(|(t, m)| match *m {
                MidiMessage::NoteOn { pitch, velocity, .. } if velocity > 0 => Some((*t, pitch, velocity)),
                _ => None,
            })
            .collect()
    }

    fn note_offs(events: &[(u64, MidiMessage)]) -> Vec<(u64, u8)> {
        events
            .iter()
            .filter_map(|(t, m)| match *m {
                MidiMessage::NoteOff { pitch, .. } => Some((*t, pitch)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_silent_without_master_steps() {
        let mut rig = Rig::default_rig();
        assert!(rig.play(100).is_empty());
    }

    #[test]
    fn test_master_pattern_advances_values_only_on_fire() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_length(4);
        rig.handle.set_master_trigger(0, true);
        rig.handle.set_master_trigger(2, true);

        let vel = LaneKind::Velocity;
        for (step, v) in [10, 20, 30, 40].into_iter().enumerate() {
            rig.handle.set_lane_value(vel, step, v);
        }
        rig.handle.set_value_loop_length(vel, 4);
        rig.handle.set_lane_sources(vel, true, false);

        // 40 blocks cover steps 0-3
        let ons = note_ons(&rig.play(40));
        assert_eq!(ons, vec![(0, 60, 10), (2 * STEP_SAMPLES, 60, 20)]);
    }

    #[test]
    fn test_first_three_steps_after_start() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        for step in 0..NUM_STEPS {
            rig.handle.set_lane_value(LaneKind::Note, step, (step as i32 * 2) % 12);
        }
        // 30 blocks cover steps 0-2
        let ons = note_ons(&rig.play(30));
        let pitches: Vec<u8> = ons.iter().map(|n| n.1).collect();
        assert_eq!(pitches, vec![60, 62, 64]);
    }

    #[test]
    fn test_full_shuffle_moves_odd_steps_by_3000_samples() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        rig.handle.set_shuffle(7);
        let ons = note_ons(&rig.play(48));
        let times: Vec<u64> = ons.iter().map(|n| n.0).take(4).collect();
        assert_eq!(times, vec![0, 9000, 12000, 21000]);
    }

    #[test]
    fn test_fixed_length_note_off() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_trigger(0, true);
        rig.fill_lane(LaneKind::Length, 5); // 1/32 = 0.125 qn
        let events = rig.play(20);
        assert_eq!(note_ons(&events), vec![(0, 60, 100)]);
        assert_eq!(note_offs(&events), vec![(3000, 60)]);
    }

    #[test]
    fn test_probability_zero_and_hundred() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        for step in 0..NUM_STEPS {
            rig.handle.set_master_probability_enabled(step, true);
        }
        rig.handle.set_master_probability(0);
        assert!(note_ons(&rig.play(200)).is_empty());

        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        for step in 0..NUM_STEPS {
            rig.handle.set_master_probability_enabled(step, true);
        }
        rig.handle.set_master_probability(100);
        // 200 blocks = 102400 samples: steps 0..=17
        assert_eq!(note_ons(&rig.play(200)).len(), 18);
    }

    #[test]
    fn test_legato_retrigger_keeps_on_off_alternating() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        rig.fill_lane(LaneKind::Length, 8);
        let events = rig.play(300);

        let mut sounding = false;
        let mut last_time = 0;
        let mut on_time = 0;
        for (time, message) in events.iter().filter(|(_, m)| m.channel() == 0) {
            assert!(*time >= last_time);
            last_time = *time;
            match message {
                MidiMessage::NoteOn { .. } => {
                    assert!(!sounding, "note-on while pitch still sounding at {}", time);
                    sounding = true;
                    on_time = *time;
                }
                MidiMessage::NoteOff { .. } => {
                    assert!(sounding);
                    assert!(*time >= on_time);
                    sounding = false;
                }
                _ => {}
            }
        }
        assert!(note_ons(&events).len() > 20);
    }

    #[test]
    fn test_hold_sustains_until_next_fire() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_length(4);
        rig.handle.set_master_trigger(0, true);
        rig.fill_lane(LaneKind::Length, 9);

        let events = rig.play(60);
        let notes: Vec<(u64, bool)> = events
            .iter()
            .filter_map(|(t, m)| match m {
                MidiMessage::NoteOn { .. } => Some((*t, true)),
                MidiMessage::NoteOff { .. } => Some((*t, false)),
                _ => None,
            })
            .collect();
        assert_eq!(notes, vec![(0, true), (24000, false), (24000, true)]);
    }

    #[test]
    fn test_stop_releases_sounding_notes() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_trigger(0, true);
        rig.fill_lane(LaneKind::Length, 6); // 0.1875 qn = 4500 samples
        let played = rig.play(4);
        assert_eq!(note_ons(&played).len(), 1);
        assert!(note_offs(&played).is_empty());

        let stopped = rig.block(false, &[]);
        assert_eq!(note_offs(&stopped), vec![(4 * BLOCK as u64, 60)]);
        assert!(rig.block(false, &[]).is_empty());
        assert_eq!(rig.engine.notes().active_count(), 0);
    }

    #[test]
    fn test_missing_transport_fields_skip_block() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        let host = HostTransport { bpm: None, ..rig.host(true) };
        assert!(rig.engine.process_block(&host, BLOCK, &[]).is_empty());
        assert!(!rig.engine.transport().is_playing);
    }

    #[test]
    fn test_non_finite_position_skips_block() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        for host in [
            HostTransport::playing(f64::NAN, 120.0, 0.0),
            HostTransport::playing(f64::INFINITY, 120.0, 0.0),
            HostTransport::playing(0.0, 120.0, f64::NEG_INFINITY),
        ] {
            assert!(rig.engine.process_block(&host, BLOCK, &[]).is_empty());
            assert!(!rig.engine.transport().is_playing);
        }
        // A sane block afterwards plays normally
        assert_eq!(note_ons(&rig.block(true, &[])), vec![(0, 60, 100)]);
    }

    #[test]
    fn test_infinite_bpm_falls_back_to_120() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        let host = HostTransport::playing(0.0, f64::INFINITY, 0.0);
        let events: Vec<(u64, MidiMessage)> = rig
            .engine
            .process_block(&host, BLOCK, &[])
            .iter()
            .map(|e| (e.sample_offset as u64, e.message))
            .collect();
        assert_eq!(note_ons(&events), vec![(0, 60, 100)]);
        assert_eq!(rig.engine.transport().tempo, 120.0);
    }

    #[test]
    fn test_zero_bpm_falls_back_to_120() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        rig.bpm = 0.0;
        let host = rig.host(true);
        rig.engine.process_block(&host, BLOCK, &[]);
        assert_eq!(rig.engine.transport().tempo, 120.0);
    }

    #[test]
    fn test_wait_for_bar_sync() {
        let mut rig = Rig::new(EngineConfig { seed: Some(1), ..Default::default() });
        rig.all_master_steps();
        rig.start_qn = 1.0;
        // 3 quarter notes to the bar line = 72000 samples
        let ons = note_ons(&rig.play(150));
        assert_eq!(ons[0].0, 72000);
    }

    #[test]
    fn test_global_step_index_jumps_master_row() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_trigger(5, true);
        assert!(note_ons(&rig.play(1)).is_empty());

        rig.handle.set_global_step_index(5);
        let ons = note_ons(&rig.play(12));
        assert_eq!(ons, vec![(STEP_SAMPLES, 60, 100)]);
    }

    #[test]
    fn test_value_reset_interval_restarts_each_bar() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        let vel = LaneKind::Velocity;
        for (step, v) in [10, 20, 30].into_iter().enumerate() {
            rig.handle.set_lane_value(vel, step, v);
        }
        rig.handle.set_value_loop_length(vel, 3);
        rig.handle.set_reset_intervals(vel, 1, 0);

        // 17 steps: the 17th is the first of bar 1
        let ons = note_ons(&rig.play(200));
        assert_eq!(ons[15].2, 10);
        assert_eq!(ons[16].2, 10);
        assert_eq!(ons[17].2, 20);
    }

    #[test]
    fn test_chord_selector_lane() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_trigger(0, true);
        let cc = LaneKind::Controller(0);
        rig.handle.set_cc_route(cc, CcRoute::ChordSelector);
        rig.fill_lane(cc, 1);
        let events = rig.play(2);
        let pitches: Vec<u8> = note_ons(&events).iter().map(|n| n.1).collect();
        assert_eq!(pitches, vec![60, 64, 67]);
        // A chord selector never reaches the wire as a controller
        assert!(events.iter().all(|(_, m)| !matches!(m, MidiMessage::ControlChange { .. })));
    }

    #[test]
    fn test_controller_lane_sends_on_change_only() {
        let mut rig = Rig::default_rig();
        let cc = LaneKind::Controller(1);
        rig.handle.set_cc_route(cc, CcRoute::Controller(74));
        rig.handle.set_lane_value(cc, 0, 10);
        rig.handle.set_lane_value(cc, 1, 10);
        rig.handle.set_lane_value(cc, 2, 90);
        rig.handle.set_value_loop_length(cc, 3);

        let events = rig.play(30);
        let sent: Vec<(u64, u8)> = events
            .iter()
            .filter_map(|(t, m)| match *m {
                MidiMessage::ControlChange { controller: 74, value, .. } => Some((*t, value)),
                _ => None,
            })
            .collect();
        assert_eq!(sent, vec![(0, 10), (2 * STEP_SAMPLES, 90)]);
    }

    #[test]
    fn test_transpose_channel() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_trigger(0, true);
        let transpose = MidiEvent::new(0, MidiMessage::NoteOn { channel: 13, pitch: 67, velocity: 100 });
        let events = rig.block(true, &[transpose]);
        assert_eq!(note_ons(&events), vec![(0, 67, 100)]);
        assert_eq!(rig.handle.monitor().transpose(), 7);
    }

    #[test]
    fn test_gate_mode_sustains_until_key_release() {
        let mut rig = Rig::new(EngineConfig { seed: Some(1), gate_mode: true, ..Default::default() });
        let key_down = MidiEvent::new(100, MidiMessage::NoteOn { channel: 15, pitch: 36, velocity: 90 });
        let events = rig.block(false, &[key_down]);
        assert_eq!(note_ons(&events), vec![(100, 60, 100)]);

        for _ in 0..10 {
            assert!(rig.block(false, &[]).is_empty());
        }

        let key_up = MidiEvent::new(50, MidiMessage::NoteOff { channel: 15, pitch: 36 });
        let events = rig.block(false, &[key_up]);
        assert_eq!(note_offs(&events), vec![(11 * BLOCK as u64 + 50, 60)]);
    }

    #[test]
    fn test_empty_slot_load_is_noop() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_length(3);
        let before = rig.handle.snapshot();
        assert!(!rig.handle.load_pattern(2, 2));

        // Same request through the pattern-select channel
        let select = MidiEvent::new(0, MidiMessage::NoteOn { channel: 14, pitch: 34, velocity: 100 });
        rig.block(false, &[select]);
        assert!(rig.handle.poll_feedback().is_empty());
        assert_eq!(rig.handle.snapshot(), before);
        assert_eq!(rig.engine.gate().config().length, 3);
    }

    #[test]
    fn test_pattern_save_and_load_roundtrip() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_length(5);
        rig.handle.set_lane_value(LaneKind::Note, 0, 4);
        assert!(rig.handle.save_pattern(1, 3));
        let saved = rig.handle.snapshot();

        rig.handle.set_master_length(9);
        rig.handle.set_lane_value(LaneKind::Note, 0, 11);
        assert!(rig.handle.load_pattern(1, 3));
        rig.block(false, &[]);

        assert_eq!(
            rig.handle.poll_feedback(),
            vec![EngineFeedback::PatternLoaded { bank: 1, slot: 3 }]
        );
        assert_eq!(rig.handle.snapshot(), saved);
        assert_eq!(rig.engine.gate().config().length, 5);
        assert_eq!(rig.engine.lane(LaneKind::Note).config().values[0], 4);
    }

    #[test]
    fn test_pattern_load_restarts_lane_cursors() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        for step in 0..NUM_STEPS {
            rig.handle.set_lane_value(LaneKind::Note, step, step as i32 % 12);
        }
        assert!(rig.handle.save_pattern(0, 7));

        // 30 blocks cover steps 0-2
        let pitches: Vec<u8> = note_ons(&rig.play(30)).iter().map(|n| n.1).collect();
        assert_eq!(pitches, vec![60, 61, 62]);

        // Step 3 plays value step 0 again instead of 3
        assert!(rig.handle.load_pattern(0, 7));
        let ons = note_ons(&rig.play(6));
        assert_eq!(ons, vec![(3 * STEP_SAMPLES, 60, 100)]);
        assert_eq!(rig.engine.lane(LaneKind::Note).active_value_step(), 0);
    }

    #[test]
    fn test_held_chord_released_together_on_next_fire() {
        let mut rig = Rig::default_rig();
        rig.handle.set_master_length(4);
        rig.handle.set_master_trigger(0, true);
        let cc = LaneKind::Controller(0);
        rig.handle.set_cc_route(cc, CcRoute::ChordSelector);
        rig.fill_lane(cc, 1);
        rig.fill_lane(LaneKind::Length, 9);

        // 60 blocks reach the second fire at step 4
        let events = rig.play(60);
        let mut ons = note_ons(&events);
        ons.sort();
        assert_eq!(
            ons,
            vec![(0, 60, 100), (0, 64, 100), (0, 67, 100), (24000, 60, 100), (24000, 64, 100), (24000, 67, 100)]
        );
        let mut offs = note_offs(&events);
        offs.sort();
        assert_eq!(offs, vec![(24000, 60), (24000, 64), (24000, 67)]);
        assert_eq!(rig.engine.notes().active_count(), 3);
    }

    #[test]
    fn test_global_shuffle_kept_on_load() {
        let mut rig = Rig::default_rig();
        rig.handle.set_global_shuffle(false);
        rig.handle.set_shuffle(2);
        rig.handle.save_pattern(0, 0);

        rig.handle.set_global_shuffle(true);
        rig.handle.set_shuffle(6);
        rig.handle.load_pattern(0, 0);
        rig.block(false, &[]);
        rig.handle.poll_feedback();
        assert_eq!(rig.handle.master().shuffle, 6);
        assert_eq!(rig.engine.gate().config().shuffle, 6);
    }

    #[test]
    fn test_transport_edges_reported_to_handle() {
        let mut rig = Rig::default_rig();
        rig.play(2);
        rig.block(false, &[]);
        assert_eq!(
            rig.handle.poll_feedback(),
            vec![EngineFeedback::TransportStarted, EngineFeedback::TransportStopped]
        );
        assert!(!rig.handle.transport().is_playing);
    }

    #[test]
    fn test_monitor_tracks_playback() {
        let mut rig = Rig::default_rig();
        rig.all_master_steps();
        rig.play(13); // through step 1
        assert_eq!(rig.handle.active_value_step(LaneKind::Note), 1);
        assert_eq!(rig.handle.master_step(), 1);
        assert!(rig.handle.transport().is_playing);
    }
}
