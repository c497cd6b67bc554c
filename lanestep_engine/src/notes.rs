use lanestep_shared::{MidiMessage, MAX_ACTIVE_NOTES};

use crate::midi_buffer::MidiBuffer;
use crate::sequencer::BlockTiming;

/// Legato and hold notes overlap the next step by this much.
pub const LEGATO_OVERLAP_QN: f64 = 0.01;
/// Fraction of the actual step a "fill" note lasts.
pub const FILL_RATIO: f64 = 0.96;

/// Length-lane codes 1-6, in quarter notes (128n, 128n., 64n, 64n., 32n, 32n.).
pub const FIXED_LENGTHS_QN: [f64; 6] = [0.03125, 0.046875, 0.0625, 0.09375, 0.125, 0.1875];

/// Decoded length-lane value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteLength {
    /// Code 0: the step plays no note.
    Off,
    Fixed(f64),
    /// Nearly the whole (swung) step.
    Fill,
    Legato,
    /// Legato that keeps extending through steps where nothing fires.
    Hold,
}

impl NoteLength {
    pub fn from_code(code: i32) -> Self {
        match code {
            1..=6 => NoteLength::Fixed(FIXED_LENGTHS_QN[(code - 1) as usize]),
            7 => NoteLength::Fill,
            8 => NoteLength::Legato,
            9 => NoteLength::Hold,
            _ => NoteLength::Off,
        }
    }

    /// Note duration for a step lasting `step_qn`, or `None` for `Off`.
    pub fn duration_qn(self, step_qn: f64) -> Option<f64> {
        match self {
            NoteLength::Off => None,
            NoteLength::Fixed(qn) => Some(qn),
            NoteLength::Fill => Some(step_qn * FILL_RATIO),
            NoteLength::Legato | NoteLength::Hold => Some(step_qn + LEGATO_OVERLAP_QN),
        }
    }

    pub fn is_hold(self) -> bool {
        matches!(self, NoteLength::Hold)
    }
}

/// A sounding note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveNote {
    pub pitch: u8,
    pub channel: u8,
    pub note_on_qn: f64,
    /// Infinite for externally sustained notes.
    pub note_off_qn: f64,
    pub group_id: u32,
    pub sustain_key: Option<u8>,
}

impl ActiveNote {
    pub fn is_externally_sustained(&self) -> bool {
        self.sustain_key.is_some()
    }
}

/// Fixed-capacity slot pool with a free-index stack. Nothing allocates after
/// construction.
#[derive(Debug, Clone)]
pub struct NotePool {
    slots: Vec<Option<ActiveNote>>,
    free: Vec<usize>,
}

impl NotePool {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            // Reversed so slot 0 is handed out first
            free: (0..capacity).rev().collect(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// `None` when every slot is in use.
    pub fn allocate(&mut self, note: ActiveNote) -> Option<usize> {
        let idx = self.free.pop()?;
        self.slots[idx] = Some(note);
        Some(idx)
    }

    pub fn release(&mut self, idx: usize) -> Option<ActiveNote> {
        let note = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        Some(note)
    }

    pub fn get(&self, idx: usize) -> Option<&ActiveNote> {
        self.slots.get(idx)?.as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActiveNote> {
        self.slots.iter().flatten()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ActiveNote> {
        self.slots.iter_mut().flatten()
    }
}

/// What to start on one fired step.
#[derive(Debug, Clone, Copy)]
pub struct NoteRequest<'a> {
    pub pitches: &'a [u8],
    pub channel: u8,
    pub velocity: u8,
    pub start_qn: f64,
    pub sample_offset: usize,
    pub duration_qn: f64,
    pub hold: bool,
    /// Key of the gate input holding these notes; the duration is ignored.
    pub sustain_key: Option<u8>,
}

/// Owns every sounding note and decides when its note-off goes out.
#[derive(Debug, Clone)]
pub struct NoteManager {
    pool: NotePool,
    next_group_id: u32,
    held_group: Option<u32>,
    dropped: u64,
}

impl Default for NoteManager {
    fn default() -> Self {
        Self::with_capacity(MAX_ACTIVE_NOTES)
    }
}

impl NoteManager {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pool: NotePool::with_capacity(capacity),
            next_group_id: 0,
            held_group: None,
            dropped: 0,
        }
    }

    pub fn pool(&self) -> &NotePool {
        &self.pool
    }

    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Notes that could not start because the pool was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn held_group(&self) -> Option<u32> {
        self.held_group
    }

    /// Starts every pitch of `req` as one group. A pitch already sounding on
    /// the same channel is cut first, never later than the new note-on.
    pub fn trigger(&mut self, req: &NoteRequest, timing: &BlockTiming, out: &mut MidiBuffer) -> u32 {
        let group_id = self.next_group_id;
        self.next_group_id = self.next_group_id.wrapping_add(1);

        let note_off_qn = if req.sustain_key.is_some() {
            f64::INFINITY
        } else {
            req.start_qn + req.duration_qn
        };

        for &pitch in req.pitches {
            self.cut(pitch, req.channel, req.sample_offset, timing, out);

            let note = ActiveNote {
                pitch,
                channel: req.channel,
                note_on_qn: req.start_qn,
                note_off_qn,
                group_id,
                sustain_key: req.sustain_key,
            };
            if self.pool.allocate(note).is_some() {
                out.push(
                    req.sample_offset,
                    MidiMessage::NoteOn { channel: req.channel, pitch, velocity: req.velocity },
                );
            } else {
                self.dropped += 1;
            }
        }

        self.held_group = if req.hold && req.sustain_key.is_none() {
            Some(group_id)
        } else {
            None
        };
        group_id
    }

    fn cut(&mut self, pitch: u8, channel: u8, on_offset: usize, timing: &BlockTiming, out: &mut MidiBuffer) {
        for idx in 0..self.pool.capacity() {
            let Some(note) = self.pool.get(idx) else { continue };
            if note.pitch != pitch || note.channel != channel {
                continue;
            }
            let off_offset = if note.is_externally_sustained() {
                on_offset
            } else {
                timing.sample_offset(note.note_off_qn).min(on_offset)
            };
            self.pool.release(idx);
            out.push(off_offset, MidiMessage::NoteOff { channel, pitch });
        }
    }

    /// A step that did not fire. While the hold chain is intact the held
    /// group stretches over this step too.
    pub fn extend_hold(&mut self, step_time_qn: f64, step_duration_qn: f64) {
        let Some(group) = self.held_group else { return };
        let new_off = step_time_qn + step_duration_qn + LEGATO_OVERLAP_QN;

        let mut alive = false;
        for note in self.pool.iter_mut().filter(|n| n.group_id == group) {
            note.note_off_qn = note.note_off_qn.max(new_off);
            alive = true;
        }
        if !alive {
            self.held_group = None;
        }
    }

    pub fn end_hold(&mut self) {
        self.held_group = None;
    }

    /// Emits note-offs for every timed note ending before the block does.
    pub fn flush(&mut self, timing: &BlockTiming, out: &mut MidiBuffer) {
        for idx in 0..self.pool.capacity() {
            let Some(note) = self.pool.get(idx).copied() else { continue };
            if note.is_externally_sustained() || note.note_off_qn >= timing.end_qn {
                continue;
            }
            self.pool.release(idx);
            out.push(
                timing.sample_offset(note.note_off_qn),
                MidiMessage::NoteOff { channel: note.channel, pitch: note.pitch },
            );
        }
    }

    /// Gate key released: ends the notes it was holding.
    pub fn release_key(&mut self, key: u8, sample_offset: usize, out: &mut MidiBuffer) {
        self.release_where(sample_offset, out, |n| n.sustain_key == Some(key));
    }

    /// Transport stop: every timed note ends now, gate-held notes keep sounding.
    pub fn release_timed(&mut self, sample_offset: usize, out: &mut MidiBuffer) {
        self.held_group = None;
        self.release_where(sample_offset, out, |n| !n.is_externally_sustained());
    }

    pub fn release_all(&mut self, sample_offset: usize, out: &mut MidiBuffer) {
        self.held_group = None;
        self.release_where(sample_offset, out, |_| true);
    }

    fn release_where(&mut self, sample_offset: usize, out: &mut MidiBuffer, pred: impl Fn(&ActiveNote) -> bool) {
        for idx in 0..self.pool.capacity() {
            let Some(note) = self.pool.get(idx).copied() else { continue };
            if !pred(&note) {
                continue;
            }
            self.pool.release(idx);
            out.push(sample_offset, MidiMessage::NoteOff { channel: note.channel, pitch: note.pitch });
        }
    }
}
