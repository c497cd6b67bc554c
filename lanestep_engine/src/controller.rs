use lanestep_shared::{CcRoute, MidiMessage};

use crate::midi_buffer::MidiBuffer;

/// A smoothed controller sends at most one update per this many samples.
pub const SMOOTHING_INTERVAL_SAMPLES: usize = 32;

/// Wire message for a controller-lane value on `route`, if the route emits MIDI.
pub fn controller_message(route: CcRoute, channel: u8, value: u8) -> Option<MidiMessage> {
    let value = value.min(127);
    match route {
        CcRoute::Controller(controller) => Some(MidiMessage::ControlChange { channel, controller, value }),
        CcRoute::ProgramChange => Some(MidiMessage::ProgramChange { channel, program: value }),
        CcRoute::ChannelPressure => Some(MidiMessage::ChannelPressure { channel, pressure: value }),
        CcRoute::Off | CcRoute::ChordSelector => None,
    }
}

/// Output state of one controller lane: last value on the wire plus an
/// optional linear ramp that can run across block boundaries.
#[derive(Debug, Clone, Default)]
pub struct ControllerRamp {
    last_sent: Option<u8>,
    current: f64,
    target: f64,
    increment: f64,
    remaining_samples: usize,
    /// Sample position inside the current block the ramp has been rendered to.
    cursor: usize,
}

impl ControllerRamp {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn last_sent(&self) -> Option<u8> {
        self.last_sent
    }

    pub fn is_ramping(&self) -> bool {
        self.remaining_samples > 0
    }

    /// New step value at `at`. With `ramp_samples == 0` (or nothing sent yet)
    /// the value is sent right away; otherwise the ramp heads towards it.
    pub fn retarget(
        &mut self,
        value: u8,
        ramp_samples: usize,
        at: usize,
        route: CcRoute,
        channel: u8,
        out: &mut MidiBuffer,
    ) {
        self.render_until(at, route, channel, out);

        let target = value as f64;
        if ramp_samples == 0 || self.last_sent.is_none() {
            self.current = target;
            self.target = target;
            self.remaining_samples = 0;
            self.send(value, at, route, channel, out);
            return;
        }

        self.target = target;
        self.remaining_samples = ramp_samples;
        self.increment = (self.target - self.current) / ramp_samples as f64;
    }

    /// Advances a running ramp up to sample `until` of the current block.
    pub fn render_until(&mut self, until: usize, route: CcRoute, channel: u8, out: &mut MidiBuffer) {
        while self.cursor < until && self.remaining_samples > 0 {
            let chunk = SMOOTHING_INTERVAL_SAMPLES
                .min(self.remaining_samples)
                .min(until - self.cursor);
            let at = self.cursor;
            self.remaining_samples -= chunk;
            self.cursor += chunk;
            if self.remaining_samples == 0 {
                self.current = self.target;
            } else {
                self.current += self.increment * chunk as f64;
            }
            let value = self.current.round().clamp(0.0, 127.0) as u8;
            self.send(value, at, route, channel, out);
        }
        self.cursor = self.cursor.max(until);
    }

    /// Renders the rest of the block and rewinds the in-block cursor.
    pub fn finish_block(&mut self, block_size: usize, route: CcRoute, channel: u8, out: &mut MidiBuffer) {
        self.render_until(block_size, route, channel, out);
        self.cursor = 0;
    }

    fn send(&mut self, value: u8, at: usize, route: CcRoute, channel: u8, out: &mut MidiBuffer) {
        if self.last_sent == Some(value) {
            return;
        }
        if let Some(message) = controller_message(route, channel, value) {
            out.push(at, message);
            self.last_sent = Some(value);
        }
    }
}
