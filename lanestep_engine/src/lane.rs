use lanestep_shared::{Direction, LaneConfig, LaneKind, NUM_STEPS};

use crate::controller::ControllerRamp;

/// Position of one lane cursor plus the travel bit used by PingPong and Bounce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub position: usize,
    pub moving_forward: bool,
}

impl Cursor {
    pub const fn at(position: usize) -> Self {
        Self { position, moving_forward: true }
    }

    /// The cursor after one advance. Pure apart from the RNG draw of the two
    /// random modes.
    pub fn advanced(self, direction: Direction, loop_length: usize, rng: &mut fastrand::Rng) -> Cursor {
        if loop_length <= 1 {
            return Cursor { position: 0, moving_forward: self.moving_forward };
        }

        let len = loop_length;
        let current = self.position % len;
        let mut forward = self.moving_forward;

        let position = match direction {
            Direction::Forward => (current + 1) % len,
            Direction::Backward => (current + len - 1) % len,
            Direction::PingPong => {
                if forward {
                    if current == len - 1 {
                        forward = false;
                        current
                    } else {
                        current + 1
                    }
                } else if current == 0 {
                    forward = true;
                    0
                } else {
                    current - 1
                }
            }
            Direction::Bounce => {
                if forward {
                    if current == len - 1 {
                        forward = false;
                        len - 2
                    } else {
                        current + 1
                    }
                } else if current == 0 {
                    forward = true;
                    1
                } else {
                    current - 1
                }
            }
            Direction::Random => rng.usize(0..len),
            Direction::RandomDirection => {
                if rng.bool() {
                    (current + 1) % len
                } else {
                    (current + len - 1) % len
                }
            }
        };

        Cursor { position, moving_forward: forward }
    }

    pub fn advance(&mut self, direction: Direction, loop_length: usize, rng: &mut fastrand::Rng) -> usize {
        *self = self.advanced(direction, loop_length, rng);
        self.position
    }
}

/// Runtime side of a lane: configuration plus the value and trigger cursors.
#[derive(Debug, Clone)]
pub struct Lane {
    kind: LaneKind,
    config: LaneConfig,
    value_cursor: Cursor,
    trigger_cursor: Cursor,
    active_value_step: usize,
    active_trigger_step: usize,
    /// Set by direct step selection: the next fire plays the selected step
    /// instead of advancing.
    force_next_step: bool,
    pub ramp: ControllerRamp,
}

impl Lane {
    pub fn new(kind: LaneKind, config: LaneConfig) -> Self {
        let mut lane = Self {
            kind,
            config,
            value_cursor: Cursor::at(0),
            trigger_cursor: Cursor::at(0),
            active_value_step: 0,
            active_trigger_step: 0,
            force_next_step: false,
            ramp: ControllerRamp::default(),
        };
        lane.config.sanitize(kind);
        lane.reset();
        lane
    }

    pub fn kind(&self) -> LaneKind {
        self.kind
    }

    pub fn config(&self) -> &LaneConfig {
        &self.config
    }

    fn value_len(&self) -> usize {
        self.config.value_loop_length.clamp(1, NUM_STEPS)
    }

    fn trigger_len(&self) -> usize {
        self.config.trigger_loop_length.clamp(1, NUM_STEPS)
    }

    /// Canonical start. The value cursor parks on the last loop step so the
    /// first advance lands on step 0.
    pub fn reset(&mut self) {
        self.reset_value_cursor();
        self.reset_trigger_cursor();
        self.active_value_step = 0;
    }

    pub fn reset_value_cursor(&mut self) {
        self.value_cursor = Cursor::at(self.value_len() - 1);
        self.force_next_step = false;
    }

    pub fn reset_trigger_cursor(&mut self) {
        self.trigger_cursor = Cursor::at(0);
        self.active_trigger_step = 0;
    }

    /// Replaces the configuration, keeping cursors but folding them into the
    /// new loop lengths.
    pub fn apply_config(&mut self, mut config: LaneConfig) {
        config.sanitize(self.kind);
        if config.cc_route != self.config.cc_route {
            self.ramp.reset();
        }
        self.config = config;
        self.value_cursor.position %= self.value_len();
        self.trigger_cursor.position %= self.trigger_len();
    }

    /// Configuration from a pattern: new settings and a fresh start.
    pub fn load(&mut self, config: LaneConfig) {
        self.apply_config(config);
        self.reset();
    }

    /// Processes one sequencer step. The trigger cursor always moves; the value
    /// cursor only moves when the lane fires. Returns whether it fired.
    pub fn step(&mut self, master_fired: bool, rng: &mut fastrand::Rng) -> bool {
        let trigger_len = self.trigger_len();
        let trigger_step = self.trigger_cursor.position % trigger_len;
        self.trigger_cursor.position = trigger_step;
        self.active_trigger_step = trigger_step;

        let local_hit = self.config.enable_local_source && self.config.triggers[trigger_step];
        let master_hit = self.config.enable_master_source && master_fired;
        let fired = master_hit || local_hit;

        if fired {
            let value_len = self.value_len();
            if self.force_next_step {
                self.force_next_step = false;
                self.value_cursor.position %= value_len;
            } else {
                self.value_cursor.advance(self.config.value_direction, value_len, rng);
            }
            self.active_value_step = self.value_cursor.position;
        }

        self.trigger_cursor.advance(self.config.trigger_direction, trigger_len, rng);
        fired
    }

    /// Bar-interval auto reset, called once per bar change.
    pub fn on_bar(&mut self, bar_index: i64) {
        let value_interval = self.config.value_reset_interval as i64;
        if value_interval > 0 && bar_index.rem_euclid(value_interval) == 0 {
            self.reset_value_cursor();
        }
        let trigger_interval = self.config.trigger_reset_interval as i64;
        if trigger_interval > 0 && bar_index.rem_euclid(trigger_interval) == 0 {
            self.reset_trigger_cursor();
        }
    }

    /// Direct value step selection: the next fire plays `step`.
    pub fn set_value_index(&mut self, step: usize) {
        let step = step % self.value_len();
        self.value_cursor.position = step;
        self.active_value_step = step;
        self.force_next_step = true;
    }

    /// Direct trigger step selection: `step` is evaluated next.
    pub fn set_trigger_index(&mut self, step: usize) {
        self.trigger_cursor.position = step % self.trigger_len();
    }

    /// Lines both cursors up with the grid position inside the current bar.
    pub fn sync_to_bar(&mut self, steps_into_bar: usize) {
        let value_len = self.value_len();
        let trigger_len = self.trigger_len();
        self.value_cursor = Cursor::at((steps_into_bar % value_len + value_len - 1) % value_len);
        self.force_next_step = false;
        self.trigger_cursor = Cursor::at(steps_into_bar % trigger_len);
    }

    pub fn current_value(&self) -> i32 {
        self.config.values[self.active_value_step.min(NUM_STEPS - 1)]
    }

    pub fn active_value_step(&self) -> usize {
        self.active_value_step
    }

    pub fn active_trigger_step(&self) -> usize {
        self.active_trigger_step
    }

    pub fn value_cursor(&self) -> Cursor {
        self.value_cursor
    }

    pub fn trigger_cursor(&self) -> Cursor {
        self.trigger_cursor
    }
}
