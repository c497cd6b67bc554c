use lanestep_shared::{MasterConfig, NUM_STEPS};

/// Master gate: a trigger row with optional per-step probability whose
/// position follows the absolute grid step rather than a cursor of its own.
#[derive(Debug, Clone, Default)]
pub struct MasterGate {
    config: MasterConfig,
    current_step: usize,
}

impl MasterGate {
    pub fn new(mut config: MasterConfig) -> Self {
        config.sanitize();
        Self { config, current_step: 0 }
    }

    pub fn config(&self) -> &MasterConfig {
        &self.config
    }

    pub fn set_config(&mut self, mut config: MasterConfig) {
        config.sanitize();
        self.config = config;
    }

    pub fn shuffle(&self) -> u8 {
        self.config.shuffle
    }

    /// Gate row index for an offset-adjusted absolute step.
    pub fn step_index(&self, step: i64) -> usize {
        let len = self.config.length.clamp(1, NUM_STEPS) as i64;
        step.rem_euclid(len) as usize
    }

    /// Evaluates the gate for `step` (absolute step plus global offset).
    pub fn evaluate(&mut self, step: i64, rng: &mut fastrand::Rng) -> bool {
        let idx = self.step_index(step);
        self.current_step = idx;

        if !self.config.triggers[idx] {
            return false;
        }
        if !self.config.prob_enabled[idx] {
            return true;
        }
        rng.f64() * 100.0 < self.config.probability as f64
    }

    /// Row index of the most recently evaluated step.
    pub fn current_step(&self) -> usize {
        self.current_step
    }
}
