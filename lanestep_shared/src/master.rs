use serde::{Deserialize, Serialize};

use crate::numeric;
use crate::{MAX_SHUFFLE, MIN_SHUFFLE, NUM_STEPS};

/// Master gate settings plus the global groove parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MasterConfig {
    #[serde(deserialize_with = "numeric::saturating_usize")]
    pub length: usize,
    /// Swing amount, 1 (straight) to 7 (full 32nd-note delay on odd steps).
    #[serde(deserialize_with = "numeric::saturating_u8")]
    pub shuffle: u8,
    /// When set, loading a pattern keeps the live shuffle instead of the stored one.
    pub global_shuffle: bool,
    pub triggers: [bool; NUM_STEPS],
    pub prob_enabled: [bool; NUM_STEPS],
    /// Chance (percent) that a probability-flagged step fires.
    #[serde(deserialize_with = "numeric::saturating_u8")]
    pub probability: u8,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            length: NUM_STEPS,
            shuffle: MIN_SHUFFLE,
            global_shuffle: true,
            triggers: [false; NUM_STEPS],
            prob_enabled: [false; NUM_STEPS],
            probability: 100,
        }
    }
}

impl MasterConfig {
    /// Turning a step off also drops its probability flag.
    pub fn set_trigger(&mut self, step: usize, on: bool) {
        if step >= NUM_STEPS {
            return;
        }
        self.triggers[step] = on;
        if !on {
            self.prob_enabled[step] = false;
        }
    }

    /// Flagging a step for probability also switches the step on.
    pub fn set_probability_enabled(&mut self, step: usize, on: bool) {
        if step >= NUM_STEPS {
            return;
        }
        self.prob_enabled[step] = on;
        if on {
            self.triggers[step] = true;
        }
    }

    pub fn set_length(&mut self, len: usize) {
        self.length = len.clamp(1, NUM_STEPS);
    }

    pub fn set_shuffle(&mut self, amount: u8) {
        self.shuffle = amount.clamp(MIN_SHUFFLE, MAX_SHUFFLE);
    }

    pub fn set_probability(&mut self, percent: u8) {
        self.probability = percent.min(100);
    }

    pub fn clear_probability_flags(&mut self) {
        self.prob_enabled = [false; NUM_STEPS];
    }

    /// Master settings after loading `pattern` over the live ones. With global
    /// shuffle on, the live groove survives the load.
    pub fn loaded_from(&self, pattern: &MasterConfig) -> MasterConfig {
        let mut loaded = *pattern;
        if self.global_shuffle {
            loaded.shuffle = self.shuffle;
            loaded.global_shuffle = true;
        }
        loaded
    }

    pub fn sanitize(&mut self) {
        self.length = self.length.clamp(1, NUM_STEPS);
        self.shuffle = self.shuffle.clamp(MIN_SHUFFLE, MAX_SHUFFLE);
        self.probability = self.probability.min(100);
        for (flag, on) in self.prob_enabled.iter_mut().zip(self.triggers.iter()) {
            *flag = *flag && *on;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probability_implies_trigger() {
        let mut m = MasterConfig::default();
        m.set_probability_enabled(3, true);
        assert!(m.triggers[3]);
        assert!(m.prob_enabled[3]);

        m.set_trigger(3, false);
        assert!(!m.triggers[3]);
        assert!(!m.prob_enabled[3]);
    }

    #[test]
    fn test_out_of_range_steps_ignored() {
        let mut m = MasterConfig::default();
        m.set_trigger(16, true);
        m.set_probability_enabled(99, true);
        assert_eq!(m, MasterConfig::default());
    }

    #[test]
    fn test_global_shuffle_survives_pattern_load() {
        let mut live = MasterConfig::default();
        live.set_shuffle(6);
        let mut stored = MasterConfig::default();
        stored.set_shuffle(2);
        stored.global_shuffle = false;
        stored.set_length(8);

        let loaded = live.loaded_from(&stored);
        assert_eq!(loaded.shuffle, 6);
        assert_eq!(loaded.length, 8);
        assert!(loaded.global_shuffle);

        live.global_shuffle = false;
        assert_eq!(live.loaded_from(&stored).shuffle, 2);
    }

    #[test]
    fn test_sanitize_restores_invariant() {
        let mut m = MasterConfig::default();
        m.prob_enabled[5] = true;
        m.length = 0;
        m.shuffle = 12;
        m.probability = 180;
        m.sanitize();
        assert!(!m.prob_enabled[5]);
        assert_eq!(m.length, 1);
        assert_eq!(m.shuffle, 7);
        assert_eq!(m.probability, 100);
    }
}
