use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use lanestep_shared::{PatternSnapshot, StoredPattern, NUM_BANKS, SLOTS_PER_BANK};

const NO_PENDING: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternSlot {
    pub is_empty: bool,
    pub snapshot: PatternSnapshot,
}

impl Default for PatternSlot {
    fn default() -> Self {
        Self { is_empty: true, snapshot: PatternSnapshot::default() }
    }
}

/// Result of the audio thread's attempt to pick up a load request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PendingLoad {
    Nothing,
    /// The store is locked by a save; try again next block.
    Busy,
    /// The requested slot holds nothing. The request is consumed.
    Empty { bank: usize, slot: usize },
    Loaded { bank: usize, slot: usize, snapshot: PatternSnapshot },
}

fn slot_index(bank: usize, slot: usize) -> Option<usize> {
    (bank < NUM_BANKS && slot < SLOTS_PER_BANK).then_some(bank * SLOTS_PER_BANK + slot)
}

/// Bank/slot grid of saved patterns, shared between the control side and the
/// audio thread.
///
/// Saves take the lock; the audio thread only ever `try_lock`s it. A pending
/// load is a single packed atomic, so a newer request simply replaces an
/// older one that has not been applied yet.
pub struct PatternStore {
    slots: Mutex<Vec<PatternSlot>>,
    pending: AtomicI32,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternStore {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(vec![PatternSlot::default(); NUM_BANKS * SLOTS_PER_BANK]),
            pending: AtomicI32::new(NO_PENDING),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PatternSlot>> {
        // Slots are plain data; a panicked writer cannot leave one half-valid
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores `snapshot` in the slot. Returns false for an out-of-range slot.
    pub fn save(&self, bank: usize, slot: usize, snapshot: &PatternSnapshot) -> bool {
        let Some(idx) = slot_index(bank, slot) else {
            log::warn!("[Patterns] Ignoring save to invalid slot {}:{}", bank, slot);
            return false;
        };
        let mut snapshot = *snapshot;
        snapshot.sanitize();
        self.lock()[idx] = PatternSlot { is_empty: false, snapshot };
        log::debug!("[Patterns] Saved pattern {}:{}", bank, slot);
        true
    }

    /// Marks the slot empty and drops its probability flags.
    pub fn clear(&self, bank: usize, slot: usize) -> bool {
        let Some(idx) = slot_index(bank, slot) else { return false };
        let mut slots = self.lock();
        let entry = &mut slots[idx];
        entry.is_empty = true;
        entry.snapshot.master.clear_probability_flags();
        true
    }

    pub fn slot(&self, bank: usize, slot: usize) -> Option<PatternSlot> {
        let idx = slot_index(bank, slot)?;
        Some(self.lock()[idx])
    }

    pub fn is_empty(&self, bank: usize, slot: usize) -> bool {
        self.slot(bank, slot).map_or(true, |s| s.is_empty)
    }

    /// Which slots hold a pattern, for bank views.
    pub fn occupancy(&self) -> [[bool; SLOTS_PER_BANK]; NUM_BANKS] {
        let slots = self.lock();
        let mut out = [[false; SLOTS_PER_BANK]; NUM_BANKS];
        for (idx, entry) in slots.iter().enumerate() {
            out[idx / SLOTS_PER_BANK][idx % SLOTS_PER_BANK] = !entry.is_empty;
        }
        out
    }

    /// Posts a load for the audio thread. Returns false for an out-of-range slot.
    pub fn request_load(&self, bank: usize, slot: usize) -> bool {
        match slot_index(bank, slot) {
            Some(idx) => {
                self.pending.store(idx as i32, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn pending_load(&self) -> Option<(usize, usize)> {
        let code = self.pending.load(Ordering::Acquire);
        (code >= 0).then(|| (code as usize / SLOTS_PER_BANK, code as usize % SLOTS_PER_BANK))
    }

    /// Audio-thread side of a load. Never blocks.
    pub fn take_pending(&self) -> PendingLoad {
        let code = self.pending.load(Ordering::Acquire);
        if code < 0 {
            return PendingLoad::Nothing;
        }

        let slots = match self.slots.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return PendingLoad::Busy,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let idx = code as usize;
        let Some(entry) = slots.get(idx).copied() else {
            drop(slots);
            self.pending.store(NO_PENDING, Ordering::Release);
            return PendingLoad::Nothing;
        };
        drop(slots);

        // A newer request posted meanwhile stays pending for the next block
        let _ = self
            .pending
            .compare_exchange(code, NO_PENDING, Ordering::AcqRel, Ordering::Acquire);

        let (bank, slot) = (idx / SLOTS_PER_BANK, idx % SLOTS_PER_BANK);
        if entry.is_empty {
            PendingLoad::Empty { bank, slot }
        } else {
            PendingLoad::Loaded { bank, slot, snapshot: entry.snapshot }
        }
    }

    /// Non-empty slots in persisted form.
    pub fn export(&self) -> Vec<StoredPattern> {
        self.lock()
            .iter()
            .enumerate()
            .filter(|(_, entry)| !entry.is_empty)
            .map(|(idx, entry)| StoredPattern {
                bank: idx / SLOTS_PER_BANK,
                slot: idx % SLOTS_PER_BANK,
                pattern: entry.snapshot,
            })
            .collect()
    }

    /// Replaces the whole grid; slots not listed become empty.
    pub fn import(&self, patterns: &[StoredPattern]) {
        let mut slots = self.lock();
        slots.iter_mut().for_each(|entry| *entry = PatternSlot::default());
        for stored in patterns {
            if let Some(idx) = slot_index(stored.bank, stored.slot) {
                let mut snapshot = stored.pattern;
                snapshot.sanitize();
                slots[idx] = PatternSlot { is_empty: false, snapshot };
            }
        }
    }

    #[cfg(test)]
    fn hold_lock(&self) -> MutexGuard<'_, Vec<PatternSlot>> {
        self.lock()
    }
}
