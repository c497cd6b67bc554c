use lanestep_shared::{MidiEvent, MidiMessage};

/// Upper bound of events emitted in one block. Anything beyond is dropped.
pub const MAX_EVENTS_PER_BLOCK: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Pending {
    order: u32,
    event: MidiEvent,
}

/// Block-scoped MIDI output.
///
/// Events are collected in emission order and sorted by sample offset when
/// the block is finished; events sharing an offset keep the order they were
/// pushed in, so a retrigger's note-off stays ahead of its note-on. Both
/// vectors are allocated once and only cleared afterwards.
pub struct MidiBuffer {
    pending: Vec<Pending>,
    sorted: Vec<MidiEvent>,
    block_size: usize,
    dropped: u64,
}

impl Default for MidiBuffer {
    fn default() -> Self {
        Self::with_capacity(MAX_EVENTS_PER_BLOCK)
    }
}

impl MidiBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
            sorted: Vec::with_capacity(capacity),
            block_size: 1,
            dropped: 0,
        }
    }

    pub fn begin(&mut self, block_size: usize) {
        self.pending.clear();
        self.sorted.clear();
        self.block_size = block_size.max(1);
    }

    /// Queues a message. The offset is clamped into the current block.
    pub fn push(&mut self, sample_offset: usize, message: MidiMessage) {
        if self.pending.len() == self.pending.capacity() {
            self.dropped += 1;
            return;
        }
        let order = self.pending.len() as u32;
        let sample_offset = sample_offset.min(self.block_size - 1);
        self.pending.push(Pending { order, event: MidiEvent::new(sample_offset, message) });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total events lost to a full buffer since creation.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn finish(&mut self) -> &[MidiEvent] {
        self.pending
            .sort_unstable_by_key(|p| (p.event.sample_offset, p.order));
        self.sorted.clear();
        self.sorted.extend(self.pending.iter().map(|p| p.event));
        &self.sorted
    }
}
