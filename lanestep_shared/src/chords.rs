use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ChordType {
    #[default]
    None,

    // Triads
    Major,
    Minor,
    Diminished,
    Augmented,
    Sus2,
    Sus4,
    Power,

    // Sixths / Sevenths
    Major6,
    Minor6,
    Dominant7,
    Major7,
    Minor7,
    MinorMajor7,
    HalfDiminished7,
    Diminished7,
    Augmented7,

    // Extended
    Dominant9,
    Major9,
    Minor9,
    Add9,
    MinorAdd9,
    Dominant11,
    Minor11,

    Octave,
}

impl ChordType {
    /// Index 0 is `None`, 1..=24 are the selectable chords.
    const ALL: [ChordType; 25] = [
        ChordType::None,
        ChordType::Major, ChordType::Minor, ChordType::Diminished, ChordType::Augmented,
        ChordType::Sus2, ChordType::Sus4, ChordType::Power,
        ChordType::Major6, ChordType::Minor6, ChordType::Dominant7, ChordType::Major7,
        ChordType::Minor7, ChordType::MinorMajor7, ChordType::HalfDiminished7,
        ChordType::Diminished7, ChordType::Augmented7,
        ChordType::Dominant9, ChordType::Major9, ChordType::Minor9, ChordType::Add9,
        ChordType::MinorAdd9, ChordType::Dominant11, ChordType::Minor11,
        ChordType::Octave,
    ];

    /// Number of selectable chords (excluding `None`).
    pub const COUNT: usize = 24;

    /// O(1) lookup by index, no allocation.
    pub fn from_index(idx: usize) -> Option<ChordType> {
        Self::ALL.get(idx).copied()
    }

    /// Maps a chord-selector lane value onto a chord. Values past the table clamp
    /// to the last entry, anything <= 0 means no chord.
    pub fn from_selector_value(value: i32) -> ChordType {
        if value <= 0 {
            return ChordType::None;
        }
        let idx = (value as usize).min(Self::COUNT);
        Self::ALL[idx]
    }

    pub fn get_intervals(&self) -> &'static [u8] {
        match self {
            ChordType::None => &[0],
            ChordType::Major => &[0, 4, 7],
            ChordType::Minor => &[0, 3, 7],
            ChordType::Diminished => &[0, 3, 6],
            ChordType::Augmented => &[0, 4, 8],
            ChordType::Sus2 => &[0, 2, 7],
            ChordType::Sus4 => &[0, 5, 7],
            ChordType::Power => &[0, 7],
            ChordType::Major6 => &[0, 4, 7, 9],
            ChordType::Minor6 => &[0, 3, 7, 9],
            ChordType::Dominant7 => &[0, 4, 7, 10],
            ChordType::Major7 => &[0, 4, 7, 11],
            ChordType::Minor7 => &[0, 3, 7, 10],
            ChordType::MinorMajor7 => &[0, 3, 7, 11],
            ChordType::HalfDiminished7 => &[0, 3, 6, 10],
            ChordType::Diminished7 => &[0, 3, 6, 9],
            ChordType::Augmented7 => &[0, 4, 8, 10],
            ChordType::Dominant9 => &[0, 4, 7, 10, 14],
            ChordType::Major9 => &[0, 4, 7, 11, 14],
            ChordType::Minor9 => &[0, 3, 7, 10, 14],
            ChordType::Add9 => &[0, 4, 7, 14],
            ChordType::MinorAdd9 => &[0, 3, 7, 14],
            ChordType::Dominant11 => &[0, 4, 7, 10, 14, 17],
            ChordType::Minor11 => &[0, 3, 7, 10, 14, 17],
            ChordType::Octave => &[0, 12],
        }
    }

    pub fn iter() -> impl Iterator<Item = ChordType> {
        Self::ALL.into_iter()
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChordType::None => "None",
            ChordType::Major => "Maj",
            ChordType::Minor => "Min",
            ChordType::Diminished => "Dim",
            ChordType::Augmented => "Aug",
            ChordType::Sus2 => "Sus2",
            ChordType::Sus4 => "Sus4",
            ChordType::Power => "5",
            ChordType::Major6 => "6",
            ChordType::Minor6 => "m6",
            ChordType::Dominant7 => "7",
            ChordType::Major7 => "Maj7",
            ChordType::Minor7 => "m7",
            ChordType::MinorMajor7 => "mMaj7",
            ChordType::HalfDiminished7 => "m7b5",
            ChordType::Diminished7 => "Dim7",
            ChordType::Augmented7 => "Aug7",
            ChordType::Dominant9 => "9",
            ChordType::Major9 => "Maj9",
            ChordType::Minor9 => "m9",
            ChordType::Add9 => "add9",
            ChordType::MinorAdd9 => "madd9",
            ChordType::Dominant11 => "11",
            ChordType::Minor11 => "m11",
            ChordType::Octave => "Oct",
        }
    }

    /// Writes the chord's pitches above `root` into `out`, clamped to the MIDI
    /// range and de-duplicated. Returns how many were written.
    pub fn expand_into(&self, root: i32, out: &mut [u8]) -> usize {
        let mut count = 0;
        for &iv in self.get_intervals() {
            if count == out.len() {
                break;
            }
            let pitch = (root + iv as i32).clamp(0, 127) as u8;
            if !out[..count].contains(&pitch) {
                out[count] = pitch;
                count += 1;
            }
        }
        count
    }
}

/// Largest chord in the table, used to size stack buffers.
pub const MAX_CHORD_NOTES: usize = 6;
