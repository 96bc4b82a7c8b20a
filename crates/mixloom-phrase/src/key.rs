//! Key parsing and harmonic relationships.

use std::fmt;

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Musical key with root note and scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicalKey {
    /// Semitones above C (0=C, 1=C#, ..., 11=B)
    pub root: u8,
    pub minor: bool,
}

impl MusicalKey {
    pub const fn new(root: u8, minor: bool) -> Self {
        Self {
            root: root % 12,
            minor,
        }
    }

    /// Parse "Am", "C#m", "F", "Bb", "Ebmin", "D minor".
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let mut chars = s.chars().peekable();

        let base = match chars.next()?.to_ascii_uppercase() {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };

        let root = match chars.peek() {
            Some('#') => {
                chars.next();
                (base + 1) % 12
            }
            Some('b') => {
                chars.next();
                (base + 11) % 12
            }
            _ => base,
        };

        let rest: String = chars.collect::<String>().trim().to_lowercase();
        let minor = rest.starts_with('m') && !rest.starts_with("maj");

        Some(Self { root, minor })
    }

    /// Relative major/minor (shares the same notes).
    pub fn relative(&self) -> Self {
        if self.minor {
            Self::new(self.root + 3, false)
        } else {
            Self::new(self.root + 9, true)
        }
    }

    /// Parallel major/minor (same root, other mode).
    pub fn parallel(&self) -> Self {
        Self::new(self.root, !self.minor)
    }

    /// One step either way on the circle of fifths, same mode.
    pub fn is_fifth_neighbor(&self, other: &MusicalKey) -> bool {
        if self.minor != other.minor {
            return false;
        }
        let interval = (other.root + 12 - self.root) % 12;
        interval == 7 || interval == 5
    }
}

impl fmt::Display for MusicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let note = NOTE_NAMES[self.root as usize];
        if self.minor {
            write!(f, "{note}m")
        } else {
            write!(f, "{note}")
        }
    }
}
