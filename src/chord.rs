// harmonia -- chord progression playback and tuning
// Copyright (C) 2021  Fabian Thorand
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Chord symbols (C, Am, G7, Dm7, ...) and the notes they stand for.

use std::fmt;

use crate::note::{Note, PitchClass};

/// Octave in which the root of every chord is voiced.
pub const ROOT_OCTAVE: i32 = 4;

/// Spellings accepted as chord roots. Others such as `Cb` or `E#` name a
/// valid pitch class but are not recognized as roots.
pub const ROOT_NAMES: [&str; 17] = [
    "C", "C#", "Db", "D", "D#", "Eb", "E", "F", "F#", "Gb", "G", "G#", "Ab", "A", "A#", "Bb", "B",
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Quality {
    Major,
    Minor,
    Diminished,
}

/// The kind of seventh stacked on top of the triad.
/// Dominant and minor sevenths are both ten semitones above the root,
/// they only differ in how the chord was written.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Seventh {
    Dominant,
    Major,
    Minor,
}

impl Quality {
    /// Interpret the part of a chord symbol following the root.
    /// Anything not recognized is treated as a major chord.
    fn from_suffix(suffix: &str) -> Quality {
        if suffix.starts_with("dim") || suffix.starts_with('°') {
            Quality::Diminished
        } else if suffix.starts_with('m') && !suffix.starts_with("maj") {
            // covers "m", "min" and "minor"
            Quality::Minor
        } else {
            Quality::Major
        }
    }

    fn third(self) -> i32 {
        match self {
            Quality::Major => 4,
            Quality::Minor | Quality::Diminished => 3,
        }
    }

    fn fifth(self) -> i32 {
        match self {
            Quality::Diminished => 6,
            Quality::Major | Quality::Minor => 7,
        }
    }
}

impl Seventh {
    /// Substring checks on the whole symbol, in the order `maj7`, `m7`, `7`.
    fn from_symbol(symbol: &str) -> Option<Seventh> {
        if !symbol.contains('7') {
            None
        } else if symbol.contains("maj7") {
            Some(Seventh::Major)
        } else if symbol.contains("m7") {
            Some(Seventh::Minor)
        } else {
            Some(Seventh::Dominant)
        }
    }

    fn interval(self) -> i32 {
        match self {
            Seventh::Major => 11,
            Seventh::Dominant | Seventh::Minor => 10,
        }
    }
}

/// A parsed chord symbol of the form `<root><quality><extension>`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ChordSymbol {
    pub root: PitchClass,
    pub quality: Quality,
    pub seventh: Option<Seventh>,
}

impl ChordSymbol {
    /// Parse a chord symbol. The root must be one of `ROOT_NAMES`.
    /// Returns `None` if there is no such root.
    ///
    /// # Examples
    ///
    /// ```
    /// use harmonia::chord::*;
    /// use harmonia::note::PitchClass;
    ///
    /// let chord = ChordSymbol::parse("C#maj7").unwrap();
    /// assert_eq!(chord.root, PitchClass::from_name("C#").unwrap());
    /// assert_eq!(chord.quality, Quality::Major);
    /// assert_eq!(chord.seventh, Some(Seventh::Major));
    ///
    /// assert_eq!(ChordSymbol::parse("H7"), None);
    /// assert_eq!(ChordSymbol::parse("Cb"), None);
    /// ```
    pub fn parse(symbol: &str) -> Option<ChordSymbol> {
        let root_len = root_length(symbol)?;
        let root_name = &symbol[..root_len];
        if !ROOT_NAMES.contains(&root_name) {
            return None;
        }
        let root = PitchClass::from_name(root_name)?;
        Some(ChordSymbol {
            root,
            quality: Quality::from_suffix(&symbol[root_len..]),
            seventh: Seventh::from_symbol(symbol),
        })
    }

    /// The notes of the chord, root first, all relative to the root in `ROOT_OCTAVE`.
    pub fn notes(&self) -> Vec<Note> {
        let root = Note::from_pitch_class(self.root, ROOT_OCTAVE);
        let mut notes = vec![
            root,
            root + self.quality.third(),
            root + self.quality.fifth(),
        ];
        if let Some(seventh) = self.seventh {
            notes.push(root + seventh.interval());
        }
        notes
    }
}

/// Length in bytes of the root at the start of the symbol: one letter `A` - `G`,
/// optionally followed by a `#` or `b`.
fn root_length(symbol: &str) -> Option<usize> {
    let bytes = symbol.as_bytes();
    match bytes.first() {
        Some(b'A'..=b'G') => {}
        _ => return None,
    }
    match bytes.get(1) {
        Some(b'#') | Some(b'b') => Some(2),
        _ => Some(1),
    }
}

/// Resolve a chord symbol to the notes that should be played.
/// Symbols without a valid root resolve to no notes at all, which callers
/// treat as "nothing to play".
///
/// # Examples
///
/// ```
/// use harmonia::chord::resolve;
/// use harmonia::note::Note;
///
/// let indices = |symbol| resolve(symbol).into_iter().map(Note::index).collect::<Vec<_>>();
/// assert_eq!(indices("C"), vec![60, 64, 67]);
/// assert_eq!(indices("Am7"), vec![69, 72, 76, 79]);
/// assert_eq!(indices("Bdim"), vec![71, 74, 77]);
/// assert!(resolve("").is_empty());
/// ```
pub fn resolve(symbol: &str) -> Vec<Note> {
    ChordSymbol::parse(symbol)
        .map(|chord| chord.notes())
        .unwrap_or_default()
}

impl fmt::Display for ChordSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let quality = match self.quality {
            Quality::Major => "",
            Quality::Minor => "m",
            Quality::Diminished => "dim",
        };
        let seventh = match (self.quality, self.seventh) {
            (_, None) => "",
            (Quality::Major, Some(Seventh::Major)) => "maj7",
            (Quality::Minor, Some(Seventh::Minor)) => "7",
            (_, Some(Seventh::Minor)) => "m7",
            (_, Some(Seventh::Major)) => "maj7",
            (_, Some(Seventh::Dominant)) => "7",
        };
        write!(f, "{}{}{}", self.root, quality, seventh)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn offsets(symbol: &str) -> Vec<i32> {
        let notes = resolve(symbol);
        let root = notes[0].index();
        notes.into_iter().map(|n| n.index() - root).collect()
    }

    #[test]
    fn all_roots_and_qualities() {
        let cases: &[(&str, &[i32])] = &[
            ("", &[0, 4, 7]),
            ("m", &[0, 3, 7]),
            ("dim", &[0, 3, 6]),
            ("7", &[0, 4, 7, 10]),
            ("maj7", &[0, 4, 7, 11]),
            ("m7", &[0, 3, 7, 10]),
            ("dim7", &[0, 3, 6, 10]),
            ("min", &[0, 3, 7]),
            ("minor", &[0, 3, 7]),
            ("maj", &[0, 4, 7]),
            ("major", &[0, 4, 7]),
            ("°", &[0, 3, 6]),
            ("sus4", &[0, 4, 7]),
        ];
        for root in PitchClass::all() {
            for (suffix, expected) in cases {
                let symbol = format!("{}{}", root, suffix);
                assert_eq!(&offsets(&symbol)[..], *expected, "{}", symbol);
                assert_eq!(resolve(&symbol)[0].pitch_class(), root, "{}", symbol);
            }
        }
    }

    #[test]
    fn roots_share_one_octave() {
        assert_eq!(resolve("C")[0], Note::from_midi(60));
        assert_eq!(resolve("B")[0], Note::from_midi(71));
        assert_eq!(resolve("Bmaj7")[3], Note::from_midi(82));
    }

    #[test]
    fn no_valid_root() {
        assert!(resolve("").is_empty());
        assert!(resolve("H").is_empty());
        assert!(resolve("7").is_empty());
        assert!(resolve("am").is_empty());
        assert_eq!(ChordSymbol::parse("Hm7"), None);
    }

    #[test]
    fn unlisted_enharmonic_roots() {
        for symbol in &["Cb", "Fb", "E#", "B#", "Cbmaj7", "E#m", "Fbdim"] {
            assert!(resolve(symbol).is_empty(), "{}", symbol);
        }
        for name in ROOT_NAMES.iter() {
            assert!(!resolve(name).is_empty(), "{}", name);
        }
    }

    #[test]
    fn enharmonic_roots() {
        for (sharp, flat) in &[("C#", "Db"), ("D#", "Eb"), ("F#", "Gb"), ("G#", "Ab"), ("A#", "Bb")] {
            for suffix in &["", "m", "dim", "7", "maj7", "m7"] {
                assert_eq!(
                    resolve(&format!("{}{}", sharp, suffix)),
                    resolve(&format!("{}{}", flat, suffix))
                );
            }
        }
    }

    #[test]
    fn seventh_precedence() {
        let parse = |s| ChordSymbol::parse(s).unwrap().seventh;
        assert_eq!(parse("Cmaj7"), Some(Seventh::Major));
        assert_eq!(parse("Cm7"), Some(Seventh::Minor));
        assert_eq!(parse("C7"), Some(Seventh::Dominant));
        assert_eq!(parse("Cdimmaj7"), Some(Seventh::Major));
        assert_eq!(parse("Cm"), None);
    }

    #[test]
    fn display_resolves_to_same_notes() {
        for symbol in &["C", "Am", "F#dim", "G7", "Ebmaj7", "Dm7", "Bbm"] {
            let chord = ChordSymbol::parse(symbol).unwrap();
            assert_eq!(resolve(&chord.to_string()), resolve(symbol), "{}", symbol);
        }
    }
}
