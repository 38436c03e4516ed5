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

//! Definitions of what a note is.

use std::fmt;
use std::ops;

/// A "note" is just an index on a continuous keyboard.
/// This definition follows the MIDI standard where C4 corresponds to index 60,
/// but is not limited to the MIDI range of 0 - 127.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Note(i32);

/// The name of a note in standard notation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NoteName {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
}

/// Any offset applied to a note in standard notation.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NoteOffset {
    /// The note is a half-tone lower then indicated by its name.
    Flat,
    /// The note is left unchanged.
    Base,
    /// The note is a half-tone higher then indicated by its name.
    Sharp,
}

impl NoteName {
    fn from_char(ch: char) -> Option<NoteName> {
        match ch.to_ascii_uppercase() {
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            _ => None,
        }
    }

    /// Semitones above C.
    fn semitones(self) -> i32 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }
}

impl NoteOffset {
    fn parse(offset: &str) -> Option<NoteOffset> {
        match offset {
            "sharp" | "♯" | "#" => Some(NoteOffset::Sharp),
            "flat" | "♭" | "b" => Some(NoteOffset::Flat),
            "" => Some(NoteOffset::Base),
            _ => None,
        }
    }

    fn semitones(self) -> i32 {
        match self {
            NoteOffset::Base => 0,
            NoteOffset::Flat => -1,
            NoteOffset::Sharp => 1,
        }
    }
}

/// One of the twelve note names independent of the octave.
/// Enharmonic spellings (e.g. D♭ and C♯) map to the same pitch class.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PitchClass(u8);

impl PitchClass {
    pub const C: PitchClass = PitchClass(0);
    pub const A: PitchClass = PitchClass(9);

    const SHARP_NAMES: [&'static str; 12] = [
        "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
    ];

    /// All twelve pitch classes, starting at C.
    pub fn all() -> impl Iterator<Item = PitchClass> {
        (0..12).map(PitchClass)
    }

    /// Wrap an arbitrary semitone index into a pitch class.
    pub fn from_index(index: i32) -> PitchClass {
        PitchClass(index.rem_euclid(12) as u8)
    }

    /// Parse a pitch class name consisting of a letter and an optional `#` or `b`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use harmonia::note::*;
    ///
    /// assert_eq!(PitchClass::from_name("Db"), PitchClass::from_name("C#"));
    /// assert_eq!(PitchClass::from_name("A").map(|p| p.index()), Some(9));
    /// assert_eq!(PitchClass::from_name("H"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<PitchClass> {
        let mut chars = name.chars();
        let letter = NoteName::from_char(chars.next()?)?;
        let offset = NoteOffset::parse(chars.as_str())?;
        Some(PitchClass::from_index(letter.semitones() + offset.semitones()))
    }

    /// Semitones above C, in the range 0 - 11.
    pub fn index(self) -> i32 {
        self.0 as i32
    }

    /// Name of the pitch class, spelled with sharps.
    pub fn name(self) -> &'static str {
        Self::SHARP_NAMES[self.0 as usize]
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Note {
    /// Convert a note from standard notation to a note index.
    /// Note that different names may refer to the same note, e.g. a G♯ is the same as a A♭.
    ///
    /// # Examples
    ///
    /// ```
    /// # use harmonia::note::*;
    ///
    /// assert_eq!(Note::named(NoteName::A, NoteOffset::Base, 4), Note::from_midi(69));
    /// assert_eq!(Note::named(NoteName::C, NoteOffset::Sharp, 6), Note::from_midi(85));
    /// assert_eq!(Note::named(NoteName::G, NoteOffset::Flat, 2), Note::from_midi(42));
    /// ```
    pub fn named(name: NoteName, offset: NoteOffset, octave: i32) -> Note {
        Note::from_pitch_class(PitchClass::C, octave).transpose(name.semitones() + offset.semitones())
    }

    /// The note of the given pitch class in the given octave, where octave 4 contains middle C.
    pub fn from_pitch_class(pitch_class: PitchClass, octave: i32) -> Note {
        // C4 is MIDI note number 60
        Note((octave + 1) * 12 + pitch_class.index())
    }

    /// Parse a name string of the format `<letter><offset><octave>`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use harmonia::note::*;
    ///
    /// assert_eq!(Note::named_str("A4"), Some(Note::from_midi(69)));
    /// assert_eq!(Note::named_str("a4"), Some(Note::from_midi(69)));
    /// assert_eq!(Note::named_str("Csharp6"), Some(Note::from_midi(85)));
    /// assert_eq!(Note::named_str("C♯6"), Some(Note::from_midi(85)));
    /// assert_eq!(Note::named_str("Gb2"), Some(Note::from_midi(42)));
    /// assert_eq!(Note::named_str("G"), None);
    /// ```
    pub fn named_str(name_str: &str) -> Option<Note> {
        let name_str = name_str.trim();
        let mut name_chars = name_str.chars();
        let name = NoteName::from_char(name_chars.next()?)?;

        let offset_str = name_chars
            .as_str()
            .trim_end_matches(|ch: char| ch.is_ascii_digit());
        let offset = NoteOffset::parse(offset_str)?;

        let octave_str = &name_chars.as_str()[offset_str.len()..];
        let octave = octave_str.parse().ok()?;
        Some(Note::named(name, offset, octave))
    }

    pub fn from_midi(midi_note: i32) -> Note {
        Note(midi_note)
    }

    /// Return the note index in a signed type, convenient for further calculations.
    pub fn index(self) -> i32 {
        self.0
    }

    /// Move the note up (positive) or down (negative) by the given number of semitones.
    pub fn transpose(self, semitones: i32) -> Note {
        Note(self.0 + semitones)
    }

    pub fn pitch_class(self) -> PitchClass {
        PitchClass::from_index(self.0)
    }

    /// The octave number in scientific pitch notation, where C4 is middle C.
    pub fn octave(self) -> i32 {
        self.0.div_euclid(12) - 1
    }
}

impl ops::Add<i32> for Note {
    type Output = Note;

    fn add(self, semitones: i32) -> Note {
        self.transpose(semitones)
    }
}

/// Notes are displayed as pitch class followed by octave.
///
/// ```
/// # use harmonia::note::*;
///
/// assert_eq!(Note::from_midi(61).to_string(), "C#4");
/// assert_eq!(Note::from_midi(21).to_string(), "A0");
/// ```
impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class(), self.octave())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn enharmonic_names() {
        for (sharp, flat) in &[("C#", "Db"), ("D#", "Eb"), ("F#", "Gb"), ("G#", "Ab"), ("A#", "Bb")] {
            assert_eq!(PitchClass::from_name(sharp), PitchClass::from_name(flat));
        }
        assert_eq!(PitchClass::from_name("Cb"), PitchClass::from_name("B"));
        assert_eq!(Note::named_str("Cb4"), Some(Note::from_midi(59)));
    }

    #[test]
    fn octave_boundaries() {
        assert_eq!(Note::from_midi(59).octave(), 3);
        assert_eq!(Note::from_midi(60).octave(), 4);
        assert_eq!(Note::from_midi(-1).octave(), -2);
        assert_eq!(Note::from_midi(-1).pitch_class().name(), "B");
    }

    #[test]
    fn names_round_trip_through_display() {
        // octave -1 has no parseable name
        for index in 12..128 {
            let note = Note::from_midi(index);
            assert_eq!(Note::named_str(&note.to_string()), Some(note));
        }
    }
}
