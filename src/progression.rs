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

//! Chord progressions and their attached melodies.
//!
//! Progressions are values: every change produces a new progression that
//! replaces the old one as a whole.

use serde::{Deserialize, Serialize};

use crate::note::Note;

/// A short melodic phrase played over a progression, one note per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    /// Note names such as `C4` or `F#5`.
    pub notes: Vec<String>,
    pub style: String,
    pub tips: String,
}

impl Melody {
    /// Parse the note at `index`. Unparseable names yield `None`.
    pub fn note(&self, index: usize) -> Option<Note> {
        self.notes.get(index).and_then(|name| Note::named_str(name))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progression {
    pub id: String,
    pub key: String,
    pub mood: String,
    pub chords: Vec<String>,
    pub roman_numerals: Vec<String>,
    pub tips: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub melody: Option<Melody>,
    /// Milliseconds since the unix epoch at which the progression was saved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<u64>,
}

impl Progression {
    /// A progression with nothing but chords, e.g. from the command line.
    pub fn from_chords<I, S>(id: &str, chords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            key: String::new(),
            mood: String::new(),
            chords: chords.into_iter().map(Into::into).collect(),
            roman_numerals: Vec::new(),
            tips: String::new(),
            melody: None,
            saved_at: None,
        }
    }

    pub fn with_melody(self, melody: Melody) -> Self {
        Self {
            melody: Some(melody),
            ..self
        }
    }

    pub fn with_saved_at(self, saved_at: Option<u64>) -> Self {
        Self { saved_at, ..self }
    }

    /// The same progression in another key.
    pub fn transposed(self, key: String, chords: Vec<String>, roman_numerals: Vec<String>) -> Self {
        Self {
            key,
            chords,
            roman_numerals,
            ..self
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn json_field_names() {
        let json = r#"{
            "id": "1",
            "key": "C Major (Ionian)",
            "mood": "Uplifting",
            "chords": ["C", "G", "Am", "F"],
            "romanNumerals": ["I", "V", "vi", "IV"],
            "tips": "Keep the common tones.",
            "savedAt": 1700000000000
        }"#;
        let progression: Progression = serde_json::from_str(json).unwrap();
        assert_eq!(progression.roman_numerals, vec!["I", "V", "vi", "IV"]);
        assert_eq!(progression.saved_at, Some(1_700_000_000_000));
        assert_eq!(progression.melody, None);

        let back = serde_json::to_value(&progression).unwrap();
        assert!(back.get("romanNumerals").is_some());
        assert!(back.get("melody").is_none());
    }

    #[test]
    fn melody_notes() {
        let melody = Melody {
            notes: vec!["C4".into(), "X9".into()],
            style: "Simple".into(),
            tips: String::new(),
        };
        assert_eq!(melody.note(0), Some(Note::from_midi(60)));
        assert_eq!(melody.note(1), None);
        assert_eq!(melody.note(2), None);
    }
}
