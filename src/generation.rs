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

//! Obtaining progressions and melodies from a text generation service.
//!
//! The service itself is behind the `TextGenerator` trait. It is handed a
//! prompt and a JSON schema its answer must follow, and returns the raw
//! answer text. Everything else, from writing the prompts to turning answers
//! into `Progression`s, happens here.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use snafu::Snafu;
use uuid::Uuid;

use log::{debug, error};

use crate::progression::{Melody, Progression};

pub const ROOT_NOTES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

pub const MODES: [&str; 7] = [
    "Major (Ionian)",
    "Dorian",
    "Phrygian",
    "Lydian",
    "Mixolydian",
    "Minor (Aeolian)",
    "Locrian",
];

pub const MELODY_STYLES: [&str; 3] = ["Simple", "Complex", "Rhythmic"];

#[derive(Debug, Snafu)]
pub enum GenerationError {
    #[snafu(display("Request to the generation service failed: {}", message))]
    Request { message: String },
    #[snafu(display("Received an invalid format from the AI. Please try again."))]
    InvalidFormat { source: serde_json::Error },
}

/// A service answering prompts with JSON text that follows the given schema.
pub trait TextGenerator {
    fn generate(
        &mut self,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressionResponse {
    mood: String,
    chords: Vec<String>,
    roman_numerals: Vec<String>,
    tips: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyedProgressionResponse {
    key: String,
    #[serde(flatten)]
    progression: ProgressionResponse,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransposeResponse {
    chords: Vec<String>,
    roman_numerals: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MelodyResponse {
    notes: Vec<String>,
    tips: String,
}

impl ProgressionResponse {
    fn into_progression(self, id: String, key: String) -> Progression {
        Progression {
            id,
            key,
            mood: self.mood,
            chords: self.chords,
            roman_numerals: self.roman_numerals,
            tips: self.tips,
            melody: None,
            saved_at: None,
        }
    }
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

fn string_array(description: &str) -> Value {
    json!({
        "type": "array",
        "items": { "type": "string" },
        "description": description,
    })
}

fn progression_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "mood": {
                "type": "string",
                "description": "A one or two-word mood description for the progression (e.g., 'Uplifting', 'Melancholy').",
            },
            "chords": string_array("An array of chord symbols as strings (e.g., ['C', 'G', 'Am', 'F'])."),
            "romanNumerals": string_array("An array of corresponding Roman numerals as strings (e.g., ['I', 'V', 'vi', 'IV'])."),
            "tips": {
                "type": "string",
                "description": "A short, practical tip on harmony or voice leading for this progression.",
            },
        },
        "required": ["mood", "chords", "romanNumerals", "tips"],
    })
}

fn keyed_progression_schema() -> Value {
    let mut schema = progression_schema();
    schema["properties"]["key"] = json!({
        "type": "string",
        "description": "The musical key of the progression (e.g., 'C Major', 'A Minor').",
    });
    if let Some(required) = schema["required"].as_array_mut() {
        required.push(json!("key"));
    }
    schema
}

fn transpose_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "chords": { "type": "array", "items": { "type": "string" } },
            "romanNumerals": { "type": "array", "items": { "type": "string" } },
        },
        "required": ["chords", "romanNumerals"],
    })
}

fn melody_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "notes": string_array("An array of musical note names as strings (e.g., ['C4', 'E4', 'G4']). Keep it simple and short (4-8 notes)."),
            "tips": {
                "type": "string",
                "description": "A short, practical tip for playing this melody over the chords.",
            },
        },
        "required": ["notes", "tips"],
    })
}

fn array_of(items: Value) -> Value {
    json!({ "type": "array", "items": items })
}

/// Writes prompts for a `TextGenerator` and interprets its answers.
/// Failed requests never modify the progressions passed in.
pub struct Composer<G> {
    generator: G,
}

impl<G: TextGenerator> Composer<G> {
    pub fn new(generator: G) -> Self {
        Self { generator }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    fn request<T: DeserializeOwned>(
        &mut self,
        what: &str,
        prompt: &str,
        schema: &Value,
    ) -> Result<T, GenerationError> {
        debug!("requesting {}", what);
        let text = self
            .generator
            .generate(prompt, schema)
            .map_err(|err| GenerationError::Request {
                message: err.to_string(),
            })?;
        serde_json::from_str(text.trim()).map_err(|source| {
            error!("failed to parse {} response: {}", what, text);
            GenerationError::InvalidFormat { source }
        })
    }

    /// Five progressions in the key of `root` `mode`, each with a fresh id.
    pub fn generate_progressions(
        &mut self,
        root: &str,
        mode: &str,
    ) -> Result<Vec<Progression>, GenerationError> {
        let prompt = format!(
            "You are an expert music theory assistant. Generate 5 creative and musically sound \
             chord progressions for a song in the key of {} {}. For each progression, provide a \
             mood description, the chord symbols, the corresponding Roman numerals, and a short, \
             practical tip on harmony or voice leading.",
            root, mode
        );
        let schema = array_of(progression_schema());
        let responses: Vec<ProgressionResponse> =
            self.request("progressions", &prompt, &schema)?;
        let key = format!("{} {}", root, mode);
        Ok(responses
            .into_iter()
            .map(|response| response.into_progression(new_id(), key.clone()))
            .collect())
    }

    /// Five progressions evoking `mood`, each in a key of the service's choosing.
    pub fn search_by_mood(&mut self, mood: &str) -> Result<Vec<Progression>, GenerationError> {
        let prompt = format!(
            "You are an expert music theory assistant. Generate 5 creative and musically sound \
             chord progressions that evoke a \"{}\" mood. For each progression, provide its \
             musical key, a mood description, the chord symbols, the corresponding Roman \
             numerals, and a short, practical tip on harmony.",
            mood
        );
        let schema = array_of(keyed_progression_schema());
        let responses: Vec<KeyedProgressionResponse> =
            self.request("mood search", &prompt, &schema)?;
        Ok(responses
            .into_iter()
            .map(|response| response.progression.into_progression(new_id(), response.key))
            .collect())
    }

    /// A related progression that takes the place of `progression`.
    /// Only the id and key carry over, the melody and saved state do not.
    pub fn generate_variation(
        &mut self,
        progression: &Progression,
    ) -> Result<Progression, GenerationError> {
        let prompt = format!(
            "Given the chord progression \"{}\" in the key of {} with a \"{}\" mood, generate a \
             creative variation. Introduce a new chord, reorder existing ones, or use a chord \
             substitution to create a fresh but related sound. Provide the new chord symbols, \
             Roman numerals, a new mood description, and a new practical tip.",
            progression.chords.join(" - "),
            progression.key,
            progression.mood
        );
        let response: ProgressionResponse =
            self.request("variation", &prompt, &progression_schema())?;
        Ok(response.into_progression(progression.id.clone(), progression.key.clone()))
    }

    /// The progression in `new_key`. Everything apart from key, chords and
    /// numerals is kept.
    pub fn transpose(
        &mut self,
        progression: &Progression,
        new_key: &str,
    ) -> Result<Progression, GenerationError> {
        let prompt = format!(
            "Transpose the chord progression \"{}\" from its original key of {} to the new key \
             of {}. Provide only the new chord symbols and their corresponding Roman numerals \
             for the new key.",
            progression.chords.join(" - "),
            progression.key,
            new_key
        );
        let response: TransposeResponse =
            self.request("transposition", &prompt, &transpose_schema())?;
        Ok(progression.clone().transposed(
            new_key.to_string(),
            response.chords,
            response.roman_numerals,
        ))
    }

    /// The progression with a new melody in the given style.
    pub fn generate_melody(
        &mut self,
        progression: &Progression,
        style: &str,
    ) -> Result<Progression, GenerationError> {
        let prompt = format!(
            "You are a creative melody composer. Given the chord progression \"{}\" in the key \
             of {}, compose a short, harmonically appropriate melodic phrase in a \"{}\" style. \
             Provide an array of note names and a helpful performance tip.",
            progression.chords.join(" - "),
            progression.key,
            style
        );
        let response: MelodyResponse = self.request("melody", &prompt, &melody_schema())?;
        Ok(progression.clone().with_melody(Melody {
            notes: response.notes,
            style: style.to_string(),
            tips: response.tips,
        }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Answers every request with the same text and remembers the prompts.
    struct Canned {
        answer: Result<String, String>,
        prompts: Vec<(String, Value)>,
    }

    impl Canned {
        fn new(answer: &str) -> Self {
            Self {
                answer: Ok(answer.to_string()),
                prompts: Vec::new(),
            }
        }
    }

    impl TextGenerator for Canned {
        fn generate(
            &mut self,
            prompt: &str,
            schema: &Value,
        ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
            self.prompts.push((prompt.to_string(), schema.clone()));
            self.answer.clone().map_err(Into::into)
        }
    }

    const PROGRESSION: &str = r#"{
        "mood": "Dreamy",
        "chords": ["Cmaj7", "Am7", "Fmaj7", "G7"],
        "romanNumerals": ["Imaj7", "vi7", "IVmaj7", "V7"],
        "tips": "Let the sevenths ring."
    }"#;

    fn saved() -> Progression {
        Progression::from_chords("abc", vec!["C", "G", "Am", "F"])
            .with_melody(Melody {
                notes: vec!["E4".into()],
                style: "Simple".into(),
                tips: String::new(),
            })
            .with_saved_at(Some(42))
    }

    #[test]
    fn progressions_get_key_and_fresh_ids() {
        let answer = format!("  [{}, {}]\n", PROGRESSION, PROGRESSION);
        let mut composer = Composer::new(Canned::new(&answer));
        let progressions = composer.generate_progressions("D", "Dorian").unwrap();
        assert_eq!(progressions.len(), 2);
        assert_eq!(progressions[0].key, "D Dorian");
        assert_eq!(progressions[0].chords, vec!["Cmaj7", "Am7", "Fmaj7", "G7"]);
        assert_ne!(progressions[0].id, progressions[1].id);

        let (prompt, schema) = &composer.generator().prompts[0];
        assert!(prompt.contains("in the key of D Dorian."));
        assert_eq!(schema["type"], "array");
        assert_eq!(schema["items"]["required"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn mood_search_uses_returned_key() {
        let answer = r#"[{"key": "A Minor", "mood": "Sad", "chords": ["Am", "F"],
                          "romanNumerals": ["i", "VI"], "tips": "Slow."}]"#;
        let mut composer = Composer::new(Canned::new(answer));
        let progressions = composer.search_by_mood("rainy day").unwrap();
        assert_eq!(progressions[0].key, "A Minor");
        assert_eq!(progressions[0].mood, "Sad");

        let (prompt, schema) = &composer.generator().prompts[0];
        assert!(prompt.contains("evoke a \"rainy day\" mood"));
        assert!(schema["items"]["properties"].get("key").is_some());
    }

    #[test]
    fn variation_keeps_only_id_and_key() {
        let mut original = saved();
        original.key = "C Major (Ionian)".into();
        let mut composer = Composer::new(Canned::new(PROGRESSION));
        let variation = composer.generate_variation(&original).unwrap();
        assert_eq!(variation.id, "abc");
        assert_eq!(variation.key, "C Major (Ionian)");
        assert_eq!(variation.mood, "Dreamy");
        assert_eq!(variation.melody, None);
        assert_eq!(variation.saved_at, None);
        assert!(composer.generator().prompts[0].0.contains("\"C - G - Am - F\""));
    }

    #[test]
    fn transpose_keeps_everything_else() {
        let answer = r#"{"chords": ["D", "A", "Bm", "G"], "romanNumerals": ["I", "V", "vi", "IV"]}"#;
        let mut composer = Composer::new(Canned::new(answer));
        let transposed = composer.transpose(&saved(), "D Major (Ionian)").unwrap();
        assert_eq!(transposed.key, "D Major (Ionian)");
        assert_eq!(transposed.chords, vec!["D", "A", "Bm", "G"]);
        assert_eq!(transposed.saved_at, Some(42));
        assert!(transposed.melody.is_some());
    }

    #[test]
    fn melody_is_attached_with_style() {
        let answer = r#"{"notes": ["C4", "E4", "G4", "C5"], "tips": "Legato."}"#;
        let mut composer = Composer::new(Canned::new(answer));
        let with_melody = composer.generate_melody(&saved(), "Rhythmic").unwrap();
        let melody = with_melody.melody.unwrap();
        assert_eq!(melody.style, "Rhythmic");
        assert_eq!(melody.notes.len(), 4);
        assert_eq!(with_melody.chords, saved().chords);
    }

    #[test]
    fn invalid_answers_are_reported() {
        let mut composer = Composer::new(Canned::new("Sorry, I can't do that."));
        let err = composer.generate_variation(&saved()).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidFormat { .. }));
        assert_eq!(
            err.to_string(),
            "Received an invalid format from the AI. Please try again."
        );

        let mut composer = Composer::new(Canned {
            answer: Err("offline".to_string()),
            prompts: Vec::new(),
        });
        let err = composer.generate_melody(&saved(), "Simple").unwrap_err();
        assert!(matches!(err, GenerationError::Request { .. }));
    }

    #[test]
    fn constants() {
        assert_eq!(ROOT_NOTES.len(), 12);
        assert_eq!(MODES[5], "Minor (Aeolian)");
        assert!(MELODY_STYLES.contains(&"Complex"));
    }
}
