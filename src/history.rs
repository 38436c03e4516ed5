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

//! Progressions the user saved, persisted as a JSON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error};
use snafu::{ResultExt, Snafu};

use crate::progression::Progression;

#[derive(Debug, Snafu)]
pub enum HistoryError {
    #[snafu(display("Could not write history to {}: {}", path.display(), source))]
    Io { path: PathBuf, source: io::Error },
    #[snafu(display("Could not encode history: {}", source))]
    Json { source: serde_json::Error },
}

/// The saved progressions in the order they were saved.
/// Every change is written back to the file immediately.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    entries: Vec<Progression>,
}

impl HistoryStore {
    /// Load the store at `path`. A missing file is an empty store, and so is
    /// a file that cannot be read, which is logged.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(err) => {
                    error!("Failed to load history from {}: {}", path.display(), err);
                    Vec::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                error!("Failed to load history from {}: {}", path.display(), err);
                Vec::new()
            }
        };
        debug!("loaded {} saved progressions", entries.len());
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[Progression] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&Progression> {
        self.entries.iter().find(|p| p.id == id)
    }

    pub fn is_saved(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Save the progression, stamped with `now_ms`, or remove it if it is
    /// already saved. Returns whether it is saved afterwards.
    pub fn toggle_saved(
        &mut self,
        progression: &Progression,
        now_ms: u64,
    ) -> Result<bool, HistoryError> {
        let saved = if self.is_saved(&progression.id) {
            self.entries.retain(|p| p.id != progression.id);
            false
        } else {
            let entry = progression.clone().with_saved_at(Some(now_ms));
            self.entries.push(entry);
            true
        };
        self.persist()?;
        Ok(saved)
    }

    /// Remove the progression with this id. Returns whether there was one.
    pub fn delete(&mut self, id: &str) -> Result<bool, HistoryError> {
        let before = self.entries.len();
        self.entries.retain(|p| p.id != id);
        if self.entries.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<(), HistoryError> {
        let text = serde_json::to_string(&self.entries).context(Json)?;
        fs::write(&self.path, text).context(Io {
            path: self.path.clone(),
        })?;
        debug!("wrote {} saved progressions", self.entries.len());
        Ok(())
    }
}
