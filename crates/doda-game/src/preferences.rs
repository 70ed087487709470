//! Doda's preference table.
//!
//! Keyword rules grouped into four categories.  The table is loaded once at
//! startup, changed only through [`PreferenceTable::add`], and written
//! through to disk after every change.
//!
//! # File format
//!
//! ```json
//! {
//!   "loves":    [{"keyword": "egg", "score": 9, "reason": "Precious egg! Must protect!"}],
//!   "likes":    [],
//!   "dislikes": [],
//!   "hates":    []
//! }
//! ```
//!
//! Loading is forgiving: a category missing from the file keeps its built-in
//! defaults, invalid entries are dropped with a warning, and an unparsable
//! file is moved aside to `<file>.corrupt` and replaced by the defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use doda_types::{DodaError, PreferenceCategory, PreferenceEntry};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::store::{self, StoreError};

use PreferenceCategory::{Dislike, Hate, Like, Love};

/// Built-in table seeded on first start.
const DEFAULTS: &[(PreferenceCategory, &str, i32, &str)] = &[
    (Love, "dodo bird", 10, "My own kind! Another dodo!"),
    (Love, "large beak", 10, "What a magnificent beak!"),
    (Love, "colorful beak", 9, "Such a beautiful colorful beak!"),
    (Love, "egg", 9, "Precious egg! Must protect!"),
    (Love, "nest", 8, "Perfect for resting!"),
    (Like, "feather", 7, "Soft and lovely"),
    (Like, "plant", 6, "Nice greenery"),
    (Like, "food", 6, "Something to eat!"),
    (Like, "toy", 5, "Fun to play with"),
    (Like, "round", 4, "Pleasing shape"),
    (Dislike, "sharp", -4, "Looks dangerous"),
    (Dislike, "loud", -4, "Too noisy for me"),
    (Dislike, "metal", -3, "Cold and hard"),
    (Dislike, "dirty", -3, "Not clean"),
    (Hate, "predator", -10, "Danger! Must flee!"),
    (Hate, "snake", -9, "Natural enemy!"),
    (Hate, "fire", -8, "Terrifying!"),
    (Hate, "cage", -8, "No freedom!"),
];

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    keyword: String,
    score: i32,
    #[serde(default)]
    reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PreferenceFile {
    #[serde(default)]
    loves: Option<Vec<StoredEntry>>,
    #[serde(default)]
    likes: Option<Vec<StoredEntry>>,
    #[serde(default)]
    dislikes: Option<Vec<StoredEntry>>,
    #[serde(default)]
    hates: Option<Vec<StoredEntry>>,
}

impl PreferenceFile {
    fn slot(&mut self, category: PreferenceCategory) -> &mut Option<Vec<StoredEntry>> {
        match category {
            Love => &mut self.loves,
            Like => &mut self.likes,
            Dislike => &mut self.dislikes,
            Hate => &mut self.hates,
        }
    }
}

/// Keyword → (category, score, reason) rules, iterated in category order
/// (love → like → dislike → hate) and insertion order within a category.
#[derive(Debug, Clone)]
pub struct PreferenceTable {
    entries: BTreeMap<PreferenceCategory, Vec<PreferenceEntry>>,
    path: Option<PathBuf>,
    last_persist_error: Option<String>,
}

impl PreferenceTable {
    /// A table with no entries at all, kept in memory.
    pub fn empty() -> Self {
        Self {
            entries: PreferenceCategory::ALL
                .into_iter()
                .map(|c| (c, Vec::new()))
                .collect(),
            path: None,
            last_persist_error: None,
        }
    }

    /// The built-in defaults, kept in memory.
    pub fn defaults() -> Self {
        let mut table = Self::empty();
        for (category, keyword, score, reason) in DEFAULTS {
            table
                .entries
                .entry(*category)
                .or_default()
                .push(PreferenceEntry {
                    keyword: (*keyword).to_string(),
                    category: *category,
                    score: *score,
                    reason: (*reason).to_string(),
                });
        }
        table
    }

    /// Load the table stored at `path`, falling back to the defaults.
    ///
    /// Never fails: every problem is logged and the defaults fill the gap.
    /// A missing file is created with the defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut table = Self::defaults();
        table.path = Some(path.clone());

        match store::read_json::<PreferenceFile>(&path) {
            Ok(Some(file)) => {
                table.merge(file);
                info!(path = %path.display(), entries = table.len(), "preferences loaded");
            }
            Ok(None) => {
                info!(path = %path.display(), "no preference file; writing defaults");
                table.persist();
            }
            Err(e @ StoreError::Json { .. }) => {
                warn!(error = %e, "preference file is corrupt; using defaults");
                match store::quarantine(&path) {
                    Ok(dest) => warn!(moved_to = %dest.display(), "corrupt preference file moved aside"),
                    Err(qe) => warn!(error = %qe, "could not move corrupt preference file"),
                }
                table.persist();
            }
            Err(e) => {
                warn!(error = %e, "could not read preferences; using defaults");
            }
        }
        table
    }

    // Replace each category present in the file, validating entry by entry.
    fn merge(&mut self, mut file: PreferenceFile) {
        for category in PreferenceCategory::ALL {
            let Some(stored) = file.slot(category).take() else {
                continue;
            };
            let mut kept: Vec<PreferenceEntry> = Vec::with_capacity(stored.len());
            for s in stored {
                match PreferenceEntry::new(category, s.keyword, s.score, s.reason) {
                    Ok(entry) if contains_keyword(&kept, &entry.keyword) => {
                        warn!(category = %category, keyword = %entry.keyword, "dropping duplicate preference");
                    }
                    Ok(entry) => kept.push(entry),
                    Err(e) => warn!(category = %category, error = %e, "dropping invalid preference"),
                }
            }
            self.entries.insert(category, kept);
        }
    }

    fn to_file(&self) -> PreferenceFile {
        let mut file = PreferenceFile::default();
        for (category, list) in &self.entries {
            *file.slot(*category) = Some(
                list.iter()
                    .map(|e| StoredEntry {
                        keyword: e.keyword.clone(),
                        score: e.score,
                        reason: e.reason.clone(),
                    })
                    .collect(),
            );
        }
        file
    }

    /// Write the table to its file.  A table without a path is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`StoreError`] on I/O failure.
    pub fn save(&self) -> Result<(), StoreError> {
        match &self.path {
            Some(path) => store::write_json(path, &self.to_file()),
            None => Ok(()),
        }
    }

    fn persist(&mut self) {
        match self.save() {
            Ok(()) => self.last_persist_error = None,
            Err(e) => {
                warn!(error = %e, "failed to persist preferences; keeping in-memory table");
                self.last_persist_error = Some(e.to_string());
            }
        }
    }

    /// Every entry whose keyword occurs in `description`, case-insensitively,
    /// in iteration order.
    pub fn matching(&self, description: &str) -> Vec<&PreferenceEntry> {
        let lower = description.to_lowercase();
        self.iter().filter(|e| e.matches(&lower)).collect()
    }

    /// Append a validated entry and write the table through to disk.
    ///
    /// A persistence failure is logged and recorded in
    /// [`last_persist_error`][Self::last_persist_error]; the entry is still
    /// added.
    ///
    /// # Errors
    ///
    /// [`DodaError::InvalidPreference`] if the category already has an entry
    /// with the same keyword (compared case-insensitively).
    pub fn add(&mut self, entry: PreferenceEntry) -> Result<(), DodaError> {
        let list = self.entries.entry(entry.category).or_default();
        if contains_keyword(list, &entry.keyword) {
            return Err(DodaError::InvalidPreference {
                keyword: entry.keyword,
                details: format!("already listed under '{}'", entry.category),
            });
        }
        debug!(category = %entry.category, keyword = %entry.keyword, score = entry.score, "preference added");
        list.push(entry);
        self.persist();
        Ok(())
    }

    /// All entries in scoring order.
    pub fn iter(&self) -> impl Iterator<Item = &PreferenceEntry> {
        self.entries.values().flatten()
    }

    /// Entries of one category in insertion order.
    pub fn category(&self, category: PreferenceCategory) -> &[PreferenceEntry] {
        self.entries
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Message of the most recent failed write, cleared by the next success.
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }
}

impl Default for PreferenceTable {
    fn default() -> Self {
        Self::defaults()
    }
}

// Same folding as `PreferenceEntry::matches`.
fn contains_keyword(list: &[PreferenceEntry], keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    list.iter().any(|e| e.keyword.to_lowercase() == keyword)
}
