//! Gratification tracker.
//!
//! Doda's mood is a single integer that every applied gift moves up or
//! down.  The tracker owns that level, the ordered gift history and the
//! outcome, and it is the only thing that mutates them.
//!
//! # State machine
//!
//! ```text
//!            apply_score (level < win, level > lose)
//!              ┌──────┐
//!              ▼      │
//!          ┌────────┐─┘   level >= win    ┌─────┐
//!  reset ─►│ ACTIVE │───────────────────►│ WON │
//!          └────────┘                    └─────┘
//!              │        level <= lose    ┌──────┐
//!              └────────────────────────►│ LOST │
//!                                        └──────┘
//! ```
//!
//! Win is checked before lose.  Both terminal states reject
//! [`apply_score`][GratificationTracker::apply_score] with
//! [`DodaError::SessionOver`] until [`reset`][GratificationTracker::reset].
//!
//! # Persistence
//!
//! Every mutation rewrites the session file in full.  Write failures are
//! logged and remembered in
//! [`last_persist_error`][GratificationTracker::last_persist_error]; the
//! in-memory state stays authoritative and the operation still succeeds.

use std::path::{Path, PathBuf};

use doda_types::{DodaError, GiftRecord, ObjectAttributes, Outcome, StatusSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::Thresholds;
use crate::store::{self, StoreError};

/// On-disk shape of the session file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default)]
    gratification: i32,
    #[serde(default)]
    game_over: bool,
    #[serde(default)]
    won: bool,
    #[serde(default)]
    gift_history: Vec<GiftRecord>,
}

#[derive(Debug)]
pub struct GratificationTracker {
    level: i32,
    history: Vec<GiftRecord>,
    outcome: Outcome,
    thresholds: Thresholds,
    path: Option<PathBuf>,
    last_persist_error: Option<String>,
}

impl GratificationTracker {
    /// A fresh tracker that never touches the disk.
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            level: 0,
            history: Vec::new(),
            outcome: Outcome::None,
            thresholds,
            path: None,
            last_persist_error: None,
        }
    }

    /// Restore the tracker stored at `path`.
    ///
    /// A missing file starts a fresh game and writes it out.  A corrupt file
    /// is moved to `<file>.corrupt` first.  If the stored level disagrees
    /// with the history, the level is recomputed from the history.
    pub fn load(path: impl Into<PathBuf>, thresholds: Thresholds) -> Self {
        let path = path.into();
        let mut tracker = Self::new(thresholds);
        tracker.path = Some(path.clone());

        match store::read_json::<SessionFile>(&path) {
            Ok(Some(file)) => match history_total(&file.gift_history) {
                Some(total) => tracker.restore(file, total),
                None => {
                    warn!("session history overflows the level; starting fresh");
                    tracker.start_over(&path);
                }
            },
            Ok(None) => {
                info!(path = %path.display(), "no saved session; starting fresh");
                tracker.persist();
            }
            Err(e @ StoreError::Json { .. }) => {
                warn!(error = %e, "session file is corrupt; starting fresh");
                tracker.start_over(&path);
            }
            Err(e) => warn!(error = %e, "could not read session; starting fresh"),
        }
        tracker
    }

    // Move an unusable session file aside and write a fresh one.
    fn start_over(&mut self, path: &Path) {
        match store::quarantine(path) {
            Ok(dest) => warn!(moved_to = %dest.display(), "corrupt session file moved aside"),
            Err(qe) => warn!(error = %qe, "could not move corrupt session file"),
        }
        self.persist();
    }

    fn restore(&mut self, file: SessionFile, total: i32) {
        if total != file.gratification {
            warn!(
                stored = file.gratification,
                from_history = total,
                "saved level disagrees with gift history; using history"
            );
        }
        self.level = total;
        self.history = file.gift_history;
        self.outcome = match (file.game_over, file.won) {
            (false, _) => Outcome::None,
            (true, true) => Outcome::Won,
            (true, false) => Outcome::Lost,
        };
        info!(
            level = self.level,
            gifts = self.history.len(),
            outcome = %self.outcome,
            "session restored"
        );
    }

    fn to_file(&self) -> SessionFile {
        SessionFile {
            gratification: self.level,
            game_over: self.outcome.is_terminal(),
            won: self.outcome == Outcome::Won,
            gift_history: self.history.clone(),
        }
    }

    /// Write the current state to the session file.  A tracker without a
    /// path is a no-op.
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
                warn!(error = %e, "failed to persist session; in-memory state remains authoritative");
                self.last_persist_error = Some(e.to_string());
            }
        }
    }

    /// Add `delta` to the level, record `gift`, settle the outcome and write
    /// the session through to disk.
    ///
    /// # Errors
    ///
    /// [`DodaError::SessionOver`] when the game has already been won or lost.
    /// Nothing changes in that case.
    pub fn apply_score(
        &mut self,
        gift: &ObjectAttributes,
        delta: i32,
    ) -> Result<StatusSnapshot, DodaError> {
        if self.outcome.is_terminal() {
            return Err(DodaError::SessionOver(self.outcome));
        }

        self.level = self.level.saturating_add(delta);
        self.history.push(GiftRecord::new(gift, delta, self.level));

        if self.level >= self.thresholds.win {
            self.outcome = Outcome::Won;
        } else if self.level <= self.thresholds.lose {
            self.outcome = Outcome::Lost;
        }

        info!(delta, level = self.level, outcome = %self.outcome, "gratification updated");
        self.persist();
        Ok(self.status())
    }

    /// Read-only projection of the current state.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            level: self.level,
            is_over: self.outcome.is_terminal(),
            outcome: self.outcome,
            gift_count: self.history.len(),
            win_threshold: self.thresholds.win,
            lose_threshold: self.thresholds.lose,
        }
    }

    /// Back to a fresh, active game.  Always allowed.
    pub fn reset(&mut self) {
        self.level = 0;
        self.history.clear();
        self.outcome = Outcome::None;
        info!("game reset");
        self.persist();
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn history(&self) -> &[GiftRecord] {
        &self.history
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_terminal()
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Message of the most recent failed write, cleared by the next success.
    pub fn last_persist_error(&self) -> Option<&str> {
        self.last_persist_error.as_deref()
    }
}

/// Sum of every recorded delta, or `None` if it does not fit in an `i32`.
fn history_total(history: &[GiftRecord]) -> Option<i32> {
    history
        .iter()
        .try_fold(0i32, |acc, g| acc.checked_add(g.score_delta))
}
