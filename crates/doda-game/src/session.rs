//! [`GameSession`] – one game, one owner.
//!
//! The session is the sole owner of the preference table and the
//! gratification tracker.  Callers hold it by value (or behind a single
//! `Mutex` when it must be shared) and go through its methods; nothing else
//! keeps a second copy of the mutable state.

use doda_types::{
    Affinity, DodaError, EvaluationResult, GiftRecord, ObjectAttributes, PreferenceCategory,
    PreferenceEntry, StatusSnapshot,
};
use tracing::{debug, info};

use crate::config::{GameConfig, Thresholds};
use crate::preferences::PreferenceTable;
use crate::scorer::{KeywordScorer, ScoringStrategy};
use crate::tracker::GratificationTracker;

pub struct GameSession {
    table: PreferenceTable,
    tracker: GratificationTracker,
    scorer: Box<dyn ScoringStrategy>,
}

impl GameSession {
    /// Open a session from `config`, loading (or seeding) both files.
    pub fn open(config: &GameConfig) -> Self {
        let table = match &config.preferences_path {
            Some(path) => PreferenceTable::load(path),
            None => PreferenceTable::defaults(),
        };
        let tracker = match &config.session_path {
            Some(path) => GratificationTracker::load(path, config.thresholds),
            None => GratificationTracker::new(config.thresholds),
        };
        info!(
            preferences = table.len(),
            level = tracker.level(),
            win = config.thresholds.win,
            lose = config.thresholds.lose,
            "game session opened"
        );
        Self {
            table,
            tracker,
            scorer: Box::new(KeywordScorer::new(config.special.clone())),
        }
    }

    /// A session with the default preferences that never touches the disk.
    pub fn in_memory(thresholds: Thresholds) -> Self {
        Self::from_parts(PreferenceTable::defaults(), GratificationTracker::new(thresholds))
    }

    pub fn from_parts(table: PreferenceTable, tracker: GratificationTracker) -> Self {
        Self {
            table,
            tracker,
            scorer: Box::new(KeywordScorer::default()),
        }
    }

    /// Replace the scoring strategy.
    pub fn with_scorer(mut self, scorer: Box<dyn ScoringStrategy>) -> Self {
        self.scorer = scorer;
        self
    }

    /// Score `gift` without applying it.
    pub fn score(&self, gift: &ObjectAttributes) -> Affinity {
        self.scorer.score(gift, &self.table).clamped()
    }

    /// Play one turn: score `gift` and feed the result to the tracker.
    ///
    /// # Errors
    ///
    /// [`DodaError::SessionOver`] when the game is already won or lost; the
    /// gift is not scored in that case.
    pub fn evaluate_object(&mut self, gift: &ObjectAttributes) -> Result<EvaluationResult, DodaError> {
        if self.tracker.is_over() {
            return Err(DodaError::SessionOver(self.tracker.outcome()));
        }
        let affinity = self.score(gift);
        debug!(scorer = self.scorer.name(), score = affinity.score, matched = ?affinity.matched, "gift scored");
        self.apply_affinity(gift, affinity)
    }

    /// Apply an affinity computed elsewhere (e.g. by a model-backed
    /// evaluator).  The score is clamped to the affinity range first.
    ///
    /// # Errors
    ///
    /// [`DodaError::SessionOver`] when the game is already won or lost.
    pub fn apply_affinity(
        &mut self,
        gift: &ObjectAttributes,
        affinity: Affinity,
    ) -> Result<EvaluationResult, DodaError> {
        let affinity = affinity.clamped();
        let status = self.tracker.apply_score(gift, affinity.score)?;
        Ok(EvaluationResult {
            score: affinity.score,
            reason: affinity.reason,
            matched: affinity.matched,
            new_level: status.level,
            is_over: status.is_over,
            outcome: status.outcome,
        })
    }

    pub fn status(&self) -> StatusSnapshot {
        self.tracker.status()
    }

    /// Start a new game.  Preferences are kept.
    pub fn reset_game(&mut self) {
        self.tracker.reset();
    }

    /// Add a preference from loosely typed input.
    ///
    /// # Errors
    ///
    /// [`DodaError::InvalidCategory`] for an unknown category and
    /// [`DodaError::InvalidPreference`] for an empty or duplicate keyword or a
    /// score whose sign contradicts the category.  The table is unchanged on
    /// error.
    pub fn add_preference(
        &mut self,
        category: &str,
        keyword: &str,
        score: i32,
        reason: &str,
    ) -> Result<(), DodaError> {
        let category: PreferenceCategory = category.parse()?;
        let entry = PreferenceEntry::new(category, keyword.trim(), score, reason)?;
        self.table.add(entry)
    }

    pub fn preferences(&self) -> &PreferenceTable {
        &self.table
    }

    pub fn history(&self) -> &[GiftRecord] {
        self.tracker.history()
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    /// The most recent persistence failure of either file, if any.
    pub fn last_persist_error(&self) -> Option<&str> {
        self.tracker
            .last_persist_error()
            .or_else(|| self.table.last_persist_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doda_types::Outcome;
    use tempfile::TempDir;

    struct Fixed(i32);
    impl ScoringStrategy for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn score(&self, _: &ObjectAttributes, _: &PreferenceTable) -> Affinity {
            Affinity {
                score: self.0,
                reason: "fixed".to_string(),
                matched: vec![],
            }
        }
    }

    #[test]
    fn evaluate_object_combines_score_and_status() {
        let mut s = GameSession::in_memory(Thresholds::classic());
        let r = s
            .evaluate_object(&ObjectAttributes::generic("a tiny bird nest"))
            .unwrap();
        assert_eq!(r.score, 8);
        assert_eq!(r.reason, "Perfect for resting!");
        assert_eq!(r.matched, vec!["nest".to_string()]);
        assert_eq!(r.new_level, 8);
        assert!(!r.is_over);
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn neutral_gift_is_still_recorded() {
        let mut s = GameSession::in_memory(Thresholds::classic());
        let r = s
            .evaluate_object(&ObjectAttributes::generic("a grey pebble"))
            .unwrap();
        assert_eq!(r.score, 0);
        assert_eq!(s.status().gift_count, 1);
    }

    #[test]
    fn dodos_win_the_quick_game() {
        let mut s = GameSession::in_memory(Thresholds::quick());
        let dodo = ObjectAttributes::dodo("plush dodo", "large", "rainbow");
        let r = s.evaluate_object(&dodo).unwrap();
        assert_eq!(r.score, 14);
        let r = s.evaluate_object(&dodo).unwrap();
        assert_eq!(r.outcome, Outcome::Won);

        let err = s.evaluate_object(&dodo).unwrap_err();
        assert_eq!(err, DodaError::SessionOver(Outcome::Won));
        assert_eq!(s.status().level, 28);
    }

    #[test]
    fn reset_game_reopens_play() {
        let mut s = GameSession::in_memory(Thresholds::quick());
        s.evaluate_object(&ObjectAttributes::generic("predator")).unwrap();
        assert!(s.status().is_over);
        s.reset_game();
        assert!(!s.status().is_over);
        assert!(s.evaluate_object(&ObjectAttributes::generic("toy")).is_ok());
    }

    #[test]
    fn external_affinity_is_clamped() {
        let mut s = GameSession::in_memory(Thresholds::classic());
        let r = s
            .apply_affinity(
                &ObjectAttributes::generic("volcano"),
                Affinity {
                    score: -50,
                    reason: "too hot".to_string(),
                    matched: vec![],
                },
            )
            .unwrap();
        assert_eq!(r.score, -10);
        assert_eq!(s.status().level, -10);
    }

    #[test]
    fn custom_scorer_is_used_and_clamped() {
        let mut s = GameSession::in_memory(Thresholds::classic()).with_scorer(Box::new(Fixed(99)));
        let r = s.evaluate_object(&ObjectAttributes::generic("x")).unwrap();
        assert_eq!(r.score, 15);
        assert_eq!(s.scorer_name(), "fixed");
    }

    #[test]
    fn add_preference_validates_category() {
        let mut s = GameSession::in_memory(Thresholds::classic());
        let before = s.preferences().len();

        let err = s.add_preference("adores", "worm", 5, "yum").unwrap_err();
        assert_eq!(err, DodaError::InvalidCategory("adores".to_string()));
        assert!(s.add_preference("loves", "worm", -5, "yum").is_err());
        assert!(matches!(
            s.add_preference("loves", "worm", 50, "yum"),
            Err(DodaError::InvalidPreference { .. })
        ));
        assert_eq!(s.preferences().len(), before);

        s.add_preference("Likes", "worm", 5, "Wiggly snack!").unwrap();
        let r = s.evaluate_object(&ObjectAttributes::generic("a worm")).unwrap();
        assert_eq!(r.score, 5);
        assert_eq!(r.reason, "Wiggly snack!");
    }

    #[test]
    fn open_persists_both_files_and_restores_them() {
        let dir = TempDir::new().unwrap();
        let config = GameConfig::in_dir(dir.path(), Thresholds::classic());

        let mut s = GameSession::open(&config);
        s.add_preference("hate", "vacuum", -7, "The noise!").unwrap();
        s.evaluate_object(&ObjectAttributes::generic("a vacuum cleaner")).unwrap();
        assert!(s.last_persist_error().is_none());

        let back = GameSession::open(&config);
        assert_eq!(back.status().level, -7);
        assert_eq!(back.history()[0].description, "a vacuum cleaner");
        assert_eq!(back.preferences().len(), 19);
    }
}
