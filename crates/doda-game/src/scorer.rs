//! Affinity scoring.
//!
//! [`ScoringStrategy`] is the seam where a gift becomes a number.  The
//! deterministic [`KeywordScorer`] is the default and the reference
//! behavior; a model-backed evaluator can replace it as long as it honours
//! the same contract.
//!
//! # Rules
//!
//! **Dodos** (special class) start from a base score and collect bonuses for
//! the beak: a size tier first, then the first colour tier whose keywords
//! occur in the colour description.  The result is capped (15 by default),
//! the only way a gift can exceed +10.
//!
//! **Everything else** is matched against the preference table.  Among all
//! matching entries the one with the largest absolute score wins, so one
//! strong negative is never drowned out by several mild positives.  Ties go
//! to the first match in love → like → dislike → hate order, then table
//! order.

use doda_types::{Affinity, MAX_AFFINITY, MIN_AFFINITY, ObjectAttributes, SpecialFeatures};
use serde::{Deserialize, Serialize};

use crate::preferences::PreferenceTable;

/// Reason returned when nothing in the table matches.
pub const NEUTRAL_REASON: &str = "Hmm, I'm not sure how I feel about this...";

/// Turns a gift into an [`Affinity`].
pub trait ScoringStrategy: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Score `gift` against `table`.  Must not mutate anything.
    fn score(&self, gift: &ObjectAttributes, table: &PreferenceTable) -> Affinity;
}

/// One beak-size tier, matched exactly (case-insensitive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeTier {
    pub term: String,
    pub bonus: i32,
    pub clause: String,
}

/// A group of colour words sharing one bonus, matched as substrings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorTier {
    pub terms: Vec<String>,
    pub bonus: i32,
    pub clause: String,
}

/// Tunable numbers of the dodo bonus rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialClassRules {
    pub base_score: i32,
    pub base_reason: String,
    /// At most one tier applies.
    pub size_tiers: Vec<SizeTier>,
    /// Checked in order; the first tier with a matching term applies.
    pub color_tiers: Vec<ColorTier>,
    /// Upper bound of the final score.
    pub cap: i32,
}

fn size_tier(term: &str, bonus: i32, clause: &str) -> SizeTier {
    SizeTier {
        term: term.to_string(),
        bonus,
        clause: clause.to_string(),
    }
}

fn color_tier(terms: &[&str], bonus: i32, clause: &str) -> ColorTier {
    ColorTier {
        terms: terms.iter().map(|t| t.to_string()).collect(),
        bonus,
        clause: clause.to_string(),
    }
}

impl Default for SpecialClassRules {
    fn default() -> Self {
        Self {
            base_score: 10,
            base_reason: "My own kind! Another dodo!".to_string(),
            size_tiers: vec![
                size_tier("large", 2, "And what a MAGNIFICENT beak!"),
                size_tier("medium", 1, "Nice beak size!"),
                size_tier("small", 0, "Cute little beak!"),
            ],
            color_tiers: vec![
                color_tier(
                    &["colorful", "bright", "vibrant", "rainbow"],
                    2,
                    "Such beautiful colors!",
                ),
                color_tier(&["orange", "yellow", "red"], 1, "Pretty beak color!"),
            ],
            cap: MAX_AFFINITY,
        }
    }
}

/// The deterministic keyword scorer.
#[derive(Debug, Clone, Default)]
pub struct KeywordScorer {
    rules: SpecialClassRules,
}

impl KeywordScorer {
    pub fn new(rules: SpecialClassRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &SpecialClassRules {
        &self.rules
    }

    fn score_special(&self, special: &SpecialFeatures) -> Affinity {
        let rules = &self.rules;
        let size = special.beak_size.trim().to_lowercase();
        let color = special.beak_color.to_lowercase();

        let mut score = rules.base_score;
        let mut clauses = vec![rules.base_reason.as_str()];
        let mut matched = Vec::new();

        if let Some(tier) = rules
            .size_tiers
            .iter()
            .find(|t| t.term.to_lowercase() == size)
        {
            score += tier.bonus;
            clauses.push(&tier.clause);
            matched.push(tier.term.clone());
        }

        for tier in &rules.color_tiers {
            if let Some(term) = tier.terms.iter().find(|t| color.contains(&t.to_lowercase())) {
                score += tier.bonus;
                clauses.push(&tier.clause);
                matched.push(term.clone());
                break;
            }
        }

        Affinity {
            score: score.min(rules.cap).max(MIN_AFFINITY),
            reason: clauses.join(" "),
            matched,
        }
    }

    fn score_generic(description: &str, table: &PreferenceTable) -> Affinity {
        let strongest = table
            .matching(description)
            .into_iter()
            .reduce(|best, e| if e.score.abs() > best.score.abs() { e } else { best });

        match strongest {
            Some(entry) => Affinity {
                score: entry.score,
                reason: entry.reason.clone(),
                matched: vec![entry.keyword.clone()],
            },
            None => Affinity {
                score: 0,
                reason: NEUTRAL_REASON.to_string(),
                matched: Vec::new(),
            },
        }
    }
}

impl ScoringStrategy for KeywordScorer {
    fn name(&self) -> &str {
        "keyword"
    }

    fn score(&self, gift: &ObjectAttributes, table: &PreferenceTable) -> Affinity {
        if gift.is_special_class() {
            self.score_special(&gift.special)
        } else {
            Self::score_generic(&gift.description, table)
        }
    }
}
