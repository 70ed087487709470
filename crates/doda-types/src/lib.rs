//! `doda-types` – shared vocabulary of the Doda gift game.
//!
//! Everything that crosses a crate boundary lives here: the preference
//! model, the classifier's [`ObjectAttributes`], the persisted
//! [`GiftRecord`], the read-only [`StatusSnapshot`] and [`EvaluationResult`]
//! projections, the closed set of robot behaviors, and the [`DodaError`]
//! taxonomy.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest affinity a single gift can produce.
pub const MIN_AFFINITY: i32 = -10;
/// Highest affinity a single gift can produce (reserved for exceptional dodos).
pub const MAX_AFFINITY: i32 = 15;
/// Largest magnitude a preference-table entry may carry.
pub const MAX_TABLE_SCORE: i32 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Preferences
// ─────────────────────────────────────────────────────────────────────────────

/// The four preference buckets.  Declaration order is the scoring iteration
/// order (love → like → dislike → hate) and the derived `Ord` follows it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceCategory {
    Love,
    Like,
    Dislike,
    Hate,
}

impl PreferenceCategory {
    /// All categories in scoring order.
    pub const ALL: [PreferenceCategory; 4] = [
        PreferenceCategory::Love,
        PreferenceCategory::Like,
        PreferenceCategory::Dislike,
        PreferenceCategory::Hate,
    ];

    /// Key used for this category in the preference file (`"loves"`, …).
    pub fn file_key(self) -> &'static str {
        match self {
            PreferenceCategory::Love => "loves",
            PreferenceCategory::Like => "likes",
            PreferenceCategory::Dislike => "dislikes",
            PreferenceCategory::Hate => "hates",
        }
    }

    /// `true` when `score` has the polarity this category requires
    /// (love/like ≥ 0, dislike/hate ≤ 0).
    pub fn accepts_score(self, score: i32) -> bool {
        match self {
            PreferenceCategory::Love | PreferenceCategory::Like => score >= 0,
            PreferenceCategory::Dislike | PreferenceCategory::Hate => score <= 0,
        }
    }
}

impl fmt::Display for PreferenceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_key())
    }
}

impl FromStr for PreferenceCategory {
    type Err = DodaError;

    /// Accepts both the singular and the file-key spelling, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "love" | "loves" => Ok(PreferenceCategory::Love),
            "like" | "likes" => Ok(PreferenceCategory::Like),
            "dislike" | "dislikes" => Ok(PreferenceCategory::Dislike),
            "hate" | "hates" => Ok(PreferenceCategory::Hate),
            _ => Err(DodaError::InvalidCategory(s.to_string())),
        }
    }
}

/// A single keyword rule of the preference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceEntry {
    /// Free-text fragment matched case-insensitively against descriptions.
    pub keyword: String,
    pub category: PreferenceCategory,
    pub score: i32,
    /// Doda's first-person reaction, returned verbatim when this entry wins.
    pub reason: String,
}

impl PreferenceEntry {
    /// Build an entry, rejecting an empty keyword, a score outside
    /// `-MAX_TABLE_SCORE..=MAX_TABLE_SCORE` or a score whose sign contradicts
    /// the category.
    pub fn new(
        category: PreferenceCategory,
        keyword: impl Into<String>,
        score: i32,
        reason: impl Into<String>,
    ) -> Result<Self, DodaError> {
        let keyword = keyword.into();
        if keyword.trim().is_empty() {
            return Err(DodaError::InvalidPreference {
                keyword,
                details: "keyword must not be empty".to_string(),
            });
        }
        if !(-MAX_TABLE_SCORE..=MAX_TABLE_SCORE).contains(&score) {
            return Err(DodaError::InvalidPreference {
                keyword,
                details: format!("score {score} is outside -{MAX_TABLE_SCORE}..={MAX_TABLE_SCORE}"),
            });
        }
        if !category.accepts_score(score) {
            return Err(DodaError::InvalidPreference {
                keyword,
                details: format!("score {score} has the wrong sign for category '{category}'"),
            });
        }
        Ok(Self {
            keyword,
            category,
            score,
            reason: reason.into(),
        })
    }

    /// `true` when this entry's keyword occurs in `description_lower`, which
    /// must already be lowercased.
    pub fn matches(&self, description_lower: &str) -> bool {
        description_lower.contains(&self.keyword.to_lowercase())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classifier output
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse object class reported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub enum ObjectKind {
    /// Any ordinary object.
    #[default]
    #[serde(rename = "physical_object")]
    Generic,
    /// Another dodo: scored by the special-class bonus rules.
    #[serde(rename = "dodo_bird")]
    SpecialClass,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectKind::Generic => f.write_str("physical_object"),
            ObjectKind::SpecialClass => f.write_str("dodo_bird"),
        }
    }
}

/// Secondary attributes that only matter for dodo gifts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct SpecialFeatures {
    #[serde(default, alias = "is_dodo_bird")]
    pub is_special_class: bool,
    /// `"small"`, `"medium"`, `"large"` or free text.
    #[serde(default)]
    pub beak_size: String,
    /// Free-text colour description, e.g. `"bright orange"`.
    #[serde(default)]
    pub beak_color: String,
}

/// Structured description of a presented gift, as produced by the external
/// classifier.  Transient: only the [`GiftRecord`] audit entry is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct ObjectAttributes {
    #[serde(rename = "object_type", default)]
    pub kind: ObjectKind,
    pub description: String,
    #[serde(rename = "special_features", default)]
    pub special: SpecialFeatures,
}

impl ObjectAttributes {
    /// An ordinary object known only by its description.
    pub fn generic(description: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Generic,
            description: description.into(),
            special: SpecialFeatures::default(),
        }
    }

    /// A dodo gift with the given beak attributes.
    pub fn dodo(
        description: impl Into<String>,
        beak_size: impl Into<String>,
        beak_color: impl Into<String>,
    ) -> Self {
        Self {
            kind: ObjectKind::SpecialClass,
            description: description.into(),
            special: SpecialFeatures {
                is_special_class: true,
                beak_size: beak_size.into(),
                beak_color: beak_color.into(),
            },
        }
    }

    /// Either the kind or the special flag marks this gift as a dodo.
    pub fn is_special_class(&self) -> bool {
        self.kind == ObjectKind::SpecialClass || self.special.is_special_class
    }
}

/// Result of scoring a single gift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affinity {
    pub score: i32,
    pub reason: String,
    pub matched: Vec<String>,
}

impl Affinity {
    /// Clamp `score` into [`MIN_AFFINITY`]..=[`MAX_AFFINITY`].
    pub fn clamped(mut self) -> Self {
        self.score = self.score.clamp(MIN_AFFINITY, MAX_AFFINITY);
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session state
// ─────────────────────────────────────────────────────────────────────────────

/// Immutable audit entry for one applied gift.  Field names follow the
/// on-disk session format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftRecord {
    /// RFC-3339 time at which the score was applied.
    pub timestamp: String,
    #[serde(rename = "object_type", default)]
    pub kind: ObjectKind,
    pub description: String,
    pub affinity_score: i32,
    #[serde(rename = "gratification_change")]
    pub score_delta: i32,
    #[serde(rename = "total_gratification")]
    pub score_after: i32,
    #[serde(default, alias = "is_dodo_bird")]
    pub is_special_class: bool,
    #[serde(rename = "attribute_a", alias = "beak_size", default)]
    pub beak_size: Option<String>,
    #[serde(rename = "attribute_b", alias = "beak_color", default)]
    pub beak_color: Option<String>,
}

impl GiftRecord {
    /// Snapshot `gift` after `delta` moved the level to `score_after`.
    /// Beak attributes are only kept for dodo gifts.
    pub fn new(gift: &ObjectAttributes, delta: i32, score_after: i32) -> Self {
        let special = gift.is_special_class();
        Self {
            timestamp: Utc::now().to_rfc3339(),
            kind: gift.kind,
            description: gift.description.clone(),
            affinity_score: delta,
            score_delta: delta,
            score_after,
            is_special_class: special,
            beak_size: special.then(|| gift.special.beak_size.clone()),
            beak_color: special.then(|| gift.special.beak_color.clone()),
        }
    }
}

/// Terminal result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[default]
    None,
    Won,
    Lost,
}

impl Outcome {
    /// `true` for [`Outcome::Won`] and [`Outcome::Lost`].
    pub fn is_terminal(self) -> bool {
        self != Outcome::None
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::None => f.write_str("in progress"),
            Outcome::Won => f.write_str("won"),
            Outcome::Lost => f.write_str("lost"),
        }
    }
}

/// Read-only projection of the gratification tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub level: i32,
    pub is_over: bool,
    pub outcome: Outcome,
    pub gift_count: usize,
    pub win_threshold: i32,
    pub lose_threshold: i32,
}

/// Combined result of one scored turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub score: i32,
    pub reason: String,
    pub matched: Vec<String>,
    pub new_level: i32,
    pub is_over: bool,
    pub outcome: Outcome,
}

// ─────────────────────────────────────────────────────────────────────────────
// Behaviors and intents
// ─────────────────────────────────────────────────────────────────────────────

/// Closed set of expressive movements Doda can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorKind {
    Greeting,
    HeadBob,
    Curious,
    Pleased,
    Woo,
    Dismay,
    Idle,
}

impl BehaviorKind {
    pub const ALL: [BehaviorKind; 7] = [
        BehaviorKind::Greeting,
        BehaviorKind::HeadBob,
        BehaviorKind::Curious,
        BehaviorKind::Pleased,
        BehaviorKind::Woo,
        BehaviorKind::Dismay,
        BehaviorKind::Idle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BehaviorKind::Greeting => "greeting",
            BehaviorKind::HeadBob => "head_bob",
            BehaviorKind::Curious => "curious",
            BehaviorKind::Pleased => "pleased",
            BehaviorKind::Woo => "woo",
            BehaviorKind::Dismay => "dismay",
            BehaviorKind::Idle => "idle",
        }
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BehaviorKind {
    type Err = DodaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        BehaviorKind::ALL
            .into_iter()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| DodaError::UnknownBehavior(s.to_string()))
    }
}

/// Direction for a base rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TurnDirection {
    Left,
    Right,
    /// Shortest path.
    #[default]
    Auto,
}

impl FromStr for TurnDirection {
    type Err = DodaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(TurnDirection::Left),
            "right" => Ok(TurnDirection::Right),
            "auto" => Ok(TurnDirection::Auto),
            _ => Err(DodaError::HardwareFault {
                component: "drive_base".to_string(),
                details: format!("unknown turn direction '{s}'"),
            }),
        }
    }
}

/// Physical actions the presentation or decision layer may request.
/// `doda-hal` translates these into actuator commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "action", content = "payload")]
pub enum RobotIntent {
    /// Play one of the behavior presets.
    PerformBehavior(BehaviorKind),
    /// Turn the wheeled base by `degrees`, then return to the start heading.
    RotateBase {
        degrees: f32,
        direction: TurnDirection,
    },
    /// Move a single joint to an absolute angle in degrees.
    ActuateJoint { joint_id: String, target_deg: f32 },
    /// Command every actuator to hold its current position.
    HoldPosition,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error taxonomy shared by every Doda crate.  None of these is fatal to the
/// process.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DodaError {
    #[error("Capture failed: {0}")]
    CaptureFailure(String),

    #[error("Invalid preference category: '{0}' (expected loves, likes, dislikes or hates)")]
    InvalidCategory(String),

    #[error("Invalid preference '{keyword}': {details}")]
    InvalidPreference { keyword: String, details: String },

    #[error("The game is already over ({0}); reset to play again")]
    SessionOver(Outcome),

    #[error("Persistence warning: {0}")]
    Persistence(String),

    #[error("Classifier error: {0}")]
    ClassifierFailed(String),

    #[error("Unknown behavior: '{0}'")]
    UnknownBehavior(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },
}
