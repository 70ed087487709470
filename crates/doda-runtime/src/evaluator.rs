//! Optional second stage: let a model judge the gift against the preferences.
//!
//! The deterministic [`KeywordScorer`][doda_game::KeywordScorer] stays the
//! reference.  An [`AffinityEvaluator`] may be plugged into the gift loop;
//! when it fails or times out the loop falls back to the keyword score.

use async_trait::async_trait;
use doda_game::PreferenceTable;
use doda_types::{Affinity, DodaError, ObjectAttributes, PreferenceCategory};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::llm_driver::{ChatMessage, LlmDriver, strip_code_fences};

const PERSONA: &str = "You are Doda, a curious dodo bird robot. You judge gifts people show you \
                       against your own preferences.";

const SCORING_GUIDELINES: &str = "\
SCORING GUIDELINES:
- Loves (+8 to +10): keywords match the \"loves\" category
- Likes (+4 to +7): keywords match the \"likes\" category
- Dislikes (-3 to -5): keywords match the \"dislikes\" category
- Hates (-8 to -10): keywords match the \"hates\" category
- SPECIAL: dodo birds can exceed +10 if they have large, colorful beaks (up to +15)
- Multiple matches: the strongest feeling wins
- No matches: 0 (neutral)

EXPLANATION GUIDELINES:
- Speak as Doda (\"I\", \"me\", \"my\")
- Be enthusiastic about good gifts and expressive about bad ones
- Mention the features that triggered the reaction
- One or two sentences";

/// A second-opinion scorer for a classified gift.
#[async_trait]
pub trait AffinityEvaluator: Send + Sync {
    fn name(&self) -> &str;

    /// Score `gift` with `table` as context.
    ///
    /// # Errors
    ///
    /// [`DodaError::ClassifierFailed`] when no usable score is produced.
    async fn evaluate(
        &self,
        gift: &ObjectAttributes,
        table: &PreferenceTable,
    ) -> Result<Affinity, DodaError>;
}

/// Expected shape of the model's verdict.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct Verdict {
    pub affinity_score: f64,
    pub explanation: String,
    #[serde(default)]
    pub matched_preferences: Vec<String>,
}

impl From<Verdict> for Affinity {
    fn from(v: Verdict) -> Self {
        Affinity {
            score: v.affinity_score.round() as i32,
            reason: v.explanation,
            matched: v.matched_preferences,
        }
        .clamped()
    }
}

/// Render the preference table the way the model sees it.
pub fn preferences_json(table: &PreferenceTable) -> Value {
    let mut out = serde_json::Map::new();
    for category in PreferenceCategory::ALL {
        let entries: Vec<Value> = table
            .category(category)
            .iter()
            .map(|e| json!({ "keyword": e.keyword, "score": e.score, "reason": e.reason }))
            .collect();
        out.insert(category.file_key().to_string(), Value::Array(entries));
    }
    Value::Object(out)
}

/// Parse the model reply into a clamped [`Affinity`].
///
/// # Errors
///
/// [`DodaError::ClassifierFailed`] when the reply is not a verdict.
pub fn parse_verdict(reply: &str) -> Result<Affinity, DodaError> {
    let verdict: Verdict = serde_json::from_str(strip_code_fences(reply))
        .map_err(|e| DodaError::ClassifierFailed(format!("unparsable verdict: {e}")))?;
    if !verdict.affinity_score.is_finite() {
        return Err(DodaError::ClassifierFailed("non-finite affinity score".to_string()));
    }
    Ok(verdict.into())
}

/// [`AffinityEvaluator`] backed by a chat model.
pub struct ReasoningEvaluator {
    llm: LlmDriver,
}

impl ReasoningEvaluator {
    pub fn new(llm: LlmDriver) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AffinityEvaluator for ReasoningEvaluator {
    fn name(&self) -> &str {
        "reasoning"
    }

    async fn evaluate(
        &self,
        gift: &ObjectAttributes,
        table: &PreferenceTable,
    ) -> Result<Affinity, DodaError> {
        let gift_json = serde_json::to_string_pretty(gift)
            .map_err(|e| DodaError::ClassifierFailed(e.to_string()))?;
        let prefs_json = serde_json::to_string_pretty(&preferences_json(table))
            .map_err(|e| DodaError::ClassifierFailed(e.to_string()))?;
        let prompt = format!(
            "GIFT DESCRIPTION:\n{gift_json}\n\nYOUR PREFERENCES:\n{prefs_json}\n\n\
             Return {{\"affinity_score\": <-10..15>, \"explanation\": \"...\", \
             \"matched_preferences\": [\"...\"]}}\n\n{SCORING_GUIDELINES}"
        );
        let schema = serde_json::to_value(schema_for!(Verdict)).unwrap_or(Value::Null);

        let reply = self
            .llm
            .complete(
                &[ChatMessage::system(PERSONA), ChatMessage::user(prompt)],
                Some(("verdict", schema)),
            )
            .await
            .map_err(|e| {
                warn!(error = %e, "reasoning request failed");
                DodaError::ClassifierFailed(e.to_string())
            })?;

        let affinity = parse_verdict(&reply)?;
        debug!(score = affinity.score, "reasoning verdict");
        Ok(affinity)
    }
}
