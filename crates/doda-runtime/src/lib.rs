//! `doda-runtime` – everything between the camera and the game.
//!
//! # Modules
//!
//! - [`gift_loop`] – [`GiftLoop`][gift_loop::GiftLoop]: capture, classify,
//!   score, apply and react, one gift per turn.  Capture and classification
//!   failures end the turn without touching the game.
//! - [`classifier`] – the [`ObjectClassifier`][classifier::ObjectClassifier]
//!   seam and a vision-model implementation.
//! - [`evaluator`] – the optional model-backed
//!   [`AffinityEvaluator`][evaluator::AffinityEvaluator]; the deterministic
//!   keyword scorer in `doda-game` remains the fallback.
//! - [`llm_driver`] – [`LlmDriver`][llm_driver::LlmDriver]: an async client
//!   for OpenAI-compatible chat endpoints such as
//!   [Ollama](https://ollama.com).  A JSON Schema is attached through
//!   `response_format` so replies come back as typed JSON.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod classifier;
pub mod evaluator;
pub mod gift_loop;
pub mod llm_driver;
pub mod telemetry;

pub use classifier::{ObjectClassifier, VisionClassifier};
pub use evaluator::{AffinityEvaluator, ReasoningEvaluator};
pub use gift_loop::{GiftLoop, GiftLoopConfig, TurnOutcome, reaction_for};
pub use llm_driver::{ChatMessage, JSON_GUIDELINES, LlmDriver, LlmError, Role};
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
