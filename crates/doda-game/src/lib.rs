//! `doda-game` – the gift game itself.
//!
//! A presented gift flows through three pieces:
//!
//! 1. [`PreferenceTable`][preferences::PreferenceTable] – keyword rules
//!    grouped by love / like / dislike / hate, persisted as JSON.
//! 2. [`ScoringStrategy`][scorer::ScoringStrategy] – turns
//!    [`ObjectAttributes`][doda_types::ObjectAttributes] into a bounded
//!    [`Affinity`][doda_types::Affinity].  [`KeywordScorer`][scorer::KeywordScorer]
//!    is the deterministic default.
//! 3. [`GratificationTracker`][tracker::GratificationTracker] – accumulates
//!    affinities into Doda's mood, decides win or loss and writes every change
//!    through to disk.
//!
//! [`GameSession`][session::GameSession] owns one of each and is the only
//! type the outside world needs.
//!
//! # Example
//!
//! ```rust
//! use doda_game::{GameSession, Thresholds};
//! use doda_types::{ObjectAttributes, Outcome};
//!
//! let mut session = GameSession::in_memory(Thresholds::quick());
//! let result = session
//!     .evaluate_object(&ObjectAttributes::generic("a speckled egg"))
//!     .unwrap();
//! assert_eq!(result.score, 9);
//! assert_eq!(result.outcome, Outcome::None);
//! ```

pub mod config;
pub mod preferences;
pub mod scorer;
pub mod session;
pub mod store;
pub mod tracker;

pub use config::{GameConfig, Thresholds};
pub use preferences::PreferenceTable;
pub use scorer::{KeywordScorer, NEUTRAL_REASON, ScoringStrategy, SpecialClassRules};
pub use session::GameSession;
pub use store::StoreError;
pub use tracker::GratificationTracker;
