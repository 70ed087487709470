//! [`GiftLoop`] – one gift, start to finish.
//!
//! Each turn runs:
//!
//! 1. **Capture** – grab a frame from the camera (blocking driver call on the
//!    blocking pool, bounded by the configured timeout).
//! 2. **Classify** – hand the frame to the [`ObjectClassifier`] (bounded by
//!    the same timeout).
//! 3. **Score** – ask the optional [`AffinityEvaluator`]; on failure, or when
//!    none is configured, use the session's deterministic scorer.
//! 4. **Apply** – feed the affinity to the [`GameSession`].
//! 5. **React** – play a behavior matching the result.
//!
//! A failure in step 1 or 2 ends the turn as [`TurnOutcome::Unavailable`]
//! without touching the session: no score is applied and nothing is added
//! to the history.
//!
//! The loop owns the session, so there is exactly one writer.  Hardware is
//! shared behind a mutex because driver calls run on the blocking pool.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use doda_game::GameSession;
use doda_hal::{CameraFrame, HardwareRegistry};
use doda_types::{
    Affinity, BehaviorKind, DodaError, EvaluationResult, ObjectAttributes, Outcome, RobotIntent,
    TurnDirection,
};
use serde_json::json;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::classifier::ObjectClassifier;
use crate::evaluator::AffinityEvaluator;

/// Configuration bundle for [`GiftLoop`].
#[derive(Debug, Clone)]
pub struct GiftLoopConfig {
    /// Upper bound for capture, classification and evaluation, each.
    pub timeout: Duration,
    /// Camera to capture from; `None` uses the first registered camera.
    pub camera_id: Option<String>,
    /// Where gift photos and their JSON descriptions are kept, if anywhere.
    pub snapshot_dir: Option<PathBuf>,
    /// Play a reaction behavior after each scored turn.
    pub react: bool,
}

impl Default for GiftLoopConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            camera_id: None,
            snapshot_dir: None,
            react: true,
        }
    }
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The gift was scored and applied.
    Scored {
        gift: ObjectAttributes,
        result: EvaluationResult,
        /// `"keyword"` or the evaluator's name.
        scorer: String,
        reaction: Option<BehaviorKind>,
    },
    /// Capture or classification failed; nothing was applied.
    Unavailable { reason: String },
    /// The game is already won or lost.
    SessionOver(Outcome),
}

/// Reaction for a scored turn.  Reaching a terminal state overrides the
/// score-based choice.
pub fn reaction_for(result: &EvaluationResult) -> BehaviorKind {
    match result.outcome {
        Outcome::Won => BehaviorKind::Woo,
        Outcome::Lost => BehaviorKind::Dismay,
        Outcome::None => match result.score {
            7.. => BehaviorKind::Pleased,
            3..=6 => BehaviorKind::HeadBob,
            0..=2 => BehaviorKind::Idle,
            _ => BehaviorKind::Dismay,
        },
    }
}

pub struct GiftLoop {
    session: GameSession,
    hardware: Arc<Mutex<HardwareRegistry>>,
    classifier: Box<dyn ObjectClassifier>,
    evaluator: Option<Box<dyn AffinityEvaluator>>,
    config: GiftLoopConfig,
}

impl GiftLoop {
    pub fn new(
        session: GameSession,
        hardware: HardwareRegistry,
        classifier: Box<dyn ObjectClassifier>,
        config: GiftLoopConfig,
    ) -> Self {
        Self {
            session,
            hardware: Arc::new(Mutex::new(hardware)),
            classifier,
            evaluator: None,
            config,
        }
    }

    /// Use `evaluator` as the first-choice scorer.
    pub fn with_evaluator(mut self, evaluator: Box<dyn AffinityEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut self.session
    }

    /// Shared handle to the hardware, e.g. for an emergency hold.
    pub fn hardware(&self) -> Arc<Mutex<HardwareRegistry>> {
        Arc::clone(&self.hardware)
    }

    /// Capture, classify, score and react to the gift in front of the camera.
    pub async fn present_gift(&mut self) -> TurnOutcome {
        let status = self.session.status();
        if status.is_over {
            return TurnOutcome::SessionOver(status.outcome);
        }

        match self.observe().await {
            Ok((gift, photo_path)) => self.evaluate_gift(gift, photo_path).await,
            Err(e) => {
                warn!(error = %e, "gift unavailable; no score applied");
                TurnOutcome::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Capture a frame and classify it, without scoring.
    ///
    /// # Errors
    ///
    /// [`DodaError::CaptureFailure`] when the camera fails or times out,
    /// [`DodaError::ClassifierFailed`] when classification fails or times out.
    pub async fn capture_object(&self) -> Result<ObjectAttributes, DodaError> {
        self.observe().await.map(|(gift, _)| gift)
    }

    async fn observe(&self) -> Result<(ObjectAttributes, Option<PathBuf>), DodaError> {
        let frame = self.capture().await?;
        let photo_path = self.save_photo(&frame);

        let gift = timeout(self.config.timeout, self.classifier.classify(&frame))
            .await
            .map_err(|_| {
                DodaError::ClassifierFailed(format!(
                    "classification timed out after {:?}",
                    self.config.timeout
                ))
            })??;
        debug!(classifier = self.classifier.name(), kind = %gift.kind, "gift observed");
        Ok((gift, photo_path))
    }

    /// Score and apply an already-classified gift (typed in by hand, or
    /// produced by [`present_gift`][Self::present_gift]).
    pub async fn evaluate_gift(&mut self, gift: ObjectAttributes, photo_path: Option<PathBuf>) -> TurnOutcome {
        let status = self.session.status();
        if status.is_over {
            return TurnOutcome::SessionOver(status.outcome);
        }

        let (affinity, scorer) = self.affinity_for(&gift).await;
        let result = match self.session.apply_affinity(&gift, affinity.clone()) {
            Ok(result) => result,
            Err(DodaError::SessionOver(outcome)) => return TurnOutcome::SessionOver(outcome),
            Err(e) => {
                return TurnOutcome::Unavailable {
                    reason: e.to_string(),
                };
            }
        };
        info!(
            score = result.score,
            level = result.new_level,
            outcome = %result.outcome,
            scorer = %scorer,
            "gift evaluated"
        );
        self.save_description(&gift, &affinity, photo_path);

        let reaction = if self.config.react {
            let kind = reaction_for(&result);
            self.run_behavior(kind).await;
            Some(kind)
        } else {
            None
        };

        TurnOutcome::Scored {
            gift,
            result,
            scorer,
            reaction,
        }
    }

    async fn affinity_for(&self, gift: &ObjectAttributes) -> (Affinity, String) {
        if let Some(evaluator) = &self.evaluator {
            let table = self.session.preferences();
            match timeout(self.config.timeout, evaluator.evaluate(gift, table)).await {
                Ok(Ok(affinity)) => return (affinity.clamped(), evaluator.name().to_string()),
                Ok(Err(e)) => warn!(error = %e, "evaluator failed; using keyword score"),
                Err(_) => warn!("evaluator timed out; using keyword score"),
            }
        }
        (self.session.score(gift), self.session.scorer_name().to_string())
    }

    async fn capture(&self) -> Result<CameraFrame, DodaError> {
        let hardware = Arc::clone(&self.hardware);
        let camera_id = self.config.camera_id.clone();
        let job = tokio::task::spawn_blocking(move || lock(&hardware)?.capture(camera_id.as_deref()));
        match timeout(self.config.timeout, job).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(DodaError::CaptureFailure(format!("capture task failed: {join}"))),
            Err(_) => Err(DodaError::CaptureFailure(format!(
                "capture timed out after {:?}",
                self.config.timeout
            ))),
        }
    }

    /// Dispatch `intent` on the blocking pool and wait for it.
    ///
    /// # Errors
    ///
    /// Whatever the registry reports, or [`DodaError::HardwareFault`] if the
    /// task itself fails.
    pub async fn dispatch(&self, intent: RobotIntent) -> Result<(), DodaError> {
        let hardware = Arc::clone(&self.hardware);
        tokio::task::spawn_blocking(move || lock(&hardware)?.dispatch(intent))
            .await
            .map_err(|e| DodaError::HardwareFault {
                component: "registry".to_string(),
                details: format!("hardware task failed: {e}"),
            })?
    }

    /// Play `kind`.  Failures are logged, never returned.
    pub async fn run_behavior(&self, kind: BehaviorKind) {
        if let Err(e) = self.dispatch(RobotIntent::PerformBehavior(kind)).await {
            warn!(behavior = %kind, error = %e, "behavior failed");
        }
    }

    /// Turn the base and come back; returns the signed angle turned.
    ///
    /// # Errors
    ///
    /// [`DodaError::HardwareFault`] for an out-of-range angle or a missing
    /// drive base.
    pub async fn rotate(&self, degrees: f32, direction: TurnDirection) -> Result<f32, DodaError> {
        let hardware = Arc::clone(&self.hardware);
        tokio::task::spawn_blocking(move || lock(&hardware)?.rotate_base(degrees, direction))
            .await
            .map_err(|e| DodaError::HardwareFault {
                component: "drive_base".to_string(),
                details: format!("hardware task failed: {e}"),
            })?
    }

    /// Current joint angles in degrees.
    ///
    /// # Errors
    ///
    /// [`DodaError::HardwareFault`] if the registry lock is poisoned.
    pub fn joint_positions(&self) -> Result<BTreeMap<String, f32>, DodaError> {
        Ok(lock(&self.hardware)?.joint_positions())
    }

    fn save_photo(&self, frame: &CameraFrame) -> Option<PathBuf> {
        let dir = self.config.snapshot_dir.as_ref()?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let path = dir.join(format!("gift_{stamp}.{}", frame.extension()));
        let written = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, &frame.data));
        match written {
            Ok(()) => Some(path),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "could not save gift photo");
                None
            }
        }
    }

    fn save_description(&self, gift: &ObjectAttributes, affinity: &Affinity, photo: Option<PathBuf>) {
        let Some(dir) = &self.config.snapshot_dir else {
            return;
        };
        let now = Utc::now();
        let dir = dir.join("image_descriptions");
        let path = dir.join(format!("gift_{}.json", now.format("%Y%m%d_%H%M%S%.3f")));
        let record = json!({
            "timestamp": now.to_rfc3339(),
            "attributes": gift,
            "affinity": {
                "score": affinity.score,
                "reason": affinity.reason,
                "matched": affinity.matched,
            },
            "photo_path": photo.map(|p| p.display().to_string()),
        });
        let written = serde_json::to_vec_pretty(&record)
            .map_err(std::io::Error::other)
            .and_then(|bytes| {
                std::fs::create_dir_all(&dir)?;
                std::fs::write(&path, bytes)
            });
        if let Err(e) = written {
            warn!(error = %e, path = %path.display(), "could not save gift description");
        }
    }
}

fn lock(hardware: &Mutex<HardwareRegistry>) -> Result<MutexGuard<'_, HardwareRegistry>, DodaError> {
    hardware.lock().map_err(|_| DodaError::HardwareFault {
        component: "registry".to_string(),
        details: "hardware registry lock poisoned".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use doda_game::{PreferenceTable, Thresholds};
    use doda_hal::{SimCamera, SimRegistry};
    use tempfile::TempDir;

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    struct FixedClassifier(ObjectAttributes);

    #[async_trait]
    impl ObjectClassifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn classify(&self, _: &CameraFrame) -> Result<ObjectAttributes, DodaError> {
            Ok(self.0.clone())
        }
    }

    struct FailingClassifier;

    #[async_trait]
    impl ObjectClassifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }
        async fn classify(&self, _: &CameraFrame) -> Result<ObjectAttributes, DodaError> {
            Err(DodaError::ClassifierFailed("model offline".to_string()))
        }
    }

    struct SlowClassifier;

    #[async_trait]
    impl ObjectClassifier for SlowClassifier {
        fn name(&self) -> &str {
            "slow"
        }
        async fn classify(&self, _: &CameraFrame) -> Result<ObjectAttributes, DodaError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ObjectAttributes::generic("egg"))
        }
    }

    struct FixedEvaluator(Result<i32, ()>);

    #[async_trait]
    impl AffinityEvaluator for FixedEvaluator {
        fn name(&self) -> &str {
            "fixed-eval"
        }
        async fn evaluate(&self, _: &ObjectAttributes, _: &PreferenceTable) -> Result<Affinity, DodaError> {
            match self.0 {
                Ok(score) => Ok(Affinity {
                    score,
                    reason: "model says so".to_string(),
                    matched: vec![],
                }),
                Err(()) => Err(DodaError::ClassifierFailed("no verdict".to_string())),
            }
        }
    }

    fn sim_hardware() -> HardwareRegistry {
        SimRegistry::new()
            .with_so101_arm()
            .with_drive_base()
            .with_camera_driver(SimCamera::with_image("beak_cam", "image/jpeg", vec![0xFF, 0xD8]))
            .build()
    }

    fn gift_loop(classifier: Box<dyn ObjectClassifier>, thresholds: Thresholds) -> GiftLoop {
        let config = GiftLoopConfig {
            timeout: Duration::from_millis(200),
            ..GiftLoopConfig::default()
        };
        GiftLoop::new(GameSession::in_memory(thresholds), sim_hardware(), classifier, config)
    }

    fn result(score: i32, outcome: Outcome) -> EvaluationResult {
        EvaluationResult {
            score,
            reason: String::new(),
            matched: vec![],
            new_level: score,
            is_over: outcome.is_terminal(),
            outcome,
        }
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[test]
    fn reaction_policy_follows_score_bands() {
        assert_eq!(reaction_for(&result(14, Outcome::None)), BehaviorKind::Pleased);
        assert_eq!(reaction_for(&result(7, Outcome::None)), BehaviorKind::Pleased);
        assert_eq!(reaction_for(&result(6, Outcome::None)), BehaviorKind::HeadBob);
        assert_eq!(reaction_for(&result(3, Outcome::None)), BehaviorKind::HeadBob);
        assert_eq!(reaction_for(&result(0, Outcome::None)), BehaviorKind::Idle);
        assert_eq!(reaction_for(&result(-1, Outcome::None)), BehaviorKind::Dismay);
        assert_eq!(reaction_for(&result(-10, Outcome::None)), BehaviorKind::Dismay);
        assert_eq!(reaction_for(&result(2, Outcome::Won)), BehaviorKind::Woo);
        assert_eq!(reaction_for(&result(9, Outcome::Lost)), BehaviorKind::Dismay);
    }

    #[tokio::test]
    async fn present_gift_scores_and_reacts() {
        let classifier = FixedClassifier(ObjectAttributes::generic("a speckled egg"));
        let mut gl = gift_loop(Box::new(classifier), Thresholds::classic());

        let TurnOutcome::Scored { result, scorer, reaction, .. } = gl.present_gift().await else {
            panic!("expected a scored turn");
        };
        assert_eq!(result.score, 9);
        assert_eq!(scorer, "keyword");
        assert_eq!(reaction, Some(BehaviorKind::Pleased));
        assert_eq!(gl.session().history().len(), 1);
        // Behaviors return to the start pose.
        assert!(gl.joint_positions().unwrap().values().all(|p| *p == 0.0));
    }

    #[tokio::test]
    async fn winning_turn_plays_woo() {
        let classifier = FixedClassifier(ObjectAttributes::dodo("dodo", "large", "rainbow"));
        let mut gl = gift_loop(Box::new(classifier), Thresholds::quick());
        gl.present_gift().await;
        let TurnOutcome::Scored { result, reaction, .. } = gl.present_gift().await else {
            panic!("expected a scored turn");
        };
        assert_eq!(result.outcome, Outcome::Won);
        assert_eq!(reaction, Some(BehaviorKind::Woo));

        assert_eq!(gl.present_gift().await, TurnOutcome::SessionOver(Outcome::Won));
        assert_eq!(gl.session().history().len(), 2);
    }

    #[tokio::test]
    async fn classifier_failure_applies_nothing() {
        let mut gl = gift_loop(Box::new(FailingClassifier), Thresholds::classic());
        let outcome = gl.present_gift().await;
        assert!(matches!(outcome, TurnOutcome::Unavailable { .. }));
        assert_eq!(gl.session().status().gift_count, 0);
        assert_eq!(gl.session().status().level, 0);
    }

    #[tokio::test]
    async fn capture_object_does_not_score() {
        let classifier = FixedClassifier(ObjectAttributes::generic("a speckled egg"));
        let gl = gift_loop(Box::new(classifier), Thresholds::classic());
        let gift = gl.capture_object().await.unwrap();
        assert_eq!(gift.description, "a speckled egg");
        assert!(gl.session().history().is_empty());

        let failing = gift_loop(Box::new(FailingClassifier), Thresholds::classic());
        assert!(matches!(
            failing.capture_object().await,
            Err(DodaError::ClassifierFailed(_))
        ));
    }

    #[tokio::test]
    async fn slow_classifier_times_out() {
        let mut gl = gift_loop(Box::new(SlowClassifier), Thresholds::classic());
        let TurnOutcome::Unavailable { reason } = gl.present_gift().await else {
            panic!("expected an unavailable turn");
        };
        assert!(reason.contains("timed out"));
        assert!(gl.session().history().is_empty());
    }

    #[tokio::test]
    async fn missing_camera_is_unavailable() {
        let hardware = SimRegistry::new().with_so101_arm().build();
        let mut gl = GiftLoop::new(
            GameSession::in_memory(Thresholds::classic()),
            hardware,
            Box::new(FixedClassifier(ObjectAttributes::generic("egg"))),
            GiftLoopConfig::default(),
        );
        assert!(matches!(gl.present_gift().await, TurnOutcome::Unavailable { .. }));
        assert_eq!(gl.session().status().gift_count, 0);
    }

    #[tokio::test]
    async fn evaluator_score_is_used_when_available() {
        let classifier = FixedClassifier(ObjectAttributes::generic("a speckled egg"));
        let mut gl = gift_loop(Box::new(classifier), Thresholds::classic())
            .with_evaluator(Box::new(FixedEvaluator(Ok(40))));
        let TurnOutcome::Scored { result, scorer, .. } = gl.present_gift().await else {
            panic!("expected a scored turn");
        };
        assert_eq!(result.score, 15);
        assert_eq!(result.reason, "model says so");
        assert_eq!(scorer, "fixed-eval");
    }

    #[tokio::test]
    async fn failing_evaluator_falls_back_to_keywords() {
        let classifier = FixedClassifier(ObjectAttributes::generic("a snake"));
        let mut gl = gift_loop(Box::new(classifier), Thresholds::classic())
            .with_evaluator(Box::new(FixedEvaluator(Err(()))));
        let TurnOutcome::Scored { result, scorer, reaction, .. } = gl.present_gift().await else {
            panic!("expected a scored turn");
        };
        assert_eq!(result.score, -9);
        assert_eq!(scorer, "keyword");
        assert_eq!(reaction, Some(BehaviorKind::Dismay));
    }

    #[tokio::test]
    async fn snapshot_dir_keeps_photo_and_description() {
        let dir = TempDir::new().unwrap();
        let config = GiftLoopConfig {
            snapshot_dir: Some(dir.path().to_path_buf()),
            react: false,
            ..GiftLoopConfig::default()
        };
        let mut gl = GiftLoop::new(
            GameSession::in_memory(Thresholds::classic()),
            sim_hardware(),
            Box::new(FixedClassifier(ObjectAttributes::generic("a toy"))),
            config,
        );

        let TurnOutcome::Scored { reaction, .. } = gl.present_gift().await else {
            panic!("expected a scored turn");
        };
        assert_eq!(reaction, None);

        let photos: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.path().extension().is_some_and(|x| x == "jpg"))
            .collect();
        assert_eq!(photos.len(), 1);

        let descriptions: Vec<_> = std::fs::read_dir(dir.path().join("image_descriptions"))
            .unwrap()
            .filter_map(Result::ok)
            .collect();
        assert_eq!(descriptions.len(), 1);
        let raw = std::fs::read_to_string(descriptions[0].path()).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["affinity"]["score"], 5);
        assert!(v["photo_path"].as_str().unwrap().ends_with(".jpg"));
    }

    #[tokio::test]
    async fn rotate_and_joint_capture() {
        let gl = gift_loop(Box::new(FailingClassifier), Thresholds::classic());
        let turned = gl.rotate(300.0, TurnDirection::Auto).await.unwrap();
        assert!((turned + 60.0).abs() < 1e-4);
        assert!(gl.rotate(361.0, TurnDirection::Left).await.is_err());

        let joints = gl.joint_positions().unwrap();
        assert!(joints.contains_key("gripper"));
        assert!(joints.contains_key("left_wheel"));
    }

    #[tokio::test]
    async fn behavior_failure_is_swallowed() {
        let hardware = SimRegistry::new().build();
        let gl = GiftLoop::new(
            GameSession::in_memory(Thresholds::classic()),
            hardware,
            Box::new(FailingClassifier),
            GiftLoopConfig::default(),
        );
        // No arm registered: the behavior fails but nothing is raised.
        gl.run_behavior(BehaviorKind::Greeting).await;
        assert!(gl.dispatch(RobotIntent::PerformBehavior(BehaviorKind::Greeting)).await.is_err());
    }
}
