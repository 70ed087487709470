//! [`HardwareRegistry`] – central driver registry and intent dispatcher.
//!
//! The registry stores every registered [`Actuator`] and [`Camera`] driver.
//! When the game issues a [`RobotIntent`], the registry resolves the target
//! drivers by identifier and calls the appropriate methods.
//!
//! # Behaviors
//!
//! [`RobotIntent::PerformBehavior`] plays the keyframes of the matching
//! [`BehaviorPreset`][crate::behavior::BehaviorPreset].  All joints the
//! preset needs are checked before the first command is sent, so a missing
//! driver never leaves Doda frozen half-way through a movement.  The start
//! pose is restored after the last keyframe.
//!
//! # Base rotation
//!
//! [`RobotIntent::RotateBase`] drives actuators named `"left_wheel"` and
//! `"right_wheel"` in opposite directions and then returns both wheels to
//! their starting positions, so Doda always ends up facing the gift again.

use std::collections::{BTreeMap, HashMap};
use std::thread;
use std::time::Duration;

use doda_types::{BehaviorKind, DodaError, RobotIntent, TurnDirection};
use tracing::{debug, info};

use crate::actuator::Actuator;
use crate::behavior::{JointTarget, RETURN_HOLD_MS, preset_for};
use crate::camera::{Camera, CameraFrame};

/// Wheel rotation (degrees) needed to yaw the base by one degree.
pub const WHEEL_DEG_PER_BASE_DEG: f32 = 2.5;

/// Time the base needs for a quarter turn at nominal speed.
const QUARTER_TURN_MS: f32 = 1_000.0;

/// Slowest allowed playback: one keyframe millisecond lasts a second.
pub const MAX_TIME_SCALE: f32 = 1_000.0;

/// Central hardware driver registry and [`RobotIntent`] dispatcher.
///
/// Construct with [`HardwareRegistry::new`], register drivers, then call
/// [`HardwareRegistry::dispatch`] to translate intents into hardware calls.
pub struct HardwareRegistry {
    actuators: HashMap<String, Box<dyn Actuator>>,
    cameras: HashMap<String, Box<dyn Camera>>,
    /// Multiplier applied to every keyframe pause; 0 skips sleeping.
    time_scale: f32,
}

impl Default for HardwareRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareRegistry {
    /// Create an empty registry running behaviors in real time.
    pub fn new() -> Self {
        Self {
            actuators: HashMap::new(),
            cameras: HashMap::new(),
            time_scale: 1.0,
        }
    }

    /// Register an actuator driver.  Any previously registered driver with the
    /// same `id` is replaced.
    pub fn register_actuator(&mut self, actuator: Box<dyn Actuator>) {
        self.actuators.insert(actuator.id().to_string(), actuator);
    }

    /// Register a camera driver.  Any previously registered driver with the
    /// same `id` is replaced.
    pub fn register_camera(&mut self, camera: Box<dyn Camera>) {
        self.cameras.insert(camera.id().to_string(), camera);
    }

    /// Scale keyframe pauses (`0.0` = no sleeping, `1.0` = real time).
    /// Negative or NaN scales disable pauses; anything above
    /// [`MAX_TIME_SCALE`] is clamped to it.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = if scale.is_nan() {
            0.0
        } else {
            scale.clamp(0.0, MAX_TIME_SCALE)
        };
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// `true` when at least one camera is registered.
    pub fn has_camera(&self) -> bool {
        !self.cameras.is_empty()
    }

    /// Capture a frame from `camera_id`, or from the camera with the lowest
    /// identifier when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`DodaError::CaptureFailure`] when no matching camera is
    /// registered or the driver fails.
    pub fn capture(&mut self, camera_id: Option<&str>) -> Result<CameraFrame, DodaError> {
        let id = match camera_id {
            Some(id) => id.to_string(),
            None => self
                .cameras
                .keys()
                .min()
                .cloned()
                .ok_or_else(|| DodaError::CaptureFailure("no camera registered".to_string()))?,
        };
        match self.cameras.get_mut(&id) {
            Some(cam) => cam.capture(),
            None => Err(DodaError::CaptureFailure(format!(
                "camera '{id}' is not registered"
            ))),
        }
    }

    /// Current position of every registered actuator, keyed by identifier.
    pub fn joint_positions(&self) -> BTreeMap<String, f32> {
        self.actuators
            .iter()
            .map(|(id, act)| (id.clone(), act.position()))
            .collect()
    }

    /// Dispatch a [`RobotIntent`] to the appropriate registered drivers.
    ///
    /// # Errors
    ///
    /// Returns [`DodaError::HardwareFault`] when a target driver is not
    /// registered, an argument is out of range, or a driver call fails.
    pub fn dispatch(&mut self, intent: RobotIntent) -> Result<(), DodaError> {
        match intent {
            RobotIntent::PerformBehavior(kind) => self.perform(kind).map(|_| ()),

            RobotIntent::RotateBase { degrees, direction } => {
                self.rotate_base(degrees, direction).map(|_| ())
            }

            RobotIntent::ActuateJoint {
                joint_id,
                target_deg,
            } => self.actuate(&joint_id, target_deg),

            // Re-command every actuator to its current position so no
            // controller keeps chasing an old target.
            RobotIntent::HoldPosition => {
                for act in self.actuators.values_mut() {
                    let pos = act.position();
                    act.set_position(pos)?;
                }
                Ok(())
            }
        }
    }

    /// Play the preset for `kind` and return its nominal duration.
    ///
    /// # Errors
    ///
    /// Returns [`DodaError::HardwareFault`] if a joint used by the preset is
    /// not registered (nothing moves in that case) or a driver fails.
    pub fn perform(&mut self, kind: BehaviorKind) -> Result<Duration, DodaError> {
        let preset = preset_for(kind);
        let joints = preset.joints();
        if let Some(missing) = joints.iter().find(|j| !self.actuators.contains_key(**j)) {
            return Err(DodaError::HardwareFault {
                component: (*missing).to_string(),
                details: format!("behavior '{kind}' needs actuator '{missing}' which is not registered"),
            });
        }

        let start: Vec<(&'static str, f32)> = joints
            .iter()
            .map(|j| (*j, self.actuators[*j].position()))
            .collect();
        let start_of = |joint: &str| {
            start
                .iter()
                .find(|(j, _)| *j == joint)
                .map_or(0.0, |(_, pos)| *pos)
        };

        info!(behavior = %kind, preset = preset.name, "performing behavior");
        for frame in preset.frames {
            for (joint, target) in frame.targets {
                let value = match target {
                    JointTarget::Offset(off) => start_of(*joint) + *off,
                    JointTarget::Absolute(abs) => *abs,
                };
                self.actuate(joint, value)?;
            }
            self.pause(frame.hold_ms as f32);
        }

        for (joint, pos) in &start {
            self.actuate(joint, *pos)?;
        }
        self.pause(RETURN_HOLD_MS as f32);

        debug!(behavior = %kind, "behavior complete");
        Ok(Duration::from_millis(preset.nominal_ms()))
    }

    /// Turn the base by `degrees` and return to the starting heading.
    ///
    /// Returns the signed angle actually turned (positive = left /
    /// counter-clockwise).  [`TurnDirection::Auto`] takes the shortest path.
    ///
    /// # Errors
    ///
    /// Returns [`DodaError::HardwareFault`] if `degrees` is outside
    /// `0..=360` or the wheel actuators are not registered.
    pub fn rotate_base(&mut self, degrees: f32, direction: TurnDirection) -> Result<f32, DodaError> {
        if !(0.0..=360.0).contains(&degrees) {
            return Err(DodaError::HardwareFault {
                component: "drive_base".to_string(),
                details: format!("rotation of {degrees}° is outside 0..=360"),
            });
        }
        let signed = match direction {
            TurnDirection::Left => degrees,
            TurnDirection::Right => -degrees,
            TurnDirection::Auto if degrees > 180.0 => -(360.0 - degrees),
            TurnDirection::Auto => degrees,
        };

        let left_start = self.position_of("left_wheel")?;
        let right_start = self.position_of("right_wheel")?;
        let wheel = signed * WHEEL_DEG_PER_BASE_DEG;

        info!(degrees = signed, "rotating base");
        self.actuate("left_wheel", left_start - wheel)?;
        self.actuate("right_wheel", right_start + wheel)?;
        self.pause(signed.abs() / 90.0 * QUARTER_TURN_MS);

        self.actuate("left_wheel", left_start)?;
        self.actuate("right_wheel", right_start)?;
        self.pause(signed.abs() / 90.0 * QUARTER_TURN_MS);

        Ok(signed)
    }

    // Internal helper: look up an actuator and call set_position.
    fn actuate(&mut self, id: &str, target_deg: f32) -> Result<(), DodaError> {
        match self.actuators.get_mut(id) {
            Some(act) => act.set_position(target_deg),
            None => Err(DodaError::HardwareFault {
                component: id.to_string(),
                details: format!("actuator '{id}' is not registered"),
            }),
        }
    }

    fn position_of(&self, id: &str) -> Result<f32, DodaError> {
        self.actuators
            .get(id)
            .map(|a| a.position())
            .ok_or_else(|| DodaError::HardwareFault {
                component: id.to_string(),
                details: format!("actuator '{id}' is not registered"),
            })
    }

    fn pause(&self, ms: f32) {
        if self.time_scale > 0.0 && ms > 0.0 {
            thread::sleep(Duration::from_secs_f32(ms * self.time_scale / 1_000.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    // ------------------------------------------------------------------
    // Test doubles
    // ------------------------------------------------------------------

    type Log = Arc<Mutex<Vec<(String, f32)>>>;

    struct MockActuator {
        id: String,
        position: f32,
        log: Log,
    }
    impl MockActuator {
        fn new(id: &str, position: f32, log: &Log) -> Box<Self> {
            Box::new(Self {
                id: id.to_string(),
                position,
                log: Arc::clone(log),
            })
        }
    }
    impl Actuator for MockActuator {
        fn id(&self) -> &str {
            &self.id
        }
        fn set_position(&mut self, target_deg: f32) -> Result<(), DodaError> {
            self.position = target_deg;
            self.log.lock().unwrap().push((self.id.clone(), target_deg));
            Ok(())
        }
        fn position(&self) -> f32 {
            self.position
        }
    }

    struct MockCamera {
        id: String,
    }
    impl Camera for MockCamera {
        fn id(&self) -> &str {
            &self.id
        }
        fn capture(&mut self) -> Result<CameraFrame, DodaError> {
            Ok(CameraFrame {
                width: 1,
                height: 1,
                mime: self.id.clone(),
                data: vec![0u8],
            })
        }
    }

    fn arm(log: &Log) -> HardwareRegistry {
        let mut registry = HardwareRegistry::new();
        registry.set_time_scale(0.0);
        for (joint, start) in [
            ("shoulder_pan", 0.0),
            ("shoulder_lift", 10.0),
            ("elbow_flex", 20.0),
            ("wrist_flex", -5.0),
            ("wrist_roll", 3.0),
            ("gripper", 0.0),
        ] {
            registry.register_actuator(MockActuator::new(joint, start, log));
        }
        registry
    }

    // ------------------------------------------------------------------
    // Tests
    // ------------------------------------------------------------------

    #[test]
    fn perform_returns_to_start_pose() {
        let log = Log::default();
        let mut registry = arm(&log);
        let before = registry.joint_positions();

        registry.perform(BehaviorKind::Dismay).unwrap();

        assert_eq!(registry.joint_positions(), before);
        assert!(!log.lock().unwrap().is_empty());
    }

    #[test]
    fn perform_applies_offsets_relative_to_start() {
        let log = Log::default();
        let mut registry = arm(&log);
        registry.perform(BehaviorKind::Woo).unwrap();

        let log = log.lock().unwrap();
        // shoulder_lift started at 10, the stretch frame adds 65.
        assert!(log.iter().any(|(j, v)| j == "shoulder_lift" && (*v - 75.0).abs() < 1e-4));
        // The beak is commanded in absolute terms.
        assert!(log.iter().any(|(j, v)| j == "gripper" && (*v - 100.0).abs() < 1e-4));
    }

    #[test]
    fn perform_with_missing_joint_moves_nothing() {
        let log = Log::default();
        let mut registry = HardwareRegistry::new();
        registry.set_time_scale(0.0);
        registry.register_actuator(MockActuator::new("wrist_roll", 0.0, &log));

        let err = registry.perform(BehaviorKind::Greeting).unwrap_err();
        assert!(matches!(err, DodaError::HardwareFault { .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn rotate_left_drives_wheels_opposite_and_returns() {
        let log = Log::default();
        let mut registry = HardwareRegistry::new();
        registry.set_time_scale(0.0);
        registry.register_actuator(MockActuator::new("left_wheel", 0.0, &log));
        registry.register_actuator(MockActuator::new("right_wheel", 0.0, &log));

        let turned = registry.rotate_base(90.0, TurnDirection::Left).unwrap();
        assert!((turned - 90.0).abs() < f32::EPSILON);

        let log = log.lock().unwrap();
        assert_eq!(log[0], ("left_wheel".to_string(), -225.0));
        assert_eq!(log[1], ("right_wheel".to_string(), 225.0));
        assert_eq!(registry.joint_positions()["left_wheel"], 0.0);
        assert_eq!(registry.joint_positions()["right_wheel"], 0.0);
    }

    #[test]
    fn rotate_auto_takes_shortest_path() {
        let log = Log::default();
        let mut registry = HardwareRegistry::new();
        registry.set_time_scale(0.0);
        registry.register_actuator(MockActuator::new("left_wheel", 0.0, &log));
        registry.register_actuator(MockActuator::new("right_wheel", 0.0, &log));

        let turned = registry.rotate_base(270.0, TurnDirection::Auto).unwrap();
        assert!((turned + 90.0).abs() < f32::EPSILON);
        let turned = registry.rotate_base(45.0, TurnDirection::Auto).unwrap();
        assert!((turned - 45.0).abs() < f32::EPSILON);
    }

    #[test]
    fn rotate_out_of_range_is_rejected() {
        let mut registry = HardwareRegistry::new();
        let result = registry.rotate_base(400.0, TurnDirection::Left);
        assert!(matches!(result, Err(DodaError::HardwareFault { .. })));
    }

    #[test]
    fn dispatch_actuate_joint() {
        let log = Log::default();
        let mut registry = arm(&log);
        registry
            .dispatch(RobotIntent::ActuateJoint {
                joint_id: "wrist_flex".to_string(),
                target_deg: 12.5,
            })
            .unwrap();
        assert!((registry.joint_positions()["wrist_flex"] - 12.5).abs() < f32::EPSILON);
    }

    #[test]
    fn dispatch_missing_actuator_returns_error() {
        let mut registry = HardwareRegistry::new();
        let result = registry.dispatch(RobotIntent::ActuateJoint {
            joint_id: "nonexistent".to_string(),
            target_deg: 1.0,
        });
        assert!(matches!(result, Err(DodaError::HardwareFault { .. })));
    }

    #[test]
    fn dispatch_hold_position_keeps_current_pose() {
        let log = Log::default();
        let mut registry = arm(&log);
        let before = registry.joint_positions();
        registry.dispatch(RobotIntent::HoldPosition).unwrap();
        assert_eq!(registry.joint_positions(), before);
        assert_eq!(log.lock().unwrap().len(), before.len());
    }

    #[test]
    fn capture_without_camera_is_capture_failure() {
        let mut registry = HardwareRegistry::new();
        assert!(matches!(
            registry.capture(None),
            Err(DodaError::CaptureFailure(_))
        ));
    }

    #[test]
    fn capture_defaults_to_lowest_camera_id() {
        let mut registry = HardwareRegistry::new();
        registry.register_camera(Box::new(MockCamera { id: "z_cam".to_string() }));
        registry.register_camera(Box::new(MockCamera { id: "a_cam".to_string() }));
        // The mock echoes its id through the mime field.
        assert_eq!(registry.capture(None).unwrap().mime, "a_cam");
        assert_eq!(registry.capture(Some("z_cam")).unwrap().mime, "z_cam");
    }

    #[test]
    fn time_scale_is_kept_finite() {
        let mut registry = HardwareRegistry::new();
        registry.set_time_scale(f32::INFINITY);
        assert_eq!(registry.time_scale(), MAX_TIME_SCALE);
        registry.set_time_scale(f32::NAN);
        assert_eq!(registry.time_scale(), 0.0);
        registry.set_time_scale(-2.0);
        assert_eq!(registry.time_scale(), 0.0);
        registry.set_time_scale(0.5);
        assert_eq!(registry.time_scale(), 0.5);
    }
}
