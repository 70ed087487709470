//! In-process simulation drivers for running Doda without hardware.
//!
//! [`SimRegistry`] builds a [`HardwareRegistry`] pre-populated with stub
//! drivers that record commands and return plausible state, so the whole
//! game loop runs headless in tests and on a laptop.
//!
//! # Example
//!
//! ```rust
//! use doda_hal::sim::SimRegistry;
//! use doda_types::{BehaviorKind, RobotIntent};
//!
//! let mut registry = SimRegistry::new().with_so101_arm().build();
//!
//! registry
//!     .dispatch(RobotIntent::PerformBehavior(BehaviorKind::Woo))
//!     .expect("sim behavior must succeed");
//! ```

use doda_types::DodaError;

use crate::actuator::Actuator;
use crate::camera::{Camera, CameraFrame, RAW_GRAY_MIME};
use crate::registry::HardwareRegistry;

/// Wheel actuators of the drive base.
pub const DRIVE_WHEELS: [&str; 2] = ["left_wheel", "right_wheel"];

/// Joints of the SO-101 arm, in base-to-tip order.
pub const SO101_JOINTS: [&str; 6] = [
    "shoulder_pan",
    "shoulder_lift",
    "elbow_flex",
    "wrist_flex",
    "wrist_roll",
    "gripper",
];

// ────────────────────────────────────────────────────────────────────────────
// Stub actuator
// ────────────────────────────────────────────────────────────────────────────

/// Joint that jumps straight to whatever angle it is given.
pub struct SimActuator {
    id: String,
    position: f32,
}

impl SimActuator {
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            position: 0.0,
        })
    }
}

impl Actuator for SimActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_position(&mut self, target_deg: f32) -> Result<(), DodaError> {
        self.position = target_deg;
        Ok(())
    }

    fn position(&self) -> f32 {
        self.position
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub camera
// ────────────────────────────────────────────────────────────────────────────

/// A simulated camera.  Returns a blank 4×4 greyscale frame unless built
/// with [`SimCamera::with_image`].
pub struct SimCamera {
    id: String,
    frame: CameraFrame,
}

impl SimCamera {
    /// Camera producing the blank raw frame.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            frame: CameraFrame {
                width: 4,
                height: 4,
                mime: RAW_GRAY_MIME.to_string(),
                data: vec![0u8; 16],
            },
        })
    }

    /// Create a camera that returns the same encoded image on every capture.
    pub fn with_image(id: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            frame: CameraFrame {
                width: 0,
                height: 0,
                mime: mime.into(),
                data,
            },
        })
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<CameraFrame, DodaError> {
        Ok(self.frame.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRegistry builder
// ────────────────────────────────────────────────────────────────────────────

/// Assembles a [`HardwareRegistry`] out of simulated parts.
///
/// Behaviors run without pausing unless [`with_time_scale`][Self::with_time_scale]
/// is set.
#[derive(Default)]
pub struct SimRegistry {
    actuators: Vec<Box<dyn Actuator>>,
    cameras: Vec<Box<dyn Camera>>,
    time_scale: f32,
}

impl SimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the six SO-101 arm joints (see [`SO101_JOINTS`]).
    pub fn with_so101_arm(mut self) -> Self {
        for joint in SO101_JOINTS {
            self.actuators.push(SimActuator::new(joint));
        }
        self
    }

    /// Add the two wheels of the base (see [`DRIVE_WHEELS`]).
    pub fn with_drive_base(mut self) -> Self {
        for wheel in DRIVE_WHEELS {
            self.actuators.push(SimActuator::new(wheel));
        }
        self
    }

    /// Add a blank-frame [`SimCamera`].
    pub fn with_camera(mut self, id: impl Into<String>) -> Self {
        self.cameras.push(SimCamera::new(id));
        self
    }

    /// Register a custom camera driver.
    pub fn with_camera_driver(mut self, camera: Box<dyn Camera>) -> Self {
        self.cameras.push(camera);
        self
    }

    /// Add any actuator, e.g. one that logs the commands it receives.
    pub fn with_actuator(mut self, actuator: Box<dyn Actuator>) -> Self {
        self.actuators.push(actuator);
        self
    }

    /// Scale keyframe pauses (`1.0` = real time).
    pub fn with_time_scale(mut self, scale: f32) -> Self {
        self.time_scale = scale;
        self
    }

    pub fn build(self) -> HardwareRegistry {
        let mut hw = HardwareRegistry::new();
        hw.set_time_scale(self.time_scale);
        self.actuators.into_iter().for_each(|act| hw.register_actuator(act));
        self.cameras.into_iter().for_each(|cam| hw.register_camera(cam));
        hw
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
