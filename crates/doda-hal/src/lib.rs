//! `doda-hal` – Hardware Abstraction Layer for the Doda robot.
//!
//! The rest of the system never talks to a servo bus or a webcam directly.
//! It talks to the [`Actuator`][actuator::Actuator] and
//! [`Camera`][camera::Camera] traits through a
//! [`HardwareRegistry`][registry::HardwareRegistry], which turns a
//! [`RobotIntent`][doda_types::RobotIntent] into joint commands.
//!
//! # Modules
//!
//! - [`actuator`] – position-controlled joints and wheels (degrees).
//! - [`camera`] – image capture.
//! - [`behavior`] – the static keyframe table behind every
//!   [`BehaviorKind`][doda_types::BehaviorKind].
//! - [`registry`] – driver registry and intent dispatcher.
//! - [`snapshot`] – a camera backed by an image file refreshed by an external
//!   grabber.
//! - [`sim`] – stub drivers for running the whole stack without hardware.

pub mod actuator;
pub mod behavior;
pub mod camera;
pub mod registry;
pub mod sim;
pub mod snapshot;

pub use actuator::Actuator;
pub use behavior::{BehaviorPreset, JointTarget, Keyframe, preset_for};
pub use camera::{Camera, CameraFrame};
pub use registry::HardwareRegistry;
pub use sim::{SimActuator, SimCamera, SimRegistry};
pub use snapshot::SnapshotCamera;
