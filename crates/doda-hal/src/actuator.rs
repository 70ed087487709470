//! Generic `Actuator` trait for servos, wheels, and any position-controlled
//! hardware.
//!
//! Drivers implement this trait and register themselves with a
//! [`HardwareRegistry`][crate::registry::HardwareRegistry].  Behaviors only
//! ever talk to the trait, so the SO-101 bus driver can be swapped for a
//! simulator without touching game logic.

use doda_types::DodaError;

/// A position-controlled hardware actuator (servo, wheel, …).
///
/// Positions are in degrees from the actuator's calibrated zero; the beak
/// (`"gripper"`) uses 0–100 % opening.
pub trait Actuator: Send + Sync {
    /// Stable identifier, e.g. `"wrist_flex"` or `"left_wheel"`.
    fn id(&self) -> &str;

    /// Command the actuator to move to `target_deg`.
    ///
    /// # Errors
    ///
    /// Returns [`DodaError::HardwareFault`] if the command cannot be applied
    /// (torque disabled, bus error, target out of range).
    fn set_position(&mut self, target_deg: f32) -> Result<(), DodaError>;

    /// Most recently known position in degrees.
    fn position(&self) -> f32;
}
