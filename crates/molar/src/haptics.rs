//! Collision feedback for input devices.

use molar_carve::CollisionReport;

/// Receives the collision signal of every step in which a tool touched
/// solid material.
///
/// Any `FnMut(&CollisionReport)` closure is a sink.
pub trait HapticsSink {
    /// Called once per colliding step.
    fn on_collision(&mut self, report: &CollisionReport);
}

/// Discards every signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHaptics;

impl HapticsSink for NullHaptics {
    fn on_collision(&mut self, _report: &CollisionReport) {}
}

impl<F: FnMut(&CollisionReport)> HapticsSink for F {
    fn on_collision(&mut self, report: &CollisionReport) {
        self(report)
    }
}
