//! [`RobotContext`] – the vehicle-side state the engine writes into.
//!
//! The surrounding simulation owns the context and lends it to
//! [`BehaviorEngine::update`][crate::engine::BehaviorEngine::update] for the
//! duration of one tick.  Outside the engine it is read-only except for the
//! heading, which comes from odometry.

use docent_types::{BehaviorConfig, WheelCommand};

/// Heading, wheel outputs, inventory and the cooldowns that outlive any
/// single behaviour state.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotContext {
    heading: f64,
    wheels: WheelCommand,
    payload_remaining: u32,
    actions_triggered: u32,
    scan_cooldown_s: f64,
    action_cooldown_s: f64,
}

impl RobotContext {
    pub fn new(heading: f64, payload: u32) -> Self {
        Self {
            heading,
            wheels: WheelCommand::STOP,
            payload_remaining: payload,
            actions_triggered: 0,
            scan_cooldown_s: 0.0,
            action_cooldown_s: 0.0,
        }
    }

    /// Fresh context at heading 0 carrying the configured payload.
    pub fn from_config(config: &BehaviorConfig) -> Self {
        Self::new(0.0, config.payload_capacity)
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    /// Feed the odometry heading in before each tick.
    ///
    /// This is the only field the owner writes; everything else changes
    /// inside [`BehaviorEngine::update`][crate::engine::BehaviorEngine::update].
    pub fn set_heading(&mut self, heading: f64) {
        self.heading = heading;
    }

    pub fn wheel_command(&self) -> WheelCommand {
        self.wheels
    }

    pub fn payload_remaining(&self) -> u32 {
        self.payload_remaining
    }

    pub fn actions_triggered(&self) -> u32 {
        self.actions_triggered
    }

    pub fn scan_cooldown_s(&self) -> f64 {
        self.scan_cooldown_s
    }

    pub fn action_cooldown_s(&self) -> f64 {
        self.action_cooldown_s
    }

    // ── Engine-only mutation ──────────────────────────────────────────────

    pub(crate) fn set_wheel_speeds(&mut self, left: f64, right: f64) {
        self.wheels = WheelCommand::new(left, right);
    }

    /// The payload action.  Counts every call; inventory saturates at zero.
    pub(crate) fn trigger_action(&mut self) {
        self.actions_triggered += 1;
        self.payload_remaining = self.payload_remaining.saturating_sub(1);
    }

    pub(crate) fn arm_scan_cooldown(&mut self, seconds: f64) {
        self.scan_cooldown_s = seconds.max(0.0);
    }

    pub(crate) fn arm_action_cooldown(&mut self, seconds: f64) {
        self.action_cooldown_s = seconds.max(0.0);
    }

    /// Count every cooldown down by `dt`, stopping at zero.
    pub(crate) fn decay_cooldowns(&mut self, dt: f64) {
        self.scan_cooldown_s = (self.scan_cooldown_s - dt).max(0.0);
        self.action_cooldown_s = (self.action_cooldown_s - dt).max(0.0);
    }

    pub(crate) fn scan_allowed(&self) -> bool {
        self.scan_cooldown_s <= 0.0
    }

    pub(crate) fn action_allowed(&self) -> bool {
        self.action_cooldown_s <= 0.0 && self.payload_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cooldowns_decay_monotonically_to_zero() {
        let mut ctx = RobotContext::new(0.0, 1);
        ctx.arm_scan_cooldown(0.3);
        ctx.arm_action_cooldown(0.1);
        ctx.decay_cooldowns(0.2);
        assert!((ctx.scan_cooldown_s() - 0.1).abs() < 1e-12);
        assert_eq!(ctx.action_cooldown_s(), 0.0);
        assert!(!ctx.scan_allowed());
        ctx.decay_cooldowns(0.2);
        assert_eq!(ctx.scan_cooldown_s(), 0.0);
        assert!(ctx.scan_allowed());
    }

    #[test]
    fn trigger_action_consumes_payload() {
        let mut ctx = RobotContext::new(0.0, 1);
        assert!(ctx.action_allowed());
        ctx.trigger_action();
        assert_eq!(ctx.actions_triggered(), 1);
        assert_eq!(ctx.payload_remaining(), 0);
        assert!(!ctx.action_allowed());
        ctx.trigger_action();
        assert_eq!(ctx.payload_remaining(), 0);
        assert_eq!(ctx.actions_triggered(), 2);
    }

    #[test]
    fn heading_input_leaves_engine_owned_fields_alone() {
        let mut ctx = RobotContext::new(0.0, 3);
        ctx.arm_scan_cooldown(1.0);
        let before = ctx.clone();
        ctx.set_heading(1.2);
        assert_eq!(ctx.heading(), 1.2);
        assert_eq!(RobotContext { heading: 0.0, ..ctx }, before);
    }

    #[test]
    fn from_config_loads_payload() {
        let ctx = RobotContext::from_config(&BehaviorConfig::default());
        assert_eq!(ctx.payload_remaining(), 8);
        assert_eq!(ctx.wheel_command(), WheelCommand::STOP);
    }
}
