//! [`CommandGuard`] – wheel-command interlock / rule engine.
//!
//! Before a [`WheelCommand`] reaches the robot context, pass it through
//! [`CommandGuard::verify`].  Every registered [`CommandRule`] is evaluated
//! in order; the first violation returns a [`DocentError::CommandRejected`]
//! and the caller substitutes [`WheelCommand::STOP`].
//!
//! Two built-in rules are provided:
//! - [`FiniteRule`] – rejects NaN or infinite wheel speeds.
//! - [`SpeedCapRule`] – rejects commands whose wheel speed magnitude exceeds
//!   a cap.

use docent_types::{DocentError, DriveConfig, WheelCommand};

/// Slack allowed over the speed cap for rounding in the steering helpers.
const CAP_EPSILON: f64 = 1e-9;

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single invariant that a wheel command must satisfy.
pub trait CommandRule: Send + Sync {
    /// Human-readable name used in rejection messages.
    fn name(&self) -> &str;

    /// Return `Ok(())` when the command satisfies the invariant, or
    /// [`DocentError::CommandRejected`] when it is violated.
    fn check(&self, command: &WheelCommand) -> Result<(), DocentError>;
}

// ────────────────────────────────────────────────────────────────────────────
// CommandGuard
// ────────────────────────────────────────────────────────────────────────────

/// Rule engine that validates a [`WheelCommand`] against all registered
/// [`CommandRule`]s.
///
/// # Example
///
/// ```
/// use docent_kernel::interlock::{CommandGuard, FiniteRule, SpeedCapRule};
/// use docent_types::WheelCommand;
///
/// let mut guard = CommandGuard::new();
/// guard.add_rule(Box::new(FiniteRule));
/// guard.add_rule(Box::new(SpeedCapRule { max_wheel_speed: 0.3 }));
///
/// assert!(guard.verify(&WheelCommand::straight(0.2)).is_ok());
/// assert!(guard.verify(&WheelCommand::straight(0.5)).is_err());
/// assert!(guard.verify(&WheelCommand::new(f64::NAN, 0.0)).is_err());
/// ```
#[derive(Default)]
pub struct CommandGuard {
    rules: Vec<Box<dyn CommandRule>>,
}

impl CommandGuard {
    /// Create an empty guard with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard interlock for a drive train: finite speeds, capped at
    /// `drive.max_wheel_speed`.
    pub fn for_drive(drive: &DriveConfig) -> Self {
        let mut guard = Self::new();
        guard.add_rule(Box::new(FiniteRule));
        guard.add_rule(Box::new(SpeedCapRule {
            max_wheel_speed: drive.max_wheel_speed,
        }));
        guard
    }

    /// Register a new [`CommandRule`].  Rules are evaluated in insertion
    /// order.
    pub fn add_rule(&mut self, rule: Box<dyn CommandRule>) {
        self.rules.push(rule);
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Validate `command` against every registered rule.
    ///
    /// # Errors
    ///
    /// Returns the first [`DocentError::CommandRejected`] encountered.
    pub fn verify(&self, command: &WheelCommand) -> Result<(), DocentError> {
        for rule in &self.rules {
            rule.check(command)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CommandGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandGuard")
            .field("rules", &self.rule_names())
            .finish()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Rejects commands containing NaN or infinite wheel speeds.
pub struct FiniteRule;

impl CommandRule for FiniteRule {
    fn name(&self) -> &str {
        "finite"
    }

    fn check(&self, command: &WheelCommand) -> Result<(), DocentError> {
        if command.is_finite() {
            Ok(())
        } else {
            Err(DocentError::CommandRejected {
                rule: self.name().to_string(),
                details: format!("non-finite wheel speeds ({}, {})", command.left, command.right),
            })
        }
    }
}

/// Rejects commands where either wheel exceeds `max_wheel_speed` in
/// magnitude.
pub struct SpeedCapRule {
    /// Maximum allowed absolute wheel speed (m/s).
    pub max_wheel_speed: f64,
}

impl CommandRule for SpeedCapRule {
    fn name(&self) -> &str {
        "speed_cap"
    }

    fn check(&self, command: &WheelCommand) -> Result<(), DocentError> {
        for (wheel, speed) in [("left", command.left), ("right", command.right)] {
            if speed.abs() > self.max_wheel_speed + CAP_EPSILON {
                return Err(DocentError::CommandRejected {
                    rule: self.name().to_string(),
                    details: format!("{wheel} {speed} exceeds cap {}", self.max_wheel_speed),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------ helpers
    fn capped(max_wheel_speed: f64) -> CommandGuard {
        let mut g = CommandGuard::new();
        g.add_rule(Box::new(SpeedCapRule { max_wheel_speed }));
        g
    }

    // ------------------------------------------------------------------ SpeedCapRule

    #[test]
    fn within_cap_passes() {
        assert!(capped(0.3).verify(&WheelCommand::new(0.2, -0.3)).is_ok());
    }

    #[test]
    fn over_cap_rejected_naming_the_wheel() {
        let err = capped(0.3).verify(&WheelCommand::new(0.1, -0.5)).unwrap_err();
        match err {
            DocentError::CommandRejected { rule, details } => {
                assert_eq!(rule, "speed_cap");
                assert!(details.starts_with("right"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn stop_always_passes_speed_cap() {
        assert!(capped(0.0).verify(&WheelCommand::STOP).is_ok());
    }

    // ------------------------------------------------------------------ FiniteRule

    #[test]
    fn nan_rejected_by_finite_rule() {
        let mut g = CommandGuard::new();
        g.add_rule(Box::new(FiniteRule));
        assert!(matches!(
            g.verify(&WheelCommand::new(0.1, f64::NAN)),
            Err(DocentError::CommandRejected { ref rule, .. }) if rule == "finite"
        ));
    }

    // ------------------------------------------------------------------ Guard

    #[test]
    fn first_failing_rule_short_circuits() {
        let g = CommandGuard::for_drive(&DriveConfig::default());
        assert_eq!(g.rule_names(), vec!["finite", "speed_cap"]);
        // An infinite speed also breaks the cap; the finite rule reports it.
        let result = g.verify(&WheelCommand::straight(f64::INFINITY));
        assert!(matches!(
            result,
            Err(DocentError::CommandRejected { ref rule, .. }) if rule == "finite"
        ));
    }

    #[test]
    fn empty_guard_always_passes() {
        let g = CommandGuard::new();
        assert!(g.verify(&WheelCommand::straight(99.0)).is_ok());
    }
}
