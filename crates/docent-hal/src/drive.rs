//! Generic `DriveBase` trait for differential-drive kinematics.
//!
//! The firmware only produces [`WheelCommand`]s.  Whatever integrates them
//! into motion (a simulator, a motor controller) implements this trait.

use docent_types::{Pose, WheelCommand};

/// A differential-drive base that turns wheel speeds into motion.
pub trait DriveBase {
    /// Apply `command` for `dt` seconds.
    fn apply(&mut self, command: WheelCommand, dt: f64);

    /// Most recently known pose.
    fn pose(&self) -> Pose;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the last command and accumulated time, for tests only.
    #[derive(Default)]
    struct RecordingBase {
        last: WheelCommand,
        elapsed: f64,
    }

    impl DriveBase for RecordingBase {
        fn apply(&mut self, command: WheelCommand, dt: f64) {
            self.last = command;
            self.elapsed += dt;
        }

        fn pose(&self) -> Pose {
            Pose::default()
        }
    }

    #[test]
    fn recording_base_keeps_last_command() {
        let mut base = RecordingBase::default();
        base.apply(WheelCommand::straight(0.2), 0.1);
        base.apply(WheelCommand::STOP, 0.1);
        assert_eq!(base.last, WheelCommand::STOP);
        assert!((base.elapsed - 0.2).abs() < 1e-12);
        assert_eq!(base.pose(), Pose::default());
    }
}
