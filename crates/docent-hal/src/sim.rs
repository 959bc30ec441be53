//! In-process simulation of the exhibition room and the drive train.
//!
//! [`SimWorld`] is a [`DistanceQuery`] over straight wall segments and
//! circular "legs" (visitors, bags, exhibit posts).  Legs may move with a
//! constant velocity so the firmware sees transient targets.
//! [`SimDriveBase`] is a unicycle integrator implementing [`DriveBase`].
//! Together they let the full docent stack run in headless tests and the
//! bench CLI without any hardware.
//!
//! # Example
//!
//! ```rust
//! use docent_hal::query::DistanceQuery;
//! use docent_hal::sim::SimWorld;
//! use docent_types::Point2;
//!
//! let world = SimWorld::builder()
//!     .with_room(4.0, 3.0)
//!     .with_leg(Point2::new(2.0, 1.5), 0.06)
//!     .build();
//!
//! // Looking along +X from (1, 1.5) hits the leg's near edge.
//! let d = world.cast(Point2::new(1.0, 1.5), 0.0).expect("leg ahead");
//! assert!((d - 0.94).abs() < 1e-9);
//! ```

use docent_types::{Point2, Pose, WheelCommand, wrap_angle};
use tracing::debug;

use crate::drive::DriveBase;
use crate::query::DistanceQuery;

const PARALLEL_EPSILON: f64 = 1e-12;

// ────────────────────────────────────────────────────────────────────────────
// Geometry primitives
// ────────────────────────────────────────────────────────────────────────────

/// A straight wall from `a` to `b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub a: Point2,
    pub b: Point2,
}

impl Segment {
    /// Ray parameter of the intersection with the ray `origin + t·(cos, sin)`.
    fn intersect(&self, origin: Point2, dir: (f64, f64)) -> Option<f64> {
        let e = (self.b.x - self.a.x, self.b.y - self.a.y);
        let denom = cross(dir, e);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }
        let ao = (self.a.x - origin.x, self.a.y - origin.y);
        let t = cross(ao, e) / denom;
        let s = cross(ao, dir) / denom;
        (t >= 0.0 && (0.0..=1.0).contains(&s)).then_some(t)
    }
}

/// A circular obstacle, optionally drifting at `velocity` (m/s).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub center: Point2,
    pub radius: f64,
    pub velocity: (f64, f64),
}

impl Leg {
    fn intersect(&self, origin: Point2, dir: (f64, f64)) -> Option<f64> {
        let f = (origin.x - self.center.x, origin.y - self.center.y);
        let b = f.0 * dir.0 + f.1 * dir.1;
        let c = f.0 * f.0 + f.1 * f.1 - self.radius * self.radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let root = disc.sqrt();
        let near = -b - root;
        let far = -b + root;
        if near >= 0.0 {
            Some(near)
        } else if far >= 0.0 {
            // Origin inside the circle.
            Some(0.0)
        } else {
            None
        }
    }
}

fn cross(u: (f64, f64), v: (f64, f64)) -> f64 {
    u.0 * v.1 - u.1 * v.0
}

// ────────────────────────────────────────────────────────────────────────────
// SimWorld
// ────────────────────────────────────────────────────────────────────────────

/// Static walls plus (possibly moving) legs.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    walls: Vec<Segment>,
    legs: Vec<Leg>,
    max_range_m: f64,
}

impl SimWorld {
    /// Start building a world.
    pub fn builder() -> SimWorldBuilder {
        SimWorldBuilder::default()
    }

    pub fn walls(&self) -> &[Segment] {
        &self.walls
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    /// Move every leg along its velocity for `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 {
            return;
        }
        for leg in &mut self.legs {
            leg.center.x += leg.velocity.0 * dt;
            leg.center.y += leg.velocity.1 * dt;
        }
    }
}

impl DistanceQuery for SimWorld {
    fn cast(&self, origin: Point2, angle: f64) -> Option<f64> {
        let dir = (angle.cos(), angle.sin());
        let walls = self.walls.iter().filter_map(|w| w.intersect(origin, dir));
        let legs = self.legs.iter().filter_map(|l| l.intersect(origin, dir));
        walls
            .chain(legs)
            .filter(|t| *t <= self.max_range_m)
            .min_by(f64::total_cmp)
    }
}

/// Builder for [`SimWorld`].
///
/// Call the `with_*` methods to add geometry, then [`build`][Self::build].
#[derive(Debug, Clone)]
pub struct SimWorldBuilder {
    walls: Vec<Segment>,
    legs: Vec<Leg>,
    max_range_m: f64,
}

impl Default for SimWorldBuilder {
    fn default() -> Self {
        Self {
            walls: Vec::new(),
            legs: Vec::new(),
            max_range_m: 4.0,
        }
    }
}

impl SimWorldBuilder {
    /// Four walls enclosing `[0, width] × [0, height]`.
    pub fn with_room(self, width: f64, height: f64) -> Self {
        let corners = [
            Point2::new(0.0, 0.0),
            Point2::new(width, 0.0),
            Point2::new(width, height),
            Point2::new(0.0, height),
        ];
        (0..4).fold(self, |builder, i| {
            builder.with_wall(corners[i], corners[(i + 1) % 4])
        })
    }

    pub fn with_wall(mut self, a: Point2, b: Point2) -> Self {
        self.walls.push(Segment { a, b });
        self
    }

    /// A static leg.
    pub fn with_leg(self, center: Point2, radius: f64) -> Self {
        self.with_moving_leg(center, radius, (0.0, 0.0))
    }

    pub fn with_moving_leg(mut self, center: Point2, radius: f64, velocity: (f64, f64)) -> Self {
        self.legs.push(Leg {
            center,
            radius,
            velocity,
        });
        self
    }

    /// Rays saturate beyond this distance (default 4 m).
    pub fn with_max_range(mut self, max_range_m: f64) -> Self {
        self.max_range_m = max_range_m;
        self
    }

    pub fn build(self) -> SimWorld {
        debug!(
            walls = self.walls.len(),
            legs = self.legs.len(),
            max_range_m = self.max_range_m,
            "sim world built"
        );
        SimWorld {
            walls: self.walls,
            legs: self.legs,
            max_range_m: self.max_range_m,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimDriveBase
// ────────────────────────────────────────────────────────────────────────────

/// Euler-integrated differential drive.  Wheel speeds are clamped to
/// `max_wheel_speed`; collisions are not resolved.
#[derive(Debug, Clone)]
pub struct SimDriveBase {
    pose: Pose,
    wheel_base_m: f64,
    max_wheel_speed: f64,
}

impl SimDriveBase {
    pub fn new(pose: Pose, wheel_base_m: f64, max_wheel_speed: f64) -> Self {
        Self {
            pose,
            wheel_base_m,
            max_wheel_speed,
        }
    }
}

impl DriveBase for SimDriveBase {
    fn apply(&mut self, command: WheelCommand, dt: f64) {
        if !dt.is_finite() || dt <= 0.0 || !command.is_finite() {
            return;
        }
        let left = command.left.clamp(-self.max_wheel_speed, self.max_wheel_speed);
        let right = command.right.clamp(-self.max_wheel_speed, self.max_wheel_speed);
        let v = (left + right) / 2.0;
        let omega = (right - left) / self.wheel_base_m;

        self.pose.x += v * self.pose.heading.cos() * dt;
        self.pose.y += v * self.pose.heading.sin() * dt;
        self.pose.heading = wrap_angle(self.pose.heading + omega * dt);
    }

    fn pose(&self) -> Pose {
        self.pose
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn room() -> SimWorld {
        SimWorld::builder().with_room(4.0, 3.0).build()
    }

    #[test]
    fn ray_hits_room_walls() {
        let world = room();
        let origin = Point2::new(1.0, 1.0);
        assert!((world.cast(origin, 0.0).unwrap() - 3.0).abs() < 1e-9);
        assert!((world.cast(origin, PI).unwrap() - 1.0).abs() < 1e-9);
        assert!((world.cast(origin, FRAC_PI_2).unwrap() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn ray_beyond_max_range_misses() {
        let world = SimWorld::builder().with_room(10.0, 10.0).with_max_range(2.0).build();
        assert!(world.cast(Point2::new(1.0, 5.0), 0.0).is_none());
        assert!(world.cast(Point2::new(1.0, 5.0), PI).is_some());
    }

    #[test]
    fn nearest_surface_wins() {
        let world = SimWorld::builder()
            .with_room(4.0, 3.0)
            .with_leg(Point2::new(2.0, 1.0), 0.1)
            .build();
        let d = world.cast(Point2::new(1.0, 1.0), 0.0).unwrap();
        assert!((d - 0.9).abs() < 1e-9);
    }

    #[test]
    fn grazing_ray_misses_narrow_leg() {
        let world = SimWorld::builder().with_leg(Point2::new(2.0, 0.2), 0.05).build();
        assert!(world.cast(Point2::new(0.0, 0.0), 0.0).is_none());
    }

    #[test]
    fn origin_inside_leg_reads_zero() {
        let world = SimWorld::builder().with_leg(Point2::new(0.0, 0.0), 0.5).build();
        assert_eq!(world.cast(Point2::new(0.1, 0.0), 0.3), Some(0.0));
    }

    #[test]
    fn moving_leg_advances() {
        let mut world = SimWorld::builder()
            .with_moving_leg(Point2::new(1.0, 0.0), 0.1, (0.5, 0.0))
            .build();
        world.advance(2.0);
        assert!((world.legs()[0].center.x - 2.0).abs() < 1e-12);
        world.advance(f64::NAN);
        assert!((world.legs()[0].center.x - 2.0).abs() < 1e-12);
    }

    #[test]
    fn drive_base_moves_straight() {
        let mut base = SimDriveBase::new(Pose::default(), 0.3, 0.5);
        base.apply(WheelCommand::straight(0.2), 1.0);
        let pose = base.pose();
        assert!((pose.x - 0.2).abs() < 1e-12);
        assert!(pose.y.abs() < 1e-12);
        assert!(pose.heading.abs() < 1e-12);
    }

    #[test]
    fn drive_base_rotates_in_place() {
        let mut base = SimDriveBase::new(Pose::default(), 0.3, 0.5);
        // ω = (0.15 − (−0.15)) / 0.3 = 1 rad/s.
        base.apply(WheelCommand::rotate(0.15, 1.0), 0.5);
        let pose = base.pose();
        assert!((pose.heading - 0.5).abs() < 1e-12);
        assert!(pose.x.abs() < 1e-12);
    }

    #[test]
    fn drive_base_clamps_wheel_speed_and_ignores_bad_input() {
        let mut base = SimDriveBase::new(Pose::default(), 0.3, 0.25);
        base.apply(WheelCommand::straight(10.0), 1.0);
        assert!((base.pose().x - 0.25).abs() < 1e-12);
        base.apply(WheelCommand::new(f64::NAN, 0.1), 1.0);
        base.apply(WheelCommand::straight(0.1), f64::INFINITY);
        assert!((base.pose().x - 0.25).abs() < 1e-12);
    }
}
