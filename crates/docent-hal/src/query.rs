//! Generic `DistanceQuery` trait for ray-cast geometry services.
//!
//! The room geometry (walls, exhibits, visitors) is owned by whoever drives
//! the simulation or by real hardware.  The sensor model only ever talks to
//! this trait, so a simulated room, a recorded map or a physics engine can be
//! swapped in without touching the firmware.

use docent_types::Point2;

/// Nearest-surface ray query.
///
/// Implementations must be side-effect free from the caller's point of view:
/// casting the same ray twice against unchanged geometry returns the same
/// distance.
pub trait DistanceQuery {
    /// Distance in metres from `origin` to the nearest surface along the ray
    /// at world angle `angle` (radians, CCW from +X).
    ///
    /// Returns `None` when nothing is hit within the query's sensing range.
    fn cast(&self, origin: Point2, angle: f64) -> Option<f64>;
}

impl<Q: DistanceQuery + ?Sized> DistanceQuery for &Q {
    fn cast(&self, origin: Point2, angle: f64) -> Option<f64> {
        (**self).cast(origin, angle)
    }
}
