//! `docent-hal` – Sensor & Actuation Abstraction
//!
//! Everything between the physical world and the firmware.  The firmware
//! never touches geometry directly: it only sees the noisy, rate-limited
//! readings produced here.
//!
//! # Modules
//!
//! - [`query`] – [`DistanceQuery`][query::DistanceQuery]: the ray-casting
//!   collaborator that reports ground-truth distance to the nearest surface.
//! - [`sensor`] – [`SensorModel`][sensor::SensorModel],
//!   [`ConeSensor`][sensor::ConeSensor] and
//!   [`SensorArray`][sensor::SensorArray]: turn ground truth into realistic
//!   readings (Gaussian noise, outlier spikes, dropout, clamping, refresh-rate
//!   limiting, nearest-surface-in-cone).
//! - [`drive`] – [`DriveBase`][drive::DriveBase]: the kinematics integrator
//!   interface that consumes wheel commands.
//! - [`sim`] – [`SimWorld`][sim::SimWorld] and
//!   [`SimDriveBase`][sim::SimDriveBase]: in-process stand-ins for the room
//!   geometry and the drive train, for headless tests and the bench CLI.

pub mod drive;
pub mod query;
pub mod sensor;
pub mod sim;

pub use drive::DriveBase;
pub use query::DistanceQuery;
pub use sensor::{ConeSensor, SensorArray, SensorModel};
pub use sim::{SimDriveBase, SimWorld};
