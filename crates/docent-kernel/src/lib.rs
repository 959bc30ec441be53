//! `docent-kernel` – Safety interlocks
//!
//! Sits between the behaviour engine and the outside world.  It does not
//! decide anything; it keeps bad numbers out of the state machine and bad
//! commands away from the wheels.
//!
//! # Modules
//!
//! - [`clock`] – [`TickClock`][clock::TickClock]: sanitises the
//!   caller-supplied `dt` (non-finite, negative and stalled-host values) and
//!   counts how many ticks needed correcting.
//! - [`interlock`] – [`CommandGuard`][interlock::CommandGuard]: a rule
//!   engine that validates every [`WheelCommand`][docent_types::WheelCommand]
//!   against registered [`CommandRule`][interlock::CommandRule]s and returns
//!   [`DocentError::CommandRejected`][docent_types::DocentError::CommandRejected]
//!   on the first violation.

pub mod clock;
pub mod interlock;

pub use clock::{DtCorrection, TickClock};
pub use interlock::{CommandGuard, CommandRule, FiniteRule, SpeedCapRule};
