//! `docent-perception` – sweep classification.
//!
//! Turns a buffered turn-in-place sweep of noisy distance samples into a
//! verdict the behaviour engine can act on.
//!
//! # Modules
//!
//! - [`classifier`] – [`SignalClassifier`][classifier::SignalClassifier]:
//!   pure, deterministic wall vs. local-object discrimination using
//!   per-sample channel spread, hit span and an asymmetry count, summarised
//!   in [`ScanStats`][classifier::ScanStats].

pub mod classifier;

pub use classifier::{ScanStats, SignalClassifier};
