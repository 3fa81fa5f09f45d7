//! Synthetic athlete generation.
//!
//! - [`AthleteGenerator`]: roster records with age-weighted strengths

pub mod athlete;

pub use athlete::{AthleteGenConfig, AthleteGenerator};
