//! Data side of the race simulator: course files, rosters and synthetic athletes.
//!
//! ```rust,ignore
//! use race_data::prelude::*;
//!
//! let config = SimConfig::from_env()?;
//! let provider = FileProvider::from_config(&config)?;
//! let race = Race::setup(&provider, &config)?;
//! let results = race.run(Arc::new(LogSink));
//! ```

pub mod course_file;
pub mod generators;
pub mod provider;
pub mod roster;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::course_file::{CourseFile, load_course, load_gpx_dir};
    pub use crate::generators::{AthleteGenConfig, AthleteGenerator};
    pub use crate::provider::FileProvider;
    pub use crate::roster::{RosterFile, select};
    pub use racesim::{EventSink, HttpSink, LogSink, Race, RaceResults, SimConfig};
}
