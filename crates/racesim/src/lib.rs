pub mod athlete;
pub mod clock;
pub mod config;
pub mod context;
pub mod course;
pub mod dispatch;
pub mod errors;
pub mod event;
pub mod models;
pub mod provider;
pub mod race;
pub mod report;
pub mod scheduler;
pub mod simulator;
pub mod sink;

pub use config::SimConfig;
pub use errors::{SimError, SinkError};
pub use provider::{DivisionCounts, RaceProvider, RaceRecords, Roster, StaticProvider};
pub use race::Race;
pub use report::{RaceResults, ResultRow};
pub use sink::{EventSink, HttpSink, LogSink};
