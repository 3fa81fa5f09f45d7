//! Race-wide state shared with every athlete simulator.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use crate::athlete::Cutoffs;
use crate::config::PacingConfig;
use crate::course::Course;
use crate::event::{Collections, Event, Reporter};
use crate::models::Status;

/// Immutable settings for one race.
#[derive(Debug, Clone)]
pub struct RaceSettings {
    pub course: Arc<Course>,
    pub cutoffs: Cutoffs,
    pub pacing: PacingConfig,
    pub collections: Collections,
    /// Wall-clock instant of the starting gun; event timestamps are offsets from it.
    pub gun: OffsetDateTime,
}

/// Number of athletes in each phase.
///
/// The tick driver is the only writer; the sum always equals the roster size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseCounts {
    pub not_started: usize,
    pub swim: usize,
    pub t1: usize,
    pub bike: usize,
    pub t2: usize,
    pub run: usize,
    pub finished: usize,
    pub dnf: usize,
}

impl PhaseCounts {
    pub fn with_roster(size: usize) -> Self {
        Self {
            not_started: size,
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.not_started
            + self.swim
            + self.t1
            + self.bike
            + self.t2
            + self.run
            + self.finished
            + self.dnf
    }

    pub fn racing(&self) -> usize {
        self.swim + self.t1 + self.bike + self.t2 + self.run
    }

    fn slot(&mut self, status: Status) -> &mut usize {
        match status {
            Status::NotStarted => &mut self.not_started,
            Status::Swim => &mut self.swim,
            Status::T1 => &mut self.t1,
            Status::Bike => &mut self.bike,
            Status::T2 => &mut self.t2,
            Status::Run => &mut self.run,
            Status::Finished => &mut self.finished,
            Status::Dnf => &mut self.dnf,
        }
    }

    /// Moves one athlete from `from` to `to`.
    pub fn shift(&mut self, from: Status, to: Status) {
        let source = self.slot(from);
        debug_assert!(*source > 0, "no athlete in {from} to move to {to}");
        *source = source.saturating_sub(1);
        *self.slot(to) += 1;
    }
}

/// Everything an athlete simulator needs besides its own state.
///
/// Owned by the tick driver and lent to each simulator during `advance`.
pub struct RaceContext {
    pub settings: Arc<RaceSettings>,
    pub counts: PhaseCounts,
    /// Race clock in seconds since the gun, at the end of the slice being simulated.
    pub elapsed: f64,
    reporter: Arc<dyn Reporter>,
}

impl RaceContext {
    pub fn new(settings: Arc<RaceSettings>, roster_size: usize, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            settings,
            counts: PhaseCounts::with_roster(roster_size),
            elapsed: 0.0,
            reporter,
        }
    }

    /// Wall-clock time at the end of the current slice.
    pub fn now(&self) -> OffsetDateTime {
        self.at(0.0)
    }

    /// Wall-clock time `seconds_before` the end of the current slice.
    pub fn at(&self, seconds_before: f64) -> OffsetDateTime {
        self.settings.gun + Duration::seconds_f64(self.elapsed - seconds_before)
    }

    /// Race clock formatted as `H:MM:SS`.
    pub fn race_timestamp(&self) -> String {
        format_duration(self.elapsed)
    }

    pub fn report(&self, event: Event) {
        self.reporter.report(event);
    }

    pub fn backlog(&self) -> usize {
        self.reporter.backlog()
    }
}

/// Formats seconds as `H:MM:SS`, truncating fractions.
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}
