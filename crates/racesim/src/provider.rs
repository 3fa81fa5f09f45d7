//! The course/record/roster provider the race is built from.

use serde::{Deserialize, Serialize};

use crate::athlete::{Cutoffs, RecordTimes};
use crate::course::Course;
use crate::models::AthleteRecord;

/// How many athletes of each division the race should have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivisionCounts {
    pub male_pro: usize,
    pub female_pro: usize,
    pub age_group: usize,
}

impl DivisionCounts {
    pub fn total(&self) -> usize {
        self.male_pro + self.female_pro + self.age_group
    }
}

/// Course records and cutoff times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaceRecords {
    pub records: RecordTimes,
    pub cutoffs: Cutoffs,
}

impl Default for RaceRecords {
    fn default() -> Self {
        Self {
            records: RecordTimes::kona(),
            cutoffs: Cutoffs::kona(),
        }
    }
}

/// Athletes selected for one race, in race-number order.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    pub athletes: Vec<AthleteRecord>,
    /// Overrides the configured age-group start interval, in seconds.
    pub start_interval: Option<f64>,
}

/// Source of everything a race needs before the gun goes off.
///
/// Failures here are fatal to race setup.
pub trait RaceProvider {
    fn course(&self) -> anyhow::Result<Course>;

    fn records(&self) -> anyhow::Result<RaceRecords>;

    fn roster(&self, counts: DivisionCounts, seed: u64) -> anyhow::Result<Roster>;

    /// Race ids already registered, used to pick a fresh one.
    fn race_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Records `race_id` as taken so later setups skip it.
    fn register_race(&self, _race_id: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A provider over values already in memory. The roster is used as given.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    pub course: Course,
    pub records: RaceRecords,
    pub roster: Roster,
    pub race_ids: Vec<String>,
}

impl StaticProvider {
    pub fn new(course: Course, athletes: Vec<AthleteRecord>) -> Self {
        Self {
            course,
            records: RaceRecords::default(),
            roster: Roster {
                athletes,
                start_interval: None,
            },
            race_ids: Vec::new(),
        }
    }
}

impl RaceProvider for StaticProvider {
    fn course(&self) -> anyhow::Result<Course> {
        Ok(self.course.clone())
    }

    fn records(&self) -> anyhow::Result<RaceRecords> {
        Ok(self.records)
    }

    fn roster(&self, _counts: DivisionCounts, _seed: u64) -> anyhow::Result<Roster> {
        Ok(self.roster.clone())
    }

    fn race_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.race_ids.clone())
    }
}
