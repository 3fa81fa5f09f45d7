//! Finishing-order results.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use time::Date;

use crate::clock::RaceOutcome;
use crate::context::{PhaseCounts, format_duration};
use crate::dispatch::DeliveryStats;
use crate::errors::SimError;
use crate::models::{Status, division_label};

/// One athlete's line in the results, rank being the position in the finished list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
    pub rank: usize,
    #[serde(rename = "racenum")]
    pub race_num: u32,
    pub name: String,
    pub division: String,
    #[serde(serialize_with = "status_str")]
    pub status: Status,
    #[serde(rename = "total", serialize_with = "hms")]
    pub total_sec: f64,
    #[serde(rename = "swim", serialize_with = "hms")]
    pub swim_sec: f64,
    #[serde(rename = "t1", serialize_with = "hms")]
    pub t1_sec: f64,
    #[serde(rename = "bike", serialize_with = "hms")]
    pub bike_sec: f64,
    #[serde(rename = "t2", serialize_with = "hms")]
    pub t2_sec: f64,
    #[serde(rename = "run", serialize_with = "hms")]
    pub run_sec: f64,
    pub latitude: f64,
    pub longitude: f64,
}

fn hms<S: serde::Serializer>(seconds: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_duration(*seconds))
}

fn status_str<S: serde::Serializer>(status: &Status, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(status)
}

#[derive(Debug, Clone)]
pub struct RaceResults {
    pub race_id: String,
    pub rows: Vec<ResultRow>,
    pub counts: PhaseCounts,
    pub delivery: DeliveryStats,
    /// Race seconds from the gun to the last tick.
    pub elapsed: f64,
}

impl RaceResults {
    pub fn new(
        race_id: impl Into<String>,
        race_day: Date,
        outcome: RaceOutcome,
        delivery: DeliveryStats,
    ) -> Self {
        let rows = outcome
            .finished
            .iter()
            .enumerate()
            .map(|(i, sim)| {
                let athlete = sim.athlete();
                let state = sim.state();
                ResultRow {
                    rank: i + 1,
                    race_num: state.race_num,
                    name: athlete.name.clone(),
                    division: division_label(
                        athlete.division,
                        athlete.gender,
                        &athlete.birthdate,
                        race_day,
                    ),
                    status: state.status,
                    total_sec: state.total_sec(),
                    swim_sec: state.swim_sec,
                    t1_sec: state.t1_sec,
                    bike_sec: state.bike_sec,
                    t2_sec: state.t2_sec,
                    run_sec: state.run_sec,
                    latitude: state.location.y(),
                    longitude: state.location.x(),
                }
            })
            .collect();
        Self {
            race_id: race_id.into(),
            rows,
            counts: outcome.counts,
            delivery,
            elapsed: outcome.elapsed,
        }
    }

    pub fn finishers(&self) -> impl Iterator<Item = &ResultRow> {
        self.rows.iter().filter(|r| r.status == Status::Finished)
    }

    pub fn write_csv<W: Write>(&self, out: W) -> Result<(), SimError> {
        let mut writer = csv::Writer::from_writer(out);
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the CSV report to `path`, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        self.write_csv(fs::File::create(path)?)
    }
}
