//! Roster files and selection of a race field from a pool of athletes.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use racesim::models::{AthleteRecord, Division};
use racesim::provider::{DivisionCounts, Roster};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Need {wanted} {division} athletes but only {available} are available")]
    NotEnough {
        division: &'static str,
        wanted: usize,
        available: usize,
    },
}

/// On-disk roster: either a bare list of athletes or a list with a start interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RosterFile {
    Plain(Vec<AthleteRecord>),
    WithSettings {
        athletes: Vec<AthleteRecord>,
        #[serde(default)]
        start_interval: Option<f64>,
    },
}

impl RosterFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RosterError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn into_roster(self) -> Roster {
        match self {
            RosterFile::Plain(athletes) => Roster {
                athletes,
                start_interval: None,
            },
            RosterFile::WithSettings {
                athletes,
                start_interval,
            } => Roster {
                athletes,
                start_interval,
            },
        }
    }
}

/// Picks `counts` athletes at random from `pool`: male pros first, then female pros, then
/// age groupers.
pub fn select(
    pool: &[AthleteRecord],
    counts: DivisionCounts,
    rng: &mut impl Rng,
) -> Result<Vec<AthleteRecord>, RosterError> {
    let mut field = Vec::with_capacity(counts.total());
    for (division, wanted) in [
        (Division::MalePro, counts.male_pro),
        (Division::FemalePro, counts.female_pro),
        (Division::AgeGroup, counts.age_group),
    ] {
        let mut candidates: Vec<&AthleteRecord> =
            pool.iter().filter(|a| a.division == division).collect();
        if candidates.len() < wanted {
            return Err(RosterError::NotEnough {
                division: division.as_str(),
                wanted,
                available: candidates.len(),
            });
        }
        let (picked, _) = candidates.partial_shuffle(rng, wanted);
        field.extend(picked.iter().map(|a| (*a).clone()));
    }
    Ok(field)
}
