//! Course loading from a JSON course file or a directory of GPX tracks.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use gpx::{Gpx, read};
use racesim::SimError;
use racesim::athlete::{Cutoffs, RecordTimes};
use racesim::course::{Course, DisciplineCourse};
use racesim::provider::RaceRecords;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Official Kona distances, used when a GPX directory carries no metadata.
pub const KONA_DISTANCES_M: [f64; 3] = [3800.0, 180_000.0, 42_000.0];

#[derive(Debug, Error)]
pub enum CourseFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("GPX parse error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    #[error("No track points found in {0}")]
    NoPoints(String),
    #[error(transparent)]
    Invalid(#[from] SimError),
}

/// One discipline as stored on disk. Waypoints are `[lat, lon]` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegFile {
    pub official_distance_m: f64,
    #[serde(default)]
    pub timing_mats: Vec<usize>,
    pub waypoints: Vec<[f64; 2]>,
}

impl LegFile {
    fn to_course(&self) -> Result<DisciplineCourse, SimError> {
        let points: Vec<(f64, f64)> = self.waypoints.iter().map(|p| (p[0], p[1])).collect();
        DisciplineCourse::new(&points, self.timing_mats.clone(), self.official_distance_m)
    }
}

/// A complete course file: polylines plus optional records and cutoffs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseFile {
    pub name: String,
    pub swim: LegFile,
    pub bike: LegFile,
    pub run: LegFile,
    #[serde(default)]
    pub records: Option<RecordTimes>,
    #[serde(default)]
    pub cutoffs: Option<Cutoffs>,
}

impl CourseFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CourseFileError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn parse(json: &str) -> Result<Self, CourseFileError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_course(&self) -> Result<Course, CourseFileError> {
        Ok(Course {
            name: self.name.clone(),
            swim: self.swim.to_course()?,
            bike: self.bike.to_course()?,
            run: self.run.to_course()?,
        })
    }

    /// Records and cutoffs from the file, Kona values where absent.
    pub fn race_records(&self) -> RaceRecords {
        RaceRecords {
            records: self.records.unwrap_or_else(RecordTimes::kona),
            cutoffs: self.cutoffs.unwrap_or_else(Cutoffs::kona),
        }
    }
}

/// Loads a course and its records from a JSON file or a GPX directory.
pub fn load_course(path: impl AsRef<Path>) -> Result<(Course, RaceRecords), CourseFileError> {
    let path = path.as_ref();
    if path.is_dir() {
        let course = load_gpx_dir(path)?;
        return Ok((course, RaceRecords::default()));
    }
    let file = CourseFile::load(path)?;
    let course = file.to_course()?;
    info!(
        "Loaded course {} ({} swim, {} bike, {} run waypoints)",
        course.name,
        course.swim.len(),
        course.bike.len(),
        course.run.len()
    );
    Ok((course, file.race_records()))
}

/// Reads `swim.gpx`, `bike.gpx` and `run.gpx` from `dir`.
pub fn load_gpx_dir(dir: &Path) -> Result<Course, CourseFileError> {
    let [swim_m, bike_m, run_m] = KONA_DISTANCES_M;
    let leg = |file: &str, official: f64| -> Result<DisciplineCourse, CourseFileError> {
        let points = gpx_points(&dir.join(file))?;
        Ok(DisciplineCourse::new(&points, Vec::new(), official)?)
    };
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "course".to_string());
    Ok(Course {
        name,
        swim: leg("swim.gpx", swim_m)?,
        bike: leg("bike.gpx", bike_m)?,
        run: leg("run.gpx", run_m)?,
    })
}

/// Every track point of a GPX file as `(lat, lon)`.
pub fn gpx_points(path: &Path) -> Result<Vec<(f64, f64)>, CourseFileError> {
    let gpx: Gpx = read(BufReader::new(File::open(path)?))?;
    let points = points_of(&gpx);
    if points.is_empty() {
        return Err(CourseFileError::NoPoints(path.display().to_string()));
    }
    Ok(points)
}

fn points_of(gpx: &Gpx) -> Vec<(f64, f64)> {
    gpx.tracks
        .iter()
        .flat_map(|track| &track.segments)
        .flat_map(|segment| &segment.points)
        .map(|waypoint| {
            let point = waypoint.point();
            (point.y(), point.x())
        })
        .collect()
}
