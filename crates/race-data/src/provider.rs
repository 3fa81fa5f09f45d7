//! File-backed race provider.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use rand::SeedableRng;
use rand::rngs::StdRng;
use racesim::SimConfig;
use racesim::course::Course;
use racesim::models::AthleteRecord;
use racesim::provider::{DivisionCounts, RaceProvider, RaceRecords, Roster};
use tracing::info;

use crate::course_file::load_course;
use crate::generators::AthleteGenerator;
use crate::roster::{RosterFile, select};

/// Keeps roster draws independent of the race's own random stream.
const ROSTER_SEED_SALT: u64 = 0x6b6f_6e61;

/// Course from a file or GPX directory; athletes from a roster file or generated.
///
/// Issued race ids are kept in a plain text file, one per line, when one is configured.
pub struct FileProvider {
    course: Course,
    records: RaceRecords,
    pool: Option<Vec<AthleteRecord>>,
    start_interval: Option<f64>,
    generator: AthleteGenerator,
    race_list: Option<PathBuf>,
}

impl FileProvider {
    /// Loads the course eagerly so a bad file fails before anything starts.
    pub fn open(course_path: impl AsRef<Path>, roster_path: Option<&Path>) -> anyhow::Result<Self> {
        let course_path = course_path.as_ref();
        let (course, records) = load_course(course_path)
            .with_context(|| format!("loading course from {}", course_path.display()))?;

        let (pool, start_interval) = match roster_path {
            Some(path) => {
                let roster = RosterFile::load(path)
                    .with_context(|| format!("loading roster from {}", path.display()))?
                    .into_roster();
                info!("Loaded {} athletes from {}", roster.athletes.len(), path.display());
                (Some(roster.athletes), roster.start_interval)
            }
            None => (None, None),
        };

        Ok(Self {
            course,
            records,
            pool,
            start_interval,
            generator: AthleteGenerator::new(),
            race_list: None,
        })
    }

    pub fn from_config(config: &SimConfig) -> anyhow::Result<Self> {
        let roster = config.roster_file.as_ref().map(PathBuf::from);
        Ok(Self::open(&config.course_file, roster.as_deref())?
            .with_race_list(&config.race_list_file))
    }

    pub fn with_generator(mut self, generator: AthleteGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_race_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.race_list = Some(path.into());
        self
    }
}

impl RaceProvider for FileProvider {
    fn course(&self) -> anyhow::Result<Course> {
        Ok(self.course.clone())
    }

    fn records(&self) -> anyhow::Result<RaceRecords> {
        Ok(self.records)
    }

    fn roster(&self, counts: DivisionCounts, seed: u64) -> anyhow::Result<Roster> {
        let mut rng = StdRng::seed_from_u64(seed ^ ROSTER_SEED_SALT);
        let athletes = match &self.pool {
            Some(pool) => select(pool, counts, &mut rng)?,
            None => {
                info!("Generating {} athletes", counts.total());
                self.generator.generate_roster(counts, &mut rng)
            }
        };
        Ok(Roster {
            athletes,
            start_interval: self.start_interval,
        })
    }

    fn race_ids(&self) -> anyhow::Result<Vec<String>> {
        let Some(path) = &self.race_list else {
            return Ok(Vec::new());
        };
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading race list {}", path.display()));
            }
        };
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    fn register_race(&self, race_id: &str) -> anyhow::Result<()> {
        let Some(path) = &self.race_list else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating race list directory {}", dir.display()))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening race list {}", path.display()))?;
        writeln!(file, "{race_id}")
            .with_context(|| format!("writing race list {}", path.display()))?;
        info!("Registered race {race_id} in {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::AthleteGenConfig;
    use racesim::Race;
    use racesim::models::{Division, Gender};
    use time::macros::datetime;

    fn kona() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("data/kona.json")
    }

    #[test]
    fn test_generated_roster_matches_counts() {
        let provider = FileProvider::open(kona(), None).unwrap();
        let counts = DivisionCounts {
            male_pro: 1,
            female_pro: 1,
            age_group: 4,
        };
        let roster = provider.roster(counts, 11).unwrap();
        assert_eq!(roster.athletes.len(), 6);
        assert_eq!(roster.athletes[0].division, Division::MalePro);
        assert_eq!(roster.athletes[1].division, Division::FemalePro);

        let again = provider.roster(counts, 11).unwrap();
        assert_eq!(roster.athletes[3].id, again.athletes[3].id);
    }

    #[test]
    fn test_missing_course_is_an_error() {
        let err = FileProvider::open("no/such/course.json", None).err().unwrap();
        assert!(format!("{err:#}").contains("no/such/course.json"));
    }

    #[test]
    fn test_roster_file_selection() {
        let dir = std::env::temp_dir().join(format!("race-data-roster-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("roster.json");
        let generator = AthleteGenerator::new();
        let mut rng = StdRng::seed_from_u64(5);
        let pool = generator.generate_roster(
            DivisionCounts {
                male_pro: 0,
                female_pro: 0,
                age_group: 10,
            },
            &mut rng,
        );
        std::fs::write(&path, serde_json::to_string(&pool).unwrap()).unwrap();

        let provider = FileProvider::open(kona(), Some(&path)).unwrap();
        let counts = DivisionCounts {
            male_pro: 0,
            female_pro: 0,
            age_group: 3,
        };
        let roster = provider.roster(counts, 1).unwrap();
        assert_eq!(roster.athletes.len(), 3);
        assert!(roster.athletes.iter().all(|a| pool.iter().any(|p| p.id == a.id)));

        let too_many = DivisionCounts {
            male_pro: 1,
            ..counts
        };
        assert!(provider.roster(too_many, 1).is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_same_day_races_get_distinct_ids() {
        let dir = std::env::temp_dir().join(format!("race-data-racelist-{}", std::process::id()));
        std::fs::remove_dir_all(&dir).ok();
        let provider = FileProvider::open(kona(), None)
            .unwrap()
            .with_race_list(dir.join("racelist.txt"));
        let config = SimConfig {
            athlete_count: 2,
            seed: Some(3),
            ..SimConfig::default()
        };
        let gun = datetime!(2024-10-12 06:25:00 UTC);

        let first = Race::setup_at(&provider, &config, gun).unwrap();
        let second = Race::setup_at(&provider, &config, gun).unwrap();
        assert_eq!(first.id(), "2024-10-12-1");
        assert_eq!(second.id(), "2024-10-12-2");
        assert_eq!(
            provider.race_ids().unwrap(),
            vec!["2024-10-12-1".to_string(), "2024-10-12-2".to_string()]
        );

        let next_day = Race::setup_at(&provider, &config, datetime!(2024-10-13 06:25:00 UTC));
        assert_eq!(next_day.unwrap().id(), "2024-10-13-1");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_without_race_list_ids_are_not_tracked() {
        let provider = FileProvider::open(kona(), None).unwrap();
        provider.register_race("2024-10-12-1").unwrap();
        assert!(provider.race_ids().unwrap().is_empty());
    }

    #[test]
    fn test_custom_generator_is_used() {
        let generator = AthleteGenerator::with_config(AthleteGenConfig {
            female_share: 1.0,
            ..AthleteGenConfig::default()
        });
        let provider = FileProvider::open(kona(), None)
            .unwrap()
            .with_generator(generator);
        let counts = DivisionCounts {
            male_pro: 0,
            female_pro: 0,
            age_group: 8,
        };
        let roster = provider.roster(counts, 4).unwrap();
        assert!(roster.athletes.iter().all(|a| a.gender == Gender::Female));
    }
}
