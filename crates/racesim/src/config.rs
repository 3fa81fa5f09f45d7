//! Configuration for a simulated race.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SimError;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/data/";
pub const DEFAULT_API_KEY: &str = "youareanironman";

/// Top-level settings, normally read from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Base URL of the remote event collector.
    pub api_url: String,
    /// Key sent along with every submission.
    pub api_key: String,

    /// Number of age-group athletes.
    pub athlete_count: usize,
    /// Number of male professionals.
    pub pro_male_count: usize,
    /// Number of female professionals.
    pub pro_female_count: usize,

    /// Simulated seconds advanced per tick.
    pub cycle_seconds: f64,
    /// Simulated seconds between individual age-group starts.
    pub start_interval: f64,
    /// Simulated seconds between the start waves.
    pub wave_gap: f64,
    /// Simulated seconds per real second. `0` runs unthrottled.
    pub speed_factor: f64,

    /// Size of the transport worker pool.
    pub reporter_threads: usize,
    /// How events are assigned to transport workers.
    pub routing: Routing,

    /// Seed for every random draw in the race. Random if unset.
    pub seed: Option<u64>,

    /// Course file (JSON) or directory of GPX files.
    pub course_file: String,
    /// Roster file. Synthetic athletes are generated when unset.
    pub roster_file: Option<String>,
    /// Where the finishing-order CSV is written.
    pub results_file: String,
    /// Race ids issued so far, one per line.
    pub race_list_file: String,
    /// Log events instead of posting them.
    pub dry_run: bool,

    pub pacing: PacingConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            athlete_count: 5,
            pro_male_count: 0,
            pro_female_count: 0,
            cycle_seconds: 60.0,
            start_interval: 6.0,
            wave_gap: 600.0,
            speed_factor: 60.0,
            reporter_threads: 20,
            routing: Routing::Sticky,
            seed: None,
            course_file: "crates/race-data/data/kona.json".to_string(),
            roster_file: None,
            results_file: "data/raceresults.csv".to_string(),
            race_list_file: "data/racelist.txt".to_string(),
            dry_run: false,
            pacing: PacingConfig::default(),
        }
    }
}

impl SimConfig {
    /// Reads settings from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, SimError> {
        let defaults = Self::default();
        let config = Self {
            api_url: env::var("API_URL").unwrap_or(defaults.api_url),
            api_key: env::var("API_KEY").unwrap_or(defaults.api_key),
            athlete_count: env_or("ATH_COUNT", defaults.athlete_count)?,
            pro_male_count: env_or("PROM_COUNT", defaults.pro_male_count)?,
            pro_female_count: env_or("PROF_COUNT", defaults.pro_female_count)?,
            cycle_seconds: env_or("CYCLE_TIME", defaults.cycle_seconds)?,
            start_interval: env_or("START_INTERVAL", defaults.start_interval)?,
            wave_gap: env_or("WAVE_GAP", defaults.wave_gap)?,
            speed_factor: env_or("SPEED_FACTOR", defaults.speed_factor)?,
            reporter_threads: env_or("REPORTER_THREADS", defaults.reporter_threads)?,
            routing: env_or("ROUTING", defaults.routing)?,
            seed: match env::var("RACE_SEED") {
                Ok(raw) => Some(parse_var("RACE_SEED", &raw)?),
                Err(_) => None,
            },
            course_file: env::var("COURSE_FILE").unwrap_or(defaults.course_file),
            roster_file: env::var("ROSTER_FILE").ok(),
            results_file: env::var("RESULTS_FILE").unwrap_or(defaults.results_file),
            race_list_file: env::var("RACE_LIST_FILE").unwrap_or(defaults.race_list_file),
            dry_run: env_or("DRY_RUN", defaults.dry_run)?,
            pacing: defaults.pacing,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        if !self.cycle_seconds.is_finite() || self.cycle_seconds <= 0.0 {
            return Err(SimError::Config("CYCLE_TIME must be a positive number".into()));
        }
        if !self.speed_factor.is_finite() || self.speed_factor < 0.0 {
            return Err(SimError::Config("SPEED_FACTOR must be a non-negative number".into()));
        }
        for (name, value) in [
            ("START_INTERVAL", self.start_interval),
            ("WAVE_GAP", self.wave_gap),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::Config(format!("{name} must be a non-negative number")));
            }
        }
        if self.reporter_threads == 0 {
            return Err(SimError::Config("REPORTER_THREADS must be at least 1".into()));
        }
        if self.pacing.batch_tiers.is_empty() {
            return Err(SimError::Config("at least one batch tier is required".into()));
        }
        let pacing = &self.pacing;
        for (name, (lo, hi)) in [
            ("pace noise", pacing.pace_noise),
            ("speed jitter", pacing.speed_jitter),
            ("external factor", pacing.external_factor_range),
            ("transition", pacing.transition_secs),
            ("pro transition", pacing.pro_transition_secs),
        ] {
            if lo > hi || !lo.is_finite() || !hi.is_finite() {
                return Err(SimError::Config(format!("{name} range {lo}..{hi} is empty")));
            }
        }
        if !(0.0..=1.0).contains(&pacing.flush_probability) {
            return Err(SimError::Config("flush probability must be within 0..=1".into()));
        }
        Ok(())
    }

    pub fn clock_pacing(&self) -> Pacing {
        Pacing::new(self.speed_factor)
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T, SimError> {
    match env::var(name) {
        Ok(raw) => parse_var(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T, SimError> {
    raw.trim()
        .parse()
        .map_err(|_| SimError::Config(format!("{name} has an invalid value: {raw:?}")))
}

/// Worker assignment policy for dispatched events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Routing {
    /// Events with a route key always go to the same worker, preserving per-athlete order.
    Sticky,
    /// Global round-robin across workers.
    RoundRobin,
}

impl FromStr for Routing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sticky" => Ok(Routing::Sticky),
            "round-robin" | "roundrobin" => Ok(Routing::RoundRobin),
            other => Err(format!("unknown routing policy {other}")),
        }
    }
}

/// Location batch threshold that applies once the backlog reaches `min_backlog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchTier {
    pub min_backlog: usize,
    pub threshold: usize,
}

/// Per-tick "one in n" incident odds. `0` disables incidents for that discipline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IncidentOdds {
    pub swim: u32,
    pub bike: u32,
    pub run: u32,
}

/// Tunable constants of the race model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Noise added to the pace percentage before the external factor is applied.
    pub pace_noise: (f64, f64),
    /// Per-tick speed multiplier range.
    pub speed_jitter: (f64, f64),
    /// Range of race-wide wind and heat factors.
    pub external_factor_range: (f64, f64),
    /// Transition dwell time for age groupers, in seconds.
    pub transition_secs: (f64, f64),
    /// Transition dwell time for professionals, in seconds.
    pub pro_transition_secs: (f64, f64),
    pub incident_odds: IncidentOdds,
    /// Backlog tiers, smaller thresholds as the backlog grows.
    pub batch_tiers: Vec<BatchTier>,
    /// Chance that an eligible ping buffer is flushed on a given tick.
    pub flush_probability: f64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            pace_noise: (-0.07, 0.07),
            speed_jitter: (0.9, 1.1),
            external_factor_range: (0.9, 1.02),
            transition_secs: (90.0, 600.0),
            pro_transition_secs: (60.0, 180.0),
            incident_odds: IncidentOdds {
                swim: 8000,
                bike: 10000,
                run: 8000,
            },
            batch_tiers: vec![
                BatchTier {
                    min_backlog: 0,
                    threshold: 20,
                },
                BatchTier {
                    min_backlog: 50,
                    threshold: 10,
                },
                BatchTier {
                    min_backlog: 200,
                    threshold: 5,
                },
                BatchTier {
                    min_backlog: 1000,
                    threshold: 2,
                },
            ],
            flush_probability: 0.5,
        }
    }
}

impl PacingConfig {
    /// Batch threshold for the current backlog: the tier with the highest `min_backlog`
    /// not above it.
    pub fn batch_threshold(&self, backlog: usize) -> usize {
        self.batch_tiers
            .iter()
            .filter(|tier| tier.min_backlog <= backlog)
            .max_by_key(|tier| tier.min_backlog)
            .or_else(|| self.batch_tiers.iter().min_by_key(|tier| tier.min_backlog))
            .map_or(1, |tier| tier.threshold.max(1))
    }

    /// Deterministic race for tests: no incidents, no per-tick jitter.
    pub fn without_randomness() -> Self {
        Self {
            pace_noise: (0.0, 0.0),
            speed_jitter: (1.0, 1.0),
            external_factor_range: (1.0, 1.0),
            incident_odds: IncidentOdds {
                swim: 0,
                bike: 0,
                run: 0,
            },
            ..Self::default()
        }
    }
}

/// Maps simulated seconds to real sleeps.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    speed_factor: f64,
}

impl Pacing {
    pub fn new(speed_factor: f64) -> Self {
        Self { speed_factor }
    }

    pub fn unthrottled() -> Self {
        Self { speed_factor: 0.0 }
    }

    pub fn is_unthrottled(&self) -> bool {
        self.speed_factor <= 0.0
    }

    /// Real duration corresponding to `sim_seconds` of race time.
    pub fn real_duration(&self, sim_seconds: f64) -> Option<Duration> {
        if self.is_unthrottled() || sim_seconds <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(sim_seconds / self.speed_factor))
    }

    pub fn sleep(&self, sim_seconds: f64) {
        if let Some(real) = self.real_duration(sim_seconds) {
            std::thread::sleep(real);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_threshold_shrinks_with_backlog() {
        let pacing = PacingConfig::default();
        assert_eq!(pacing.batch_threshold(0), 20);
        assert_eq!(pacing.batch_threshold(60), 10);
        assert_eq!(pacing.batch_threshold(500), 5);
        assert_eq!(pacing.batch_threshold(50_000), 2);
    }

    #[test]
    fn test_batch_threshold_below_first_tier() {
        let pacing = PacingConfig {
            batch_tiers: vec![BatchTier {
                min_backlog: 10,
                threshold: 4,
            }],
            ..PacingConfig::default()
        };
        assert_eq!(pacing.batch_threshold(0), 4);
    }

    #[test]
    fn test_routing_parse() {
        assert_eq!("sticky".parse::<Routing>().unwrap(), Routing::Sticky);
        assert_eq!("round-robin".parse::<Routing>().unwrap(), Routing::RoundRobin);
        assert!("random".parse::<Routing>().is_err());
    }

    #[test]
    fn test_pacing_scales_sleep() {
        let pacing = Pacing::new(60.0);
        assert_eq!(pacing.real_duration(60.0), Some(Duration::from_secs(1)));
        assert_eq!(Pacing::unthrottled().real_duration(60.0), None);
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let config = SimConfig {
            reporter_threads: 0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite_timing() {
        for cycle_seconds in [f64::NAN, f64::INFINITY] {
            let config = SimConfig {
                cycle_seconds,
                ..SimConfig::default()
            };
            assert!(config.validate().is_err(), "accepted CYCLE_TIME={cycle_seconds}");
        }
        for speed_factor in [f64::NAN, f64::INFINITY] {
            let config = SimConfig {
                speed_factor,
                ..SimConfig::default()
            };
            assert!(config.validate().is_err(), "accepted SPEED_FACTOR={speed_factor}");
        }
        assert!(parse_var::<f64>("CYCLE_TIME", "NaN").is_ok_and(f64::is_nan));
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_flush_probability() {
        let mut config = SimConfig::default();
        config.pacing.flush_probability = 1.5;
        assert!(config.validate().is_err());
    }
}
