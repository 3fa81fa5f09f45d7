//! Race setup and the top-level run.

use std::sync::Arc;
use std::sync::mpsc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value, json};
use time::{Date, OffsetDateTime};
use tracing::{error, info};

use crate::athlete::{Athlete, ExternalFactors, PaceModel};
use crate::clock::RaceClock;
use crate::config::SimConfig;
use crate::context::{RaceContext, RaceSettings};
use crate::dispatch::{DEFAULT_IDLE, Dispatcher};
use crate::errors::SimError;
use crate::event::{Collections, Event, Reporter};
use crate::provider::{DivisionCounts, RaceProvider};
use crate::report::RaceResults;
use crate::scheduler::StartScheduler;
use crate::simulator::AthleteSimulator;
use crate::sink::EventSink;

/// A race that has been set up and is ready to start.
pub struct Race {
    settings: Arc<RaceSettings>,
    config: SimConfig,
    simulators: Vec<AthleteSimulator>,
    start_interval: f64,
    factors: ExternalFactors,
    seed: u64,
}

impl Race {
    /// Loads course, records and roster from `provider` with the gun set to now.
    pub fn setup(provider: &dyn RaceProvider, config: &SimConfig) -> Result<Self, SimError> {
        Self::setup_at(provider, config, OffsetDateTime::now_utc())
    }

    pub fn setup_at(
        provider: &dyn RaceProvider,
        config: &SimConfig,
        gun: OffsetDateTime,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);

        let course = provider.course()?;
        let records = provider.records()?;
        let counts = DivisionCounts {
            male_pro: config.pro_male_count,
            female_pro: config.pro_female_count,
            age_group: config.athlete_count,
        };
        let roster = provider.roster(counts, seed)?;
        if roster.athletes.is_empty() {
            return Err(SimError::Roster("no athletes to race".into()));
        }

        let race_id = next_race_id(gun.date(), &provider.race_ids()?);
        provider.register_race(&race_id)?;
        let pacing = config.pacing.clone();
        let factors = ExternalFactors::draw(pacing.external_factor_range, &mut rng);
        let pace = PaceModel::new(
            &course,
            records.records,
            records.cutoffs,
            factors,
            pacing.pace_noise,
        );

        let start = course.swim.start();
        let simulators = roster
            .athletes
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                let athlete = Athlete::from_record(record, &pace, &mut rng);
                let athlete_rng = StdRng::seed_from_u64(rng.r#gen());
                AthleteSimulator::new(athlete, i as u32 + 1, start, athlete_rng)
            })
            .collect::<Vec<_>>();

        info!(
            "race {race_id} set up on {}: {} athletes, seed {seed}",
            course.name,
            simulators.len()
        );

        let settings = RaceSettings {
            course: Arc::new(course),
            cutoffs: records.cutoffs,
            pacing,
            collections: Collections::new(race_id),
            gun,
        };
        Ok(Self {
            settings: Arc::new(settings),
            config: config.clone(),
            simulators,
            start_interval: roster.start_interval.unwrap_or(config.start_interval),
            factors,
            seed,
        })
    }

    pub fn id(&self) -> &str {
        self.settings.collections.race_id()
    }

    pub fn settings(&self) -> &RaceSettings {
        &self.settings
    }

    pub fn simulators(&self) -> &[AthleteSimulator] {
        &self.simulators
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Runs the race to completion and waits for every event to be delivered.
    pub fn run(self, sink: Arc<dyn EventSink>) -> RaceResults {
        let config = self.config;
        let settings = self.settings;
        let collections = &settings.collections;
        let race_id = collections.race_id().to_string();

        let dispatcher = Dispatcher::start(
            sink,
            config.reporter_threads,
            config.routing,
            DEFAULT_IDLE,
        );
        let reporter: Arc<dyn Reporter> = Arc::new(dispatcher.handle());

        reporter.report(
            Event::new(
                race_id.clone(),
                json!({ "data": race_id }),
                Collections::RACE_LIST,
            )
            .with_priority(true),
        );
        let numbers: Map<String, Value> = self
            .simulators
            .iter()
            .map(|sim| (sim.race_num().to_string(), Value::String(sim.athlete().id.clone())))
            .collect();
        reporter.report(
            Event::new("racenumbers", Value::Object(numbers), collections.race_numbers())
                .with_priority(true),
        );

        info!(
            "Starting race {race_id}  windfactor={:.3}  heatfactor={:.3}",
            self.factors.wind, self.factors.heat
        );
        let race_day: Date = settings.gun.date();
        let pacing = config.clock_pacing();
        let ctx = RaceContext::new(settings.clone(), self.simulators.len(), reporter);
        let (tx, rx) = mpsc::channel();
        let scheduler = StartScheduler::new(self.simulators, config.wave_gap, self.start_interval)
            .spawn(tx, pacing);

        let outcome = RaceClock::new(ctx, rx, config.cycle_seconds).run(pacing);
        if scheduler.join().is_err() {
            error!("start scheduler panicked");
        }

        info!("race {race_id} over, draining event queues");
        let delivery = dispatcher.finish();
        RaceResults::new(race_id, race_day, outcome, delivery)
    }
}

/// `{date}-{n}` with the smallest `n >= 1` not already in `existing`.
pub fn next_race_id(day: Date, existing: &[String]) -> String {
    (1u32..)
        .map(|n| format!("{day}-{n}"))
        .find(|id| !existing.contains(id))
        .unwrap_or_else(|| format!("{day}-0"))
}

#[cfg(test)]
mod tests {
    use time::macros::date;

    use super::*;

    #[test]
    fn test_next_race_id_skips_used() {
        let day = date!(2024 - 10 - 12);
        assert_eq!(next_race_id(day, &[]), "2024-10-12-1");
        let used = vec!["2024-10-12-1".to_string(), "2024-10-12-2".to_string()];
        assert_eq!(next_race_id(day, &used), "2024-10-12-3");
        let other_day = vec!["2024-10-11-1".to_string()];
        assert_eq!(next_race_id(day, &other_day), "2024-10-12-1");
    }
}
