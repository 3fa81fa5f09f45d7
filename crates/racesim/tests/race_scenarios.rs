use std::sync::{Arc, Mutex};

use racesim::config::{PacingConfig, Routing};
use racesim::course::{Course, DisciplineCourse};
use racesim::models::{AthleteRecord, Division, Gender, Status};
use racesim::{EventSink, Race, RaceResults, SimConfig, SinkError, StaticProvider};
use serde_json::Value;
use time::macros::datetime;

const FACTS: [&str; 6] = [
    "RaceStart",
    "EnterT1",
    "BikeStart",
    "EnterT2",
    "RunStart",
    "RaceFinish",
];

/// Accepts everything after failing the first `failures` submissions.
struct RecordingSink {
    failures: Mutex<u32>,
    accepted: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(failures),
            accepted: Mutex::new(Vec::new()),
        })
    }

    /// Fact kinds accepted for `race_num`, in delivery order.
    fn facts_for(&self, race_id: &str, race_num: u32) -> Vec<String> {
        let prefix = format!("{race_id}-");
        self.accepted
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| *key == race_num.to_string())
            .filter_map(|(_, collection)| collection.strip_prefix(&prefix))
            .map(str::to_string)
            .collect()
    }

    fn count(&self, collection: &str) -> usize {
        self.accepted
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, c)| c == collection)
            .count()
    }
}

impl EventSink for RecordingSink {
    fn submit(&self, key: &str, _payload: &Value, collection: &str) -> Result<(), SinkError> {
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SinkError::Unavailable("collector restarting".into()));
            }
        }
        self.accepted
            .lock()
            .unwrap()
            .push((key.to_string(), collection.to_string()));
        Ok(())
    }
}

fn leg(from: f64, to: f64, official: f64) -> DisciplineCourse {
    DisciplineCourse::new(&[(from, -155.99), (to, -155.99)], vec![], official).unwrap()
}

fn two_point_course() -> Course {
    Course {
        name: "two-point".into(),
        swim: leg(19.600, 19.609, 1000.0),
        bike: leg(19.609, 19.645, 4000.0),
        run: leg(19.645, 19.663, 2000.0),
    }
}

fn record(id: &str, gender: Gender, division: Division) -> AthleteRecord {
    AthleteRecord {
        id: id.into(),
        name: format!("Athlete {id}"),
        gender,
        birthdate: "4/17/1985".into(),
        division,
        swim_strength: 90,
        bike_strength: 90,
        run_strength: 90,
        device_id: format!("dev-{id}"),
    }
}

fn provider() -> StaticProvider {
    StaticProvider::new(
        two_point_course(),
        vec![
            record("a1", Gender::Female, Division::AgeGroup),
            record("p1", Gender::Male, Division::MalePro),
            record("a2", Gender::Male, Division::AgeGroup),
        ],
    )
}

fn config(routing: Routing) -> SimConfig {
    SimConfig {
        cycle_seconds: 300.0,
        speed_factor: 0.0,
        reporter_threads: 4,
        routing,
        seed: Some(2024),
        pacing: PacingConfig::without_randomness(),
        ..SimConfig::default()
    }
}

fn run(provider: &StaticProvider, config: &SimConfig, sink: Arc<RecordingSink>) -> RaceResults {
    let gun = datetime!(2024-10-12 06:25:00 UTC);
    Race::setup_at(provider, config, gun).unwrap().run(sink)
}

#[test]
fn test_every_athlete_reports_each_fact_once_in_order() {
    let sink = RecordingSink::new(0);
    let results = run(&provider(), &config(Routing::Sticky), sink.clone());

    assert_eq!(results.race_id, "2024-10-12-1");
    assert_eq!(results.rows.len(), 3);
    assert_eq!(results.counts.finished, 3);
    for race_num in 1..=3 {
        assert_eq!(sink.facts_for(&results.race_id, race_num), FACTS);
    }
    assert_eq!(sink.count("racelist"), 1);
    assert_eq!(sink.count("2024-10-12-1-racenumbers"), 1);
    assert_eq!(results.delivery.dropped, 0);
    assert_eq!(
        results.delivery.delivered as usize,
        sink.accepted.lock().unwrap().len()
    );
}

#[test]
fn test_pro_starts_first() {
    let sink = RecordingSink::new(0);
    let results = run(&provider(), &config(Routing::Sticky), sink);
    // race number 2 is the only pro and the only one with a 600 s head start
    let pro = results.rows.iter().find(|r| r.race_num == 2).unwrap();
    assert_eq!(pro.division, "MPRO");
    assert_eq!(results.rows[0].race_num, 2);
    let age_grouper = results.rows.iter().find(|r| r.race_num == 1).unwrap();
    assert_eq!(age_grouper.division, "F35-39");
}

#[test]
fn test_failing_sink_still_delivers_facts_exactly_once() {
    let sink = RecordingSink::new(2);
    let results = run(&provider(), &config(Routing::Sticky), sink.clone());

    for race_num in 1..=3 {
        assert_eq!(sink.facts_for(&results.race_id, race_num), FACTS);
    }
    assert_eq!(sink.count("racelist"), 1);
    assert_eq!(results.delivery.retried + results.delivery.dropped, 2);
}

#[test]
fn test_missed_swim_cutoff_never_reaches_t1() {
    let mut provider = provider();
    provider.records.cutoffs.swim = 600.0;
    let sink = RecordingSink::new(0);
    let results = run(&provider, &config(Routing::Sticky), sink.clone());

    assert_eq!(results.counts.dnf, 3);
    assert_eq!(results.counts.swim, 0);
    assert_eq!(results.counts.finished, 0);
    assert!(results.rows.iter().all(|r| r.status == Status::Dnf));
    assert!(results.rows.iter().all(|r| r.t1_sec == 0.0));
    for race_num in 1..=3 {
        assert_eq!(sink.facts_for(&results.race_id, race_num), ["RaceStart", "DNF"]);
    }
}

#[test]
fn test_round_robin_delivers_everything() {
    let sink = RecordingSink::new(0);
    let results = run(&provider(), &config(Routing::RoundRobin), sink.clone());

    for kind in FACTS {
        assert_eq!(sink.count(&format!("{}-{kind}", results.race_id)), 3);
    }
    assert_eq!(
        results.delivery.delivered as usize,
        sink.accepted.lock().unwrap().len()
    );
}

#[test]
fn test_same_seed_same_results() {
    let a = run(&provider(), &config(Routing::Sticky), RecordingSink::new(0));
    let b = run(&provider(), &config(Routing::Sticky), RecordingSink::new(0));
    assert_eq!(a.rows, b.rows);
}
