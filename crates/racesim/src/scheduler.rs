//! Wave starts.

use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::info;

use crate::config::Pacing;
use crate::models::Division;
use crate::simulator::AthleteSimulator;

/// An athlete handed to the race clock, eligible to start once the race clock reaches `at`.
pub struct Release {
    /// Race seconds since the gun.
    pub at: f64,
    pub simulator: AthleteSimulator,
}

/// Releases athletes into the race: the male pro wave, the female pro wave, then age
/// groupers one at a time.
pub struct StartScheduler {
    releases: Vec<Release>,
}

impl StartScheduler {
    /// `wave_gap` follows each non-empty pro wave; `start_interval` separates age-group starts.
    pub fn new(simulators: Vec<AthleteSimulator>, wave_gap: f64, start_interval: f64) -> Self {
        let (pros, age_groupers): (Vec<_>, Vec<_>) = simulators
            .into_iter()
            .partition(|sim| sim.athlete().division.is_pro());
        let (men, women): (Vec<_>, Vec<_>) = pros
            .into_iter()
            .partition(|sim| sim.athlete().division == Division::MalePro);

        let mut releases = Vec::new();
        let mut at = 0.0;
        for wave in [men, women] {
            if wave.is_empty() {
                continue;
            }
            releases.extend(wave.into_iter().map(|simulator| Release { at, simulator }));
            at += wave_gap;
        }
        for (i, simulator) in age_groupers.into_iter().enumerate() {
            releases.push(Release {
                at: at + i as f64 * start_interval,
                simulator,
            });
        }
        Self { releases }
    }

    /// Race-clock start offsets in release order, by race number.
    pub fn plan(&self) -> Vec<(u32, f64)> {
        self.releases
            .iter()
            .map(|r| (r.simulator.race_num(), r.at))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// Sends every release to the clock, sleeping between them according to `pacing`.
    pub fn spawn(self, clock: Sender<Release>, pacing: Pacing) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut last = 0.0;
            let mut wave = None;
            for release in self.releases {
                pacing.sleep(release.at - last);
                last = release.at;

                let division = release.simulator.athlete().division;
                let label = match division {
                    Division::MalePro => "Starting the Pro Men Race!",
                    Division::FemalePro => "Starting the Pro Women Race!",
                    Division::AgeGroup => "Starting the Age Groupers!",
                };
                if wave != Some(division) {
                    info!("{label}");
                    wave = Some(division);
                }

                if clock.send(release).is_err() {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::athlete::{Athlete, AthleteFields, Speeds};
    use crate::models::{Gender, Strengths};
    use geo::Point;

    fn sim(race_num: u32, division: Division) -> AthleteSimulator {
        let athlete = Athlete::from_fields(AthleteFields {
            id: race_num.to_string(),
            name: "x".into(),
            gender: Gender::Male,
            birthdate: "1/1/1990".into(),
            division,
            strengths: Strengths {
                swim: 50.0,
                bike: 50.0,
                run: 50.0,
            },
            speeds: Speeds {
                swim: 1.0,
                bike: 1.0,
                run: 1.0,
            },
            device_id: race_num.to_string(),
        });
        AthleteSimulator::new(
            athlete,
            race_num,
            Point::new(0.0, 0.0),
            StdRng::seed_from_u64(race_num as u64),
        )
    }

    #[test]
    fn test_wave_order_and_offsets() {
        let roster = vec![
            sim(1, Division::AgeGroup),
            sim(2, Division::FemalePro),
            sim(3, Division::MalePro),
            sim(4, Division::AgeGroup),
            sim(5, Division::MalePro),
        ];
        let scheduler = StartScheduler::new(roster, 600.0, 6.0);
        assert_eq!(
            scheduler.plan(),
            vec![(3, 0.0), (5, 0.0), (2, 600.0), (1, 1200.0), (4, 1206.0)]
        );
    }

    #[test]
    fn test_no_gap_for_missing_pro_waves() {
        let roster = vec![sim(1, Division::AgeGroup), sim(2, Division::AgeGroup)];
        let scheduler = StartScheduler::new(roster, 600.0, 6.0);
        assert_eq!(scheduler.plan(), vec![(1, 0.0), (2, 6.0)]);
    }

    #[test]
    fn test_spawn_sends_everyone() {
        let roster = (1..=4).map(|n| sim(n, Division::AgeGroup)).collect();
        let (tx, rx) = mpsc::channel();
        StartScheduler::new(roster, 600.0, 6.0)
            .spawn(tx, Pacing::unthrottled())
            .join()
            .unwrap();
        let nums: Vec<u32> = rx.iter().map(|r| r.simulator.race_num()).collect();
        assert_eq!(nums, vec![1, 2, 3, 4]);
    }
}
