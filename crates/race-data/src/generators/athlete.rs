//! Triathletes with birthdates, strength ratings and tracking devices.

use fake::{Fake, faker::name::en::Name};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use uuid::{Builder, Uuid};

use racesim::models::{AthleteRecord, Division, Gender};
use racesim::provider::DivisionCounts;

/// A birth-year band with the strength bonus athletes of that age get.
#[derive(Debug, Clone, Copy)]
pub struct AgeSlot {
    /// Relative weight of the slot.
    pub weight: u32,
    pub years: (i32, i32),
    pub age_factor: i32,
}

/// Configuration for athlete generation.
#[derive(Debug, Clone)]
pub struct AthleteGenConfig {
    /// Share of female age groupers.
    pub female_share: f64,
    pub strength_mean: f64,
    pub strength_std: f64,
    pub pro_strength_mean: f64,
    pub pro_strength_std: f64,
    /// Inclusive per-discipline offsets added to the base strength.
    pub swim_offset: (i32, i32),
    pub bike_offset: (i32, i32),
    pub run_offset: (i32, i32),
    pub age_slots: Vec<AgeSlot>,
}

impl Default for AthleteGenConfig {
    fn default() -> Self {
        Self {
            female_share: 0.35,
            strength_mean: 60.0,
            strength_std: 10.0,
            pro_strength_mean: 92.0,
            pro_strength_std: 4.0,
            swim_offset: (-20, 11),
            bike_offset: (-10, 11),
            run_offset: (-15, 11),
            // Kona field: most athletes in their 30s and 40s
            age_slots: vec![
                AgeSlot { weight: 1, years: (1995, 2007), age_factor: 0 },
                AgeSlot { weight: 3, years: (1985, 1995), age_factor: 10 },
                AgeSlot { weight: 3, years: (1975, 1985), age_factor: 5 },
                AgeSlot { weight: 2, years: (1965, 1975), age_factor: 0 },
                AgeSlot { weight: 1, years: (1955, 1965), age_factor: -20 },
                AgeSlot { weight: 2, years: (1935, 1955), age_factor: -40 },
            ],
        }
    }
}

pub const MIN_STRENGTH: i32 = -25;
pub const MAX_STRENGTH: i32 = 100;

/// Generates roster records.
pub struct AthleteGenerator {
    config: AthleteGenConfig,
}

impl AthleteGenerator {
    pub fn new() -> Self {
        Self {
            config: AthleteGenConfig::default(),
        }
    }

    pub fn with_config(config: AthleteGenConfig) -> Self {
        Self { config }
    }

    /// Generates one athlete of `division`. Ids and device ids come from `rng`, so a seeded
    /// generator is fully reproducible.
    pub fn generate(&self, division: Division, rng: &mut impl Rng) -> AthleteRecord {
        let gender = match division {
            Division::MalePro => Gender::Male,
            Division::FemalePro => Gender::Female,
            Division::AgeGroup if rng.gen_bool(self.config.female_share) => Gender::Female,
            Division::AgeGroup => Gender::Male,
        };
        let name: String = Name().fake_with_rng(rng);
        let (age_factor, birthdate) = self.birthdate(rng);

        let (mean, std) = if division.is_pro() {
            (self.config.pro_strength_mean, self.config.pro_strength_std)
        } else {
            (self.config.strength_mean, self.config.strength_std)
        };
        let base = normal_sample(mean, std, rng) as i32;
        let strength = if division.is_pro() {
            base
        } else {
            (base + age_factor).max(0)
        };

        AthleteRecord {
            id: random_uuid(rng).to_string(),
            name,
            gender,
            birthdate,
            division,
            swim_strength: offset_strength(strength, self.config.swim_offset, rng),
            bike_strength: offset_strength(strength, self.config.bike_offset, rng),
            run_strength: offset_strength(strength, self.config.run_offset, rng),
            device_id: random_uuid(rng).to_string(),
        }
    }

    /// Generates a full field: male pros, female pros, then age groupers.
    pub fn generate_roster(&self, counts: DivisionCounts, rng: &mut impl Rng) -> Vec<AthleteRecord> {
        let mut roster = Vec::with_capacity(counts.total());
        for (division, count) in [
            (Division::MalePro, counts.male_pro),
            (Division::FemalePro, counts.female_pro),
            (Division::AgeGroup, counts.age_group),
        ] {
            roster.extend((0..count).map(|_| self.generate(division, rng)));
        }
        roster
    }

    /// Draws a weighted age slot, returning its age factor and an `M/D/YYYY` birthdate.
    fn birthdate(&self, rng: &mut impl Rng) -> (i32, String) {
        let total: u32 = self.config.age_slots.iter().map(|s| s.weight).sum();
        let mut roll = rng.gen_range(0..total.max(1));
        let slot = self
            .config
            .age_slots
            .iter()
            .find(|slot| {
                if roll < slot.weight {
                    true
                } else {
                    roll -= slot.weight;
                    false
                }
            })
            .copied()
            .unwrap_or(AgeSlot {
                weight: 1,
                years: (1975, 1985),
                age_factor: 0,
            });

        let year = rng.gen_range(slot.years.0..=slot.years.1);
        let month = rng.gen_range(1..=12);
        let day = rng.gen_range(1..=28);
        (slot.age_factor, format!("{month}/{day}/{year}"))
    }
}

impl Default for AthleteGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn normal_sample(mean: f64, std: f64, rng: &mut impl Rng) -> f64 {
    match Normal::new(mean, std) {
        Ok(normal) => normal.sample(rng),
        Err(_) => mean,
    }
}

fn offset_strength(base: i32, offset: (i32, i32), rng: &mut impl Rng) -> i32 {
    (base + rng.gen_range(offset.0..=offset.1)).clamp(MIN_STRENGTH, MAX_STRENGTH)
}

fn random_uuid(rng: &mut impl Rng) -> Uuid {
    Builder::from_random_bytes(rng.r#gen()).into_uuid()
}
