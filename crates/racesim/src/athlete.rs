//! Athletes and the pace model that turns strength ratings into speeds.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::course::Course;
use crate::models::{AthleteRecord, Discipline, Division, Gender, Strengths};

/// Seconds per discipline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisciplineTimes {
    pub swim: f64,
    pub bike: f64,
    pub run: f64,
}

impl DisciplineTimes {
    pub fn get(&self, discipline: Discipline) -> f64 {
        match discipline {
            Discipline::Swim => self.swim,
            Discipline::Bike => self.bike,
            Discipline::Run => self.run,
        }
    }
}

/// Course record times by gender.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecordTimes {
    pub male: DisciplineTimes,
    pub female: DisciplineTimes,
}

impl RecordTimes {
    pub fn for_gender(&self, gender: Gender) -> &DisciplineTimes {
        match gender {
            Gender::Male => &self.male,
            Gender::Female => &self.female,
        }
    }

    /// Kona course records.
    pub fn kona() -> Self {
        Self {
            male: DisciplineTimes {
                swim: 2789.0,
                bike: 14676.0,
                run: 9375.0,
            },
            female: DisciplineTimes {
                swim: 2894.0,
                bike: 15967.0,
                run: 10103.0,
            },
        }
    }
}

/// Cutoff times in seconds.
///
/// `swim` and `bike` bound each discipline's own split; `run` only bounds the run pace
/// model; `race` bounds total elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cutoffs {
    pub swim: f64,
    pub bike: f64,
    pub run: f64,
    pub race: f64,
}

impl Cutoffs {
    pub fn kona() -> Self {
        Self {
            swim: 2.5 * 3600.0,
            bike: 8.0 * 3600.0,
            run: 8.0 * 3600.0,
            race: 17.0 * 3600.0,
        }
    }

    pub fn pace_bound(&self, discipline: Discipline) -> f64 {
        match discipline {
            Discipline::Swim => self.swim,
            Discipline::Bike => self.bike,
            Discipline::Run => self.run,
        }
    }
}

/// Race-wide conditions drawn once per race and applied to every athlete.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalFactors {
    pub wind: f64,
    pub heat: f64,
}

impl ExternalFactors {
    pub fn draw(range: (f64, f64), rng: &mut impl Rng) -> Self {
        Self {
            wind: rng.gen_range(range.0..=range.1),
            heat: rng.gen_range(range.0..=range.1),
        }
    }

    pub fn neutral() -> Self {
        Self {
            wind: 1.0,
            heat: 1.0,
        }
    }

    pub fn for_discipline(&self, discipline: Discipline) -> f64 {
        match discipline {
            Discipline::Swim => 1.0,
            Discipline::Bike => self.wind,
            Discipline::Run => self.heat,
        }
    }
}

/// Turns a strength rating into a target speed.
///
/// Simulated time sits between the record and the cutoff:
/// `time = (cutoff - record) * pct + record` with `pct = 1 - strength/100 + noise * factor`.
#[derive(Debug, Clone)]
pub struct PaceModel {
    records: RecordTimes,
    cutoffs: Cutoffs,
    factors: ExternalFactors,
    noise: (f64, f64),
    lengths_m: [f64; 3],
}

impl PaceModel {
    pub fn new(
        course: &Course,
        records: RecordTimes,
        cutoffs: Cutoffs,
        factors: ExternalFactors,
        noise: (f64, f64),
    ) -> Self {
        // official distance scaled by the length correction is the polyline length
        let lengths_m = Discipline::ALL.map(|d| {
            let leg = course.get(d);
            leg.official_distance_m() * leg.length_correction()
        });
        Self {
            records,
            cutoffs,
            factors,
            noise,
            lengths_m,
        }
    }

    /// Simulated split in seconds for the given strength and noise draw.
    pub fn split_time(
        &self,
        discipline: Discipline,
        gender: Gender,
        strength: f64,
        noise: f64,
    ) -> f64 {
        let record = self.records.for_gender(gender).get(discipline);
        let cutoff = self.cutoffs.pace_bound(discipline);
        let factor = self.factors.for_discipline(discipline);
        let pct = (1.0 - strength / 100.0 + noise * factor).max(0.0);
        (cutoff - record) * pct + record
    }

    /// Speed in m/s along the course polyline.
    pub fn speed(
        &self,
        discipline: Discipline,
        gender: Gender,
        strength: f64,
        rng: &mut impl Rng,
    ) -> f64 {
        let noise = rng.gen_range(self.noise.0..=self.noise.1);
        let time = self.split_time(discipline, gender, strength, noise);
        let index = match discipline {
            Discipline::Swim => 0,
            Discipline::Bike => 1,
            Discipline::Run => 2,
        };
        self.lengths_m[index] / time.max(1.0)
    }
}

/// Course speeds in m/s.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Speeds {
    pub swim: f64,
    pub bike: f64,
    pub run: f64,
}

impl Speeds {
    pub fn get(&self, discipline: Discipline) -> f64 {
        match discipline {
            Discipline::Swim => self.swim,
            Discipline::Bike => self.bike,
            Discipline::Run => self.run,
        }
    }
}

/// A competitor. Immutable once the race is set up.
#[derive(Debug, Clone)]
pub struct Athlete {
    pub id: String,
    pub name: String,
    pub gender: Gender,
    pub birthdate: String,
    pub division: Division,
    pub strengths: Strengths,
    pub speeds: Speeds,
    pub device_id: String,
}

impl Athlete {
    /// Builds an athlete from a roster record, deriving speeds from the pace model.
    pub fn from_record(record: AthleteRecord, pace: &PaceModel, rng: &mut impl Rng) -> Self {
        let strengths = record.strengths();
        let speeds = Speeds {
            swim: pace.speed(Discipline::Swim, record.gender, strengths.swim, rng),
            bike: pace.speed(Discipline::Bike, record.gender, strengths.bike, rng),
            run: pace.speed(Discipline::Run, record.gender, strengths.run, rng),
        };
        Self {
            id: record.id,
            name: record.name,
            gender: record.gender,
            birthdate: record.birthdate,
            division: record.division,
            strengths,
            speeds,
            device_id: record.device_id,
        }
    }

    /// Builds an athlete from explicit fields, bypassing the pace model.
    pub fn from_fields(fields: AthleteFields) -> Self {
        let AthleteFields {
            id,
            name,
            gender,
            birthdate,
            division,
            strengths,
            speeds,
            device_id,
        } = fields;
        Self {
            id,
            name,
            gender,
            birthdate,
            division,
            strengths,
            speeds,
            device_id,
        }
    }
}

/// Every field of an [`Athlete`], for building one without a roster record.
#[derive(Debug, Clone)]
pub struct AthleteFields {
    pub id: String,
    pub name: String,
    pub gender: Gender,
    /// `M/D/YYYY`.
    pub birthdate: String,
    pub division: Division,
    pub strengths: Strengths,
    pub speeds: Speeds,
    pub device_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::course::DisciplineCourse;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn straight(official: f64) -> DisciplineCourse {
        DisciplineCourse::new(&[(19.60, -155.99), (19.70, -155.99)], vec![], official).unwrap()
    }

    fn test_course() -> Course {
        Course {
            name: "test".into(),
            swim: straight(3800.0),
            bike: straight(180_000.0),
            run: straight(42_000.0),
        }
    }

    fn model(noise: (f64, f64)) -> PaceModel {
        PaceModel::new(
            &test_course(),
            RecordTimes::kona(),
            Cutoffs::kona(),
            ExternalFactors::neutral(),
            noise,
        )
    }

    #[test]
    fn test_split_time_bounds() {
        let pace = model((0.0, 0.0));
        let record = RecordTimes::kona().male.swim;
        let cutoff = Cutoffs::kona().swim;

        let elite = pace.split_time(Discipline::Swim, Gender::Male, 100.0, 0.0);
        let weakest = pace.split_time(Discipline::Swim, Gender::Male, 0.0, 0.0);
        assert!((elite - record).abs() < 1e-9);
        assert!((weakest - cutoff).abs() < 1e-9);
    }

    #[test]
    fn test_speed_covers_polyline_in_split_time() {
        let pace = model((0.0, 0.0));
        let mut rng = StdRng::seed_from_u64(7);
        let course = test_course();

        let speed = pace.speed(Discipline::Bike, Gender::Female, 60.0, &mut rng);
        let split = pace.split_time(Discipline::Bike, Gender::Female, 60.0, 0.0);
        assert!((course.bike.length_m() / speed - split).abs() < 1e-6);
    }

    #[test]
    fn test_external_factor_scales_noise() {
        let course = test_course();
        let windy = PaceModel::new(
            &course,
            RecordTimes::kona(),
            Cutoffs::kona(),
            ExternalFactors {
                wind: 2.0,
                heat: 1.0,
            },
            (0.0, 0.0),
        );
        let calm = model((0.0, 0.0));
        let a = windy.split_time(Discipline::Bike, Gender::Male, 50.0, 0.05);
        let b = calm.split_time(Discipline::Bike, Gender::Male, 50.0, 0.05);
        assert!(a > b);
        // swim ignores wind
        let c = windy.split_time(Discipline::Swim, Gender::Male, 50.0, 0.05);
        let d = calm.split_time(Discipline::Swim, Gender::Male, 50.0, 0.05);
        assert!((c - d).abs() < 1e-9);
    }

    #[test]
    fn test_same_seed_same_speeds() {
        let pace = model((-0.07, 0.07));
        let record = AthleteRecord {
            id: "1".into(),
            name: "A".into(),
            gender: Gender::Male,
            birthdate: "1/1/1990".into(),
            division: Division::AgeGroup,
            swim_strength: 55,
            bike_strength: 60,
            run_strength: 65,
            device_id: "dev".into(),
        };
        let a = Athlete::from_record(record.clone(), &pace, &mut StdRng::seed_from_u64(3));
        let b = Athlete::from_record(record, &pace, &mut StdRng::seed_from_u64(3));
        assert_eq!(a.speeds, b.speeds);
    }
}
