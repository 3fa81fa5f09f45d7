use std::fmt;

use serde::{Deserialize, Serialize};
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    fn letter(&self) -> char {
        match self {
            Gender::Male => 'M',
            Gender::Female => 'F',
        }
    }
}

/// Start division. Professionals race in their own waves; everyone else is an age grouper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Division {
    MalePro,
    FemalePro,
    AgeGroup,
}

impl Division {
    pub fn is_pro(&self) -> bool {
        matches!(self, Division::MalePro | Division::FemalePro)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Division::MalePro => "MPRO",
            Division::FemalePro => "FPRO",
            Division::AgeGroup => "AG",
        }
    }
}

impl From<String> for Division {
    fn from(value: String) -> Self {
        match value.as_str() {
            "MPRO" => Division::MalePro,
            "FPRO" => Division::FemalePro,
            _ => Division::AgeGroup,
        }
    }
}

impl From<Division> for String {
    fn from(value: Division) -> Self {
        value.as_str().to_string()
    }
}

/// The three disciplines of the race, in race order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Discipline {
    Swim,
    Bike,
    Run,
}

impl Discipline {
    pub const ALL: [Discipline; 3] = [Discipline::Swim, Discipline::Bike, Discipline::Run];

    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::Swim => "swim",
            Discipline::Bike => "bike",
            Discipline::Run => "run",
        }
    }
}

/// Race status of one athlete.
///
/// Statuses only move forward in declaration order; `Dnf` is terminal and reachable from
/// `Swim`, `Bike` and `Run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Status {
    NotStarted,
    Swim,
    T1,
    Bike,
    T2,
    Run,
    Finished,
    Dnf,
}

impl Status {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Finished | Status::Dnf)
    }

    /// The discipline being raced in this status, if the athlete is on a course.
    pub fn discipline(&self) -> Option<Discipline> {
        match self {
            Status::Swim => Some(Discipline::Swim),
            Status::Bike => Some(Discipline::Bike),
            Status::Run => Some(Discipline::Run),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::NotStarted => "NotStarted",
            Status::Swim => "Swim",
            Status::T1 => "T1",
            Status::Bike => "Bike",
            Status::T2 => "T2",
            Status::Run => "Run",
            Status::Finished => "Finished",
            Status::Dnf => "DNF",
        };
        f.write_str(s)
    }
}

/// Strength ratings, roughly -25..100 where 100 is record pace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Strengths {
    pub swim: f64,
    pub bike: f64,
    pub run: f64,
}

impl Strengths {
    pub fn get(&self, discipline: Discipline) -> f64 {
        match discipline {
            Discipline::Swim => self.swim,
            Discipline::Bike => self.bike,
            Discipline::Run => self.run,
        }
    }
}

/// An athlete as stored by the roster provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthleteRecord {
    pub id: String,
    pub name: String,
    pub gender: Gender,
    /// Birthdate as `M/D/YYYY`.
    pub birthdate: String,
    #[serde(default = "default_division")]
    pub division: Division,
    #[serde(rename = "swimstr")]
    pub swim_strength: i32,
    #[serde(rename = "bikestr")]
    pub bike_strength: i32,
    #[serde(rename = "runstr")]
    pub run_strength: i32,
    #[serde(rename = "deviceid")]
    pub device_id: String,
}

fn default_division() -> Division {
    Division::AgeGroup
}

impl AthleteRecord {
    pub fn strengths(&self) -> Strengths {
        Strengths {
            swim: self.swim_strength as f64,
            bike: self.bike_strength as f64,
            run: self.run_strength as f64,
        }
    }
}

/// Birth year from an `M/D/YYYY` birthdate.
pub fn birth_year(birthdate: &str) -> Option<i32> {
    birthdate.split('/').nth(2)?.trim().parse().ok()
}

/// Division label used in results: `MPRO`, `FPRO`, or gender letter plus age band.
pub fn division_label(division: Division, gender: Gender, birthdate: &str, race_day: Date) -> String {
    if division.is_pro() {
        return division.as_str().to_string();
    }

    let Some(year) = birth_year(birthdate) else {
        return format!("{}AG", gender.letter());
    };
    let age = race_day.year() - year;
    let band = match age {
        i32::MIN..25 => "18-24",
        25..30 => "25-29",
        30..35 => "30-34",
        35..40 => "35-39",
        40..45 => "40-44",
        45..50 => "45-49",
        50..55 => "50-54",
        55..60 => "55-59",
        60..65 => "60-64",
        65..70 => "65-69",
        70..75 => "70-74",
        75..80 => "75-79",
        _ => "80+",
    };
    format!("{}{}", gender.letter(), band)
}
