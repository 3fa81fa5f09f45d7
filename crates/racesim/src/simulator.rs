//! Per-athlete race state machine.
//!
//! ```text
//! NotStarted -> Swim -> T1 -> Bike -> T2 -> Run -> Finished
//!                 \____________\___________\____-> DNF
//! ```
//!
//! Statuses only move forward. Every transition emits exactly one priority event.

use std::sync::Arc;

use geo::Point;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::athlete::Athlete;
use crate::context::{RaceContext, format_duration};
use crate::course;
use crate::event::{Event, EventKind, encode_key, format_timestamp};
use crate::models::{Discipline, Status};

/// Mutable race state of one athlete, owned by its simulator.
#[derive(Debug, Clone, PartialEq)]
pub struct AthleteRaceState {
    pub status: Status,
    pub location: Point<f64>,
    /// Index of the last waypoint reached on the current discipline's course.
    pub leg: usize,
    pub swim_sec: f64,
    pub t1_sec: f64,
    pub bike_sec: f64,
    pub t2_sec: f64,
    pub run_sec: f64,
    pub race_num: u32,
}

impl AthleteRaceState {
    pub fn new(race_num: u32, location: Point<f64>) -> Self {
        Self {
            status: Status::NotStarted,
            location,
            leg: 0,
            swim_sec: 0.0,
            t1_sec: 0.0,
            bike_sec: 0.0,
            t2_sec: 0.0,
            run_sec: 0.0,
            race_num,
        }
    }

    pub fn total_sec(&self) -> f64 {
        self.swim_sec + self.t1_sec + self.bike_sec + self.t2_sec + self.run_sec
    }

    fn add_split(&mut self, discipline: Discipline, seconds: f64) {
        match discipline {
            Discipline::Swim => self.swim_sec += seconds,
            Discipline::Bike => self.bike_sec += seconds,
            Discipline::Run => self.run_sec += seconds,
        }
    }
}

/// Result of advancing an athlete by one slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Still on course, in the given status.
    Racing(Status),
    /// Finished or DNF. The caller must retire the athlete and never advance it again.
    Done,
}

pub struct AthleteSimulator {
    athlete: Athlete,
    state: AthleteRaceState,
    rng: StdRng,
    /// Drives flush timing only, so backlog-dependent batching never perturbs the race.
    telemetry_rng: StdRng,
    /// Seconds of transition dwell still to serve in T1/T2.
    dwell_left: f64,
    pings: Vec<Value>,
    ping_seq: u64,
}

impl AthleteSimulator {
    pub fn new(athlete: Athlete, race_num: u32, start: Point<f64>, mut rng: StdRng) -> Self {
        let telemetry_rng = StdRng::seed_from_u64(rng.r#gen());
        Self {
            athlete,
            state: AthleteRaceState::new(race_num, start),
            rng,
            telemetry_rng,
            dwell_left: 0.0,
            pings: Vec::new(),
            ping_seq: 0,
        }
    }

    pub fn athlete(&self) -> &Athlete {
        &self.athlete
    }

    pub fn state(&self) -> &AthleteRaceState {
        &self.state
    }

    pub fn race_num(&self) -> u32 {
        self.state.race_num
    }

    /// Pings buffered but not yet flushed.
    pub fn pending_pings(&self) -> usize {
        self.pings.len()
    }

    /// Fires the starting gun for this athlete at the current race clock.
    pub fn start(&mut self, ctx: &mut RaceContext) {
        debug_assert_eq!(self.state.status, Status::NotStarted);
        self.state.status = Status::Swim;
        self.state.leg = 0;
        self.state.location = ctx.settings.course.swim.start();
        ctx.counts.shift(Status::NotStarted, Status::Swim);
        self.fact(ctx, EventKind::RaceStart, 0.0);
        debug!("Race Start: {} has entered the water!", self.athlete.name);
    }

    /// Advances the athlete by `cycle_seconds` of race time ending at `ctx.now()`.
    pub fn advance(&mut self, ctx: &mut RaceContext, cycle_seconds: f64) -> Advance {
        debug_assert!(
            !self.state.status.is_terminal(),
            "advance called on retired athlete {}",
            self.state.race_num
        );
        match self.state.status {
            Status::Swim | Status::Bike | Status::Run => self.race_leg(ctx, cycle_seconds),
            Status::T1 | Status::T2 => self.dwell(ctx, cycle_seconds),
            Status::NotStarted => return Advance::Racing(Status::NotStarted),
            Status::Finished | Status::Dnf => return Advance::Done,
        }

        if self.state.status.is_terminal() {
            let threshold = ctx.settings.pacing.batch_threshold(ctx.backlog());
            self.flush_pings(ctx, threshold);
            return Advance::Done;
        }

        self.report_location(ctx);
        Advance::Racing(self.state.status)
    }

    /// Moves along the current discipline's course for `slice` seconds.
    fn race_leg(&mut self, ctx: &mut RaceContext, slice: f64) {
        let Some(discipline) = self.state.status.discipline() else {
            return;
        };
        if self.incident(ctx, discipline) {
            return;
        }

        let settings = Arc::clone(&ctx.settings);
        let course = settings.course.get(discipline);
        let (lo, hi) = settings.pacing.speed_jitter;
        let jitter = self.rng.gen_range(lo..=hi);
        let candidate = self.athlete.speeds.get(discipline) * jitter * slice;

        if candidate <= 0.0 {
            self.state.add_split(discipline, slice);
            self.check_cutoffs(ctx, discipline);
            return;
        }

        let mut distance_left = candidate;
        let mut time_left = slice;
        while distance_left > 0.0 {
            let next = course.waypoint(self.state.leg + 1);
            let leg_distance = course::distance(self.state.location, next);

            if leg_distance < distance_left {
                let leg_time = slice * (leg_distance / candidate);
                time_left = (time_left - leg_time).max(0.0);
                self.state.add_split(discipline, leg_time);
                distance_left -= leg_distance;
                self.state.location = next;
                self.state.leg += 1;

                if let Some(mat) = course.mat_at(self.state.leg) {
                    let kind = match discipline {
                        Discipline::Swim => EventKind::SwimMat(mat),
                        Discipline::Bike => EventKind::BikeMat(mat),
                        Discipline::Run => EventKind::RunMat(mat),
                    };
                    // stamped at the instant the mat was crossed, not the tick boundary
                    self.fact(ctx, kind, time_left);
                }

                if self.state.leg == course.last_leg() {
                    self.complete(ctx, discipline, time_left);
                    return;
                }
            } else {
                self.state.add_split(discipline, time_left);
                self.state.location =
                    course::move_along(self.state.location, next, distance_left);
                distance_left = 0.0;
            }
        }

        self.check_cutoffs(ctx, discipline);
    }

    /// Serves transition dwell time, starting the next discipline once it has elapsed.
    fn dwell(&mut self, ctx: &mut RaceContext, slice: f64) {
        let spent = slice.min(self.dwell_left.max(0.0));
        self.dwell_left -= spent;
        let next = if self.state.status == Status::T1 {
            self.state.t1_sec += spent;
            Discipline::Bike
        } else {
            self.state.t2_sec += spent;
            Discipline::Run
        };

        if self.dwell_left > 0.0 {
            return;
        }

        let leftover = slice - spent;
        self.begin(ctx, next, leftover);
        if leftover > 0.0 {
            self.race_leg(ctx, leftover);
        }
    }

    /// Leaves transition onto the bike or run course `seconds_before` the slice end.
    fn begin(&mut self, ctx: &mut RaceContext, discipline: Discipline, seconds_before: f64) {
        let (from, to, kind) = match discipline {
            Discipline::Bike => (Status::T1, Status::Bike, EventKind::BikeStart),
            Discipline::Run => (Status::T2, Status::Run, EventKind::RunStart),
            Discipline::Swim => return,
        };
        self.state.status = to;
        self.state.leg = 0;
        self.state.location = ctx.settings.course.get(discipline).start();
        ctx.counts.shift(from, to);
        self.fact(ctx, kind, seconds_before);
        debug!(
            "{} Start: {} has entered the {} course!",
            to,
            self.athlete.name,
            discipline.as_str()
        );
    }

    /// Handles reaching the final waypoint; `remaining` is the unused part of the slice.
    fn complete(&mut self, ctx: &mut RaceContext, discipline: Discipline, remaining: f64) {
        match discipline {
            Discipline::Swim => {
                self.enter_transition(ctx, Status::Swim, Status::T1, remaining);
                debug!(
                    "Swim Finish: {} is out of the water! {} -- swim str = {}",
                    self.athlete.name,
                    format_duration(self.state.swim_sec),
                    self.athlete.strengths.swim
                );
            }
            Discipline::Bike => {
                self.enter_transition(ctx, Status::Bike, Status::T2, remaining);
                debug!(
                    "Bike Finish: {} is off the bike! {} -- bike str = {}",
                    self.athlete.name,
                    format_duration(self.state.bike_sec),
                    self.athlete.strengths.bike
                );
            }
            Discipline::Run => {
                self.state.status = Status::Finished;
                self.state.leg = 0;
                ctx.counts.shift(Status::Run, Status::Finished);
                self.fact(ctx, EventKind::RaceFinish, remaining);
                info!(
                    "{} -- {}, you are an IRONMAN!!!  {}",
                    ctx.race_timestamp(),
                    self.athlete.name,
                    format_duration(self.state.total_sec())
                );
            }
        }
    }

    fn enter_transition(&mut self, ctx: &mut RaceContext, from: Status, to: Status, remaining: f64) {
        let pacing = &ctx.settings.pacing;
        let (lo, hi) = if self.athlete.division.is_pro() {
            pacing.pro_transition_secs
        } else {
            pacing.transition_secs
        };
        let dwell = self.rng.gen_range(lo..=hi);

        self.state.status = to;
        self.state.leg = 0;
        self.dwell_left = dwell;
        ctx.counts.shift(from, to);
        let kind = if to == Status::T1 {
            EventKind::EnterT1
        } else {
            EventKind::EnterT2
        };
        self.fact(ctx, kind, remaining);

        // the rest of the slice is spent in transition and, past the dwell, on the next course
        if remaining > 0.0 {
            self.dwell(ctx, remaining);
        }
    }

    /// Rolls the per-tick incident chance. Returns true if the athlete dropped out.
    fn incident(&mut self, ctx: &mut RaceContext, discipline: Discipline) -> bool {
        let odds = ctx.settings.pacing.incident_odds;
        let (one_in, reason) = match discipline {
            Discipline::Swim => (odds.swim, "was eaten by a shark!!"),
            Discipline::Bike => (odds.bike, "was in a brutal accident and has dropped out!!"),
            Discipline::Run => (odds.run, "has bonked and decided to throw in the towel!!"),
        };
        if one_in == 0 || !self.rng.gen_ratio(1, one_in) {
            return false;
        }
        self.dnf(ctx, reason);
        true
    }

    fn check_cutoffs(&mut self, ctx: &mut RaceContext, discipline: Discipline) {
        let cutoffs = ctx.settings.cutoffs;
        let reason = match discipline {
            Discipline::Swim if self.state.swim_sec > cutoffs.swim => {
                "failed to make the swim cutoff, pulled out of the water!!"
            }
            Discipline::Bike if self.state.bike_sec > cutoffs.bike => {
                "failed to make the bike cutoff, joined the sag wagon!!"
            }
            _ if self.state.total_sec() > cutoffs.race => "failed to finish before midnight.",
            _ => return,
        };
        self.dnf(ctx, reason);
    }

    fn dnf(&mut self, ctx: &mut RaceContext, reason: &str) {
        let from = self.state.status;
        self.state.status = Status::Dnf;
        ctx.counts.shift(from, Status::Dnf);
        self.fact(ctx, EventKind::Dnf, 0.0);
        info!("{} -- {} {}", ctx.race_timestamp(), self.athlete.name, reason);
    }

    /// Reports a race-of-record fact stamped `seconds_before` the end of the slice.
    fn fact(&self, ctx: &RaceContext, kind: EventKind, seconds_before: f64) {
        let event = ctx
            .settings
            .collections
            .fact(kind, self.state.race_num, ctx.at(seconds_before));
        ctx.report(event);
    }

    fn report_location(&mut self, ctx: &RaceContext) {
        let location = self.state.location;
        let ping = json!({
            "dev": self.athlete.device_id,
            "time": format_timestamp(ctx.now()),
            "la": location.y().to_string(),
            "lo": location.x().to_string(),
        });

        if self.athlete.division.is_pro() {
            // small field, latency matters for lead tracking
            let event = Event::new(
                self.next_location_key(),
                ping,
                ctx.settings.collections.locations(),
            )
            .with_priority(true)
            .routed_by(self.state.race_num as u64);
            ctx.report(event);
            return;
        }

        self.pings.push(ping);
        let pacing = &ctx.settings.pacing;
        let threshold = pacing.batch_threshold(ctx.backlog());
        let eligible = self.pings.len() >= threshold.div_ceil(2);
        if self.pings.len() >= threshold
            || (eligible && self.telemetry_rng.gen_bool(pacing.flush_probability))
        {
            self.flush_pings(ctx, threshold);
        }
    }

    /// Sends buffered pings as batches of at most `max_batch` records.
    fn flush_pings(&mut self, ctx: &RaceContext, max_batch: usize) {
        let max_batch = max_batch.max(1);
        while !self.pings.is_empty() {
            let take = self.pings.len().min(max_batch);
            let batch: Vec<Value> = self.pings.drain(..take).collect();
            let event = Event::new(
                self.next_location_key(),
                Value::Array(batch),
                ctx.settings.collections.locations(),
            )
            .routed_by(self.state.race_num as u64);
            ctx.report(event);
        }
    }

    fn next_location_key(&mut self) -> String {
        let key = format!("{}{}", encode_key(&self.athlete.device_id), self.ping_seq);
        self.ping_seq += 1;
        key
    }
}
