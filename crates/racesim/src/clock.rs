//! The tick driver.

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::{debug, info};

use crate::config::Pacing;
use crate::context::{PhaseCounts, RaceContext};
use crate::scheduler::Release;
use crate::simulator::{Advance, AthleteSimulator};

/// Slack when comparing release offsets with the race clock.
const RELEASE_EPSILON: f64 = 1e-9;

/// What the clock hands back once every athlete is done.
pub struct RaceOutcome {
    /// Retired athletes in the order they finished or dropped out.
    pub finished: Vec<AthleteSimulator>,
    pub counts: PhaseCounts,
    /// Race seconds from the gun to the last tick.
    pub elapsed: f64,
}

/// Owns the racing athletes and advances them one slice per tick.
pub struct RaceClock {
    ctx: RaceContext,
    cycle_seconds: f64,
    racing: Vec<AthleteSimulator>,
    finished: Vec<AthleteSimulator>,
    held: VecDeque<Release>,
    arrivals: Receiver<Release>,
    arrivals_open: bool,
    roster_size: usize,
    ticks: u64,
}

impl RaceClock {
    pub fn new(ctx: RaceContext, arrivals: Receiver<Release>, cycle_seconds: f64) -> Self {
        let roster_size = ctx.counts.total();
        Self {
            ctx,
            cycle_seconds,
            racing: Vec::new(),
            finished: Vec::new(),
            held: VecDeque::new(),
            arrivals,
            arrivals_open: true,
            roster_size,
            ticks: 0,
        }
    }

    pub fn counts(&self) -> PhaseCounts {
        self.ctx.counts
    }

    pub fn racing(&self) -> &[AthleteSimulator] {
        &self.racing
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// True once nobody is racing or waiting to start and no more starters can arrive.
    pub fn is_complete(&self) -> bool {
        self.racing.is_empty()
            && self.held.is_empty()
            && (self.finished.len() == self.roster_size || !self.arrivals_open)
    }

    /// Advances the race by one cycle.
    pub fn tick(&mut self) {
        self.collect_arrivals();
        self.admit_due();

        self.ctx.elapsed += self.cycle_seconds;
        let racing = std::mem::take(&mut self.racing);
        for mut sim in racing {
            match sim.advance(&mut self.ctx, self.cycle_seconds) {
                Advance::Racing(_) => self.racing.push(sim),
                Advance::Done => self.finished.push(sim),
            }
        }
        self.ticks += 1;
        debug_assert_eq!(self.ctx.counts.total(), self.roster_size);
    }

    /// Ticks until the race is complete, sleeping a scaled cycle between ticks.
    pub fn run(mut self, pacing: Pacing) -> RaceOutcome {
        if pacing.is_unthrottled() {
            // the scheduler does not sleep either, so take the whole start list up front
            self.wait_for_all_arrivals();
        }

        while !self.is_complete() {
            self.tick();
            if self.ticks % 10 == 0 {
                self.log_counts();
            }
            pacing.sleep(self.cycle_seconds);
        }

        info!(
            "race complete at {}: {} finished, {} DNF",
            self.ctx.race_timestamp(),
            self.ctx.counts.finished,
            self.ctx.counts.dnf
        );
        RaceOutcome {
            finished: self.finished,
            counts: self.ctx.counts,
            elapsed: self.ctx.elapsed,
        }
    }

    fn log_counts(&self) {
        let c = &self.ctx.counts;
        info!(
            "{} ---   Swimmers: {}  |  T1: {}  |  Bike: {}  |  T2: {}  |  Run: {}  |  Finished: {}  |  DNF: {}",
            self.ctx.race_timestamp(),
            c.swim,
            c.t1,
            c.bike,
            c.t2,
            c.run,
            c.finished,
            c.dnf
        );
    }

    /// Pulls queued releases. Blocks when there is nothing else to do until one arrives.
    fn collect_arrivals(&mut self) {
        if self.racing.is_empty() && self.held.is_empty() && self.arrivals_open {
            match self.arrivals.recv() {
                Ok(release) => self.held.push_back(release),
                Err(_) => self.arrivals_open = false,
            }
        }
        while self.arrivals_open {
            match self.arrivals.try_recv() {
                Ok(release) => self.held.push_back(release),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.arrivals_open = false,
            }
        }
    }

    fn wait_for_all_arrivals(&mut self) {
        while let Ok(release) = self.arrivals.recv() {
            self.held.push_back(release);
        }
        self.arrivals_open = false;
    }

    /// Starts every held athlete whose release offset has been reached.
    fn admit_due(&mut self) {
        while self
            .held
            .front()
            .is_some_and(|r| r.at <= self.ctx.elapsed + RELEASE_EPSILON)
        {
            let Some(release) = self.held.pop_front() else {
                break;
            };
            let mut sim = release.simulator;
            sim.start(&mut self.ctx);
            debug!("{} started at {}", sim.race_num(), self.ctx.race_timestamp());
            self.racing.push(sim);
        }
    }
}
