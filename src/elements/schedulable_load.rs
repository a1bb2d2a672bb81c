//! Deferrable load with an optimizer-chosen start
//!
//! The load draws `power` for `duration` hours as one contiguous run starting
//! somewhere in `[earliest_start, latest_start]`. The run is chosen as a convex
//! combination of candidate starts: every period boundary `b[k]`, every
//! `b[k] - duration` and both window ends. With `w[k]` the weight of candidate
//! `s[k]` and `ov(t, s)` the overlap of `[s, s + duration]` with period `t`,
//!
//! ```text
//! choice:        sum(w)     == 1
//! overlap[t]:    overlap[t] == sum(w[k] * ov(t, s[k]))
//! start:         start      == sum(w[k] * s[k])
//! total_overlap: sum(overlap) == duration
//! ```
//!
//! Prices are linear in the overlap and the overlap is piecewise linear in the
//! start with breaks only at the candidates, so some single candidate is always
//! optimal. Weights of candidates outside the window are pinned to zero, and
//! the regularization term nudges ties towards the earliest start so a solved
//! run is a single candidate and `start` is where it begins.

use tracing::debug;

use super::{require_built, ConstraintSet, Element, ElementKind, End, Registrations};
use crate::lp::{ConstraintId, LinearExpr, LpModel, LpSolution, Sense, VarId};
use crate::network::{NetworkError, Result};
use crate::output::{Direction, ElementOutputs, OutputSeries, OutputType, Unit};
use crate::params::Params;
use crate::periods::Periods;

const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Schedule {
    power: f64,
    duration: f64,
    earliest_start: f64,
    latest_start: f64,
}

impl Schedule {
    fn validate(&self, name: &str, horizon: f64) -> Result<()> {
        if self.power < 0.0 {
            return Err(NetworkError::invalid(name, "power", "must be non-negative"));
        }
        if self.duration <= 0.0 || self.duration > horizon + TOLERANCE {
            return Err(NetworkError::invalid(
                name,
                "duration",
                format!("must be positive and fit the {horizon} h horizon"),
            ));
        }
        if self.earliest_start < 0.0 || self.earliest_start > self.latest_start + TOLERANCE {
            return Err(NetworkError::invalid(
                name,
                "earliest_start",
                "must be non-negative and not after latest_start",
            ));
        }
        if self.latest_start + self.duration > horizon + TOLERANCE {
            return Err(NetworkError::invalid(
                name,
                "latest_start",
                "the load would run past the end of the horizon",
            ));
        }
        Ok(())
    }

    fn admits(&self, start: f64) -> bool {
        start >= self.earliest_start - TOLERANCE && start <= self.latest_start + TOLERANCE
    }

    /// Every start at which the run's overlap profile can change slope
    fn candidates(&self, boundaries: &[f64]) -> Vec<f64> {
        boundaries
            .iter()
            .copied()
            .chain(boundaries.iter().map(|b| b - self.duration))
            .chain([self.earliest_start, self.latest_start])
            .collect()
    }

    /// Hours of period `t` covered by a run starting at `start`
    fn overlap(&self, boundaries: &[f64], t: usize, start: f64) -> f64 {
        (boundaries[t + 1].min(start + self.duration) - boundaries[t].max(start)).max(0.0)
    }
}

/// Candidate slots for `periods`, fixed for the lifetime of the model
fn candidate_count(periods: &Periods) -> usize {
    2 * (periods.len() + 1) + 2
}

#[derive(Debug, Clone)]
struct Built {
    balance: Vec<ConstraintId>,
    overlap_link: Vec<ConstraintId>,
    start_link: ConstraintId,
    total_overlap: ConstraintId,
    constraints: ConstraintSet,
}

#[derive(Debug)]
pub struct SchedulableLoad {
    name: String,
    durations: Vec<f64>,
    boundaries: Vec<f64>,
    schedule: Schedule,
    start: VarId,
    overlap: Vec<VarId>,
    choice: Vec<VarId>,
    registrations: Registrations,
    built: Option<Built>,
}

impl SchedulableLoad {
    pub const PARAMETERS: &'static [&'static str] =
        &["power", "duration", "earliest_start", "latest_start"];

    pub fn new(name: &str, periods: &Periods, params: &Params, model: &mut LpModel) -> Result<Self> {
        params.ensure_only(name, Self::PARAMETERS)?;
        let horizon = periods.horizon();
        let power = params.require_scalar(name, "power")?;
        let duration = params.require_scalar(name, "duration")?;
        let schedule = Schedule {
            power,
            duration,
            earliest_start: params.scalar(name, "earliest_start")?.unwrap_or(0.0),
            latest_start: params
                .scalar(name, "latest_start")?
                .unwrap_or(horizon - duration),
        };
        schedule.validate(name, horizon)?;

        let load = Self {
            name: name.to_string(),
            durations: periods.durations().to_vec(),
            boundaries: periods.boundaries(),
            schedule,
            start: model.add_variable(format!("{name}.start"), 0.0, 0.0),
            overlap: model.add_variables(&format!("{name}.overlap"), periods.len(), 0.0, 0.0),
            choice: model.add_variables(&format!("{name}.choice"), candidate_count(periods), 0.0, 0.0),
            registrations: Registrations::default(),
            built: None,
        };
        load.apply_bounds(model);

        debug!(element = name, power, duration, "schedulable load created");
        Ok(load)
    }

    /// Variable bounds derived from the schedule window
    fn apply_bounds(&self, model: &mut LpModel) {
        let schedule = &self.schedule;
        let window_end = schedule.latest_start + schedule.duration;

        model.set_bounds(self.start, schedule.earliest_start, schedule.latest_start);
        for t in 0..self.durations.len() {
            let (lo, hi) = (self.boundaries[t], self.boundaries[t + 1]);
            let admissible = (hi.min(window_end) - lo.max(schedule.earliest_start)).max(0.0);
            model.set_bounds(self.overlap[t], 0.0, admissible.min(self.durations[t]));
        }
        for (choice, start) in self.choice.iter().zip(schedule.candidates(&self.boundaries)) {
            let open = if schedule.admits(start) { 1.0 } else { 0.0 };
            model.set_bounds(*choice, 0.0, open);
        }
    }

    fn power_values(&self, solution: &LpSolution) -> Vec<f64> {
        solution
            .values(&self.overlap)
            .iter()
            .zip(&self.durations)
            .map(|(overlap, period)| self.schedule.power * overlap / period)
            .collect()
    }
}

impl Element for SchedulableLoad {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::SchedulableLoad
    }

    fn register_connection(&mut self, connection: &str, end: End) {
        self.registrations.register(connection, end);
    }

    fn connections(&self) -> &[(String, End)] {
        self.registrations.entries()
    }

    fn build_constraints(&mut self, model: &mut LpModel, connection_power: &[LinearExpr]) -> Result<()> {
        let name = &self.name;
        let schedule = self.schedule;
        let candidates = schedule.candidates(&self.boundaries);
        let n = self.durations.len();

        let mut overlap_link = Vec::with_capacity(n);
        let mut balance = Vec::with_capacity(n);
        for t in 0..n {
            let scheduled: LinearExpr = self
                .choice
                .iter()
                .zip(&candidates)
                .map(|(choice, start)| LinearExpr::term(*choice, schedule.overlap(&self.boundaries, t, *start)))
                .sum();
            overlap_link.push(model.add_constraint(
                format!("{name}.overlap[{t}]"),
                LinearExpr::from(self.overlap[t]) - scheduled,
                Sense::Eq,
                0.0,
            ));

            let rate = schedule.power / self.durations[t];
            balance.push(model.add_constraint(
                format!("{name}.power_balance[{t}]"),
                connection_power[t].clone() - rate * self.overlap[t],
                Sense::Eq,
                0.0,
            ));
        }

        let chosen_start: LinearExpr = self
            .choice
            .iter()
            .zip(&candidates)
            .map(|(choice, start)| LinearExpr::term(*choice, *start))
            .sum();
        let start_link = model.add_constraint(
            format!("{name}.start"),
            LinearExpr::from(self.start) - chosen_start,
            Sense::Eq,
            0.0,
        );
        let choices: LinearExpr = self.choice.iter().map(|v| LinearExpr::from(*v)).sum();
        model.add_constraint(format!("{name}.choice"), choices, Sense::Eq, 1.0);

        let total: LinearExpr = self.overlap.iter().map(|v| LinearExpr::from(*v)).sum();
        let total_overlap = model.add_constraint(format!("{name}.total_overlap"), total, Sense::Eq, schedule.duration);

        let mut constraints = ConstraintSet::new();
        constraints.insert_scaled(
            "power_balance",
            Unit::PricePerKilowattHour,
            balance.clone(),
            self.durations.clone(),
        );
        self.built = Some(Built {
            balance,
            overlap_link,
            start_link,
            total_overlap,
            constraints,
        });
        Ok(())
    }

    fn regularization(&self, weight: f64) -> LinearExpr {
        self.choice
            .iter()
            .zip(self.schedule.candidates(&self.boundaries))
            .map(|(choice, start)| LinearExpr::term(*choice, weight * start.max(0.0)))
            .sum()
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs {
        let mut outputs = self
            .built
            .as_ref()
            .map(|built| built.constraints.shadow_prices(solution))
            .unwrap_or_default();

        outputs.insert(
            "start_time".to_string(),
            OutputSeries::new(OutputType::Duration, Unit::Hour, vec![solution.value(self.start)]),
        );
        outputs.insert(
            "power".to_string(),
            OutputSeries::power(self.power_values(solution), Direction::Consumption),
        );
        outputs.insert(
            "overlap".to_string(),
            OutputSeries::new(OutputType::Duration, Unit::Hour, solution.values(&self.overlap)),
        );
        outputs
    }

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        let built = require_built(&self.name, self.built.as_ref())?;
        params.ensure_only(&self.name, Self::PARAMETERS)?;

        let schedule = Schedule {
            power: params.scalar(&self.name, "power")?.unwrap_or(self.schedule.power),
            duration: params
                .scalar(&self.name, "duration")?
                .unwrap_or(self.schedule.duration),
            earliest_start: params
                .scalar(&self.name, "earliest_start")?
                .unwrap_or(self.schedule.earliest_start),
            latest_start: params
                .scalar(&self.name, "latest_start")?
                .unwrap_or(self.schedule.latest_start),
        };
        let horizon = self.boundaries.last().copied().unwrap_or(0.0);
        schedule.validate(&self.name, horizon)?;

        let candidates = schedule.candidates(&self.boundaries);
        for (t, id) in built.overlap_link.iter().enumerate() {
            for (choice, start) in self.choice.iter().zip(&candidates) {
                model.set_coefficient(*id, *choice, -schedule.overlap(&self.boundaries, t, *start));
            }
        }
        for (choice, start) in self.choice.iter().zip(&candidates) {
            model.set_coefficient(built.start_link, *choice, -start);
        }
        for ((id, overlap), period) in built.balance.iter().zip(&self.overlap).zip(&self.durations) {
            model.set_coefficient(*id, *overlap, -schedule.power / period);
        }
        model.set_rhs(built.total_overlap, schedule.duration);

        self.schedule = schedule;
        self.apply_bounds(model);
        debug!(element = %self.name, ?schedule, "schedulable load updated");
        Ok(())
    }
}
