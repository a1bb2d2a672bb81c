//! Battery partition with cumulative energy bookkeeping
//!
//! Energy is tracked as two non-decreasing boundary series, `energy_in` and
//! `energy_out`; the stored energy is their difference. Keeping the flows
//! monotonic stops the solver from "un-charging" a partition to dodge a bound.

use tracing::debug;

use super::{require_built, ConstraintSet, Element, ElementKind, End, Registrations};
use crate::lp::{LinearExpr, LpModel, LpSolution, Sense, VarId};
use crate::network::{NetworkError, Result};
use crate::output::{Direction, ElementOutputs, OutputSeries, OutputType, Unit};
use crate::params::Params;
use crate::periods::Periods;

/// Cumulative energy variables of a storage, shared with balance connections
#[derive(Debug, Clone)]
pub struct StorageHandle {
    pub energy_in: Vec<VarId>,
    pub energy_out: Vec<VarId>,
}

impl StorageHandle {
    /// Stored energy at boundary `b`
    pub fn stored(&self, b: usize) -> LinearExpr {
        self.energy_in[b] - self.energy_out[b]
    }
}

#[derive(Debug)]
pub struct EnergyStorage {
    name: String,
    durations: Vec<f64>,
    capacity: Vec<f64>,
    initial_charge: f64,
    handle: StorageHandle,
    registrations: Registrations,
    constraints: Option<ConstraintSet>,
}

impl EnergyStorage {
    pub const PARAMETERS: &'static [&'static str] = &["capacity", "initial_charge"];

    pub fn new(name: &str, periods: &Periods, params: &Params, model: &mut LpModel) -> Result<Self> {
        params.ensure_only(name, Self::PARAMETERS)?;
        let capacity = params.require_series(name, "capacity", periods.len() + 1)?;
        let initial_charge = params.require_scalar(name, "initial_charge")?;
        validate(name, &capacity, initial_charge)?;

        let boundaries = periods.len() + 1;
        let handle = StorageHandle {
            energy_in: model.add_variables(&format!("{name}.energy_in"), boundaries, 0.0, f64::INFINITY),
            energy_out: model.add_variables(&format!("{name}.energy_out"), boundaries, 0.0, f64::INFINITY),
        };

        debug!(element = name, initial_charge, "energy storage created");
        Ok(Self {
            name: name.to_string(),
            durations: periods.durations().to_vec(),
            capacity,
            initial_charge,
            handle,
            registrations: Registrations::default(),
            constraints: None,
        })
    }

    pub fn capacity(&self) -> &[f64] {
        &self.capacity
    }

    pub fn initial_charge(&self) -> f64 {
        self.initial_charge
    }

    fn stored(&self, solution: &LpSolution) -> Vec<f64> {
        (0..self.capacity.len())
            .map(|b| solution.eval(&self.handle.stored(b)))
            .collect()
    }

    /// Average charge/discharge power per interval from cumulative flows
    fn interval_power(&self, solution: &LpSolution, vars: &[VarId]) -> Vec<f64> {
        let energy = solution.values(vars);
        energy
            .windows(2)
            .zip(&self.durations)
            .map(|(pair, duration)| (pair[1] - pair[0]) / duration)
            .collect()
    }
}

fn validate(name: &str, capacity: &[f64], initial_charge: f64) -> Result<()> {
    if capacity.iter().any(|c| !c.is_finite() || *c < 0.0) {
        return Err(NetworkError::invalid(
            name,
            "capacity",
            "must be finite and non-negative",
        ));
    }
    if initial_charge < 0.0 {
        return Err(NetworkError::invalid(name, "initial_charge", "must be non-negative"));
    }
    Ok(())
}

impl Element for EnergyStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::EnergyStorage
    }

    fn register_connection(&mut self, connection: &str, end: End) {
        self.registrations.register(connection, end);
    }

    fn connections(&self) -> &[(String, End)] {
        self.registrations.entries()
    }

    fn build_constraints(&mut self, model: &mut LpModel, connection_power: &[LinearExpr]) -> Result<()> {
        let name = &self.name;
        let energy_in = &self.handle.energy_in;
        let energy_out = &self.handle.energy_out;
        let n = self.durations.len();

        let initial_in = model.add_constraint(
            format!("{name}.initial_energy_in"),
            energy_in[0],
            Sense::Eq,
            self.initial_charge,
        );
        let initial_out = model.add_constraint(
            format!("{name}.initial_energy_out"),
            energy_out[0],
            Sense::Eq,
            0.0,
        );

        let mut in_flow = Vec::with_capacity(n);
        let mut out_flow = Vec::with_capacity(n);
        let mut soc_max = Vec::with_capacity(n);
        let mut soc_min = Vec::with_capacity(n);
        let mut balance = Vec::with_capacity(n);
        for t in 0..n {
            in_flow.push(model.add_constraint(
                format!("{name}.energy_in_flow[{t}]"),
                energy_in[t + 1] - energy_in[t],
                Sense::Ge,
                0.0,
            ));
            out_flow.push(model.add_constraint(
                format!("{name}.energy_out_flow[{t}]"),
                energy_out[t + 1] - energy_out[t],
                Sense::Ge,
                0.0,
            ));
            soc_max.push(model.add_constraint(
                format!("{name}.soc_max[{}]", t + 1),
                self.handle.stored(t + 1),
                Sense::Le,
                self.capacity[t + 1],
            ));
            soc_min.push(model.add_constraint(
                format!("{name}.soc_min[{}]", t + 1),
                self.handle.stored(t + 1),
                Sense::Ge,
                0.0,
            ));

            let period = self.durations[t];
            let charge = (energy_in[t + 1] - energy_in[t]) * (1.0 / period);
            let discharge = (energy_out[t + 1] - energy_out[t]) * (1.0 / period);
            balance.push(model.add_constraint(
                format!("{name}.power_balance[{t}]"),
                connection_power[t].clone() - charge + discharge,
                Sense::Eq,
                0.0,
            ));
        }

        let mut constraints = ConstraintSet::new();
        constraints.insert("initial_energy_in", Unit::PricePerKilowattHour, vec![initial_in]);
        constraints.insert("initial_energy_out", Unit::PricePerKilowattHour, vec![initial_out]);
        constraints.insert("energy_in_flow", Unit::PricePerKilowattHour, in_flow);
        constraints.insert("energy_out_flow", Unit::PricePerKilowattHour, out_flow);
        constraints.insert("soc_max", Unit::PricePerKilowattHour, soc_max);
        constraints.insert("soc_min", Unit::PricePerKilowattHour, soc_min);
        constraints.insert_scaled(
            "power_balance",
            Unit::PricePerKilowattHour,
            balance,
            self.durations.clone(),
        );
        self.constraints = Some(constraints);
        Ok(())
    }

    fn regularization(&self, weight: f64) -> LinearExpr {
        let last = self.durations.len();
        weight * (self.handle.energy_in[last] - self.handle.energy_in[0])
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs {
        let mut outputs = self
            .constraints
            .as_ref()
            .map(|constraints| constraints.shadow_prices(solution))
            .unwrap_or_default();

        let stored = self.stored(solution);
        let state_of_charge = stored
            .iter()
            .zip(&self.capacity)
            .map(|(energy, capacity)| {
                if *capacity > 0.0 {
                    100.0 * energy / capacity
                } else {
                    0.0
                }
            })
            .collect();

        outputs.insert("energy_stored".to_string(), OutputSeries::energy(stored));
        outputs.insert(
            "state_of_charge".to_string(),
            OutputSeries::new(OutputType::StateOfCharge, Unit::Percent, state_of_charge),
        );
        outputs.insert(
            "power_charge".to_string(),
            OutputSeries::power(
                self.interval_power(solution, &self.handle.energy_in),
                Direction::Consumption,
            ),
        );
        outputs.insert(
            "power_discharge".to_string(),
            OutputSeries::power(
                self.interval_power(solution, &self.handle.energy_out),
                Direction::Production,
            ),
        );
        outputs
    }

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        let constraints = require_built(&self.name, self.constraints.as_ref())?;
        params.ensure_only(&self.name, Self::PARAMETERS)?;

        let capacity = params
            .series(&self.name, "capacity", self.capacity.len())?
            .unwrap_or_else(|| self.capacity.clone());
        let initial_charge = params
            .scalar(&self.name, "initial_charge")?
            .unwrap_or(self.initial_charge);
        validate(&self.name, &capacity, initial_charge)?;

        for (id, limit) in constraints.ids("soc_max").iter().zip(&capacity[1..]) {
            model.set_rhs(*id, *limit);
        }
        for id in constraints.ids("initial_energy_in") {
            model.set_rhs(*id, initial_charge);
        }

        self.capacity = capacity;
        self.initial_charge = initial_charge;
        debug!(element = %self.name, initial_charge, "energy storage updated");
        Ok(())
    }

    fn storage(&self) -> Option<StorageHandle> {
        Some(self.handle.clone())
    }
}
