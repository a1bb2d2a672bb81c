//! Fill-ordering between two adjacent battery partitions
//!
//! `upper` is the connection's source and `lower` its target. With
//! `l` and `u` the stored energy of each partition and `cap` the lower
//! partition's boundary capacity, every period `t` enforces
//!
//! ```text
//! up_forced: power_up * p - l[t] >= -cap[t+1]
//! up_max:    power_up * p        <= max(0, cap[t] - cap[t+1])
//! ```
//!
//! so energy the lower partition can no longer hold moves up, and nothing
//! else does. Nothing in the rows prices stored energy: a battery filled in
//! order carries no cost from this connection.
//!
//! Filling `lower` before `upper` is a preference rather than a hard row,
//! since "upper stays empty until lower is full" is not convex. The
//! connection contributes `ordering_weight * p * u[t+1]` to the regularization
//! term only, which makes holding energy in the upper partition strictly
//! worse than holding it below whenever both are otherwise equal. The reported
//! objective never includes it.

use tracing::debug;

use super::{BuildContext, PowerLink};
use crate::elements::{require_built, ConstraintSet, ElementKind, End, StorageHandle};
use crate::lp::{ConstraintId, LinearExpr, LpModel, LpSolution, Sense, VarId};
use crate::network::{NetworkError, Result};
use crate::output::{ElementOutputs, OutputSeries, Unit};
use crate::params::Params;
use crate::periods::Periods;

#[derive(Debug, Clone)]
struct Built {
    upper: StorageHandle,
    lower: StorageHandle,
    up_forced: Vec<ConstraintId>,
    up_max: Vec<ConstraintId>,
    constraints: ConstraintSet,
}

#[derive(Debug)]
pub struct EnergyBalanceConnection {
    name: String,
    upper: String,
    lower: String,
    durations: Vec<f64>,
    capacity_lower: Vec<f64>,
    ordering_weight: f64,
    power_down: Vec<VarId>,
    power_up: Vec<VarId>,
    built: Option<Built>,
}

impl EnergyBalanceConnection {
    pub const PARAMETERS: &'static [&'static str] = &["upper", "lower", "capacity_lower", "ordering_weight"];

    pub fn new(
        name: &str,
        periods: &Periods,
        params: &Params,
        default_weight: f64,
        model: &mut LpModel,
    ) -> Result<Self> {
        params.ensure_only(name, Self::PARAMETERS)?;
        let upper = params.require_text(name, "upper")?;
        let lower = params.require_text(name, "lower")?;
        let capacity_lower = params.require_series(name, "capacity_lower", periods.len() + 1)?;
        let ordering_weight = params.scalar(name, "ordering_weight")?.unwrap_or(default_weight);
        validate(name, &capacity_lower, ordering_weight)?;

        let n = periods.len();
        let power_down = model.add_variables(&format!("{name}.power_down"), n, 0.0, f64::INFINITY);
        let power_up = model.add_variables(&format!("{name}.power_up"), n, 0.0, f64::INFINITY);

        debug!(connection = name, %upper, %lower, ordering_weight, "energy balance connection created");
        Ok(Self {
            name: name.to_string(),
            upper,
            lower,
            durations: periods.durations().to_vec(),
            capacity_lower,
            ordering_weight,
            power_down,
            power_up,
            built: None,
        })
    }

    fn storage(&self, context: &BuildContext, key: &str, partition: &str) -> Result<StorageHandle> {
        context
            .storage(partition)
            .cloned()
            .ok_or_else(|| NetworkError::invalid(&self.name, key, format!("`{partition}` is not an energy storage")))
    }
}

fn validate(name: &str, capacity_lower: &[f64], ordering_weight: f64) -> Result<()> {
    if capacity_lower.iter().any(|c| !c.is_finite() || *c < 0.0) {
        return Err(NetworkError::invalid(
            name,
            "capacity_lower",
            "must be finite and non-negative",
        ));
    }
    if ordering_weight < 0.0 {
        return Err(NetworkError::invalid(name, "ordering_weight", "must be non-negative"));
    }
    Ok(())
}

/// Energy the lower partition must give up over period `t`
fn shrinkage(capacity_lower: &[f64], t: usize) -> f64 {
    (capacity_lower[t] - capacity_lower[t + 1]).max(0.0)
}

impl PowerLink for EnergyBalanceConnection {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::EnergyBalanceConnection
    }

    fn source(&self) -> &str {
        &self.upper
    }

    fn target(&self) -> &str {
        &self.lower
    }

    fn power_into(&self, end: End, t: usize) -> LinearExpr {
        match end {
            End::Source => self.power_up[t] - self.power_down[t],
            End::Target => self.power_down[t] - self.power_up[t],
        }
    }

    fn build_constraints(&mut self, model: &mut LpModel, context: &BuildContext) -> Result<()> {
        let upper = self.storage(context, "upper", &self.upper)?;
        let lower = self.storage(context, "lower", &self.lower)?;
        let name = &self.name;

        let mut up_forced = Vec::with_capacity(self.durations.len());
        let mut up_max = Vec::with_capacity(self.durations.len());
        for (t, period) in self.durations.iter().enumerate() {
            up_forced.push(model.add_constraint(
                format!("{name}.up_forced[{t}]"),
                *period * self.power_up[t] - lower.stored(t),
                Sense::Ge,
                -self.capacity_lower[t + 1],
            ));
            up_max.push(model.add_constraint(
                format!("{name}.up_max[{t}]"),
                *period * self.power_up[t],
                Sense::Le,
                shrinkage(&self.capacity_lower, t),
            ));
        }

        let mut constraints = ConstraintSet::new();
        constraints.insert("up_forced", Unit::PricePerKilowattHour, up_forced.clone());
        constraints.insert("up_max", Unit::PricePerKilowattHour, up_max.clone());
        self.built = Some(Built {
            upper,
            lower,
            up_forced,
            up_max,
            constraints,
        });
        Ok(())
    }

    fn regularization(&self, _weight: f64) -> LinearExpr {
        let Some(built) = &self.built else {
            return LinearExpr::new();
        };
        self.durations
            .iter()
            .enumerate()
            .map(|(t, period)| (self.ordering_weight * period) * built.upper.stored(t + 1))
            .sum()
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs {
        let mut outputs = ElementOutputs::new();
        outputs.insert(
            "power_down".to_string(),
            OutputSeries::power_flow(solution.values(&self.power_down)),
        );
        outputs.insert(
            "power_up".to_string(),
            OutputSeries::power_flow(solution.values(&self.power_up)),
        );
        let Some(built) = &self.built else {
            return outputs;
        };
        outputs.extend(built.constraints.shadow_prices(solution));

        // Free room below against what is still held above, per end boundary
        let (unmet, misplaced): (Vec<f64>, Vec<f64>) = (1..self.capacity_lower.len())
            .map(|b| {
                let room = (self.capacity_lower[b] - solution.eval(&built.lower.stored(b))).max(0.0);
                let held = solution.eval(&built.upper.stored(b)).max(0.0);
                ((room - held).max(0.0), room.min(held))
            })
            .unzip();
        outputs.insert("unmet_demand_energy".to_string(), OutputSeries::energy(unmet));
        outputs.insert("misplaced_energy".to_string(), OutputSeries::energy(misplaced));
        outputs
    }

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        let built = require_built(&self.name, self.built.as_ref())?;
        params.ensure_only(&self.name, Self::PARAMETERS)?;
        for (key, current) in [("upper", &self.upper), ("lower", &self.lower)] {
            if let Some(value) = params.text(&self.name, key)? {
                if &value != current {
                    return Err(NetworkError::invalid(
                        &self.name,
                        key,
                        "partitions cannot change once the network is built",
                    ));
                }
            }
        }

        let capacity_lower = params
            .series(&self.name, "capacity_lower", self.capacity_lower.len())?
            .unwrap_or_else(|| self.capacity_lower.clone());
        let ordering_weight = params
            .scalar(&self.name, "ordering_weight")?
            .unwrap_or(self.ordering_weight);
        validate(&self.name, &capacity_lower, ordering_weight)?;

        for (t, (forced, max)) in built.up_forced.iter().zip(&built.up_max).enumerate() {
            model.set_rhs(*forced, -capacity_lower[t + 1]);
            model.set_rhs(*max, shrinkage(&capacity_lower, t));
        }
        self.capacity_lower = capacity_lower;
        self.ordering_weight = ordering_weight;
        debug!(connection = %self.name, ordering_weight, "energy balance connection updated");
        Ok(())
    }
}
