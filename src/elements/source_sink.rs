use tracing::debug;

use super::{require_built, ConstraintSet, Element, ElementKind, End, Registrations};
use crate::lp::{LinearExpr, LpModel, LpSolution, Sense, VarId};
use crate::network::Result;
use crate::output::{Direction, ElementOutputs, OutputSeries, Unit};
use crate::params::Params;
use crate::periods::Periods;

/// Unbounded producer and/or consumer, e.g. the grid side of a meter
///
/// Limits and prices live on the connections attached to it.
#[derive(Debug)]
pub struct SourceSink {
    name: String,
    durations: Vec<f64>,
    is_source: bool,
    is_sink: bool,
    source: Vec<VarId>,
    sink: Vec<VarId>,
    registrations: Registrations,
    constraints: Option<ConstraintSet>,
}

impl SourceSink {
    pub const PARAMETERS: &'static [&'static str] = &["is_source", "is_sink"];

    pub fn new(name: &str, periods: &Periods, params: &Params, model: &mut LpModel) -> Result<Self> {
        params.ensure_only(name, Self::PARAMETERS)?;
        let is_source = params.flag(name, "is_source")?.unwrap_or(true);
        let is_sink = params.flag(name, "is_sink")?.unwrap_or(true);

        let n = periods.len();
        let source = model.add_variables(&format!("{name}.source"), n, 0.0, upper(is_source));
        let sink = model.add_variables(&format!("{name}.sink"), n, 0.0, upper(is_sink));

        debug!(element = name, is_source, is_sink, "source/sink created");
        Ok(Self {
            name: name.to_string(),
            durations: periods.durations().to_vec(),
            is_source,
            is_sink,
            source,
            sink,
            registrations: Registrations::default(),
            constraints: None,
        })
    }
}

fn upper(enabled: bool) -> f64 {
    if enabled {
        f64::INFINITY
    } else {
        0.0
    }
}

impl Element for SourceSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::SourceSink
    }

    fn register_connection(&mut self, connection: &str, end: End) {
        self.registrations.register(connection, end);
    }

    fn connections(&self) -> &[(String, End)] {
        self.registrations.entries()
    }

    fn build_constraints(&mut self, model: &mut LpModel, connection_power: &[LinearExpr]) -> Result<()> {
        let balance = connection_power
            .iter()
            .enumerate()
            .map(|(t, power)| {
                model.add_constraint(
                    format!("{}.power_balance[{t}]", self.name),
                    power.clone() + self.source[t] - self.sink[t],
                    Sense::Eq,
                    0.0,
                )
            })
            .collect();

        let mut constraints = ConstraintSet::new();
        constraints.insert_scaled(
            "power_balance",
            Unit::PricePerKilowattHour,
            balance,
            self.durations.clone(),
        );
        self.constraints = Some(constraints);
        Ok(())
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs {
        let mut outputs = self
            .constraints
            .as_ref()
            .map(|constraints| constraints.shadow_prices(solution))
            .unwrap_or_default();
        if self.is_source {
            outputs.insert(
                "power_source".to_string(),
                OutputSeries::power(solution.values(&self.source), Direction::Production),
            );
        }
        if self.is_sink {
            outputs.insert(
                "power_sink".to_string(),
                OutputSeries::power(solution.values(&self.sink), Direction::Consumption),
            );
        }
        outputs
    }

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        require_built(&self.name, self.constraints.as_ref())?;
        params.ensure_only(&self.name, Self::PARAMETERS)?;

        let is_source = params.flag(&self.name, "is_source")?;
        let is_sink = params.flag(&self.name, "is_sink")?;
        if let Some(is_source) = is_source {
            self.is_source = is_source;
            for var in &self.source {
                model.set_bounds(*var, 0.0, upper(is_source));
            }
        }
        if let Some(is_sink) = is_sink {
            self.is_sink = is_sink;
            for var in &self.sink {
                model.set_bounds(*var, 0.0, upper(is_sink));
            }
        }
        debug!(element = %self.name, "source/sink updated");
        Ok(())
    }
}
