use tracing::debug;

use super::{require_built, ConstraintSet, Element, ElementKind, End, Registrations};
use crate::lp::{LinearExpr, LpModel, LpSolution, Sense};
use crate::network::Result;
use crate::output::{ElementOutputs, Unit};
use crate::params::Params;
use crate::periods::Periods;

/// Junction where connection flows must sum to zero
///
/// The node's balance dual is the local marginal energy price, reported per kWh.
#[derive(Debug)]
pub struct Node {
    name: String,
    durations: Vec<f64>,
    registrations: Registrations,
    constraints: Option<ConstraintSet>,
}

impl Node {
    pub const PARAMETERS: &'static [&'static str] = &[];

    pub fn new(name: &str, periods: &Periods, params: &Params) -> Result<Self> {
        params.ensure_only(name, Self::PARAMETERS)?;
        debug!(element = name, "node created");
        Ok(Self {
            name: name.to_string(),
            durations: periods.durations().to_vec(),
            registrations: Registrations::default(),
            constraints: None,
        })
    }
}

impl Element for Node {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Node
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
                model.add_constraint(format!("{}.power_balance[{t}]", self.name), power, Sense::Eq, 0.0)
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
        self.constraints
            .as_ref()
            .map(|constraints| constraints.shadow_prices(solution))
            .unwrap_or_default()
    }

    fn update(&mut self, _model: &mut LpModel, params: &Params) -> Result<()> {
        require_built(&self.name, self.constraints.as_ref())?;
        params.ensure_only(&self.name, Self::PARAMETERS)
    }
}
