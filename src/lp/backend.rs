//! good_lp backend
//!
//! The [`LpModel`] is translated into a fresh good_lp problem on every solve.
//! Inactive constraints (no terms or a non-finite rhs) are left out and report
//! a zero dual.

use std::time::Instant;

use good_lp::solvers::{DualValues, ResolutionError, SolutionWithDual};
use good_lp::{constraint, variable, Expression, ProblemVariables, Solution, SolverModel, Variable};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use super::{LinearExpr, LpModel, LpSolution, Sense};
use crate::network::{NetworkError, Result};

/// Solver used to optimize a network
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SolverBackend {
    /// Clarabel interior point solver (pure Rust, default)
    #[default]
    Clarabel,
    /// HiGHS simplex/IPM solver (requires the `highs` feature)
    Highs,
}

impl SolverBackend {
    pub fn is_available(&self) -> bool {
        match self {
            SolverBackend::Clarabel => cfg!(feature = "clarabel"),
            SolverBackend::Highs => cfg!(feature = "highs"),
        }
    }
}

pub(crate) fn solve(model: &LpModel, backend: SolverBackend) -> Result<LpSolution> {
    let start = Instant::now();
    let mut problem = ProblemVariables::new();

    let vars: Vec<Variable> = model
        .variables()
        .iter()
        .map(|def| {
            let mut definition = variable();
            if def.lower.is_finite() {
                definition = definition.min(def.lower);
            }
            if def.upper.is_finite() {
                definition = definition.max(def.upper);
            }
            problem.add(definition)
        })
        .collect();

    let objective = to_expression(model.objective(), &vars);

    let solution = match backend {
        #[cfg(feature = "clarabel")]
        SolverBackend::Clarabel => run(
            problem.minimise(objective).using(good_lp::solvers::clarabel::clarabel),
            model,
            &vars,
        ),
        #[cfg(feature = "highs")]
        SolverBackend::Highs => run(
            problem.minimise(objective).using(good_lp::solvers::highs::highs),
            model,
            &vars,
        ),
        #[allow(unreachable_patterns)]
        other => {
            let _ = (problem, objective);
            Err(NetworkError::Solve {
                status: format!("solver backend `{other}` is not compiled in"),
            })
        }
    };

    match &solution {
        Ok(solved) => debug!(
            backend = %backend,
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            status = solved.status(),
            "LP solved"
        ),
        Err(err) => warn!(backend = %backend, error = %err, "LP solve failed"),
    }

    solution
}

#[allow(dead_code)]
fn run<M>(mut solver: M, model: &LpModel, vars: &[Variable]) -> Result<LpSolution>
where
    M: SolverModel<Error = ResolutionError>,
    for<'a> M::Solution: SolutionWithDual<'a>,
{
    let mut references = Vec::with_capacity(model.num_constraints());
    for def in model.constraints() {
        if def.is_inactive() {
            references.push(None);
            continue;
        }
        let lhs: Expression = def
            .terms
            .iter()
            .map(|(var, coefficient)| *coefficient * vars[var.index()])
            .sum();
        let rhs = def.rhs;
        let built = match def.sense {
            Sense::Le => constraint!(lhs <= rhs),
            Sense::Ge => constraint!(lhs >= rhs),
            Sense::Eq => constraint!(lhs == rhs),
        };
        references.push(Some(solver.add_constraint(built)));
    }

    let mut solution = solver.solve().map_err(|err| NetworkError::Solve {
        status: err.to_string(),
    })?;

    let values: Vec<f64> = vars.iter().map(|var| solution.value(*var)).collect();
    if values.iter().any(|value| !value.is_finite()) {
        return Err(NetworkError::Solve {
            status: "solver returned non-finite values".to_string(),
        });
    }

    let dual_values = solution.compute_dual();
    let duals = references
        .into_iter()
        .map(|reference| reference.map_or(0.0, |reference| dual_values.dual(reference)))
        .collect();

    Ok(LpSolution {
        values,
        duals,
        status: "optimal".to_string(),
    })
}

fn to_expression(expr: &LinearExpr, vars: &[Variable]) -> Expression {
    let linear: Expression = expr
        .terms()
        .iter()
        .map(|(var, coefficient)| *coefficient * vars[var.index()])
        .sum();
    linear + expr.constant_value()
}
