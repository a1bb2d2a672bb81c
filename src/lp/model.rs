use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::{LinearExpr, VarId};

/// Handle to a constraint owned by an [`LpModel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConstraintId(pub(crate) usize);

impl ConstraintId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum Sense {
    #[strum(serialize = "<=")]
    Le,
    #[strum(serialize = ">=")]
    Ge,
    #[strum(serialize = "==")]
    Eq,
}

#[derive(Debug, Clone)]
pub struct VariableDef {
    pub name: String,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone)]
pub struct ConstraintDef {
    pub name: String,
    pub terms: Vec<(VarId, f64)>,
    pub sense: Sense,
    pub rhs: f64,
}

impl ConstraintDef {
    /// A constraint the backend never sees: no terms, or a non-finite rhs
    pub fn is_inactive(&self) -> bool {
        self.terms.is_empty() || !self.rhs.is_finite()
    }
}

/// Mutable LP definition shared by every element of a network
///
/// Elements create their variables and constraints here once, keep the
/// returned handles, and later only mutate bounds, right-hand sides,
/// coefficients or senses. Nothing is ever removed, so handles stay valid for
/// the lifetime of the model.
#[derive(Debug, Clone, Default)]
pub struct LpModel {
    variables: Vec<VariableDef>,
    constraints: Vec<ConstraintDef>,
    objective: LinearExpr,
}

impl LpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_variable(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.variables.push(VariableDef {
            name: name.into(),
            lower,
            upper,
        });
        VarId(self.variables.len() - 1)
    }

    /// Add `count` variables named `{prefix}[i]`
    pub fn add_variables(&mut self, prefix: &str, count: usize, lower: f64, upper: f64) -> Vec<VarId> {
        (0..count)
            .map(|i| self.add_variable(format!("{prefix}[{i}]"), lower, upper))
            .collect()
    }

    pub fn set_bounds(&mut self, var: VarId, lower: f64, upper: f64) {
        if let Some(def) = self.variables.get_mut(var.0) {
            def.lower = lower;
            def.upper = upper;
        }
    }

    /// Add `lhs <sense> rhs`; constants on either side are folded into the rhs
    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        lhs: impl Into<LinearExpr>,
        sense: Sense,
        rhs: impl Into<LinearExpr>,
    ) -> ConstraintId {
        let lhs: LinearExpr = lhs.into();
        let rhs: LinearExpr = rhs.into();
        let expr = (lhs - rhs).simplified();
        self.constraints.push(ConstraintDef {
            name: name.into(),
            terms: expr.terms().to_vec(),
            sense,
            rhs: -expr.constant_value(),
        });
        ConstraintId(self.constraints.len() - 1)
    }

    pub fn set_rhs(&mut self, id: ConstraintId, rhs: f64) {
        if let Some(def) = self.constraints.get_mut(id.0) {
            def.rhs = rhs;
        }
    }

    pub fn set_sense(&mut self, id: ConstraintId, sense: Sense) {
        if let Some(def) = self.constraints.get_mut(id.0) {
            def.sense = sense;
        }
    }

    /// Overwrite the coefficient of `var`, adding the term if it is missing
    pub fn set_coefficient(&mut self, id: ConstraintId, var: VarId, coefficient: f64) {
        let Some(def) = self.constraints.get_mut(id.0) else {
            return;
        };
        match def.terms.iter_mut().find(|(v, _)| *v == var) {
            Some(term) => term.1 = coefficient,
            None => def.terms.push((var, coefficient)),
        }
    }

    pub fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective.simplified();
    }

    pub fn variable(&self, var: VarId) -> Option<&VariableDef> {
        self.variables.get(var.0)
    }

    pub fn constraint(&self, id: ConstraintId) -> Option<&ConstraintDef> {
        self.constraints.get(id.0)
    }

    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    pub fn constraints(&self) -> &[ConstraintDef] {
        &self.constraints
    }

    pub fn objective(&self) -> &LinearExpr {
        &self.objective
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Primal and dual values of a solved [`LpModel`]
#[derive(Debug, Clone)]
pub struct LpSolution {
    pub(crate) values: Vec<f64>,
    pub(crate) duals: Vec<f64>,
    pub(crate) status: String,
}

impl LpSolution {
    pub fn value(&self, var: VarId) -> f64 {
        self.values.get(var.0).copied().unwrap_or(0.0)
    }

    pub fn values(&self, vars: &[VarId]) -> Vec<f64> {
        vars.iter().map(|var| self.value(*var)).collect()
    }

    pub fn eval(&self, expr: &LinearExpr) -> f64 {
        expr.evaluate(&self.values)
    }

    /// Dual value of a constraint; zero for constraints the backend skipped
    pub fn dual(&self, id: ConstraintId) -> f64 {
        self.duals.get(id.0).copied().unwrap_or(0.0)
    }

    pub fn duals(&self, ids: &[ConstraintId]) -> Vec<f64> {
        ids.iter().map(|id| self.dual(*id)).collect()
    }

    pub fn status(&self) -> &str {
        &self.status
    }
}
