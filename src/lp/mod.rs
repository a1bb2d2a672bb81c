//! Linear programming layer
//!
//! [`LpModel`] is the constraint-builder context every element, connection and
//! segment receives; [`backend`] hands it to good_lp.

pub mod backend;
pub mod expr;
pub mod model;

pub use backend::SolverBackend;
pub use expr::{LinearExpr, VarId};
pub use model::{ConstraintDef, ConstraintId, LpModel, LpSolution, Sense, VariableDef};
