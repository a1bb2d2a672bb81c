//! Network elements
//!
//! An element owns its state variables and a power-balance equation fed by
//! every connection registered to it:
//!
//! `connection_power(t) + <own production - own consumption> = 0`

pub mod energy_storage;
pub mod node;
pub mod schedulable_load;
pub mod source_sink;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::lp::{ConstraintId, LinearExpr, LpModel, LpSolution};
use crate::network::{NetworkError, Result};
use crate::output::{ElementOutputs, OutputSeries, Unit};
use crate::params::Params;

pub use energy_storage::{EnergyStorage, StorageHandle};
pub use node::Node;
pub use schedulable_load::SchedulableLoad;
pub use source_sink::SourceSink;

/// Factory key for everything a network can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ElementKind {
    Node,
    SourceSink,
    EnergyStorage,
    SchedulableLoad,
    Connection,
    EnergyBalanceConnection,
}

impl ElementKind {
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            ElementKind::Connection | ElementKind::EnergyBalanceConnection
        )
    }
}

/// Which end of a connection an element occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum End {
    Source,
    Target,
}

/// A named participant owning variables and a power balance
pub trait Element: fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> ElementKind;

    /// Record that `connection` treats this element as its `end`
    fn register_connection(&mut self, connection: &str, end: End);

    fn connections(&self) -> &[(String, End)];

    /// Emit the balance equation and element bounds; runs once per network
    fn build_constraints(&mut self, model: &mut LpModel, connection_power: &[LinearExpr]) -> Result<()>;

    /// Objective contribution in currency
    fn cost(&self) -> LinearExpr {
        LinearExpr::new()
    }

    /// Tie-breaking cost that keeps degenerate flows bounded, excluded from reported cost
    fn regularization(&self, _weight: f64) -> LinearExpr {
        LinearExpr::new()
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs;

    /// Mutate bounds and coefficients of the already-built problem
    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()>;

    /// Cumulative energy handles, for storage elements only
    fn storage(&self) -> Option<StorageHandle> {
        None
    }
}

#[derive(Debug, Clone)]
struct ConstraintGroup {
    unit: Unit,
    ids: Vec<ConstraintId>,
    scale: Option<Vec<f64>>,
}

/// Named constraint groups of one component, reported as shadow prices
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    groups: BTreeMap<String, ConstraintGroup>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: &str, unit: Unit, ids: Vec<ConstraintId>) {
        self.groups.insert(
            name.to_string(),
            ConstraintGroup {
                unit,
                ids,
                scale: None,
            },
        );
    }

    /// Like `insert`, but each dual is divided by `scale[t]` when reported
    pub fn insert_scaled(&mut self, name: &str, unit: Unit, ids: Vec<ConstraintId>, scale: Vec<f64>) {
        self.groups.insert(
            name.to_string(),
            ConstraintGroup {
                unit,
                ids,
                scale: Some(scale),
            },
        );
    }

    pub fn ids(&self, name: &str) -> &[ConstraintId] {
        self.groups
            .get(name)
            .map(|group| group.ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn shadow_prices(&self, solution: &LpSolution) -> ElementOutputs {
        self.groups
            .iter()
            .map(|(name, group)| {
                let mut values = solution.duals(&group.ids);
                if let Some(scale) = &group.scale {
                    for (value, factor) in values.iter_mut().zip(scale) {
                        *value /= factor;
                    }
                }
                (name.clone(), OutputSeries::shadow_price(group.unit, values))
            })
            .collect()
    }
}

/// Connections registered to an element, in registration order
#[derive(Debug, Clone, Default)]
pub struct Registrations {
    entries: Vec<(String, End)>,
}

impl Registrations {
    pub fn register(&mut self, connection: &str, end: End) {
        self.entries.push((connection.to_string(), end));
    }

    pub fn entries(&self) -> &[(String, End)] {
        &self.entries
    }
}

/// Fail with `UpdateBeforeBuild` until `build_constraints` has run
pub(crate) fn require_built<T>(name: &str, built: Option<T>) -> Result<T> {
    built.ok_or_else(|| NetworkError::UpdateBeforeBuild {
        name: name.to_string(),
    })
}
