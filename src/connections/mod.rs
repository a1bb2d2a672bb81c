//! Connections between elements
//!
//! Both directions are modelled as separate non-negative flows; the direction
//! of transfer is carried by which flow is non-zero, never by sign.

pub mod connection;
pub mod energy_balance;
pub mod segments;

use std::collections::HashMap;
use std::fmt;

use crate::elements::{ElementKind, End, StorageHandle};
use crate::lp::{LinearExpr, LpModel, LpSolution};
use crate::network::Result;
use crate::output::ElementOutputs;
use crate::params::Params;

pub use connection::Connection;
pub use energy_balance::EnergyBalanceConnection;
pub use segments::{Segment, SegmentFlows, SegmentKind, SegmentSpec};

/// Read-only view of the network handed to connections at build time
#[derive(Debug, Default)]
pub struct BuildContext {
    storages: HashMap<String, StorageHandle>,
}

impl BuildContext {
    pub fn new(storages: HashMap<String, StorageHandle>) -> Self {
        Self { storages }
    }

    pub fn storage(&self, name: &str) -> Option<&StorageHandle> {
        self.storages.get(name)
    }
}

/// A named bidirectional edge between two elements
pub trait PowerLink: fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> ElementKind;

    fn source(&self) -> &str;

    fn target(&self) -> &str;

    /// Net power delivered into the element at `end` during period `t`
    fn power_into(&self, end: End, t: usize) -> LinearExpr;

    fn build_constraints(&mut self, model: &mut LpModel, context: &BuildContext) -> Result<()>;

    fn cost(&self) -> LinearExpr {
        LinearExpr::new()
    }

    fn regularization(&self, _weight: f64) -> LinearExpr {
        LinearExpr::new()
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs;

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()>;
}
