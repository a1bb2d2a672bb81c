use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::connections::{Connection, EnergyBalanceConnection, PowerLink, SegmentSpec};
use crate::elements::{Element, ElementKind, EnergyStorage, Node, SchedulableLoad, SourceSink};
use crate::lp::{LinearExpr, LpModel, LpSolution};
use crate::output::ElementOutputs;
use crate::params::Params;
use crate::periods::Periods;

use super::{NetworkError, Result};

/// `(kind, name, params)` triple accepted by [`super::Network::add_spec`]
///
/// `segments` is only meaningful for connections and selects an explicit
/// segment chain instead of one derived from `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub kind: ElementKind,
    pub name: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<Vec<SegmentSpec>>,
}

impl ElementSpec {
    pub fn new(kind: ElementKind, name: impl Into<String>, params: Params) -> Self {
        Self {
            kind,
            name: name.into(),
            params,
            segments: None,
        }
    }

    pub fn with_segments(mut self, segments: Vec<SegmentSpec>) -> Self {
        self.segments = Some(segments);
        self
    }
}

/// Anything stored in a network: an element or a connection
#[derive(Debug)]
pub enum Component {
    Element(Box<dyn Element>),
    Link(Box<dyn PowerLink>),
}

impl Component {
    pub(crate) fn create(
        spec: &ElementSpec,
        periods: &Periods,
        settings: &ModelConfig,
        model: &mut LpModel,
    ) -> Result<Self> {
        let name = spec.name.as_str();
        let params = &spec.params;
        if spec.segments.is_some() && spec.kind != ElementKind::Connection {
            return Err(NetworkError::unsupported(name, "segments"));
        }

        let component = match spec.kind {
            ElementKind::Node => Component::Element(Box::new(Node::new(name, periods, params)?)),
            ElementKind::SourceSink => {
                Component::Element(Box::new(SourceSink::new(name, periods, params, model)?))
            }
            ElementKind::EnergyStorage => {
                Component::Element(Box::new(EnergyStorage::new(name, periods, params, model)?))
            }
            ElementKind::SchedulableLoad => {
                Component::Element(Box::new(SchedulableLoad::new(name, periods, params, model)?))
            }
            ElementKind::Connection => match &spec.segments {
                None => Component::Link(Box::new(Connection::new(name, periods, params, model)?)),
                Some(segments) => {
                    params.ensure_only(name, &["source", "target"])?;
                    let source = params.require_text(name, "source")?;
                    let target = params.require_text(name, "target")?;
                    Component::Link(Box::new(Connection::with_segments(
                        name,
                        &source,
                        &target,
                        periods,
                        segments.clone(),
                        model,
                    )?))
                }
            },
            ElementKind::EnergyBalanceConnection => Component::Link(Box::new(
                EnergyBalanceConnection::new(name, periods, params, settings.ordering_weight, model)?,
            )),
        };
        Ok(component)
    }

    pub fn name(&self) -> &str {
        match self {
            Component::Element(element) => element.name(),
            Component::Link(link) => link.name(),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Component::Element(element) => element.kind(),
            Component::Link(link) => link.kind(),
        }
    }

    pub fn as_element(&self) -> Option<&dyn Element> {
        match self {
            Component::Element(element) => Some(element.as_ref()),
            Component::Link(_) => None,
        }
    }

    pub fn as_link(&self) -> Option<&dyn PowerLink> {
        match self {
            Component::Element(_) => None,
            Component::Link(link) => Some(link.as_ref()),
        }
    }

    pub(crate) fn cost(&self) -> LinearExpr {
        match self {
            Component::Element(element) => element.cost(),
            Component::Link(link) => link.cost(),
        }
    }

    pub(crate) fn regularization(&self, weight: f64) -> LinearExpr {
        match self {
            Component::Element(element) => element.regularization(weight),
            Component::Link(link) => link.regularization(weight),
        }
    }

    pub fn outputs(&self, solution: &LpSolution) -> ElementOutputs {
        match self {
            Component::Element(element) => element.outputs(solution),
            Component::Link(link) => link.outputs(solution),
        }
    }

    pub(crate) fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        match self {
            Component::Element(element) => element.update(model, params),
            Component::Link(link) => link.update(model, params),
        }
    }
}
