//! Network container
//!
//! Lifecycle: `Created -> (add*) -> Built -> Solved -> (update* -> Solved)*`.
//! Topology is frozen by the first build; afterwards `add` on an existing name
//! only mutates bounds and coefficients of the existing LP, which is what makes
//! re-optimization a warm start.

mod component;
mod error;

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{Config, ModelConfig, SolverConfig};
use crate::connections::BuildContext;
use crate::elements::{Element, ElementKind, End};
use crate::lp::{backend, LinearExpr, LpModel, LpSolution};
use crate::output::NetworkOutputs;
use crate::params::Params;
use crate::periods::Periods;

pub use component::{Component, ElementSpec};
pub use error::{NetworkError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Built,
    Failed,
}

#[derive(Debug)]
pub struct Network {
    periods: Periods,
    solver: SolverConfig,
    settings: ModelConfig,
    model: LpModel,
    components: Vec<Component>,
    index: HashMap<String, usize>,
    state: State,
    solution: Option<LpSolution>,
    objective: Option<f64>,
}

impl Network {
    pub fn new(periods: Periods) -> Self {
        Self::with_config(periods, &Config::default())
    }

    pub fn with_config(periods: Periods, config: &Config) -> Self {
        Self {
            periods,
            solver: config.solver.clone(),
            settings: config.model.clone(),
            model: LpModel::new(),
            components: Vec::new(),
            index: HashMap::new(),
            state: State::Created,
            solution: None,
            objective: None,
        }
    }

    pub fn periods(&self) -> &Periods {
        &self.periods
    }

    pub fn model(&self) -> &LpModel {
        &self.model
    }

    pub fn is_built(&self) -> bool {
        self.state == State::Built
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.index.get(name).map(|i| &self.components[*i])
    }

    /// Components in registration order
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    /// Create `name`, or update it in place when it already exists
    pub fn add(&mut self, kind: ElementKind, name: &str, params: Params) -> Result<()> {
        self.add_spec(ElementSpec::new(kind, name, params))
    }

    pub fn add_spec(&mut self, spec: ElementSpec) -> Result<()> {
        if let Some(&i) = self.index.get(&spec.name) {
            return self.update(i, spec);
        }
        if self.state != State::Created {
            return Err(NetworkError::TopologyFrozen { name: spec.name });
        }

        let component = Component::create(&spec, &self.periods, &self.settings, &mut self.model)?;
        self.index.insert(spec.name.clone(), self.components.len());
        self.components.push(component);
        Ok(())
    }

    pub fn extend(&mut self, specs: impl IntoIterator<Item = ElementSpec>) -> Result<()> {
        specs.into_iter().try_for_each(|spec| self.add_spec(spec))
    }

    fn update(&mut self, i: usize, spec: ElementSpec) -> Result<()> {
        let existing = self.components[i].kind();
        if existing != spec.kind {
            return Err(NetworkError::IncompatibleType {
                name: spec.name,
                existing,
                requested: spec.kind,
            });
        }
        if self.state != State::Built {
            return Err(NetworkError::UpdateBeforeBuild { name: spec.name });
        }

        let mut params = spec.params;
        for segment in spec.segments.into_iter().flatten() {
            for key in segment.params.keys() {
                if let Some(value) = segment.params.get(key) {
                    params.insert(&format!("{}.{key}", segment.name), value.clone());
                }
            }
        }

        self.components[i].update(&mut self.model, &params)?;
        self.solution = None;
        self.objective = None;
        debug!(element = %spec.name, kind = %spec.kind, "parameters updated");
        Ok(())
    }

    /// Check every connection endpoint names an existing element
    pub fn validate(&self) -> Result<()> {
        for link in self.components.iter().filter_map(Component::as_link) {
            for endpoint in [link.source(), link.target()] {
                match self.component(endpoint) {
                    None => {
                        return Err(NetworkError::UnknownEndpoint {
                            connection: link.name().to_string(),
                            endpoint: endpoint.to_string(),
                        })
                    }
                    Some(component) if component.kind().is_connection() => {
                        return Err(NetworkError::ConnectionEndpoint {
                            connection: link.name().to_string(),
                            endpoint: endpoint.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
            if link.source() == link.target() {
                return Err(NetworkError::invalid(
                    link.name(),
                    "target",
                    "a connection cannot join an element to itself",
                ));
            }
        }
        Ok(())
    }

    /// Wire connections and emit every constraint; runs once
    pub fn build(&mut self) -> Result<()> {
        match self.state {
            State::Created => {}
            State::Built => return Err(NetworkError::AlreadyBuilt),
            State::Failed => return Err(NetworkError::BuildFailed),
        }
        self.validate()?;
        self.state = State::Failed;

        let wiring: Vec<(String, String, String)> = self
            .components
            .iter()
            .filter_map(Component::as_link)
            .map(|link| (link.name().to_string(), link.source().to_string(), link.target().to_string()))
            .collect();
        for (connection, source, target) in &wiring {
            for (endpoint, end) in [(source, End::Source), (target, End::Target)] {
                if let Some(Component::Element(element)) = self.index.get(endpoint).map(|i| &mut self.components[*i]) {
                    element.register_connection(connection, end);
                }
            }
        }

        let context = BuildContext::new(
            self.components
                .iter()
                .filter_map(Component::as_element)
                .filter_map(|element| element.storage().map(|handle| (element.name().to_string(), handle)))
                .collect(),
        );

        for i in 0..self.components.len() {
            let power = self.components[i]
                .as_element()
                .map(|element| self.connection_power_expressions(element));
            let result = match (&mut self.components[i], power) {
                (Component::Element(element), Some(power)) => element.build_constraints(&mut self.model, &power),
                (Component::Link(link), _) => link.build_constraints(&mut self.model, &context),
                (Component::Element(_), None) => Ok(()),
            };
            result.map_err(|source| NetworkError::Build {
                name: self.components[i].name().to_string(),
                source: Box::new(source),
            })?;
        }

        self.state = State::Built;
        info!(
            components = self.components.len(),
            variables = self.model.num_variables(),
            constraints = self.model.num_constraints(),
            periods = self.periods.len(),
            "network built"
        );
        Ok(())
    }

    /// Net power delivered into `element` by its connections, per period
    fn connection_power_expressions(&self, element: &dyn Element) -> Vec<LinearExpr> {
        (0..self.periods.len())
            .map(|t| {
                element
                    .connections()
                    .iter()
                    .filter_map(|(name, end)| {
                        self.component(name)
                            .and_then(Component::as_link)
                            .map(|link| link.power_into(*end, t))
                    })
                    .sum::<LinearExpr>()
            })
            .collect()
    }

    /// Build on first use, then solve; returns the economic objective
    pub fn optimize(&mut self) -> Result<f64> {
        self.validate()?;
        if self.state == State::Created {
            self.build()?;
        } else if self.state == State::Failed {
            return Err(NetworkError::BuildFailed);
        }

        let cost: LinearExpr = self.components.iter().map(Component::cost).sum();
        let weight = self.solver.regularization;
        let regularization: LinearExpr = self
            .components
            .iter()
            .map(|component| component.regularization(weight))
            .sum();
        self.model.set_objective(cost.clone() + regularization);
        self.solution = None;
        self.objective = None;

        let started = Instant::now();
        let solution = backend::solve(&self.model, self.solver.backend).map_err(|err| {
            warn!(error = %err, "network optimization failed");
            err
        })?;
        let objective = solution.eval(&cost);

        info!(
            objective,
            backend = %self.solver.backend,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "network optimized"
        );
        self.solution = Some(solution);
        self.objective = Some(objective);
        Ok(objective)
    }

    /// Economic objective of the last successful optimization
    pub fn objective(&self) -> Option<f64> {
        self.objective
    }

    pub fn solution(&self) -> Option<&LpSolution> {
        self.solution.as_ref()
    }

    /// Every output series, keyed by component name then output name
    pub fn outputs(&self) -> Result<NetworkOutputs> {
        let solution = self.solution.as_ref().ok_or(NetworkError::NotSolved)?;
        Ok(self
            .components
            .iter()
            .map(|component| (component.name().to_string(), component.outputs(solution)))
            .collect())
    }

    /// Solved net connection power into element `name`, per period
    pub fn connection_power(&self, name: &str) -> Result<Vec<f64>> {
        let solution = self.solution.as_ref().ok_or(NetworkError::NotSolved)?;
        let element = self
            .component(name)
            .and_then(Component::as_element)
            .ok_or_else(|| NetworkError::UnknownElement {
                name: name.to_string(),
            })?;
        Ok(self
            .connection_power_expressions(element)
            .iter()
            .map(|expr| solution.eval(expr))
            .collect())
    }
}
