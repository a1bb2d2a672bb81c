use tracing::debug;

use super::segments::{create_segment, Segment, SegmentKind, SegmentSpec};
use super::{BuildContext, PowerLink};
use crate::elements::{require_built, ElementKind, End};
use crate::lp::{LinearExpr, LpModel, LpSolution, Sense};
use crate::network::{NetworkError, Result};
use crate::output::{ElementOutputs, OutputSeries};
use crate::params::{ParamValue, Params};
use crate::periods::Periods;

/// Flat parameters understood by a connection built from its parameter map
const PARAMETERS: &[&str] = &[
    "source",
    "target",
    "max_power_source_target",
    "max_power_target_source",
    "fixed_power",
    "efficiency_source_target",
    "efficiency_target_source",
    "price_source_target",
    "price_target_source",
];

/// Bidirectional connection realised as a chain of segments
///
/// With `Connection::new` the chain is derived from flat parameters:
/// `power_limit`, then `time_slice` when both directions are limited, then
/// `pricing`, then `efficiency`, or a single `passthrough` when nothing is
/// configured. `Connection::with_segments` takes an explicit chain instead.
#[derive(Debug)]
pub struct Connection {
    name: String,
    source: String,
    target: String,
    durations: Vec<f64>,
    segments: Vec<Box<dyn Segment>>,
    derived: bool,
    built: bool,
}

impl Connection {
    pub fn new(name: &str, periods: &Periods, params: &Params, model: &mut LpModel) -> Result<Self> {
        params.ensure_only(name, PARAMETERS)?;
        let source = params.require_text(name, "source")?;
        let target = params.require_text(name, "target")?;
        let specs = derive_chain(params);

        let mut connection = Self::with_segments(name, &source, &target, periods, specs, model)?;
        connection.derived = true;
        Ok(connection)
    }

    pub fn with_segments(
        name: &str,
        source: &str,
        target: &str,
        periods: &Periods,
        specs: Vec<SegmentSpec>,
        model: &mut LpModel,
    ) -> Result<Self> {
        if specs.is_empty() {
            return Err(NetworkError::invalid(name, "segments", "at least one segment is required"));
        }
        for (i, spec) in specs.iter().enumerate() {
            if spec.name.is_empty() || spec.name.contains('.') {
                return Err(NetworkError::invalid(
                    name,
                    "segments",
                    format!("segment name `{}` must be non-empty and contain no `.`", spec.name),
                ));
            }
            if specs[..i].iter().any(|other| other.name == spec.name) {
                return Err(NetworkError::invalid(
                    name,
                    "segments",
                    format!("duplicate segment name `{}`", spec.name),
                ));
            }
        }

        let segments = specs
            .iter()
            .map(|spec| create_segment(name, spec, periods, model))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            connection = name,
            source,
            target,
            segments = segments.len(),
            "connection created"
        );
        Ok(Self {
            name: name.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            durations: periods.durations().to_vec(),
            segments,
            derived: false,
            built: false,
        })
    }

    pub fn segments(&self) -> impl Iterator<Item = &dyn Segment> {
        self.segments.iter().map(|segment| segment.as_ref())
    }

    fn first(&self) -> &dyn Segment {
        self.segments[0].as_ref()
    }

    fn last(&self) -> &dyn Segment {
        self.segments[self.segments.len() - 1].as_ref()
    }

    fn segment_mut(&mut self, name: &str) -> Option<&mut Box<dyn Segment>> {
        self.segments.iter_mut().find(|segment| segment.name() == name)
    }

    /// Split `params` into per-segment parameter maps
    ///
    /// Dotted keys (`segment.parameter`) address a segment directly. On a
    /// derived chain the flat construction keys are routed to the segment that
    /// owns them.
    fn route(&self, params: &Params) -> Result<Vec<(String, Params)>> {
        let mut routed: Vec<(String, Params)> = Vec::new();
        let mut push = |segment: &str, key: &str, value: ParamValue| {
            match routed.iter_mut().find(|(name, _)| name == segment) {
                Some((_, entry)) => entry.insert(key, value),
                None => routed.push((segment.to_string(), Params::new().with(key, value))),
            }
        };

        for key in params.keys() {
            let Some(value) = params.get(key).cloned() else {
                continue;
            };
            if key == "source" || key == "target" {
                let current = if key == "source" { &self.source } else { &self.target };
                if params.text(&self.name, key)?.as_deref() != Some(current.as_str()) {
                    return Err(NetworkError::invalid(
                        &self.name,
                        key,
                        "endpoints cannot change once the network is built",
                    ));
                }
                continue;
            }
            if let Some((segment, parameter)) = key.split_once('.') {
                if !self.segments.iter().any(|s| s.name() == segment) {
                    return Err(NetworkError::unsupported(&self.name, key));
                }
                push(segment, parameter, value);
                continue;
            }
            if !self.derived {
                return Err(NetworkError::unsupported(&self.name, key));
            }

            let targets: Vec<(&str, &str)> = match key {
                "max_power_source_target" => vec![
                    ("power_limit", key),
                    ("time_slice", "capacity_source_target"),
                ],
                "max_power_target_source" => vec![
                    ("power_limit", key),
                    ("time_slice", "capacity_target_source"),
                ],
                "fixed_power" => vec![("power_limit", "fixed")],
                "price_source_target" | "price_target_source" => vec![("pricing", key)],
                "efficiency_source_target" | "efficiency_target_source" => vec![("efficiency", key)],
                _ => Vec::new(),
            };
            let present: Vec<_> = targets
                .into_iter()
                .filter(|(segment, _)| self.segments.iter().any(|s| s.name() == *segment))
                .collect();
            if present.is_empty() {
                return Err(NetworkError::unsupported(&self.name, key));
            }
            for (segment, parameter) in present {
                push(segment, parameter, value.clone());
            }
        }
        Ok(routed)
    }
}

/// Segment chain for a connection configured by flat parameters
fn derive_chain(params: &Params) -> Vec<SegmentSpec> {
    let pick = |keys: &[(&str, &str)]| -> Params {
        keys.iter()
            .filter_map(|(from, to)| params.get(from).map(|value| (to.to_string(), value.clone())))
            .collect()
    };

    let mut specs = Vec::new();
    let max_st = params.contains("max_power_source_target");
    let max_ts = params.contains("max_power_target_source");
    if max_st || max_ts {
        specs.push(SegmentSpec::new(
            "power_limit",
            SegmentKind::PowerLimit,
            pick(&[
                ("max_power_source_target", "max_power_source_target"),
                ("max_power_target_source", "max_power_target_source"),
                ("fixed_power", "fixed"),
            ]),
        ));
    }
    if max_st && max_ts {
        specs.push(SegmentSpec::new(
            "time_slice",
            SegmentKind::TimeSlice,
            pick(&[
                ("max_power_source_target", "capacity_source_target"),
                ("max_power_target_source", "capacity_target_source"),
            ]),
        ));
    }
    if params.contains("price_source_target") || params.contains("price_target_source") {
        specs.push(SegmentSpec::new(
            "pricing",
            SegmentKind::Pricing,
            pick(&[
                ("price_source_target", "price_source_target"),
                ("price_target_source", "price_target_source"),
            ]),
        ));
    }
    if params.contains("efficiency_source_target") || params.contains("efficiency_target_source") {
        specs.push(SegmentSpec::new(
            "efficiency",
            SegmentKind::Efficiency,
            pick(&[
                ("efficiency_source_target", "efficiency_source_target"),
                ("efficiency_target_source", "efficiency_target_source"),
            ]),
        ));
    }
    if specs.is_empty() {
        specs.push(SegmentSpec::new("passthrough", SegmentKind::Passthrough, Params::new()));
    }
    specs
}

impl PowerLink for Connection {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ElementKind {
        ElementKind::Connection
    }

    fn source(&self) -> &str {
        &self.source
    }

    fn target(&self) -> &str {
        &self.target
    }

    fn power_into(&self, end: End, t: usize) -> LinearExpr {
        let (first, last) = (self.first().flows(), self.last().flows());
        match end {
            End::Source => last.out_target_source[t] - first.in_source_target[t],
            End::Target => last.out_source_target[t] - first.in_target_source[t],
        }
    }

    fn build_constraints(&mut self, model: &mut LpModel, _context: &BuildContext) -> Result<()> {
        for segment in &mut self.segments {
            segment.build_constraints(model)?;
        }
        for (i, pair) in self.segments.windows(2).enumerate() {
            let (upstream, downstream) = (pair[0].flows(), pair[1].flows());
            for t in 0..self.durations.len() {
                model.add_constraint(
                    format!("{}.link_source_target[{i}][{t}]", self.name),
                    upstream.out_source_target[t] - downstream.in_source_target[t],
                    Sense::Eq,
                    0.0,
                );
                model.add_constraint(
                    format!("{}.link_target_source[{i}][{t}]", self.name),
                    upstream.out_target_source[t] - downstream.in_target_source[t],
                    Sense::Eq,
                    0.0,
                );
            }
        }
        self.built = true;
        Ok(())
    }

    fn cost(&self) -> LinearExpr {
        self.segments.iter().map(|segment| segment.cost()).sum()
    }

    fn regularization(&self, weight: f64) -> LinearExpr {
        let first = self.first().flows();
        self.durations
            .iter()
            .enumerate()
            .map(|(t, period)| {
                (first.in_source_target[t] + first.in_target_source[t]) * (weight * period)
            })
            .sum()
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs {
        let first = self.first().flows();
        let mut outputs = ElementOutputs::new();
        outputs.insert(
            "power_source_target".to_string(),
            OutputSeries::power_flow(solution.values(&first.in_source_target)),
        );
        outputs.insert(
            "power_target_source".to_string(),
            OutputSeries::power_flow(solution.values(&first.in_target_source)),
        );

        for segment in &self.segments {
            for (key, series) in segment.outputs(solution) {
                let key = if outputs.contains_key(&key) {
                    format!("{}.{key}", segment.name())
                } else {
                    key
                };
                outputs.insert(key, series);
            }
        }
        outputs
    }

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        require_built(&self.name, self.built.then_some(()))?;
        let routed = self.route(params)?;
        for (segment, segment_params) in &routed {
            if let Some(segment) = self.segments.iter().find(|s| s.name() == segment.as_str()) {
                segment.check_update(segment_params)?;
            }
        }
        for (segment, segment_params) in routed {
            if let Some(segment) = self.segment_mut(&segment) {
                segment.update(model, &segment_params)?;
            }
        }
        debug!(connection = %self.name, "connection updated");
        Ok(())
    }
}
