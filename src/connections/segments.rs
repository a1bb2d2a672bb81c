//! Composable power-flow stages of a connection
//!
//! Every segment owns four per-period flows: `in`/`out` for each direction.
//! A connection chains segments with `segment[i].out == segment[i + 1].in`
//! in both directions.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::elements::ConstraintSet;
use crate::lp::{ConstraintId, LinearExpr, LpModel, LpSolution, Sense, VarId};
use crate::network::{NetworkError, Result};
use crate::output::{ElementOutputs, OutputSeries, OutputType, Unit};
use crate::params::Params;
use crate::periods::Periods;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SegmentKind {
    Passthrough,
    Efficiency,
    PowerLimit,
    Pricing,
    TimeSlice,
}

/// One named stage of an explicit segment chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub name: String,
    pub kind: SegmentKind,
    #[serde(default)]
    pub params: Params,
}

impl SegmentSpec {
    pub fn new(name: &str, kind: SegmentKind, params: Params) -> Self {
        Self {
            name: name.to_string(),
            kind,
            params,
        }
    }
}

/// Per-direction flows of one segment, all non-negative
#[derive(Debug, Clone)]
pub struct SegmentFlows {
    pub in_source_target: Vec<VarId>,
    pub out_source_target: Vec<VarId>,
    pub in_target_source: Vec<VarId>,
    pub out_target_source: Vec<VarId>,
}

impl SegmentFlows {
    fn new(model: &mut LpModel, label: &str, n: usize) -> Self {
        Self {
            in_source_target: model.add_variables(&format!("{label}.in_source_target"), n, 0.0, f64::INFINITY),
            out_source_target: model.add_variables(&format!("{label}.out_source_target"), n, 0.0, f64::INFINITY),
            in_target_source: model.add_variables(&format!("{label}.in_target_source"), n, 0.0, f64::INFINITY),
            out_target_source: model.add_variables(&format!("{label}.out_target_source"), n, 0.0, f64::INFINITY),
        }
    }

    pub fn len(&self) -> usize {
        self.in_source_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_source_target.is_empty()
    }

    /// `out == in` in both directions
    fn pass_through(&self, model: &mut LpModel, label: &str) {
        for t in 0..self.len() {
            model.add_constraint(
                format!("{label}.pass_source_target[{t}]"),
                self.out_source_target[t] - self.in_source_target[t],
                Sense::Eq,
                0.0,
            );
            model.add_constraint(
                format!("{label}.pass_target_source[{t}]"),
                self.out_target_source[t] - self.in_target_source[t],
                Sense::Eq,
                0.0,
            );
        }
    }
}

pub trait Segment: fmt::Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> SegmentKind;

    fn flows(&self) -> &SegmentFlows;

    /// Parameter names accepted at construction and by `update`
    fn parameters(&self) -> &'static [&'static str];

    fn build_constraints(&mut self, model: &mut LpModel) -> Result<()>;

    fn cost(&self) -> LinearExpr {
        LinearExpr::new()
    }

    fn outputs(&self, _solution: &LpSolution) -> ElementOutputs {
        ElementOutputs::new()
    }

    /// Validate `params` as `update` would, without touching the model
    fn check_update(&self, params: &Params) -> Result<()>;

    /// Apply `params` to the built problem; nothing changes when it fails
    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()>;
}

pub fn create_segment(
    connection: &str,
    spec: &SegmentSpec,
    periods: &Periods,
    model: &mut LpModel,
) -> Result<Box<dyn Segment>> {
    let base = SegmentBase::new(connection, &spec.name, periods, model);
    let segment: Box<dyn Segment> = match spec.kind {
        SegmentKind::Passthrough => Box::new(Passthrough::new(base, &spec.params)?),
        SegmentKind::Efficiency => Box::new(Efficiency::new(base, &spec.params)?),
        SegmentKind::PowerLimit => Box::new(PowerLimit::new(base, &spec.params)?),
        SegmentKind::Pricing => Box::new(Pricing::new(base, &spec.params)?),
        SegmentKind::TimeSlice => Box::new(TimeSlice::new(base, &spec.params)?),
    };
    Ok(segment)
}

/// State shared by every segment type
#[derive(Debug)]
struct SegmentBase {
    name: String,
    label: String,
    durations: Vec<f64>,
    flows: SegmentFlows,
}

impl SegmentBase {
    fn new(connection: &str, name: &str, periods: &Periods, model: &mut LpModel) -> Self {
        let label = format!("{connection}.{name}");
        Self {
            name: name.to_string(),
            flows: SegmentFlows::new(model, &label, periods.len()),
            durations: periods.durations().to_vec(),
            label,
        }
    }

    fn n(&self) -> usize {
        self.durations.len()
    }

    /// Optional per-period series for one direction
    fn series(&self, params: &Params, key: &str) -> Result<Option<Vec<f64>>> {
        params.series(&self.label, key, self.n())
    }
}

fn check_range(label: &str, key: &str, values: &[f64], lo: f64, hi: f64) -> Result<()> {
    match values.iter().find(|v| **v < lo || **v > hi) {
        Some(bad) => Err(NetworkError::invalid(
            label,
            key,
            format!("value {bad} outside [{lo}, {hi}]"),
        )),
        None => Ok(()),
    }
}

macro_rules! segment_accessors {
    ($kind:expr, $params:expr) => {
        fn name(&self) -> &str {
            &self.base.name
        }

        fn kind(&self) -> SegmentKind {
            $kind
        }

        fn flows(&self) -> &SegmentFlows {
            &self.base.flows
        }

        fn parameters(&self) -> &'static [&'static str] {
            $params
        }
    };
}

#[derive(Debug)]
pub struct Passthrough {
    base: SegmentBase,
}

impl Passthrough {
    const PARAMETERS: &'static [&'static str] = &[];

    fn new(base: SegmentBase, params: &Params) -> Result<Self> {
        params.ensure_only(&base.label, Self::PARAMETERS)?;
        Ok(Self { base })
    }
}

impl Segment for Passthrough {
    segment_accessors!(SegmentKind::Passthrough, Self::PARAMETERS);

    fn build_constraints(&mut self, model: &mut LpModel) -> Result<()> {
        self.base.flows.pass_through(model, &self.base.label);
        Ok(())
    }

    fn check_update(&self, params: &Params) -> Result<()> {
        params.ensure_only(&self.base.label, Self::PARAMETERS)
    }

    fn update(&mut self, _model: &mut LpModel, params: &Params) -> Result<()> {
        self.check_update(params)
    }
}

/// `out = in * efficiency`, per direction
///
/// A direction left unset is lossless.
#[derive(Debug)]
pub struct Efficiency {
    base: SegmentBase,
    source_target: Vec<f64>,
    target_source: Vec<f64>,
    constraints: Vec<(ConstraintId, ConstraintId)>,
}

impl Efficiency {
    const PARAMETERS: &'static [&'static str] = &["efficiency_source_target", "efficiency_target_source"];

    fn new(base: SegmentBase, params: &Params) -> Result<Self> {
        params.ensure_only(&base.label, Self::PARAMETERS)?;
        let lossless = || vec![1.0; base.n()];
        let source_target = base.series(params, "efficiency_source_target")?.unwrap_or_else(lossless);
        let target_source = base.series(params, "efficiency_target_source")?.unwrap_or_else(lossless);
        check_range(&base.label, "efficiency_source_target", &source_target, 0.0, 1.0)?;
        check_range(&base.label, "efficiency_target_source", &target_source, 0.0, 1.0)?;
        Ok(Self {
            base,
            source_target,
            target_source,
            constraints: Vec::new(),
        })
    }

    fn parse_update(&self, params: &Params) -> Result<(Option<Vec<f64>>, Option<Vec<f64>>)> {
        params.ensure_only(&self.base.label, Self::PARAMETERS)?;
        let st = self.base.series(params, "efficiency_source_target")?;
        let ts = self.base.series(params, "efficiency_target_source")?;
        for (key, values) in [("efficiency_source_target", &st), ("efficiency_target_source", &ts)] {
            if let Some(values) = values {
                check_range(&self.base.label, key, values, 0.0, 1.0)?;
            }
        }
        Ok((st, ts))
    }
}

impl Segment for Efficiency {
    segment_accessors!(SegmentKind::Efficiency, Self::PARAMETERS);

    fn build_constraints(&mut self, model: &mut LpModel) -> Result<()> {
        let label = &self.base.label;
        let flows = &self.base.flows;
        self.constraints = (0..self.base.n())
            .map(|t| {
                let st = model.add_constraint(
                    format!("{label}.efficiency_source_target[{t}]"),
                    LinearExpr::from(flows.out_source_target[t])
                        - self.source_target[t] * flows.in_source_target[t],
                    Sense::Eq,
                    0.0,
                );
                let ts = model.add_constraint(
                    format!("{label}.efficiency_target_source[{t}]"),
                    LinearExpr::from(flows.out_target_source[t])
                        - self.target_source[t] * flows.in_target_source[t],
                    Sense::Eq,
                    0.0,
                );
                (st, ts)
            })
            .collect();
        Ok(())
    }

    fn check_update(&self, params: &Params) -> Result<()> {
        self.parse_update(params).map(|_| ())
    }

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        let (st, ts) = self.parse_update(params)?;
        if let Some(values) = st {
            self.source_target = values;
        }
        if let Some(values) = ts {
            self.target_source = values;
        }
        let flows = &self.base.flows;
        for (t, (st, ts)) in self.constraints.iter().enumerate() {
            model.set_coefficient(*st, flows.in_source_target[t], -self.source_target[t]);
            model.set_coefficient(*ts, flows.in_target_source[t], -self.target_source[t]);
        }
        Ok(())
    }
}

/// `in <= max` (or `in == max` when fixed), per direction
///
/// Directions without a limit are unconstrained; infinite values likewise.
#[derive(Debug)]
pub struct PowerLimit {
    base: SegmentBase,
    max_source_target: Option<Vec<f64>>,
    max_target_source: Option<Vec<f64>>,
    fixed: bool,
    constraints: ConstraintSet,
}

impl PowerLimit {
    const PARAMETERS: &'static [&'static str] =
        &["max_power_source_target", "max_power_target_source", "fixed"];

    fn new(base: SegmentBase, params: &Params) -> Result<Self> {
        params.ensure_only(&base.label, Self::PARAMETERS)?;
        let max_source_target = base.series(params, "max_power_source_target")?;
        let max_target_source = base.series(params, "max_power_target_source")?;
        for (key, values) in [
            ("max_power_source_target", &max_source_target),
            ("max_power_target_source", &max_target_source),
        ] {
            if let Some(values) = values {
                check_range(&base.label, key, values, 0.0, f64::INFINITY)?;
            }
        }
        Ok(Self {
            fixed: params.flag(&base.label, "fixed")?.unwrap_or(false),
            base,
            max_source_target,
            max_target_source,
            constraints: ConstraintSet::new(),
        })
    }

    fn sense(&self) -> Sense {
        if self.fixed {
            Sense::Eq
        } else {
            Sense::Le
        }
    }

    fn limit(
        &self,
        model: &mut LpModel,
        direction: &str,
        flows: &[VarId],
        max: &[f64],
    ) -> Vec<ConstraintId> {
        flows
            .iter()
            .zip(max)
            .enumerate()
            .map(|(t, (flow, max))| {
                model.add_constraint(
                    format!("{}.power_limit_{direction}[{t}]", self.base.label),
                    *flow,
                    self.sense(),
                    *max,
                )
            })
            .collect()
    }

    /// New limits per direction and the new `fixed` flag, all validated
    fn parse_update(&self, params: &Params) -> Result<PowerLimitUpdate> {
        let label = &self.base.label;
        params.ensure_only(label, Self::PARAMETERS)?;
        let mut limits = [None, None];
        for (slot, (key, current)) in limits.iter_mut().zip([
            ("max_power_source_target", &self.max_source_target),
            ("max_power_target_source", &self.max_target_source),
        ]) {
            let Some(values) = self.base.series(params, key)? else {
                continue;
            };
            if current.is_none() {
                return Err(NetworkError::unsupported(label, key));
            }
            check_range(label, key, &values, 0.0, f64::INFINITY)?;
            *slot = Some(values);
        }
        let [source_target, target_source] = limits;
        Ok(PowerLimitUpdate {
            source_target,
            target_source,
            fixed: params.flag(label, "fixed")?,
        })
    }
}

#[derive(Debug)]
struct PowerLimitUpdate {
    source_target: Option<Vec<f64>>,
    target_source: Option<Vec<f64>>,
    fixed: Option<bool>,
}

impl Segment for PowerLimit {
    segment_accessors!(SegmentKind::PowerLimit, Self::PARAMETERS);

    fn build_constraints(&mut self, model: &mut LpModel) -> Result<()> {
        self.base.flows.pass_through(model, &self.base.label);
        if let Some(max) = &self.max_source_target {
            let ids = self.limit(model, "source_target", &self.base.flows.in_source_target, max);
            self.constraints
                .insert("power_limit_source_target", Unit::PricePerKilowatt, ids);
        }
        if let Some(max) = &self.max_target_source {
            let ids = self.limit(model, "target_source", &self.base.flows.in_target_source, max);
            self.constraints
                .insert("power_limit_target_source", Unit::PricePerKilowatt, ids);
        }
        Ok(())
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs {
        let mut outputs = self.constraints.shadow_prices(solution);
        for (key, max) in [
            ("max_power_source_target", &self.max_source_target),
            ("max_power_target_source", &self.max_target_source),
        ] {
            if let Some(max) = max {
                outputs.insert(
                    key.to_string(),
                    OutputSeries::new(OutputType::PowerLimit, Unit::Kilowatt, max.clone()),
                );
            }
        }
        outputs
    }

    fn check_update(&self, params: &Params) -> Result<()> {
        self.parse_update(params).map(|_| ())
    }

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        let update = self.parse_update(params)?;
        for (values, group, slot) in [
            (update.source_target, "power_limit_source_target", &mut self.max_source_target),
            (update.target_source, "power_limit_target_source", &mut self.max_target_source),
        ] {
            let Some(values) = values else {
                continue;
            };
            for (id, max) in self.constraints.ids(group).iter().zip(&values) {
                model.set_rhs(*id, *max);
            }
            *slot = Some(values);
        }

        if let Some(fixed) = update.fixed {
            self.fixed = fixed;
            let sense = self.sense();
            for group in ["power_limit_source_target", "power_limit_target_source"] {
                for id in self.constraints.ids(group) {
                    model.set_sense(*id, sense);
                }
            }
        }
        Ok(())
    }
}

/// Adds `price * in * period` to the objective, per direction
#[derive(Debug)]
pub struct Pricing {
    base: SegmentBase,
    price_source_target: Option<Vec<f64>>,
    price_target_source: Option<Vec<f64>>,
}

impl Pricing {
    const PARAMETERS: &'static [&'static str] = &["price_source_target", "price_target_source"];

    fn new(base: SegmentBase, params: &Params) -> Result<Self> {
        params.ensure_only(&base.label, Self::PARAMETERS)?;
        let price_source_target = base.series(params, "price_source_target")?;
        let price_target_source = base.series(params, "price_target_source")?;
        let segment = Self {
            base,
            price_source_target,
            price_target_source,
        };
        segment.check_finite()?;
        Ok(segment)
    }

    fn check_finite(&self) -> Result<()> {
        for (key, prices) in [
            ("price_source_target", &self.price_source_target),
            ("price_target_source", &self.price_target_source),
        ] {
            if let Some(prices) = prices {
                check_range(&self.base.label, key, prices, f64::MIN, f64::MAX)?;
            }
        }
        Ok(())
    }

    /// A direction priced at construction can be repriced; an unpriced one stays free
    fn parse_update(&self, params: &Params) -> Result<(Option<Vec<f64>>, Option<Vec<f64>>)> {
        let label = &self.base.label;
        params.ensure_only(label, Self::PARAMETERS)?;
        let mut prices = [None, None];
        for (slot, (key, current)) in prices.iter_mut().zip([
            ("price_source_target", &self.price_source_target),
            ("price_target_source", &self.price_target_source),
        ]) {
            let Some(values) = self.base.series(params, key)? else {
                continue;
            };
            if current.is_none() {
                return Err(NetworkError::unsupported(label, key));
            }
            check_range(label, key, &values, f64::MIN, f64::MAX)?;
            *slot = Some(values);
        }
        let [source_target, target_source] = prices;
        Ok((source_target, target_source))
    }

    fn direction_cost(&self, prices: &Option<Vec<f64>>, flows: &[VarId]) -> LinearExpr {
        let Some(prices) = prices else {
            return LinearExpr::new();
        };
        flows
            .iter()
            .zip(prices)
            .zip(&self.base.durations)
            .map(|((flow, price), period)| LinearExpr::term(*flow, price * period))
            .sum()
    }
}

impl Segment for Pricing {
    segment_accessors!(SegmentKind::Pricing, Self::PARAMETERS);

    fn build_constraints(&mut self, model: &mut LpModel) -> Result<()> {
        self.base.flows.pass_through(model, &self.base.label);
        Ok(())
    }

    fn cost(&self) -> LinearExpr {
        let flows = &self.base.flows;
        self.direction_cost(&self.price_source_target, &flows.in_source_target)
            + self.direction_cost(&self.price_target_source, &flows.in_target_source)
    }

    fn outputs(&self, _solution: &LpSolution) -> ElementOutputs {
        [
            ("price_source_target", &self.price_source_target),
            ("price_target_source", &self.price_target_source),
        ]
        .into_iter()
        .filter_map(|(key, prices)| {
            prices.as_ref().map(|prices| {
                (
                    key.to_string(),
                    OutputSeries::new(OutputType::Price, Unit::PricePerKilowattHour, prices.clone()),
                )
            })
        })
        .collect()
    }

    fn check_update(&self, params: &Params) -> Result<()> {
        self.parse_update(params).map(|_| ())
    }

    fn update(&mut self, _model: &mut LpModel, params: &Params) -> Result<()> {
        let (source_target, target_source) = self.parse_update(params)?;
        if source_target.is_some() {
            self.price_source_target = source_target;
        }
        if target_source.is_some() {
            self.price_target_source = target_source;
        }
        Ok(())
    }
}

/// `in_st / cap_st + in_ts / cap_ts <= 1`
///
/// A zero or infinite capacity contributes nothing (`0/0 := 0`).
#[derive(Debug)]
pub struct TimeSlice {
    base: SegmentBase,
    capacity_source_target: Vec<f64>,
    capacity_target_source: Vec<f64>,
    constraints: ConstraintSet,
}

impl TimeSlice {
    const PARAMETERS: &'static [&'static str] = &["capacity_source_target", "capacity_target_source"];

    fn new(base: SegmentBase, params: &Params) -> Result<Self> {
        params.ensure_only(&base.label, Self::PARAMETERS)?;
        let capacity_source_target = params.require_series(&base.label, "capacity_source_target", base.n())?;
        let capacity_target_source = params.require_series(&base.label, "capacity_target_source", base.n())?;
        check_range(&base.label, "capacity_source_target", &capacity_source_target, 0.0, f64::INFINITY)?;
        check_range(&base.label, "capacity_target_source", &capacity_target_source, 0.0, f64::INFINITY)?;
        Ok(Self {
            base,
            capacity_source_target,
            capacity_target_source,
            constraints: ConstraintSet::new(),
        })
    }

    fn parse_update(&self, params: &Params) -> Result<(Option<Vec<f64>>, Option<Vec<f64>>)> {
        let label = &self.base.label;
        params.ensure_only(label, Self::PARAMETERS)?;
        let st = self.base.series(params, "capacity_source_target")?;
        let ts = self.base.series(params, "capacity_target_source")?;
        for (key, values) in [("capacity_source_target", &st), ("capacity_target_source", &ts)] {
            if let Some(values) = values {
                check_range(label, key, values, 0.0, f64::INFINITY)?;
            }
        }
        Ok((st, ts))
    }
}

fn inverse(capacity: f64) -> f64 {
    if capacity > 0.0 && capacity.is_finite() {
        1.0 / capacity
    } else {
        0.0
    }
}

impl Segment for TimeSlice {
    segment_accessors!(SegmentKind::TimeSlice, Self::PARAMETERS);

    fn build_constraints(&mut self, model: &mut LpModel) -> Result<()> {
        let label = &self.base.label;
        let flows = &self.base.flows;
        flows.pass_through(model, label);
        let ids = (0..self.base.n())
            .map(|t| {
                model.add_constraint(
                    format!("{label}.time_slice[{t}]"),
                    LinearExpr::term(flows.in_source_target[t], inverse(self.capacity_source_target[t]))
                        + LinearExpr::term(flows.in_target_source[t], inverse(self.capacity_target_source[t])),
                    Sense::Le,
                    1.0,
                )
            })
            .collect();
        self.constraints.insert("time_slice", Unit::Dimensionless, ids);
        Ok(())
    }

    fn outputs(&self, solution: &LpSolution) -> ElementOutputs {
        self.constraints.shadow_prices(solution)
    }

    fn check_update(&self, params: &Params) -> Result<()> {
        self.parse_update(params).map(|_| ())
    }

    fn update(&mut self, model: &mut LpModel, params: &Params) -> Result<()> {
        let (st, ts) = self.parse_update(params)?;
        if let Some(values) = st {
            self.capacity_source_target = values;
        }
        if let Some(values) = ts {
            self.capacity_target_source = values;
        }
        let flows = &self.base.flows;
        for (t, id) in self.constraints.ids("time_slice").iter().enumerate() {
            model.set_coefficient(*id, flows.in_source_target[t], inverse(self.capacity_source_target[t]));
            model.set_coefficient(*id, flows.in_target_source[t], inverse(self.capacity_target_source[t]));
        }
        Ok(())
    }
}
