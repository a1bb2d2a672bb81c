//! Assemblies of elements and connections for common devices
//!
//! Each preset returns [`ElementSpec`]s for [`Network::extend`]. Names are
//! derived from the device name, so applying the same preset again with new
//! values updates the existing elements instead of creating new ones.
//!
//! [`Network::extend`]: crate::network::Network::extend

use serde::{Deserialize, Serialize};

use crate::elements::ElementKind;
use crate::network::{ElementSpec, NetworkError, Result};
use crate::params::{ParamValue, Params};
use crate::periods::Periods;

/// Battery split into ordered partitions behind an internal node
///
/// Percentages are of `capacity`. The normal partition spans
/// `[min_charge_percentage, max_charge_percentage]`; an undercharge partition
/// is added below it when `undercharge_percentage` is lower, an overcharge
/// partition above it when `overcharge_percentage` is higher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryPreset {
    /// Node the battery connects to
    pub connection: String,
    /// kWh, scalar or N+1 boundary values
    pub capacity: ParamValue,
    pub initial_charge_percentage: f64,
    #[serde(default)]
    pub min_charge_percentage: f64,
    #[serde(default = "full")]
    pub max_charge_percentage: f64,
    #[serde(default)]
    pub undercharge_percentage: Option<f64>,
    #[serde(default)]
    pub overcharge_percentage: Option<f64>,
    /// $/kWh for discharging out of the undercharge partition
    #[serde(default)]
    pub undercharge_cost: Option<ParamValue>,
    /// $/kWh for charging into the overcharge partition
    #[serde(default)]
    pub overcharge_cost: Option<ParamValue>,
    #[serde(default)]
    pub max_charge_power: Option<ParamValue>,
    #[serde(default)]
    pub max_discharge_power: Option<ParamValue>,
    /// One-way efficiency fraction, applied in both directions
    #[serde(default)]
    pub efficiency: Option<f64>,
    /// $/kWh wear cost on discharge
    #[serde(default)]
    pub discharge_cost: Option<ParamValue>,
    /// Overrides the network's default partition ordering weight
    #[serde(default)]
    pub ordering_weight: Option<f64>,
}

fn full() -> f64 {
    100.0
}

impl BatteryPreset {
    pub fn new(connection: &str, capacity: impl Into<ParamValue>, initial_charge_percentage: f64) -> Self {
        Self {
            connection: connection.to_string(),
            capacity: capacity.into(),
            initial_charge_percentage,
            min_charge_percentage: 0.0,
            max_charge_percentage: 100.0,
            undercharge_percentage: None,
            overcharge_percentage: None,
            undercharge_cost: None,
            overcharge_cost: None,
            max_charge_power: None,
            max_discharge_power: None,
            efficiency: None,
            discharge_cost: None,
            ordering_weight: None,
        }
    }

    /// `(partition, lower %, upper %)` from the bottom up
    fn partitions(&self, name: &str) -> Result<Vec<(&'static str, f64, f64)>> {
        let percentage = |key: &str, value: f64| {
            if (0.0..=100.0).contains(&value) {
                Ok(value)
            } else {
                Err(NetworkError::invalid(name, key, "must be between 0 and 100"))
            }
        };
        let min = percentage("min_charge_percentage", self.min_charge_percentage)?;
        let max = percentage("max_charge_percentage", self.max_charge_percentage)?;
        percentage("initial_charge_percentage", self.initial_charge_percentage)?;
        if min >= max {
            return Err(NetworkError::invalid(
                name,
                "max_charge_percentage",
                "must be above min_charge_percentage",
            ));
        }

        let mut partitions = Vec::with_capacity(3);
        if let Some(under) = self.undercharge_percentage {
            if percentage("undercharge_percentage", under)? > min {
                return Err(NetworkError::invalid(
                    name,
                    "undercharge_percentage",
                    "must not exceed min_charge_percentage",
                ));
            }
            if under < min {
                partitions.push(("undercharge", under, min));
            }
        }
        partitions.push(("normal", min, max));
        if let Some(over) = self.overcharge_percentage {
            if percentage("overcharge_percentage", over)? < max {
                return Err(NetworkError::invalid(
                    name,
                    "overcharge_percentage",
                    "must not be below max_charge_percentage",
                ));
            }
            if over > max {
                partitions.push(("overcharge", max, over));
            }
        }
        Ok(partitions)
    }
}

/// Specs for a partitioned battery named `name`
///
/// Produces `{name}:node`, one `{name}:{partition}` storage per partition with a
/// `{name}:{partition}:connection` to the node, a `{name}:{upper}:balance`
/// between each adjacent pair and `{name}:connection` from the node to
/// `preset.connection`.
pub fn battery(name: &str, preset: &BatteryPreset, periods: &Periods) -> Result<Vec<ElementSpec>> {
    let capacity = Params::new()
        .with("capacity", preset.capacity.clone())
        .require_series(name, "capacity", periods.len() + 1)?;
    if capacity.iter().any(|c| !c.is_finite() || *c < 0.0) {
        return Err(NetworkError::invalid(name, "capacity", "must be finite and non-negative"));
    }
    let partitions = preset.partitions(name)?;
    let node = format!("{name}:node");

    let mut specs = vec![ElementSpec::new(ElementKind::Node, node.clone(), Params::new())];
    let mut storages: Vec<(String, Vec<f64>)> = Vec::with_capacity(partitions.len());
    for (partition, lower, upper) in &partitions {
        let share = (upper - lower) / 100.0;
        let partition_capacity: Vec<f64> = capacity.iter().map(|c| c * share).collect();
        let filled = (preset.initial_charge_percentage - lower).clamp(0.0, upper - lower) / 100.0;
        let storage = format!("{name}:{partition}");

        specs.push(ElementSpec::new(
            ElementKind::EnergyStorage,
            storage.clone(),
            Params::new()
                .with("capacity", partition_capacity.clone())
                .with("initial_charge", capacity[0] * filled),
        ));

        let mut link = Params::new().with("source", storage.as_str()).with("target", node.as_str());
        match *partition {
            "undercharge" => link.insert("price_source_target", preset.undercharge_cost.clone()),
            "overcharge" => link.insert("price_target_source", preset.overcharge_cost.clone()),
            _ => {}
        }
        specs.push(ElementSpec::new(
            ElementKind::Connection,
            format!("{storage}:connection"),
            link,
        ));
        storages.push((storage, partition_capacity));
    }

    for pair in storages.windows(2) {
        let ((lower, lower_capacity), (upper, _)) = (&pair[0], &pair[1]);
        specs.push(ElementSpec::new(
            ElementKind::EnergyBalanceConnection,
            format!("{upper}:balance"),
            Params::new()
                .with("upper", upper.as_str())
                .with("lower", lower.as_str())
                .with("capacity_lower", lower_capacity.clone())
                .with("ordering_weight", preset.ordering_weight),
        ));
    }

    specs.push(ElementSpec::new(
        ElementKind::Connection,
        format!("{name}:connection"),
        Params::new()
            .with("source", node.as_str())
            .with("target", preset.connection.as_str())
            .with("max_power_source_target", preset.max_discharge_power.clone())
            .with("max_power_target_source", preset.max_charge_power.clone())
            .with("efficiency_source_target", preset.efficiency)
            .with("efficiency_target_source", preset.efficiency)
            .with("price_source_target", preset.discharge_cost.clone()),
    ));
    Ok(specs)
}

/// Grid meter: import is `source -> target`, export is `target -> source`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPreset {
    pub connection: String,
    /// $/kWh paid for imported energy
    #[serde(default)]
    pub import_price: Option<ParamValue>,
    /// $/kWh earned for exported energy
    #[serde(default)]
    pub export_price: Option<ParamValue>,
    #[serde(default)]
    pub import_limit: Option<ParamValue>,
    #[serde(default)]
    pub export_limit: Option<ParamValue>,
}

pub fn grid(name: &str, preset: &GridPreset) -> Result<Vec<ElementSpec>> {
    let export_price = preset
        .export_price
        .as_ref()
        .map(|price| negate(name, "export_price", price))
        .transpose()?;
    Ok(vec![
        ElementSpec::new(ElementKind::SourceSink, name, Params::new()),
        ElementSpec::new(
            ElementKind::Connection,
            format!("{name}:connection"),
            Params::new()
                .with("source", name)
                .with("target", preset.connection.as_str())
                .with("max_power_source_target", preset.import_limit.clone())
                .with("max_power_target_source", preset.export_limit.clone())
                .with("price_source_target", preset.import_price.clone())
                .with("price_target_source", export_price),
        ),
    ])
}

/// Fixed consumption following `forecast` (kW)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadPreset {
    pub connection: String,
    pub forecast: ParamValue,
}

pub fn load(name: &str, preset: &LoadPreset) -> Result<Vec<ElementSpec>> {
    Ok(vec![
        ElementSpec::new(
            ElementKind::SourceSink,
            name,
            Params::new().with("is_source", false),
        ),
        ElementSpec::new(
            ElementKind::Connection,
            format!("{name}:connection"),
            Params::new()
                .with("source", preset.connection.as_str())
                .with("target", name)
                .with("max_power_source_target", preset.forecast.clone())
                .with("max_power_target_source", 0.0)
                .with("fixed_power", true),
        ),
    ])
}

/// Production up to `forecast` (kW), or exactly `forecast` without curtailment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarPreset {
    pub connection: String,
    pub forecast: ParamValue,
    #[serde(default = "curtailable")]
    pub curtailment: bool,
    /// $/kWh attached to produced energy, e.g. a negative value for a feed-in bonus
    #[serde(default)]
    pub production_price: Option<ParamValue>,
}

fn curtailable() -> bool {
    true
}

pub fn solar(name: &str, preset: &SolarPreset) -> Result<Vec<ElementSpec>> {
    Ok(vec![
        ElementSpec::new(ElementKind::SourceSink, name, Params::new().with("is_sink", false)),
        ElementSpec::new(
            ElementKind::Connection,
            format!("{name}:connection"),
            Params::new()
                .with("source", name)
                .with("target", preset.connection.as_str())
                .with("max_power_source_target", preset.forecast.clone())
                .with("max_power_target_source", 0.0)
                .with("fixed_power", !preset.curtailment)
                .with("price_source_target", preset.production_price.clone()),
        ),
    ])
}

fn negate(name: &str, key: &str, value: &ParamValue) -> Result<ParamValue> {
    match value {
        ParamValue::Scalar(price) => Ok(ParamValue::Scalar(-price)),
        ParamValue::Series(prices) => Ok(ParamValue::Series(prices.iter().map(|p| -p).collect())),
        ParamValue::Null => Ok(ParamValue::Null),
        _ => Err(NetworkError::invalid(name, key, "expected a number or a sequence")),
    }
}
