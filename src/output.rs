use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// What an output series measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputType {
    Power,
    PowerFlow,
    PowerLimit,
    Energy,
    Price,
    StateOfCharge,
    ShadowPrice,
    Status,
    Duration,
    Boolean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Unit {
    #[strum(serialize = "kW")]
    #[serde(rename = "kW")]
    Kilowatt,
    #[strum(serialize = "kWh")]
    #[serde(rename = "kWh")]
    KilowattHour,
    #[strum(serialize = "$/kW")]
    #[serde(rename = "$/kW")]
    PricePerKilowatt,
    #[strum(serialize = "$/kWh")]
    #[serde(rename = "$/kWh")]
    PricePerKilowattHour,
    #[strum(serialize = "%")]
    #[serde(rename = "%")]
    Percent,
    #[strum(serialize = "h")]
    #[serde(rename = "h")]
    Hour,
    #[strum(serialize = "")]
    #[serde(rename = "")]
    Dimensionless,
}

/// Whether a series adds power to (`+`) or draws power from (`-`) the network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Direction {
    #[strum(serialize = "+")]
    #[serde(rename = "+")]
    Production,
    #[strum(serialize = "-")]
    #[serde(rename = "-")]
    Consumption,
}

/// Immutable named result of an optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSeries {
    #[serde(rename = "type")]
    pub kind: OutputType,
    pub unit: Unit,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    pub values: Vec<f64>,
}

impl OutputSeries {
    pub fn new(kind: OutputType, unit: Unit, values: Vec<f64>) -> Self {
        Self {
            kind,
            unit,
            direction: None,
            values,
        }
    }

    pub fn power(values: Vec<f64>, direction: Direction) -> Self {
        Self::new(OutputType::Power, Unit::Kilowatt, values).with_direction(direction)
    }

    pub fn power_flow(values: Vec<f64>) -> Self {
        Self::new(OutputType::PowerFlow, Unit::Kilowatt, values)
    }

    pub fn energy(values: Vec<f64>) -> Self {
        Self::new(OutputType::Energy, Unit::KilowattHour, values)
    }

    pub fn shadow_price(unit: Unit, values: Vec<f64>) -> Self {
        Self::new(OutputType::ShadowPrice, unit, values)
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }
}

/// Outputs of one element, keyed by output name
pub type ElementOutputs = BTreeMap<String, OutputSeries>;

/// Outputs of a whole network, keyed by element name then output name
pub type NetworkOutputs = BTreeMap<String, ElementOutputs>;
