//! Linear-programming optimizer for household energy networks
//!
//! A [`Network`] holds named elements (nodes, sources and sinks, storage,
//! deferrable loads) joined by connections. Building the network emits one
//! LP over a fixed period grid; optimizing it returns the minimum-cost
//! objective and per-element output series, including shadow prices.
//!
//! ```no_run
//! use open_energy_optimizer::{presets, Network, Periods};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut network = Network::new(Periods::uniform(3, 1.0)?);
//! network.add(open_energy_optimizer::ElementKind::Node, "home", Default::default())?;
//! network.extend(presets::grid("grid", &presets::GridPreset {
//!     connection: "home".into(),
//!     import_price: Some(0.3_f64.into()),
//!     export_price: None,
//!     import_limit: None,
//!     export_limit: None,
//! })?)?;
//! network.extend(presets::load("load", &presets::LoadPreset {
//!     connection: "home".into(),
//!     forecast: vec![1.0, 1.0, 1.0].into(),
//! })?)?;
//! let cost = network.optimize()?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connections;
pub mod elements;
pub mod lp;
pub mod network;
pub mod output;
pub mod params;
pub mod periods;
pub mod presets;
pub mod telemetry;

pub use config::Config;
pub use elements::ElementKind;
pub use network::{ElementSpec, Network, NetworkError};
pub use output::{Direction, ElementOutputs, NetworkOutputs, OutputSeries, OutputType, Unit};
pub use params::{ParamValue, Params};
pub use periods::Periods;
