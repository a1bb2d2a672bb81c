use std::path::Path;

use anyhow::{ensure, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::lp::SolverBackend;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub solver: SolverConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub backend: SolverBackend,
    /// $/kWh added to lossless flows so interior-point optima stay bounded;
    /// not part of the reported objective
    pub regularization: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            backend: SolverBackend::default(),
            regularization: 1e-4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Default $/kWh per hour held in an upper battery partition, regularization only
    pub ordering_weight: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { ordering_weight: 1e-4 }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    /// Defaults, then `path` if it exists, then `OEO__*` environment variables
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("OEO__").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let regularization = self.solver.regularization;
        ensure!(
            regularization.is_finite() && regularization >= 0.0,
            "solver.regularization must be finite and non-negative, got {regularization}"
        );
        let ordering_weight = self.model.ordering_weight;
        ensure!(
            ordering_weight.is_finite() && ordering_weight >= 0.0,
            "model.ordering_weight must be finite and non-negative, got {ordering_weight}"
        );
        ensure!(
            self.solver.backend.is_available(),
            "solver backend `{}` is not compiled in",
            self.solver.backend
        );
        Ok(())
    }
}
