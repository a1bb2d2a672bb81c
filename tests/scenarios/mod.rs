mod battery;
mod errors;
mod grid_load;
mod schedulable_load;
mod warm_start;

use open_energy_optimizer::presets::{self, GridPreset, LoadPreset};
use open_energy_optimizer::{ElementKind, Network, Params, Periods};

pub const TOLERANCE: f64 = 1e-3;

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < TOLERANCE,
        "expected {expected}, got {actual}"
    );
}

pub fn assert_series_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "series lengths differ");
    for (t, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert!((a - e).abs() < TOLERANCE, "interval {t}: expected {e}, got {a}");
    }
}

pub fn values(network: &Network, element: &str, output: &str) -> Vec<f64> {
    let outputs = network.outputs().unwrap();
    outputs
        .get(element)
        .and_then(|series| series.get(output))
        .unwrap_or_else(|| panic!("missing output {element}.{output}"))
        .values
        .clone()
}

pub fn grid(import_price: f64, export_price: f64) -> GridPreset {
    GridPreset {
        connection: "home".to_string(),
        import_price: Some(import_price.into()),
        export_price: Some(export_price.into()),
        import_limit: None,
        export_limit: None,
    }
}

/// `home` node with a grid and a fixed load
pub fn grid_and_load(periods: Periods, grid_preset: &GridPreset, forecast: Vec<f64>) -> Network {
    let mut network = Network::new(periods);
    network.add(ElementKind::Node, "home", Params::new()).unwrap();
    network.extend(presets::grid("grid", grid_preset).unwrap()).unwrap();
    network
        .extend(
            presets::load(
                "load",
                &LoadPreset {
                    connection: "home".to_string(),
                    forecast: forecast.into(),
                },
            )
            .unwrap(),
        )
        .unwrap();
    network
}
