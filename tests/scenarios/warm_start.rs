use open_energy_optimizer::presets::{self, BatteryPreset, LoadPreset};
use open_energy_optimizer::{ElementKind, Network, ParamValue, Params, Periods};

use super::{assert_close, assert_series_close, grid, grid_and_load, values};

fn periods() -> Periods {
    Periods::uniform(4, 1.0).unwrap()
}

fn load(forecast: Vec<f64>) -> Vec<open_energy_optimizer::ElementSpec> {
    presets::load(
        "load",
        &LoadPreset {
            connection: "home".to_string(),
            forecast: forecast.into(),
        },
    )
    .unwrap()
}

fn with_battery(mut network: Network, initial_percentage: f64) -> Network {
    let mut battery = BatteryPreset::new("home", 6.0, initial_percentage);
    battery.max_charge_power = Some(ParamValue::Scalar(2.0));
    battery.max_discharge_power = Some(ParamValue::Scalar(2.0));
    battery.efficiency = Some(0.95);
    network
        .extend(presets::battery("battery", &battery, &periods()).unwrap())
        .unwrap();
    network
}

#[test]
fn test_update_matches_fresh_build() {
    let prices = vec![0.10, 0.40, 0.20, 0.50];
    let final_grid = {
        let mut preset = grid(0.0, 0.0);
        preset.import_price = Some(prices.clone().into());
        preset
    };

    let mut fresh = with_battery(grid_and_load(periods(), &final_grid, vec![1.0, 2.0, 1.5, 3.0]), 50.0);
    let expected = fresh.optimize().unwrap();

    let mut warm = with_battery(grid_and_load(periods(), &grid(0.30, 0.05), vec![1.0, 1.0, 1.0, 1.0]), 10.0);
    warm.optimize().unwrap();
    warm.extend(presets::grid("grid", &final_grid).unwrap()).unwrap();
    warm.extend(load(vec![1.0, 2.0, 1.5, 3.0])).unwrap();
    warm = with_battery(warm, 50.0);
    let actual = warm.optimize().unwrap();

    assert_close(actual, expected);
    for (element, output) in [
        ("grid:connection", "power_source_target"),
        ("battery:connection", "power_source_target"),
        ("battery:connection", "power_target_source"),
    ] {
        assert_series_close(&values(&warm, element, output), &values(&fresh, element, output));
    }
    assert_series_close(
        &values(&warm, "battery:normal", "energy_stored"),
        &values(&fresh, "battery:normal", "energy_stored"),
    );
}

#[test]
fn test_update_keeps_model_size() {
    let mut network = grid_and_load(periods(), &grid(0.30, 0.05), vec![1.0; 4]);
    network.optimize().unwrap();
    let variables = network.model().num_variables();
    let constraints = network.model().num_constraints();

    network.extend(load(vec![2.0; 4])).unwrap();
    let objective = network.optimize().unwrap();

    assert_eq!(network.model().num_variables(), variables);
    assert_eq!(network.model().num_constraints(), constraints);
    assert_close(objective, 0.30 * 2.0 * 4.0);
}

#[test]
fn test_update_clears_previous_solution() {
    let mut network = grid_and_load(periods(), &grid(0.30, 0.05), vec![1.0; 4]);
    network.optimize().unwrap();

    network.extend(load(vec![2.0; 4])).unwrap();

    assert!(network.objective().is_none());
    assert!(network.outputs().is_err());
}

#[test]
fn test_source_sink_flags_update_in_place() {
    let mut network = grid_and_load(periods(), &grid(0.30, 0.05), vec![1.0; 4]);
    network.optimize().unwrap();

    network
        .add(ElementKind::SourceSink, "grid", Params::new().with("is_source", false))
        .unwrap();

    assert!(network.optimize().is_err());

    network
        .add(ElementKind::SourceSink, "grid", Params::new().with("is_source", true))
        .unwrap();
    assert_close(network.optimize().unwrap(), 1.2);
}
