use open_energy_optimizer::presets::{self, GridPreset, SolarPreset};
use open_energy_optimizer::{ElementKind, Network, OutputType, ParamValue, Params, Periods, Unit};

use super::{assert_close, assert_series_close, grid, grid_and_load, values, TOLERANCE};

#[test]
fn test_grid_supplies_fixed_load() {
    let periods = Periods::uniform(3, 1.0).unwrap();
    let mut network = grid_and_load(periods, &grid(0.30, 0.05), vec![1.0, 1.0, 1.0]);

    let objective = network.optimize().unwrap();

    assert_close(objective, 0.90);
    assert_eq!(network.objective(), Some(objective));
    assert_series_close(
        &values(&network, "grid:connection", "power_source_target"),
        &[1.0, 1.0, 1.0],
    );
    assert_series_close(
        &values(&network, "grid:connection", "power_target_source"),
        &[0.0, 0.0, 0.0],
    );
}

#[test]
fn test_node_shadow_price_is_import_price() {
    let periods = Periods::uniform(3, 1.0).unwrap();
    let mut network = grid_and_load(periods, &grid(0.30, 0.05), vec![1.0, 2.0, 1.0]);
    network.optimize().unwrap();

    let outputs = network.outputs().unwrap();
    let balance = &outputs["home"]["power_balance"];

    assert_eq!(balance.kind, OutputType::ShadowPrice);
    assert_eq!(balance.unit, Unit::PricePerKilowattHour);
    for price in &balance.values {
        assert!((price.abs() - 0.30).abs() < TOLERANCE, "got {price}");
    }
}

#[test]
fn test_periods_scale_energy_cost() {
    let periods = Periods::from_durations(vec![0.5, 1.0, 2.0]).unwrap();
    let mut network = grid_and_load(periods, &grid(0.20, 0.0), vec![2.0, 2.0, 2.0]);

    let objective = network.optimize().unwrap();

    assert_close(objective, 0.20 * 2.0 * 3.5);
}

#[test]
fn test_power_balance_holds_everywhere() {
    let periods = Periods::uniform(4, 1.0).unwrap();
    let mut network = grid_and_load(periods, &grid(0.25, 0.10), vec![1.0, 3.0, 0.5, 2.0]);
    network
        .extend(
            presets::solar(
                "solar",
                &SolarPreset {
                    connection: "home".to_string(),
                    forecast: vec![0.0, 2.0, 4.0, 1.0].into(),
                    curtailment: true,
                    production_price: None,
                },
            )
            .unwrap(),
        )
        .unwrap();
    network.optimize().unwrap();

    let home = network.connection_power("home").unwrap();
    assert_series_close(&home, &[0.0; 4]);

    let grid_power = network.connection_power("grid").unwrap();
    let source = values(&network, "grid", "power_source");
    let sink = values(&network, "grid", "power_sink");
    for t in 0..4 {
        assert_close(grid_power[t] + source[t] - sink[t], 0.0);
    }

    // surplus solar is exported because export pays
    assert_series_close(
        &values(&network, "grid:connection", "power_target_source"),
        &[0.0, 0.0, 3.5, 0.0],
    );
    assert_series_close(
        &values(&network, "solar:connection", "power_source_target"),
        &[0.0, 2.0, 4.0, 1.0],
    );
}

#[test]
fn test_bidirectional_limits_share_capacity() {
    let periods = Periods::uniform(3, 1.0).unwrap();
    let mut network = Network::new(periods);
    network.add(ElementKind::Node, "home", Params::new()).unwrap();
    network
        .extend(
            presets::grid(
                "grid",
                &GridPreset {
                    connection: "home".to_string(),
                    // both directions pay, so only the time slice stops a loop
                    import_price: Some(ParamValue::Scalar(-1.0)),
                    export_price: Some(ParamValue::Scalar(1.0)),
                    import_limit: Some(ParamValue::Scalar(3.0)),
                    export_limit: Some(ParamValue::Scalar(3.0)),
                },
            )
            .unwrap(),
        )
        .unwrap();

    let objective = network.optimize().unwrap();

    let import = values(&network, "grid:connection", "power_source_target");
    let export = values(&network, "grid:connection", "power_target_source");
    for t in 0..3 {
        assert!(import[t] / 3.0 + export[t] / 3.0 <= 1.0 + 1e-6);
    }
    assert_close(objective, -9.0);
}

#[test]
fn test_connection_reports_limits_and_prices() {
    let periods = Periods::uniform(2, 1.0).unwrap();
    let mut network = grid_and_load(periods, &grid(0.30, 0.05), vec![1.0, 1.5]);
    network.optimize().unwrap();

    let outputs = network.outputs().unwrap();
    let load = &outputs["load:connection"];
    let grid = &outputs["grid:connection"];

    assert_eq!(load["max_power_source_target"].kind, OutputType::PowerLimit);
    assert_eq!(load["max_power_source_target"].values, vec![1.0, 1.5]);
    assert_eq!(grid["price_source_target"].kind, OutputType::Price);
    assert_eq!(grid["price_target_source"].values, vec![-0.05, -0.05]);
}
