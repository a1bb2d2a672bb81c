use open_energy_optimizer::presets::{self, BatteryPreset, GridPreset};
use open_energy_optimizer::{ElementKind, Network, ParamValue, Params, Periods};

use super::{assert_close, assert_series_close, grid_and_load, values, TOLERANCE};

/// Battery behind `home` charging from a grid that pays for every imported kWh
fn rewarded_charging() -> Network {
    let periods = Periods::uniform(6, 1.0).unwrap();
    let mut network = Network::new(periods.clone());
    network.add(ElementKind::Node, "home", Params::new()).unwrap();
    network
        .extend(
            presets::grid(
                "grid",
                &GridPreset {
                    connection: "home".to_string(),
                    import_price: Some(ParamValue::Scalar(-0.1)),
                    export_price: None,
                    import_limit: Some(ParamValue::Scalar(2.0)),
                    export_limit: Some(ParamValue::Scalar(0.0)),
                },
            )
            .unwrap(),
        )
        .unwrap();

    let mut battery = BatteryPreset::new("home", 10.0, 0.0);
    battery.max_charge_percentage = 80.0;
    battery.overcharge_percentage = Some(85.0);
    battery.overcharge_cost = Some(ParamValue::Scalar(0.05));
    battery.max_charge_power = Some(ParamValue::Scalar(5.0));
    battery.max_discharge_power = Some(ParamValue::Scalar(5.0));
    network
        .extend(presets::battery("battery", &battery, &periods).unwrap())
        .unwrap();
    network
}

#[test]
fn test_overcharge_waits_for_full_normal_partition() {
    let mut network = rewarded_charging();
    network.optimize().unwrap();

    let normal = values(&network, "battery:normal", "energy_stored");
    let overcharge_charge = values(&network, "battery:overcharge", "power_charge");
    let overcharge = values(&network, "battery:overcharge", "energy_stored");

    for t in 0..6 {
        if overcharge_charge[t] > TOLERANCE {
            assert!(
                normal[t + 1] >= 8.0 - TOLERANCE,
                "overcharge charged {} kW in interval {t} with normal at {}",
                overcharge_charge[t],
                normal[t + 1]
            );
        }
    }
    assert_close(normal[6], 8.0);
    assert_close(overcharge[6], 0.5);
    let misplaced = values(&network, "battery:overcharge:balance", "misplaced_energy");
    assert_series_close(&misplaced, &[0.0; 6]);
}

/// Partitioned battery behind `home` next to a fixed load, with export disabled
fn battery_and_load(periods: &Periods, initial_charge_percentage: f64, load: f64) -> Network {
    let grid_preset = GridPreset {
        connection: "home".to_string(),
        import_price: Some(ParamValue::Scalar(0.30)),
        export_price: None,
        import_limit: None,
        export_limit: Some(ParamValue::Scalar(0.0)),
    };
    let mut network = grid_and_load(periods.clone(), &grid_preset, vec![load; periods.len()]);
    let mut battery = BatteryPreset::new("home", 10.0, initial_charge_percentage);
    battery.max_charge_percentage = 80.0;
    battery.overcharge_percentage = Some(85.0);
    network
        .extend(presets::battery("battery", &battery, periods).unwrap())
        .unwrap();
    network
}

#[test]
fn test_partitioned_battery_serves_load_before_grid() {
    let periods = Periods::uniform(4, 1.0).unwrap();
    let mut network = battery_and_load(&periods, 80.0, 1.0);

    let objective = network.optimize().unwrap();

    assert_close(objective, 0.0);
    assert_series_close(
        &values(&network, "grid:connection", "power_source_target"),
        &[0.0; 4],
    );
    assert_series_close(
        &values(&network, "battery:normal", "energy_stored"),
        &[8.0, 7.0, 6.0, 5.0, 4.0],
    );
    assert_series_close(
        &values(&network, "battery:overcharge", "energy_stored"),
        &[0.0; 5],
    );
}

#[test]
fn test_empty_battery_stays_idle() {
    let periods = Periods::uniform(3, 1.0).unwrap();
    let mut network = battery_and_load(&periods, 0.0, 0.0);

    let objective = network.optimize().unwrap();

    assert_close(objective, 0.0);
    assert_series_close(
        &values(&network, "grid:connection", "power_source_target"),
        &[0.0; 3],
    );
    for partition in ["battery:normal", "battery:overcharge"] {
        assert_series_close(&values(&network, partition, "energy_stored"), &[0.0; 4]);
    }
}

#[test]
fn test_partitions_stay_within_capacity() {
    let mut network = rewarded_charging();
    network.optimize().unwrap();

    for (partition, capacity) in [("battery:normal", 8.0), ("battery:overcharge", 0.5)] {
        let stored = values(&network, partition, "energy_stored");
        for energy in &stored {
            assert!(*energy >= -TOLERANCE && *energy <= capacity + TOLERANCE);
        }
        let charge = values(&network, partition, "power_charge");
        let discharge = values(&network, partition, "power_discharge");
        assert!(charge.iter().chain(&discharge).all(|p| *p >= -TOLERANCE));
    }
}

/// Two partitions joined by a balance connection, no external network
fn partitions(lower_capacity: Vec<f64>, lower_initial: f64, upper_initial: f64) -> Network {
    let mut network = Network::new(Periods::uniform(3, 1.0).unwrap());
    network
        .add(
            ElementKind::EnergyStorage,
            "lower",
            Params::new()
                .with("capacity", lower_capacity.clone())
                .with("initial_charge", lower_initial),
        )
        .unwrap();
    network
        .add(
            ElementKind::EnergyStorage,
            "upper",
            Params::new()
                .with("capacity", 10.0)
                .with("initial_charge", upper_initial),
        )
        .unwrap();
    network
        .add(
            ElementKind::EnergyBalanceConnection,
            "balance",
            Params::new()
                .with("upper", "upper")
                .with("lower", "lower")
                .with("capacity_lower", lower_capacity),
        )
        .unwrap();
    network
}

#[test]
fn test_shrinking_lower_capacity_pushes_energy_up() {
    let mut network = partitions(vec![4.0, 4.0, 2.0, 2.0], 4.0, 0.0);
    network.optimize().unwrap();

    let up = values(&network, "balance", "power_up");
    let lower = values(&network, "lower", "energy_stored");
    let upper = values(&network, "upper", "energy_stored");

    // capacity drops by 2 kWh at boundary 2
    assert!(up[1] >= 2.0 - TOLERANCE);
    assert_close(up[1], 2.0);
    assert_close(lower[2], 2.0);
    assert_close(upper[3], 2.0);
    assert_close(up[0], 0.0);
    assert_close(up[2], 0.0);
}

#[test]
fn test_free_capacity_is_filled_from_above() {
    let mut network = partitions(vec![5.0, 5.0, 5.0, 5.0], 2.0, 6.0);
    network.optimize().unwrap();

    let down = values(&network, "balance", "power_down");
    let lower = values(&network, "lower", "energy_stored");
    let upper = values(&network, "upper", "energy_stored");

    // demand 3 kWh, available 6 kWh: min(demand, available) moves down at once
    assert!(down[0] >= 3.0 - TOLERANCE);
    assert_series_close(&lower[1..], &[5.0, 5.0, 5.0]);
    assert_series_close(&upper[1..], &[3.0, 3.0, 3.0]);
    let unmet = values(&network, "balance", "unmet_demand_energy");
    assert_series_close(&unmet, &[0.0, 0.0, 0.0]);
    let misplaced = values(&network, "balance", "misplaced_energy");
    assert_series_close(&misplaced, &[0.0, 0.0, 0.0]);
}

#[test]
fn test_unmet_demand_is_minimal_when_upper_runs_short() {
    let mut network = partitions(vec![5.0, 5.0, 5.0, 5.0], 1.0, 2.0);
    network.optimize().unwrap();

    let lower = values(&network, "lower", "energy_stored");
    let upper = values(&network, "upper", "energy_stored");
    let unmet = values(&network, "balance", "unmet_demand_energy");

    // only 2 kWh are available for a 4 kWh demand
    assert_series_close(&lower[1..], &[3.0, 3.0, 3.0]);
    assert_series_close(&upper[1..], &[0.0, 0.0, 0.0]);
    assert_series_close(&unmet, &[2.0, 2.0, 2.0]);
}

#[test]
fn test_reapplying_preset_updates_partitions() {
    let periods = Periods::uniform(6, 1.0).unwrap();
    let mut network = rewarded_charging();
    network.optimize().unwrap();

    let mut battery = BatteryPreset::new("home", 10.0, 40.0);
    battery.max_charge_percentage = 80.0;
    battery.overcharge_percentage = Some(85.0);
    battery.overcharge_cost = Some(ParamValue::Scalar(0.05));
    battery.max_charge_power = Some(ParamValue::Scalar(5.0));
    battery.max_discharge_power = Some(ParamValue::Scalar(5.0));
    network
        .extend(presets::battery("battery", &battery, &periods).unwrap())
        .unwrap();
    network.optimize().unwrap();

    let normal = values(&network, "battery:normal", "energy_stored");
    let overcharge = values(&network, "battery:overcharge", "energy_stored");
    assert_close(normal[0], 4.0);
    assert_close(normal[6], 8.0);
    assert_close(overcharge[6], 0.5);
}
