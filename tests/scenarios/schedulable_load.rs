use open_energy_optimizer::presets::{self, GridPreset};
use open_energy_optimizer::{ElementKind, Network, ParamValue, Params, Periods};

use super::{assert_close, assert_series_close, values, TOLERANCE};

fn dishwasher_network(prices: Vec<f64>, earliest: f64, latest: f64) -> Network {
    let periods = Periods::uniform(prices.len(), 1.0).unwrap();
    let mut network = Network::new(periods);
    network.add(ElementKind::Node, "home", Params::new()).unwrap();
    network
        .extend(
            presets::grid(
                "grid",
                &GridPreset {
                    connection: "home".to_string(),
                    import_price: Some(ParamValue::Series(prices)),
                    export_price: None,
                    import_limit: None,
                    export_limit: None,
                },
            )
            .unwrap(),
        )
        .unwrap();
    network
        .add(
            ElementKind::SchedulableLoad,
            "dishwasher",
            Params::new()
                .with("power", 2.0)
                .with("duration", 2.0)
                .with("earliest_start", earliest)
                .with("latest_start", latest),
        )
        .unwrap();
    network
        .add(
            ElementKind::Connection,
            "dishwasher:connection",
            Params::new().with("source", "home").with("target", "dishwasher"),
        )
        .unwrap();
    network
}

/// The 2 h run covers exactly `[start_time, start_time + 2]`
fn assert_single_run(network: &Network) {
    let start = values(network, "dishwasher", "start_time")[0];
    let overlap = values(network, "dishwasher", "overlap");
    for (t, covered) in overlap.iter().enumerate() {
        let t = t as f64;
        let expected = ((t + 1.0).min(start + 2.0) - t.max(start)).max(0.0);
        assert!(
            (covered - expected).abs() < TOLERANCE,
            "interval {t}: ran {covered} h, a run from {start} h covers {expected} h"
        );
    }
}

#[test]
fn test_runs_in_cheapest_window() {
    let mut network = dishwasher_network(vec![0.5, 0.5, 0.1, 0.1, 0.5, 0.5], 0.0, 4.0);

    let objective = network.optimize().unwrap();

    let overlap = values(&network, "dishwasher", "overlap");
    assert_close(overlap.iter().sum(), 2.0);
    assert_series_close(&overlap, &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    assert_series_close(
        &values(&network, "dishwasher", "power"),
        &[0.0, 0.0, 2.0, 2.0, 0.0, 0.0],
    );
    assert_close(values(&network, "dishwasher", "start_time")[0], 2.0);
    assert_single_run(&network);
    assert_close(objective, 0.4);
}

#[test]
fn test_cheap_hours_apart_do_not_split_the_run() {
    // hours 0 and 2 are cheapest but a run cannot skip hour 1
    let mut network = dishwasher_network(vec![0.1, 0.5, 0.2, 0.6, 0.6, 0.6], 0.0, 2.0);

    let objective = network.optimize().unwrap();

    assert_close(values(&network, "dishwasher", "start_time")[0], 0.0);
    assert_series_close(
        &values(&network, "dishwasher", "power"),
        &[2.0, 2.0, 0.0, 0.0, 0.0, 0.0],
    );
    assert_single_run(&network);
    assert_close(objective, 1.2);
}

#[test]
fn test_equal_cost_starts_still_give_one_run() {
    // every start in [0, 2] costs 1.2, splitting into hours 0 and 2 would cost 0.4
    let mut network = dishwasher_network(vec![0.1, 0.5, 0.1, 0.5, 0.5, 0.5], 0.0, 2.0);

    let objective = network.optimize().unwrap();

    assert_single_run(&network);
    assert_close(objective, 1.2);
}

#[test]
fn test_never_runs_outside_window() {
    // cheapest hours are before the window opens
    let mut network = dishwasher_network(vec![0.1, 0.1, 0.5, 0.4, 0.3, 0.6], 2.0, 3.0);
    network.optimize().unwrap();

    let overlap = values(&network, "dishwasher", "overlap");
    let power = values(&network, "dishwasher", "power");

    assert_close(overlap.iter().sum(), 2.0);
    for t in [0, 1, 5] {
        assert!(power[t].abs() < TOLERANCE, "ran {} kW in interval {t}", power[t]);
    }
    assert_close(values(&network, "dishwasher", "start_time")[0], 3.0);
    assert_single_run(&network);
}

#[test]
fn test_load_is_supplied_through_node() {
    let mut network = dishwasher_network(vec![0.3, 0.2, 0.1, 0.4], 0.0, 2.0);
    network.optimize().unwrap();

    let supplied = network.connection_power("dishwasher").unwrap();
    let power = values(&network, "dishwasher", "power");

    assert_series_close(&supplied, &power);
    assert_series_close(&network.connection_power("home").unwrap(), &[0.0; 4]);
}

#[test]
fn test_update_moves_window() {
    let mut network = dishwasher_network(vec![0.5, 0.5, 0.1, 0.1, 0.5, 0.5], 0.0, 4.0);
    network.optimize().unwrap();

    network
        .add(
            ElementKind::SchedulableLoad,
            "dishwasher",
            Params::new().with("earliest_start", 4.0).with("latest_start", 4.0),
        )
        .unwrap();
    let objective = network.optimize().unwrap();

    assert_series_close(
        &values(&network, "dishwasher", "overlap"),
        &[0.0, 0.0, 0.0, 0.0, 1.0, 1.0],
    );
    assert_close(values(&network, "dishwasher", "start_time")[0], 4.0);
    assert_close(objective, 2.0);
}
