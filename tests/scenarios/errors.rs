use open_energy_optimizer::connections::{SegmentKind, SegmentSpec};
use open_energy_optimizer::presets::{self, GridPreset};
use open_energy_optimizer::{ElementKind, ElementSpec, Network, NetworkError, ParamValue, Params, Periods};

use super::{assert_series_close, grid, grid_and_load, values};

fn periods() -> Periods {
    Periods::uniform(3, 1.0).unwrap()
}

#[test]
fn test_length_mismatch_names_element() {
    let mut network = Network::new(periods());

    let err = network
        .add(
            ElementKind::EnergyStorage,
            "battery",
            Params::new()
                .with("capacity", vec![5.0, 5.0, 5.0])
                .with("initial_charge", 1.0),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        NetworkError::LengthMismatch { ref element, expected: 4, actual: 3, .. } if element == "battery"
    ));
    assert!(err.to_string().contains("battery"));
}

#[test]
fn test_missing_parameter() {
    let mut network = Network::new(periods());

    let err = network
        .add(ElementKind::SchedulableLoad, "dryer", Params::new().with("power", 1.0))
        .unwrap_err();

    assert!(matches!(
        err,
        NetworkError::MissingParameter { ref parameter, .. } if parameter == "duration"
    ));
}

#[test]
fn test_unknown_update_parameter() {
    let mut network = grid_and_load(periods(), &grid(0.3, 0.05), vec![1.0; 3]);
    network.optimize().unwrap();

    let err = network
        .add(
            ElementKind::Connection,
            "grid:connection",
            Params::new().with("voltage", 230.0),
        )
        .unwrap_err();

    assert!(matches!(err, NetworkError::UnsupportedParameter { .. }));
}

#[test]
fn test_update_cannot_add_a_limit() {
    let mut network = grid_and_load(periods(), &grid(0.3, 0.05), vec![1.0; 3]);
    network.optimize().unwrap();
    let mut limited = grid(0.3, 0.05);
    limited.import_limit = Some(ParamValue::Scalar(5.0));

    let err = network
        .extend(presets::grid("grid", &limited).unwrap())
        .unwrap_err();

    assert!(matches!(err, NetworkError::UnsupportedParameter { .. }));
}

#[test]
fn test_rejected_update_leaves_network_solvable() {
    let import_only = GridPreset {
        import_limit: Some(ParamValue::Scalar(5.0)),
        ..grid(0.3, 0.05)
    };
    let mut network = grid_and_load(periods(), &import_only, vec![1.0; 3]);
    network.optimize().unwrap();

    let tightened = GridPreset {
        import_limit: Some(ParamValue::Scalar(0.5)),
        export_limit: Some(ParamValue::Scalar(1.0)),
        ..import_only.clone()
    };
    let err = network
        .extend(presets::grid("grid", &tightened).unwrap())
        .unwrap_err();
    assert!(matches!(err, NetworkError::UnsupportedParameter { .. }));

    let objective = network.optimize().unwrap();
    assert!((objective - 0.9).abs() < 1e-3);
    assert_series_close(
        &values(&network, "grid:connection", "max_power_source_target"),
        &[5.0; 3],
    );
}

#[test]
fn test_update_cannot_price_a_free_direction() {
    let import_priced = GridPreset {
        export_price: None,
        ..grid(0.3, 0.05)
    };
    let mut network = grid_and_load(periods(), &import_priced, vec![1.0; 3]);
    network.optimize().unwrap();

    let err = network
        .extend(presets::grid("grid", &grid(0.4, 0.05)).unwrap())
        .unwrap_err();

    assert!(matches!(
        err,
        NetworkError::UnsupportedParameter { ref parameter, .. } if parameter == "price_target_source"
    ));
    let objective = network.optimize().unwrap();
    assert!((objective - 0.9).abs() < 1e-3);
}

#[test]
fn test_infeasible_network_reports_solver_status() {
    let limited = GridPreset {
        import_limit: Some(ParamValue::Scalar(0.5)),
        ..grid(0.3, 0.05)
    };
    let mut network = grid_and_load(periods(), &limited, vec![1.0; 3]);

    let err = network.optimize().unwrap_err();

    assert!(matches!(err, NetworkError::Solve { .. }));
    assert!(network.objective().is_none());
    assert!(matches!(network.outputs(), Err(NetworkError::NotSolved)));
}

#[test]
fn test_explicit_segment_chain() {
    let mut network = Network::new(periods());
    network.add(ElementKind::Node, "home", Params::new()).unwrap();
    network
        .add(ElementKind::SourceSink, "grid", Params::new().with("is_sink", false))
        .unwrap();
    network
        .add(ElementKind::SourceSink, "load", Params::new().with("is_source", false))
        .unwrap();
    network
        .add_spec(
            ElementSpec::new(
                ElementKind::Connection,
                "grid:connection",
                Params::new().with("source", "grid").with("target", "home"),
            )
            .with_segments(vec![
                SegmentSpec::new(
                    "tariff",
                    SegmentKind::Pricing,
                    Params::new().with("price_source_target", 0.2),
                ),
                SegmentSpec::new(
                    "meter",
                    SegmentKind::PowerLimit,
                    Params::new().with("max_power_source_target", 3.0),
                ),
            ]),
        )
        .unwrap();
    network
        .add_spec(
            ElementSpec::new(
                ElementKind::Connection,
                "load:connection",
                Params::new().with("source", "home").with("target", "load"),
            )
            .with_segments(vec![SegmentSpec::new(
                "demand",
                SegmentKind::PowerLimit,
                Params::new()
                    .with("max_power_source_target", vec![1.0, 2.0, 3.0])
                    .with("max_power_target_source", 0.0)
                    .with("fixed", true),
            )]),
        )
        .unwrap();

    let objective = network.optimize().unwrap();
    assert!((objective - 0.2 * 6.0).abs() < 1e-3);

    // segments are addressed by name after build
    network
        .add(
            ElementKind::Connection,
            "load:connection",
            Params::new().with("demand.max_power_source_target", vec![1.0, 1.0, 1.0]),
        )
        .unwrap();
    let objective = network.optimize().unwrap();
    assert!((objective - 0.2 * 3.0).abs() < 1e-3);

    let err = network
        .add(
            ElementKind::Connection,
            "load:connection",
            Params::new().with("missing.max_power_source_target", 1.0),
        )
        .unwrap_err();
    assert!(matches!(err, NetworkError::UnsupportedParameter { .. }));
}
