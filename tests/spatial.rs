mod common;

use common::{table, text_column};
use serde_json::json;
use tabular_insights::{
    frame::Column,
    spatial::{self, MAX_POINTS, MISSING_LABEL, TransverseMercator},
};

#[test]
fn geographic_coordinates_pass_through() {
    let table = table(vec![
        Column::numeric("lat", vec![Some(41.38), Some(40.41), None]),
        text_column("lon", &[Some("2.17"), Some("-3.70"), Some("1.0")]),
        text_column("name", &[Some("Barcelona"), None, Some("Nowhere")]),
    ]);
    let payload = spatial::resolve(&table, "lat", "lon", Some("name"));
    assert_eq!(payload.len(), 2);
    assert_eq!(payload.points[0].lat, 41.38);
    assert_eq!(payload.points[0].lon, 2.17);
    assert_eq!(payload.points[1].label.as_deref(), Some(MISSING_LABEL));
    assert_eq!(
        serde_json::to_value(&payload).unwrap(),
        json!([
            { "lat": 41.38, "lon": 2.17, "name": "Barcelona" },
            { "lat": 40.41, "lon": -3.7, "name": MISSING_LABEL }
        ])
    );
}

#[test]
fn projected_coordinates_are_reprojected_from_utm_31n() {
    let table = table(vec![
        Column::numeric("y", vec![Some(4_582_000.0)]),
        Column::numeric("x", vec![Some(432_000.0)]),
    ]);
    let payload = spatial::resolve(&table, "y", "x", None);
    assert_eq!(payload.len(), 1);
    let point = &payload.points[0];
    assert!((point.lon - 2.1867).abs() < 0.01, "lon {}", point.lon);
    assert!((point.lat - 41.3867).abs() < 0.01, "lat {}", point.lat);
    assert_eq!(point.label, None);
}

#[test]
fn one_bad_projected_point_empties_the_map() {
    let table = table(vec![
        Column::numeric("y", vec![Some(4_582_000.0), Some(4_582_000.0)]),
        Column::numeric("x", vec![Some(432_000.0), Some(9.0e12)]),
    ]);
    let payload = spatial::resolve(&table, "y", "x", None);
    assert!(payload.is_empty());
    assert_eq!(serde_json::to_value(&payload).unwrap(), json!([]));
}

#[test]
fn missing_coordinate_columns_give_an_empty_map() {
    let table = table(vec![Column::numeric("lat", vec![Some(1.0)])]);
    assert!(spatial::resolve(&table, "lat", "lon", None).is_empty());
}

#[test]
fn unknown_label_column_omits_labels() {
    let table = table(vec![
        Column::numeric("lat", vec![Some(1.0)]),
        Column::numeric("lon", vec![Some(2.0)]),
    ]);
    let payload = spatial::resolve(&table, "lat", "lon", Some("store"));
    assert_eq!(payload.label_field, None);
    assert_eq!(
        serde_json::to_value(&payload).unwrap(),
        json!([{ "lat": 1.0, "lon": 2.0 }])
    );
}

#[test]
fn maps_are_capped() {
    let rows = MAX_POINTS + 250;
    let table = table(vec![
        Column::numeric("lat", vec![Some(40.0); rows]),
        Column::numeric("lon", vec![Some(-3.0); rows]),
    ]);
    assert_eq!(spatial::resolve(&table, "lat", "lon", None).len(), MAX_POINTS);
}

#[test]
fn southern_zones_use_the_false_northing() {
    let (lon, lat) = TransverseMercator::utm(31, false)
        .to_geographic(500_000.0, 10_000_000.0)
        .unwrap();
    assert!((lon - 3.0).abs() < 1e-9);
    assert!(lat.abs() < 1e-9);
}
