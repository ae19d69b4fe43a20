// Population layers and city-hall matching driven from files on disk.

use std::path::Path;

use geoprep::{
    CityHallConfig, PlaceKind, PopulationTable, fix_city_coordinates, read_feature_collection,
    write_population_layers,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn bundled(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

#[test]
fn bundled_tables_write_four_layers() {
    let dir = tempfile::tempdir().unwrap();
    for (table, count) in [("population-prefectures.json", 47), ("population-cities.json", 284)] {
        let table = PopulationTable::from_path(&bundled(table)).unwrap();
        let report = write_population_layers(&table, dir.path()).unwrap();
        assert_eq!(report.features, count);
    }

    let circles = read_feature_collection(&dir.path().join("population-prefecture-circle.json")).unwrap();
    assert_eq!(circles[12]["properties"], json!({
        "name": "東京都", "population": 14047000, "type": "prefecture", "prefecture": "東京都",
    }));
    assert_eq!(circles[12]["geometry"], json!({"type": "Point", "coordinates": [139.69167, 35.68944]}));

    let domes = read_feature_collection(&dir.path().join("population-city-3d.json")).unwrap();
    assert_eq!(domes.len(), 284);
    for dome in &domes {
        let ring = dome["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 33);
        assert_eq!(ring.first(), ring.last());
        assert!(dome["properties"]["height"].as_f64().unwrap() <= 150_000.0);
    }
}

#[test]
fn city_hall_csv_rewrites_centers() {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("cities.json");
    std::fs::write(&table, r#"{"version": 1, "kind": "city", "entries": [
        {"name": "府中市", "population": 260000, "center": [139.48, 35.67], "prefecture": "東京都"},
        {"name": "府中市", "population": 37000, "center": [133.0, 34.0], "prefecture": "広島県"},
        {"name": "幻市", "population": 50000, "center": [139.0, 35.0], "prefecture": "東京都"}
    ]}"#).unwrap();
    let halls = dir.path().join("all_city_halls.csv");
    std::fs::write(&halls, "prefecture_code,city_name,address,longitude,latitude\n\
        13,府中市,東京都府中市宮西町2-24,139.4777,35.6689\n\
        34,府中市,広島県府中市府川町315,133.2364,34.5682\n").unwrap();
    let output = dir.path().join("out/cities.json");

    let report = fix_city_coordinates(&CityHallConfig::new(&table, &halls, &output)).unwrap();
    assert_eq!((report.exact, report.by_name), (2, 0));
    assert_eq!(report.unmatched, vec!["幻市（東京都）".to_string()]);
    assert_eq!(report.moved.len(), 1);
    assert_eq!(report.moved[0].prefecture, "広島県");

    let updated = PopulationTable::from_path(&output).unwrap();
    assert_eq!(updated.kind(), PlaceKind::City);
    let centers: Vec<_> = updated.places().iter().map(|p| p.center).collect();
    assert_eq!(centers, vec![[139.4777, 35.6689], [133.2364, 34.5682], [139.0, 35.0]]);
}

#[test]
fn missing_city_hall_csv_fails_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("cities.json");
    let config = CityHallConfig::new(bundled("population-cities.json"), dir.path().join("nope.csv"), &output);
    assert!(fix_city_coordinates(&config).is_err());
    assert!(!output.exists());
}
