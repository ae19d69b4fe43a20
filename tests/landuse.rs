// Shapefile to landcover conversion on a small generated shapefile.

use std::path::Path;

use geoprep::{LanduseConfig, convert_landuse, read_feature_collection};
use pretty_assertions::assert_eq;
use serde_json::json;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Polygon, PolygonRing};

fn square(x0: f64, y0: f64, size: f64) -> Polygon {
    Polygon::new(PolygonRing::Outer(vec![
        Point::new(x0, y0),
        Point::new(x0, y0 + size),
        Point::new(x0 + size, y0 + size),
        Point::new(x0 + size, y0),
        Point::new(x0, y0),
    ]))
}

fn write_shapefile(path: &Path, column: &str, rows: &[(&str, Polygon)]) {
    let table = TableWriterBuilder::new()
        .add_character_field(FieldName::try_from(column).unwrap(), 2);
    let mut writer = shapefile::Writer::from_path(path, table).unwrap();
    for (code, shape) in rows {
        let mut record = Record::default();
        record.insert(column.to_string(), FieldValue::Character(Some(code.to_string())));
        writer.write_shape_and_record(shape, &record).unwrap();
    }
}

#[test]
fn converts_and_dissolves_by_category() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("landuse.shp");
    let output = dir.path().join("geojson/landcover.json");
    write_shapefile(&input, "L03_006", &[
        ("14", square(136.0, 35.0, 0.2)),
        ("05", square(135.0, 34.0, 0.5)),
        ("05", square(135.25, 34.0, 0.5)),
        ("07", square(139.0, 35.0, 0.1)),
    ]);

    let report = convert_landuse(&LanduseConfig::new(&input, &output)).unwrap();
    assert_eq!((report.records_read, report.records_kept, report.features_written), (4, 3, 2));

    let features = read_feature_collection(&output).unwrap();
    let properties: Vec<_> = features.iter().map(|f| f["properties"].clone()).collect();
    assert_eq!(properties, vec![json!({"type": "forest"}), json!({"type": "water"})]);
    assert_eq!(features[0]["geometry"]["type"], "Polygon");
}

#[test]
fn unknown_code_column_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("landuse.shp");
    write_shapefile(&input, "KIND", &[("05", square(135.0, 34.0, 0.5))]);

    let config = LanduseConfig::new(&input, dir.path().join("out.json"));
    let err = format!("{:#}", convert_landuse(&config).unwrap_err());
    assert!(err.contains("KIND"), "{err}");
}
