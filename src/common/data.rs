use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::{frame::DataFrame, io::SerReader, prelude::CsvReader};
use shapefile::dbase::{FieldValue, Record};
use shapefile::{Reader, Shape};

/// Reads a CSV file with a header row from `path` into a Polars DataFrame.
pub(crate) fn read_from_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let df = CsvReader::new(file)
        .finish()
        .with_context(|| format!("Failed to parse CSV file: {}", path.display()))?;
    Ok(df)
}

/// Reads all shapes + attribute records from a given `.shp` file path.
pub(crate) fn read_shapefile(path: &Path) -> Result<Vec<(Shape, Record)>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open shapefile: {}", path.display()))?;

    let mut items = Vec::with_capacity(reader.shape_count()?);
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result.context("Error reading shape+record")?;
        items.push((shape, record));
    }
    Ok(items)
}

/// Get a field as text, accepting character and numeric columns.
/// Whole numbers are rendered without a fractional part.
pub(crate) fn field_as_text(record: &Record, field: &str) -> Option<String> {
    fn number(n: f64) -> String {
        if n.fract() == 0.0 { format!("{}", n as i64) } else { n.to_string() }
    }

    match record.get(field)? {
        FieldValue::Character(Some(s)) => Some(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => Some(number(*n)),
        FieldValue::Integer(i) => Some(i.to_string()),
        FieldValue::Float(Some(f)) => Some(number(f64::from(*f))),
        FieldValue::Double(d) => Some(number(*d)),
        _ => None,
    }
}

/// Names of the attribute columns of a record, sorted.
pub(crate) fn field_names(record: &Record) -> Vec<String> {
    let mut names: Vec<String> = record.clone().into_iter().map(|(name, _)| name).collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: Vec<(&str, FieldValue)>) -> Record {
        let mut record = Record::default();
        for (name, value) in pairs {
            record.insert(name.to_string(), value);
        }
        record
    }

    #[test]
    fn character_and_numeric_codes() {
        let r = record(vec![
            ("L03_006", FieldValue::Character(Some(" 05 ".into()))),
            ("code", FieldValue::Numeric(Some(14.0))),
            ("empty", FieldValue::Character(None)),
        ]);
        assert_eq!(field_as_text(&r, "L03_006").as_deref(), Some("05"));
        assert_eq!(field_as_text(&r, "code").as_deref(), Some("14"));
        assert_eq!(field_as_text(&r, "empty"), None);
        assert_eq!(field_as_text(&r, "missing"), None);
    }

    #[test]
    fn csv_header_names_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("halls.csv");
        std::fs::write(&path, "prefecture_code,city_name,longitude\n13,府中市,139.4777\n34,府中市,133.2364\n").unwrap();
        let df = read_from_csv(&path).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.get_column_names_str(), ["prefecture_code", "city_name", "longitude"]);
    }
}
