use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, ensure};
use polars::prelude::{DataFrame, DataType};
use tracing::{debug, info, warn};

use crate::common::{prepare_output_path, read_from_csv};
use crate::population::{Place, PlaceKind, PopulationTable};

/// JIS X 0401 prefecture codes, in code order.
pub const PREFECTURE_CODES: [(&str, &str); 47] = [
    ("北海道", "01"), ("青森県", "02"), ("岩手県", "03"), ("宮城県", "04"), ("秋田県", "05"),
    ("山形県", "06"), ("福島県", "07"), ("茨城県", "08"), ("栃木県", "09"), ("群馬県", "10"),
    ("埼玉県", "11"), ("千葉県", "12"), ("東京都", "13"), ("神奈川県", "14"), ("新潟県", "15"),
    ("富山県", "16"), ("石川県", "17"), ("福井県", "18"), ("山梨県", "19"), ("長野県", "20"),
    ("岐阜県", "21"), ("静岡県", "22"), ("愛知県", "23"), ("三重県", "24"), ("滋賀県", "25"),
    ("京都府", "26"), ("大阪府", "27"), ("兵庫県", "28"), ("奈良県", "29"), ("和歌山県", "30"),
    ("鳥取県", "31"), ("島根県", "32"), ("岡山県", "33"), ("広島県", "34"), ("山口県", "35"),
    ("徳島県", "36"), ("香川県", "37"), ("愛媛県", "38"), ("高知県", "39"), ("福岡県", "40"),
    ("佐賀県", "41"), ("長崎県", "42"), ("熊本県", "43"), ("大分県", "44"), ("宮崎県", "45"),
    ("鹿児島県", "46"), ("沖縄県", "47"),
];

/// Kilometres per degree in the flat distance estimate.
const KM_PER_DEGREE: f64 = 111.0;

/// Two-digit code of a prefecture name.
pub fn prefecture_code(name: &str) -> Option<&'static str> {
    PREFECTURE_CODES.iter().find(|(n, _)| *n == name).map(|(_, code)| *code)
}

/// Flat-earth distance estimate between two `[lon, lat]` positions, in kilometres.
#[inline]
pub fn approx_distance_km(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]) * KM_PER_DEGREE).hypot((a[1] - b[1]) * KM_PER_DEGREE)
}

/// One municipal office from the national city-hall dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct CityHall {
    /// Zero-padded two-digit prefecture code.
    pub prefecture_code: String,
    pub city_name: String,
    pub address: Option<String>,
    pub center: [f64; 2],
}

/// City halls keyed by prefecture code and city name.
#[derive(Debug, Clone, Default)]
pub struct CityHallIndex {
    halls: Vec<CityHall>,
    by_key: HashMap<(String, String), usize>,
    by_name: HashMap<String, Vec<usize>>,
}

impl CityHallIndex {
    /// Index rows in order. The first row wins when a prefecture lists a city twice.
    pub fn new(halls: Vec<CityHall>) -> Self {
        let mut by_key = HashMap::new();
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, hall) in halls.iter().enumerate() {
            by_key.entry((hall.prefecture_code.clone(), hall.city_name.clone())).or_insert(i);
            by_name.entry(hall.city_name.clone()).or_default().push(i);
        }
        Self { halls, by_key, by_name }
    }

    /// Read a CSV with `prefecture_code`, `city_name`, `longitude` and `latitude`
    /// columns, plus an optional `address`.
    pub fn from_csv(path: &Path) -> Result<Self> {
        let df = read_from_csv(path)?;
        let halls = halls_from_frame(&df)
            .with_context(|| format!("Invalid city-hall table: {}", path.display()))?;
        info!("[cityhall] loaded {} city halls from {}", halls.len(), path.display());
        Ok(Self::new(halls))
    }

    #[inline] pub fn len(&self) -> usize { self.halls.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.halls.is_empty() }

    /// Resolve a city to an office: the `(code, name)` key first, then a name
    /// held by exactly one office. A name shared by several offices, none of
    /// them in `code`, stays unmatched.
    pub fn lookup(&self, code: Option<&str>, city: &str) -> Lookup<'_> {
        if let Some(code) = code {
            if let Some(&i) = self.by_key.get(&(code.to_string(), city.to_string())) {
                return Lookup::Exact(&self.halls[i]);
            }
        }
        match self.by_name.get(city).map(Vec::as_slice) {
            Some([only]) => Lookup::ByName(&self.halls[*only]),
            Some(candidates) => Lookup::Ambiguous(candidates.len()),
            None => Lookup::Unmatched,
        }
    }
}

/// How a city found its office.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Exact(&'a CityHall),
    ByName(&'a CityHall),
    /// This many offices share the name, none in the city's prefecture.
    Ambiguous(usize),
    Unmatched,
}

impl<'a> Lookup<'a> {
    pub fn hall(&self) -> Option<&'a CityHall> {
        match self {
            Lookup::Exact(hall) | Lookup::ByName(hall) => Some(hall),
            Lookup::Ambiguous(_) | Lookup::Unmatched => None,
        }
    }
}

fn halls_from_frame(df: &DataFrame) -> Result<Vec<CityHall>> {
    let column = |name: &str, dtype: &DataType| {
        df.column(name)
            .map_err(|_| anyhow!("missing column {name}; available columns: {}", df.get_column_names_str().join(", ")))?
            .cast(dtype)
            .with_context(|| format!("column {name} is not {dtype}"))
    };
    let codes = column("prefecture_code", &DataType::String)?;
    let names = column("city_name", &DataType::String)?;
    let lons = column("longitude", &DataType::Float64)?;
    let lats = column("latitude", &DataType::Float64)?;
    let addresses = df.column("address").ok().map(|c| c.cast(&DataType::String)).transpose()?;

    let (codes, names, lons, lats) = (codes.str()?, names.str()?, lons.f64()?, lats.f64()?);
    let addresses = addresses.as_ref().map(|c| c.str()).transpose()?;

    let mut halls = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let row = i + 1;
        let code = codes.get(i).ok_or_else(|| anyhow!("row {row}: missing prefecture_code"))?;
        let city = names.get(i).ok_or_else(|| anyhow!("row {row}: missing city_name"))?;
        let (Some(lon), Some(lat)) = (lons.get(i), lats.get(i)) else {
            warn!("[cityhall] row {row} ({city}) has no coordinates, skipped");
            continue;
        };
        halls.push(CityHall {
            prefecture_code: format!("{:0>2}", code.trim()),
            city_name: city.trim().to_string(),
            address: addresses.and_then(|a| a.get(i)).map(str::to_string),
            center: [lon, lat],
        });
    }
    Ok(halls)
}

/// A city whose office moved by more than the report threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct MovedCity {
    pub name: String,
    pub prefecture: String,
    pub old: [f64; 2],
    pub new: [f64; 2],
    pub distance_km: f64,
}

/// Outcome of matching a city table against city halls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    pub exact: usize,
    /// Matched by a name held by a single office.
    pub by_name: usize,
    /// `name（prefecture）` of every city that kept its old coordinates.
    pub unmatched: Vec<String>,
    /// Cities that moved further than the threshold, furthest first.
    pub moved: Vec<MovedCity>,
}

/// Replace each city's center with its office location.
/// Unmatched cities keep their coordinates; table order is preserved.
pub fn match_city_coordinates(
    table: &PopulationTable,
    halls: &CityHallIndex,
    moved_threshold_km: f64,
) -> Result<(PopulationTable, MatchReport)> {
    ensure!(table.kind() == PlaceKind::City, "coordinate matching needs a city table, got {}", table.kind());

    let mut report = MatchReport::default();
    let mut places = Vec::with_capacity(table.len());
    for place in table.places() {
        let prefecture = place.prefecture_name();
        let code = prefecture_code(prefecture);
        if code.is_none() {
            warn!("[cityhall] unknown prefecture {prefecture} for {}", place.name);
        }

        let lookup = halls.lookup(code, &place.name);
        match lookup {
            Lookup::Exact(_) => report.exact += 1,
            Lookup::ByName(_) => report.by_name += 1,
            Lookup::Ambiguous(candidates) => {
                debug!("[cityhall] {}（{prefecture}）: {candidates} offices share the name, none in the prefecture", place.name);
                report.unmatched.push(format!("{}（{prefecture}）", place.name));
            }
            Lookup::Unmatched => report.unmatched.push(format!("{}（{prefecture}）", place.name)),
        }

        let center = lookup.hall().map_or(place.center, |hall| hall.center);
        let distance_km = approx_distance_km(place.center, center);
        if distance_km > moved_threshold_km {
            report.moved.push(MovedCity {
                name: place.name.clone(),
                prefecture: prefecture.to_string(),
                old: place.center,
                new: center,
                distance_km,
            });
        }
        places.push(Place { center, ..place.clone() });
    }
    report.moved.sort_by(|a, b| b.distance_km.total_cmp(&a.distance_km));

    Ok((table.with_places(places)?, report))
}

/// Settings for rewriting a city table with office coordinates.
#[derive(Debug, Clone)]
pub struct CityHallConfig {
    pub table: PathBuf,
    pub city_halls: PathBuf,
    pub output: PathBuf,
    /// Cities moving further than this are listed in the report.
    pub moved_threshold_km: f64,
}

impl CityHallConfig {
    pub fn new(table: impl Into<PathBuf>, city_halls: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            table: table.into(),
            city_halls: city_halls.into(),
            output: output.into(),
            moved_threshold_km: 1.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.moved_threshold_km.is_finite() && self.moved_threshold_km >= 0.0,
            "moved threshold must be a non-negative number, got {}", self.moved_threshold_km
        );
        ensure!(self.table.is_file(), "Population table not found: {}", self.table.display());
        ensure!(self.city_halls.is_file(), "City-hall CSV not found: {}", self.city_halls.display());
        prepare_output_path(&self.output)
    }
}

/// Load a city table and a city-hall CSV, match them, and write the updated table.
pub fn fix_city_coordinates(config: &CityHallConfig) -> Result<MatchReport> {
    config.validate()?;
    let table = PopulationTable::from_path(&config.table)?;
    let halls = CityHallIndex::from_csv(&config.city_halls)?;

    let (updated, report) = match_city_coordinates(&table, &halls, config.moved_threshold_km)?;
    info!("[cityhall] exact: {}", report.exact);
    info!("[cityhall] by name: {}", report.by_name);
    info!("[cityhall] unmatched: {}", report.unmatched.len());
    for city in &report.unmatched {
        warn!("[cityhall] no office found for {city}");
    }
    for moved in report.moved.iter().take(20) {
        info!(
            "[cityhall] {}（{}）: {:.2} km [{:.6}, {:.6}] -> [{:.6}, {:.6}]",
            moved.name, moved.prefecture, moved.distance_km,
            moved.old[0], moved.old[1], moved.new[0], moved.new[1]
        );
    }

    updated.write(&config.output)?;
    info!("[cityhall] wrote {}", config.output.display());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn hall(code: &str, name: &str, lon: f64, lat: f64) -> CityHall {
        CityHall { prefecture_code: code.into(), city_name: name.into(), address: None, center: [lon, lat] }
    }

    fn city(name: &str, prefecture: &str, center: [f64; 2]) -> Place {
        Place { name: name.into(), population: 100_000, center, prefecture: Some(prefecture.into()) }
    }

    fn halls() -> CityHallIndex {
        CityHallIndex::new(vec![
            hall("13", "府中市", 139.4777, 35.6689),
            hall("34", "府中市", 133.2364, 34.5682),
            hall("13", "府中市", 0.0, 0.0),
            hall("14", "横浜市", 139.6380, 35.4437),
            hall("40", "伊達市", 130.0, 33.0),
            hall("01", "伊達市", 140.8647, 42.4716),
            hall("07", "伊達市", 140.5623, 37.8191),
        ])
    }

    #[test]
    fn codes_cover_every_prefecture() {
        assert_eq!(prefecture_code("北海道"), Some("01"));
        assert_eq!(prefecture_code("東京都"), Some("13"));
        assert_eq!(prefecture_code("沖縄県"), Some("47"));
        assert_eq!(prefecture_code("東京"), None);
        let codes: Vec<u32> = PREFECTURE_CODES.iter().map(|(_, c)| c.parse().unwrap()).collect();
        assert_eq!(codes, (1..=47).collect::<Vec<_>>());
    }

    #[test]
    fn same_name_cities_resolve_by_prefecture() {
        let halls = halls();
        assert_eq!(halls.lookup(Some("13"), "府中市"), Lookup::Exact(&hall("13", "府中市", 139.4777, 35.6689)));
        assert_eq!(halls.lookup(Some("34"), "府中市").hall().unwrap().center, [133.2364, 34.5682]);
        assert_eq!(halls.lookup(None, "横浜市"), Lookup::ByName(&hall("14", "横浜市", 139.6380, 35.4437)));
        assert_eq!(halls.lookup(Some("99"), "府中市"), Lookup::Ambiguous(3));
        assert_eq!(halls.lookup(Some("13"), "存在しない市"), Lookup::Unmatched);
    }

    #[test]
    fn name_fallback_ignores_prefecture_when_unique() {
        // Listed under the wrong prefecture, but the name is unique.
        let halls = halls();
        assert!(matches!(halls.lookup(Some("13"), "横浜市"), Lookup::ByName(_)));
    }

    #[test]
    fn matching_updates_centers_and_counts() {
        let table = PopulationTable::new(PlaceKind::City, vec![
            city("府中市", "広島県", [133.0, 34.5]),
            city("横浜市", "神奈川県", [139.6380, 35.4437]),
            city("伊達市", "北海道", [140.86, 42.47]),
            city("幻市", "東京都", [139.0, 35.0]),
        ]).unwrap();

        let (updated, report) = match_city_coordinates(&table, &halls(), 1.0).unwrap();
        assert_eq!((report.exact, report.by_name), (3, 0));
        assert_eq!(report.unmatched, vec!["幻市（東京都）".to_string()]);

        let centers: Vec<_> = updated.places().iter().map(|p| p.center).collect();
        assert_eq!(centers, vec![
            [133.2364, 34.5682],
            [139.6380, 35.4437],
            [140.8647, 42.4716],
            [139.0, 35.0],
        ]);
        assert_eq!(report.moved.len(), 1);
        assert_eq!(report.moved[0].name, "府中市");
        assert!((report.moved[0].distance_km - approx_distance_km([133.0, 34.5], [133.2364, 34.5682])).abs() < 1e-12);
    }

    #[test]
    fn shared_name_outside_prefecture_keeps_old_center() {
        let table = PopulationTable::new(PlaceKind::City, vec![
            city("伊達市", "宮城県", [140.0, 38.0]),
            city("横浜市", "東京都", [139.0, 35.0]),
        ]).unwrap();
        let (updated, report) = match_city_coordinates(&table, &halls(), 1.0).unwrap();
        assert_eq!((report.exact, report.by_name), (0, 1));
        assert_eq!(report.unmatched, vec!["伊達市（宮城県）".to_string()]);
        assert_eq!(updated.places()[0].center, [140.0, 38.0]);
        assert_eq!(updated.places()[1].center, [139.6380, 35.4437]);
    }

    #[test]
    fn prefecture_table_is_rejected() {
        let table = PopulationTable::new(PlaceKind::Prefecture, vec![]).unwrap();
        assert!(match_city_coordinates(&table, &halls(), 1.0).is_err());
    }

    #[test]
    fn distance_uses_111_km_per_degree() {
        assert!((approx_distance_km([139.0, 35.0], [139.0, 36.0]) - 111.0).abs() < 1e-9);
        assert!((approx_distance_km([0.0, 0.0], [3.0, 4.0]) - 555.0).abs() < 1e-9);
    }

    #[test]
    fn csv_codes_are_zero_padded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("all_city_halls.csv");
        std::fs::write(&path, "prefecture_code,city_name,address,longitude,latitude\n\
            1,伊達市,北海道伊達市鹿島町20-1,140.8647,42.4716\n\
            13,府中市,東京都府中市宮西町2-24,139.4777,35.6689\n").unwrap();
        let halls = CityHallIndex::from_csv(&path).unwrap();
        assert_eq!(halls.len(), 2);
        let date = halls.lookup(Some("01"), "伊達市").hall().unwrap();
        assert_eq!(date.address.as_deref(), Some("北海道伊達市鹿島町20-1"));
        assert_eq!(date.center, [140.8647, 42.4716]);
    }

    #[test]
    fn csv_without_coordinates_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("halls.csv");
        std::fs::write(&path, "prefecture_code,city_name\n13,府中市\n").unwrap();
        let err = format!("{:#}", CityHallIndex::from_csv(&path).unwrap_err());
        assert!(err.contains("longitude"), "{err}");
    }
}
