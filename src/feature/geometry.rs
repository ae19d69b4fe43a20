use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Value, json};

/// A tile-local pixel position. `y` is measured northward from the tile's south edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pixel {
    pub x: f64,
    pub y: f64,
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    #[inline] pub fn new(lon: f64, lat: f64) -> Self { Self { lon, lat } }
}

/// The closed set of geometry shapes carried through the pipeline, generic over the position type.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry<T> {
    Point(T),
    MultiPoint(Vec<T>),
    LineString(Vec<T>),
    MultiLineString(Vec<Vec<T>>),
    Polygon(Vec<Vec<T>>),
    MultiPolygon(Vec<Vec<Vec<T>>>),
}

/// Geometry in tile-pixel space, as produced by the decoder.
pub type TileGeometry = Geometry<Pixel>;

/// Geometry in lon/lat space, as written to GeoJSON.
pub type GeoGeometry = Geometry<LonLat>;

impl<T> Geometry<T> {
    /// GeoJSON type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            Geometry::Point(_) => "Point",
            Geometry::MultiPoint(_) => "MultiPoint",
            Geometry::LineString(_) => "LineString",
            Geometry::MultiLineString(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
            Geometry::MultiPolygon(_) => "MultiPolygon",
        }
    }

    #[inline]
    pub fn is_polygonal(&self) -> bool {
        matches!(self, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
    }

    /// Map every position, keeping the nesting of the variant.
    pub fn map_positions<U>(&self, mut f: impl FnMut(&T) -> U) -> Geometry<U> {
        fn line<T, U>(line: &[T], f: &mut impl FnMut(&T) -> U) -> Vec<U> {
            line.iter().map(|p| f(p)).collect()
        }
        fn rings<T, U>(rings: &[Vec<T>], f: &mut impl FnMut(&T) -> U) -> Vec<Vec<U>> {
            rings.iter().map(|ring| line(ring, &mut *f)).collect()
        }
        fn polygons<T, U>(polygons: &[Vec<Vec<T>>], f: &mut impl FnMut(&T) -> U) -> Vec<Vec<Vec<U>>> {
            polygons.iter().map(|polygon| rings(polygon, &mut *f)).collect()
        }

        match self {
            Geometry::Point(p) => Geometry::Point(f(p)),
            Geometry::MultiPoint(points) => Geometry::MultiPoint(line(points, &mut f)),
            Geometry::LineString(ls) => Geometry::LineString(line(ls, &mut f)),
            Geometry::MultiLineString(lines) => Geometry::MultiLineString(rings(lines, &mut f)),
            Geometry::Polygon(polygon) => Geometry::Polygon(rings(polygon, &mut f)),
            Geometry::MultiPolygon(mp) => Geometry::MultiPolygon(polygons(mp, &mut f)),
        }
    }
}

impl GeoGeometry {
    /// GeoJSON geometry object with `[lon, lat]` positions.
    pub fn to_geojson(&self) -> Value {
        fn position(p: &LonLat) -> Value { json!([p.lon, p.lat]) }
        fn line(points: &[LonLat]) -> Value { points.iter().map(position).collect() }
        fn rings(rings: &[Vec<LonLat>]) -> Value { rings.iter().map(|r| line(r)).collect() }

        let coordinates = match self {
            Geometry::Point(p) => position(p),
            Geometry::MultiPoint(points) | Geometry::LineString(points) => line(points),
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => rings(lines),
            Geometry::MultiPolygon(mp) => mp.iter().map(|polygon| rings(polygon)).collect(),
        };

        json!({
            "type": self.type_name(),
            "coordinates": coordinates,
        })
    }

    /// Convert a polygonal geometry into a planar geo::MultiPolygon.
    /// Returns None for points and lines.
    pub fn to_multipolygon(&self) -> Option<MultiPolygon<f64>> {
        fn ring(points: &[LonLat]) -> LineString<f64> {
            let mut coords: Vec<Coord<f64>> = points.iter().map(|p| Coord { x: p.lon, y: p.lat }).collect();
            if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
                if first != last { coords.push(first) }
            }
            LineString(coords)
        }
        fn polygon(rings: &[Vec<LonLat>]) -> Option<Polygon<f64>> {
            let (exterior, interiors) = rings.split_first()?;
            Some(Polygon::new(ring(exterior), interiors.iter().map(|r| ring(r)).collect()))
        }

        match self {
            Geometry::Polygon(rings) => Some(MultiPolygon(polygon(rings).into_iter().collect())),
            Geometry::MultiPolygon(mp) => Some(MultiPolygon(mp.iter().filter_map(|p| polygon(p)).collect())),
            _ => None,
        }
    }

    /// Polygon if the input has exactly one part, MultiPolygon otherwise.
    pub fn from_multipolygon(mp: &MultiPolygon<f64>) -> Self {
        fn ring(ls: &LineString<f64>) -> Vec<LonLat> {
            ls.coords().map(|c| LonLat::new(c.x, c.y)).collect()
        }
        fn polygon(p: &Polygon<f64>) -> Vec<Vec<LonLat>> {
            std::iter::once(ring(p.exterior()))
                .chain(p.interiors().iter().map(ring))
                .collect()
        }

        match mp.0.as_slice() {
            [single] => Geometry::Polygon(polygon(single)),
            parts => Geometry::MultiPolygon(parts.iter().map(polygon).collect()),
        }
    }
}
