use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon, RemoveRepeatedPoints, Simplify, Validation};
use shapefile as shp;
use std::panic::{AssertUnwindSafe, catch_unwind};

/// Ensure first and last are the same for geo::LineString coords
fn ensure_closed(coords: &mut Vec<Coord<f64>>) {
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last { coords.push(first) }
    }
}

/// Convert shapefile::Polygon to geo::MultiPolygon<f64>
pub(crate) fn shp_to_geo(p: &shp::Polygon) -> MultiPolygon<f64> {
    // Shapefile stores each exterior followed by its holes.
    let mut polys: Vec<Polygon<f64>> = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes: Vec<LineString<f64>> = Vec::new();

    for ring in p.rings() {
        let mut coords: Vec<Coord<f64>> = ring.points().iter().map(|pt| Coord { x: pt.x, y: pt.y }).collect();
        ensure_closed(&mut coords);
        let is_exterior = matches!(ring, shp::PolygonRing::Outer(_));
        let ls = LineString(coords);

        if is_exterior {
            if let Some(ext) = current_exterior.take() {
                polys.push(Polygon::new(ext, std::mem::take(&mut current_holes)));
            }
            current_exterior = Some(ls);
        } else {
            current_holes.push(ls);
        }
    }
    if let Some(ext) = current_exterior {
        polys.push(Polygon::new(ext, current_holes));
    }

    MultiPolygon(polys)
}

/// Drop repeated vertices and return the polygon if it is OGC-valid with
/// positive area. Used before a union.
pub(crate) fn clean_polygon(polygon: &Polygon<f64>) -> Option<Polygon<f64>> {
    let cleaned = polygon.remove_repeated_points();
    (cleaned.is_valid() && cleaned.unsigned_area() > 0.0).then_some(cleaned)
}

/// Simplify each polygon, keeping the original where simplification breaks it.
pub(crate) fn simplify_polygons(shape: MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    if tolerance == 0.0 {
        return shape;
    }
    let polygons: Vec<Polygon<f64>> = shape.0.into_iter()
        .map(|polygon| {
            clean_polygon(&polygon.simplify(&tolerance)).unwrap_or(polygon)
        })
        .collect();
    MultiPolygon(polygons)
}

/// Check that every coordinate of a MultiPolygon is finite.
fn is_finite(mp: &MultiPolygon<f64>) -> bool {
    mp.0.iter().all(|p| {
        std::iter::once(p.exterior())
            .chain(p.interiors())
            .all(|ring| ring.0.iter().all(|c| c.x.is_finite() && c.y.is_finite()))
    })
}

/// Compute the union of all MultiPolygons into a single MultiPolygon.
/// This method may be slow for large numbers of complex polygons.
fn union_all(shapes: impl IntoIterator<Item = MultiPolygon<f64>>) -> Option<MultiPolygon<f64>> {
    shapes.into_iter().reduce(|a, b| a.union(&b))
}

/// [`union_all`] that reports a panic in the boolean-ops sweep, or an empty or
/// non-finite result, as an error message.
pub(crate) fn try_union_all(shapes: Vec<MultiPolygon<f64>>) -> Result<MultiPolygon<f64>, String> {
    guarded_union(|| union_all(shapes))
}

/// Run a union, turning a panic or an empty or non-finite result into an error.
fn guarded_union(op: impl FnOnce() -> Option<MultiPolygon<f64>>) -> Result<MultiPolygon<f64>, String> {
    match catch_unwind(AssertUnwindSafe(op)) {
        Ok(Some(mp)) if is_finite(&mp) && !mp.0.is_empty() => Ok(mp),
        Ok(_) => Err("union produced an empty or non-finite geometry".to_string()),
        Err(panic) => Err(panic.downcast_ref::<&str>().map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "union panicked".to_string())),
    }
}
