#![doc = "geoprep public API"]
mod cityhall;
mod common;
mod extract;
mod landuse;
mod naturalearth;
mod population;
mod regions;
pub mod feature;
pub mod tile;

#[doc(inline)]
pub use cityhall::{
    CityHall, CityHallConfig, CityHallIndex, Lookup, MatchReport, MovedCity, PREFECTURE_CODES,
    approx_distance_km, fix_city_coordinates, match_city_coordinates, prefecture_code,
};

#[doc(inline)]
pub use common::{read_feature_collection, write_feature_collection};

#[doc(inline)]
pub use extract::{ExtractConfig, ExtractReport, extract_vector_tiles};

#[doc(inline)]
pub use landuse::{CODE_COLUMNS, LanduseCategory, LanduseConfig, LanduseReport, convert_landuse};

#[doc(inline)]
pub use naturalearth::{JAPAN_BBOX, NaturalEarthConfig, NaturalEarthReport, clip_natural_earth};

#[doc(inline)]
pub use population::{
    BASE_RADIUS, CIRCLE_SEGMENTS, MAX_HEIGHT, POPULATION_TABLE_VERSION, Place, PlaceKind, PopulationReport,
    PopulationTable, circle_ring, extrusion_height, size_factor, write_population_layers,
};

#[doc(inline)]
pub use regions::{REGION_TABLE_VERSION, Region, RegionTable};
