mod geometry;
mod merge;

pub use geometry::*;
pub use merge::*;

use serde_json::{Map, Value, json};

/// Feature attributes with the `class` tag pulled out as a typed field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    class: Option<String>,
    attributes: Map<String, Value>,
}

impl Properties {
    /// Split a raw attribute map. Only a string `class` becomes the class tag.
    pub fn from_map(mut attributes: Map<String, Value>) -> Self {
        let class = match attributes.remove("class") {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                attributes.insert("class".into(), other);
                None
            }
            None => None,
        };
        Self { class, attributes }
    }

    /// Properties without a class tag.
    pub fn from_attributes<K: Into<String>, V: Into<Value>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            class: None,
            attributes: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    #[inline] pub fn class(&self) -> Option<&str> { self.class.as_deref() }
    #[inline] pub fn get(&self, key: &str) -> Option<&Value> { self.attributes.get(key) }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// GeoJSON properties object, with `class` folded back in.
    pub fn to_geojson(&self) -> Value {
        let mut map = self.attributes.clone();
        if let Some(class) = &self.class {
            map.insert("class".into(), json!(class));
        }
        Value::Object(map)
    }
}

/// A geometry and its properties, generic over the position type.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature<T> {
    pub geometry: Geometry<T>,
    pub properties: Properties,
}

/// A feature in tile-pixel space.
pub type DecodedFeature = Feature<Pixel>;

/// A feature in lon/lat space.
pub type GeoFeature = Feature<LonLat>;

impl GeoFeature {
    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "Feature",
            "properties": self.properties.to_geojson(),
            "geometry": self.geometry.to_geojson(),
        })
    }
}
