//! GeoJSON output of features.
//!
//! The vector tiles of a map are built by an external tool from GeoJSON
//! files, one per layer.

use kurbo::Point;
use serde_json::{json, Map, Value};
use super::{Feature, FeatureSet, Geometry};


/// Returns a GeoJSON feature collection for a set of features.
///
/// Each point is passed through `project` before output. Use the identity
/// to keep flat map coordinates.
pub fn feature_collection(
    features: &FeatureSet, project: impl Fn(Point) -> Point,
) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": features.iter().map(|feature| {
            feature_value(feature, &project)
        }).collect::<Vec<_>>(),
    })
}

/// Returns a single GeoJSON feature.
pub fn feature_value(
    feature: &Feature, project: &impl Fn(Point) -> Point,
) -> Value {
    let mut properties: Map<String, Value> = feature.properties().iter().map(
        |(key, value)| (key.clone(), Value::String(value.clone()))
    ).collect();
    if feature.has_children() {
        properties.insert("has-children".into(), Value::Bool(true));
    }
    json!({
        "type": "Feature",
        "id": feature.id(),
        "geometry": geometry_value(feature.geometry(), project),
        "properties": properties,
    })
}

fn geometry_value(
    geometry: &Geometry, project: &impl Fn(Point) -> Point,
) -> Value {
    let point = |point: Point| -> Value {
        let point = project(point);
        json!([point.x, point.y])
    };
    let line = |line: &Vec<Point>| -> Value {
        Value::Array(line.iter().map(|p| point(*p)).collect())
    };
    let coordinates = match *geometry {
        Geometry::Point(p) => point(p),
        Geometry::Line(ref points) => line(points),
        Geometry::MultiLine(ref lines) | Geometry::Polygon(ref lines) => {
            Value::Array(lines.iter().map(line).collect())
        }
    };
    json!({
        "type": geometry.type_name(),
        "coordinates": coordinates,
    })
}


//============ Testing =======================================================
