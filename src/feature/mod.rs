//! Features are the things extracted from the drawing onto the map.
//!

pub use self::geometry::{GeometryBuilder, ShapeError};

pub mod geojson;
pub mod geometry;

use std::collections::BTreeMap;
use kurbo::{Point, Rect};
use rstar::{AABB, RTree, RTreeObject};
use crate::transform::Transform;


//------------ Properties ----------------------------------------------------

/// The properties of a feature.
///
/// These are opaque to the extraction itself. Annotations add to them.
pub type Properties = BTreeMap<String, String>;

/// The property holding the name of the shape a feature was made from.
pub const SHAPE_NAME: &str = "shape_name";


//------------ Feature -------------------------------------------------------

/// A single feature of a map layer.
#[derive(Clone, Debug, PartialEq)]
pub struct Feature {
    id: u32,
    geometry: Geometry,
    properties: Properties,
    has_children: bool,
}

impl Feature {
    pub fn new(
        id: u32,
        geometry: Geometry,
        properties: Properties,
        has_children: bool,
    ) -> Self {
        Feature { id, geometry, properties, has_children }
    }

    /// The identifier of the shape this feature was made from.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Replaces the geometry.
    ///
    /// This is the only change a feature allows once created.
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    pub fn shape_name(&self) -> &str {
        self.property(SHAPE_NAME).unwrap_or("")
    }

    /// Marks a grouping boundary whose members are features of their own.
    pub fn has_children(&self) -> bool {
        self.has_children
    }

    pub fn bounding_box(&self) -> Rect {
        self.geometry.bounding_box()
    }
}


//------------ Geometry ------------------------------------------------------

/// The geometry of a feature in flat map coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Point(Point),

    Line(Vec<Point>),

    MultiLine(Vec<Vec<Point>>),

    /// A polygon as a list of closed rings.
    ///
    /// The first ring is the exterior, all others are holes. The last point
    /// of each ring equals its first point.
    Polygon(Vec<Vec<Point>>),
}

impl Geometry {
    /// The name of the geometry type as used by GeoJSON.
    pub fn type_name(&self) -> &'static str {
        match *self {
            Geometry::Point(_) => "Point",
            Geometry::Line(_) => "LineString",
            Geometry::MultiLine(_) => "MultiLineString",
            Geometry::Polygon(_) => "Polygon",
        }
    }

    /// Returns an iterator over all points of the geometry.
    pub fn points(&self) -> Box<dyn Iterator<Item = Point> + '_> {
        match *self {
            Geometry::Point(point) => Box::new(std::iter::once(point)),
            Geometry::Line(ref line) => Box::new(line.iter().copied()),
            Geometry::MultiLine(ref lines) | Geometry::Polygon(ref lines) => {
                Box::new(lines.iter().flat_map(|line| line.iter().copied()))
            }
        }
    }

    pub fn bounding_box(&self) -> Rect {
        let mut points = self.points();
        let first = match points.next() {
            Some(point) => point,
            None => return Rect::ZERO,
        };
        points.fold(Rect::from_points(first, first), |rect, point| {
            rect.union_pt(point)
        })
    }

    /// Returns whether all coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.points().all(|point| point.x.is_finite() && point.y.is_finite())
    }

    /// Returns the geometry with every point transformed.
    pub fn transformed(&self, transform: Transform) -> Self {
        self.map_points(|point| transform.apply(point))
    }

    /// Returns the geometry with every point replaced by `op(point)`.
    pub fn map_points(&self, op: impl Fn(Point) -> Point) -> Self {
        let line = |line: &Vec<Point>| -> Vec<Point> {
            line.iter().map(|point| op(*point)).collect()
        };
        match *self {
            Geometry::Point(point) => Geometry::Point(op(point)),
            Geometry::Line(ref points) => Geometry::Line(line(points)),
            Geometry::MultiLine(ref lines) => {
                Geometry::MultiLine(lines.iter().map(line).collect())
            }
            Geometry::Polygon(ref rings) => {
                Geometry::Polygon(rings.iter().map(line).collect())
            }
        }
    }
}


//------------ FeatureSet ----------------------------------------------------

/// The features of a layer in order with a spatial index.
#[derive(Default)]
pub struct FeatureSet {
    features: Vec<Feature>,
    index: RTree<StoredFeature>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, feature: Feature) {
        self.index.insert(
            StoredFeature::new(self.features.len(), feature.bounding_box())
        );
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> + '_ {
        self.features.iter()
    }

    /// Returns the feature made from the shape with the given id.
    pub fn get(&self, id: u32) -> Option<&Feature> {
        self.features.iter().find(|feature| feature.id() == id)
    }

    /// Returns the features whose bounding box intersects `bounds`.
    ///
    /// The features are returned in the order they were inserted.
    pub fn locate(&self, bounds: Rect) -> impl Iterator<Item = &Feature> {
        let mut res: Vec<_> = self.index.locate_in_envelope_intersecting(
            &AABB::from_corners([bounds.x0, bounds.y0], [bounds.x1, bounds.y1])
        ).map(|stored| stored.index).collect();
        res.sort_unstable();
        res.into_iter().map(|index| &self.features[index])
    }

    /// Returns the bounding box of all features.
    pub fn bounds(&self) -> Option<Rect> {
        if self.is_empty() {
            return None
        }
        let envelope = self.index.root().envelope();
        let (lower, upper) = (envelope.lower(), envelope.upper());
        Some(Rect::new(lower[0], lower[1], upper[0], upper[1]))
    }
}

impl std::fmt::Debug for FeatureSet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_list().entries(self.features.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a FeatureSet {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}


//------------ StoredFeature -------------------------------------------------

struct StoredFeature {
    index: usize,
    bounds: AABB<[f64; 2]>,
}

impl StoredFeature {
    fn new(index: usize, bounds: Rect) -> Self {
        StoredFeature {
            index,
            bounds: AABB::from_corners(
                [bounds.x0, bounds.y0], [bounds.x1, bounds.y1]
            ),
        }
    }
}

impl RTreeObject for StoredFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}


//============ Testing =======================================================
