//! Building flat geometry from shapes.

use std::f64::consts::PI;
use kurbo::{Point, Size, Vec2};
use crate::drawing::{PathCommand, PathGeometry, Shape, ShapeKind};
use crate::transform::Transform;
use super::Geometry;


/// The number of segments used to approximate a full ellipse.
pub const ELLIPSE_SEGMENTS: usize = 64;

/// The maximum number of segments used to approximate a single arc.
pub const MAX_ARC_SEGMENTS: usize = 16 * ELLIPSE_SEGMENTS;


//------------ ellipse_point -------------------------------------------------

/// Returns the point on the boundary of an ellipse at the given angle.
///
/// The ellipse is centred on the origin and has the semi-axes `a` along x
/// and `b` along y. The angle `theta` is in radians and is the actual angle
/// of the point as seen from the centre, not the parameter of the usual
/// `(a cos t, b sin t)` parametrization. Drawings specify arcs this way.
pub fn ellipse_point(a: f64, b: f64, theta: f64) -> Vec2 {
    let a_sin_theta = a * theta.sin();
    let b_cos_theta = b * theta.cos();
    let radius = a_sin_theta.hypot(b_cos_theta);
    if radius == 0. {
        return Vec2::ZERO
    }
    Vec2::new(a * b_cos_theta / radius, b * a_sin_theta / radius)
}


//------------ GeometryBuilder -----------------------------------------------

/// Builds the geometry of a single shape.
///
/// The builder produces the shape's outline in its local space and maps
/// it into flat space via the transform composed for the shape.
pub struct GeometryBuilder<'a> {
    shape: &'a Shape,
}

impl<'a> GeometryBuilder<'a> {
    pub fn new(shape: &'a Shape) -> Self {
        GeometryBuilder { shape }
    }

    /// Returns the size of the shape's local content.
    ///
    /// This is the bounding box against which the shape's extent is scaled.
    pub fn content_size(&self) -> Size {
        match self.shape.kind {
            ShapeKind::Path(ref path) => {
                path.size.unwrap_or(self.shape.xfrm.extent)
            }
            _ => self.shape.xfrm.extent
        }
    }

    /// Returns the transform from the shape's local space to its parent's.
    pub fn local_transform(&self) -> Transform {
        self.shape.xfrm.transform(self.content_size())
    }

    /// Builds the geometry in flat space.
    ///
    /// The `transform` maps the shape's local space into flat space.
    pub fn build(&self, transform: Transform) -> Result<Geometry, ShapeError> {
        let geometry = self.local_geometry()?.transformed(transform);
        if !geometry.is_finite() {
            return Err(ShapeError::NonFinite)
        }
        Ok(geometry)
    }

    /// Returns the number of open sub-paths missing from the geometry.
    ///
    /// A path with closed sub-paths becomes a polygon which can't contain
    /// the path's open sub-paths.
    pub fn dropped_lines(&self) -> usize {
        match self.shape.kind {
            ShapeKind::Path(ref path) => {
                let parts = SubPaths::split(path);
                if parts.closed.is_empty() { 0 } else { parts.open.len() }
            }
            _ => 0
        }
    }

    /// Builds the geometry in the shape's local space.
    pub fn local_geometry(&self) -> Result<Geometry, ShapeError> {
        let size = self.content_size();
        match self.shape.kind {
            ShapeKind::Path(ref path) => path_geometry(path),
            ShapeKind::Rect => Ok(rect_outline(Point::ZERO, size)),
            ShapeKind::Ellipse => Ok(ellipse_outline(size)),
            ShapeKind::Connector => {
                Ok(Geometry::Line(vec![
                    Point::ZERO, Point::new(size.width, size.height)
                ]))
            }
            ShapeKind::Group(_) => {
                // A group's local space is its child space, so its
                // outline is the child rectangle.
                let xfrm = &self.shape.xfrm;
                Ok(rect_outline(
                    xfrm.child_offset.unwrap_or(Point::ZERO),
                    xfrm.child_extent.unwrap_or(size),
                ))
            }
            ref kind => {
                Err(ShapeError::UnsupportedPrimitive(kind.name().into()))
            }
        }
    }
}


//------------ Outlines ------------------------------------------------------

fn rect_outline(origin: Point, size: Size) -> Geometry {
    let (x0, y0) = (origin.x, origin.y);
    let (x1, y1) = (x0 + size.width, y0 + size.height);
    Geometry::Polygon(vec![vec![
        Point::new(x0, y0), Point::new(x1, y0),
        Point::new(x1, y1), Point::new(x0, y1),
        Point::new(x0, y0),
    ]])
}

fn ellipse_outline(size: Size) -> Geometry {
    let (a, b) = (size.width / 2., size.height / 2.);
    let center = Point::new(a, b);
    let mut ring: Vec<_> = (0..ELLIPSE_SEGMENTS).map(|i| {
        let theta = 2. * PI * (i as f64) / (ELLIPSE_SEGMENTS as f64);
        center + ellipse_point(a, b, theta)
    }).collect();
    ring.push(ring[0]);
    Geometry::Polygon(vec![ring])
}

/// Appends the points of an arc starting at the last point of `points`.
fn arc_to(points: &mut Vec<Point>, wr: f64, hr: f64, start: f64, swing: f64) {
    let current = match points.last() {
        Some(point) => *point,
        None => {
            points.push(Point::ZERO);
            Point::ZERO
        }
    };
    let steps = (
        swing.abs() / 360. * (ELLIPSE_SEGMENTS as f64)
    ).ceil().clamp(2., MAX_ARC_SEGMENTS as f64) as usize;
    let (start, swing) = (start.to_radians(), swing.to_radians());
    let center = current - ellipse_point(wr, hr, start);
    for i in 1..=steps {
        let theta = start + swing * (i as f64) / (steps as f64);
        points.push(center + ellipse_point(wr, hr, theta));
    }
}

fn path_geometry(path: &PathGeometry) -> Result<Geometry, ShapeError> {
    let SubPaths { mut open, closed } = SubPaths::split(path);
    if !closed.is_empty() {
        return Ok(Geometry::Polygon(closed))
    }
    match open.len() {
        0 => {}
        1 => return Ok(Geometry::Line(open.pop().unwrap_or_default())),
        _ => return Ok(Geometry::MultiLine(open)),
    }
    match path.commands.first() {
        Some(PathCommand::MoveTo(point)) if path.commands.len() == 1 => {
            Ok(Geometry::Point(*point))
        }
        _ => Err(ShapeError::EmptyOutline)
    }
}


//------------ SubPaths ------------------------------------------------------

/// The sub-paths of a path.
struct SubPaths {
    /// Lines with at least two points.
    open: Vec<Vec<Point>>,

    /// Closed rings.
    closed: Vec<Vec<Point>>,
}

impl SubPaths {
    fn split(path: &PathGeometry) -> Self {
        let mut open = Vec::new();
        let mut closed = Vec::new();
        let mut current: Vec<Point> = Vec::new();

        for command in &path.commands {
            match *command {
                PathCommand::MoveTo(point) => {
                    if !current.is_empty() {
                        open.push(std::mem::take(&mut current));
                    }
                    current.push(point);
                }
                PathCommand::LineTo(point) => current.push(point),
                PathCommand::ArcTo { wr, hr, start, swing } => {
                    arc_to(&mut current, wr, hr, start, swing)
                }
                PathCommand::Close => {
                    if current.is_empty() {
                        continue
                    }
                    let first = current[0];
                    let mut ring = std::mem::take(&mut current);
                    if ring.len() < 3 {
                        open.push(ring);
                    }
                    else {
                        if ring.last() != Some(&first) {
                            ring.push(first);
                        }
                        closed.push(ring);
                    }
                    // Drawing continues from where the closed sub-path
                    // started.
                    current.push(first);
                }
            }
        }
        open.push(current);
        open.retain(|line| line.len() > 1);
        SubPaths { open, closed }
    }
}


//------------ ShapeError ----------------------------------------------------

/// A shape could not be turned into a feature.
///
/// These are reported as diagnostics. They never stop the processing of
/// the remaining shapes.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("unsupported primitive '{0}'")]
    UnsupportedPrimitive(String),

    #[error("outline has no drawable parts")]
    EmptyOutline,

    #[error("geometry has non-finite coordinates")]
    NonFinite,
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use std::f64::consts::FRAC_PI_2;
    use crate::drawing::Xfrm;
    use super::*;

    fn assert_close(left: Point, right: Point) {
        assert!(
            (left - right).hypot() < 1e-9,
            "{:?} != {:?}", left, right
        );
    }

    fn shape(kind: ShapeKind, xfrm: Xfrm) -> Shape {
        Shape { id: 1, name: String::new(), xfrm, kind }
    }

    fn path(commands: Vec<PathCommand>) -> ShapeKind {
        ShapeKind::Path(PathGeometry { size: None, commands })
    }

    #[test]
    fn ellipse_point_axes() {
        assert_close(ellipse_point(2., 1., 0.).to_point(), Point::new(2., 0.));
        assert_close(
            ellipse_point(2., 1., FRAC_PI_2).to_point(), Point::new(0., 1.)
        );
        assert_close(ellipse_point(2., 1., PI).to_point(), Point::new(-2., 0.));
        assert_eq!(ellipse_point(0., 0., 1.), Vec2::ZERO);
    }

    #[test]
    fn ellipse_point_on_boundary() {
        let (a, b) = (3., 1.5);
        for i in 0..16 {
            let theta = 2. * PI * (i as f64) / 16.;
            let p = ellipse_point(a, b, theta);
            // On the ellipse ...
            let implicit = (p.x / a).powi(2) + (p.y / b).powi(2);
            assert!((implicit - 1.).abs() < 1e-12, "{} at {}", implicit, i);
            // ... and in the direction of theta.
            assert!(
                (p.y.atan2(p.x) - theta.sin().atan2(theta.cos())).abs()
                    < 1e-12
            );
        }
    }

    #[test]
    fn rect_outline_is_closed_polygon() {
        let rect = shape(
            ShapeKind::Rect,
            Xfrm::new(Point::new(10., 20.), Size::new(4., 2.))
        );
        let builder = GeometryBuilder::new(&rect);
        let geom = builder.build(builder.local_transform()).unwrap();
        assert_eq!(geom, Geometry::Polygon(vec![vec![
            Point::new(10., 20.), Point::new(14., 20.),
            Point::new(14., 22.), Point::new(10., 22.),
            Point::new(10., 20.),
        ]]));
    }

    #[test]
    fn ellipse_outline() {
        let ellipse = shape(
            ShapeKind::Ellipse,
            Xfrm::new(Point::new(0., 0.), Size::new(4., 2.))
        );
        let geom = GeometryBuilder::new(&ellipse).local_geometry().unwrap();
        match geom {
            Geometry::Polygon(ref rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), ELLIPSE_SEGMENTS + 1);
                assert_eq!(rings[0].first(), rings[0].last());
                assert_close(rings[0][0], Point::new(4., 1.));
                assert_close(
                    rings[0][ELLIPSE_SEGMENTS / 4], Point::new(2., 2.)
                );
            }
            _ => panic!("expected polygon"),
        }
    }

    #[test]
    fn connector_is_line() {
        let connector = shape(
            ShapeKind::Connector,
            Xfrm::new(Point::new(1., 1.), Size::new(4., 2.))
                .with_flip(false, true)
        );
        let builder = GeometryBuilder::new(&connector);
        let geom = builder.build(builder.local_transform()).unwrap();
        match geom {
            Geometry::Line(ref points) => {
                assert_close(points[0], Point::new(1., 3.));
                assert_close(points[1], Point::new(5., 1.));
            }
            _ => panic!("expected line"),
        }
    }

    #[test]
    fn open_and_closed_paths() {
        let open = path(vec![
            PathCommand::MoveTo(Point::new(0., 0.)),
            PathCommand::LineTo(Point::new(1., 0.)),
            PathCommand::LineTo(Point::new(1., 1.)),
        ]);
        let xfrm = Xfrm::new(Point::ZERO, Size::new(1., 1.));
        assert!(matches!(
            GeometryBuilder::new(&shape(open, xfrm)).local_geometry(),
            Ok(Geometry::Line(ref points)) if points.len() == 3
        ));

        let closed = path(vec![
            PathCommand::MoveTo(Point::new(0., 0.)),
            PathCommand::LineTo(Point::new(1., 0.)),
            PathCommand::LineTo(Point::new(1., 1.)),
            PathCommand::Close,
            PathCommand::MoveTo(Point::new(0.2, 0.2)),
            PathCommand::LineTo(Point::new(0.8, 0.2)),
            PathCommand::LineTo(Point::new(0.8, 0.8)),
            PathCommand::Close,
        ]);
        match GeometryBuilder::new(&shape(closed, xfrm)).local_geometry() {
            Ok(Geometry::Polygon(rings)) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[0].len(), 4);
                assert_eq!(rings[0][0], rings[0][3]);
            }
            res => panic!("expected polygon, got {:?}", res),
        }

        let lines = path(vec![
            PathCommand::MoveTo(Point::new(0., 0.)),
            PathCommand::LineTo(Point::new(1., 0.)),
            PathCommand::MoveTo(Point::new(0., 1.)),
            PathCommand::LineTo(Point::new(1., 1.)),
        ]);
        assert!(matches!(
            GeometryBuilder::new(&shape(lines, xfrm)).local_geometry(),
            Ok(Geometry::MultiLine(ref lines)) if lines.len() == 2
        ));
    }

    #[test]
    fn mixed_path_drops_lines() {
        let mixed = path(vec![
            PathCommand::MoveTo(Point::new(0., 0.)),
            PathCommand::LineTo(Point::new(1., 0.)),
            PathCommand::LineTo(Point::new(1., 1.)),
            PathCommand::Close,
            PathCommand::MoveTo(Point::new(2., 0.)),
            PathCommand::LineTo(Point::new(3., 0.)),
        ]);
        let xfrm = Xfrm::new(Point::ZERO, Size::new(3., 1.));
        let mixed = shape(mixed, xfrm);
        let builder = GeometryBuilder::new(&mixed);
        assert!(matches!(
            builder.local_geometry(),
            Ok(Geometry::Polygon(ref rings)) if rings.len() == 1
        ));
        assert_eq!(builder.dropped_lines(), 1);

        let lines = shape(path(vec![
            PathCommand::MoveTo(Point::new(0., 0.)),
            PathCommand::LineTo(Point::new(1., 0.)),
        ]), xfrm);
        assert_eq!(GeometryBuilder::new(&lines).dropped_lines(), 0);
    }

    #[test]
    fn single_point_path() {
        let point = path(vec![PathCommand::MoveTo(Point::new(0.5, 0.5))]);
        let xfrm = Xfrm::new(Point::new(10., 10.), Size::new(1., 1.));
        let point = shape(point, xfrm);
        let builder = GeometryBuilder::new(&point);
        assert_eq!(
            builder.build(builder.local_transform()),
            Ok(Geometry::Point(Point::new(10.5, 10.5)))
        );
    }

    #[test]
    fn empty_path() {
        let empty = shape(path(Vec::new()), Xfrm::default());
        assert_eq!(
            GeometryBuilder::new(&empty).local_geometry(),
            Err(ShapeError::EmptyOutline)
        );
    }

    #[test]
    fn arc_follows_ellipse() {
        // Start at the right-most point of an ellipse centred on (2, 1)
        // and sweep a quarter turn clockwise to its bottom.
        let arc = path(vec![
            PathCommand::MoveTo(Point::new(4., 1.)),
            PathCommand::ArcTo { wr: 2., hr: 1., start: 0., swing: 90. },
        ]);
        let xfrm = Xfrm::new(Point::ZERO, Size::new(4., 2.));
        match GeometryBuilder::new(&shape(arc, xfrm)).local_geometry() {
            Ok(Geometry::Line(points)) => {
                assert_eq!(points.len(), ELLIPSE_SEGMENTS / 4 + 1);
                assert_close(points[0], Point::new(4., 1.));
                assert_close(*points.last().unwrap(), Point::new(2., 2.));
                for p in &points {
                    let implicit = ((p.x - 2.) / 2.).powi(2)
                        + (p.y - 1.).powi(2);
                    assert!((implicit - 1.).abs() < 1e-9);
                }
            }
            res => panic!("expected line, got {:?}", res),
        }
    }

    #[test]
    fn path_size_scales_to_extent() {
        let square = ShapeKind::Path(PathGeometry {
            size: Some(Size::new(10., 10.)),
            commands: vec![
                PathCommand::MoveTo(Point::new(0., 0.)),
                PathCommand::LineTo(Point::new(10., 10.)),
            ],
        });
        let shape = shape(
            square, Xfrm::new(Point::new(5., 5.), Size::new(100., 50.))
        );
        let builder = GeometryBuilder::new(&shape);
        assert_eq!(builder.content_size(), Size::new(10., 10.));
        assert_eq!(
            builder.build(builder.local_transform()),
            Ok(Geometry::Line(vec![
                Point::new(5., 5.), Point::new(105., 55.)
            ]))
        );
    }

    #[test]
    fn unsupported_primitive() {
        let chart = shape(
            ShapeKind::Unsupported("chart".into()), Xfrm::default()
        );
        assert_eq!(
            GeometryBuilder::new(&chart).local_geometry(),
            Err(ShapeError::UnsupportedPrimitive("chart".into()))
        );
    }

    #[test]
    fn arc_segments_are_limited() {
        let arc = path(vec![
            PathCommand::MoveTo(Point::new(4., 1.)),
            PathCommand::ArcTo { wr: 2., hr: 1., start: 0., swing: 1e12 },
        ]);
        let xfrm = Xfrm::new(Point::ZERO, Size::new(4., 2.));
        match GeometryBuilder::new(&shape(arc, xfrm)).local_geometry() {
            Ok(Geometry::Line(points)) => {
                assert_eq!(points.len(), MAX_ARC_SEGMENTS + 1);
            }
            res => panic!("expected line, got {:?}", res),
        }
    }
}
