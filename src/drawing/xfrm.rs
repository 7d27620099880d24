//! Placing shapes into their parent's coordinate space.
//!
//! Every shape declares where it sits in its parent: an offset and extent,
//! a rotation, and flips. Group shapes additionally declare the coordinate
//! system their children use. The transform built here follows the rules
//! of ECMA-376 Part 1, section L.4.7.6: first map child space onto the
//! placement rectangle, then rotate and flip about the placement's centre.

use kurbo::{Point, Size, Vec2};
use crate::transform::Transform;


//------------ Xfrm ----------------------------------------------------------

/// The placement of a shape.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Xfrm {
    /// The top-left corner of the shape in its parent's space.
    pub offset: Point,

    /// The size of the shape in its parent's space.
    pub extent: Size,

    /// Clockwise rotation in degrees.
    pub rotation: f64,

    /// Is the shape flipped horizontally?
    pub flip_h: bool,

    /// Is the shape flipped vertically?
    pub flip_v: bool,

    /// The origin of the child coordinate space of a group.
    pub child_offset: Option<Point>,

    /// The size of the child coordinate space of a group.
    pub child_extent: Option<Size>,
}

impl Xfrm {
    /// Creates an unrotated, unflipped placement.
    pub fn new(offset: Point, extent: Size) -> Self {
        Xfrm { offset, extent, ..Default::default() }
    }

    /// Adds a child coordinate space.
    pub fn with_child_space(mut self, offset: Point, extent: Size) -> Self {
        self.child_offset = Some(offset);
        self.child_extent = Some(extent);
        self
    }

    pub fn with_rotation(mut self, degrees: f64) -> Self {
        self.rotation = degrees;
        self
    }

    pub fn with_flip(mut self, flip_h: bool, flip_v: bool) -> Self {
        self.flip_h = flip_h;
        self.flip_v = flip_v;
        self
    }

    /// The centre of the shape in its parent's space.
    pub fn center(&self) -> Point {
        self.offset + Vec2::new(self.extent.width, self.extent.height) / 2.
    }

    /// Returns the transform from the shape's local space to its parent's.
    ///
    /// The local space is the declared child space for groups. For other
    /// shapes, it starts at the origin and has the size `bbox` which the
    /// caller derives from the shape's content.
    pub fn transform(&self, bbox: Size) -> Transform {
        self.rotate_flip().compose(self.scale_translate(bbox))
    }

    /// Returns the transform mapping local space onto the placement.
    ///
    /// An axis with a zero local extent keeps its scale.
    pub fn scale_translate(&self, bbox: Size) -> Transform {
        let origin = self.child_offset.unwrap_or(Point::ZERO);
        let extent = self.child_extent.unwrap_or(bbox);
        let sx = if extent.width != 0. {
            self.extent.width / extent.width
        }
        else {
            1.
        };
        let sy = if extent.height != 0. {
            self.extent.height / extent.height
        }
        else {
            1.
        };
        Transform::new([
            sx, 0., 0., sy,
            self.offset.x - sx * origin.x,
            self.offset.y - sy * origin.y,
        ])
    }

    /// Returns the rotation and flip about the placement's centre.
    ///
    /// The flip is applied before the rotation.
    pub fn rotate_flip(&self) -> Transform {
        let center = self.center().to_vec2();
        Transform::translate(center)
            .compose(Transform::rotate(self.rotation.to_radians()))
            .compose(Transform::scale(
                if self.flip_h { -1. } else { 1. },
                if self.flip_v { -1. } else { 1. },
            ))
            .compose(Transform::translate(-center))
    }
}


//------------ TransformStack ------------------------------------------------

/// The accumulated transforms along a path through the shape tree.
///
/// The bottom of the stack is the transform of the top-level space into the
/// flat map space. Each pushed entry is the product of the entry below it
/// and a shape's own transform, so the top is always the complete transform
/// from the innermost shape's local space to flat space.
#[derive(Clone, Debug)]
pub struct TransformStack {
    stack: Vec<Transform>,
}

impl TransformStack {
    pub fn new(root: Transform) -> Self {
        TransformStack { stack: vec![root] }
    }

    /// Returns the transform from the current local space to flat space.
    pub fn current(&self) -> Transform {
        self.stack.last().copied().unwrap_or_default()
    }

    /// Returns the flat space transform for a shape's local space.
    pub fn resolve(&self, local: Transform) -> Transform {
        self.current().compose(local)
    }

    /// Enters the local space of a shape.
    pub fn push(&mut self, local: Transform) {
        let top = self.resolve(local);
        self.stack.push(top)
    }

    /// Leaves the most recently entered local space.
    ///
    /// The root is never popped.
    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// The number of entered spaces.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    fn assert_close(left: Point, right: Point) {
        assert!(
            (left - right).hypot() < 1e-9,
            "{:?} != {:?}", left, right
        );
    }

    fn signed_area(points: &[Point]) -> f64 {
        points.iter().zip(points.iter().cycle().skip(1)).map(|(a, b)| {
            a.x * b.y - b.x * a.y
        }).sum::<f64>() / 2.
    }

    fn centroid(points: &[Point]) -> Point {
        let sum = points.iter().fold(Vec2::ZERO, |sum, p| sum + p.to_vec2());
        (sum / points.len() as f64).to_point()
    }

    #[test]
    fn plain_placement_translates() {
        let xfrm = Xfrm::new(Point::new(100., 200.), Size::new(50., 20.));
        let t = xfrm.transform(Size::new(50., 20.));
        assert_close(t.apply(Point::new(0., 0.)), Point::new(100., 200.));
        assert_close(t.apply(Point::new(50., 20.)), Point::new(150., 220.));
    }

    #[test]
    fn bbox_scales_to_extent() {
        let xfrm = Xfrm::new(Point::new(10., 10.), Size::new(200., 100.));
        let t = xfrm.transform(Size::new(20., 20.));
        assert_close(t.apply(Point::new(20., 20.)), Point::new(210., 110.));
    }

    #[test]
    fn child_space_overrides_bbox() {
        let xfrm = Xfrm::new(Point::new(1000., 1000.), Size::new(200., 200.))
            .with_child_space(Point::new(500., 500.), Size::new(100., 100.));
        let t = xfrm.transform(Size::new(1., 1.));
        assert_close(t.apply(Point::new(500., 500.)), Point::new(1000., 1000.));
        assert_close(t.apply(Point::new(550., 550.)), Point::new(1100., 1100.));
    }

    #[test]
    fn zero_extent_keeps_scale() {
        let xfrm = Xfrm::new(Point::new(10., 20.), Size::new(0., 40.));
        let t = xfrm.scale_translate(Size::new(0., 20.));
        let [sx, _, _, sy, _, _] = t.coeffs();
        assert_eq!(sx, 1.);
        assert_eq!(sy, 2.);

        let t = xfrm.transform(Size::ZERO);
        assert!(t.coeffs().iter().all(|c| c.is_finite()));
        assert_close(t.apply(Point::new(0., 0.)), Point::new(10., 20.));
    }

    #[test]
    fn rotation_is_about_center() {
        let xfrm = Xfrm::new(Point::new(100., 100.), Size::new(40., 20.))
            .with_rotation(180.);
        let t = xfrm.transform(Size::new(40., 20.));
        let outline = [
            Point::new(0., 0.), Point::new(40., 0.),
            Point::new(40., 20.), Point::new(0., 20.),
        ];
        let unrotated: Vec<_> = outline.iter().map(|p| {
            *p + Vec2::new(100., 100.)
        }).collect();
        let rotated: Vec<_> = outline.iter().map(|p| t.apply(*p)).collect();
        assert_close(centroid(&rotated), centroid(&unrotated));
        assert_close(centroid(&rotated), xfrm.center());
        let c = xfrm.center();
        for (r, u) in rotated.iter().zip(unrotated.iter()) {
            assert_close(*r, Point::new(2. * c.x - u.x, 2. * c.y - u.y));
        }
    }

    #[test]
    fn quarter_turn_is_clockwise() {
        let xfrm = Xfrm::new(Point::new(0., 0.), Size::new(20., 20.))
            .with_rotation(90.);
        let t = xfrm.transform(Size::new(20., 20.));
        // With y down, the top-left corner ends up top-right.
        assert_close(t.apply(Point::new(0., 0.)), Point::new(20., 0.));
    }

    #[test]
    fn flip_reverses_orientation() {
        let outline = [
            Point::new(0., 0.), Point::new(40., 0.),
            Point::new(40., 20.), Point::new(0., 20.),
        ];
        let xfrm = Xfrm::new(Point::new(5., 5.), Size::new(40., 20.));
        for (flip_h, flip_v) in [(true, false), (false, true)] {
            let t = xfrm.with_flip(flip_h, flip_v)
                .transform(Size::new(40., 20.));
            let flipped: Vec<_> = outline.iter().map(|p| t.apply(*p)).collect();
            assert!(signed_area(&flipped) * signed_area(&outline) < 0.);
            assert_close(centroid(&flipped), xfrm.center());
        }
        let t = xfrm.with_flip(true, false).transform(Size::new(40., 20.));
        assert_close(t.apply(Point::new(0., 0.)), Point::new(45., 5.));
    }

    #[test]
    fn flip_before_rotation() {
        let xfrm = Xfrm::new(Point::ZERO, Size::new(20., 20.))
            .with_rotation(90.)
            .with_flip(true, false);
        let t = xfrm.transform(Size::new(20., 20.));
        // Flip sends the top-left corner to the top-right, the quarter
        // turn then to the bottom-right.
        assert_close(t.apply(Point::new(0., 0.)), Point::new(20., 20.));
    }

    #[test]
    fn stack_composes_ancestors() {
        let group = Xfrm::new(Point::new(1000., 0.), Size::new(200., 200.))
            .with_child_space(Point::ZERO, Size::new(100., 100.));
        let shape = Xfrm::new(Point::new(10., 10.), Size::new(10., 10.));

        let mut stack = TransformStack::new(Transform::scale(0.5, 0.5));
        stack.push(group.transform(Size::ZERO));
        assert_eq!(stack.depth(), 1);
        let t = stack.resolve(shape.transform(Size::new(10., 10.)));
        // (0,0) -> (10,10) in group -> (1020,20) on slide -> halved.
        assert_close(t.apply(Point::ZERO), Point::new(510., 10.));

        stack.pop();
        stack.pop();
        assert_eq!(stack.depth(), 0);
        assert_close(
            stack.current().apply(Point::new(2., 2.)), Point::new(1., 1.)
        );
    }
}
