//! Affine transformations between coordinate spaces.

use std::ops;
use kurbo::{Affine, Point, Rect, Vec2};


//------------ Transform -----------------------------------------------------

/// An affine transformation of the plane.
///
/// This is a 3x3 matrix over homogeneous coordinates whose last row is
/// always `[0, 0, 1]`. Transforms are values: all operations return new
/// transforms and never modify the receiver.
///
/// Composition follows matrix multiplication: [`compose`][Self::compose]
/// applies its argument _first_.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform(Affine);

impl Transform {
    pub const IDENTITY: Transform = Transform(Affine::IDENTITY);

    /// Creates a transform from the six non-trivial matrix coefficients.
    ///
    /// The coefficients are given in column order, i.e.,
    /// `[a, b, c, d, e, f]` is the matrix
    ///
    /// ```text
    /// | a c e |
    /// | b d f |
    /// | 0 0 1 |
    /// ```
    pub fn new(coeffs: [f64; 6]) -> Self {
        Transform(Affine::new(coeffs))
    }

    pub fn translate(v: impl Into<Vec2>) -> Self {
        Transform(Affine::translate(v))
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Transform(Affine::scale_non_uniform(sx, sy))
    }

    /// Rotation by `angle` radians.
    ///
    /// With the y axis pointing down as it does in drawings and on pixel
    /// canvases, positive angles rotate clockwise.
    pub fn rotate(angle: f64) -> Self {
        Transform(Affine::rotate(angle))
    }

    /// Returns the transform mapping `src` onto `dest`.
    ///
    /// The corners `(x0, y0)` and `(x1, y1)` of `src` end up at the
    /// respective corners of `dest`. A zero extent on an axis of `src`
    /// results in a zero scale on that axis.
    pub fn rect_to_rect(src: Rect, dest: Rect) -> Self {
        let sx = if src.width() != 0. {
            (dest.x1 - dest.x0) / (src.x1 - src.x0)
        }
        else {
            0.
        };
        let sy = if src.height() != 0. {
            (dest.y1 - dest.y0) / (src.y1 - src.y0)
        }
        else {
            0.
        };
        Transform::new([
            sx, 0., 0., sy, dest.x0 - sx * src.x0, dest.y0 - sy * src.y0
        ])
    }

    /// Returns the transform that applies `other` first and then `self`.
    pub fn compose(self, other: Transform) -> Self {
        Transform(self.0 * other.0)
    }

    /// Applies the transform to a point.
    pub fn apply(self, point: Point) -> Point {
        self.0 * point
    }

    /// Applies the transform to both corners of a rectangle.
    ///
    /// The result is normalized, so this is only meaningful for transforms
    /// without rotation.
    pub fn apply_rect(self, rect: Rect) -> Rect {
        Rect::from_points(
            self.apply(Point::new(rect.x0, rect.y0)),
            self.apply(Point::new(rect.x1, rect.y1)),
        )
    }

    pub fn determinant(self) -> f64 {
        self.0.determinant()
    }

    /// Returns the inverse transform.
    ///
    /// Fails if the matrix is singular, which happens for transforms that
    /// collapse an axis, e.g., those built from a zero extent.
    pub fn invert(self) -> Result<Self, SingularTransform> {
        let det = self.determinant();
        if det == 0. || !det.is_finite() {
            return Err(SingularTransform)
        }
        Ok(Transform(self.0.inverse()))
    }

    pub fn coeffs(self) -> [f64; 6] {
        self.0.as_coeffs()
    }

    pub fn into_affine(self) -> Affine {
        self.0
    }
}


//--- Default

impl Default for Transform {
    fn default() -> Self {
        Transform::IDENTITY
    }
}


//--- Mul

impl ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, other: Transform) -> Transform {
        self.compose(other)
    }
}

impl ops::Mul<Point> for Transform {
    type Output = Point;

    fn mul(self, point: Point) -> Point {
        self.apply(point)
    }
}


//------------ SingularTransform ---------------------------------------------

/// An inverse was requested for a transform that has none.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[error("transform is singular and cannot be inverted")]
pub struct SingularTransform;


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(left: Point, right: Point) {
        assert!(
            (left - right).hypot() < EPS,
            "{:?} != {:?}", left, right
        );
    }

    fn random_transform(rng: &mut StdRng) -> Transform {
        Transform::new([
            rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0),
            rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0),
            rng.random_range(-10.0..10.0), rng.random_range(-10.0..10.0),
        ])
    }

    fn random_point(rng: &mut StdRng, limit: f64) -> Point {
        Point::new(
            rng.random_range(-limit..limit), rng.random_range(-limit..limit)
        )
    }

    #[test]
    fn compose_applies_right_operand_first() {
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..100 {
            let a = random_transform(&mut rng);
            let b = random_transform(&mut rng);
            let p = random_point(&mut rng, 10.);
            assert_close(a.compose(b).apply(p), a.apply(b.apply(p)));
        }
    }

    #[test]
    fn compose_is_associative() {
        let mut rng = StdRng::seed_from_u64(4711);
        for _ in 0..100 {
            let a = random_transform(&mut rng);
            let b = random_transform(&mut rng);
            let c = random_transform(&mut rng);
            let p = random_point(&mut rng, 1.);
            let left = a.compose(b).compose(c).apply(p);
            let right = a.compose(b.compose(c)).apply(p);
            assert!(
                (left - right).hypot() < 1e-6 * (1. + left.to_vec2().hypot()),
                "{:?} != {:?}", left, right
            );
        }
    }

    #[test]
    fn invert_round_trips() {
        let t = Transform::translate((3., -4.))
            * Transform::rotate(0.3)
            * Transform::scale(2., 0.5);
        let inv = t.invert().unwrap();
        let p = Point::new(1.25, -7.5);
        assert_close(inv.apply(t.apply(p)), p);
    }

    #[test]
    fn invert_singular() {
        assert_eq!(Transform::scale(0., 1.).invert(), Err(SingularTransform));
        assert_eq!(
            Transform::rect_to_rect(
                Rect::new(0., 0., 0., 10.), Rect::new(0., 0., 5., 5.)
            ).invert(),
            Err(SingularTransform)
        );
    }

    #[test]
    fn rect_to_rect_maps_corners() {
        let src = Rect::new(10., 20., 30., 60.);
        let dest = Rect::new(0., 100., 200., 0.);
        let t = Transform::rect_to_rect(src, dest);
        assert_close(t.apply(Point::new(10., 20.)), Point::new(0., 100.));
        assert_close(t.apply(Point::new(30., 60.)), Point::new(200., 0.));
    }
}
