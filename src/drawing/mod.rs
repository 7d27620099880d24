//! The drawing to make a map from.
//!
//! A drawing is a presentation: a sequence of slides, each with a tree of
//! shapes. Parsing the actual presentation container happens elsewhere; this
//! module defines the shape tree handed to us and reads it from a TOML
//! document.

pub use self::xfrm::Xfrm;

pub mod load;
pub mod units;
pub mod xfrm;

use kurbo::{Point, Size};


//------------ Presentation --------------------------------------------------

/// A presentation with all its slides.
#[derive(Clone, Debug)]
pub struct Presentation {
    /// The size of every slide in EMU.
    pub size: Size,

    /// The slides in order.
    pub slides: Vec<Slide>,
}

impl Presentation {
    /// Returns the slide with the given number.
    ///
    /// Slides are numbered from 1.
    pub fn slide(&self, number: usize) -> Option<&Slide> {
        number.checked_sub(1).and_then(|idx| self.slides.get(idx))
    }
}


//------------ Slide ---------------------------------------------------------

#[derive(Clone, Debug, Default)]
pub struct Slide {
    /// The identifier of the map layer this slide becomes.
    pub layer_id: Option<String>,

    /// A human readable description of the layer.
    pub description: Option<String>,

    /// The top-level shapes in z-order.
    pub shapes: Vec<Shape>,
}


//------------ Shape ---------------------------------------------------------

/// A shape of a slide.
#[derive(Clone, Debug)]
pub struct Shape {
    /// The identifier of the shape, unique within its slide.
    pub id: u32,

    /// The name of the shape.
    ///
    /// Semantic annotations are attached to a shape via its name.
    pub name: String,

    /// The placement of the shape within its parent.
    pub xfrm: Xfrm,

    /// What the shape is.
    pub kind: ShapeKind,
}

impl Shape {
    pub fn is_group(&self) -> bool {
        matches!(self.kind, ShapeKind::Group(_))
    }

    /// Returns the child shapes of a group or an empty slice.
    pub fn children(&self) -> &[Shape] {
        match self.kind {
            ShapeKind::Group(ref children) => children,
            _ => &[]
        }
    }
}


//------------ ShapeKind -----------------------------------------------------

#[derive(Clone, Debug)]
pub enum ShapeKind {
    /// A group of shapes with its own child coordinate system.
    Group(Vec<Shape>),

    /// A custom outline.
    Path(PathGeometry),

    /// A rectangle filling the shape's extent.
    Rect,

    /// An ellipse inscribed into the shape's extent.
    Ellipse,

    /// A straight connector from the top-left to the bottom-right corner.
    ///
    /// Flipping the shape selects the other diagonals.
    Connector,

    /// A text box. These carry no geometry for the map.
    TextBox,

    /// A picture. These carry no geometry for the map.
    Picture,

    /// Something we don't know how to deal with.
    Unsupported(String),
}

impl ShapeKind {
    pub fn name(&self) -> &str {
        match *self {
            ShapeKind::Group(_) => "group",
            ShapeKind::Path(_) => "path",
            ShapeKind::Rect => "rect",
            ShapeKind::Ellipse => "ellipse",
            ShapeKind::Connector => "connector",
            ShapeKind::TextBox => "text-box",
            ShapeKind::Picture => "picture",
            ShapeKind::Unsupported(ref name) => name,
        }
    }
}


//------------ PathGeometry --------------------------------------------------

/// A custom outline in a shape's local path space.
#[derive(Clone, Debug, Default)]
pub struct PathGeometry {
    /// The size of the path space.
    ///
    /// If missing, path space is the shape's own extent.
    pub size: Option<Size>,

    /// The drawing commands.
    pub commands: Vec<PathCommand>,
}


//------------ PathCommand ---------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCommand {
    /// Starts a new sub-path at the given point.
    MoveTo(Point),

    /// Draws a straight line to the given point.
    LineTo(Point),

    /// Draws an elliptical arc starting at the current point.
    ///
    /// The current point lies on the ellipse with semi-axes `wr` and `hr`
    /// at the angle `start`. The arc sweeps over `swing`. Angles are in
    /// degrees, measured from the ellipse's centre, clockwise.
    ArcTo { wr: f64, hr: f64, start: f64, swing: f64 },

    /// Closes the current sub-path.
    Close,
}
