//! Reading drawings from TOML documents.
//!
//! The document mirrors the structure of a presentation:
//!
//! ```toml
//! size = [12192000, 6858000]
//!
//! [[slides]]
//! layer-id = "body"
//!
//! [[slides.shapes]]
//! id = 2
//! name = ".organ(heart)"
//! type = "path"
//! xfrm = { offset = [100000, 100000], extent = [400000, 400000] }
//! commands = [
//!     { move-to = [0, 0] },
//!     { line-to = [400000, 0] },
//!     { arc-to = { wr = 200000, hr = 200000, start = 270, swing = 180 } },
//!     "close",
//! ]
//! ```

use std::{fs, io};
use std::path::{Path, PathBuf};
use kurbo::{Point, Size};
use serde::Deserialize;
use super::{
    PathCommand, PathGeometry, Presentation, Shape, ShapeKind, Slide, Xfrm,
};


//------------ Presentation --------------------------------------------------

impl Presentation {
    /// Loads a presentation from the TOML document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|err| {
            DocumentError::Read { path: path.into(), err }
        })?;
        Self::from_toml(&data)
    }

    /// Parses a presentation from a TOML document.
    pub fn from_toml(data: &str) -> Result<Self, DocumentError> {
        let source: DocumentSource = toml::from_str(data)?;
        source.into_presentation()
    }
}


//------------ DocumentSource ------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DocumentSource {
    size: [f64; 2],

    #[serde(default)]
    slides: Vec<SlideSource>,
}

impl DocumentSource {
    fn into_presentation(self) -> Result<Presentation, DocumentError> {
        let [width, height] = self.size;
        if !(width > 0. && height > 0.) {
            return Err(DocumentError::InvalidSize)
        }
        Ok(Presentation {
            size: Size::new(width, height),
            slides: self.slides.into_iter().map(
                SlideSource::into_slide
            ).collect::<Result<_, _>>()?,
        })
    }
}


//------------ SlideSource ---------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SlideSource {
    layer_id: Option<String>,
    description: Option<String>,

    #[serde(default)]
    shapes: Vec<ShapeSource>,
}

impl SlideSource {
    fn into_slide(self) -> Result<Slide, DocumentError> {
        Ok(Slide {
            layer_id: self.layer_id,
            description: self.description,
            shapes: self.shapes.into_iter().map(
                ShapeSource::into_shape
            ).collect::<Result<_, _>>()?,
        })
    }
}


//------------ ShapeSource ---------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ShapeSource {
    id: u32,

    #[serde(default)]
    name: String,

    #[serde(rename = "type")]
    kind: String,

    #[serde(default)]
    xfrm: XfrmSource,

    /// The children of a group.
    #[serde(default)]
    shapes: Vec<ShapeSource>,

    /// The size of a path's coordinate space.
    size: Option<[f64; 2]>,

    #[serde(default)]
    commands: Vec<CommandSource>,
}

impl ShapeSource {
    fn into_shape(self) -> Result<Shape, DocumentError> {
        let id = self.id;
        let xfrm = self.xfrm.into_xfrm().map_err(|reason| {
            DocumentError::InvalidShape { id, reason }
        })?;
        if self.kind != "group" && !self.shapes.is_empty() {
            return Err(DocumentError::InvalidShape {
                id, reason: "only groups can have child shapes"
            })
        }
        let kind = match self.kind.as_str() {
            "group" => {
                ShapeKind::Group(
                    self.shapes.into_iter().map(
                        ShapeSource::into_shape
                    ).collect::<Result<_, _>>()?
                )
            }
            "path" => {
                ShapeKind::Path(PathGeometry {
                    size: self.size.map(|[w, h]| Size::new(w, h)),
                    commands: self.commands.into_iter().map(
                        CommandSource::into_command
                    ).collect(),
                })
            }
            "rect" => ShapeKind::Rect,
            "ellipse" => ShapeKind::Ellipse,
            "connector" => ShapeKind::Connector,
            "text-box" => ShapeKind::TextBox,
            "picture" => ShapeKind::Picture,
            _ => ShapeKind::Unsupported(self.kind),
        };
        Ok(Shape { id, name: self.name, xfrm, kind })
    }
}


//------------ XfrmSource ----------------------------------------------------

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct XfrmSource {
    offset: [f64; 2],
    extent: [f64; 2],
    rotation: f64,
    flip_h: bool,
    flip_v: bool,
    child_offset: Option<[f64; 2]>,
    child_extent: Option<[f64; 2]>,
}

impl XfrmSource {
    fn into_xfrm(self) -> Result<Xfrm, &'static str> {
        if self.extent[0] < 0. || self.extent[1] < 0. {
            return Err("negative extent")
        }
        if let Some([w, h]) = self.child_extent {
            if w < 0. || h < 0. {
                return Err("negative child extent")
            }
        }
        Ok(Xfrm {
            offset: Point::new(self.offset[0], self.offset[1]),
            extent: Size::new(self.extent[0], self.extent[1]),
            rotation: self.rotation,
            flip_h: self.flip_h,
            flip_v: self.flip_v,
            child_offset: self.child_offset.map(|[x, y]| Point::new(x, y)),
            child_extent: self.child_extent.map(|[w, h]| Size::new(w, h)),
        })
    }
}


//------------ CommandSource -------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
enum CommandSource {
    MoveTo([f64; 2]),
    LineTo([f64; 2]),
    ArcTo { wr: f64, hr: f64, start: f64, swing: f64 },
    Close,
}

impl CommandSource {
    fn into_command(self) -> PathCommand {
        match self {
            CommandSource::MoveTo([x, y]) => {
                PathCommand::MoveTo(Point::new(x, y))
            }
            CommandSource::LineTo([x, y]) => {
                PathCommand::LineTo(Point::new(x, y))
            }
            CommandSource::ArcTo { wr, hr, start, swing } => {
                PathCommand::ArcTo { wr, hr, start, swing }
            }
            CommandSource::Close => PathCommand::Close,
        }
    }
}


//------------ DocumentError -------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("failed to read drawing {}: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("failed to parse drawing: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("slide size must be positive")]
    InvalidSize,

    #[error("shape {id}: {reason}")]
    InvalidShape { id: u32, reason: &'static str },

    #[error("no slide {0}")]
    MissingSlide(usize),

    #[error("duplicate layer id '{id}' in slide {slide}")]
    DuplicateLayer { id: String, slide: usize },
}


//============ Testing =======================================================
