//! Pages that can be cut into tiles.

use std::fs::File;
use std::path::Path;
use cairo::{Extend, Filter, Format, ImageSurface};
use kurbo::{Rect, Vec2};
use crate::tile::TileError;


//------------ Page ----------------------------------------------------------

/// A page that can render any part of itself.
pub trait Page {
    /// The rectangle of the page in page space.
    fn rect(&self) -> Rect;

    /// Renders the part of `region` that lies on the page.
    ///
    /// The region is given in page space. It is scaled by `scale` per axis
    /// to get pixels. Returns an ARGB32 image.
    fn render_region(
        &self, region: Rect, scale: Vec2
    ) -> Result<ImageSurface, TileError>;
}


//------------ ImagePage -----------------------------------------------------

/// A page backed by an image.
///
/// Page space is the pixel space of the image. Rendering includes the edge
/// pixels on both sides of a region: a region `w` page units wide rendered
/// at scale `s` produces `round(w * s) + 1` pixels. Pixels are sampled from
/// the nearest image pixel. Samples past the edge of the image repeat the
/// edge pixels.
pub struct ImagePage {
    image: ImageSurface,
}

impl ImagePage {
    pub fn new(image: ImageSurface) -> Self {
        ImagePage { image }
    }

    /// Loads the page from a PNG file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TileError> {
        let mut file = File::open(path)?;
        Ok(Self::new(ImageSurface::create_from_png(&mut file)?))
    }

    pub fn image(&self) -> &ImageSurface {
        &self.image
    }
}

impl Page for ImagePage {
    fn rect(&self) -> Rect {
        Rect::new(
            0., 0.,
            f64::from(self.image.width()), f64::from(self.image.height())
        )
    }

    fn render_region(
        &self, region: Rect, scale: Vec2
    ) -> Result<ImageSurface, TileError> {
        let clipped = region.intersect(self.rect());
        if clipped.width() <= 0. || clipped.height() <= 0.
            || !(scale.x > 0. && scale.y > 0.)
        {
            return Err(TileError::DegenerateRegion(region))
        }
        let surface = ImageSurface::create(
            Format::ARgb32,
            (clipped.width() * scale.x).round() as i32 + 1,
            (clipped.height() * scale.y).round() as i32 + 1,
        )?;
        {
            let context = cairo::Context::new(&surface)?;
            context.scale(scale.x, scale.y);
            context.translate(-clipped.x0, -clipped.y0);
            context.set_source_surface(&self.image, 0., 0.)?;
            let source = context.source();
            source.set_filter(Filter::Nearest);
            source.set_extend(Extend::Pad);
            context.paint()?;
        }
        Ok(surface)
    }
}


//============ Testing =======================================================
