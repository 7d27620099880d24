//! Cutting a page into tiles.

use kurbo::{Point, Rect, Vec2};
use crate::image::{Color, TileImage};
use crate::page::Page;
use crate::tile::{TileError, TILE_SIZE};
use crate::transform::Transform;


//------------ PageTiler -----------------------------------------------------

/// Produces the tiles of a page placed on a tile canvas.
///
/// The canvas is the pixel space of the covering tiles at the maximum zoom
/// level laid edge to edge. The page is stretched over the image rectangle
/// of the canvas.
pub struct PageTiler<'a, P: ?Sized> {
    page: &'a P,
    page_rect: Rect,
    canvas_to_page: Transform,
    background: Color,
}

impl<'a, P: Page + ?Sized> PageTiler<'a, P> {
    pub fn new(
        page: &'a P, image_rect: Rect, background: Color
    ) -> Result<Self, TileError> {
        let page_rect = page.rect();
        let canvas_to_page = Transform::rect_to_rect(
            page_rect, image_rect
        ).invert()?;
        Ok(PageTiler { page, page_rect, canvas_to_page, background })
    }

    /// Returns the region of the page covered by a tile of the canvas.
    pub fn tile_region(&self, column: u32, row: u32) -> Rect {
        let size = f64::from(TILE_SIZE);
        let (x, y) = (f64::from(column), f64::from(row));
        let top_left = self.canvas_to_page.apply(
            Point::new(x * size, y * size)
        );
        let bottom_right = self.canvas_to_page.apply(
            Point::new((x + 1.) * size, (y + 1.) * size)
        );
        Rect::new(top_left.x, top_left.y, bottom_right.x, bottom_right.y)
    }

    /// Produces the tile at the given column and row of the canvas.
    ///
    /// The result has background pixels fully transparent and all other
    /// pixels fully opaque. Tiles beyond the page are fully transparent.
    pub fn tile(&self, column: u32, row: u32) -> Result<TileImage, TileError> {
        let region = self.tile_region(column, row);
        if !(region.width() > 0. && region.height() > 0.) {
            return Err(TileError::DegenerateRegion(region))
        }
        let mut tile = TileImage::new()?;
        let on_page = region.intersect(self.page_rect);
        if on_page.width() <= 0. || on_page.height() <= 0. {
            return Ok(tile)
        }

        // The page includes the far edge pixel, so we render to one pixel
        // less than a tile.
        let size = f64::from(TILE_SIZE);
        let scale = Vec2::new(
            (size - 1.) / region.width(), (size - 1.) / region.height()
        );
        let image = self.page.render_region(region, scale)?;
        let x = pad_offset(
            image.width(), region.x0, region.x1,
            (self.page_rect.x0, self.page_rect.x1), scale.x
        );
        let y = pad_offset(
            image.height(), region.y0, region.y1,
            (self.page_rect.y0, self.page_rect.y1), scale.y
        );
        tile.paste(&image, x, y)?;
        tile.make_transparent(self.background)?;
        Ok(tile)
    }
}


//------------ pad_offset ----------------------------------------------------

/// Returns where a rendered image goes into its tile along one axis.
///
/// A rendered image is smaller than a tile only if the region extends past
/// the page. If it extends past the low edge only, the image goes to the
/// high end of the tile. If it extends past both edges, the image goes to
/// where the page's low edge falls within the tile. Otherwise it stays at
/// the low end.
fn pad_offset(
    dimension: i32, lower: f64, upper: f64, bounds: (f64, f64), scale: f64
) -> i32 {
    let max = TILE_SIZE as i32;
    if dimension >= max || lower >= bounds.0 {
        return 0
    }
    if upper < bounds.1 {
        max - dimension
    }
    else {
        (0.5 - (lower - bounds.0) * scale).floor() as i32
    }
}


//============ Testing =======================================================
