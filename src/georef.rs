//! Placing the map onto the tile grid.

use kurbo::{Point, Rect, Size};
use crate::tile::{
    lonlat_to_xy, xy_to_lonlat, Extent, TileError, TileId, TileRange,
    MAX_ZOOM, TILE_SIZE,
};
use crate::transform::Transform;

/// How far the extent is pulled in before looking for covering tiles.
///
/// This is in degrees. It makes sure an edge of the extent that lies exactly
/// on a tile boundary doesn't pull in the tile on the other side.
const EPSILON: f64 = 1e-9;


//------------ TileGeoreferencer ---------------------------------------------

/// The relation between a map's geographic extent and the tile grid.
///
/// At the maximum zoom level, the tiles covering the extent are laid edge to
/// edge into one canvas with its origin at the top-left corner of the first
/// tile. The georeferencer knows where the extent ends up on this canvas.
#[derive(Clone, Debug)]
pub struct TileGeoreferencer {
    extent: Extent,
    range: TileRange,
    world_to_pixel: Transform,
    image_rect: Rect,
}

impl TileGeoreferencer {
    pub fn new(extent: Extent, max_zoom: u8) -> Result<Self, TileError> {
        if max_zoom > MAX_ZOOM {
            return Err(TileError::InvalidZoom(max_zoom))
        }
        let range = Self::covering(&extent, max_zoom);

        // The covering tiles in mercator metres. The bounds of tiles have
        // the south at y0.
        let first = range.first().xy_bounds();
        let last = range.last().xy_bounds();
        let (left, top) = (first.x0, first.y1);
        let (right, bottom) = (last.x1, last.y0);

        let canvas = Self::canvas_size_of(&range);
        let sx = canvas.width / (right - left);
        let sy = -canvas.height / (top - bottom);
        let world_to_pixel = Transform::new([
            sx, 0., 0., sy, -sx * left, -sy * top
        ]);

        let clamped = extent.clamped();
        let image_rect = Rect::from_points(
            world_to_pixel.apply(
                lonlat_to_xy(Point::new(clamped.west, clamped.north))
            ),
            world_to_pixel.apply(
                lonlat_to_xy(Point::new(clamped.east, clamped.south))
            ),
        );

        Ok(TileGeoreferencer { extent, range, world_to_pixel, image_rect })
    }

    /// Returns the smallest range of tiles at `zoom` covering `extent`.
    pub fn covering(extent: &Extent, zoom: u8) -> TileRange {
        let extent = extent.clamped();
        let first = TileId::containing(
            zoom, extent.west + EPSILON, extent.north - EPSILON
        );
        let last = TileId::containing(
            zoom, extent.east - EPSILON, extent.south + EPSILON
        );
        TileRange::new(zoom, (first.x, first.y), (last.x, last.y))
    }

    fn canvas_size_of(range: &TileRange) -> Size {
        Size::new(
            f64::from(TILE_SIZE) * f64::from(range.width()),
            f64::from(TILE_SIZE) * f64::from(range.height()),
        )
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn max_zoom(&self) -> u8 {
        self.range.zoom()
    }

    /// The tiles covering the extent at the maximum zoom level.
    pub fn range(&self) -> &TileRange {
        &self.range
    }

    /// The transform from mercator metres to canvas pixels.
    pub fn world_to_pixel(&self) -> Transform {
        self.world_to_pixel
    }

    /// The extent in canvas pixels.
    pub fn image_rect(&self) -> Rect {
        self.image_rect
    }

    /// The size of the canvas in pixels.
    pub fn canvas_size(&self) -> Size {
        Self::canvas_size_of(&self.range)
    }

    /// Returns the tile at the given column and row of the canvas.
    pub fn tile_id(&self, column: u32, row: u32) -> TileId {
        let first = self.range.first();
        TileId::new(first.zoom, first.x + column, first.y + row)
    }

    /// Returns the column and row of a covering tile on the canvas.
    pub fn canvas_position(&self, tile: TileId) -> Option<(u32, u32)> {
        if !self.range.contains(tile) {
            return None
        }
        let first = self.range.first();
        Some((tile.x - first.x, tile.y - first.y))
    }

    /// Returns a function projecting flat map space onto longitude/latitude.
    ///
    /// The flat space rectangle `bounds` is stretched over the extent in
    /// mercator metres, with its top-left corner in the north-west.
    pub fn flat_to_lonlat(
        &self, bounds: Rect
    ) -> Result<impl Fn(Point) -> Point, TileError> {
        if bounds.width() == 0. || bounds.height() == 0. {
            return Err(TileError::DegenerateRegion(bounds))
        }
        let world = self.extent.xy_bounds();
        let transform = Transform::rect_to_rect(
            bounds,
            Rect::new(world.x0, world.y1, world.x1, world.y0),
        );
        Ok(move |point| xy_to_lonlat(transform.apply(point)))
    }
}


//============ Testing =======================================================
