//! Web map tiles and their geography.

use std::{fmt, io};
use std::str::FromStr;
use std::f64::consts::PI;
use kurbo::{Point, Rect};
use serde::Deserialize;
use crate::transform::SingularTransform;

/// The width and height of a tile in pixels.
pub const TILE_SIZE: u32 = 256;

/// The maximum zoom level we support.
///
/// This **must** be less than 32 or stuff will break.
pub const MAX_ZOOM: u8 = 24;

/// The radius of the sphere used by spherical mercator.
pub const EARTH_RADIUS: f64 = 6_378_137.;

/// The latitude beyond which spherical mercator stops.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;


//------------ TileId --------------------------------------------------------

/// The identifier of a tile.
///
/// Tile (0, 0) is the top-left tile of the world at every zoom level.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TileId {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        TileId { zoom, x, y }
    }

    /// The upper bound for a coordinate in a zoom level.
    ///
    /// Any coordinate must be less (!) than this value.
    pub fn coord_end(zoom: u8) -> u32 {
        1 << u32::from(zoom)
    }

    fn n(&self) -> f64 {
        f64::from(Self::coord_end(self.zoom))
    }

    /// Returns the tile one level up that contains this tile.
    pub fn parent(&self) -> Option<TileId> {
        let zoom = self.zoom.checked_sub(1)?;
        Some(TileId::new(zoom, self.x / 2, self.y / 2))
    }

    /// Returns the four tiles one level down.
    ///
    /// The order is top-left, top-right, bottom-left, bottom-right.
    pub fn children(&self) -> [TileId; 4] {
        let (zoom, x, y) = (self.zoom + 1, 2 * self.x, 2 * self.y);
        [
            TileId::new(zoom, x, y),
            TileId::new(zoom, x + 1, y),
            TileId::new(zoom, x, y + 1),
            TileId::new(zoom, x + 1, y + 1),
        ]
    }

    fn _lon(n: f64, x: f64) -> f64 {
        x / n * 360.0 - 180.0
    }

    /// The western and eastern longitude of the tile.
    pub fn lon(&self) -> [f64; 2] {
        [
            Self::_lon(self.n(), f64::from(self.x)),
            Self::_lon(self.n(), f64::from(self.x + 1))
        ]
    }

    fn _lat(n: f64, y: f64) -> f64 {
        (PI * (1. - 2. * y / n)).sinh().atan().to_degrees()
    }

    /// The northern and southern latitude of the tile.
    pub fn lat(&self) -> [f64; 2] {
        [
            Self::_lat(self.n(), f64::from(self.y)),
            Self::_lat(self.n(), f64::from(self.y + 1))
        ]
    }

    /// The bounds of the tile in spherical mercator metres.
    ///
    /// The rectangle runs from the south-western to the north-eastern
    /// corner, i.e., `y0` is the southern edge.
    pub fn xy_bounds(&self) -> Rect {
        let size = 2. * PI * EARTH_RADIUS / self.n();
        let west = -PI * EARTH_RADIUS + f64::from(self.x) * size;
        let north = PI * EARTH_RADIUS - f64::from(self.y) * size;
        Rect::new(west, north - size, west + size, north)
    }

    /// Returns the tile at `zoom` containing the given point.
    ///
    /// Points on a boundary belong to the tile to their right or below.
    /// Points outside the world are clamped to the outermost tiles.
    pub fn containing(zoom: u8, lon: f64, lat: f64) -> TileId {
        let (x, y) = fractional_tile(zoom, lon, lat);
        let last = f64::from(Self::coord_end(zoom) - 1);
        TileId::new(
            zoom,
            x.floor().clamp(0., last) as u32,
            y.floor().clamp(0., last) as u32,
        )
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}


//------------ TileRange -----------------------------------------------------

/// A rectangle of tiles at one zoom level.
///
/// Both the minimum and maximum coordinates are included.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TileRange {
    zoom: u8,
    min: (u32, u32),
    max: (u32, u32),
}

impl TileRange {
    /// Creates a new range from its minimum and maximum tile coordinates.
    pub fn new(zoom: u8, min: (u32, u32), max: (u32, u32)) -> Self {
        TileRange {
            zoom,
            min: (min.0.min(max.0), min.1.min(max.1)),
            max: (min.0.max(max.0), min.1.max(max.1)),
        }
    }

    /// Creates a range of a single tile.
    pub fn from_tile(tile: TileId) -> Self {
        Self::new(tile.zoom, (tile.x, tile.y), (tile.x, tile.y))
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    /// The top-left tile.
    pub fn first(&self) -> TileId {
        TileId::new(self.zoom, self.min.0, self.min.1)
    }

    /// The bottom-right tile.
    pub fn last(&self) -> TileId {
        TileId::new(self.zoom, self.max.0, self.max.1)
    }

    /// The number of tile columns.
    pub fn width(&self) -> u32 {
        self.max.0 - self.min.0 + 1
    }

    /// The number of tile rows.
    pub fn height(&self) -> u32 {
        self.max.1 - self.min.1 + 1
    }

    pub fn len(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, tile: TileId) -> bool {
        tile.zoom == self.zoom
            && (self.min.0..=self.max.0).contains(&tile.x)
            && (self.min.1..=self.max.1).contains(&tile.y)
    }

    /// Grows the range so that it contains `tile`.
    ///
    /// The tile must be of the same zoom level.
    pub fn include(&mut self, tile: TileId) {
        debug_assert_eq!(tile.zoom, self.zoom);
        self.min = (self.min.0.min(tile.x), self.min.1.min(tile.y));
        self.max = (self.max.0.max(tile.x), self.max.1.max(tile.y));
    }

    /// Returns the range of the parents of all tiles in this range.
    ///
    /// Returns `None` at zoom level 0.
    pub fn halve(&self) -> Option<TileRange> {
        Some(TileRange {
            zoom: self.zoom.checked_sub(1)?,
            min: (self.min.0 / 2, self.min.1 / 2),
            max: (self.max.0 / 2, self.max.1 / 2),
        })
    }

    /// Returns an iterator over all tiles.
    ///
    /// The tiles are produced column by column.
    pub fn iter(&self) -> impl Iterator<Item = TileId> {
        let TileRange { zoom, min, max } = *self;
        (min.0..=max.0).flat_map(move |x| {
            (min.1..=max.1).map(move |y| TileId::new(zoom, x, y))
        })
    }
}

impl fmt::Display for TileRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f, "{}/{}..={}/{}..={}",
            self.zoom, self.min.0, self.max.0, self.min.1, self.max.1
        )
    }
}


//------------ Extent --------------------------------------------------------

/// A geographic extent in degrees.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(try_from = "[f64; 4]")]
pub struct Extent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Extent {
    /// Creates a new extent, checking that it is sane.
    pub fn new(
        west: f64, south: f64, east: f64, north: f64
    ) -> Result<Self, TileError> {
        let res = Extent { west, south, east, north };
        let finite = [west, south, east, north].iter().all(|v| v.is_finite());
        if !finite
            || west >= east || south >= north
            || west < -180. || east > 180.
            || south < -90. || north > 90.
        {
            return Err(TileError::InvalidExtent(res))
        }
        Ok(res)
    }

    /// The whole world as far as spherical mercator goes.
    pub fn world() -> Self {
        Extent {
            west: -180., south: -MAX_LATITUDE,
            east: 180., north: MAX_LATITUDE,
        }
    }

    /// Returns the extent with latitudes limited to the mercator range.
    pub fn clamped(&self) -> Self {
        Extent {
            west: self.west,
            south: self.south.max(-MAX_LATITUDE),
            east: self.east,
            north: self.north.min(MAX_LATITUDE),
        }
    }

    /// The centre as longitude and latitude.
    pub fn center(&self) -> Point {
        Point::new(
            (self.west + self.east) / 2., (self.south + self.north) / 2.
        )
    }

    /// The extent in spherical mercator metres.
    ///
    /// As with tiles, `y0` is the southern edge.
    pub fn xy_bounds(&self) -> Rect {
        let clamped = self.clamped();
        Rect::from_points(
            lonlat_to_xy(Point::new(clamped.west, clamped.south)),
            lonlat_to_xy(Point::new(clamped.east, clamped.north)),
        )
    }
}

impl TryFrom<[f64; 4]> for Extent {
    type Error = TileError;

    fn try_from([west, south, east, north]: [f64; 4]) -> Result<Self, Self::Error> {
        Self::new(west, south, east, north)
    }
}

impl FromStr for Extent {
    type Err = TileError;

    /// Parses an extent from `west,south,east,north`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values = [0f64; 4];
        let mut parts = s.split(',');
        for value in values.iter_mut() {
            *value = parts.next().and_then(|part| {
                f64::from_str(part.trim()).ok()
            }).ok_or_else(|| TileError::ExtentSyntax(s.into()))?;
        }
        if parts.next().is_some() {
            return Err(TileError::ExtentSyntax(s.into()))
        }
        Self::try_from(values)
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{},{},{},{}", self.west, self.south, self.east, self.north)
    }
}


//------------ Mercator ------------------------------------------------------

/// Converts longitude and latitude in degrees to mercator metres.
pub fn lonlat_to_xy(lonlat: Point) -> Point {
    let lat = lonlat.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    Point::new(
        EARTH_RADIUS * lonlat.x.to_radians(),
        EARTH_RADIUS * (PI / 4. + lat / 2.).tan().ln(),
    )
}

/// Converts mercator metres to longitude and latitude in degrees.
pub fn xy_to_lonlat(xy: Point) -> Point {
    Point::new(
        (xy.x / EARTH_RADIUS).to_degrees(),
        (2. * (xy.y / EARTH_RADIUS).exp().atan() - PI / 2.).to_degrees(),
    )
}

/// Returns the non-integer tile coordinates of a point.
fn fractional_tile(zoom: u8, lon: f64, lat: f64) -> (f64, f64) {
    let n = f64::from(TileId::coord_end(zoom));
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    (
        (lon + 180.) / 360. * n,
        (1. - lat.tan().asinh() / PI) / 2. * n,
    )
}


//------------ TileError -----------------------------------------------------

/// Something went wrong while producing a tile.
#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("invalid extent {0}")]
    InvalidExtent(Extent),

    #[error("invalid extent '{0}', expected 'west,south,east,north'")]
    ExtentSyntax(String),

    #[error("zoom level {0} is too large")]
    InvalidZoom(u8),

    #[error("cannot render degenerate region {0:?}")]
    DegenerateRegion(Rect),

    #[error("image has size {width}x{height}, expected a tile")]
    InvalidSize { width: i32, height: i32 },

    #[error(transparent)]
    SingularTransform(#[from] SingularTransform),

    #[error("cairo: {0}")]
    Cairo(#[from] cairo::Error),

    #[error("cairo: {0}")]
    Borrow(#[from] cairo::BorrowError),

    #[error("png: {0}")]
    Png(#[from] cairo::IoError),

    #[error("failed to read image: {0}")]
    Io(#[from] io::Error),
}


//============ Testing =======================================================
