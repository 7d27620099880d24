//! Tile images.
//!
//! Tiles are square cairo image surfaces in ARGB32 format. In this format,
//! each pixel is a native-endian `u32` with alpha in the top byte and
//! colour channels premultiplied by alpha.

use std::fmt;
use std::str::FromStr;
use cairo::{Format, ImageSurface, Operator};
use serde::Deserialize;
use crate::tile::{TileError, TILE_SIZE};


//------------ TileImage -----------------------------------------------------

/// The image of a single tile.
pub struct TileImage {
    surface: ImageSurface,
}

impl TileImage {
    /// Creates a new, fully transparent tile.
    pub fn new() -> Result<Self, TileError> {
        Ok(TileImage {
            surface: ImageSurface::create(
                Format::ARgb32, TILE_SIZE as i32, TILE_SIZE as i32
            )?
        })
    }

    /// Creates a tile from an image the size of a tile.
    ///
    /// The image is converted to ARGB32 if necessary.
    pub fn from_surface(surface: &ImageSurface) -> Result<Self, TileError> {
        if surface.width() != TILE_SIZE as i32
            || surface.height() != TILE_SIZE as i32
        {
            return Err(TileError::InvalidSize {
                width: surface.width(), height: surface.height()
            })
        }
        let mut res = Self::new()?;
        res.paste(surface, 0, 0)?;
        Ok(res)
    }

    /// Decodes a tile from PNG data.
    pub fn from_png(mut data: &[u8]) -> Result<Self, TileError> {
        Self::from_surface(&ImageSurface::create_from_png(&mut data)?)
    }

    /// Encodes the tile as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, TileError> {
        let mut res = Vec::new();
        self.surface.write_to_png(&mut res)?;
        Ok(res)
    }

    pub fn surface(&self) -> &ImageSurface {
        &self.surface
    }

    /// Returns whether all pixels of the tile are fully transparent.
    pub fn is_transparent(&self) -> Result<bool, TileError> {
        Ok(self.visible_pixels()? == 0)
    }

    /// Returns the number of pixels that aren't fully transparent.
    pub fn visible_pixels(&self) -> Result<usize, TileError> {
        let mut res = 0;
        let stride = self.surface.stride() as usize;
        self.surface.with_data(|data| {
            for y in 0..TILE_SIZE {
                for x in 0..TILE_SIZE {
                    if alpha(read_pixel(data, stride, x, y)) != 0 {
                        res += 1
                    }
                }
            }
        })?;
        Ok(res)
    }

    /// Returns the un-premultiplied colour of a pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Result<Rgba, TileError> {
        let mut res = Rgba::TRANSPARENT;
        let stride = self.surface.stride() as usize;
        self.surface.with_data(|data| {
            res = Rgba::from_argb32(read_pixel(data, stride, x, y));
        })?;
        Ok(res)
    }

    /// Turns every pixel into either fully transparent or fully opaque.
    ///
    /// Pixels of the background colour and those that are already fully
    /// transparent become transparent. All others become opaque, keeping
    /// their colour.
    pub fn make_transparent(
        &mut self, background: Color
    ) -> Result<(), TileError> {
        let stride = self.surface.stride() as usize;
        let mut data = self.surface.data()?;
        for y in 0..TILE_SIZE {
            for x in 0..TILE_SIZE {
                let pixel = Rgba::from_argb32(
                    read_pixel(&data, stride, x, y)
                );
                let pixel = if pixel.a == 0 || pixel.color() == background {
                    Rgba::TRANSPARENT
                }
                else {
                    Rgba { a: 255, ..pixel }
                };
                write_pixel(&mut data, stride, x, y, pixel.to_argb32());
            }
        }
        Ok(())
    }

    /// Replaces the pixels at `(x, y)` with those of `source`.
    ///
    /// Parts of `source` outside the tile are cut off.
    pub fn paste(
        &mut self, source: &ImageSurface, x: i32, y: i32
    ) -> Result<(), TileError> {
        let context = cairo::Context::new(&self.surface)?;
        context.set_operator(Operator::Source);
        context.set_source_surface(source, f64::from(x), f64::from(y))?;
        context.rectangle(
            f64::from(x), f64::from(y),
            f64::from(source.width()), f64::from(source.height())
        );
        context.fill()?;
        Ok(())
    }

    /// Pastes a child tile scaled to half size into a quadrant.
    ///
    /// The quadrant is given as column and row, each either 0 or 1. Each
    /// pixel of the result is the average of a two by two block of child
    /// pixels.
    pub fn paste_reduced(
        &mut self, child: &TileImage, quadrant: (u32, u32)
    ) -> Result<(), TileError> {
        let half = TILE_SIZE / 2;
        let mut reduced = Vec::with_capacity((half * half) as usize);
        let child_stride = child.surface.stride() as usize;
        child.surface.with_data(|data| {
            for y in 0..half {
                for x in 0..half {
                    reduced.push(average([
                        read_pixel(data, child_stride, 2 * x, 2 * y),
                        read_pixel(data, child_stride, 2 * x + 1, 2 * y),
                        read_pixel(data, child_stride, 2 * x, 2 * y + 1),
                        read_pixel(data, child_stride, 2 * x + 1, 2 * y + 1),
                    ]))
                }
            }
        })?;

        let (left, top) = (quadrant.0 * half, quadrant.1 * half);
        let stride = self.surface.stride() as usize;
        let mut data = self.surface.data()?;
        for (idx, pixel) in reduced.into_iter().enumerate() {
            let idx = idx as u32;
            write_pixel(
                &mut data, stride, left + idx % half, top + idx / half, pixel
            );
        }
        Ok(())
    }
}

impl fmt::Debug for TileImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TileImage")
            .field("width", &self.surface.width())
            .field("height", &self.surface.height())
            .finish()
    }
}


//------------ Pixel Helpers -------------------------------------------------

fn read_pixel(data: &[u8], stride: usize, x: u32, y: u32) -> u32 {
    let start = y as usize * stride + x as usize * 4;
    u32::from_ne_bytes([
        data[start], data[start + 1], data[start + 2], data[start + 3]
    ])
}

fn write_pixel(data: &mut [u8], stride: usize, x: u32, y: u32, pixel: u32) {
    let start = y as usize * stride + x as usize * 4;
    data[start..start + 4].copy_from_slice(&pixel.to_ne_bytes());
}

fn alpha(pixel: u32) -> u8 {
    (pixel >> 24) as u8
}

/// Averages four premultiplied pixels channel by channel.
fn average(pixels: [u32; 4]) -> u32 {
    let mut res = 0;
    for shift in [0, 8, 16, 24] {
        let sum: u32 = pixels.iter().map(|pixel| (pixel >> shift) & 0xff).sum();
        res |= ((sum + 2) / 4) << shift;
    }
    res
}


//------------ Rgba ----------------------------------------------------------

/// A pixel with straight, i.e., not premultiplied, alpha.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba { r: 0, g: 0, b: 0, a: 0 };

    fn from_argb32(pixel: u32) -> Self {
        let a = alpha(pixel);
        let channel = |shift: u32| -> u8 {
            let value = (pixel >> shift) & 0xff;
            if a == 0 {
                0
            }
            else {
                ((value * 255 + u32::from(a) / 2) / u32::from(a)).min(255) as u8
            }
        };
        Rgba { r: channel(16), g: channel(8), b: channel(0), a }
    }

    fn to_argb32(self) -> u32 {
        let a = u32::from(self.a);
        let channel = |value: u8| (u32::from(value) * a + 127) / 255;
        (a << 24)
            | (channel(self.r) << 16)
            | (channel(self.g) << 8)
            | channel(self.b)
    }

    pub fn color(self) -> Color {
        Color { r: self.r, g: self.g, b: self.b }
    }
}


//------------ Color ---------------------------------------------------------

/// An opaque colour.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(try_from = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Color { r, g, b }
    }

    /// The colour as cairo colour components.
    pub fn to_cairo(self) -> (f64, f64, f64) {
        (
            f64::from(self.r) / 255.,
            f64::from(self.g) / 255.,
            f64::from(self.b) / 255.,
        )
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE
    }
}

impl FromStr for Color {
    type Err = InvalidColor;

    /// Parses a colour from `#rrggbb` or `#rgb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.strip_prefix('#').ok_or_else(|| InvalidColor(s.into()))?;
        let digit = |idx: usize| -> Result<u8, InvalidColor> {
            hex.get(idx..idx + 1).and_then(|d| {
                u8::from_str_radix(d, 16).ok()
            }).ok_or_else(|| InvalidColor(s.into()))
        };
        match hex.len() {
            3 => {
                Ok(Color::new(
                    digit(0)? * 17, digit(1)? * 17, digit(2)? * 17
                ))
            }
            6 => {
                Ok(Color::new(
                    digit(0)? << 4 | digit(1)?,
                    digit(2)? << 4 | digit(3)?,
                    digit(4)? << 4 | digit(5)?,
                ))
            }
            _ => Err(InvalidColor(s.into()))
        }
    }
}

impl TryFrom<String> for Color {
    type Error = InvalidColor;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}


//------------ InvalidColor --------------------------------------------------

#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid colour '{0}', expected '#rrggbb'")]
pub struct InvalidColor(String);


//============ Testing =======================================================
