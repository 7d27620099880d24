//! Building the tile pyramid of a layer.
//!
//! The pyramid starts at the maximum zoom level where tiles are cut from the
//! page. Every lower level is then composed from the level above it: each
//! tile is made from its up to four children shrunk to half their size.
//! Fully transparent tiles are never stored, so a tile exists only if some
//! of its descendants at the maximum zoom level have visible pixels.

use std::fmt;
use std::collections::BTreeMap;
use smallvec::SmallVec;
use crate::georef::TileGeoreferencer;
use crate::image::{Color, TileImage};
use crate::page::Page;
use crate::store::{Metadata, TileStore, TileStoreError};
use crate::tile::{TileError, TileId, TileRange};
use crate::tiler::PageTiler;

/// How often a stored tile is reported.
const REPORT_EVERY: usize = 100;

/// The quadrants of the four children of a tile in order.
const QUADRANTS: [(u32, u32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];


//------------ PyramidBuilder ------------------------------------------------

/// Builds the tile pyramid for one layer.
pub struct PyramidBuilder<'a> {
    georef: &'a TileGeoreferencer,
    name: String,
    background: Color,
}

impl<'a> PyramidBuilder<'a> {
    pub fn new(georef: &'a TileGeoreferencer, name: impl Into<String>) -> Self {
        PyramidBuilder {
            georef,
            name: name.into(),
            background: Color::WHITE,
        }
    }

    /// Sets the colour that becomes transparent.
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    /// Builds the pyramid for `page`, storing tiles in `store`.
    ///
    /// If this fails, the store contains the tiles created so far. These are
    /// correct but the pyramid is incomplete.
    pub fn build<P, S>(
        &self, page: &P, store: &mut S
    ) -> Result<PyramidReport, BuildError>
    where P: Page + ?Sized, S: TileStore + ?Sized {
        let mut report = PyramidReport::new(self.name.clone());
        let mut range = self.build_base(page, store, &mut report)?;
        while let Some(current) = range {
            range = match current.halve() {
                Some(next) => self.build_level(next, store, &mut report)?,
                None => break,
            };
        }
        store.save_metadata(&self.metadata(&report))?;
        Ok(report)
    }

    /// Cuts the tiles of the maximum zoom level from the page.
    ///
    /// Returns the range of tiles actually stored.
    fn build_base<P, S>(
        &self, page: &P, store: &mut S, report: &mut PyramidReport,
    ) -> Result<Option<TileRange>, BuildError>
    where P: Page + ?Sized, S: TileStore + ?Sized {
        let tiler = PageTiler::new(
            page, self.georef.image_rect(), self.background
        )?;
        let covering = self.georef.range();
        let first = covering.first();
        tracing::info!(
            "tiling zoom level {} for {}", covering.zoom(), self.name
        );
        let mut produced = None;
        for tile in covering.iter() {
            let image = tiler.tile(tile.x - first.x, tile.y - first.y)?;
            if image.is_transparent()? {
                continue
            }
            self.store_tile(tile, &image, store, report, &mut produced)?;
        }
        tracing::info!("  {} tiles", report.tiles_at(covering.zoom()));
        Ok(produced)
    }

    /// Composes the tiles of one level from the level above.
    ///
    /// Returns the range of tiles actually stored.
    fn build_level<S: TileStore + ?Sized>(
        &self, range: TileRange, store: &mut S, report: &mut PyramidReport,
    ) -> Result<Option<TileRange>, BuildError> {
        tracing::info!("tiling zoom level {} for {}", range.zoom(), self.name);
        let mut produced = None;
        for tile in range.iter() {
            let mut children = SmallVec::<[_; 4]>::new();
            for (child, quadrant) in tile.children().into_iter().zip(QUADRANTS) {
                if let Some(image) = store.get_tile(child)? {
                    children.push((image, quadrant))
                }
            }
            if children.is_empty() {
                continue
            }
            let mut image = TileImage::new()?;
            for (child, quadrant) in &children {
                image.paste_reduced(child, *quadrant)?;
            }
            if image.is_transparent()? {
                continue
            }
            self.store_tile(tile, &image, store, report, &mut produced)?;
        }
        tracing::info!("  {} tiles", report.tiles_at(range.zoom()));
        Ok(produced)
    }

    fn store_tile<S: TileStore + ?Sized>(
        &self,
        tile: TileId,
        image: &TileImage,
        store: &mut S,
        report: &mut PyramidReport,
        produced: &mut Option<TileRange>,
    ) -> Result<(), BuildError> {
        let count = report.tiles_at(tile.zoom);
        if count % REPORT_EVERY == 0 {
            tracing::debug!("  tile number {} at {}", count, tile);
        }
        store.save_tile(tile, image)?;
        report.add(tile);
        match *produced {
            Some(ref mut range) => range.include(tile),
            None => *produced = Some(TileRange::from_tile(tile)),
        }
        Ok(())
    }

    /// Returns the metadata for a finished pyramid.
    pub fn metadata(&self, report: &PyramidReport) -> Metadata {
        let extent = self.georef.extent();
        let center = extent.center();
        let max_zoom = self.georef.max_zoom();
        let min_zoom = report.min_zoom().unwrap_or(max_zoom);
        let mut res = Metadata::new();
        res.insert("name".into(), self.name.clone());
        res.insert("format".into(), "png".into());
        res.insert("minzoom".into(), min_zoom.to_string());
        res.insert("maxzoom".into(), max_zoom.to_string());
        res.insert("bounds".into(), extent.to_string());
        res.insert("center".into(), format!("{},{}", center.x, center.y));
        res
    }
}


//------------ PyramidReport -------------------------------------------------

/// What was stored while building a pyramid.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PyramidReport {
    name: String,
    levels: BTreeMap<u8, usize>,
}

impl PyramidReport {
    fn new(name: String) -> Self {
        PyramidReport { name, levels: BTreeMap::new() }
    }

    fn add(&mut self, tile: TileId) {
        *self.levels.entry(tile.zoom).or_default() += 1
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of tiles stored at a zoom level.
    pub fn tiles_at(&self, zoom: u8) -> usize {
        self.levels.get(&zoom).copied().unwrap_or(0)
    }

    /// The total number of stored tiles.
    pub fn total(&self) -> usize {
        self.levels.values().sum()
    }

    /// The lowest zoom level with a stored tile.
    pub fn min_zoom(&self) -> Option<u8> {
        self.levels.keys().next().copied()
    }

    /// The highest zoom level with a stored tile.
    pub fn max_zoom(&self) -> Option<u8> {
        self.levels.keys().next_back().copied()
    }
}

impl fmt::Display for PyramidReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} tiles", self.name, self.total())?;
        for (zoom, count) in self.levels.iter().rev() {
            write!(f, ", z{}: {}", zoom, count)?;
        }
        Ok(())
    }
}


//------------ BuildError ----------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Tile(#[from] TileError),

    #[error(transparent)]
    Store(#[from] TileStoreError),
}


//============ Testing =======================================================

#[cfg(test)]
mod test {
    use std::{fs, io};
    use std::collections::HashSet;
    use cairo::ImageSurface;
    use crate::image::Rgba;
    use crate::image::test::{filled, RED, WHITE};
    use crate::page::ImagePage;
    use crate::store::{DirStore, MemoryStore};
    use crate::store::test::temp_dir;
    use crate::tile::Extent;
    use super::*;

    /// A white page with red squares at the given rectangles.
    fn page(
        width: i32, height: i32, squares: &[(f64, f64, f64, f64)]
    ) -> ImagePage {
        let image: ImageSurface = filled(width, height, WHITE);
        {
            let context = cairo::Context::new(&image).unwrap();
            context.set_source_rgb(1., 0., 0.);
            for &(x, y, w, h) in squares {
                context.rectangle(x, y, w, h);
            }
            context.fill().unwrap();
        }
        ImagePage::new(image)
    }

    fn build(page: &ImagePage, max_zoom: u8) -> (MemoryStore, PyramidReport) {
        let georef = TileGeoreferencer::new(Extent::world(), max_zoom).unwrap();
        let mut store = MemoryStore::new();
        let report = PyramidBuilder::new(
            &georef, "test"
        ).build(page, &mut store).unwrap();
        (store, report)
    }

    #[test]
    fn single_corner_tile() {
        let page = page(1024, 1024, &[(0., 0., 256., 256.)]);
        let (store, report) = build(&page, 2);

        let ids: Vec<_> = store.tile_ids().collect();
        assert_eq!(ids, [
            TileId::new(0, 0, 0), TileId::new(1, 0, 0), TileId::new(2, 0, 0)
        ]);
        assert_eq!(report.total(), 3);
        assert_eq!(report.tiles_at(2), 1);
        assert_eq!(report.min_zoom(), Some(0));
        assert_eq!(report.max_zoom(), Some(2));

        let top = store.get_tile(TileId::new(0, 0, 0)).unwrap().unwrap();
        assert_eq!(top.visible_pixels().unwrap(), 64 * 64);
        assert_eq!(top.pixel(0, 0).unwrap(), RED);
        assert_eq!(top.pixel(32, 32).unwrap(), RED);
        assert!(top.pixel(63, 63).unwrap().a > 0);
        assert_eq!(top.pixel(64, 0).unwrap(), Rgba::TRANSPARENT);
        assert_eq!(top.pixel(0, 64).unwrap(), Rgba::TRANSPARENT);
        assert_eq!(top.pixel(200, 200).unwrap(), Rgba::TRANSPARENT);

        let metadata = store.metadata();
        assert_eq!(metadata["name"], "test");
        assert_eq!(metadata["format"], "png");
        assert_eq!(metadata["minzoom"], "0");
        assert_eq!(metadata["maxzoom"], "2");
        assert_eq!(metadata["center"], "0,0");
    }

    #[test]
    fn transparency_is_monotonic() {
        // Squares inside tiles 3/1/1, 3/6/2, and 3/7/7.
        let page = page(2048, 2048, &[
            (300., 300., 100., 100.),
            (1600., 600., 50., 50.),
            (1900., 1900., 50., 50.),
        ]);
        let (store, report) = build(&page, 3);
        let stored: HashSet<_> = store.tile_ids().collect();

        let base: HashSet<_> = stored.iter().filter(|tile| {
            tile.zoom == 3
        }).copied().collect();
        assert_eq!(base, [
            TileId::new(3, 1, 1), TileId::new(3, 6, 2), TileId::new(3, 7, 7),
        ].into_iter().collect());

        for zoom in 0..3u8 {
            let n = TileId::coord_end(zoom);
            for x in 0..n {
                for y in 0..n {
                    let tile = TileId::new(zoom, x, y);
                    let any_child = tile.children().iter().any(|child| {
                        stored.contains(child)
                    });
                    assert_eq!(stored.contains(&tile), any_child, "{}", tile);
                }
            }
        }
        assert_eq!(report.tiles_at(2), 3);
        assert_eq!(report.tiles_at(1), 3);
        assert_eq!(report.tiles_at(0), 1);
    }

    #[test]
    fn empty_page() {
        let page = page(512, 512, &[]);
        let (store, report) = build(&page, 1);
        assert!(store.is_empty());
        assert_eq!(report.total(), 0);
        assert_eq!(store.metadata()["minzoom"], "1");
        assert_eq!(report.to_string(), "test: 0 tiles");
    }

    #[test]
    fn report_display() {
        let mut report = PyramidReport::new("body".into());
        report.add(TileId::new(2, 0, 0));
        report.add(TileId::new(2, 1, 0));
        report.add(TileId::new(1, 0, 0));
        assert_eq!(report.to_string(), "body: 3 tiles, z2: 2, z1: 1");
    }

    #[test]
    fn rebuild_into_same_directory() {
        let base = temp_dir("rebuild");
        let georef = TileGeoreferencer::new(Extent::world(), 2).unwrap();

        let first = page(1024, 1024, &[(0., 0., 256., 256.)]);
        let mut store = DirStore::create_new(&base).unwrap();
        PyramidBuilder::new(&georef, "first").build(
            &first, &mut store
        ).unwrap();
        assert!(store.get_tile(TileId::new(1, 0, 0)).unwrap().is_some());

        let second = page(1024, 1024, &[(768., 768., 256., 256.)]);
        let mut store = DirStore::create_new(&base).unwrap();
        let report = PyramidBuilder::new(&georef, "second").build(
            &second, &mut store
        ).unwrap();
        assert_eq!(report.total(), 3);
        for tile in [TileId::new(2, 0, 0), TileId::new(1, 0, 0)] {
            assert!(store.get_tile(tile).unwrap().is_none(), "{}", tile);
        }
        assert!(store.get_tile(TileId::new(1, 1, 1)).unwrap().is_some());

        let top = store.get_tile(TileId::new(0, 0, 0)).unwrap().unwrap();
        assert_eq!(top.visible_pixels().unwrap(), 64 * 64);
        assert_eq!(top.pixel(0, 0).unwrap(), Rgba::TRANSPARENT);
        assert_eq!(top.pixel(255, 255).unwrap(), RED);
        assert_eq!(store.metadata().unwrap()["name"], "second");
        fs::remove_dir_all(&base).unwrap();
    }

    /// A store that fails once it has saved a number of tiles.
    struct FailingStore {
        inner: MemoryStore,
        capacity: usize,
        attempts: usize,
    }

    impl TileStore for FailingStore {
        fn save_tile(
            &mut self, tile: TileId, image: &TileImage
        ) -> Result<(), TileStoreError> {
            self.attempts += 1;
            if self.inner.len() >= self.capacity {
                return Err(TileStoreError::Io {
                    path: format!("{}.png", tile).into(),
                    err: io::Error::new(io::ErrorKind::Other, "store full"),
                })
            }
            self.inner.save_tile(tile, image)
        }

        fn get_tile(
            &self, tile: TileId
        ) -> Result<Option<TileImage>, TileStoreError> {
            self.inner.get_tile(tile)
        }

        fn save_metadata(
            &mut self, metadata: &Metadata
        ) -> Result<(), TileStoreError> {
            self.inner.save_metadata(metadata)
        }
    }

    #[test]
    fn store_error_aborts_build() {
        let page = page(1024, 1024, &[(0., 0., 256., 256.)]);
        let georef = TileGeoreferencer::new(Extent::world(), 2).unwrap();
        let mut store = FailingStore {
            inner: MemoryStore::new(), capacity: 1, attempts: 0,
        };
        let res = PyramidBuilder::new(&georef, "test").build(&page, &mut store);
        assert!(matches!(res, Err(BuildError::Store(_))));
        assert_eq!(store.attempts, 2);
        let ids: Vec<_> = store.inner.tile_ids().collect();
        assert_eq!(ids, [TileId::new(2, 0, 0)]);
        assert!(store.inner.metadata().is_empty());
    }
}
