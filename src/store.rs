//! Storing tiles.

use std::{fs, io};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use crate::image::TileImage;
use crate::tile::{TileError, TileId};


//------------ Metadata ------------------------------------------------------

/// The metadata of a tile set as key/value pairs.
pub type Metadata = BTreeMap<String, String>;


//------------ TileStore -----------------------------------------------------

/// Somewhere to keep the tiles of a layer.
///
/// Each tile is written at most once. A tile that was never written is
/// fully transparent.
pub trait TileStore {
    fn save_tile(
        &mut self, tile: TileId, image: &TileImage
    ) -> Result<(), TileStoreError>;

    /// Returns a tile or `None` if it doesn't exist.
    fn get_tile(
        &self, tile: TileId
    ) -> Result<Option<TileImage>, TileStoreError>;

    /// Adds the given metadata, replacing existing values of the same keys.
    fn save_metadata(
        &mut self, metadata: &Metadata
    ) -> Result<(), TileStoreError>;
}


//------------ MemoryStore ---------------------------------------------------

/// A tile store keeping PNG encoded tiles in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    tiles: BTreeMap<TileId, Vec<u8>>,
    metadata: Metadata,
}

impl MemoryStore {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, tile: TileId) -> bool {
        self.tiles.contains_key(&tile)
    }

    /// Returns the identifiers of all stored tiles in order.
    pub fn tile_ids(&self) -> impl Iterator<Item = TileId> + '_ {
        self.tiles.keys().copied()
    }

    /// Returns the PNG data of a tile.
    pub fn png(&self, tile: TileId) -> Option<&[u8]> {
        self.tiles.get(&tile).map(Vec::as_slice)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

impl TileStore for MemoryStore {
    fn save_tile(
        &mut self, tile: TileId, image: &TileImage
    ) -> Result<(), TileStoreError> {
        self.tiles.insert(tile, image.to_png()?);
        Ok(())
    }

    fn get_tile(
        &self, tile: TileId
    ) -> Result<Option<TileImage>, TileStoreError> {
        match self.tiles.get(&tile) {
            Some(data) => Ok(Some(TileImage::from_png(data)?)),
            None => Ok(None)
        }
    }

    fn save_metadata(
        &mut self, metadata: &Metadata
    ) -> Result<(), TileStoreError> {
        self.metadata.extend(
            metadata.iter().map(|(k, v)| (k.clone(), v.clone()))
        );
        Ok(())
    }
}


//------------ DirStore ------------------------------------------------------

/// A tile store using a directory tree.
///
/// Tiles live in `{zoom}/{x}/{y}.png` below the base directory. Metadata
/// is kept as a JSON object in `metadata.json`.
#[derive(Clone, Debug)]
pub struct DirStore {
    base: PathBuf,
}

impl DirStore {
    /// Creates a store at `base`, creating the directory if necessary.
    pub fn create(base: impl Into<PathBuf>) -> Result<Self, TileStoreError> {
        let base = base.into();
        fs::create_dir_all(&base).map_err(|err| {
            TileStoreError::io(&base, err)
        })?;
        Ok(DirStore { base })
    }

    /// Creates an empty store at `base`.
    ///
    /// Tiles and metadata left in the directory by an earlier run are
    /// removed. Other content of the directory is kept.
    pub fn create_new(
        base: impl Into<PathBuf>
    ) -> Result<Self, TileStoreError> {
        let res = Self::create(base)?;
        res.clear()?;
        Ok(res)
    }

    /// Removes all tiles and the metadata.
    pub fn clear(&self) -> Result<(), TileStoreError> {
        let dir = fs::read_dir(&self.base).map_err(|err| {
            TileStoreError::io(&self.base, err)
        })?;
        for entry in dir {
            let entry = entry.map_err(|err| {
                TileStoreError::io(&self.base, err)
            })?;
            let is_zoom = entry.file_name().to_str().map_or(false, |name| {
                name.parse::<u8>().is_ok()
            });
            let path = entry.path();
            if is_zoom && path.is_dir() {
                fs::remove_dir_all(&path).map_err(|err| {
                    TileStoreError::io(&path, err)
                })?;
            }
        }
        let path = self.metadata_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(TileStoreError::io(&path, err)),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns the path of a tile's file.
    pub fn tile_path(&self, tile: TileId) -> PathBuf {
        self.base
            .join(tile.zoom.to_string())
            .join(tile.x.to_string())
            .join(format!("{}.png", tile.y))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.base.join("metadata.json")
    }

    /// Reads the currently stored metadata.
    pub fn metadata(&self) -> Result<Metadata, TileStoreError> {
        let path = self.metadata_path();
        match fs::read(&path) {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Ok(Metadata::new())
            }
            Err(err) => Err(TileStoreError::io(&path, err)),
        }
    }
}

impl TileStore for DirStore {
    fn save_tile(
        &mut self, tile: TileId, image: &TileImage
    ) -> Result<(), TileStoreError> {
        let path = self.tile_path(tile);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|err| {
                TileStoreError::io(dir, err)
            })?;
        }
        let data = image.to_png()?;
        fs::write(&path, data).map_err(|err| TileStoreError::io(&path, err))
    }

    fn get_tile(
        &self, tile: TileId
    ) -> Result<Option<TileImage>, TileStoreError> {
        let path = self.tile_path(tile);
        match fs::read(&path) {
            Ok(data) => Ok(Some(TileImage::from_png(&data)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(TileStoreError::io(&path, err)),
        }
    }

    fn save_metadata(
        &mut self, metadata: &Metadata
    ) -> Result<(), TileStoreError> {
        let mut current = self.metadata()?;
        current.extend(
            metadata.iter().map(|(k, v)| (k.clone(), v.clone()))
        );
        let path = self.metadata_path();
        fs::write(&path, serde_json::to_vec_pretty(&current)?).map_err(|err| {
            TileStoreError::io(&path, err)
        })
    }
}


//------------ TileStoreError ------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TileStoreError {
    #[error("{}: {err}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("bad tile image: {0}")]
    Image(#[from] TileError),

    #[error("bad metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

impl TileStoreError {
    fn io(path: &Path, err: io::Error) -> Self {
        TileStoreError::Io { path: path.into(), err }
    }
}


//============ Testing =======================================================

#[cfg(test)]
pub(crate) mod test {
    use crate::image::test::{filled, RED};
    use super::*;

    pub fn red_tile() -> TileImage {
        let mut image = TileImage::new().unwrap();
        image.paste(&filled(10, 10, RED), 5, 5).unwrap();
        image
    }

    pub fn temp_dir(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "flatmap-{}-{}", name, std::process::id()
        ));
        let _ = fs::remove_dir_all(&path);
        path
    }

    fn exercise(store: &mut impl TileStore) {
        let id = TileId::new(3, 4, 5);
        assert!(store.get_tile(id).unwrap().is_none());
        store.save_tile(id, &red_tile()).unwrap();
        let tile = store.get_tile(id).unwrap().unwrap();
        assert_eq!(tile.visible_pixels().unwrap(), 100);
        assert_eq!(tile.pixel(5, 5).unwrap(), RED);
        assert!(store.get_tile(TileId::new(3, 5, 4)).unwrap().is_none());

        let mut metadata = Metadata::new();
        metadata.insert("name".into(), "first".into());
        metadata.insert("format".into(), "png".into());
        store.save_metadata(&metadata).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("name".into(), "second".into());
        store.save_metadata(&metadata).unwrap();
    }

    #[test]
    fn memory_store() {
        let mut store = MemoryStore::new();
        exercise(&mut store);
        assert_eq!(store.len(), 1);
        assert!(store.contains(TileId::new(3, 4, 5)));
        assert_eq!(store.metadata()["name"], "second");
        assert_eq!(store.metadata()["format"], "png");
    }

    #[test]
    fn dir_store() {
        let base = temp_dir("store");
        let mut store = DirStore::create(&base).unwrap();
        exercise(&mut store);
        assert!(base.join("3").join("4").join("5.png").is_file());
        let metadata = store.metadata().unwrap();
        assert_eq!(metadata["name"], "second");
        assert_eq!(metadata["format"], "png");
        fs::remove_dir_all(&base).unwrap();
    }

    #[test]
    fn create_new_clears_tiles() {
        let base = temp_dir("clear");
        let mut store = DirStore::create(&base).unwrap();
        store.save_tile(TileId::new(2, 1, 1), &red_tile()).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("name".into(), "old".into());
        store.save_metadata(&metadata).unwrap();
        fs::write(base.join("notes.txt"), b"keep").unwrap();

        let reopened = DirStore::create(&base).unwrap();
        assert!(reopened.get_tile(TileId::new(2, 1, 1)).unwrap().is_some());

        let store = DirStore::create_new(&base).unwrap();
        assert!(store.get_tile(TileId::new(2, 1, 1)).unwrap().is_none());
        assert!(!base.join("2").exists());
        assert!(store.metadata().unwrap().is_empty());
        assert!(base.join("notes.txt").is_file());
        fs::remove_dir_all(&base).unwrap();
    }
}
