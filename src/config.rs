//! Configuration of the map.

use std::{fs, io};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::Deserialize;
use crate::image::Color;
use crate::tile::Extent;

/// The default maximum zoom level.
pub const DEFAULT_MAX_ZOOM: u8 = 10;


//------------ MapConfig -----------------------------------------------------

/// The map configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MapConfig {
    /// The identifier of the map.
    pub id: String,

    /// The geographic extent the drawing covers.
    pub extent: Extent,

    /// The zoom level at which tiles are cut from the pages.
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,

    /// The colour of page pixels that become transparent.
    #[serde(default)]
    pub background: Color,

    /// The drawing document.
    pub drawing: PathBuf,

    /// The rendered page image for each layer.
    #[serde(default)]
    pub pages: BTreeMap<String, PathBuf>,
}

fn default_max_zoom() -> u8 {
    DEFAULT_MAX_ZOOM
}

impl MapConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = fs::read_to_string(path).map_err(|err| {
            ConfigError::Read { path: path.into(), err }
        })?;
        let mut res = Self::from_toml(&data)?;
        if let Some(base_dir) = path.parent() {
            res.prepare(base_dir);
        }
        Ok(res)
    }

    pub fn from_toml(data: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(data)?)
    }

    /// Makes all relative paths relative to `base_dir`.
    pub fn prepare(&mut self, base_dir: &Path) {
        self.drawing = base_dir.join(&self.drawing);
        self.pages.values_mut().for_each(|page| {
            *page = base_dir.join(&*page)
        });
    }

    /// Returns the page image for a layer if there is one.
    pub fn page(&self, layer: &str) -> Option<&Path> {
        self.pages.get(layer).map(PathBuf::as_path)
    }
}


//------------ ConfigError ---------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {err}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}


//============ Testing =======================================================
