//! Making flat maps from drawings.
//!
//! The shapes of each slide of a drawing become the features of a map
//! layer, with all nested coordinate systems resolved into one flat space.
//! A rendered image of each slide is cut into a web map tile pyramid.

pub use self::config::MapConfig;
pub use self::drawing::Presentation;
pub use self::extract::{Extractor, Layer};
pub use self::georef::TileGeoreferencer;
pub use self::page::{ImagePage, Page};
pub use self::pyramid::PyramidBuilder;
pub use self::store::{DirStore, MemoryStore, TileStore};

pub mod config;
pub mod drawing;
pub mod extract;
pub mod feature;
pub mod georef;
pub mod image;
pub mod page;
pub mod pyramid;
pub mod store;
pub mod tile;
pub mod tiler;
pub mod transform;
