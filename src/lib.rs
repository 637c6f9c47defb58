//! Tiled map loader and level converter for Macroquad.
//!
//! Reads TMJ/TMX maps (with TSJ/TSX tilesets), decodes tile payloads, resolves
//! tile IDs and converts the result into an engine-side [`Level`].

pub mod codec;
pub mod convert;
pub mod error;
pub mod ir_map;
pub mod loader;
pub mod map;
pub mod spatial;
pub mod tileset;

pub use codec::{Compression, DecodedTiles, Encoding};
pub use convert::{ConversionConfig, EntityCategory, Level, LevelConverter};
pub use error::{
    DecodeError, ErrorKind, InflateFailure, IssueContext, MapError, TokenError, TokenErrorReason,
    Warning,
};
pub use ir_map::{
    Chunk, IrLayer, IrLayerKind, IrMap, IrObject, IrObjectShape, Orientation, Properties,
    PropertyValue, TileData,
};
pub use loader::{DocumentFormat, MapLoader, ParsedMap, TilesetCache};
pub use map::Map;
pub use spatial::{MapBounds, Projection, ResolvedGid, TileId};
pub use tileset::{TileMeta, Tileset, TilesetDef};
