use crate::convert::{ConversionConfig, Level, LevelConverter, TileCell};
use crate::error::{MapError, Warning};
use crate::ir_map::IrMap;
use crate::loader::{DocumentFormat, MapLoader, ParsedMap, TilesetCache};
use crate::spatial::Projection;
use anyhow::Context;
use macroquad::prelude::*;
use std::path::{Path, PathBuf};

/// A loaded map together with the level converted from it.
#[derive(Debug)]
pub struct Map {
    pub ir: IrMap,
    pub source: PathBuf,
    pub map_dir: PathBuf,
    /// Problems found while parsing. Conversion problems live in `level.warnings`.
    pub warnings: Vec<Warning>,
    pub level: Level,
}

impl Map {
    /// Loads and converts a map file using the process-wide tileset cache.
    pub fn load(path: impl AsRef<Path>, config: &ConversionConfig) -> anyhow::Result<Self> {
        Self::load_with_cache(path, config, TilesetCache::global())
    }

    pub fn load_with_cache(
        path: impl AsRef<Path>,
        config: &ConversionConfig,
        cache: &TilesetCache,
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let parsed = MapLoader::new(cache)
            .load_file(path)
            .with_context(|| format!("Loading map {}", path.display()))?;
        Ok(Self::from_parsed(parsed, config))
    }

    /// Loads and converts an in-memory document. External tilesets resolve
    /// relative to `virtual_path` and are not cached across calls.
    pub fn load_from_str(
        text: &str,
        format: DocumentFormat,
        virtual_path: impl AsRef<Path>,
        config: &ConversionConfig,
    ) -> Result<Self, MapError> {
        let cache = TilesetCache::new();
        let parsed = MapLoader::new(&cache).load_str(text, format, virtual_path)?;
        Ok(Self::from_parsed(parsed, config))
    }

    pub fn from_parsed(parsed: ParsedMap, config: &ConversionConfig) -> Self {
        let level = LevelConverter::new(&parsed, config).convert();
        let ParsedMap {
            map,
            source,
            map_dir,
            warnings,
        } = parsed;
        Self {
            ir: map,
            source,
            map_dir,
            warnings,
            level,
        }
    }

    pub fn projection(&self) -> Projection {
        Projection::new(self.ir.orientation, self.ir.tile_w, self.ir.tile_h)
    }

    /// Parse and conversion warnings, in that order.
    pub fn all_warnings(&self) -> impl Iterator<Item = &Warning> {
        self.warnings.iter().chain(self.level.warnings.iter())
    }

    /// Tile of grid `layer` under a world position (layer offset ignored).
    pub fn tile_at(&self, layer: &str, world: Vec2) -> Option<&TileCell> {
        let tile = self.projection().world_to_tile(world).floor();
        if tile.x < 0.0 || tile.y < 0.0 {
            return None;
        }
        self.level.grid(layer)?.cell(tile.x as u32, tile.y as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL: &str = r#"{
      "width": 2, "height": 2, "tilewidth": 8, "tileheight": 8,
      "tilesets": [{"firstgid": 1, "name": "t", "tilewidth": 8, "tileheight": 8,
                    "tilecount": 2, "columns": 2, "image": "t.png",
                    "imagewidth": 16, "imageheight": 8}],
      "layers": [{"type": "tilelayer", "name": "L", "width": 2, "height": 2,
                  "data": [0, 1, 2, 0]}]
    }"#;

    #[test]
    fn tile_lookup_by_world_position() {
        let map = Map::load_from_str(
            SMALL,
            DocumentFormat::Json,
            "mem/small.tmj",
            &ConversionConfig::default(),
        )
        .unwrap();
        assert_eq!(map.tile_at("L", vec2(9.0, 1.0)).map(|c| c.gid), Some(1));
        assert_eq!(map.tile_at("L", vec2(2.0, 12.0)).map(|c| c.gid), Some(2));
        assert!(map.tile_at("L", vec2(1.0, 1.0)).is_none());
        assert!(map.tile_at("L", vec2(-1.0, 1.0)).is_none());
        assert!(map.tile_at("missing", vec2(9.0, 1.0)).is_none());
        assert_eq!(map.all_warnings().count(), 0);
    }

    #[test]
    fn load_adds_file_context() {
        let err = Map::load_with_cache(
            "does/not/exist.tmj",
            &ConversionConfig::default(),
            &TilesetCache::new(),
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("Loading map does/not/exist.tmj"));
        assert!(matches!(
            err.downcast_ref::<MapError>(),
            Some(MapError::Io { .. })
        ));
    }
}
