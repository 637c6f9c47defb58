use crate::ir_map::{IrObject, Properties};
use crate::spatial::GID_MASK;
use macroquad::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Per-tile metadata from a tileset's `tiles` list.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMeta {
    pub id: u32,
    pub class_name: String,
    pub properties: Properties,
    /// Image for collection-of-images tilesets.
    pub image: Option<String>,
    pub image_w: u32,
    pub image_h: u32,
    /// Collision shapes authored on the tile.
    pub objects: Vec<IrObject>,
}

/// Tileset document contents. Shared between maps through the tileset cache,
/// so it carries no GID range of its own.
#[derive(Debug, Clone, PartialEq)]
pub struct TilesetDef {
    pub name: String,
    pub tile_w: u32,
    pub tile_h: u32,
    pub tile_count: u32,
    /// 0 for collection-of-images tilesets (no atlas layout).
    pub columns: u32,
    pub margin: u32,
    pub spacing: u32,
    pub image: Option<String>,
    pub image_w: u32,
    pub image_h: u32,
    /// Pixel nudge applied to every tile after projection.
    pub tile_offset: Vec2,
    pub object_alignment: String,
    pub properties: Properties,
    pub tiles: Vec<TileMeta>,
}

impl TilesetDef {
    pub fn tile(&self, local_id: u32) -> Option<&TileMeta> {
        self.tiles.iter().find(|t| t.id == local_id)
    }

    /// Sets `columns` and `tile_count`, deriving whichever the document left out.
    pub(crate) fn with_layout(mut self, columns: Option<u32>, tile_count: Option<u32>) -> Self {
        let atlas = self.image.is_some();
        self.columns = match columns {
            Some(columns) => columns,
            None if atlas => derive_columns(self.image_w, self.tile_w, self.margin, self.spacing),
            None => 0,
        };
        self.tile_count = match tile_count {
            Some(count) => count,
            None if atlas => derive_tile_count(
                self.image_w,
                self.image_h,
                self.tile_w,
                self.tile_h,
                self.margin,
                self.spacing,
            ),
            None => self.tiles.iter().map(|t| t.id + 1).max().unwrap_or(0),
        };
        self
    }
}

/// Number of tiles an atlas image holds given its grid geometry.
pub fn derive_tile_count(
    image_w: u32,
    image_h: u32,
    tile_w: u32,
    tile_h: u32,
    margin: u32,
    spacing: u32,
) -> u32 {
    derive_columns(image_w, tile_w, margin, spacing) * derive_columns(image_h, tile_h, margin, spacing)
}

/// Tiles along one image axis.
pub fn derive_columns(image_extent: u32, tile_extent: u32, margin: u32, spacing: u32) -> u32 {
    let step = i64::from(tile_extent) + i64::from(spacing);
    if step <= 0 {
        return 0;
    }
    let usable = i64::from(image_extent) - 2 * i64::from(margin) + i64::from(spacing);
    (usable.max(0) / step) as u32
}

/// A tileset as referenced by one map: a shared definition plus the GID range
/// that map assigns to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    pub first_gid: u32,
    /// `source` attribute as written in the map, for external tilesets.
    pub source: Option<String>,
    pub def: Arc<TilesetDef>,
}

impl Tileset {
    pub fn new(first_gid: u32, source: Option<String>, def: Arc<TilesetDef>) -> Self {
        Self {
            first_gid,
            source,
            def,
        }
    }

    pub fn name(&self) -> &str {
        &self.def.name
    }

    pub fn tile_count(&self) -> u32 {
        self.def.tile_count
    }

    /// `first_gid + tile_count - 1`. Below `first_gid` for an empty tileset.
    pub fn last_gid(&self) -> u32 {
        self.first_gid.saturating_add(self.def.tile_count).saturating_sub(1)
    }

    pub fn contains_gid(&self, gid: u32) -> bool {
        let id = gid & GID_MASK;
        self.def.tile_count > 0 && self.first_gid <= id && id <= self.last_gid()
    }

    /// Tile index inside this tileset, flip flags ignored.
    pub fn local_id(&self, gid: u32) -> Option<u32> {
        if self.contains_gid(gid) {
            Some((gid & GID_MASK) - self.first_gid)
        } else {
            None
        }
    }

    /// Atlas `(column, row)` of a local tile id; `None` without an atlas layout.
    pub fn tile_coords(&self, local_id: u32) -> Option<(u32, u32)> {
        match self.def.columns {
            0 => None,
            cols => Some((local_id % cols, local_id / cols)),
        }
    }

    /// Source rectangle of a local tile inside the atlas image.
    pub fn atlas_rect(&self, local_id: u32) -> Option<Rect> {
        let (col, row) = self.tile_coords(local_id)?;
        let def = &self.def;
        let sx = def.margin + col * (def.tile_w + def.spacing);
        let sy = def.margin + row * (def.tile_h + def.spacing);
        Some(Rect::new(
            sx as f32,
            sy as f32,
            def.tile_w as f32,
            def.tile_h as f32,
        ))
    }

    /// Directory (relative to the map) that this tileset's image paths are relative to.
    pub fn image_base(&self) -> PathBuf {
        self.source
            .as_deref()
            .and_then(|s| Path::new(s).parent())
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    /// Every image this tileset draws from, relative to [`Tileset::image_base`].
    pub fn image_paths(&self) -> impl Iterator<Item = &str> {
        self.def
            .image
            .as_deref()
            .into_iter()
            .chain(self.def.tiles.iter().filter_map(|t| t.image.as_deref()))
    }
}

#[cfg(test)]
pub(crate) fn atlas_def(name: &str, tile_count: u32, columns: u32) -> TilesetDef {
    TilesetDef {
        name: name.to_owned(),
        tile_w: 16,
        tile_h: 16,
        tile_count,
        columns,
        margin: 0,
        spacing: 0,
        image: Some(format!("{name}.png")),
        image_w: columns * 16,
        image_h: tile_count.div_ceil(columns.max(1)) * 16,
        tile_offset: Vec2::ZERO,
        object_alignment: "unspecified".to_owned(),
        properties: Properties::new(),
        tiles: Vec::new(),
    }
}
