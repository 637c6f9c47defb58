//! Engine-side level description produced by the converter.

use crate::error::Warning;
use crate::ir_map::{Orientation, Properties};
use macroquad::prelude::*;
use std::path::PathBuf;

/// Map-wide settings (phase 1).
#[derive(Debug, Clone, PartialEq)]
pub struct LevelConfig {
    pub orientation: Orientation,
    pub render_order: String,
    pub infinite: bool,
    /// Grid size in tiles. For infinite maps this is the scanned chunk extent.
    pub width: u32,
    pub height: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    /// Map tile that sits at grid cell `(0, 0)`.
    pub origin_tile: (i32, i32),
    pub background_color: Option<String>,
}

/// Descriptive data (phase 2).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LevelMetadata {
    pub source: PathBuf,
    pub properties: Properties,
    pub tilesets: Vec<String>,
    pub layer_names: Vec<String>,
}

/// One non-empty cell of a tile grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TileCell {
    pub grid_x: u32,
    pub grid_y: u32,
    /// Cell ID as stored, flip flags included.
    pub gid: u32,
    pub tileset: usize,
    pub local_id: u32,
    pub atlas: Option<(u32, u32)>,
    /// Source rectangle in the tileset image; `None` for collection tilesets.
    pub source: Option<Rect>,
    pub flip_h: bool,
    pub flip_v: bool,
    pub flip_d: bool,
    pub world: Vec2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    pub layer_id: u32,
    pub name: String,
    pub z_order: usize,
    pub visible: bool,
    pub opacity: f32,
    pub parallax: Vec2,
    pub offset: Vec2,
    pub width: u32,
    pub height: u32,
    pub cells: Vec<TileCell>,
}

impl TileGrid {
    pub fn cell(&self, grid_x: u32, grid_y: u32) -> Option<&TileCell> {
        self.cells
            .iter()
            .find(|c| c.grid_x == grid_x && c.grid_y == grid_y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImagePlane {
    pub name: String,
    pub z_order: usize,
    pub image: PathBuf,
    pub offset: Vec2,
    pub parallax: Vec2,
    pub opacity: f32,
    pub repeat_x: bool,
    pub repeat_y: bool,
}

/// Object outline in world pixels.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Rect(Rect),
    Ellipse { center: Vec2, radii: Vec2 },
    Polygon(Vec<Vec2>),
    Polyline(Vec<Vec2>),
    Point(Vec2),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollisionShape {
    pub object_id: u32,
    pub layer: String,
    pub geometry: Geometry,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    pub object_id: u32,
    pub name: String,
    pub polygon: Vec<Vec2>,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatrolPath {
    pub object_id: u32,
    pub name: String,
    pub points: Vec<Vec2>,
    pub closed: bool,
    /// Object whose `object` property points at this path.
    pub owner: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityCategory {
    Static,
    Dynamic,
    Patrol,
    Sound,
}

impl EntityCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "static" => Some(EntityCategory::Static),
            "dynamic" => Some(EntityCategory::Dynamic),
            "patrol" => Some(EntityCategory::Patrol),
            "sound" => Some(EntityCategory::Sound),
            _ => None,
        }
    }
}

/// Tile drawn by a tile object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRef {
    pub gid: u32,
    pub tileset: usize,
    pub local_id: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityDescriptor {
    pub object_id: u32,
    pub name: String,
    pub object_type: String,
    pub category: EntityCategory,
    pub prefab: String,
    pub layer: String,
    pub z_order: usize,
    pub position: Vec2,
    pub size: Vec2,
    pub rotation: f32,
    pub visible: bool,
    pub tile: Option<TileRef>,
    pub properties: Properties,
}

/// Directed object → object reference taken from an `object` property.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub from: u32,
    pub property: String,
    pub to: u32,
}

#[derive(Debug)]
pub struct Level {
    pub config: LevelConfig,
    pub metadata: LevelMetadata,
    pub tile_grids: Vec<TileGrid>,
    pub images: Vec<ImagePlane>,
    pub collisions: Vec<CollisionShape>,
    pub sectors: Vec<Sector>,
    pub patrols: Vec<PatrolPath>,
    pub entities: Vec<EntityDescriptor>,
    pub relationships: Vec<Relationship>,
    /// Image files to preload, deduplicated, in first-seen order.
    pub resources: Vec<PathBuf>,
    /// Per-object problems hit during conversion.
    pub warnings: Vec<Warning>,
}

impl Level {
    pub fn entity(&self, object_id: u32) -> Option<&EntityDescriptor> {
        self.entities.iter().find(|e| e.object_id == object_id)
    }

    pub fn grid(&self, name: &str) -> Option<&TileGrid> {
        self.tile_grids.iter().find(|g| g.name == name)
    }
}
