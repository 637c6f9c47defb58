// src/ir_map.rs
use crate::spatial::MapBounds;
use crate::tileset::Tileset;
use macroquad::prelude::*;
use std::collections::BTreeMap;

/// Canonical, format-agnostic map.
///
/// Built once per parse by the loaders and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct IrMap {
    pub orientation: Orientation,
    pub render_order: String,
    /// Declared size in tiles. Not authoritative for infinite maps, see [`IrMap::bounds`].
    pub width: u32,
    pub height: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    pub infinite: bool,
    pub background_color: Option<String>,
    pub properties: Properties,
    pub tilesets: Vec<Tileset>, // sorted by first_gid
    pub layers: Vec<IrLayer>,   // draw order: array order
    /// Tile-space bounding box, scanned from chunks on infinite maps.
    pub bounds: MapBounds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Orthogonal,
    Isometric,
}

impl Orientation {
    /// Staggered and hexagonal maps are rejected by returning `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "orthogonal" => Some(Orientation::Orthogonal),
            "isometric" => Some(Orientation::Isometric),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::Orthogonal => "orthogonal",
            Orientation::Isometric => "isometric",
        }
    }
}

/// One independently positioned sub-grid of an infinite tile layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>, // raw GIDs, row-major, len == width * height
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileData {
    Finite {
        width: u32,
        height: u32,
        data: Vec<u32>, // raw GIDs (including flip flags ok)
    },
    Chunked {
        chunks: Vec<Chunk>,
    },
}

impl TileData {
    /// Visits every cell as `(tile_x, tile_y, raw_gid)` in map tile coordinates.
    pub fn for_each_cell(&self, mut f: impl FnMut(i32, i32, u32)) {
        match self {
            TileData::Finite { width, data, .. } => {
                let width = (*width).max(1) as usize;
                for (idx, gid) in data.iter().enumerate() {
                    f((idx % width) as i32, (idx / width) as i32, *gid);
                }
            }
            TileData::Chunked { chunks } => {
                for chunk in chunks {
                    let width = chunk.width.max(1) as usize;
                    for (idx, gid) in chunk.data.iter().enumerate() {
                        f(
                            chunk.x.saturating_add((idx % width) as i32),
                            chunk.y.saturating_add((idx / width) as i32),
                            *gid,
                        );
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrLayerKind {
    Tiles(TileData),
    Objects {
        objects: Vec<IrObject>,
    },
    Image {
        image: String,
        repeat_x: bool,
        repeat_y: bool,
    },
    Group {
        layers: Vec<IrLayer>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IrLayer {
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub offset: Vec2, // world offset for this layer
    pub parallax: Vec2,
    pub tint_color: Option<String>,
    pub properties: Properties,
    pub kind: IrLayerKind,
}

impl IrLayer {
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            IrLayerKind::Tiles(_) => "tilelayer",
            IrLayerKind::Objects { .. } => "objectgroup",
            IrLayerKind::Image { .. } => "imagelayer",
            IrLayerKind::Group { .. } => "group",
        }
    }
}

/// A placed entity descriptor. Shape-specific data lives in [`IrObjectShape`].
#[derive(Debug, Clone, PartialEq)]
pub struct IrObject {
    pub id: u32,
    pub name: String,
    /// `class` when present, the legacy `type` otherwise.
    pub class_name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub visible: bool,
    pub shape: IrObjectShape,
    pub properties: Properties,
}

impl IrObject {
    pub fn position(&self) -> Vec2 {
        vec2(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IrObjectShape {
    Rectangle,
    Ellipse,
    Point,
    /// Points are relative to the object position.
    Polygon(Vec<Vec2>),
    /// Points are relative to the object position.
    Polyline(Vec<Vec2>),
    Text { text: String, wrap: bool },
    Tile { gid: u32 },
}

impl IrObjectShape {
    pub fn kind_name(&self) -> &'static str {
        match self {
            IrObjectShape::Rectangle => "rectangle",
            IrObjectShape::Ellipse => "ellipse",
            IrObjectShape::Point => "point",
            IrObjectShape::Polygon(_) => "polygon",
            IrObjectShape::Polyline(_) => "polyline",
            IrObjectShape::Text { .. } => "text",
            IrObjectShape::Tile { .. } => "tile",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    I64(i64),
    F32(f32),
    String(String),
    File(String),
    Color(String),
    /// Reference to another object by id; 0 means unset.
    Object(u32),
    Class(Properties),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: BTreeMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: String, value: PropertyValue) {
        self.values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)? {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            PropertyValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            PropertyValue::F32(v) => Some(*v),
            PropertyValue::I64(v) => Some(*v as f32),
            _ => None,
        }
    }

    /// Returns string-like values (`string`, `file`, `color`).
    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.get(name)? {
            PropertyValue::String(s) | PropertyValue::File(s) | PropertyValue::Color(s) => {
                Some(s.as_str())
            }
            _ => None,
        }
    }

    pub fn get_object(&self, name: &str) -> Option<u32> {
        match self.get(name)? {
            PropertyValue::Object(id) if *id != 0 => Some(*id),
            _ => None,
        }
    }
}
