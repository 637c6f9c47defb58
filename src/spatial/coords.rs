//! Tile, pixel and world coordinate conversions.
//!
//! Tile coordinates map to world space with tile `(0, 0)` at world `(0, 0)` for
//! both projections, so tile and object placement share one origin.

use crate::ir_map::Orientation;
use macroquad::prelude::*;

/// Top-left pixel of an orthogonal tile.
#[inline]
pub fn ortho_tile_to_pixel(tile_x: i32, tile_y: i32, tile_w: u32, tile_h: u32) -> Vec2 {
    vec2(
        tile_x as f32 * tile_w as f32,
        tile_y as f32 * tile_h as f32,
    )
}

/// Orthogonal tile under a pixel. Floors, so negative pixels land on negative tiles.
#[inline]
pub fn ortho_pixel_to_tile(pixel: Vec2, tile_w: u32, tile_h: u32) -> (i32, i32) {
    (
        (pixel.x / tile_w.max(1) as f32).floor() as i32,
        (pixel.y / tile_h.max(1) as f32).floor() as i32,
    )
}

/// Isometric tile coordinates to screen pixels.
#[inline]
pub fn iso_tile_to_screen(tile: Vec2, tile_w: f32, tile_h: f32) -> Vec2 {
    let half_w = tile_w / 2.0;
    let half_h = tile_h / 2.0;
    vec2((tile.x - tile.y) * half_w, (tile.x + tile.y) * half_h)
}

/// Inverse of [`iso_tile_to_screen`]; fractional tiles are kept.
#[inline]
pub fn iso_screen_to_tile(screen: Vec2, tile_w: f32, tile_h: f32) -> Vec2 {
    let sx = screen.x / (tile_w / 2.0);
    let sy = screen.y / (tile_h / 2.0);
    vec2((sx + sy) / 2.0, (sy - sx) / 2.0)
}

/// Isometric object pixel position to fractional tile coordinates.
///
/// The map format stores isometric object positions with BOTH axes measured in
/// `tile_h` units along the isometric axes, so both divide by `tile_h`.
#[inline]
pub fn iso_object_to_tile(pixel: Vec2, tile_h: f32) -> Vec2 {
    pixel / tile_h
}

/// Isometric object pixel position to world pixels. No origin correction is
/// applied: tile `(0, 0)` and object `(0, 0)` both land on world `(0, 0)`.
#[inline]
pub fn iso_object_to_world(pixel: Vec2, tile_w: f32, tile_h: f32) -> Vec2 {
    iso_tile_to_screen(iso_object_to_tile(pixel, tile_h), tile_w, tile_h)
}

/// Inverse of [`iso_object_to_world`].
#[inline]
pub fn iso_world_to_object(world: Vec2, tile_w: f32, tile_h: f32) -> Vec2 {
    iso_screen_to_tile(world, tile_w, tile_h) * tile_h
}

/// Coordinate transform bound to one map's projection and tile size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub orientation: Orientation,
    pub tile_w: f32,
    pub tile_h: f32,
}

impl Projection {
    pub fn new(orientation: Orientation, tile_w: u32, tile_h: u32) -> Self {
        Self {
            orientation,
            tile_w: tile_w as f32,
            tile_h: tile_h as f32,
        }
    }

    /// World position of a tile's origin. `tile_x`/`tile_y` are grid indices
    /// (already rebased by the map bounds on infinite maps).
    pub fn tile_to_world(&self, tile_x: i32, tile_y: i32) -> Vec2 {
        let tile = vec2(tile_x as f32, tile_y as f32);
        match self.orientation {
            Orientation::Orthogonal => tile * vec2(self.tile_w, self.tile_h),
            Orientation::Isometric => iso_tile_to_screen(tile, self.tile_w, self.tile_h),
        }
    }

    /// Fractional tile under a world position.
    pub fn world_to_tile(&self, world: Vec2) -> Vec2 {
        match self.orientation {
            Orientation::Orthogonal => world / vec2(self.tile_w, self.tile_h),
            Orientation::Isometric => iso_screen_to_tile(world, self.tile_w, self.tile_h),
        }
    }

    /// World position of an object point. `layer_offset` is in the same units
    /// as `pixel` and goes through the same transform; `tile_offset` is
    /// already in projected pixels and is added afterwards.
    pub fn object_to_world(&self, pixel: Vec2, layer_offset: Vec2, tile_offset: Vec2) -> Vec2 {
        let p = pixel + layer_offset;
        let projected = match self.orientation {
            Orientation::Orthogonal => p,
            Orientation::Isometric => iso_object_to_world(p, self.tile_w, self.tile_h),
        };
        projected + tile_offset
    }

    /// Inverse of [`Projection::object_to_world`] without offsets.
    pub fn world_to_object(&self, world: Vec2) -> Vec2 {
        match self.orientation {
            Orientation::Orthogonal => world,
            Orientation::Isometric => iso_world_to_object(world, self.tile_w, self.tile_h),
        }
    }
}
