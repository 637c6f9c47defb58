use crate::ir_map::{IrLayer, IrLayerKind, TileData};

/// Inclusive tile-space bounding box. Signed because chunks of infinite maps
/// may sit at negative coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapBounds {
    pub min_tile_x: i32,
    pub min_tile_y: i32,
    pub max_tile_x: i32,
    pub max_tile_y: i32,
}

impl MapBounds {
    /// `[0, width-1] x [0, height-1]`.
    pub fn finite(width: u32, height: u32) -> Self {
        Self {
            min_tile_x: 0,
            min_tile_y: 0,
            max_tile_x: saturating_i32(width) - 1,
            max_tile_y: saturating_i32(height) - 1,
        }
    }

    pub fn width(&self) -> u32 {
        span(self.min_tile_x, self.max_tile_x)
    }

    pub fn height(&self) -> u32 {
        span(self.min_tile_y, self.max_tile_y)
    }

    pub fn contains(&self, tile_x: i32, tile_y: i32) -> bool {
        (self.min_tile_x..=self.max_tile_x).contains(&tile_x)
            && (self.min_tile_y..=self.max_tile_y).contains(&tile_y)
    }

    /// Position of a map tile inside a 0-based grid covering these bounds.
    pub fn to_grid(&self, tile_x: i32, tile_y: i32) -> Option<(u32, u32)> {
        self.contains(tile_x, tile_y).then(|| {
            (
                (i64::from(tile_x) - i64::from(self.min_tile_x)) as u32,
                (i64::from(tile_y) - i64::from(self.min_tile_y)) as u32,
            )
        })
    }
}

fn saturating_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Tiles in `min..=max`, clamped to `u32`.
fn span(min: i32, max: i32) -> u32 {
    (i64::from(max) - i64::from(min) + 1).clamp(0, i64::from(u32::MAX)) as u32
}

#[derive(Debug, Default)]
struct BoundsAccumulator {
    bounds: Option<MapBounds>,
}

impl BoundsAccumulator {
    fn include(&mut self, x: i32, y: i32, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let max_x = x.saturating_add_unsigned(width - 1);
        let max_y = y.saturating_add_unsigned(height - 1);
        self.bounds = Some(match self.bounds {
            None => MapBounds {
                min_tile_x: x,
                min_tile_y: y,
                max_tile_x: max_x,
                max_tile_y: max_y,
            },
            Some(b) => MapBounds {
                min_tile_x: b.min_tile_x.min(x),
                min_tile_y: b.min_tile_y.min(y),
                max_tile_x: b.max_tile_x.max(max_x),
                max_tile_y: b.max_tile_y.max(max_y),
            },
        });
    }

    fn scan(&mut self, layers: &[IrLayer]) {
        for layer in layers {
            match &layer.kind {
                IrLayerKind::Tiles(TileData::Chunked { chunks }) => {
                    for c in chunks {
                        self.include(c.x, c.y, c.width, c.height);
                    }
                }
                IrLayerKind::Tiles(TileData::Finite { width, height, .. }) => {
                    self.include(0, 0, *width, *height);
                }
                IrLayerKind::Group { layers } => self.scan(layers),
                IrLayerKind::Objects { .. } | IrLayerKind::Image { .. } => {}
            }
        }
    }
}

/// Tile bounds of a map.
///
/// Finite maps are `[0, width-1] x [0, height-1]` without scanning. Infinite
/// maps scan every chunk of every tile layer, groups included; the declared
/// size is used only when no chunk exists at all.
pub fn compute_bounds(infinite: bool, width: u32, height: u32, layers: &[IrLayer]) -> MapBounds {
    if !infinite {
        return MapBounds::finite(width, height);
    }
    let mut acc = BoundsAccumulator::default();
    acc.scan(layers);
    match acc.bounds {
        Some(bounds) => {
            log::debug!(
                "infinite map bounds: ({}, {})..=({}, {})",
                bounds.min_tile_x,
                bounds.min_tile_y,
                bounds.max_tile_x,
                bounds.max_tile_y
            );
            bounds
        }
        None => MapBounds::finite(width, height),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir_map::{Chunk, Properties};
    use macroquad::prelude::*;

    fn chunk(x: i32, y: i32, w: u32, h: u32) -> Chunk {
        Chunk {
            x,
            y,
            width: w,
            height: h,
            data: vec![0; (w * h) as usize],
        }
    }

    fn tile_layer(name: &str, chunks: Vec<Chunk>) -> IrLayer {
        IrLayer {
            id: 1,
            name: name.into(),
            visible: true,
            opacity: 1.0,
            offset: Vec2::ZERO,
            parallax: Vec2::ONE,
            tint_color: None,
            properties: Properties::new(),
            kind: IrLayerKind::Tiles(TileData::Chunked { chunks }),
        }
    }

    #[test]
    fn chunk_scan_handles_negative_coordinates() {
        let layers = vec![tile_layer(
            "ground",
            vec![chunk(-5, -3, 10, 10), chunk(8, 8, 4, 4)],
        )];
        let b = compute_bounds(true, 30, 30, &layers);
        assert_eq!(
            b,
            MapBounds {
                min_tile_x: -5,
                min_tile_y: -3,
                max_tile_x: 11,
                max_tile_y: 11,
            }
        );
        assert_eq!((b.width(), b.height()), (17, 15));
        assert_eq!(b.to_grid(-5, -3), Some((0, 0)));
        assert_eq!(b.to_grid(12, 0), None);
    }

    #[test]
    fn extreme_sizes_do_not_overflow() {
        let huge = MapBounds::finite(u32::MAX, 3);
        assert_eq!(huge.max_tile_x, i32::MAX - 1);
        assert_eq!(huge.height(), 3);

        let b = compute_bounds(
            true,
            1,
            1,
            &[tile_layer("far", vec![
                chunk(i32::MIN, 0, 16, 16),
                chunk(i32::MAX - 7, 0, 16, 16),
            ])],
        );
        assert_eq!((b.min_tile_x, b.max_tile_x), (i32::MIN, i32::MAX));
        assert_eq!(b.width(), u32::MAX);
        assert_eq!(b.to_grid(i32::MAX - 1, 0), Some((u32::MAX - 1, 0)));
    }

    #[test]
    fn finite_map_ignores_layer_content() {
        let layers = vec![tile_layer("ground", vec![chunk(-16, -16, 16, 16)])];
        assert_eq!(compute_bounds(false, 4, 3, &layers), MapBounds::finite(4, 3));
    }

    #[test]
    fn nested_group_layers_are_scanned() {
        let mut group = tile_layer("group", Vec::new());
        group.kind = IrLayerKind::Group {
            layers: vec![tile_layer("inner", vec![chunk(32, -16, 16, 16)])],
        };
        let layers = vec![tile_layer("ground", vec![chunk(0, 0, 16, 16)]), group];
        let b = compute_bounds(true, 0, 0, &layers);
        assert_eq!((b.min_tile_x, b.min_tile_y, b.max_tile_x, b.max_tile_y), (0, -16, 47, 15));
    }

    #[test]
    fn infinite_map_without_chunks_falls_back_to_declared_size() {
        let b = compute_bounds(true, 0, 0, &[]);
        assert_eq!((b.width(), b.height()), (0, 0));
    }
}
