//! Tile-space math: cell IDs and GID resolution, map bounds, projections.

pub mod bounds;
pub mod coords;
pub mod gid;

pub use bounds::{compute_bounds, MapBounds};
pub use coords::Projection;
pub use gid::{
    find_tileset_for_gid, resolve_gid, GidResolver, ResolvedGid, TileId, FLIP_D, FLIP_H,
    FLIP_MASK, FLIP_V, GID_MASK,
};
