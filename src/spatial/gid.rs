use crate::tileset::Tileset;
use std::collections::HashMap;

pub const FLIP_H: u32 = 0x8000_0000; // bit 31
pub const FLIP_V: u32 = 0x4000_0000; // bit 30
pub const FLIP_D: u32 = 0x2000_0000; // bit 29
pub const FLIP_MASK: u32 = FLIP_H | FLIP_V | FLIP_D;
pub const GID_MASK: u32 = 0x1FFF_FFFF; // keep lower 29 bits

/// Raw cell value: 29-bit tile id plus three flip flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileId(pub u32);

impl TileId {
    #[inline] pub fn raw(self) -> u32 { self.0 }
    #[inline] pub fn clean(self) -> u32 { self.0 & GID_MASK }
    #[inline] pub fn flip_h(self) -> bool { (self.0 & FLIP_H) != 0 }
    #[inline] pub fn flip_v(self) -> bool { (self.0 & FLIP_V) != 0 }
    #[inline] pub fn flip_d(self) -> bool { (self.0 & FLIP_D) != 0 }
    #[inline] pub fn is_empty(self) -> bool { self.clean() == 0 }
}

/// Result of resolving one cell ID against a map's tilesets.
///
/// Flip flags are decoded independently of the tileset lookup, so an
/// unresolved GID still reports them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedGid<'a> {
    pub tileset: Option<&'a Tileset>,
    pub tileset_index: Option<usize>,
    pub local_id: u32,
    /// Atlas `(column, row)`; `None` for collection tilesets or unresolved GIDs.
    pub atlas: Option<(u32, u32)>,
    pub flip_h: bool,
    pub flip_v: bool,
    pub flip_d: bool,
}

impl ResolvedGid<'_> {
    pub fn is_valid(&self) -> bool {
        self.tileset.is_some()
    }
}

/// First tileset, in ascending `first_gid` order, whose range owns `gid`.
///
/// Linear in the number of tilesets. GID 0 never resolves.
pub fn find_tileset_for_gid(tilesets: &[Tileset], gid: u32) -> Option<(usize, &Tileset)> {
    let clean = gid & GID_MASK;
    if clean == 0 {
        return None;
    }
    tilesets
        .iter()
        .enumerate()
        .find(|(_, ts)| ts.contains_gid(clean))
}

pub fn resolve_gid(tilesets: &[Tileset], gid: u32) -> ResolvedGid<'_> {
    let found = find_tileset_for_gid(tilesets, gid);
    resolved_from(found, gid)
}

fn resolved_from(found: Option<(usize, &Tileset)>, gid: u32) -> ResolvedGid<'_> {
    let id = TileId(gid);
    let (tileset_index, tileset, local_id, atlas) = match found {
        Some((idx, ts)) => {
            let local = id.clean() - ts.first_gid;
            (Some(idx), Some(ts), local, ts.tile_coords(local))
        }
        None => (None, None, 0, None),
    };
    ResolvedGid {
        tileset,
        tileset_index,
        local_id,
        atlas,
        flip_h: id.flip_h(),
        flip_v: id.flip_v(),
        flip_d: id.flip_d(),
    }
}

/// Resolves each unique (masked) GID once and remembers the owning tileset.
pub struct GidResolver<'a> {
    tilesets: &'a [Tileset],
    owners: HashMap<u32, Option<usize>>,
}

impl<'a> GidResolver<'a> {
    pub fn new(tilesets: &'a [Tileset]) -> Self {
        Self {
            tilesets,
            owners: HashMap::new(),
        }
    }

    pub fn resolve(&mut self, gid: u32) -> ResolvedGid<'a> {
        let tilesets = self.tilesets;
        let owner = *self
            .owners
            .entry(gid & GID_MASK)
            .or_insert_with(|| find_tileset_for_gid(tilesets, gid).map(|(idx, _)| idx));
        resolved_from(owner.map(|idx| (idx, &tilesets[idx])), gid)
    }

    /// Number of distinct GIDs looked up so far.
    pub fn cached(&self) -> usize {
        self.owners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tileset::atlas_def;
    use std::sync::Arc;

    fn tilesets() -> Vec<Tileset> {
        vec![
            Tileset::new(1, None, Arc::new(atlas_def("ground", 8, 4))),
            // Gap between 9 and 19 owned by nobody.
            Tileset::new(20, None, Arc::new(atlas_def("props", 4, 0))),
        ]
    }

    #[test]
    fn gid_zero_is_no_tile() {
        let ts = tilesets();
        assert!(find_tileset_for_gid(&ts, 0).is_none());
        assert!(!resolve_gid(&ts, 0).is_valid());
        assert!(find_tileset_for_gid(&ts, FLIP_H).is_none());
    }

    #[test]
    fn resolves_across_non_contiguous_ranges() {
        let ts = tilesets();
        let r = resolve_gid(&ts, 6);
        assert_eq!(r.tileset_index, Some(0));
        assert_eq!(r.local_id, 5);
        assert_eq!(r.atlas, Some((1, 1)));

        let r = resolve_gid(&ts, 22);
        assert_eq!(r.tileset_index, Some(1));
        assert_eq!(r.local_id, 2);
        assert_eq!(r.atlas, None);

        assert!(!resolve_gid(&ts, 12).is_valid());
        assert!(!resolve_gid(&ts, 24).is_valid());
    }

    #[test]
    fn flip_flags_do_not_change_resolution() {
        let ts = tilesets();
        let plain = resolve_gid(&ts, 6);
        let flipped = resolve_gid(&ts, 6 | FLIP_H);
        assert_eq!(flipped.tileset_index, plain.tileset_index);
        assert_eq!(flipped.local_id, plain.local_id);
        assert!(flipped.flip_h);
        assert!(!flipped.flip_v && !flipped.flip_d);
    }

    #[test]
    fn unresolved_gid_still_reports_flags() {
        let ts = tilesets();
        let r = resolve_gid(&ts, 15 | FLIP_V | FLIP_D);
        assert!(!r.is_valid());
        assert!(r.flip_v && r.flip_d && !r.flip_h);
    }

    #[test]
    fn resolver_caches_per_masked_gid() {
        let ts = tilesets();
        let mut resolver = GidResolver::new(&ts);
        let a = resolver.resolve(3);
        let b = resolver.resolve(3 | FLIP_H);
        let miss = resolver.resolve(100);
        assert_eq!(a.local_id, b.local_id);
        assert!(b.flip_h && !a.flip_h);
        assert!(!miss.is_valid());
        assert_eq!(resolver.cached(), 2);
    }
}
