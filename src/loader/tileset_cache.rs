//! Shared cache of parsed external tileset documents.

use crate::error::MapError;
use crate::tileset::TilesetDef;
use normalize_path::NormalizePath;
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

type Slot = Arc<OnceCell<Arc<TilesetDef>>>;

/// Cache key for a tileset file: absolute, with `.` and `..` folded away.
///
/// Relative paths are anchored at the working directory first, so a leading
/// `..` climbs out of it instead of being dropped.
pub fn resolve_path(path: &Path) -> PathBuf {
    std::path::absolute(path)
        .unwrap_or_else(|_| path.to_path_buf())
        .normalize()
}

/// Parsed external tilesets keyed by normalized file path.
///
/// Lookups of already-loaded entries only take a read lock. Loading a missing
/// entry is serialized per key, so two loaders asking for the same file parse
/// it once while loads of different files proceed in parallel. Failed loads
/// are not cached.
#[derive(Default)]
pub struct TilesetCache {
    slots: RwLock<HashMap<PathBuf, Slot>>,
}

static GLOBAL: Lazy<TilesetCache> = Lazy::new(TilesetCache::new);

impl TilesetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache. Lives until process exit; call [`TilesetCache::clear`]
    /// to drop entries (e.g. after assets changed on disk).
    pub fn global() -> &'static TilesetCache {
        &GLOBAL
    }

    /// Returns the cached tileset for `path`, running `load` on a miss.
    pub fn get_or_load<F>(&self, path: &Path, load: F) -> Result<Arc<TilesetDef>, MapError>
    where
        F: FnOnce(&Path) -> Result<TilesetDef, MapError>,
    {
        let key = resolve_path(path);
        if let Some(def) = self.cached(&key) {
            log::debug!("tileset cache hit: {}", key.display());
            return Ok(def);
        }

        let slot = {
            let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        slot.get_or_try_init(|| {
            log::debug!("tileset cache miss: {}", key.display());
            load(&key).map(Arc::new)
        })
        .cloned()
    }

    /// Already-loaded entry for `path`, without loading.
    pub fn get(&self, path: &Path) -> Option<Arc<TilesetDef>> {
        self.cached(&resolve_path(path))
    }

    fn cached(&self, key: &Path) -> Option<Arc<TilesetDef>> {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.get(key).and_then(|slot| slot.get().cloned())
    }

    pub fn len(&self) -> usize {
        let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
        slots.values().filter(|slot| slot.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
