//! Document parser: map files (JSON or XML) into [`IrMap`].

pub mod json_loader;
pub mod tileset_cache;
pub mod xml_loader;

use crate::codec::{check_cell_count, DecodedTiles};
use crate::error::{record, DecodeError, IssueContext, MapError, Warning};
use crate::ir_map::{IrLayer, IrMap, Orientation, Properties};
use crate::spatial::compute_bounds;
use crate::tileset::{Tileset, TilesetDef};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use tileset_cache::{resolve_path, TilesetCache};

/// Source document syntax, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    Json,
    Xml,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self, MapError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json" | "tmj" | "tsj") => Ok(DocumentFormat::Json),
            Some("tmx" | "tsx" | "xml") => Ok(DocumentFormat::Xml),
            _ => Err(MapError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Output of one parse pass.
#[derive(Debug)]
pub struct ParsedMap {
    pub map: IrMap,
    /// Path of the map document (virtual for in-memory loads).
    pub source: PathBuf,
    /// Directory that relative tileset and image paths resolve against.
    pub map_dir: PathBuf,
    /// Everything that was skipped or defaulted while parsing.
    pub warnings: Vec<Warning>,
}

/// Map-level attributes shared by both document syntaxes.
pub(crate) struct MapHeader {
    pub orientation: Orientation,
    pub render_order: String,
    pub width: u32,
    pub height: u32,
    pub tile_w: u32,
    pub tile_h: u32,
    pub infinite: bool,
    pub background_color: Option<String>,
    pub properties: Properties,
}

/// State carried through one parse pass.
pub(crate) struct LoadSession<'c> {
    pub map_path: PathBuf,
    pub map_dir: PathBuf,
    pub cache: &'c TilesetCache,
    pub warnings: Vec<Warning>,
}

impl<'c> LoadSession<'c> {
    pub fn new(map_path: &Path, cache: &'c TilesetCache) -> Self {
        let map_dir = map_path
            .parent()
            .map(|d| d.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./"));
        Self {
            map_path: map_path.to_path_buf(),
            map_dir,
            cache,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, context: IssueContext, error: impl Into<MapError>) {
        record(&mut self.warnings, context, error);
    }

    /// Turns a decode result into exactly `expected` cells.
    ///
    /// Skipped CSV tokens become empty cells at their original position so the
    /// row layout survives. Fatal decode errors and size mismatches drop the
    /// layer or chunk (`None`).
    pub fn cells(
        &mut self,
        decoded: Result<DecodedTiles, DecodeError>,
        expected: usize,
        context: &IssueContext,
    ) -> Option<Vec<u32>> {
        let decoded = match decoded {
            Ok(decoded) => decoded,
            Err(err) => {
                self.warn(context.clone(), err);
                return None;
            }
        };
        for token in &decoded.token_errors {
            self.warn(context.clone(), token.clone());
        }
        let gids = decoded.with_gaps_filled();
        if let Err(err) = check_cell_count(&gids, expected) {
            self.warn(context.clone(), err);
            return None;
        }
        Some(gids)
    }

    /// Loads an external tileset through the cache. Failures are recorded and
    /// the tileset is skipped.
    pub fn external_tileset(&mut self, first_gid: u32, source: &str) -> Option<Tileset> {
        let path = resolve_path(&self.map_dir.join(source));
        let context = IssueContext::tileset(source);
        if path == resolve_path(&self.map_path) {
            self.warn(context, MapError::CircularTileset { path });
            return None;
        }

        let mut nested = Vec::new();
        let loaded = self
            .cache
            .get_or_load(&path, |p| load_tileset_file(p, &mut nested));
        for warning in nested {
            self.warnings.push(warning);
        }
        match loaded {
            Ok(def) => Some(Tileset::new(first_gid, Some(source.to_owned()), def)),
            Err(err) => {
                self.warn(
                    context,
                    MapError::MissingTileset {
                        path,
                        source: Box::new(err),
                    },
                );
                None
            }
        }
    }

    pub fn embedded_tileset(&self, first_gid: u32, def: TilesetDef) -> Tileset {
        Tileset::new(first_gid, None, Arc::new(def))
    }

    /// Orders tilesets, computes bounds and hands back the finished parse.
    pub fn finish(
        mut self,
        header: MapHeader,
        mut tilesets: Vec<Tileset>,
        layers: Vec<IrLayer>,
    ) -> ParsedMap {
        // Sort by first_gid so range lookups can scan in order.
        tilesets.sort_by_key(|t| t.first_gid);
        for pair in tilesets.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if prev.tile_count() > 0 && next.first_gid <= prev.last_gid() {
                self.warn(
                    IssueContext::tileset(next.name()),
                    MapError::MalformedNode {
                        node: "tileset",
                        reason: format!(
                            "GID range starting at {} overlaps '{}' ({}..={})",
                            next.first_gid,
                            prev.name(),
                            prev.first_gid,
                            prev.last_gid()
                        ),
                    },
                );
            }
        }

        let bounds = compute_bounds(header.infinite, header.width, header.height, &layers);
        log::info!(
            "loaded map {} ({} layers, {} tilesets, {} warnings)",
            self.map_path.display(),
            layers.len(),
            tilesets.len(),
            self.warnings.len()
        );
        ParsedMap {
            map: IrMap {
                orientation: header.orientation,
                render_order: header.render_order,
                width: header.width,
                height: header.height,
                tile_w: header.tile_w,
                tile_h: header.tile_h,
                infinite: header.infinite,
                background_color: header.background_color,
                properties: header.properties,
                tilesets,
                layers,
                bounds,
            },
            source: self.map_path,
            map_dir: self.map_dir,
            warnings: self.warnings,
        }
    }
}

/// Rejects chunks whose last tile would lie past `i32::MAX` on either axis.
pub(crate) fn check_chunk_extent(x: i32, y: i32, width: u32, height: u32) -> Result<(), MapError> {
    let fits = |start: i32, len: u32| i64::from(start) + i64::from(len) - 1 <= i64::from(i32::MAX);
    if fits(x, width) && fits(y, height) {
        Ok(())
    } else {
        Err(MapError::MalformedNode {
            node: "chunk",
            reason: format!("{width}x{height} chunk at ({x}, {y}) runs past the tile coordinate range"),
        })
    }
}

/// Reads and parses a tileset document, format chosen by extension.
pub fn load_tileset_file(path: &Path, warnings: &mut Vec<Warning>) -> Result<TilesetDef, MapError> {
    let format = DocumentFormat::from_path(path)?;
    let txt = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match format {
        DocumentFormat::Json => json_loader::parse_tileset_document(&txt, path, warnings),
        DocumentFormat::Xml => xml_loader::parse_tileset_document(&txt, path, warnings),
    }
}

/// Entry point for loading maps. Holds the injected tileset cache and the last
/// fatal error message.
pub struct MapLoader<'c> {
    cache: &'c TilesetCache,
    last_error: Option<String>,
}

impl MapLoader<'static> {
    /// Loader backed by [`TilesetCache::global`].
    pub fn with_global_cache() -> Self {
        Self::new(TilesetCache::global())
    }
}

impl<'c> MapLoader<'c> {
    pub fn new(cache: &'c TilesetCache) -> Self {
        Self {
            cache,
            last_error: None,
        }
    }

    pub fn cache(&self) -> &'c TilesetCache {
        self.cache
    }

    /// Message of the most recent fatal error, cleared by a successful load.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Reads the whole file, then parses it.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<ParsedMap, MapError> {
        let path = path.as_ref();
        log::debug!("loading map {}", path.display());
        let result = DocumentFormat::from_path(path).and_then(|format| {
            let txt = std::fs::read_to_string(path).map_err(|source| MapError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            self.parse(&txt, format, path)
        });
        self.track(result)
    }

    /// Parses an in-memory document. `virtual_path` only anchors relative
    /// tileset paths and names the document in errors.
    pub fn load_str(
        &mut self,
        text: &str,
        format: DocumentFormat,
        virtual_path: impl AsRef<Path>,
    ) -> Result<ParsedMap, MapError> {
        let result = self.parse(text, format, virtual_path.as_ref());
        self.track(result)
    }

    fn parse(&self, text: &str, format: DocumentFormat, path: &Path) -> Result<ParsedMap, MapError> {
        let session = LoadSession::new(path, self.cache);
        match format {
            DocumentFormat::Json => json_loader::parse_map_document(text, session),
            DocumentFormat::Xml => xml_loader::parse_map_document(text, session),
        }
    }

    fn track(&mut self, result: Result<ParsedMap, MapError>) -> Result<ParsedMap, MapError> {
        match &result {
            Ok(_) => self.last_error = None,
            Err(err) => {
                log::error!("map load failed: {err}");
                self.last_error = Some(err.to_string());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_csv;

    #[test]
    fn chunk_extent_must_fit_tile_space() {
        assert!(check_chunk_extent(-16, 0, 16, 16).is_ok());
        assert!(check_chunk_extent(i32::MAX - 15, 0, 16, 16).is_ok());
        assert!(check_chunk_extent(i32::MIN, i32::MIN, u32::MAX, 0).is_ok());
        let err = check_chunk_extent(2_147_483_640, 0, 16, 16).unwrap_err();
        assert!(matches!(err, MapError::MalformedNode { node: "chunk", .. }));
        assert!(check_chunk_extent(0, i32::MAX, 1, 2).is_err());
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/level.tmj")).unwrap(),
            DocumentFormat::Json
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("level.tmx")).unwrap(),
            DocumentFormat::Xml
        );
        assert!(matches!(
            DocumentFormat::from_path(Path::new("level.txt")),
            Err(MapError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn session_drops_layers_with_wrong_cell_count() {
        let cache = TilesetCache::new();
        let mut session = LoadSession::new(Path::new("maps/level.tmj"), &cache);
        let ctx = IssueContext::layer("ground");
        let decoded = decode_csv(&vec!["1"; 99].join(","));
        assert!(session.cells(Ok(decoded), 100, &ctx).is_none());
        assert_eq!(session.warnings.len(), 1);
        assert!(matches!(
            session.warnings[0].error,
            MapError::TileData(DecodeError::SizeMismatch {
                expected: 100,
                actual: 99
            })
        ));
    }

    #[test]
    fn session_keeps_layer_with_bad_token() {
        let cache = TilesetCache::new();
        let mut session = LoadSession::new(Path::new("level.tmj"), &cache);
        let ctx = IssueContext::layer("ground");
        let cells = session.cells(Ok(decode_csv("1,2,x,4")), 4, &ctx);
        assert_eq!(cells, Some(vec![1, 2, 0, 4]));
        assert_eq!(session.warnings.len(), 1);
        assert_eq!(session.warnings[0].kind(), crate::ErrorKind::MalformedInput);
    }
}
