//! Parsed map → engine level.
//!
//! Conversion runs six phases in a fixed order, each filling one part of the
//! [`Level`]: configuration, metadata, visual layers, spatial structures,
//! entities with their relationships, and the resource catalog. Problems with
//! single objects are recorded in [`Level::warnings`]; earlier phases are never
//! undone.

pub mod config;
pub mod level;

pub use config::{matches_pattern, ConversionConfig};
pub use level::*;

use crate::error::{record, IssueContext, MapError, Warning};
use crate::ir_map::*;
use crate::loader::ParsedMap;
use crate::spatial::{GidResolver, Projection, GID_MASK};
use macroquad::prelude::*;
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

/// A non-group layer with its group ancestry folded in.
struct FlatLayer<'a> {
    layer: &'a IrLayer,
    offset: Vec2,
    parallax: Vec2,
    opacity: f32,
    visible: bool,
    z_order: usize,
}

fn flatten<'a>(
    layers: &'a [IrLayer],
    offset: Vec2,
    parallax: Vec2,
    opacity: f32,
    visible: bool,
    out: &mut Vec<FlatLayer<'a>>,
) {
    for layer in layers {
        let offset = offset + layer.offset;
        let parallax = parallax * layer.parallax;
        let opacity = opacity * layer.opacity;
        let visible = visible && layer.visible;
        match &layer.kind {
            IrLayerKind::Group { layers } => {
                flatten(layers, offset, parallax, opacity, visible, out)
            }
            _ => {
                let z_order = out.len();
                out.push(FlatLayer {
                    layer,
                    offset,
                    parallax,
                    opacity,
                    visible,
                    z_order,
                });
            }
        }
    }
}

fn rotate(v: Vec2, degrees: f32) -> Vec2 {
    if degrees == 0.0 {
        return v;
    }
    let (s, c) = degrees.to_radians().sin_cos();
    vec2(v.x * c - v.y * s, v.x * s + v.y * c)
}

fn rect_corners(r: Rect) -> Vec<Vec2> {
    vec![
        vec2(r.x, r.y),
        vec2(r.x + r.w, r.y),
        vec2(r.x + r.w, r.y + r.h),
        vec2(r.x, r.y + r.h),
    ]
}

fn categorize(obj: &IrObject) -> EntityCategory {
    if let Some(category) = obj
        .properties
        .get_string("category")
        .and_then(EntityCategory::parse)
    {
        return category;
    }
    if matches!(obj.shape, IrObjectShape::Polyline(_)) {
        EntityCategory::Patrol
    } else if obj.class_name.to_ascii_lowercase().starts_with("sound") {
        EntityCategory::Sound
    } else if obj.properties.get_bool("dynamic") == Some(true) {
        EntityCategory::Dynamic
    } else {
        EntityCategory::Static
    }
}

/// Folds `.` and `name/..` pairs without touching the filesystem. A `..` with
/// nothing left to pop is kept, so relative resources still point outside
/// their base directory.
fn fold_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                Some(Component::ParentDir | Component::CurDir) | None => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

fn object_context(layer: &str, obj: &IrObject) -> IssueContext {
    IssueContext::layer(layer).with_object(obj.id, &obj.name)
}

pub struct LevelConverter<'a> {
    map: &'a IrMap,
    source: &'a Path,
    config: &'a ConversionConfig,
    projection: Projection,
    layers: Vec<FlatLayer<'a>>,
    resolver: GidResolver<'a>,
    warnings: Vec<Warning>,
}

impl<'a> LevelConverter<'a> {
    pub fn new(parsed: &'a ParsedMap, config: &'a ConversionConfig) -> Self {
        Self::for_map(&parsed.map, &parsed.source, config)
    }

    pub fn for_map(map: &'a IrMap, source: &'a Path, config: &'a ConversionConfig) -> Self {
        let mut layers = Vec::new();
        flatten(&map.layers, Vec2::ZERO, Vec2::ONE, 1.0, true, &mut layers);
        Self {
            map,
            source,
            config,
            projection: Projection::new(map.orientation, map.tile_w, map.tile_h),
            layers,
            resolver: GidResolver::new(&map.tilesets),
            warnings: Vec::new(),
        }
    }

    pub fn convert(mut self) -> Level {
        log::debug!("converting {}", self.source.display());
        let config = self.level_config();
        let metadata = self.metadata();
        let (tile_grids, images) = self.visual_layers();
        let (collisions, sectors, mut patrols) = self.spatial();
        let (entities, relationships) = self.entities(&mut patrols);
        let resources = self.resources();
        log::info!(
            "converted {}: {} grids, {} entities, {} resources, {} warnings",
            self.source.display(),
            tile_grids.len(),
            entities.len(),
            resources.len(),
            self.warnings.len()
        );
        Level {
            config,
            metadata,
            tile_grids,
            images,
            collisions,
            sectors,
            patrols,
            entities,
            relationships,
            resources,
            warnings: self.warnings,
        }
    }

    fn level_config(&self) -> LevelConfig {
        log::debug!("phase 1: configuration");
        let bounds = self.map.bounds;
        LevelConfig {
            orientation: self.map.orientation,
            render_order: self.map.render_order.clone(),
            infinite: self.map.infinite,
            width: bounds.width(),
            height: bounds.height(),
            tile_w: self.map.tile_w,
            tile_h: self.map.tile_h,
            origin_tile: (bounds.min_tile_x, bounds.min_tile_y),
            background_color: self.map.background_color.clone(),
        }
    }

    fn metadata(&self) -> LevelMetadata {
        log::debug!("phase 2: metadata");
        LevelMetadata {
            source: self.source.to_path_buf(),
            properties: self.map.properties.clone(),
            tilesets: self.map.tilesets.iter().map(|t| t.name().to_owned()).collect(),
            layer_names: self.layers.iter().map(|l| l.layer.name.clone()).collect(),
        }
    }

    /// Tile layers become grids indexed from the map bounds' top-left tile;
    /// image layers are passed through.
    fn visual_layers(&mut self) -> (Vec<TileGrid>, Vec<ImagePlane>) {
        log::debug!("phase 3: visual layers");
        let bounds = self.map.bounds;
        let projection = self.projection;
        let resolver = &mut self.resolver;
        let warnings = &mut self.warnings;
        let mut grids = Vec::new();
        let mut images = Vec::new();

        for flat in &self.layers {
            let layer = flat.layer;
            match &layer.kind {
                IrLayerKind::Tiles(data) => {
                    let context = IssueContext::layer(&layer.name);
                    let mut cells = Vec::new();
                    let mut unknown = HashSet::new();
                    data.for_each_cell(|x, y, gid| {
                        if gid & GID_MASK == 0 {
                            return;
                        }
                        let Some((grid_x, grid_y)) = bounds.to_grid(x, y) else {
                            return;
                        };
                        let resolved = resolver.resolve(gid);
                        let (Some(tileset), Some(index)) = (resolved.tileset, resolved.tileset_index)
                        else {
                            // one warning per missing id and layer
                            if unknown.insert(gid & GID_MASK) {
                                record(
                                    warnings,
                                    context.clone(),
                                    MapError::UnknownGid { gid: gid & GID_MASK },
                                );
                            }
                            return;
                        };
                        let world = projection.tile_to_world(grid_x as i32, grid_y as i32)
                            + flat.offset
                            + tileset.def.tile_offset;
                        cells.push(TileCell {
                            grid_x,
                            grid_y,
                            gid,
                            tileset: index,
                            local_id: resolved.local_id,
                            atlas: resolved.atlas,
                            source: tileset.atlas_rect(resolved.local_id),
                            flip_h: resolved.flip_h,
                            flip_v: resolved.flip_v,
                            flip_d: resolved.flip_d,
                            world,
                        });
                    });
                    grids.push(TileGrid {
                        layer_id: layer.id,
                        name: layer.name.clone(),
                        z_order: flat.z_order,
                        visible: flat.visible,
                        opacity: flat.opacity,
                        parallax: flat.parallax,
                        offset: flat.offset,
                        width: bounds.width(),
                        height: bounds.height(),
                        cells,
                    });
                }
                IrLayerKind::Image {
                    image,
                    repeat_x,
                    repeat_y,
                } => images.push(ImagePlane {
                    name: layer.name.clone(),
                    z_order: flat.z_order,
                    image: PathBuf::from(image),
                    offset: flat.offset,
                    parallax: flat.parallax,
                    opacity: flat.opacity,
                    repeat_x: *repeat_x,
                    repeat_y: *repeat_y,
                }),
                IrLayerKind::Objects { .. } | IrLayerKind::Group { .. } => {}
            }
        }
        (grids, images)
    }

    /// World-space outline of an object. Shape points are relative to the
    /// object position and rotate with it before projection.
    fn outline(&self, obj: &IrObject, layer_offset: Vec2) -> Geometry {
        let projection = self.projection;
        let origin = obj.position();
        let to_world = |local: Vec2| {
            projection.object_to_world(origin + rotate(local, obj.rotation), layer_offset, Vec2::ZERO)
        };
        let size = vec2(obj.width, obj.height);
        let axis_aligned =
            projection.orientation == Orientation::Orthogonal && obj.rotation == 0.0;

        let local_box = match &obj.shape {
            IrObjectShape::Point => return Geometry::Point(to_world(Vec2::ZERO)),
            IrObjectShape::Polygon(points) => {
                return Geometry::Polygon(points.iter().map(|&p| to_world(p)).collect())
            }
            IrObjectShape::Polyline(points) => {
                return Geometry::Polyline(points.iter().map(|&p| to_world(p)).collect())
            }
            IrObjectShape::Ellipse if axis_aligned => {
                return Geometry::Ellipse {
                    center: to_world(size / 2.0),
                    radii: size / 2.0,
                }
            }
            // tile objects are anchored at their bottom-left corner
            IrObjectShape::Tile { .. } => Rect::new(0.0, -obj.height, obj.width, obj.height),
            IrObjectShape::Rectangle | IrObjectShape::Ellipse | IrObjectShape::Text { .. } => {
                Rect::new(0.0, 0.0, obj.width, obj.height)
            }
        };

        if axis_aligned {
            let top_left = to_world(local_box.point());
            Geometry::Rect(Rect::new(top_left.x, top_left.y, local_box.w, local_box.h))
        } else {
            Geometry::Polygon(rect_corners(local_box).into_iter().map(to_world).collect())
        }
    }

    fn spatial(&mut self) -> (Vec<CollisionShape>, Vec<Sector>, Vec<PatrolPath>) {
        log::debug!("phase 4: spatial structures");
        let mut collisions = Vec::new();
        let mut sectors = Vec::new();
        let mut patrols = Vec::new();
        let mut warnings = Vec::new();

        for flat in &self.layers {
            let IrLayerKind::Objects { objects } = &flat.layer.kind else {
                continue;
            };
            let name = &flat.layer.name;
            let collision = self.config.is_collision_layer(name);
            let sector = self.config.is_sector_layer(name);
            let patrol = self.config.is_patrol_layer(name);
            if !(collision || sector || patrol) {
                continue;
            }

            for obj in objects {
                let geometry = self.outline(obj, flat.offset);
                let unusable = |role: &str| MapError::MalformedNode {
                    node: "object",
                    reason: format!("{} object cannot be used as a {role}", obj.shape.kind_name()),
                };

                if sector {
                    let polygon = match &geometry {
                        Geometry::Polygon(points) => Some(points.clone()),
                        Geometry::Rect(r) => Some(rect_corners(*r)),
                        _ => None,
                    };
                    match polygon {
                        Some(polygon) => sectors.push(Sector {
                            object_id: obj.id,
                            name: obj.name.clone(),
                            polygon,
                            properties: obj.properties.clone(),
                        }),
                        None => record(&mut warnings, object_context(name, obj), unusable("sector")),
                    }
                }
                if patrol {
                    let path = match &geometry {
                        Geometry::Polyline(points) => Some((points.clone(), false)),
                        Geometry::Polygon(points) => Some((points.clone(), true)),
                        _ => None,
                    };
                    match path {
                        Some((points, closed)) => patrols.push(PatrolPath {
                            object_id: obj.id,
                            name: obj.name.clone(),
                            points,
                            closed,
                            owner: None,
                        }),
                        None => record(&mut warnings, object_context(name, obj), unusable("patrol path")),
                    }
                }
                if collision {
                    collisions.push(CollisionShape {
                        object_id: obj.id,
                        layer: name.clone(),
                        geometry,
                        properties: obj.properties.clone(),
                    });
                }
            }
        }
        self.warnings.append(&mut warnings);
        (collisions, sectors, patrols)
    }

    /// Objects outside collision and sector layers become entities. Object
    /// references from every layer become relationships.
    fn entities(&mut self, patrols: &mut [PatrolPath]) -> (Vec<EntityDescriptor>, Vec<Relationship>) {
        log::debug!("phase 5: entities and relationships");
        let known: HashSet<u32> = self
            .layers
            .iter()
            .filter_map(|flat| match &flat.layer.kind {
                IrLayerKind::Objects { objects } => Some(objects.iter().map(|o| o.id)),
                _ => None,
            })
            .flatten()
            .collect();

        let mut entities = Vec::new();
        let mut relationships = Vec::new();
        let resolver = &mut self.resolver;
        let warnings = &mut self.warnings;

        for flat in &self.layers {
            let IrLayerKind::Objects { objects } = &flat.layer.kind else {
                continue;
            };
            let name = &flat.layer.name;
            let geometry_only =
                self.config.is_collision_layer(name) || self.config.is_sector_layer(name);

            for obj in objects {
                for (property, value) in obj.properties.iter() {
                    let PropertyValue::Object(to) = *value else {
                        continue;
                    };
                    if to == 0 {
                        continue;
                    }
                    if known.contains(&to) {
                        relationships.push(Relationship {
                            from: obj.id,
                            property: property.to_owned(),
                            to,
                        });
                    } else {
                        record(
                            warnings,
                            object_context(name, obj),
                            MapError::DanglingReference {
                                from: obj.id,
                                property: property.to_owned(),
                                to,
                            },
                        );
                    }
                }
                if geometry_only {
                    continue;
                }

                let prefab = match self.config.prefab_for(&obj.class_name) {
                    Some(prefab) => prefab.to_owned(),
                    None => {
                        if !obj.class_name.is_empty() {
                            record(
                                warnings,
                                object_context(name, obj),
                                MapError::MissingPrefab {
                                    object_type: obj.class_name.clone(),
                                },
                            );
                        }
                        self.config.default_prefab.clone()
                    }
                };

                let mut tile = None;
                let mut tile_offset = Vec2::ZERO;
                if let IrObjectShape::Tile { gid } = obj.shape {
                    let resolved = resolver.resolve(gid);
                    match (resolved.tileset, resolved.tileset_index) {
                        (Some(tileset), Some(index)) => {
                            tile_offset = tileset.def.tile_offset;
                            tile = Some(TileRef {
                                gid,
                                tileset: index,
                                local_id: resolved.local_id,
                            });
                        }
                        _ => record(
                            warnings,
                            object_context(name, obj),
                            MapError::UnknownGid { gid: gid & GID_MASK },
                        ),
                    }
                }

                entities.push(EntityDescriptor {
                    object_id: obj.id,
                    name: obj.name.clone(),
                    object_type: obj.class_name.clone(),
                    category: categorize(obj),
                    prefab,
                    layer: name.clone(),
                    z_order: flat.z_order,
                    position: self
                        .projection
                        .object_to_world(obj.position(), flat.offset, tile_offset),
                    size: vec2(obj.width, obj.height),
                    rotation: obj.rotation,
                    visible: flat.visible && obj.visible,
                    tile,
                    properties: obj.properties.clone(),
                });
            }
        }

        for rel in &relationships {
            if let Some(path) = patrols
                .iter_mut()
                .find(|p| p.object_id == rel.to && p.owner.is_none())
            {
                path.owner = Some(rel.from);
            }
        }
        (entities, relationships)
    }

    /// Images referenced by tilesets and image layers, relative to the map
    /// directory and joined onto the configured base path.
    fn resources(&self) -> Vec<PathBuf> {
        log::debug!("phase 6: resources");
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut add = |relative: PathBuf| {
            let full = fold_path(&self.config.resource_base_path.join(relative));
            if seen.insert(full.clone()) {
                out.push(full);
            }
        };

        for tileset in &self.map.tilesets {
            let base = tileset.image_base();
            for image in tileset.image_paths() {
                add(base.join(image));
            }
        }
        for flat in &self.layers {
            if let IrLayerKind::Image { image, .. } = &flat.layer.kind {
                if !image.is_empty() {
                    add(PathBuf::from(image));
                }
            }
        }
        out
    }
}

/// Runs the full conversion for a parsed map.
pub fn convert(parsed: &ParsedMap, config: &ConversionConfig) -> Level {
    LevelConverter::new(parsed, config).convert()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::loader::{DocumentFormat, MapLoader, TilesetCache};

    fn parse(json: &str) -> ParsedMap {
        let cache = TilesetCache::new();
        MapLoader::new(&cache)
            .load_str(json, DocumentFormat::Json, "levels/test.tmj")
            .expect("decode")
    }

    fn close(a: Vec2, b: Vec2, tol: f32) -> bool {
        (a - b).abs().max_element() <= tol
    }

    const ORTHO: &str = r#"{
      "orientation": "orthogonal",
      "width": 3, "height": 2, "tilewidth": 16, "tileheight": 16,
      "tilesets": [
        {"firstgid": 1, "name": "ground", "tilewidth": 16, "tileheight": 16,
         "tilecount": 4, "columns": 2, "image": "../art/ground.png",
         "imagewidth": 32, "imageheight": 32, "tileoffset": {"x": 0, "y": -4}}
      ],
      "layers": [
        {"type": "tilelayer", "name": "floor", "width": 3, "height": 2,
         "data": [1, 2, 0, 2147483652, 99, 99]},
        {"type": "group", "name": "actors", "offsetx": 10, "offsety": 20, "layers": [
          {"type": "objectgroup", "name": "things", "offsetx": 1, "objects": [
            {"id": 1, "name": "hero", "type": "player", "x": 32, "y": 48,
             "properties": [{"name": "route", "type": "object", "value": 5}]},
            {"id": 2, "name": "crate", "type": "crate", "x": 0, "y": 0,
             "properties": [{"name": "dynamic", "type": "bool", "value": true}]},
            {"id": 3, "type": "soundEmitter", "x": 0, "y": 0},
            {"id": 4, "x": 0, "y": 0,
             "properties": [{"name": "ghost", "type": "object", "value": 77}]}
          ]}
        ]},
        {"type": "objectgroup", "name": "Patrols", "objects": [
          {"id": 5, "name": "loop", "x": 0, "y": 0,
           "polyline": [{"x": 0, "y": 0}, {"x": 16, "y": 0}]}
        ]},
        {"type": "objectgroup", "name": "collision_walls", "objects": [
          {"id": 6, "x": 16, "y": 16, "width": 32, "height": 8},
          {"id": 7, "x": 0, "y": 0, "width": 10, "height": 10, "rotation": 90}
        ]},
        {"type": "imagelayer", "name": "sky", "image": "../art/sky.png"},
        {"type": "imagelayer", "name": "sky2", "image": "../art/./sky.png"}
      ]
    }"#;

    fn ortho_config() -> ConversionConfig {
        ConversionConfig::from_json_str(
            r#"{
              "prefabs": {"player": "prefabs/player.ron", "crate": "prefabs/crate.ron"},
              "default_prefab": "prefabs/marker.ron",
              "collision_layers": ["collision*"],
              "patrol_layers": ["patrol*"],
              "resource_base_path": "assets/levels"
            }"#,
        )
        .expect("config")
    }

    #[test]
    fn path_folding_keeps_unresolved_parent_dirs() {
        assert_eq!(fold_path(Path::new("../art/./sky.png")), PathBuf::from("../art/sky.png"));
        assert_eq!(fold_path(Path::new("a/../../b.png")), PathBuf::from("../b.png"));
        assert_eq!(fold_path(Path::new("base/levels/../art/x.png")), PathBuf::from("base/art/x.png"));
        assert_eq!(fold_path(Path::new("/../x.png")), PathBuf::from("/x.png"));
    }

    #[test]
    fn resources_without_base_path_stay_relative_to_the_map() {
        let parsed = parse(
            r#"{
              "width": 1, "height": 1, "tilewidth": 8, "tileheight": 8,
              "layers": [{"type": "imagelayer", "name": "sky", "image": "../art/sky.png"}]
            }"#,
        );
        let level = convert(&parsed, &ConversionConfig::default());
        assert_eq!(level.resources, vec![PathBuf::from("../art/sky.png")]);
    }

    #[test]
    fn orthogonal_level() {
        let parsed = parse(ORTHO);
        let config = ortho_config();
        let level = convert(&parsed, &config);

        assert_eq!(level.config.width, 3);
        assert_eq!(level.metadata.tilesets, vec!["ground".to_owned()]);
        assert_eq!(
            level.metadata.layer_names,
            vec!["floor", "things", "Patrols", "collision_walls", "sky", "sky2"]
        );

        let floor = level.grid("floor").expect("floor grid");
        assert_eq!(floor.cells.len(), 3);
        let flipped = floor.cell(0, 1).expect("flipped cell");
        assert!(flipped.flip_h && !flipped.flip_v);
        assert_eq!(flipped.local_id, 3);
        assert_eq!(flipped.atlas, Some((1, 1)));
        assert_eq!(flipped.source, Some(Rect::new(16.0, 16.0, 16.0, 16.0)));
        assert_eq!(flipped.world, vec2(0.0, 12.0));
        let unknown: Vec<_> = level
            .warnings
            .iter()
            .filter(|w| matches!(w.error, MapError::UnknownGid { gid: 99 }))
            .collect();
        assert_eq!(unknown.len(), 1);

        let hero = level.entity(1).expect("hero");
        assert_eq!(hero.prefab, "prefabs/player.ron");
        assert_eq!(hero.position, vec2(43.0, 68.0));
        assert_eq!(hero.z_order, 1);
        assert_eq!(hero.category, EntityCategory::Static);
        assert_eq!(level.entity(2).map(|e| e.category), Some(EntityCategory::Dynamic));
        assert_eq!(level.entity(3).map(|e| e.category), Some(EntityCategory::Sound));
        assert_eq!(level.entity(5).map(|e| e.category), Some(EntityCategory::Patrol));
        assert_eq!(
            level.entity(3).map(|e| e.prefab.as_str()),
            Some("prefabs/marker.ron")
        );
        assert!(level.entity(6).is_none());

        assert_eq!(
            level.relationships,
            vec![Relationship {
                from: 1,
                property: "route".into(),
                to: 5
            }]
        );
        assert_eq!(level.patrols.len(), 1);
        assert_eq!(level.patrols[0].owner, Some(1));
        assert!(!level.patrols[0].closed);

        assert_eq!(level.collisions.len(), 2);
        assert_eq!(
            level.collisions[0].geometry,
            Geometry::Rect(Rect::new(16.0, 16.0, 32.0, 8.0))
        );
        let Geometry::Polygon(rotated) = &level.collisions[1].geometry else {
            panic!("rotated rectangle should become a polygon");
        };
        assert!(close(rotated[1], vec2(0.0, 10.0), 1e-4));

        let kinds: Vec<_> = level.warnings.iter().map(|w| &w.error).collect();
        assert!(kinds
            .iter()
            .any(|e| matches!(e, MapError::MissingPrefab { object_type } if object_type == "soundEmitter")));
        assert!(kinds
            .iter()
            .any(|e| matches!(e, MapError::DanglingReference { from: 4, to: 77, .. })));
        assert!(level
            .warnings
            .iter()
            .all(|w| w.kind() == ErrorKind::ResolutionMiss));

        assert_eq!(
            level.resources,
            vec![
                PathBuf::from("assets/art/ground.png"),
                PathBuf::from("assets/art/sky.png")
            ]
        );
    }

    #[test]
    fn isometric_object_lands_on_documented_world_position() {
        let parsed = parse(
            r#"{
              "orientation": "isometric",
              "width": 100, "height": 100, "tilewidth": 58, "tileheight": 27,
              "layers": [
                {"type": "objectgroup", "name": "spawns", "objects": [
                  {"id": 1, "x": 1818.4, "y": 1064.26}
                ]}
              ]
            }"#,
        );
        let level = convert(&parsed, &ConversionConfig::default());
        let spawn = level.entity(1).expect("spawn");
        assert!(close(spawn.position, vec2(810.15, 1441.0), 0.5), "{:?}", spawn.position);
        assert!(level.warnings.is_empty());
    }

    #[test]
    fn infinite_chunks_are_rebased_to_grid_origin() {
        let parsed = parse(
            r#"{
              "orientation": "orthogonal", "infinite": true,
              "width": 1, "height": 1, "tilewidth": 8, "tileheight": 8,
              "tilesets": [{"firstgid": 1, "name": "t", "tilewidth": 8, "tileheight": 8,
                            "tilecount": 1, "columns": 1, "image": "t.png",
                            "imagewidth": 8, "imageheight": 8}],
              "layers": [
                {"type": "tilelayer", "name": "ground", "chunks": [
                  {"x": -4, "y": -2, "width": 2, "height": 1, "data": [1, 0]},
                  {"x": 2, "y": 3, "width": 1, "height": 1, "data": [1]}
                ]}
              ]
            }"#,
        );
        let level = convert(&parsed, &ConversionConfig::default());
        assert_eq!(level.config.origin_tile, (-4, -2));
        assert_eq!((level.config.width, level.config.height), (7, 6));
        let ground = level.grid("ground").expect("grid");
        assert_eq!(ground.cell(0, 0).map(|c| c.world), Some(vec2(0.0, 0.0)));
        assert_eq!(ground.cell(6, 5).map(|c| c.world), Some(vec2(48.0, 40.0)));
        assert_eq!(ground.cells.len(), 2);
    }

    #[test]
    fn hidden_groups_hide_their_children() {
        let parsed = parse(
            r#"{
              "width": 1, "height": 1, "tilewidth": 8, "tileheight": 8,
              "layers": [
                {"type": "group", "name": "g", "visible": false, "opacity": 0.5, "layers": [
                  {"type": "tilelayer", "name": "inner", "width": 1, "height": 1,
                   "data": [0], "opacity": 0.5}
                ]}
              ]
            }"#,
        );
        let level = convert(&parsed, &ConversionConfig::default());
        let inner = level.grid("inner").expect("grid");
        assert!(!inner.visible);
        assert_eq!(inner.opacity, 0.25);
        assert_eq!(inner.z_order, 0);
    }

    #[test]
    fn explicit_category_wins() {
        let obj = IrObject {
            id: 1,
            name: String::new(),
            class_name: "soundSource".into(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            rotation: 0.0,
            visible: true,
            shape: IrObjectShape::Polyline(vec![Vec2::ZERO]),
            properties: {
                let mut p = Properties::new();
                p.insert("category".into(), PropertyValue::String("Dynamic".into()));
                p
            },
        };
        assert_eq!(categorize(&obj), EntityCategory::Dynamic);
    }
}
