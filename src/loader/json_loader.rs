// src/loader/json_loader.rs
use super::{check_chunk_extent, LoadSession, MapHeader, ParsedMap};
use crate::codec::{self, parse_cell_token, DecodedTiles};
use crate::error::{record, DecodeError, IssueContext, MapError, TokenError, TokenErrorReason, Warning};
use crate::ir_map::*;
use crate::tileset::{TileMeta, Tileset, TilesetDef};
use macroquad::prelude::*;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::Path;

#[derive(Deserialize)]
struct JsonLayer {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default = "one")]
    opacity: f32,
    #[serde(default)]
    offsetx: f32,
    #[serde(default)]
    offsety: f32,
    #[serde(default = "one")]
    parallaxx: f32,
    #[serde(default = "one")]
    parallaxy: f32,
    #[serde(default)]
    tintcolor: Option<String>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    // tilelayer
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    #[serde(default)]
    data: Option<JsonValue>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    compression: Option<String>,
    #[serde(default)]
    chunks: Vec<JsonValue>,
    // objectgroup
    #[serde(default)]
    objects: Vec<JsonValue>,
    // imagelayer
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    repeatx: bool,
    #[serde(default)]
    repeaty: bool,
    // group
    #[serde(default)]
    layers: Vec<JsonValue>,
}

fn default_true() -> bool {
    true
}
fn one() -> f32 {
    1.0
}
fn orthogonal() -> String {
    "orthogonal".to_owned()
}
fn right_down() -> String {
    "right-down".to_owned()
}

#[derive(Deserialize)]
struct JsonChunk {
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    data: JsonValue,
}

#[derive(Deserialize)]
struct JsonMap {
    #[serde(default = "orthogonal")]
    orientation: String,
    #[serde(default = "right_down")]
    renderorder: String,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    tilewidth: Option<u32>,
    tileheight: Option<u32>,
    #[serde(default)]
    infinite: bool,
    #[serde(default)]
    backgroundcolor: Option<String>,
    layers: Option<Vec<JsonValue>>,
    #[serde(default)]
    tilesets: Vec<JsonValue>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonTilesetRef {
    firstgid: u32,
    #[serde(default)]
    source: Option<String>,
}

#[derive(Deserialize)]
struct JsonTileset {
    #[serde(default)]
    name: String,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    tilecount: Option<u32>,
    #[serde(default)]
    columns: Option<u32>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    imagewidth: u32,
    #[serde(default)]
    imageheight: u32,
    #[serde(default)]
    spacing: u32,
    #[serde(default)]
    margin: u32,
    #[serde(default)]
    tileoffset: Option<JsonObjectPoint>,
    #[serde(default)]
    objectalignment: Option<String>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    tiles: Vec<JsonTile>,
}

#[derive(Deserialize)]
struct JsonProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    value: JsonValue,
}

#[derive(Deserialize)]
struct JsonObject {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    point: bool,
    #[serde(default)]
    ellipse: bool,
    #[serde(default)]
    polygon: Option<Vec<JsonObjectPoint>>,
    #[serde(default)]
    polyline: Option<Vec<JsonObjectPoint>>,
    #[serde(default)]
    text: Option<JsonText>,
    #[serde(default)]
    gid: Option<u32>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonObjectPoint {
    x: f32,
    y: f32,
}

#[derive(Deserialize)]
struct JsonText {
    #[serde(default)]
    text: String,
    #[serde(default)]
    wrap: bool,
}

#[derive(Deserialize, Default)]
struct JsonObjectGroup {
    #[serde(default)]
    objects: Vec<JsonValue>,
}

#[derive(Deserialize)]
struct JsonTile {
    id: u32,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    imagewidth: u32,
    #[serde(default)]
    imageheight: u32,
    #[serde(default)]
    objectgroup: Option<JsonObjectGroup>,
}

fn json_property_to_ir(prop: JsonProperty) -> Result<Option<(String, PropertyValue)>, MapError> {
    let JsonProperty { name, kind, value } = prop;

    let parsed = match kind.as_deref() {
        Some("bool") => value.as_bool().map(PropertyValue::Bool),
        Some("int") => value.as_i64().map(PropertyValue::I64),
        Some("object") => value
            .as_u64()
            .and_then(|id| u32::try_from(id).ok())
            .map(PropertyValue::Object),
        Some("float") => value.as_f64().map(|n| PropertyValue::F32(n as f32)),
        Some("string") => value.as_str().map(|s| PropertyValue::String(s.to_owned())),
        Some("file") => value.as_str().map(|s| PropertyValue::File(s.to_owned())),
        Some("color") => value.as_str().map(|s| PropertyValue::Color(s.to_owned())),
        Some("class") => Some(PropertyValue::Class(class_members_to_ir(&value))),
        Some(other) => {
            return Err(MapError::UnsupportedPropertyType {
                name,
                kind: other.to_owned(),
            });
        }
        None => untyped_value_to_ir(&value),
    };

    Ok(parsed.map(|value| (name, value)))
}

fn untyped_value_to_ir(value: &JsonValue) -> Option<PropertyValue> {
    if let Some(v) = value.as_bool() {
        Some(PropertyValue::Bool(v))
    } else if let Some(v) = value.as_i64() {
        Some(PropertyValue::I64(v))
    } else if let Some(v) = value.as_f64() {
        Some(PropertyValue::F32(v as f32))
    } else if value.is_object() {
        Some(PropertyValue::Class(class_members_to_ir(value)))
    } else {
        value.as_str().map(|s| PropertyValue::String(s.to_owned()))
    }
}

/// Class values are stored as a bare `{member: value}` object without types.
fn class_members_to_ir(value: &JsonValue) -> Properties {
    let mut out = Properties::new();
    if let Some(members) = value.as_object() {
        for (name, member) in members {
            if let Some(v) = untyped_value_to_ir(member) {
                out.insert(name.clone(), v);
            }
        }
    }
    out
}

fn properties_from_json(
    props: Vec<JsonProperty>,
    warnings: &mut Vec<Warning>,
    context: &IssueContext,
) -> Properties {
    let mut out = Properties::new();
    for p in props {
        match json_property_to_ir(p) {
            Ok(Some((name, value))) => out.insert(name, value),
            Ok(None) => {}
            Err(err) => record(warnings, context.clone(), err),
        }
    }
    out
}

fn object_to_ir(obj: JsonObject, warnings: &mut Vec<Warning>, context: &IssueContext) -> IrObject {
    let context = context.clone().with_object(obj.id, &obj.name);
    let shape = if let Some(gid) = obj.gid {
        IrObjectShape::Tile { gid }
    } else if obj.point {
        IrObjectShape::Point
    } else if obj.ellipse {
        IrObjectShape::Ellipse
    } else if let Some(points) = obj.polygon {
        IrObjectShape::Polygon(points.into_iter().map(|p| vec2(p.x, p.y)).collect())
    } else if let Some(points) = obj.polyline {
        IrObjectShape::Polyline(points.into_iter().map(|p| vec2(p.x, p.y)).collect())
    } else if let Some(text) = obj.text {
        IrObjectShape::Text {
            text: text.text,
            wrap: text.wrap,
        }
    } else {
        IrObjectShape::Rectangle
    };

    let class_name = if !obj.class.is_empty() {
        obj.class
    } else {
        obj.kind
    };

    IrObject {
        id: obj.id,
        name: obj.name,
        class_name,
        x: obj.x,
        y: obj.y,
        width: obj.width,
        height: obj.height,
        rotation: obj.rotation,
        visible: obj.visible,
        shape,
        properties: properties_from_json(obj.properties, warnings, &context),
    }
}

/// Parses each object on its own; a malformed one is recorded and skipped.
fn objects_from_json(
    values: Vec<JsonValue>,
    warnings: &mut Vec<Warning>,
    context: &IssueContext,
) -> Vec<IrObject> {
    let mut objects = Vec::with_capacity(values.len());
    for value in values {
        let id = value.get("id").and_then(JsonValue::as_u64).unwrap_or(0) as u32;
        match serde_json::from_value::<JsonObject>(value) {
            Ok(obj) => objects.push(object_to_ir(obj, warnings, context)),
            Err(err) => record(
                warnings,
                context.clone().with_object(id, ""),
                MapError::MalformedNode {
                    node: "object",
                    reason: err.to_string(),
                },
            ),
        }
    }
    objects
}

/// Cell payload of a layer or chunk: a plain number array or an encoded string.
fn cells_from_json(
    data: &JsonValue,
    encoding: Option<&str>,
    compression: Option<&str>,
) -> Result<DecodedTiles, DecodeError> {
    match data {
        JsonValue::String(payload) => codec::decode_str(payload, encoding.unwrap_or("base64"), compression),
        JsonValue::Array(values) => {
            if let Some(enc) = encoding.filter(|e| *e != "csv") {
                return Err(DecodeError::UnsupportedEncoding(format!("{enc} with array data")));
            }
            let mut out = DecodedTiles::default();
            for (position, value) in values.iter().enumerate() {
                let parsed = match value {
                    JsonValue::Number(n) => parse_cell_token(&n.to_string()),
                    _ => Err(TokenErrorReason::Malformed),
                };
                match parsed {
                    Ok(gid) => out.gids.push(gid),
                    Err(reason) => out.token_errors.push(TokenError {
                        position,
                        token: value.to_string(),
                        reason,
                    }),
                }
            }
            Ok(out)
        }
        other => Err(DecodeError::UnsupportedEncoding(format!(
            "{} payload",
            json_type_name(other)
        ))),
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

fn tile_layer_to_ir(l: &JsonLayer, infinite: bool, session: &mut LoadSession) -> Option<TileData> {
    let encoding = l.encoding.as_deref();
    let compression = l.compression.as_deref();
    let context = IssueContext::layer(&l.name).with_encoding(encoding, compression);

    if infinite || !l.chunks.is_empty() {
        let mut chunks = Vec::with_capacity(l.chunks.len());
        for value in &l.chunks {
            let chunk = match serde_json::from_value::<JsonChunk>(value.clone()) {
                Ok(chunk) => chunk,
                Err(err) => {
                    session.warn(
                        context.clone(),
                        MapError::MalformedNode {
                            node: "chunk",
                            reason: err.to_string(),
                        },
                    );
                    continue;
                }
            };
            let chunk_ctx = context.clone().with_chunk(chunk.x, chunk.y);
            if let Err(err) = check_chunk_extent(chunk.x, chunk.y, chunk.width, chunk.height) {
                session.warn(chunk_ctx, err);
                continue;
            }
            let expected = chunk.width as usize * chunk.height as usize;
            let decoded = cells_from_json(&chunk.data, encoding, compression);
            if let Some(data) = session.cells(decoded, expected, &chunk_ctx) {
                chunks.push(Chunk {
                    x: chunk.x,
                    y: chunk.y,
                    width: chunk.width,
                    height: chunk.height,
                    data,
                });
            }
        }
        return Some(TileData::Chunked { chunks });
    }

    let Some(data) = &l.data else {
        session.warn(
            context,
            MapError::MalformedNode {
                node: "tilelayer",
                reason: "no data".to_owned(),
            },
        );
        return None;
    };
    let expected = l.width as usize * l.height as usize;
    let decoded = cells_from_json(data, encoding, compression);
    session
        .cells(decoded, expected, &context)
        .map(|data| TileData::Finite {
            width: l.width,
            height: l.height,
            data,
        })
}

fn layer_to_ir(value: JsonValue, infinite: bool, session: &mut LoadSession) -> Option<IrLayer> {
    let name = value
        .get("name")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_owned();
    let l: JsonLayer = match serde_json::from_value(value) {
        Ok(l) => l,
        Err(err) => {
            session.warn(
                IssueContext::layer(&name),
                MapError::MalformedNode {
                    node: "layer",
                    reason: err.to_string(),
                },
            );
            return None;
        }
    };

    let context = IssueContext::layer(&l.name);
    let kind = match l.kind.as_str() {
        "tilelayer" => IrLayerKind::Tiles(tile_layer_to_ir(&l, infinite, session)?),
        "objectgroup" => IrLayerKind::Objects {
            objects: objects_from_json(l.objects.clone(), &mut session.warnings, &context),
        },
        "imagelayer" => IrLayerKind::Image {
            image: l.image.clone().unwrap_or_default(),
            repeat_x: l.repeatx,
            repeat_y: l.repeaty,
        },
        "group" => IrLayerKind::Group {
            layers: l
                .layers
                .iter()
                .cloned()
                .filter_map(|child| layer_to_ir(child, infinite, session))
                .collect(),
        },
        other => {
            session.warn(
                context,
                MapError::MalformedNode {
                    node: "layer",
                    reason: format!("unknown layer type '{other}'"),
                },
            );
            return None;
        }
    };

    Some(IrLayer {
        id: l.id,
        properties: properties_from_json(l.properties, &mut session.warnings, &context),
        name: l.name,
        visible: l.visible,
        opacity: l.opacity,
        offset: vec2(l.offsetx, l.offsety),
        parallax: vec2(l.parallaxx, l.parallaxy),
        tint_color: l.tintcolor,
        kind,
    })
}

fn tileset_to_ir(ts: JsonTileset, warnings: &mut Vec<Warning>) -> TilesetDef {
    let context = IssueContext::tileset(&ts.name);
    let tiles = ts
        .tiles
        .into_iter()
        .map(|tile| {
            let tile_ctx = context.clone().with_object(tile.id, "");
            TileMeta {
                id: tile.id,
                class_name: if tile.class.is_empty() { tile.kind } else { tile.class },
                properties: properties_from_json(tile.properties, warnings, &tile_ctx),
                image: tile.image,
                image_w: tile.imagewidth,
                image_h: tile.imageheight,
                objects: objects_from_json(
                    tile.objectgroup.unwrap_or_default().objects,
                    warnings,
                    &tile_ctx,
                ),
            }
        })
        .collect();

    TilesetDef {
        properties: properties_from_json(ts.properties, warnings, &context),
        name: ts.name,
        tile_w: ts.tilewidth,
        tile_h: ts.tileheight,
        tile_count: 0,
        columns: 0,
        margin: ts.margin,
        spacing: ts.spacing,
        image: ts.image,
        image_w: ts.imagewidth,
        image_h: ts.imageheight,
        tile_offset: ts.tileoffset.map(|p| vec2(p.x, p.y)).unwrap_or_default(),
        object_alignment: ts.objectalignment.unwrap_or_else(|| "unspecified".to_owned()),
        tiles,
    }
    .with_layout(ts.columns, ts.tilecount)
}

fn tileset_entry_to_ir(value: JsonValue, session: &mut LoadSession) -> Option<Tileset> {
    let entry: JsonTilesetRef = match serde_json::from_value(value.clone()) {
        Ok(entry) => entry,
        Err(err) => {
            session.warn(
                IssueContext::map(),
                MapError::MalformedNode {
                    node: "tileset",
                    reason: err.to_string(),
                },
            );
            return None;
        }
    };
    if entry.firstgid == 0 {
        session.warn(
            IssueContext::map(),
            MapError::MalformedNode {
                node: "tileset",
                reason: "firstgid must be at least 1".to_owned(),
            },
        );
        return None;
    }
    if let Some(source) = &entry.source {
        return session.external_tileset(entry.firstgid, source);
    }
    match serde_json::from_value::<JsonTileset>(value) {
        Ok(ts) => {
            let def = tileset_to_ir(ts, &mut session.warnings);
            Some(session.embedded_tileset(entry.firstgid, def))
        }
        Err(err) => {
            session.warn(
                IssueContext::map(),
                MapError::MalformedNode {
                    node: "tileset",
                    reason: err.to_string(),
                },
            );
            None
        }
    }
}

/// Parses a JSON (TMJ) map document.
pub(crate) fn parse_map_document(txt: &str, mut session: LoadSession) -> Result<ParsedMap, MapError> {
    let j: JsonMap = serde_json::from_str(txt).map_err(|source| MapError::Json {
        path: session.map_path.clone(),
        source,
    })?;

    let tile_w = j.tilewidth.ok_or(MapError::MissingField("tilewidth"))?;
    let tile_h = j.tileheight.ok_or(MapError::MissingField("tileheight"))?;
    let layers = j.layers.ok_or(MapError::MissingField("layers"))?;
    let orientation = Orientation::parse(&j.orientation)
        .ok_or_else(|| MapError::UnsupportedOrientation(j.orientation.clone()))?;

    let properties = properties_from_json(j.properties, &mut session.warnings, &IssueContext::map());

    let mut tilesets = Vec::with_capacity(j.tilesets.len());
    for value in j.tilesets {
        if let Some(ts) = tileset_entry_to_ir(value, &mut session) {
            tilesets.push(ts);
        }
    }

    let ir_layers = layers
        .into_iter()
        .filter_map(|value| layer_to_ir(value, j.infinite, &mut session))
        .collect();

    let header = MapHeader {
        orientation,
        render_order: j.renderorder,
        width: j.width,
        height: j.height,
        tile_w,
        tile_h,
        infinite: j.infinite,
        background_color: j.backgroundcolor,
        properties,
    };
    Ok(session.finish(header, tilesets, ir_layers))
}

/// Parses a JSON (TSJ) tileset document.
pub(crate) fn parse_tileset_document(
    txt: &str,
    path: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<TilesetDef, MapError> {
    let ts: JsonTileset = serde_json::from_str(txt).map_err(|source| MapError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(tileset_to_ir(ts, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::loader::{DocumentFormat, MapLoader, TilesetCache};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock went backwards")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("mq_tiled_json_{nanos}"));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    fn load(json: &str) -> ParsedMap {
        let cache = TilesetCache::new();
        MapLoader::new(&cache)
            .load_str(json, DocumentFormat::Json, "inline/map.json")
            .expect("decode")
    }

    #[test]
    fn parses_properties_for_map_layer_object_tileset_and_tile() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let ts_path = dir.join("tileset.json");

        let map_json = r#"{
          "tilewidth": 16,
          "tileheight": 16,
          "width": 2,
          "height": 2,
          "properties": [
            {"name":"is_night","type":"bool","value":true},
            {"name":"gravity","type":"float","value":9.8},
            {"name":"theme","type":"string","value":"forest"}
          ],
          "layers": [
            {
              "type":"tilelayer",
              "name":"ground",
              "width":2,
              "height":2,
              "data":[1,0,0,0],
              "properties":[
                {"name":"is_solid","type":"bool","value":true},
                {"name":"difficulty","type":"int","value":3}
              ]
            },
            {
              "type":"objectgroup",
              "name":"spawns",
              "objects":[
                {
                  "id": 7,
                  "name":"spawn_1",
                  "type":"spawn",
                  "properties":[
                    {"name":"kind","type":"string","value":"player"},
                    {"name":"target","type":"object","value":9}
                  ]
                }
              ],
              "properties":[{"name":"enabled","type":"bool","value":true}]
            }
          ],
          "tilesets":[{"firstgid":1,"source":"tileset.json"}]
        }"#;

        let tileset_json = r#"{
          "name":"forest",
          "tilewidth":16,
          "tileheight":16,
          "tilecount":4,
          "columns":2,
          "image":"tiles.png",
          "properties":[{"name":"biome","type":"string","value":"forest"}],
          "tiles":[
            {
              "id":0,
              "properties":[{"name":"damage","type":"int","value":10}],
              "objectgroup":{
                "objects":[
                  {"id":1,"name":"hitbox","type":"shape","properties":[{"name":"sensor","type":"bool","value":false}]}
                ]
              }
            }
          ]
        }"#;

        fs::write(&map_path, map_json).expect("failed to write map");
        fs::write(&ts_path, tileset_json).expect("failed to write tileset");

        let cache = TilesetCache::new();
        let parsed = MapLoader::new(&cache).load_file(&map_path).expect("decode");
        let ir = parsed.map;
        assert!(parsed.warnings.is_empty());

        assert_eq!(ir.properties.get_bool("is_night"), Some(true));
        assert_eq!(ir.properties.get_f32("gravity"), Some(9.8));
        assert_eq!(ir.properties.get_string("theme"), Some("forest"));

        assert_eq!(ir.layers[0].properties.get_bool("is_solid"), Some(true));
        assert_eq!(ir.layers[0].properties.get_i32("difficulty"), Some(3));

        match &ir.layers[1].kind {
            IrLayerKind::Objects { objects } => {
                assert_eq!(objects.len(), 1);
                assert_eq!(objects[0].properties.get_string("kind"), Some("player"));
                assert_eq!(objects[0].properties.get_object("target"), Some(9));
            }
            _ => panic!("expected object layer"),
        }

        let ts = &ir.tilesets[0].def;
        assert_eq!(ts.properties.get_string("biome"), Some("forest"));
        assert_eq!(ts.tiles.len(), 1);
        assert_eq!(ts.tiles[0].properties.get_i32("damage"), Some(10));
        assert_eq!(ts.tiles[0].objects.len(), 1);
        assert_eq!(ts.tiles[0].objects[0].properties.get_bool("sensor"), Some(false));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keeps_large_int_property_values() {
        let ir = load(
            r#"{
              "tilewidth": 16,
              "tileheight": 16,
              "properties": [
                {"name":"big_id","type":"int","value":5000000000}
              ],
              "layers": [],
              "tilesets":[]
            }"#,
        )
        .map;
        assert_eq!(ir.properties.get_i64("big_id"), Some(5_000_000_000));
        assert_eq!(ir.properties.get_i32("big_id"), None);
    }

    #[test]
    fn returns_typed_error_for_malformed_json() {
        let cache = TilesetCache::new();
        let mut loader = MapLoader::new(&cache);
        let err = loader
            .load_str("{ not json", DocumentFormat::Json, "map.json")
            .expect_err("expected decode error");
        assert!(matches!(err, MapError::Json { .. }));
        assert_eq!(err.kind(), ErrorKind::Structural);
        assert!(loader.last_error().is_some());
    }

    #[test]
    fn missing_tile_size_is_structural() {
        let cache = TilesetCache::new();
        let err = MapLoader::new(&cache)
            .load_str(r#"{"tileheight":16,"layers":[]}"#, DocumentFormat::Json, "map.json")
            .expect_err("expected structural error");
        assert!(matches!(err, MapError::MissingField("tilewidth")));
    }

    #[test]
    fn missing_tileset_file_is_recorded_not_fatal() {
        let parsed = load(
            r#"{
              "tilewidth": 16,
              "tileheight": 16,
              "layers": [],
              "tilesets":[{"firstgid":1,"source":"missing_tileset.json"}]
            }"#,
        );
        assert!(parsed.map.tilesets.is_empty());
        assert_eq!(parsed.warnings.len(), 1);
        assert!(matches!(
            parsed.warnings[0].error,
            MapError::MissingTileset { .. }
        ));
        assert_eq!(parsed.warnings[0].kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn tileset_pointing_at_the_map_is_circular() {
        let parsed = load(
            r#"{
              "tilewidth": 16,
              "tileheight": 16,
              "layers": [],
              "tilesets":[{"firstgid":1,"source":"./map.json"}]
            }"#,
        );
        assert!(matches!(
            parsed.warnings[0].error,
            MapError::CircularTileset { .. }
        ));
    }

    #[test]
    fn unknown_property_type_is_skipped_with_warning() {
        let parsed = load(
            r#"{
              "tilewidth": 16,
              "tileheight": 16,
              "properties": [
                {"name":"mystery","type":"not_supported","value":"x"},
                {"name":"known","type":"string","value":"y"}
              ],
              "layers": []
            }"#,
        );
        assert_eq!(parsed.map.properties.len(), 1);
        assert!(matches!(
            parsed.warnings[0].error,
            MapError::UnsupportedPropertyType { .. }
        ));
    }

    #[test]
    fn one_bad_object_does_not_drop_its_layer() {
        let parsed = load(
            r#"{
              "tilewidth": 16,
              "tileheight": 16,
              "layers": [
                {"type":"objectgroup","name":"things","objects":[
                  {"id":1,"x":"left"},
                  {"id":2,"x":4,"y":8,"point":true},
                  {"id":3,"x":0,"y":0,"polyline":[{"x":0,"y":0},{"x":10,"y":0}]}
                ]}
              ]
            }"#,
        );
        let IrLayerKind::Objects { objects } = &parsed.map.layers[0].kind else {
            panic!("expected object layer");
        };
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].shape, IrObjectShape::Point);
        assert_eq!(
            objects[1].shape,
            IrObjectShape::Polyline(vec![vec2(0.0, 0.0), vec2(10.0, 0.0)])
        );
        assert_eq!(parsed.warnings.len(), 1);
        assert_eq!(parsed.warnings[0].context.object_id, Some(1));
    }

    #[test]
    fn layer_with_wrong_cell_count_is_dropped_siblings_survive() {
        let parsed = load(
            r#"{
              "tilewidth": 8,
              "tileheight": 8,
              "width": 2,
              "height": 2,
              "layers": [
                {"type":"tilelayer","name":"oops","width":2,"height":2,"data":[1,2,3]},
                {"type":"tilelayer","name":"fine","width":2,"height":2,"data":[1,2,3,4]}
              ]
            }"#,
        );
        assert_eq!(parsed.map.layers.len(), 1);
        assert_eq!(parsed.map.layers[0].name, "fine");
        assert_eq!(parsed.warnings[0].context.layer.as_deref(), Some("oops"));
        assert_eq!(parsed.warnings[0].kind(), ErrorKind::CorruptedPayload);
    }

    #[test]
    fn infinite_map_chunks_and_bounds() {
        let parsed = load(
            r#"{
              "tilewidth": 16,
              "tileheight": 16,
              "infinite": true,
              "width": 1,
              "height": 1,
              "layers": [
                {"type":"tilelayer","name":"ground","chunks":[
                  {"x":-2,"y":-1,"width":2,"height":1,"data":[1,1]},
                  {"x":4,"y":2,"width":1,"height":2,"data":[1,"bad"]},
                  {"x":9,"y":9,"width":2,"height":2,"data":[1]}
                ]}
              ]
            }"#,
        );
        let IrLayerKind::Tiles(TileData::Chunked { chunks }) = &parsed.map.layers[0].kind else {
            panic!("expected chunked layer");
        };
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].data, vec![1, 0]);
        let b = parsed.map.bounds;
        assert_eq!((b.min_tile_x, b.min_tile_y, b.max_tile_x, b.max_tile_y), (-2, -1, 4, 3));
        let chunk_warning = parsed
            .warnings
            .iter()
            .find(|w| w.kind() == ErrorKind::CorruptedPayload)
            .expect("size mismatch");
        assert_eq!(chunk_warning.context.chunk, Some((9, 9)));
    }

    #[test]
    fn chunk_past_coordinate_range_is_skipped() {
        let parsed = load(
            r#"{
              "tilewidth": 16,
              "tileheight": 16,
              "infinite": true,
              "layers": [
                {"type":"tilelayer","name":"edge","chunks":[
                  {"x":2147483640,"y":0,"width":16,"height":1,"data":[]},
                  {"x":0,"y":0,"width":1,"height":1,"data":[3]}
                ]}
              ]
            }"#,
        );
        let IrLayerKind::Tiles(TileData::Chunked { chunks }) = &parsed.map.layers[0].kind else {
            panic!("expected chunked layer");
        };
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].data, vec![3]);
        assert_eq!(parsed.map.bounds.width(), 1);
        assert_eq!(parsed.warnings.len(), 1);
        let warning = &parsed.warnings[0];
        assert!(matches!(warning.error, MapError::MalformedNode { node: "chunk", .. }));
        assert_eq!(warning.kind(), ErrorKind::MalformedInput);
        assert_eq!(warning.context.chunk, Some((2_147_483_640, 0)));
        assert_eq!(warning.context.layer.as_deref(), Some("edge"));
    }

    #[test]
    fn group_layers_nest() {
        let parsed = load(
            r#"{
              "tilewidth": 16,
              "tileheight": 16,
              "width": 1,
              "height": 1,
              "layers": [
                {"type":"group","name":"outer","offsetx":4,"layers":[
                  {"type":"imagelayer","name":"sky","image":"sky.png","repeatx":true},
                  {"type":"tilelayer","name":"inner","width":1,"height":1,"data":[0]}
                ]}
              ]
            }"#,
        );
        let IrLayerKind::Group { layers } = &parsed.map.layers[0].kind else {
            panic!("expected group");
        };
        assert_eq!(parsed.map.layers[0].offset, vec2(4.0, 0.0));
        assert_eq!(layers.len(), 2);
        assert!(matches!(
            &layers[0].kind,
            IrLayerKind::Image { image, repeat_x: true, .. } if image == "sky.png"
        ));
    }
}
