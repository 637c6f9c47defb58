// src/loader/xml_loader.rs
use super::{check_chunk_extent, LoadSession, MapHeader, ParsedMap};
use crate::codec::{self, parse_cell_token, DecodedTiles};
use crate::error::{record, DecodeError, IssueContext, MapError, TokenError, Warning};
use crate::ir_map::*;
use crate::tileset::{TileMeta, Tileset, TilesetDef};
use macroquad::prelude::*;
use roxmltree::{Document, Node};
use std::path::Path;
use std::str::FromStr;

fn attr<T: FromStr>(node: Node, name: &str) -> Result<Option<T>, String> {
    match node.attribute(name) {
        None => Ok(None),
        Some(text) => text.trim().parse().map(Some).map_err(|_| {
            format!(
                "<{}> attribute {name}='{text}' is invalid",
                node.tag_name().name()
            )
        }),
    }
}

fn attr_or<T: FromStr>(node: Node, name: &str, alternative: T) -> Result<T, String> {
    Ok(attr(node, name)?.unwrap_or(alternative))
}

/// TMX writes booleans as `0`/`1`.
fn flag(node: Node, name: &str, default: bool) -> bool {
    match node.attribute(name) {
        Some("1" | "true") => true,
        Some("0" | "false") => false,
        _ => default,
    }
}

fn child<'a, 'i>(node: Node<'a, 'i>, tag: &str) -> Option<Node<'a, 'i>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn malformed(node: &'static str) -> impl FnOnce(String) -> MapError {
    move |reason| MapError::MalformedNode { node, reason }
}

fn property_from_xml(
    p: Node,
    warnings: &mut Vec<Warning>,
    context: &IssueContext,
) -> Result<(String, PropertyValue), MapError> {
    let name = p.attribute("name").unwrap_or_default().to_owned();
    let kind = p.attribute("type").unwrap_or("string");
    // Multi-line strings are stored as element text instead of `value`.
    let raw = p.attribute("value").or_else(|| p.text()).unwrap_or_default();
    let invalid = || MapError::MalformedNode {
        node: "property",
        reason: format!("'{name}' has invalid {kind} value '{raw}'"),
    };

    let value = match kind {
        "bool" => match raw {
            "true" | "1" => PropertyValue::Bool(true),
            "false" | "0" => PropertyValue::Bool(false),
            _ => return Err(invalid()),
        },
        "int" => PropertyValue::I64(raw.trim().parse().map_err(|_| invalid())?),
        "float" => PropertyValue::F32(raw.trim().parse().map_err(|_| invalid())?),
        "object" => PropertyValue::Object(raw.trim().parse().map_err(|_| invalid())?),
        "string" => PropertyValue::String(raw.to_owned()),
        "file" => PropertyValue::File(raw.to_owned()),
        "color" => PropertyValue::Color(raw.to_owned()),
        "class" => PropertyValue::Class(properties_from_xml(p, warnings, context)),
        other => {
            return Err(MapError::UnsupportedPropertyType {
                name,
                kind: other.to_owned(),
            })
        }
    };
    Ok((name, value))
}

/// Reads the `<properties>` child of `node`, skipping entries that fail.
fn properties_from_xml(node: Node, warnings: &mut Vec<Warning>, context: &IssueContext) -> Properties {
    let mut out = Properties::new();
    let Some(props) = child(node, "properties") else {
        return out;
    };
    for p in props.children().filter(|n| n.has_tag_name("property")) {
        match property_from_xml(p, warnings, context) {
            Ok((name, value)) => out.insert(name, value),
            Err(err) => record(warnings, context.clone(), err),
        }
    }
    out
}

fn parse_points(text: &str) -> Result<Vec<Vec2>, String> {
    text.split_whitespace()
        .map(|pair| {
            let bad = || format!("invalid point '{pair}'");
            let (x, y) = pair.split_once(',').ok_or_else(bad)?;
            let x: f32 = x.parse().map_err(|_| bad())?;
            let y: f32 = y.parse().map_err(|_| bad())?;
            Ok(vec2(x, y))
        })
        .collect()
}

fn object_shape(o: Node) -> Result<IrObjectShape, String> {
    if let Some(gid) = attr::<u32>(o, "gid")? {
        return Ok(IrObjectShape::Tile { gid });
    }
    for c in o.children().filter(Node::is_element) {
        let shape = match c.tag_name().name() {
            "ellipse" => IrObjectShape::Ellipse,
            "point" => IrObjectShape::Point,
            "polygon" => IrObjectShape::Polygon(parse_points(c.attribute("points").unwrap_or_default())?),
            "polyline" => IrObjectShape::Polyline(parse_points(c.attribute("points").unwrap_or_default())?),
            "text" => IrObjectShape::Text {
                text: c.text().unwrap_or_default().to_owned(),
                wrap: flag(c, "wrap", false),
            },
            _ => continue,
        };
        return Ok(shape);
    }
    Ok(IrObjectShape::Rectangle)
}

fn object_from_xml(
    o: Node,
    warnings: &mut Vec<Warning>,
    context: &IssueContext,
) -> Result<IrObject, String> {
    let id = attr_or(o, "id", 0)?;
    let name = o.attribute("name").unwrap_or_default().to_owned();
    let class_name = o
        .attribute("class")
        .or_else(|| o.attribute("type"))
        .unwrap_or_default()
        .to_owned();
    let shape = object_shape(o)?;
    let context = context.clone().with_object(id, &name);
    Ok(IrObject {
        id,
        class_name,
        x: attr_or(o, "x", 0.0)?,
        y: attr_or(o, "y", 0.0)?,
        width: attr_or(o, "width", 0.0)?,
        height: attr_or(o, "height", 0.0)?,
        rotation: attr_or(o, "rotation", 0.0)?,
        visible: flag(o, "visible", true),
        shape,
        properties: properties_from_xml(o, warnings, &context),
        name,
    })
}

fn objects_from_xml(group: Node, warnings: &mut Vec<Warning>, context: &IssueContext) -> Vec<IrObject> {
    let mut objects = Vec::new();
    for o in group.children().filter(|n| n.has_tag_name("object")) {
        match object_from_xml(o, warnings, context) {
            Ok(obj) => objects.push(obj),
            Err(reason) => {
                let id = attr_or(o, "id", 0).unwrap_or(0);
                record(
                    warnings,
                    context.clone().with_object(id, o.attribute("name").unwrap_or_default()),
                    MapError::MalformedNode {
                        node: "object",
                        reason,
                    },
                );
            }
        }
    }
    objects
}

/// Legacy `<tile gid="..."/>` cells, one element per cell.
fn legacy_tiles(data: Node) -> DecodedTiles {
    let mut out = DecodedTiles::default();
    let tiles = data.children().filter(|n| n.has_tag_name("tile"));
    for (position, tile) in tiles.enumerate() {
        let token = tile.attribute("gid").unwrap_or("0");
        match parse_cell_token(token) {
            Ok(gid) => out.gids.push(gid),
            Err(reason) => out.token_errors.push(TokenError {
                position,
                token: token.to_owned(),
                reason,
            }),
        }
    }
    out
}

fn cells_from_xml(
    data: Node,
    encoding: Option<&str>,
    compression: Option<&str>,
) -> Result<DecodedTiles, DecodeError> {
    match encoding {
        Some(encoding) => codec::decode_str(data.text().unwrap_or_default(), encoding, compression),
        None => match compression {
            Some(compression) => Err(DecodeError::UnsupportedCompression(format!(
                "{compression} without encoding"
            ))),
            None => Ok(legacy_tiles(data)),
        },
    }
}

fn chunk_from_xml(
    c: Node,
    encoding: Option<&str>,
    compression: Option<&str>,
    context: &IssueContext,
    session: &mut LoadSession,
) -> Option<Chunk> {
    let header = (|| -> Result<(i32, i32, u32, u32), String> {
        Ok((
            attr_or(c, "x", 0)?,
            attr_or(c, "y", 0)?,
            attr_or(c, "width", 0)?,
            attr_or(c, "height", 0)?,
        ))
    })();
    let (x, y, width, height) = match header {
        Ok(header) => header,
        Err(reason) => {
            session.warn(context.clone(), malformed("chunk")(reason));
            return None;
        }
    };
    let context = context.clone().with_chunk(x, y);
    if let Err(err) = check_chunk_extent(x, y, width, height) {
        session.warn(context, err);
        return None;
    }
    let expected = width as usize * height as usize;
    let data = session.cells(cells_from_xml(c, encoding, compression), expected, &context)?;
    Some(Chunk {
        x,
        y,
        width,
        height,
        data,
    })
}

fn tile_layer_from_xml(
    node: Node,
    name: &str,
    infinite: bool,
    session: &mut LoadSession,
) -> Option<TileData> {
    let Some(data) = child(node, "data") else {
        session.warn(
            IssueContext::layer(name),
            malformed("layer")("tile layer has no <data>".to_owned()),
        );
        return None;
    };
    let encoding = data.attribute("encoding");
    let compression = data.attribute("compression");
    let context = IssueContext::layer(name).with_encoding(encoding, compression);

    let chunks: Vec<Node> = data.children().filter(|n| n.has_tag_name("chunk")).collect();
    if infinite || !chunks.is_empty() {
        let chunks = chunks
            .into_iter()
            .filter_map(|c| chunk_from_xml(c, encoding, compression, &context, session))
            .collect();
        return Some(TileData::Chunked { chunks });
    }

    let size = (|| -> Result<(u32, u32), String> {
        Ok((attr_or(node, "width", 0)?, attr_or(node, "height", 0)?))
    })();
    let (width, height) = match size {
        Ok(size) => size,
        Err(reason) => {
            session.warn(context, malformed("layer")(reason));
            return None;
        }
    };
    let expected = width as usize * height as usize;
    session
        .cells(cells_from_xml(data, encoding, compression), expected, &context)
        .map(|data| TileData::Finite {
            width,
            height,
            data,
        })
}

struct LayerHeader {
    id: u32,
    name: String,
    visible: bool,
    opacity: f32,
    offset: Vec2,
    parallax: Vec2,
    tint_color: Option<String>,
}

fn layer_header(node: Node) -> Result<LayerHeader, String> {
    Ok(LayerHeader {
        id: attr_or(node, "id", 0)?,
        name: node.attribute("name").unwrap_or_default().to_owned(),
        visible: flag(node, "visible", true),
        opacity: attr_or(node, "opacity", 1.0)?,
        offset: vec2(attr_or(node, "offsetx", 0.0)?, attr_or(node, "offsety", 0.0)?),
        parallax: vec2(attr_or(node, "parallaxx", 1.0)?, attr_or(node, "parallaxy", 1.0)?),
        tint_color: node.attribute("tintcolor").map(str::to_owned),
    })
}

/// Converts one layer element. Non-layer children of the map return `None`
/// silently; broken layers return `None` with a warning.
fn layer_from_xml(node: Node, infinite: bool, session: &mut LoadSession) -> Option<IrLayer> {
    let tag = node.tag_name().name();
    if !matches!(tag, "layer" | "objectgroup" | "imagelayer" | "group") {
        return None;
    }
    let header = match layer_header(node) {
        Ok(header) => header,
        Err(reason) => {
            let name = node.attribute("name").unwrap_or_default();
            session.warn(IssueContext::layer(name), malformed("layer")(reason));
            return None;
        }
    };
    let context = IssueContext::layer(&header.name);

    let kind = match tag {
        "layer" => IrLayerKind::Tiles(tile_layer_from_xml(node, &header.name, infinite, session)?),
        "objectgroup" => IrLayerKind::Objects {
            objects: objects_from_xml(node, &mut session.warnings, &context),
        },
        "imagelayer" => IrLayerKind::Image {
            image: child(node, "image")
                .and_then(|i| i.attribute("source"))
                .unwrap_or_default()
                .to_owned(),
            repeat_x: flag(node, "repeatx", false),
            repeat_y: flag(node, "repeaty", false),
        },
        _ => IrLayerKind::Group {
            layers: node
                .children()
                .filter(Node::is_element)
                .filter_map(|c| layer_from_xml(c, infinite, session))
                .collect(),
        },
    };

    Some(IrLayer {
        id: header.id,
        properties: properties_from_xml(node, &mut session.warnings, &context),
        name: header.name,
        visible: header.visible,
        opacity: header.opacity,
        offset: header.offset,
        parallax: header.parallax,
        tint_color: header.tint_color,
        kind,
    })
}

fn tile_meta_from_xml(
    t: Node,
    warnings: &mut Vec<Warning>,
    context: &IssueContext,
) -> Result<TileMeta, String> {
    let id = attr(t, "id")?.ok_or_else(|| "<tile> without id".to_owned())?;
    let context = context.clone().with_object(id, "");
    let image = child(t, "image");
    Ok(TileMeta {
        id,
        class_name: t
            .attribute("class")
            .or_else(|| t.attribute("type"))
            .unwrap_or_default()
            .to_owned(),
        properties: properties_from_xml(t, warnings, &context),
        image: image.and_then(|i| i.attribute("source")).map(str::to_owned),
        image_w: image.map(|i| attr_or(i, "width", 0)).transpose()?.unwrap_or(0),
        image_h: image.map(|i| attr_or(i, "height", 0)).transpose()?.unwrap_or(0),
        objects: child(t, "objectgroup")
            .map(|g| objects_from_xml(g, warnings, &context))
            .unwrap_or_default(),
    })
}

/// Reads a `<tileset>` element's own contents (embedded or TSX root).
fn tileset_from_xml(node: Node, warnings: &mut Vec<Warning>) -> Result<TilesetDef, String> {
    let name = node.attribute("name").unwrap_or_default().to_owned();
    let context = IssueContext::tileset(&name);
    let tile_w = attr(node, "tilewidth")?.ok_or_else(|| "missing tilewidth".to_owned())?;
    let tile_h = attr(node, "tileheight")?.ok_or_else(|| "missing tileheight".to_owned())?;
    let image = child(node, "image");
    let offset = child(node, "tileoffset");

    let mut tiles = Vec::new();
    for t in node.children().filter(|n| n.has_tag_name("tile")) {
        match tile_meta_from_xml(t, warnings, &context) {
            Ok(tile) => tiles.push(tile),
            Err(reason) => record(warnings, context.clone(), malformed("tile")(reason)),
        }
    }

    let def = TilesetDef {
        tile_w,
        tile_h,
        tile_count: 0,
        columns: 0,
        margin: attr_or(node, "margin", 0)?,
        spacing: attr_or(node, "spacing", 0)?,
        image: image.and_then(|i| i.attribute("source")).map(str::to_owned),
        image_w: image.map(|i| attr_or(i, "width", 0)).transpose()?.unwrap_or(0),
        image_h: image.map(|i| attr_or(i, "height", 0)).transpose()?.unwrap_or(0),
        tile_offset: match offset {
            Some(o) => vec2(attr_or(o, "x", 0.0)?, attr_or(o, "y", 0.0)?),
            None => Vec2::ZERO,
        },
        object_alignment: node
            .attribute("objectalignment")
            .unwrap_or("unspecified")
            .to_owned(),
        properties: properties_from_xml(node, warnings, &context),
        name,
        tiles,
    };
    Ok(def.with_layout(attr(node, "columns")?, attr(node, "tilecount")?))
}

fn tileset_entry_from_xml(node: Node, session: &mut LoadSession) -> Option<Tileset> {
    let name = node.attribute("name").unwrap_or_default();
    let first_gid = match attr::<u32>(node, "firstgid") {
        Ok(Some(gid)) if gid > 0 => gid,
        Ok(_) => {
            session.warn(
                IssueContext::tileset(name),
                malformed("tileset")("firstgid must be at least 1".to_owned()),
            );
            return None;
        }
        Err(reason) => {
            session.warn(IssueContext::tileset(name), malformed("tileset")(reason));
            return None;
        }
    };
    if let Some(source) = node.attribute("source") {
        return session.external_tileset(first_gid, source);
    }
    match tileset_from_xml(node, &mut session.warnings) {
        Ok(def) => Some(session.embedded_tileset(first_gid, def)),
        Err(reason) => {
            session.warn(IssueContext::tileset(name), malformed("tileset")(reason));
            None
        }
    }
}

fn map_header(root: Node, warnings: &mut Vec<Warning>) -> Result<MapHeader, MapError> {
    let invalid = MapError::InvalidMap;
    let orientation = root.attribute("orientation").unwrap_or("orthogonal");
    let orientation = Orientation::parse(orientation)
        .ok_or_else(|| MapError::UnsupportedOrientation(orientation.to_owned()))?;
    Ok(MapHeader {
        orientation,
        render_order: root.attribute("renderorder").unwrap_or("right-down").to_owned(),
        width: attr_or(root, "width", 0).map_err(invalid)?,
        height: attr_or(root, "height", 0).map_err(invalid)?,
        tile_w: attr(root, "tilewidth")
            .map_err(invalid)?
            .ok_or(MapError::MissingField("tilewidth"))?,
        tile_h: attr(root, "tileheight")
            .map_err(invalid)?
            .ok_or(MapError::MissingField("tileheight"))?,
        infinite: flag(root, "infinite", false),
        background_color: root.attribute("backgroundcolor").map(str::to_owned),
        properties: properties_from_xml(root, warnings, &IssueContext::map()),
    })
}

/// Parses an XML (TMX) map document.
pub(crate) fn parse_map_document(txt: &str, mut session: LoadSession) -> Result<ParsedMap, MapError> {
    let doc = Document::parse(txt).map_err(|source| MapError::Xml {
        path: session.map_path.clone(),
        source,
    })?;
    let root = doc.root_element();
    if !root.has_tag_name("map") {
        return Err(MapError::InvalidMap(format!(
            "root element is <{}>, expected <map>",
            root.tag_name().name()
        )));
    }

    let header = map_header(root, &mut session.warnings)?;

    let mut tilesets = Vec::new();
    for node in root.children().filter(|n| n.has_tag_name("tileset")) {
        if let Some(ts) = tileset_entry_from_xml(node, &mut session) {
            tilesets.push(ts);
        }
    }

    let layers = root
        .children()
        .filter(Node::is_element)
        .filter_map(|node| layer_from_xml(node, header.infinite, &mut session))
        .collect();

    Ok(session.finish(header, tilesets, layers))
}

/// Parses an XML (TSX) tileset document.
pub(crate) fn parse_tileset_document(
    txt: &str,
    path: &Path,
    warnings: &mut Vec<Warning>,
) -> Result<TilesetDef, MapError> {
    let doc = Document::parse(txt).map_err(|source| MapError::Xml {
        path: path.to_path_buf(),
        source,
    })?;
    let root = doc.root_element();
    if !root.has_tag_name("tileset") {
        return Err(MapError::MalformedNode {
            node: "tileset",
            reason: format!("{} has no <tileset> root", path.display()),
        });
    }
    tileset_from_xml(root, warnings).map_err(malformed("tileset"))
}
