use crate::codec::Compression;
use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error category, independent of the message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad token, wrong byte count, missing or circular tileset reference, bad
    /// sub-node. Recovered by skipping the smallest enclosing unit.
    MalformedInput,
    /// Decompression failure or decoded size mismatch. Fatal for the enclosing
    /// layer or chunk only.
    CorruptedPayload,
    /// Unusable document root or missing map-level field. Fatal for the load.
    Structural,
    /// GID without tileset, object type without prefab, dangling reference.
    /// Falls back to a default.
    ResolutionMiss,
}

/// Failure class reported by the inflater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InflateFailure {
    /// Wrong stream type or bad header.
    Stream,
    /// Corrupt compressed data or checksum mismatch.
    Data,
    /// Inflated output exceeds the size limit.
    Memory,
    /// Input ended before the stream was complete.
    Buffer,
}

impl fmt::Display for InflateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InflateFailure::Stream => "stream error",
            InflateFailure::Data => "data error",
            InflateFailure::Memory => "memory error",
            InflateFailure::Buffer => "buffer error",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenErrorReason {
    /// Not an unsigned integer at all.
    Malformed,
    /// Numeric, but does not fit in 32 bits.
    OutOfRange,
}

impl fmt::Display for TokenErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TokenErrorReason::Malformed => "malformed",
            TokenErrorReason::OutOfRange => "out-of-range",
        })
    }
}

/// One skipped cell token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason} tile token '{token}' at position {position}")]
pub struct TokenError {
    pub position: usize,
    pub token: String,
    pub reason: TokenErrorReason,
}

/// Failure decoding one layer or chunk payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unsupported tile data encoding '{0}'")]
    UnsupportedEncoding(String),
    #[error("unsupported tile data compression '{0}'")]
    UnsupportedCompression(String),
    #[error("invalid base64 tile data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("{compression} tile data failed to inflate ({failure}): {detail}")]
    Inflate {
        compression: Compression,
        failure: InflateFailure,
        detail: String,
    },
    #[error("tile data is {len} bytes, not a multiple of 4: {missing} bytes missing")]
    ByteCount { len: usize, missing: usize },
    #[error("tile data size mismatch: expected {expected} cells, decoded {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

impl DecodeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::Inflate { .. } | DecodeError::SizeMismatch { .. } => {
                ErrorKind::CorruptedPayload
            }
            DecodeError::UnsupportedEncoding(_)
            | DecodeError::UnsupportedCompression(_)
            | DecodeError::Base64(_)
            | DecodeError::ByteCount { .. } => ErrorKind::MalformedInput,
        }
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to parse XML {path}: {source}")]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid map: {0}")]
    InvalidMap(String),
    #[error("missing required map field '{0}'")]
    MissingField(&'static str),
    #[error("unsupported map orientation '{0}'")]
    UnsupportedOrientation(String),
    #[error(transparent)]
    TileData(#[from] DecodeError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("malformed {node}: {reason}")]
    MalformedNode { node: &'static str, reason: String },
    #[error("unsupported property type '{kind}' for property '{name}'")]
    UnsupportedPropertyType { name: String, kind: String },
    #[error("tileset {path} refers back to the map being loaded")]
    CircularTileset { path: PathBuf },
    #[error("tileset {path} could not be loaded: {source}")]
    MissingTileset {
        path: PathBuf,
        #[source]
        source: Box<MapError>,
    },
    #[error("GID {gid} is not owned by any tileset")]
    UnknownGid { gid: u32 },
    #[error("object type '{object_type}' has no prefab mapping")]
    MissingPrefab { object_type: String },
    #[error("object {from} property '{property}' references missing object {to}")]
    DanglingReference {
        from: u32,
        property: String,
        to: u32,
    },
}

impl MapError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::Io { .. }
            | MapError::Json { .. }
            | MapError::Xml { .. }
            | MapError::UnsupportedFormat(_)
            | MapError::InvalidMap(_)
            | MapError::MissingField(_)
            | MapError::UnsupportedOrientation(_) => ErrorKind::Structural,
            MapError::TileData(e) => e.kind(),
            MapError::Token(_)
            | MapError::MalformedNode { .. }
            | MapError::UnsupportedPropertyType { .. }
            | MapError::CircularTileset { .. }
            | MapError::MissingTileset { .. } => ErrorKind::MalformedInput,
            MapError::UnknownGid { .. }
            | MapError::MissingPrefab { .. }
            | MapError::DanglingReference { .. } => ErrorKind::ResolutionMiss,
        }
    }
}

/// Where in the document a problem was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueContext {
    pub layer: Option<String>,
    pub chunk: Option<(i32, i32)>,
    pub object_id: Option<u32>,
    pub object_name: Option<String>,
    pub tileset: Option<String>,
    pub encoding: Option<String>,
    pub compression: Option<String>,
}

impl IssueContext {
    pub fn map() -> Self {
        Self::default()
    }

    pub fn layer(name: &str) -> Self {
        Self {
            layer: Some(name.to_owned()),
            ..Self::default()
        }
    }

    pub fn tileset(name: &str) -> Self {
        Self {
            tileset: Some(name.to_owned()),
            ..Self::default()
        }
    }

    pub fn with_chunk(mut self, x: i32, y: i32) -> Self {
        self.chunk = Some((x, y));
        self
    }

    pub fn with_object(mut self, id: u32, name: &str) -> Self {
        self.object_id = Some(id);
        if !name.is_empty() {
            self.object_name = Some(name.to_owned());
        }
        self
    }

    pub fn with_encoding(mut self, encoding: Option<&str>, compression: Option<&str>) -> Self {
        self.encoding = encoding.map(str::to_owned);
        self.compression = compression.map(str::to_owned);
        self
    }
}

impl fmt::Display for IssueContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(name) = &self.tileset {
            parts.push(format!("tileset '{name}'"));
        }
        if let Some(name) = &self.layer {
            parts.push(format!("layer '{name}'"));
        }
        if let Some((x, y)) = self.chunk {
            parts.push(format!("chunk ({x}, {y})"));
        }
        if let Some(id) = self.object_id {
            match &self.object_name {
                Some(name) => parts.push(format!("object {id} '{name}'")),
                None => parts.push(format!("object {id}")),
            }
        }
        if let Some(enc) = &self.encoding {
            match &self.compression {
                Some(comp) => parts.push(format!("encoding {enc}/{comp}")),
                None => parts.push(format!("encoding {enc}")),
            }
        }
        if parts.is_empty() {
            f.write_str("map")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// A non-fatal problem recorded while loading or converting.
#[derive(Debug)]
pub struct Warning {
    pub context: IssueContext,
    pub error: MapError,
}

impl Warning {
    pub fn new(context: IssueContext, error: impl Into<MapError>) -> Self {
        Self {
            context,
            error: error.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.error)
    }
}

/// Logs and stores a warning.
pub(crate) fn record(
    warnings: &mut Vec<Warning>,
    context: IssueContext,
    error: impl Into<MapError>,
) {
    let warning = Warning::new(context, error);
    log::warn!("{warning}");
    warnings.push(warning);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_count_error_reports_missing_bytes() {
        let err = DecodeError::ByteCount { len: 6, missing: 2 };
        assert!(err.to_string().contains("2 bytes missing"));
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn every_taxonomy_entry_is_reachable_by_kind() {
        let size = MapError::from(DecodeError::SizeMismatch {
            expected: 100,
            actual: 99,
        });
        assert_eq!(size.kind(), ErrorKind::CorruptedPayload);
        assert_eq!(MapError::MissingField("tilewidth").kind(), ErrorKind::Structural);
        assert_eq!(MapError::UnknownGid { gid: 4 }.kind(), ErrorKind::ResolutionMiss);
        let token = MapError::from(TokenError {
            position: 2,
            token: "x".into(),
            reason: TokenErrorReason::Malformed,
        });
        assert_eq!(token.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn context_names_the_failing_location() {
        let ctx = IssueContext::layer("ground")
            .with_chunk(-16, 0)
            .with_encoding(Some("base64"), Some("zlib"));
        assert_eq!(ctx.to_string(), "layer 'ground', chunk (-16, 0), encoding base64/zlib");
        assert_eq!(IssueContext::map().to_string(), "map");
    }
}
