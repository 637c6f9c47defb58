use crate::error::MapError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Settings that steer map → level conversion.
///
/// Layer name lists are patterns: `*` matches any run of characters and the
/// comparison ignores ASCII case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConversionConfig {
    /// Object type (class) → prefab path.
    pub prefabs: BTreeMap<String, String>,
    /// Used for objects whose type has no entry in `prefabs`.
    pub default_prefab: String,
    pub collision_layers: Vec<String>,
    pub sector_layers: Vec<String>,
    pub patrol_layers: Vec<String>,
    pub resource_base_path: PathBuf,
}

impl ConversionConfig {
    pub fn from_json_str(txt: &str) -> Result<Self, MapError> {
        serde_json::from_str(txt).map_err(|source| MapError::Json {
            path: PathBuf::from("<config>"),
            source,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let path = path.as_ref();
        let txt = std::fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&txt).map_err(|source| MapError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn prefab_for(&self, object_type: &str) -> Option<&str> {
        self.prefabs.get(object_type).map(String::as_str)
    }

    pub fn is_collision_layer(&self, name: &str) -> bool {
        any_match(&self.collision_layers, name)
    }

    pub fn is_sector_layer(&self, name: &str) -> bool {
        any_match(&self.sector_layers, name)
    }

    pub fn is_patrol_layer(&self, name: &str) -> bool {
        any_match(&self.patrol_layers, name)
    }
}

fn any_match(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|p| matches_pattern(p, name))
}

/// Case-insensitive match where `*` stands for any (possibly empty) substring.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let name = name.to_ascii_lowercase();
    let mut parts = pattern.split('*');
    let Some(head) = parts.next() else {
        return name.is_empty();
    };
    let Some(mut rest) = name.strip_prefix(head) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((tail, middle)) = parts.split_last() else {
        // no '*' at all
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(at) => rest = &rest[at + part.len()..],
            None => return false,
        }
    }
    rest.len() >= tail.len() && rest.ends_with(tail)
}
