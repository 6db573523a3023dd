//! Loading trees from JSON and YAML, and encoding them back.

use std::fs;
use std::path::Path;

use serde::de::Error as _;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::{LoadError, LoadResult};
use crate::node::Node;
use crate::scalar::Scalar;

/// Parse a JSON document into a tree. The document must be an object, an array or `null`.
/// An empty document yields an empty map.
pub fn from_json_str(text: &str) -> LoadResult<Node> {
    if text.trim().is_empty() {
        return Ok(Node::new_map());
    }
    let value: Value = serde_json::from_str(text)?;
    Ok(Node::new(value)?)
}

/// Parse a YAML document into a tree. An empty document yields an empty map.
///
/// Scalar mapping keys (`1: a`, `true: b`) become their string form. Sequence or
/// mapping keys are rejected.
pub fn from_yaml_str(text: &str) -> LoadResult<Node> {
    if text.trim().is_empty() {
        return Ok(Node::new_map());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(text)?;
    let value = serde_json::to_value(stringify_keys(value)?)?;
    Ok(Node::new(value)?)
}

fn stringify_keys(value: serde_yaml::Value) -> LoadResult<serde_yaml::Value> {
    use serde_yaml::Value as Yaml;
    Ok(match value {
        Yaml::Mapping(mapping) => {
            let mut out = serde_yaml::Mapping::with_capacity(mapping.len());
            for (key, value) in mapping {
                let key = match key {
                    Yaml::String(s) => s,
                    Yaml::Number(n) => n.to_string(),
                    Yaml::Bool(b) => b.to_string(),
                    Yaml::Null => "null".to_string(),
                    other => {
                        return Err(serde_yaml::Error::custom(format!(
                            "unsupported mapping key: {:?}",
                            other
                        ))
                        .into())
                    }
                };
                out.insert(Yaml::String(key), stringify_keys(value)?);
            }
            Yaml::Mapping(out)
        }
        Yaml::Sequence(items) => Yaml::Sequence(
            items
                .into_iter()
                .map(stringify_keys)
                .collect::<LoadResult<Vec<_>>>()?,
        ),
        Yaml::Tagged(tagged) => stringify_keys(tagged.value)?,
        scalar => scalar,
    })
}

/// Load a JSON file. An empty file yields an empty map.
#[instrument(level = "debug")]
pub fn from_json_file(path: &Path) -> LoadResult<Node> {
    from_json_str(&read(path)?)
}

#[instrument(level = "debug")]
pub fn from_yaml_file(path: &Path) -> LoadResult<Node> {
    from_yaml_str(&read(path)?)
}

/// Load a file, choosing the parser from its extension (`.json`, `.yaml`, `.yml`).
///
/// # Errors
/// `UnsupportedFileExtension` for any other extension; read and parse errors otherwise.
pub fn from_file(path: impl AsRef<Path>) -> LoadResult<Node> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    debug!(path = %path.display(), ?extension, "Loading tree");
    match extension.as_deref() {
        Some("json") => from_json_file(path),
        Some("yaml") | Some("yml") => from_yaml_file(path),
        _ => Err(LoadError::UnsupportedFileExtension(path.to_path_buf())),
    }
}

fn read(path: &Path) -> LoadResult<String> {
    fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn to_json_string(node: &Node) -> LoadResult<String> {
    Ok(serde_json::to_string_pretty(node)?)
}

pub fn to_yaml_string(node: &Node) -> LoadResult<String> {
    Ok(serde_yaml::to_string(node)?)
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map.iter() {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Node::Seq(seq) => {
                let mut out = serializer.serialize_seq(Some(seq.len()))?;
                for item in seq.iter() {
                    out.serialize_element(item)?;
                }
                out.end()
            }
            Node::Scalar(scalar) => scalar.serialize(serializer),
            Node::Empty => serializer.serialize_unit(),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            Scalar::Float(_) => serializer.serialize_unit(),
            Scalar::Str(s) => serializer.serialize_str(s),
        }
    }
}

/// Deserializes through the plain-value constructor, so a top-level scalar is rejected.
impl<'de> Deserialize<'de> for Node {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Node::new(value).map_err(D::Error::custom)
    }
}
