//! Generic JSON decoding and typed deserialization of response bodies.
//!
//! # Design
//! [`flatten`] turns any JSON document into a [`GenericValue`] tree that
//! keeps the document's key and element order, without knowing a target
//! type up front. The tree is built straight from the parser through a
//! depth-tracking `DeserializeSeed`, so the nesting limit is enforced while
//! parsing rather than after an unbounded recursive descent.
//!
//! Typed decoding goes through serde: [`deserialize_as`] picks JSON or XML
//! by [`DataFormat`]. Unknown fields are ignored, which is serde's default.

use std::cell::Cell;
use std::fmt;

use serde::de::{self, DeserializeOwned, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use crate::error::{Result, WebError};
use crate::http::DataFormat;

pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Language-neutral JSON tree.
#[derive(Debug, Clone, PartialEq)]
pub enum GenericValue {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<GenericValue>),
    /// Keys in document order. A repeated key keeps its first position and
    /// the last value.
    Mapping(Vec<(String, GenericValue)>),
}

impl GenericValue {
    /// Value stored under `key` when this is a mapping.
    pub fn get(&self, key: &str) -> Option<&GenericValue> {
        match self {
            GenericValue::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Element at `index` when this is a sequence.
    pub fn index(&self, index: usize) -> Option<&GenericValue> {
        match self {
            GenericValue::Sequence(items) => items.get(index),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, GenericValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GenericValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GenericValue::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GenericValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GenericValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[GenericValue]> {
        match self {
            GenericValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[(String, GenericValue)]> {
        match self {
            GenericValue::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Serialize back to compact JSON text.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| WebError::Serialization(e.to_string()))
    }
}

impl Serialize for GenericValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            GenericValue::Null => serializer.serialize_unit(),
            GenericValue::Bool(b) => serializer.serialize_bool(*b),
            GenericValue::Number(n) => n.serialize(serializer),
            GenericValue::String(s) => serializer.serialize_str(s),
            GenericValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            GenericValue::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Options for [`flatten_with`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlattenOptions {
    /// Maximum number of nested arrays/objects.
    pub max_depth: usize,
}

impl Default for FlattenOptions {
    fn default() -> Self {
        FlattenOptions {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Decode `json` into a [`GenericValue`] with the default depth limit.
pub fn flatten(json: &str) -> Result<GenericValue> {
    flatten_with(json, FlattenOptions::default())
}

pub fn flatten_with(json: &str, options: FlattenOptions) -> Result<GenericValue> {
    let exceeded = Cell::new(false);
    let seed = DepthSeed {
        depth: 0,
        max: options.max_depth,
        exceeded: &exceeded,
    };

    // DepthSeed bounds nesting, so serde_json's own fixed limit is lifted.
    let mut de = serde_json::Deserializer::from_str(json);
    de.disable_recursion_limit();
    let parsed = seed.deserialize(&mut de).and_then(|value| de.end().map(|()| value));

    match parsed {
        Ok(value) => Ok(value),
        Err(_) if exceeded.get() => Err(WebError::DepthExceeded {
            max: options.max_depth,
        }),
        Err(e) => Err(WebError::Deserialization(e.to_string())),
    }
}

#[derive(Clone, Copy)]
struct DepthSeed<'a> {
    depth: usize,
    max: usize,
    exceeded: &'a Cell<bool>,
}

impl DepthSeed<'_> {
    fn descend<E: de::Error>(self) -> std::result::Result<Self, E> {
        if self.depth >= self.max {
            self.exceeded.set(true);
            return Err(E::custom(format_args!("nesting deeper than {}", self.max)));
        }
        Ok(DepthSeed {
            depth: self.depth + 1,
            ..self
        })
    }
}

impl<'de> DeserializeSeed<'de> for DepthSeed<'_> {
    type Value = GenericValue;

    fn deserialize<D>(self, deserializer: D) -> std::result::Result<Self::Value, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }
}

impl<'de> Visitor<'de> for DepthSeed<'_> {
    type Value = GenericValue;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<GenericValue, E> {
        Ok(GenericValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<GenericValue, E> {
        Ok(GenericValue::Null)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<GenericValue, E> {
        Ok(GenericValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<GenericValue, E> {
        Ok(GenericValue::Number(v.into()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<GenericValue, E> {
        Ok(GenericValue::Number(v.into()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<GenericValue, E> {
        Ok(Number::from_f64(v).map_or(GenericValue::Null, GenericValue::Number))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<GenericValue, E> {
        Ok(GenericValue::String(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<GenericValue, E> {
        Ok(GenericValue::String(v))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<GenericValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let child = self.descend::<A::Error>()?;
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element_seed(child)? {
            items.push(item);
        }
        Ok(GenericValue::Sequence(items))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<GenericValue, A::Error>
    where
        A: MapAccess<'de>,
    {
        let child = self.descend::<A::Error>()?;
        let mut entries: Vec<(String, GenericValue)> = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value_seed(child)?;
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
        }
        Ok(GenericValue::Mapping(entries))
    }
}

/// Decode `content` into `T` using the given format.
pub fn deserialize_as<T: DeserializeOwned>(content: &str, format: DataFormat) -> Result<T> {
    match format {
        DataFormat::Json => {
            serde_json::from_str(content).map_err(|e| WebError::Deserialization(e.to_string()))
        }
        DataFormat::Xml => {
            quick_xml::de::from_str(content).map_err(|e| WebError::Deserialization(e.to_string()))
        }
    }
}

/// Decode the JSON node addressed by `root` (see [`select_root`]) into `T`.
pub fn deserialize_json_at<T: DeserializeOwned>(content: &str, root: &str) -> Result<T> {
    let document = parse_value(content)?;
    let node = select_node(&document, root)?;
    T::deserialize(node).map_err(|e| WebError::Deserialization(e.to_string()))
}

/// Text of the node addressed by `path` in `json`.
///
/// `path` is a dotted property path with optional `[index]` steps, e.g.
/// `data.items[0].name`; a leading `$` is accepted. String nodes come back
/// without quotes, any other node as compact JSON.
pub fn select_root(json: &str, path: &str) -> Result<String> {
    if json.trim().is_empty() || path.trim().is_empty() {
        return Err(WebError::InvalidArgument(
            "both the JSON text and the root path are required".to_string(),
        ));
    }
    let document = parse_value(json)?;
    Ok(node_text(select_node(&document, path)?))
}

/// Top-level property names of a JSON object and each value's text.
pub fn properties(json: &str) -> Result<(Vec<String>, Vec<String>)> {
    match parse_value(json)? {
        Value::Object(map) => Ok(map.iter().map(|(k, v)| (k.clone(), node_text(v))).unzip()),
        other => Err(WebError::Deserialization(format!(
            "expected a JSON object, found {}",
            kind_name(&other)
        ))),
    }
}

/// Indented JSON for any serializable value.
pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| WebError::Serialization(e.to_string()))
}

fn parse_value(json: &str) -> Result<Value> {
    serde_json::from_str(json).map_err(|e| WebError::Deserialization(e.to_string()))
}

fn select_node<'a>(document: &'a Value, path: &str) -> Result<&'a Value> {
    let path = path.trim();
    let path = path.strip_prefix('$').unwrap_or(path);
    let mut node = document;
    for step in path.split('.').filter(|s| !s.is_empty()) {
        let (name, indices) = match step.find('[') {
            Some(pos) => step.split_at(pos),
            None => (step, ""),
        };
        if !name.is_empty() {
            node = node
                .get(name)
                .ok_or_else(|| WebError::Deserialization(format!("no property {name:?} at {step:?}")))?;
        }
        for index in parse_indices(indices, step)? {
            node = node
                .get(index)
                .ok_or_else(|| WebError::Deserialization(format!("no element {index} at {step:?}")))?;
        }
    }
    Ok(node)
}

fn parse_indices(mut rest: &str, step: &str) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    while !rest.is_empty() {
        let close = rest
            .strip_prefix('[')
            .and_then(|r| r.find(']').map(|end| (r, end)));
        let (inner, end) =
            close.ok_or_else(|| WebError::InvalidArgument(format!("malformed path step {step:?}")))?;
        let index: usize = inner[..end]
            .trim()
            .parse()
            .map_err(|_| WebError::InvalidArgument(format!("malformed index in {step:?}")))?;
        indices.push(index);
        rest = &inner[end + 1..];
    }
    Ok(indices)
}

fn node_text(node: &Value) -> String {
    match node {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
