//! Order-preserving document tree
//!
//! YAML and JSON documents are parsed into [`Node`], which keeps mapping
//! entries in source order. API descriptions are order-sensitive (paths,
//! properties), so nothing here ever sorts a mapping in place.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_yaml::Value;
use thiserror::Error;

/// A parsed document, or any subtree of one
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Ordered key/value pairs; keys are unique within one mapping
    Mapping(Vec<(String, Node)>),
    Sequence(Vec<Node>),
    Scalar(Scalar),
}

/// Leaf values
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
}

/// Reasons a byte buffer cannot become a [`Node`]
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("{0}")]
    Syntax(#[from] serde_yaml::Error),

    #[error("unsupported {0} used as a mapping key")]
    UnsupportedKey(&'static str),

    #[error("duplicate mapping key '{0}'")]
    DuplicateKey(String),
}

/// Parse YAML (and therefore JSON) bytes into a tree.
pub fn parse_document(bytes: &[u8]) -> Result<Node, TreeError> {
    let value: Value = serde_yaml::from_slice(bytes)?;
    Node::from_yaml(value)
}

impl Node {
    /// Convert a `serde_yaml` value, keeping mapping order.
    ///
    /// Scalar keys (booleans, numbers) are stringified the way they print.
    /// Tags are dropped and their inner value kept.
    pub fn from_yaml(value: Value) -> Result<Node, TreeError> {
        Ok(match value {
            Value::Null => Node::Scalar(Scalar::Null),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Node::Scalar(Scalar::Number(n)),
            Value::String(s) => Node::Scalar(Scalar::String(s)),
            Value::Sequence(items) => Node::Sequence(
                items
                    .into_iter()
                    .map(Node::from_yaml)
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            Value::Mapping(map) => {
                let mut entries: Vec<(String, Node)> = Vec::with_capacity(map.len());
                for (k, v) in map {
                    let key = key_string(k)?;
                    if entries.iter().any(|(existing, _)| *existing == key) {
                        return Err(TreeError::DuplicateKey(key));
                    }
                    entries.push((key, Node::from_yaml(v)?));
                }
                Node::Mapping(entries)
            }
            Value::Tagged(tagged) => Node::from_yaml(tagged.value)?,
        })
    }

    /// Short name of the node's variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Node::Mapping(_) => "mapping",
            Node::Sequence(_) => "sequence",
            Node::Scalar(Scalar::Null) => "null",
            Node::Scalar(Scalar::Bool(_)) => "boolean",
            Node::Scalar(Scalar::Number(_)) => "number",
            Node::Scalar(Scalar::String(_)) => "string",
        }
    }

    pub fn as_mapping(&self) -> Option<&[(String, Node)]> {
        match self {
            Node::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match self {
            Node::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Value stored under `key`, if this is a mapping that has it.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Mapping keys sorted lexicographically; empty for non-mappings.
    pub fn sorted_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .as_mapping()
            .map(|entries| entries.iter().map(|(k, _)| k.as_str()).collect())
            .unwrap_or_default();
        keys.sort_unstable();
        keys
    }

    /// String items of a sequence. Non-string items are skipped.
    pub fn string_items(&self) -> Vec<&str> {
        self.as_sequence()
            .map(|items| items.iter().filter_map(Node::as_str).collect())
            .unwrap_or_default()
    }
}

impl From<&str> for Node {
    fn from(s: &str) -> Self {
        Node::Scalar(Scalar::String(s.to_string()))
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::String(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Node::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            Node::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Node::Scalar(scalar) => scalar.serialize(serializer),
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(n) => n.serialize(serializer),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

fn key_string(key: Value) -> Result<String, TreeError> {
    match key {
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok("null".to_string()),
        Value::Tagged(tagged) => key_string(tagged.value),
        Value::Sequence(_) => Err(TreeError::UnsupportedKey("sequence")),
        Value::Mapping(_) => Err(TreeError::UnsupportedKey("mapping")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_keeps_source_order() {
        let doc = parse_document(b"zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let keys: Vec<&str> = doc
            .as_mapping()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        assert_eq!(doc.sorted_keys(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_parses_json() {
        let doc = parse_document(br#"{"b": [1, "two", null], "a": {"x": true}}"#).unwrap();
        assert_eq!(doc.get("b").unwrap().kind_name(), "sequence");
        assert_eq!(doc.get("b").unwrap().string_items(), vec!["two"]);
        assert_eq!(
            doc.get("a").unwrap().get("x"),
            Some(&Node::Scalar(Scalar::Bool(true)))
        );
    }

    #[test]
    fn test_scalar_keys_are_stringified() {
        let doc = parse_document(b"200: ok\ntrue: yes\n").unwrap();
        assert!(doc.has_key("200"));
        assert!(doc.has_key("true"));
    }

    #[test]
    fn test_complex_key_rejected() {
        let err = parse_document(b"? [a, b]\n: value\n").unwrap_err();
        assert!(matches!(err, TreeError::UnsupportedKey("sequence")));
    }

    #[test]
    fn test_syntax_error() {
        let err = parse_document(b"key: [unclosed\n").unwrap_err();
        assert!(matches!(err, TreeError::Syntax(_)));
    }

    #[test]
    fn test_tag_is_dropped() {
        let doc = parse_document(b"value: !custom hello\n").unwrap();
        assert_eq!(doc.get("value").and_then(Node::as_str), Some("hello"));
    }

    #[test]
    fn test_accessors_on_non_mapping() {
        let node = Node::from("plain");
        assert!(!node.has_key("plain"));
        assert!(node.get("plain").is_none());
        assert!(node.sorted_keys().is_empty());
        assert!(node.string_items().is_empty());
    }

    #[test]
    fn test_serialize_preserves_order() {
        let doc = parse_document(b"z: 1\na: [x, y]\nm: ~\n").unwrap();
        let json = serde_json::to_string(&doc).unwrap();
        assert_eq!(json, r#"{"z":1,"a":["x","y"],"m":null}"#);
    }
}
