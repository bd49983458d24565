//! Values recovered from a params script

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

/// Best-effort value of one assignment.
///
/// `RawText` holds the source text of an expression that could not be
/// reduced to a literal; `Absent` means not even that was available.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedValue {
    Scalar(Scalar),
    Mapping(Mapping),
    Sequence(Vec<ResolvedValue>),
    RawText(String),
    Absent,
}

impl ResolvedValue {
    pub fn str(s: impl Into<String>) -> Self {
        ResolvedValue::Scalar(Scalar::Str(s.into()))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            ResolvedValue::Scalar(Scalar::Str(s)) => !s.is_empty(),
            ResolvedValue::Scalar(Scalar::Int(i)) => *i != 0,
            ResolvedValue::Scalar(Scalar::Float(f)) => *f != 0.0,
            ResolvedValue::Scalar(Scalar::Bool(b)) => *b,
            ResolvedValue::Scalar(Scalar::Null) => false,
            ResolvedValue::Mapping(m) => !m.is_empty(),
            ResolvedValue::Sequence(items) => !items.is_empty(),
            ResolvedValue::RawText(text) => !text.is_empty(),
            ResolvedValue::Absent => false,
        }
    }

    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            ResolvedValue::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ResolvedValue::Scalar(Scalar::Str(s)) | ResolvedValue::RawText(s) => {
                Value::String(s.clone())
            }
            ResolvedValue::Scalar(Scalar::Int(i)) => Value::from(*i),
            ResolvedValue::Scalar(Scalar::Float(f)) => {
                Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null)
            }
            ResolvedValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            ResolvedValue::Scalar(Scalar::Null) | ResolvedValue::Absent => Value::Null,
            ResolvedValue::Mapping(m) => Value::Object(m.to_json()),
            ResolvedValue::Sequence(items) => {
                Value::Array(items.iter().map(ResolvedValue::to_json).collect())
            }
        }
    }

    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => ResolvedValue::Scalar(Scalar::Null),
            Value::Bool(b) => ResolvedValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ResolvedValue::Scalar(Scalar::Int(i)),
                None => match n.as_f64() {
                    Some(f) => ResolvedValue::Scalar(Scalar::Float(f)),
                    None => ResolvedValue::RawText(n.to_string()),
                },
            },
            Value::String(s) => ResolvedValue::Scalar(Scalar::Str(s)),
            Value::Array(items) => {
                ResolvedValue::Sequence(items.into_iter().map(ResolvedValue::from_json).collect())
            }
            Value::Object(map) => ResolvedValue::Mapping(
                map.into_iter()
                    .map(|(k, v)| (k, ResolvedValue::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// String-keyed mapping that keeps first-insertion order. Re-inserting a key
/// replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: IndexMap<String, ResolvedValue>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ResolvedValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedValue> {
        self.entries.get(key)
    }

    /// Copy every entry of `other` into `self`; later values win.
    pub fn merge(&mut self, other: &Mapping) {
        self.entries.extend(
            other
                .entries
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect()
    }
}

impl FromIterator<(String, ResolvedValue)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (String, ResolvedValue)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Internal field name to resolved value, one entry per key found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMap {
    fields: BTreeMap<String, ResolvedValue>,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ResolvedValue) {
        self.fields.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ResolvedValue> {
        self.fields.get(key)
    }

    /// Missing keys are falsy.
    pub fn is_truthy(&self, key: &str) -> bool {
        self.get(key).is_some_and(ResolvedValue::is_truthy)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolvedValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(ResolvedValue::str("x").is_truthy());
        assert!(!ResolvedValue::str("").is_truthy());
        assert!(!ResolvedValue::Scalar(Scalar::Int(0)).is_truthy());
        assert!(ResolvedValue::Scalar(Scalar::Int(-1)).is_truthy());
        assert!(!ResolvedValue::Scalar(Scalar::Float(0.0)).is_truthy());
        assert!(!ResolvedValue::Scalar(Scalar::Bool(false)).is_truthy());
        assert!(!ResolvedValue::Scalar(Scalar::Null).is_truthy());
        assert!(!ResolvedValue::Mapping(Mapping::new()).is_truthy());
        assert!(!ResolvedValue::Sequence(Vec::new()).is_truthy());
        assert!(!ResolvedValue::RawText(String::new()).is_truthy());
        assert!(ResolvedValue::RawText("os.environ".into()).is_truthy());
        assert!(!ResolvedValue::Absent.is_truthy());
    }

    #[test]
    fn test_mapping_keeps_order_and_replaces_in_place() {
        let mut m = Mapping::new();
        m.insert("b", ResolvedValue::str("1"));
        m.insert("a", ResolvedValue::str("2"));
        m.insert("b", ResolvedValue::str("3"));
        let keys: Vec<&str> = m.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(m.get("b"), Some(&ResolvedValue::str("3")));
    }

    #[test]
    fn test_merge_later_wins() {
        let mut a: Mapping = [("x".to_string(), ResolvedValue::str("1"))]
            .into_iter()
            .collect();
        let b: Mapping = [
            ("x".to_string(), ResolvedValue::str("2")),
            ("y".to_string(), ResolvedValue::str("3")),
        ]
        .into_iter()
        .collect();
        a.merge(&b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.get("x"), Some(&ResolvedValue::str("2")));
        let keys: Vec<&str> = a.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["x", "y"]);
    }

    #[test]
    fn test_merge_large_mappings() {
        let big: Mapping = (0..20_000)
            .map(|i| (format!("k{}", i), ResolvedValue::Scalar(Scalar::Int(i))))
            .collect();
        let mut bucket = Mapping::new();
        bucket.merge(&big);
        bucket.merge(&big);
        assert_eq!(bucket.len(), 20_000);
        assert_eq!(bucket.iter().next().map(|(k, _)| k), Some("k0"));
        assert_eq!(
            bucket.get("k19999"),
            Some(&ResolvedValue::Scalar(Scalar::Int(19_999)))
        );
    }

    #[test]
    fn test_to_json() {
        let mut m = Mapping::new();
        m.insert("n", ResolvedValue::Scalar(Scalar::Int(3)));
        m.insert(
            "list",
            ResolvedValue::Sequence(vec![
                ResolvedValue::Scalar(Scalar::Bool(true)),
                ResolvedValue::Scalar(Scalar::Null),
                ResolvedValue::Scalar(Scalar::Float(1.5)),
            ]),
        );
        m.insert("raw", ResolvedValue::RawText("a + b".into()));
        assert_eq!(
            ResolvedValue::Mapping(m).to_json(),
            json!({"n": 3, "list": [true, null, 1.5], "raw": "a + b"})
        );
        assert_eq!(ResolvedValue::Absent.to_json(), Value::Null);
    }

    #[test]
    fn test_from_json() {
        let value = ResolvedValue::from_json(json!({"a": [1, 2.5, "s"], "b": null}));
        let m = value.as_mapping().expect("mapping");
        assert_eq!(
            m.get("a"),
            Some(&ResolvedValue::Sequence(vec![
                ResolvedValue::Scalar(Scalar::Int(1)),
                ResolvedValue::Scalar(Scalar::Float(2.5)),
                ResolvedValue::str("s"),
            ]))
        );
        assert_eq!(m.get("b"), Some(&ResolvedValue::Scalar(Scalar::Null)));
    }

    #[test]
    fn test_field_map() {
        let mut fields = FieldMap::new();
        fields.insert("tenant_id", ResolvedValue::str("t"));
        fields.insert("cloud", ResolvedValue::str(""));
        assert!(fields.is_truthy("tenant_id"));
        assert!(!fields.is_truthy("cloud"));
        assert!(!fields.is_truthy("missing"));
        let keys: Vec<&str> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["cloud", "tenant_id"]);
    }
}
