use std::collections::BTreeMap;

use anyhow::{anyhow, Context, Result};

/// msgpack extension type cty uses for values not known until apply.
const UNKNOWN_EXT_TYPE: i8 = 0;

static NULL: Dynamic = Dynamic::Null;

/// An attribute tree exchanged with the lifecycle runner.
///
/// Mirrors JSON with one addition: `Unknown`, a value the runner has not
/// computed yet. JSON has no spelling for it, so it only survives msgpack.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Unknown,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<Dynamic>),
    Map(BTreeMap<String, Dynamic>),
}

impl Default for Dynamic {
    fn default() -> Self {
        Dynamic::Null
    }
}

impl Dynamic {
    /// Build an object from `(attribute, value)` pairs.
    pub fn object<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Dynamic)>,
        K: Into<String>,
    {
        Dynamic::Map(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Look up an attribute. Missing attributes and non-objects read as null.
    pub fn get(&self, key: &str) -> &Dynamic {
        match self {
            Dynamic::Map(map) => map.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Dynamic::Unknown)
    }

    /// Short type label used in decode errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Unknown => "unknown",
            Dynamic::Bool(_) => "bool",
            Dynamic::Int(_) => "number",
            Dynamic::Float(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
        }
    }

    // ─── JSON ───────────────────────────────────────────────────────────────

    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Dynamic::Null,
            serde_json::Value::Bool(b) => Dynamic::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Dynamic::Int(i)
                } else {
                    n.as_f64().map(Dynamic::Float).unwrap_or(Dynamic::Null)
                }
            }
            serde_json::Value::String(s) => Dynamic::String(s),
            serde_json::Value::Array(items) => {
                Dynamic::List(items.into_iter().map(Dynamic::from_json).collect())
            }
            serde_json::Value::Object(map) => Dynamic::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Dynamic::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to JSON. Unknown values become null.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Dynamic::Null | Dynamic::Unknown => serde_json::Value::Null,
            Dynamic::Bool(b) => serde_json::Value::Bool(*b),
            Dynamic::Int(i) => serde_json::Value::Number((*i).into()),
            Dynamic::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Dynamic::String(s) => serde_json::Value::String(s.clone()),
            Dynamic::List(items) => {
                serde_json::Value::Array(items.iter().map(Dynamic::to_json).collect())
            }
            Dynamic::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    // ─── msgpack ────────────────────────────────────────────────────────────

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Ok(Dynamic::Null);
        }
        let raw = rmpv::decode::read_value(&mut &bytes[..]).context("Failed to decode msgpack")?;
        from_rmpv(raw)
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &to_rmpv(self))
            .map_err(|e| anyhow!("Failed to encode msgpack: {}", e))?;
        Ok(buf)
    }
}

fn from_rmpv(val: rmpv::Value) -> Result<Dynamic> {
    Ok(match val {
        rmpv::Value::Nil => Dynamic::Null,
        rmpv::Value::Boolean(b) => Dynamic::Bool(b),
        rmpv::Value::Integer(i) => {
            if let Some(n) = i.as_i64() {
                Dynamic::Int(n)
            } else if let Some(n) = i.as_f64() {
                Dynamic::Float(n)
            } else {
                Dynamic::Null
            }
        }
        rmpv::Value::F32(f) => Dynamic::Float(f as f64),
        rmpv::Value::F64(f) => Dynamic::Float(f),
        rmpv::Value::String(s) => match s.into_str() {
            Some(s) => Dynamic::String(s),
            None => return Err(anyhow!("msgpack string is not valid UTF-8")),
        },
        rmpv::Value::Binary(b) => Dynamic::String(String::from_utf8_lossy(&b).into_owned()),
        rmpv::Value::Array(items) => Dynamic::List(
            items
                .into_iter()
                .map(from_rmpv)
                .collect::<Result<Vec<_>>>()?,
        ),
        rmpv::Value::Map(entries) => {
            let mut map = BTreeMap::new();
            for (k, v) in entries {
                let key = match k {
                    rmpv::Value::String(s) => s.into_str().unwrap_or_default(),
                    other => format!("{}", other),
                };
                map.insert(key, from_rmpv(v)?);
            }
            Dynamic::Map(map)
        }
        rmpv::Value::Ext(type_id, _) if type_id == UNKNOWN_EXT_TYPE => Dynamic::Unknown,
        rmpv::Value::Ext(type_id, _) => {
            return Err(anyhow!("Unsupported msgpack extension type {}", type_id))
        }
    })
}

fn to_rmpv(value: &Dynamic) -> rmpv::Value {
    match value {
        Dynamic::Null => rmpv::Value::Nil,
        Dynamic::Unknown => rmpv::Value::Ext(UNKNOWN_EXT_TYPE, vec![0]),
        Dynamic::Bool(b) => rmpv::Value::Boolean(*b),
        Dynamic::Int(i) => rmpv::Value::from(*i),
        Dynamic::Float(f) => rmpv::Value::F64(*f),
        Dynamic::String(s) => rmpv::Value::from(s.as_str()),
        Dynamic::List(items) => rmpv::Value::Array(items.iter().map(to_rmpv).collect()),
        Dynamic::Map(map) => rmpv::Value::Map(
            map.iter()
                .map(|(k, v)| (rmpv::Value::from(k.as_str()), to_rmpv(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_survives_msgpack() {
        let value = Dynamic::object([
            ("id", Dynamic::Unknown),
            ("name", Dynamic::String("orders".into())),
            ("replicas", Dynamic::Int(2)),
            ("args", Dynamic::List(vec![Dynamic::String("--x".into())])),
        ]);
        let bytes = value.to_msgpack().unwrap();
        assert_eq!(Dynamic::from_msgpack(&bytes).unwrap(), value);
    }

    #[test]
    fn test_unknown_becomes_null_in_json() {
        let value = Dynamic::object([("id", Dynamic::Unknown)]);
        assert_eq!(value.to_json(), serde_json::json!({ "id": null }));
    }

    #[test]
    fn test_from_json_numbers() {
        let value = Dynamic::from_json(serde_json::json!({ "a": 3, "b": 1.5 }));
        assert_eq!(value.get("a"), &Dynamic::Int(3));
        assert_eq!(value.get("b"), &Dynamic::Float(1.5));
    }

    #[test]
    fn test_get_missing_is_null() {
        let value = Dynamic::from_json(serde_json::json!({}));
        assert!(value.get("nope").is_null());
        assert!(Dynamic::Int(1).get("x").is_null());
    }

    #[test]
    fn test_empty_msgpack_is_null() {
        assert!(Dynamic::from_msgpack(&[]).unwrap().is_null());
    }

    #[test]
    fn test_other_extension_types_are_rejected() {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &rmpv::Value::Ext(5, vec![1])).unwrap();
        assert!(Dynamic::from_msgpack(&buf).is_err());
    }
}
