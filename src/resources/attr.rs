use std::collections::BTreeMap;

use crate::provider::dynamic::Dynamic;

/// An attribute value as seen during a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attr<T> {
    /// Not set.
    Null,
    /// Set, but not known until apply.
    Unknown,
    Known(T),
}

impl<T> Default for Attr<T> {
    fn default() -> Self {
        Attr::Null
    }
}

impl<T> Attr<T> {
    pub fn known(&self) -> Option<&T> {
        match self {
            Attr::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_known(self) -> Option<T> {
        match self {
            Attr::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Attr::Known(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Attr::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Attr::Unknown)
    }

    /// Keep a known value; otherwise take `fallback`.
    pub fn or_known(self, fallback: Attr<T>) -> Attr<T> {
        match self {
            Attr::Known(_) => self,
            _ => fallback,
        }
    }
}

impl Attr<String> {
    pub fn known_str(&self) -> Option<&str> {
        self.known().map(String::as_str)
    }

    /// The known value, or the empty string.
    pub fn value_or_empty(&self) -> String {
        self.known().cloned().unwrap_or_default()
    }
}

impl<T> From<Option<T>> for Attr<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Attr::Known(v),
            None => Attr::Null,
        }
    }
}

// ─── Dynamic Conversions ────────────────────────────────────────────────────

/// Decode a typed value from a dynamic tree. Errors describe the mismatch.
pub trait FromDynamic: Sized {
    fn from_dynamic(value: &Dynamic) -> Result<Self, String>;
}

/// Encode a typed value into a dynamic tree.
pub trait ToDynamic {
    fn to_dynamic(&self) -> Dynamic;
}

fn mismatch(expected: &str, found: &Dynamic) -> String {
    format!("expected {}, found {}", expected, found.type_name())
}

impl FromDynamic for String {
    fn from_dynamic(value: &Dynamic) -> Result<Self, String> {
        match value {
            Dynamic::String(s) => Ok(s.clone()),
            other => Err(mismatch("string", other)),
        }
    }
}

impl FromDynamic for i64 {
    fn from_dynamic(value: &Dynamic) -> Result<Self, String> {
        match value {
            Dynamic::Int(i) => Ok(*i),
            Dynamic::Float(f) if f.fract() == 0.0 => Ok(*f as i64),
            other => Err(mismatch("whole number", other)),
        }
    }
}

impl FromDynamic for bool {
    fn from_dynamic(value: &Dynamic) -> Result<Self, String> {
        match value {
            Dynamic::Bool(b) => Ok(*b),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl<T: FromDynamic> FromDynamic for Vec<T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, String> {
        match value {
            Dynamic::List(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| T::from_dynamic(item).map_err(|e| format!("[{}]: {}", i, e)))
                .collect(),
            other => Err(mismatch("list", other)),
        }
    }
}

impl<T: FromDynamic> FromDynamic for BTreeMap<String, T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, String> {
        match value {
            Dynamic::Map(map) => map
                .iter()
                .map(|(k, v)| {
                    T::from_dynamic(v)
                        .map(|v| (k.clone(), v))
                        .map_err(|e| format!("[{:?}]: {}", k, e))
                })
                .collect(),
            other => Err(mismatch("map", other)),
        }
    }
}

impl<T: FromDynamic> FromDynamic for Attr<T> {
    fn from_dynamic(value: &Dynamic) -> Result<Self, String> {
        match value {
            Dynamic::Null => Ok(Attr::Null),
            Dynamic::Unknown => Ok(Attr::Unknown),
            other => T::from_dynamic(other).map(Attr::Known),
        }
    }
}

impl ToDynamic for String {
    fn to_dynamic(&self) -> Dynamic {
        Dynamic::String(self.clone())
    }
}

impl ToDynamic for i64 {
    fn to_dynamic(&self) -> Dynamic {
        Dynamic::Int(*self)
    }
}

impl ToDynamic for bool {
    fn to_dynamic(&self) -> Dynamic {
        Dynamic::Bool(*self)
    }
}

impl<T: ToDynamic> ToDynamic for Vec<T> {
    fn to_dynamic(&self) -> Dynamic {
        Dynamic::List(self.iter().map(ToDynamic::to_dynamic).collect())
    }
}

impl<T: ToDynamic> ToDynamic for BTreeMap<String, T> {
    fn to_dynamic(&self) -> Dynamic {
        Dynamic::Map(
            self.iter()
                .map(|(k, v)| (k.clone(), v.to_dynamic()))
                .collect(),
        )
    }
}

impl<T: ToDynamic> ToDynamic for Attr<T> {
    fn to_dynamic(&self) -> Dynamic {
        match self {
            Attr::Null => Dynamic::Null,
            Attr::Unknown => Dynamic::Unknown,
            Attr::Known(v) => v.to_dynamic(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_from_dynamic() {
        assert_eq!(Attr::<String>::from_dynamic(&Dynamic::Null), Ok(Attr::Null));
        assert_eq!(Attr::<String>::from_dynamic(&Dynamic::Unknown), Ok(Attr::Unknown));
        assert_eq!(
            Attr::<i64>::from_dynamic(&Dynamic::Int(4)),
            Ok(Attr::Known(4))
        );
        assert!(Attr::<bool>::from_dynamic(&Dynamic::String("yes".into())).is_err());
    }

    #[test]
    fn test_list_elements_may_be_unknown() {
        let value = Dynamic::List(vec![Dynamic::String("a".into()), Dynamic::Unknown]);
        let decoded = Attr::<Vec<Attr<String>>>::from_dynamic(&value).unwrap();
        assert_eq!(
            decoded,
            Attr::Known(vec![Attr::Known("a".to_string()), Attr::Unknown])
        );
    }

    #[test]
    fn test_list_error_names_index() {
        let value = Dynamic::List(vec![Dynamic::String("a".into()), Dynamic::Int(1)]);
        let err = Vec::<String>::from_dynamic(&value).unwrap_err();
        assert_eq!(err, "[1]: expected string, found number");
    }

    #[test]
    fn test_whole_float_decodes_as_int() {
        assert_eq!(i64::from_dynamic(&Dynamic::Float(30.0)), Ok(30));
        assert!(i64::from_dynamic(&Dynamic::Float(1.5)).is_err());
    }

    #[test]
    fn test_or_known() {
        let fallback = Attr::Known("remote".to_string());
        assert_eq!(Attr::Null.or_known(fallback.clone()), fallback);
        assert_eq!(
            Attr::Known("local".to_string()).or_known(fallback),
            Attr::Known("local".to_string())
        );
    }
}
