//! Values stored in a request's data bag.

use std::{any::Any, collections::HashMap, fmt, sync::Arc};

/// A value stored under a string key for the lifetime of one request.
///
/// Common shapes get their own variant; anything else can be carried as an
/// [`Value::Extension`] and recovered with
/// [`RequestContext::get_extension`](super::RequestContext::get_extension).
#[derive(Clone)]
#[non_exhaustive]
pub enum Value {
    /// UTF-8 text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// String-to-string map.
    StrMap(HashMap<String, String>),
    /// Arbitrary JSON.
    Json(serde_json::Value),
    /// Any other shared value.
    Extension(Arc<dyn Any + Send + Sync>),
}

impl Value {
    /// Wrap an arbitrary value as an extension.
    pub fn extension<T>(value: T) -> Self
    where
        T: Send + Sync + 'static,
    {
        Self::Extension(Arc::new(value))
    }

    /// The text held by a [`Value::Str`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// The integer held by a [`Value::Int`].
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The flag held by a [`Value::Bool`].
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The map held by a [`Value::StrMap`].
    #[must_use]
    pub fn as_str_map(&self) -> Option<&HashMap<String, String>> {
        match self {
            Self::StrMap(m) => Some(m),
            _ => None,
        }
    }

    /// Downcast a [`Value::Extension`] to `T`.
    #[must_use]
    pub fn downcast<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        match self {
            Self::Extension(any) => Arc::clone(any).downcast::<T>().ok(),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
            Self::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::StrMap(m) => f.debug_tuple("StrMap").field(m).finish(),
            Self::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Self::Extension(_) => f.write_str("Extension(..)"),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self { Self::Str(value) }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self { Self::Str(value.to_owned()) }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self { Self::Int(value) }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self { Self::Int(i64::from(value)) }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self { Self::Float(value) }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self { Self::Bool(value) }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self { Self::Bytes(value) }
}

impl From<HashMap<String, String>> for Value {
    fn from(value: HashMap<String, String>) -> Self { Self::StrMap(value) }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self { Self::Json(value) }
}
