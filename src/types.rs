//! Types module: defines field types and runtime values for the filter engine.
//!
//! This module provides the FieldType and Value enums. Numeric values keep their width
//! (byte through double) because some encoders choose query shapes from it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use geo::{Geometry, Point, Rect};
use serde::{Deserialize, Serialize};
use wkt::ToWkt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum FieldType {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    String,
    Date,
    Geometry,
    Envelope,
    Map,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Byte
                | FieldType::Short
                | FieldType::Int
                | FieldType::Long
                | FieldType::Float
                | FieldType::Double
        )
    }

    pub fn is_spatial(&self) -> bool {
        matches!(self, FieldType::Geometry | FieldType::Envelope)
    }

    /// Name used when a type appears in filter text.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Bool => "Boolean",
            FieldType::Byte => "Byte",
            FieldType::Short => "Short",
            FieldType::Int => "Integer",
            FieldType::Long => "Long",
            FieldType::Float => "Float",
            FieldType::Double => "Double",
            FieldType::String => "String",
            FieldType::Date => "Date",
            FieldType::Geometry => "Geometry",
            FieldType::Envelope => "Envelope",
            FieldType::Map => "Map",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime value held by a record or a literal.
///
/// `Null` is a field that exists without a value. A field that does not exist at all is
/// represented by `Option::None` wherever values are looked up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Date(DateTime<Utc>),
    Geometry(Geometry<f64>),
    Envelope(Rect<f64>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    /// The type of this value, `None` for `Null`.
    pub fn field_type(&self) -> Option<FieldType> {
        let ty = match self {
            Value::Null => return None,
            Value::Bool(_) => FieldType::Bool,
            Value::Byte(_) => FieldType::Byte,
            Value::Short(_) => FieldType::Short,
            Value::Int(_) => FieldType::Int,
            Value::Long(_) => FieldType::Long,
            Value::Float(_) => FieldType::Float,
            Value::Double(_) => FieldType::Double,
            Value::String(_) => FieldType::String,
            Value::Date(_) => FieldType::Date,
            Value::Geometry(_) => FieldType::Geometry,
            Value::Envelope(_) => FieldType::Envelope,
            Value::Map(_) => FieldType::Map,
        };
        Some(ty)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_numeric(&self) -> bool {
        self.field_type().is_some_and(|t| t.is_numeric())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// Formats a float so that it always reads back as a float (`1.0`, not `1`).
pub(crate) fn format_float(d: f64) -> String {
    format!("{d:?}")
}

pub(crate) fn format_date(d: &DateTime<Utc>) -> String {
    d.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// The plain string form of a value, as used by LIKE matching, id comparison and
/// search-engine query text.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Byte(n) => write!(f, "{n}"),
            Value::Short(n) => write!(f, "{n}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Long(n) => write!(f, "{n}"),
            Value::Float(n) => f.write_str(&format_float(f64::from(*n))),
            Value::Double(n) => f.write_str(&format_float(*n)),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => f.write_str(&format_date(d)),
            Value::Geometry(g) => f.write_str(&g.wkt_string()),
            Value::Envelope(r) => write!(
                f,
                "ENVELOPE({}, {}, {}, {})",
                format_float(r.min().x),
                format_float(r.max().x),
                format_float(r.max().y),
                format_float(r.min().y)
            ),
            Value::Map(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}={v}")?;
                }
                f.write_str("}")
            }
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    String => String,
    DateTime<Utc> => Date,
    Geometry<f64> => Geometry,
    Rect<f64> => Envelope,
    BTreeMap<String, Value> => Map,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Point<f64>> for Value {
    fn from(p: Point<f64>) -> Self {
        Value::Geometry(Geometry::Point(p))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}
