//! Value coercion shared by filter evaluation and the query encoders.
//!
//! Comparison is lenient across representations: `1`, `1.0` and `"1"` are all equal.
//! Ordering two values that have no common representation is an error.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use geo::{BoundingRect, Geometry, Rect};
use wkt::TryFromWkt;

use crate::{FilterError, Value};

/// Numeric view of a value. Integral kinds keep full precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Decimal(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(n) => n as f64,
            Number::Decimal(d) => d,
        }
    }

    pub fn compare_to(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Integer(a), Number::Integer(b)) => Some(a.cmp(&b)),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

fn parse_number(s: &str) -> Option<Number> {
    let s = s.trim();
    s.parse::<i64>()
        .map(Number::Integer)
        .ok()
        .or_else(|| s.parse::<f64>().ok().map(Number::Decimal))
}

pub fn to_number(v: &Value) -> Option<Number> {
    match v {
        Value::Byte(n) => Some(Number::Integer(i64::from(*n))),
        Value::Short(n) => Some(Number::Integer(i64::from(*n))),
        Value::Int(n) => Some(Number::Integer(i64::from(*n))),
        Value::Long(n) => Some(Number::Integer(*n)),
        Value::Float(n) => Some(Number::Decimal(f64::from(*n))),
        Value::Double(n) => Some(Number::Decimal(*n)),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Coerces a value to a numeric `Value`, keeping the width of values that are already
/// numeric. Strings become `Long` or `Double`.
pub fn to_numeric(v: &Value) -> Option<Value> {
    if v.is_numeric() {
        return Some(v.clone());
    }
    match to_number(v)? {
        Number::Integer(n) => Some(Value::Long(n)),
        Number::Decimal(d) => Some(Value::Double(d)),
    }
}

pub fn to_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Geometry view of a value. Envelopes become polygons, strings are read as WKT.
pub fn to_geometry(v: &Value) -> Option<Geometry<f64>> {
    match v {
        Value::Geometry(g) => Some(g.clone()),
        Value::Envelope(r) => Some(Geometry::Polygon(r.to_polygon())),
        Value::String(s) => Geometry::<f64>::try_from_wkt_str(s).ok(),
        _ => None,
    }
}

pub fn to_envelope(v: &Value) -> Option<Rect<f64>> {
    match v {
        Value::Envelope(r) => Some(*r),
        other => to_geometry(other)?.bounding_rect(),
    }
}

fn type_name(v: &Value) -> &'static str {
    v.field_type().map_or("Null", |t| t.name())
}

/// Equality with cross-type coercion. Never fails: values with no common representation
/// are simply unequal.
pub fn equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::String(x), Value::String(y)) => x == y,
        _ if a.is_numeric() || b.is_numeric() => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => x.compare_to(y) == Some(Ordering::Equal),
            _ => false,
        },
        (Value::Bool(x), Value::String(s)) | (Value::String(s), Value::Bool(x)) => {
            s.trim().eq_ignore_ascii_case(if *x { "true" } else { "false" })
        }
        (Value::Date(d), Value::String(s)) | (Value::String(s), Value::Date(d)) => {
            to_date(s).as_ref() == Some(d)
        }
        (Value::Envelope(_), Value::Geometry(_)) | (Value::Geometry(_), Value::Envelope(_)) => {
            to_geometry(a) == to_geometry(b)
        }
        _ => a == b,
    }
}

/// Orders two values. `Ok(None)` means the comparison does not hold either way (a null
/// operand or NaN); `Err` means the values cannot be compared at all.
pub fn compare(a: &Value, b: &Value) -> Result<Option<Ordering>, FilterError> {
    let incomparable = || {
        FilterError::Evaluation(format!(
            "unable to compare {} with {}",
            type_name(a),
            type_name(b)
        ))
    };
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::String(x), Value::String(y)) => Ok(Some(x.cmp(y))),
        _ if a.is_numeric() || b.is_numeric() => match (to_number(a), to_number(b)) {
            (Some(x), Some(y)) => Ok(x.compare_to(y)),
            _ => Err(incomparable()),
        },
        (Value::Date(x), Value::Date(y)) => Ok(Some(x.cmp(y))),
        (Value::Date(x), Value::String(s)) => {
            to_date(s).map(|y| Some(x.cmp(&y))).ok_or_else(incomparable)
        }
        (Value::String(s), Value::Date(y)) => {
            to_date(s).map(|x| Some(x.cmp(y))).ok_or_else(incomparable)
        }
        (Value::Bool(x), Value::Bool(y)) => Ok(Some(x.cmp(y))),
        _ => Err(incomparable()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, point};

    #[test]
    fn test_numeric_equality_across_types() {
        assert!(equals(&Value::Int(1), &Value::Double(1.0)));
        assert!(equals(&Value::from("1"), &Value::Int(1)));
        assert!(equals(&Value::Double(1.0), &Value::from("1")));
        assert!(equals(&Value::Long(5), &Value::Byte(5)));
        assert!(!equals(&Value::Int(1), &Value::from("one")));
    }

    #[test]
    fn test_string_equality_is_exact() {
        assert!(!equals(&Value::from("1"), &Value::from("1.0")));
        assert!(equals(&Value::from("abc"), &Value::from("abc")));
    }

    #[test]
    fn test_null_equality() {
        assert!(equals(&Value::Null, &Value::Null));
        assert!(!equals(&Value::Null, &Value::Int(0)));
    }

    #[test]
    fn test_bool_and_date_coercion() {
        assert!(equals(&Value::Bool(true), &Value::from("TRUE")));
        let d = to_date("2006-11-30T01:30:00Z").unwrap();
        assert!(equals(&Value::Date(d), &Value::from("2006-11-30T01:30:00Z")));
    }

    #[test]
    fn test_compare_numbers() {
        assert_eq!(compare(&Value::Int(1), &Value::Double(2.5)).unwrap(), Some(Ordering::Less));
        assert_eq!(compare(&Value::from("10"), &Value::Int(9)).unwrap(), Some(Ordering::Greater));
        assert_eq!(compare(&Value::Long(i64::MAX), &Value::Long(i64::MAX - 1)).unwrap(), Some(Ordering::Greater));
        assert_eq!(compare(&Value::Double(f64::NAN), &Value::Int(1)).unwrap(), None);
    }

    #[test]
    fn test_compare_strings_lexically() {
        assert_eq!(compare(&Value::from("10"), &Value::from("9")).unwrap(), Some(Ordering::Less));
    }

    #[test]
    fn test_compare_incomparable() {
        let g = Value::from(point!(x: 0.0, y: 0.0));
        assert!(matches!(compare(&g, &Value::Int(1)), Err(FilterError::Evaluation(_))));
        assert!(compare(&Value::Int(1), &Value::from("abc")).is_err());
        assert_eq!(compare(&Value::Null, &Value::Int(1)).unwrap(), None);
    }

    #[test]
    fn test_geometry_conversion() {
        let g = to_geometry(&Value::from("POINT(1 2)")).unwrap();
        assert_eq!(g, Geometry::Point(point!(x: 1.0, y: 2.0)));
        let env = to_envelope(&Value::from("LINESTRING(0 0, 2 3)")).unwrap();
        assert_eq!(env, Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 3.0 }));
        assert!(to_geometry(&Value::Int(1)).is_none());
    }

    #[test]
    fn test_to_numeric_keeps_width() {
        assert_eq!(to_numeric(&Value::Float(1.5)), Some(Value::Float(1.5)));
        assert_eq!(to_numeric(&Value::from("7")), Some(Value::Long(7)));
        assert_eq!(to_numeric(&Value::from("7.5")), Some(Value::Double(7.5)));
        assert_eq!(to_numeric(&Value::from("x")), None);
    }
}
