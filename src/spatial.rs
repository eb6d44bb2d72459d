//! Spatial predicates.
//!
//! BBOX compares bounding rectangles only. The topological predicates go through the
//! DE-9IM matrix computed by `geo::Relate`, and the distance predicates use euclidean
//! distance in the units of the coordinates.

use std::fmt;

use geo::{EuclideanDistance, Intersects, Relate};
use serde::{Deserialize, Serialize};

use crate::context::Record;
use crate::convert;
use crate::expr::{Expression, Property};
use crate::types::{format_float, Value};
use crate::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpatialType {
    Equals,
    Intersects,
    Touches,
    Disjoint,
    Overlaps,
    Crosses,
    Covers,
    BBox,
    Within,
    Contains,
    DWithin,
    Beyond,
}

impl SpatialType {
    pub const ALL: [SpatialType; 12] = [
        SpatialType::Equals,
        SpatialType::Intersects,
        SpatialType::Touches,
        SpatialType::Disjoint,
        SpatialType::Overlaps,
        SpatialType::Crosses,
        SpatialType::Covers,
        SpatialType::BBox,
        SpatialType::Within,
        SpatialType::Contains,
        SpatialType::DWithin,
        SpatialType::Beyond,
    ];

    /// The predicate that holds with the operands swapped.
    pub fn invert(self) -> Self {
        match self {
            SpatialType::Within => SpatialType::Contains,
            SpatialType::Contains => SpatialType::Within,
            SpatialType::DWithin => SpatialType::Beyond,
            SpatialType::Beyond => SpatialType::DWithin,
            other => other,
        }
    }

    pub fn requires_distance(self) -> bool {
        matches!(self, SpatialType::DWithin | SpatialType::Beyond)
    }

    pub fn name(self) -> &'static str {
        match self {
            SpatialType::Equals => "EQUALS",
            SpatialType::Intersects => "INTERSECTS",
            SpatialType::Touches => "TOUCHES",
            SpatialType::Disjoint => "DISJOINT",
            SpatialType::Overlaps => "OVERLAPS",
            SpatialType::Crosses => "CROSSES",
            SpatialType::Covers => "COVERS",
            SpatialType::BBox => "BBOX",
            SpatialType::Within => "WITHIN",
            SpatialType::Contains => "CONTAINS",
            SpatialType::DWithin => "DWITHIN",
            SpatialType::Beyond => "BEYOND",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for SpatialType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spatial {
    kind: SpatialType,
    left: Expression,
    right: Expression,
    distance: Option<Expression>,
}

impl Spatial {
    /// DWITHIN and BEYOND require a distance; other types ignore one.
    pub fn new(
        kind: SpatialType,
        left: Expression,
        right: Expression,
        distance: Option<Expression>,
    ) -> Result<Self, FilterError> {
        if kind.requires_distance() && distance.is_none() {
            return Err(FilterError::Construction(format!("{kind} requires a distance")));
        }
        let distance = if kind.requires_distance() { distance } else { None };
        Ok(Self {
            kind,
            left,
            right,
            distance,
        })
    }

    pub fn kind(&self) -> SpatialType {
        self.kind
    }

    pub fn left(&self) -> &Expression {
        &self.left
    }

    pub fn right(&self) -> &Expression {
        &self.right
    }

    pub fn distance(&self) -> Option<&Expression> {
        self.distance.as_ref()
    }

    pub fn property(&self) -> Option<&Property> {
        self.left.as_property()
    }

    pub fn invert(&self) -> Self {
        Self {
            kind: self.kind.invert(),
            left: self.right.clone(),
            right: self.left.clone(),
            distance: self.distance.clone(),
        }
    }

    pub fn normalize(&self) -> Result<Self, FilterError> {
        if self.left.is_property() {
            Ok(self.clone())
        } else if self.right.is_property() {
            Ok(self.invert())
        } else {
            Err(FilterError::NotNormalizable(format!(
                "{self}: neither operand is a property"
            )))
        }
    }

    pub fn test(&self, record: &dyn Record) -> Result<bool, FilterError> {
        let (Some(l), Some(r)) = (self.left.evaluate(record), self.right.evaluate(record)) else {
            return Ok(false);
        };
        if l.is_null() || r.is_null() {
            return Ok(false);
        }

        if self.kind == SpatialType::BBox {
            let a = envelope(&l)?;
            let b = envelope(&r)?;
            return Ok(a.intersects(&b));
        }

        let a = geometry(&l)?;
        let b = geometry(&r)?;
        if self.kind.requires_distance() {
            let Some(d) = self.distance.as_ref().and_then(|d| d.evaluate(record)) else {
                return Ok(false);
            };
            let d = convert::to_number(&d)
                .ok_or_else(|| FilterError::Evaluation(format!("distance must be numeric, got {d}")))?
                .as_f64();
            let dist = a.euclidean_distance(&b);
            return Ok(match self.kind {
                SpatialType::DWithin => dist <= d,
                _ => dist > d,
            });
        }

        let m = a.relate(&b);
        Ok(match self.kind {
            SpatialType::Equals => m.is_equal_topo(),
            SpatialType::Intersects => m.is_intersects(),
            SpatialType::Touches => m.is_touches(),
            SpatialType::Disjoint => m.is_disjoint(),
            SpatialType::Overlaps => m.is_overlaps(),
            SpatialType::Crosses => m.is_crosses(),
            SpatialType::Covers => m.is_covers(),
            SpatialType::Within => m.is_within(),
            SpatialType::Contains => m.is_contains(),
            SpatialType::BBox | SpatialType::DWithin | SpatialType::Beyond => false,
        })
    }
}

fn geometry(v: &Value) -> Result<geo::Geometry<f64>, FilterError> {
    convert::to_geometry(v)
        .ok_or_else(|| FilterError::Evaluation(format!("not a geometry: {v}")))
}

fn envelope(v: &Value) -> Result<geo::Rect<f64>, FilterError> {
    convert::to_envelope(v)
        .ok_or_else(|| FilterError::Evaluation(format!("not a geometry: {v}")))
}

impl fmt::Display for Spatial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.right, &self.distance) {
            (SpatialType::BBox, Expression::Literal(Value::Envelope(r)), _) if self.left.is_property() => write!(
                f,
                "BBOX({}, {}, {}, {}, {})",
                self.left,
                format_float(r.min().x),
                format_float(r.min().y),
                format_float(r.max().x),
                format_float(r.max().y)
            ),
            (_, _, Some(d)) => write!(f, "{}({}, {}, {}, meters)", self.kind, self.left, self.right, d),
            _ => write!(f, "{}({}, {})", self.kind, self.left, self.right),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Feature;
    use crate::filter::Filter;
    use geo::{coord, point, Geometry, Rect};

    fn square() -> Value {
        convert::to_geometry(&Value::from("POLYGON((0 0, 10 0, 10 10, 0 10, 0 0))"))
            .map(Value::Geometry)
            .unwrap()
    }

    fn record() -> Feature {
        Feature::new()
            .with("geom", point!(x: 1.0, y: 1.0))
            .with("area", square())
            .with("name", "abc")
    }

    fn spatial(kind: SpatialType, left: Expression, right: Expression) -> Spatial {
        Spatial::new(kind, left, right, None).unwrap()
    }

    #[test]
    fn test_inversion_table() {
        assert_eq!(SpatialType::Within.invert(), SpatialType::Contains);
        assert_eq!(SpatialType::Contains.invert(), SpatialType::Within);
        assert_eq!(SpatialType::DWithin.invert(), SpatialType::Beyond);
        assert_eq!(SpatialType::Beyond.invert(), SpatialType::DWithin);
        for t in SpatialType::ALL {
            assert_eq!(t.invert().invert(), t);
        }
        assert_eq!(SpatialType::Intersects.invert(), SpatialType::Intersects);
    }

    #[test]
    fn test_distance_required() {
        let res = Spatial::new(SpatialType::DWithin, Expression::property("geom"), Expression::literal(point!(x: 0.0, y: 0.0)), None);
        assert!(matches!(res, Err(FilterError::Construction(_))));
        let res = Spatial::new(SpatialType::Beyond, Expression::property("geom"), Expression::literal(point!(x: 0.0, y: 0.0)), None);
        assert!(res.is_err());
    }

    #[test]
    fn test_normalize_inverts() {
        let geom = Expression::literal(point!(x: 1.0, y: 1.0));
        let s = spatial(SpatialType::Within, geom.clone(), Expression::property("geom2"));
        let n = s.normalize().unwrap();
        assert_eq!(n, spatial(SpatialType::Contains, Expression::property("geom2"), geom.clone()));
        assert_eq!(n.normalize().unwrap(), n);
        assert!(matches!(
            spatial(SpatialType::Within, geom.clone(), geom).normalize(),
            Err(FilterError::NotNormalizable(_))
        ));
    }

    #[test]
    fn test_topological_predicates() {
        let r = record();
        let p = |k| spatial(k, Expression::property("geom"), Expression::property("area")).test(&r).unwrap();
        assert!(p(SpatialType::Within));
        assert!(p(SpatialType::Intersects));
        assert!(!p(SpatialType::Disjoint));
        assert!(!p(SpatialType::Contains));
        assert!(!p(SpatialType::Touches));
        let c = spatial(SpatialType::Contains, Expression::property("area"), Expression::property("geom"));
        assert!(c.test(&r).unwrap());
        assert!(spatial(SpatialType::Covers, Expression::property("area"), Expression::property("geom")).test(&r).unwrap());
        let same = spatial(SpatialType::Equals, Expression::property("area"), Expression::literal(square()));
        assert!(same.test(&r).unwrap());
    }

    #[test]
    fn test_bbox() {
        let r = record();
        let env = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 2.0, y: 2.0 });
        let s = spatial(SpatialType::BBox, Expression::property("geom"), Expression::literal(env));
        assert!(s.test(&r).unwrap());
        let far = Rect::new(coord! { x: 20.0, y: 20.0 }, coord! { x: 30.0, y: 30.0 });
        let s = spatial(SpatialType::BBox, Expression::property("area"), Expression::literal(far));
        assert!(!s.test(&r).unwrap());
    }

    #[test]
    fn test_distance() {
        let r = record();
        let origin = Expression::literal(Geometry::Point(point!(x: 4.0, y: 5.0)));
        let within = Spatial::new(SpatialType::DWithin, Expression::property("geom"), origin.clone(), Some(Expression::literal(5))).unwrap();
        assert!(within.test(&r).unwrap());
        let beyond = Spatial::new(SpatialType::Beyond, Expression::property("geom"), origin.clone(), Some(Expression::literal(4.9))).unwrap();
        assert!(beyond.test(&r).unwrap());
        let missing = Spatial::new(SpatialType::DWithin, Expression::property("geom"), origin, Some(Expression::property("d"))).unwrap();
        assert!(!missing.test(&r).unwrap());
    }

    #[test]
    fn test_missing_and_invalid_operands() {
        let r = record();
        let geom = Expression::literal(point!(x: 0.0, y: 0.0));
        assert!(!spatial(SpatialType::Contains, Expression::property("y"), geom.clone()).test(&r).unwrap());
        let bad = spatial(SpatialType::Intersects, Expression::property("name"), geom);
        assert!(matches!(bad.test(&r), Err(FilterError::Evaluation(_))));
    }

    #[test]
    fn test_display() {
        let env = Rect::new(coord! { x: 30.0, y: -125.0 }, coord! { x: 40.0, y: -110.0 });
        let s = Filter::Spatial(spatial(SpatialType::BBox, Expression::property("pp"), Expression::literal(env)));
        assert_eq!(s.to_string(), "BBOX(pp, 30.0, -125.0, 40.0, -110.0)");
        let s = spatial(SpatialType::Intersects, Expression::property("geom"), Expression::literal(point!(x: 0.0, y: 0.0)));
        assert_eq!(s.to_string(), "INTERSECTS(geom, POINT(0 0))");
        let d = Spatial::new(SpatialType::DWithin, Expression::property("geom"), Expression::literal(point!(x: 0.0, y: 0.0)), Some(Expression::literal(10))).unwrap();
        assert_eq!(d.to_string(), "DWITHIN(geom, POINT(0 0), 10, meters)");
    }
}
