//! Solr filter-query encoding.
//!
//! A filter becomes a list of `fq` strings that Solr intersects, so only conjunctions
//! can be expressed: each conjunct is one filter query.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::expr::Expression;
use crate::filter::{Comparison, ComparisonType, Filter, Id, Logic, LogicType};
use crate::lucene::escape_term;
use crate::spatial::{Spatial, SpatialType};
use crate::splitter::Qualifier;
use crate::types::Value;
use crate::FilterError;

/// How a Solr field type indexes geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolrSpatialType {
    Rpt,
    Point,
    BBox,
    Other,
}

const SOLR_SPATIAL_CLASSES: &[(&str, SolrSpatialType)] = &[
    ("spatialrecursiveprefixtreefieldtype", SolrSpatialType::Rpt),
    ("geohashfield", SolrSpatialType::Rpt),
    ("latlontype", SolrSpatialType::Point),
    ("pointtype", SolrSpatialType::Point),
    ("bboxfield", SolrSpatialType::BBox),
];

impl SolrSpatialType {
    /// Maps a Solr field type class name (`solr.BBoxField` or fully qualified) to its
    /// spatial type.
    pub fn from_solr_class(class_name: &str) -> SolrSpatialType {
        let simple = class_name.rsplit('.').next().unwrap_or(class_name).to_ascii_lowercase();
        SOLR_SPATIAL_CLASSES
            .iter()
            .find(|(name, _)| *name == simple)
            .map_or(SolrSpatialType::Other, |(_, t)| *t)
    }
}

fn default_key() -> String {
    "id".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolrConfig {
    /// Unique key field that id filters match against.
    #[serde(default = "default_key")]
    pub key: String,
    #[serde(default)]
    pub spatial_fields: HashMap<String, SolrSpatialType>,
}

impl Default for SolrConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            spatial_fields: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SolrQueryEncoder {
    config: SolrConfig,
}

fn unsupported(what: impl std::fmt::Display, reason: &str) -> FilterError {
    FilterError::Unsupported(format!("unable to encode {what} as a solr filter query, {reason}"))
}

/// An escaped query term; the empty string is quoted so the clause stays well formed.
fn term(value: &Value) -> String {
    match escape_term(&value.to_string()) {
        t if t.is_empty() => "\"\"".to_string(),
        t => t,
    }
}

impl SolrQueryEncoder {
    pub fn new(config: SolrConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolrConfig {
        &self.config
    }

    /// Encodes `filter` as filter queries. `All` yields none.
    pub fn encode(&self, filter: &Filter) -> Result<Vec<String>, FilterError> {
        let mut fqs = Vec::new();
        self.filter(filter, &mut fqs)?;
        trace!(filter = %filter, fq = ?fqs, "encoded solr filter queries");
        Ok(fqs)
    }

    pub fn supports(&self, filter: &Filter) -> bool {
        self.filter(filter, &mut Vec::new()).is_ok()
    }

    fn filter(&self, filter: &Filter, fqs: &mut Vec<String>) -> Result<(), FilterError> {
        match filter {
            Filter::All => Ok(()),
            Filter::Comparison(c) => {
                fqs.push(self.comparison(c)?);
                Ok(())
            }
            Filter::Logic(l) => self.logic(l, fqs),
            Filter::Spatial(s) => {
                fqs.push(self.spatial(s)?);
                Ok(())
            }
            Filter::Id(id) => {
                fqs.push(self.id(id)?);
                Ok(())
            }
            other => Err(unsupported(other, "filter type has no solr form")),
        }
    }

    fn logic(&self, logic: &Logic, fqs: &mut Vec<String>) -> Result<(), FilterError> {
        if logic.kind() != LogicType::And {
            return Err(unsupported(logic, "only AND is supported"));
        }
        for part in logic.parts() {
            self.filter(part, fqs)?;
        }
        Ok(())
    }

    fn id(&self, id: &Id) -> Result<String, FilterError> {
        let values = id
            .ids()
            .iter()
            .map(|e| {
                e.evaluate(&())
                    .map(|v| term(&v))
                    .ok_or_else(|| unsupported(id, "ids must be literals"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(format!("{}:({})", self.config.key, values.join(" OR ")))
    }

    fn comparison(&self, c: &Comparison) -> Result<String, FilterError> {
        let c = c.normalize()?;
        let field = c
            .property()
            .map(|p| p.name())
            .ok_or_else(|| unsupported(&c, "left operand is not a property"))?;
        let Expression::Literal(value) = c.right() else {
            return Err(unsupported(&c, "right operand is not a literal"));
        };
        let v = term(value);
        Ok(match c.kind() {
            ComparisonType::Equal => format!("{field}:{v}"),
            ComparisonType::NotEqual => format!("(*:* AND -{field}:{v})"),
            ComparisonType::Less => format!("{field}:[* TO {v}}}"),
            ComparisonType::LessOrEqual => format!("{field}:[* TO {v}]"),
            ComparisonType::Greater => format!("{field}:{{{v} TO *]"),
            ComparisonType::GreaterOrEqual => format!("{field}:[{v} TO *]"),
        })
    }

    fn spatial(&self, s: &Spatial) -> Result<String, FilterError> {
        let s = s.normalize()?;
        let field = s
            .property()
            .map(|p| p.name())
            .ok_or_else(|| unsupported(&s, "left operand is not a property"))?;
        if self.config.spatial_fields.get(field) == Some(&SolrSpatialType::Other) {
            return Err(unsupported(&s, "field is not indexed spatially"));
        }
        let literal = match s.right().as_literal() {
            Some(v @ (Value::Geometry(_) | Value::Envelope(_))) => v,
            _ => return Err(unsupported(&s, "right operand is not a geometry literal")),
        };
        let op = match s.kind() {
            SpatialType::BBox => "BBoxIntersects",
            SpatialType::Equals => "Equals",
            SpatialType::Intersects => "Intersects",
            SpatialType::Disjoint => "Disjoint",
            SpatialType::Within => "Within",
            SpatialType::Contains => "Contains",
            other => return Err(unsupported(&s, &format!("{other} is not supported"))),
        };
        Ok(format!("{field}:\"{op}({literal})\""))
    }
}

impl Qualifier for SolrQueryEncoder {
    fn qualifies(&self, filter: &Filter) -> bool {
        self.supports(filter)
    }

    fn qualifies_logic(&self, kind: LogicType) -> bool {
        kind == LogicType::And
    }
}
