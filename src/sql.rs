//! SQL encoder: lowers a filter into a WHERE clause for SQL backends.
//!
//! Names are double quoted. With `prepared` set (the default) literals become `?`
//! placeholders and their values, tagged with a [`SqlType`], are collected in
//! [`SqlQuery::args`] in placeholder order. Otherwise literals are written inline.
//! Geometries go through `ST_GeomFromText`; spatial predicates use the simple-features
//! `ST_*` functions.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::trace;
use wkt::ToWkt;

use crate::expr::{Expression, Property};
use crate::filter::{Comparison, Filter, Id, In, Like, Logic, LogicType, Null};
use crate::schema::Schema;
use crate::spatial::{Spatial, SpatialType};
use crate::splitter::Qualifier;
use crate::types::{format_date, format_float, FieldType, Value};
use crate::FilterError;

/// JDBC-style SQL type tag attached to prepared statement arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    Null,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Varchar,
    Timestamp,
    Other,
}

impl SqlType {
    pub fn for_field(ty: FieldType) -> SqlType {
        match ty {
            FieldType::Bool => SqlType::Boolean,
            FieldType::Byte => SqlType::TinyInt,
            FieldType::Short => SqlType::SmallInt,
            FieldType::Int => SqlType::Integer,
            FieldType::Long => SqlType::BigInt,
            FieldType::Float => SqlType::Real,
            FieldType::Double => SqlType::Double,
            FieldType::String => SqlType::Varchar,
            FieldType::Date => SqlType::Timestamp,
            FieldType::Geometry | FieldType::Envelope | FieldType::Map => SqlType::Other,
        }
    }

    pub fn for_value(value: &Value) -> SqlType {
        value.field_type().map_or(SqlType::Null, SqlType::for_field)
    }

    pub fn name(self) -> &'static str {
        match self {
            SqlType::Null => "NULL",
            SqlType::Boolean => "BOOLEAN",
            SqlType::TinyInt => "TINYINT",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Integer => "INTEGER",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE",
            SqlType::Varchar => "VARCHAR",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlArg {
    pub value: Value,
    pub sql_type: SqlType,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SqlQuery {
    pub sql: String,
    pub args: Vec<SqlArg>,
}

fn default_prepared() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlEncoderConfig {
    #[serde(default = "default_prepared")]
    pub prepared: bool,
    /// Single-column primary key used for id filters.
    #[serde(default)]
    pub primary_key: Option<String>,
    /// SRID passed to `ST_GeomFromText` for geometry literals.
    #[serde(default)]
    pub srid: i32,
}

impl Default for SqlEncoderConfig {
    fn default() -> Self {
        Self {
            prepared: true,
            primary_key: None,
            srid: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SqlEncoder {
    config: SqlEncoderConfig,
    schema: Option<Schema>,
}

impl SqlEncoder {
    pub fn new(config: SqlEncoderConfig) -> Self {
        Self { config, schema: None }
    }

    /// Uses the schema's field types to type placeholder arguments.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn config(&self) -> &SqlEncoderConfig {
        &self.config
    }

    pub fn encode(&self, filter: &Filter) -> Result<SqlQuery, FilterError> {
        let mut w = SqlWriter {
            encoder: self,
            query: SqlQuery::default(),
        };
        w.filter(filter)?;
        trace!(filter = %filter, sql = %w.query.sql, args = w.query.args.len(), "encoded sql");
        Ok(w.query)
    }

    /// Whether `filter` can be encoded.
    pub fn supports(&self, filter: &Filter) -> bool {
        let mut w = SqlWriter {
            encoder: self,
            query: SqlQuery::default(),
        };
        w.filter(filter).is_ok()
    }

    fn field_type(&self, left: &Expression, right: &Expression) -> Option<FieldType> {
        let schema = self.schema.as_ref()?;
        let prop = left.as_property().or_else(|| right.as_property())?;
        schema.field_type(prop.name())
    }
}

impl Qualifier for SqlEncoder {
    fn qualifies(&self, filter: &Filter) -> bool {
        self.supports(filter)
    }
}

struct SqlWriter<'e> {
    encoder: &'e SqlEncoder,
    query: SqlQuery,
}

fn unsupported(what: impl std::fmt::Display, reason: &str) -> FilterError {
    FilterError::Unsupported(format!("unable to encode {what} as sql, {reason}"))
}

impl<'e> SqlWriter<'e> {
    fn push(&mut self, s: &str) {
        self.query.sql.push_str(s);
    }

    fn name(&mut self, name: &str) {
        let _ = write!(self.query.sql, "\"{}\"", name.replace('"', "\"\""));
    }

    fn str(&mut self, s: &str) {
        let _ = write!(self.query.sql, "'{}'", s.replace('\'', "''"));
    }

    /// Inline float; NaN and infinities have no SQL literal.
    fn float(&mut self, d: f64) -> Result<(), FilterError> {
        if !d.is_finite() {
            return Err(unsupported(format_float(d), "non-finite numbers must be bound as arguments"));
        }
        self.push(&format_float(d));
        Ok(())
    }

    fn arg(&mut self, value: Value, sql_type: SqlType) {
        self.push("?");
        self.query.args.push(SqlArg { value, sql_type });
    }

    fn filter(&mut self, filter: &Filter) -> Result<(), FilterError> {
        match filter {
            Filter::All => self.push("1 = 1"),
            Filter::None => self.push("1 = 0"),
            Filter::Comparison(c) => self.comparison(c)?,
            Filter::Logic(l) => self.logic(l)?,
            Filter::Spatial(s) => self.spatial(s)?,
            Filter::Id(id) => self.id(id)?,
            Filter::In(i) => self.in_list(i)?,
            Filter::Like(l) => self.like(l),
            Filter::Null(n) => self.null(n),
            Filter::TypeOf(t) => return Err(unsupported(t, "type checks have no sql form")),
        }
        Ok(())
    }

    fn logic(&mut self, logic: &Logic) -> Result<(), FilterError> {
        if logic.kind() == LogicType::Not {
            self.push("NOT (");
            self.filter(&logic.parts()[0])?;
            self.push(")");
            return Ok(());
        }
        for (i, part) in logic.parts().iter().enumerate() {
            if i > 0 {
                let _ = write!(self.query.sql, " {} ", logic.kind().name());
            }
            self.push("(");
            self.filter(part)?;
            self.push(")");
        }
        Ok(())
    }

    fn comparison(&mut self, c: &Comparison) -> Result<(), FilterError> {
        let ty = self.encoder.field_type(c.left(), c.right());
        self.expr(c.left(), ty)?;
        let op = match c.kind().symbol() {
            "<>" => "!=",
            op => op,
        };
        let _ = write!(self.query.sql, " {op} ");
        self.expr(c.right(), ty)
    }

    fn spatial(&mut self, s: &Spatial) -> Result<(), FilterError> {
        let ty = self.encoder.field_type(s.left(), s.right());
        let function = match s.kind() {
            SpatialType::Equals => "ST_Equals",
            SpatialType::Intersects => "ST_Intersects",
            SpatialType::Touches => "ST_Touches",
            SpatialType::Disjoint => "ST_Disjoint",
            SpatialType::Overlaps => "ST_Overlaps",
            SpatialType::Crosses => "ST_Crosses",
            SpatialType::Covers => "ST_Covers",
            SpatialType::Within => "ST_Within",
            SpatialType::Contains => "ST_Contains",
            SpatialType::BBox => {
                self.expr(s.left(), ty)?;
                self.push(" && ");
                return self.expr(s.right(), ty);
            }
            SpatialType::DWithin | SpatialType::Beyond => {
                let distance = s
                    .distance()
                    .ok_or_else(|| unsupported(s, "missing distance"))?;
                if s.kind() == SpatialType::Beyond {
                    self.push("NOT ");
                }
                self.push("ST_DWithin(");
                self.expr(s.left(), ty)?;
                self.push(", ");
                self.expr(s.right(), ty)?;
                self.push(", ");
                self.expr(distance, None)?;
                self.push(")");
                return Ok(());
            }
        };
        self.push(function);
        self.push("(");
        self.expr(s.left(), ty)?;
        self.push(", ");
        self.expr(s.right(), ty)?;
        self.push(")");
        Ok(())
    }

    fn id(&mut self, id: &Id) -> Result<(), FilterError> {
        let Some(pk) = self.encoder.config.primary_key.as_deref() else {
            return Err(unsupported(id, "id filter requires a primary key"));
        };
        let ty = self
            .encoder
            .schema
            .as_ref()
            .and_then(|s| s.field_type(pk));
        self.name(pk);
        self.push(" IN (");
        for (i, e) in id.ids().iter().enumerate() {
            if i > 0 {
                self.push(",");
            }
            self.expr(e, ty)?;
        }
        self.push(")");
        Ok(())
    }

    fn in_list(&mut self, i: &In) -> Result<(), FilterError> {
        let ty = self.property_type(i.property());
        self.name(i.property().name());
        self.push(if i.is_negated() { " NOT IN (" } else { " IN (" });
        for (n, v) in i.values().iter().enumerate() {
            if n > 0 {
                self.push(",");
            }
            self.expr(v, ty)?;
        }
        self.push(")");
        Ok(())
    }

    fn like(&mut self, l: &Like) {
        self.name(l.property().name());
        self.push(if l.is_negated() { " NOT LIKE " } else { " LIKE " });
        self.str(&l.pattern_text());
    }

    fn null(&mut self, n: &Null) {
        self.name(n.property().name());
        self.push(if n.is_negated() { " IS NOT NULL" } else { " IS NULL" });
    }

    fn property_type(&self, p: &Property) -> Option<FieldType> {
        self.encoder.schema.as_ref()?.field_type(p.name())
    }

    fn expr(&mut self, e: &Expression, ty: Option<FieldType>) -> Result<(), FilterError> {
        match e {
            Expression::Literal(v) => self.literal(v, ty),
            Expression::Property(p) => {
                self.name(p.name());
                Ok(())
            }
            Expression::Math(m) => {
                self.push("(");
                self.expr(m.left(), ty)?;
                self.query.sql.push(m.op().symbol());
                self.expr(m.right(), ty)?;
                self.push(")");
                Ok(())
            }
            Expression::Function(f) => {
                self.push(f.name());
                self.push("(");
                for (i, arg) in f.args().iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(arg, None)?;
                }
                self.push(")");
                Ok(())
            }
            Expression::SelfRef => Err(unsupported(e, "self references have no sql form")),
        }
    }

    fn literal(&mut self, v: &Value, ty: Option<FieldType>) -> Result<(), FilterError> {
        let srid = self.encoder.config.srid;
        let prepared = self.encoder.config.prepared;
        match v {
            Value::Geometry(g) => {
                if prepared {
                    self.push("ST_GeomFromText(?,?)");
                    self.query.args.push(SqlArg {
                        value: Value::String(g.wkt_string()),
                        sql_type: SqlType::Varchar,
                    });
                    self.query.args.push(SqlArg {
                        value: Value::Int(srid),
                        sql_type: SqlType::Integer,
                    });
                } else {
                    self.push("ST_GeomFromText(");
                    self.str(&g.wkt_string());
                    let _ = write!(self.query.sql, ",{srid})");
                }
            }
            Value::Envelope(r) => {
                self.push("ST_MakeEnvelope(");
                let coords = [r.min().x, r.min().y, r.max().x, r.max().y];
                for c in coords {
                    if prepared {
                        self.arg(Value::Double(c), SqlType::Double);
                    } else {
                        self.float(c)?;
                    }
                    self.push(",");
                }
                if prepared {
                    self.arg(Value::Int(srid), SqlType::Integer);
                } else {
                    let _ = write!(self.query.sql, "{srid}");
                }
                self.push(")");
            }
            Value::Map(_) => return Err(unsupported(v, "map literals have no sql form")),
            _ if prepared => {
                let sql_type = match (v, ty) {
                    (Value::Null, _) => SqlType::Null,
                    (_, Some(ty)) => SqlType::for_field(ty),
                    (_, None) => SqlType::for_value(v),
                };
                self.arg(v.clone(), sql_type);
            }
            Value::Null => self.push("NULL"),
            Value::Bool(b) => self.push(if *b { "TRUE" } else { "FALSE" }),
            Value::String(s) => self.str(s),
            Value::Date(d) => self.str(&format_date(d)),
            Value::Float(n) => self.float(f64::from(*n))?,
            Value::Double(n) => self.float(*n)?,
            n => {
                let _ = write!(self.query.sql, "{n}");
            }
        }
        Ok(())
    }
}
