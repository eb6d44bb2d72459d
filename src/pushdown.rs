//! Pushdown planning: split a filter with a backend encoder, encode what the backend
//! supports and keep the rest for in-memory evaluation over the backend's cursor.

use tracing::debug;

use crate::context::Record;
use crate::filter::Filter;
use crate::lucene::{LuceneQueryEncoder, Query};
use crate::solr::SolrQueryEncoder;
use crate::splitter::{FilterSplitter, Qualifier};
use crate::sql::{SqlEncoder, SqlQuery};
use crate::FilterError;

/// A backend encoder usable for pushdown.
pub trait Pushdown: Qualifier {
    type Output;

    fn encode(&self, filter: &Filter) -> Result<Self::Output, FilterError>;
}

impl Pushdown for SqlEncoder {
    type Output = SqlQuery;

    fn encode(&self, filter: &Filter) -> Result<SqlQuery, FilterError> {
        SqlEncoder::encode(self, filter)
    }
}

impl Pushdown for LuceneQueryEncoder {
    type Output = Query;

    fn encode(&self, filter: &Filter) -> Result<Query, FilterError> {
        LuceneQueryEncoder::encode(self, filter)
    }
}

impl Pushdown for SolrQueryEncoder {
    type Output = Vec<String>;

    fn encode(&self, filter: &Filter) -> Result<Vec<String>, FilterError> {
        SolrQueryEncoder::encode(self, filter)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plan<T> {
    /// The backend query, or `None` when nothing could be pushed down.
    pub native: Option<T>,
    /// What the caller still has to evaluate; `All` when the backend does everything.
    pub residual: Filter,
}

impl<T> Plan<T> {
    pub fn needs_residual(&self) -> bool {
        !self.residual.is_all()
    }

    /// Applies the residual filter to the records the native query returned.
    pub fn filter_records<I>(&self, records: I) -> FilteredCursor<'_, I>
    where
        I: Iterator,
        I::Item: Record,
    {
        FilteredCursor::new(records, &self.residual)
    }
}

pub fn push_down<P: Pushdown>(encoder: &P, filter: &Filter) -> Result<Plan<P::Output>, FilterError> {
    let split = FilterSplitter::new(encoder).split(filter);
    let native = if split.supported.is_all() {
        None
    } else {
        Some(encoder.encode(&split.supported)?)
    };
    debug!(
        filter = %filter,
        pushed = %split.supported,
        residual = %split.residual,
        "planned filter pushdown"
    );
    Ok(Plan {
        native,
        residual: split.residual,
    })
}

/// Yields the records of an underlying cursor that pass a filter. Evaluation errors are
/// yielded in place of the record.
pub struct FilteredCursor<'f, I> {
    inner: I,
    filter: &'f Filter,
}

impl<'f, I> FilteredCursor<'f, I> {
    pub fn new(inner: I, filter: &'f Filter) -> Self {
        Self { inner, filter }
    }
}

impl<'f, I> Iterator for FilteredCursor<'f, I>
where
    I: Iterator,
    I::Item: Record,
{
    type Item = Result<I::Item, FilterError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.filter.is_all() {
            return self.inner.next().map(Ok);
        }
        loop {
            let record = self.inner.next()?;
            match self.filter.test(&record) {
                Ok(true) => return Some(Ok(record)),
                Ok(false) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Feature;
    use crate::cql;
    use crate::sql::SqlEncoderConfig;
    use crate::types::Value;

    fn features() -> Vec<Feature> {
        (0..10)
            .map(|i| {
                Feature::with_id(format!("f.{i}"))
                    .with("n", i)
                    .with("name", if i % 2 == 0 { "even" } else { "odd" })
            })
            .collect()
    }

    #[test]
    fn test_push_down_sql() {
        let enc = SqlEncoder::new(SqlEncoderConfig::default());
        let filter = cql::parse("n > 3 AND name = 'even'").unwrap();
        let plan = push_down(&enc, &filter).unwrap();
        let native = plan.native.as_ref().unwrap();
        assert_eq!(native.sql, "(\"n\" > ?) AND (\"name\" = ?)");
        assert!(!plan.needs_residual());
    }

    #[test]
    fn test_push_down_solr_leaves_residual() {
        let enc = SolrQueryEncoder::default();
        let filter = cql::parse("n >= 2 AND (name = 'odd' OR n = 0)").unwrap();
        let plan = push_down(&enc, &filter).unwrap();
        assert_eq!(plan.native.as_deref(), Some(&["n:[2 TO *]".to_string()][..]));
        assert_eq!(plan.residual, cql::parse("name = 'odd' OR n = 0").unwrap());

        let kept: Vec<Feature> = plan
            .filter_records(features().into_iter().filter(|f| matches!(f.value("n"), Some(Value::Int(n)) if *n >= 2)))
            .collect::<Result<_, _>>()
            .unwrap();
        let ids: Vec<&str> = kept.iter().filter_map(|f| f.id()).collect();
        assert_eq!(ids, ["f.3", "f.5", "f.7", "f.9"]);
    }

    #[test]
    fn test_nothing_pushed() {
        let enc = SolrQueryEncoder::default();
        let filter = cql::parse("name IS NULL").unwrap();
        let plan = push_down(&enc, &filter).unwrap();
        assert!(plan.native.is_none());
        assert_eq!(plan.residual, filter);
    }

    #[test]
    fn test_filtered_cursor_yields_errors() {
        let filter = cql::parse("name < 5").unwrap();
        let results: Vec<_> = FilteredCursor::new(features().into_iter(), &filter).collect();
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| matches!(r, Err(FilterError::Evaluation(_)))));

        let all = Filter::All;
        assert_eq!(FilteredCursor::new(features().into_iter(), &all).count(), 10);
    }
}
