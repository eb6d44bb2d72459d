//! Splits a filter into the part a backend can evaluate natively and the residual the
//! caller still has to test in memory.

use tracing::trace;

use crate::filter::{Filter, LogicType};

/// Decides whether a backend can evaluate a single filter node.
///
/// `qualifies` is asked about leaves; `qualifies_logic` about AND/OR/NOT nodes whose parts
/// all qualify.
pub trait Qualifier {
    fn qualifies(&self, filter: &Filter) -> bool;

    fn qualifies_logic(&self, _kind: LogicType) -> bool {
        true
    }
}

impl<F> Qualifier for F
where
    F: Fn(&Filter) -> bool,
{
    fn qualifies(&self, filter: &Filter) -> bool {
        self(filter)
    }
}

/// Result of a split: `supported AND residual` is equivalent to the input filter.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub supported: Filter,
    pub residual: Filter,
}

impl Split {
    fn supported(filter: Filter) -> Self {
        Self {
            supported: filter,
            residual: Filter::All,
        }
    }

    fn residual(filter: Filter) -> Self {
        Self {
            supported: Filter::All,
            residual: filter,
        }
    }

    /// Whether nothing is left for the caller to evaluate.
    pub fn is_fully_supported(&self) -> bool {
        self.residual.is_all()
    }
}

pub struct FilterSplitter<'q> {
    qualifier: &'q dyn Qualifier,
}

impl<'q> FilterSplitter<'q> {
    pub fn new(qualifier: &'q dyn Qualifier) -> Self {
        Self { qualifier }
    }

    /// AND distributes over its parts; OR and NOT are pushed down only when every part is.
    pub fn split(&self, filter: &Filter) -> Split {
        let split = match filter {
            Filter::Logic(logic) => match logic.kind() {
                LogicType::And => self.split_and(filter, logic.parts()),
                kind => {
                    let whole = self.qualifier.qualifies_logic(kind)
                        && logic.parts().iter().all(|p| self.split(p).is_fully_supported());
                    if whole {
                        Split::supported(filter.clone())
                    } else {
                        Split::residual(filter.clone())
                    }
                }
            },
            leaf if self.qualifier.qualifies(leaf) => Split::supported(leaf.clone()),
            leaf => Split::residual(leaf.clone()),
        };
        trace!(
            filter = %filter,
            supported = %split.supported,
            residual = %split.residual,
            "split filter node"
        );
        split
    }

    fn split_and(&self, filter: &Filter, parts: &[Filter]) -> Split {
        let splits: Vec<Split> = parts.iter().map(|p| self.split(p)).collect();
        if self.qualifier.qualifies_logic(LogicType::And) && splits.iter().all(Split::is_fully_supported) {
            return Split::supported(filter.clone());
        }
        let (supported, residual): (Vec<_>, Vec<_>) =
            splits.into_iter().map(|s| (s.supported, s.residual)).unzip();
        if !self.qualifier.qualifies_logic(LogicType::And) {
            // The backend takes at most one conjunct.
            let mut supported = supported.into_iter().filter(|f| !f.is_all());
            let first = supported.next().unwrap_or(Filter::All);
            let rest: Vec<Filter> = supported.chain(residual).collect();
            return Split {
                supported: first,
                residual: Filter::all_of(rest),
            };
        }
        Split {
            supported: Filter::all_of(supported),
            residual: Filter::all_of(residual),
        }
    }
}

/// Splits `filter` with `qualifier`.
pub fn split(filter: &Filter, qualifier: &dyn Qualifier) -> Split {
    FilterSplitter::new(qualifier).split(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql;
    use crate::types::Value;

    fn is_comparison(f: &Filter) -> bool {
        matches!(f, Filter::Comparison(_))
    }

    fn split_with(text: &str, q: impl Fn(&Filter) -> bool) -> Split {
        let filter = cql::parse(text).unwrap();
        FilterSplitter::new(&q).split(&filter)
    }

    #[test]
    fn test_leaf() {
        let s = split_with("x = 1", is_comparison);
        assert_eq!(s.supported, cql::parse("x = 1").unwrap());
        assert_eq!(s.residual, Filter::All);
        let s = split_with("x IS NULL", is_comparison);
        assert_eq!(s.supported, Filter::All);
        assert_eq!(s.residual, cql::parse("x IS NULL").unwrap());
    }

    #[test]
    fn test_and_distributes() {
        let s = split_with("a = 1 AND b IS NULL AND c = 2", is_comparison);
        assert_eq!(s.supported, cql::parse("a = 1 AND c = 2").unwrap());
        assert_eq!(s.residual, cql::parse("b IS NULL").unwrap());
    }

    #[test]
    fn test_or_is_all_or_nothing() {
        let text = "a = 1 OR b IS NULL";
        let s = split_with(text, is_comparison);
        assert_eq!(s.supported, Filter::All);
        assert_eq!(s.residual, cql::parse(text).unwrap());
        let s = split_with("a = 1 OR b = 2", is_comparison);
        assert!(s.is_fully_supported());
    }

    #[test]
    fn test_not() {
        let s = split_with("NOT (a = 1 AND b IS NULL)", is_comparison);
        assert_eq!(s.supported, Filter::All);
        let s = split_with("NOT (a = 1)", is_comparison);
        assert!(s.is_fully_supported());
    }

    #[test]
    fn test_nested_and_inside_and() {
        let s = split_with("(a = 1 AND b IS NULL) AND (c = 1 OR d IS NULL)", is_comparison);
        assert_eq!(s.supported, cql::parse("a = 1").unwrap());
        assert_eq!(s.residual, cql::parse("b IS NULL AND (c = 1 OR d IS NULL)").unwrap());
    }

    struct NoLogic;

    impl Qualifier for NoLogic {
        fn qualifies(&self, f: &Filter) -> bool {
            matches!(f, Filter::Comparison(_))
        }

        fn qualifies_logic(&self, _kind: LogicType) -> bool {
            false
        }
    }

    #[test]
    fn test_logic_not_qualified() {
        let filter = cql::parse("a = 1 AND b = 2 OR c = 3").unwrap();
        let s = FilterSplitter::new(&NoLogic).split(&filter);
        assert_eq!(s.residual, filter);

        let filter = cql::parse("a = 1 AND b = 2").unwrap();
        let s = split(&filter, &NoLogic);
        assert_eq!(s.supported, cql::parse("a = 1").unwrap());
        assert_eq!(s.residual, cql::parse("b = 2").unwrap());
    }

    #[test]
    fn test_value_based_qualifier() {
        let only_true = |f: &Filter| match f {
            Filter::Comparison(c) => c.right().as_literal() == Some(&Value::Bool(true)),
            _ => false,
        };
        let s = split_with("foo = TRUE AND x = FALSE", only_true);
        assert_eq!(s.supported, cql::parse("foo = TRUE").unwrap());
        assert_eq!(s.residual, cql::parse("x = FALSE").unwrap());
    }
}
