//! jeo-filter: the filter and query core of the jeo geospatial data-access toolkit.
//!
//! This crate provides a way to build filters (programmatically or from CQL/ECQL text),
//! evaluate them against records, split them into backend-supported and residual parts,
//! and lower the supported part into backend-native queries.
//!
//! # Architecture
//! - Values and coercion rules (`types`, `convert`)
//! - Record access contract and a concrete `Feature` (`context`, `schema`)
//! - Expression and filter trees (`expr`, `filter`, `spatial`, `functions`)
//! - CQL/ECQL parsing through an operand-stack builder (`lexer`, `cql`, `builder`)
//! - Normalization and splitting (`splitter`)
//! - Backend encoders: SQL, Lucene-style queries, Solr filter queries (`sql`, `lucene`, `solr`)
//! - Pushdown planning and residual filtering over record cursors (`pushdown`)
//!
//! ```
//! use jeo_filter::{cql, Feature};
//!
//! let filter = cql::parse("name LIKE 'ab%' AND pop > 1000").unwrap();
//! let feature = Feature::new()
//!     .with("name", "abcdef")
//!     .with("pop", 25_000);
//! assert!(filter.test(&feature).unwrap());
//! ```

mod builder;
mod context;
pub mod convert;
pub mod cql;
mod expr;
mod filter;
mod functions;
mod lexer;
pub mod lucene;
mod pushdown;
mod schema;
pub mod solr;
mod spatial;
mod splitter;
pub mod sql;
mod types;

pub use builder::*;
pub use context::*;
pub use cql::{Dialect, ParseError};
pub use expr::*;
pub use filter::*;
pub use functions::*;
pub use pushdown::*;
pub use schema::*;
pub use spatial::*;
pub use splitter::*;
pub use types::*;

use thiserror::Error;

/// Unified error type for jeo-filter operations.
///
/// Missing properties are never reported through this type: evaluating against a record
/// that lacks a field yields "no value" and filters treat that as `false`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid filter: {0}")]
    Construction(String),
    #[error("filter is not normalizable: {0}")]
    NotNormalizable(String),
    #[error("evaluation error: {0}")]
    Evaluation(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("schema error: {0}")]
    Schema(String),
}
