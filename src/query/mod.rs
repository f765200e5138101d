//! Query Module - composition of catalog templates into parameterized SQL
//!
//! - QueryFragment: clause-level AST of a template
//! - composer: `{db}` substitution, date filters, tail/alias/base-table detection
//! - params: positional parameters, date ranges, composed statements

pub mod composer;
pub mod fragment;
pub mod params;

pub use composer::{
    append_date_filter, column_ref, detect_table_alias, extract_query_tail, infer_base_table,
    substitute_database, FragmentSpec, QueryTail, DB_PLACEHOLDER,
};
pub use fragment::{Predicate, QueryFragment};
pub use params::{ComposedQuery, DateRange, SqlParam, PARAM_MARKER};
