//! Query execution
//!
//! This module handles:
//! * Leading-verb routing and PREPARE/EXECUTE name parsing
//! * Parameter values and their wire/literal encodings
//! * Response-stream state machines (select, command count, plain
//!   command, EXPLAIN)
//! * The Simple and Extended query facades

pub(crate) mod dispatch;
mod extended;
mod param;
mod result;
mod simple;
pub(crate) mod verb;

pub use extended::ExtendedQuery;
pub use param::Param;
pub use result::{ExplainRow, QueryResult};
pub use simple::SimpleQuery;
pub use verb::Verb;
