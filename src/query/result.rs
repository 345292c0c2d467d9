//! Query results

/// Outcome of one statement execution
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<T> {
    /// Records produced by a SELECT
    Rows(Vec<T>),
    /// Affected-row count from INSERT/UPDATE/DELETE/MERGE
    Command(u64),
    /// Plain command outcome; true when CommandComplete was seen
    Done(bool),
    /// Plan rows produced by EXPLAIN
    Explain(Vec<ExplainRow>),
}

impl<T> QueryResult<T> {
    /// The produced rows, if this was a SELECT
    pub fn rows(self) -> Option<Vec<T>> {
        match self {
            QueryResult::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// The affected-row count, if this was a counted command
    pub fn affected(&self) -> Option<u64> {
        match self {
            QueryResult::Command(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether a plain command completed
    pub fn is_done(&self) -> bool {
        matches!(self, QueryResult::Done(true))
    }
}

/// One row of EXPLAIN output.
///
/// All text fields are owned by the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainRow {
    /// Plan node operation (e.g. "Seq Scan")
    pub operation: String,
    /// Target relation or index
    pub target: String,
    /// Cost estimate text
    pub cost: String,
    /// Row estimate text
    pub rows: String,
    /// Extra detail column, when the server sends one
    pub details: Option<String>,
}
