//! Extended (Parse/Bind/Describe/Execute/Sync) query facade

use super::dispatch::{read_command_count, read_explain, read_prepare_only, read_select, read_simple_command};
use super::param::Param;
use super::result::QueryResult;
use super::verb::{leading_keyword, route_for_verb, Route, Verb};
use crate::connection::Connection;
use crate::protocol::FrontendMessage;
use crate::row::FromRow;
use crate::{Error, Result};

/// Facade for the Extended Query protocol: statements are prepared once
/// under a name and executed with out-of-band parameters.
pub struct ExtendedQuery<'a> {
    conn: &'a mut Connection,
}

impl<'a> ExtendedQuery<'a> {
    pub(crate) fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Prepare `sql` under `name`.
    ///
    /// Idempotent: when the registry already holds `name` with the same
    /// inner verb this is a no-op returning `false`. Re-preparing under
    /// the same name with a different verb replaces the registry entry.
    /// Returns `true` when a Parse round-trip actually happened.
    pub fn prepare(&mut self, name: &str, sql: &str) -> Result<bool> {
        let sql = sql.trim();
        let verb = Verb::from_keyword(&leading_keyword(sql));

        if self.conn.statement_verb(name) == Some(verb) {
            tracing::debug!(statement = name, "already prepared, skipping");
            return Ok(false);
        }

        self.conn.send_coalesced(&[
            FrontendMessage::Parse {
                name: name.to_string(),
                sql: sql.to_string(),
            },
            FrontendMessage::Sync,
        ])?;
        read_prepare_only(self.conn)?;

        self.conn.record_statement(name, verb);
        Ok(true)
    }

    /// Execute the statement prepared under `name` with the given
    /// parameters.
    ///
    /// Emits Bind, Describe('S'), Execute (unnamed portal, no row limit)
    /// and Sync in a single write, then processes the response with the
    /// state machine matching the registered verb.
    pub fn execute<T: FromRow>(&mut self, name: &str, params: &[Param]) -> Result<QueryResult<T>> {
        let verb = self
            .conn
            .statement_verb(name)
            .ok_or_else(|| Error::UnknownPreparedStatement(name.to_string()))?;

        let start = std::time::Instant::now();
        crate::metrics::counters::queries_executed("extended");

        self.conn.send_coalesced(&[
            FrontendMessage::Bind {
                portal: String::new(),
                statement: name.to_string(),
                params: params.to_vec(),
            },
            FrontendMessage::Describe {
                kind: b'S',
                name: name.to_string(),
            },
            FrontendMessage::Execute {
                portal: String::new(),
                max_rows: 0,
            },
            FrontendMessage::Sync,
        ])?;

        let outcome = match route_for_verb(verb) {
            Route::Select => Ok(QueryResult::Rows(read_select(self.conn)?)),
            Route::Explain => Ok(QueryResult::Explain(read_explain(self.conn)?)),
            Route::Count(_) => Ok(QueryResult::Command(read_command_count(self.conn)?)),
            _ => Ok(QueryResult::Done(read_simple_command(self.conn)?)),
        };

        crate::metrics::histograms::query_duration(
            "extended",
            start.elapsed().as_millis() as u64,
        );
        outcome
    }
}
