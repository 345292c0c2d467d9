//! Simple (text) query facade

use super::dispatch::{read_command_count, read_explain, read_select, read_simple_command};
use super::param::Param;
use super::result::QueryResult;
use super::verb::{parse_execute_name, parse_prepare, route_for, route_for_verb, Route};
use crate::connection::Connection;
use crate::protocol::FrontendMessage;
use crate::row::FromRow;
use crate::{Error, Result};

/// Facade for the Simple Query protocol: the whole statement travels in
/// one 'Q' message and parameters must be inlined as SQL literals.
pub struct SimpleQuery<'a> {
    conn: &'a mut Connection,
}

impl<'a> SimpleQuery<'a> {
    pub(crate) fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Run one statement and process its response according to the
    /// leading verb.
    ///
    /// `PREPARE name AS ...` records (name, inner verb) in the
    /// connection's statement registry; `EXECUTE name` replays with the
    /// response mode of the registered verb.
    pub fn run<T: FromRow>(&mut self, sql: &str) -> Result<QueryResult<T>> {
        let sql = sql.trim();
        let start = std::time::Instant::now();
        crate::metrics::counters::queries_executed("simple");

        let outcome = self.run_inner(sql);

        crate::metrics::histograms::query_duration(
            "simple",
            start.elapsed().as_millis() as u64,
        );
        outcome
    }

    /// Run a previously prepared statement by rendering
    /// `EXECUTE name (lit, ...)` with the parameters inlined as SQL
    /// literals.
    pub fn run_prepared<T: FromRow>(
        &mut self,
        name: &str,
        params: &[Param],
    ) -> Result<QueryResult<T>> {
        self.run(&render_execute(name, params))
    }

    fn run_inner<T: FromRow>(&mut self, sql: &str) -> Result<QueryResult<T>> {
        match route_for(sql) {
            Route::Prepare => {
                let (name, verb) = parse_prepare(sql)?;
                self.conn.send_message(&FrontendMessage::Query(sql.to_string()))?;
                let done = read_simple_command(self.conn)?;
                if done {
                    self.conn.record_statement(&name, verb);
                }
                Ok(QueryResult::Done(done))
            }
            Route::Execute => {
                let name = parse_execute_name(sql)?;
                let verb = self
                    .conn
                    .statement_verb(&name)
                    .ok_or(Error::UnknownPreparedStatement(name))?;
                self.conn.send_message(&FrontendMessage::Query(sql.to_string()))?;
                self.finish(route_for_verb(verb))
            }
            route => {
                self.conn.send_message(&FrontendMessage::Query(sql.to_string()))?;
                self.finish(route)
            }
        }
    }

    fn finish<T: FromRow>(&mut self, route: Route) -> Result<QueryResult<T>> {
        match route {
            Route::Select => Ok(QueryResult::Rows(read_select(self.conn)?)),
            Route::Explain => Ok(QueryResult::Explain(read_explain(self.conn)?)),
            Route::Count(_) => Ok(QueryResult::Command(read_command_count(self.conn)?)),
            Route::Command => Ok(QueryResult::Done(read_simple_command(self.conn)?)),
            // Both are resolved to one of the modes above before dispatch
            Route::Prepare | Route::Execute => unreachable!("resolved in run_inner"),
        }
    }
}

/// Render `EXECUTE name` or `EXECUTE name (lit, ...)`
fn render_execute(name: &str, params: &[Param]) -> String {
    if params.is_empty() {
        format!("EXECUTE {}", name)
    } else {
        let literals: Vec<String> = params.iter().map(Param::to_sql_literal).collect();
        format!("EXECUTE {} ({})", name, literals.join(", "))
    }
}
