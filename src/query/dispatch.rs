//! Response-stream state machines
//!
//! Each receiver consumes backend messages until ReadyForQuery or a
//! terminal error. A server ERROR is drained to ReadyForQuery and leaves
//! the connection usable; FATAL/PANIC and every local fault mark the
//! connection `Error` so the pool re-initializes the slot. Notices are
//! logged and ignored everywhere.

use super::result::ExplainRow;
use crate::connection::Connection;
use crate::protocol::{BackendMessage, ErrorFields};
use crate::row::{FromRow, Row};
use crate::{Error, Result};

/// Consume a plain-command response (CREATE/ALTER/DROP/GRANT/REVOKE/
/// COMMIT/ROLLBACK/PREPARE/SET/...). Returns whether CommandComplete was
/// seen.
pub(crate) fn read_simple_command(conn: &mut Connection) -> Result<bool> {
    let mut completed = false;

    loop {
        match conn.receive_message()? {
            BackendMessage::CommandComplete(_) | BackendMessage::EmptyQueryResponse => {
                completed = true;
            }
            BackendMessage::ReadyForQuery { .. } => return Ok(completed),
            BackendMessage::ErrorResponse(fields) => return Err(server_error(conn, fields)),
            BackendMessage::NoticeResponse(notice) => {
                tracing::debug!("notice: {}", notice);
            }
            other => ignore_tolerated(conn, &other)?,
        }
    }
}

/// Consume a counted-command response (INSERT/UPDATE/DELETE/MERGE) and
/// parse the affected-row count out of the CommandComplete tag.
pub(crate) fn read_command_count(conn: &mut Connection) -> Result<u64> {
    let mut count: Option<u64> = None;

    loop {
        match conn.receive_message()? {
            BackendMessage::CommandComplete(tag) => {
                count = Some(parse_command_tag(&tag)?);
            }
            BackendMessage::EmptyQueryResponse => {
                count = Some(0);
            }
            BackendMessage::ReadyForQuery { .. } => {
                return count.ok_or_else(|| {
                    conn.fail();
                    Error::Protocol("command response ended without CommandComplete".into())
                });
            }
            BackendMessage::ErrorResponse(fields) => return Err(server_error(conn, fields)),
            BackendMessage::NoticeResponse(notice) => {
                tracing::debug!("notice: {}", notice);
            }
            other => ignore_tolerated(conn, &other)?,
        }
    }
}

/// Consume a row-producing response and deserialize every DataRow into
/// `T`.
///
/// ```text
/// Start → BindComplete? → ParameterDescription? → RowDescription
///       → (DataRow)* → CommandComplete("SELECT ...")
///       → ReadyForQuery → End
/// ```
pub(crate) fn read_select<T: FromRow>(conn: &mut Connection) -> Result<Vec<T>> {
    let mut rows = Vec::new();
    let mut saw_row_description = false;

    loop {
        match conn.receive_message()? {
            BackendMessage::RowDescription(fields) => {
                if fields.len() != T::COLUMNS {
                    conn.fail();
                    return Err(Error::ColumnCountMismatch {
                        expected: T::COLUMNS,
                        actual: fields.len(),
                    });
                }
                saw_row_description = true;
            }
            BackendMessage::DataRow(cols) => {
                if !saw_row_description {
                    conn.fail();
                    return Err(Error::MissingRowDescription);
                }
                let mut row = Row::new(cols);
                match T::from_row(&mut row) {
                    Ok(record) => rows.push(record),
                    Err(e) => {
                        conn.fail();
                        return Err(e.into());
                    }
                }
            }
            BackendMessage::CommandComplete(tag) => {
                if !tag.starts_with("SELECT") {
                    conn.fail();
                    return Err(Error::NotASelectQuery(tag));
                }
            }
            BackendMessage::EmptyQueryResponse => {}
            BackendMessage::ReadyForQuery { .. } => return Ok(rows),
            BackendMessage::ErrorResponse(fields) => return Err(server_error(conn, fields)),
            BackendMessage::NoticeResponse(notice) => {
                tracing::debug!("notice: {}", notice);
            }
            other => ignore_tolerated(conn, &other)?,
        }
    }
}

/// Consume an EXPLAIN response: DataRows with at least four text columns
/// parsed as (operation, target, cost, rows, optional details).
pub(crate) fn read_explain(conn: &mut Connection) -> Result<Vec<ExplainRow>> {
    let mut plan = Vec::new();
    let mut saw_row_description = false;

    loop {
        match conn.receive_message()? {
            BackendMessage::RowDescription(_) => {
                saw_row_description = true;
            }
            BackendMessage::DataRow(cols) => {
                if !saw_row_description {
                    conn.fail();
                    return Err(Error::MissingRowDescription);
                }
                match parse_explain_row(&cols) {
                    Ok(row) => plan.push(row),
                    Err(e) => {
                        conn.fail();
                        return Err(e);
                    }
                }
            }
            BackendMessage::CommandComplete(_) | BackendMessage::EmptyQueryResponse => {}
            BackendMessage::ReadyForQuery { .. } => return Ok(plan),
            BackendMessage::ErrorResponse(fields) => return Err(server_error(conn, fields)),
            BackendMessage::NoticeResponse(notice) => {
                tracing::debug!("notice: {}", notice);
            }
            other => ignore_tolerated(conn, &other)?,
        }
    }
}

/// Consume a Parse + Sync response: ParseComplete then ReadyForQuery.
pub(crate) fn read_prepare_only(conn: &mut Connection) -> Result<()> {
    let mut parsed = false;

    loop {
        match conn.receive_message()? {
            BackendMessage::ParseComplete => {
                parsed = true;
            }
            BackendMessage::ReadyForQuery { .. } => {
                if parsed {
                    return Ok(());
                }
                conn.fail();
                return Err(Error::Protocol(
                    "prepare response ended without ParseComplete".into(),
                ));
            }
            BackendMessage::ErrorResponse(fields) => return Err(server_error(conn, fields)),
            BackendMessage::NoticeResponse(notice) => {
                tracing::debug!("notice: {}", notice);
            }
            other => ignore_tolerated(conn, &other)?,
        }
    }
}

/// Messages tolerated mid-stream in any mode. Anything else is a
/// protocol violation.
fn ignore_tolerated(conn: &mut Connection, msg: &BackendMessage) -> Result<()> {
    match msg {
        BackendMessage::ParseComplete
        | BackendMessage::BindComplete
        | BackendMessage::CloseComplete
        | BackendMessage::NoData
        | BackendMessage::PortalSuspended
        | BackendMessage::ParameterDescription { .. }
        | BackendMessage::ParameterStatus { .. }
        | BackendMessage::BackendKeyData { .. }
        | BackendMessage::RowDescription(_)
        | BackendMessage::DataRow(_) => Ok(()),
        other => {
            conn.fail();
            Err(Error::Protocol(format!(
                "unexpected message in response stream: {:?}",
                other
            )))
        }
    }
}

/// Convert an ErrorResponse into the returned error.
///
/// FATAL/PANIC mean the server is closing the session: no drain, the
/// connection is marked unusable. A plain ERROR is followed by
/// ReadyForQuery, so the stream is drained and the connection stays
/// Connected.
fn server_error(conn: &mut Connection, fields: ErrorFields) -> Error {
    let err = fields.into_server_error();

    if err.severity.is_fatal() {
        conn.fail();
        return Error::Server(err);
    }

    loop {
        match conn.receive_message() {
            Ok(BackendMessage::ReadyForQuery { .. }) => break,
            Ok(_) => continue,
            Err(drain_err) => return drain_err,
        }
    }

    Error::Server(err)
}

/// Parse an affected-row count out of a CommandComplete tag.
///
/// `INSERT <oid> <count>` carries the count in the last token; every
/// other counted verb is `<VERB> <count>`.
pub(crate) fn parse_command_tag(tag: &str) -> Result<u64> {
    let parts: Vec<&str> = tag.split_whitespace().collect();
    let count = match parts.as_slice() {
        ["INSERT", _oid, n] => n.parse().ok(),
        [_, n] => n.parse().ok(),
        _ => None,
    };
    count.ok_or_else(|| Error::InvalidCommandTag(tag.to_string()))
}

fn parse_explain_row(cols: &[Option<bytes::Bytes>]) -> Result<ExplainRow> {
    if cols.len() < 4 {
        return Err(Error::InvalidExplainFormat(format!(
            "expected at least 4 columns, got {}",
            cols.len()
        )));
    }

    let text = |idx: usize| -> Result<String> {
        cols[idx]
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .ok_or_else(|| {
                Error::InvalidExplainFormat(format!("unexpected NULL in column {}", idx))
            })
    };

    Ok(ExplainRow {
        operation: text(0)?,
        target: text(1)?,
        cost: text(2)?,
        rows: text(3)?,
        details: cols
            .get(4)
            .and_then(|c| c.as_ref())
            .map(|b| String::from_utf8_lossy(b).into_owned()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn test_parse_command_tag_insert() {
        assert_eq!(parse_command_tag("INSERT 0 3").unwrap(), 3);
        assert_eq!(parse_command_tag("INSERT 16384 1").unwrap(), 1);
    }

    #[test]
    fn test_parse_command_tag_two_token_verbs() {
        assert_eq!(parse_command_tag("UPDATE 7").unwrap(), 7);
        assert_eq!(parse_command_tag("DELETE 0").unwrap(), 0);
        assert_eq!(parse_command_tag("MERGE 12").unwrap(), 12);
        assert_eq!(parse_command_tag("SELECT 10").unwrap(), 10);
    }

    #[test]
    fn test_parse_command_tag_invalid() {
        assert!(matches!(
            parse_command_tag("COMMIT"),
            Err(Error::InvalidCommandTag(_))
        ));
        assert!(matches!(
            parse_command_tag("UPDATE x"),
            Err(Error::InvalidCommandTag(_))
        ));
        assert!(matches!(
            parse_command_tag(""),
            Err(Error::InvalidCommandTag(_))
        ));
    }

    #[test]
    fn test_parse_explain_row_full() {
        let cols = vec![
            Some(Bytes::from_static(b"Seq Scan")),
            Some(Bytes::from_static(b"users")),
            Some(Bytes::from_static(b"0.00..1.04")),
            Some(Bytes::from_static(b"4")),
            Some(Bytes::from_static(b"Filter: active")),
        ];
        let row = parse_explain_row(&cols).unwrap();
        assert_eq!(row.operation, "Seq Scan");
        assert_eq!(row.target, "users");
        assert_eq!(row.cost, "0.00..1.04");
        assert_eq!(row.rows, "4");
        assert_eq!(row.details.as_deref(), Some("Filter: active"));
    }

    #[test]
    fn test_parse_explain_row_without_details() {
        let cols = vec![
            Some(Bytes::from_static(b"Index Scan")),
            Some(Bytes::from_static(b"users_pkey")),
            Some(Bytes::from_static(b"0.15..8.17")),
            Some(Bytes::from_static(b"1")),
        ];
        let row = parse_explain_row(&cols).unwrap();
        assert!(row.details.is_none());
    }

    #[test]
    fn test_parse_explain_row_too_few_columns() {
        let cols = vec![
            Some(Bytes::from_static(b"Seq Scan")),
            Some(Bytes::from_static(b"users")),
        ];
        assert!(matches!(
            parse_explain_row(&cols),
            Err(Error::InvalidExplainFormat(_))
        ));
    }

    #[test]
    fn test_parse_explain_row_null_fixed_column() {
        let cols = vec![
            Some(Bytes::from_static(b"Seq Scan")),
            None,
            Some(Bytes::from_static(b"0.00..1.04")),
            Some(Bytes::from_static(b"4")),
        ];
        assert!(matches!(
            parse_explain_row(&cols),
            Err(Error::InvalidExplainFormat(_))
        ));
    }
}
