//! SQL verb routing
//!
//! The client treats SQL as opaque bytes except for the leading keyword,
//! which selects the response-processing mode, and the statement names
//! inside PREPARE/EXECUTE, which feed the per-connection registry.

use crate::{Error, Result};

/// Statement verb recorded in the prepared-statement registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    /// Row-producing statement
    Select,
    /// INSERT
    Insert,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
    /// Anything else (DDL, transaction control, SET, ...)
    Other,
}

impl Verb {
    /// Classify an upper-cased leading keyword
    pub fn from_keyword(keyword: &str) -> Verb {
        match keyword {
            "SELECT" => Verb::Select,
            "INSERT" => Verb::Insert,
            "UPDATE" => Verb::Update,
            "DELETE" => Verb::Delete,
            _ => Verb::Other,
        }
    }
}

/// Response-processing mode chosen from the leading keyword
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// RowDescription + DataRow stream
    Select,
    /// EXPLAIN plan rows
    Explain,
    /// CommandComplete tag carries an affected-row count
    Count(Verb),
    /// CommandComplete without a count (DDL, transaction control, ...)
    Command,
    /// PREPARE: registry bookkeeping plus a plain command
    Prepare,
    /// EXECUTE: mode comes from the registry
    Execute,
}

/// Extract the leading keyword: at most the first 10 bytes of the first
/// word, upper-cased
pub(crate) fn leading_keyword(sql: &str) -> String {
    sql.trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .take(10)
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Choose the response-processing mode for a simple-protocol statement
pub(crate) fn route_for(sql: &str) -> Route {
    match leading_keyword(sql).as_str() {
        "SELECT" => Route::Select,
        "EXPLAIN" => Route::Explain,
        "INSERT" => Route::Count(Verb::Insert),
        "UPDATE" => Route::Count(Verb::Update),
        "DELETE" => Route::Count(Verb::Delete),
        "MERGE" => Route::Count(Verb::Other),
        "PREPARE" => Route::Prepare,
        "EXECUTE" => Route::Execute,
        _ => Route::Command,
    }
}

/// The response mode for an EXECUTE of a statement with the given
/// registered verb
pub(crate) fn route_for_verb(verb: Verb) -> Route {
    match verb {
        Verb::Select => Route::Select,
        Verb::Insert | Verb::Update | Verb::Delete => Route::Count(verb),
        Verb::Other => Route::Command,
    }
}

/// Parse `PREPARE <name> [(types)] AS <statement>` into the statement
/// name and the inner verb
pub(crate) fn parse_prepare(sql: &str) -> Result<(String, Verb)> {
    let rest = sql.trim_start();
    let rest = strip_keyword(rest, "PREPARE")
        .ok_or_else(|| Error::Protocol("malformed PREPARE statement".into()))?;

    let rest = rest.trim_start();
    let name_end = rest
        .find(|c: char| c.is_whitespace() || c == '(')
        .ok_or_else(|| Error::Protocol("PREPARE statement missing AS clause".into()))?;
    let name = rest[..name_end].to_string();
    if name.is_empty() {
        return Err(Error::Protocol("PREPARE statement missing name".into()));
    }

    // Skip the optional parameter type list, then require AS
    let mut rest = &rest[name_end..];
    rest = rest.trim_start();
    if let Some(stripped) = rest.strip_prefix('(') {
        let close = stripped
            .find(')')
            .ok_or_else(|| Error::Protocol("unterminated type list in PREPARE".into()))?;
        rest = stripped[close + 1..].trim_start();
    }

    let body = strip_keyword(rest, "AS")
        .ok_or_else(|| Error::Protocol("PREPARE statement missing AS clause".into()))?;

    let verb = Verb::from_keyword(&leading_keyword(body));
    Ok((name, verb))
}

/// Parse `EXECUTE <name> [(args)]` into the statement name
pub(crate) fn parse_execute_name(sql: &str) -> Result<String> {
    let rest = sql.trim_start();
    let rest = strip_keyword(rest, "EXECUTE")
        .ok_or_else(|| Error::Protocol("malformed EXECUTE statement".into()))?;

    let rest = rest.trim_start();
    let name_end = rest
        .find(|c: char| c.is_whitespace() || c == '(' || c == ';')
        .unwrap_or(rest.len());
    let name = rest[..name_end].to_string();
    if name.is_empty() {
        return Err(Error::Protocol("EXECUTE statement missing name".into()));
    }
    Ok(name)
}

/// Strip a leading keyword (case-insensitive) followed by a word
/// boundary; returns the remainder
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    if s.len() < keyword.len() {
        return None;
    }
    let (head, tail) = s.split_at(keyword.len());
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    if tail.chars().next().is_some_and(|c| !c.is_whitespace()) {
        return None;
    }
    Some(tail)
}
