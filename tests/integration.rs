//! Integration tests for pgcord
//!
//! These tests require a running Postgres instance at localhost:5432
//! with a `postgres` superuser (password `postgres`).

use pgcord::{
    Config, Connection, DecodeError, FromRow, Param, Pool, QueryResult, Row, TlsMode,
};

fn local_config() -> Config {
    Config::builder("localhost", "postgres")
        .password("postgres")
        .database("postgres")
        .tls_mode(TlsMode::Prefer)
        .build()
        .unwrap()
}

struct One {
    n: i32,
}

impl FromRow for One {
    const COLUMNS: usize = 1;

    fn from_row(row: &mut Row) -> Result<Self, DecodeError> {
        Ok(One { n: row.take()? })
    }
}

#[test]
#[ignore] // Requires Postgres running
fn test_connect_and_select() {
    let mut conn = Connection::connect_with(local_config()).expect("connect");

    let result = conn.simple().run::<One>("SELECT 1").expect("query");
    assert_eq!(result.rows().unwrap()[0].n, 1);

    conn.close();
}

#[test]
#[ignore] // Requires Postgres running
fn test_extended_protocol_round_trip() {
    let mut conn = Connection::connect_with(local_config()).expect("connect");

    let mut extended = conn.extended();
    extended.prepare("one", "SELECT $1::int").expect("prepare");
    let result = extended
        .execute::<One>("one", &[Param::Int4(41)])
        .expect("execute");
    assert_eq!(result.rows().unwrap()[0].n, 41);
}

#[test]
#[ignore] // Requires Postgres running
fn test_insert_delete_counts() {
    let mut conn = Connection::connect_with(local_config()).expect("connect");

    conn.simple()
        .run::<()>("CREATE TEMP TABLE pgcord_t (id int)")
        .expect("create");

    let result = conn
        .simple()
        .run::<()>("INSERT INTO pgcord_t VALUES (1),(2),(3)")
        .expect("insert");
    assert_eq!(result.affected(), Some(3));

    let result = conn
        .simple()
        .run::<()>("DELETE FROM pgcord_t")
        .expect("delete");
    assert_eq!(result.affected(), Some(3));
}

#[test]
#[ignore] // Requires Postgres running
fn test_pool_round_trip() {
    let pool = Pool::new(local_config(), 2).expect("pool");

    let mut conn = pool.get().expect("acquire");
    match conn.simple().run::<One>("SELECT 1").expect("query") {
        QueryResult::Rows(rows) => assert_eq!(rows[0].n, 1),
        _ => panic!("expected rows"),
    }
    drop(conn);

    assert_eq!(pool.available(), 2);
    pool.close();
}
