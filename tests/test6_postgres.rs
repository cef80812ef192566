#![cfg(feature = "postgres")]

use serde_json::json;
use sql_helper::prelude::*;

/// Connection string from `SQL_HELPER_PG_URL`; the tests are skipped without one.
fn pg_url() -> Option<String> {
    std::env::var("SQL_HELPER_PG_URL").ok()
}

#[test]
fn postgres_round_trip_and_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let Some(url) = pg_url() else {
        eprintln!("SQL_HELPER_PG_URL not set; skipping");
        return Ok(());
    };
    let mut db = SqlHelper::open(&url)?;
    assert_eq!(db.database_type(), Some(DatabaseType::Postgres));

    db.execute_batch(
        "DROP TABLE IF EXISTS sql_helper_t;
         CREATE TABLE sql_helper_t (id INT PRIMARY KEY, x INT, price NUMERIC(10,2), at TIMESTAMP);
         INSERT INTO sql_helper_t VALUES (1, 0, 9.99, '2024-01-01 00:00:00');",
    )?;

    db.execute("UPDATE sql_helper_t SET x=@x WHERE id=@id", Bag(json!({ "x": 5, "id": 1 })))?;
    assert_eq!(db.scalar("SELECT x FROM sql_helper_t WHERE id=@id", Bag(json!({ "id": 1 })))?, RowValues::Int(5));
    assert_eq!(
        db.get_decimal("SELECT price FROM sql_helper_t WHERE id = :id", Bag(json!({ "id": 1 })))?,
        Decimal::new(999, 2)
    );

    db.begin_transaction_with(IsolationLevel::ReadCommitted)?;
    db.execute("INSERT INTO sql_helper_t (id, x) VALUES ($1, $2)", vec![RowValues::Int(2), RowValues::Int(1)])?;
    db.rollback()?;
    assert_eq!(db.get_long("SELECT count(*) FROM sql_helper_t", ())?, 1);

    let mut cursor = db.query_cursor("SELECT id, at FROM sql_helper_t ORDER BY id", ())?;
    let row = cursor.next_row()?.ok_or("no row")?;
    assert!(matches!(row.get("at"), Some(RowValues::Timestamp(_))));
    drop(cursor);

    let tables = db.query_tables("SELECT 1 AS a; SELECT 2 AS b, 3 AS c;", ())?;
    assert_eq!(tables.names().collect::<Vec<_>>(), ["Table", "Table1"]);

    db.execute_batch("DROP TABLE sql_helper_t;")?;
    db.close()?;
    Ok(())
}

#[test]
fn postgres_stored_procedures_use_named_arguments() -> Result<(), Box<dyn std::error::Error>> {
    let Some(url) = pg_url() else {
        return Ok(());
    };
    let mut db = SqlHelper::open(&url)?;
    db.execute_batch(
        "DROP TABLE IF EXISTS sql_helper_proc;
         CREATE TABLE sql_helper_proc (name TEXT);
         CREATE OR REPLACE PROCEDURE sql_helper_add(name TEXT)
         LANGUAGE sql AS $$ INSERT INTO sql_helper_proc VALUES (name) $$;",
    )?;

    db.set_command_type(CommandType::StoredProcedure);
    db.execute("sql_helper_add", vec![Parameter::new("name", "Ada")])?;
    db.set_command_type(CommandType::Text);

    assert_eq!(db.get_string("SELECT name FROM sql_helper_proc", ())?, "Ada");
    db.execute_batch("DROP PROCEDURE sql_helper_add(TEXT); DROP TABLE sql_helper_proc;")?;
    Ok(())
}

#[test]
fn postgres_statement_timeout_survives_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let Some(url) = pg_url() else {
        return Ok(());
    };
    let mut db = SqlHelper::open(&url)?;
    db.set_command_timeout_secs(7);

    db.begin_transaction()?;
    assert_eq!(db.get_string("SHOW statement_timeout", ())?, "7s");
    db.rollback()?;
    assert_eq!(db.get_string("SHOW statement_timeout", ())?, "7s");

    db.close()?;
    Ok(())
}
