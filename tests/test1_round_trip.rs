#![cfg(feature = "sqlite")]

use serde::Serialize;
use serde_json::json;
use sql_helper::prelude::*;

fn seeded() -> Result<SqlHelper, SqlHelperError> {
    let mut db = SqlHelper::open("sqlite::memory:")?;
    db.execute_batch(
        "CREATE TABLE t (id INTEGER PRIMARY KEY, x INTEGER, label TEXT);
         INSERT INTO t (id, x, label) VALUES (1, 0, 'one'), (2, 0, 'two');",
    )?;
    Ok(db)
}

#[test]
fn update_then_scalar_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = seeded()?;

    let affected = db.execute(
        "UPDATE t SET x=@x WHERE id=@id",
        Bag(json!({ "x": 5, "id": 1 })),
    )?;
    assert_eq!(affected, 1);

    let x = db.scalar("SELECT x FROM t WHERE id=@id", Bag(json!({ "id": 1 })))?;
    assert_eq!(x, RowValues::Int(5));
    Ok(())
}

#[derive(Serialize)]
struct Filter<'a> {
    label: &'a str,
    min_id: i64,
}

#[test]
fn struct_bags_bind_by_field_name() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = seeded()?;
    let ids: Vec<i64> = db.query_list(
        "SELECT id FROM t WHERE id >= :min_id AND label <> :label ORDER BY id",
        Bag(Filter {
            label: "one",
            min_id: 1,
        }),
    )?;
    assert_eq!(ids, [2]);
    Ok(())
}

#[test]
fn positional_values_bind_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = seeded()?;
    db.execute(
        "INSERT INTO t (id, x, label) VALUES (?1, ?2, ?3)",
        vec![RowValues::Int(3), RowValues::Int(9), RowValues::Text("three".into())],
    )?;
    assert_eq!(db.get_string("SELECT label FROM t WHERE x = ?1", vec![RowValues::Int(9)])?, "three");
    Ok(())
}

#[test]
fn repeated_placeholders_share_one_binding() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = seeded()?;
    let n = db.get_long(
        "SELECT count(*) FROM t WHERE id = @id OR x = @ID",
        vec![Parameter::new("id", 2)],
    )?;
    assert_eq!(n, 1);
    Ok(())
}

#[test]
fn file_databases_persist_across_connections() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("round_trip.db");
    let conn_str = format!("sqlite://{}", path.display());

    {
        let mut db = SqlHelper::open(&conn_str)?;
        db.execute_batch("CREATE TABLE kv (k TEXT PRIMARY KEY, v TEXT);")?;
        db.execute("INSERT INTO kv VALUES (@k, @v)", Bag(json!({ "k": "a", "v": "b" })))?;
        db.close()?;
    }

    let mut db = SqlHelper::open(&conn_str)?;
    assert_eq!(db.get_string("SELECT v FROM kv WHERE k = @k", Bag(json!({ "k": "a" })))?, "b");
    Ok(())
}
