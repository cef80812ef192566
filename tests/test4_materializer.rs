#![cfg(feature = "sqlite")]

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use sql_helper::prelude::*;

sql_helper::record! {
    #[derive(Debug, Default, PartialEq)]
    struct Student {
        id: i64,
        name: String,
        gpa: Option<f64>,
        enrolled: Option<chrono::NaiveDateTime>,
    }
}

fn school() -> Result<SqlHelper, SqlHelperError> {
    let mut db = SqlHelper::open("sqlite::memory:")?;
    db.execute_batch(
        "CREATE TABLE student (id INTEGER PRIMARY KEY, name TEXT, gpa REAL, enrolled TEXT);
         INSERT INTO student VALUES (1, 'Ada', 3.9, '2024-09-01 08:00:00');
         INSERT INTO student VALUES (2, 'Grace', NULL, NULL);",
    )?;
    Ok(db)
}

#[test]
fn records_map_columns_case_insensitively() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = school()?;
    let students: Vec<Student> = db.query_list(
        "SELECT ID, Name, GPA, enrolled, 'ignored' AS extra FROM student ORDER BY id",
        (),
    )?;
    let enrolled = NaiveDate::from_ymd_opt(2024, 9, 1).and_then(|d| d.and_hms_opt(8, 0, 0));
    assert_eq!(
        students,
        vec![
            Student {
                id: 1,
                name: "Ada".into(),
                gpa: Some(3.9),
                enrolled,
            },
            Student {
                id: 2,
                name: "Grace".into(),
                gpa: None,
                enrolled: None,
            },
        ]
    );
    Ok(())
}

#[test]
fn empty_results_are_empty_lists() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = school()?;
    let none: Vec<Student> = db.query_list("SELECT * FROM student WHERE id > 100", ())?;
    assert!(none.is_empty());
    Ok(())
}

#[test]
fn single_requires_exactly_one_row() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = school()?;
    let one: Student = db.query_single("SELECT * FROM student WHERE id = @id", vec![Parameter::new("id", 2)])?;
    assert_eq!(one.name, "Grace");

    let zero = db.query_single::<Student>("SELECT * FROM student WHERE id = 0", ());
    assert!(matches!(zero, Err(SqlHelperError::ExpectedExactlyOneRow { found: 0 })));

    let many = db.query_single::<String>("SELECT name FROM student", ());
    assert!(matches!(many, Err(SqlHelperError::ExpectedExactlyOneRow { found: 2 })));
    Ok(())
}

#[test]
fn primitives_arrays_and_maps() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = school()?;

    let gpas: Vec<Option<f64>> = db.query_list("SELECT gpa FROM student ORDER BY id", ())?;
    assert_eq!(gpas, [Some(3.9), None]);

    let rows: Vec<Vec<RowValues>> = db.query_list("SELECT id, name FROM student ORDER BY id", ())?;
    assert_eq!(rows[1], vec![RowValues::Int(2), RowValues::Text("Grace".into())]);

    let maps: Vec<HashMap<String, RowValues>> =
        db.query_list("SELECT id, name FROM student WHERE id = 1", ())?;
    assert_eq!(maps[0].get("name"), Some(&RowValues::Text("Ada".into())));

    let ordered: BTreeMap<String, RowValues> =
        db.query_single("SELECT name, id FROM student WHERE id = 1", ())?;
    assert_eq!(ordered.keys().collect::<Vec<_>>(), ["id", "name"]);

    let pairs: Vec<(i64, String)> = db.query_list("SELECT id, name FROM student ORDER BY id", ())?;
    assert_eq!(pairs[0], (1, "Ada".to_string()));
    Ok(())
}

#[test]
fn mapping_failures_name_the_column() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = school()?;
    let err = db
        .query_list::<i64>("SELECT name FROM student", ())
        .unwrap_err();
    match err {
        SqlHelperError::RecordMappingFailed { target, column, .. } => {
            assert_eq!(target, "i64");
            assert_eq!(column, "name");
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn scalar_accessors_treat_null_as_zero() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = school()?;
    assert_eq!(db.scalar("SELECT gpa FROM student WHERE id = 2", ())?, RowValues::Int(0));
    assert_eq!(db.scalar("SELECT gpa FROM student WHERE id = 99", ())?, RowValues::Int(0));
    assert_eq!(db.get_int("SELECT gpa FROM student WHERE id = 2", ())?, 0);
    assert_eq!(db.get_double("SELECT gpa FROM student WHERE id = 2", ())?, 0.0);
    assert_eq!(db.get_decimal("SELECT gpa FROM student WHERE id = 2", ())?, Decimal::ZERO);
    assert_eq!(db.get_string("SELECT name FROM student WHERE id = 99", ())?, "");

    assert_eq!(db.get_decimal("SELECT '12.50'", ())?, Decimal::new(1250, 2));
    assert_eq!(
        db.get_date_time("SELECT enrolled FROM student WHERE id = 1", ())?,
        NaiveDate::from_ymd_opt(2024, 9, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .ok_or("bad date")?
    );
    assert!(db.get_bool("SELECT 1", ())?);
    Ok(())
}

#[test]
fn tables_keep_result_sets_apart() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = school()?;
    let tables = db.query_tables(
        "SELECT id FROM student ORDER BY id;
         UPDATE student SET gpa = 4.0 WHERE id = @id;
         SELECT name, gpa FROM student WHERE id = @id;",
        vec![Parameter::new("id", 2)],
    )?;
    assert_eq!(tables.len(), 2);
    assert_eq!(tables.table("Table").map(ResultSet::len), Some(2));
    let second = tables.table("Table1").ok_or("missing Table1")?;
    assert_eq!(second.results[0].get("gpa"), Some(&RowValues::Float(4.0)));

    let single = db.query_table("SELECT name FROM student ORDER BY id", ())?;
    let names: Vec<String> = single.to_list()?;
    assert_eq!(names, ["Ada", "Grace"]);
    Ok(())
}

#[test]
fn cursors_read_forward_and_release_on_drop() -> Result<(), Box<dyn std::error::Error>> {
    let mut db = school()?;
    {
        let mut cursor = db.query_cursor("SELECT id, name FROM student ORDER BY id", ())?;
        assert_eq!(cursor.columns(), ["id", "name"]);
        let first = cursor.next_row()?.ok_or("no row")?;
        assert_eq!(first.get("NAME"), Some(&RowValues::Text("Ada".into())));
    }
    // The helper is usable again once the cursor is gone.
    let rest: Vec<Student> = db
        .query_cursor("SELECT * FROM student WHERE id > @id", vec![Parameter::new("id", 1)])?
        .collect_as()?;
    assert_eq!(rest.len(), 1);
    Ok(())
}
