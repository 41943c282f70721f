//! End-to-end tests for the tee stage through the SQL surface.

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::{ArrayRef, Int64Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};
use sluice_execution::ExecutionOptions;
use sluice_session::Session;
use sluice_testing::{int64_batch, int64_schema};
use std::sync::Arc;

fn session_with_numbers(rows: i64) -> Session {
    sluice_testing::init_test_logging();

    let session = Session::new();
    let schema = int64_schema(&["a", "b"]);
    session.create_table("numbers", schema).unwrap();
    session
        .add_batch(
            "numbers",
            int64_batch(&[
                ("a", (0..rows).collect()),
                ("b", (0..rows).map(|v| v * 10).collect()),
            ]),
        )
        .unwrap();
    session
}

fn collect_i64(batches: &[RecordBatch], column: usize) -> Vec<i64> {
    let mut rows = Vec::new();
    for batch in batches {
        let values = batch.column(column).as_primitive::<Int64Type>();
        rows.extend(values.iter().map(|v| v.unwrap()));
    }
    rows
}

#[test]
fn test_tee_passthrough_bare_form() {
    // The bare form relies on the preprocessor to wrap the subquery.
    let session = session_with_numbers(3);
    let batches = session
        .execute("SELECT * FROM tee(SELECT a FROM numbers)")
        .unwrap();
    let mut rows = collect_i64(&batches, 0);
    rows.sort_unstable();
    assert_eq!(rows, vec![0, 1, 2]);
}

#[test]
fn test_tee_passthrough_wrapped_form_with_options() {
    let session = session_with_numbers(5);
    let batches = session
        .execute("SELECT * FROM tee((SELECT a, b FROM numbers), terminal := false)")
        .unwrap();
    let mut rows = collect_i64(&batches, 1);
    rows.sort_unstable();
    assert_eq!(rows, vec![0, 10, 20, 30, 40]);
}

#[test]
fn test_tee_equals_option_operator() {
    let session = session_with_numbers(2);
    let batches = session
        .execute("SELECT * FROM tee((SELECT a FROM numbers), terminal = false)")
        .unwrap();
    assert_eq!(collect_i64(&batches, 0).len(), 2);
}

#[test]
fn test_tee_csv_export() {
    let session = session_with_numbers(3);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let query = format!(
        "SELECT * FROM tee((SELECT a, b FROM numbers), path := '{}', terminal := false)",
        path.display()
    );
    let batches = session.execute(&query).unwrap();
    assert_eq!(collect_i64(&batches, 0).len(), 3);

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines, vec!["a,b", "0,0", "1,10", "2,20"]);
}

#[test]
fn test_tee_csv_export_empty_input_is_header_only() {
    sluice_testing::init_test_logging();
    let session = Session::new();
    session
        .create_table("empty", int64_schema(&["a", "b"]))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.csv");
    let query = format!(
        "SELECT * FROM tee((SELECT a, b FROM empty), path := '{}', terminal := false)",
        path.display()
    );
    let batches = session.execute(&query).unwrap();
    assert!(batches.iter().all(|b| b.num_rows() == 0));

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().collect::<Vec<_>>(), vec!["a,b"]);
}

#[test]
fn test_tee_csv_export_across_batch_boundary() {
    // 4097 rows crosses the 1024-row ingest slicing several times over, so
    // the export streams multiple batches through one writer.
    sluice_testing::init_test_logging();
    let row_count = 4097i64;

    let session = Session::new();
    let schema = Arc::new(Schema::new(vec![
        Field::new("a", DataType::Int64, true),
        Field::new("b", DataType::Int64, true),
        Field::new("c", DataType::Int64, true),
        Field::new("d", DataType::Int64, true),
    ]));
    session.create_table("range", schema.clone()).unwrap();

    let a: Vec<i64> = (0..row_count).collect();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from(a.clone())),
        Arc::new(Int64Array::from(vec![10; row_count as usize])),
        Arc::new(Int64Array::from(
            a.iter().map(|v| v % 9).collect::<Vec<_>>(),
        )),
        Arc::new(Int64Array::from(
            a.iter().map(|v| v / 5).collect::<Vec<_>>(),
        )),
    ];
    session
        .add_batch("range", RecordBatch::try_new(schema, columns).unwrap())
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let query = format!(
        "SELECT * FROM tee((SELECT a, b, c, d FROM range), path := '{}', terminal := false)",
        path.display()
    );
    session.execute(&query).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len() as i64, row_count + 1);
    assert_eq!(lines[0], "a,b,c,d");
    assert_eq!(lines[1], "0,10,0,0");
    let last = row_count - 1;
    assert_eq!(
        lines[lines.len() - 1],
        format!("{},10,{},{}", last, last % 9, last / 5)
    );
}

#[test]
fn test_tee_materializes_table_exactly_once() {
    // 1000 single-row batches over 8 producer partitions must produce one
    // table with exactly 1000 rows.
    sluice_testing::init_test_logging();
    let session = Session::with_options(ExecutionOptions { partitions: 8 });
    session.create_table("numbers", int64_schema(&["a"])).unwrap();
    for value in 0..1000 {
        session
            .add_batch("numbers", int64_batch(&[("a", vec![value])]))
            .unwrap();
    }

    let batches = session
        .execute("SELECT * FROM tee((SELECT a FROM numbers), table_name := 't', terminal := false)")
        .unwrap();
    assert_eq!(collect_i64(&batches, 0).len(), 1000);

    assert_eq!(session.table_row_count("t"), Some(1000));
    let mut materialized = collect_i64(&session.table_batches("t").unwrap(), 0);
    materialized.sort_unstable();
    assert_eq!(materialized, (0..1000).collect::<Vec<_>>());

    // The materialized table is queryable afterwards.
    let roundtrip = session.execute("SELECT a FROM t").unwrap();
    assert_eq!(collect_i64(&roundtrip, 0).len(), 1000);
}

#[test]
fn test_nested_tee_invocations() {
    let session = session_with_numbers(4);
    let batches = session
        .execute(
            "SELECT * FROM tee((SELECT * FROM tee((SELECT a FROM numbers), terminal := false)), \
             terminal := false)",
        )
        .unwrap();
    let mut rows = collect_i64(&batches, 0);
    rows.sort_unstable();
    assert_eq!(rows, vec![0, 1, 2, 3]);
}

#[test]
fn test_tee_unknown_option_is_a_bind_error() {
    let session = session_with_numbers(1);
    let result =
        session.execute("SELECT * FROM tee((SELECT a FROM numbers), nonsense := true)");
    assert!(result.is_err());
}

#[test]
fn test_tee_without_subquery_is_a_bind_error() {
    let session = session_with_numbers(1);
    let result = session.execute("SELECT * FROM tee(path := 'out.csv')");
    assert!(result.is_err());
}

#[test]
fn test_tee_two_subqueries_is_a_bind_error() {
    let session = session_with_numbers(1);
    let result =
        session.execute("SELECT * FROM tee((SELECT a FROM numbers), (SELECT b FROM numbers))");
    assert!(result.is_err());
}

#[test]
fn test_tee_bad_option_value_is_a_bind_error() {
    let session = session_with_numbers(1);
    let result = session.execute("SELECT * FROM tee((SELECT a FROM numbers), terminal := 'yes')");
    assert!(result.is_err());
}
