use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::RecordBatch;
use hashbrown::HashMap;
use index_vec::index_vec;
use sluice_batch::Batch;
use sluice_physical::{Plan, Step, StepKind, TeeSettings};
use sluice_testing::{int64_batch, int64_schema};

use crate::{ExecutionOptions, PlanExecutor};

fn run_plan(
    plan: Plan,
    sources: HashMap<String, Vec<Batch>>,
    partitions: usize,
) -> Vec<RecordBatch> {
    sluice_testing::init_test_logging();

    let (output_tx, mut output_rx) = tokio::sync::mpsc::unbounded_channel();
    let options = ExecutionOptions { partitions };

    let executor =
        PlanExecutor::try_new("test".to_owned(), &plan, &sources, None, output_tx, &options)
            .unwrap();
    executor.execute().unwrap();

    let mut batches = Vec::new();
    while let Ok(batch) = output_rx.try_recv() {
        batches.push(batch);
    }
    batches
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
fn test_scan_project() {
    let table_schema = int64_schema(&["a", "b"]);
    let plan = Plan {
        steps: index_vec![
            Step {
                id: 0.into(),
                kind: StepKind::Scan {
                    table_name: "numbers".to_owned(),
                },
                inputs: vec![],
                schema: table_schema,
            },
            Step {
                id: 1.into(),
                kind: StepKind::Project {
                    columns: vec!["b".to_owned()],
                },
                inputs: vec![0.into()],
                schema: int64_schema(&["b"]),
            },
        ],
    };

    let mut sources = HashMap::new();
    sources.insert(
        "numbers".to_owned(),
        vec![
            Batch::new(int64_batch(&[("a", vec![1, 2]), ("b", vec![10, 20])])),
            Batch::new(int64_batch(&[("a", vec![3]), ("b", vec![30])])),
        ],
    );

    let batches = run_plan(plan, sources, 2);
    let mut rows = collect_i64(&batches, 0);
    rows.sort_unstable();
    assert_eq!(rows, vec![10, 20, 30]);
}

#[test]
fn test_scan_tee_passthrough() {
    let schema = int64_schema(&["a"]);
    let plan = Plan {
        steps: index_vec![
            Step {
                id: 0.into(),
                kind: StepKind::Scan {
                    table_name: "numbers".to_owned(),
                },
                inputs: vec![],
                schema: schema.clone(),
            },
            Step {
                id: 1.into(),
                kind: StepKind::Tee {
                    settings: TeeSettings {
                        terminal: false,
                        ..TeeSettings::default()
                    },
                },
                inputs: vec![0.into()],
                schema,
            },
        ],
    };

    let mut sources = HashMap::new();
    sources.insert(
        "numbers".to_owned(),
        (0..16)
            .map(|start| Batch::new(int64_batch(&[("a", vec![start * 2, start * 2 + 1])])))
            .collect(),
    );

    let batches = run_plan(plan, sources, 4);
    let mut rows = collect_i64(&batches, 0);
    rows.sort_unstable();
    assert_eq!(rows, (0..32).collect::<Vec<_>>());
}

#[test]
fn test_unknown_table_fails_creation() {
    let plan = Plan {
        steps: index_vec![Step {
            id: 0.into(),
            kind: StepKind::Scan {
                table_name: "missing".to_owned(),
            },
            inputs: vec![],
            schema: int64_schema(&["a"]),
        }],
    };

    let (output_tx, _output_rx) = tokio::sync::mpsc::unbounded_channel();
    let result = PlanExecutor::try_new(
        "test".to_owned(),
        &plan,
        &HashMap::new(),
        None,
        output_tx,
        &ExecutionOptions::default(),
    );
    assert!(result.is_err());
}
