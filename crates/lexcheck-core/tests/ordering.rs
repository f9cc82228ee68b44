use lexcheck_core::{BatchOrchestrator, LexcheckConfig};
use lexcheck_store::RetryPolicy;
use lexcheck_test_utils::{memory_reporter, row_with_id, write_dataset, FakeContentStore, FakeIndexStore};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn ids() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set((0u32..5000, 0u32..100_000), 1..24)
        .prop_map(|set: BTreeSet<(u32, u32)>| {
            set.into_iter()
                .map(|(whole, frac)| format!("{whole}.{frac:05}"))
                .collect::<Vec<_>>()
        })
        .prop_shuffle()
}

/// Run one dataset and return the Id column of the committed output
fn output_ids(ids: &[String], workers: usize) -> Vec<String> {
    let dir = TempDir::new().unwrap();
    let rows: Vec<[String; 5]> = ids.iter().map(|id| row_with_id(id)).collect();
    write_dataset(dir.path(), "leyes.csv", &rows);

    let index = ids
        .iter()
        .fold(FakeIndexStore::new(), |store, id| store.with_item(id))
        .with_delay(Duration::from_millis(1));
    let content = ids.iter().fold(FakeContentStore::new(), |store, id| store.with_id(id));
    let (reporter, _, _) = memory_reporter();
    let config = LexcheckConfig::new().with_workers(workers).with_retry(RetryPolicy::none());
    let orchestrator =
        BatchOrchestrator::new(config, Arc::new(index), Arc::new(content), reporter).unwrap();

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let summary = runtime.block_on(orchestrator.run_dir(dir.path())).unwrap();
    assert!(summary.is_consistent());

    let mut reader = csv::Reader::from_path(&summary.outputs[0]).unwrap();
    reader
        .records()
        .map(|r| r.unwrap().get(0).unwrap().to_string())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn output_keeps_input_order(ids in ids(), workers in 1usize..8) {
        prop_assert_eq!(output_ids(&ids, workers), ids);
    }
}
