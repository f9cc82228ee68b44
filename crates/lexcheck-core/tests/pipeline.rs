use lexcheck_core::{BatchOrchestrator, CancelToken, LexcheckConfig, RunSummary, OUTPUT_COLUMNS};
use lexcheck_record::{Field, FieldPolicy, IdPolicy, REQUIRED_COLUMNS};
use lexcheck_report::{
    DiscrepancyReporter, EntryKind, JsonlSink, MemoryProgress, MemorySink, ProgressKind, ReportEntry,
};
use lexcheck_store::{DirectoryContentStore, JsonIndexStore, RetryPolicy, StoreFault};
use lexcheck_test_utils::{
    content_key, memory_reporter, row_with_id, write_dataset, write_dataset_with_header,
    FakeContentStore, FakeIndexStore, SAMPLE_ROW,
};
use pretty_assertions::assert_eq;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    orchestrator: BatchOrchestrator,
    index: Arc<FakeIndexStore>,
    content: Arc<FakeContentStore>,
    sink: Arc<MemorySink>,
    progress: Arc<MemoryProgress>,
}

fn fast_config() -> LexcheckConfig {
    LexcheckConfig::new().with_retry(RetryPolicy {
        max_attempts: 3,
        base_backoff_ms: 1,
        max_backoff_ms: 5,
    })
}

fn harness(config: LexcheckConfig, index: FakeIndexStore, content: FakeContentStore) -> Harness {
    let index = Arc::new(index);
    let content = Arc::new(content);
    let (reporter, sink, progress) = memory_reporter();
    let orchestrator =
        BatchOrchestrator::new(config, index.clone(), content.clone(), reporter).unwrap();
    Harness {
        orchestrator,
        index,
        content,
        sink,
        progress,
    }
}

fn read_output(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader.headers().unwrap().iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}

fn kinds(entries: &[ReportEntry]) -> Vec<EntryKind> {
    entries.iter().map(|e| e.kind).collect()
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn sample_row_is_canonicalized_verified_and_written() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), "leyes.csv", &[SAMPLE_ROW]);
    let h = harness(
        fast_config(),
        FakeIndexStore::new().with_item("7.00023"),
        FakeContentStore::new().with_id("7.00023"),
    );

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    assert!(summary.is_consistent());
    assert_eq!(summary.outputs, vec![dir.path().join("leyes_corrected.csv")]);
    assert_eq!(h.index.calls(), vec!["7.00023"]);
    assert_eq!(h.content.calls(), vec!["txt/7.00023.txt"]);

    let (header, rows) = read_output(&summary.outputs[0]);
    assert_eq!(header, OUTPUT_COLUMNS);
    assert_eq!(
        rows,
        vec![vec![
            "7.00023",
            "7.00023.txt",
            "Federal",
            "2019-03-15",
            "https://leyes.gob.mx/x",
            "LEY GENERAL",
        ]]
    );

    assert!(h.sink.entries().is_empty());
    assert_eq!(h.progress.count(ProgressKind::Corrected), 1);
    assert_eq!(h.progress.count(ProgressKind::Ok), 1);

    let counts = &summary.datasets[0];
    assert_eq!((counts.rows, counts.validated, counts.corrected), (1, 1, 1));
}

#[tokio::test]
async fn malformed_id_is_rejected_without_probes() {
    let dir = TempDir::new().unwrap();
    let mut bad = SAMPLE_ROW;
    bad[4] = "abc";
    write_dataset(dir.path(), "leyes.csv", &[bad, SAMPLE_ROW]);
    let h = harness(
        fast_config(),
        FakeIndexStore::new().with_item("7.00023"),
        FakeContentStore::new().with_id("7.00023"),
    );

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    let entries = h.sink.entries();
    assert_eq!(kinds(&entries), vec![EntryKind::ValidationFailure]);
    assert_eq!(entries[0].field, Some(Field::Id));
    assert_eq!(entries[0].row_index, Some(1));
    assert_eq!(h.index.calls(), vec!["7.00023"]);
    assert_eq!(h.content.calls().len(), 1);

    let (_, rows) = read_output(&summary.outputs[0]);
    assert_eq!(rows.len(), 1);
    assert_eq!(summary.datasets[0].rejected, 1);
    assert!(!summary.is_consistent());
}

#[tokio::test]
async fn access_denied_is_never_reported_as_missing() {
    let dir = TempDir::new().unwrap();
    write_dataset(
        dir.path(),
        "leyes.csv",
        &[row_with_id("1.00000"), row_with_id("2.00000"), row_with_id("3.00000")],
    );
    let h = harness(
        fast_config(),
        FakeIndexStore::new().with_item("1.00000").with_item("2.00000"),
        FakeContentStore::new()
            .with_persistent_fault(&content_key("2.00000"), StoreFault::access_denied("403 Forbidden"))
            .with_id("3.00000"),
    );

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    let mut entries = h.sink.entries();
    entries.sort_by_key(|e| e.row_index);
    assert_eq!(
        kinds(&entries),
        vec![
            EntryKind::MissingInContent,
            EntryKind::AccessError,
            EntryKind::MissingInIndex,
        ]
    );
    assert_eq!(
        h.content.calls().iter().filter(|k| **k == content_key("2.00000")).count(),
        1,
        "access denied must not be retried"
    );

    let counts = &summary.datasets[0];
    assert_eq!((counts.missing, counts.errored), (2, 1));
    let (_, rows) = read_output(&summary.outputs[0]);
    assert_eq!(rows.len(), 3, "discrepancies do not block writing");
}

#[tokio::test]
async fn transient_faults_are_retried_within_the_record() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), "leyes.csv", &[row_with_id("4.00000")]);
    let h = harness(
        fast_config(),
        FakeIndexStore::new()
            .with_item("4.00000")
            .with_fault("4.00000", StoreFault::transient("throttled")),
        FakeContentStore::new()
            .with_id("4.00000")
            .with_fault(&content_key("4.00000"), StoreFault::transient("503"))
            .with_fault(&content_key("4.00000"), StoreFault::transient("503")),
    );

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    assert!(summary.is_consistent());
    assert_eq!(h.index.calls().len(), 2);
    assert_eq!(h.content.calls().len(), 3);
}

#[tokio::test]
async fn exhausted_transient_faults_are_store_faults() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), "leyes.csv", &[row_with_id("5.00000")]);
    let h = harness(
        fast_config(),
        FakeIndexStore::new().with_item("5.00000"),
        FakeContentStore::new()
            .with_persistent_fault(&content_key("5.00000"), StoreFault::transient("timeout")),
    );

    h.orchestrator.run_dir(dir.path()).await.unwrap();

    assert_eq!(kinds(&h.sink.entries()), vec![EntryKind::StoreFault]);
    assert_eq!(h.content.calls().len(), 3);
}

#[tokio::test]
async fn missing_columns_fail_only_that_dataset() {
    let dir = TempDir::new().unwrap();
    write_dataset_with_header(
        dir.path(),
        "a.csv",
        &["jurisdiction", "source", "last_reform_date", "title"],
        &[["Federal", "https://x.mx/a", "01/01/2000", "ley"]],
    );
    write_dataset(dir.path(), "b.csv", &[SAMPLE_ROW]);
    let h = harness(
        fast_config(),
        FakeIndexStore::new().with_item("7.00023"),
        FakeContentStore::new().with_id("7.00023"),
    );

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    assert_eq!(summary.failed_datasets, 1);
    assert_eq!(summary.outputs, vec![dir.path().join("b_corrected.csv")]);
    assert!(summary.datasets[0].failed);
    assert!(summary.datasets[1].is_consistent());

    let entries = h.sink.entries();
    assert_eq!(kinds(&entries), vec![EntryKind::DatasetError]);
    assert_eq!(entries[0].dataset, "a.csv");
    assert_eq!(entries[0].row_index, None);
    assert!(entries[0].message.contains("Id"));
}

#[tokio::test]
async fn output_order_matches_input_under_concurrency() {
    let dir = TempDir::new().unwrap();
    let ids: Vec<String> = (1..=40).rev().map(|i| format!("{i}.00000")).collect();
    let rows: Vec<[String; 5]> = ids.iter().map(|id| row_with_id(id)).collect();
    write_dataset(dir.path(), "leyes.csv", &rows);

    let mut content = FakeContentStore::new().with_delay(Duration::from_millis(2));
    let mut index = FakeIndexStore::new();
    for id in &ids {
        content = content.with_id(id);
        index = index.with_item(id);
    }
    let h = harness(fast_config().with_workers(8), index, content);

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    let (_, out) = read_output(&summary.outputs[0]);
    let written: Vec<String> = out.into_iter().map(|r| r[0].clone()).collect();
    assert_eq!(written, ids);
    assert_eq!(summary.datasets[0].consistent, 40);
}

#[tokio::test]
async fn duplicate_ids_warn_but_are_written() {
    let dir = TempDir::new().unwrap();
    write_dataset(
        dir.path(),
        "leyes.csv",
        &[row_with_id("6.00000"), row_with_id("6.0")],
    );
    let h = harness(
        fast_config(),
        FakeIndexStore::new().with_item("6.00000"),
        FakeContentStore::new().with_id("6.00000"),
    );

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    let entries = h.sink.entries();
    assert_eq!(kinds(&entries), vec![EntryKind::DuplicateId]);
    assert_eq!(entries[0].row_index, Some(2));
    assert!(summary.is_consistent());
    assert_eq!(read_output(&summary.outputs[0]).1.len(), 2);
}

#[tokio::test]
async fn strict_ids_reject_what_permissive_rewrites() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), "leyes.csv", &[row_with_id("7.1")]);

    let permissive = harness(
        fast_config(),
        FakeIndexStore::new().with_item("7.10000"),
        FakeContentStore::new().with_id("7.10000"),
    );
    let summary = permissive.orchestrator.run_dir(dir.path()).await.unwrap();
    assert_eq!(read_output(&summary.outputs[0]).1[0][0], "7.10000");
    assert_eq!(permissive.progress.count(ProgressKind::Corrected), 2);

    let strict = harness(
        fast_config().with_id_policy(IdPolicy::Strict),
        FakeIndexStore::new(),
        FakeContentStore::new(),
    );
    let summary = strict.orchestrator.run_dir(dir.path()).await.unwrap();
    assert_eq!(summary.datasets[0].rejected, 1);
    assert!(strict.index.calls().is_empty());
    assert!(read_output(&summary.outputs[0]).1.is_empty());
}

#[tokio::test]
async fn retain_policy_keeps_row_with_original_value() {
    let dir = TempDir::new().unwrap();
    let mut row = SAMPLE_ROW;
    row[2] = "2019-03-15";
    write_dataset(dir.path(), "leyes.csv", &[row]);
    let h = harness(
        fast_config().with_field_policy(FieldPolicy::Retain),
        FakeIndexStore::new().with_item("7.00023"),
        FakeContentStore::new().with_id("7.00023"),
    );

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    let entries = h.sink.entries();
    assert_eq!(kinds(&entries), vec![EntryKind::ValidationFailure]);
    assert_eq!(entries[0].field, Some(Field::LastReformDate));
    let (_, rows) = read_output(&summary.outputs[0]);
    assert_eq!(rows[0][3], "2019-03-15");
    assert_eq!(summary.datasets[0].rejected, 0);
}

#[tokio::test]
async fn cancellation_keeps_completed_output_and_drops_partial() {
    let dir = TempDir::new().unwrap();
    write_dataset(dir.path(), "a.csv", &[row_with_id("1.00000")]);
    let b_rows: Vec<[String; 5]> = (100..120).map(|i| row_with_id(&format!("{i}.00000"))).collect();
    write_dataset(dir.path(), "b.csv", &b_rows);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    let h = harness(
        fast_config().with_workers(1),
        FakeIndexStore::new().with_item("1.00000"),
        FakeContentStore::new()
            .with_id("1.00000")
            .with_hook(move |key| {
                if key == "txt/100.00000.txt" {
                    trigger.cancel();
                }
            }),
    );
    let orchestrator = h.orchestrator.with_cancel(cancel);

    let summary: RunSummary = orchestrator.run_dir(dir.path()).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.outputs, vec![dir.path().join("a_corrected.csv")]);
    assert_eq!(file_names(dir.path()), vec!["a.csv", "a_corrected.csv", "b.csv"]);
    assert!(
        h.content.calls().len() < 1 + b_rows.len(),
        "no new probes after cancellation"
    );
    assert_eq!(read_output(&dir.path().join("a_corrected.csv")).1.len(), 1);
}

#[tokio::test]
async fn local_stores_and_jsonl_report() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    let content_root = dir.path().join("content");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(content_root.join("txt")).unwrap();
    std::fs::write(content_root.join("txt/7.00023.txt"), "texto").unwrap();
    let index_path = dir.path().join("index.json");
    std::fs::write(&index_path, r#"{"7.00023": {"name": "LEY GENERAL"}}"#).unwrap();

    write_dataset(&input, "leyes.csv", &[SAMPLE_ROW]);
    let mut missing = SAMPLE_ROW;
    missing[4] = "8.00000";
    write_dataset(&input, "otras.csv", &[missing]);

    let report_path: PathBuf = dir.path().join("report.jsonl");
    let reporter = Arc::new(DiscrepancyReporter::new(
        Arc::new(JsonlSink::create(&report_path).unwrap()),
        Arc::new(MemoryProgress::new()),
    ));
    let orchestrator = BatchOrchestrator::new(
        fast_config(),
        Arc::new(JsonIndexStore::load(&index_path).await.unwrap()),
        Arc::new(DirectoryContentStore::new(&content_root)),
        reporter,
    )
    .unwrap();

    let summary = orchestrator.run_dir(&input).await.unwrap();

    assert!(summary.datasets[0].is_consistent());
    assert!(!summary.datasets[1].is_consistent());
    let lines: Vec<ReportEntry> = std::fs::read_to_string(&report_path)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(kinds(&lines), vec![EntryKind::MissingInIndex]);
    assert_eq!(lines[0].dataset, "otras.csv");
    assert_eq!(REQUIRED_COLUMNS.len() + 1, OUTPUT_COLUMNS.len());
}

#[tokio::test]
async fn short_row_is_rejected_and_the_rest_written() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("leyes.csv"),
        "jurisdiction,source,last_reform_date,title,Id\n\
         Federal,https://leyes.gob.mx/x,15/03/2019,ley uno,1.00000\n\
         Federal,https://leyes.gob.mx/y,15/03/2019\n\
         Federal,https://leyes.gob.mx/z,15/03/2019,ley tres,3.00000\n",
    )
    .unwrap();
    let h = harness(
        fast_config(),
        FakeIndexStore::new().with_item("1.00000").with_item("3.00000"),
        FakeContentStore::new().with_id("1.00000").with_id("3.00000"),
    );

    let summary = h.orchestrator.run_dir(dir.path()).await.unwrap();

    assert_eq!(summary.failed_datasets, 0);
    assert_eq!(summary.datasets[0].rejected, 1);
    let entries = h.sink.entries();
    assert!(!entries.is_empty());
    assert!(entries
        .iter()
        .all(|e| e.kind == EntryKind::ValidationFailure && e.row_index == Some(2)));
    assert!(entries.iter().any(|e| e.field == Some(Field::Id)));

    let (_, rows) = read_output(&summary.outputs[0]);
    let ids: Vec<&str> = rows.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(ids, vec!["1.00000", "3.00000"]);
}

#[tokio::test]
async fn report_is_durable_once_a_dataset_finishes() {
    use std::sync::atomic::{AtomicU64, Ordering};

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input");
    std::fs::create_dir_all(&input).unwrap();
    write_dataset(&input, "a.csv", &[row_with_id("1.00000")]);
    write_dataset(&input, "b.csv", &[row_with_id("2.00000")]);

    let report_path = dir.path().join("report.jsonl");
    let seen = Arc::new(AtomicU64::new(u64::MAX));
    let content = FakeContentStore::new()
        .with_id("1.00000")
        .with_id("2.00000")
        .with_hook({
            let seen = seen.clone();
            let report_path = report_path.clone();
            move |key| {
                if key == content_key("2.00000") {
                    let len = std::fs::metadata(&report_path).map_or(0, |m| m.len());
                    seen.store(len, Ordering::SeqCst);
                }
            }
        });
    let reporter = Arc::new(DiscrepancyReporter::new(
        Arc::new(JsonlSink::create(&report_path).unwrap()),
        Arc::new(MemoryProgress::new()),
    ));
    let orchestrator = BatchOrchestrator::new(
        fast_config(),
        Arc::new(FakeIndexStore::new().with_item("2.00000")),
        Arc::new(content),
        reporter,
    )
    .unwrap();

    orchestrator.run_dir(&input).await.unwrap();

    let during_b = seen.load(Ordering::SeqCst);
    assert_ne!(during_b, u64::MAX, "b.csv was probed");
    assert!(during_b > 0, "a.csv entries on disk before b.csv finished");
    let first: ReportEntry = serde_json::from_str(
        std::fs::read_to_string(&report_path).unwrap().lines().next().unwrap(),
    )
    .unwrap();
    assert_eq!(first.kind, EntryKind::MissingInIndex);
    assert_eq!(first.dataset, "a.csv");
}
