//! End-to-end pipeline tests with fixture providers and temp storage.
//!
//! Scenarios:
//! 1. AAPL 200 / NFLX 404 through all four stages
//! 2. Reloading the same parsed artifact appends duplicate rows
//! 3. Payload without the time-series key → empty parsed artifact, load skip
//! 4. Malformed payload shape → parse skip, other symbols continue
//! 5. Missing per-symbol table fails the unify stage
//! 6. `fail_on_missing_artifact` makes a skipped upstream symbol fatal
//! 7. Transport and secret failures abort the run

use std::collections::HashMap;
use std::path::Path;

use serde_json::{json, Value};
use stockpipe_core::provider::{DailySeriesSource, HttpReply, ProviderError};
use stockpipe_core::secrets::StaticSecrets;
use stockpipe_core::storage::{LocalObjectStore, ObjectStore};
use stockpipe_core::transform::ParsedRecord;
use stockpipe_core::warehouse::{ParquetWarehouse, Warehouse, WarehouseError};
use stockpipe_core::PipelineConfig;
use stockpipe_runner::{
    Pipeline, PipelineState, RunHistory, RunRecord, SkipReason, Stage, StageError, SymbolOutcome,
};

const BUCKET: &str = "fixture-bucket";

// ── Fixtures ─────────────────────────────────────────────────────────

/// Replies per symbol; a symbol without a reply is a transport failure.
struct FixtureSource {
    replies: HashMap<String, HttpReply>,
}

impl FixtureSource {
    fn new(replies: &[(&str, HttpReply)]) -> Self {
        Self {
            replies: replies
                .iter()
                .map(|(s, r)| (s.to_string(), r.clone()))
                .collect(),
        }
    }
}

impl DailySeriesSource for FixtureSource {
    fn name(&self) -> &str {
        "fixture"
    }

    fn fetch_daily(&self, symbol: &str, api_key: &str) -> Result<HttpReply, ProviderError> {
        assert_eq!(api_key, "test-key");
        self.replies
            .get(symbol)
            .cloned()
            .ok_or_else(|| ProviderError::Transport {
                provider: "fixture".into(),
                detail: format!("connection reset fetching {symbol}"),
            })
    }
}

fn aapl_two_days() -> Value {
    json!({
        "Meta Data": { "2. Symbol": "AAPL" },
        "Time Series (Daily)": {
            "2024-01-03": {
                "1. open": "184.22", "2. high": "185.88", "3. low": "183.43",
                "4. close": "184.25", "5. volume": "58414460"
            },
            "2024-01-02": {
                "1. open": "187.15", "2. high": "188.44", "3. low": "183.885",
                "4. close": "185.64", "5. volume": "82488674"
            }
        }
    })
}

fn nflx_one_day() -> Value {
    json!({
        "Time Series (Daily)": {
            "2024-01-02": {
                "1. open": "483.00", "2. high": "487.50", "3. low": "468.50",
                "4. close": "468.50", "5. volume": "4532800"
            }
        }
    })
}

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        symbols: vec!["AAPL".into(), "NFLX".into()],
        bucket: BUCKET.into(),
        project: "fixture-project".into(),
        dataset: "fixture_ds".into(),
        storage_root: root.join("staging"),
        warehouse_root: root.join("warehouse"),
        history_path: root.join("runs.jsonl"),
        ..PipelineConfig::default()
    }
}

fn secrets() -> StaticSecrets {
    StaticSecrets::new().with("alphavantage-api-key", "test-key")
}

fn parsed(store: &LocalObjectStore, symbol: &str) -> Vec<ParsedRecord> {
    let bytes = store
        .get(BUCKET, &PipelineConfig::parsed_key(symbol))
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Give NFLX a table from an earlier run.
fn seed_nflx_table(config: &PipelineConfig, store: &LocalObjectStore, warehouse: &ParquetWarehouse) {
    let source = FixtureSource::new(&[("NFLX", HttpReply::ok(nflx_one_day()))]);
    let seed_config = PipelineConfig {
        symbols: vec!["NFLX".into()],
        ..config.clone()
    };
    let secrets = secrets();
    let pipeline = Pipeline::new(&seed_config, &secrets, &source, store, warehouse);
    pipeline.extract().unwrap();
    pipeline.parse().unwrap();
    pipeline.load().unwrap();
}

// ── 1. AAPL 200 / NFLX 404 ───────────────────────────────────────────

#[test]
fn http_failure_skips_symbol_through_every_stage() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    seed_nflx_table(&config, &store, &warehouse);
    // Earlier run's NFLX artifacts would mask the 404; start staging clean.
    std::fs::remove_dir_all(&config.storage_root).unwrap();

    let source = FixtureSource::new(&[
        ("AAPL", HttpReply::ok(aapl_two_days())),
        ("NFLX", HttpReply::status(404)),
    ]);
    let secrets = secrets();
    let pipeline = Pipeline::new(&config, &secrets, &source, &store, &warehouse);

    // Extract: only AAPL staged, verbatim.
    let extract = pipeline.extract().unwrap();
    assert_eq!(
        extract.outcome("NFLX"),
        Some(&SymbolOutcome::Skipped(SkipReason::HttpStatus(404)))
    );
    let raw: Value =
        serde_json::from_slice(&store.get(BUCKET, "raw_AAPL_data.json").unwrap()).unwrap();
    assert_eq!(raw, aapl_two_days());
    assert!(!store.exists(BUCKET, "raw_NFLX_data.json").unwrap());

    // Parse: AAPL has two records with the canonical field mapping.
    let parse = pipeline.parse().unwrap();
    assert!(matches!(
        parse.outcome("AAPL"),
        Some(SymbolOutcome::Parsed { records: 2, .. })
    ));
    assert_eq!(
        parse.outcome("NFLX"),
        Some(&SymbolOutcome::Skipped(SkipReason::MissingArtifact(
            "raw_NFLX_data.json".into()
        )))
    );
    let records = parsed(&store, "AAPL");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.symbol == "AAPL"));
    assert_eq!(records[1].date, "2024-01-02");
    assert_eq!(records[1].low.as_deref(), Some("183.885"));
    assert!(!store.exists(BUCKET, "parsed_NFLX_data.json").unwrap());

    // Load: AAPL gains two rows, NFLX untouched.
    let load = pipeline.load().unwrap();
    match load.outcome("AAPL") {
        Some(SymbolOutcome::Loaded {
            rows,
            duplicates_dropped,
            ..
        }) => {
            assert_eq!(*rows, 2);
            assert_eq!(*duplicates_dropped, 0);
        }
        other => panic!("unexpected AAPL load outcome {other:?}"),
    }
    assert!(load.outcome("NFLX").unwrap().is_skipped());
    assert_eq!(warehouse.row_count(&config.symbol_table("AAPL")).unwrap(), 2);
    assert_eq!(warehouse.row_count(&config.symbol_table("NFLX")).unwrap(), 1);

    // Unify: NFLX's earlier row persists in the union.
    let unify = pipeline.unify().unwrap();
    assert_eq!(unify.unified_rows, Some(3));
}

#[test]
fn full_run_reaches_done_and_records_history() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let source = FixtureSource::new(&[
        ("AAPL", HttpReply::ok(aapl_two_days())),
        ("NFLX", HttpReply::ok(nflx_one_day())),
    ]);
    let secrets = secrets();
    let mut pipeline = Pipeline::new(&config, &secrets, &source, &store, &warehouse);
    assert_eq!(pipeline.state(), &PipelineState::Pending);

    let report = pipeline.run();

    assert!(report.succeeded());
    assert_eq!(pipeline.state(), &PipelineState::Done);
    let stages: Vec<Stage> = report.stages.iter().map(|s| s.stage).collect();
    assert_eq!(stages, Stage::ORDER.to_vec());
    assert_eq!(report.stage(Stage::Unify).unwrap().unified_rows, Some(3));

    let history = RunHistory::new(&config.history_path);
    history.append(&RunRecord::from_report(&report)).unwrap();
    let records = history.load_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].run_id, report.run_id);
    assert_eq!(records[0].failed_stage, None);
    assert_eq!(records[0].stage_summaries.len(), 4);
    assert_eq!(records[0].stage_summaries[0].ok, 2);
}

// ── 2. Reload appends duplicates ─────────────────────────────────────

#[test]
fn reloading_same_artifact_appends_duplicate_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        symbols: vec!["AAPL".into()],
        ..config(dir.path())
    };
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let source = FixtureSource::new(&[("AAPL", HttpReply::ok(aapl_two_days()))]);
    let secrets = secrets();
    let pipeline = Pipeline::new(&config, &secrets, &source, &store, &warehouse);

    pipeline.extract().unwrap();
    pipeline.parse().unwrap();
    pipeline.load().unwrap();
    pipeline.load().unwrap();

    let table = warehouse.read_table(&config.symbol_table("AAPL")).unwrap();
    assert_eq!(table.height(), 4);
    let dates = table.column("date").unwrap().str().unwrap();
    let jan_2 = dates.into_iter().filter(|d| *d == Some("2024-01-02")).count();
    assert_eq!(jan_2, 2);
}

#[test]
fn duplicate_dates_in_artifact_keep_first() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        symbols: vec!["AAPL".into()],
        ..config(dir.path())
    };
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let record = |open: &str| ParsedRecord {
        symbol: "AAPL".into(),
        date: "2024-01-02".into(),
        open: Some(open.into()),
        high: Some("1".into()),
        low: Some("1".into()),
        close: Some("1".into()),
        volume: Some("not-a-number".into()),
    };
    let artifact = serde_json::to_vec(&vec![record("10.5"), record("99.0")]).unwrap();
    store.put(BUCKET, "parsed_AAPL_data.json", &artifact).unwrap();

    let source = FixtureSource::new(&[]);
    let secrets = secrets();
    let report = Pipeline::new(&config, &secrets, &source, &store, &warehouse)
        .load()
        .unwrap();

    assert!(matches!(
        report.outcome("AAPL"),
        Some(SymbolOutcome::Loaded {
            rows: 1,
            duplicates_dropped: 1,
            ..
        })
    ));
    let table = warehouse.read_table(&config.symbol_table("AAPL")).unwrap();
    assert_eq!(table.column("open").unwrap().f64().unwrap().get(0), Some(10.5));
    assert_eq!(table.column("volume").unwrap().i64().unwrap().get(0), None);
}

// ── 3. Missing time-series key ───────────────────────────────────────

#[test]
fn payload_without_series_yields_empty_artifact_and_load_skip() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let source = FixtureSource::new(&[
        ("AAPL", HttpReply::ok(aapl_two_days())),
        ("NFLX", HttpReply::ok(json!({ "Note": "call frequency exceeded" }))),
    ]);
    let secrets = secrets();
    let pipeline = Pipeline::new(&config, &secrets, &source, &store, &warehouse);

    pipeline.extract().unwrap();
    let parse = pipeline.parse().unwrap();
    assert!(matches!(
        parse.outcome("NFLX"),
        Some(SymbolOutcome::Parsed { records: 0, .. })
    ));
    assert!(parsed(&store, "NFLX").is_empty());

    let load = pipeline.load().unwrap();
    assert_eq!(
        load.outcome("NFLX"),
        Some(&SymbolOutcome::Skipped(SkipReason::EmptyBatch))
    );
    assert!(!warehouse.table_exists(&config.symbol_table("NFLX")));
}

// ── 4. Malformed shape ───────────────────────────────────────────────

#[test]
fn malformed_payload_is_skipped_and_others_continue() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let source = FixtureSource::new(&[
        (
            "AAPL",
            HttpReply::ok(json!({ "Time Series (Daily)": { "2024-01-02": "oops" } })),
        ),
        ("NFLX", HttpReply::ok(nflx_one_day())),
    ]);
    let secrets = secrets();
    let pipeline = Pipeline::new(&config, &secrets, &source, &store, &warehouse);

    pipeline.extract().unwrap();
    let parse = pipeline.parse().unwrap();

    assert!(matches!(
        parse.outcome("AAPL"),
        Some(SymbolOutcome::Skipped(SkipReason::Malformed(_)))
    ));
    assert!(!store.exists(BUCKET, "parsed_AAPL_data.json").unwrap());
    assert_eq!(parsed(&store, "NFLX").len(), 1);
    assert_eq!(parse.succeeded(), 1);
}

// ── 5. Unify needs every table ───────────────────────────────────────

#[test]
fn missing_symbol_table_fails_run_at_unify() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let source = FixtureSource::new(&[
        ("AAPL", HttpReply::ok(aapl_two_days())),
        ("NFLX", HttpReply::status(404)),
    ]);
    let secrets = secrets();
    let mut pipeline = Pipeline::new(&config, &secrets, &source, &store, &warehouse);

    let report = pipeline.run();

    assert!(!report.succeeded());
    assert!(matches!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::Unify,
            ..
        }
    ));
    assert_eq!(report.stages.len(), 3);
    let err = report.into_result().unwrap_err();
    assert_eq!(err.stage, Stage::Unify);
    assert!(matches!(
        err.source,
        StageError::Warehouse(WarehouseError::TableNotFound(_))
    ));
    assert!(!warehouse.table_exists(&config.unified_table_ref()));
}

// ── 6. Strict missing-artifact policy ────────────────────────────────

#[test]
fn strict_policy_fails_parse_on_missing_raw_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let config = PipelineConfig {
        fail_on_missing_artifact: true,
        ..config(dir.path())
    };
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let source = FixtureSource::new(&[
        ("AAPL", HttpReply::ok(aapl_two_days())),
        ("NFLX", HttpReply::status(500)),
    ]);
    let secrets = secrets();
    let mut pipeline = Pipeline::new(&config, &secrets, &source, &store, &warehouse);

    let report = pipeline.run();

    assert_eq!(report.stages.len(), 1);
    let err = report.into_result().unwrap_err();
    assert_eq!(err.stage, Stage::Parse);
    assert!(matches!(
        err.source,
        StageError::MissingArtifact { ref symbol, .. } if symbol == "NFLX"
    ));
    assert!(!warehouse.table_exists(&config.symbol_table("AAPL")));
}

// ── 7. Infrastructure failures ───────────────────────────────────────

#[test]
fn transport_failure_aborts_extract() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    // NFLX has no reply: the fixture reports a transport error.
    let source = FixtureSource::new(&[("AAPL", HttpReply::ok(aapl_two_days()))]);
    let secrets = secrets();
    let mut pipeline = Pipeline::new(&config, &secrets, &source, &store, &warehouse);

    let report = pipeline.run();

    assert!(report.stages.is_empty());
    assert!(matches!(
        pipeline.state(),
        PipelineState::Failed {
            stage: Stage::Extract,
            ..
        }
    ));
    let record = RunRecord::from_report(&report);
    assert_eq!(record.failed_stage, Some(Stage::Extract));
    assert!(record.error.unwrap().contains("NFLX"));
    // Symbols before the failure were still staged.
    assert!(store.exists(BUCKET, "raw_AAPL_data.json").unwrap());
}

#[test]
fn missing_api_key_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path());
    let store = LocalObjectStore::new(&config.storage_root);
    let warehouse = ParquetWarehouse::new(&config.warehouse_root);
    let source = FixtureSource::new(&[]);
    let secrets = StaticSecrets::new();

    let err = Pipeline::new(&config, &secrets, &source, &store, &warehouse)
        .extract()
        .unwrap_err();

    assert!(matches!(err, StageError::Secret(_)));
}
