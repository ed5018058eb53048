use chrono::NaiveDate;
use flow_sync::config::{DestinationConfig, SourceConfig, SyncInfo};
use flow_sync::domain::model::{JobStatus, SyncWarning};
use flow_sync::{
    FileSheetSource, JobSpec, LocalTableStore, MergeMode, RunOptions, SyncConfig, SyncEngine, SyncError,
};
use std::path::Path;
use tempfile::TempDir;

const SOURCE_CSV: &str = "Ticker,Name, (M USD)\nSPY US,SPDR S&P 500,-100.5\nIVV US,iShares Core S&P 500,20\nMedian,,5\n";
const SP500_HEADER: &str = "Date,SPY ,IVV ,SPxVWAP\n";
const SP500_HISTORY: &str = "2025-11-13,-5,1.25,448.10\n2025-11-14,12,-3,449.00\n";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 17).unwrap()
}

fn write(dir: &Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

fn read(dir: &Path, name: &str) -> String {
    std::fs::read_to_string(dir.join(name)).unwrap()
}

fn sp500_job() -> JobSpec {
    JobSpec::complex("S&P 500 ETF.csv", None, [("IVV ", "IVV US"), ("SPY ", "SPY US")])
}

fn config_for(dir: &Path, jobs: Vec<JobSpec>) -> SyncConfig {
    SyncConfig {
        sync: SyncInfo::default(),
        source: SourceConfig::new(dir.join("ETF1.csv")),
        destination: DestinationConfig {
            root: Some(dir.to_path_buf()),
            ..DestinationConfig::default()
        },
        jobs,
    }
}

fn engine(dir: &Path, jobs: Vec<JobSpec>) -> SyncEngine<FileSheetSource, LocalTableStore> {
    SyncEngine::new(
        FileSheetSource::new(),
        LocalTableStore::new(),
        config_for(dir, jobs),
        RunOptions::for_date(today()),
    )
}

#[test]
fn test_appends_today_with_no_value_markers() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "ETF1.csv", SOURCE_CSV);
    write(dir, "S&P 500 ETF.csv", &format!("{}{}", SP500_HEADER, SP500_HISTORY));

    let summary = engine(dir, vec![sp500_job()]).run().unwrap();

    assert!(summary.all_succeeded());
    assert_eq!(summary.lookup_size, 2);
    match &summary.outcomes[0].status {
        JobStatus::Succeeded(merge) => {
            assert_eq!(merge.mode, MergeMode::Appended);
            assert_eq!(merge.columns_changed, 2);
            assert_eq!(merge.date, today());
        }
        other => panic!("job failed: {:?}", other),
    }

    assert_eq!(
        read(dir, "S&P 500 ETF.csv"),
        format!("{}{}2025-11-17,-100.5,20,\n", SP500_HEADER, SP500_HISTORY)
    );
}

#[test]
fn test_updates_today_and_keeps_unmanaged_columns() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "ETF1.csv", SOURCE_CSV);
    write(
        dir,
        "S&P 500 ETF.csv",
        &format!("{}{}2025-11-17,1,2,450.2\n", SP500_HEADER, SP500_HISTORY),
    );

    let summary = engine(dir, vec![sp500_job()]).run().unwrap();

    match &summary.outcomes[0].status {
        JobStatus::Succeeded(merge) => assert_eq!(merge.mode, MergeMode::Updated),
        other => panic!("job failed: {:?}", other),
    }
    assert_eq!(
        read(dir, "S&P 500 ETF.csv"),
        format!("{}{}2025-11-17,-100.5,20,450.2\n", SP500_HEADER, SP500_HISTORY)
    );
}

#[test]
fn test_rerun_same_day_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "ETF1.csv", SOURCE_CSV);
    write(dir, "S&P 500 ETF.csv", &format!("{}{}", SP500_HEADER, SP500_HISTORY));

    engine(dir, vec![sp500_job()]).run().unwrap();
    let first = read(dir, "S&P 500 ETF.csv");

    let summary = engine(dir, vec![sp500_job()]).run().unwrap();
    match &summary.outcomes[0].status {
        JobStatus::Succeeded(merge) => assert_eq!(merge.mode, MergeMode::Updated),
        other => panic!("job failed: {:?}", other),
    }

    let second = read(dir, "S&P 500 ETF.csv");
    assert_eq!(first, second);
    assert_eq!(second.lines().filter(|l| l.starts_with("2025-11-17")).count(), 1);
    assert!(second.starts_with(&format!("{}{}", SP500_HEADER, SP500_HISTORY)));
}

#[test]
fn test_unresolved_ticker_writes_zero_and_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "ETF1.csv", SOURCE_CSV);
    write(dir, "S&P 500 ETF.csv", SP500_HEADER);

    let job = JobSpec::complex("S&P 500 ETF.csv", None, [("SPY ", "ZZZ US"), ("IVV ", "IVV US")]);
    let summary = engine(dir, vec![job]).run().unwrap();

    assert!(summary.all_succeeded());
    match &summary.outcomes[0].status {
        JobStatus::Succeeded(merge) => {
            assert_eq!(merge.unresolved, vec!["ZZZ US".to_string()]);
            assert!(merge
                .warnings
                .iter()
                .any(|w| matches!(w, SyncWarning::UnresolvedIdentifier { identifier, .. } if identifier == "ZZZ US")));
        }
        other => panic!("job failed: {:?}", other),
    }
    assert_eq!(read(dir, "S&P 500 ETF.csv"), format!("{}2025-11-17,0,20,\n", SP500_HEADER));
}

#[test]
fn test_job_failures_are_isolated() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "ETF1.csv", SOURCE_CSV);
    write(dir, "S&P 500 ETF.csv", SP500_HEADER);
    write(dir, "Broken.csv", "Day,Flow\n");

    let jobs = vec![
        JobSpec::simple("Missing.csv", None, "SPY US", "Flow"),
        JobSpec::simple("Broken.csv", None, "SPY US", "Flow"),
        sp500_job(),
    ];
    let summary = engine(dir, jobs).run().unwrap();

    assert_eq!(summary.total, 3);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.succeeded, 1);
    assert!(matches!(&summary.outcomes[0].status, JobStatus::Failed { error, .. } if error.contains("Missing.csv")));
    assert!(matches!(&summary.outcomes[1].status, JobStatus::Failed { error, .. } if error.contains("Date")));
    assert!(summary.outcomes[2].is_success());
    // the broken destination was not rewritten
    assert_eq!(read(dir, "Broken.csv"), "Day,Flow\n");
}

#[test]
fn test_missing_source_aborts_run() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "S&P 500 ETF.csv", SP500_HEADER);

    let err = engine(dir, vec![sp500_job()]).run().unwrap_err();
    assert!(matches!(err, SyncError::SourceNotFound { .. }));
    assert_eq!(read(dir, "S&P 500 ETF.csv"), SP500_HEADER);
}

#[test]
fn test_simple_job_and_dry_run() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "ETF1.csv", SOURCE_CSV);
    write(dir, "SPY.csv", "Date,Flow,Note\n2025-11-14,3.5,carry\n");

    let mut options = RunOptions::for_date(today());
    options.dry_run = true;
    let dry = SyncEngine::new(
        FileSheetSource::new(),
        LocalTableStore::new(),
        config_for(dir, vec![JobSpec::simple("SPY.csv", None, "SPY US", "Flow")]),
        options,
    );
    assert!(dry.run().unwrap().all_succeeded());
    assert_eq!(read(dir, "SPY.csv"), "Date,Flow,Note\n2025-11-14,3.5,carry\n");

    engine(dir, vec![JobSpec::simple("SPY.csv", None, "SPY US", "Flow")])
        .run()
        .unwrap();
    assert_eq!(
        read(dir, "SPY.csv"),
        "Date,Flow,Note\n2025-11-14,3.5,carry\n2025-11-17,-100.5,\n"
    );
}

#[test]
fn test_crlf_history_survives_two_runs() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "ETF1.csv", SOURCE_CSV);
    write(dir, "SPY.csv", "Date,Flow,Note\r\n2025-11-14,3.5,carry\r\n");

    let job = || vec![JobSpec::simple("SPY.csv", None, "SPY US", "Flow")];
    assert!(engine(dir, job()).run().unwrap().all_succeeded());
    assert!(engine(dir, job()).run().unwrap().all_succeeded());

    assert_eq!(
        read(dir, "SPY.csv"),
        "Date,Flow,Note\r\n2025-11-14,3.5,carry\r\n2025-11-17,-100.5,\r\n"
    );
}

#[test]
fn test_quoted_history_survives_two_runs() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path();
    write(dir, "ETF1.csv", SOURCE_CSV);
    let history = "Date,Flow,Note\n\"2025-11-14\",\"3.5\",\"carry\"\n";
    write(dir, "SPY.csv", history);

    let job = || vec![JobSpec::simple("SPY.csv", None, "SPY US", "Flow")];
    engine(dir, job()).run().unwrap();
    engine(dir, job()).run().unwrap();

    assert_eq!(read(dir, "SPY.csv"), format!("{}2025-11-17,-100.5,\n", history));
}
