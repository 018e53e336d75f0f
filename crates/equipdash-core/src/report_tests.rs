use crate::client::ReportDocument;
use crate::report::{prune_old_reports, report_file_name, ReportArchive};
use chrono::{TimeZone, Utc};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

fn make_temp_dir(name: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let uniq = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("unix epoch")
        .as_nanos();
    path.push(format!("equipdash-tests-{name}-{uniq}"));
    fs::create_dir_all(&path).expect("create temp dir");
    path
}

fn at(y: i32, m: u32, d: u32) -> SystemTime {
    Utc.with_ymd_and_hms(y, m, d, 9, 30, 0)
        .single()
        .expect("valid date")
        .into()
}

#[test]
fn prune_removes_only_old_reports() {
    // Arrange
    let dir = make_temp_dir("old-vs-fresh");
    let old_report = dir.join("report-2026-01-01-120000-plant.csv.pdf");
    let fresh_report = dir.join("report-2026-02-14-080000-plant.csv.pdf");
    let unrelated = dir.join("notes.pdf");
    fs::write(&old_report, "old").expect("write old report");
    fs::write(&fresh_report, "fresh").expect("write fresh report");
    fs::write(&unrelated, "keep").expect("write unrelated");

    // Act
    prune_old_reports(&dir, 30, at(2026, 2, 15)).expect("prune");

    // Assert
    assert!(!old_report.exists(), "old report should be pruned");
    assert!(fresh_report.exists(), "fresh report should be kept");
    assert!(unrelated.exists(), "non-report file should never be pruned");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn prune_keeps_boundary_age_report() {
    // Arrange
    let dir = make_temp_dir("boundary");
    let boundary = dir.join("report-2026-01-16-000000-summary.pdf");
    fs::write(&boundary, "boundary").expect("write boundary report");

    // Act
    prune_old_reports(&dir, 30, at(2026, 2, 15)).expect("prune");

    // Assert
    assert!(
        boundary.exists(),
        "report exactly on retention boundary should be kept"
    );

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn file_name_is_sanitized_and_timestamped() {
    let ts = Utc
        .with_ymd_and_hms(2026, 2, 15, 7, 5, 9)
        .single()
        .expect("valid date");

    assert_eq!(
        report_file_name(ts, Some("Report_plant data.csv.pdf")),
        "report-2026-02-15-070509-Report_plant_data.csv.pdf"
    );
    assert_eq!(
        report_file_name(ts, None),
        "report-2026-02-15-070509-summary.pdf"
    );
}

#[test]
fn store_writes_document_and_prunes() {
    // Arrange
    let dir = make_temp_dir("store");
    let stale = dir.join("report-2025-01-01-000000-summary.pdf");
    fs::write(&stale, "stale").expect("write stale report");
    let archive = ReportArchive::new(dir.join("nested"), 30);
    fs::create_dir_all(archive.dir()).expect("create archive dir");
    let stale_inside = archive.dir().join("report-2025-01-01-000000-summary.pdf");
    fs::write(&stale_inside, "stale").expect("write stale archived report");
    let document = ReportDocument {
        suggested_name: Some("Report_plant.csv.pdf".to_string()),
        bytes: b"%PDF-1.4".to_vec(),
    };

    // Act
    let path = archive.store(&document, at(2026, 2, 15)).expect("store");

    // Assert
    assert!(path.starts_with(archive.dir()));
    assert_eq!(fs::read(&path).expect("read stored"), b"%PDF-1.4");
    assert!(!stale_inside.exists(), "stale archived report should be pruned");
    assert!(stale.exists(), "pruning is scoped to the archive directory");

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn prune_continues_past_reports_it_cannot_remove() {
    // Arrange
    let dir = make_temp_dir("unremovable");
    let stuck = dir.join("report-2025-01-01-000000-stuck.pdf");
    fs::create_dir_all(&stuck).expect("create report-named dir");
    let old_report = dir.join("report-2025-01-02-000000-summary.pdf");
    fs::write(&old_report, "old").expect("write old report");

    // Act
    let result = prune_old_reports(&dir, 30, at(2026, 2, 15));

    // Assert
    assert!(result.is_ok(), "a failed removal is logged, not returned");
    assert!(stuck.exists());
    assert!(!old_report.exists(), "other old reports are still pruned");

    let _ = fs::remove_dir_all(dir);
}
