//! Integration tests for the resumable export pipeline against a mock repository.

use libsafe_export::{
    CandidateRecord, ContentSource, ExportSummary, FailureStage, OutputStore, RecordId,
    RecordOutcome, RepositoryClient, ResumableBatchExporter, SkipReason, SourceError,
};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::repository::{
    client_for, content_path, content_path_for, mount_bitstreams, mount_item, mount_listing,
    mount_public_record, uuid_for,
};
use support::socket_guard::start_mock_server_or_skip;

fn candidates(handles: &[&str]) -> Vec<CandidateRecord> {
    handles.iter().map(|h| CandidateRecord::new(*h)).collect()
}

async fn run_once(
    server: &MockServer,
    dir: &TempDir,
    handles: &[&str],
) -> (ExportSummary, ResumableBatchExporter<RepositoryClient>) {
    let store = OutputStore::open(dir.path()).unwrap();
    let mut exporter = ResumableBatchExporter::new(client_for(server), store);
    let summary = exporter.run(candidates(handles)).await.unwrap();
    (summary, exporter)
}

fn ledger_rows(dir: &TempDir) -> Vec<String> {
    std::fs::read_to_string(dir.path().join("metadata.csv"))
        .unwrap_or_default()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_export_writes_pdfs_and_ledger_rows() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    mount_public_record(&server, 101, b"%PDF-1.7 one").await;
    mount_public_record(&server, 102, b"%PDF-1.7 two").await;

    let (summary, _) = run_once(&server, &dir, &["10754/101", "10754/102"]).await;

    assert_eq!(summary.exported, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(std::fs::read(dir.path().join("101.pdf")).unwrap(), b"%PDF-1.7 one");
    assert_eq!(std::fs::read(dir.path().join("102.pdf")).unwrap(), b"%PDF-1.7 two");

    let rows = ledger_rows(&dir);
    assert_eq!(
        rows[0],
        "http://hdl.handle.net/10754/101,101.pdf,Article,Record 101,\"Doe, Jane; Roe, Richard\",,2023-05-01,"
    );
    assert!(rows[1].starts_with("http://hdl.handle.net/10754/102,102.pdf,"));
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    mount_public_record(&server, 101, b"%PDF-1.7 one").await;
    mount_public_record(&server, 102, b"%PDF-1.7 two").await;
    let handles = ["10754/101", "10754/102"];

    let (first, _) = run_once(&server, &dir, &handles).await;
    let requests_after_first = server.received_requests().await.unwrap().len();
    let (second, _) = run_once(&server, &dir, &handles).await;

    assert_eq!(first.exported, 2);
    assert_eq!(second.exported, 0);
    assert_eq!(second.already_done, 2);
    assert_eq!(ledger_rows(&dir).len(), 2);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        requests_after_first,
        "second run must not contact the repository"
    );
}

#[tokio::test]
async fn test_invalid_handle_is_skipped_and_run_continues() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    mount_public_record(&server, 101, b"%PDF-1.7 one").await;
    mount_public_record(&server, 102, b"%PDF-1.7 two").await;

    let (summary, _) = run_once(&server, &dir, &["10754/101", "abc/def", "10754/102"]).await;

    assert_eq!(summary.invalid, 1);
    assert_eq!(summary.exported, 2);
    assert_eq!(ledger_rows(&dir).len(), 2);
}

#[tokio::test]
async fn test_file_without_row_is_reprocessed_once() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    mount_public_record(&server, 101, b"%PDF-1.7 complete").await;
    // Simulates a crash between the file write and the ledger append.
    std::fs::write(dir.path().join("101.pdf"), b"%PDF-1.7 trunc").unwrap();

    let (summary, _) = run_once(&server, &dir, &["10754/101"]).await;

    assert_eq!(summary.exported, 1);
    assert_eq!(
        std::fs::read(dir.path().join("101.pdf")).unwrap(),
        b"%PDF-1.7 complete"
    );
    assert_eq!(ledger_rows(&dir).len(), 1);

    let (again, _) = run_once(&server, &dir, &["10754/101"]).await;
    assert_eq!(again.already_done, 1);
    assert_eq!(ledger_rows(&dir).len(), 1);
}

#[tokio::test]
async fn test_oversized_pdf_is_not_downloaded() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    mount_item(&server, 201, "Large dataset appendix").await;
    mount_listing(&server, 201, 150 * 1024 * 1024).await;
    Mock::given(method("GET"))
        .and(path(content_path(201)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"never".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let (summary, _) = run_once(&server, &dir, &["10754/201"]).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.exported, 0);
    assert!(!dir.path().join("201.pdf").exists());
    assert!(ledger_rows(&dir).is_empty());
}

#[tokio::test]
async fn test_missing_record_fails_without_output() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    mount_public_record(&server, 102, b"%PDF-1.7 two").await;

    let (summary, mut exporter) = run_once(&server, &dir, &["10754/404", "10754/102"]).await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.exported, 1);
    assert!(!dir.path().join("404.pdf").exists());

    let outcome = exporter
        .process_record(&CandidateRecord::new("10754/102"))
        .await
        .unwrap();
    assert_eq!(outcome, RecordOutcome::Skipped(SkipReason::AlreadyDone));
}

#[tokio::test]
async fn test_transient_failures_recover_within_attempts() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    mount_item(&server, 301, "Flaky").await;
    mount_listing(&server, 301, 9).await;
    Mock::given(method("GET"))
        .and(path(content_path(301)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(content_path(301)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-flak".to_vec()))
        .with_priority(2)
        .mount(&server)
        .await;

    let (summary, _) = run_once(&server, &dir, &["10754/301"]).await;

    assert_eq!(summary.exported, 1);
    assert_eq!(std::fs::read(dir.path().join("301.pdf")).unwrap(), b"%PDF-flak");
}

#[tokio::test]
async fn test_later_pdf_used_when_earlier_ones_fail() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    let broken = uuid_for(4, 401);
    let empty = uuid_for(5, 401);
    let good = uuid_for(6, 401);
    mount_item(&server, 401, "Thesis with supplements").await;
    mount_bitstreams(
        &server,
        401,
        &[(broken.clone(), 10), (empty.clone(), 10), (good.clone(), 10)],
    )
    .await;
    Mock::given(method("GET"))
        .and(path(content_path_for(&broken)))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(content_path_for(&empty)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(content_path_for(&good)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-good".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let (summary, _) = run_once(&server, &dir, &["10754/401"]).await;

    assert_eq!(summary.exported, 1);
    assert_eq!(std::fs::read(dir.path().join("401.pdf")).unwrap(), b"%PDF-good");
    assert_eq!(ledger_rows(&dir).len(), 1);
}

#[tokio::test]
async fn test_all_pdfs_failing_reports_last_transient_error() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let missing = uuid_for(4, 402);
    let flaky = uuid_for(5, 402);
    mount_item(&server, 402, "Unavailable").await;
    mount_bitstreams(&server, 402, &[(missing.clone(), 10), (flaky.clone(), 10)]).await;
    Mock::given(method("GET"))
        .and(path(content_path_for(&missing)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(content_path_for(&flaky)))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut client = client_for(&server);
    let metadata = client
        .fetch_metadata(&RecordId::parse("10754/402").unwrap())
        .await
        .unwrap();
    let result = client.fetch_primary_bitstream(&metadata).await;

    assert!(
        matches!(result, Err(SourceError::Transient { .. })),
        "{result:?}"
    );
}

#[tokio::test]
async fn test_all_pdfs_missing_reports_not_found() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let first = uuid_for(4, 403);
    let second = uuid_for(5, 403);
    mount_item(&server, 403, "Withdrawn files").await;
    mount_bitstreams(&server, 403, &[(first.clone(), 10), (second.clone(), 10)]).await;
    for uuid in [&first, &second] {
        Mock::given(method("GET"))
            .and(path(content_path_for(uuid)))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut client = client_for(&server);
    let metadata = client
        .fetch_metadata(&RecordId::parse("10754/403").unwrap())
        .await
        .unwrap();
    let result = client.fetch_primary_bitstream(&metadata).await;

    assert!(
        matches!(result, Err(SourceError::NotFound { .. })),
        "{result:?}"
    );
}

#[tokio::test]
async fn test_exhausted_retries_fail_record_then_next_run_exports_it() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let dir = TempDir::new().unwrap();
    mount_item(&server, 302, "Outage").await;
    mount_listing(&server, 302, 11).await;
    Mock::given(method("GET"))
        .and(path(content_path(302)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(content_path(302)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-later".to_vec()))
        .with_priority(2)
        .mount(&server)
        .await;

    let store = OutputStore::open(dir.path()).unwrap();
    let mut exporter = ResumableBatchExporter::new(client_for(&server), store);
    let outcome = exporter
        .process_record(&CandidateRecord::new("10754/302"))
        .await
        .unwrap();

    assert!(
        matches!(
            outcome,
            RecordOutcome::Failed {
                stage: FailureStage::Bitstream,
                ..
            }
        ),
        "{outcome:?}"
    );
    assert!(!dir.path().join("302.pdf").exists());
    assert!(ledger_rows(&dir).is_empty());

    let (summary, _) = run_once(&server, &dir, &["10754/302"]).await;

    assert_eq!(summary.exported, 1);
    assert_eq!(std::fs::read(dir.path().join("302.pdf")).unwrap(), b"%PDF-later");
    assert_eq!(ledger_rows(&dir).len(), 1);
}
