use parking_lot::Mutex;
use poisonlab_policy::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemorySink {
    fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().clone()
    }
}

impl AuditSink for MemorySink {
    fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        self.records.lock().push(record.clone());
        Ok(())
    }
}

struct FailingSink;

impl AuditSink for FailingSink {
    fn append(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}

fn setup_demo() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join("demo/user_files")).unwrap();
    std::fs::create_dir_all(root.join("demo/public")).unwrap();
    std::fs::create_dir_all(root.join("demo/secrets")).unwrap();
    std::fs::write(root.join("demo/user_files/notes.txt"), "remember the milk").unwrap();
    std::fs::write(root.join("demo/public/readme.txt"), "public readme").unwrap();
    std::fs::write(
        root.join("demo/secrets/secret_api_key.txt"),
        "API_KEY=sk-secret-1234567890",
    )
    .unwrap();
    (temp, root)
}

fn secure_mediator(root: &Path, sink: Arc<dyn AuditSink>) -> PathMediator {
    let policy = AccessPolicy::new(
        vec![root.join("demo/user_files"), root.join("demo/public")],
        root,
    )
    .unwrap();
    PathMediator::new(Arc::new(policy)).with_audit(sink)
}

#[tokio::test]
async fn test_read_inside_allowlist() {
    let (_temp, root) = setup_demo();
    let mediator = secure_mediator(&root, Arc::new(MemorySink::default()));

    let contents = mediator.read("demo/user_files/notes.txt").await.unwrap();
    assert_eq!(contents.text, "remember the milk");
    assert_eq!(contents.bytes, 17);
}

#[tokio::test]
async fn test_read_outside_allowlist_denied() {
    let (_temp, root) = setup_demo();
    let mediator = secure_mediator(&root, Arc::new(MemorySink::default()));

    let err = mediator
        .read("demo/secrets/secret_api_key.txt")
        .await
        .unwrap_err();
    assert!(matches!(err, AccessError::OutsideAllowlist { .. }));
    assert!(err.to_string().contains("outside the allowed directories"));
    assert!(!err.to_string().contains("API_KEY="));
}

#[tokio::test]
async fn test_read_traversal_from_allowed_root_denied() {
    let (_temp, root) = setup_demo();
    let mediator = secure_mediator(&root, Arc::new(MemorySink::default()));

    let err = mediator
        .read("demo/user_files/../secrets/secret_api_key.txt")
        .await
        .unwrap_err();
    match err {
        AccessError::OutsideAllowlist { path, .. } => {
            assert!(path.ends_with("demo/secrets/secret_api_key.txt"));
        }
        other => panic!("expected OutsideAllowlist, got {:?}", other),
    }
}

#[tokio::test]
async fn test_read_missing_file_is_read_failure() {
    let (_temp, root) = setup_demo();
    let mediator = secure_mediator(&root, Arc::new(MemorySink::default()));

    let err = mediator.read("demo/public/missing.txt").await.unwrap_err();
    assert_eq!(
        err,
        AccessError::ReadFailure {
            path: root.join("demo/public/missing.txt").display().to_string(),
            reason: "file not found".into(),
        }
    );
}

#[tokio::test]
async fn test_read_directory_is_read_failure() {
    let (_temp, root) = setup_demo();
    let mediator = secure_mediator(&root, Arc::new(MemorySink::default()));

    let err = mediator.read("demo/public").await.unwrap_err();
    assert!(matches!(err, AccessError::ReadFailure { .. }));
}

#[tokio::test]
async fn test_read_is_bounded() {
    let (_temp, root) = setup_demo();
    std::fs::write(root.join("demo/public/big.txt"), vec![b'x'; 64]).unwrap();
    let mediator =
        secure_mediator(&root, Arc::new(MemorySink::default())).with_max_read_bytes(32);

    let err = mediator.read("demo/public/big.txt").await.unwrap_err();
    match err {
        AccessError::ReadFailure { reason, .. } => assert!(reason.contains("32 bytes")),
        other => panic!("expected ReadFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_file_distinguishable_from_denial() {
    let (_temp, root) = setup_demo();
    std::fs::write(root.join("demo/public/empty.txt"), "").unwrap();
    let mediator = secure_mediator(&root, Arc::new(MemorySink::default()));

    let contents = mediator.read("demo/public/empty.txt").await.unwrap();
    assert_eq!(contents.text, "");
    assert!(mediator.read("/etc/passwd").await.is_err());
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_escape_denied() {
    let (_temp, root) = setup_demo();
    std::os::unix::fs::symlink(
        root.join("demo/secrets/secret_api_key.txt"),
        root.join("demo/public/innocent.txt"),
    )
    .unwrap();
    let sink = Arc::new(MemorySink::default());
    let mediator = secure_mediator(&root, sink.clone());

    assert!(mediator.resolve("demo/public/innocent.txt").is_permitted());
    let err = mediator.read("demo/public/innocent.txt").await.unwrap_err();
    assert!(matches!(err, AccessError::OutsideAllowlist { .. }));

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, DecisionKind::Denied);
}

#[tokio::test]
async fn test_every_read_produces_one_audit_record() {
    let (_temp, root) = setup_demo();
    let sink = Arc::new(MemorySink::default());
    let mediator = secure_mediator(&root, sink.clone());

    let requests = [
        "demo/user_files/notes.txt",
        "demo/secrets/secret_api_key.txt",
        "../../../etc/passwd",
        "~/.ssh/id_rsa",
        "demo/public/missing.txt",
    ];

    for requested in requests {
        let decision = mediator.resolve(requested);
        let _ = mediator.read(requested).await;
        let records = sink.records();
        let last = records.last().unwrap();
        assert_eq!(last.requested_path, requested);
        assert_eq!(last.decision, decision.kind());
        assert_eq!(last.action, AuditAction::Read);
    }

    assert_eq!(sink.records().len(), requests.len());
}

#[tokio::test]
async fn test_audit_failure_does_not_fail_read() {
    let (_temp, root) = setup_demo();
    let mediator = secure_mediator(&root, Arc::new(FailingSink));

    let contents = mediator.read("demo/public/readme.txt").await.unwrap();
    assert_eq!(contents.text, "public readme");
}

#[tokio::test]
async fn test_list_and_check_are_audited() {
    let (_temp, root) = setup_demo();
    let sink = Arc::new(MemorySink::default());
    let mediator = secure_mediator(&root, sink.clone());

    let listing = mediator.list("demo/user_files").await.unwrap();
    assert_eq!(listing.entries, vec!["notes.txt".to_string()]);
    assert!(!listing.is_truncated());
    assert!(mediator.list("demo/secrets").await.is_err());
    assert!(!mediator.check("/etc/shadow").is_permitted());

    let actions: Vec<AuditAction> = sink.records().iter().map(|r| r.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::List, AuditAction::List, AuditAction::Check]
    );
    assert_eq!(sink.records()[0].detail.as_deref(), Some("1 entries"));
}

#[tokio::test]
async fn test_unrestricted_mediator_reads_anything_without_audit() {
    let (_temp, root) = setup_demo();
    let policy = AccessPolicy::unrestricted(&root).unwrap();
    let mediator = PathMediator::new(Arc::new(policy));

    assert!(!mediator.is_audited());
    let contents = mediator
        .read("demo/user_files/../secrets/secret_api_key.txt")
        .await
        .unwrap();
    assert!(contents.text.contains("API_KEY="));
}

#[tokio::test]
async fn test_large_listing_keeps_sorted_prefix() {
    let (_temp, root) = setup_demo();
    let bulk = root.join("demo/public/bulk");
    std::fs::create_dir_all(&bulk).unwrap();
    let total = MAX_LIST_ENTRIES + 100;
    for i in (0..total).rev() {
        std::fs::write(bulk.join(format!("f{:04}", i)), "").unwrap();
    }
    let sink = Arc::new(MemorySink::default());
    let mediator = secure_mediator(&root, sink.clone());

    let listing = mediator.list("demo/public/bulk").await.unwrap();

    assert_eq!(listing.total, total);
    assert_eq!(listing.entries.len(), MAX_LIST_ENTRIES);
    assert!(listing.is_truncated());
    assert_eq!(listing.omitted(), 100);
    let expected: Vec<String> = (0..MAX_LIST_ENTRIES).map(|i| format!("f{:04}", i)).collect();
    assert_eq!(listing.entries, expected);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].detail.as_deref(),
        Some("1000 of 1100 entries (truncated)")
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_root_created_after_startup_behind_symlink() {
    let temp = TempDir::new().unwrap();
    let real = temp.path().join("real");
    std::fs::create_dir_all(&real).unwrap();
    let link = temp.path().join("link");
    std::os::unix::fs::symlink(&real, &link).unwrap();

    let policy = AccessPolicy::new(vec![PathBuf::from("uploads")], &link).unwrap();
    let mediator = PathMediator::new(Arc::new(policy));

    std::fs::create_dir_all(real.join("uploads")).unwrap();
    std::fs::write(real.join("uploads/report.txt"), "quarterly numbers").unwrap();

    let contents = mediator.read("uploads/report.txt").await.unwrap();
    assert_eq!(contents.text, "quarterly numbers");
    assert_eq!(mediator.list("uploads").await.unwrap().entries, vec!["report.txt"]);
}
