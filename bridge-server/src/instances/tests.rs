//! Tests for InstanceSupervisor
//!
//! Lifecycle transitions, provisioning, probing and deletion against a mocked
//! process layer.

use super::*;
use crate::db::HistoryKind;
use crate::models::HistoryEntry;
use crate::ports::MockProcessControl;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

const PID: u32 = 4242;

struct Fixture {
    dir: TempDir,
    supervisor: Arc<InstanceSupervisor>,
    alive: Arc<AtomicBool>,
    spawned: Arc<AtomicUsize>,
    history: Arc<HistoryLog>,
}

/// A process layer where spawning makes the PID alive and terminating kills it
fn fake_process(alive: Arc<AtomicBool>, spawned: Arc<AtomicUsize>) -> MockProcessControl {
    let mut mock = MockProcessControl::new();

    let spawn_alive = alive.clone();
    mock.expect_spawn().returning(move |_| {
        spawn_alive.store(true, Ordering::SeqCst);
        spawned.fetch_add(1, Ordering::SeqCst);
        Ok(PID)
    });

    let probe_alive = alive.clone();
    mock.expect_is_alive()
        .returning(move |_| probe_alive.load(Ordering::SeqCst));

    mock.expect_terminate().returning(move |_, _| {
        alive.store(false, Ordering::SeqCst);
        Ok(())
    });
    mock
}

fn settings(dir: &TempDir, profile_source: Option<PathBuf>) -> SupervisorSettings {
    SupervisorSettings {
        main_path: PathBuf::from("terminal64.exe"),
        instances_dir: dir.path().join("instances"),
        profile_source,
        delete_instance_files: true,
        stop_grace: Duration::from_millis(10),
        restart_delay: Duration::ZERO,
    }
}

async fn supervisor(
    dir: &TempDir,
    process: MockProcessControl,
    profile_source: Option<PathBuf>,
    history: Arc<HistoryLog>,
) -> Arc<InstanceSupervisor> {
    let db = Arc::new(Database::new("sqlite::memory:").await.unwrap());
    Arc::new(
        InstanceSupervisor::new(db, Arc::new(process), settings(dir, profile_source))
            .with_histories(vec![history]),
    )
}

async fn fixture_with_profile(profile_source: Option<PathBuf>) -> Fixture {
    let dir = TempDir::new().unwrap();
    let alive = Arc::new(AtomicBool::new(false));
    let spawned = Arc::new(AtomicUsize::new(0));
    let history = Arc::new(HistoryLog::new(HistoryKind::Trades, 100));
    let supervisor = supervisor(
        &dir,
        fake_process(alive.clone(), spawned.clone()),
        profile_source,
        history.clone(),
    )
    .await;

    Fixture {
        dir,
        supervisor,
        alive,
        spawned,
        history,
    }
}

async fn fixture() -> Fixture {
    fixture_with_profile(None).await
}

#[tokio::test]
async fn test_add_account_provisions_and_starts() {
    let f = fixture().await;

    let account = f.supervisor.add_account("1001", "Main").await.unwrap();

    assert_eq!(account.status, InstanceStatus::Starting);
    assert_eq!(account.pid, Some(PID));
    let instance = f.dir.path().join("instances").join("1001");
    assert!(instance.join("profiles").join("Default").is_dir());
    assert!(instance.join("config").is_dir());
    assert!(instance.join("MQL5").join("Files").is_dir());
}

#[tokio::test]
async fn test_add_account_copies_profile_source() {
    let source = TempDir::new().unwrap();
    std::fs::create_dir_all(source.path().join("config")).unwrap();
    std::fs::write(source.path().join("config").join("common.ini"), "[Common]").unwrap();

    let f = fixture_with_profile(Some(source.path().to_path_buf())).await;

    f.supervisor.add_account("1001", "").await.unwrap();

    let copied = f
        .dir
        .path()
        .join("instances")
        .join("1001")
        .join("config")
        .join("common.ini");
    assert_eq!(std::fs::read_to_string(copied).unwrap(), "[Common]");
}

#[tokio::test]
async fn test_duplicate_and_invalid_accounts_are_rejected() {
    let f = fixture().await;
    f.supervisor.add_account("1001", "").await.unwrap();

    assert!(matches!(
        f.supervisor.add_account("1001", "").await,
        Err(LifecycleError::AlreadyExists(_))
    ));
    assert!(matches!(
        f.supervisor.add_account("../evil", "").await,
        Err(LifecycleError::InvalidAccount(_))
    ));
}

#[tokio::test]
async fn test_failed_spawn_leaves_account_created() {
    let mut process = MockProcessControl::new();
    process
        .expect_spawn()
        .returning(|_| Err(anyhow::anyhow!("terminal64.exe not found")));
    process.expect_is_alive().returning(|_| false);
    let dir = TempDir::new().unwrap();
    let history = Arc::new(HistoryLog::new(HistoryKind::Trades, 100));
    let supervisor = supervisor(&dir, process, None, history).await;

    let account = supervisor.add_account("1001", "").await.unwrap();
    assert_eq!(account.status, InstanceStatus::Created);

    // Stopping a terminal that never started is a no-op
    assert_eq!(
        supervisor.stop("1001").await.unwrap(),
        StopOutcome::NotRunning
    );

    assert!(matches!(
        supervisor.open("1001").await,
        Err(LifecycleError::Spawn { .. })
    ));
}

#[tokio::test]
async fn test_probe_moves_starting_to_online_and_crash_to_offline() {
    let f = fixture().await;
    f.supervisor.add_account("1001", "").await.unwrap();

    let transitions = f.supervisor.probe_all().await.unwrap();
    assert_eq!(
        transitions,
        vec![Transition {
            account: "1001".to_string(),
            from: InstanceStatus::Starting,
            to: InstanceStatus::Online,
        }]
    );

    // Terminal crashes
    f.alive.store(false, Ordering::SeqCst);
    let account = f.supervisor.refresh("1001").await.unwrap().unwrap();
    assert_eq!(account.status, InstanceStatus::Offline);
    assert_eq!(account.pid, None);

    // Nothing changes on the next probe
    assert!(f.supervisor.probe_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_open_when_alive_reports_already_online() {
    let f = fixture().await;
    f.supervisor.add_account("1001", "").await.unwrap();

    let outcome = f.supervisor.open("1001").await.unwrap();
    assert_eq!(outcome, OpenOutcome::AlreadyOnline { pid: PID });
    assert_eq!(f.spawned.load(Ordering::SeqCst), 1);

    let account = f.supervisor.get("1001").await.unwrap().unwrap();
    assert_eq!(account.status, InstanceStatus::Online);
}

#[tokio::test]
async fn test_stop_and_restart() {
    let f = fixture().await;
    f.supervisor.add_account("1001", "").await.unwrap();

    assert_eq!(f.supervisor.stop("1001").await.unwrap(), StopOutcome::Stopped);
    let account = f.supervisor.get("1001").await.unwrap().unwrap();
    assert_eq!(account.status, InstanceStatus::Offline);
    assert!(!f.alive.load(Ordering::SeqCst));

    // Second stop is a no-op
    assert_eq!(
        f.supervisor.stop("1001").await.unwrap(),
        StopOutcome::NotRunning
    );

    let outcome = f.supervisor.restart("1001").await.unwrap();
    assert_eq!(outcome, OpenOutcome::Started { pid: PID });
    assert_eq!(f.spawned.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unknown_account_operations_report_not_found() {
    let f = fixture().await;

    assert!(matches!(
        f.supervisor.open("9999").await,
        Err(LifecycleError::NotFound(_))
    ));
    assert!(matches!(
        f.supervisor.stop("9999").await,
        Err(LifecycleError::NotFound(_))
    ));
    assert!(f.supervisor.refresh("9999").await.unwrap().is_none());
}

#[tokio::test]
async fn test_lock_map_does_not_grow_for_unknown_accounts() {
    let f = fixture().await;

    for i in 0..200 {
        assert!(matches!(
            f.supervisor.delete(&format!("ghost{}", i)).await,
            Err(LifecycleError::NotFound(_))
        ));
        assert!(f
            .supervisor
            .refresh(&format!("unknown{}", i))
            .await
            .unwrap()
            .is_none());
    }

    assert!(f.supervisor.tracked_locks().await <= 1);
}

#[tokio::test]
async fn test_pruning_keeps_contended_locks() {
    let f = fixture().await;
    f.supervisor.add_account("1001", "").await.unwrap();

    let held = f.supervisor.lock_account("1001").await;
    let supervisor = f.supervisor.clone();
    let waiter = tokio::spawn(async move {
        let _guard = supervisor.lock_account("1001").await;
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Another account locking must not prune an entry with a pending waiter
    drop(f.supervisor.lock_account("2002").await);
    let mut contender = Box::pin(f.supervisor.lock_account("1001"));
    assert!(futures::poll!(contender.as_mut()).is_pending());

    drop(held);
    waiter.await.unwrap();
    drop(contender.await);
}

#[tokio::test]
async fn test_delete_is_irreversible_and_cleans_up() {
    let f = fixture().await;
    f.supervisor.add_account("1001", "").await.unwrap();
    f.history
        .record(HistoryEntry::success("BUY", "sent").with_account("1001"))
        .await;
    f.history
        .record(HistoryEntry::success("BUY", "sent").with_account("2002"))
        .await;

    f.supervisor.delete("1001").await.unwrap();

    assert!(f.supervisor.get("1001").await.unwrap().is_none());
    assert!(!f.alive.load(Ordering::SeqCst));
    assert!(!f.dir.path().join("instances").join("1001").exists());
    assert_eq!(f.history.len().await, 1);

    assert!(matches!(
        f.supervisor.delete("1001").await,
        Err(LifecycleError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_monitor_reports_transitions() {
    let f = fixture().await;
    f.supervisor.add_account("1001", "").await.unwrap();
    f.supervisor.add_account("1002", "").await.unwrap();

    let monitor = LivenessMonitor::new(f.supervisor.clone(), Duration::from_secs(30));
    let transitions = monitor.check_liveness().await;

    assert_eq!(transitions.len(), 2);
    assert!(transitions.iter().all(|t| t.to == InstanceStatus::Online));
    assert_eq!(f.supervisor.stats().await.unwrap().online, 2);
}
