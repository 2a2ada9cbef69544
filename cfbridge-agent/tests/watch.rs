use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod common;
use common::*;
use cfbridge_agent::{watch, Settings};
use cfbridge_common::error::{BridgeError, Result};
use tokio::sync::oneshot;

#[tokio::test]
async fn test_stop_during_reconcile_unmounts_after_it_finishes() {
    setup_test_logging();
    let temp_dir = create_temp_dir();
    let (engine, fake) = create_test_engine(temp_dir.path());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let stop_tx = Mutex::new(Some(stop_tx));
    let loads = Arc::new(AtomicUsize::new(0));
    let counted = loads.clone();

    // The stop request lands while the first reconcile is still loading
    let load = move || -> Result<Settings> {
        counted.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = stop_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
        std::thread::sleep(Duration::from_millis(50));
        Ok(test_settings())
    };
    let stop = async move {
        let _ = stop_rx.await;
    };

    tokio::time::timeout(
        Duration::from_secs(10),
        watch(engine, load, Duration::from_secs(3600), stop),
    )
    .await
    .expect("watch loop should stop")
    .expect("watch loop should succeed");

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    assert_eq!(
        fake.steps(),
        vec!["version", "gen-config", "dry-run", "unmount", "mount", "unmount"]
    );
    assert!(!fake.is_mounted());
}

#[tokio::test]
async fn test_load_failure_keeps_watching() {
    setup_test_logging();
    let temp_dir = create_temp_dir();
    let (engine, fake) = create_test_engine(temp_dir.path());

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let stop_tx = Mutex::new(Some(stop_tx));
    let loads = Arc::new(AtomicUsize::new(0));
    let counted = loads.clone();

    let load = move || -> Result<Settings> {
        if counted.fetch_add(1, Ordering::SeqCst) == 1 {
            if let Some(tx) = stop_tx.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
        Err(BridgeError::Configuration(
            "settings file missing".to_string(),
        ))
    };
    let stop = async move {
        let _ = stop_rx.await;
    };

    tokio::time::timeout(
        Duration::from_secs(10),
        watch(engine, load, Duration::from_millis(10), stop),
    )
    .await
    .expect("watch loop should stop")
    .expect("watch loop should succeed");

    assert!(loads.load(Ordering::SeqCst) >= 2);
    assert_eq!(fake.steps(), vec!["unmount"]);
}
