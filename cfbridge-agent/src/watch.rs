//! Periodic reconcile loop behind `cfbridge run`.

use crate::{Engine, Session, Settings, StatusReport};
use cfbridge_common::error::{BridgeError, Result};
use cfbridge_mount::ProcessRunner;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reconcile the settings returned by `load` every `interval` until `stop`
/// completes, then unmount.
///
/// `stop` runs on its own task for the whole loop, so a stop request that
/// arrives while a reconcile is in flight takes effect as soon as that
/// reconcile returns.
pub async fn watch<R, L, S>(engine: Engine<R>, load: L, interval: Duration, stop: S) -> Result<()>
where
    R: ProcessRunner + 'static,
    L: Fn() -> Result<Settings> + Send + Sync + 'static,
    S: Future<Output = ()> + Send + 'static,
{
    let state = Arc::new(Mutex::new((engine, Session::new())));
    let load = Arc::new(load);
    let mut ticker = tokio::time::interval(interval);
    let mut stopped = tokio::spawn(stop);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let state = state.clone();
                let load = load.clone();
                let outcome = tokio::task::spawn_blocking(move || -> Result<StatusReport> {
                    let settings = load()?;
                    let mut guard = state
                        .lock()
                        .map_err(|_| BridgeError::Internal("Engine state lock poisoned".to_string()))?;
                    let (engine, session) = &mut *guard;
                    Ok(engine.reconcile(session, settings))
                })
                .await
                .map_err(|e| BridgeError::Internal(format!("Reconcile task failed: {}", e)))?;

                match outcome {
                    Ok(report) if report.is_connected() => debug!("Status: {:?}", report.status),
                    Ok(report) => warn!(
                        "Status: {:?} {}",
                        report.status,
                        report.message.as_deref().unwrap_or("")
                    ),
                    Err(e) => error!("Reconcile skipped: {}", e),
                }
            }
            result = &mut stopped => {
                if let Err(e) = result {
                    error!("Stop listener ended unexpectedly: {}", e);
                }
                info!("Stopping watch loop");
                break;
            }
        }
    }

    tokio::task::spawn_blocking(move || match state.lock() {
        Ok(mut guard) => guard.0.shutdown(),
        Err(_) => error!("Engine state lock poisoned, mount left in place"),
    })
    .await
    .map_err(|e| BridgeError::Internal(format!("Shutdown task failed: {}", e)))
}
