use crate::config::MonitorConfig;
use crate::http::{router, ApiState};
use crate::notifier::WebhookNotifier;
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vigil_core::ledger::IncidentLedger;
use vigil_core::monitor::ResourceMonitor;
use vigil_core::notify::spawn_notifier;
use vigil_probe::http::HttpProbe;

/// Owns the monitor set: wires the ledger and notifier, spawns one worker
/// per resource, serves the status API, and tears everything down on
/// ctrl-c.
pub async fn run(config: MonitorConfig) -> anyhow::Result<()> {
    let mut ledger =
        IncidentLedger::open(&config.journal).context("cannot open incident journal")?;
    info!(journal = %ledger.path().display(), "incident ledger ready");

    let notify_task: Option<JoinHandle<()>> = if config.webhooks.is_empty() {
        None
    } else {
        let notifier = WebhookNotifier::new(config.webhooks.clone())?;
        let (handle, task) = spawn_notifier(notifier);
        ledger.set_notifier(handle);
        Some(task)
    };
    let ledger = Arc::new(ledger);

    let (stop_tx, stop_rx) = watch::channel(false);
    let mut workers = Vec::new();
    let mut names = Vec::new();
    for resource in &config.resources {
        let probe = HttpProbe::new(
            &resource.name,
            &resource.url,
            resource.port,
            resource.method()?,
            resource.success_code,
        )
        .with_context(|| format!("invalid probe config for {}", resource.name))?;

        let monitor = ResourceMonitor::new(
            probe,
            ledger.clone(),
            resource.poll_config(),
            stop_rx.clone(),
        );
        names.push(resource.name.clone());
        workers.push(tokio::spawn(monitor.run()));
    }
    drop(stop_rx);
    info!(count = workers.len(), "monitors started");

    let state = ApiState {
        ledger: Arc::clone(&ledger),
        resources: Arc::new(names),
        start_time: Instant::now(),
    };
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&config.http_addr)
        .await
        .with_context(|| format!("cannot bind status api to {}", config.http_addr))?;
    info!("status api listening on http://{}", config.http_addr);
    let mut server = tokio::spawn(async move { axum::serve(listener, app).await });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
        _ = &mut server => {
            warn!("status api task ended");
        }
    }

    // Broadcast stop and wait for every worker; ledger state stays exactly
    // as of the last completed register/resolve
    let _ = stop_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }
    server.abort();

    // With all ledger handles gone the notifier channel closes; the
    // delivery loop drains queued events and exits
    drop(ledger);
    if let Some(task) = notify_task {
        let _ = task.await;
    }

    info!("monitor shut down");
    Ok(())
}
