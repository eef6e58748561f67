use crate::ledger::IncidentLedger;
use crate::probe::Probe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Upper bound on a single sleep step, so a stop signal is observed within
/// one chunk of a longer wait.
const MAX_SLEEP_STEP: Duration = Duration::from_secs(5);

/// Polling cadence and debounce threshold for one resource.
#[derive(Debug, Clone)]
pub struct PollConfig {
    pub check_interval: Duration,
    pub retry_interval: Duration,
    pub max_attempts: u32,
}

/// Polls one resource and debounces transitions: a state flip requires
/// `max_attempts` consecutive matching probe results, so single transient
/// failures or successes never open or close an incident.
pub struct ResourceMonitor<P: Probe> {
    probe: P,
    ledger: Arc<IncidentLedger>,
    config: PollConfig,
    stop: watch::Receiver<bool>,
    in_incident: bool,
}

impl<P: Probe> ResourceMonitor<P> {
    pub fn new(
        probe: P,
        ledger: Arc<IncidentLedger>,
        config: PollConfig,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            probe,
            ledger,
            config,
            stop,
            in_incident: false,
        }
    }

    /// Runs until stop is requested. An unexpected error inside the loop
    /// (journal I/O, not probe failures) terminates this worker only.
    pub async fn run(mut self) {
        let name = self.probe.name().to_string();
        info!(resource = %name, "monitor started");
        if let Err(e) = self.poll_loop(&name).await {
            error!(resource = %name, error = %e, "monitor worker failed");
        }
        info!(resource = %name, "monitor stopped");
    }

    async fn poll_loop(&mut self, name: &str) -> anyhow::Result<()> {
        while !self.stop_requested() {
            let status = self.probe.check().await;

            if !self.in_incident && !status.ok {
                warn!(
                    resource = %name,
                    code = status.code,
                    "check failed, confirming outage"
                );
                if self.confirm(false).await {
                    warn!(resource = %name, code = status.code, "confirmed outage, opening incident");
                    self.in_incident = true;
                    self.ledger
                        .register_incident(name, status.code, &status.text)
                        .await?;
                }
            } else if self.in_incident && status.ok {
                info!(resource = %name, code = status.code, "check succeeded, confirming recovery");
                if self.confirm(true).await {
                    info!(resource = %name, "confirmed recovery, closing incident");
                    self.in_incident = false;
                    self.ledger.resolve_incident(name).await?;
                }
            } else {
                debug!(resource = %name, code = status.code, "steady state");
            }

            // A resource near a threshold keeps the tighter retry cadence
            // until a confirmation resolves it
            self.sleep(self.config.retry_interval).await;
        }
        Ok(())
    }

    /// Confirmation sub-loop: up to `max_attempts` probes, confirmed once
    /// `max_attempts` consecutive results match `expected`. The counter
    /// resets on any mismatch; a stop request aborts unconfirmed.
    async fn confirm(&mut self, expected: bool) -> bool {
        let mut streak = 0u32;
        for attempt in 1..=self.config.max_attempts {
            if self.stop_requested() {
                return false;
            }

            let status = self.probe.check().await;
            debug!(
                attempt,
                code = status.code,
                expected,
                "confirmation attempt"
            );

            if status.ok == expected {
                streak += 1;
            } else {
                streak = 0;
            }
            if streak >= self.config.max_attempts {
                return true;
            }

            self.sleep(self.config.retry_interval).await;
        }
        false
    }

    fn stop_requested(&self) -> bool {
        // A dropped sender counts as a stop request
        self.stop.has_changed().is_err() || *self.stop.borrow()
    }

    /// Interruptible sleep: chunked into bounded steps, each racing the
    /// stop signal.
    async fn sleep(&mut self, total: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() && !self.stop_requested() {
            let step = remaining.min(MAX_SLEEP_STEP);
            tokio::select! {
                _ = tokio::time::sleep(step) => {}
                _ = self.stop.changed() => return,
            }
            remaining -= step;
        }
    }
}
