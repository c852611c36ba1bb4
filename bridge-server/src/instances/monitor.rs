use super::{InstanceSupervisor, Transition};
use std::sync::Arc;
use std::time::Duration;

/// Periodically re-probes every terminal process and records status changes
pub struct LivenessMonitor {
    supervisor: Arc<InstanceSupervisor>,
    check_interval: Duration,
}

impl LivenessMonitor {
    pub fn new(supervisor: Arc<InstanceSupervisor>, check_interval: Duration) -> Self {
        Self {
            supervisor,
            check_interval,
        }
    }

    /// Start the monitoring loop
    pub async fn run(self) {
        tracing::info!(
            interval_secs = self.check_interval.as_secs(),
            "Liveness monitor started"
        );
        let mut interval = tokio::time::interval(self.check_interval);
        // The first tick fires immediately; skip it so startup is not probed twice
        interval.tick().await;

        loop {
            interval.tick().await;
            self.check_liveness().await;
        }
    }

    /// Probe once. Public so tests can drive it without the timer.
    pub async fn check_liveness(&self) -> Vec<Transition> {
        match self.supervisor.probe_all().await {
            Ok(transitions) => {
                if !transitions.is_empty() {
                    tracing::info!(changed = transitions.len(), "Liveness probe finished");
                }
                transitions
            }
            Err(e) => {
                tracing::error!(error = %e, "Liveness probe failed");
                Vec::new()
            }
        }
    }
}
