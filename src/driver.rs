//! Driver spawns the task that feeds a signal provider into telemetry

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use crate::provider::SignalProvider;
use crate::session::TelemetryHandle;

const MAX_ERRORS: u32 = 10;

/// Running driver task
pub struct DriverTask {
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    task: JoinHandle<u64>,
}

impl DriverTask {
    /// Wait for the provider to end. Returns the number of signals delivered.
    pub async fn finished(self) -> u64 {
        match self.task.await {
            Ok(count) => count,
            Err(e) => {
                error!("Signal reader task failed: {}", e);
                0
            }
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Driver spawns and manages signal forwarding tasks
pub struct Driver;

impl Driver {
    /// Spawn a task forwarding every signal from `provider` to `telemetry`.
    pub fn spawn<P>(provider: P, telemetry: TelemetryHandle) -> DriverTask
    where
        P: SignalProvider,
    {
        let cancel = CancellationToken::new();
        let cancel_reader = cancel.clone();
        let task = tokio::spawn(async move {
            Self::signal_reader_task(provider, telemetry, cancel_reader).await
        });
        DriverTask { cancel, task }
    }

    async fn signal_reader_task<P>(
        mut provider: P,
        telemetry: TelemetryHandle,
        cancel: CancellationToken,
    ) -> u64
    where
        P: SignalProvider,
    {
        info!("Signal reader task started");
        let mut signal_count = 0u64;
        let mut error_count = 0u32;

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Signal reader cancelled");
                    break;
                }
                result = provider.next_signal() => result,
            };

            match result {
                Ok(Some(signal)) => {
                    signal_count += 1;
                    error_count = 0;
                    trace!("Signal {}: {}", signal_count, signal.kind());

                    if let Err(e) = telemetry.apply(signal) {
                        debug!("Telemetry no longer running, shutting down: {}", e);
                        break;
                    }
                }
                Ok(None) => {
                    info!("Provider ended after {} signals", signal_count);
                    break;
                }
                Err(e) => {
                    error_count += 1;
                    error!("Provider error ({}/{}): {}", error_count, MAX_ERRORS, e);

                    if error_count >= MAX_ERRORS {
                        error!("Too many provider errors, shutting down");
                        break;
                    }

                    // Exponential backoff: 100ms, 200ms, 400ms, ...
                    let backoff = Duration::from_millis(50 * (1 << error_count.min(5)));
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        signal_count
    }
}
