//! Pipeline scheduler
//!
//! Accepts validated run requests and executes each one as an independent
//! task. Scheduling is fire-and-forget: [`Scheduler::schedule`] returns as
//! soon as the request is accepted, and the outcome is only observable
//! through the [`ResultReporter`].
//!
//! Lifecycle of a run: `Received → Dispatched → Completed | Failed`.

mod run;

use chrono::Utc;
use prism_core::ValidationError;
use prism_core::domain::report::{PipelineReport, RunStatus};
use prism_core::dto::pipeline::PipelineRunRequest;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::error::ProcessorError;
use crate::registry::ProcessorRegistry;
use crate::reporter::ResultReporter;

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Runs executing at the same time; further runs wait for a slot
    pub max_parallel_runs: usize,

    /// Deadline of a single run, counted from when it gets a slot
    pub run_timeout: Duration,

    /// Where file-producing operations write their results
    pub output_dir: PathBuf,
}

/// Dispatches pipeline runs to processors
pub struct Scheduler {
    config: SchedulerConfig,
    registry: Arc<ProcessorRegistry>,
    reporter: Arc<dyn ResultReporter>,
    semaphore: Arc<Semaphore>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<ProcessorRegistry>,
        reporter: Arc<dyn ResultReporter>,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_parallel_runs));
        Self {
            config,
            registry,
            reporter,
            semaphore,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Validates `request` and starts it in the background
    ///
    /// Returns once the run is accepted; an invalid request is rejected
    /// without any processor being invoked.
    pub fn schedule(&self, request: PipelineRunRequest) -> Result<(), ValidationError> {
        self.schedule_with_cancel(request, CancellationToken::new())
    }

    /// Like [`Scheduler::schedule`], with a caller-owned cancellation signal
    ///
    /// Cancelling `cancel` terminates the run's in-flight tool, deletes its
    /// files, and reports it as failed with a `Cancelled` error.
    pub fn schedule_with_cancel(
        &self,
        request: PipelineRunRequest,
        cancel: CancellationToken,
    ) -> Result<(), ValidationError> {
        request.validate()?;

        info!(
            "Pipeline run {} {} (pipeline {})",
            request.snapshot_id,
            RunStatus::Received,
            request.pipeline_id.as_deref().unwrap_or("default")
        );

        let registry = Arc::clone(&self.registry);
        let reporter = Arc::clone(&self.reporter);
        let semaphore = Arc::clone(&self.semaphore);
        let config = self.config.clone();
        let run_token = self.shutdown.child_token();
        let payload = request.payload.clone();

        self.tracker.spawn(async move {
            let report = Self::supervise(request, config, registry, semaphore, run_token, cancel)
                .await
                .with_payload(payload);

            info!("Pipeline run {} {}", report.snapshot_id, report.status);
            if let Err(e) = reporter.report(&report).await {
                error!(
                    "Failed to report pipeline run {}: {:#}",
                    report.snapshot_id, e
                );
            }
        });

        Ok(())
    }

    /// Runs one request under its deadline and cancellation signals
    async fn supervise(
        request: PipelineRunRequest,
        config: SchedulerConfig,
        registry: Arc<ProcessorRegistry>,
        semaphore: Arc<Semaphore>,
        run_token: CancellationToken,
        cancel: CancellationToken,
    ) -> PipelineReport {
        let started_at = Utc::now();
        let snapshot_id = request.snapshot_id.clone();
        let pipeline_id = request.pipeline_id.clone();

        let failed = |failure| {
            PipelineReport::failed(snapshot_id.clone(), pipeline_id.clone(), failure, started_at)
        };

        let cancelled_while_waiting = || {
            let failure = run::StepFailure {
                operation: None,
                error: ProcessorError::Cancelled,
            };
            failed(failure.into_failure())
        };

        let _permit = tokio::select! {
            permit = semaphore.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => return cancelled_while_waiting(),
            },
            _ = run_token.cancelled() => return cancelled_while_waiting(),
            _ = cancel.cancelled() => return cancelled_while_waiting(),
        };
        debug!("Pipeline run {} acquired a slot", snapshot_id);

        let execution = run::execute(&request, &registry, &config.output_dir, &run_token);
        tokio::pin!(execution);
        let deadline = tokio::time::sleep(config.run_timeout);
        tokio::pin!(deadline);
        let mut timed_out = false;

        // Cancellation is propagated through the token so the in-flight tool
        // is killed and the run unwinds through its own cleanup.
        let outcome = loop {
            tokio::select! {
                outcome = &mut execution => break outcome,
                _ = cancel.cancelled(), if !run_token.is_cancelled() => {
                    warn!("Pipeline run {} cancelled", snapshot_id);
                    run_token.cancel();
                }
                _ = &mut deadline, if !run_token.is_cancelled() => {
                    warn!(
                        "Pipeline run {} exceeded its deadline of {:?}",
                        snapshot_id, config.run_timeout
                    );
                    timed_out = true;
                    run_token.cancel();
                }
            }
        };

        match outcome {
            Ok(artifacts) => PipelineReport::completed(
                snapshot_id.clone(),
                pipeline_id.clone(),
                artifacts,
                started_at,
            ),
            Err(failure) if timed_out && matches!(failure.error, ProcessorError::Cancelled) => {
                failed(run::deadline_failure(config.run_timeout, failure.operation))
            }
            Err(failure) => {
                warn!(
                    "Pipeline run {} failed in {}: {}",
                    snapshot_id,
                    failure.operation.unwrap_or("dispatch"),
                    failure.error
                );
                failed(failure.into_failure())
            }
        }
    }

    /// Cancels every in-flight run and waits for all of them to report
    pub async fn shutdown(&self) {
        info!("Shutting down scheduler ({} run(s) in flight)", self.tracker.len());
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
    }
}
