//! The polling loop that drains the queue.
//!
//! One scheduler is one cooperative worker. Running several (in-process or
//! across processes sharing the database file) is safe because claiming is
//! atomic; each loop just sees fewer jobs.

use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures_util::FutureExt as _;
use roost_core::{
  job::{Job, JobStatus},
  store::{ContentStore, JobStore},
};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{HandlerError, context::JobContext, handler::HandlerRegistry};

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
  /// How long to sleep after a poll that found nothing eligible.
  pub poll_interval:       Duration,
  /// Run queue maintenance once per this many polls.
  pub maintenance_every:   u32,
  /// Completed jobs older than this are deleted by maintenance.
  pub completed_retention: Duration,
  /// Running jobs started longer ago than this are presumed abandoned and
  /// returned to the queue.
  pub stall_timeout:       Duration,
}

impl Default for SchedulerConfig {
  fn default() -> Self {
    Self {
      poll_interval:       Duration::from_secs(5),
      maintenance_every:   60,
      completed_retention: Duration::from_secs(7 * 24 * 3600),
      stall_timeout:       Duration::from_secs(10 * 60),
    }
  }
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

pub struct Scheduler<S> {
  context:  JobContext<S>,
  registry: Arc<HandlerRegistry<S>>,
  config:   SchedulerConfig,
}

impl<S> Scheduler<S>
where
  S: JobStore + ContentStore + Clone + Send + Sync + 'static,
{
  pub fn new(
    context: JobContext<S>,
    registry: HandlerRegistry<S>,
    config: SchedulerConfig,
  ) -> Self {
    Self {
      context,
      registry: Arc::new(registry),
      config,
    }
  }

  /// Claim and run at most one job. Returns the job's id if one ran.
  ///
  /// Handler failures are recorded on the job row, not returned; the error
  /// path here is the store itself failing.
  pub async fn tick(&self) -> Result<Option<Uuid>, <S as JobStore>::Error> {
    let Some(job) = self.context.store.claim_next().await? else {
      return Ok(None);
    };

    let job_id = job.job_id;
    let kind = job.kind;
    let attempt = job.attempts;

    match self.run_job(job).await {
      Ok(()) => {
        self.context.store.complete(job_id).await?;
        tracing::info!(
          %job_id,
          kind = kind.discriminant(),
          attempt,
          "job completed",
        );
      }
      Err(error) => {
        let failed =
          self.context.store.fail(job_id, &error.to_string()).await?;
        if failed.status == JobStatus::Failed {
          tracing::error!(
            %job_id,
            kind = kind.discriminant(),
            attempt,
            %error,
            "job failed permanently",
          );
        } else {
          tracing::warn!(
            %job_id,
            kind = kind.discriminant(),
            attempt,
            retry_at = %failed.scheduled_at,
            %error,
            "job failed, requeued",
          );
        }
      }
    }

    Ok(Some(job_id))
  }

  async fn run_job(&self, job: Job) -> Result<(), HandlerError> {
    let Some(handler) = self.registry.get(job.kind) else {
      return Err(HandlerError::UnknownKind(job.kind));
    };

    // A panicking handler must fail its job, not take the loop down.
    let future = handler(self.context.clone(), job.payload);
    match AssertUnwindSafe(future).catch_unwind().await {
      Ok(result) => result,
      Err(panic) => Err(HandlerError::Panicked(panic_message(panic.as_ref()))),
    }
  }

  /// Delete old completed jobs and requeue stalled running ones.
  pub async fn maintain(&self) -> Result<(), <S as JobStore>::Error> {
    let now = self.context.clock.now();

    let completed_cutoff = now
      - chrono::Duration::from_std(self.config.completed_retention)
        .unwrap_or_default();
    let swept = self.context.store.sweep_completed(completed_cutoff).await?;

    let stall_cutoff = now
      - chrono::Duration::from_std(self.config.stall_timeout)
        .unwrap_or_default();
    let reaped = self.context.store.reap_stalled(stall_cutoff).await?;

    if swept > 0 || reaped > 0 {
      tracing::info!(swept, reaped, "queue maintenance");
    }
    Ok(())
  }

  /// Spawn the polling loop. Jobs run back to back while any are eligible;
  /// otherwise the loop sleeps `poll_interval` between polls.
  pub fn start(self) -> SchedulerHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(self.run(shutdown_rx));
    SchedulerHandle {
      shutdown: shutdown_tx,
      task,
    }
  }

  async fn run(self, mut shutdown: watch::Receiver<bool>) {
    tracing::info!(
      poll_interval = ?self.config.poll_interval,
      "scheduler started",
    );
    let maintenance_every = self.config.maintenance_every.max(1);
    let mut polls: u32 = 0;

    loop {
      if *shutdown.borrow() {
        break;
      }

      polls = polls.wrapping_add(1);
      if polls % maintenance_every == 0 {
        if let Err(error) = self.maintain().await {
          tracing::error!(%error, "queue maintenance failed");
        }
      }

      match self.tick().await {
        Ok(Some(_)) => continue,
        Ok(None) => {
          tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(self.config.poll_interval) => {}
          }
        }
        Err(error) => {
          tracing::error!(%error, "scheduler tick failed");
          tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(self.config.poll_interval) => {}
          }
        }
      }
    }

    tracing::info!("scheduler stopped");
  }
}

// ─── SchedulerHandle ─────────────────────────────────────────────────────────

/// Handle to a running scheduler loop.
pub struct SchedulerHandle {
  shutdown: watch::Sender<bool>,
  task:     tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
  /// Signal the loop to stop, then wait for it to finish its current job.
  pub async fn shutdown(self) {
    let _ = self.shutdown.send(true);
    if let Err(error) = self.task.await {
      tracing::error!(%error, "scheduler task panicked");
    }
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_owned()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "opaque panic payload".to_owned()
  }
}
