//! Background execution of image-generation tasks.
//!
//! [`GenerationOrchestrator::submit`] reserves a slot in a bounded queue,
//! writes the `PROCESSING` row and returns its id at once. A dispatch loop
//! pulls jobs off the queue and runs at most `concurrency` of them at a time;
//! each job ends with exactly one guarded terminal write.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::ai::client::{ChatRequest, GenerationClient, ImageRequest};
use crate::ai::error::{AiError, SubmitError};
use crate::ai::materialize::{MaterializedAsset, Materializer};
use crate::ai::settings::{GenerationSettings, SettingsResolver};
use crate::entities::{SqliteStore, TaskStore};

pub const RESTART_MESSAGE: &str = "interrupted by server restart";
pub const STALE_MESSAGE: &str = "task timed out";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub queue_capacity: usize,
    pub concurrency: usize,
    pub mock_delay: Duration,
    pub mock_image_url: String,
}

/// A caller's generation request.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    pub prompt: String,
    pub user_id: Option<i64>,
    pub model: Option<String>,
    pub aspect_ratio: Option<String>,
}

#[derive(Debug)]
struct GenerationJob {
    task_id: i64,
    prompt: String,
    aspect_ratio: Option<String>,
    settings: GenerationSettings,
}

/// Everything a running job needs; shared by all jobs.
struct Worker {
    store: Arc<SqliteStore>,
    client: GenerationClient,
    materializer: Materializer,
    mock_delay: Duration,
    mock_image_url: String,
}

/// Handle to the generation queue. Cheap to clone.
#[derive(Clone)]
pub struct GenerationOrchestrator {
    tx: mpsc::Sender<GenerationJob>,
    store: Arc<SqliteStore>,
    settings: Arc<SettingsResolver>,
}

impl std::fmt::Debug for GenerationOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationOrchestrator")
            .field("queue_free", &self.tx.capacity())
            .finish()
    }
}

impl GenerationOrchestrator {
    /// Spawn the dispatch loop and return a submission handle.
    pub fn start(
        config: OrchestratorConfig,
        store: Arc<SqliteStore>,
        settings: Arc<SettingsResolver>,
        client: GenerationClient,
        materializer: Materializer,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let worker = Arc::new(Worker {
            store: Arc::clone(&store),
            client,
            materializer,
            mock_delay: config.mock_delay,
            mock_image_url: config.mock_image_url,
        });
        let slots = Arc::new(Semaphore::new(config.concurrency.max(1)));
        tokio::spawn(Self::run_loop(rx, worker, slots));

        Self {
            tx,
            store,
            settings,
        }
    }

    /// Queue a generation and return the new task id without waiting on it.
    ///
    /// The queue slot is reserved before the row is written, so a full queue
    /// leaves no orphaned `PROCESSING` row behind.
    pub async fn submit(&self, req: GenerationRequest) -> Result<i64, SubmitError> {
        let slot = self.tx.try_reserve().map_err(|e| match e {
            mpsc::error::TrySendError::Full(()) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(()) => SubmitError::Closed,
        })?;

        let settings = self.settings.generation(req.model.as_deref()).await;
        let task_id = self
            .store
            .insert_task(req.user_id, &req.prompt, &settings.model)
            .await?;
        info!(
            task_id,
            model = %settings.model,
            mock = settings.api_key.is_none(),
            "generation task queued"
        );

        slot.send(GenerationJob {
            task_id,
            prompt: req.prompt,
            aspect_ratio: req.aspect_ratio,
            settings,
        });
        Ok(task_id)
    }

    async fn run_loop(
        mut rx: mpsc::Receiver<GenerationJob>,
        worker: Arc<Worker>,
        slots: Arc<Semaphore>,
    ) {
        // A job leaves the queue only once a worker slot is free, so queued
        // jobs keep counting against the queue bound.
        loop {
            let Ok(permit) = Arc::clone(&slots).acquire_owned().await else {
                break;
            };
            let Some(job) = rx.recv().await else {
                break;
            };
            let worker = Arc::clone(&worker);
            tokio::spawn(async move {
                let task_id = job.task_id;
                let run = tokio::spawn({
                    let worker = Arc::clone(&worker);
                    async move { worker.run(job).await }
                });
                if let Err(e) = run.await {
                    error!(task_id, error = %e, "generation job aborted");
                    worker.finalize_failed(task_id, "internal error").await;
                }
                drop(permit);
            });
        }
        info!("generation dispatch loop stopped");
    }
}

impl Worker {
    async fn run(&self, job: GenerationJob) {
        // The sweeper or an admin delete may have settled the row while the
        // job sat in the queue; do not pay for an upstream call then.
        match self.store.get_task(job.task_id).await {
            Ok(Some(task)) if !task.status().is_terminal() => {}
            Ok(_) => {
                info!(task_id = job.task_id, "task settled while queued; skipping");
                return;
            }
            Err(e) => warn!(task_id = job.task_id, error = %e, "could not re-check task status"),
        }

        match self.produce(&job).await {
            Ok(asset) => {
                match self
                    .store
                    .complete_task(job.task_id, &asset.asset_url, &asset.thumb_url)
                    .await
                {
                    Ok(true) => info!(task_id = job.task_id, url = %asset.asset_url, "generation completed"),
                    Ok(false) => warn!(task_id = job.task_id, "task already finalized; result dropped"),
                    Err(e) => error!(task_id = job.task_id, error = %e, "failed to record completion"),
                }
            }
            Err(e) => {
                warn!(task_id = job.task_id, error = %e, "generation failed");
                self.finalize_failed(job.task_id, &e.to_string()).await;
            }
        }
    }

    async fn produce(&self, job: &GenerationJob) -> Result<MaterializedAsset, AiError> {
        let settings = &job.settings;
        let remote_url = match settings.api_key.as_deref() {
            None => {
                info!(task_id = job.task_id, delay_ms = self.mock_delay.as_millis() as u64, "no API key; using placeholder result");
                tokio::time::sleep(self.mock_delay).await;
                self.mock_image_url.clone()
            }
            Some(api_key) if settings.use_chat => {
                self.client
                    .generate_image_via_chat(ChatRequest {
                        endpoint: &settings.endpoint,
                        api_key: Some(api_key),
                        model: &settings.model,
                        prompt: &job.prompt,
                    })
                    .await?
            }
            Some(api_key) => {
                self.client
                    .generate_image(ImageRequest {
                        endpoint: &settings.endpoint,
                        api_key: Some(api_key),
                        model: &settings.model,
                        prompt: &job.prompt,
                        aspect_ratio: job.aspect_ratio.as_deref(),
                    })
                    .await?
            }
        };
        Ok(self.materializer.materialize_or_passthrough(&remote_url).await)
    }

    async fn finalize_failed(&self, task_id: i64, message: &str) {
        match self.store.fail_task(task_id, message).await {
            Ok(true) => {}
            Ok(false) => warn!(task_id, "task already finalized; failure dropped"),
            Err(e) => error!(task_id, error = %e, "failed to record failure"),
        }
    }
}

/// Fail every `PROCESSING` row left over from a previous process.
pub async fn recover_interrupted(store: &SqliteStore) -> Result<u64, sqlx::Error> {
    let n = store.fail_stale_tasks(None, RESTART_MESSAGE).await?;
    if n > 0 {
        warn!(count = n, "marked interrupted generation tasks as failed");
    }
    Ok(n)
}

/// Periodically fail `PROCESSING` rows older than `stale_after`.
///
/// Returns `None` when `interval` is zero (sweeping disabled).
pub fn spawn_sweeper(
    store: Arc<SqliteStore>,
    stale_after: Duration,
    interval: Duration,
) -> Option<JoinHandle<()>> {
    if interval.is_zero() {
        return None;
    }
    let stale_after = TimeDelta::from_std(stale_after).unwrap_or(TimeDelta::MAX);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let Some(cutoff) = Utc::now().checked_sub_signed(stale_after) else {
                continue;
            };
            match store.fail_stale_tasks(Some(cutoff), STALE_MESSAGE).await {
                Ok(0) => {}
                Ok(n) => warn!(count = n, "failed stale generation tasks"),
                Err(e) => error!(error = %e, "stale task sweep failed"),
            }
        }
    }))
}
