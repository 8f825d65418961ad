//! Background preview workers.
//!
//! Each worker owns a FIFO queue; new tasks go to the shortest one. Workers
//! report on a channel instead of touching caller state:
//!
//! ```text
//! submit → least-loaded queue → worker → transcoder → Completed/Failed
//!                                                    → Progress → AllComplete
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::transcoder::{GifOptions, Transcoder};
use crate::config::Config;

/// Seconds into a video its still thumbnail is taken from.
const VIDEO_THUMBNAIL_TIME: f64 = 1.0;

/// Kind of preview a task renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum PreviewMedia {
    /// Still thumbnail of an image
    Image,
    /// Still thumbnail from a printf-style sequence pattern
    Sequence { start_frame: Option<u64> },
    /// Still thumbnail of a video
    Video,
    /// Animated GIF of a video
    Gif,
}

/// One preview request. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewTask {
    pub element_id: i64,
    pub source: PathBuf,
    pub output: PathBuf,
    pub media: PreviewMedia,
}

/// Notifications emitted by the pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum PreviewEvent {
    /// The task ran; `success` tells whether the preview was written.
    Completed {
        element_id: i64,
        output: PathBuf,
        success: bool,
    },
    /// The task panicked or was aborted.
    Failed { element_id: i64, error: String },
    Progress { completed: usize, total: usize },
    /// Everything submitted so far has finished.
    AllComplete,
}

/// Pool-wide counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolProgress {
    pub total: usize,
    pub completed: usize,
}

/// Rendering parameters shared by all workers.
#[derive(Debug, Clone)]
struct RenderSettings {
    size: u32,
    gif: GifOptions,
}

struct WorkerQueue {
    tasks: Mutex<VecDeque<PreviewTask>>,
    notify: Notify,
}

struct Shared {
    transcoder: Transcoder,
    settings: RenderSettings,
    progress: Mutex<PoolProgress>,
    events: mpsc::UnboundedSender<PreviewEvent>,
    poll_interval: Duration,
    shutdown: CancellationToken,
}

/// Fixed-size pool of preview workers.
pub struct PreviewPool {
    queues: Vec<Arc<WorkerQueue>>,
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl PreviewPool {
    /// Start `workers` workers. Events arrive on the returned receiver.
    pub fn start(
        transcoder: Transcoder,
        config: &Config,
    ) -> (Self, mpsc::UnboundedReceiver<PreviewEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            transcoder,
            settings: RenderSettings {
                size: config.preview.size,
                gif: GifOptions::from_config(&config.gif, config.sequence.fps),
            },
            progress: Mutex::new(PoolProgress::default()),
            events,
            poll_interval: Duration::from_millis(config.workers.poll_interval_ms),
            shutdown: CancellationToken::new(),
        });

        let count = config.workers.count.max(1);
        let queues: Vec<Arc<WorkerQueue>> = (0..count)
            .map(|_| {
                Arc::new(WorkerQueue {
                    tasks: Mutex::new(VecDeque::new()),
                    notify: Notify::new(),
                })
            })
            .collect();
        let handles = queues
            .iter()
            .enumerate()
            .map(|(id, queue)| tokio::spawn(worker_loop(id, queue.clone(), shared.clone())))
            .collect();

        tracing::debug!(workers = count, "Preview pool started");
        (
            Self {
                queues,
                shared,
                handles,
            },
            receiver,
        )
    }

    /// Queue a task on the worker with the fewest pending tasks.
    pub fn submit(&self, task: PreviewTask) {
        let Some(queue) = self.queues.iter().min_by_key(|q| q.tasks.lock().len()) else {
            return;
        };
        self.shared.progress.lock().total += 1;
        queue.tasks.lock().push_back(task);
        queue.notify.notify_one();
    }

    pub fn progress(&self) -> PoolProgress {
        *self.shared.progress.lock()
    }

    /// Pending tasks per worker.
    pub fn queue_lengths(&self) -> Vec<usize> {
        self.queues.iter().map(|q| q.tasks.lock().len()).collect()
    }

    /// Drop every task not yet claimed by a worker. Returns how many.
    pub fn clear_pending(&self) -> usize {
        let removed: usize = self
            .queues
            .iter()
            .map(|q| {
                let mut tasks = q.tasks.lock();
                let n = tasks.len();
                tasks.clear();
                n
            })
            .sum();

        let mut progress = self.shared.progress.lock();
        progress.total = progress.total.saturating_sub(removed);
        if progress.completed >= progress.total {
            *progress = PoolProgress::default();
        }
        tracing::debug!(removed, "Cleared pending previews");
        removed
    }

    /// Discard pending tasks, let in-flight ones finish, and join every worker.
    pub async fn stop(self) {
        self.clear_pending();
        self.shared.shutdown.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Preview worker ended abnormally");
            }
        }
        tracing::debug!("Preview pool stopped");
    }
}

async fn worker_loop(id: usize, queue: Arc<WorkerQueue>, shared: Arc<Shared>) {
    loop {
        if shared.shutdown.is_cancelled() {
            break;
        }
        let next = queue.tasks.lock().pop_front();
        let Some(task) = next else {
            tokio::select! {
                _ = queue.notify.notified() => {}
                _ = tokio::time::sleep(shared.poll_interval) => {}
                _ = shared.shutdown.cancelled() => break,
            }
            continue;
        };

        tracing::debug!(worker = id, element_id = task.element_id, "Rendering preview");
        let element_id = task.element_id;
        let output = task.output.clone();
        // A panic inside the render surfaces as a JoinError.
        let runner = shared.clone();
        let event = match tokio::spawn(async move { render(&runner, &task).await }).await {
            Ok(success) => PreviewEvent::Completed {
                element_id,
                output,
                success,
            },
            Err(e) => PreviewEvent::Failed {
                element_id,
                error: e.to_string(),
            },
        };
        if let PreviewEvent::Failed { ref error, .. } = event {
            tracing::error!(worker = id, element_id, %error, "Preview task failed");
        }
        let _ = shared.events.send(event);
        finish_one(&shared);
    }
    tracing::debug!(worker = id, "Preview worker exiting");
}

async fn render(shared: &Shared, task: &PreviewTask) -> bool {
    let transcoder = &shared.transcoder;
    let size = shared.settings.size;
    match task.media {
        PreviewMedia::Image => {
            transcoder
                .thumbnail(&task.source, &task.output, size, Some(0.0))
                .await
        }
        PreviewMedia::Sequence { start_frame } => {
            transcoder
                .sequence_thumbnail(&task.source, &task.output, size, start_frame)
                .await
        }
        PreviewMedia::Video => {
            transcoder
                .thumbnail(&task.source, &task.output, size, Some(VIDEO_THUMBNAIL_TIME))
                .await
        }
        PreviewMedia::Gif => {
            transcoder
                .gif_preview(&task.source, &task.output, &shared.settings.gif)
                .await
        }
    }
}

fn finish_one(shared: &Shared) {
    let mut progress = shared.progress.lock();
    progress.completed += 1;
    let _ = shared.events.send(PreviewEvent::Progress {
        completed: progress.completed,
        total: progress.total,
    });
    if progress.completed >= progress.total {
        *progress = PoolProgress::default();
        let _ = shared.events.send(PreviewEvent::AllComplete);
    }
}
