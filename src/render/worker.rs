// Worker de rendu en arrière-plan
//
// Une seule requête est active à la fois : une nouvelle requête annule la
// précédente. Chaque requête reçoit un numéro de génération croissant ; seul
// un rendu terminé et non remplacé est publié. Les consommateurs lisent le
// dernier rendu publié (immuable) et les notifications via un ringbuffer.

use crate::history::log::OperationLog;
use crate::messaging::channels::{
    NotificationConsumer, NotificationProducer, create_notification_channel,
};
use crate::messaging::notification::{Notification, RenderStatus};
use crate::render::cancel::CancelToken;
use crate::render::engine::{RenderEngine, RenderError, RenderOutput};
use crate::timeline::TimelineState;
use ringbuf::traits::{Consumer, Producer};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// A completed render, tagged with the request that produced it
#[derive(Debug, Clone)]
pub struct PublishedRender {
    pub generation: u64,
    pub output: Arc<RenderOutput>,
}

struct RenderJob {
    generation: u64,
    log: OperationLog,
    base: Arc<TimelineState>,
    cancel: CancelToken,
}

#[derive(Default)]
struct Published {
    latest: Option<PublishedRender>,
    /// Highest generation that reached a final status
    settled: u64,
    last_error: Option<(u64, RenderError)>,
}

struct Shared {
    published: Mutex<Published>,
    changed: Condvar,
    generation: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Published> {
        self.published.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn settle(&self, generation: u64, update: impl FnOnce(&mut Published)) {
        let mut published = self.lock();
        update(&mut published);
        published.settled = published.settled.max(generation);
        self.changed.notify_all();
    }
}

/// Background renderer for the latest requested log
pub struct RenderWorker {
    jobs: Option<Sender<RenderJob>>,
    shared: Arc<Shared>,
    current: Mutex<Option<CancelToken>>,
    notifications: NotificationConsumer,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Start the worker thread
    pub fn spawn(engine: Arc<RenderEngine>, notification_capacity: usize) -> std::io::Result<Self> {
        let (jobs_tx, jobs_rx) = mpsc::channel();
        let (notif_tx, notif_rx) = create_notification_channel(notification_capacity);
        let shared = Arc::new(Shared {
            published: Mutex::new(Published::default()),
            changed: Condvar::new(),
            generation: AtomicU64::new(0),
        });

        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("render-worker".to_string())
            .spawn(move || run(engine, jobs_rx, thread_shared, notif_tx))?;

        Ok(Self {
            jobs: Some(jobs_tx),
            shared,
            current: Mutex::new(None),
            notifications: notif_rx,
            handle: Some(handle),
        })
    }

    /// Queue a render of `log` and cancel any render still in flight
    ///
    /// Returns the generation of the new request.
    pub fn request(&self, log: OperationLog, base: Arc<TimelineState>) -> u64 {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancelToken::new();

        {
            let mut current = self.current.lock().unwrap_or_else(|p| p.into_inner());
            if let Some(previous) = current.replace(cancel.clone()) {
                previous.cancel();
            }
        }

        let job = RenderJob {
            generation,
            log,
            base,
            cancel,
        };
        let sent = self.jobs.as_ref().is_some_and(|tx| tx.send(job).is_ok());
        if !sent {
            log::warn!("Render worker stopped, request {} dropped", generation);
            self.shared.settle(generation, |_| {});
        }
        generation
    }

    /// Cancel the render in flight, if any
    pub fn cancel(&self) {
        let current = self.current.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(token) = current.as_ref() {
            token.cancel();
        }
    }

    /// Last generation handed out by `request`
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Most recent completed render
    pub fn latest(&self) -> Option<PublishedRender> {
        self.shared.lock().latest.clone()
    }

    /// Error of the most recent failed request
    pub fn last_error(&self) -> Option<(u64, RenderError)> {
        self.shared.lock().last_error.clone()
    }

    /// Block until `generation` has settled (published, superseded or failed)
    ///
    /// Returns false on timeout.
    pub fn wait_for(&self, generation: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut published = self.shared.lock();
        while published.settled < generation {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            published = match self.shared.changed.wait_timeout(published, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }

    pub fn try_recv_notification(&mut self) -> Option<Notification> {
        self.notifications.try_pop()
    }

    /// Stop the thread after the queued jobs drain
    pub fn shutdown(&mut self) {
        self.cancel();
        self.jobs.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Render worker thread panicked");
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(
    engine: Arc<RenderEngine>,
    jobs: Receiver<RenderJob>,
    shared: Arc<Shared>,
    mut notifications: NotificationProducer,
) {
    log::debug!("Render worker started");
    let mut notify = |notification: Notification| {
        // Ringbuffer plein : la notification la plus récente est perdue
        if notifications.try_push(notification).is_err() {
            log::debug!("Notification ring full, dropping render notification");
        }
    };

    while let Ok(mut job) = jobs.recv() {
        // Ne garder que la requête la plus récente
        while let Ok(newer) = jobs.try_recv() {
            superseded(&shared, &mut notify, job.generation);
            job = newer;
        }

        if job.cancel.is_cancelled() || job.generation < shared.generation.load(Ordering::SeqCst) {
            superseded(&shared, &mut notify, job.generation);
            continue;
        }

        let started = Instant::now();
        match engine.render_with_cancel(&job.log, &job.base, &job.cancel) {
            Ok(output) if !job.cancel.is_cancelled() => {
                let samples = output.buffer.len();
                let orphaned = output.orphaned.len();
                log::info!(
                    "Render {} completed: {} samples in {:?}",
                    job.generation,
                    samples,
                    started.elapsed()
                );
                shared.settle(job.generation, |p| {
                    p.latest = Some(PublishedRender {
                        generation: job.generation,
                        output: Arc::new(output),
                    });
                });
                notify(Notification::render(
                    job.generation,
                    RenderStatus::Completed { samples, orphaned },
                    format!("Render complete ({} samples)", samples),
                ));
            }
            Ok(_) | Err(RenderError::Cancelled) => {
                superseded(&shared, &mut notify, job.generation);
            }
            Err(e) => {
                log::error!("Render {} failed: {}", job.generation, e);
                let message = format!("Render failed: {}", e);
                shared.settle(job.generation, |p| p.last_error = Some((job.generation, e)));
                notify(Notification::render(job.generation, RenderStatus::Failed, message));
            }
        }
    }
    log::debug!("Render worker stopped");
}

fn superseded(shared: &Shared, notify: &mut impl FnMut(Notification), generation: u64) {
    log::debug!("Render {} superseded", generation);
    shared.settle(generation, |_| {});
    notify(Notification::render(
        generation,
        RenderStatus::Superseded,
        "Render superseded".to_string(),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::buffer::SampleBuffer;
    use crate::effect::EffectRegistry;
    use crate::render::engine::RenderSettings;
    use crate::timeline::ClipIdAllocator;

    fn worker() -> (RenderWorker, Arc<TimelineState>) {
        let engine = Arc::new(RenderEngine::new(
            Arc::new(EffectRegistry::with_builtins()),
            RenderSettings::default(),
        ));
        let mut ids = ClipIdAllocator::default();
        let base = SampleBuffer::from_mono(vec![0.25; 256], 1000).unwrap();
        let base = Arc::new(TimelineState::from_base(base, &mut ids));
        (RenderWorker::spawn(engine, 16).unwrap(), base)
    }

    #[test]
    fn test_request_publishes_render() {
        let (mut worker, base) = worker();
        let generation = worker.request(OperationLog::new(), Arc::clone(&base));
        assert_eq!(generation, 1);
        assert!(worker.wait_for(generation, Duration::from_secs(5)));

        let latest = worker.latest().unwrap();
        assert_eq!(latest.generation, 1);
        assert_eq!(latest.output.buffer, base.render());

        let notification = worker.try_recv_notification().unwrap();
        assert_eq!(notification.generation, 1);
        assert_eq!(
            notification.status,
            RenderStatus::Completed {
                samples: 256,
                orphaned: 0
            }
        );
    }

    #[test]
    fn test_newer_request_wins() {
        let (worker, base) = worker();
        let mut last = 0;
        for _ in 0..5 {
            last = worker.request(OperationLog::new(), Arc::clone(&base));
        }
        assert!(worker.wait_for(last, Duration::from_secs(5)));
        assert_eq!(worker.latest().map(|r| r.generation), Some(last));
        assert_eq!(worker.generation(), 5);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (mut worker, _) = worker();
        worker.shutdown();
        worker.shutdown();
        assert!(worker.latest().is_none());
    }
}
