// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The dispatcher: one queue, one writer thread, a pool of flush tasks.
//!
//! ```text
//!  callers ──enqueue/flush──┐
//!                           ▼
//!  flush timer ──Flush──► channel ──► worker thread ──add / evict──► queue
//!                                          │                          ▲
//!                                    submit flush                     │
//!                                          ▼                          │
//!                              network runtime: flush task ──read / remove
//! ```
//!
//! The worker thread is the only writer of the queue tail. Eviction on the
//! worker and the read-upload-remove sequence of a flush task both hold
//! `flush_lock`, so an eviction can never consume an element that an
//! in-flight batch is about to remove.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    thread::JoinHandle,
    time::Duration,
};

use beacon_common_runtime::{Handle, Runtime, RuntimeOptions};
use beacon_queue::{PayloadQueue, QueueBuilder, QueueError};
use crossbeam::channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use snafu::{OptionExt, ResultExt, ensure};
use tokio::{sync::oneshot, time::MissedTickBehavior};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::{
    BatchBuilder, Clock, Connectivity, DispatcherConfig, Payload, SystemClock, Uploader,
    clock::format_sent_at,
    config::{MAX_BATCH_SIZE, MAX_PAYLOAD_SIZE, MAX_QUEUE_SIZE},
    connectivity::AlwaysConnected,
    error::{QueueSnafu, Result, RuntimeSnafu, ShutdownSnafu, SpawnWorkerSnafu},
    metrics::{
        BATCHES_REJECTED, FLUSHES, PAYLOADS_DROPPED, PAYLOADS_ENQUEUED, PAYLOADS_EVICTED,
        PAYLOADS_UPLOADED, QUEUE_RESETS, QUEUE_SIZE, TRANSPORT_FAILURES, UPLOAD_DURATION_SECONDS,
    },
};

/// Lifecycle of a [`Dispatcher`]. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
#[repr(u8)]
pub enum DispatcherState {
    Running      = 0,
    ShuttingDown = 1,
    Shutdown     = 2,
}

impl DispatcherState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::ShuttingDown,
            _ => Self::Shutdown,
        }
    }
}

/// Work for the worker thread, processed strictly in send order.
enum Command {
    Enqueue(Payload),
    Flush,
    /// Answered once everything sent before it has been processed.
    Barrier(oneshot::Sender<()>),
    Stop,
}

/// State shared by the worker thread and the flush tasks.
struct DispatcherCore {
    tag:                  String,
    flush_queue_size:     usize,
    bundled_integrations: Map<String, Value>,
    queue:                Mutex<Box<dyn PayloadQueue>>,
    /// Held by every flush for its whole read-upload-remove loop, and by
    /// the worker while evicting.
    flush_lock:           tokio::sync::Mutex<()>,
    uploader:             Arc<dyn Uploader>,
    connectivity:         Arc<dyn Connectivity>,
    clock:                Arc<dyn Clock>,
    handle:               Handle,
    tracker:              TaskTracker,
}

impl DispatcherCore {
    fn should_flush(&self) -> bool {
        self.queue.lock().size() > 0 && self.connectivity.is_connected()
    }

    /// Serializes, evicts if full, and adds one payload. Returns whether the
    /// queue has reached the flush threshold.
    fn perform_enqueue(&self, payload: &Payload) -> bool {
        let bytes = match payload.to_wire(&self.bundled_integrations) {
            Ok(bytes) => bytes,
            Err(e) => {
                PAYLOADS_DROPPED.with_label_values(&[self.tag.as_str()]).inc();
                warn!(tag = %self.tag, kind = %payload.kind, error = %e, "Could not serialize payload, dropping it");
                return false;
            }
        };

        if bytes.is_empty() || bytes.len() > MAX_PAYLOAD_SIZE {
            PAYLOADS_DROPPED.with_label_values(&[self.tag.as_str()]).inc();
            warn!(
                tag = %self.tag,
                kind = %payload.kind,
                size = bytes.len(),
                max = MAX_PAYLOAD_SIZE,
                "Payload size out of bounds, dropping it"
            );
            return false;
        }

        if self.queue.lock().size() >= MAX_QUEUE_SIZE {
            self.evict_oldest();
        }

        let mut queue = self.queue.lock();
        if let Err(e) = queue.add(&bytes) {
            PAYLOADS_DROPPED.with_label_values(&[self.tag.as_str()]).inc();
            self.recover(queue.as_mut(), &e);
            return false;
        }

        let size = queue.size();
        PAYLOADS_ENQUEUED.with_label_values(&[self.tag.as_str()]).inc();
        QUEUE_SIZE.with_label_values(&[self.tag.as_str()]).set(gauge(size));
        debug!(tag = %self.tag, kind = %payload.kind, size, "Enqueued payload");
        size >= self.flush_queue_size
    }

    fn evict_oldest(&self) {
        let _flushing = self.flush_lock.blocking_lock();
        let mut queue = self.queue.lock();
        // A flush may have drained the queue while we waited for the lock.
        if queue.size() < MAX_QUEUE_SIZE {
            return;
        }

        warn!(tag = %self.tag, size = queue.size(), "Queue is at max capacity, evicting oldest payload");
        match queue.remove(1) {
            Ok(()) => PAYLOADS_EVICTED.with_label_values(&[self.tag.as_str()]).inc(),
            Err(e) => self.recover(queue.as_mut(), &e),
        }
    }

    /// Uploads batches until the queue is empty, the network is gone, or an
    /// upload fails in transit.
    async fn perform_flush(&self) {
        let _flushing = self.flush_lock.lock().await;

        while self.should_flush() {
            let batch = match self.read_batch() {
                Ok(batch) if batch.is_empty() => return,
                Ok(batch) => batch,
                Err(e) => {
                    self.recover(self.queue.lock().as_mut(), &e);
                    return;
                }
            };

            let count = batch.len();
            let size = batch.size();
            let body = batch.finish(&format_sent_at(&self.clock.now()));

            FLUSHES.with_label_values(&[self.tag.as_str()]).inc();
            let timer = UPLOAD_DURATION_SECONDS
                .with_label_values(&[self.tag.as_str()])
                .start_timer();
            let outcome = self.uploader.upload(body).await;
            timer.observe_duration();

            match outcome {
                Ok(()) => {
                    PAYLOADS_UPLOADED
                        .with_label_values(&[self.tag.as_str()])
                        .inc_by(count as u64);
                    debug!(tag = %self.tag, count, size, "Uploaded batch");
                }
                Err(e) if e.consumes_batch() => {
                    BATCHES_REJECTED.with_label_values(&[self.tag.as_str()]).inc();
                    error!(tag = %self.tag, count, error = %e, "Collector rejected batch, dropping it");
                }
                Err(e) => {
                    TRANSPORT_FAILURES.with_label_values(&[self.tag.as_str()]).inc();
                    warn!(tag = %self.tag, count, error = %e, "Upload failed, keeping batch for the next flush");
                    return;
                }
            }

            let mut queue = self.queue.lock();
            if let Err(e) = queue.remove(count) {
                self.recover(queue.as_mut(), &e);
                return;
            }
            QUEUE_SIZE
                .with_label_values(&[self.tag.as_str()])
                .set(gauge(queue.size()));
        }
    }

    fn read_batch(&self) -> Result<BatchBuilder, QueueError> {
        let mut batch = BatchBuilder::new(MAX_BATCH_SIZE);
        self.queue
            .lock()
            .for_each(&mut |element| batch.offer(element))?;
        Ok(batch)
    }

    /// Handles a failed queue operation. Corruption empties the queue.
    fn recover(&self, queue: &mut dyn PayloadQueue, error: &QueueError) {
        match error {
            QueueError::Closed { .. } => {
                debug!(tag = %self.tag, "Queue closed under a pending operation");
            }
            e if e.is_corruption() => {
                QUEUE_RESETS.with_label_values(&[self.tag.as_str()]).inc();
                error!(
                    tag = %self.tag,
                    size = queue.size(),
                    error = %e,
                    "Queue corrupted, discarding all queued payloads"
                );
                if let Err(e) = queue.clear() {
                    error!(tag = %self.tag, error = %e, "Failed to clear corrupted queue");
                }
                QUEUE_SIZE
                    .with_label_values(&[self.tag.as_str()])
                    .set(gauge(queue.size()));
            }
            e => error!(tag = %self.tag, error = %e, "Queue operation failed"),
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn gauge(size: usize) -> i64 { size as i64 }

fn submit_flush(core: &Arc<DispatcherCore>) {
    if !core.should_flush() {
        return;
    }
    let task = Arc::clone(core);
    core.tracker
        .spawn_on(async move { task.perform_flush().await }, &core.handle);
}

fn run_worker(core: &Arc<DispatcherCore>, commands: &Receiver<Command>) {
    info!(tag = %core.tag, "Dispatcher worker started");

    while let Ok(command) = commands.recv() {
        match command {
            Command::Enqueue(payload) => {
                if core.perform_enqueue(&payload) {
                    submit_flush(core);
                }
            }
            Command::Flush => submit_flush(core),
            Command::Barrier(done) => {
                let _ = done.send(());
            }
            Command::Stop => break,
        }
    }

    info!(tag = %core.tag, "Dispatcher worker stopped");
}

async fn run_timer(
    commands: Sender<Command>,
    cancel: CancellationToken,
    initial_delay: Duration,
    period: Duration,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + initial_delay, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if commands.send(Command::Flush).is_err() {
                    break;
                }
            }
            () = cancel.cancelled() => break,
        }
    }
}

/// A reopened queue already at the threshold is flushed right away.
fn initial_flush_delay(size: usize, config: &DispatcherConfig) -> Duration {
    if size >= config.flush_queue_size {
        Duration::ZERO
    } else {
        config.flush_interval
    }
}

/// Persists payloads for one tag and drains them to an [`Uploader`].
///
/// ```no_run
/// # use std::sync::Arc;
/// # use beacon_dispatcher::{Dispatcher, DispatcherConfig, Payload, Uploader};
/// # fn run(uploader: Arc<dyn Uploader>) -> beacon_dispatcher::Result<()> {
/// let dispatcher = Dispatcher::builder()
///     .config(DispatcherConfig::new("mobile", "/var/lib/app/beacon"))
///     .uploader(uploader)
///     .build()?;
///
/// dispatcher.enqueue(Payload::track("Signed Up"))?;
/// dispatcher.shutdown()?;
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    core:     Arc<DispatcherCore>,
    config:   DispatcherConfig,
    state:    AtomicU8,
    commands: Mutex<Option<Sender<Command>>>,
    worker:   Mutex<Option<JoinHandle<()>>>,
    cancel:   CancellationToken,
    /// Set when the dispatcher built its own network runtime.
    runtime:  Mutex<Option<Runtime>>,
}

#[bon::bon]
impl Dispatcher {
    /// Opens the queue for `config.tag` and starts the worker and the flush
    /// timer.
    ///
    /// Without `handle`, flushes run on a dedicated two-thread runtime.
    /// An injected `handle` must belong to a multi-thread runtime. Without
    /// `queue`, the durable queue under `config.directory` is opened,
    /// falling back to memory if the file is unusable.
    #[builder]
    pub fn new(
        config: DispatcherConfig,
        uploader: Arc<dyn Uploader>,
        connectivity: Option<Arc<dyn Connectivity>>,
        clock: Option<Arc<dyn Clock>>,
        handle: Option<Handle>,
        queue: Option<Box<dyn PayloadQueue>>,
    ) -> Result<Self> {
        config.validate()?;

        let queue = queue.unwrap_or_else(|| {
            QueueBuilder::new(config.directory.clone())
                .tag(config.tag.as_str())
                .open_or_fallback()
        });
        let size = queue.size();

        let (runtime, handle) = match handle {
            Some(handle) => (None, handle),
            None => {
                let runtime = RuntimeOptions::network(&config.tag)
                    .create()
                    .context(RuntimeSnafu)?;
                let handle = runtime.handle().clone();
                (Some(runtime), handle)
            }
        };

        let core = Arc::new(DispatcherCore {
            tag: config.tag.clone(),
            flush_queue_size: config.flush_queue_size,
            bundled_integrations: config.bundled_integrations.clone(),
            queue: Mutex::new(queue),
            flush_lock: tokio::sync::Mutex::new(()),
            uploader,
            connectivity: connectivity.unwrap_or_else(|| Arc::new(AlwaysConnected)),
            clock: clock.unwrap_or_else(|| Arc::new(SystemClock)),
            handle: handle.clone(),
            tracker: TaskTracker::new(),
        });

        let (tx, rx) = unbounded();
        let spawned = std::thread::Builder::new()
            .name(format!("beacon-dispatch-{}", config.tag))
            .spawn({
                let core = Arc::clone(&core);
                move || run_worker(&core, &rx)
            })
            .context(SpawnWorkerSnafu {
                tag: config.tag.as_str(),
            });
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                if let Some(runtime) = runtime {
                    runtime.shutdown_background();
                }
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        handle.spawn(run_timer(
            tx.clone(),
            cancel.clone(),
            initial_flush_delay(size, &config),
            config.flush_interval,
        ));

        QUEUE_SIZE
            .with_label_values(&[config.tag.as_str()])
            .set(gauge(size));
        info!(
            tag = %config.tag,
            size,
            flush_queue_size = config.flush_queue_size,
            flush_interval = ?config.flush_interval,
            "Dispatcher started"
        );

        Ok(Self {
            core,
            config,
            state: AtomicU8::new(DispatcherState::Running as u8),
            commands: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
            cancel,
            runtime: Mutex::new(runtime),
        })
    }
}

impl Dispatcher {
    pub fn tag(&self) -> &str { &self.config.tag }

    pub const fn config(&self) -> &DispatcherConfig { &self.config }

    pub fn state(&self) -> DispatcherState {
        DispatcherState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Number of queued payloads.
    pub fn size(&self) -> usize { self.core.queue.lock().size() }

    /// Queues `payload` for upload. Returns once the command is handed to
    /// the worker; the payload may still be dropped there if it is invalid.
    pub fn enqueue(&self, payload: Payload) -> Result<()> { self.send(Command::Enqueue(payload)) }

    /// Requests a flush regardless of queue size.
    pub fn flush(&self) -> Result<()> { self.send(Command::Flush) }

    /// Resolves once every command submitted before this call has been
    /// processed by the worker.
    pub async fn sync(&self) -> Result<()> {
        let (done, processed) = oneshot::channel();
        self.send(Command::Barrier(done))?;
        processed
            .await
            .ok()
            .context(ShutdownSnafu { tag: self.tag() })
    }

    /// [`sync`](Self::sync), then waits for all flushes started so far.
    pub async fn idle(&self) -> Result<()> {
        self.sync().await?;
        self.core.tracker.close();
        self.core.tracker.wait().await;
        if self.state() == DispatcherState::Running {
            self.core.tracker.reopen();
        }
        Ok(())
    }

    fn send(&self, command: Command) -> Result<()> {
        ensure!(
            self.state() == DispatcherState::Running,
            ShutdownSnafu { tag: self.tag() }
        );
        let commands = self.commands.lock();
        let sender = commands.as_ref().context(ShutdownSnafu { tag: self.tag() })?;
        sender
            .send(command)
            .ok()
            .context(ShutdownSnafu { tag: self.tag() })
    }

    /// Stops the timer and the worker, then closes the queue.
    ///
    /// Commands already submitted are processed first. Flushes in flight are
    /// not awaited; whatever they did not remove stays queued on disk.
    /// Calling this again is a no-op.
    pub fn shutdown(&self) -> Result<()> {
        if self
            .state
            .compare_exchange(
                DispatcherState::Running as u8,
                DispatcherState::ShuttingDown as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Ok(());
        }
        info!(tag = %self.config.tag, "Shutting down dispatcher");

        self.cancel.cancel();
        if let Some(commands) = self.commands.lock().take() {
            let _ = commands.send(Command::Stop);
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                error!(tag = %self.config.tag, "Dispatcher worker panicked");
            }
        }
        self.core.tracker.close();

        let closed = self.core.queue.lock().close();
        if let Some(runtime) = self.runtime.lock().take() {
            runtime.shutdown_background();
        }

        self.state
            .store(DispatcherState::Shutdown as u8, Ordering::Release);
        info!(tag = %self.config.tag, "Dispatcher shut down");
        closed.context(QueueSnafu {
            directory: &self.config.directory,
        })
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(tag = %self.config.tag, error = %e, "Dispatcher shutdown on drop failed");
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tag", &self.config.tag)
            .field("state", &self.state())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}
