// Clustering worker host
// Owns one dedicated OS thread running the clustering engine. The thread is
// spawned on first use, talks to the host only through channels, and is torn
// down after an idle window with no active task.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread;

use facegroup_core::{now_ms, AssignmentDelta, CreationTimes, FaceClusteringEngine, FaceInput};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::WorkerConfig;
use crate::message::{WorkerEnvelope, WorkerFault, WorkerReply, WorkerRequest, WorkerResponse};
use crate::{Error, Result};

/// Lifecycle of the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    NotSpawned,
    Spawned,
    Running,
    Draining,
}

/// What the idle timer did when it fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IdleOutcome {
    Terminated,
    Rescheduled,
    NotSpawned,
}

struct WorkerLink {
    requests: mpsc::UnboundedSender<WorkerEnvelope>,
    thread: thread::JoinHandle<()>,
}

struct HostState {
    phase: WorkerPhase,
    running: bool,
    active_tasks: usize,
    spawn_count: u64,
    link: Option<WorkerLink>,
    idle_timer: Option<JoinHandle<()>>,
}

struct HostInner {
    config: WorkerConfig,
    engine: FaceClusteringEngine,
    state: Mutex<HostState>,
    // collapses concurrent spawn attempts into one
    spawn_lock: tokio::sync::Mutex<()>,
}

/// Handle to the clustering worker. Cloning shares the same worker.
#[derive(Clone)]
pub struct WorkerHost {
    inner: Arc<HostInner>,
}

/// Holds the single-flight flag. Once a task is dispatched it moves into the
/// reply watcher, so only the worker's reply releases it.
struct FlightGuard {
    inner: Arc<HostInner>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inner.state.lock().running = false;
    }
}

/// One dispatched task, counted until its reply arrives
struct TaskGuard {
    inner: Arc<HostInner>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock();
        state.active_tasks = state.active_tasks.saturating_sub(1);
        if state.active_tasks == 0 && state.phase == WorkerPhase::Running {
            state.phase = WorkerPhase::Spawned;
        }
    }
}

impl WorkerHost {
    pub fn new(engine: FaceClusteringEngine, config: WorkerConfig) -> Self {
        Self {
            inner: Arc::new(HostInner {
                config,
                engine,
                state: Mutex::new(HostState {
                    phase: WorkerPhase::NotSpawned,
                    running: false,
                    active_tasks: 0,
                    spawn_count: 0,
                    link: None,
                    idle_timer: None,
                }),
                spawn_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn phase(&self) -> WorkerPhase {
        self.inner.state.lock().phase
    }

    pub fn is_running(&self) -> bool {
        self.inner.state.lock().running
    }

    pub fn active_tasks(&self) -> usize {
        self.inner.state.lock().active_tasks
    }

    /// Number of worker threads started over the host's lifetime
    pub fn spawn_count(&self) -> u64 {
        self.inner.state.lock().spawn_count
    }

    /// Start the worker thread unless it is already up
    pub async fn ensure_spawned(&self) -> Result<()> {
        if self.inner.state.lock().link.is_some() {
            self.reset_idle_timer();
            return Ok(());
        }

        let _spawning = self.inner.spawn_lock.lock().await;
        if self.inner.state.lock().link.is_some() {
            self.reset_idle_timer();
            return Ok(());
        }

        let link = match self.spawn_worker().await {
            Ok(link) => link,
            Err(e) => {
                error!(error = %e, "failed to spawn clustering worker");
                return Err(e);
            }
        };

        let spawned = {
            let mut state = self.inner.state.lock();
            state.link = Some(link);
            state.phase = WorkerPhase::Spawned;
            state.spawn_count += 1;
            state.spawn_count
        };
        self.reset_idle_timer();
        info!(spawn = spawned, "clustering worker spawned");
        Ok(())
    }

    async fn spawn_worker(&self) -> Result<WorkerLink> {
        let (boot_tx, boot_rx) = oneshot::channel();
        let engine = self.inner.engine.clone();

        let thread = thread::Builder::new()
            .name(self.inner.config.thread_name.clone())
            .spawn(move || worker_main(engine, boot_tx))
            .map_err(|e| Error::Spawn(e.to_string()))?;

        // the worker answers the handshake with the sender of its request channel
        let requests = match tokio::time::timeout(self.inner.config.spawn_timeout(), boot_rx).await {
            Ok(Ok(requests)) => requests,
            Ok(Err(_)) => return Err(Error::Spawn("worker exited during handshake".to_string())),
            Err(_) => return Err(Error::Spawn("worker handshake timed out".to_string())),
        };

        Ok(WorkerLink { requests, thread })
    }

    /// Run one clustering task on the worker.
    ///
    /// Returns `Ok(None)` without doing anything when a run is already in
    /// flight. Faults raised inside the worker come back as
    /// [`Error::Execution`].
    pub async fn run_clustering(
        &self,
        faces: Vec<FaceInput>,
        creation_times: Option<CreationTimes>,
    ) -> Result<Option<AssignmentDelta>> {
        // claimed before the first await so a concurrent caller sees it
        let Some(flight) = self.try_begin_run() else {
            debug!("clustering already in flight, rejecting run");
            return Ok(None);
        };

        self.ensure_spawned().await?;

        let (envelope, reply_rx) = WorkerEnvelope::new(WorkerRequest::RunClustering {
            faces,
            creation_times,
        });
        let request_id = envelope.request_id;

        let dispatched = {
            let mut state = self.inner.state.lock();
            let sent = match state.link.as_ref() {
                Some(link) => link.requests.send(envelope).is_ok(),
                None => false,
            };
            if sent {
                state.active_tasks += 1;
                state.phase = WorkerPhase::Running;
            }
            sent
        };
        if !dispatched {
            error!(%request_id, "clustering worker is not accepting requests");
            self.dispose();
            return Err(Error::WorkerGone);
        }
        let task = TaskGuard {
            inner: Arc::clone(&self.inner),
        };
        self.reset_idle_timer();
        debug!(%request_id, "clustering task dispatched");

        // the caller may go away; the guards stay with the reply
        let (result_tx, result_rx) = oneshot::channel();
        let host = self.clone();
        tokio::spawn(async move {
            let result = host.await_reply(request_id, reply_rx).await;
            drop(task);
            drop(flight);
            if result_tx.send(result).is_err() {
                debug!(%request_id, "caller stopped waiting, reply discarded");
            }
        });

        result_rx.await.unwrap_or(Err(Error::WorkerGone))
    }

    async fn await_reply(
        &self,
        request_id: Uuid,
        reply_rx: oneshot::Receiver<WorkerReply>,
    ) -> Result<Option<AssignmentDelta>> {
        match reply_rx.await {
            Ok(Ok(WorkerResponse::Clustered(delta))) => Ok(Some(delta)),
            Ok(Ok(other)) => Err(Error::UnexpectedResponse(format!("{other:?}"))),
            Ok(Err(WorkerFault { error, stack_trace })) => {
                warn!(%request_id, %error, "clustering task failed");
                Err(Error::Execution {
                    message: error,
                    stack_trace,
                })
            }
            Err(_) => {
                error!(%request_id, "clustering worker dropped the reply channel");
                self.dispose();
                Err(Error::WorkerGone)
            }
        }
    }

    fn try_begin_run(&self) -> Option<FlightGuard> {
        let mut state = self.inner.state.lock();
        if state.running {
            return None;
        }
        state.running = true;
        Some(FlightGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    fn reset_idle_timer(&self) {
        let weak: Weak<HostInner> = Arc::downgrade(&self.inner);
        let idle = self.inner.config.idle_timeout();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            if let Some(inner) = weak.upgrade() {
                WorkerHost { inner }.on_idle_timeout();
            }
        });

        if let Some(previous) = self.inner.state.lock().idle_timer.replace(timer) {
            previous.abort();
        }
    }

    /// Called when the idle window elapses. Never tears down a worker that
    /// still has a task; the timer is rearmed instead.
    fn on_idle_timeout(&self) -> IdleOutcome {
        let link = {
            let mut state = self.inner.state.lock();
            // detach rather than abort: this may be the timer task itself
            state.idle_timer.take();
            if state.link.is_none() {
                return IdleOutcome::NotSpawned;
            }
            if state.active_tasks > 0 || state.running {
                None
            } else {
                state.phase = WorkerPhase::Draining;
                state.link.take()
            }
        };

        match link {
            Some(link) => {
                shutdown_link(link);
                self.inner.state.lock().phase = WorkerPhase::NotSpawned;
                info!("clustering worker idle, terminated");
                IdleOutcome::Terminated
            }
            None => {
                debug!("clustering worker idle but busy, rescheduling teardown");
                self.reset_idle_timer();
                IdleOutcome::Rescheduled
            }
        }
    }

    /// Tear the worker down now. No-op when it is not spawned.
    pub fn dispose(&self) {
        let (link, timer) = {
            let mut state = self.inner.state.lock();
            let link = state.link.take();
            if link.is_some() {
                state.phase = WorkerPhase::Draining;
            }
            (link, state.idle_timer.take())
        };
        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(link) = link {
            shutdown_link(link);
            info!("clustering worker disposed");
        }
        self.inner.state.lock().phase = WorkerPhase::NotSpawned;
    }
}

/// Ask the worker to stop and reap its thread. A task already queued ahead
/// of the shutdown request still runs to completion.
fn shutdown_link(link: WorkerLink) {
    let WorkerLink { requests, thread } = link;
    let (envelope, _ignored) = WorkerEnvelope::new(WorkerRequest::Shutdown);
    let _ = requests.send(envelope);
    drop(requests);

    let join = move || {
        if thread.join().is_err() {
            warn!("clustering worker thread panicked");
        }
    };
    // joining blocks, keep it off the async runtime when there is one
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn_blocking(join);
        }
        Err(_) => join(),
    }
}

/// Body of the worker thread
fn worker_main(
    engine: FaceClusteringEngine,
    boot: oneshot::Sender<mpsc::UnboundedSender<WorkerEnvelope>>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<WorkerEnvelope>();
    if boot.send(tx).is_err() {
        return;
    }
    debug!("clustering worker ready");

    while let Some(WorkerEnvelope {
        request_id,
        request,
        reply,
    }) = rx.blocking_recv()
    {
        let (outcome, stop) = match request {
            WorkerRequest::RunClustering {
                faces,
                creation_times,
            } => (run_task(&engine, faces, creation_times), false),
            WorkerRequest::Shutdown => (Ok(WorkerResponse::ShutDown), true),
        };

        if reply.send(outcome).is_err() {
            debug!(%request_id, "reply receiver dropped");
        }
        if stop {
            break;
        }
    }
    debug!("clustering worker stopped");
}

fn run_task(
    engine: &FaceClusteringEngine,
    faces: Vec<FaceInput>,
    creation_times: Option<CreationTimes>,
) -> WorkerReply {
    let result = catch_unwind(AssertUnwindSafe(|| {
        engine.run_batch(faces, creation_times.as_ref(), now_ms())
    }));
    match result {
        Ok(Ok(delta)) => Ok(WorkerResponse::Clustered(delta)),
        Ok(Err(e)) => Err(WorkerFault::from_error(&e)),
        Err(panic) => Err(WorkerFault::from_panic(panic)),
    }
}
