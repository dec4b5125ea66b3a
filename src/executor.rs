//! Single-threaded access to the desktop service.
//!
//! The virtual desktop COM objects belong to the apartment of the thread that
//! created them, and the shell process behind them can hang or die at any
//! moment.  [`SerializedExecutor`] therefore owns the service on one
//! dedicated worker thread and marshals every call onto it:
//!
//! * calls are queued and run one at a time, in submission order;
//! * the caller waits at most [`CALL_TIMEOUT`] for the answer;
//! * an error or a panic inside a call is reported as a failed call and
//!   never takes the worker down;
//! * between calls the worker [`pump`](DesktopService::pump)s the service so
//!   change notifications are delivered even when nothing is being asked.
//!
//! Desktop-changed notifications run on the worker thread as well, so a
//! notification caused by a call is handled before that call returns.

use crate::history::next_in_group;
use crate::traits::{DesktopChangedHandler, DesktopService, FocusShim, ServiceError};
use log::{debug, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Upper bound on how long a caller waits for one service call.
pub const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// How long the worker waits for a call before pumping notifications.
pub const PUMP_INTERVAL: Duration = Duration::from_millis(15);

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

enum Task<S> {
    Run(Job<S>),
    Shutdown,
}

/// Lifecycle of a [`SerializedExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// The worker is still building the service.
    Uninitialized,
    /// Calls are accepted.
    Ready,
    /// Terminal: every call fails immediately.
    Disposed,
}

/// Errors from starting an executor.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to start desktop service: {0}")]
    Init(#[from] ServiceError),
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("executor thread exited during startup")]
    WorkerLost,
}

/// Owns a [`DesktopService`] on a dedicated thread.
pub struct SerializedExecutor<S: DesktopService + 'static> {
    tasks: mpsc::Sender<Task<S>>,
    worker: Option<JoinHandle<()>>,
    finished: mpsc::Receiver<()>,
    focus: Arc<dyn FocusShim>,
    timeout: Duration,
    state: ExecutorState,
}

impl<S: DesktopService + 'static> SerializedExecutor<S> {
    /// Start the worker and build the service on it.
    ///
    /// `factory` runs on the worker thread; `on_change` is subscribed right
    /// after.  Blocks until both are done.
    pub fn spawn<F>(
        factory: F,
        focus: impl FocusShim + 'static,
        on_change: DesktopChangedHandler,
    ) -> Result<Self, ExecutorError>
    where
        F: FnOnce() -> Result<S, ServiceError> + Send + 'static,
    {
        Self::spawn_with_timeout(factory, focus, on_change, CALL_TIMEOUT)
    }

    /// Like [`spawn`](Self::spawn) with a custom per-call timeout.
    pub fn spawn_with_timeout<F>(
        factory: F,
        focus: impl FocusShim + 'static,
        on_change: DesktopChangedHandler,
        timeout: Duration,
    ) -> Result<Self, ExecutorError>
    where
        F: FnOnce() -> Result<S, ServiceError> + Send + 'static,
    {
        let (task_tx, task_rx) = mpsc::channel::<Task<S>>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), ServiceError>>(1);
        let (finished_tx, finished_rx) = mpsc::sync_channel::<()>(1);

        let worker = thread::Builder::new()
            .name("desktop-service".into())
            .spawn(move || {
                let built = factory().and_then(|mut svc| {
                    svc.subscribe(on_change)?;
                    Ok(svc)
                });
                let mut svc = match built {
                    Ok(svc) => {
                        let _ = ready_tx.send(Ok(()));
                        svc
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run_worker(&mut svc, &task_rx);
                drop(svc);
                let _ = finished_tx.send(());
                debug!("desktop service worker exited");
            })
            .map_err(ExecutorError::Spawn)?;

        let mut executor = Self {
            tasks: task_tx,
            worker: Some(worker),
            finished: finished_rx,
            focus: Arc::new(focus),
            timeout,
            state: ExecutorState::Uninitialized,
        };

        match ready_rx.recv() {
            Ok(Ok(())) => {
                executor.state = ExecutorState::Ready;
                info!("desktop service ready");
                Ok(executor)
            }
            Ok(Err(e)) => Err(ExecutorError::Init(e)),
            Err(_) => Err(ExecutorError::WorkerLost),
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Run `action` on the worker and return its value.
    ///
    /// Returns `None` if the executor is disposed, the action fails or
    /// panics, or no answer arrives within the timeout.  A timed-out action
    /// still runs eventually; its result is discarded.
    pub fn call<T, F>(&self, action: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T, ServiceError> + Send + 'static,
    {
        if self.state != ExecutorState::Ready {
            debug!("executor not ready ({:?}), dropping call", self.state);
            return None;
        }

        let (reply_tx, reply_rx) = mpsc::sync_channel(1);
        let job: Job<S> = Box::new(move |svc: &mut S| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| action(svc)));
            let _ = reply_tx.send(outcome);
        });

        if self.tasks.send(Task::Run(job)).is_err() {
            warn!("desktop service worker is gone");
            return None;
        }

        match reply_rx.recv_timeout(self.timeout) {
            Ok(Ok(Ok(value))) => Some(value),
            Ok(Ok(Err(e))) => {
                warn!("{}", e);
                None
            }
            Ok(Err(_)) => {
                warn!("desktop service call panicked");
                None
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("desktop service call timed out after {:?}", self.timeout);
                None
            }
            Err(RecvTimeoutError::Disconnected) => {
                warn!("desktop service worker dropped a call");
                None
            }
        }
    }

    /// Run `action` on the worker; `true` if it completed successfully in time.
    pub fn run_on_executor<F>(&self, action: F) -> bool
    where
        F: FnOnce(&mut S) -> Result<(), ServiceError> + Send + 'static,
    {
        self.call(action).is_some()
    }

    pub fn current_desktop(&self) -> Option<usize> {
        self.call(|svc| svc.current_desktop())
    }

    pub fn desktop_count(&self) -> Option<usize> {
        self.call(|svc| svc.desktop_count())
    }

    pub fn create_desktop(&self) -> bool {
        self.run_on_executor(|svc| svc.create_desktop())
    }

    /// Switch to `index`, wrapped in the focus shim.
    ///
    /// If `index` is already the active desktop and `fallback` is set, switch
    /// to `fallback` instead.
    pub fn jump_with_focus_recovery(&self, index: usize, fallback: Option<usize>) -> bool {
        let focus = Arc::clone(&self.focus);
        self.run_on_executor(move |svc| {
            let target = match fallback {
                Some(other) if svc.current_desktop()? == index => other,
                _ => index,
            };
            jump_with_shim(svc, focus.as_ref(), target)
        })
    }

    /// Switch to `index` without touching the foreground window.
    pub fn jump_without_focus_recovery(&self, index: usize) -> bool {
        self.run_on_executor(move |svc| svc.jump_to(index))
    }

    /// Switch to the member of `group` after the active desktop.
    pub fn jump_to_next(&self, group: Vec<usize>) -> bool {
        let focus = Arc::clone(&self.focus);
        self.run_on_executor(move |svc| {
            let current = svc.current_desktop()?;
            match next_in_group(&group, current) {
                Some(next) => jump_with_shim(svc, focus.as_ref(), next),
                None => Ok(()),
            }
        })
    }

    pub fn move_focused_window_to(&self, index: usize) -> bool {
        self.run_on_executor(move |svc| svc.move_focused_window_to(index))
    }

    /// Stop the worker and release the service.  Idempotent.
    ///
    /// Waits up to the call timeout for an in-flight call to finish; a worker
    /// stuck past that is left to exit on its own.
    pub fn dispose(&mut self) {
        if self.state == ExecutorState::Disposed {
            return;
        }
        self.state = ExecutorState::Disposed;
        let _ = self.tasks.send(Task::Shutdown);

        let Some(worker) = self.worker.take() else {
            return;
        };
        match self.finished.recv_timeout(self.timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = worker.join();
                info!("desktop service stopped");
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("desktop service worker did not stop, detaching it");
            }
        }
    }
}

impl<S: DesktopService + 'static> Drop for SerializedExecutor<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn jump_with_shim<S: DesktopService>(
    svc: &mut S,
    focus: &dyn FocusShim,
    index: usize,
) -> Result<(), ServiceError> {
    focus.claim_foreground();
    let result = svc.jump_to(index);
    focus.settle_foreground();
    result
}

fn run_worker<S: DesktopService>(svc: &mut S, tasks: &mpsc::Receiver<Task<S>>) {
    loop {
        match tasks.recv_timeout(PUMP_INTERVAL) {
            Ok(Task::Run(job)) => job(svc),
            Ok(Task::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
        svc.pump();
    }
}
