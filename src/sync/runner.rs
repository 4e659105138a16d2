//! Panic-isolated task execution.
//!
//! - [`run_safe`] runs a closure on the current thread and turns a panic into
//!   an error log.
//! - [`spawn_safe`] does the same on a fresh thread.
//! - [`TaskRunner`] runs tasks on their own threads with a cap on how many may
//!   run at once; `schedule` blocks while the cap is reached.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};

/// Runs `f`, catching and logging any panic. Returns `false` if `f` panicked.
pub fn run_safe<F>(f: F) -> bool
where
    F: FnOnce(),
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                panic = %panic_message(payload.as_ref()),
                "recovered panic in background task"
            );
            false
        },
    }
}

/// Spawns `f` on a new thread wrapped in [`run_safe`].
pub fn spawn_safe<F>(f: F) -> JoinHandle<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::spawn(move || {
        run_safe(f);
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    running: Mutex<usize>,
    idle: Condvar,
}

/// Releases a running slot when the task thread finishes, even on panic.
struct Permit(Arc<RunnerState>);

impl Drop for Permit {
    fn drop(&mut self) {
        let mut running = self.0.running.lock();
        *running -= 1;
        self.0.idle.notify_all();
    }
}

/// Runs scheduled tasks with bounded concurrency.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use expirykit::sync::TaskRunner;
///
/// let runner = TaskRunner::new(4);
/// let done = Arc::new(AtomicUsize::new(0));
/// for _ in 0..16 {
///     let done = Arc::clone(&done);
///     runner.schedule(move || {
///         done.fetch_add(1, Ordering::SeqCst);
///     });
/// }
/// runner.wait();
/// assert_eq!(done.load(Ordering::SeqCst), 16);
/// ```
#[derive(Debug, Clone)]
pub struct TaskRunner {
    limit: usize,
    state: Arc<RunnerState>,
}

impl TaskRunner {
    /// Creates a runner allowing `concurrency` simultaneous tasks (at least 1).
    pub fn new(concurrency: usize) -> Self {
        Self {
            limit: concurrency.max(1),
            state: Arc::new(RunnerState::default()),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.limit
    }

    /// Number of tasks currently running.
    pub fn running(&self) -> usize {
        *self.state.running.lock()
    }

    /// Starts `task` on a new thread, blocking while the runner is saturated.
    pub fn schedule<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        {
            let mut running = self.state.running.lock();
            while *running >= self.limit {
                self.state.idle.wait(&mut running);
            }
            *running += 1;
        }

        let permit = Permit(Arc::clone(&self.state));
        thread::spawn(move || {
            let _permit = permit;
            run_safe(task);
        });
    }

    /// Blocks until every scheduled task has finished.
    pub fn wait(&self) {
        let mut running = self.state.running.lock();
        while *running > 0 {
            self.state.idle.wait(&mut running);
        }
    }
}
