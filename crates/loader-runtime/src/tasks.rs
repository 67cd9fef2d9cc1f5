//! Ownership of spawned loader tasks.

use std::cell::RefCell;
use std::future::Future;

use tokio::task::JoinHandle;

#[derive(Debug)]
struct TrackedTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

/// Owns every task a page load spawns.
///
/// A task ends either by finishing on its own or by `dispose`; there is no
/// other path. Dropping the registry disposes it.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RefCell<Vec<TrackedTask>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task on the current `LocalSet`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a `LocalSet`, like `spawn_local`.
    pub fn spawn<F>(&self, name: &'static str, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        let handle = tokio::task::spawn_local(future);
        tracing::debug!(task = name, "spawned");
        self.tasks.borrow_mut().push(TrackedTask { name, handle });
    }

    /// Number of tasks still running.
    pub fn active(&self) -> usize {
        self.tasks
            .borrow()
            .iter()
            .filter(|t| !t.handle.is_finished())
            .count()
    }

    /// Names of tasks still running.
    pub fn active_names(&self) -> Vec<&'static str> {
        self.tasks
            .borrow()
            .iter()
            .filter(|t| !t.handle.is_finished())
            .map(|t| t.name)
            .collect()
    }

    /// Abort every live task. Returns how many were aborted.
    pub fn dispose(&self) -> usize {
        let tasks = std::mem::take(&mut *self.tasks.borrow_mut());
        let mut aborted = 0;

        for task in tasks {
            if !task.handle.is_finished() {
                task.handle.abort();
                tracing::debug!(task = task.name, "aborted");
                aborted += 1;
            }
        }

        aborted
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.dispose();
    }
}
