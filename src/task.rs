//! Task polling utilities
//!
//! The state layer spawns network work on the tokio runtime and picks up the
//! results between user actions. Two shapes are supported: a single optional
//! task, and a set of tasks tagged with increasing request generations.

use futures::FutureExt;
use std::future::Future;
use tokio::task::{JoinError, JoinHandle};

/// Result of polling a task
pub enum PollResult<T> {
    /// No task to poll (task was None)
    NoTask,
    /// Task is still running
    Pending,
    /// Task completed with result (may be Ok or join error)
    Complete(Result<T, JoinError>),
}

/// Poll an optional task handle and return its result if finished.
///
/// The handle is taken out of `task` only once it has produced a value.
pub fn poll_task<T>(task: &mut Option<JoinHandle<T>>) -> PollResult<T> {
    let Some(handle) = task.as_mut() else {
        return PollResult::NoTask;
    };

    if !handle.is_finished() {
        return PollResult::Pending;
    }

    match handle.now_or_never() {
        Some(result) => {
            *task = None;
            PollResult::Complete(result)
        }
        None => {
            tracing::warn!("Task not ready despite is_finished()");
            PollResult::Pending
        }
    }
}

/// Spawned tasks tagged with a monotonically increasing generation.
///
/// Generations start at 1; 0 is never handed out, so it can stand for
/// "nothing yet" in callers.
pub struct TaggedTasks<T> {
    last_tag: u64,
    tasks: Vec<(u64, JoinHandle<T>)>,
}

impl<T> Default for TaggedTasks<T> {
    fn default() -> Self {
        Self {
            last_tag: 0,
            tasks: Vec::new(),
        }
    }
}

impl<T: Send + 'static> TaggedTasks<T> {
    /// Spawn a future and return the generation assigned to it
    pub fn spawn<F>(&mut self, future: F) -> u64
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.last_tag += 1;
        self.tasks.push((self.last_tag, tokio::spawn(future)));
        self.last_tag
    }

    /// Number of tasks not yet collected
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Whether a task newer than `tag` is still outstanding
    pub fn has_pending_after(&self, tag: u64) -> bool {
        self.tasks.iter().any(|(t, _)| *t > tag)
    }

    /// Oldest outstanding generation at or above `floor`
    pub fn oldest_pending_from(&self, floor: u64) -> Option<u64> {
        self.tasks.iter().map(|(t, _)| *t).filter(|t| *t >= floor).min()
    }

    /// Collect every finished task without waiting, oldest generation first
    pub fn take_finished(&mut self) -> Vec<(u64, Result<T, JoinError>)> {
        let mut finished = Vec::new();
        let mut i = 0;

        while i < self.tasks.len() {
            if !self.tasks[i].1.is_finished() {
                i += 1;
                continue;
            }
            match (&mut self.tasks[i].1).now_or_never() {
                Some(result) => {
                    let (tag, _) = self.tasks.remove(i);
                    finished.push((tag, result));
                }
                None => i += 1,
            }
        }

        finished.sort_by_key(|(tag, _)| *tag);
        finished
    }

    /// Wait for the next task to finish, in completion order
    pub async fn next(&mut self) -> Option<(u64, Result<T, JoinError>)> {
        if self.tasks.is_empty() {
            return None;
        }

        let (result, index, _) =
            futures::future::select_all(self.tasks.iter_mut().map(|(_, handle)| handle)).await;
        let (tag, _) = self.tasks.remove(index);
        Some((tag, result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_poll_task_lifecycle() {
        let mut task: Option<JoinHandle<u32>> = None;
        assert!(matches!(poll_task(&mut task), PollResult::NoTask));

        task = Some(tokio::spawn(async { 7 }));
        // Give the task a chance to run
        while task.as_ref().is_some_and(|h| !h.is_finished()) {
            tokio::task::yield_now().await;
        }

        match poll_task(&mut task) {
            PollResult::Complete(Ok(value)) => assert_eq!(value, 7),
            _ => panic!("expected completed task"),
        }
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn test_tagged_tasks_complete_in_finish_order() {
        let mut tasks = TaggedTasks::default();
        let slow = tasks.spawn(async {
            tokio::time::sleep(Duration::from_millis(80)).await;
            "slow"
        });
        let fast = tasks.spawn(async { "fast" });

        assert_eq!(slow, 1);
        assert_eq!(fast, 2);
        assert!(tasks.has_pending_after(1));
        assert!(!tasks.has_pending_after(2));
        assert_eq!(tasks.oldest_pending_from(0), Some(slow));
        assert_eq!(tasks.oldest_pending_from(2), Some(fast));
        assert_eq!(tasks.oldest_pending_from(3), None);

        let (tag, result) = tasks.next().await.unwrap();
        assert_eq!((tag, result.unwrap()), (fast, "fast"));
        let (tag, result) = tasks.next().await.unwrap();
        assert_eq!((tag, result.unwrap()), (slow, "slow"));
        assert!(tasks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_take_finished_leaves_running_tasks() {
        let mut tasks = TaggedTasks::default();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tasks.spawn(async move {
            let _ = rx.await;
            1
        });
        tasks.spawn(async { 2 });

        // Wait until the unblocked task has finished
        tokio::time::sleep(Duration::from_millis(20)).await;
        let finished = tasks.take_finished();
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].0, 2);
        assert_eq!(tasks.len(), 1);

        tx.send(()).unwrap();
        let (tag, result) = tasks.next().await.unwrap();
        assert_eq!((tag, result.unwrap()), (1, 1));
        assert!(tasks.is_empty());
    }
}
