use log::error;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Bounds the number of concurrently in-flight async operations.
///
/// Every stage that talks to an external service (transaction history
/// fetches, price lookups) funnels its work through one of these so a batch
/// never exceeds the upstream rate limit. Admission is FIFO; a task that
/// fails does not cancel its siblings, and all tasks run to completion.
#[derive(Debug, Clone)]
pub struct TaskRunner {
    semaphore: Arc<Semaphore>,
}

impl TaskRunner {
    /// Create a runner allowing at most `limit` tasks in flight
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(limit.max(1))),
        }
    }

    /// Run all tasks, at most `limit` concurrently, and collect their outputs.
    ///
    /// Results come back in submission order. A panicking task is logged and
    /// its slot skipped; the remaining tasks still run.
    pub async fn run<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let handles: Vec<_> = tasks.into_iter().map(|task| self.spawn(task)).collect();

        let mut results = Vec::with_capacity(handles.len());
        for result in futures::future::join_all(handles).await {
            match result {
                Ok(value) => results.push(value),
                Err(e) => error!("Throttled task failed to complete: {}", e),
            }
        }
        results
    }

    /// Spawn one task gated by the shared limit
    pub fn spawn<T, F>(&self, task: F) -> tokio::task::JoinHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        tokio::spawn(async move {
            // The semaphore is never closed, so acquisition only fails if the
            // runner itself is dropped mid-run, which the Arc prevents.
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("task runner semaphore closed");
            task.await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn tracked_task(
        current: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        id: usize,
    ) -> usize {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        current.fetch_sub(1, Ordering::SeqCst);
        id
    }

    #[tokio::test]
    async fn never_exceeds_limit() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runner = TaskRunner::new(3);

        let tasks: Vec<_> = (0..20)
            .map(|id| tracked_task(current.clone(), peak.clone(), id))
            .collect();
        let mut results = runner.run(tasks).await;

        assert!(peak.load(Ordering::SeqCst) <= 3);
        results.sort_unstable();
        assert_eq!(results, (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn completes_all_tasks_with_limit_one() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runner = TaskRunner::new(1);

        let tasks: Vec<_> = (0..5)
            .map(|id| tracked_task(current.clone(), peak.clone(), id))
            .collect();
        let results = runner.run(tasks).await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(results.len(), 5);
    }

    #[tokio::test]
    async fn empty_task_list_completes() {
        let runner = TaskRunner::new(4);
        let results: Vec<usize> = runner.run(Vec::<std::future::Ready<usize>>::new()).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn sibling_tasks_survive_a_panic() {
        let runner = TaskRunner::new(2);
        let tasks: Vec<_> = (0..4)
            .map(|id| async move {
                if id == 1 {
                    panic!("boom");
                }
                id
            })
            .collect();
        let results = runner.run(tasks).await;
        assert_eq!(results, vec![0, 2, 3]);
    }
}
