use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::agent_loop::AgentLoop;
use crate::config::{default_queue_capacity, default_workers};
use crate::error::DispatchError;
use crate::models::{Task, TaskResult, WorkerId};

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub workers: usize,
    /// Capacity of both the task queue and the result queue.
    pub queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Owns the task and result queues and the workers between them.
///
/// The input closes once [`Dispatcher::close_input`] has been called and every
/// sender handed out by [`Dispatcher::sender`] is dropped. The result queue
/// closes after the last worker exits.
pub struct Dispatcher {
    tasks: Option<mpsc::Sender<Task>>,
    results: mpsc::Receiver<TaskResult>,
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn start(agent: Arc<AgentLoop>, config: &PoolConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (task_tx, task_rx) = mpsc::channel::<Task>(capacity);
        let (result_tx, result_rx) = mpsc::channel::<TaskResult>(capacity);
        let task_rx = Arc::new(Mutex::new(task_rx));
        let cancel = CancellationToken::new();

        let workers = (1..=config.workers.max(1))
            .map(|id| {
                tokio::spawn(run_worker(
                    id,
                    agent.clone(),
                    task_rx.clone(),
                    result_tx.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::info!(workers = config.workers.max(1), capacity, "worker pool started");

        Self {
            tasks: Some(task_tx),
            results: result_rx,
            cancel,
            workers,
        }
    }

    /// An extra producer handle, or `None` once the input has been closed.
    pub fn sender(&self) -> Option<mpsc::Sender<Task>> {
        self.tasks.clone()
    }

    /// Enqueue a task, waiting while the queue is full.
    pub async fn submit(&self, task: Task) -> Result<(), DispatchError> {
        let task_id = task.id;
        match &self.tasks {
            Some(tx) => tx.send(task).await.map_err(|_| DispatchError { task_id }),
            None => Err(DispatchError { task_id }),
        }
    }

    /// Drop the dispatcher's own producer handle.
    pub fn close_input(&mut self) {
        self.tasks = None;
    }

    /// Tell every worker to stop before taking another task. Tasks already
    /// being processed run to completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Next finished result; `None` once every worker has exited.
    pub async fn next_result(&mut self) -> Option<TaskResult> {
        self.results.recv().await
    }

    /// Close the input, wait for every worker and collect what they produced.
    pub async fn drain(mut self) -> Vec<TaskResult> {
        self.close_input();
        let mut collected = Vec::new();
        while let Some(result) = self.results.recv().await {
            collected.push(result);
        }
        self.join().await;
        collected
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for outcome in join_all(self.workers).await {
            if let Err(e) = outcome {
                tracing::error!(error = %e, "worker task failed");
            }
        }
    }
}

async fn run_worker(
    id: WorkerId,
    agent: Arc<AgentLoop>,
    tasks: Arc<Mutex<mpsc::Receiver<Task>>>,
    results: mpsc::Sender<TaskResult>,
    cancel: CancellationToken,
) {
    tracing::debug!(worker = id, "worker started");

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(worker = id, "worker cancelled");
                break;
            }
            task = next_task(&tasks) => task,
        };

        let Some(task) = next else {
            tracing::debug!(worker = id, "task queue closed");
            break;
        };

        let (content, error) = match agent.run(&task).await {
            Ok(content) => (content, None),
            Err(e) => {
                tracing::warn!(worker = id, task = task.id, error = %e, "task failed");
                (String::new(), Some(e))
            }
        };

        let result = TaskResult {
            worker_id: id,
            task_id: task.id,
            content,
            error,
        };

        if let Err(undelivered) = results.send(result).await {
            tracing::warn!(
                worker = id,
                task = undelivered.0.task_id,
                "result consumer is gone, dropping result"
            );
        }
    }

    tracing::debug!(worker = id, "worker exited");
}

// Receiving is cancel-safe: if the select drops this future the task stays queued.
async fn next_task(tasks: &Mutex<mpsc::Receiver<Task>>) -> Option<Task> {
    tasks.lock().await.recv().await
}
