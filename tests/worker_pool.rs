mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use agentpool::api::{Choice, GenerateRequest, ModelBackend, ModelResponse};
use agentpool::error::LlmError;
use agentpool::local_tools::LocalSettings;
use agentpool::registry::ToolRegistry;
use agentpool::{AgentLoop, AgentSettings, Dispatcher, PoolConfig, Task};
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{Barrier, Notify, Semaphore};

use common::{EchoBackend, ScriptedBackend};

fn agent_with(dir: &TempDir, backend: Arc<dyn ModelBackend>) -> Arc<AgentLoop> {
    let registry = ToolRegistry::local_only(LocalSettings::new(dir.path()).unwrap());
    Arc::new(AgentLoop::new(backend, Arc::new(registry), AgentSettings::default()))
}

async fn run_pool(workers: usize, tasks: usize) -> Vec<agentpool::TaskResult> {
    let temp_dir = TempDir::new().unwrap();
    let agent = agent_with(
        &temp_dir,
        Arc::new(EchoBackend {
            delay: Duration::from_millis(5),
        }),
    );
    let mut dispatcher = Dispatcher::start(
        agent,
        &PoolConfig {
            workers,
            queue_capacity: 4,
        },
    );

    // Submit concurrently with draining so bounded queues cannot stall the producer.
    let sender = dispatcher.sender().unwrap();
    dispatcher.close_input();
    let producer = tokio::spawn(async move {
        for id in 0..tasks as u64 {
            sender.send(Task::new(id, format!("prompt {}", id))).await.unwrap();
        }
    });

    let results = tokio::time::timeout(Duration::from_secs(10), dispatcher.drain())
        .await
        .unwrap();
    producer.await.unwrap();
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_every_task_yields_exactly_one_result() {
    for (workers, tasks) in [(1, 0), (1, 5), (3, 5), (5, 3), (4, 25)] {
        let results = run_pool(workers, tasks).await;
        assert_eq!(results.len(), tasks, "workers={} tasks={}", workers, tasks);

        let ids: HashSet<u64> = results.iter().map(|r| r.task_id).collect();
        assert_eq!(ids, (0..tasks as u64).collect::<HashSet<_>>());

        for result in &results {
            assert!(result.is_ok());
            assert_eq!(result.content, format!("prompt {}", result.task_id));
            assert!((1..=workers).contains(&result.worker_id));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failed_tasks_still_produce_results() {
    let temp_dir = TempDir::new().unwrap();
    let backend = ScriptedBackend::new(Vec::new()).with_fallback(|_| {
        Err(LlmError::Other("backend down".to_string()))
    });
    let dispatcher = Dispatcher::start(
        agent_with(&temp_dir, Arc::new(backend)),
        &PoolConfig {
            workers: 2,
            queue_capacity: 2,
        },
    );

    for id in 0..4 {
        dispatcher.submit(Task::new(id, "hello")).await.unwrap();
    }
    let results = dispatcher.drain().await;

    assert_eq!(results.len(), 4);
    for result in results {
        assert!(!result.is_ok());
        assert!(result.content.is_empty());
        assert_eq!(result.error.unwrap().to_string(), "model error: backend down");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_result_queue_closes_after_workers_exit() {
    let temp_dir = TempDir::new().unwrap();
    let mut dispatcher = Dispatcher::start(
        agent_with(&temp_dir, Arc::new(EchoBackend { delay: Duration::ZERO })),
        &PoolConfig {
            workers: 3,
            queue_capacity: 4,
        },
    );
    dispatcher.submit(Task::new(1, "one")).await.unwrap();
    dispatcher.close_input();

    let first = dispatcher.next_result().await.unwrap();
    assert_eq!(first.task_id, 1);
    let end = tokio::time::timeout(Duration::from_secs(5), dispatcher.next_result())
        .await
        .unwrap();
    assert!(end.is_none());
    dispatcher.join().await;
}

#[tokio::test]
async fn test_submit_after_close_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let mut dispatcher = Dispatcher::start(
        agent_with(&temp_dir, Arc::new(EchoBackend { delay: Duration::ZERO })),
        &PoolConfig::default(),
    );
    dispatcher.close_input();

    let err = dispatcher.submit(Task::new(42, "late")).await.unwrap_err();
    assert_eq!(err.task_id, 42);
    assert!(dispatcher.sender().is_none());
    assert!(dispatcher.drain().await.is_empty());
}

#[tokio::test]
async fn test_extra_sender_keeps_input_open() {
    let temp_dir = TempDir::new().unwrap();
    let mut dispatcher = Dispatcher::start(
        agent_with(&temp_dir, Arc::new(EchoBackend { delay: Duration::ZERO })),
        &PoolConfig::default(),
    );
    let sender = dispatcher.sender().unwrap();
    dispatcher.close_input();

    let producer = tokio::spawn(async move {
        for id in 0..3 {
            sender.send(Task::new(id, "from producer")).await.unwrap();
        }
    });

    let results = tokio::time::timeout(Duration::from_secs(5), dispatcher.drain())
        .await
        .unwrap();
    producer.await.unwrap();
    assert_eq!(results.len(), 3);
}

/// Holds every generation until all expected callers are inside it.
struct BarrierBackend {
    barrier: Barrier,
}

#[async_trait]
impl ModelBackend for BarrierBackend {
    async fn generate(&self, _request: GenerateRequest<'_>) -> Result<ModelResponse, LlmError> {
        self.barrier.wait().await;
        Ok(ModelResponse::single(Choice::text("together")))
    }

    fn model_name(&self) -> &str {
        "barrier"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_workers_run_concurrently() {
    let temp_dir = TempDir::new().unwrap();
    let workers = 4;
    let dispatcher = Dispatcher::start(
        agent_with(
            &temp_dir,
            Arc::new(BarrierBackend {
                barrier: Barrier::new(workers),
            }),
        ),
        &PoolConfig {
            workers,
            queue_capacity: 10,
        },
    );
    for id in 0..workers as u64 {
        dispatcher.submit(Task::new(id, "wait")).await.unwrap();
    }

    // Only completes if all four tasks are in flight at the same time.
    let results = tokio::time::timeout(Duration::from_secs(5), dispatcher.drain())
        .await
        .expect("workers did not run in parallel");
    assert_eq!(results.len(), workers);
    let worker_ids: HashSet<usize> = results.iter().map(|r| r.worker_id).collect();
    assert_eq!(worker_ids.len(), workers);
}

/// Signals when a generation starts and blocks it until released.
struct GateBackend {
    started: Notify,
    gate: Semaphore,
}

#[async_trait]
impl ModelBackend for GateBackend {
    async fn generate(&self, _request: GenerateRequest<'_>) -> Result<ModelResponse, LlmError> {
        self.started.notify_one();
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| LlmError::Other(e.to_string()))?;
        Ok(ModelResponse::single(Choice::text("finished")))
    }

    fn model_name(&self) -> &str {
        "gate"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_finishes_in_flight_and_leaves_queued_tasks() {
    let temp_dir = TempDir::new().unwrap();
    let backend = Arc::new(GateBackend {
        started: Notify::new(),
        gate: Semaphore::new(0),
    });
    let dispatcher = Dispatcher::start(
        agent_with(&temp_dir, backend.clone()),
        &PoolConfig {
            workers: 1,
            queue_capacity: 10,
        },
    );

    for id in 0..5 {
        dispatcher.submit(Task::new(id, "slow")).await.unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), backend.started.notified())
        .await
        .unwrap();
    dispatcher.cancel();
    backend.gate.add_permits(10);

    let results = tokio::time::timeout(Duration::from_secs(5), dispatcher.drain())
        .await
        .unwrap();

    // The in-flight task completed; nothing else was picked up.
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].task_id, 0);
    assert_eq!(results[0].content, "finished");
}

#[tokio::test]
async fn test_cancel_idle_pool() {
    let temp_dir = TempDir::new().unwrap();
    let dispatcher = Dispatcher::start(
        agent_with(&temp_dir, Arc::new(EchoBackend { delay: Duration::ZERO })),
        &PoolConfig {
            workers: 3,
            queue_capacity: 1,
        },
    );
    let token = dispatcher.cancellation_token();
    token.cancel();
    assert!(dispatcher.cancellation_token().is_cancelled());

    let results = tokio::time::timeout(Duration::from_secs(5), dispatcher.drain())
        .await
        .unwrap();
    assert!(results.is_empty());
}
