//! Pool behaviour with scripted handlers: timeouts, protocol errors, handler
//! failures, construction failures, queuing and shutdown.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use policylens_core::TaskType;
use policylens_host::{
    CancelToken, PoolConfig, PoolError, TaskHandler, WorkerFactory, WorkerPool, WorkerState,
};
use serde_json::{Value, json};

/// Handler driven by its payload:
/// `{"sleepMs": n}` sleeps (until cancelled), `{"fail": msg}` errors,
/// `{"panic": msg}` panics, `{"seq": n}` is recorded in arrival order.
#[derive(Default)]
struct Scripted {
    running: AtomicUsize,
    max_running: AtomicUsize,
    saw_cancel: AtomicBool,
    seen: Mutex<Vec<u64>>,
}

impl TaskHandler for Scripted {
    fn handle(&self, _: TaskType, data: Value, cancel: &CancelToken) -> Result<Value, String> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);

        if let Some(seq) = data["seq"].as_u64() {
            self.seen.lock().unwrap().push(seq);
        }

        if let Some(ms) = data["sleepMs"].as_u64() {
            let deadline = Instant::now() + Duration::from_millis(ms);
            while Instant::now() < deadline {
                if cancel.is_cancelled() {
                    self.saw_cancel.store(true, Ordering::SeqCst);
                    break;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        self.running.fetch_sub(1, Ordering::SeqCst);

        if let Some(msg) = data["panic"].as_str() {
            panic!("{msg}");
        }
        if let Some(msg) = data["fail"].as_str() {
            return Err(msg.to_string());
        }
        Ok(json!({ "echo": data }))
    }
}

struct TestFactory {
    handler: Arc<Scripted>,
    created: AtomicUsize,
    fail: bool,
}

impl TestFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            handler: Arc::new(Scripted::default()),
            created: AtomicUsize::new(0),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            handler: Arc::new(Scripted::default()),
            created: AtomicUsize::new(0),
            fail: true,
        })
    }

    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl WorkerFactory for TestFactory {
    fn create(&self, name: &str) -> anyhow::Result<Arc<dyn TaskHandler>> {
        anyhow::ensure!(!self.fail, "runtime for '{name}' failed to initialise");
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.handler.clone())
    }
}

fn pool_with(factory: &Arc<TestFactory>, config: PoolConfig) -> WorkerPool {
    WorkerPool::new(config, factory.clone())
}

fn config() -> PoolConfig {
    PoolConfig {
        default_timeout_ms: 2_000,
        max_workers: 8,
    }
}

const TASK: &str = "ANALYZE_POLICY";

#[tokio::test]
async fn success_resolves_and_counts_completion() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let result = pool.run_task("w", TASK, json!({"x": 1}), None).await.unwrap();
    assert_eq!(result, json!({"echo": {"x": 1}}));

    let workers = pool.workers();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].name, "w");
    assert_eq!(workers[0].state, WorkerState::Idle);
    assert!(!workers[0].busy);
    assert_eq!(workers[0].completed_task_count, 1);
}

#[tokio::test]
async fn timeout_tears_down_worker_and_next_call_gets_fresh_one() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let err = pool
        .run_task("w", TASK, json!({"sleepMs": 1_000}), Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    match &err {
        PoolError::Timeout {
            name, timeout_ms, ..
        } => {
            assert_eq!(name, "w");
            assert_eq!(*timeout_ms, 50);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert!(err.is_timeout());
    assert!(!pool.contains("w"));

    pool.run_task("w", TASK, json!({}), None).await.unwrap();
    assert!(pool.contains("w"));
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn timed_out_handler_observes_cancellation() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let err = pool
        .run_task("w", TASK, json!({"sleepMs": 5_000}), Some(Duration::from_millis(30)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    let deadline = Instant::now() + Duration::from_secs(2);
    while !factory.handler.saw_cancel.load(Ordering::SeqCst) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(factory.handler.saw_cancel.load(Ordering::SeqCst));
}

#[tokio::test]
async fn unknown_task_type_is_protocol_error_and_worker_stays_idle() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let err = pool.run_task("w", "BOGUS", json!({}), None).await.unwrap_err();
    match err {
        PoolError::Protocol(msg) => assert_eq!(msg, "Unknown task type: BOGUS"),
        other => panic!("expected protocol error, got {other:?}"),
    }

    let workers = pool.workers();
    assert_eq!(workers[0].state, WorkerState::Idle);
    assert_eq!(workers[0].completed_task_count, 0);

    pool.run_task("w", TASK, json!({}), None).await.unwrap();
    assert_eq!(pool.workers()[0].completed_task_count, 1);
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn handler_error_rejects_without_teardown() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let err = pool.run_task("w", TASK, json!({"fail": "boom"}), None).await.unwrap_err();
    assert!(matches!(err, PoolError::Task(ref m) if m == "boom"));
    assert!(pool.contains("w"));
    assert_eq!(pool.workers()[0].state, WorkerState::Idle);
}

#[tokio::test]
async fn handler_panic_is_contained() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let err = pool.run_task("w", TASK, json!({"panic": "kaboom"}), None).await.unwrap_err();
    match err {
        PoolError::Task(msg) => assert!(msg.contains("kaboom"), "got {msg}"),
        other => panic!("expected task error, got {other:?}"),
    }

    pool.run_task("w", TASK, json!({}), None).await.unwrap();
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn construction_failure_rejects_without_registering() {
    let factory = TestFactory::failing();
    let pool = pool_with(&factory, config());

    let err = pool.run_task("w", TASK, json!({}), None).await.unwrap_err();
    match err {
        PoolError::Construction { name, reason } => {
            assert_eq!(name, "w");
            assert!(reason.contains("failed to initialise"));
        }
        other => panic!("expected construction error, got {other:?}"),
    }
    assert!(pool.is_empty());
}

#[tokio::test]
async fn pool_refuses_workers_beyond_capacity() {
    let factory = TestFactory::new();
    let pool = pool_with(
        &factory,
        PoolConfig {
            max_workers: 1,
            ..config()
        },
    );

    pool.run_task("a", TASK, json!({}), None).await.unwrap();
    let err = pool.run_task("b", TASK, json!({}), None).await.unwrap_err();
    assert!(matches!(err, PoolError::Construction { ref reason, .. } if reason.contains("pool is full")));
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn same_name_calls_run_one_at_a_time_in_order() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let calls = (0..4u64).map(|seq| pool.run_task("w", TASK, json!({"seq": seq, "sleepMs": 20}), None));
    let results = futures::future::join_all(calls).await;
    assert!(results.iter().all(|r| r.is_ok()));

    assert_eq!(factory.handler.max_running.load(Ordering::SeqCst), 1);
    assert_eq!(*factory.handler.seen.lock().unwrap(), vec![0, 1, 2, 3]);
    assert_eq!(pool.workers()[0].completed_task_count, 4);
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn different_names_run_concurrently() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let (a, b) = tokio::join!(
        pool.run_task("a", TASK, json!({"sleepMs": 200}), None),
        pool.run_task("b", TASK, json!({"sleepMs": 200}), None),
    );
    a.unwrap();
    b.unwrap();
    assert_eq!(factory.handler.max_running.load(Ordering::SeqCst), 2);
    assert_eq!(pool.len(), 2);
}

#[tokio::test]
async fn queued_caller_moves_to_fresh_worker_after_timeout() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let (slow, queued) = tokio::join!(
        pool.run_task("w", TASK, json!({"sleepMs": 1_000}), Some(Duration::from_millis(50))),
        pool.run_task("w", TASK, json!({"seq": 7}), None),
    );
    assert!(slow.unwrap_err().is_timeout());
    queued.unwrap();
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn terminate_and_shutdown() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    pool.run_task("a", TASK, json!({}), None).await.unwrap();
    pool.run_task("b", TASK, json!({}), None).await.unwrap();

    assert!(pool.terminate("a"));
    assert!(!pool.terminate("a"));
    assert_eq!(pool.len(), 1);

    pool.shutdown();
    assert!(pool.is_empty());

    pool.run_task("b", TASK, json!({}), None).await.unwrap();
    assert_eq!(factory.created(), 3);
}

#[tokio::test]
async fn abandoned_call_holds_worker_until_runtime_answers() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        pool.run_task("w", TASK, json!({"sleepMs": 400}), None),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(pool.workers()[0].state, WorkerState::Busy);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let worker = &pool.workers()[0];
    assert_eq!(worker.state, WorkerState::Idle);
    assert!(!worker.busy);
    assert_eq!(worker.completed_task_count, 1);

    pool.run_task("w", TASK, json!({}), Some(Duration::from_millis(150)))
        .await
        .unwrap();
    assert_eq!(pool.workers()[0].completed_task_count, 2);
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn call_after_abandoned_one_waits_its_turn_without_timing_out() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        pool.run_task("w", TASK, json!({"sleepMs": 300}), None),
    )
    .await;
    assert!(abandoned.is_err());

    let result = pool
        .run_task("w", TASK, json!({"seq": 1}), Some(Duration::from_millis(150)))
        .await;
    assert_eq!(result.unwrap(), json!({"echo": {"seq": 1}}));
    assert_eq!(factory.handler.max_running.load(Ordering::SeqCst), 1);
    assert_eq!(factory.created(), 1);
    assert!(pool.contains("w"));
}

#[tokio::test]
async fn terminate_mid_task_disconnects_caller() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let (result, ()) = tokio::join!(
        pool.run_task("w", TASK, json!({"sleepMs": 300}), None),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(pool.terminate("w"));
        },
    );
    match result {
        Err(PoolError::Disconnected { name }) => assert_eq!(name, "w"),
        other => panic!("expected disconnect, got {other:?}"),
    }
    assert!(!pool.contains("w"));

    pool.run_task("w", TASK, json!({}), None).await.unwrap();
    assert_eq!(factory.created(), 2);
}

#[tokio::test]
async fn failed_call_in_try_join_leaves_worker_usable() {
    let factory = TestFactory::new();
    let pool = pool_with(&factory, config());

    let joined = tokio::try_join!(
        pool.run_task("w", TASK, json!({"fail": "boom", "sleepMs": 30}), None),
        pool.run_task("w", TASK, json!({"sleepMs": 30}), None),
    );
    assert!(matches!(joined, Err(PoolError::Task(ref m)) if m == "boom"));

    pool.run_task("w", TASK, json!({}), Some(Duration::from_millis(200)))
        .await
        .unwrap();
    let worker = &pool.workers()[0];
    assert_eq!(worker.state, WorkerState::Idle);
    assert!(!worker.busy);
    assert_eq!(factory.created(), 1);
}
