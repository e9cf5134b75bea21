use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast::Receiver;
use tokio::time::timeout;

use cockpit_core::domain::{
    BatchProcess, BatchStatus, CompletionStatus, EntityKind, EntityStatus, Job, JobMode, JobStatus,
    WorkloadError,
};
use cockpit_core::ports::Workload;
use cockpit_core::registry::Entity;
use cockpit_core::{
    CockpitError, ExecutorConfig, ExecutorEvent, Registry, RunId, SubmissionResult, TaskExecutor,
    WorkContext,
};

fn registry(entities: impl IntoIterator<Item = Entity>) -> Arc<Registry> {
    Arc::new(Registry::from_entities(entities).unwrap())
}

fn job(name: &str) -> Entity {
    Entity::Job(Job::idle(name, JobMode::Sequential).unwrap())
}

fn batch(name: &str, items: u32) -> Entity {
    Entity::Batch(BatchProcess::new(name, items, "", BatchStatus::Scheduled).unwrap())
}

fn config(pool_size: usize) -> ExecutorConfig {
    ExecutorConfig {
        pool_size,
        tick_ms: 10,
        batch_tick_ms: 10,
        ..ExecutorConfig::default()
    }
}

async fn next_event(rx: &mut Receiver<ExecutorEvent>) -> ExecutorEvent {
    timeout(Duration::from_secs(30), rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event bus closed")
}

/// Events of one run, up to and including its completion.
async fn run_events(rx: &mut Receiver<ExecutorEvent>, run_id: RunId) -> Vec<ExecutorEvent> {
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        if event.run_id() != run_id {
            continue;
        }
        let done = event.as_completion().is_some();
        events.push(event);
        if done {
            return events;
        }
    }
}

/// Events grouped by entity name until `runs` completions were seen.
async fn until_completed(
    rx: &mut Receiver<ExecutorEvent>,
    runs: usize,
) -> HashMap<String, Vec<ExecutorEvent>> {
    let mut by_name: HashMap<String, Vec<ExecutorEvent>> = HashMap::new();
    let mut completed = 0;
    while completed < runs {
        let event = next_event(rx).await;
        if event.as_completion().is_some() {
            completed += 1;
        }
        by_name.entry(event.name().to_string()).or_default().push(event);
    }
    by_name
}

fn progress_values(events: &[ExecutorEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| e.as_progress().map(|p| p.value))
        .collect()
}

/// Reports 40% and then fails.
struct FailsHalfway;

#[async_trait]
impl Workload for FailsHalfway {
    async fn run(&self, ctx: &mut WorkContext) -> Result<(), WorkloadError> {
        ctx.pause(Duration::from_millis(10)).await?;
        ctx.report(40).await;
        Err(WorkloadError::failed("disk full"))
    }
}

struct Panics;

#[async_trait]
impl Workload for Panics {
    async fn run(&self, ctx: &mut WorkContext) -> Result<(), WorkloadError> {
        ctx.pause(Duration::from_millis(10)).await?;
        panic!("workload blew up");
    }
}

/// Reports lower values after higher ones.
struct Wobbly;

#[async_trait]
impl Workload for Wobbly {
    async fn run(&self, ctx: &mut WorkContext) -> Result<(), WorkloadError> {
        for value in [30, 10, 60, 50, 90] {
            ctx.pause(Duration::from_millis(10)).await?;
            ctx.report(value).await;
        }
        Ok(())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_submits_accept_exactly_one() {
    let registry = registry([job("Y")]);
    let slow = ExecutorConfig {
        tick_ms: 200,
        ..config(4)
    };
    let executor = Arc::new(
        TaskExecutor::builder(Arc::clone(&registry))
            .config(slow)
            .build()
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for _ in 0..16 {
        let executor = Arc::clone(&executor);
        handles.push(tokio::spawn(async move { executor.submit("Y").await }));
    }

    let mut accepted = 0;
    let mut already_running = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            SubmissionResult::Accepted { .. } => accepted += 1,
            SubmissionResult::AlreadyRunning => already_running += 1,
        }
    }
    assert_eq!(accepted, 1);
    assert_eq!(already_running, 15);
    assert!(registry.is_in_flight("Y").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn job_run_ends_complete_at_one_hundred() {
    let registry = registry([job("X")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(2))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let run_id = executor.submit("X").await.unwrap().run_id().unwrap();
    let events = run_events(&mut rx, run_id).await;

    assert!(matches!(events.first(), Some(ExecutorEvent::Started(_))));
    let last = events.last().and_then(|e| e.as_completion()).unwrap();
    assert_eq!(last.name, "X");
    assert_eq!(last.status, CompletionStatus::Complete);
    assert_eq!(progress_values(&events), [20, 40, 60, 80, 100]);

    let x = registry.job("X").await.unwrap();
    assert_eq!(x.status, JobStatus::Complete);
    assert_eq!(x.progress, 100);
    assert_eq!(x.last_run, Some(run_id));
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn running_job_never_stores_one_hundred() {
    let registry = registry([job("X")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let run_id = executor.submit("X").await.unwrap().run_id().unwrap();
    loop {
        let event = next_event(&mut rx).await;
        let x = registry.job("X").await.unwrap();
        if x.progress == 100 {
            assert_eq!(x.status, JobStatus::Complete);
        }
        if event.run_id() == run_id && event.as_completion().is_some() {
            break;
        }
    }
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn back_to_back_submit_is_already_running() {
    let registry = registry([job("Y")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(2))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let first = executor.submit("Y").await.unwrap();
    let second = executor.submit("Y").await.unwrap();
    assert!(first.is_accepted());
    assert_eq!(second, SubmissionResult::AlreadyRunning);

    assert!(matches!(next_event(&mut rx).await, ExecutorEvent::Started(_)));
    let running: Vec<_> = registry
        .snapshot()
        .await
        .into_iter()
        .filter(|entry| entry.name == "Y" && entry.status == EntityStatus::Job(JobStatus::Running))
        .collect();
    assert_eq!(running.len(), 1);
    assert_eq!(executor.submit("Y").await.unwrap(), SubmissionResult::AlreadyRunning);

    run_events(&mut rx, first.run_id().unwrap()).await;
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn resubmission_resets_progress_and_repeats_events() {
    let registry = registry([job("X")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let first = executor.submit("X").await.unwrap().run_id().unwrap();
    let first_events = run_events(&mut rx, first).await;

    let second = executor.submit("X").await.unwrap().run_id().unwrap();
    assert_ne!(first, second);
    let queued = registry.job("X").await.unwrap();
    assert_eq!(queued.progress, 0);
    assert_ne!(queued.status, JobStatus::Complete);

    let second_events = run_events(&mut rx, second).await;
    assert_eq!(progress_values(&first_events), progress_values(&second_events));
    assert_eq!(first_events.len(), second_events.len());
    assert_eq!(registry.job("X").await.unwrap().progress, 100);
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn progress_is_monotonic_within_a_run() {
    let registry = registry([job("Wobbly")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .workload("Wobbly", Wobbly)
        .unwrap()
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let run_id = executor.submit("Wobbly").await.unwrap().run_id().unwrap();
    let values = progress_values(&run_events(&mut rx, run_id).await);

    assert_eq!(values, [30, 60, 90, 100]);
    assert!(values.windows(2).all(|w| w[0] <= w[1]));
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn pool_of_two_queues_the_third_run() {
    let registry = registry([job("A"), job("B"), job("C")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(2))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    for name in ["A", "B", "C"] {
        assert!(executor.submit(name).await.unwrap().is_accepted());
    }

    let mut started = Vec::new();
    while started.len() < 2 {
        if let ExecutorEvent::Started(e) = next_event(&mut rx).await {
            started.push(e.name);
        }
    }
    started.sort();
    assert_eq!(started, ["A", "B"]);
    assert_eq!(registry.job("C").await.unwrap().status, JobStatus::Queued);
    assert_eq!(executor.queued_len().await, 1);
    assert_eq!(registry.counts().await.running, 2);

    let events = until_completed(&mut rx, 3).await;
    for name in ["A", "B", "C"] {
        let done = events[name].last().and_then(|e| e.as_completion()).unwrap();
        assert_eq!(done.status, CompletionStatus::Complete);
        assert_eq!(registry.job(name).await.unwrap().progress, 100);
    }
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_running_job_fails_it() {
    let registry = registry([job("Drift Detector")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let run_id = executor.submit("Drift Detector").await.unwrap().run_id().unwrap();
    loop {
        if next_event(&mut rx).await.as_progress().is_some() {
            break;
        }
    }
    assert!(executor.cancel("Drift Detector").await.unwrap());

    let events = run_events(&mut rx, run_id).await;
    let done = events.last().and_then(|e| e.as_completion()).unwrap();
    assert_eq!(done.status, CompletionStatus::Failed);
    assert_eq!(done.reason.as_deref(), Some("cancelled"));

    let drift = registry.job("Drift Detector").await.unwrap();
    assert_eq!(drift.status, JobStatus::Failed);
    assert!(drift.progress < 100);
    assert_eq!(drift.last_error.as_deref(), Some("cancelled"));
    assert!(!executor.cancel("Drift Detector").await.unwrap());
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_before_start_skips_the_workload() {
    let registry = registry([job("A"), job("B")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    executor.submit("A").await.unwrap();
    let b = executor.submit("B").await.unwrap().run_id().unwrap();
    assert!(executor.cancel("B").await.unwrap());

    let events = run_events(&mut rx, b).await;
    assert_eq!(events.len(), 1);
    let done = events[0].as_completion().unwrap();
    assert_eq!(done.status, CompletionStatus::Failed);
    assert_eq!(done.reason.as_deref(), Some("cancelled"));
    assert_eq!(registry.job("B").await.unwrap().status, JobStatus::Failed);
    executor.shutdown_and_join().await;
}

#[tokio::test]
async fn cancel_and_submit_unknown_names() {
    let registry = registry([job("Secrets Sync")]);
    let executor = TaskExecutor::builder(registry).build().await.unwrap();

    assert_eq!(
        executor.submit("nope").await.unwrap_err(),
        CockpitError::NotFound("nope".into())
    );
    assert!(matches!(
        executor.cancel("nope").await,
        Err(CockpitError::NotFound(_))
    ));
    assert!(!executor.cancel("Secrets Sync").await.unwrap());
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn failing_and_panicking_workloads_are_isolated() {
    let registry = registry([job("Good"), job("Bad"), job("Boom")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(3))
        .workload("Bad", FailsHalfway)
        .unwrap()
        .workload("Boom", Panics)
        .unwrap()
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    for name in ["Good", "Bad", "Boom"] {
        executor.submit(name).await.unwrap();
    }
    let events = until_completed(&mut rx, 3).await;
    let outcome = |name: &str| {
        let done = events[name].last().and_then(|e| e.as_completion()).unwrap();
        (done.status, done.reason.clone())
    };

    assert_eq!(outcome("Good"), (CompletionStatus::Complete, None));
    assert_eq!(
        outcome("Bad"),
        (CompletionStatus::Failed, Some("disk full".to_string()))
    );
    assert_eq!(
        outcome("Boom"),
        (CompletionStatus::Failed, Some("workload panicked".to_string()))
    );

    let bad = registry.job("Bad").await.unwrap();
    assert_eq!(bad.status, JobStatus::Failed);
    assert_eq!(bad.progress, 40);
    assert_eq!(registry.job("Good").await.unwrap().progress, 100);

    // the pool survives the panic
    let again = executor.submit("Good").await.unwrap().run_id().unwrap();
    let rerun = run_events(&mut rx, again).await;
    assert_eq!(
        rerun.last().and_then(|e| e.as_completion()).map(|c| c.status),
        Some(CompletionStatus::Complete)
    );
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn batch_progress_is_rounded_down() {
    let registry = registry([batch("Bulk Repo Audit", 24)]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let run_id = executor.submit("Bulk Repo Audit").await.unwrap().run_id().unwrap();
    assert_eq!(
        registry.batch("Bulk Repo Audit").await.unwrap().status,
        BatchStatus::Ready
    );

    let events = run_events(&mut rx, run_id).await;
    assert_eq!(events[0].kind(), EntityKind::Batch);
    assert_eq!(progress_values(&events), [12, 25, 37, 50, 62, 75, 87, 100]);

    let audit = registry.batch("Bulk Repo Audit").await.unwrap();
    assert_eq!(audit.status, BatchStatus::Complete);
    assert_eq!(audit.completed_items, 24);
    assert_eq!(audit.progress(), 100);
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn failed_batch_returns_to_scheduled() {
    let registry = registry([batch("Image Retag", 160)]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .workload("Image Retag", FailsHalfway)
        .unwrap()
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let run_id = executor.submit("Image Retag").await.unwrap().run_id().unwrap();
    let events = run_events(&mut rx, run_id).await;
    let done = events.last().and_then(|e| e.as_completion()).unwrap();
    assert_eq!(done.status, CompletionStatus::Failed);

    let retag = registry.batch("Image Retag").await.unwrap();
    assert_eq!(retag.status, BatchStatus::Scheduled);
    assert_eq!(retag.completed_items, 64);
    assert_eq!(retag.last_error.as_deref(), Some("disk full"));
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn snapshot_is_untouched_outside_the_run() {
    let registry = registry([job("Secrets Sync"), job("Metrics Fanout"), batch("Bulk Repo Audit", 24)]);
    let others = |snapshot: Vec<cockpit_core::SnapshotEntry>| {
        snapshot
            .into_iter()
            .filter(|entry| entry.name != "Metrics Fanout")
            .map(|entry| serde_json::to_value(entry).unwrap())
            .collect::<Vec<_>>()
    };
    let before = others(registry.snapshot().await);

    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();
    let run_id = executor.submit("Metrics Fanout").await.unwrap().run_id().unwrap();
    run_events(&mut rx, run_id).await;

    assert_eq!(others(registry.snapshot().await), before);
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn shutdown_finishes_running_and_releases_queued() {
    let registry = registry([job("A"), job("B")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    executor.submit("A").await.unwrap();
    executor.submit("B").await.unwrap();
    assert!(matches!(next_event(&mut rx).await, ExecutorEvent::Started(e) if e.name == "A"));

    executor.shutdown_and_join().await;

    assert_eq!(registry.job("A").await.unwrap().status, JobStatus::Complete);
    let b = registry.job("B").await.unwrap();
    assert_eq!(b.status, JobStatus::Queued);
    assert!(!registry.is_in_flight("B").await.unwrap());

    let next = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    assert!(next.submit("B").await.unwrap().is_accepted());
    next.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn seeded_queued_job_is_submittable() {
    let registry = registry([Entity::Job(
        Job::new("Drift Detector", JobMode::Pooled, JobStatus::Queued, 0).unwrap(),
    )]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let run_id = executor.submit("Drift Detector").await.unwrap().run_id().unwrap();
    run_events(&mut rx, run_id).await;
    assert_eq!(
        registry.job("Drift Detector").await.unwrap().status,
        JobStatus::Complete
    );
    executor.shutdown_and_join().await;
}

#[tokio::test]
async fn closed_executor_rejects_submissions() {
    let registry = registry([job("Secrets Sync")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry)).build().await.unwrap();

    assert_eq!(executor.close().await, 0);
    assert_eq!(
        executor.submit("Secrets Sync").await.unwrap_err(),
        CockpitError::ExecutorClosed
    );
    assert_eq!(
        registry.job("Secrets Sync").await.unwrap().status,
        JobStatus::Idle
    );
    executor.shutdown_and_join().await;
}

#[tokio::test(start_paused = true)]
async fn dropped_executor_releases_queued_claims() {
    let registry = registry([job("A"), job("B")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    executor.submit("A").await.unwrap();
    executor.submit("B").await.unwrap();
    assert!(matches!(next_event(&mut rx).await, ExecutorEvent::Started(e) if e.name == "A"));

    drop(executor);
    timeout(Duration::from_secs(30), async {
        while registry.is_in_flight("B").await.unwrap() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queued claim was never released");

    let next = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    assert!(next.submit("B").await.unwrap().is_accepted());
    next.shutdown_and_join().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn submits_rejected_by_close_leave_the_entity_alone() {
    let names: Vec<String> = (0..32).map(|i| format!("job-{i}")).collect();
    let registry = registry(names.iter().map(|name| {
        Entity::Job(Job::new(name.as_str(), JobMode::Pooled, JobStatus::Complete, 100).unwrap())
    }));
    let slow = ExecutorConfig {
        tick_ms: 1_000,
        ..config(1)
    };
    let executor = Arc::new(
        TaskExecutor::builder(Arc::clone(&registry))
            .config(slow)
            .build()
            .await
            .unwrap(),
    );

    let mut handles = Vec::new();
    for name in names.clone() {
        let executor = Arc::clone(&executor);
        handles.push(tokio::spawn(async move {
            let result = executor.submit(&name).await;
            (name, result)
        }));
    }
    let closer = tokio::spawn({
        let executor = Arc::clone(&executor);
        async move { executor.close().await }
    });

    for handle in handles {
        let (name, result) = handle.await.unwrap();
        if let Err(err) = result {
            assert_eq!(err, CockpitError::ExecutorClosed);
            let job = registry.job(&name).await.unwrap();
            assert_eq!(job.status, JobStatus::Complete);
            assert_eq!(job.progress, 100);
            assert_eq!(job.last_run, None);
            assert!(!registry.is_in_flight(&name).await.unwrap());
        }
    }
    closer.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancel_after_completion_finds_nothing_in_flight() {
    let registry = registry([job("X")]);
    let executor = TaskExecutor::builder(Arc::clone(&registry))
        .config(config(1))
        .build()
        .await
        .unwrap();
    let mut rx = executor.subscribe();

    let run_id = executor.submit("X").await.unwrap().run_id().unwrap();
    run_events(&mut rx, run_id).await;

    assert!(!registry.is_in_flight("X").await.unwrap());
    assert!(!executor.cancel("X").await.unwrap());
    assert_eq!(registry.job("X").await.unwrap().status, JobStatus::Complete);
    executor.shutdown_and_join().await;
}
