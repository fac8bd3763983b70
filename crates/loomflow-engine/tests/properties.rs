//! End-to-end engine behavior against an in-memory SQLite store.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use loomflow_core::config::EngineConfig;
use loomflow_core::error::{FlowError, Result};
use loomflow_core::execution::{Execution, ExecutionStatus, NodeRunStatus};
use loomflow_core::handler::{HandlerKind, HandlerResponse, NodeHandler, RunContext};
use loomflow_core::traits::ExecutionStore;
use loomflow_core::workflow::{Edge, Node, NodeKind, TriggerStrategy, Workflow};
use loomflow_engine::{ScheduledResumePoller, WaitOutcome, WorkflowEngine};
use loomflow_handlers::HandlerRegistry;
use loomflow_store::SqliteStore;

/// Records the order nodes actually ran in, then succeeds.
struct StepHandler {
    log: Arc<StdMutex<Vec<String>>>,
}

impl NodeHandler for StepHandler {
    fn app_id(&self) -> &str {
        "test"
    }
    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }
    fn key(&self) -> &str {
        "step"
    }
    fn run(
        &self,
        _config: serde_json::Value,
        input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(ctx.node_id.clone());
            Ok(HandlerResponse::Success {
                output: serde_json::json!({"node": ctx.node_id, "input": input}),
            })
        })
    }
}

/// Like `StepHandler` but sleeps first, to skew branch completion order.
struct SlowStepHandler {
    log: Arc<StdMutex<Vec<String>>>,
}

impl NodeHandler for SlowStepHandler {
    fn app_id(&self) -> &str {
        "test"
    }
    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }
    fn key(&self) -> &str {
        "slow_step"
    }
    fn run(
        &self,
        config: serde_json::Value,
        _input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            let ms = config.get("sleep_ms").and_then(|v| v.as_u64()).unwrap_or(50);
            tokio::time::sleep(Duration::from_millis(ms)).await;
            self.log.lock().unwrap().push(ctx.node_id.clone());
            Ok(HandlerResponse::Success {
                output: serde_json::json!({"node": ctx.node_id}),
            })
        })
    }
}

/// Suspends with `Scheduled` at the configured instant.
struct ScheduleAtHandler;

impl NodeHandler for ScheduleAtHandler {
    fn app_id(&self) -> &str {
        "test"
    }
    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }
    fn key(&self) -> &str {
        "schedule_at"
    }
    fn run(
        &self,
        config: serde_json::Value,
        _input: Option<serde_json::Value>,
        _ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            let at = config
                .get("at")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc))
                .expect("schedule_at config");
            Ok(HandlerResponse::Scheduled {
                payload: serde_json::json!({}),
                scheduled_at: at,
            })
        })
    }
}

/// Always fails.
struct FailHandler;

impl NodeHandler for FailHandler {
    fn app_id(&self) -> &str {
        "test"
    }
    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }
    fn key(&self) -> &str {
        "fail"
    }
    fn run(
        &self,
        _config: serde_json::Value,
        _input: Option<serde_json::Value>,
        _ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async {
            Ok(HandlerResponse::Failure {
                message: "intentional failure".into(),
            })
        })
    }
}

/// Execution-store wrapper that sleeps inside every write, widening the
/// window for lost updates between racing branch completions.
struct SlowWriteStore {
    inner: Arc<SqliteStore>,
    delay: Duration,
}

impl ExecutionStore for SlowWriteStore {
    fn get_execution(&self, id: &str) -> BoxFuture<'_, Result<Option<Execution>>> {
        let id = id.to_string();
        Box::pin(async move { self.inner.get_execution(&id).await })
    }
    fn put_execution(&self, execution: &Execution) -> BoxFuture<'_, Result<()>> {
        let execution = execution.clone();
        Box::pin(async move {
            tokio::time::sleep(self.delay).await;
            self.inner.put_execution(&execution).await
        })
    }
    fn list_due_scheduled(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Execution>>> {
        Box::pin(async move { self.inner.list_due_scheduled(now).await })
    }
}

struct Harness {
    store: Arc<SqliteStore>,
    engine: Arc<WorkflowEngine>,
    log: Arc<StdMutex<Vec<String>>>,
}

fn harness() -> Harness {
    harness_with_write_delay(None)
}

fn harness_with_write_delay(delay: Option<Duration>) -> Harness {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let log = Arc::new(StdMutex::new(Vec::new()));

    let mut registry = HandlerRegistry::with_builtins();
    registry.register(StepHandler { log: log.clone() });
    registry.register(SlowStepHandler { log: log.clone() });
    registry.register(ScheduleAtHandler);
    registry.register(FailHandler);

    let executions: Arc<dyn ExecutionStore> = match delay {
        Some(delay) => Arc::new(SlowWriteStore {
            inner: store.clone(),
            delay,
        }),
        None => store.clone(),
    };

    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        executions,
        store.clone(),
        Arc::new(registry),
        EngineConfig {
            wait_poll_interval_ms: 10,
            wait_max_polls: 5,
            poller_interval_secs: 1,
        },
    ));

    Harness { store, engine, log }
}

fn trigger(id: &str) -> Node {
    Node::new(id, NodeKind::Trigger, "core").with_trigger("manual")
}

fn step(id: &str) -> Node {
    Node::new(id, NodeKind::Action, "test").with_action("step")
}

fn workflow(id: &str, nodes: Vec<Node>, edges: Vec<Edge>) -> Workflow {
    Workflow {
        id: id.into(),
        project_id: "p1".into(),
        workspace_id: "ws1".into(),
        nodes,
        edges,
        strategy: TriggerStrategy::Manual,
        is_active: true,
    }
}

async fn start(h: &Harness, wf: &Workflow) -> Execution {
    h.store.put_workflow(wf).await.unwrap();
    let exec = Execution::new(wf);
    h.store.put_execution(&exec).await.unwrap();
    exec
}

use loomflow_core::traits::{RunQueueStore, WorkflowStore};

#[tokio::test]
async fn linear_chain_runs_in_order_to_success() {
    let h = harness();
    let wf = workflow(
        "wf-linear",
        vec![trigger("t"), step("a"), step("b"), step("c")],
        vec![
            Edge::new("e1", "t", "a"),
            Edge::new("e2", "a", "b"),
            Edge::new("e3", "b", "c"),
        ],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Success);

    assert_eq!(*h.log.lock().unwrap(), vec!["a", "b", "c"]);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Success);
    assert!(stored.stopped_at.is_some());
    assert_eq!(stored.nodes.len(), 4);
    assert!(stored
        .nodes
        .iter()
        .all(|n| n.status == NodeRunStatus::Success));
}

#[tokio::test]
async fn placeholders_are_elided_from_the_run_record() {
    let h = harness();
    let wf = workflow(
        "wf-placeholder",
        vec![
            trigger("t"),
            Node::new("p1", NodeKind::Placeholder, "core"),
            Node::new("p2", NodeKind::Placeholder, "core"),
            step("b"),
        ],
        vec![
            Edge::new("e1", "t", "p1"),
            Edge::new("e2", "p1", "p2"),
            Edge::new("e3", "p2", "b"),
        ],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Success);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    let ids: Vec<&str> = stored.nodes.iter().map(|n| n.node.id.as_str()).collect();
    assert_eq!(ids, vec!["t", "b"]);

    assert_eq!(stored.edges.len(), 1);
    assert_eq!(stored.edges[0].source, "t");
    assert_eq!(stored.edges[0].target, "b");
}

#[tokio::test]
async fn decide_path_follows_only_chosen_edges() {
    let h = harness();
    let decide = Node::new("d", NodeKind::DecidePath, "core")
        .with_action("decide_path")
        .with_value(serde_json::json!({
            "paths": [
                {"edge_id": "ex", "expr": r#"status == "rejected""#},
                {"edge_id": "ey", "expr": r#"status == "approved""#},
                {"edge_id": "ez", "expr": r#"status == "pending""#},
            ]
        }));
    let wf = workflow(
        "wf-decide",
        vec![trigger("t"), decide, step("x"), step("y"), step("z")],
        vec![
            Edge::new("e0", "t", "d"),
            Edge::new("ex", "d", "x"),
            Edge::new("ey", "d", "y"),
            Edge::new("ez", "d", "z"),
        ],
    );
    let exec = start(&h, &wf).await;

    let status = h
        .engine
        .run_execution(&exec.id, Some(serde_json::json!({"status": "approved"})), None)
        .await
        .unwrap();
    assert_eq!(status, ExecutionStatus::Success);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert!(stored.node("y").is_some());
    assert!(stored.node("x").is_none());
    assert!(stored.node("z").is_none());
    assert_eq!(*h.log.lock().unwrap(), vec!["y"]);
}

#[tokio::test]
async fn diamond_branches_lose_neither_output() {
    // Slow persistence writes + one slow branch: exactly the race the
    // per-execution mutation queue exists for.
    let h = harness_with_write_delay(Some(Duration::from_millis(10)));
    let slow = Node::new("c", NodeKind::Action, "test")
        .with_action("slow_step")
        .with_value(serde_json::json!({"sleep_ms": 60}));
    let wf = workflow(
        "wf-diamond",
        vec![trigger("t"), step("b"), slow, step("d")],
        vec![
            Edge::new("e1", "t", "b"),
            Edge::new("e2", "t", "c"),
            Edge::new("e3", "b", "d"),
            Edge::new("e4", "c", "d"),
        ],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Success);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert!(stored.node("b").unwrap().output.is_some());
    assert!(stored.node("c").unwrap().output.is_some());
    assert_eq!(stored.node("d").unwrap().status, NodeRunStatus::Success);

    // The join target ran exactly once.
    let d_runs = h.log.lock().unwrap().iter().filter(|id| *id == "d").count();
    assert_eq!(d_runs, 1);

    // Both traversal edges into the join were recorded.
    assert!(stored.edges.iter().any(|e| e.id == "e3"));
    assert!(stored.edges.iter().any(|e| e.id == "e4"));
}

#[tokio::test]
async fn needs_input_suspends_until_resumed() {
    let h = harness();
    let gate = Node::new("g", NodeKind::Action, "core")
        .with_action("approval")
        .with_value(serde_json::json!({"prompt": "Proceed?"}));
    let wf = workflow(
        "wf-gate",
        vec![trigger("t"), gate, step("b")],
        vec![Edge::new("e1", "t", "g"), Edge::new("e2", "g", "b")],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::NeedsInput);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.node("g").unwrap().status, NodeRunStatus::NeedsInput);
    assert!(stored.node("b").is_none());
    assert!(h.log.lock().unwrap().is_empty());

    // External resumption names the node and supplies replacement input.
    let status = h
        .engine
        .resume_node(&exec.id, "g", Some(serde_json::json!({"approved": true})))
        .await
        .unwrap();
    assert_eq!(status, ExecutionStatus::Success);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    let gate_node = stored.node("g").unwrap();
    assert_eq!(gate_node.status, NodeRunStatus::Success);
    assert_eq!(gate_node.output, Some(serde_json::json!({"approved": true})));
    assert_eq!(stored.node("b").unwrap().status, NodeRunStatus::Success);
    assert_eq!(*h.log.lock().unwrap(), vec!["b"]);
}

#[tokio::test]
async fn earliest_scheduled_time_wins() {
    let h = harness();
    let t1 = Utc::now() + chrono::Duration::hours(1);
    let t2 = Utc::now() + chrono::Duration::hours(2);

    // The later time sits on the fast branch so it tends to apply first.
    let s1 = Node::new("s1", NodeKind::Action, "test")
        .with_action("schedule_at")
        .with_value(serde_json::json!({"at": t1.to_rfc3339(), "sleep_ms": 0}));
    let s2 = Node::new("s2", NodeKind::Action, "test")
        .with_action("schedule_at")
        .with_value(serde_json::json!({"at": t2.to_rfc3339()}));
    let wf = workflow(
        "wf-sched",
        vec![trigger("t"), s1, s2],
        vec![Edge::new("e1", "t", "s1"), Edge::new("e2", "t", "s2")],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Scheduled);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.continue_at, Some(t1));
    assert_eq!(stored.node("s1").unwrap().status, NodeRunStatus::Scheduled);
    assert_eq!(stored.node("s2").unwrap().status, NodeRunStatus::Scheduled);
}

#[tokio::test]
async fn poller_resumes_due_nodes() {
    let h = harness();
    let past = Utc::now() - chrono::Duration::minutes(5);
    let s1 = Node::new("s1", NodeKind::Action, "test")
        .with_action("schedule_at")
        .with_value(serde_json::json!({"at": past.to_rfc3339()}));
    let wf = workflow(
        "wf-poll",
        vec![trigger("t"), s1, step("b")],
        vec![Edge::new("e1", "t", "s1"), Edge::new("e2", "s1", "b")],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Scheduled);

    let poller = ScheduledResumePoller::new(
        h.engine.clone(),
        Duration::from_secs(60),
        CancellationToken::new(),
    );
    let resumed = poller.tick().await.unwrap();
    assert_eq!(resumed, 1);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Success);
    assert_eq!(stored.node("s1").unwrap().status, NodeRunStatus::Success);
    assert_eq!(stored.node("b").unwrap().status, NodeRunStatus::Success);
    assert!(stored.continue_at.is_none());
}

#[tokio::test]
async fn workspace_queue_drains_in_fifo_order() {
    let h = harness();

    // Three one-shot workflows; E1's only action sleeps so E3 can be
    // enqueued while E1 is still executing.
    let mut execs = Vec::new();
    for (wf_id, node) in [
        (
            "wf-q1",
            Node::new("q1", NodeKind::Action, "test")
                .with_action("slow_step")
                .with_value(serde_json::json!({"sleep_ms": 120})),
        ),
        ("wf-q2", step("q2")),
        ("wf-q3", step("q3")),
    ] {
        let wf = workflow(
            wf_id,
            vec![trigger("t"), node.clone()],
            vec![Edge::new("e1", "t", node.id.as_str())],
        );
        execs.push(start(&h, &wf).await);
    }

    use loomflow_core::execution::QueueItem;
    h.store
        .enqueue_item(&QueueItem::new("ws1", execs[0].id.as_str(), None))
        .await
        .unwrap();
    h.store
        .enqueue_item(&QueueItem::new("ws1", execs[1].id.as_str(), None))
        .await
        .unwrap();

    let engine = h.engine.clone();
    let drain = tokio::spawn(async move { engine.drain_workspace("ws1").await });

    // E3 arrives mid-drain, while E1 is still sleeping.
    tokio::time::sleep(Duration::from_millis(40)).await;
    h.store
        .enqueue_item(&QueueItem::new("ws1", execs[2].id.as_str(), None))
        .await
        .unwrap();

    drain.await.unwrap().unwrap();

    assert_eq!(*h.log.lock().unwrap(), vec!["q1", "q2", "q3"]);
    assert!(h.store.peek_oldest("ws1").await.unwrap().is_none());

    // Queue flipped back to idle: a fresh drain can acquire it.
    assert!(h.store.try_begin_drain("ws1").await.unwrap());
    h.store.end_drain("ws1").await.unwrap();

    for exec in &execs {
        let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Success);
    }
}

#[tokio::test]
async fn dangling_edge_fails_execution_and_deactivates_workflow() {
    let h = harness();
    let wf = workflow(
        "wf-dangling",
        vec![trigger("t")],
        vec![Edge::new("e1", "t", "ghost")],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Failed);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert!(stored
        .status_message
        .as_deref()
        .unwrap()
        .contains("nonexistent"));

    let wf = h.store.get_workflow("wf-dangling").await.unwrap().unwrap();
    assert!(!wf.is_active);
}

#[tokio::test]
async fn failing_branch_does_not_stop_its_sibling() {
    let h = harness();
    let boom = Node::new("f", NodeKind::Action, "test").with_action("fail");
    let slow = Node::new("s", NodeKind::Action, "test")
        .with_action("slow_step")
        .with_value(serde_json::json!({"sleep_ms": 40}));
    let wf = workflow(
        "wf-sibling",
        vec![trigger("t"), boom, slow],
        vec![Edge::new("e1", "t", "f"), Edge::new("e2", "t", "s")],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Failed);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.node("f").unwrap().status, NodeRunStatus::Failed);
    // The sibling still ran to completion despite the failure.
    assert_eq!(stored.node("s").unwrap().status, NodeRunStatus::Success);
}

#[tokio::test]
async fn wait_for_outcome_reports_settlement_and_timeout() {
    let h = harness();
    let gate = Node::new("g", NodeKind::Action, "core").with_action("approval");
    let wf = workflow(
        "wf-wait",
        vec![trigger("t"), gate],
        vec![Edge::new("e1", "t", "g")],
    );
    let exec = start(&h, &wf).await;

    h.engine.run_execution(&exec.id, None, None).await.unwrap();
    let outcome = h.engine.wait_for_outcome(&exec.id).await.unwrap();
    assert_eq!(
        outcome,
        WaitOutcome::Finished(ExecutionStatus::NeedsInput)
    );

    // An execution nobody advances stays RUNNING and times the wait out.
    let wf2 = workflow("wf-wait2", vec![trigger("t")], vec![]);
    let idle = start(&h, &wf2).await;
    let outcome = h.engine.wait_for_outcome(&idle.id).await.unwrap();
    assert_eq!(outcome, WaitOutcome::TimedOut);
}

#[tokio::test]
async fn redelivered_run_signal_does_not_pass_a_suspended_gate() {
    let h = harness();
    let gate = Node::new("g", NodeKind::Action, "core").with_action("approval");
    let wf = workflow(
        "wf-redeliver",
        vec![trigger("t"), gate, step("b")],
        vec![Edge::new("e1", "t", "g"), Edge::new("e2", "g", "b")],
    );
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::NeedsInput);

    // The same signal arrives again with no resumption target. The gate
    // is not a continuation point, so nothing downstream may run.
    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::NeedsInput);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.node("g").unwrap().status, NodeRunStatus::NeedsInput);
    assert!(stored.node("b").is_none());
    assert!(h.log.lock().unwrap().is_empty());

    // Resumption through the gate still works afterwards.
    let status = h.engine.resume_node(&exec.id, "g", None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Success);
    assert_eq!(*h.log.lock().unwrap(), vec!["b"]);
}

#[tokio::test]
async fn racing_start_signals_record_one_trigger() {
    let h = harness();
    let wf = workflow(
        "wf-race",
        vec![trigger("t"), step("a")],
        vec![Edge::new("e1", "t", "a")],
    );
    let exec = start(&h, &wf).await;

    let (r1, r2) = tokio::join!(
        h.engine.run_execution(&exec.id, None, None),
        h.engine.run_execution(&exec.id, None, None),
    );
    r1.unwrap();
    r2.unwrap();

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    let trigger_entries = stored.nodes.iter().filter(|n| n.node.id == "t").count();
    assert_eq!(trigger_entries, 1);
    assert_eq!(stored.status, ExecutionStatus::Success);
    assert_eq!(stored.node("a").unwrap().status, NodeRunStatus::Success);

    let a_runs = h.log.lock().unwrap().iter().filter(|id| *id == "a").count();
    assert_eq!(a_runs, 1);
}

#[tokio::test]
async fn resuming_an_unrecorded_node_is_an_error() {
    let h = harness();
    let gate = Node::new("g", NodeKind::Action, "core").with_action("approval");
    let wf = workflow(
        "wf-resume-miss",
        vec![trigger("t"), gate],
        vec![Edge::new("e1", "t", "g")],
    );
    let exec = start(&h, &wf).await;
    h.engine.run_execution(&exec.id, None, None).await.unwrap();

    let err = h.engine.resume_node(&exec.id, "ghost", None).await.unwrap_err();
    assert!(matches!(err, FlowError::NodeNotFound { .. }));

    // The failed resume left the suspension untouched.
    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::NeedsInput);
}

#[tokio::test]
async fn wait_timeout_skips_the_trailing_sleep() {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let engine = WorkflowEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(HandlerRegistry::with_builtins()),
        EngineConfig {
            wait_poll_interval_ms: 200,
            wait_max_polls: 1,
            poller_interval_secs: 1,
        },
    );

    let wf = workflow("wf-wait-budget", vec![trigger("t")], vec![]);
    store.put_workflow(&wf).await.unwrap();
    let exec = Execution::new(&wf);
    store.put_execution(&exec).await.unwrap();

    // One poll, zero sleeps: the miss reports without burning an interval.
    let started = std::time::Instant::now();
    let outcome = engine.wait_for_outcome(&exec.id).await.unwrap();
    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert!(started.elapsed() < Duration::from_millis(150));
}

#[tokio::test]
async fn deactivated_workflow_fails_fresh_execution() {
    let h = harness();
    let mut wf = workflow(
        "wf-inactive",
        vec![trigger("t"), step("a")],
        vec![Edge::new("e1", "t", "a")],
    );
    wf.is_active = false;
    let exec = start(&h, &wf).await;

    let status = h.engine.run_execution(&exec.id, None, None).await.unwrap();
    assert_eq!(status, ExecutionStatus::Failed);

    let stored = h.store.get_execution(&exec.id).await.unwrap().unwrap();
    assert!(stored
        .status_message
        .as_deref()
        .unwrap()
        .contains("deactivated"));
    assert!(stored.nodes.is_empty());
}
