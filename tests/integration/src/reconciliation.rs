//! The worker pool driving reconciliations from queued keys.

use std::time::Duration;

use kourier_cache::Cache;
use kourier_controller::{
    Controller, ControllerConfig, ControllerEvent, QueueConfig, WorkQueue, RECONCILE_KEY,
};
use kourier_core::{ResourceType, TypeUrl};
use kourier_integration_tests::{backend, rule, ControlPlane, WAIT};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

fn queue() -> WorkQueue {
    WorkQueue::new(QueueConfig {
        base_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(50),
        max_retries: 5,
    })
}

fn start(plane: &ControlPlane, queue: WorkQueue) -> (oneshot::Sender<()>, JoinHandle<()>) {
    let controller = Controller::new(
        queue,
        plane.reconciler(),
        plane.events.clone(),
        ControllerConfig {
            workers: 2,
            grace_period: Duration::from_secs(1),
        },
    );
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(controller.run(async move {
        let _ = stopped.await;
    }));
    (stop, task)
}

async fn stop(handle: (oneshot::Sender<()>, JoinHandle<()>)) {
    let (stop, task) = handle;
    let _ = stop.send(());
    tokio::time::timeout(WAIT, task).await.unwrap().unwrap();
}

#[tokio::test]
async fn queued_key_publishes_configuration() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 2));

    let mut watch = plane.cache.watch(plane.node.hash());
    let queue = queue();
    let controller = start(&plane, queue.clone());

    queue.add(RECONCILE_KEY);
    let snapshot = tokio::time::timeout(WAIT, watch.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.resources(ResourceType::Cluster).len(), 1);
    assert_eq!(snapshot.resources(ResourceType::Endpoint).len(), 1);

    stop(controller).await;
}

#[tokio::test]
async fn burst_of_changes_converges_on_latest_state() {
    let plane = ControlPlane::new();
    plane.watcher.upsert_backend(backend("b", 1));
    let queue = queue();
    let controller = start(&plane, queue.clone());

    for i in 0..20u8 {
        plane.watcher.upsert_rule(rule(
            &format!("rule-{i}"),
            &format!("host-{i}.example.com"),
            "/",
            "b",
        ));
        queue.add(RECONCILE_KEY);
    }

    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let done = plane.snapshot().is_some_and(|snapshot| {
            plane.events.events().iter().any(|event| {
                matches!(event, ControllerEvent::ReconcileSucceeded { .. })
            }) && queue.is_empty()
                && queue.processing() == 0
                && snapshot.resources(ResourceType::Route).len() == 1
        });
        if done {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "did not converge");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // The last reconciliation saw every rule.
    let mut gateway = plane.connect();
    gateway.subscribe(TypeUrl::ROUTE, "").await;
    let tables: Vec<kourier_types::envoy::config::route::v3::RouteConfiguration> =
        kourier_integration_tests::decode_all(&gateway.recv().await);
    assert_eq!(tables[0].virtual_hosts.len(), 20);

    // Far fewer reconciliations than adds.
    let succeeded = plane
        .events
        .events()
        .iter()
        .filter(|event| matches!(event, ControllerEvent::ReconcileSucceeded { .. }))
        .count();
    assert!(succeeded < 20, "{succeeded} reconciliations for 20 adds");

    stop(controller).await;
}

#[tokio::test]
async fn transient_failures_are_retried_until_success() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 1));
    plane.watcher.set_unavailable(true);

    let mut watch = plane.cache.watch(plane.node.hash());
    let queue = queue();
    let controller = start(&plane, queue.clone());
    queue.add(RECONCILE_KEY);

    let deadline = tokio::time::Instant::now() + WAIT;
    while !plane
        .events
        .events()
        .iter()
        .any(|event| matches!(event, ControllerEvent::ReconcileFailed { .. }))
    {
        assert!(tokio::time::Instant::now() < deadline, "no failure recorded");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(plane.snapshot().is_none());

    plane.watcher.set_unavailable(false);
    tokio::time::timeout(WAIT, watch.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(queue.failures(RECONCILE_KEY), 0);

    stop(controller).await;
}

#[tokio::test]
async fn persistent_failure_is_dropped_and_revived_by_next_change() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("broken", "foo.example.com", "relative", "b"));
    let queue = queue();
    let controller = start(&plane, queue.clone());
    queue.add(RECONCILE_KEY);

    let deadline = tokio::time::Instant::now() + WAIT;
    while !plane
        .events
        .events()
        .iter()
        .any(|event| matches!(event, ControllerEvent::ReconcileDropped { .. }))
    {
        assert!(tokio::time::Instant::now() < deadline, "key never dropped");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(plane.snapshot().is_none());

    // A fixed rule and a fresh notification publish again.
    plane
        .watcher
        .upsert_rule(rule("broken", "foo.example.com", "/", "b"));
    let mut watch = plane.cache.watch(plane.node.hash());
    queue.add(RECONCILE_KEY);
    tokio::time::timeout(WAIT, watch.changed())
        .await
        .unwrap()
        .unwrap();

    stop(controller).await;
}

#[tokio::test]
async fn shutdown_stops_workers() {
    let plane = ControlPlane::new();
    let queue = queue();
    let controller = start(&plane, queue.clone());

    stop(controller).await;
    assert!(queue.is_shutting_down());
    // Keys added after shutdown are never processed.
    queue.add(RECONCILE_KEY);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(plane.snapshot().is_none());
}

#[tokio::test]
async fn shared_cache_serves_streams_opened_before_first_publication() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 1));

    let mut gateway = plane.connect();
    gateway.subscribe(TypeUrl::LISTENER, "").await;
    gateway.assert_quiet().await;

    let queue = queue();
    let controller = start(&plane, queue.clone());
    queue.add(RECONCILE_KEY);

    let response = gateway.recv().await;
    assert_eq!(response.type_url, TypeUrl::LISTENER);
    assert_eq!(response.resources.len(), 1);

    stop(controller).await;
}
