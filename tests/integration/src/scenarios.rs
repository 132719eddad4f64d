//! Routing rules flowing through translation, the cache and a gateway
//! stream.

use kourier_cache::Snapshot;
use kourier_controller::ControllerEvent;
use kourier_core::{ResourceType, TypeUrl};
use kourier_integration_tests::{backend, decode_all, rule, ControlPlane};
use kourier_types::envoy::config::cluster::v3::Cluster;
use kourier_types::envoy::config::endpoint::v3::ClusterLoadAssignment;
use kourier_types::envoy::config::listener::v3::Listener;
use kourier_types::envoy::config::route::v3::route::Action;
use kourier_types::envoy::config::route::v3::route_action::ClusterSpecifier;
use kourier_types::envoy::config::route::v3::route_match::PathSpecifier;
use kourier_types::envoy::config::route::v3::{Route, RouteConfiguration};

fn lb_endpoint_count(assignment: &ClusterLoadAssignment) -> usize {
    assignment
        .endpoints
        .iter()
        .map(|locality| locality.lb_endpoints.len())
        .sum()
}

fn prefix(route: &Route) -> &str {
    match route.r#match.as_ref().and_then(|m| m.path_specifier.as_ref()) {
        Some(PathSpecifier::Prefix(prefix)) => prefix,
        other => panic!("unexpected path specifier: {other:?}"),
    }
}

fn target_cluster(route: &Route) -> &str {
    match &route.action {
        Some(Action::Route(action)) => match &action.cluster_specifier {
            Some(ClusterSpecifier::Cluster(name)) => name,
            other => panic!("unexpected cluster specifier: {other:?}"),
        },
        None => panic!("route without action"),
    }
}

fn version_of(snapshot: &Snapshot, resource_type: ResourceType) -> String {
    snapshot.get_version(resource_type).to_string()
}

// ============================================================================
// Publication
// ============================================================================

#[tokio::test]
async fn single_rule_reaches_the_gateway() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 2));
    assert!(plane.reconcile().await.unwrap().is_updated());

    let mut gateway = plane.connect();

    gateway.subscribe(TypeUrl::LISTENER, "").await;
    let response = gateway.recv().await;
    let listeners: Vec<Listener> = decode_all(&response);
    assert_eq!(listeners.len(), 1);
    assert_eq!(listeners[0].name, "kourier_http");

    gateway.subscribe(TypeUrl::ROUTE, "").await;
    let response = gateway.recv().await;
    let tables: Vec<RouteConfiguration> = decode_all(&response);
    assert_eq!(tables.len(), 1);
    let hosts = &tables[0].virtual_hosts;
    assert_eq!(hosts.len(), 1);
    assert!(hosts[0].domains.contains(&"foo.example.com".to_string()));
    assert_eq!(hosts[0].routes.len(), 1);
    assert_eq!(prefix(&hosts[0].routes[0]), "/");
    assert_eq!(target_cluster(&hosts[0].routes[0]), "default/b");

    gateway.subscribe(TypeUrl::CLUSTER, "").await;
    let response = gateway.recv().await;
    let clusters: Vec<Cluster> = decode_all(&response);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].name, "default/b");

    gateway.subscribe(TypeUrl::ENDPOINT, "").await;
    let response = gateway.recv().await;
    let assignments: Vec<ClusterLoadAssignment> = decode_all(&response);
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].cluster_name, "default/b");
    assert_eq!(lb_endpoint_count(&assignments[0]), 2);
}

#[tokio::test]
async fn losing_every_ready_endpoint_only_empties_the_load_assignment() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 2));
    plane.reconcile().await.unwrap();
    let before = plane.snapshot().unwrap();

    let mut gateway = plane.connect();
    for type_url in [TypeUrl::CLUSTER, TypeUrl::ENDPOINT] {
        gateway.subscribe(type_url, "").await;
        let response = gateway.recv().await;
        gateway.ack(&response).await;
    }
    gateway.assert_quiet().await;

    plane.watcher.upsert_backend(backend("b", 0));
    let outcome = plane.reconcile().await.unwrap();
    match outcome {
        kourier_cache::SetOutcome::Updated { changed, .. } => {
            assert_eq!(changed, vec![ResourceType::Endpoint]);
        }
        other => panic!("expected an update, got {other:?}"),
    }

    // Only the load assignment is pushed; the cluster keeps its version.
    let response = gateway.recv().await;
    assert_eq!(response.type_url, TypeUrl::ENDPOINT);
    let assignments: Vec<ClusterLoadAssignment> = decode_all(&response);
    assert_eq!(assignments.len(), 1);
    assert_eq!(lb_endpoint_count(&assignments[0]), 0);
    gateway.ack(&response).await;
    gateway.assert_quiet().await;

    let after = plane.snapshot().unwrap();
    assert_eq!(after.resources(ResourceType::Cluster).len(), 1);
    assert_eq!(
        version_of(&after, ResourceType::Cluster),
        version_of(&before, ResourceType::Cluster)
    );
    assert!(after.get_version(ResourceType::Endpoint) > before.get_version(ResourceType::Endpoint));
}

#[tokio::test]
async fn duplicate_host_and_path_yield_one_route() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("beta", "foo.example.com", "/", "b"));
    plane
        .watcher
        .upsert_rule(rule("alpha", "foo.example.com", "/", "a"));
    plane.watcher.upsert_backend(backend("a", 1));
    plane.watcher.upsert_backend(backend("b", 1));
    plane.reconcile().await.unwrap();

    let mut gateway = plane.connect();
    gateway.subscribe(TypeUrl::ROUTE, "").await;
    let tables: Vec<RouteConfiguration> = decode_all(&gateway.recv().await);
    let routes = &tables[0].virtual_hosts[0].routes;
    assert_eq!(routes.len(), 1);
    assert_eq!(target_cluster(&routes[0]), "default/a");

    let conflicts: Vec<_> = plane
        .events
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ControllerEvent::RouteConflict { winner, loser, .. } => Some((winner, loser)),
            _ => None,
        })
        .collect();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].0.to_string(), "default/alpha");
    assert_eq!(conflicts[0].1.to_string(), "default/beta");
}

#[tokio::test]
async fn gateway_holding_current_version_waits_for_next_change() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 1));
    plane.reconcile().await.unwrap();
    let current = version_of(&plane.snapshot().unwrap(), ResourceType::Cluster);

    let mut gateway = plane.connect();
    gateway.subscribe(TypeUrl::CLUSTER, &current).await;
    gateway.assert_quiet().await;

    plane
        .watcher
        .upsert_rule(rule("bar", "bar.example.com", "/", "c"));
    plane.watcher.upsert_backend(backend("c", 1));
    plane.reconcile().await.unwrap();

    let response = gateway.recv().await;
    assert_eq!(response.type_url, TypeUrl::CLUSTER);
    assert_ne!(response.version_info, current);
    let clusters: Vec<Cluster> = decode_all(&response);
    assert_eq!(clusters.len(), 2);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn malformed_rule_keeps_serving_last_good_configuration() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 1));
    plane.reconcile().await.unwrap();
    let good = plane.snapshot().unwrap();

    let mut gateway = plane.connect();
    gateway.subscribe(TypeUrl::ROUTE, "").await;
    let response = gateway.recv().await;
    gateway.ack(&response).await;

    plane
        .watcher
        .upsert_rule(rule("broken", "bar.example.com", "no-slash", "b"));
    assert!(plane.reconcile().await.is_err());

    gateway.assert_quiet().await;
    assert!(plane.snapshot().unwrap().same_content(&good));
    assert_eq!(plane.snapshot().unwrap().version(), good.version());
}

#[tokio::test]
async fn unavailable_watcher_keeps_serving_last_good_configuration() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 1));
    plane.reconcile().await.unwrap();
    let version = plane.snapshot().unwrap().version();

    plane.watcher.set_unavailable(true);
    let err = plane.reconcile().await.unwrap_err();
    assert!(!err.is_fatal());
    assert_eq!(plane.snapshot().unwrap().version(), version);

    plane.watcher.set_unavailable(false);
    assert!(!plane.reconcile().await.unwrap().is_updated());
}

// ============================================================================
// Versioning
// ============================================================================

#[tokio::test]
async fn reconciling_unchanged_state_issues_no_version() {
    let plane = ControlPlane::new();
    plane
        .watcher
        .upsert_rule(rule("foo", "foo.example.com", "/", "b"));
    plane.watcher.upsert_backend(backend("b", 1));

    let first = plane.reconcile().await.unwrap();
    let second = plane.reconcile().await.unwrap();
    assert!(first.is_updated());
    assert!(!second.is_updated());
    assert_eq!(first.version(), second.version());
}

#[tokio::test]
async fn published_versions_only_increase() {
    let plane = ControlPlane::new();
    plane.watcher.upsert_backend(backend("b", 3));

    let mut last = None;
    for i in 0..5u8 {
        plane.watcher.upsert_rule(rule(
            &format!("rule-{i}"),
            &format!("host-{i}.example.com"),
            "/",
            "b",
        ));
        let version = plane.reconcile().await.unwrap().version();
        if let Some(previous) = last {
            assert!(version > previous);
        }
        last = Some(version);
    }
}

#[tokio::test]
async fn object_order_does_not_change_the_snapshot() {
    let forward = ControlPlane::new();
    let reverse = ControlPlane::new();

    let rules = [
        rule("a", "a.example.com", "/", "x"),
        rule("b", "a.example.com", "/api", "y"),
        rule("c", "c.example.com", "/", "x"),
    ];
    let backends = [backend("x", 2), backend("y", 1)];

    for r in rules.iter().cloned() {
        forward.watcher.upsert_rule(r);
    }
    for b in backends.iter().cloned() {
        forward.watcher.upsert_backend(b);
    }
    for r in rules.iter().rev().cloned() {
        reverse.watcher.upsert_rule(r);
    }
    for b in backends.iter().rev().cloned() {
        reverse.watcher.upsert_backend(b);
    }

    forward.reconcile().await.unwrap();
    reverse.reconcile().await.unwrap();
    assert!(forward
        .snapshot()
        .unwrap()
        .same_content(&reverse.snapshot().unwrap()));
}
