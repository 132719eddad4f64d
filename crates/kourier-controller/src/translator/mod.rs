//! Ingress translation.
//!
//! [`Translator::translate`] maps the complete set of routing rules and
//! backends to a gateway snapshot. It is a pure function: the same input
//! always yields a byte-identical snapshot, whatever order rules and
//! backends arrive in.
//!
//! ## Output
//!
//! | Resource | Produced |
//! |----------|----------|
//! | Listener | one, bound to the gateway port, always present |
//! | Route table | one, one virtual host per host, always present |
//! | Cluster | one per backend referenced by a kept rule |
//! | Load assignment | one per cluster, ready endpoints only |
//!
//! ## Conflicts
//!
//! When several rules claim the same host and path, the rule with the
//! smallest `(namespace, name)` wins. The others are reported as
//! [`RouteConflict`]s and contribute nothing to the snapshot.

mod resources;
mod weights;

pub use weights::{normalize as normalize_weights, TOTAL_WEIGHT};

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::net::IpAddr;
use std::time::Duration;

use kourier_cache::Snapshot;
use kourier_core::{BoxResource, KourierError, Result};
use tracing::{debug, trace};

use crate::model::{Backend, ObjectKey, RouteRule};

/// Configuration for the translator.
#[derive(Debug, Clone)]
pub struct TranslatorConfig {
    /// Address the gateway listener binds.
    pub listener_address: String,
    /// Port the gateway listener binds.
    pub gateway_port: u16,
    /// Name of the gateway listener.
    pub listener_name: String,
    /// Name of the route table.
    pub route_config_name: String,
    /// Stat prefix of the HTTP connection manager.
    pub stat_prefix: String,
    /// Upstream connect timeout of every cluster.
    pub connect_timeout: Duration,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            listener_address: "0.0.0.0".to_string(),
            gateway_port: 19001,
            listener_name: "kourier_http".to_string(),
            route_config_name: "kourier_routes".to_string(),
            stat_prefix: "kourier_http".to_string(),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Two rules claimed the same host and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConflict {
    /// Lower-cased host.
    pub host: String,
    /// Path prefix.
    pub path: String,
    /// The rule that was kept.
    pub winner: ObjectKey,
    /// The rule that was ignored.
    pub loser: ObjectKey,
}

/// Result of a translation.
#[derive(Debug, Clone)]
pub struct Translation {
    /// The unversioned snapshot to publish.
    pub snapshot: Snapshot,
    /// Rules ignored because another rule claimed their host and path.
    pub conflicts: Vec<RouteConflict>,
}

/// Maps routing rules and backends to gateway configuration.
///
/// # Example
///
/// ```rust
/// use kourier_controller::{Backend, BackendRef, EndpointAddress, RouteRule, Translator};
/// use kourier_core::ResourceType;
///
/// let rules = vec![RouteRule::new("default", "hello", "foo.example.com", "/")
///     .with_backend(BackendRef::new("hello", 100))];
/// let backends = vec![Backend::new("default", "hello")
///     .with_endpoint(EndpointAddress::ready("10.0.0.1", 8080))];
///
/// let translation = Translator::default().translate(&rules, &backends).unwrap();
/// let snapshot = translation.snapshot;
///
/// assert_eq!(snapshot.resources(ResourceType::Listener).len(), 1);
/// assert_eq!(snapshot.resources(ResourceType::Cluster).len(), 1);
/// assert!(translation.conflicts.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Translator {
    config: TranslatorConfig,
}

/// A validated rule with its merged backend weights.
struct PreparedRule<'a> {
    key: ObjectKey,
    host: String,
    rule: &'a RouteRule,
    weights: BTreeMap<ObjectKey, u64>,
}

impl Translator {
    /// Create a translator.
    pub fn new(config: TranslatorConfig) -> Self {
        Self { config }
    }

    /// The translator configuration.
    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    /// Translate the complete current state.
    ///
    /// # Errors
    ///
    /// Returns [`KourierError::Translation`] naming the offending object if
    /// a rule or backend is malformed, or if two objects share an identity.
    /// Nothing is produced in that case.
    pub fn translate(&self, rules: &[RouteRule], backends: &[Backend]) -> Result<Translation> {
        let backends = index_backends(backends)?;
        let prepared = prepare_rules(rules, self.config.gateway_port)?;

        // (host, path) -> rules in identity order; the first one wins
        let mut claims: BTreeMap<(String, String), Vec<PreparedRule<'_>>> = BTreeMap::new();
        for rule in prepared {
            claims
                .entry((rule.host.clone(), rule.rule.path.clone()))
                .or_default()
                .push(rule);
        }

        let mut conflicts = Vec::new();
        let mut hosts: BTreeMap<String, Vec<PreparedRule<'_>>> = BTreeMap::new();
        for ((host, path), mut claimants) in claims {
            let winner = claimants.remove(0);
            for loser in claimants {
                debug!(host = %host, path = %path, winner = %winner.key, loser = %loser.key, "route conflict");
                conflicts.push(RouteConflict {
                    host: host.clone(),
                    path: path.clone(),
                    winner: winner.key.clone(),
                    loser: loser.key,
                });
            }
            hosts.entry(host).or_default().push(winner);
        }

        let mut referenced: BTreeSet<ObjectKey> = BTreeSet::new();
        let mut virtual_hosts = Vec::with_capacity(hosts.len());
        for (host, mut rules) in hosts {
            // longest prefix first so the most specific rule matches
            rules.sort_by(|a, b| {
                b.rule
                    .path
                    .len()
                    .cmp(&a.rule.path.len())
                    .then_with(|| a.rule.path.cmp(&b.rule.path))
            });

            let routes = rules
                .iter()
                .map(|prepared| {
                    referenced.extend(prepared.weights.keys().cloned());
                    let merged: Vec<(String, u64)> = prepared
                        .weights
                        .iter()
                        .map(|(key, weight)| (key.to_string(), *weight))
                        .collect();
                    let splits = normalize_weights(&merged);
                    resources::prefix_route(
                        &prepared.key.to_string(),
                        &prepared.rule.path,
                        &splits,
                        prepared.rule.timeout(),
                    )
                })
                .collect();
            virtual_hosts.push(resources::virtual_host(
                &host,
                self.config.gateway_port,
                routes,
            ));
        }

        let mut output: Vec<BoxResource> = Vec::with_capacity(referenced.len() * 2 + 2);
        for key in &referenced {
            let name = key.to_string();
            let mut endpoints: Vec<(&str, u32)> = backends
                .get(key)
                .map(|backend| {
                    backend
                        .ready_endpoints()
                        .map(|e| (e.address.as_str(), e.port))
                        .collect()
                })
                .unwrap_or_default();
            if !backends.contains_key(key) {
                trace!(backend = %key, "referenced backend is unknown");
            }
            endpoints.sort_unstable();
            endpoints.dedup();

            output.push(resources::eds_cluster(&name, self.config.connect_timeout).boxed());
            output.push(resources::load_assignment(&name, endpoints).boxed());
        }

        output.push(
            resources::route_configuration(&self.config.route_config_name, virtual_hosts).boxed(),
        );
        output.push(
            resources::http_listener(
                &self.config.listener_name,
                &self.config.listener_address,
                self.config.gateway_port,
                &self.config.route_config_name,
                &self.config.stat_prefix,
            )
            .boxed(),
        );

        let snapshot = Snapshot::builder().resources(output)?.build();
        debug!(
            rules = rules.len(),
            clusters = referenced.len(),
            conflicts = conflicts.len(),
            "translated routing state"
        );

        Ok(Translation {
            snapshot,
            conflicts,
        })
    }
}

/// Validate backends and index them by identity.
fn index_backends(backends: &[Backend]) -> Result<HashMap<ObjectKey, &Backend>> {
    let mut index = HashMap::with_capacity(backends.len());
    for backend in backends {
        let key = backend.key();
        validate_backend(&key, backend)?;
        if index.insert(key.clone(), backend).is_some() {
            return Err(KourierError::translation(
                key.to_string(),
                "backend listed more than once",
            ));
        }
    }
    Ok(index)
}

fn validate_backend(key: &ObjectKey, backend: &Backend) -> Result<()> {
    for endpoint in &backend.endpoints {
        if endpoint.address.parse::<IpAddr>().is_err() {
            return Err(KourierError::translation(
                key.to_string(),
                format!("endpoint address {:?} is not an IP address", endpoint.address),
            ));
        }
        if endpoint.port == 0 || endpoint.port > u32::from(u16::MAX) {
            return Err(KourierError::translation(
                key.to_string(),
                format!("endpoint {} has invalid port {}", endpoint.address, endpoint.port),
            ));
        }
    }
    Ok(())
}

/// Lower-case `host` and drop a `:gateway_port` suffix.
///
/// Every virtual host already answers on `host:gateway_port`, so a rule
/// naming that form claims the bare host. Any other port is rejected.
fn normalize_host(key: &ObjectKey, host: &str, gateway_port: u16) -> Result<String> {
    let host = host.trim().to_ascii_lowercase();
    let suffix = format!(":{gateway_port}");
    let host = host.strip_suffix(suffix.as_str()).unwrap_or(&host).to_string();
    if host.is_empty() {
        return Err(KourierError::translation(key.to_string(), "host must not be empty"));
    }
    if host.contains(':') {
        return Err(KourierError::translation(
            key.to_string(),
            format!("host {host:?} names a port other than the gateway port {gateway_port}"),
        ));
    }
    Ok(host)
}

/// Validate rules and return them in identity order.
fn prepare_rules(rules: &[RouteRule], gateway_port: u16) -> Result<Vec<PreparedRule<'_>>> {
    let mut prepared: Vec<PreparedRule<'_>> = Vec::with_capacity(rules.len());
    for rule in rules {
        let key = rule.key();
        let host = normalize_host(&key, &rule.host, gateway_port)?;
        if !rule.path.starts_with('/') {
            return Err(KourierError::translation(
                key.to_string(),
                format!("path {:?} must start with '/'", rule.path),
            ));
        }
        if rule.backends.is_empty() {
            return Err(KourierError::translation(
                key.to_string(),
                "rule has no backends",
            ));
        }

        let mut weights: BTreeMap<ObjectKey, u64> = BTreeMap::new();
        for backend in &rule.backends {
            *weights.entry(rule.backend_key(backend)).or_default() += u64::from(backend.weight);
        }

        prepared.push(PreparedRule {
            key,
            host,
            rule,
            weights,
        });
    }

    prepared.sort_by(|a, b| a.key.cmp(&b.key));
    if let Some(pair) = prepared.windows(2).find(|pair| pair[0].key == pair[1].key) {
        return Err(KourierError::translation(
            pair[0].key.to_string(),
            "rule listed more than once",
        ));
    }
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BackendRef, EndpointAddress};
    use kourier_core::ResourceType;
    use kourier_types::envoy::config::endpoint::v3::ClusterLoadAssignment;
    use kourier_types::envoy::config::route::v3::{
        route, route_action, route_match, RouteConfiguration,
    };
    use prost::Message;

    fn rule(ns: &str, name: &str, host: &str, path: &str, backend: &str) -> RouteRule {
        RouteRule::new(ns, name, host, path).with_backend(BackendRef::new(backend, 100))
    }

    fn backend(ns: &str, name: &str, ips: &[&str]) -> Backend {
        ips.iter().fold(Backend::new(ns, name), |b, ip| {
            b.with_endpoint(EndpointAddress::ready(*ip, 8080))
        })
    }

    fn route_table(snapshot: &Snapshot) -> RouteConfiguration {
        let any = snapshot
            .resources(ResourceType::Route)
            .get("kourier_routes")
            .unwrap();
        RouteConfiguration::decode(any.value.as_slice()).unwrap()
    }

    fn load_assignment(snapshot: &Snapshot, name: &str) -> ClusterLoadAssignment {
        let any = snapshot.resources(ResourceType::Endpoint).get(name).unwrap();
        ClusterLoadAssignment::decode(any.value.as_slice()).unwrap()
    }

    fn translate(rules: &[RouteRule], backends: &[Backend]) -> Translation {
        Translator::default().translate(rules, backends).unwrap()
    }

    #[test]
    fn single_rule_produces_one_of_each() {
        let t = translate(
            &[rule("default", "hello", "foo.example.com", "/", "b")],
            &[backend("default", "b", &["10.0.0.1", "10.0.0.2"])],
        );
        let s = &t.snapshot;
        assert_eq!(s.resources(ResourceType::Listener).len(), 1);
        assert_eq!(s.resources(ResourceType::Route).len(), 1);
        assert_eq!(s.resources(ResourceType::Cluster).len(), 1);
        assert_eq!(s.resources(ResourceType::Endpoint).len(), 1);

        let table = route_table(s);
        assert_eq!(table.virtual_hosts.len(), 1);
        assert_eq!(table.virtual_hosts[0].domains[0], "foo.example.com");
        assert_eq!(table.virtual_hosts[0].routes.len(), 1);

        let cla = load_assignment(s, "default/b");
        assert_eq!(cla.endpoints[0].lb_endpoints.len(), 2);
    }

    #[test]
    fn empty_state_still_has_listener_and_route_table() {
        let t = translate(&[], &[]);
        assert_eq!(t.snapshot.resources(ResourceType::Listener).len(), 1);
        assert_eq!(t.snapshot.resources(ResourceType::Route).len(), 1);
        assert!(t.snapshot.resources(ResourceType::Cluster).is_empty());
        assert!(route_table(&t.snapshot).virtual_hosts.is_empty());
    }

    #[test]
    fn not_ready_endpoints_are_excluded() {
        let b = Backend::new("default", "b")
            .with_endpoint(EndpointAddress::not_ready("10.0.0.1", 8080))
            .with_endpoint(EndpointAddress::not_ready("10.0.0.2", 8080));
        let t = translate(&[rule("default", "r", "a.example.com", "/", "b")], &[b]);

        assert_eq!(t.snapshot.resources(ResourceType::Cluster).len(), 1);
        assert!(load_assignment(&t.snapshot, "default/b").endpoints.is_empty());
    }

    #[test]
    fn unknown_backend_yields_empty_cluster() {
        let t = translate(&[rule("default", "r", "a.example.com", "/", "missing")], &[]);
        assert!(t
            .snapshot
            .resources(ResourceType::Cluster)
            .get("default/missing")
            .is_some());
        assert!(load_assignment(&t.snapshot, "default/missing").endpoints.is_empty());
    }

    #[test]
    fn unreferenced_backends_are_not_emitted() {
        let t = translate(
            &[rule("default", "r", "a.example.com", "/", "used")],
            &[
                backend("default", "used", &["10.0.0.1"]),
                backend("default", "idle", &["10.0.0.2"]),
            ],
        );
        let clusters: Vec<&String> = t.snapshot.resources(ResourceType::Cluster).names().collect();
        assert_eq!(clusters, vec!["default/used"]);
    }

    #[test]
    fn input_order_does_not_change_output() {
        let rules = vec![
            rule("default", "a", "a.example.com", "/", "x"),
            rule("default", "b", "b.example.com", "/api", "y"),
            rule("other", "c", "a.example.com", "/static", "x"),
        ];
        let backends = vec![
            backend("default", "x", &["10.0.0.2", "10.0.0.1"]),
            backend("default", "y", &["10.0.1.1"]),
        ];
        let forward = translate(&rules, &backends);

        let mut rules_rev = rules.clone();
        rules_rev.reverse();
        let mut backends_rev = backends.clone();
        backends_rev.reverse();
        backends_rev[1].endpoints.reverse();
        let backward = translate(&rules_rev, &backends_rev);

        assert_eq!(forward.snapshot, backward.snapshot);
    }

    #[test]
    fn conflicting_rules_keep_smallest_identity() {
        let t = translate(
            &[
                rule("team-b", "web", "foo.example.com", "/", "b"),
                rule("team-a", "web", "foo.example.com", "/", "a"),
            ],
            &[],
        );

        assert_eq!(t.conflicts.len(), 1);
        assert_eq!(t.conflicts[0].winner, ObjectKey::new("team-a", "web"));
        assert_eq!(t.conflicts[0].loser, ObjectKey::new("team-b", "web"));

        let table = route_table(&t.snapshot);
        assert_eq!(table.virtual_hosts[0].routes.len(), 1);
        assert_eq!(table.virtual_hosts[0].routes[0].name, "team-a/web");
        // the losing rule contributes no cluster
        let clusters: Vec<&String> = t.snapshot.resources(ResourceType::Cluster).names().collect();
        assert_eq!(clusters, vec!["team-a/a"]);
    }

    #[test]
    fn hosts_are_case_insensitive() {
        let t = translate(
            &[
                rule("default", "a", "Foo.Example.com", "/", "b"),
                rule("default", "b", "foo.example.com", "/", "b"),
            ],
            &[],
        );
        assert_eq!(t.conflicts.len(), 1);
        assert_eq!(route_table(&t.snapshot).virtual_hosts[0].name, "foo.example.com");
    }

    #[test]
    fn host_with_gateway_port_claims_the_bare_host() {
        let t = translate(
            &[
                rule("default", "a", "foo.example.com", "/", "b"),
                rule("default", "b", "foo.example.com:19001", "/", "b"),
                rule("default", "c", "bar.example.com:19001", "/", "b"),
            ],
            &[],
        );
        assert_eq!(t.conflicts.len(), 1);
        assert_eq!(t.conflicts[0].loser, ObjectKey::new("default", "b"));

        let table = route_table(&t.snapshot);
        let domains: Vec<&String> = table
            .virtual_hosts
            .iter()
            .flat_map(|vh| vh.domains.iter())
            .collect();
        let unique: BTreeSet<&String> = domains.iter().copied().collect();
        assert_eq!(unique.len(), domains.len(), "{domains:?}");
        assert_eq!(table.virtual_hosts.len(), 2);
        assert_eq!(table.virtual_hosts[0].name, "bar.example.com");
    }

    #[test]
    fn host_with_foreign_port_is_rejected() {
        let err = Translator::default()
            .translate(&[rule("default", "r", "foo.example.com:8080", "/", "b")], &[])
            .unwrap_err();
        assert!(matches!(err, KourierError::Translation { .. }), "{err}");
        assert!(err.to_string().contains("default/r"));
    }

    #[test]
    fn routes_are_ordered_longest_prefix_first() {
        let t = translate(
            &[
                rule("default", "root", "a.example.com", "/", "b"),
                rule("default", "api", "a.example.com", "/api", "b"),
                rule("default", "v1", "a.example.com", "/api/v1", "b"),
            ],
            &[],
        );
        let table = route_table(&t.snapshot);
        let prefixes: Vec<String> = table.virtual_hosts[0]
            .routes
            .iter()
            .map(|r| match &r.r#match {
                Some(m) => match &m.path_specifier {
                    Some(route_match::PathSpecifier::Prefix(p)) => p.clone(),
                    _ => String::new(),
                },
                None => String::new(),
            })
            .collect();
        assert_eq!(prefixes, vec!["/api/v1", "/api", "/"]);
    }

    #[test]
    fn weights_are_renormalized() {
        let r = RouteRule::new("default", "split", "a.example.com", "/")
            .with_backend(BackendRef::new("v1", 3))
            .with_backend(BackendRef::new("v2", 1))
            .with_backend(BackendRef::new("v1", 0));
        let t = translate(&[r], &[]);

        let table = route_table(&t.snapshot);
        let Some(route::Action::Route(action)) = &table.virtual_hosts[0].routes[0].action else {
            panic!("expected route action");
        };
        let Some(route_action::ClusterSpecifier::WeightedClusters(weighted)) =
            &action.cluster_specifier
        else {
            panic!("expected weighted clusters");
        };
        let splits: Vec<(&str, u32)> = weighted
            .clusters
            .iter()
            .map(|c| (c.name.as_str(), c.weight.unwrap_or_default()))
            .collect();
        assert_eq!(splits, vec![("default/v1", 75), ("default/v2", 25)]);
    }

    #[test]
    fn timeout_is_applied() {
        let r = rule("default", "slow", "a.example.com", "/", "b")
            .with_timeout(Duration::from_secs(30));
        let t = translate(&[r], &[]);
        let table = route_table(&t.snapshot);
        let Some(route::Action::Route(action)) = &table.virtual_hosts[0].routes[0].action else {
            panic!("expected route action");
        };
        assert_eq!(action.timeout.as_ref().map(|d| d.seconds), Some(30));
    }

    #[test]
    fn malformed_input_is_rejected() {
        let translator = Translator::default();
        let cases: Vec<(Vec<RouteRule>, Vec<Backend>)> = vec![
            (vec![rule("default", "r", "", "/", "b")], vec![]),
            (vec![rule("default", "r", "a.example.com", "api", "b")], vec![]),
            (vec![RouteRule::new("default", "r", "a.example.com", "/")], vec![]),
            (vec![], vec![backend("default", "b", &["not-an-ip"])]),
            (
                vec![],
                vec![Backend::new("default", "b").with_endpoint(EndpointAddress::ready("10.0.0.1", 0))],
            ),
            (
                vec![
                    rule("default", "r", "a.example.com", "/", "b"),
                    rule("default", "r", "b.example.com", "/", "b"),
                ],
                vec![],
            ),
        ];

        for (rules, backends) in cases {
            let err = translator.translate(&rules, &backends).unwrap_err();
            assert!(matches!(err, KourierError::Translation { .. }), "{err}");
        }
    }

    #[test]
    fn error_names_offending_object() {
        let err = Translator::default()
            .translate(&[rule("shop", "cart", "", "/", "b")], &[])
            .unwrap_err();
        assert!(err.to_string().contains("shop/cart"));
    }

    #[test]
    fn ipv6_endpoints_are_accepted() {
        let t = translate(
            &[rule("default", "r", "a.example.com", "/", "b")],
            &[backend("default", "b", &["fd00::1"])],
        );
        assert_eq!(load_assignment(&t.snapshot, "default/b").endpoints.len(), 1);
    }

    #[test]
    fn listener_uses_configured_port() {
        let translator = Translator::new(TranslatorConfig {
            gateway_port: 8081,
            ..Default::default()
        });
        let t = translator.translate(&[], &[]).unwrap();
        assert!(t
            .snapshot
            .resources(ResourceType::Listener)
            .get("kourier_http")
            .is_some());
        assert_eq!(translator.config().gateway_port, 8081);
    }
}
