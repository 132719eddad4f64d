//! Snapshot: immutable collection of encoded resources.
//!
//! A snapshot is a consistent view of every resource one gateway node
//! needs:
//!
//! - **Immutable**: once published a snapshot is never modified
//! - **Versioned**: each resource type carries the version at which its
//!   content last changed
//! - **Complete**: all four resource types are always present, possibly
//!   empty
//! - **Ordered**: resources are keyed by name in a `BTreeMap`, so equal
//!   logical content yields byte-identical snapshots
//!
//! Snapshots are built unversioned by [`SnapshotBuilder`]; the cache
//! assigns versions when the snapshot is published.

use std::collections::BTreeMap;

use kourier_core::{KourierError, Resource, ResourceType, ResourceVersion, Result};

/// Resources of one type within a snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotResources {
    /// Version at which this type last changed.
    version: ResourceVersion,
    /// Encoded resources keyed by name.
    resources: BTreeMap<String, prost_types::Any>,
}

impl SnapshotResources {
    /// Get the version for this resource type.
    #[inline]
    pub fn version(&self) -> ResourceVersion {
        self.version
    }

    /// Get the number of resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Check if there are no resources.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Get a resource by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&prost_types::Any> {
        self.resources.get(name)
    }

    /// Iterate over all resources in name order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &prost_types::Any)> {
        self.resources.iter()
    }

    /// Get all resource names in order.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.resources.keys()
    }

    /// All resources in name order.
    pub fn to_vec(&self) -> Vec<prost_types::Any> {
        self.resources.values().cloned().collect()
    }

    /// The named resources in name order; unknown names are skipped.
    ///
    /// An empty `names` selects every resource.
    pub fn select(&self, names: &[String]) -> Vec<prost_types::Any> {
        if names.is_empty() {
            return self.to_vec();
        }
        let mut wanted: Vec<&String> = names.iter().collect();
        wanted.sort();
        wanted.dedup();
        wanted
            .into_iter()
            .filter_map(|name| self.resources.get(name).cloned())
            .collect()
    }

    /// Whether both hold the same encoded resources, ignoring versions.
    #[inline]
    pub fn same_content(&self, other: &SnapshotResources) -> bool {
        self.resources == other.resources
    }
}

/// An immutable snapshot of resources for a gateway node.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Version of the publication that produced this snapshot.
    version: ResourceVersion,
    /// Resources grouped by type; every type is present.
    resources: BTreeMap<ResourceType, SnapshotResources>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            version: ResourceVersion::empty(),
            resources: ResourceType::ALL
                .into_iter()
                .map(|t| (t, SnapshotResources::default()))
                .collect(),
        }
    }
}

impl Snapshot {
    /// Create a new snapshot builder.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Version of the publication that produced this snapshot.
    ///
    /// Empty for snapshots that have not been published.
    #[inline]
    pub fn version(&self) -> ResourceVersion {
        self.version
    }

    /// Get resources for a specific type.
    #[inline]
    pub fn resources(&self, resource_type: ResourceType) -> &SnapshotResources {
        // Every type is inserted at construction.
        static EMPTY: SnapshotResources = SnapshotResources {
            version: ResourceVersion::empty(),
            resources: BTreeMap::new(),
        };
        self.resources.get(&resource_type).unwrap_or(&EMPTY)
    }

    /// Get the version for a specific resource type.
    #[inline]
    pub fn get_version(&self, resource_type: ResourceType) -> ResourceVersion {
        self.resources(resource_type).version
    }

    /// Get the total number of resources across all types.
    pub fn total_resources(&self) -> usize {
        self.resources.values().map(SnapshotResources::len).sum()
    }

    /// Check if this snapshot holds no resources at all.
    pub fn is_empty(&self) -> bool {
        self.resources.values().all(SnapshotResources::is_empty)
    }

    /// Resource types whose content differs from `other`, in push order.
    pub fn changed_types(&self, other: &Snapshot) -> Vec<ResourceType> {
        ResourceType::ALL
            .into_iter()
            .filter(|t| !self.resources(*t).same_content(other.resources(*t)))
            .collect()
    }

    /// Whether both snapshots carry identical resources, ignoring versions.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.changed_types(other).is_empty()
    }

    /// Assign versions for publication at `version`.
    ///
    /// Types listed in `changed` take `version`; the others keep the version
    /// they have in `previous`.
    pub(crate) fn stamp(
        mut self,
        previous: Option<&Snapshot>,
        version: ResourceVersion,
        changed: &[ResourceType],
    ) -> Self {
        self.version = version;
        for (resource_type, resources) in &mut self.resources {
            resources.version = match previous {
                Some(prev) if !changed.contains(resource_type) => prev.get_version(*resource_type),
                _ => version,
            };
        }
        self
    }
}

/// Builder for creating unversioned snapshots.
///
/// # Example
///
/// ```rust
/// use kourier_cache::Snapshot;
/// use kourier_core::{ProtoResource, ResourceType};
///
/// let timeout = prost_types::Duration { seconds: 1, nanos: 0 };
/// let snapshot = Snapshot::builder()
///     .resource(&ProtoResource::new(ResourceType::Cluster, "default/echo", timeout))
///     .unwrap()
///     .build();
///
/// assert_eq!(snapshot.resources(ResourceType::Cluster).len(), 1);
/// assert!(snapshot.version().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    snapshot: Snapshot,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode and add a single resource.
    ///
    /// # Errors
    ///
    /// Fails if the resource cannot be encoded, if it encodes to a different
    /// type URL than its resource type, or if a resource of the same type
    /// and name was already added.
    pub fn resource<R: Resource + ?Sized>(mut self, resource: &R) -> Result<Self> {
        let resource_type = resource.resource_type();
        let any = resource.encode()?;
        if any.type_url != resource_type.type_url() {
            return Err(KourierError::InvalidResource {
                type_url: resource_type.type_url().to_string(),
                name: resource.name().to_string(),
                reason: format!("encoded as {}", any.type_url),
            });
        }

        let entry = self.snapshot.resources.entry(resource_type).or_default();
        if entry.resources.contains_key(resource.name()) {
            return Err(KourierError::InvalidResource {
                type_url: resource_type.type_url().to_string(),
                name: resource.name().to_string(),
                reason: "duplicate resource name".to_string(),
            });
        }
        entry.resources.insert(resource.name().to_string(), any);
        Ok(self)
    }

    /// Encode and add several resources.
    ///
    /// # Errors
    ///
    /// See [`SnapshotBuilder::resource`].
    pub fn resources<I, R>(self, resources: I) -> Result<Self>
    where
        I: IntoIterator<Item = R>,
        R: AsRef<dyn Resource>,
    {
        resources
            .into_iter()
            .try_fold(self, |builder, r| builder.resource(r.as_ref()))
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        self.snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kourier_core::{BoxResource, ProtoResource};

    fn duration(name: &str, resource_type: ResourceType, seconds: i64) -> BoxResource {
        ProtoResource::new(
            resource_type,
            name,
            prost_types::Duration { seconds, nanos: 0 },
        )
        .boxed()
    }

    #[test]
    fn empty_snapshot_has_every_type() {
        let snapshot = Snapshot::builder().build();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.total_resources(), 0);
        for t in ResourceType::ALL {
            assert!(snapshot.resources(t).is_empty());
            assert!(snapshot.get_version(t).is_empty());
        }
    }

    #[test]
    fn resources_are_name_ordered() {
        let snapshot = Snapshot::builder()
            .resources(vec![
                duration("b", ResourceType::Cluster, 1),
                duration("c", ResourceType::Cluster, 1),
                duration("a", ResourceType::Cluster, 1),
            ])
            .unwrap()
            .build();

        let names: Vec<_> = snapshot.resources(ResourceType::Cluster).names().cloned().collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let forward = Snapshot::builder()
            .resources(vec![
                duration("a", ResourceType::Route, 1),
                duration("b", ResourceType::Route, 2),
            ])
            .unwrap()
            .build();
        let backward = Snapshot::builder()
            .resources(vec![
                duration("b", ResourceType::Route, 2),
                duration("a", ResourceType::Route, 1),
            ])
            .unwrap()
            .build();
        assert_eq!(forward, backward);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let result = Snapshot::builder().resources(vec![
            duration("dup", ResourceType::Cluster, 1),
            duration("dup", ResourceType::Cluster, 2),
        ]);
        assert!(matches!(
            result,
            Err(KourierError::InvalidResource { .. })
        ));
    }

    #[test]
    fn same_name_across_types_is_allowed() {
        let snapshot = Snapshot::builder()
            .resources(vec![
                duration("svc", ResourceType::Cluster, 1),
                duration("svc", ResourceType::Endpoint, 1),
            ])
            .unwrap()
            .build();
        assert_eq!(snapshot.total_resources(), 2);
    }

    #[test]
    fn changed_types_detects_content_changes() {
        let a = Snapshot::builder()
            .resources(vec![
                duration("c", ResourceType::Cluster, 1),
                duration("e", ResourceType::Endpoint, 1),
            ])
            .unwrap()
            .build();
        let b = Snapshot::builder()
            .resources(vec![
                duration("c", ResourceType::Cluster, 1),
                duration("e", ResourceType::Endpoint, 2),
            ])
            .unwrap()
            .build();

        assert_eq!(b.changed_types(&a), vec![ResourceType::Endpoint]);
        assert!(a.same_content(&a.clone()));
    }

    #[test]
    fn stamp_keeps_versions_of_unchanged_types() {
        let first = Snapshot::builder()
            .resource(duration("c", ResourceType::Cluster, 1).as_ref())
            .unwrap()
            .build()
            .stamp(None, ResourceVersion::new(1), &ResourceType::ALL);
        assert_eq!(first.get_version(ResourceType::Listener), ResourceVersion::new(1));

        let second = Snapshot::builder()
            .resource(duration("c", ResourceType::Cluster, 2).as_ref())
            .unwrap()
            .build();
        let changed = second.changed_types(&first);
        let second = second.stamp(Some(&first), ResourceVersion::new(2), &changed);

        assert_eq!(second.version(), ResourceVersion::new(2));
        assert_eq!(second.get_version(ResourceType::Cluster), ResourceVersion::new(2));
        assert_eq!(second.get_version(ResourceType::Listener), ResourceVersion::new(1));
    }

    #[test]
    fn select_filters_by_name() {
        let snapshot = Snapshot::builder()
            .resources(vec![
                duration("a", ResourceType::Endpoint, 1),
                duration("b", ResourceType::Endpoint, 2),
            ])
            .unwrap()
            .build();
        let endpoints = snapshot.resources(ResourceType::Endpoint);

        assert_eq!(endpoints.select(&[]).len(), 2);
        assert_eq!(endpoints.select(&["b".to_string(), "missing".to_string()]).len(), 1);
        assert_eq!(
            endpoints.select(&["b".to_string(), "a".to_string(), "a".to_string()]),
            endpoints.to_vec()
        );
    }
}
