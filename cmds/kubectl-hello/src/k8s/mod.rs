//! Kubernetes API access for type/name lookups.
//!
//! Only identifier-based requests reach this module; manifests given with
//! `-f` or `-k` are resolved without talking to a cluster.

pub mod client;
pub mod discovery;
pub mod lookup;

/// Kubernetes API resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceScope {
	/// Resource is namespaced (e.g., Pod, ReplicationController).
	Namespaced,

	/// Resource is cluster-wide (e.g., Namespace, Node).
	ClusterWide,
}
