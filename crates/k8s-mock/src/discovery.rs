//! Mock Kubernetes API discovery types.

use std::collections::BTreeMap;

use serde_json::{json, Value};

/// Discovery mode for the mock server.
#[derive(Clone, Copy, Default, Debug)]
pub enum DiscoveryMode {
	/// Support aggregated discovery (APIGroupDiscoveryList).
	#[default]
	Aggregated,
	/// Return 406 for aggregated discovery, forcing fallback to legacy endpoints.
	Legacy,
}

/// Resource types the mock server advertises.
pub struct MockDiscovery {
	pub core_resources: Vec<MockApiResource>,
	/// Keyed by group version, e.g. `apps/v1`.
	pub group_resources: BTreeMap<String, Vec<MockApiResource>>,
}

impl Default for MockDiscovery {
	fn default() -> Self {
		Self {
			core_resources: vec![
				MockApiResource::namespaced("configmaps", "ConfigMap"),
				MockApiResource::namespaced("pods", "Pod"),
				MockApiResource::namespaced("replicationcontrollers", "ReplicationController"),
				MockApiResource::namespaced("secrets", "Secret"),
				MockApiResource::namespaced("services", "Service"),
				MockApiResource::cluster_scoped("namespaces", "Namespace"),
				MockApiResource::cluster_scoped("nodes", "Node"),
			],
			group_resources: BTreeMap::from([(
				"apps/v1".to_string(),
				vec![
					MockApiResource::namespaced("deployments", "Deployment"),
					MockApiResource::namespaced("statefulsets", "StatefulSet"),
					MockApiResource::namespaced("daemonsets", "DaemonSet"),
				],
			)]),
		}
	}
}

impl MockDiscovery {
	/// Find the resource serving `kind` in `api_version` (`v1`, `apps/v1`).
	pub fn find(&self, api_version: &str, kind: &str) -> Option<&MockApiResource> {
		let resources = if api_version.contains('/') {
			self.group_resources.get(api_version)?
		} else {
			&self.core_resources
		};
		resources.iter().find(|r| r.kind == kind)
	}
}

/// A mock API resource definition.
pub struct MockApiResource {
	pub name: String,
	pub kind: String,
	pub namespaced: bool,
}

impl MockApiResource {
	pub fn namespaced(name: &str, kind: &str) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
			namespaced: true,
		}
	}

	pub fn cluster_scoped(name: &str, kind: &str) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
			namespaced: false,
		}
	}

	fn scope(&self) -> &'static str {
		if self.namespaced {
			"Namespaced"
		} else {
			"Cluster"
		}
	}

	/// Entry of an `APIGroupDiscoveryList` version.
	pub fn aggregated_entry(&self, group: &str, version: &str) -> Value {
		json!({
			"resource": self.name,
			"responseKind": {
				"group": group,
				"version": version,
				"kind": self.kind
			},
			"scope": self.scope(),
			"verbs": ["get", "list"],
		})
	}

	/// Entry of a legacy `APIResourceList`.
	pub fn legacy_entry(&self) -> Value {
		json!({
			"name": self.name,
			"singularName": self.kind.to_lowercase(),
			"namespaced": self.namespaced,
			"kind": self.kind,
			"verbs": ["get", "list"],
		})
	}
}
