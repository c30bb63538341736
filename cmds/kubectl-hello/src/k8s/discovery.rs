//! Resolution of user-typed resource types against API discovery.
//!
//! `po`, `pod`, `pods` and `Pod` all need to land on the same API resource,
//! the way kubectl's REST mapper does it.

use kube::{
	discovery::{ApiCapabilities, ApiResource, Scope},
	Client, Discovery,
};
use thiserror::Error;
use tracing::instrument;

use super::ResourceScope;

/// Errors that can occur during API resource discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
	#[error("API discovery failed")]
	Discovery(#[source] kube::Error),
}

/// Short names kubectl accepts for built-in resources.
const SHORT_NAMES: &[(&str, &str)] = &[
	("cm", "configmaps"),
	("crd", "customresourcedefinitions"),
	("cj", "cronjobs"),
	("deploy", "deployments"),
	("ds", "daemonsets"),
	("ep", "endpoints"),
	("ev", "events"),
	("hpa", "horizontalpodautoscalers"),
	("ing", "ingresses"),
	("no", "nodes"),
	("ns", "namespaces"),
	("po", "pods"),
	("pv", "persistentvolumes"),
	("pvc", "persistentvolumeclaims"),
	("rc", "replicationcontrollers"),
	("rs", "replicasets"),
	("sa", "serviceaccounts"),
	("sts", "statefulsets"),
	("svc", "services"),
];

/// Discovered API resource with its scope.
#[derive(Debug, Clone)]
pub struct DiscoveredResource {
	/// The kube ApiResource for making API calls.
	pub api_resource: ApiResource,
	/// Whether this resource is namespaced or cluster-wide.
	pub scope: ResourceScope,
}

impl DiscoveredResource {
	pub fn new(api_resource: ApiResource, capabilities: &ApiCapabilities) -> Self {
		let scope = match capabilities.scope {
			Scope::Namespaced => ResourceScope::Namespaced,
			Scope::Cluster => ResourceScope::ClusterWide,
		};
		Self {
			api_resource,
			scope,
		}
	}

	fn matches(&self, name: &str) -> bool {
		let ar = &self.api_resource;
		ar.plural == name || ar.kind.to_lowercase() == name
	}
}

/// The preferred version of every resource type the server offers.
#[derive(Debug, Clone, Default)]
pub struct ResourceTypeCatalog {
	resources: Vec<DiscoveredResource>,
}

impl ResourceTypeCatalog {
	/// Query the server's discovery API.
	///
	/// Tries the aggregated discovery API first (2 API calls, K8s 1.26+) and
	/// falls back to per-group discovery on older servers.
	#[instrument(skip(client))]
	pub async fn discover(client: &Client) -> Result<Self, DiscoveryError> {
		let discovery = match Discovery::new(client.clone()).run_aggregated().await {
			Ok(discovery) => {
				tracing::debug!("using aggregated discovery");
				discovery
			}
			Err(e) => {
				tracing::debug!(error = %e, "aggregated discovery not available, using full discovery");
				Discovery::new(client.clone())
					.run()
					.await
					.map_err(DiscoveryError::Discovery)?
			}
		};

		let resources = discovery
			.groups()
			.flat_map(|group| group.recommended_resources())
			.map(|(ar, caps)| DiscoveredResource::new(ar, &caps))
			.collect();
		Ok(Self::from_resources(resources))
	}

	/// Build a catalog from already-discovered resources.
	///
	/// The core group sorts first so `pods` means `v1/pods` even if an
	/// aggregated API also serves a `pods` resource.
	pub fn from_resources(mut resources: Vec<DiscoveredResource>) -> Self {
		resources.sort_by(|a, b| {
			let a = &a.api_resource.group;
			let b = &b.api_resource.group;
			(!a.is_empty(), a).cmp(&(!b.is_empty(), b))
		});
		Self { resources }
	}

	/// Find the resource a user-typed type name refers to.
	///
	/// Accepts plural, singular/kind (case-insensitive), short names and a
	/// `name.group` qualified form.
	pub fn resolve(&self, type_name: &str) -> Option<&DiscoveredResource> {
		let lowered = type_name.to_lowercase();
		let (name, group) = match lowered.split_once('.') {
			Some((name, group)) => (name, Some(group)),
			None => (lowered.as_str(), None),
		};
		let name = SHORT_NAMES
			.iter()
			.find(|(short, _)| *short == name)
			.map_or(name, |(_, plural)| *plural);

		self.resources
			.iter()
			.filter(|r| group.map_or(true, |g| r.api_resource.group == g))
			.find(|r| r.matches(name))
	}

	pub fn len(&self) -> usize {
		self.resources.len()
	}

	pub fn is_empty(&self) -> bool {
		self.resources.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use kube::core::GroupVersionKind;
	use rstest::rstest;

	use super::*;

	fn resource(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> DiscoveredResource {
		DiscoveredResource {
			api_resource: ApiResource::from_gvk_with_plural(
				&GroupVersionKind::gvk(group, version, kind),
				plural,
			),
			scope: if namespaced {
				ResourceScope::Namespaced
			} else {
				ResourceScope::ClusterWide
			},
		}
	}

	fn catalog() -> ResourceTypeCatalog {
		ResourceTypeCatalog::from_resources(vec![
			resource("metrics.k8s.io", "v1beta1", "PodMetrics", "pods", true),
			resource("apps", "v1", "Deployment", "deployments", true),
			resource("", "v1", "Pod", "pods", true),
			resource("", "v1", "ReplicationController", "replicationcontrollers", true),
			resource("", "v1", "Namespace", "namespaces", false),
		])
	}

	#[rstest]
	#[case("pods", "", "Pod")]
	#[case("pod", "", "Pod")]
	#[case("Pod", "", "Pod")]
	#[case("po", "", "Pod")]
	#[case("rc", "", "ReplicationController")]
	#[case("replicationcontroller", "", "ReplicationController")]
	#[case("deploy", "apps", "Deployment")]
	#[case("deployments.apps", "apps", "Deployment")]
	#[case("pods.metrics.k8s.io", "metrics.k8s.io", "PodMetrics")]
	fn test_resolve(#[case] input: &str, #[case] group: &str, #[case] kind: &str) {
		let catalog = catalog();
		let found = catalog.resolve(input).expect("type should resolve");
		assert_eq!(found.api_resource.group, group);
		assert_eq!(found.api_resource.kind, kind);
	}

	#[test]
	fn test_resolve_unknown() {
		assert!(catalog().resolve("widgets").is_none());
		assert!(catalog().resolve("deployments.batch").is_none());
	}

	#[test]
	fn test_scope_is_kept() {
		let catalog = catalog();
		assert_eq!(
			catalog.resolve("ns").unwrap().scope,
			ResourceScope::ClusterWide
		);
		assert_eq!(catalog.len(), 5);
	}
}
