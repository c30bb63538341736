//! HTTP-based mock Kubernetes server using wiremock.
//!
//! Serves discovery, `/version` and read-only GET/LIST for the resources it is
//! seeded with, so real kubeconfig-based clients can talk to it.

use std::{
	collections::BTreeMap,
	sync::{Arc, RwLock},
};

use bon::Builder;
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use serde_json::{json, Value};
use tracing::{debug, trace};
use wiremock::{
	matchers::{header_regex, method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::discovery::{DiscoveryMode, MockDiscovery};

/// Timestamp given to seeded resources that do not carry one.
pub const SEEDED_CREATION_TIMESTAMP: &str = "2020-06-30T18:48:12Z";

/// Stored objects keyed by (collection path, name). Ordered so lists come
/// back sorted by name, like etcd-backed listings.
pub type SharedResources = Arc<RwLock<BTreeMap<(String, String), Value>>>;

const AGGREGATED_DISCOVERY_CONTENT_TYPE: &str =
	"application/json;g=apidiscovery.k8s.io;v=v2;as=APIGroupDiscoveryList";

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	#[builder(default)]
	discovery_mode: DiscoveryMode,
	/// Resources to serve as raw manifests. The server derives API paths from
	/// apiVersion/kind using the discovery data.
	#[builder(default)]
	resources: Vec<Value>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	resources: SharedResources,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;
		let discovery = MockDiscovery::default();

		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut resources = BTreeMap::new();
		let default_namespace = json!({
			"apiVersion": "v1",
			"kind": "Namespace",
			"metadata": {"name": "default"}
		});
		for manifest in std::iter::once(default_namespace).chain(self.resources) {
			let Some(key) = storage_key(&manifest, &discovery) else {
				debug!(manifest = %manifest, "Skipping resource with unknown type");
				continue;
			};
			trace!(collection = %key.0, name = %key.1, "Registered resource");
			resources.insert(key, with_server_fields(manifest));
		}

		let resources = Arc::new(RwLock::new(resources));

		mount_version(&server).await;
		mount_discovery(&server, &discovery, self.discovery_mode).await;
		mount_resources(&server, &resources).await;

		RunningHttpMockK8sServer { server, resources }
	}
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Number of objects currently stored, including the `default` namespace.
	pub fn resource_count(&self) -> usize {
		self.resources.read().map(|r| r.len()).unwrap_or_default()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context", "default")
	}

	/// Create a Kubeconfig whose single context has the given name and namespace.
	pub fn kubeconfig_with_context(&self, context_name: &str, namespace: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some(namespace.to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}
}

/// Where a manifest lives: its collection path and name.
fn storage_key(manifest: &Value, discovery: &MockDiscovery) -> Option<(String, String)> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let name = manifest.pointer("/metadata/name")?.as_str()?;
	let resource = discovery.find(api_version, kind)?;

	let root = api_root(api_version);
	let collection = if resource.namespaced {
		let namespace = manifest
			.pointer("/metadata/namespace")
			.and_then(Value::as_str)
			.unwrap_or("default");
		format!("{root}/namespaces/{namespace}/{}", resource.name)
	} else {
		format!("{root}/{}", resource.name)
	};

	Some((collection, name.to_string()))
}

fn api_root(api_version: &str) -> String {
	if api_version.contains('/') {
		format!("/apis/{api_version}")
	} else {
		format!("/api/{api_version}")
	}
}

/// Fill in what the API server would set on creation.
fn with_server_fields(mut manifest: Value) -> Value {
	if let Some(metadata) = manifest.get_mut("metadata").and_then(Value::as_object_mut) {
		metadata
			.entry("creationTimestamp")
			.or_insert_with(|| json!(SEEDED_CREATION_TIMESTAMP));
		metadata
			.entry("resourceVersion")
			.or_insert_with(|| json!("1"));
	}
	manifest
}

async fn mount_version(server: &MockServer) {
	let info = Info {
		major: "1".to_string(),
		minor: "31".to_string(),
		git_version: "v1.31.0".to_string(),
		git_commit: "fake".to_string(),
		git_tree_state: "clean".to_string(),
		build_date: "2024-08-13T00:00:00Z".to_string(),
		go_version: "go1.22.5".to_string(),
		compiler: "gc".to_string(),
		platform: "linux/amd64".to_string(),
	};

	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(info))
		.mount(server)
		.await;
}

async fn mount_discovery(server: &MockServer, discovery: &MockDiscovery, mode: DiscoveryMode) {
	match mode {
		DiscoveryMode::Aggregated => {
			let core = json!({
				"kind": "APIGroupDiscoveryList",
				"apiVersion": "apidiscovery.k8s.io/v2",
				"items": [{
					"metadata": {"name": ""},
					"versions": [{
						"version": "v1",
						"resources": discovery
							.core_resources
							.iter()
							.map(|r| r.aggregated_entry("", "v1"))
							.collect::<Vec<_>>(),
						"freshness": "Current"
					}]
				}]
			});

			let groups: Vec<Value> = discovery
				.group_resources
				.iter()
				.map(|(gv, resources)| {
					let (group, version) = gv.split_once('/').unwrap_or(("", gv));
					json!({
						"metadata": {"name": group},
						"versions": [{
							"version": version,
							"resources": resources
								.iter()
								.map(|r| r.aggregated_entry(group, version))
								.collect::<Vec<_>>(),
							"freshness": "Current"
						}]
					})
				})
				.collect();
			let apis = json!({
				"kind": "APIGroupDiscoveryList",
				"apiVersion": "apidiscovery.k8s.io/v2",
				"items": groups
			});

			// set_body_json would overwrite the aggregated Content-Type.
			for (endpoint, body) in [("/api", core), ("/apis", apis)] {
				Mock::given(method("GET"))
					.and(path(endpoint))
					.and(header_regex("accept", "apidiscovery"))
					.respond_with(ResponseTemplate::new(200).set_body_raw(
						body.to_string().into_bytes(),
						AGGREGATED_DISCOVERY_CONTENT_TYPE,
					))
					.mount(server)
					.await;
			}
		}
		DiscoveryMode::Legacy => {
			for endpoint in ["/api", "/apis"] {
				Mock::given(method("GET"))
					.and(path(endpoint))
					.and(header_regex("accept", "apidiscovery"))
					.respond_with(ResponseTemplate::new(406))
					.mount(server)
					.await;
			}
		}
	}

	Mock::given(method("GET"))
		.and(path("/api"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"kind": "APIVersions",
			"versions": ["v1"],
			"serverAddressByClientCIDRs": []
		})))
		.mount(server)
		.await;

	let groups: Vec<Value> = discovery
		.group_resources
		.keys()
		.map(|gv| {
			let (group, version) = gv.split_once('/').unwrap_or(("", gv));
			json!({
				"name": group,
				"versions": [{"groupVersion": gv, "version": version}],
				"preferredVersion": {"groupVersion": gv, "version": version}
			})
		})
		.collect();

	Mock::given(method("GET"))
		.and(path("/apis"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"kind": "APIGroupList",
			"apiVersion": "v1",
			"groups": groups
		})))
		.mount(server)
		.await;

	let resource_lists = std::iter::once(("v1", &discovery.core_resources)).chain(
		discovery
			.group_resources
			.iter()
			.map(|(gv, resources)| (gv.as_str(), resources)),
	);
	for (gv, resources) in resource_lists {
		Mock::given(method("GET"))
			.and(path(api_root(gv)))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"kind": "APIResourceList",
				"apiVersion": "v1",
				"groupVersion": gv,
				"resources": resources.iter().map(|r| r.legacy_entry()).collect::<Vec<_>>()
			})))
			.mount(server)
			.await;
	}
}

/// What a GET on a resource path asks for.
#[derive(Debug, PartialEq, Eq)]
enum ResourceRequest {
	/// A single object in a collection.
	Get { collection: String, name: String },
	/// Every object in one namespace's collection.
	List { collection: String },
	/// Every object of a type, across namespaces.
	ListAll { root: String, plural: String },
}

/// Classify `/api/v1/...` and `/apis/{group}/{version}/...` paths.
fn parse_resource_path(path: &str) -> Option<ResourceRequest> {
	let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
	let (root, rest) = match segments.as_slice() {
		["api", version, rest @ ..] => (format!("/api/{version}"), rest),
		["apis", group, version, rest @ ..] => (format!("/apis/{group}/{version}"), rest),
		_ => return None,
	};

	match rest {
		[plural] => Some(ResourceRequest::ListAll {
			root,
			plural: plural.to_string(),
		}),
		[plural, name] => Some(ResourceRequest::Get {
			collection: format!("{root}/{plural}"),
			name: name.to_string(),
		}),
		["namespaces", namespace, plural] => Some(ResourceRequest::List {
			collection: format!("{root}/namespaces/{namespace}/{plural}"),
		}),
		["namespaces", namespace, plural, name] => Some(ResourceRequest::Get {
			collection: format!("{root}/namespaces/{namespace}/{plural}"),
			name: name.to_string(),
		}),
		_ => None,
	}
}

fn in_list_all(collection: &str, root: &str, plural: &str) -> bool {
	let Some(rest) = collection.strip_prefix(root) else {
		return false;
	};
	let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();
	match segments.as_slice() {
		[p] => *p == plural,
		["namespaces", _, p] => *p == plural,
		_ => false,
	}
}

/// List items come back without apiVersion/kind, as from a real API server.
fn list_response(items: Vec<Value>) -> ResponseTemplate {
	let items: Vec<Value> = items
		.into_iter()
		.map(|mut item| {
			if let Some(obj) = item.as_object_mut() {
				obj.remove("apiVersion");
				obj.remove("kind");
			}
			item
		})
		.collect();

	ResponseTemplate::new(200).set_body_json(json!({
		"kind": "List",
		"apiVersion": "v1",
		"metadata": {"resourceVersion": "1"},
		"items": items
	}))
}

fn not_found(collection: &str, name: &str) -> ResponseTemplate {
	let plural = collection.rsplit('/').next().unwrap_or_default();
	ResponseTemplate::new(404).set_body_json(json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": format!("{plural} \"{name}\" not found"),
		"reason": "NotFound",
		"details": {"name": name, "kind": plural},
		"code": 404
	}))
}

async fn mount_resources(server: &MockServer, resources: &SharedResources) {
	let resources = Arc::clone(resources);

	Mock::given(method("GET"))
		.and(path_regex(r"^/apis?/.*"))
		.respond_with(move |req: &Request| {
			let Some(request) = parse_resource_path(req.url.path()) else {
				return ResponseTemplate::new(404);
			};
			let Ok(resources) = resources.read() else {
				return ResponseTemplate::new(500);
			};
			trace!(request = ?request, "serving resource request");

			match request {
				ResourceRequest::Get { collection, name } => {
					match resources.get(&(collection.clone(), name.clone())) {
						Some(object) => ResponseTemplate::new(200).set_body_json(object),
						None => not_found(&collection, &name),
					}
				}
				ResourceRequest::List { collection } => list_response(
					resources
						.iter()
						.filter(|((c, _), _)| *c == collection)
						.map(|(_, v)| v.clone())
						.collect(),
				),
				ResourceRequest::ListAll { root, plural } => list_response(
					resources
						.iter()
						.filter(|((c, _), _)| in_list_all(c, &root, &plural))
						.map(|(_, v)| v.clone())
						.collect(),
				),
			}
		})
		.mount(server)
		.await;
}
