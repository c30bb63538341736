//! Integration tests for identifier-based `hello-kubernetes` requests.
//!
//! Each scenario runs against the mock API server in both discovery modes.

use std::io::Cursor;

use assert_matches::assert_matches;
use k8s_mock::{DiscoveryMode, HttpMockK8sServer, RunningHttpMockK8sServer};
use kube::config::Kubeconfig;
use kubectl_hello::{
	commands::hello_kubernetes::{execute, HelloKubernetesOptions},
	config::ClientArgs,
	error::{HelloError, ResolutionErrorKind},
	record::CollectingDiagnostics,
};
use serde_json::{json, Value};

fn controller(name: &str, namespace: &str) -> Value {
	json!({
		"apiVersion": "v1",
		"kind": "ReplicationController",
		"metadata": {"name": name, "namespace": namespace},
		"spec": {"replicas": 1}
	})
}

fn service(name: &str, namespace: &str) -> Value {
	json!({
		"apiVersion": "v1",
		"kind": "Service",
		"metadata": {
			"name": name,
			"namespace": namespace,
			"creationTimestamp": "2021-01-02T03:04:05Z"
		}
	})
}

async fn guestbook(mode: DiscoveryMode) -> RunningHttpMockK8sServer {
	HttpMockK8sServer::builder()
		.discovery_mode(mode)
		.resources(vec![
			controller("redis-slave", "default"),
			controller("redis-master", "default"),
			controller("frontend", "default"),
			controller("frontend", "staging"),
			service("frontend", "default"),
		])
		.build()
		.start()
		.await
}

fn identifiers(kubeconfig: Kubeconfig, args: &[&str]) -> HelloKubernetesOptions {
	HelloKubernetesOptions::builder()
		.args(args.iter().map(|a| (*a).to_string()).collect())
		.kubeconfig(kubeconfig)
		.build()
}

async fn run(options: HelloKubernetesOptions) -> (Result<usize, HelloError>, String) {
	let mut out = Vec::new();
	let result = execute(
		options,
		Box::new(Cursor::new(Vec::new())),
		&CollectingDiagnostics::default(),
		&mut out,
	)
	.await;
	(result, String::from_utf8(out).expect("output is UTF-8"))
}

async fn test_list_by_type_impl(mode: DiscoveryMode) {
	let server = guestbook(mode).await;
	let (result, out) = run(identifiers(server.kubeconfig(), &["rc"])).await;

	assert_eq!(result.unwrap(), 3);
	assert_eq!(
		out,
		"Hello frontend ReplicationController 2020-06-30T18:48:12Z\n\
		 Hello redis-master ReplicationController 2020-06-30T18:48:12Z\n\
		 Hello redis-slave ReplicationController 2020-06-30T18:48:12Z\n"
	);
}

#[tokio::test]
async fn test_list_by_type() {
	test_list_by_type_impl(DiscoveryMode::Aggregated).await;
}

#[tokio::test]
async fn test_list_by_type_legacy_discovery() {
	test_list_by_type_impl(DiscoveryMode::Legacy).await;
}

async fn test_type_slash_name_impl(mode: DiscoveryMode) {
	let server = guestbook(mode).await;
	let (result, out) = run(identifiers(
		server.kubeconfig(),
		&["rc/redis-master", "services/frontend"],
	))
	.await;

	assert_eq!(result.unwrap(), 2);
	assert_eq!(
		out,
		"Hello redis-master ReplicationController 2020-06-30T18:48:12Z\n\
		 Hello frontend Service 2021-01-02T03:04:05Z\n"
	);
}

#[tokio::test]
async fn test_type_slash_name() {
	test_type_slash_name_impl(DiscoveryMode::Aggregated).await;
}

#[tokio::test]
async fn test_type_slash_name_legacy_discovery() {
	test_type_slash_name_impl(DiscoveryMode::Legacy).await;
}

async fn test_missing_name_impl(mode: DiscoveryMode) {
	let server = guestbook(mode).await;
	let (result, out) = run(identifiers(server.kubeconfig(), &["rc/missing"])).await;

	assert_matches!(result, Err(HelloError::EmptyResult { failures: 1 }));
	assert!(out.is_empty());
}

#[tokio::test]
async fn test_missing_name() {
	test_missing_name_impl(DiscoveryMode::Aggregated).await;
}

#[tokio::test]
async fn test_missing_name_legacy_discovery() {
	test_missing_name_impl(DiscoveryMode::Legacy).await;
}

#[tokio::test]
async fn test_partial_miss_is_aggregate() {
	let server = guestbook(DiscoveryMode::Aggregated).await;
	let (result, out) = run(identifiers(
		server.kubeconfig(),
		&["rc", "redis-master", "missing"],
	))
	.await;

	assert_eq!(out, "Hello redis-master ReplicationController 2020-06-30T18:48:12Z\n");
	let Err(HelloError::Aggregate { errors, emitted }) = result else {
		panic!("expected aggregate error, got {result:?}");
	};
	assert_eq!(emitted, 1);
	assert_eq!(errors.len(), 1);
	assert_eq!(errors[0].source_ref, "rc/missing");
	assert_matches!(
		&errors[0].kind,
		ResolutionErrorKind::NotFound { kind, name }
			if kind == "replicationcontrollers" && name == "missing"
	);
	assert_eq!(
		errors[0].to_string(),
		"error from rc/missing: replicationcontrollers \"missing\" not found"
	);
}

#[tokio::test]
async fn test_type_list_keeps_argument_order() {
	let server = guestbook(DiscoveryMode::Aggregated).await;
	let (result, out) = run(identifiers(server.kubeconfig(), &["svc,rc", "frontend"])).await;

	assert_eq!(result.unwrap(), 2);
	assert_eq!(
		out,
		"Hello frontend Service 2021-01-02T03:04:05Z\n\
		 Hello frontend ReplicationController 2020-06-30T18:48:12Z\n"
	);
}

#[tokio::test]
async fn test_unknown_type() {
	let server = guestbook(DiscoveryMode::Aggregated).await;
	let (result, out) = run(identifiers(server.kubeconfig(), &["widgets"])).await;

	assert_matches!(result, Err(HelloError::UnknownResourceType(t)) if t == "widgets");
	assert!(out.is_empty());
}

#[tokio::test]
async fn test_namespace_from_context() {
	let server = guestbook(DiscoveryMode::Aggregated).await;
	let kubeconfig = server.kubeconfig_with_context("staging-context", "staging");
	let (result, out) = run(identifiers(kubeconfig, &["rc"])).await;

	assert_eq!(result.unwrap(), 1);
	assert_eq!(out, "Hello frontend ReplicationController 2020-06-30T18:48:12Z\n");
}

#[tokio::test]
async fn test_namespace_flag_overrides_context() {
	let server = guestbook(DiscoveryMode::Aggregated).await;
	let options = HelloKubernetesOptions::builder()
		.args(vec!["rc".to_string()])
		.client(ClientArgs {
			namespace: Some("empty".to_string()),
			..Default::default()
		})
		.kubeconfig(server.kubeconfig())
		.build();
	let (result, out) = run(options).await;

	assert_matches!(result, Err(HelloError::EmptyResult { failures: 0 }));
	assert!(out.is_empty());
}

#[tokio::test]
async fn test_cluster_scoped_type_ignores_namespace() {
	let server = guestbook(DiscoveryMode::Aggregated).await;
	let (result, out) = run(identifiers(server.kubeconfig(), &["ns/default"])).await;

	assert_eq!(result.unwrap(), 1);
	assert_eq!(out, "Hello default Namespace 2020-06-30T18:48:12Z\n");
}

#[tokio::test]
async fn test_record_leaves_server_untouched() {
	let server = guestbook(DiscoveryMode::Aggregated).await;
	let before = server.resource_count();

	let mut options = identifiers(server.kubeconfig(), &["rc/frontend"]);
	options.record = true;
	let (result, out) = run(options).await;

	assert_eq!(result.unwrap(), 1);
	assert_eq!(out, "Hello frontend ReplicationController 2020-06-30T18:48:12Z\n");
	assert_eq!(server.resource_count(), before);
}

#[tokio::test]
async fn test_usage_error_before_connecting() {
	// Nothing listens here; a usage error must surface without a connection attempt.
	let options = identifiers(Kubeconfig::default(), &["rc", "rc/frontend"]);
	let (result, out) = run(options).await;

	assert_matches!(result, Err(HelloError::InvalidUsage(_)));
	assert!(out.is_empty());
}
