//! Turns a resource specifier into an ordered sequence of resolved records.
//!
//! Documents from `-f` and `-k` are parsed locally. Identifiers go to a
//! [`LookupAuthority`], which is only created when an identifier request
//! actually needs one. Per-item failures are kept in place and never stop
//! the batch.

use std::{future::Future, path::Path};

use serde_json::Value as JsonValue;
use tracing::{debug, instrument};

use crate::{
	config::NamespaceContext,
	error::{HelloError, ResolutionError, ResolutionErrorKind},
	k8s::lookup::{parse_identifiers, LookupRequest},
	kustomize,
	manifest::{Document, DocumentResult, ManifestLoader},
	resource::{is_cluster_scoped_kind, ResolvedResource},
	specifier::ResourceSpecifier,
};

/// Resolution results in input order, failures interleaved with successes.
pub type ResolutionOutcome = Vec<Result<ResolvedResource, ResolutionError>>;

/// Something that can return live resources for a type and optional names.
#[allow(async_fn_in_trait)]
pub trait LookupAuthority {
	/// Resolve one request within `namespace`.
	///
	/// A missing named object is a per-item error in the outcome. Anything
	/// that prevents the request from being answered at all is returned as
	/// `Err` and aborts the lookup.
	async fn lookup(
		&self,
		request: &LookupRequest,
		namespace: &str,
	) -> Result<ResolutionOutcome, HelloError>;
}

/// Resolve `specifier` against the invocation's namespace.
///
/// `connect` is awaited at most once, and only for identifier requests.
#[instrument(skip_all, fields(identifiers = specifier.is_identifier_based(), namespace = %namespace.namespace))]
pub async fn resolve<A, F, Fut>(
	specifier: &ResourceSpecifier,
	namespace: &NamespaceContext,
	loader: &mut ManifestLoader,
	connect: F,
) -> Result<ResolutionOutcome, HelloError>
where
	A: LookupAuthority,
	F: FnOnce() -> Fut,
	Fut: Future<Output = Result<A, HelloError>>,
{
	let outcome = match specifier {
		ResourceSpecifier::Documents { sources, recursive } => {
			let documents = loader.load_all(sources, *recursive).await;
			resolve_documents(documents, namespace)
		}
		ResourceSpecifier::Kustomization(dir) => resolve_kustomization(dir, namespace),
		ResourceSpecifier::Identifiers(args) => {
			let requests = parse_identifiers(args)?;
			let authority = connect().await?;
			resolve_identifiers(&authority, &requests, namespace).await?
		}
	};

	debug!(
		resolved = outcome.iter().filter(|r| r.is_ok()).count(),
		failed = outcome.iter().filter(|r| r.is_err()).count(),
		"resolution finished"
	);
	Ok(outcome)
}

fn resolve_kustomization(dir: &Path, namespace: &NamespaceContext) -> ResolutionOutcome {
	resolve_documents(kustomize::build(dir), namespace)
}

/// Normalize parsed documents, defaulting and checking their namespace.
pub fn resolve_documents(
	documents: Vec<DocumentResult>,
	namespace: &NamespaceContext,
) -> ResolutionOutcome {
	documents
		.into_iter()
		.map(|document| {
			let Document { origin, object } = document?;
			ResolvedResource::from_manifest(object, origin.as_str())
				.and_then(|resource| apply_namespace(resource, namespace))
				.map_err(|kind| ResolutionError::new(origin, kind))
		})
		.collect()
}

/// Query the authority for each request in turn.
pub async fn resolve_identifiers<A: LookupAuthority>(
	authority: &A,
	requests: &[LookupRequest],
	namespace: &NamespaceContext,
) -> Result<ResolutionOutcome, HelloError> {
	let mut outcome = ResolutionOutcome::new();
	for request in requests {
		outcome.extend(authority.lookup(request, &namespace.namespace).await?);
	}
	Ok(outcome)
}

/// Default a missing namespace onto a namespaced record, or reject a
/// conflicting one when the namespace is enforced.
pub fn apply_namespace(
	mut resource: ResolvedResource,
	context: &NamespaceContext,
) -> Result<ResolvedResource, ResolutionErrorKind> {
	if is_cluster_scoped_kind(&resource.kind) {
		return Ok(resource);
	}

	if let Some(found) = &resource.namespace {
		if context.enforced && *found != context.namespace {
			return Err(ResolutionErrorKind::NamespaceMismatch {
				found: found.clone(),
				expected: context.namespace.clone(),
			});
		}
		return Ok(resource);
	}

	if let Some(metadata) = resource
		.object
		.as_object_mut()
		.and_then(|obj| obj.get_mut("metadata"))
		.and_then(JsonValue::as_object_mut)
	{
		metadata.insert(
			"namespace".to_string(),
			JsonValue::String(context.namespace.clone()),
		);
	}
	resource.namespace = Some(context.namespace.clone());
	Ok(resource)
}
