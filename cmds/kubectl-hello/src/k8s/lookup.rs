//! Identifier-based lookups against the API server.

use kube::{
	api::{Api, DynamicObject, ListParams},
	discovery::ApiResource,
	Client,
};
use tracing::{debug, instrument};

use super::{
	client::ClusterConnection,
	discovery::{DiscoveryError, ResourceTypeCatalog},
	ResourceScope,
};
use crate::{
	error::{DocumentFormat, HelloError, ResolutionError, ResolutionErrorKind},
	resolve::{LookupAuthority, ResolutionOutcome},
	resource::ResolvedResource,
};

/// One resource type to look up, optionally narrowed to specific names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
	/// The type as typed by the user (`po`, `deployments.apps`, ...).
	pub type_name: String,
	/// Empty means "every object of this type".
	pub names: Vec<String>,
}

impl LookupRequest {
	fn new(type_name: &str, names: Vec<String>) -> Self {
		Self {
			type_name: type_name.to_string(),
			names,
		}
	}
}

/// Split positional arguments into lookup requests, preserving their order.
///
/// Accepted shapes are `TYPE`, `TYPE NAME...`, `TYPE1,TYPE2 [NAME...]` and
/// `TYPE/NAME...`.
pub fn parse_identifiers(args: &[String]) -> Result<Vec<LookupRequest>, HelloError> {
	let Some((first, rest)) = args.split_first() else {
		return Ok(Vec::new());
	};

	if args.iter().any(|arg| arg.contains('/')) {
		return args
			.iter()
			.map(|arg| match arg.split_once('/') {
				Some((type_name, name))
					if !type_name.is_empty() && !name.is_empty() && !name.contains('/') =>
				{
					Ok(LookupRequest::new(type_name, vec![name.to_string()]))
				}
				Some(_) => Err(HelloError::usage(format!(
					"arguments in resource/name form must have a single resource and name, got \"{arg}\""
				))),
				None => Err(HelloError::usage(format!(
					"there is no need to specify a resource type as a separate argument when \
					 passing arguments in resource/name form (e.g. 'kubectl-hello hello-kubernetes \
					 resource/<resource_name>' instead of 'kubectl-hello hello-kubernetes resource \
					 resource/<resource_name>'), got \"{arg}\""
				))),
			})
			.collect();
	}

	let types: Vec<&str> = first.split(',').collect();
	if types.iter().any(|t| t.is_empty()) {
		return Err(HelloError::usage(format!(
			"invalid resource type list \"{first}\""
		)));
	}

	Ok(types
		.into_iter()
		.map(|type_name| LookupRequest::new(type_name, rest.to_vec()))
		.collect())
}

/// Looks resources up through a live API server.
#[derive(Clone)]
pub struct KubeAuthority {
	client: Client,
	catalog: ResourceTypeCatalog,
}

impl KubeAuthority {
	pub fn new(client: Client, catalog: ResourceTypeCatalog) -> Self {
		Self { client, catalog }
	}

	/// Run discovery once so every request in the invocation shares it.
	pub async fn connect(connection: &ClusterConnection) -> Result<Self, DiscoveryError> {
		let client = connection.client().clone();
		let catalog = ResourceTypeCatalog::discover(&client).await?;
		debug!(
			cluster = %connection.cluster_identifier(),
			resource_types = catalog.len(),
			"discovered API resources"
		);
		Ok(Self::new(client, catalog))
	}

	fn api(&self, ar: &ApiResource, scope: ResourceScope, namespace: &str) -> Api<DynamicObject> {
		match scope {
			ResourceScope::Namespaced => Api::namespaced_with(self.client.clone(), namespace, ar),
			ResourceScope::ClusterWide => Api::all_with(self.client.clone(), ar),
		}
	}
}

impl LookupAuthority for KubeAuthority {
	#[instrument(skip(self), fields(type_name = %request.type_name))]
	async fn lookup(
		&self,
		request: &LookupRequest,
		namespace: &str,
	) -> Result<ResolutionOutcome, HelloError> {
		let discovered = self
			.catalog
			.resolve(&request.type_name)
			.ok_or_else(|| HelloError::UnknownResourceType(request.type_name.clone()))?;
		let ar = &discovered.api_resource;
		let api = self.api(ar, discovered.scope, namespace);

		let mut outcome = ResolutionOutcome::new();

		if request.names.is_empty() {
			let list = api
				.list(&ListParams::default())
				.await
				.map_err(|error| HelloError::Lookup {
					resource: ar.plural.clone(),
					error,
				})?;
			debug!(count = list.items.len(), "listed objects");
			for item in list.items {
				outcome.push(server_record(item, ar, &request.type_name));
			}
			return Ok(outcome);
		}

		for name in &request.names {
			let source_ref = format!("{}/{}", request.type_name, name);
			match api.get(name).await {
				Ok(object) => outcome.push(server_record(object, ar, &source_ref)),
				Err(kube::Error::Api(ref err)) if err.code == 404 => {
					debug!(name = %name, "object not found");
					outcome.push(Err(ResolutionError::new(
						source_ref,
						ResolutionErrorKind::NotFound {
							kind: ar.plural.clone(),
							name: name.clone(),
						},
					)));
				}
				Err(error) => {
					return Err(HelloError::Lookup {
						resource: format!("{}/{}", ar.plural, name),
						error,
					});
				}
			}
		}

		Ok(outcome)
	}
}

fn server_record(
	object: DynamicObject,
	ar: &ApiResource,
	source_ref: &str,
) -> Result<ResolvedResource, ResolutionError> {
	let value = serde_json::to_value(&object).map_err(|e| {
		ResolutionError::new(
			source_ref,
			ResolutionErrorKind::Parse {
				format: DocumentFormat::Json,
				message: e.to_string(),
			},
		)
	})?;
	ResolvedResource::from_server_object(value, &ar.kind, source_ref)
		.map_err(|kind| ResolutionError::new(source_ref, kind))
}
