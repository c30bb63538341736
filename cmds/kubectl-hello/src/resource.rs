//! The normalized resource record produced by resolution.

use serde_json::Value as JsonValue;

use crate::error::ResolutionErrorKind;

/// A resource ready to be recorded and rendered.
///
/// `kind` and `name` are always set. `creation_timestamp` is only carried
/// over for resources fetched from the server.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResource {
	pub kind: String,
	pub name: String,
	pub namespace: Option<String>,
	pub creation_timestamp: Option<String>,
	/// The full structured document, as parsed or as returned by the server.
	pub object: JsonValue,
	/// Where the record came from, for diagnostics.
	pub source: String,
}

impl ResolvedResource {
	/// Build a record from a parsed manifest. The timestamp is never taken
	/// from local documents.
	pub fn from_manifest(
		object: JsonValue,
		source: impl Into<String>,
	) -> Result<Self, ResolutionErrorKind> {
		let kind = str_field(&object, "/kind")
			.ok_or(ResolutionErrorKind::MissingField("kind"))?
			.to_string();
		let name = str_field(&object, "/metadata/name")
			.ok_or(ResolutionErrorKind::MissingField("metadata.name"))?
			.to_string();
		let namespace = str_field(&object, "/metadata/namespace").map(str::to_string);

		Ok(Self {
			kind,
			name,
			namespace,
			creation_timestamp: None,
			object,
			source: source.into(),
		})
	}

	/// Build a record from an object returned by the API server.
	///
	/// List items come back without `kind`, so the discovered kind is used.
	pub fn from_server_object(
		mut object: JsonValue,
		kind: &str,
		source: impl Into<String>,
	) -> Result<Self, ResolutionErrorKind> {
		if let JsonValue::Object(map) = &mut object {
			map.entry("kind")
				.or_insert_with(|| JsonValue::String(kind.to_string()));
		}
		let creation_timestamp =
			str_field(&object, "/metadata/creationTimestamp").map(str::to_string);

		let mut resource = Self::from_manifest(object, source)?;
		resource.creation_timestamp = creation_timestamp;
		Ok(resource)
	}

	/// `kind/name`, as kubectl names objects in messages.
	pub fn reference(&self) -> String {
		format!("{}/{}", self.kind, self.name)
	}
}

/// Kinds that never live in a namespace. Used when no server is consulted.
pub fn is_cluster_scoped_kind(kind: &str) -> bool {
	matches!(
		kind,
		"APIService"
			| "CertificateSigningRequest"
			| "ClusterRole"
			| "ClusterRoleBinding"
			| "ComponentStatus"
			| "CSIDriver"
			| "CSINode"
			| "CustomResourceDefinition"
			| "IngressClass"
			| "MutatingWebhookConfiguration"
			| "Namespace"
			| "Node"
			| "PersistentVolume"
			| "PriorityClass"
			| "RuntimeClass"
			| "StorageClass"
			| "ValidatingWebhookConfiguration"
			| "VolumeAttachment"
	)
}

fn str_field<'a>(object: &'a JsonValue, pointer: &str) -> Option<&'a str> {
	object
		.pointer(pointer)
		.and_then(JsonValue::as_str)
		.filter(|s| !s.is_empty())
}
