//! Error types shared by the resolution and emission pipeline.

use std::{fmt, io};

use thiserror::Error;

use crate::{
	config::ConfigError,
	k8s::{client::ConnectionError, discovery::DiscoveryError},
	template::TemplateError,
};

/// Hint appended to usage errors, mirroring kubectl's usage output.
pub const USAGE_HINT: &str = "See 'kubectl-hello hello-kubernetes -h' for help and examples";

/// Errors that terminate a `hello-kubernetes` invocation.
#[derive(Debug, Error)]
pub enum HelloError {
	#[error("{0}. {hint}", hint = USAGE_HINT)]
	InvalidUsage(String),

	#[error("no objects passed to print{}", failure_suffix(*failures))]
	EmptyResult { failures: usize },

	#[error("{} of {} resources failed to resolve: {}", errors.len(), errors.len() + emitted, first_error(errors))]
	Aggregate {
		errors: Vec<ResolutionError>,
		emitted: usize,
	},

	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Connection(#[from] ConnectionError),

	#[error(transparent)]
	Discovery(#[from] DiscoveryError),

	#[error("the server doesn't have a resource type \"{0}\"")]
	UnknownResourceType(String),

	/// The API error is part of the message so failures stay on one line.
	#[error("looking up {resource}: {error}")]
	Lookup { resource: String, error: kube::Error },

	#[error(transparent)]
	Template(#[from] TemplateError),

	#[error("writing output")]
	Io(#[from] io::Error),
}

impl HelloError {
	pub fn usage(message: impl Into<String>) -> Self {
		HelloError::InvalidUsage(message.into())
	}
}

fn failure_suffix(failures: usize) -> String {
	match failures {
		0 => String::new(),
		1 => " (1 resource failed to resolve)".to_string(),
		n => format!(" ({n} resources failed to resolve)"),
	}
}

fn first_error(errors: &[ResolutionError]) -> String {
	errors
		.first()
		.map(ToString::to_string)
		.unwrap_or_default()
}

/// A single specifier or document that could not be turned into a resource.
///
/// Accumulated during resolution; never aborts the batch on its own.
#[derive(Debug, Error)]
#[error("error from {source_ref}: {kind}")]
pub struct ResolutionError {
	/// The file, URL, stdin marker or `type/name` the failure came from.
	pub source_ref: String,
	#[source]
	pub kind: ResolutionErrorKind,
}

impl ResolutionError {
	pub fn new(source_ref: impl Into<String>, kind: ResolutionErrorKind) -> Self {
		Self {
			source_ref: source_ref.into(),
			kind,
		}
	}
}

#[derive(Debug, Error)]
pub enum ResolutionErrorKind {
	#[error("reading input: {0}")]
	Read(#[source] io::Error),

	#[error("fetching remote manifest: {0}")]
	Fetch(#[source] reqwest::Error),

	#[error("parsing {format}: {message}")]
	Parse {
		format: DocumentFormat,
		message: String,
	},

	#[error("object is missing required field `{0}`")]
	MissingField(&'static str),

	#[error(
		"the namespace from the provided object \"{found}\" does not match the namespace \
		 \"{expected}\". You must pass '--namespace={found}' to perform this operation."
	)]
	NamespaceMismatch { found: String, expected: String },

	#[error("{kind} \"{name}\" not found")]
	NotFound { kind: String, name: String },

	#[error("{0}")]
	Kustomization(String),

	#[error("no files with recognized extensions {extensions:?} in directory")]
	EmptyDirectory { extensions: &'static [&'static str] },
}

/// Serialization format of an input document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
	Json,
	Yaml,
}

impl fmt::Display for DocumentFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DocumentFormat::Json => write!(f, "JSON"),
			DocumentFormat::Yaml => write!(f, "YAML"),
		}
	}
}

/// Best-effort annotation failures. Reported to a diagnostic sink, never returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordingError {
	#[error("object payload is not a JSON object")]
	NotAnObject,

	#[error("`{0}` is not an object")]
	InvalidField(&'static str),
}
