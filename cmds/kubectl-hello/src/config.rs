//! Client configuration: kubeconfig loading and namespace resolution.
//!
//! Mirrors kubectl's raw kubeconfig loader. Values come from command-line
//! flags first and from the kubeconfig (`$KUBECONFIG` or `~/.kube/config`)
//! second. A missing kubeconfig is fine for purely local requests; only an
//! explicit `--kubeconfig` that cannot be read is an error.

use std::{path::PathBuf, time::Duration};

use clap::Args;
use kube::config::{Kubeconfig, KubeconfigError};
use thiserror::Error;
use tracing::debug;

/// Namespace used when neither the flags nor the kubeconfig name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Errors raised while loading client configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("loading kubeconfig from {}", path.display())]
	Kubeconfig {
		path: PathBuf,
		#[source]
		source: KubeconfigError,
	},

	#[error("context \"{0}\" does not exist in kubeconfig")]
	ContextNotFound(String),
}

/// Flags selecting the cluster, context and namespace.
#[derive(Args, Debug, Clone, Default)]
pub struct ClientArgs {
	/// Path to the kubeconfig file to use for CLI requests
	#[arg(long)]
	pub kubeconfig: Option<PathBuf>,

	/// The name of the kubeconfig context to use
	#[arg(long)]
	pub context: Option<String>,

	/// If present, the namespace scope for this CLI request
	#[arg(short = 'n', long)]
	pub namespace: Option<String>,

	/// The length of time to wait before giving up on a single server request (e.g. 1s, 2m, 3h). Zero means no timeout
	#[arg(long, value_parser = parse_timeout)]
	pub request_timeout: Option<Duration>,
}

/// The namespace a request runs in, and whether documents must agree with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceContext {
	pub namespace: String,
	/// True when the namespace was given explicitly; documents naming a
	/// different namespace are then rejected instead of kept.
	pub enforced: bool,
}

impl NamespaceContext {
	pub fn new(namespace: impl Into<String>, enforced: bool) -> Self {
		Self {
			namespace: namespace.into(),
			enforced,
		}
	}
}

impl Default for NamespaceContext {
	fn default() -> Self {
		Self::new(DEFAULT_NAMESPACE, false)
	}
}

/// Source of the effective namespace for an invocation.
pub trait NamespaceProvider {
	fn namespace(&self) -> Result<NamespaceContext, ConfigError>;
}

/// Loads the kubeconfig once and answers namespace and context questions from it.
#[derive(Debug, Clone, Default)]
pub struct KubeconfigLoader {
	kubeconfig: Option<Kubeconfig>,
	context: Option<String>,
	namespace: Option<String>,
}

impl KubeconfigLoader {
	/// Read the kubeconfig named by the flags, or the default one if present.
	pub fn from_args(args: &ClientArgs) -> Result<Self, ConfigError> {
		let kubeconfig = match &args.kubeconfig {
			Some(path) => Some(Kubeconfig::read_from(path).map_err(|source| {
				ConfigError::Kubeconfig {
					path: path.clone(),
					source,
				}
			})?),
			None => match Kubeconfig::read() {
				Ok(config) => Some(config),
				Err(e) => {
					debug!(error = %e, "no usable default kubeconfig, continuing without one");
					None
				}
			},
		};

		Ok(Self::new(kubeconfig, args))
	}

	/// Build a loader around an already-parsed kubeconfig.
	pub fn new(kubeconfig: Option<Kubeconfig>, args: &ClientArgs) -> Self {
		Self {
			kubeconfig,
			context: args.context.clone(),
			namespace: args.namespace.clone(),
		}
	}

	pub fn kubeconfig(&self) -> Option<&Kubeconfig> {
		self.kubeconfig.as_ref()
	}

	/// The context selected by `--context`, falling back to `current-context`.
	pub fn context_name(&self) -> Option<&str> {
		self.context.as_deref().or_else(|| {
			self.kubeconfig
				.as_ref()
				.and_then(|k| k.current_context.as_deref())
		})
	}

	fn context_namespace(&self) -> Result<Option<String>, ConfigError> {
		let Some(kubeconfig) = &self.kubeconfig else {
			return match &self.context {
				Some(name) => Err(ConfigError::ContextNotFound(name.clone())),
				None => Ok(None),
			};
		};
		let Some(name) = self.context_name() else {
			return Ok(None);
		};

		match kubeconfig.contexts.iter().find(|c| c.name == name) {
			Some(named) => Ok(named.context.as_ref().and_then(|c| c.namespace.clone())),
			None if self.context.is_some() => Err(ConfigError::ContextNotFound(name.to_string())),
			// A dangling current-context is reported by the client when it connects.
			None => Ok(None),
		}
	}
}

impl NamespaceProvider for KubeconfigLoader {
	fn namespace(&self) -> Result<NamespaceContext, ConfigError> {
		if let Some(namespace) = &self.namespace {
			return Ok(NamespaceContext::new(namespace, true));
		}

		let namespace = self
			.context_namespace()?
			.filter(|ns| !ns.is_empty())
			.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

		Ok(NamespaceContext::new(namespace, false))
	}
}

/// Parse kubectl-style durations: a bare number of seconds, or a number
/// suffixed with `ms`, `s`, `m` or `h`.
pub fn parse_timeout(value: &str) -> Result<Duration, String> {
	let value = value.trim();
	let split = value
		.find(|c: char| !c.is_ascii_digit())
		.unwrap_or(value.len());
	let (digits, unit) = value.split_at(split);
	let amount: u64 = digits
		.parse()
		.map_err(|_| format!("invalid timeout value \"{value}\""))?;

	match unit {
		"" | "s" => Ok(Duration::from_secs(amount)),
		"ms" => Ok(Duration::from_millis(amount)),
		"m" => Ok(Duration::from_secs(amount * 60)),
		"h" => Ok(Duration::from_secs(amount * 3600)),
		other => Err(format!("invalid timeout unit \"{other}\" in \"{value}\"")),
	}
}
