//! Kubernetes cluster connection management.

use std::time::Duration;

use kube::{
	config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use thiserror::Error;
use tracing::instrument;

use crate::config::{ClientArgs, KubeconfigLoader};

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no context named \"{0}\" was found. Please check your $KUBECONFIG")]
	ContextNotFound(String),

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error("no kubeconfig found and not running inside a cluster")]
	Infer(#[from] InferConfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// Represents a connection to a Kubernetes cluster.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	/// Human-readable identifier for the cluster (context name or API server URL).
	cluster_identifier: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("cluster_identifier", &self.cluster_identifier)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	/// Connect using the kubeconfig held by `loader`, or the in-cluster
	/// environment when there is none.
	#[instrument(skip_all)]
	pub async fn from_loader(
		loader: &KubeconfigLoader,
		args: &ClientArgs,
	) -> Result<Self, ConnectionError> {
		match loader.kubeconfig() {
			Some(kubeconfig) => {
				Self::from_kubeconfig(kubeconfig.clone(), loader.context_name(), args).await
			}
			None => {
				let config = Config::infer().await?;
				let identifier = config.cluster_url.to_string();
				Self::from_config(config, identifier, args)
			}
		}
	}

	/// Connect through a named (or the current) context of `kubeconfig`.
	#[instrument(skip_all, fields(context = ?context))]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
		args: &ClientArgs,
	) -> Result<Self, ConnectionError> {
		if let Some(name) = context {
			if !kubeconfig.contexts.iter().any(|c| c.name == name) {
				return Err(ConnectionError::ContextNotFound(name.to_string()));
			}
		}

		let config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: context.map(str::to_string),
				..Default::default()
			},
		)
		.await?;

		let identifier = match context {
			Some(name) => format!("context:{}", name),
			None => config.cluster_url.to_string(),
		};

		tracing::debug!(cluster = %identifier, "connecting to cluster");
		Self::from_config(config, identifier, args)
	}

	fn from_config(
		mut config: Config,
		cluster_identifier: String,
		args: &ClientArgs,
	) -> Result<Self, ConnectionError> {
		config.read_timeout = match args.request_timeout {
			Some(timeout) if timeout.is_zero() => None,
			Some(timeout) => Some(timeout),
			None => Some(DEFAULT_API_TIMEOUT),
		};
		let client = Client::try_from(config)?;

		Ok(Self {
			client,
			cluster_identifier,
		})
	}

	/// Get a reference to the underlying kube client.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Get the cluster identifier (context name or API server URL).
	pub fn cluster_identifier(&self) -> &str {
		&self.cluster_identifier
	}
}
