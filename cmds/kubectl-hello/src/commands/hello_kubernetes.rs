//! `hello-kubernetes` command handler.
//!
//! Resolves the resources named by `-f`, `-k` or positional arguments and
//! prints one greeting per resource.

use std::{
	io::{Read, Write},
	path::PathBuf,
};

use anyhow::{Context, Result};
use bon::Builder;
use clap::Args;
use kube::config::Kubeconfig;
use tracing::{debug, instrument, Level};

use super::util::InertArgs;
use crate::{
	config::{ClientArgs, KubeconfigLoader, NamespaceProvider},
	error::HelloError,
	k8s::{client::ClusterConnection, lookup::KubeAuthority},
	manifest::ManifestLoader,
	record::{recorder_for, DiagnosticSink, TracingDiagnostics},
	resolve::resolve,
	specifier::{collect, FilenameOptions},
	template::{RenderTemplate, Renderer},
	visitor::Emitter,
};

#[derive(Args, Debug, Clone, Default)]
pub struct HelloKubernetesArgs {
	/// TYPE[.GROUP] [NAME...] or TYPE[.GROUP]/NAME... of the resources to greet
	pub args: Vec<String>,

	/// Filename, directory, or URL to files identifying the resources to greet. Use '-' for stdin
	#[arg(short = 'f', long = "filename")]
	pub filenames: Vec<String>,

	/// Process the kustomization directory. This flag can't be used together with -f or -R
	#[arg(short = 'k', long)]
	pub kustomize: Option<PathBuf>,

	/// Process the directory used in -f, --filename recursively
	#[arg(short = 'R', long)]
	pub recursive: bool,

	/// Output format. Accepted for kubectl compatibility; has no effect
	#[arg(short = 'o', long)]
	pub output: Option<String>,

	/// Record the current command in the resource's kubernetes.io/change-cause annotation
	#[arg(long)]
	pub record: bool,

	#[command(flatten)]
	pub client: ClientArgs,

	/// Log level (trace, debug, info, warn, error). Defaults to $RUST_LOG, then warn
	#[arg(long)]
	pub log_level: Option<Level>,
}

/// Bound inputs of one `hello-kubernetes` invocation.
#[derive(Debug, Clone, Default, Builder)]
pub struct HelloKubernetesOptions {
	#[builder(default)]
	pub args: Vec<String>,

	#[builder(default)]
	pub filenames: FilenameOptions,

	#[builder(default)]
	pub client: ClientArgs,

	#[builder(default)]
	pub record: bool,

	/// Use this kubeconfig instead of reading one from disk.
	pub kubeconfig: Option<Kubeconfig>,
}

impl From<HelloKubernetesArgs> for HelloKubernetesOptions {
	fn from(args: HelloKubernetesArgs) -> Self {
		HelloKubernetesOptions {
			args: args.args,
			filenames: FilenameOptions {
				filenames: args.filenames,
				kustomize: args.kustomize,
				recursive: args.recursive,
			},
			client: args.client,
			record: args.record,
			kubeconfig: None,
		}
	}
}

/// Run the hello-kubernetes command.
pub fn run<W: Write>(args: HelloKubernetesArgs, mut writer: W) -> Result<()> {
	InertArgs {
		output: args.output.as_deref(),
	}
	.warn_if_set();

	let runtime = tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")?;

	runtime.block_on(execute(
		args.into(),
		Box::new(std::io::stdin()),
		&TracingDiagnostics,
		&mut writer,
	))?;
	Ok(())
}

/// Resolve and greet every resource the options name.
///
/// Returns the number of lines written. Usage errors are raised before any
/// file, network or kubeconfig access.
#[instrument(skip_all, fields(args = ?options.args))]
pub async fn execute<W: Write>(
	options: HelloKubernetesOptions,
	stdin: Box<dyn Read>,
	diagnostics: &dyn DiagnosticSink,
	writer: &mut W,
) -> Result<usize, HelloError> {
	let specifier = collect(&options.args, &options.filenames)?;

	let loader = match options.kubeconfig {
		Some(kubeconfig) => KubeconfigLoader::new(Some(kubeconfig), &options.client),
		None => KubeconfigLoader::from_args(&options.client)?,
	};
	let namespace = loader.namespace()?;
	debug!(namespace = %namespace.namespace, enforced = namespace.enforced, "resolved namespace");

	let renderer = Renderer::new(RenderTemplate::select(!options.args.is_empty()))?;
	let recorder = recorder_for(options.record);

	let (loader, client_args) = (&loader, &options.client);
	let outcome = resolve(
		&specifier,
		&namespace,
		&mut ManifestLoader::new(stdin),
		move || async move {
			let connection = ClusterConnection::from_loader(loader, client_args).await?;
			Ok::<_, HelloError>(KubeAuthority::connect(&connection).await?)
		},
	)
	.await?;

	Emitter::new(&renderer, recorder.as_ref(), diagnostics).emit(outcome, writer)
}
