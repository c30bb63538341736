//! Collection of resource specifiers from bound flags and positional arguments.

use std::{fmt, path::PathBuf};

use crate::error::HelloError;

/// The `-f`/`-k`/`-R` flag group, as bound by the command line.
#[derive(Debug, Clone, Default)]
pub struct FilenameOptions {
	pub filenames: Vec<String>,
	pub kustomize: Option<PathBuf>,
	pub recursive: bool,
}

impl FilenameOptions {
	/// True when neither `-f` nor `-k` carries a value.
	pub fn is_empty(&self) -> bool {
		self.filenames.iter().all(String::is_empty)
			&& self
				.kustomize
				.as_ref()
				.map_or(true, |k| k.as_os_str().is_empty())
	}
}

/// One input named by `-f`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentSource {
	Stdin,
	Url(String),
	Path(PathBuf),
}

impl DocumentSource {
	pub fn parse(value: &str) -> Self {
		if value == "-" {
			DocumentSource::Stdin
		} else if value.starts_with("http://") || value.starts_with("https://") {
			DocumentSource::Url(value.to_string())
		} else {
			DocumentSource::Path(PathBuf::from(value))
		}
	}
}

impl fmt::Display for DocumentSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			DocumentSource::Stdin => write!(f, "STDIN"),
			DocumentSource::Url(url) => write!(f, "{url}"),
			DocumentSource::Path(path) => write!(f, "{}", path.display()),
		}
	}
}

/// What a single invocation asks to resolve. Exactly one kind is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceSpecifier {
	/// Files, directories, URLs and stdin given with `-f`.
	Documents {
		sources: Vec<DocumentSource>,
		recursive: bool,
	},
	/// A directory holding a kustomization, given with `-k`.
	Kustomization(PathBuf),
	/// Positional `TYPE[/NAME]` tokens looked up on the server.
	Identifiers(Vec<String>),
}

impl ResourceSpecifier {
	/// Whether this request names resources by type/name.
	pub fn is_identifier_based(&self) -> bool {
		matches!(self, ResourceSpecifier::Identifiers(_))
	}
}

/// Up-front gate: something must be given to resolve.
pub fn validate(args: &[String], options: &FilenameOptions) -> Result<(), HelloError> {
	if args.is_empty() && options.is_empty() {
		return Err(HelloError::usage(
			"must specify one of -f and -k or type/name as arg",
		));
	}
	Ok(())
}

/// Turn validated flags and arguments into the single active specifier.
pub fn collect(args: &[String], options: &FilenameOptions) -> Result<ResourceSpecifier, HelloError> {
	validate(args, options)?;

	let filenames: Vec<&String> = options.filenames.iter().filter(|f| !f.is_empty()).collect();

	if !filenames.is_empty() && options.kustomize.is_some() {
		return Err(HelloError::usage("only one of -f or -k can be specified"));
	}
	if !args.is_empty() && !options.is_empty() {
		return Err(HelloError::usage(
			"when paths, URLs, or stdin is provided as input, you may not specify resource arguments as well",
		));
	}

	if let Some(dir) = &options.kustomize {
		return Ok(ResourceSpecifier::Kustomization(dir.clone()));
	}

	if !filenames.is_empty() {
		let sources: Vec<DocumentSource> = filenames
			.into_iter()
			.map(|f| DocumentSource::parse(f))
			.collect();
		if sources.iter().filter(|s| **s == DocumentSource::Stdin).count() > 1 {
			return Err(HelloError::usage("'-' may only be specified once"));
		}
		return Ok(ResourceSpecifier::Documents {
			sources,
			recursive: options.recursive,
		});
	}

	Ok(ResourceSpecifier::Identifiers(args.to_vec()))
}
