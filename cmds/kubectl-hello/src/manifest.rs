//! Reading and parsing manifest documents named by `-f`.
//!
//! Inputs may be files, directories, URLs or stdin. Each input holds one or
//! more JSON or YAML documents; list-shaped documents are flattened into
//! their items so every returned document describes a single resource.

use std::{
	fs,
	io::Read,
	path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{debug, instrument, trace};
use walkdir::WalkDir;

use crate::{
	error::{DocumentFormat, ResolutionError, ResolutionErrorKind},
	specifier::DocumentSource,
};

/// File extensions picked up when expanding a directory.
pub const MANIFEST_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// A single resource document and the input it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
	pub origin: String,
	pub object: JsonValue,
}

pub type DocumentResult = Result<Document, ResolutionError>;

/// Loads documents from the inputs of one invocation, in order.
pub struct ManifestLoader {
	stdin: Option<Box<dyn Read>>,
	http: Option<reqwest::Client>,
}

impl ManifestLoader {
	/// A loader reading `-` from the given reader.
	pub fn new(stdin: Box<dyn Read>) -> Self {
		Self {
			stdin: Some(stdin),
			http: None,
		}
	}

	/// Load every document from `sources`, keeping input order.
	///
	/// Failures are returned in place of the documents they prevented, so a
	/// broken file does not hide its neighbours.
	#[instrument(skip_all, fields(source_count = sources.len(), recursive))]
	pub async fn load_all(
		&mut self,
		sources: &[DocumentSource],
		recursive: bool,
	) -> Vec<DocumentResult> {
		let mut results = Vec::new();
		for source in sources {
			match source {
				DocumentSource::Stdin => {
					let origin = source.to_string();
					match self.read_stdin() {
						Ok(content) => results.extend(parse_stream(&content, &origin)),
						Err(kind) => results.push(Err(ResolutionError::new(origin, kind))),
					}
				}
				DocumentSource::Url(url) => match self.fetch(url).await {
					Ok(content) => results.extend(parse_stream(&content, url)),
					Err(kind) => results.push(Err(ResolutionError::new(url.clone(), kind))),
				},
				DocumentSource::Path(path) => results.extend(load_path(path, recursive)),
			}
		}
		results
	}

	fn read_stdin(&mut self) -> Result<String, ResolutionErrorKind> {
		let mut content = String::new();
		// Stdin can only be drained once; later reads see nothing.
		if let Some(mut stdin) = self.stdin.take() {
			stdin
				.read_to_string(&mut content)
				.map_err(ResolutionErrorKind::Read)?;
		}
		Ok(content)
	}

	async fn fetch(&mut self, url: &str) -> Result<String, ResolutionErrorKind> {
		debug!(url, "fetching manifest");
		let client = self.http.get_or_insert_with(reqwest::Client::new);
		client
			.get(url)
			.send()
			.await
			.and_then(reqwest::Response::error_for_status)
			.map_err(ResolutionErrorKind::Fetch)?
			.text()
			.await
			.map_err(ResolutionErrorKind::Fetch)
	}
}

/// Load a file, or every manifest file in a directory.
pub fn load_path(path: &Path, recursive: bool) -> Vec<DocumentResult> {
	let origin = path.display().to_string();
	let metadata = match fs::metadata(path) {
		Ok(metadata) => metadata,
		Err(e) => {
			return vec![Err(ResolutionError::new(
				origin,
				ResolutionErrorKind::Read(e),
			))]
		}
	};

	if !metadata.is_dir() {
		return load_file(path);
	}

	let files = match manifest_files(path, recursive) {
		Ok(files) => files,
		Err(e) => {
			return vec![Err(ResolutionError::new(
				origin,
				ResolutionErrorKind::Read(e),
			))]
		}
	};

	if files.is_empty() {
		return vec![Err(ResolutionError::new(
			origin,
			ResolutionErrorKind::EmptyDirectory {
				extensions: MANIFEST_EXTENSIONS,
			},
		))];
	}

	files.iter().flat_map(|file| load_file(file)).collect()
}

/// Read and parse a single manifest file.
pub fn load_file(path: &Path) -> Vec<DocumentResult> {
	let origin = path.display().to_string();
	match fs::read_to_string(path) {
		Ok(content) => parse_stream(&content, &origin),
		Err(e) => vec![Err(ResolutionError::new(
			origin,
			ResolutionErrorKind::Read(e),
		))],
	}
}

/// List manifest files under `dir` in sorted traversal order.
///
/// Without `recursive` only the directory's immediate entries are visited.
/// Symlinks are followed, so linked manifests count as files.
pub fn manifest_files(dir: &Path, recursive: bool) -> std::io::Result<Vec<PathBuf>> {
	let mut walker = WalkDir::new(dir)
		.follow_links(true)
		.min_depth(1)
		.sort_by_file_name();
	if !recursive {
		walker = walker.max_depth(1);
	}

	let mut files = Vec::new();
	for entry in walker {
		let entry = entry.map_err(std::io::Error::from)?;
		if !entry.file_type().is_file() {
			continue;
		}
		let recognized = entry
			.path()
			.extension()
			.and_then(|ext| ext.to_str())
			.is_some_and(|ext| MANIFEST_EXTENSIONS.contains(&ext));
		if recognized {
			trace!(path = %entry.path().display(), "found manifest file");
			files.push(entry.into_path());
		}
	}
	Ok(files)
}

/// Parse a stream of documents and flatten lists, tagging each with `origin`.
pub fn parse_stream(content: &str, origin: &str) -> Vec<DocumentResult> {
	let mut results = Vec::new();
	for parsed in parse_documents(content) {
		match parsed {
			Ok(value) => results.extend(flatten(value).into_iter().map(|object| {
				Ok(Document {
					origin: origin.to_string(),
					object,
				})
			})),
			Err(kind) => results.push(Err(ResolutionError::new(origin, kind))),
		}
	}
	results
}

/// Detect the format of `content` from its first significant character.
pub fn detect_format(content: &str) -> DocumentFormat {
	match content.trim_start().chars().next() {
		Some('{' | '[') => DocumentFormat::Json,
		_ => DocumentFormat::Yaml,
	}
}

/// Split `content` into documents. Empty documents are dropped.
///
/// A syntax error ends the stream: documents before it are kept, and the
/// error is the last entry.
pub fn parse_documents(content: &str) -> Vec<Result<JsonValue, ResolutionErrorKind>> {
	let format = detect_format(content);
	let mut documents = Vec::new();

	match format {
		DocumentFormat::Json => {
			for value in serde_json::Deserializer::from_str(content).into_iter::<JsonValue>() {
				match value {
					Ok(JsonValue::Null) => {}
					Ok(value) => documents.push(Ok(value)),
					Err(e) => {
						documents.push(Err(parse_error(format, e)));
						break;
					}
				}
			}
		}
		DocumentFormat::Yaml => {
			for doc in serde_yaml::Deserializer::from_str(content) {
				match JsonValue::deserialize(doc) {
					Ok(JsonValue::Null) => {}
					Ok(value) => documents.push(Ok(value)),
					Err(e) => {
						documents.push(Err(parse_error(format, e)));
						break;
					}
				}
			}
		}
	}

	documents
}

fn parse_error(format: DocumentFormat, error: impl std::fmt::Display) -> ResolutionErrorKind {
	ResolutionErrorKind::Parse {
		format,
		message: error.to_string(),
	}
}

/// Replace list-shaped documents by their items, recursively.
///
/// Both bare arrays and objects whose `kind` ends in `List` with an `items`
/// array count as lists.
pub fn flatten(value: JsonValue) -> Vec<JsonValue> {
	match value {
		JsonValue::Array(items) => items.into_iter().flat_map(flatten).collect(),
		JsonValue::Object(mut map) if is_list_kind(&map) => match map.remove("items") {
			Some(JsonValue::Array(items)) => items.into_iter().flat_map(flatten).collect(),
			_ => Vec::new(),
		},
		other => vec![other],
	}
}

fn is_list_kind(map: &serde_json::Map<String, JsonValue>) -> bool {
	map.get("kind")
		.and_then(JsonValue::as_str)
		.is_some_and(|kind| kind.ends_with("List"))
		&& matches!(map.get("items"), Some(JsonValue::Array(_)))
}
