//! A small kustomize: builds the resources of a `-k` overlay directory.
//!
//! Supports `resources` (files and nested overlay directories), `namespace`,
//! `namePrefix`, `nameSuffix`, `commonLabels` and `commonAnnotations`.
//! A build either succeeds as a whole or fails as a whole.

use std::{
	collections::BTreeMap,
	fs,
	path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, instrument};

use crate::{
	error::{ResolutionError, ResolutionErrorKind},
	manifest::{self, Document},
	resource::is_cluster_scoped_kind,
};

/// File names recognized as an overlay definition, in lookup order.
pub const KUSTOMIZATION_FILE_NAMES: &[&str] =
	&["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// The subset of `kustomization.yaml` understood here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Kustomization {
	#[serde(default)]
	pub resources: Vec<String>,

	/// Deprecated alias of `resources`, still found in older overlays.
	/// Built after `resources`, as kustomize appends them.
	#[serde(default)]
	pub bases: Vec<String>,

	#[serde(default)]
	pub namespace: Option<String>,

	#[serde(default)]
	pub name_prefix: Option<String>,

	#[serde(default)]
	pub name_suffix: Option<String>,

	#[serde(default)]
	pub common_labels: BTreeMap<String, String>,

	#[serde(default)]
	pub common_annotations: BTreeMap<String, String>,
}

impl Kustomization {
	/// Locate and parse the overlay file in `dir`.
	pub fn load(dir: &Path) -> Result<(PathBuf, Self), ResolutionErrorKind> {
		let file = KUSTOMIZATION_FILE_NAMES
			.iter()
			.map(|name| dir.join(name))
			.find(|path| path.is_file())
			.ok_or_else(|| {
				ResolutionErrorKind::Kustomization(format!(
					"unable to find one of 'kustomization.yaml', 'kustomization.yml' or \
					 'Kustomization' in directory '{}'",
					dir.display()
				))
			})?;

		let content = fs::read_to_string(&file).map_err(ResolutionErrorKind::Read)?;
		let kustomization: Kustomization = serde_yaml::from_str(&content).map_err(|e| {
			ResolutionErrorKind::Kustomization(format!("invalid {}: {e}", file.display()))
		})?;
		Ok((file, kustomization))
	}

	/// Apply this overlay's transformations to one resource.
	fn transform(&self, object: &mut JsonValue) {
		let Some(obj) = object.as_object_mut() else {
			return;
		};
		let kind = obj
			.get("kind")
			.and_then(JsonValue::as_str)
			.unwrap_or_default()
			.to_string();

		let metadata = obj
			.entry("metadata")
			.or_insert_with(|| JsonValue::Object(Map::new()));
		let Some(metadata) = metadata.as_object_mut() else {
			return;
		};

		if self.name_prefix.is_some() || self.name_suffix.is_some() {
			if let Some(JsonValue::String(name)) = metadata.get_mut("name") {
				*name = format!(
					"{}{}{}",
					self.name_prefix.as_deref().unwrap_or_default(),
					name,
					self.name_suffix.as_deref().unwrap_or_default()
				);
			}
		}

		if let Some(namespace) = &self.namespace {
			if !is_cluster_scoped_kind(&kind) {
				metadata.insert(
					"namespace".to_string(),
					JsonValue::String(namespace.clone()),
				);
			}
		}

		merge_string_map(metadata, "labels", &self.common_labels);
		merge_string_map(metadata, "annotations", &self.common_annotations);
	}
}

fn merge_string_map(
	metadata: &mut Map<String, JsonValue>,
	field: &str,
	values: &BTreeMap<String, String>,
) {
	if values.is_empty() {
		return;
	}
	let target = metadata
		.entry(field)
		.or_insert_with(|| JsonValue::Object(Map::new()));
	if let Some(target) = target.as_object_mut() {
		for (key, value) in values {
			target.insert(key.clone(), JsonValue::String(value.clone()));
		}
	}
}

/// Build the overlay rooted at `dir`.
///
/// On success every document is returned in `resources` order; on failure
/// the single error names the overlay directory.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn build(dir: &Path) -> Vec<manifest::DocumentResult> {
	let mut stack = Vec::new();
	match build_overlay(dir, &mut stack) {
		Ok(documents) => documents.into_iter().map(Ok).collect(),
		Err(kind) => vec![Err(ResolutionError::new(dir.display().to_string(), kind))],
	}
}

fn build_overlay(
	dir: &Path,
	stack: &mut Vec<PathBuf>,
) -> Result<Vec<Document>, ResolutionErrorKind> {
	let canonical = dir.canonicalize().map_err(ResolutionErrorKind::Read)?;
	if stack.contains(&canonical) {
		return Err(ResolutionErrorKind::Kustomization(format!(
			"cycle detected: '{}' includes itself",
			dir.display()
		)));
	}
	stack.push(canonical);

	let (file, kustomization) = Kustomization::load(dir)?;
	debug!(file = %file.display(), "building kustomization");

	let mut documents = Vec::new();
	for entry in kustomization.resources.iter().chain(&kustomization.bases) {
		if entry.contains("://") {
			return Err(ResolutionErrorKind::Kustomization(format!(
				"remote resource '{entry}' is not supported"
			)));
		}

		let path = dir.join(entry);
		if path.is_dir() {
			documents.extend(build_overlay(&path, stack)?);
			continue;
		}

		for result in manifest::load_file(&path) {
			documents.push(result.map_err(|e| e.kind)?);
		}
	}

	for document in &mut documents {
		kustomization.transform(&mut document.object);
	}

	stack.pop();
	Ok(documents)
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use indoc::indoc;

	use super::*;

	fn write(dir: &Path, name: &str, content: &str) {
		let path = dir.join(name);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).unwrap();
		}
		fs::write(path, content).unwrap();
	}

	fn objects(results: Vec<manifest::DocumentResult>) -> Vec<JsonValue> {
		results.into_iter().map(|r| r.unwrap().object).collect()
	}

	#[test]
	fn test_overlay_transforms_resources_in_order() {
		let dir = tempfile::tempdir().unwrap();
		write(
			dir.path(),
			"kustomization.yaml",
			indoc! {"
				resources:
				- service.yaml
				- namespace.yaml
				namespace: staging
				namePrefix: dev-
				commonLabels:
				  app: guestbook
			"},
		);
		write(
			dir.path(),
			"service.yaml",
			"apiVersion: v1\nkind: Service\nmetadata:\n  name: frontend\n",
		);
		write(
			dir.path(),
			"namespace.yaml",
			"apiVersion: v1\nkind: Namespace\nmetadata:\n  name: staging\n",
		);

		let objects = objects(build(dir.path()));
		assert_eq!(objects.len(), 2);
		assert_eq!(objects[0]["metadata"]["name"], "dev-frontend");
		assert_eq!(objects[0]["metadata"]["namespace"], "staging");
		assert_eq!(objects[0]["metadata"]["labels"]["app"], "guestbook");
		assert_eq!(objects[1]["kind"], "Namespace");
		assert!(objects[1]["metadata"].get("namespace").is_none());
	}

	#[test]
	fn test_nested_overlay_applies_inner_then_outer() {
		let dir = tempfile::tempdir().unwrap();
		write(
			dir.path(),
			"base/kustomization.yml",
			"resources:\n- pod.yaml\nnameSuffix: -v1\n",
		);
		write(
			dir.path(),
			"base/pod.yaml",
			"kind: Pod\nmetadata:\n  name: web\n",
		);
		write(
			dir.path(),
			"overlay/Kustomization",
			"resources:\n- ../base\nnamePrefix: prod-\ncommonAnnotations:\n  team: core\n",
		);

		let objects = objects(build(&dir.path().join("overlay")));
		assert_eq!(objects.len(), 1);
		assert_eq!(objects[0]["metadata"]["name"], "prod-web-v1");
		assert_eq!(objects[0]["metadata"]["annotations"]["team"], "core");
	}

	#[test]
	fn test_bases_follow_resources() {
		let dir = tempfile::tempdir().unwrap();
		write(
			dir.path(),
			"base/kustomization.yaml",
			"resources:\n- pod.yaml\n",
		);
		write(dir.path(), "base/pod.yaml", "kind: Pod\nmetadata:\n  name: from-base\n");
		write(
			dir.path(),
			"overlay/kustomization.yaml",
			indoc! {"
				bases:
				- ../base
				resources:
				- service.yaml
			"},
		);
		write(
			dir.path(),
			"overlay/service.yaml",
			"kind: Service\nmetadata:\n  name: from-resources\n",
		);

		let names: Vec<JsonValue> = objects(build(&dir.path().join("overlay")))
			.into_iter()
			.map(|o| o["metadata"]["name"].clone())
			.collect();
		assert_eq!(names, vec!["from-resources", "from-base"]);
	}

	#[test]
	fn test_missing_kustomization_file() {
		let dir = tempfile::tempdir().unwrap();
		let results = build(dir.path());
		assert_matches!(
			results.as_slice(),
			[Err(ResolutionError { kind: ResolutionErrorKind::Kustomization(msg), .. })]
				if msg.contains("unable to find one of 'kustomization.yaml'")
		);
	}

	#[test]
	fn test_cycle_is_reported() {
		let dir = tempfile::tempdir().unwrap();
		write(dir.path(), "a/kustomization.yaml", "resources:\n- ../b\n");
		write(dir.path(), "b/kustomization.yaml", "resources:\n- ../a\n");

		let results = build(&dir.path().join("a"));
		assert_matches!(
			results.as_slice(),
			[Err(ResolutionError { kind: ResolutionErrorKind::Kustomization(msg), .. })]
				if msg.contains("cycle detected")
		);
	}

	#[test]
	fn test_broken_resource_fails_whole_build() {
		let dir = tempfile::tempdir().unwrap();
		write(
			dir.path(),
			"kustomization.yaml",
			"resources:\n- good.yaml\n- missing.yaml\n",
		);
		write(dir.path(), "good.yaml", "kind: Pod\nmetadata:\n  name: ok\n");

		let results = build(dir.path());
		assert_matches!(
			results.as_slice(),
			[Err(ResolutionError { kind: ResolutionErrorKind::Read(_), .. })]
		);
	}
}
