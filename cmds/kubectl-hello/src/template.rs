//! Output templates and their rendering.
//!
//! The template is picked once per invocation from the shape of the request
//! and then applied to every resolved record. Templates use Go template
//! syntax, the same language kubectl's `-o go-template` speaks.

use std::collections::HashMap;

use gtmpl::{Context, Template, Value};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::resource::ResolvedResource;

#[derive(Debug, Error)]
pub enum TemplateError {
	#[error("template parse error: {0}")]
	Parse(String),

	#[error("rendering {resource}: {message}")]
	Render { resource: String, message: String },
}

/// One of the two fixed greeting templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTemplate {
	/// Requests given as files, stdin or an overlay.
	Specifier,
	/// Requests given as positional `TYPE[/NAME]` arguments.
	Identifier,
}

impl RenderTemplate {
	/// Pick the template from whether positional arguments were given.
	pub fn select(has_positional_args: bool) -> Self {
		if has_positional_args {
			RenderTemplate::Identifier
		} else {
			RenderTemplate::Specifier
		}
	}

	pub fn source(self) -> &'static str {
		match self {
			RenderTemplate::Specifier => "Hello {{.metadata.name}} {{.kind}}\n",
			RenderTemplate::Identifier => {
				"Hello {{.metadata.name}} {{.kind}} {{.metadata.creationTimestamp}}\n"
			}
		}
	}
}

/// A parsed template, ready to render records.
pub struct Renderer {
	template: Template,
}

impl std::fmt::Debug for Renderer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Renderer").finish_non_exhaustive()
	}
}

impl Renderer {
	pub fn new(kind: RenderTemplate) -> Result<Self, TemplateError> {
		let mut template = Template::default();
		template
			.parse(kind.source())
			.map_err(|e| TemplateError::Parse(format!("{e:?}")))?;
		Ok(Self { template })
	}

	/// Render one record. The record's own `kind`, `name` and timestamp take
	/// precedence over whatever its payload carries.
	pub fn render(&self, resource: &ResolvedResource) -> Result<String, TemplateError> {
		let mut metadata = match resource.object.get("metadata") {
			Some(JsonValue::Object(map)) => map
				.iter()
				.map(|(k, v)| (k.clone(), json_to_gtmpl(v)))
				.collect(),
			_ => HashMap::new(),
		};
		metadata.insert("name".to_string(), Value::String(resource.name.clone()));
		metadata.insert(
			"creationTimestamp".to_string(),
			Value::String(resource.creation_timestamp.clone().unwrap_or_default()),
		);

		let context = Context::from(Value::Map(HashMap::from([
			("kind".to_string(), Value::String(resource.kind.clone())),
			("metadata".to_string(), Value::Map(metadata)),
		])));

		self.template
			.render(&context)
			.map_err(|e| TemplateError::Render {
				resource: resource.reference(),
				message: format!("{e:?}"),
			})
	}
}

fn json_to_gtmpl(value: &JsonValue) -> Value {
	match value {
		JsonValue::Null => Value::Nil,
		JsonValue::Bool(b) => Value::Bool(*b),
		JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
			(Some(i), _) => Value::Number(i.into()),
			(None, Some(f)) => Value::Number(f.into()),
			(None, None) => Value::Nil,
		},
		JsonValue::String(s) => Value::String(s.clone()),
		JsonValue::Array(items) => Value::Array(items.iter().map(json_to_gtmpl).collect()),
		JsonValue::Object(map) => Value::Map(
			map.iter()
				.map(|(k, v)| (k.clone(), json_to_gtmpl(v)))
				.collect(),
		),
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	fn resource(timestamp: Option<&str>) -> ResolvedResource {
		let mut object = json!({
			"kind": "ReplicationController",
			"metadata": {"name": "redis-master", "labels": {"app": "redis"}}
		});
		if let Some(ts) = timestamp {
			object["metadata"]["creationTimestamp"] = json!(ts);
		}
		ResolvedResource {
			kind: "ReplicationController".to_string(),
			name: "redis-master".to_string(),
			namespace: None,
			creation_timestamp: timestamp.map(str::to_string),
			object,
			source: "rc.yaml".to_string(),
		}
	}

	#[test]
	fn test_selection_follows_positional_args() {
		assert_eq!(RenderTemplate::select(false), RenderTemplate::Specifier);
		assert_eq!(RenderTemplate::select(true), RenderTemplate::Identifier);
	}

	#[test]
	fn test_specifier_template_has_no_timestamp() {
		let renderer = Renderer::new(RenderTemplate::Specifier).unwrap();
		assert_eq!(
			renderer.render(&resource(Some("2020-06-30T18:48:12Z"))).unwrap(),
			"Hello redis-master ReplicationController\n"
		);
	}

	#[test]
	fn test_identifier_template_has_timestamp() {
		let renderer = Renderer::new(RenderTemplate::Identifier).unwrap();
		assert_eq!(
			renderer.render(&resource(Some("2020-06-30T18:48:12Z"))).unwrap(),
			"Hello redis-master ReplicationController 2020-06-30T18:48:12Z\n"
		);
	}

	#[test]
	fn test_identifier_template_without_timestamp_renders_empty() {
		let renderer = Renderer::new(RenderTemplate::Identifier).unwrap();
		assert_eq!(
			renderer.render(&resource(None)).unwrap(),
			"Hello redis-master ReplicationController \n"
		);
	}

	#[test]
	fn test_record_fields_win_over_payload() {
		let mut record = resource(None);
		record.object["kind"] = json!("Something");
		let renderer = Renderer::new(RenderTemplate::Specifier).unwrap();
		assert_eq!(
			renderer.render(&record).unwrap(),
			"Hello redis-master ReplicationController\n"
		);
	}
}
