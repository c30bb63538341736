//! Best-effort provenance recording.
//!
//! With `--record`, the command line that produced a resource is written
//! into its `kubernetes.io/change-cause` annotation, as kubectl does.
//! Failures never reach the user; they go to a [`DiagnosticSink`].

use std::sync::Mutex;

use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::error::RecordingError;

/// Annotation kubectl uses to remember the command behind a change.
pub const CHANGE_CAUSE_ANNOTATION: &str = "kubernetes.io/change-cause";

/// Attaches a provenance annotation to an object payload.
pub trait Recorder {
	fn record(&self, object: &mut JsonValue) -> Result<(), RecordingError>;
}

/// Records nothing. Used unless `--record` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRecorder;

impl Recorder for NoopRecorder {
	fn record(&self, _object: &mut JsonValue) -> Result<(), RecordingError> {
		Ok(())
	}
}

/// Writes the change cause onto every object it sees.
#[derive(Debug, Clone)]
pub struct ActiveRecorder {
	change_cause: String,
}

impl ActiveRecorder {
	pub fn new(change_cause: impl Into<String>) -> Self {
		Self {
			change_cause: change_cause.into(),
		}
	}

	/// A recorder whose change cause is this process's command line.
	pub fn from_process_args() -> Self {
		Self::new(std::env::args().collect::<Vec<_>>().join(" "))
	}
}

impl Recorder for ActiveRecorder {
	fn record(&self, object: &mut JsonValue) -> Result<(), RecordingError> {
		let object = object.as_object_mut().ok_or(RecordingError::NotAnObject)?;
		let metadata = object
			.entry("metadata")
			.or_insert_with(|| JsonValue::Object(Map::new()))
			.as_object_mut()
			.ok_or(RecordingError::InvalidField("metadata"))?;
		let annotations = metadata
			.entry("annotations")
			.or_insert_with(|| JsonValue::Object(Map::new()))
			.as_object_mut()
			.ok_or(RecordingError::InvalidField("metadata.annotations"))?;
		annotations.insert(
			CHANGE_CAUSE_ANNOTATION.to_string(),
			JsonValue::String(self.change_cause.clone()),
		);
		Ok(())
	}
}

/// Pick the recorder for an invocation.
pub fn recorder_for(record: bool) -> Box<dyn Recorder> {
	if record {
		Box::new(ActiveRecorder::from_process_args())
	} else {
		Box::new(NoopRecorder)
	}
}

/// Receives recording failures that must not affect the result.
pub trait DiagnosticSink {
	fn recording_failed(&self, resource: &str, error: &RecordingError);
}

/// Sends recording failures to the debug log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
	fn recording_failed(&self, resource: &str, error: &RecordingError) {
		debug!(resource, error = %error, "error recording current command");
	}
}

/// Keeps recording failures in memory so callers can inspect them.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
	failures: Mutex<Vec<(String, RecordingError)>>,
}

impl CollectingDiagnostics {
	pub fn failures(&self) -> Vec<(String, RecordingError)> {
		self.failures
			.lock()
			.map(|failures| failures.clone())
			.unwrap_or_default()
	}
}

impl DiagnosticSink for CollectingDiagnostics {
	fn recording_failed(&self, resource: &str, error: &RecordingError) {
		if let Ok(mut failures) = self.failures.lock() {
			failures.push((resource.to_string(), error.clone()));
		}
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;

	#[test]
	fn test_active_recorder_adds_annotation() {
		let mut object = json!({
			"kind": "Service",
			"metadata": {"name": "frontend", "annotations": {"owner": "web"}}
		});
		ActiveRecorder::new("kubectl-hello hello-kubernetes -f svc.yaml --record")
			.record(&mut object)
			.unwrap();
		assert_eq!(
			object["metadata"]["annotations"][CHANGE_CAUSE_ANNOTATION],
			"kubectl-hello hello-kubernetes -f svc.yaml --record"
		);
		assert_eq!(object["metadata"]["annotations"]["owner"], "web");
	}

	#[test]
	fn test_active_recorder_creates_missing_maps() {
		let mut object = json!({"kind": "Pod"});
		ActiveRecorder::new("cmd").record(&mut object).unwrap();
		assert_eq!(object["metadata"]["annotations"][CHANGE_CAUSE_ANNOTATION], "cmd");
	}

	#[test]
	fn test_active_recorder_rejects_bad_shapes() {
		let recorder = ActiveRecorder::new("cmd");
		assert_eq!(
			recorder.record(&mut json!(["not", "an", "object"])),
			Err(RecordingError::NotAnObject)
		);
		assert_matches!(
			recorder.record(&mut json!({"metadata": {"annotations": "oops"}})),
			Err(RecordingError::InvalidField("metadata.annotations"))
		);
	}

	#[test]
	fn test_noop_recorder_leaves_object_alone() {
		let mut object = json!({"kind": "Pod", "metadata": {"name": "web"}});
		let before = object.clone();
		NoopRecorder.record(&mut object).unwrap();
		assert_eq!(object, before);
	}

	#[test]
	fn test_collecting_sink() {
		let sink = CollectingDiagnostics::default();
		sink.recording_failed("Pod/web", &RecordingError::NotAnObject);
		assert_eq!(
			sink.failures(),
			vec![("Pod/web".to_string(), RecordingError::NotAnObject)]
		);
	}
}
