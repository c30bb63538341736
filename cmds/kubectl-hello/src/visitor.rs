//! Walks a resolution outcome and writes one greeting per resource.

use std::io::Write;

use tracing::{trace, warn};

use crate::{
	error::HelloError,
	record::{DiagnosticSink, Recorder},
	resolve::ResolutionOutcome,
	template::Renderer,
};

/// Records, renders and writes resolved resources in order.
pub struct Emitter<'a> {
	renderer: &'a Renderer,
	recorder: &'a dyn Recorder,
	diagnostics: &'a dyn DiagnosticSink,
}

impl<'a> Emitter<'a> {
	pub fn new(
		renderer: &'a Renderer,
		recorder: &'a dyn Recorder,
		diagnostics: &'a dyn DiagnosticSink,
	) -> Self {
		Self {
			renderer,
			recorder,
			diagnostics,
		}
	}

	/// Emit every resolved resource and return how many lines were written.
	///
	/// Each line is written as soon as it is rendered. Resolution failures are
	/// skipped and reported together once the outcome is exhausted; an
	/// outcome with nothing to print is an error of its own.
	pub fn emit<W: Write>(
		&self,
		outcome: ResolutionOutcome,
		writer: &mut W,
	) -> Result<usize, HelloError> {
		let mut emitted = 0;
		let mut errors = Vec::new();

		for item in outcome {
			let mut resource = match item {
				Ok(resource) => resource,
				Err(e) => {
					warn!(error = %e, "skipping resource");
					errors.push(e);
					continue;
				}
			};

			if let Err(e) = self.recorder.record(&mut resource.object) {
				self.diagnostics
					.recording_failed(&resource.reference(), &e);
			}

			let line = self.renderer.render(&resource)?;
			writer.write_all(line.as_bytes())?;
			trace!(resource = %resource.reference(), source = %resource.source, "emitted");
			emitted += 1;
		}
		writer.flush()?;

		if emitted == 0 {
			return Err(HelloError::EmptyResult {
				failures: errors.len(),
			});
		}
		if !errors.is_empty() {
			return Err(HelloError::Aggregate { errors, emitted });
		}
		Ok(emitted)
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;
	use crate::{
		error::{RecordingError, ResolutionError, ResolutionErrorKind},
		record::{CollectingDiagnostics, NoopRecorder},
		resource::ResolvedResource,
		template::RenderTemplate,
	};

	/// Fails on every object, to exercise the diagnostic path.
	struct FailingRecorder;

	impl Recorder for FailingRecorder {
		fn record(&self, _object: &mut serde_json::Value) -> Result<(), RecordingError> {
			Err(RecordingError::NotAnObject)
		}
	}

	fn record(kind: &str, name: &str) -> Result<ResolvedResource, ResolutionError> {
		Ok(ResolvedResource::from_manifest(
			json!({"kind": kind, "metadata": {"name": name}}),
			"test.yaml",
		)
		.unwrap())
	}

	fn failure(source: &str) -> Result<ResolvedResource, ResolutionError> {
		Err(ResolutionError::new(
			source,
			ResolutionErrorKind::MissingField("kind"),
		))
	}

	fn renderer() -> Renderer {
		Renderer::new(RenderTemplate::Specifier).unwrap()
	}

	#[test]
	fn test_lines_follow_resolution_order() {
		let renderer = renderer();
		let sink = CollectingDiagnostics::default();
		let emitter = Emitter::new(&renderer, &NoopRecorder, &sink);
		let mut out = Vec::new();

		let count = emitter
			.emit(
				vec![
					record("ReplicationController", "redis-master"),
					record("Service", "frontend"),
				],
				&mut out,
			)
			.unwrap();

		assert_eq!(count, 2);
		assert_eq!(
			String::from_utf8(out).unwrap(),
			"Hello redis-master ReplicationController\nHello frontend Service\n"
		);
	}

	#[test]
	fn test_recording_failure_does_not_stop_emission() {
		let renderer = renderer();
		let sink = CollectingDiagnostics::default();
		let emitter = Emitter::new(&renderer, &FailingRecorder, &sink);
		let mut out = Vec::new();

		emitter
			.emit(vec![record("Service", "frontend")], &mut out)
			.unwrap();

		assert_eq!(String::from_utf8(out).unwrap(), "Hello frontend Service\n");
		assert_eq!(
			sink.failures(),
			vec![("Service/frontend".to_string(), RecordingError::NotAnObject)]
		);
	}

	#[test]
	fn test_empty_outcome() {
		let renderer = renderer();
		let diagnostics = CollectingDiagnostics::default();
		let emitter = Emitter::new(&renderer, &NoopRecorder, &diagnostics);
		let mut out = Vec::new();

		assert_matches!(
			emitter.emit(vec![], &mut out),
			Err(HelloError::EmptyResult { failures: 0 })
		);
		assert!(out.is_empty());
	}

	#[test]
	fn test_only_failures_is_empty_result() {
		let renderer = renderer();
		let diagnostics = CollectingDiagnostics::default();
		let emitter = Emitter::new(&renderer, &NoopRecorder, &diagnostics);
		let mut out = Vec::new();

		assert_matches!(
			emitter.emit(vec![failure("a.yaml"), failure("b.yaml")], &mut out),
			Err(HelloError::EmptyResult { failures: 2 })
		);
		assert!(out.is_empty());
	}

	#[test]
	fn test_partial_failure_still_prints_successes() {
		let renderer = renderer();
		let diagnostics = CollectingDiagnostics::default();
		let emitter = Emitter::new(&renderer, &NoopRecorder, &diagnostics);
		let mut out = Vec::new();

		let result = emitter.emit(
			vec![record("Service", "frontend"), failure("bad.yaml")],
			&mut out,
		);

		assert_matches!(
			result,
			Err(HelloError::Aggregate { ref errors, emitted: 1 }) if errors[0].source_ref == "bad.yaml"
		);
		assert_eq!(String::from_utf8(out).unwrap(), "Hello frontend Service\n");
	}
}
