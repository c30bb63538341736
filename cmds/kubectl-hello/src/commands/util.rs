//! Utilities for command handlers.

use std::io::{self, ErrorKind, Write};

use tracing::warn;

/// Flags accepted for kubectl compatibility that change nothing here.
pub struct InertArgs<'a> {
	pub output: Option<&'a str>,
}

impl InertArgs<'_> {
	/// Log a warning for each inert flag that was set.
	pub fn warn_if_set(&self) {
		if let Some(format) = self.output {
			warn!(
				output = format,
				"--output has no effect; resources are always printed as a greeting line"
			);
		}
	}
}

/// A writer that treats a closed pipe as success.
///
/// Lets `kubectl-hello hello-kubernetes rc | head -1` exit cleanly once the
/// reader goes away.
pub struct BrokenPipeGuard<W> {
	inner: W,
}

impl<W> BrokenPipeGuard<W> {
	pub fn new(inner: W) -> Self {
		Self { inner }
	}
}

impl<W: Write> Write for BrokenPipeGuard<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		match self.inner.write(buf) {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(buf.len()),
			other => other,
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		match self.inner.flush() {
			Err(e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
			other => other,
		}
	}
}
