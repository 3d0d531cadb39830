//! Strategies for locating marked classes and their boundaries.
//!
//! The built-in [`PatternEngine`] implements detection with text patterns
//! and brace counting. A project may configure an external executable under
//! `[engine] command` which is preferred when it answers a `--version`
//! probe. The command receives the current file buffer on stdin, so it
//! always sees in-memory edits that have not been written yet:
//!
//! ```text
//! <command> detect <file> <keyword>      -> {"class_name":..,"marker_line":..,"class_line":..} | null
//! <command> boundaries <file> <class>    -> {"start":..,"end":..} | null
//! ```
//!
//! Any failed invocation falls back to the pattern engine for that call.
//! Replies naming lines outside the file are treated as `null`.

use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::process::Stdio;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::warn;

use crate::AnnotateError;
use crate::AnnotateResult;
use crate::ClassBoundary;
use crate::Marker;
use crate::MarkerMatch;
use crate::Settings;
use crate::SourceFile;
use crate::boundary::find_boundaries;
use crate::detect::detect;

/// Finds marked classes and the line range of a class definition.
pub trait MarkerEngine: Send + Sync {
	/// Short name used in logs.
	fn name(&self) -> &str;

	/// The first active `marker` in `file` that annotates a class.
	fn detect(&self, file: &SourceFile, marker: &Marker) -> Option<MarkerMatch>;

	/// The boundaries of `class_name` in the current state of `file`.
	fn boundaries(&self, file: &SourceFile, class_name: &str) -> Option<ClassBoundary>;
}

/// Text-pattern implementation backed by [`detect`] and [`find_boundaries`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternEngine;

impl MarkerEngine for PatternEngine {
	fn name(&self) -> &str {
		"pattern"
	}

	fn detect(&self, file: &SourceFile, marker: &Marker) -> Option<MarkerMatch> {
		detect(file, marker)
	}

	fn boundaries(&self, file: &SourceFile, class_name: &str) -> Option<ClassBoundary> {
		find_boundaries(file, class_name)
	}
}

/// An external executable speaking the JSON protocol described in the
/// module documentation.
#[derive(Debug, Clone)]
pub struct CommandEngine {
	command: String,
	fallback: PatternEngine,
}

#[derive(Deserialize)]
struct BoundaryReply {
	start: usize,
	end: usize,
}

#[derive(Deserialize)]
struct DetectReply {
	class_name: String,
	marker_line: usize,
	class_line: usize,
}

impl CommandEngine {
	pub fn new(command: impl Into<String>) -> Self {
		Self {
			command: command.into(),
			fallback: PatternEngine,
		}
	}

	/// Run `<command> --version` and return the reported version.
	pub fn probe(&self) -> AnnotateResult<String> {
		let output = self.invoke(&["--version"], None)?;
		Ok(output.trim().to_string())
	}

	fn query<T: DeserializeOwned>(&self, args: &[&str], file: &SourceFile) -> AnnotateResult<Option<T>> {
		let stdout = self.invoke(args, Some(&file.render()))?;
		serde_json::from_str(stdout.trim()).map_err(|e| {
			AnnotateError::Engine {
				reason: format!("invalid reply to `{}`: {e}", args.join(" ")),
			}
		})
	}

	fn invoke(&self, args: &[&str], stdin: Option<&str>) -> AnnotateResult<String> {
		let mut command = shell_command(&self.command, args);
		command
			.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
			.stdout(Stdio::piped())
			.stderr(Stdio::piped());

		let mut child = command.spawn().map_err(|e| {
			AnnotateError::Engine {
				reason: format!("could not start `{}`: {e}", self.command),
			}
		})?;

		if let (Some(content), Some(mut pipe)) = (stdin, child.stdin.take()) {
			pipe.write_all(content.as_bytes())?;
		}

		let output = child.wait_with_output()?;
		if !output.status.success() {
			let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
			let reason = if stderr.is_empty() {
				format!(
					"`{}` exited with status {}",
					self.command,
					output
						.status
						.code()
						.map_or_else(|| "unknown".to_string(), |code| code.to_string())
				)
			} else {
				stderr
			};

			return Err(AnnotateError::Engine { reason });
		}

		Ok(String::from_utf8_lossy(&output.stdout).to_string())
	}
}

impl MarkerEngine for CommandEngine {
	fn name(&self) -> &str {
		&self.command
	}

	fn detect(&self, file: &SourceFile, marker: &Marker) -> Option<MarkerMatch> {
		let path = path_arg(file.path());
		match self.query::<DetectReply>(&["detect", &path, marker.keyword()], file) {
			Ok(reply) => {
				reply
					.filter(|reply| {
						reply.marker_line >= 1 && reply.marker_line < reply.class_line && reply.class_line <= file.len()
					})
					.map(|reply| {
						MarkerMatch {
							class_name: reply.class_name,
							marker_line: reply.marker_line,
							class_line: reply.class_line,
						}
					})
			}
			Err(error) => {
				warn!("{error}; falling back to the pattern engine");
				self.fallback.detect(file, marker)
			}
		}
	}

	fn boundaries(&self, file: &SourceFile, class_name: &str) -> Option<ClassBoundary> {
		let path = path_arg(file.path());
		match self.query::<BoundaryReply>(&["boundaries", &path, class_name], file) {
			Ok(reply) => {
				reply
					.filter(|reply| reply.start >= 1 && reply.start <= reply.end && reply.end <= file.len())
					.map(|reply| ClassBoundary { start: reply.start, end: reply.end })
			}
			Err(error) => {
				warn!("{error}; falling back to the pattern engine");
				self.fallback.boundaries(file, class_name)
			}
		}
	}
}

/// Pick the engine for this run. A configured command is used only when
/// it answers the `--version` probe.
pub fn select_engine(settings: &Settings) -> Box<dyn MarkerEngine> {
	let Some(command) = settings.engine_command.as_deref() else {
		return Box::new(PatternEngine);
	};

	let engine = CommandEngine::new(command);
	match engine.probe() {
		Ok(version) => {
			debug!(engine = command, version = %version, "using external marker engine");
			Box::new(engine)
		}
		Err(error) => {
			warn!("marker engine `{command}` is unavailable ({error}); using the pattern engine");
			Box::new(PatternEngine)
		}
	}
}

fn path_arg(path: &Path) -> String {
	path.display().to_string()
}

/// Run `command` through the platform shell with `args` passed as separate
/// arguments.
fn shell_command(command: &str, args: &[&str]) -> Command {
	if cfg!(windows) {
		let mut cmd = Command::new("cmd");
		cmd.arg("/C").arg(command).args(args);
		cmd
	} else {
		let mut cmd = Command::new("sh");
		cmd.arg("-c")
			.arg(format!("{command} \"$@\""))
			.arg("annotate-engine")
			.args(args);
		cmd
	}
}
