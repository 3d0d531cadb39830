//! Idempotent edits to a [`SourceFile`].
//!
//! Each operation re-resolves what it needs from the current buffer and
//! reports through an outcome type whether it changed anything. Calling an
//! operation twice in a row leaves the buffer untouched the second time.

use std::ops::RangeInclusive;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;
use tracing::info;

use crate::GeneratedBlock;
use crate::Marker;
use crate::MarkerEngine;
use crate::SourceFile;
use crate::marker::leading_whitespace;
use crate::scanner::LineKind;
use crate::scanner::classify_lines;

static ENDIF: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\s*#endif\s*(?://.*|/\*.*\*/)?\s*$").expect("endif pattern is valid")
});

static INCLUDE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^\s*#\s*include\b").expect("include pattern is valid"));

static GUARD: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\s*#\s*(?:define\s+\w+\s*$|pragma\s+once\b)").expect("guard pattern is valid")
});

/// Result of [`inject`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectOutcome {
	/// The block was inserted; `at` is the 1-indexed line of the blank line
	/// that precedes it.
	Injected { at: usize },
	/// A sentinel of the block already exists inside the class.
	AlreadyPresent { sentinel: &'static str },
	ClassNotFound,
}

impl InjectOutcome {
	pub fn changed(&self) -> bool {
		matches!(self, Self::Injected { .. })
	}
}

/// Result of [`add_include`] and [`ensure_system_include`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeOutcome {
	Added { line: usize },
	AlreadyPresent,
}

impl IncludeOutcome {
	pub fn changed(&self) -> bool {
		matches!(self, Self::Added { .. })
	}
}

/// Result of [`mark_processed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
	Marked { line: usize },
	AlreadyProcessed { line: usize },
	NotFound,
}

impl MarkOutcome {
	pub fn changed(&self) -> bool {
		matches!(self, Self::Marked { .. })
	}
}

/// Insert `block` at the end of `class_name`'s body.
///
/// Refuses when any sentinel of the block is found between the class
/// declaration and its closing brace. The block lands after the last code
/// line of the body, preceded by a blank line, with the closing brace's
/// indentation prepended to every non-blank line.
pub fn inject(file: &mut SourceFile, engine: &dyn MarkerEngine, class_name: &str, block: &GeneratedBlock) -> InjectOutcome {
	let Some(boundary) = engine.boundaries(file, class_name) else {
		debug!(class = class_name, "class not found for injection");
		return InjectOutcome::ClassNotFound;
	};

	if boundary.start == boundary.end {
		debug!(class = class_name, "single-line class cannot receive members");
		return InjectOutcome::ClassNotFound;
	}

	for number in boundary.start..=boundary.end {
		let line = &file[number - 1];
		if let Some(sentinel) = block.sentinels().iter().find(|sentinel| line.contains(**sentinel)) {
			return InjectOutcome::AlreadyPresent { sentinel: *sentinel };
		}
	}

	let kinds = classify_lines(file.as_slice());
	let anchor = (boundary.start..boundary.end)
		.rev()
		.find(|number| kinds[number - 1] == LineKind::Code)
		.unwrap_or(boundary.start);

	let indent = leading_whitespace(&file[boundary.end - 1]).to_string();
	let lines = std::iter::once(String::new()).chain(block.iter().map(|line| {
		if line.trim().is_empty() {
			String::new()
		} else {
			format!("{indent}{line}")
		}
	}));

	let at = anchor + 1;
	file.insert_lines(at, lines.collect::<Vec<_>>());
	info!(class = class_name, line = at, "injected generated members");

	InjectOutcome::Injected { at }
}

/// Insert `#include "<include_path>"` before the last `#endif`, or append
/// it when the file has none. An existing include of the same path in
/// either quote style counts as present.
pub fn add_include(file: &mut SourceFile, include_path: &str) -> IncludeOutcome {
	if has_include(file, include_path) {
		debug!(include = include_path, "include already present");
		return IncludeOutcome::AlreadyPresent;
	}

	let statement = format!("#include \"{include_path}\"");
	let line = match file.iter().rposition(|line| ENDIF.is_match(line)) {
		Some(index) => {
			file.insert_lines(index + 1, [statement]);
			index + 1
		}
		None => {
			file.push_line(statement);
			file.len()
		}
	};

	IncludeOutcome::Added { line }
}

/// Make sure `#include <header>` is present near the top of the file: after
/// the last existing include, else after the include guard, else on the
/// first line.
pub fn ensure_system_include(file: &mut SourceFile, header: &str) -> IncludeOutcome {
	if has_include(file, header) {
		return IncludeOutcome::AlreadyPresent;
	}

	let line = file
		.iter()
		.rposition(|line| INCLUDE.is_match(line))
		.or_else(|| file.iter().position(|line| GUARD.is_match(line)))
		.map_or(1, |index| index + 2);

	file.insert_lines(line, [format!("#include <{header}>")]);
	IncludeOutcome::Added { line }
}

/// Whether `file` includes `path` with either quote style.
pub fn has_include(file: &SourceFile, path: &str) -> bool {
	let Ok(pattern) = Regex::new(&format!(r#"#include\s+["<]{}[">]"#, regex::escape(path))) else {
		return false;
	};
	file.iter().any(|line| pattern.is_match(line))
}

/// Rewrite the active `marker` nearest to the end of `lines` into its
/// processed spelling, keeping indentation.
///
/// `lines` is 1-indexed and clamped to the file. Callers pass the marker
/// line of a class, or the span from a class declaration down to the
/// member a field marker annotates.
pub fn mark_processed(file: &mut SourceFile, lines: RangeInclusive<usize>, marker: &Marker) -> MarkOutcome {
	let first = (*lines.start()).max(1);
	let last = (*lines.end()).min(file.len());
	let mut processed = None;

	for number in (first..=last).rev() {
		let line = &file[number - 1];
		if let Some(rewritten) = marker.to_processed(line) {
			file.replace_line(number, rewritten);
			debug!(marker = marker.keyword(), line = number, "marked processed");
			return MarkOutcome::Marked { line: number };
		}

		if processed.is_none() && marker.is_processed(line) {
			processed = Some(number);
		}
	}

	match processed {
		Some(line) => {
			debug!(marker = marker.keyword(), line, "marker already processed");
			MarkOutcome::AlreadyProcessed { line }
		}
		None => MarkOutcome::NotFound,
	}
}
