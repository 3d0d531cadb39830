use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::SourceFile;
use crate::scanner::LineKind;
use crate::scanner::classify_lines;
use crate::scanner::count_braces;

static CLASS_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\bclass\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:final\b\s*)?(?::|\{|$)")
		.expect("class declaration pattern is valid")
});

/// The inclusive, 1-indexed line range of a class definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassBoundary {
	/// Line holding the `class <Name>` declaration.
	pub start: usize,
	/// Line holding the brace that closes the class.
	pub end: usize,
}

impl ClassBoundary {
	pub fn contains(&self, line: usize) -> bool {
		(self.start..=self.end).contains(&line)
	}

	/// Lines strictly between the declaration and the closing brace.
	pub fn body(&self) -> std::ops::Range<usize> {
		(self.start + 1)..self.end
	}
}

/// Return the class name declared on `line`, if any.
///
/// Matches `class Name`, optionally followed by `final`, and then `:`, `{`
/// or the end of the line (brace on the next line). Forward declarations
/// (`class Name;`) do not match.
pub fn parse_class_declaration(line: &str) -> Option<&str> {
	CLASS_DECLARATION
		.captures(line)
		.and_then(|captures| captures.get(1))
		.map(|name| name.as_str())
}

/// Locate the definition of `class_name` by brace-depth tracking.
///
/// Comment lines are skipped entirely. Depth is seeded from the declaration
/// line and the class ends on the first line where depth returns to zero
/// after at least one `{` has been seen. Returns `None` when the class is
/// never declared or its braces never balance.
pub fn find_boundaries(file: &SourceFile, class_name: &str) -> Option<ClassBoundary> {
	let kinds = classify_lines(file.as_slice());
	let mut start = None;
	let mut depth: isize = 0;
	let mut opened = false;

	for (index, line) in file.iter().enumerate() {
		if kinds[index] != LineKind::Code {
			continue;
		}

		let number = index + 1;
		if start.is_none() {
			if parse_class_declaration(line.trim()) != Some(class_name) {
				continue;
			}
			start = Some(number);
		}

		let (opens, closes) = count_braces(line);
		opened |= opens > 0;
		depth += opens as isize - closes as isize;

		if opened && depth <= 0 {
			return start.map(|start| ClassBoundary { start, end: number });
		}
	}

	None
}
