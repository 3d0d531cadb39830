use serde::Serialize;

use crate::Marker;
use crate::SourceFile;
use crate::boundary::parse_class_declaration;
use crate::scanner::LineKind;
use crate::scanner::classify_lines;

/// Number of lines after a class marker searched for the class declaration.
pub const CLASS_LOOKAHEAD: usize = 10;

/// A class marker together with the class it annotates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerMatch {
	pub class_name: String,
	/// 1-indexed line of the active marker.
	pub marker_line: usize,
	/// 1-indexed line of the class declaration.
	pub class_line: usize,
}

/// Find the first active `marker` in the file that is followed, within
/// [`CLASS_LOOKAHEAD`] lines, by a class declaration.
///
/// Processed markers are invisible here. Comment lines between the marker
/// and the declaration are skipped; other code lines (macros such as
/// `DefineStandardPointers(X)`) are tolerated. A marker with no class in
/// range is ignored and the scan continues with the next marker.
pub fn detect(file: &SourceFile, marker: &Marker) -> Option<MarkerMatch> {
	let kinds = classify_lines(file.as_slice());

	for (index, line) in file.iter().enumerate() {
		if kinds[index] != LineKind::LineComment || !marker.is_active(line) {
			continue;
		}

		let last = (index + CLASS_LOOKAHEAD).min(file.len() - 1);
		for candidate in (index + 1)..=last {
			if kinds[candidate] != LineKind::Code {
				continue;
			}

			if let Some(class_name) = parse_class_declaration(file[candidate].trim()) {
				return Some(MarkerMatch {
					class_name: class_name.to_string(),
					marker_line: index + 1,
					class_line: candidate + 1,
				});
			}
		}
	}

	None
}

/// Every active `marker` line in the file, 1-indexed.
pub fn active_marker_lines(file: &SourceFile, marker: &Marker) -> Vec<usize> {
	let kinds = classify_lines(file.as_slice());
	file.iter()
		.enumerate()
		.filter(|(index, line)| kinds[*index] == LineKind::LineComment && marker.is_active(line))
		.map(|(index, _)| index + 1)
		.collect()
}
