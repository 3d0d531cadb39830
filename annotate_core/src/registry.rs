use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;
use tracing::warn;

use crate::Marker;
use crate::SourceFile;

/// Validation keywords every project understands without declaring them.
pub const BUILTIN_VALIDATION_MARKERS: &[&str] = &["NotNull", "NotEmpty", "NotBlank"];

/// Comment that flags the following `#define` as a validation marker in a
/// file whose name does not already say so.
pub const VALIDATION_MARKER_TAG: &str = "ValidationMarker";

static DEFINE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^\s*#\s*define\s+([A-Za-z_][A-Za-z0-9_]*)(\([^)]*\))?")
		.expect("define pattern is valid")
});

/// Where a validation marker macro is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerDefinition {
	pub file: PathBuf,
	/// 1-indexed line of the `#define`.
	pub line: usize,
	/// The trimmed definition line.
	pub definition: String,
}

/// Validation marker keywords known to this run, mapped to the macro that
/// defines them when one was found.
///
/// Built once per run and never mutated afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationMarkerRegistry {
	markers: BTreeMap<String, Option<MarkerDefinition>>,
}

impl ValidationMarkerRegistry {
	/// A registry holding only [`BUILTIN_VALIDATION_MARKERS`].
	pub fn builtin() -> Self {
		Self::default().with_keywords(BUILTIN_VALIDATION_MARKERS.iter().copied())
	}

	/// Add keywords without a known definition. Keywords already present
	/// keep their metadata.
	#[must_use]
	pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		for keyword in keywords {
			let keyword = Marker::new(keyword).keyword().to_string();
			if !keyword.is_empty() {
				self.markers.entry(keyword).or_insert(None);
			}
		}
		self
	}

	/// Build the registry from the built-in keywords, the validation macros
	/// defined in `files` and the `extra` configured keywords. Unreadable
	/// files are logged and skipped.
	pub fn discover<I, S>(files: &[PathBuf], max_file_size: u64, extra: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut registry = Self::builtin();

		for path in files {
			match SourceFile::read(path, max_file_size) {
				Ok(file) => {
					for (keyword, definition) in scan_definitions(&file) {
						debug!(keyword = %keyword, file = %path.display(), line = definition.line, "found validation marker");
						registry.markers.insert(keyword, Some(definition));
					}
				}
				Err(error) => warn!("skipping `{}` during marker discovery: {error}", path.display()),
			}
		}

		registry.with_keywords(extra)
	}

	pub fn contains(&self, keyword: &str) -> bool {
		self.markers.contains_key(keyword)
	}

	pub fn definition(&self, keyword: &str) -> Option<&MarkerDefinition> {
		self.markers.get(keyword).and_then(Option::as_ref)
	}

	/// Keywords in sorted order.
	pub fn keywords(&self) -> impl Iterator<Item = &str> {
		self.markers.keys().map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.markers.len()
	}

	pub fn is_empty(&self) -> bool {
		self.markers.is_empty()
	}

	/// The validation keyword written on `line` in any dialect or state.
	pub fn tag_on(&self, line: &str) -> Option<&str> {
		self.keywords()
			.find(|keyword| Marker::new(keyword).classify(line).is_some())
	}
}

/// Collect the validation macro definitions of one file.
///
/// Every `#define` counts when the file name mentions validation; in other
/// files only a definition directly preceded by a `/// @ValidationMarker`
/// comment counts. Include guards and other all-caps macros are ignored.
pub fn scan_definitions(file: &SourceFile) -> Vec<(String, MarkerDefinition)> {
	let whole_file = is_validation_file(file.path());
	let tag = Marker::new(VALIDATION_MARKER_TAG);
	let mut flagged = false;
	let mut found = Vec::new();

	for (index, line) in file.iter().enumerate() {
		if tag.classify(line).is_some() {
			flagged = true;
			continue;
		}

		if line.trim().is_empty() {
			continue;
		}

		if let Some(captures) = DEFINE.captures(line) {
			let name = &captures[1];
			if (whole_file || flagged) && name.chars().any(|c| c.is_ascii_lowercase()) {
				found.push((
					name.to_string(),
					MarkerDefinition {
						file: file.path().to_path_buf(),
						line: index + 1,
						definition: line.trim().to_string(),
					},
				));
			}
		}

		flagged = false;
	}

	found
}

fn is_validation_file(path: &Path) -> bool {
	path.file_name()
		.map(|name| name.to_string_lossy().to_lowercase().contains("validat"))
		.unwrap_or(false)
}
