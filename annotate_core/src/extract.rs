use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::ClassBoundary;
use crate::Marker;
use crate::SourceFile;
use crate::ValidationMarkerRegistry;
use crate::scanner::LineKind;
use crate::scanner::classify_lines;
use crate::scanner::count_braces;

/// Number of lines after an identifier marker searched for its field.
pub const FIELD_LOOKAHEAD: usize = 15;

/// Tag recorded on fields carrying the identifier marker.
pub const ID_TAG: &str = "Id";

const VISIBILITY_KEYWORDS: &[&str] = &[
	"public",
	"private",
	"protected",
	"Public",
	"Private",
	"Protected",
];

/// Lines that end a lookahead when they appear alone.
const STRUCTURAL_LINES: &[&str] = &[
	"Dto",
	"Serializable",
	"_Entity",
	"COMPONENT",
	"SCOPE",
	"VALIDATE",
];

const STRUCTURAL_MARKERS: &[&str] = &["Entity", "Serializable"];

/// Declarations at class scope that are never data members.
const NON_FIELD_PREFIXES: &[&str] = &[
	"static ",
	"Static ",
	"using ",
	"typedef ",
	"friend ",
	"return ",
];

static FIELD_DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"^\s*(?:(?:Public|Private|Protected|public|private|protected)\s+)?(?:const\s+)?([A-Za-z_][A-Za-z0-9_<>*&:,\s]*?)\s+([A-Za-z_][A-Za-z0-9_]*)\s*[;=]",
	)
	.expect("field declaration pattern is valid")
});

static ACCESS_SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(?i)^(?:public|private|protected)\s*:").expect("access specifier pattern is valid")
});

/// One data member of a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldModel {
	/// Declared type with `const` and visibility stripped.
	#[serde(rename = "type")]
	pub ty: String,
	pub name: String,
	/// Marker keywords attached to the field, in source order.
	pub tags: Vec<String>,
	/// 1-indexed line of the declaration.
	pub line: usize,
}

impl FieldModel {
	pub fn new(ty: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			ty: ty.into(),
			name: name.into(),
			tags: Vec::new(),
			line: 0,
		}
	}

	#[must_use]
	pub fn with_tags<I, S>(mut self, tags: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tags.extend(tags.into_iter().map(Into::into));
		self
	}

	pub fn has_tag(&self, tag: &str) -> bool {
		self.tags.iter().any(|t| t == tag)
	}

	pub fn is_id(&self) -> bool {
		self.has_tag(ID_TAG)
	}
}

/// The identifier shape of a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey<'a> {
	None,
	Single(&'a FieldModel),
	/// More than one identifier field. Code generation does not support
	/// these; callers report a diagnostic and skip the class.
	Composite(Vec<&'a FieldModel>),
}

impl<'a> PrimaryKey<'a> {
	pub fn from_fields<I>(fields: I) -> Self
	where
		I: IntoIterator<Item = &'a FieldModel>,
	{
		let mut fields: Vec<_> = fields.into_iter().collect();
		match fields.len() {
			0 => Self::None,
			1 => Self::Single(fields.remove(0)),
			_ => Self::Composite(fields),
		}
	}
}

/// The fields of one class, built fresh for every pass over a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassModel {
	pub name: String,
	pub fields: Vec<FieldModel>,
	pub has_marker: bool,
}

impl ClassModel {
	pub fn new(name: impl Into<String>, fields: Vec<FieldModel>, has_marker: bool) -> Self {
		Self {
			name: name.into(),
			fields,
			has_marker,
		}
	}

	pub fn id_fields(&self) -> impl Iterator<Item = &FieldModel> {
		self.fields.iter().filter(|field| field.is_id())
	}

	pub fn primary_key(&self) -> PrimaryKey<'_> {
		PrimaryKey::from_fields(self.id_fields())
	}

	/// Validation tags mapped to the fields carrying them.
	pub fn validation_fields_by_tag(&self) -> BTreeMap<String, Vec<&FieldModel>> {
		validation_fields_by_tag(&self.fields)
	}
}

/// Group `fields` by their validation tags. The identifier tag is not a
/// validation tag and is left out. Fields keep declaration order within
/// each tag.
pub fn validation_fields_by_tag(fields: &[FieldModel]) -> BTreeMap<String, Vec<&FieldModel>> {
	let mut grouped: BTreeMap<String, Vec<&FieldModel>> = BTreeMap::new();
	for field in fields {
		for tag in field.tags.iter().filter(|tag| tag.as_str() != ID_TAG) {
			grouped.entry(tag.clone()).or_default().push(field);
		}
	}
	grouped
}

/// Match `line` as a data member declaration, returning `(type, name)`.
///
/// Lines with parentheses are treated as methods and rejected, as are
/// declarations whose name is a visibility keyword.
pub fn parse_field_declaration(line: &str) -> Option<(String, String)> {
	let captures = FIELD_DECLARATION.captures(line)?;
	let ty = captures[1].trim();
	let name = &captures[2];

	if line.contains('(') || line.contains(')') || VISIBILITY_KEYWORDS.contains(&name) {
		return None;
	}

	Some((ty.to_string(), name.to_string()))
}

/// `public:`, `Private:` and other access specifier lines in any case.
pub fn is_access_specifier(line: &str) -> bool {
	ACCESS_SPECIFIER.is_match(line.trim())
}

fn is_structural(line: &str) -> bool {
	let trimmed = line.trim();
	STRUCTURAL_LINES.contains(&trimmed)
		|| STRUCTURAL_MARKERS
			.iter()
			.any(|keyword| Marker::new(keyword).is_active(trimmed))
}

/// Collect the fields that follow an active `primary` marker inside the
/// class.
///
/// After each marker up to [`FIELD_LOOKAHEAD`] lines are examined. Blank and
/// comment lines are skipped, validation markers from `registry` are
/// gathered as tags, and the first declaration closes the lookahead. A
/// second `primary` marker, an access specifier or a structural marker ends
/// the lookahead without a field; the second marker is then handled on its
/// own.
pub fn extract_tagged_fields(
	file: &SourceFile,
	boundary: ClassBoundary,
	primary: &Marker,
	registry: &ValidationMarkerRegistry,
) -> Vec<FieldModel> {
	let kinds = classify_lines(file.as_slice());
	let mut fields = Vec::new();

	for number in boundary.body() {
		let index = number - 1;
		if !primary.is_active(&file[index]) {
			continue;
		}

		let mut tags = Vec::new();
		let last = (number + FIELD_LOOKAHEAD).min(boundary.end - 1);

		for candidate in (number + 1)..=last {
			let line = &file[candidate - 1];
			let kind = kinds[candidate - 1];

			if kind == LineKind::Blank || primary.is_processed(line) {
				continue;
			}

			if primary.is_active(line) {
				debug!(line = number, "identifier marker followed by another marker before a field");
				break;
			}

			if let Some(tag) = registry.tag_on(line) {
				tags.push(tag.to_string());
				continue;
			}

			if is_access_specifier(line) || is_structural(line) {
				break;
			}

			if kind.is_comment() {
				continue;
			}

			if FIELD_DECLARATION.is_match(line) {
				if let Some((ty, name)) = parse_field_declaration(line) {
					debug!(field = %name, ty = %ty, line = candidate, "extracted tagged field");
					fields.push(FieldModel {
						ty,
						name,
						tags,
						line: candidate,
					});
				}
				break;
			}
		}
	}

	fields
}

/// Collect every data member declared directly in the class body.
///
/// Members of nested types and statements inside inline method bodies are
/// skipped. Validation markers and the identifier marker (active or
/// processed) on the lines just before a declaration become its tags.
pub fn extract_all_fields(
	file: &SourceFile,
	boundary: ClassBoundary,
	registry: &ValidationMarkerRegistry,
) -> Vec<FieldModel> {
	let kinds = classify_lines(file.as_slice());
	let id_marker = Marker::new(ID_TAG);
	let mut fields = Vec::new();
	let mut pending: Vec<String> = Vec::new();
	let mut depth: isize = 0;

	for number in boundary.start..=boundary.end {
		let line = &file[number - 1];
		let kind = kinds[number - 1];
		let in_body = depth == 1 && number != boundary.start;

		match kind {
			LineKind::Blank => continue,
			LineKind::LineComment | LineKind::BlockComment => {
				if in_body {
					if id_marker.classify(line).is_some() {
						pending.push(ID_TAG.to_string());
					} else if let Some(tag) = registry.tag_on(line) {
						pending.push(tag.to_string());
					}
				}
				continue;
			}
			LineKind::Code => {}
		}

		if in_body {
			let trimmed = line.trim_start();
			let skipped = NON_FIELD_PREFIXES
				.iter()
				.any(|prefix| trimmed.starts_with(prefix));

			if !skipped {
				if let Some((ty, name)) = parse_field_declaration(line) {
					fields.push(FieldModel {
						ty,
						name,
						tags: std::mem::take(&mut pending),
						line: number,
					});
				}
			}
			pending.clear();
		}

		let (opens, closes) = count_braces(line);
		depth += opens as isize - closes as isize;
	}

	fields
}
