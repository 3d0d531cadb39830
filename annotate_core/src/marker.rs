//! Marker comments and their two spellings.
//!
//! | dialect      | active       | processed       |
//! |--------------|--------------|-----------------|
//! | doc comment  | `/// @Id`    | `/* @Id */`     |
//! | line comment | `//@Id`      | `/*@Id*/`       |
//!
//! The doc-comment dialect tolerates any whitespace between `///` and `@`,
//! and may carry trailing text which is kept when the marker is processed.
//! Processed spellings are block comments and can never satisfy an active
//! pattern, which is what makes a second run a no-op.

/// The comment style a marker is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerDialect {
	DocComment,
	LineComment,
}

/// Whether a marker still has to be acted upon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerState {
	Active,
	Processed,
}

/// A marker keyword such as `Entity`, `Id` or `NotNull`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
	keyword: String,
}

impl Marker {
	/// Create a marker for `keyword`. A leading `@` is ignored.
	pub fn new(keyword: impl AsRef<str>) -> Self {
		let keyword = keyword.as_ref().trim().trim_start_matches('@');
		Self {
			keyword: keyword.to_string(),
		}
	}

	/// Create the marker matching a configured macro name: surrounding
	/// underscores are dropped, so `_Entity` becomes `Entity`.
	pub fn from_macro(macro_name: &str) -> Self {
		Self::new(normalize_keyword(macro_name))
	}

	pub fn keyword(&self) -> &str {
		&self.keyword
	}

	/// Classify `line` as this marker, returning its dialect and state.
	pub fn classify(&self, line: &str) -> Option<(MarkerDialect, MarkerState)> {
		let trimmed = line.trim();

		if let Some(rest) = trimmed.strip_prefix("///") {
			return self
				.keyword_tail(rest.trim_start())
				.map(|_| (MarkerDialect::DocComment, MarkerState::Active));
		}

		if let Some(rest) = trimmed.strip_prefix("//") {
			return (rest.strip_prefix('@') == Some(self.keyword.as_str()))
				.then_some((MarkerDialect::LineComment, MarkerState::Active));
		}

		let inner = trimmed.strip_prefix("/*")?.strip_suffix("*/")?;
		if inner.strip_prefix('@') == Some(self.keyword.as_str()) {
			return Some((MarkerDialect::LineComment, MarkerState::Processed));
		}

		self.keyword_tail(inner.trim())
			.map(|_| (MarkerDialect::DocComment, MarkerState::Processed))
	}

	pub fn is_active(&self, line: &str) -> bool {
		matches!(self.classify(line), Some((_, MarkerState::Active)))
	}

	pub fn is_processed(&self, line: &str) -> bool {
		matches!(self.classify(line), Some((_, MarkerState::Processed)))
	}

	/// The canonical active spelling for `dialect`.
	pub fn active_text(&self, dialect: MarkerDialect) -> String {
		match dialect {
			MarkerDialect::DocComment => format!("/// @{}", self.keyword),
			MarkerDialect::LineComment => format!("//@{}", self.keyword),
		}
	}

	/// The canonical processed spelling for `dialect`.
	pub fn processed_text(&self, dialect: MarkerDialect) -> String {
		match dialect {
			MarkerDialect::DocComment => format!("/* @{} */", self.keyword),
			MarkerDialect::LineComment => format!("/*@{}*/", self.keyword),
		}
	}

	/// Rewrite an active marker line into its processed form, keeping the
	/// leading indentation and any trailing text. Returns `None` when `line`
	/// is not an active marker.
	pub fn to_processed(&self, line: &str) -> Option<String> {
		let (dialect, state) = self.classify(line)?;
		if state != MarkerState::Active {
			return None;
		}

		let indent = leading_whitespace(line);
		let text = match dialect {
			MarkerDialect::LineComment => self.processed_text(dialect),
			MarkerDialect::DocComment => {
				let body = line.trim().trim_start_matches('/').trim().replace("*/", "* /");
				format!("/* {body} */")
			}
		};

		Some(format!("{indent}{text}"))
	}

	/// When `text` starts with `@keyword` followed by a non-identifier
	/// character (or nothing), return what follows.
	fn keyword_tail<'a>(&self, text: &'a str) -> Option<&'a str> {
		let tail = text.strip_prefix('@')?.strip_prefix(self.keyword.as_str())?;
		match tail.chars().next() {
			Some(c) if c.is_alphanumeric() || c == '_' => None,
			_ => Some(tail),
		}
	}
}

/// Normalise a configured macro name into a marker keyword.
pub fn normalize_keyword(macro_name: &str) -> String {
	macro_name
		.trim()
		.trim_start_matches('@')
		.trim_matches('_')
		.to_string()
}

/// The leading whitespace of `line`.
pub fn leading_whitespace(line: &str) -> &str {
	&line[..line.len() - line.trim_start().len()]
}
