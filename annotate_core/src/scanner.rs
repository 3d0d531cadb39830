//! Line-oriented comment classification.
//!
//! Classification is based on the *prefix* of each trimmed line. A comment
//! that starts after code on the same line (`int x; // note`) does not make
//! the line a comment line, so a marker written in that position is never
//! recognised. Brace counting is the one place where trailing comments and
//! string/char literals are removed, because a stray brace inside them would
//! corrupt class boundaries.

/// How a physical line is classified by [`LineScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
	/// Empty or whitespace only.
	Blank,
	/// Anything that is not a comment line.
	Code,
	/// Trimmed content starts with `//`.
	LineComment,
	/// Trimmed content starts with `/*` or `*`, or the line sits inside a
	/// block comment opened on an earlier line.
	BlockComment,
}

impl LineKind {
	pub fn is_comment(self) -> bool {
		matches!(self, Self::LineComment | Self::BlockComment)
	}
}

/// Classifies lines one at a time, remembering whether a block comment
/// opened on an earlier line is still open.
#[derive(Debug, Default)]
pub struct LineScanner {
	in_block: bool,
}

impl LineScanner {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn classify(&mut self, line: &str) -> LineKind {
		let trimmed = line.trim();

		if self.in_block {
			if trimmed.contains("*/") {
				self.in_block = false;
			}
			return LineKind::BlockComment;
		}

		if trimmed.is_empty() {
			return LineKind::Blank;
		}

		if trimmed.starts_with("//") {
			return LineKind::LineComment;
		}

		if let Some(rest) = trimmed.strip_prefix("/*") {
			if !rest.contains("*/") {
				self.in_block = true;
			}
			return LineKind::BlockComment;
		}

		if trimmed.starts_with('*') {
			return LineKind::BlockComment;
		}

		LineKind::Code
	}
}

/// Classify every line of `lines` in order.
pub fn classify_lines<S: AsRef<str>>(lines: &[S]) -> Vec<LineKind> {
	let mut scanner = LineScanner::new();
	lines
		.iter()
		.map(|line| scanner.classify(line.as_ref()))
		.collect()
}

/// A line is significant when it is neither blank nor starts with a comment
/// token.
pub fn is_significant(line: &str) -> bool {
	let trimmed = line.trim();
	!(trimmed.is_empty()
		|| trimmed.starts_with("//")
		|| trimmed.starts_with("/*")
		|| trimmed.starts_with('*'))
}

/// Remove `//` and `/* */` comments from `text`, keeping string and char
/// literals intact. Newlines inside removed comments are preserved so line
/// numbers stay valid.
pub fn strip_comments(text: &str) -> String {
	scrub(text, true)
}

/// Count the `{` and `}` characters on a line that sit outside comments and
/// string/char literals.
pub fn count_braces(line: &str) -> (usize, usize) {
	let code = scrub(line, false);
	let opens = code.chars().filter(|&c| c == '{').count();
	let closes = code.chars().filter(|&c| c == '}').count();
	(opens, closes)
}

/// Net change in brace depth contributed by a line.
pub fn brace_delta(line: &str) -> isize {
	let (opens, closes) = count_braces(line);
	opens as isize - closes as isize
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
	Code,
	LineComment,
	BlockComment,
	Literal(char),
}

fn scrub(text: &str, keep_literals: bool) -> String {
	let mut out = String::with_capacity(text.len());
	let mut state = State::Code;
	let mut previous = '\0';
	let mut chars = text.chars().peekable();

	while let Some(c) = chars.next() {
		match state {
			State::Code => {
				match c {
					'/' if chars.peek() == Some(&'/') => {
						chars.next();
						state = State::LineComment;
					}
					'/' if chars.peek() == Some(&'*') => {
						chars.next();
						state = State::BlockComment;
					}
					// `1'000` digit separators are not char literals.
					'\'' if previous.is_ascii_alphanumeric() => out.push(c),
					'"' | '\'' => {
						out.push(c);
						state = State::Literal(c);
					}
					_ => out.push(c),
				}
			}
			State::LineComment => {
				if c == '\n' {
					out.push(c);
					state = State::Code;
				}
			}
			State::BlockComment => {
				if c == '*' && chars.peek() == Some(&'/') {
					chars.next();
					out.push(' ');
					state = State::Code;
				} else if c == '\n' {
					out.push(c);
				}
			}
			State::Literal(quote) => {
				if c == '\\' {
					if keep_literals {
						out.push(c);
					}
					if let Some(escaped) = chars.next() {
						if keep_literals {
							out.push(escaped);
						}
					}
				} else if c == quote || c == '\n' {
					out.push(c);
					state = State::Code;
				} else if keep_literals {
					out.push(c);
				}
			}
		}
		previous = c;
	}

	out
}
