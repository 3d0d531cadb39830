use std::path::Path;
use std::path::PathBuf;

use derive_more::Deref;

use crate::AnnotateError;
use crate::AnnotateResult;

/// Line separator detected in a file and reused when it is written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
	#[default]
	Lf,
	CrLf,
}

impl LineEnding {
	fn detect(content: &str) -> Self {
		if content.contains("\r\n") {
			Self::CrLf
		} else {
			Self::Lf
		}
	}

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lf => "\n",
			Self::CrLf => "\r\n",
		}
	}
}

/// A source file held in memory as an ordered sequence of lines.
///
/// Line numbers are 1-indexed and always refer to the current state of the
/// buffer. The buffer can only be changed by replacing or inserting whole
/// lines; every scan re-reads the buffer so offsets are never carried
/// across an edit.
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct SourceFile {
	path: PathBuf,
	#[deref]
	lines: Vec<String>,
	line_ending: LineEnding,
	trailing_newline: bool,
}

impl SourceFile {
	/// Build a source file from text already in memory.
	pub fn parse(path: impl Into<PathBuf>, content: &str) -> Self {
		Self {
			path: path.into(),
			lines: content.lines().map(ToString::to_string).collect(),
			line_ending: LineEnding::detect(content),
			trailing_newline: content.ends_with('\n'),
		}
	}

	/// Read a file from disk. Files larger than `max_size` bytes are rejected.
	pub fn read(path: &Path, max_size: u64) -> AnnotateResult<Self> {
		let metadata = std::fs::metadata(path).map_err(|e| {
			AnnotateError::ReadFile {
				path: path.display().to_string(),
				reason: e.to_string(),
			}
		})?;

		if metadata.len() > max_size {
			return Err(AnnotateError::FileTooLarge {
				path: path.display().to_string(),
				size: metadata.len(),
				limit: max_size,
			});
		}

		let content = std::fs::read_to_string(path).map_err(|e| {
			AnnotateError::ReadFile {
				path: path.display().to_string(),
				reason: e.to_string(),
			}
		})?;

		Ok(Self::parse(path, &content))
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn line_ending(&self) -> LineEnding {
		self.line_ending
	}

	/// The text of the 1-indexed line `number`.
	pub fn line(&self, number: usize) -> Option<&str> {
		number
			.checked_sub(1)
			.and_then(|index| self.lines.get(index))
			.map(String::as_str)
	}

	/// Replace the 1-indexed line `number`. Returns `false` when the line does
	/// not exist.
	pub fn replace_line(&mut self, number: usize, text: impl Into<String>) -> bool {
		let Some(slot) = number
			.checked_sub(1)
			.and_then(|index| self.lines.get_mut(index))
		else {
			return false;
		};

		*slot = text.into();
		true
	}

	/// Insert `new_lines` so that the first of them becomes line `number`.
	/// `number` may be one past the last line to append.
	pub fn insert_lines<I, S>(&mut self, number: usize, new_lines: I)
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let index = number.saturating_sub(1).min(self.lines.len());
		let tail = self.lines.split_off(index);
		self.lines.extend(new_lines.into_iter().map(Into::into));
		self.lines.extend(tail);
	}

	/// Append a line at the end of the file.
	pub fn push_line(&mut self, text: impl Into<String>) {
		self.lines.push(text.into());
	}

	/// Render the buffer back into text using the original line ending.
	pub fn render(&self) -> String {
		let separator = self.line_ending.as_str();
		let mut content = self.lines.join(separator);
		if self.trailing_newline && !self.lines.is_empty() {
			content.push_str(separator);
		}
		content
	}

	/// Rewrite the whole file on disk.
	pub fn write(&self) -> AnnotateResult<()> {
		std::fs::write(&self.path, self.render()).map_err(|e| {
			AnnotateError::WriteFile {
				path: self.path.display().to_string(),
				reason: e.to_string(),
			}
		})
	}
}
