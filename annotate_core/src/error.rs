use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum AnnotateError {
	#[error(transparent)]
	#[diagnostic(code(annotate::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to read `{path}`: {reason}")]
	#[diagnostic(code(annotate::read_file))]
	ReadFile { path: String, reason: String },

	#[error("failed to write `{path}`: {reason}")]
	#[diagnostic(
		code(annotate::write_file),
		help("check that the file is writable and not held open by another process")
	)]
	WriteFile { path: String, reason: String },

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(annotate::config_parse),
		help("check that annotate.toml is valid TOML")
	)]
	ConfigParse(String),

	#[error("invalid pattern `{pattern}`: {reason}")]
	#[diagnostic(code(annotate::invalid_pattern))]
	InvalidPattern { pattern: String, reason: String },

	#[error("code generation failed: {0}")]
	#[diagnostic(code(annotate::template_render))]
	TemplateRender(String),

	#[error("marker engine failed: {reason}")]
	#[diagnostic(
		code(annotate::engine),
		help("remove `[engine] command` from annotate.toml to use the built-in scanner")
	)]
	Engine { reason: String },

	#[error("project root `{0}` is not a directory")]
	#[diagnostic(
		code(annotate::missing_project_root),
		help("pass `--path <dir>` or set PROJECT_DIR to the client project root")
	)]
	MissingProjectRoot(String),

	#[error("file too large: `{path}` is {size} bytes (limit: {limit} bytes)")]
	#[diagnostic(
		code(annotate::file_too_large),
		help("increase `max_file_size` in annotate.toml or exclude this file")
	)]
	FileTooLarge { path: String, size: u64, limit: u64 },
}

pub type AnnotateResult<T> = Result<T, AnnotateError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
