use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::AnnotateError;
use crate::AnnotateResult;
use crate::Marker;
use crate::extract::ID_TAG;
use crate::roots::RootContext;
use crate::roots::resolve_library_roots;
use crate::roots::resolve_project_root;

/// Default maximum file size in bytes (10 MB).
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] = ["annotate.toml", ".annotate.toml", ".config/annotate.toml"];

/// Macro that marks entity classes unless configured otherwise.
pub const DEFAULT_ENTITY_MACRO: &str = "_Entity";

/// Macro that marks repository classes. Not configurable.
pub const REPOSITORY_MACRO: &str = "_Repository";

/// Header extensions processed by default.
pub const DEFAULT_EXTENSIONS: [&str; 2] = [".h", ".hpp"];

/// Configuration loaded from `annotate.toml`.
///
/// ```toml
/// entity_marker = "_Entity"
/// extensions = [".h", ".hpp"]
///
/// [exclude]
/// patterns = ["generated/"]
///
/// [libraries]
/// paths = ["libs/core"]
///
/// [validation]
/// markers = ["Email"]
///
/// [engine]
/// command = "annotate-clang"
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct AnnotateConfig {
	/// Macro marking entity classes. Surrounding underscores are dropped
	/// to obtain the marker keyword.
	#[serde(default)]
	pub entity_marker: Option<String>,
	/// Extensions of the files to process, with the leading dot.
	#[serde(default)]
	pub extensions: Option<Vec<String>>,
	/// Maximum file size in bytes. Larger files are skipped.
	#[serde(default = "default_max_file_size")]
	pub max_file_size: u64,
	/// When true, `.gitignore` files are not used for filtering.
	#[serde(default)]
	pub disable_gitignore: bool,
	#[serde(default)]
	pub exclude: ExcludeConfig,
	#[serde(default)]
	pub libraries: LibrariesConfig,
	#[serde(default)]
	pub validation: ValidationConfig,
	#[serde(default)]
	pub engine: EngineConfig,
}

fn default_max_file_size() -> u64 {
	DEFAULT_MAX_FILE_SIZE
}

/// Gitignore-style patterns for files and directories to skip, relative to
/// the project root.
#[derive(Debug, Default, Deserialize)]
pub struct ExcludeConfig {
	#[serde(default)]
	pub patterns: Vec<String>,
}

/// Explicit library roots, relative to the project root. When set, no
/// other library discovery takes place.
#[derive(Debug, Default, Deserialize)]
pub struct LibrariesConfig {
	#[serde(default)]
	pub paths: Vec<PathBuf>,
}

/// Validation keywords known in addition to the discovered ones.
#[derive(Debug, Default, Deserialize)]
pub struct ValidationConfig {
	#[serde(default)]
	pub markers: Vec<String>,
}

/// External marker engine.
#[derive(Debug, Default, Deserialize)]
pub struct EngineConfig {
	#[serde(default)]
	pub command: Option<String>,
}

impl AnnotateConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if there is none.
	pub fn load(root: &Path) -> AnnotateResult<Option<AnnotateConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config: AnnotateConfig =
			toml::from_str(&content).map_err(|e| AnnotateError::ConfigParse(e.to_string()))?;

		Ok(Some(config))
	}
}

/// Values supplied on the command line that take precedence over the
/// config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	pub entity_macro: Option<String>,
	/// Where repository implementations are written.
	pub library_dir: Option<PathBuf>,
	pub dry_run: bool,
}

/// The resolved configuration of one run. Built once and passed by
/// reference; nothing reads configuration from anywhere else afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
	pub project_root: PathBuf,
	pub entity_marker: Marker,
	pub repository_marker: Marker,
	pub id_marker: Marker,
	pub extensions: Vec<String>,
	pub max_file_size: u64,
	pub disable_gitignore: bool,
	pub exclude_patterns: Vec<String>,
	pub library_roots: Vec<PathBuf>,
	pub library_dir: Option<PathBuf>,
	pub validation_markers: Vec<String>,
	pub engine_command: Option<String>,
	pub dry_run: bool,
}

impl Settings {
	/// Settings for `project_root` without library roots.
	pub fn new(project_root: impl Into<PathBuf>, config: Option<&AnnotateConfig>, overrides: Overrides) -> Self {
		let entity_macro = overrides
			.entity_macro
			.or_else(|| config.and_then(|c| c.entity_marker.clone()))
			.unwrap_or_else(|| DEFAULT_ENTITY_MACRO.to_string());

		Self {
			project_root: project_root.into(),
			entity_marker: Marker::from_macro(&entity_macro),
			repository_marker: Marker::from_macro(REPOSITORY_MACRO),
			id_marker: Marker::new(ID_TAG),
			extensions: config
				.and_then(|c| c.extensions.clone())
				.unwrap_or_else(|| DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect()),
			max_file_size: config.map_or(DEFAULT_MAX_FILE_SIZE, |c| c.max_file_size),
			disable_gitignore: config.is_some_and(|c| c.disable_gitignore),
			exclude_patterns: config.map(|c| c.exclude.patterns.clone()).unwrap_or_default(),
			library_roots: Vec::new(),
			library_dir: overrides.library_dir,
			validation_markers: config.map(|c| c.validation.markers.clone()).unwrap_or_default(),
			engine_command: config.and_then(|c| c.engine.command.clone()),
			dry_run: overrides.dry_run,
		}
	}

	#[must_use]
	pub fn with_library_roots(mut self, roots: Vec<PathBuf>) -> Self {
		self.library_roots = roots;
		self
	}

	/// Resolve the project root, load its config and discover library
	/// roots.
	pub fn load(context: &RootContext, overrides: Overrides) -> AnnotateResult<Self> {
		let project_root = resolve_project_root(context)?;
		let config = AnnotateConfig::load(&project_root)?;
		let configured = config
			.as_ref()
			.map(|c| c.libraries.paths.clone())
			.unwrap_or_default();
		let roots = resolve_library_roots(&context.clone().with_project_root(&project_root).with_configured(configured));

		Ok(Self::new(project_root, config.as_ref(), overrides).with_library_roots(roots))
	}

	/// Directory that receives repository implementations: the explicit
	/// override, else the first library root.
	pub fn repository_library_dir(&self) -> Option<&Path> {
		self.library_dir
			.as_deref()
			.or_else(|| self.library_roots.first().map(PathBuf::as_path))
	}
}
