//! Project and library root resolution.
//!
//! Library roots are found by an ordered list of [`RootProbe`]s. The first
//! probe that finds anything wins:
//!
//! 1. `[libraries] paths` from `annotate.toml`.
//! 2. `ANNOTATE_LIBRARY_DIRS` (platform path list) or `LIBRARY_DIR`.
//! 3. Walking up from the working directory, at most [`MAX_UPWARD_LEVELS`]
//!    levels, to a directory holding `build/_deps` or `.pio/libdeps`.
//! 4. The same layouts directly under the project root.

use std::collections::HashMap;
use std::collections::HashSet;
use std::ffi::OsString;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;

use crate::AnnotateError;
use crate::AnnotateResult;

/// How far [`UpwardWalkProbe`] climbs from the working directory.
pub const MAX_UPWARD_LEVELS: usize = 10;

/// CMake `FetchContent` dependency directory.
pub const CMAKE_DEPS_DIR: &str = "build/_deps";

/// PlatformIO dependency directory, one subdirectory per environment.
pub const PLATFORMIO_DEPS_DIR: &str = ".pio/libdeps";

/// Everything root resolution may look at, captured once so resolution
/// never consults process-wide state.
#[derive(Debug, Clone, Default)]
pub struct RootContext {
	/// Root given on the command line.
	pub explicit_root: Option<PathBuf>,
	/// Root already resolved by [`resolve_project_root`].
	pub project_root: Option<PathBuf>,
	pub working_dir: PathBuf,
	pub env: HashMap<String, String>,
	/// `[libraries] paths` from the config file.
	pub configured: Vec<PathBuf>,
}

impl RootContext {
	pub fn new(working_dir: impl Into<PathBuf>) -> Self {
		Self {
			working_dir: working_dir.into(),
			..Self::default()
		}
	}

	/// Capture the current directory and environment of this process.
	pub fn from_process(explicit_root: Option<PathBuf>) -> AnnotateResult<Self> {
		Ok(Self {
			explicit_root,
			working_dir: std::env::current_dir()?,
			env: std::env::vars().collect(),
			..Self::default()
		})
	}

	#[must_use]
	pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.env.insert(key.into(), value.into());
		self
	}

	#[must_use]
	pub fn with_explicit_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.explicit_root = Some(root.into());
		self
	}

	#[must_use]
	pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
		self.project_root = Some(root.into());
		self
	}

	#[must_use]
	pub fn with_configured(mut self, paths: Vec<PathBuf>) -> Self {
		self.configured = paths;
		self
	}

	/// A non-empty environment variable.
	pub fn var(&self, key: &str) -> Option<&str> {
		self.env
			.get(key)
			.map(String::as_str)
			.filter(|value| !value.trim().is_empty())
	}

	fn base(&self) -> &Path {
		self.project_root
			.as_deref()
			.or(self.explicit_root.as_deref())
			.unwrap_or(&self.working_dir)
	}

	fn absolute(&self, path: &Path) -> PathBuf {
		if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base().join(path)
		}
	}
}

/// One strategy for finding library roots.
pub trait RootProbe {
	fn name(&self) -> &'static str;

	/// Candidate roots in discovery order. Missing directories are
	/// filtered out by the caller.
	fn probe(&self, context: &RootContext) -> Vec<PathBuf>;
}

/// `[libraries] paths` from the config file.
pub struct ConfiguredProbe;

impl RootProbe for ConfiguredProbe {
	fn name(&self) -> &'static str {
		"config"
	}

	fn probe(&self, context: &RootContext) -> Vec<PathBuf> {
		context
			.configured
			.iter()
			.map(|path| context.absolute(path))
			.collect()
	}
}

/// `ANNOTATE_LIBRARY_DIRS`, falling back to the single `LIBRARY_DIR`.
pub struct EnvironmentProbe;

impl RootProbe for EnvironmentProbe {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn probe(&self, context: &RootContext) -> Vec<PathBuf> {
		if let Some(list) = context.var("ANNOTATE_LIBRARY_DIRS") {
			return std::env::split_paths(&OsString::from(list))
				.filter(|path| !path.as_os_str().is_empty())
				.map(|path| context.absolute(&path))
				.collect();
		}

		context
			.var("LIBRARY_DIR")
			.map(|dir| vec![context.absolute(Path::new(dir))])
			.unwrap_or_default()
	}
}

/// Climb from the working directory to the nearest directory with a known
/// dependency layout.
pub struct UpwardWalkProbe;

impl RootProbe for UpwardWalkProbe {
	fn name(&self) -> &'static str {
		"upward walk"
	}

	fn probe(&self, context: &RootContext) -> Vec<PathBuf> {
		context
			.working_dir
			.ancestors()
			.take(MAX_UPWARD_LEVELS + 1)
			.find(|dir| has_dependency_layout(dir))
			.map(layout_libraries)
			.unwrap_or_default()
	}
}

/// Known dependency layouts under the project root.
pub struct LayoutProbe;

impl RootProbe for LayoutProbe {
	fn name(&self) -> &'static str {
		"layout"
	}

	fn probe(&self, context: &RootContext) -> Vec<PathBuf> {
		layout_libraries(context.base())
	}
}

/// The probes in resolution order.
pub fn default_probes() -> Vec<Box<dyn RootProbe>> {
	vec![
		Box::new(ConfiguredProbe),
		Box::new(EnvironmentProbe),
		Box::new(UpwardWalkProbe),
		Box::new(LayoutProbe),
	]
}

/// Resolve library roots with [`default_probes`].
pub fn resolve_library_roots(context: &RootContext) -> Vec<PathBuf> {
	resolve_with(context, &default_probes())
}

/// Run `probes` in order and return the existing, de-duplicated roots of
/// the first one that finds any.
pub fn resolve_with(context: &RootContext, probes: &[Box<dyn RootProbe>]) -> Vec<PathBuf> {
	for probe in probes {
		let mut seen = HashSet::new();
		let roots: Vec<PathBuf> = probe
			.probe(context)
			.into_iter()
			.filter(|path| path.is_dir())
			.map(|path| path.canonicalize().unwrap_or(path))
			.filter(|path| seen.insert(path.clone()))
			.collect();

		if !roots.is_empty() {
			debug!(probe = probe.name(), count = roots.len(), "resolved library roots");
			return roots;
		}
	}

	debug!("no library roots found");
	Vec::new()
}

/// The project root: the explicit root, else `PROJECT_DIR`, else
/// `CMAKE_PROJECT_DIR`, else the working directory.
pub fn resolve_project_root(context: &RootContext) -> AnnotateResult<PathBuf> {
	let root = context
		.explicit_root
		.clone()
		.or_else(|| context.var("PROJECT_DIR").map(PathBuf::from))
		.or_else(|| context.var("CMAKE_PROJECT_DIR").map(PathBuf::from))
		.unwrap_or_else(|| context.working_dir.clone());

	let root = if root.is_absolute() {
		root
	} else {
		context.working_dir.join(root)
	};

	if !root.is_dir() {
		return Err(AnnotateError::MissingProjectRoot(root.display().to_string()));
	}

	Ok(root.canonicalize().unwrap_or(root))
}

fn has_dependency_layout(dir: &Path) -> bool {
	dir.join(CMAKE_DEPS_DIR).is_dir() || dir.join(PLATFORMIO_DEPS_DIR).is_dir()
}

/// Libraries fetched into `dir` by CMake or PlatformIO.
///
/// CMake: every `build/_deps/*-src` directory, plus other `build/_deps/*`
/// directories with a `src/` subdirectory. PlatformIO: every
/// `.pio/libdeps/<env>/<lib>` with a `src/` subdirectory.
pub fn layout_libraries(dir: &Path) -> Vec<PathBuf> {
	let mut libraries = Vec::new();

	for candidate in sorted_subdirectories(&dir.join(CMAKE_DEPS_DIR)) {
		let name = candidate
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_default();
		if name.ends_with("-build") || name.ends_with("-subbuild") {
			continue;
		}
		if name.ends_with("-src") || candidate.join("src").is_dir() {
			libraries.push(candidate);
		}
	}

	for env in sorted_subdirectories(&dir.join(PLATFORMIO_DEPS_DIR)) {
		libraries.extend(
			sorted_subdirectories(&env)
				.into_iter()
				.filter(|library| library.join("src").is_dir()),
		);
	}

	libraries
}

fn sorted_subdirectories(dir: &Path) -> Vec<PathBuf> {
	let Ok(entries) = std::fs::read_dir(dir) else {
		return Vec::new();
	};

	let mut dirs: Vec<PathBuf> = entries
		.filter_map(Result::ok)
		.map(|entry| entry.path())
		.filter(|path| path.is_dir())
		.collect();
	dirs.sort();
	dirs
}
