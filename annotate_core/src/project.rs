use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use ignore::gitignore::Gitignore;
use ignore::gitignore::GitignoreBuilder;
use tracing::debug;
use tracing::warn;

use crate::AnnotateError;
use crate::AnnotateResult;
use crate::Settings;
use crate::config::CONFIG_FILE_CANDIDATES;
use crate::config::DEFAULT_EXTENSIONS;

/// Build output and dependency directories skipped in client projects.
pub const EXCLUDED_DIRECTORIES: &[&str] = &["build", "node_modules", "target", "CMakeFiles", "cmake-build-debug", "cmake-build-release"];

/// Which files [`collect_files`] returns.
#[derive(Debug, Clone)]
pub struct FileQuery {
	/// Extensions including the leading dot, compared case-insensitively.
	pub extensions: Vec<String>,
	/// Walk build output, dependency and hidden directories and ignore
	/// `.gitignore`. Used for library roots, which live in such
	/// directories.
	pub skip_exclusions: bool,
	/// Gitignore-style patterns from `[exclude]` in `annotate.toml`,
	/// applied in every mode.
	pub exclude_patterns: Vec<String>,
	pub disable_gitignore: bool,
}

impl Default for FileQuery {
	fn default() -> Self {
		Self {
			extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
			skip_exclusions: false,
			exclude_patterns: Vec::new(),
			disable_gitignore: false,
		}
	}
}

impl FileQuery {
	/// The query for client project files.
	pub fn from_settings(settings: &Settings) -> Self {
		Self {
			extensions: settings.extensions.clone(),
			skip_exclusions: false,
			exclude_patterns: settings.exclude_patterns.clone(),
			disable_gitignore: settings.disable_gitignore,
		}
	}

	/// The same query for a library root.
	#[must_use]
	pub fn for_library(mut self) -> Self {
		self.skip_exclusions = true;
		self
	}

	fn matches_extension(&self, path: &Path) -> bool {
		let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
			return false;
		};

		self.extensions.iter().any(|wanted| {
			wanted
				.trim_start_matches('.')
				.eq_ignore_ascii_case(ext)
		})
	}
}

/// Collect the source files under `root` in a deterministic order.
///
/// A root that does not exist yields an empty list. A directory reached
/// a second time, through a symlink cycle or two links to one target, is
/// scanned once.
pub fn collect_files(root: &Path, query: &FileQuery) -> AnnotateResult<Vec<PathBuf>> {
	if !root.is_dir() {
		debug!(root = %root.display(), "file root does not exist");
		return Ok(Vec::new());
	}

	let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
	let mut files = Vec::new();
	let mut visited_dirs = HashSet::new();

	let gitignore = if query.disable_gitignore || query.skip_exclusions {
		Gitignore::empty()
	} else {
		build_gitignore(&root)
	};
	let custom_exclude = build_exclude_matcher(&root, &query.exclude_patterns)?;

	let walker = Walker {
		query,
		gitignore: &gitignore,
		custom_exclude: &custom_exclude,
	};
	walker.walk(&root, true, &mut files, &mut visited_dirs)?;

	files.sort();
	Ok(files)
}

/// Build a matcher from `[exclude] patterns`, which use `.gitignore`
/// syntax.
fn build_exclude_matcher(root: &Path, patterns: &[String]) -> AnnotateResult<Gitignore> {
	let mut builder = GitignoreBuilder::new(root);
	for pattern in patterns {
		builder.add_line(None, pattern).map_err(|e| {
			AnnotateError::InvalidPattern {
				pattern: pattern.clone(),
				reason: e.to_string(),
			}
		})?;
	}
	builder
		.build()
		.map_err(|e| AnnotateError::ConfigParse(format!("failed to build exclude rules: {e}")))
}

fn build_gitignore(root: &Path) -> Gitignore {
	let mut builder = GitignoreBuilder::new(root);
	let gitignore_path = root.join(".gitignore");
	if gitignore_path.exists() {
		if let Some(error) = builder.add(gitignore_path) {
			debug!("ignoring unreadable .gitignore: {error}");
		}
	}
	builder.build().unwrap_or_else(|_| Gitignore::empty())
}

fn is_excluded_directory_name(name: &str) -> bool {
	name.starts_with('.') || EXCLUDED_DIRECTORIES.contains(&name)
}

fn has_project_config(dir: &Path) -> bool {
	CONFIG_FILE_CANDIDATES
		.iter()
		.any(|candidate| dir.join(candidate).is_file())
}

struct Walker<'a> {
	query: &'a FileQuery,
	gitignore: &'a Gitignore,
	custom_exclude: &'a Gitignore,
}

impl Walker<'_> {
	fn walk(
		&self,
		dir: &Path,
		is_root: bool,
		files: &mut Vec<PathBuf>,
		visited_dirs: &mut HashSet<PathBuf>,
	) -> AnnotateResult<()> {
		let canonical = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
		if !visited_dirs.insert(canonical) {
			warn!(dir = %dir.display(), "directory already scanned through another path, skipping");
			return Ok(());
		}

		for entry in std::fs::read_dir(dir)? {
			let path = entry?.path();
			let is_dir = path.is_dir();

			if is_dir && !self.query.skip_exclusions {
				let excluded = path
					.file_name()
					.and_then(|n| n.to_str())
					.is_some_and(is_excluded_directory_name);
				if excluded {
					continue;
				}
			}

			if self.gitignore.matched(&path, is_dir).is_ignore()
				|| self.custom_exclude.matched(&path, is_dir).is_ignore()
			{
				continue;
			}

			if is_dir {
				// A nested directory with its own config is a separate project.
				if !is_root && !self.query.skip_exclusions && has_project_config(&path) {
					continue;
				}
				self.walk(&path, false, files, visited_dirs)?;
			} else if self.query.matches_extension(&path) {
				files.push(path);
			}
		}

		Ok(())
	}
}
