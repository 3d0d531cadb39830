use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::Path;
use std::path::PathBuf;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::AnnotateError;
use crate::AnnotateResult;
use crate::ClassModel;
use crate::FileQuery;
use crate::InjectOutcome;
use crate::MarkOutcome;
use crate::Marker;
use crate::MarkerEngine;
use crate::PrimaryKey;
use crate::Settings;
use crate::SourceFile;
use crate::ValidationMarkerRegistry;
use crate::engine::select_engine;
use crate::extract::extract_all_fields;
use crate::extract::extract_tagged_fields;
use crate::generate::generate_primary_key_methods;
use crate::generate::generate_serialization_methods;
use crate::generate::needs_optional_include;
use crate::inject::add_include;
use crate::inject::ensure_system_include;
use crate::inject::inject;
use crate::inject::mark_processed;
use crate::project::collect_files;
use crate::repository::detect_repository;
use crate::repository::implementation_path;
use crate::repository::include_path_for;
use crate::repository::write_implementation;

/// Shared state of one run: the settings, the selected engine and the
/// lazily discovered validation registry.
pub struct Context {
	pub settings: Settings,
	engine: Box<dyn MarkerEngine>,
	registry: OnceLock<ValidationMarkerRegistry>,
}

impl fmt::Debug for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context")
			.field("settings", &self.settings)
			.field("engine", &self.engine.name())
			.finish_non_exhaustive()
	}
}

impl Context {
	/// Create a context, probing for the configured engine.
	pub fn new(settings: Settings) -> Self {
		let engine = select_engine(&settings);
		Self::with_engine(settings, engine)
	}

	pub fn with_engine(settings: Settings, engine: Box<dyn MarkerEngine>) -> Self {
		Self {
			settings,
			engine,
			registry: OnceLock::new(),
		}
	}

	/// Use `registry` instead of discovering one.
	#[must_use]
	pub fn with_registry(self, registry: ValidationMarkerRegistry) -> Self {
		let cell = OnceLock::new();
		let _ = cell.set(registry);
		Self {
			registry: cell,
			..self
		}
	}

	pub fn engine(&self) -> &dyn MarkerEngine {
		self.engine.as_ref()
	}

	/// The validation registry, discovered from the project and library
	/// files on first use.
	pub fn registry(&self) -> &ValidationMarkerRegistry {
		self.registry.get_or_init(|| {
			let files = self.files().unwrap_or_else(|error| {
				warn!("validation marker discovery unavailable: {error}");
				Vec::new()
			});
			ValidationMarkerRegistry::discover(
				&files,
				self.settings.max_file_size,
				&self.settings.validation_markers,
			)
		})
	}

	/// Project files followed by library files, each path once.
	pub fn files(&self) -> AnnotateResult<Vec<PathBuf>> {
		let query = FileQuery::from_settings(&self.settings);
		let mut files = collect_files(&self.settings.project_root, &query)?;

		let library_query = query.for_library();
		for root in &self.settings.library_roots {
			match collect_files(root, &library_query) {
				Ok(found) => files.extend(found),
				Err(error) => warn!("skipping library `{}`: {error}", root.display()),
			}
		}

		let mut seen = HashSet::new();
		files.retain(|path| seen.insert(path.clone()));
		Ok(files)
	}
}

/// Something a stage changed in a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Action {
	InjectedPrimaryKey { class: String, field: String },
	InjectedSerialization { class: String },
	AddedInclude { include: String },
	MarkedProcessed { marker: String, line: usize },
	CreatedImplementation { path: PathBuf },
}

impl fmt::Display for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::InjectedPrimaryKey { class, field } => {
				write!(f, "injected primary key methods for `{field}` into {class}")
			}
			Self::InjectedSerialization { class } => write!(f, "injected serialization methods into {class}"),
			Self::AddedInclude { include } => write!(f, "added include {include}"),
			Self::MarkedProcessed { marker, line } => write!(f, "marked @{marker} processed on line {line}"),
			Self::CreatedImplementation { path } => write!(f, "created {}", path.display()),
		}
	}
}

/// The kind of diagnostic produced while processing a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum DiagnosticKind {
	/// More than one identifier field. Key methods are not generated.
	CompositeKey { class: String, fields: Vec<String> },
	/// Generated members exist while the marker is still active, left over
	/// from an interrupted run.
	MethodsAlreadyPresent { class: String, sentinel: String },
	/// A marker names a class whose braces never balance.
	ClassNotFound { class: String },
	/// A repository was found but there is nowhere to write its
	/// implementation.
	MissingLibraryDir { class: String },
}

/// A diagnostic produced while processing a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessDiagnostic {
	pub file: PathBuf,
	pub kind: DiagnosticKind,
	/// 1-indexed line number.
	pub line: usize,
}

impl ProcessDiagnostic {
	/// Human-readable message for this diagnostic.
	pub fn message(&self) -> String {
		match &self.kind {
			DiagnosticKind::CompositeKey { class, fields } => {
				format!(
					"{class} has {} identifier fields ({}); composite keys are not supported",
					fields.len(),
					fields.join(", ")
				)
			}
			DiagnosticKind::MethodsAlreadyPresent { class, sentinel } => {
				format!("{class} already contains `{sentinel}` but its marker is still active")
			}
			DiagnosticKind::ClassNotFound { class } => format!("could not find the body of class {class}"),
			DiagnosticKind::MissingLibraryDir { class } => {
				format!("no library directory to write the implementation of {class}")
			}
		}
	}
}

/// What processing did to one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
	pub path: PathBuf,
	pub actions: Vec<Action>,
	pub diagnostics: Vec<ProcessDiagnostic>,
	/// Content before processing.
	pub original: String,
	/// Content after processing, whether or not it was written.
	pub updated: String,
	pub written: bool,
}

impl FileReport {
	fn begin(file: &SourceFile) -> Self {
		let content = file.render();
		Self {
			path: file.path().to_path_buf(),
			actions: Vec::new(),
			diagnostics: Vec::new(),
			original: content.clone(),
			updated: content,
			written: false,
		}
	}

	fn finish(mut self, file: &SourceFile) -> Self {
		self.updated = file.render();
		self
	}

	fn act(&mut self, action: Action) {
		info!(file = %self.path.display(), "{action}");
		self.actions.push(action);
	}

	fn diagnose(&mut self, kind: DiagnosticKind, line: usize) {
		let diagnostic = ProcessDiagnostic {
			file: self.path.clone(),
			kind,
			line,
		};
		debug!(file = %self.path.display(), line, "{}", diagnostic.message());
		self.diagnostics.push(diagnostic);
	}

	fn absorb(&mut self, other: Self) {
		self.actions.extend(other.actions);
		self.diagnostics.extend(other.diagnostics);
		self.updated = other.updated;
	}

	pub fn changed(&self) -> bool {
		self.original != self.updated
	}
}

/// A file whose processing failed.
#[derive(Debug)]
pub struct FileFailure {
	pub path: PathBuf,
	pub error: AnnotateError,
}

/// Outcome of [`run`].
#[derive(Debug, Default)]
pub struct RunReport {
	/// Number of files examined.
	pub scanned: usize,
	/// Reports of the files that were changed or produced diagnostics.
	pub files: Vec<FileReport>,
	pub failures: Vec<FileFailure>,
}

impl RunReport {
	pub fn changed_files(&self) -> impl Iterator<Item = &FileReport> {
		self.files.iter().filter(|report| report.changed())
	}

	pub fn diagnostics(&self) -> impl Iterator<Item = &ProcessDiagnostic> {
		self.files.iter().flat_map(|report| report.diagnostics.iter())
	}

	pub fn is_ok(&self) -> bool {
		self.failures.is_empty()
	}
}

/// Inject primary key accessors into the active entity class of `file` and
/// mark its identifier processed.
///
/// Runs while the entity marker is still active. Classes without an
/// identifier are left alone; classes with several produce a
/// [`DiagnosticKind::CompositeKey`].
pub fn process_primary_key(file: &mut SourceFile, context: &Context) -> FileReport {
	let mut report = FileReport::begin(file);
	primary_key_stage(file, context, &mut report);
	report.finish(file)
}

/// Inject serialization members into the active entity class of `file`
/// and mark the entity processed.
pub fn process_serialization(file: &mut SourceFile, context: &Context) -> AnnotateResult<FileReport> {
	let mut report = FileReport::begin(file);
	serialization_stage(file, context, &mut report)?;
	Ok(report.finish(file))
}

/// Both entity stages, primary key first.
pub fn process_entity(file: &mut SourceFile, context: &Context) -> AnnotateResult<FileReport> {
	let mut report = FileReport::begin(file);
	primary_key_stage(file, context, &mut report);
	serialization_stage(file, context, &mut report)?;
	Ok(report.finish(file))
}

/// Generate the implementation of the active repository class of `file`,
/// include it and mark the repository processed.
pub fn process_repository(file: &mut SourceFile, context: &Context) -> AnnotateResult<FileReport> {
	let mut report = FileReport::begin(file);
	repository_stage(file, context, &mut report)?;
	Ok(report.finish(file))
}

fn primary_key_stage(file: &mut SourceFile, context: &Context, report: &mut FileReport) {
	let settings = &context.settings;
	let engine = context.engine();

	let Some(found) = engine.detect(file, &settings.entity_marker) else {
		return;
	};
	let class = found.class_name;
	let Some(boundary) = engine.boundaries(file, &class) else {
		report.diagnose(DiagnosticKind::ClassNotFound { class }, found.class_line);
		return;
	};

	let fields = extract_tagged_fields(file, boundary, &settings.id_marker, context.registry());
	let field = match PrimaryKey::from_fields(&fields) {
		PrimaryKey::None => {
			debug!(class = %class, "no identifier field");
			return;
		}
		PrimaryKey::Composite(fields) => {
			let line = fields.first().map_or(found.class_line, |field| field.line);
			let fields = fields.iter().map(|field| field.name.clone()).collect();
			report.diagnose(DiagnosticKind::CompositeKey { class, fields }, line);
			return;
		}
		PrimaryKey::Single(field) => field,
	};

	let block = generate_primary_key_methods(&field.ty, &field.name, &class);
	match inject(file, engine, &class, &block) {
		InjectOutcome::Injected { .. } => {
			report.act(Action::InjectedPrimaryKey {
				class: class.clone(),
				field: field.name.clone(),
			});
		}
		InjectOutcome::AlreadyPresent { sentinel } => {
			report.diagnose(
				DiagnosticKind::MethodsAlreadyPresent {
					class,
					sentinel: sentinel.to_string(),
				},
				field.line,
			);
			return;
		}
		InjectOutcome::ClassNotFound => return,
	}

	mark(file, boundary.start..=field.line, &settings.id_marker, report);
}

fn serialization_stage(file: &mut SourceFile, context: &Context, report: &mut FileReport) -> AnnotateResult<()> {
	let settings = &context.settings;
	let engine = context.engine();

	let Some(found) = engine.detect(file, &settings.entity_marker) else {
		return Ok(());
	};
	let class = found.class_name;
	let Some(boundary) = engine.boundaries(file, &class) else {
		report.diagnose(DiagnosticKind::ClassNotFound { class }, found.class_line);
		return Ok(());
	};

	let model = ClassModel::new(
		class.as_str(),
		extract_all_fields(file, boundary, context.registry()),
		true,
	);
	let block = generate_serialization_methods(&model.name, &model.fields, &model.validation_fields_by_tag())?;

	match inject(file, engine, &class, &block) {
		InjectOutcome::Injected { .. } => {
			report.act(Action::InjectedSerialization { class: class.clone() });
		}
		InjectOutcome::AlreadyPresent { sentinel } => {
			report.diagnose(
				DiagnosticKind::MethodsAlreadyPresent {
					class,
					sentinel: sentinel.to_string(),
				},
				found.class_line,
			);
			return Ok(());
		}
		InjectOutcome::ClassNotFound => return Ok(()),
	}

	if needs_optional_include(&model.fields) && ensure_system_include(file, "optional").changed() {
		report.act(Action::AddedInclude {
			include: "<optional>".to_string(),
		});
	}

	mark_class(file, context, &class, &settings.entity_marker, report);
	Ok(())
}

fn repository_stage(file: &mut SourceFile, context: &Context, report: &mut FileReport) -> AnnotateResult<()> {
	let settings = &context.settings;
	let engine = context.engine();

	let Some(model) = detect_repository(file, engine, &settings.repository_marker) else {
		return Ok(());
	};
	let Some(library_dir) = settings.repository_library_dir() else {
		let line = engine
			.detect(file, &settings.repository_marker)
			.map_or(1, |found| found.class_line);
		report.diagnose(
			DiagnosticKind::MissingLibraryDir {
				class: model.class_name,
			},
			line,
		);
		return Ok(());
	};

	let path = implementation_path(library_dir, &model.class_name);
	if settings.dry_run {
		if !path.exists() {
			report.act(Action::CreatedImplementation { path: path.clone() });
		}
	} else if write_implementation(&model, library_dir)?.changed() {
		report.act(Action::CreatedImplementation { path: path.clone() });
	}

	let include = include_path_for(&path);
	if add_include(file, &include).changed() {
		report.act(Action::AddedInclude {
			include: format!("\"{include}\""),
		});
	}

	mark_class(file, context, &model.class_name, &settings.repository_marker, report);
	Ok(())
}

/// Mark the class marker annotating `class`. Detection runs again because
/// includes added above the class move its marker.
fn mark_class(file: &mut SourceFile, context: &Context, class: &str, marker: &Marker, report: &mut FileReport) {
	let Some(found) = context
		.engine()
		.detect(file, marker)
		.filter(|found| found.class_name == class)
	else {
		return;
	};

	mark(file, found.marker_line..=found.marker_line, marker, report);
}

fn mark(file: &mut SourceFile, lines: RangeInclusive<usize>, marker: &Marker, report: &mut FileReport) {
	if let MarkOutcome::Marked { line } = mark_processed(file, lines, marker) {
		report.act(Action::MarkedProcessed {
			marker: marker.keyword().to_string(),
			line,
		});
	}
}

/// Read `path`, run every stage on it and write it back when it changed
/// and this is not a dry run.
pub fn process_file(path: &Path, context: &Context) -> AnnotateResult<FileReport> {
	let mut file = SourceFile::read(path, context.settings.max_file_size)?;

	let mut report = process_entity(&mut file, context)?;
	report.absorb(process_repository(&mut file, context)?);

	if report.changed() && !context.settings.dry_run {
		file.write()?;
		report.written = true;
	}

	Ok(report)
}

/// Process every project and library file in discovery order. A failing
/// file is recorded and the run continues.
pub fn run(context: &Context) -> AnnotateResult<RunReport> {
	let files = context.files()?;
	let mut report = RunReport {
		scanned: files.len(),
		..RunReport::default()
	};

	for path in files {
		match process_file(&path, context) {
			Ok(file_report) => {
				if file_report.changed() || !file_report.diagnostics.is_empty() || !file_report.actions.is_empty() {
					report.files.push(file_report);
				}
			}
			Err(error) => {
				debug!(file = %path.display(), "skipping file: {error}");
				report.failures.push(FileFailure { path, error });
			}
		}
	}

	Ok(report)
}
