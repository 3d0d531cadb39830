use std::path::Path;
use std::path::PathBuf;
use std::process;

use annotate_cli::AnnotateCli;
use annotate_cli::Commands;
use annotate_cli::OutputFormat;
use annotate_core::AnnotateError;
use annotate_core::AnyResult;
use annotate_core::Context;
use annotate_core::DiagnosticKind;
use annotate_core::FileReport;
use annotate_core::Overrides;
use annotate_core::ProcessDiagnostic;
use annotate_core::Settings;
use annotate_core::SourceFile;
use annotate_core::extract_tagged_fields;
use annotate_core::process_primary_key;
use annotate_core::process_repository;
use annotate_core::process_serialization;
use annotate_core::repository::detect_repository;
use annotate_core::repository::extract_findby_variable_name;
use annotate_core::roots::RootContext;
use clap::Parser;
use owo_colors::OwoColorize;
use similar::ChangeTag;
use similar::TextDiff;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,bold) => {
		if color_enabled() {
			format!("{}", $text.bold())
		} else {
			format!("{}", $text)
		}
	};
}

/// How a command ended. Anything but `Success` exits with status 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
	Success,
	/// Nothing was found or nothing needed to change.
	Unchanged,
	/// Some files could not be processed.
	Failed,
}

impl Status {
	fn found(found: bool) -> Self {
		if found { Self::Success } else { Self::Unchanged }
	}

	fn code(self) -> i32 {
		match self {
			Self::Success => 0,
			Self::Unchanged | Self::Failed => 1,
		}
	}
}

/// Which single stage a file command runs.
#[derive(Debug, Clone, Copy)]
enum Stage {
	PrimaryKey,
	Serialization,
	Repository,
}

fn main() {
	let args = AnnotateCli::parse();

	// Respect NO_COLOR env var and --no-color flag.
	let use_color = !args.no_color && std::env::var_os("NO_COLOR").is_none();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_tracing(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Run {
			dry_run,
			diff,
			format,
		}) => run_all(&args, *dry_run, *diff, *format),
		Some(Commands::Ids { file, format }) => run_ids(&args, file, *format),
		Some(Commands::PrimaryKey { file, dry_run }) => {
			run_stage(&args, file, Stage::PrimaryKey, None, *dry_run)
		}
		Some(Commands::Serialize { file, dry_run }) => {
			run_stage(&args, file, Stage::Serialization, None, *dry_run)
		}
		Some(Commands::DetectRepository { file, format }) => run_detect_repository(&args, file, *format),
		Some(Commands::Repository {
			file,
			library_dir,
			dry_run,
		}) => run_stage(&args, file, Stage::Repository, library_dir.clone(), *dry_run),
		Some(Commands::FindBy { method }) => Ok(run_find_by(method)),
		Some(Commands::Libraries) => run_libraries(&args),
		None => {
			eprintln!("No subcommand specified. Run `annotate --help` for usage.");
			process::exit(1);
		}
	};

	match result {
		Ok(status) => process::exit(status.code()),
		Err(e) => {
			// Try to render through miette for rich diagnostics with help text
			// and error codes.
			match e.downcast::<AnnotateError>() {
				Ok(annotate_err) => {
					let report: miette::Report = (*annotate_err).into();
					eprintln!("{report:?}");
				}
				Err(e) => {
					eprintln!("{} {e}", colored!("error:", red));
				}
			}
			process::exit(1);
		}
	}
}

/// Logs go to stderr. `ANNOTATE_LOG` replaces the default filter.
fn init_tracing(verbose: bool, use_color: bool) {
	let default_filter = if verbose {
		"annotate_core=debug,annotate=debug"
	} else {
		"warn"
	};
	let filter = EnvFilter::try_from_env("ANNOTATE_LOG").unwrap_or_else(|_| EnvFilter::new(default_filter));

	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_ansi(use_color)
		.with_target(false)
		.without_time()
		.init();
}

fn load_context(args: &AnnotateCli, library_dir: Option<PathBuf>, dry_run: bool) -> AnyResult<Context> {
	let roots = RootContext::from_process(args.path.clone())?;
	let overrides = Overrides {
		entity_macro: args.entity_macro.clone(),
		library_dir,
		dry_run,
	};
	let settings = Settings::load(&roots, overrides)?;

	if args.verbose {
		println!("Project root: {}", settings.project_root.display());
		for root in &settings.library_roots {
			println!("Library root: {}", root.display());
		}
	}

	Ok(Context::new(settings))
}

fn run_all(args: &AnnotateCli, dry_run: bool, show_diff: bool, format: OutputFormat) -> AnyResult<Status> {
	let context = load_context(args, None, dry_run)?;
	let root = context.settings.project_root.clone();
	let report = annotate_core::run(&context)?;

	if format == OutputFormat::Json {
		let files: Vec<serde_json::Value> = report
			.files
			.iter()
			.map(|file| {
				serde_json::json!({
					"file": make_relative(&file.path, &root),
					"changed": file.changed(),
					"written": file.written,
					"actions": file.actions.iter().map(ToString::to_string).collect::<Vec<_>>(),
					"diagnostics": file.diagnostics.iter().map(|diag| {
						serde_json::json!({
							"line": diag.line,
							"message": diag.message(),
						})
					}).collect::<Vec<_>>(),
				})
			})
			.collect();
		let failures: Vec<serde_json::Value> = report
			.failures
			.iter()
			.map(|failure| {
				serde_json::json!({
					"file": make_relative(&failure.path, &root),
					"error": failure.error.to_string(),
				})
			})
			.collect();
		let output = serde_json::json!({
			"ok": report.is_ok(),
			"dry_run": dry_run,
			"scanned": report.scanned,
			"files": files,
			"failures": failures,
		});
		println!("{output}");

		return Ok(if report.is_ok() { Status::Success } else { Status::Failed });
	}

	for file in &report.files {
		print_diagnostics(&file.diagnostics, &root);
		if file.changed() {
			print_file_actions(file, &root, dry_run);
			if show_diff {
				print_diff(&file.original, &file.updated);
			}
		}
	}

	for failure in &report.failures {
		eprintln!(
			"{} {}: {}",
			colored!("error:", red),
			make_relative(&failure.path, &root),
			failure.error
		);
	}

	let changed = report.changed_files().count();
	if changed == 0 {
		println!("All {} file(s) are already up to date.", report.scanned);
	} else if dry_run {
		println!("{changed} of {} file(s) would be updated.", report.scanned);
	} else {
		println!("Updated {changed} of {} file(s).", report.scanned);
	}

	Ok(if report.is_ok() { Status::Success } else { Status::Failed })
}

fn run_stage(
	args: &AnnotateCli,
	path: &Path,
	stage: Stage,
	library_dir: Option<PathBuf>,
	dry_run: bool,
) -> AnyResult<Status> {
	let context = load_context(args, library_dir, dry_run)?;
	let root = context.settings.project_root.clone();
	let mut file = SourceFile::read(path, context.settings.max_file_size)?;

	let report = match stage {
		Stage::PrimaryKey => process_primary_key(&mut file, &context),
		Stage::Serialization => process_serialization(&mut file, &context)?,
		Stage::Repository => process_repository(&mut file, &context)?,
	};

	print_diagnostics(&report.diagnostics, &root);
	if !report.changed() {
		println!("{} is already up to date.", make_relative(&report.path, &root));
		return Ok(Status::Unchanged);
	}

	if !dry_run {
		file.write()?;
	}

	print_file_actions(&report, &root, dry_run);
	if dry_run {
		print_diff(&report.original, &report.updated);
	}

	Ok(Status::Success)
}

fn run_ids(args: &AnnotateCli, path: &Path, format: OutputFormat) -> AnyResult<Status> {
	let context = load_context(args, None, true)?;
	let settings = &context.settings;
	let file = SourceFile::read(path, settings.max_file_size)?;
	let engine = context.engine();

	let Some(found) = engine.detect(&file, &settings.entity_marker) else {
		eprintln!(
			"no active @{} marker in {}",
			settings.entity_marker.keyword(),
			path.display()
		);
		return Ok(Status::Unchanged);
	};
	let Some(boundary) = engine.boundaries(&file, &found.class_name) else {
		eprintln!("could not find the body of class {}", found.class_name);
		return Ok(Status::Unchanged);
	};

	let fields = extract_tagged_fields(&file, boundary, &settings.id_marker, context.registry());

	match format {
		OutputFormat::Json => {
			let output = serde_json::json!({
				"class": &found.class_name,
				"fields": &fields,
			});
			println!("{output}");
		}
		OutputFormat::Text => {
			if !fields.is_empty() {
				println!("{}", colored!(found.class_name, bold));
			}
			for field in &fields {
				if field.tags.is_empty() {
					println!("  {} {} (line {})", field.ty, field.name, field.line);
				} else {
					println!(
						"  {} {} [{}] (line {})",
						field.ty,
						field.name,
						field.tags.join(", "),
						field.line
					);
				}
			}
		}
	}

	if fields.is_empty() {
		eprintln!("no identifier fields in class {}", found.class_name);
	}

	Ok(Status::found(!fields.is_empty()))
}

fn run_detect_repository(args: &AnnotateCli, path: &Path, format: OutputFormat) -> AnyResult<Status> {
	let context = load_context(args, None, true)?;
	let settings = &context.settings;
	let file = SourceFile::read(path, settings.max_file_size)?;

	let Some(model) = detect_repository(&file, context.engine(), &settings.repository_marker) else {
		eprintln!("no active repository in {}", path.display());
		return Ok(Status::Unchanged);
	};

	match format {
		OutputFormat::Json => println!("{}", serde_json::to_string(&model)?),
		OutputFormat::Text => {
			print_field("Class", &model.class_name);
			print_field("Entity", &model.entity_type);
			print_field("Id", &model.id_type);
			for finder in &model.finders {
				print_field("Finder", format!("{} -> {}", finder.name, finder.variable));
			}
		}
	}

	Ok(Status::Success)
}

fn run_find_by(method: &str) -> Status {
	match extract_findby_variable_name(method) {
		Some(variable) => {
			println!("{variable}");
			Status::Success
		}
		None => {
			eprintln!("`{method}` is not a FindBy method");
			Status::Unchanged
		}
	}
}

fn run_libraries(args: &AnnotateCli) -> AnyResult<Status> {
	let roots = RootContext::from_process(args.path.clone())?;
	let settings = Settings::load(&roots, Overrides::default())?;

	if settings.library_roots.is_empty() {
		eprintln!("no library roots found");
		return Ok(Status::Unchanged);
	}

	for root in &settings.library_roots {
		println!("{}", root.display());
	}

	Ok(Status::Success)
}

fn print_field(label: &str, value: impl std::fmt::Display) {
	println!("{label:<8} {value}");
}

fn print_file_actions(report: &FileReport, root: &Path, dry_run: bool) {
	let rel = make_relative(&report.path, root);
	if dry_run {
		println!("{} {rel}", colored!("Would update", yellow));
	} else {
		println!("{} {rel}", colored!("Updated", green));
	}

	for action in &report.actions {
		println!("  {action}");
	}
}

fn print_diagnostics(diagnostics: &[ProcessDiagnostic], root: &Path) {
	for diagnostic in diagnostics {
		let rel = make_relative(&diagnostic.file, root);
		let report = diagnostic_to_report(diagnostic, &rel);
		eprintln!("{report:?}");
	}
}

/// Print every line of `current` and `expected`, marking removed lines with
/// `-` and added lines with `+`.
fn print_diff(current: &str, expected: &str) {
	let diff = TextDiff::from_lines(current, expected);
	for change in diff.iter_all_changes() {
		match change.tag() {
			ChangeTag::Delete => {
				print!("  {}", colored!(format!("-{change}"), red));
			}
			ChangeTag::Insert => {
				print!("  {}", colored!(format!("+{change}"), green));
			}
			ChangeTag::Equal => {
				print!("   {change}");
			}
		}
	}
}

/// Make a path relative to root for display purposes.
fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.display()
		.to_string()
}

/// Convert a `ProcessDiagnostic` into a warning `miette::Report` with an
/// error code and help text.
fn diagnostic_to_report(diag: &ProcessDiagnostic, rel_path: &str) -> miette::Report {
	let message = format!("[{rel_path}:{}] {}", diag.line, diag.message());
	let (code, help) = match &diag.kind {
		DiagnosticKind::CompositeKey { .. } => {
			(
				"annotate::composite_key",
				"keep a single `/// @Id` field; the other identifier markers can be removed".to_string(),
			)
		}
		DiagnosticKind::MethodsAlreadyPresent { sentinel, .. } => {
			(
				"annotate::methods_already_present",
				format!("remove the existing `{sentinel}` member or mark the marker processed by hand"),
			)
		}
		DiagnosticKind::ClassNotFound { .. } => {
			(
				"annotate::class_not_found",
				"check that the braces of the class are balanced".to_string(),
			)
		}
		DiagnosticKind::MissingLibraryDir { .. } => {
			(
				"annotate::missing_library_dir",
				"pass `--library-dir <dir>` or set LIBRARY_DIR".to_string(),
			)
		}
		_ => ("annotate::diagnostic", diag.message()),
	};

	let diag_value = miette::MietteDiagnostic::new(message)
		.with_code(code)
		.with_help(help)
		.with_severity(miette::Severity::Warning);
	miette::Report::new(diag_value)
}
