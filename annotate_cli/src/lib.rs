use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Process marker comments in C++ headers before a build.",
	long_about = "annotate scans the headers of a client project and its libraries for marker \
	              comments such as `/// @Entity`, `/// @Id` and `//@Repository`, injects the \
	              generated members they ask for and rewrites each marker into its processed \
	              form so that running the tool again changes nothing.\n\nQuick start:\n  \
	              annotate run --dry-run --diff  Preview every change\n  annotate run          \
	              Apply the changes\n  annotate ids <file>   Show identifier fields"
)]
pub struct AnnotateCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the client project root. Defaults to `PROJECT_DIR`, then
	/// `CMAKE_PROJECT_DIR`, then the current directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output and debug logging.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,

	/// Macro marking entity classes, overriding `entity_marker` in
	/// `annotate.toml`. `_Entity` is matched as `@Entity`.
	#[arg(long = "macro", global = true, env = "SERIALIZABLE_MACRO")]
	pub entity_macro: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Process every header of the project and its libraries.
	///
	/// Entity classes receive primary key and serialization members,
	/// repository classes receive a generated implementation in their
	/// library. Files that need no change are left untouched.
	Run {
		/// Compute the changes without writing any file.
		#[arg(long, default_value_t = false)]
		dry_run: bool,

		/// Print the changed lines of every changed file.
		#[arg(long, default_value_t = false)]
		diff: bool,

		/// Output format for the run summary.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Print the identifier fields of the entity class in a file.
	///
	/// Exits with status 1 when the file has no active entity marker or
	/// the class has no identifier field.
	Ids {
		/// Header to inspect.
		file: PathBuf,

		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Inject primary key accessors into the entity class of a file.
	///
	/// Exits with status 1 when nothing was injected.
	PrimaryKey {
		file: PathBuf,

		/// Show the change without writing the file.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
	/// Inject serialization members into the entity class of a file.
	///
	/// Exits with status 1 when nothing was injected.
	Serialize {
		file: PathBuf,

		/// Show the change without writing the file.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
	/// Print the repository class of a file and its template parameters.
	DetectRepository {
		file: PathBuf,

		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Generate the implementation of the repository class in a file.
	///
	/// Writes `<library-dir>/src/repository/<Class>Impl.h`, includes it
	/// from the header and marks the repository processed.
	Repository {
		file: PathBuf,

		/// Library receiving the implementation. Defaults to the first
		/// resolved library root.
		#[arg(long, env = "LIBRARY_DIR")]
		library_dir: Option<PathBuf>,

		/// Show the change without writing any file.
		#[arg(long, default_value_t = false)]
		dry_run: bool,
	},
	/// Print the entity member queried by a `FindBy` method name.
	FindBy {
		/// Method name such as `FindByLastName`.
		method: String,
	},
	/// Print the resolved library roots, one per line.
	Libraries,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
