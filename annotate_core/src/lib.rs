//! `annotate_core` processes marker comments in C++ headers before a build.
//!
//! A class marked as an entity gets primary key accessors and serialization
//! members generated from its fields; a class marked as a repository gets
//! an implementation header written into its library. After an action the
//! marker is rewritten into its processed spelling, so running the tool
//! again changes nothing.
//!
//! ```cpp
//! /// @Entity
//! class Student {
//!     /// @Id
//!     /// @NotNull
//!     int rollNo;
//!     StdString name;
//! };
//! ```
//!
//! ## Processing Pipeline
//!
//! ```text
//! header file
//!   → Marker detector (active class marker + class declaration within 10 lines)
//!   → Boundary locator (brace depth from the declaration to its closing brace)
//!   → Field extractor (identifier and validation markers, data members)
//!   → Code generator (primary key, Serialize/Deserialize/Validate)
//!   → Injector (sentinel guard, insert before the closing brace, includes)
//!   → Marker rewrite (`/// @Entity` → `/* @Entity */`, `//@Id` → `/*@Id*/`)
//! ```
//!
//! ## Modules
//!
//! - [`config`]: `annotate.toml` loading and the resolved run [`Settings`].
//! - [`project`]: Header discovery with `.gitignore` and exclude support.
//! - [`roots`]: Project root and library root resolution.
//! - [`scanner`]: Comment-aware line classification and brace counting.
//! - [`repository`]: Repository detection and implementation generation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use annotate_core::Context;
//! use annotate_core::Overrides;
//! use annotate_core::Settings;
//! use annotate_core::roots::RootContext;
//!
//! let roots = RootContext::from_process(None).unwrap();
//! let settings = Settings::load(&roots, Overrides::default()).unwrap();
//! let report = annotate_core::run(&Context::new(settings)).unwrap();
//! for file in report.changed_files() {
//!     println!("{}", file.path.display());
//! }
//! ```

pub use boundary::*;
pub use config::*;
pub use detect::*;
pub use engine::*;
pub use error::*;
pub use extract::*;
pub use generate::*;
pub use inject::*;
pub use marker::*;
pub use pipeline::*;
pub use project::*;
pub use registry::*;
pub use source::*;

mod boundary;
pub mod config;
mod detect;
mod engine;
#[allow(unused_assignments)]
mod error;
mod extract;
mod generate;
mod inject;
mod marker;
mod pipeline;
pub mod project;
mod registry;
pub mod repository;
pub mod roots;
pub mod scanner;
mod source;

#[cfg(test)]
mod __fixtures;
