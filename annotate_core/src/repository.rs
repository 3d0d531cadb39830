//! Repository classes and their generated implementations.
//!
//! A repository is a class marked with the repository marker that derives
//! from `CpaRepository<Entity, Id>`:
//!
//! ```cpp
//! //@Repository
//! DefineStandardPointers(StudentRepository)
//! class StudentRepository : public CpaRepository<Student, int> {
//!     Public Virtual Optional<Student> FindByLastName(CStdString& lastName) = 0;
//! };
//! ```
//!
//! Processing writes `<library>/src/repository/StudentRepositoryImpl.h`
//! with one override per `FindBy` method, includes it from the repository
//! header and flips the marker.

use std::path::Path;
use std::path::PathBuf;
use std::sync::LazyLock;

use convert_case::Case;
use convert_case::Casing;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::AnnotateError;
use crate::AnnotateResult;
use crate::Marker;
use crate::MarkerEngine;
use crate::SourceFile;
use crate::scanner::LineKind;
use crate::scanner::classify_lines;
use crate::scanner::strip_comments;

/// Directory under a library root that holds generated implementations.
pub const REPOSITORY_DIR: &str = "src/repository";

/// Header every generated implementation includes.
pub const REPOSITORY_BASE_INCLUDE: &str = "CpaRepositoryImpl.h";

static REPOSITORY_BASE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"class\s+(\w+)\s*(?:final\s*)?:\s*public\s+CpaRepository\s*<\s*([^,<>]+?)\s*,\s*([^,<>]+?)\s*>")
		.expect("repository base pattern is valid")
});

static STANDARD_POINTERS: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"DefineStandardPointers\s*\(\s*(\w+)\s*\)").expect("standard pointers pattern is valid")
});

static FINDER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(
		r"(?i)^\s*(?:public\s+)?(?:virtual\s+)?(.+?)\s+(FindBy\w*)\s*\(([^)]*)\)\s*(?:const\s*)?(?:override\s*)?(?:=\s*0\s*)?;",
	)
	.expect("finder pattern is valid")
});

static FINDBY_METHOD: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)^FindBy(.+)$").expect("findby pattern is valid"));

static IDENTIFIER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("identifier pattern is valid"));

/// A `FindBy<Member>` query declared on a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinderMethod {
	pub return_type: String,
	pub name: String,
	/// The parameter list as written.
	pub params: String,
	/// Name of the first parameter.
	pub param_name: Option<String>,
	/// Entity member compared against the parameter.
	pub variable: String,
	/// Whether the return type is a vector or list of matches.
	pub collection: bool,
}

/// A detected repository class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryModel {
	pub class_name: String,
	pub entity_type: String,
	pub id_type: String,
	pub finders: Vec<FinderMethod>,
}

impl RepositoryModel {
	pub fn implementation_name(&self) -> String {
		format!("{}Impl", self.class_name)
	}
}

/// Result of [`write_implementation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImplOutcome {
	Created(PathBuf),
	AlreadyExists(PathBuf),
}

impl ImplOutcome {
	pub fn path(&self) -> &Path {
		match self {
			Self::Created(path) | Self::AlreadyExists(path) => path,
		}
	}

	pub fn changed(&self) -> bool {
		matches!(self, Self::Created(_))
	}
}

/// `LastName` becomes `lastName`. Only the first character changes.
pub fn pascal_to_camel(text: &str) -> String {
	let mut chars = text.chars();
	match chars.next() {
		Some(first) => first.to_lowercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// The entity member queried by a `FindBy` method, `FindByLastName` gives
/// `lastName`. The `FindBy` prefix is matched case-insensitively.
pub fn extract_findby_variable_name(method_name: &str) -> Option<String> {
	let captures = FINDBY_METHOD.captures(method_name.trim())?;
	Some(pascal_to_camel(&captures[1]))
}

/// Parse a `FindBy` declaration line.
pub fn parse_finder(line: &str) -> Option<FinderMethod> {
	let captures = FINDER.captures(line)?;
	let name = captures[2].to_string();
	let variable = extract_findby_variable_name(&name)?;
	let return_type = captures[1].trim().to_string();
	let params = captures[3].trim().to_string();
	let param_name = params
		.split(',')
		.next()
		.map(|param| param.split('=').next().unwrap_or(param))
		.and_then(|param| IDENTIFIER.find_iter(param).last())
		.map(|found| found.as_str().to_string())
		.filter(|name| name != "void");
	let lowered = return_type.to_lowercase();

	Some(FinderMethod {
		collection: lowered.contains("vector") || lowered.contains("list"),
		return_type,
		name,
		params,
		param_name,
		variable,
	})
}

/// Detect the repository class of `file`.
///
/// Requires an active `marker`, a class within reach of it that derives
/// from `CpaRepository<Entity, Id>`, and, when a `DefineStandardPointers`
/// line is present, that it names the same class. The marked declaration
/// must be the first definition of the class in the file.
pub fn detect_repository(file: &SourceFile, engine: &dyn MarkerEngine, marker: &Marker) -> Option<RepositoryModel> {
	let found = engine.detect(file, marker)?;
	let boundary = engine.boundaries(file, &found.class_name)?;

	let pointers = file
		.iter()
		.find_map(|line| STANDARD_POINTERS.captures(line).map(|captures| captures[1].to_string()));
	if pointers.as_deref().is_some_and(|name| name != found.class_name) {
		debug!(class = %found.class_name, "DefineStandardPointers names a different class");
		return None;
	}

	if !boundary.contains(found.class_line) {
		debug!(
			class = %found.class_name,
			line = found.class_line,
			"marked declaration is not the first definition of its class"
		);
		return None;
	}

	let header = strip_comments(&file.get(found.class_line - 1..boundary.end)?.join("\n"));
	let captures = REPOSITORY_BASE.captures(&header)?;
	if captures[1] != found.class_name {
		return None;
	}

	let kinds = classify_lines(file.as_slice());
	let finders = boundary
		.body()
		.filter(|number| kinds[number - 1] == LineKind::Code)
		.filter_map(|number| parse_finder(&file[number - 1]))
		.collect();

	Some(RepositoryModel {
		class_name: found.class_name,
		entity_type: captures[2].trim().to_string(),
		id_type: captures[3].trim().to_string(),
		finders,
	})
}

/// `<library_dir>/src/repository/<Class>Impl.h`.
pub fn implementation_path(library_dir: &Path, class_name: &str) -> PathBuf {
	library_dir
		.join(REPOSITORY_DIR)
		.join(format!("{class_name}Impl.h"))
}

const IMPLEMENTATION_TEMPLATE: &str = r#"#ifndef {{ guard }}
#define {{ guard }}

#include "{{ base_include }}"

class {{ impl_name }} final : public {{ class_name }}, public CpaRepositoryImpl<{{ entity_type }}, {{ id_type }}> {
    Public Virtual ~{{ impl_name }}() = default;
{% for finder in finders %}

    {{ finder.return_type }} {{ finder.name }}({{ finder.params }}) override {
{% if finder.collection %}
        {{ finder.return_type }} results;
        for (const auto& entity : FindAll()) {
            if (entity.{{ finder.variable }} == {{ finder.param_name }}) {
                results.push_back(entity);
            }
        }
        return results;
{% else %}
        for (const auto& entity : FindAll()) {
            if (entity.{{ finder.variable }} == {{ finder.param_name }}) {
                return entity;
            }
        }
        return {{ finder.return_type }}();
{% endif %}
    }
{% endfor %}
};

#endif // {{ guard }}
"#;

#[derive(Serialize)]
struct ImplementationContext<'a> {
	guard: String,
	base_include: &'a str,
	impl_name: String,
	class_name: &'a str,
	entity_type: &'a str,
	id_type: &'a str,
	finders: Vec<&'a FinderMethod>,
}

/// Render the implementation header for `model`. Finders without a
/// parameter have nothing to compare against and are left to the base
/// class.
pub fn generate_implementation(model: &RepositoryModel) -> AnnotateResult<String> {
	let impl_name = model.implementation_name();
	let context = ImplementationContext {
		guard: format!("_{}_H_", impl_name.to_case(Case::UpperSnake)),
		base_include: REPOSITORY_BASE_INCLUDE,
		impl_name,
		class_name: &model.class_name,
		entity_type: &model.entity_type,
		id_type: &model.id_type,
		finders: model
			.finders
			.iter()
			.filter(|finder| finder.param_name.is_some())
			.collect(),
	};

	let mut env = minijinja::Environment::new();
	env.set_trim_blocks(true);
	env.set_lstrip_blocks(true);
	env.set_keep_trailing_newline(true);
	env.add_template("implementation", IMPLEMENTATION_TEMPLATE)
		.map_err(|e| AnnotateError::TemplateRender(e.to_string()))?;

	env.get_template("implementation")
		.and_then(|template| template.render(minijinja::Value::from_serialize(&context)))
		.map_err(|e| AnnotateError::TemplateRender(e.to_string()))
}

/// Write the implementation of `model` under `library_dir` unless the file
/// already exists. Existing implementations are never overwritten.
pub fn write_implementation(model: &RepositoryModel, library_dir: &Path) -> AnnotateResult<ImplOutcome> {
	let path = implementation_path(library_dir, &model.class_name);
	if path.exists() {
		debug!(path = %path.display(), "repository implementation already exists");
		return Ok(ImplOutcome::AlreadyExists(path));
	}

	let content = generate_implementation(model)?;
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).map_err(|e| {
			AnnotateError::WriteFile {
				path: parent.display().to_string(),
				reason: e.to_string(),
			}
		})?;
	}

	std::fs::write(&path, content).map_err(|e| {
		AnnotateError::WriteFile {
			path: path.display().to_string(),
			reason: e.to_string(),
		}
	})?;

	Ok(ImplOutcome::Created(path))
}

/// The path used in the `#include` added to the repository header: the
/// absolute path of the implementation when it can be resolved.
pub fn include_path_for(implementation: &Path) -> String {
	std::fs::canonicalize(implementation)
		.or_else(|_| std::path::absolute(implementation))
		.unwrap_or_else(|_| implementation.to_path_buf())
		.display()
		.to_string()
}
