use std::collections::BTreeMap;

use derive_more::Deref;
use serde::Serialize;

use crate::AnnotateError;
use crate::AnnotateResult;
use crate::FieldModel;

/// Wrappers recognised as optional field types.
pub const OPTIONAL_PREFIXES: &[&str] = &["std::optional<", "optional<", "Optional<", "StdOptional<"];

/// Sentinel of the primary key block.
pub const PRIMARY_KEY_SENTINEL: &str = "GetPrimaryKey()";

/// A class that already has `GetTableName()` also counts as processed.
pub const TABLE_NAME_SENTINEL: &str = "GetTableName()";

/// Sentinel of the serialization block.
pub const SERIALIZATION_SENTINEL: &str = "Serialize()";

/// Generated member functions ready for injection.
///
/// Lines carry the member indentation relative to the class and are
/// re-indented by the injector to match the closing brace.
#[derive(Debug, Clone, PartialEq, Eq, Deref)]
pub struct GeneratedBlock {
	#[deref]
	lines: Vec<String>,
	sentinels: Vec<&'static str>,
}

impl GeneratedBlock {
	pub fn new(text: &str, sentinels: Vec<&'static str>) -> Self {
		Self {
			lines: text.lines().map(|line| line.trim_end().to_string()).collect(),
			sentinels,
		}
	}

	/// Substrings whose presence inside a class means the block was
	/// already injected.
	pub fn sentinels(&self) -> &[&'static str] {
		&self.sentinels
	}

	pub fn into_lines(self) -> Vec<String> {
		self.lines
	}
}

/// Accessors for the key value, the key name and the table name.
pub fn generate_primary_key_methods(field_type: &str, field_name: &str, class_name: &str) -> GeneratedBlock {
	let text = format!(
		"    inline {field_type} GetPrimaryKey() {{\n        return {field_name};\n    }}\n\n    inline Static StdString GetPrimaryKeyName() {{\n        return \"{field_name}\";\n    }}\n\n    inline Static StdString GetTableName() {{\n        return \"{class_name}\";\n    }}"
	);

	GeneratedBlock::new(&text, vec![PRIMARY_KEY_SENTINEL, TABLE_NAME_SENTINEL])
}

/// Whether `ty` is wrapped in one of the [`OPTIONAL_PREFIXES`].
pub fn is_optional_type(ty: &str) -> bool {
	optional_inner_type(ty).is_some()
}

/// The wrapped type of an optional, `std::optional<int>` gives `int`.
pub fn optional_inner_type(ty: &str) -> Option<&str> {
	let ty = ty.trim();
	OPTIONAL_PREFIXES
		.iter()
		.find_map(|prefix| ty.strip_prefix(prefix))
		.and_then(|rest| rest.strip_suffix('>'))
		.map(str::trim)
}

/// Whether generated code for `fields` needs `<optional>`.
pub fn needs_optional_include(fields: &[FieldModel]) -> bool {
	fields.iter().any(|field| is_optional_type(&field.ty))
}

#[derive(Serialize)]
struct FieldContext<'a> {
	name: &'a str,
	ty: &'a str,
	inner: &'a str,
	optional: bool,
}

#[derive(Serialize)]
struct CheckContext {
	condition: String,
	message: String,
}

#[derive(Serialize)]
struct SerializationContext<'a> {
	class_name: &'a str,
	fields: Vec<FieldContext<'a>>,
	checks: Vec<CheckContext>,
}

const SERIALIZATION_TEMPLATE: &str = r#"    StdString Serialize() const {
        JsonDocument doc;
{% for field in fields %}
{% if field.optional %}
        if ({{ field.name }}.has_value()) {
            doc["{{ field.name }}"] = {{ field.name }}.value();
        }
{% else %}
        doc["{{ field.name }}"] = {{ field.name }};
{% endif %}
{% endfor %}
        StdString output;
        serializeJson(doc, output);
        return output;
    }

    static {{ class_name }} Deserialize(CStdString& json) {
        {{ class_name }} object;
        JsonDocument doc;
        DeserializationError error = deserializeJson(doc, json);
        if (error) {
            return object;
        }
{% for field in fields %}
        if (!doc["{{ field.name }}"].isNull()) {
            object.{{ field.name }} = doc["{{ field.name }}"].as<{{ field.inner }}>();
        }
{% endfor %}
        return object;
    }

    StdVector<StdString> Validate() const {
        StdVector<StdString> errors;
{% for check in checks %}
        if ({{ check.condition }}) {
            errors.push_back("{{ check.message }}");
        }
{% endfor %}
        return errors;
    }
"#;

/// Serialize, Deserialize and Validate members covering every field.
///
/// Optional fields are written only when they hold a value and read only
/// when present in the document. `validation_fields_by_tag` drives the
/// checks emitted in `Validate()`.
pub fn generate_serialization_methods(
	class_name: &str,
	fields: &[FieldModel],
	validation_fields_by_tag: &BTreeMap<String, Vec<&FieldModel>>,
) -> AnnotateResult<GeneratedBlock> {
	let context = SerializationContext {
		class_name,
		fields: fields
			.iter()
			.map(|field| {
				let inner = optional_inner_type(&field.ty);
				FieldContext {
					name: &field.name,
					ty: &field.ty,
					inner: inner.unwrap_or(&field.ty),
					optional: inner.is_some(),
				}
			})
			.collect(),
		checks: validation_fields_by_tag
			.iter()
			.flat_map(|(tag, fields)| fields.iter().filter_map(move |field| validation_check(tag, field)))
			.collect(),
	};

	let mut env = minijinja::Environment::new();
	env.set_trim_blocks(true);
	env.set_lstrip_blocks(true);
	env.add_template("serialization", SERIALIZATION_TEMPLATE)
		.map_err(|e| AnnotateError::TemplateRender(e.to_string()))?;

	let rendered = env
		.get_template("serialization")
		.and_then(|template| template.render(minijinja::Value::from_serialize(&context)))
		.map_err(|e| AnnotateError::TemplateRender(e.to_string()))?;

	Ok(GeneratedBlock::new(&rendered, vec![SERIALIZATION_SENTINEL]))
}

/// The C++ condition that flags `field` as violating `tag`. `NotNull` has
/// nothing to check on plain values.
fn validation_check(tag: &str, field: &FieldModel) -> Option<CheckContext> {
	let name = &field.name;
	let optional = is_optional_type(&field.ty);
	let value = if optional { format!("{name}.value()") } else { name.clone() };
	let guard = |test: String| {
		if optional {
			format!("!{name}.has_value() || {test}")
		} else {
			test
		}
	};

	let (condition, message) = match tag {
		"NotNull" if optional => (format!("!{name}.has_value()"), format!("{name} must not be null")),
		"NotNull" if field.ty.trim_end().ends_with('*') => (format!("{name} == nullptr"), format!("{name} must not be null")),
		"NotNull" => return None,
		"NotEmpty" => (guard(format!("{value}.empty()")), format!("{name} must not be empty")),
		"NotBlank" => {
			(
				guard(format!(r#"{value}.find_first_not_of(" \t\r\n") == StdString::npos"#)),
				format!("{name} must not be blank"),
			)
		}
		other => (format!("!{other}Validator::IsValid({name})"), format!("{name} failed {other} validation")),
	};

	Some(CheckContext { condition, message })
}
