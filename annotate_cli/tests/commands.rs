mod common;

use annotate_core::AnyEmptyResult;
use serde_json::Value;

use crate::common::REPOSITORY_HEADER;
use crate::common::STUDENT_HEADER;
use crate::common::annotate_cmd;

#[test]
fn ids_lists_identifier_fields() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("Student.h"), STUDENT_HEADER)?;

	annotate_cmd(tmp.path())
		.arg("ids")
		.arg("Student.h")
		.assert()
		.success()
		.stdout(predicates::str::contains("Student\n  int rollNo (line 8)\n"));

	Ok(())
}

#[test]
fn ids_as_json() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("Student.h"), STUDENT_HEADER)?;

	let output = annotate_cmd(tmp.path())
		.args(["ids", "Student.h", "--format", "json"])
		.output()?;
	assert!(output.status.success());

	let json: Value = serde_json::from_slice(&output.stdout)?;
	assert_eq!(json["class"], "Student");
	assert_eq!(json["fields"][0]["type"], "int");
	assert_eq!(json["fields"][0]["name"], "rollNo");
	assert_eq!(json["fields"][0]["line"], 8);

	Ok(())
}

#[test]
fn ids_without_identifier_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("Plain.h"), "/// @Entity\nclass Plain {\n    int value;\n};\n")?;

	annotate_cmd(tmp.path())
		.args(["ids", "Plain.h"])
		.assert()
		.code(1)
		.stderr(predicates::str::contains("no identifier fields in class Plain"));

	Ok(())
}

#[test]
fn primary_key_stage_then_noop() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let header = tmp.path().join("Student.h");
	std::fs::write(&header, STUDENT_HEADER)?;

	annotate_cmd(tmp.path())
		.args(["primary-key", "Student.h"])
		.assert()
		.success()
		.stdout(predicates::str::contains("Updated Student.h"));

	let content = std::fs::read_to_string(&header)?;
	assert!(content.contains("        return \"rollNo\";"));
	assert!(content.contains("    /* @Id */"));
	assert!(content.contains("/// @Entity"));
	assert!(!content.contains("Serialize()"));

	annotate_cmd(tmp.path())
		.args(["primary-key", "Student.h"])
		.assert()
		.code(1)
		.stdout(predicates::str::contains("already up to date"));
	assert_eq!(std::fs::read_to_string(&header)?, content);

	Ok(())
}

#[test]
fn primary_key_dry_run_keeps_file() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let header = tmp.path().join("Student.h");
	std::fs::write(&header, STUDENT_HEADER)?;

	annotate_cmd(tmp.path())
		.args(["primary-key", "Student.h", "--dry-run"])
		.assert()
		.success()
		.stdout(predicates::str::contains("Would update Student.h"))
		.stdout(predicates::str::contains("+        return \"Student\";"));

	assert_eq!(std::fs::read_to_string(&header)?, STUDENT_HEADER);

	Ok(())
}

#[test]
fn serialize_stage_marks_entity() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let header = tmp.path().join("Student.h");
	std::fs::write(&header, STUDENT_HEADER)?;

	annotate_cmd(tmp.path())
		.args(["serialize", "Student.h"])
		.assert()
		.success();

	let content = std::fs::read_to_string(&header)?;
	assert!(content.contains("    static Student Deserialize(CStdString& json) {"));
	assert!(content.contains("/* @Entity */"));
	assert!(content.contains("    /// @Id"));

	Ok(())
}

#[test]
fn detect_repository_prints_template_parameters() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("StudentRepository.h"), REPOSITORY_HEADER)?;

	annotate_cmd(tmp.path())
		.args(["detect-repository", "StudentRepository.h"])
		.assert()
		.success()
		.stdout(predicates::str::contains("StudentRepository"))
		.stdout(predicates::str::contains("Entity   Student"))
		.stdout(predicates::str::contains("Id       int"))
		.stdout(predicates::str::contains("FindByName -> name"));

	let output = annotate_cmd(tmp.path())
		.args(["detect-repository", "StudentRepository.h", "--format", "json"])
		.output()?;
	let json: Value = serde_json::from_slice(&output.stdout)?;
	assert_eq!(json["entity_type"], "Student");
	assert_eq!(json["finders"][0]["variable"], "name");

	Ok(())
}

#[test]
fn detect_repository_without_marker_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("Student.h"), STUDENT_HEADER)?;

	annotate_cmd(tmp.path())
		.args(["detect-repository", "Student.h"])
		.assert()
		.code(1);

	Ok(())
}

#[test]
fn repository_writes_implementation() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let header = tmp.path().join("StudentRepository.h");
	std::fs::write(&header, REPOSITORY_HEADER)?;
	std::fs::create_dir_all(tmp.path().join("lib"))?;

	annotate_cmd(tmp.path())
		.args(["repository", "StudentRepository.h", "--library-dir", "lib"])
		.assert()
		.success()
		.stdout(predicates::str::contains("Updated StudentRepository.h"));

	let implementation = std::fs::read_to_string(tmp.path().join("lib/src/repository/StudentRepositoryImpl.h"))?;
	assert!(implementation.contains("class StudentRepositoryImpl final : public StudentRepository"));
	assert!(implementation.contains("            if (entity.name == name) {"));

	let content = std::fs::read_to_string(&header)?;
	assert!(content.contains("/*@Repository*/"));
	assert!(content.contains("StudentRepositoryImpl.h\"\n#endif\n"));

	Ok(())
}

#[test]
fn repository_without_library_reports_diagnostic() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let header = tmp.path().join("StudentRepository.h");
	std::fs::write(&header, REPOSITORY_HEADER)?;

	annotate_cmd(tmp.path())
		.args(["repository", "StudentRepository.h"])
		.assert()
		.code(1)
		.stderr(predicates::str::contains("annotate::missing_library_dir"));
	assert_eq!(std::fs::read_to_string(&header)?, REPOSITORY_HEADER);

	Ok(())
}

#[test]
fn find_by_prints_variable_name() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	annotate_cmd(tmp.path())
		.args(["find-by", "FindByLastName"])
		.assert()
		.success()
		.stdout("lastName\n");

	annotate_cmd(tmp.path())
		.args(["find-by", "GetLastName"])
		.assert()
		.code(1);

	Ok(())
}

#[test]
fn libraries_lists_resolved_roots() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let library = tmp.path().join(".pio/libdeps/esp32/Core");
	std::fs::create_dir_all(library.join("src"))?;

	annotate_cmd(tmp.path())
		.arg("libraries")
		.assert()
		.success()
		.stdout(predicates::str::contains(library.canonicalize()?.display().to_string()));

	Ok(())
}

#[test]
fn libraries_from_environment() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let library = tmp.path().join("vendor");
	std::fs::create_dir_all(&library)?;

	annotate_cmd(tmp.path())
		.arg("libraries")
		.env("LIBRARY_DIR", &library)
		.assert()
		.success()
		.stdout(predicates::str::contains(library.canonicalize()?.display().to_string()));

	Ok(())
}

#[test]
fn no_libraries_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;

	annotate_cmd(tmp.path())
		.arg("libraries")
		.assert()
		.code(1)
		.stderr(predicates::str::contains("no library roots found"));

	Ok(())
}
