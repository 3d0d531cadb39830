use std::path::Path;

use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub const STUDENT_HEADER: &str = "#ifndef STUDENT_H\n#define STUDENT_H\n\n/// @Entity\nclass Student {\n    Public:\n    /// @Id\n    int rollNo;\n    StdString name;\n};\n\n#endif\n";

pub const REPOSITORY_HEADER: &str = "#ifndef STUDENT_REPOSITORY_H\n#define STUDENT_REPOSITORY_H\n\n//@Repository\nDefineStandardPointers(StudentRepository)\nclass StudentRepository : public CpaRepository<Student, int> {\n    Public Virtual Optional<Student> FindByName(CStdString& name) = 0;\n};\n\n#endif\n";

/// The `annotate` binary running in `dir`, isolated from the root and
/// marker variables of the calling environment.
pub fn annotate_cmd(dir: &Path) -> Command {
	let mut cmd = Command::new(get_cargo_bin("annotate"));
	cmd.current_dir(dir)
		.env("NO_COLOR", "1")
		.env_remove("PROJECT_DIR")
		.env_remove("CMAKE_PROJECT_DIR")
		.env_remove("LIBRARY_DIR")
		.env_remove("ANNOTATE_LIBRARY_DIRS")
		.env_remove("SERIALIZABLE_MACRO")
		.env_remove("ANNOTATE_LOG");
	cmd
}
