use std::path::Path;

use crate::AnnotateConfig;
use crate::Context;
use crate::Overrides;
use crate::PatternEngine;
use crate::Settings;
use crate::SourceFile;
use crate::ValidationMarkerRegistry;

pub const STUDENT_HEADER: &str = r#"#ifndef STUDENT_H
#define STUDENT_H

#include <StandardDefines.h>

/// @Entity
class Student {
    Public:
    /// @Id
    /// @NotNull
    int rollNo;

    StdString name;
};

#endif
"#;

pub const PRIMARY_KEY_BLOCK: &str = r#"    inline int GetPrimaryKey() {
        return rollNo;
    }

    inline Static StdString GetPrimaryKeyName() {
        return "rollNo";
    }

    inline Static StdString GetTableName() {
        return "Student";
    }"#;

pub const NESTED_CLASS: &str = r#"/// @Entity
class Outer {
    struct Inner {
        int a;
    };
    std::function<void()> callback = []() {
        return;
    };
    const char* brace = "}";
};
int trailing;
"#;

pub const MODEL_CLASS: &str = r#"class Model {
    Public:
    /// @NotEmpty
    StdString name;
    std::optional<int> age;
    static int counter;
    struct Nested {
        int hidden;
    };
    void Touch() { int local = 0; }
    int Get() const {
        int inner = 1;
        return inner;
    }
    int* ptr = nullptr;
};
"#;

pub const COMPOSITE_KEY_CLASS: &str = r#"/// @Entity
class Pair {
    /// @Id
    int left;
    /// @Id
    int right;
};
"#;

pub const REPOSITORY_HEADER: &str = r#"#ifndef STUDENT_REPOSITORY_H
#define STUDENT_REPOSITORY_H

#include "Student.h"

//@Repository
DefineStandardPointers(StudentRepository)
class StudentRepository : public CpaRepository<Student, int> {
    Public Virtual Optional<Student> FindByLastName(CStdString& lastName) = 0;
    Public Virtual StdVector<Student> FindByAge(int age) = 0;
};

#endif
"#;

pub fn source(content: &str) -> SourceFile {
	SourceFile::parse("Fixture.h", content)
}

pub fn settings(root: &Path) -> Settings {
	Settings::new(root, None, Overrides::default())
}

pub fn settings_with(root: &Path, config: Option<&AnnotateConfig>, overrides: Overrides) -> Settings {
	Settings::new(root, config, overrides)
}

/// A context using the pattern engine and the built-in validation markers.
pub fn context(settings: Settings) -> Context {
	Context::with_engine(settings, Box::new(PatternEngine)).with_registry(ValidationMarkerRegistry::builtin())
}

pub fn write(path: &Path, content: &str) {
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap_or_else(|e| panic!("create_dir_all: {e}"));
	}
	std::fs::write(path, content).unwrap_or_else(|e| panic!("write: {e}"));
}

pub fn read(path: &Path) -> String {
	std::fs::read_to_string(path).unwrap_or_else(|e| panic!("read: {e}"))
}
