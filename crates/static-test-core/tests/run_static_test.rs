#![cfg(unix)]

use std::path::PathBuf;

use serde_json::json;
use static_test_core::command::shell_quote;
use static_test_core::{run_static_test, FailureKind, RunOptions, StaticTestError, Verdict};

/// Rejects any program mentioning `bad_call()` with a "no matching function"
/// diagnostic and accepts everything else. Each source it sees is appended
/// to `seen.log` next to the build directory.
const REJECT_BAD_CALL: &str = r#"for a; do src=$a; done
cat "$src" >> ../seen.log
echo '@@@@' >> ../seen.log
if grep -q 'bad_call()' "$src"; then
  echo "$src:4:3: error: no matching function for call to 'bad_call'" 1>&2
  exit 1
fi
exit 0
"#;

const ACCEPT_ALL: &str = "exit 0\n";

const REJECT_OTHER_MESSAGE: &str = "echo 'error: use of undeclared identifier' 1>&2\nexit 1\n";

struct Project {
    root: tempfile::TempDir,
    file: PathBuf,
}

impl Project {
    fn new(test_source: &str, compiler: &str) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let file = root.path().join("foo").join("test_foo.cpp");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, test_source).unwrap();
        std::fs::write(root.path().join("fake_cc.sh"), compiler).unwrap();
        let project = Self { root, file };
        project.add_build_dir("build");
        project.write_db(&["build"], false);
        project
    }

    fn add_build_dir(&self, name: &str) {
        std::fs::create_dir_all(self.root.path().join(name)).unwrap();
    }

    fn file_key(&self) -> String {
        self.file.to_str().unwrap().to_string()
    }

    fn command(&self) -> String {
        format!(
            "sh {} -Wall -c {}",
            shell_quote(self.root.path().join("fake_cc.sh").to_str().unwrap()),
            shell_quote(&self.file_key())
        )
    }

    fn write_db(&self, build_dirs: &[&str], trailing_comma: bool) {
        let mut entries: Vec<serde_json::Value> = build_dirs
            .iter()
            .map(|d| {
                json!({
                    "directory": self.root.path().join(d),
                    "command": self.command(),
                    "file": self.file_key(),
                })
            })
            .collect();
        entries.push(json!({
            "directory": self.root.path().join("build"),
            "command": "sh -c 'exit 0' other.cpp",
            "file": "other.cpp",
        }));
        let mut text = serde_json::to_string_pretty(&entries).unwrap();
        if trailing_comma {
            let close = text.rfind(']').unwrap();
            let last_obj = text[..close].rfind('}').unwrap();
            text.insert(last_obj + 1, ',');
        }
        std::fs::write(self.root.path().join("compile_commands.json"), text).unwrap();
    }

    fn options(&self, name: &str) -> RunOptions {
        RunOptions {
            name: name.to_string(),
            file: self.file_key(),
            compile_commands: None,
            keep_program: false,
        }
    }

    fn seen_programs(&self) -> Vec<String> {
        let log = std::fs::read_to_string(self.root.path().join("seen.log")).unwrap_or_default();
        log.split("@@@@\n")
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn build_dir_files(&self, name: &str) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.root.path().join(name))
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }
}

const SINGLE: &str = "#include \"foo.h\"\n\
int helper() { return 0; }\n\
\n\
STATIC_TEST(Foo) {\n\
  SHOULD_NOT_COMPILE(bad_call());\n\
}\n";

#[test]
fn rejected_code_passes() {
    let project = Project::new(SINGLE, REJECT_BAD_CALL);
    let report = run_static_test(&project.options("Foo")).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].verdict, Verdict::Pass);
    assert_eq!(report.exit_code(), 0);
    assert!(report.error_lines().is_empty());
}

#[test]
fn accepted_code_is_an_unexpected_success() {
    let project = Project::new(SINGLE, ACCEPT_ALL);
    let report = run_static_test(&project.options("Foo")).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(
        report.results[0].verdict,
        Verdict::Fail(FailureKind::UnexpectedSuccess)
    );
    assert_eq!(report.exit_code(), 1);
    assert_eq!(
        report.error_lines(),
        vec![format!(
            "ERROR: {}:5: must fail to compile but instead compiled without error.",
            project.file_key()
        )]
    );
}

#[test]
fn missing_expected_message_is_a_mismatch() {
    let src = "STATIC_TEST(Foo) {\n\
      SHOULD_NOT_COMPILE_WITH_MESSAGE(bad_call(), \"no matching function\");\n\
    }\n";
    let project = Project::new(src, REJECT_OTHER_MESSAGE);
    let report = run_static_test(&project.options("Foo")).unwrap();
    assert_eq!(
        report.results[0].verdict,
        Verdict::Fail(FailureKind::MessageMismatch)
    );
    assert_eq!(report.exit_code(), 2);
    let lines = report.error_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with(&format!(
        "ERROR: {}:2: message 'no matching function' not found in compilation error: \n",
        project.file_key()
    )));
    assert!(lines[0].contains("use of undeclared identifier"));
}

#[test]
fn present_expected_message_passes() {
    let src = "STATIC_TEST(Foo) {\n\
      SHOULD_NOT_COMPILE_WITH_MESSAGE(bad_call(), \"no matching function\");\n\
    }\n";
    let project = Project::new(src, REJECT_BAD_CALL);
    let report = run_static_test(&project.options("Foo")).unwrap();
    assert_eq!(report.results[0].verdict, Verdict::Pass);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn sibling_directives_are_compiled_in_isolation() {
    let src = "int shared() { return 1; }\n\
STATIC_TEST(Foo) {\n\
  int x = shared();\n\
  SHOULD_NOT_COMPILE(bad_call());\n\
  SHOULD_NOT_COMPILE(x.first_only());\n\
}\n\
STATIC_TEST(Other) {\n\
  SHOULD_NOT_COMPILE(never_here());\n\
}\n";
    let project = Project::new(src, REJECT_BAD_CALL);
    let report = run_static_test(&project.options("Foo")).unwrap();

    let seen = project.seen_programs();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].contains("bad_call();"));
    assert!(!seen[0].contains("first_only"));
    assert!(seen[1].contains("x.first_only();"));
    assert!(!seen[1].contains("bad_call"));
    for program in &seen {
        assert!(program.contains("int shared() { return 1; }"));
        assert!(program.contains("int x = shared();"));
        assert!(!program.contains("never_here"));
        assert!(!program.contains("STATIC_TEST"));
    }

    // The fake compiler only rejects bad_call(), so the second one "compiles".
    assert_eq!(report.results[0].verdict, Verdict::Pass);
    assert_eq!(
        report.results[1].verdict,
        Verdict::Fail(FailureKind::UnexpectedSuccess)
    );
    assert_eq!(report.results[0].line, 4);
    assert_eq!(report.results[1].line, 5);
}

#[test]
fn block_without_directives_needs_no_database() {
    let project = Project::new("STATIC_TEST(Foo) {\n  int ok = 1;\n}\n", ACCEPT_ALL);
    std::fs::remove_file(project.root.path().join("compile_commands.json")).unwrap();
    let report = run_static_test(&project.options("Foo")).unwrap();
    assert!(report.results.is_empty());
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn every_matching_entry_is_built_in_order() {
    let project = Project::new(SINGLE, REJECT_BAD_CALL);
    project.add_build_dir("build-release");
    project.write_db(&["build", "build-release"], false);
    let report = run_static_test(&project.options("Foo")).unwrap();
    assert_eq!(report.results.len(), 2);
    assert!(report.results[0].directory.ends_with("build"));
    assert!(report.results[1].directory.ends_with("build-release"));
}

#[test]
fn trailing_separator_in_database_is_tolerated() {
    let project = Project::new(SINGLE, REJECT_BAD_CALL);
    project.write_db(&["build"], true);
    let text =
        std::fs::read_to_string(project.root.path().join("compile_commands.json")).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&text).is_err());

    let report = run_static_test(&project.options("Foo")).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.exit_code(), 0);
}

#[test]
fn transient_program_is_cleaned_up_unless_kept() {
    let project = Project::new(SINGLE, REJECT_BAD_CALL);
    run_static_test(&project.options("Foo")).unwrap();
    assert!(project.build_dir_files("build").is_empty());

    let mut opts = project.options("Foo");
    opts.keep_program = true;
    run_static_test(&opts).unwrap();
    let kept = project.build_dir_files("build");
    assert_eq!(kept.len(), 1);
    let name = kept[0].file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("static_test_") && name.ends_with(".cpp"), "{name}");
    assert!(std::fs::read_to_string(&kept[0]).unwrap().contains("bad_call();"));
}

#[test]
fn explicit_database_path_overrides_default() {
    let project = Project::new(SINGLE, REJECT_BAD_CALL);
    let elsewhere = project.root.path().join("db");
    std::fs::create_dir_all(&elsewhere).unwrap();
    std::fs::rename(
        project.root.path().join("compile_commands.json"),
        elsewhere.join("cc.json"),
    )
    .unwrap();

    let mut opts = project.options("Foo");
    assert!(run_static_test(&opts).is_err());
    opts.compile_commands = Some(elsewhere.join("cc.json"));
    assert_eq!(run_static_test(&opts).unwrap().exit_code(), 0);
}

#[test]
fn compiler_that_cannot_start_does_not_stop_the_run() {
    let src = "STATIC_TEST(Foo) {\n\
      SHOULD_NOT_COMPILE(bad_call());\n\
      SHOULD_NOT_COMPILE_WITH_MESSAGE(other(), \"no matching function\");\n\
    }\n";
    let project = Project::new(src, REJECT_BAD_CALL);
    let not_executable = project.root.path().join("cc-no-exec");
    std::fs::write(&not_executable, "#!/bin/sh\nexit 0\n").unwrap();
    let db = json!([{
        "directory": project.root.path().join("build"),
        "arguments": [not_executable, "-c", project.file_key()],
        "file": project.file_key(),
    }]);
    std::fs::write(
        project.root.path().join("compile_commands.json"),
        serde_json::to_string(&db).unwrap(),
    )
    .unwrap();

    let report = run_static_test(&project.options("Foo")).unwrap();
    assert_eq!(report.results.len(), 2);
    assert!(report.results.iter().all(|r| r.spawn_failed));
    assert_eq!(report.results[0].verdict, Verdict::Pass);
    assert_eq!(
        report.results[1].verdict,
        Verdict::Fail(FailureKind::MessageMismatch)
    );
    assert!(report.results[1].compiler_output.starts_with("Failed to execute: "));
    assert_eq!(report.exit_code(), 2);
}

fn structural_code(err: &anyhow::Error) -> Option<&'static str> {
    err.downcast_ref::<StaticTestError>().map(|e| e.code())
}

#[test]
fn unknown_test_name_is_structural() {
    let project = Project::new(SINGLE, REJECT_BAD_CALL);
    let err = run_static_test(&project.options("Nope")).unwrap_err();
    assert_eq!(structural_code(&err), Some("STATIC_TEST_NOT_FOUND"));
}

#[test]
fn file_missing_from_database_is_structural() {
    let project = Project::new(SINGLE, REJECT_BAD_CALL);
    let mut opts = project.options("Foo");
    let alias = project
        .root
        .path()
        .join("foo")
        .join("..")
        .join("foo")
        .join("test_foo.cpp");
    opts.file = alias.to_str().unwrap().to_string();
    let err = run_static_test(&opts).unwrap_err();
    assert_eq!(structural_code(&err), Some("COMPILE_DB_NO_ENTRY"));
}

#[test]
fn malformed_database_is_structural() {
    let project = Project::new(SINGLE, REJECT_BAD_CALL);
    std::fs::write(
        project.root.path().join("compile_commands.json"),
        "[{\"file\": ",
    )
    .unwrap();
    let err = run_static_test(&project.options("Foo")).unwrap_err();
    assert_eq!(structural_code(&err), Some("COMPILE_DB_PARSE"));
}
