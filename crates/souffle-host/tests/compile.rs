//! Compile-then-attach with stand-in compilers.

#![cfg(unix)]

mod common;

use common::{Fixture, SIMPLE_PROGRAM, check_c, n};
use souffle_host::{Compiler, Error, NamePolicy, artifact_extension};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// A compiler that creates `<--dl-program>.<ext>` and records its arguments.
fn fake_souffle(dir: &Path) -> PathBuf {
    script(
        dir,
        &format!(
            r#"echo "$@" > "$(dirname "$0")/args"
while [ $# -gt 0 ]; do
  if [ "$1" = "--dl-program" ]; then out="$2"; fi
  shift
done
touch "$out.{}""#,
            artifact_extension().unwrap()
        ),
    )
}

fn failing_souffle(dir: &Path) -> PathBuf {
    script(dir, "echo 'Error: syntax error in file simple_program.dl at line 3' >&2\nexit 1")
}

fn script(dir: &Path, body: &str) -> PathBuf {
    let bin = dir.join("bin");
    std::fs::create_dir_all(&bin).unwrap();
    let path = bin.join("souffle");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[test]
fn test_compile_str_in_work_dir() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let f = Fixture::new(NamePolicy::Unique);
    let host = f
        .host
        .with_compiler(Compiler::new(fake_souffle(tools.path())).with_flags(["-w"]));

    let program = host
        .compile_str(SIMPLE_PROGRAM, "simple_program", Some(work.path()))
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(work.path().join("simple_program.dl")).unwrap(),
        SIMPLE_PROGRAM
    );
    let artifact = work
        .path()
        .join(format!("simple_program.{}", artifact_extension().unwrap()));
    assert_eq!(program.path(), artifact.canonicalize().unwrap());
    assert!(program.scratch_dir().is_none());

    let args = std::fs::read_to_string(tools.path().join("bin").join("args")).unwrap();
    let expected = format!(
        "-s native --dl-program {} -w {}\n",
        work.path().join("simple_program").display(),
        work.path().join("simple_program.dl").display()
    );
    assert_eq!(args, expected);

    program.run().unwrap();
    check_c(&program, &[n(1), n(2)]);
}

#[test]
fn test_compile_str_scratch_dir_lives_with_handle() {
    let tools = tempfile::tempdir().unwrap();
    let f = Fixture::new(NamePolicy::Unique);
    let host = f.host.with_compiler(Compiler::new(fake_souffle(tools.path())));

    let program = host.compile_str(SIMPLE_PROGRAM, "simple_program", None).unwrap();
    let scratch = program.scratch_dir().unwrap().to_path_buf();
    assert!(scratch.join("simple_program.dl").is_file());
    assert!(program.path().starts_with(scratch.canonicalize().unwrap()));

    drop(program);
    assert!(!scratch.exists());
}

#[test]
fn test_work_dir_must_be_a_directory() {
    let tools = tempfile::tempdir().unwrap();
    let f = Fixture::new(NamePolicy::Unique);
    let host = f.host.with_compiler(Compiler::new(fake_souffle(tools.path())));
    let not_dir = tools.path().join("plain-file");
    std::fs::write(&not_dir, b"").unwrap();

    let err = host
        .compile_str(SIMPLE_PROGRAM, "simple_program", Some(&not_dir))
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(err.to_string().contains("is not a directory"));
}

#[test]
fn test_compiler_diagnostics_are_reported() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let f = Fixture::new(NamePolicy::Unique);
    let host = f.host.with_compiler(Compiler::new(failing_souffle(tools.path())));

    let err = host
        .compile_str(SIMPLE_PROGRAM, "simple_program", Some(work.path()))
        .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("compilation failed: command line '"));
    assert!(message.contains("--dl-program"));
    assert!(message.contains("syntax error in file simple_program.dl"));
    assert_eq!(f.loader.loads(), 0);
}

#[test]
fn test_compile_defaults_name_and_output() {
    let tools = tempfile::tempdir().unwrap();
    let f = Fixture::new(NamePolicy::Unique);
    let source = f.dir.path().join("simple_program.dl");
    std::fs::write(&source, SIMPLE_PROGRAM).unwrap();
    let artifact_dir = f.dir.path().to_path_buf();
    let host = f.host.with_compiler(Compiler::new(fake_souffle(tools.path())));

    let program = host.compile(&source, None, None).unwrap();
    assert_eq!(program.name(), "simple_program");
    assert_eq!(
        program.path(),
        artifact_dir
            .join(format!("simple_program.{}", artifact_extension().unwrap()))
            .canonicalize()
            .unwrap()
    );
}

#[test]
fn test_taken_name_is_rejected_before_compiling() {
    let tools = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    let f = Fixture::new(NamePolicy::Unique);
    let _live = f.attach_simple();
    let host = f.host.with_compiler(Compiler::new(fake_souffle(tools.path())));

    let err = host
        .compile_str(SIMPLE_PROGRAM, "simple_program", Some(work.path()))
        .unwrap_err();
    assert!(err.to_string().contains("already loaded"));

    let source = work.path().join("simple_program.dl");
    std::fs::write(&source, SIMPLE_PROGRAM).unwrap();
    let err = host.compile(&source, None, None).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    assert!(!tools.path().join("bin").join("args").exists());
    assert_eq!(host.names().holders("simple_program"), 1);
}
