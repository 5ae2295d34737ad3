//! Contract Invariant Tests
//!
//! These tests verify the guarantees of a build job: strict ordering,
//! header exactly once, and no damage to the output path on failure.

use std::cell::Cell;
use std::fs;
use std::path::Path;

use headerforge_core::{
    BuildConfig, BuildError, BuildJob, BuildPipeline, BuildStage, Compiler, ExternalCompiler, HeaderInjector,
    ToolOutput, ToolSpec,
};
use tempfile::tempdir;

/// Stand-in for the external minifier
enum FakeTool {
    /// Strips `;` before `}` and writes the result
    Minify,
    /// Exits non-zero with a diagnostic
    Fail,
    /// Exits zero but writes nothing
    Silent,
}

struct FakeCompiler {
    tool: FakeTool,
    calls: Cell<u32>,
}

impl FakeCompiler {
    fn new(tool: FakeTool) -> Self {
        Self { tool, calls: Cell::new(0) }
    }
}

impl Compiler for FakeCompiler {
    fn name(&self) -> &str {
        "fake"
    }

    fn compile(&self, spec: &ToolSpec, source: &Path, output: &Path) -> Result<ToolOutput, BuildError> {
        self.calls.set(self.calls.get() + 1);
        let run = ToolOutput {
            program: spec.program.clone(),
            args: spec.args.clone(),
            exit_code: Some(0),
            ..Default::default()
        };

        match self.tool {
            FakeTool::Minify => {
                let code = fs::read_to_string(source).unwrap();
                fs::write(output, code.replace(";}", "}")).unwrap();
                Ok(run)
            }
            FakeTool::Fail => Err(BuildError::ExternalToolFailure {
                program: spec.program.clone(),
                exit_code: Some(1),
                diagnostics: "JSC_PARSE_ERROR: unexpected token".to_string(),
            }),
            FakeTool::Silent => Ok(run),
        }
    }
}

fn create_job(dir: &Path, header: &str) -> BuildJob {
    let tool = ToolSpec::new("closure").with_args(["--language_in=ECMASCRIPT5_STRICT"]);
    BuildJob::new(dir.join("src.js"), dir.join("out.min.js"), tool, header)
}

/// Files left in `dir` apart from the given names
fn stray_files(dir: &Path, expected: &[&str]) -> Vec<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| !expected.contains(&name.as_str()))
        .collect()
}

#[test]
fn invariant_output_is_header_plus_minified_source() {
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// built-artifact\n");
    fs::write(job.source_path(), "function add(a,b){return a+b;}").unwrap();

    let pipeline = BuildPipeline::new(FakeCompiler::new(FakeTool::Minify));
    let report = pipeline.run(&job).unwrap();

    let built = fs::read_to_string(job.output_path()).unwrap();
    assert_eq!(built, "// built-artifact\nfunction add(a,b){return a+b}");
    assert_eq!(report.bytes, built.len() as u64);
    assert_eq!(report.output_hash, headerforge_core::sha256_hex(built.as_bytes()));
    assert_eq!(pipeline.compiler().calls.get(), 1);
    assert!(stray_files(dir.path(), &["src.js", "out.min.js"]).is_empty());
}

#[test]
fn invariant_tool_failure_skips_injection() {
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// h\n");
    fs::write(job.source_path(), "function(){").unwrap();
    fs::write(job.output_path(), "previous build").unwrap();

    let pipeline = BuildPipeline::new(FakeCompiler::new(FakeTool::Fail));
    let err = pipeline.run(&job).unwrap_err();

    match &err {
        BuildError::ExternalToolFailure { exit_code, diagnostics, .. } => {
            assert_eq!(*exit_code, Some(1));
            assert!(diagnostics.contains("JSC_PARSE_ERROR"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.exit_code(), 4);
    assert_eq!(fs::read_to_string(job.output_path()).unwrap(), "previous build");
    assert!(stray_files(dir.path(), &["src.js", "out.min.js"]).is_empty());
}

#[test]
fn invariant_silent_tool_reports_output_not_found() {
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// h\n");
    fs::write(job.source_path(), "var a;").unwrap();

    let pipeline = BuildPipeline::new(FakeCompiler::new(FakeTool::Silent));
    let err = pipeline.run(&job).unwrap_err();

    assert!(matches!(&err, BuildError::OutputNotFound(p) if p == job.output_path()));
    assert_eq!(err.exit_code(), 5);
    assert!(!job.output_path().exists());
}

#[test]
fn invariant_missing_source_leaves_output_untouched() {
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// h\n");
    fs::write(job.output_path(), "previous build").unwrap();

    let pipeline = BuildPipeline::new(FakeCompiler::new(FakeTool::Minify));
    let err = pipeline.run(&job).unwrap_err();

    assert!(matches!(&err, BuildError::SourceNotFound(p) if p == job.source_path()));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(pipeline.compiler().calls.get(), 0);
    assert_eq!(fs::read_to_string(job.output_path()).unwrap(), "previous build");
}

#[test]
fn invariant_existing_output_replaced_on_success() {
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// h\n");
    fs::write(job.source_path(), "x();").unwrap();
    fs::write(job.output_path(), "// h\nstale").unwrap();

    BuildPipeline::new(FakeCompiler::new(FakeTool::Minify)).run(&job).unwrap();

    assert_eq!(fs::read_to_string(job.output_path()).unwrap(), "// h\nx();");
}

#[test]
fn invariant_missing_output_directory_is_io_failure() {
    let dir = tempdir().unwrap();
    let tool = ToolSpec::new("closure");
    let job = BuildJob::new(dir.path().join("src.js"), dir.path().join("build/out.js"), tool, "// h\n");
    fs::write(job.source_path(), "x();").unwrap();

    let pipeline = BuildPipeline::new(FakeCompiler::new(FakeTool::Minify));
    let err = pipeline.run(&job).unwrap_err();

    assert!(matches!(err, BuildError::Io { .. }));
    assert_eq!(err.stage(), BuildStage::Prepare);
    assert_eq!(err.exit_code(), 6);
    assert_eq!(pipeline.compiler().calls.get(), 0);
    assert!(!dir.path().join("build").exists());
}

#[test]
fn invariant_failed_rename_reports_commit_stage() {
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// h\n");
    fs::write(job.source_path(), "x();").unwrap();
    // A non-empty directory sitting on the output path cannot be replaced.
    fs::create_dir(job.output_path()).unwrap();
    fs::write(job.output_path().join("keep"), "x").unwrap();

    let pipeline = BuildPipeline::new(FakeCompiler::new(FakeTool::Minify));
    let err = pipeline.run(&job).unwrap_err();

    assert!(matches!(err, BuildError::Io { .. }));
    assert_eq!(err.stage(), BuildStage::Commit);
    assert_eq!(pipeline.compiler().calls.get(), 1);
    assert_eq!(fs::read_to_string(job.output_path().join("keep")).unwrap(), "x");
    assert!(stray_files(dir.path(), &["src.js", "out.min.js"]).is_empty());
}

#[test]
fn invariant_staging_file_keeps_output_extension() {
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// h\n");
    fs::write(job.source_path(), "x();").unwrap();

    let report = BuildPipeline::new(ExtensionRecorder).run(&job).unwrap();

    assert!(report.tool.stdout.ends_with(".tmp.js"), "{}", report.tool.stdout);
}

/// Writes the source through unchanged and reports the path it was given
struct ExtensionRecorder;

impl Compiler for ExtensionRecorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn compile(&self, spec: &ToolSpec, source: &Path, output: &Path) -> Result<ToolOutput, BuildError> {
        fs::copy(source, output).unwrap();
        Ok(ToolOutput {
            program: spec.program.clone(),
            exit_code: Some(0),
            stdout: output.file_name().unwrap().to_string_lossy().into_owned(),
            ..Default::default()
        })
    }
}

#[test]
fn invariant_double_injection_duplicates_header() {
    // Documents the single-invocation contract of the injector.
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// built-artifact\n");
    fs::write(job.source_path(), "f();").unwrap();
    BuildPipeline::new(FakeCompiler::new(FakeTool::Minify)).run(&job).unwrap();

    HeaderInjector::new(job.header_text()).inject(job.output_path()).unwrap();

    assert_eq!(
        fs::read_to_string(job.output_path()).unwrap(),
        "// built-artifact\n// built-artifact\nf();"
    );
}

#[test]
fn invariant_jobs_are_independent() {
    let pipeline = BuildPipeline::new(FakeCompiler::new(FakeTool::Minify));
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let job_a = create_job(first.path(), "// a\n");
    let job_b = create_job(second.path(), "// b\n");
    fs::write(job_a.source_path(), "a();").unwrap();
    fs::write(job_b.source_path(), "b();").unwrap();

    let report_a = pipeline.run(&job_a).unwrap();
    let report_b = pipeline.run(&job_b).unwrap();

    assert_eq!(fs::read_to_string(job_a.output_path()).unwrap(), "// a\na();");
    assert_eq!(fs::read_to_string(job_b.output_path()).unwrap(), "// b\nb();");
    assert_ne!(report_a.id, report_b.id);
    assert_ne!(report_a.job_hash, report_b.job_hash);
}

#[test]
fn invariant_job_hash_stable() {
    let dir = tempdir().unwrap();
    let job = create_job(dir.path(), "// h\n");
    fs::write(job.source_path(), "z();").unwrap();
    let pipeline = BuildPipeline::new(FakeCompiler::new(FakeTool::Minify));

    let first = pipeline.run(&job).unwrap();
    let second = pipeline.run(&job).unwrap();

    assert_eq!(first.job_hash, second.job_hash);
    assert_eq!(first.output_hash, second.output_hash);
    assert_ne!(first.id, second.id);
}

#[test]
fn invariant_config_builds_equivalent_job() {
    let config = BuildConfig::from_json(
        r#"{"source": "in.js", "output": "out.js", "headerText": "// h\n", "tool": "closure", "toolArgs": ["--language_in=ECMASCRIPT5_STRICT"]}"#,
    ).unwrap();

    let job = config.to_job().unwrap();

    let tool = ToolSpec::new("closure").with_args(["--language_in=ECMASCRIPT5_STRICT"]);
    assert_eq!(job, BuildJob::new("in.js", "out.js", tool, "// h\n"));
    assert_eq!(job.invocation_args(), ["--language_in=ECMASCRIPT5_STRICT".to_string()]);
}

#[cfg(unix)]
#[test]
fn invariant_real_process_end_to_end() {
    let dir = tempdir().unwrap();
    let source = dir.path().join("src.js");
    let output = dir.path().join("out.min.js");
    fs::write(&source, "function add(a,b){return a+b;}").unwrap();

    // $0=minify $1=--js $2=source $3=--js_output_file $4=output
    let tool = ToolSpec::new("sh").with_args(["-c", "tr -d ';' < \"$2\" > \"$4\"", "minify"]);
    let job = BuildJob::new(&source, &output, tool, "// built-artifact\n");

    let report = BuildPipeline::new(ExternalCompiler::new()).run(&job).unwrap();

    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        "// built-artifact\nfunction add(a,b){return a+b}"
    );
    assert_eq!(report.tool.exit_code, Some(0));
    assert!(stray_files(dir.path(), &["src.js", "out.min.js"]).is_empty());
}
