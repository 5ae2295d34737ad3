//! Compiler Invoker - External Toolchain Boundary
//!
//! The toolchain is an opaque black box. The pipeline only sees the
//! `Compiler` trait, so tests can swap in a fake without spawning anything.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

use crate::job::ToolSpec;
use crate::pipeline::BuildError;

/// What a finished tool run left behind besides its output file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub program: String,
    pub args: Vec<String>,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Combined diagnostic text, stderr first
    pub fn diagnostics(&self) -> String {
        match (self.stderr.trim(), self.stdout.trim()) {
            ("", "") => String::new(),
            (err, "") => err.to_string(),
            ("", out) => out.to_string(),
            (err, out) => format!("{}\n{}", err, out),
        }
    }
}

/// Capability to turn `source` into `output`.
///
/// Implementations block until the work is done. On success the file at
/// `output` is expected to hold the compiled artifact.
pub trait Compiler {
    fn name(&self) -> &str;
    fn compile(&self, tool: &ToolSpec, source: &Path, output: &Path) -> Result<ToolOutput, BuildError>;
}

/// Runs the configured program as a child process and waits for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExternalCompiler;

impl ExternalCompiler {
    pub fn new() -> Self {
        Self
    }
}

impl Compiler for ExternalCompiler {
    fn name(&self) -> &str {
        "external"
    }

    fn compile(&self, tool: &ToolSpec, source: &Path, output: &Path) -> Result<ToolOutput, BuildError> {
        let argv = tool.command_args(source, output);
        let args: Vec<String> = argv.iter().map(|a| a.to_string_lossy().into_owned()).collect();

        debug!(program = %tool.program, args = ?args, "launching external tool");

        let result = Command::new(&tool.program)
            .args(&argv)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                warn!(program = %tool.program, error = %e, "external tool could not be launched");
                BuildError::ExternalToolFailure {
                    program: tool.program.clone(),
                    exit_code: None,
                    diagnostics: format!("failed to launch: {}", e),
                }
            })?;

        let run = ToolOutput {
            program: tool.program.clone(),
            args,
            exit_code: result.status.code(),
            stdout: String::from_utf8_lossy(&result.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
        };

        if !result.status.success() {
            let diagnostics = run.diagnostics();
            warn!(
                program = %run.program,
                exit_code = ?run.exit_code,
                diagnostics = %diagnostics,
                "external tool failed"
            );
            return Err(BuildError::ExternalToolFailure {
                program: run.program,
                exit_code: run.exit_code,
                diagnostics,
            });
        }

        debug!(program = %run.program, diagnostics = %run.diagnostics(), "external tool finished");
        Ok(run)
    }
}
