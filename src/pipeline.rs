//! Build Pipeline - Single Entry Point
//!
//! CRITICAL: stages run strictly in order (invoke, inject, commit) and the
//! output path is only replaced once every stage has succeeded.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::header::HeaderInjector;
use crate::invoker::{Compiler, ExternalCompiler, ToolOutput};
use crate::job::BuildJob;
use crate::hashing::{compute_job_hash, sha256_hex};
use crate::ENGINE_VERSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStage {
    Config,
    Source,
    Prepare,
    Invoke,
    Inject,
    Commit,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("External tool `{program}` failed ({}): {diagnostics}", describe_exit(.exit_code))]
    ExternalToolFailure {
        program: String,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    #[error("Output not found: {}", .0.display())]
    OutputNotFound(PathBuf),

    #[error("I/O failure on {}: {source}", .path.display())]
    Io {
        stage: BuildStage,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code".to_string(),
    }
}

impl BuildError {
    /// Stage the job was in when it failed
    pub fn stage(&self) -> BuildStage {
        match self {
            BuildError::SourceNotFound(_) => BuildStage::Source,
            BuildError::ExternalToolFailure { .. } => BuildStage::Invoke,
            BuildError::OutputNotFound(_) => BuildStage::Inject,
            BuildError::Io { stage, .. } => *stage,
            BuildError::Config(_) | BuildError::Serialization(_) => BuildStage::Config,
        }
    }

    /// Process exit code for the CLI; distinct per failure kind
    pub fn exit_code(&self) -> u8 {
        match self {
            BuildError::Config(_) | BuildError::Serialization(_) => 2,
            BuildError::SourceNotFound(_) => 3,
            BuildError::ExternalToolFailure { .. } => 4,
            BuildError::OutputNotFound(_) => 5,
            BuildError::Io { .. } => 6,
        }
    }
}

/// Summary of one successful job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildReport {
    pub id: String,
    pub engine_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source: PathBuf,
    pub output: PathBuf,
    pub job_hash: String,
    pub output_hash: String,
    pub bytes: u64,
    pub tool: ToolOutput,
}

/// Sibling file the tool writes into. Removed on drop unless committed.
struct Staging {
    path: PathBuf,
    committed: bool,
}

impl Staging {
    fn beside(output: &Path) -> Result<Self, BuildError> {
        let name = output.file_name().ok_or_else(|| {
            BuildError::Config(format!("output path has no file name: {}", output.display()))
        })?;
        let dir = output_dir(output);
        if !dir.is_dir() {
            return Err(BuildError::Io {
                stage: BuildStage::Prepare,
                path: dir,
                source: io::Error::new(io::ErrorKind::NotFound, "output directory does not exist"),
            });
        }

        // Keep the extension: some tools pick their output format from it.
        let stem = Path::new(name).file_stem().unwrap_or(name).to_string_lossy();
        let staged_name = match Path::new(name).extension() {
            Some(ext) => format!(".{}.{}.tmp.{}", stem, Uuid::new_v4().simple(), ext.to_string_lossy()),
            None => format!(".{}.{}.tmp", stem, Uuid::new_v4().simple()),
        };
        Ok(Self { path: dir.join(staged_name), committed: false })
    }

    fn commit(mut self, target: &Path) -> Result<(), BuildError> {
        fs::rename(&self.path, target).map_err(|e| BuildError::Io {
            stage: BuildStage::Commit,
            path: target.to_path_buf(),
            source: e,
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staging {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

fn output_dir(output: &Path) -> PathBuf {
    match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// The build pipeline - runs one job at a time, synchronously
pub struct BuildPipeline<C: Compiler = ExternalCompiler> {
    compiler: C,
}

impl<C: Compiler> BuildPipeline<C> {
    pub fn new(compiler: C) -> Self {
        Self { compiler }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Run a job end to end.
    ///
    /// On error a pre-existing output file keeps its previous content.
    pub fn run(&self, job: &BuildJob) -> Result<BuildReport, BuildError> {
        let id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let job_hash = compute_job_hash(job, ENGINE_VERSION)?;

        info!(
            id = %id,
            compiler = self.compiler.name(),
            source = %job.source_path().display(),
            output = %job.output_path().display(),
            "build started"
        );

        let result = self.execute(job);
        let (tool, bytes, output_hash) = match result {
            Ok(done) => done,
            Err(e) => {
                warn!(id = %id, stage = ?e.stage(), error = %e, "build failed");
                return Err(e);
            }
        };

        let report = BuildReport {
            id,
            engine_version: ENGINE_VERSION.to_string(),
            started_at,
            finished_at: Utc::now(),
            source: job.source_path().to_path_buf(),
            output: job.output_path().to_path_buf(),
            job_hash,
            output_hash,
            bytes,
            tool,
        };

        info!(id = %report.id, bytes = report.bytes, output_hash = %report.output_hash, "build finished");
        Ok(report)
    }

    fn execute(&self, job: &BuildJob) -> Result<(ToolOutput, u64, String), BuildError> {
        check_source(job.source_path())?;

        let staging = Staging::beside(job.output_path())?;

        let tool = self.compiler.compile(job.tool(), job.source_path(), &staging.path)?;

        // A tool that exits 0 without writing anything surfaces here.
        let bytes = HeaderInjector::new(job.header_text())
            .inject(&staging.path)
            .map_err(|e| match e {
                BuildError::OutputNotFound(_) => BuildError::OutputNotFound(job.output_path().to_path_buf()),
                other => other,
            })?;

        let built = fs::read(&staging.path).map_err(|e| BuildError::Io {
            stage: BuildStage::Commit,
            path: staging.path.clone(),
            source: e,
        })?;
        let output_hash = sha256_hex(&built);

        staging.commit(job.output_path())?;

        Ok((tool, bytes, output_hash))
    }
}

fn check_source(source: &Path) -> Result<(), BuildError> {
    match fs::metadata(source) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(BuildError::SourceNotFound(source.to_path_buf()))
        }
        Err(e) => Err(BuildError::Io { stage: BuildStage::Source, path: source.to_path_buf(), source: e }),
    }
}

impl Default for BuildPipeline<ExternalCompiler> {
    fn default() -> Self {
        Self::new(ExternalCompiler::new())
    }
}
