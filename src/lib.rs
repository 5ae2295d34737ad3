//! HeaderForge Core - Artifact Build Step
//!
//! # The Three Stages
//! 1. Invoke: the external toolchain writes the compiled artifact
//! 2. Inject: the attribution header is prepended to that artifact
//! 3. Commit: the headered artifact is renamed onto the output path
//!
//! A failed stage aborts the job and leaves the output path untouched.

pub mod config;
pub mod job;
pub mod invoker;
pub mod header;
pub mod hashing;
pub mod pipeline;

pub use config::BuildConfig;
pub use job::{BuildJob, ToolSpec};
pub use invoker::{Compiler, ExternalCompiler, ToolOutput};
pub use header::HeaderInjector;
pub use hashing::{compute_job_hash, canonical_json, sha256_hex};
pub use pipeline::{BuildPipeline, BuildReport, BuildError, BuildStage};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
