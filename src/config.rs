//! Build Configuration
//!
//! Every key is optional. Missing keys fall back to the built-in deployment.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::job::{BuildJob, ToolSpec};
use crate::pipeline::BuildError;

pub const DEFAULT_SOURCE: &str = "../src/TexGen.js";
pub const DEFAULT_OUTPUT: &str = "../build/texgen.min.js";
pub const DEFAULT_HEADER: &str = "// texgen.js - http://github.com/mrdoob/texgen.js\n";
pub const DEFAULT_TOOL: &str = "java";
pub const DEFAULT_INPUT_FLAG: &str = "--js";
pub const DEFAULT_OUTPUT_FLAG: &str = "--js_output_file";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    #[serde(default = "default_source")]
    pub source: PathBuf,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default = "default_header")]
    pub header_text: String,
    #[serde(default = "default_tool")]
    pub tool: String,
    #[serde(default = "default_tool_args")]
    pub tool_args: Vec<String>,
    #[serde(default = "default_input_flag")]
    pub input_flag: String,
    #[serde(default = "default_output_flag")]
    pub output_flag: String,
}

fn default_source() -> PathBuf { PathBuf::from(DEFAULT_SOURCE) }
fn default_output() -> PathBuf { PathBuf::from(DEFAULT_OUTPUT) }
fn default_header() -> String { DEFAULT_HEADER.to_string() }
fn default_tool() -> String { DEFAULT_TOOL.to_string() }
fn default_input_flag() -> String { DEFAULT_INPUT_FLAG.to_string() }
fn default_output_flag() -> String { DEFAULT_OUTPUT_FLAG.to_string() }

fn default_tool_args() -> Vec<String> {
    vec![
        "-jar".to_string(),
        "compiler/compiler.jar".to_string(),
        "--language_in=ECMASCRIPT5_STRICT".to_string(),
    ]
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            output: default_output(),
            header_text: default_header(),
            tool: default_tool(),
            tool_args: default_tool_args(),
            input_flag: default_input_flag(),
            output_flag: default_output_flag(),
        }
    }
}

impl BuildConfig {
    /// Parse a JSON config document
    pub fn from_json(content: &str) -> Result<Self, BuildError> {
        serde_json::from_str(content)
            .map_err(|e| BuildError::Config(format!("invalid config: {}", e)))
    }

    /// Load a JSON config file
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let content = fs::read_to_string(path).map_err(|e| {
            BuildError::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Freeze the configuration into an immutable job
    pub fn to_job(&self) -> Result<BuildJob, BuildError> {
        if self.tool.trim().is_empty() {
            return Err(BuildError::Config("tool must not be empty".into()));
        }
        if self.source.as_os_str().is_empty() || self.output.as_os_str().is_empty() {
            return Err(BuildError::Config("source and output must not be empty".into()));
        }

        let tool = ToolSpec::new(&self.tool)
            .with_args(self.tool_args.iter().cloned())
            .with_flags(&self.input_flag, &self.output_flag);

        Ok(BuildJob::new(&self.source, &self.output, tool, &self.header_text))
    }
}
