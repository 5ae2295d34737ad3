//! Build Job - One Immutable Unit of Work

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// External toolchain invocation: program plus ordered flags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub program: String,
    pub args: Vec<String>,
    pub input_flag: String,
    pub output_flag: String,
}

impl ToolSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: vec![],
            input_flag: crate::config::DEFAULT_INPUT_FLAG.to_string(),
            output_flag: crate::config::DEFAULT_OUTPUT_FLAG.to_string(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_flags(mut self, input_flag: &str, output_flag: &str) -> Self {
        self.input_flag = input_flag.to_string();
        self.output_flag = output_flag.to_string();
        self
    }

    /// Full argument vector: `args... input_flag source output_flag output`
    pub fn command_args(&self, source: &Path, output: &Path) -> Vec<OsString> {
        let mut argv: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        argv.push(OsString::from(&self.input_flag));
        argv.push(source.as_os_str().to_owned());
        argv.push(OsString::from(&self.output_flag));
        argv.push(output.as_os_str().to_owned());
        argv
    }
}

/// One end-to-end execution: source -> compiled and headered output.
///
/// Fields are fixed at construction. Nothing is global, so several jobs
/// can run in the same process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildJob {
    source_path: PathBuf,
    output_path: PathBuf,
    tool: ToolSpec,
    header_text: String,
}

impl BuildJob {
    pub fn new(
        source_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        tool: ToolSpec,
        header_text: impl Into<String>,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            output_path: output_path.into(),
            tool,
            header_text: header_text.into(),
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn tool(&self) -> &ToolSpec {
        &self.tool
    }

    pub fn invocation_args(&self) -> &[String] {
        &self.tool.args
    }

    pub fn header_text(&self) -> &str {
        &self.header_text
    }
}
