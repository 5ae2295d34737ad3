//! HeaderForge CLI - one build job per run
//!
//! Outputs JSON to stdout, logs to stderr.
//! Exit codes: 0 ok, 2 config, 3 source missing, 4 tool failed,
//! 5 output missing, 6 I/O failure.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use headerforge_core::{BuildConfig, BuildError, BuildPipeline, BuildStage, ExternalCompiler};

#[derive(Parser)]
#[command(name = "headerforge-cli")]
#[command(about = "HeaderForge CLI - minify an artifact and stamp its attribution header")]
struct Cli {
    /// JSON config file (camelCase keys, all optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Source artifact
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output artifact
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Attribution header, prepended verbatim
    #[arg(long = "header")]
    header_text: Option<String>,

    /// External compiler program
    #[arg(long)]
    tool: Option<String>,

    /// Flag forwarded to the tool before the path flags (repeatable)
    #[arg(long = "tool-arg", allow_hyphen_values = true)]
    tool_args: Vec<String>,

    /// Flag that precedes the source path
    #[arg(long, allow_hyphen_values = true)]
    input_flag: Option<String>,

    /// Flag that precedes the output path
    #[arg(long, allow_hyphen_values = true)]
    output_flag: Option<String>,

    /// Print the resolved configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn resolve(self) -> Result<(BuildConfig, bool), BuildError> {
        let mut config = match &self.config {
            Some(path) => BuildConfig::load(path)?,
            None => BuildConfig::default(),
        };

        if let Some(source) = self.source {
            config.source = source;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
        if let Some(header_text) = self.header_text {
            config.header_text = header_text;
        }
        if let Some(tool) = self.tool {
            config.tool = tool;
        }
        if !self.tool_args.is_empty() {
            config.tool_args = self.tool_args;
        }
        if let Some(input_flag) = self.input_flag {
            config.input_flag = input_flag;
        }
        if let Some(output_flag) = self.output_flag {
            config.output_flag = output_flag;
        }

        Ok((config, self.print_config))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let (config, print_config) = match cli.resolve() {
        Ok(resolved) => resolved,
        Err(e) => return fail(&e),
    };

    if print_config {
        return match serde_json::to_string_pretty(&config) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => fail(&BuildError::from(e)),
        };
    }

    let job = match config.to_job() {
        Ok(job) => job,
        Err(e) => return fail(&e),
    };

    let pipeline = BuildPipeline::new(ExternalCompiler::new());

    match pipeline.run(&job) {
        Ok(report) => {
            let output = serde_json::json!({
                "success": true,
                "report": report,
            });
            match serde_json::to_string_pretty(&output) {
                Ok(json) => {
                    println!("{}", json);
                    ExitCode::SUCCESS
                }
                Err(e) => fail(&BuildError::from(e)),
            }
        }
        Err(e) => fail(&e),
    }
}

fn fail(e: &BuildError) -> ExitCode {
    let stage: BuildStage = e.stage();
    let output = serde_json::json!({
        "success": false,
        "stage": stage,
        "error": e.to_string(),
    });
    println!("{}", output);
    ExitCode::from(e.exit_code())
}
