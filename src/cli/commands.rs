use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crate::payload::{BodyEncoding, HttpMethod};

#[derive(Parser)]
#[command(
    name = "wafsmith",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (built ", env!("BUILD_TIMESTAMP"), ")"),
    about = "Synthesize and validate WAF rules from attack payloads"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a validated ruleset from an attack corpus
    Create(CreateArgs),
    /// Probe the currently deployed WAF with attack and traffic corpora
    Evaluate(EvaluateArgs),
    /// Extract attack payloads from raw log lines
    Extract(ExtractArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Where payloads are sent and how.
#[derive(Args, Clone, Debug, Default)]
pub struct TargetArgs {
    /// Endpoint of the application behind the WAF
    #[arg(short, long)]
    pub target: Option<String>,

    /// HTTP method: GET, POST, PUT, DELETE
    #[arg(short, long)]
    pub method: Option<HttpMethod>,

    /// Payload position: url_parameters, http_header, http_body
    #[arg(short, long)]
    pub position: Option<String>,

    /// Body encoding for http_body: form, json, xml
    #[arg(long)]
    pub body_encoding: Option<BodyEncoding>,

    /// Header carrying the payload for http_header
    #[arg(long)]
    pub header_name: Option<String>,

    /// Concurrent probe requests
    #[arg(long)]
    pub threads: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// The compose stack under test.
#[derive(Args, Clone, Debug, Default)]
pub struct EnvironmentArgs {
    /// Directory holding the compose file of the test stack
    #[arg(short, long)]
    pub setup_dir: Option<PathBuf>,

    /// Compose file name inside the setup directory
    #[arg(long)]
    pub compose_file: Option<String>,

    /// Compose service running the WAF
    #[arg(long)]
    pub waf_service: Option<String>,
}

#[derive(Args, Clone, Debug, Default)]
pub struct LlmArgs {
    /// LLM provider: openai, local, openai_compatible
    #[arg(long)]
    pub provider: Option<String>,

    /// LLM model identifier
    #[arg(long)]
    pub model: Option<String>,

    /// LLM API key (or OPENAI_API_KEY)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Chat completions base URL
    #[arg(long)]
    pub base_url: Option<String>,

    /// Directory of prompt overrides (<name>.txt)
    #[arg(long)]
    pub prompts_dir: Option<PathBuf>,

    /// Single attempt per LLM call, for fast dry runs
    #[arg(long)]
    pub pipeline_testing: bool,
}

#[derive(Args, Clone, Debug)]
pub struct CreateArgs {
    /// Attack payload file or directory
    #[arg(short, long)]
    pub attacks: PathBuf,

    /// Business traffic file or directory
    #[arg(long)]
    pub traffic: Option<PathBuf>,

    /// Output file for the final ruleset
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output file for payloads no rule blocks
    #[arg(short, long)]
    pub evaded: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub environment: EnvironmentArgs,

    #[command(flatten)]
    pub llm: LlmArgs,
}

#[derive(Args, Clone, Debug)]
pub struct EvaluateArgs {
    /// Attack payload file or directory
    #[arg(short, long)]
    pub attacks: PathBuf,

    /// Business traffic file or directory
    #[arg(long)]
    pub traffic: Option<PathBuf>,

    /// Output file for payloads the WAF lets through
    #[arg(short, long)]
    pub evaded: Option<PathBuf>,

    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub environment: EnvironmentArgs,
}

#[derive(Args, Clone, Debug)]
pub struct ExtractArgs {
    /// Log file or directory of logs
    #[arg(short, long)]
    pub logs: PathBuf,

    /// Output file for extracted payloads
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Concurrent classification requests
    #[arg(long)]
    pub threads: Option<usize>,

    #[command(flatten)]
    pub llm: LlmArgs,
}

#[derive(Args, Clone, Debug)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(value_name = "CONFIG")]
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_create_flags_parse() {
        let cli = Cli::try_parse_from([
            "wafsmith", "-vv", "create", "--attacks", "xss.txt", "--method", "POST",
            "--position", "http_body", "--body-encoding", "json", "--threads", "4",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Create(args) = cli.command else {
            panic!("expected create");
        };
        assert_eq!(args.attacks, PathBuf::from("xss.txt"));
        assert_eq!(args.target.method, Some(HttpMethod::Post));
        assert_eq!(args.target.body_encoding, Some(BodyEncoding::Json));
        assert_eq!(args.target.threads, Some(4));
    }

    #[test]
    fn test_invalid_method_is_rejected() {
        assert!(Cli::try_parse_from(["wafsmith", "evaluate", "-a", "x", "-m", "TRACE"]).is_err());
    }
}
